// src/services/detail.rs

//! Detail-page enrichment.
//!
//! Listing rows carry a link to a per-record detail page with fields the
//! listing omits (dates, dosage form, route). Enrichment fetches those pages
//! with bounded concurrency and merges the extracted fields into the rows.
//! A failed or missing detail page leaves the row exactly as listed.

use futures::StreamExt;
use scraper::{Html, Selector};

use crate::models::{COLUMNS, DETAIL_URL_FIELD, HarvestConfig, IDENTITY_FIELD, Record};
use crate::utils::http::{Method, Transport};
use crate::utils::normalize_text;

/// Columns the detail page is authoritative for; these overwrite listing
/// values instead of only filling gaps.
const AUTHORITATIVE_COLUMNS: &[&str] = &["Status", "Current status date"];

/// Enrich rows from their detail pages. Row order is preserved.
pub async fn enrich_records(
    config: &HarvestConfig,
    transport: &dyn Transport,
    rows: Vec<Record>,
) -> Vec<Record> {
    if !config.enrich.enabled || rows.is_empty() {
        return rows;
    }
    let concurrency = config.enrich.concurrency.max(1);
    let total = rows.len();
    log::info!("Enriching {total} records from detail pages (concurrency {concurrency})");

    let enriched: Vec<Record> = futures::stream::iter(rows.into_iter().map(|record| async move {
        let url = record.get(DETAIL_URL_FIELD).to_string();
        if url.is_empty() {
            return record;
        }
        match transport.fetch(&url, Method::Get, &[]).await {
            Ok(payload) => merge_detail(record, &payload.body),
            Err(e) => {
                log::debug!("Detail fetch for {} failed: {e}", record.identity());
                record
            }
        }
    }))
    .buffered(concurrency)
    .collect()
    .await;

    enriched
}

/// Merge detail-page fields into a listing row.
fn merge_detail(mut record: Record, body: &str) -> Record {
    for (label, value) in parse_detail_fields(body) {
        let Some(column) = label_to_column(&label) else {
            continue;
        };
        if value.is_empty() {
            continue;
        }
        if AUTHORITATIVE_COLUMNS.contains(&column) {
            record.set(column, value);
        } else {
            record.set_if_empty(column, value);
        }
    }
    record
}

/// Extract labelled values from a detail page: `<dl>` definition lists and
/// `<th>`/`<td>` table rows.
fn parse_detail_fields(body: &str) -> Vec<(String, String)> {
    let document = Html::parse_document(body);
    let mut fields = Vec::new();

    if let (Ok(dl_sel), Ok(item_sel)) = (Selector::parse("dl"), Selector::parse("dt, dd")) {
        for list in document.select(&dl_sel) {
            let mut label: Option<String> = None;
            for item in list.select(&item_sel) {
                let text = normalize_text(&item.text().collect::<Vec<_>>().join(" "));
                match item.value().name() {
                    "dt" => label = Some(text),
                    _ => {
                        if let Some(label) = label.take() {
                            fields.push((label, text));
                        }
                    }
                }
            }
        }
    }

    if let (Ok(row_sel), Ok(th_sel), Ok(td_sel)) = (
        Selector::parse("tr"),
        Selector::parse("th"),
        Selector::parse("td"),
    ) {
        for row in document.select(&row_sel) {
            let (Some(th), Some(td)) = (row.select(&th_sel).next(), row.select(&td_sel).next())
            else {
                continue;
            };
            let label = normalize_text(&th.text().collect::<Vec<_>>().join(" "));
            let value = normalize_text(&td.text().collect::<Vec<_>>().join(" "));
            fields.push((label, value));
        }
    }

    fields
}

/// Map a detail-page label to a canonical column, case-insensitively and
/// ignoring a trailing colon. The identity fields are never remapped.
fn label_to_column(label: &str) -> Option<&'static str> {
    let normalized = label.trim().trim_end_matches(':').trim().to_lowercase();
    COLUMNS
        .iter()
        .find(|&&col| {
            col != IDENTITY_FIELD && col != DETAIL_URL_FIELD && col.to_lowercase() == normalized
        })
        .copied()
}

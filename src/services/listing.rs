// src/services/listing.rs

//! Listing payload parsing.
//!
//! A listing payload is either HTML containing a results table or a JSON
//! document with a row array under one of two conventional keys. Malformed
//! or unexpected markup yields an empty list, never an error.

use scraper::{Html, Selector};
use serde_json::Value;
use url::Url;

use crate::models::{DETAIL_URL_FIELD, IDENTITY_FIELD, Record, SiteConfig};
use crate::utils::{normalize_text, resolve_url};

/// Columns mapped positionally from listing table cells / JSON row arrays.
const LISTING_COLUMNS: &[&str] = &[
    "Status",
    "Number",
    "Company",
    "Product",
    "Class",
    "Schedule",
    "Ingredient",
    "Strength",
];

/// Parse listing rows out of a raw payload.
pub fn parse_listing(site: &SiteConfig, body: &str) -> Vec<Record> {
    let trimmed = body.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        parse_json_rows(trimmed)
    } else {
        parse_html_rows(site, body)
    }
}

fn parse_json_rows(body: &str) -> Vec<Record> {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return Vec::new();
    };

    let rows = match &value {
        Value::Array(rows) => rows.as_slice(),
        Value::Object(map) => match map.get("data").or_else(|| map.get("aaData")) {
            Some(Value::Array(rows)) => rows.as_slice(),
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };

    rows.iter().filter_map(json_row_to_record).collect()
}

fn json_row_to_record(row: &Value) -> Option<Record> {
    let mut record = Record::new();
    match row {
        // DataTables-style positional arrays follow the listing column order.
        Value::Array(cells) => {
            for (cell, &column) in cells.iter().zip(LISTING_COLUMNS) {
                if let Value::String(s) = cell {
                    record.set(column, normalize_text(s));
                }
            }
        }
        Value::Object(map) => {
            for (key, cell) in map {
                if let Value::String(s) = cell {
                    record.set(key.clone(), normalize_text(s));
                }
            }
        }
        _ => return None,
    }
    if record.raw_identity().is_empty() {
        return None;
    }
    Some(record)
}

fn parse_html_rows(site: &SiteConfig, body: &str) -> Vec<Record> {
    let document = Html::parse_document(body);
    let (Ok(table_sel), Ok(row_sel), Ok(cell_sel), Ok(link_sel)) = (
        Selector::parse("table#results"),
        Selector::parse("tbody tr"),
        Selector::parse("td"),
        Selector::parse("a[href]"),
    ) else {
        return Vec::new();
    };

    let Some(table) = document.select(&table_sel).next() else {
        return Vec::new();
    };
    let base = Url::parse(&site.base_url).ok();

    let mut records = Vec::new();
    for row in table.select(&row_sel) {
        let cells: Vec<_> = row.select(&cell_sel).collect();
        if cells.len() < LISTING_COLUMNS.len() {
            continue;
        }

        let mut record = Record::new();
        for (cell, &column) in cells.iter().zip(LISTING_COLUMNS) {
            let text: String = cell.text().collect::<Vec<_>>().join(" ");
            record.set(column, normalize_text(&text));

            if column == IDENTITY_FIELD {
                let href = cell
                    .select(&link_sel)
                    .next()
                    .and_then(|a| a.value().attr("href"));
                if let (Some(base), Some(href)) = (&base, href) {
                    record.set(DETAIL_URL_FIELD, resolve_url(base, href));
                }
            }
        }
        records.push(record);
    }
    records
}

/// Extract the listing total from an "X of Y entries" string on page 1.
///
/// Handles both English and French variants and grouped digits with
/// space/comma/period/thin-space separators.
pub fn extract_total_entries(body: &str) -> Option<usize> {
    let rx = regex::Regex::new(
        r"(?i)(?:of|sur)\s+([0-9][0-9\s,\.\u{202f}\u{a0}]*)\s+(?:entries|entr\u{e9}es)",
    )
    .ok()?;
    let caps = rx.captures(body)?;
    let digits: String = caps
        .get(1)?
        .as_str()
        .chars()
        .filter(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

#[cfg(test)]
pub(crate) mod fixtures {
    /// Build a listing table page with one row per (number, product) pair.
    pub fn listing_page(rows: &[(&str, &str)], total: Option<usize>) -> String {
        let mut body = String::from("<html><body><table id=\"results\"><tbody>");
        for (number, product) in rows {
            body.push_str(&format!(
                "<tr><td>MARKETED</td>\
                 <td><a href=\"/record/{number}\">{number}</a></td>\
                 <td>Acme</td><td>{product}</td><td>Human</td>\
                 <td>OTC</td><td>Stuff</td><td>10 mg</td></tr>"
            ));
        }
        body.push_str("</tbody></table>");
        if let Some(total) = total {
            body.push_str(&format!("<p>Showing 1 to 25 of {total} entries</p>"));
        }
        body.push_str("</body></html>");
        body
    }
}

// src/services/pagination.rs

//! Linear pagination engine.
//!
//! State machine: Initial → ProbingStrategy → Draining → {Stalled | Exhausted}.
//! Probing tries each candidate paging-parameter convention against page 2;
//! the first candidate that returns at least one identity absent from page 1
//! is adopted for the rest of the run. Draining then walks pages sequentially
//! until an empty page, the estimated total, a stall, or the hard cap.

use std::collections::HashSet;
use std::time::Duration;

use crate::error::Result;
use crate::models::{
    HarvestConfig, PAGING_KEYS, PagingCursor, PagingKey, Record, StrategyTag,
};
use crate::pipeline::{Accumulator, CheckpointTracker};
use crate::services::listing::{extract_total_entries, parse_listing};
use crate::utils::http::{Method, Transport};

/// Terminal state of a pagination run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationOutcome {
    /// No candidate strategy advanced past page 1; sharding takes over
    Unavailable,
    /// Consecutive pages stopped contributing new identities
    Stalled,
    /// An empty page was seen, or the estimated total was covered
    Exhausted { total_known: bool },
    /// The hard row cap was reached
    CapReached,
}

/// Drives linear paging against a confirmed endpoint.
pub struct PaginationEngine<'a> {
    config: &'a HarvestConfig,
    transport: &'a dyn Transport,
    endpoint_url: String,
    method: Method,
    filters: Vec<(String, String)>,
    page_size: usize,
    page1_identities: HashSet<String>,
    total: Option<usize>,
    accepted: Option<PagingKey>,
}

impl<'a> PaginationEngine<'a> {
    pub fn new(
        config: &'a HarvestConfig,
        transport: &'a dyn Transport,
        endpoint_url: String,
        method: Method,
        first_page: &[Record],
        first_body: &str,
        page_size: usize,
    ) -> Self {
        let page1_identities = first_page
            .iter()
            .map(Record::identity)
            .filter(|id| !id.is_empty())
            .collect();
        Self {
            config,
            transport,
            endpoint_url,
            method,
            filters: config.site.base_filters(),
            page_size: page_size.max(1),
            page1_identities,
            total: extract_total_entries(first_body),
            accepted: None,
        }
    }

    /// The paging convention this run settled on, if any.
    pub fn accepted_key(&self) -> Option<PagingKey> {
        self.accepted
    }

    pub fn strategy_tag(&self) -> StrategyTag {
        if self.accepted.is_some() {
            StrategyTag::LinearHtml
        } else {
            StrategyTag::Unknown
        }
    }

    /// Whether page 1 advertised a server-side total.
    pub fn total(&self) -> Option<usize> {
        self.total
    }

    /// Run probe + drain, writing into the shared accumulator. Checkpoints
    /// are evaluated after every drained page.
    pub async fn drive(
        &mut self,
        acc: &mut Accumulator,
        checkpoints: &mut CheckpointTracker<'_>,
    ) -> Result<PaginationOutcome> {
        if self.page1_identities.is_empty() {
            return Ok(PaginationOutcome::Unavailable);
        }

        match self.probe_strategy(acc).await? {
            ProbeResult::Accepted => {}
            ProbeResult::CapReached => return Ok(PaginationOutcome::CapReached),
            ProbeResult::NoneWorked => return Ok(PaginationOutcome::Unavailable),
        }
        checkpoints.tick(acc).await?;

        self.drain(acc, checkpoints).await
    }

    /// Try each paging convention against page 2.
    ///
    /// A candidate is accepted iff it returns at least one identity not
    /// present on page 1; a page-2 response echoing page 1 means the
    /// parameter was ignored by the server.
    async fn probe_strategy(&mut self, acc: &mut Accumulator) -> Result<ProbeResult> {
        for key in PAGING_KEYS {
            self.sleep().await;
            let rows = match self.fetch_page(*key, 2).await {
                Ok(rows) => rows,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    log::debug!("Probe {} failed: {e}", key.name);
                    continue;
                }
            };

            let new_vs_p1 = rows
                .iter()
                .map(Record::identity)
                .filter(|id| !id.is_empty() && !self.page1_identities.contains(id))
                .count();
            log::debug!(
                "Probe strategy {} -> {} rows; new vs p1: {}",
                key.name,
                rows.len(),
                new_vs_p1
            );

            if rows.is_empty() || new_vs_p1 == 0 {
                continue;
            }

            self.accepted = Some(*key);
            log::info!("Paging strategy accepted: {}", key.name);
            for record in rows {
                acc.insert(record);
                if acc.is_full() {
                    return Ok(ProbeResult::CapReached);
                }
            }
            return Ok(ProbeResult::Accepted);
        }
        Ok(ProbeResult::NoneWorked)
    }

    /// Walk pages 3.. with the accepted strategy.
    async fn drain(
        &mut self,
        acc: &mut Accumulator,
        checkpoints: &mut CheckpointTracker<'_>,
    ) -> Result<PaginationOutcome> {
        let Some(key) = self.accepted else {
            return Ok(PaginationOutcome::Unavailable);
        };
        let total_known = self.total.is_some();
        let max_pages = match self.total {
            Some(total) => total.div_ceil(self.page_size),
            None => self.config.engine.max_pages_fallback,
        };

        let mut stale_pages = 0usize;
        for page in 3..=max_pages {
            self.sleep().await;
            let cursor = PagingCursor::new(StrategyTag::LinearHtml, page, self.page_size);
            let rows = match self.fetch_page(key, cursor.page).await {
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    log::warn!("Page {page} fetch failed: {e}");
                    return Ok(PaginationOutcome::Exhausted { total_known });
                }
                Ok(rows) => rows,
            };

            log::debug!("Page {page}: {} rows", rows.len());
            if rows.is_empty() {
                return Ok(PaginationOutcome::Exhausted { total_known });
            }

            let mut added = 0usize;
            for record in rows {
                if acc.insert(record) {
                    added += 1;
                }
                if acc.is_full() {
                    return Ok(PaginationOutcome::CapReached);
                }
            }

            if added == 0 {
                stale_pages += 1;
                if stale_pages >= self.config.engine.stall_limit {
                    log::info!("Pagination stalled after {stale_pages} pages with no new rows");
                    return Ok(PaginationOutcome::Stalled);
                }
            } else {
                stale_pages = 0;
            }
            checkpoints.tick(acc).await?;
        }

        Ok(PaginationOutcome::Exhausted { total_known })
    }

    async fn fetch_page(&self, key: PagingKey, page: usize) -> Result<Vec<Record>> {
        let mut params = self.filters.clone();
        params.push(key.param(page, self.page_size));
        let payload = self
            .transport
            .fetch(&self.endpoint_url, self.method, &params)
            .await?;
        Ok(parse_listing(&self.config.site, &payload.body))
    }

    async fn sleep(&self) {
        let millis = self.config.http.request_sleep_ms;
        if millis > 0 {
            tokio::time::sleep(Duration::from_millis(millis)).await;
        }
    }
}

enum ProbeResult {
    Accepted,
    CapReached,
    NoneWorked,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HarvestConfig;
    use crate::services::fake::{FakeTransport, Rule};
    use crate::services::listing::fixtures::listing_page;

    fn config() -> HarvestConfig {
        let mut config = HarvestConfig::default();
        config.http.request_sleep_ms = 0;
        config.engine.max_pages_fallback = 6;
        config
    }

    fn page1_rows(config: &HarvestConfig) -> Vec<Record> {
        parse_listing(
            &config.site,
            &listing_page(&[("00000001", "A"), ("00000002", "B")], None),
        )
    }

    fn engine<'a>(
        config: &'a HarvestConfig,
        transport: &'a FakeTransport,
        first_body: &str,
    ) -> PaginationEngine<'a> {
        let first_page = parse_listing(&config.site, first_body);
        PaginationEngine::new(
            config,
            transport,
            config.site.results_url(),
            Method::Get,
            &first_page,
            first_body,
            first_page.len().max(1),
        )
    }

    fn seed(acc: &mut Accumulator, rows: Vec<Record>) {
        for row in rows {
            acc.insert(row);
        }
    }

    #[tokio::test]
    async fn test_first_strategy_accepted_and_drained() {
        let config = config();
        let first_body = listing_page(&[("00000001", "A"), ("00000002", "B")], None);
        let transport = FakeTransport::new(vec![
            Rule::get("/search/results")
                .param("results_page", "2")
                .body(&listing_page(&[("00000003", "C"), ("00000004", "D")], None)),
            Rule::get("/search/results")
                .param("results_page", "3")
                .body(&listing_page(&[("00000005", "E")], None)),
            // Page 4 is empty -> exhausted.
        ]);

        let mut acc = Accumulator::new(0);
        seed(&mut acc, page1_rows(&config));
        let mut engine = engine(&config, &transport, &first_body);

        let outcome = engine
            .drive(&mut acc, &mut CheckpointTracker::disabled())
            .await
            .unwrap();
        assert_eq!(outcome, PaginationOutcome::Exhausted { total_known: false });
        assert_eq!(acc.len(), 5);
        assert_eq!(engine.accepted_key().unwrap().name, "results_page");
        assert_eq!(engine.strategy_tag(), StrategyTag::LinearHtml);
    }

    #[tokio::test]
    async fn test_page2_echoing_page1_rejects_candidate() {
        let config = config();
        let first_body = listing_page(&[("00000001", "A"), ("00000002", "B")], None);
        // Every page-index candidate echoes page 1; only the offset
        // convention reaches real page 2 content.
        let echo = listing_page(&[("00000001", "A"), ("00000002", "B")], None);
        let transport = FakeTransport::new(vec![
            Rule::get("/search/results").param("results_page", "2").body(&echo),
            Rule::get("/search/results").param("page", "2").body(&echo),
            Rule::get("/search/results").param("p", "2").body(&echo),
            Rule::get("/search/results")
                .param("start", "2")
                .body(&listing_page(&[("00000003", "C")], None)),
        ]);

        let mut acc = Accumulator::new(0);
        seed(&mut acc, page1_rows(&config));
        let mut engine = engine(&config, &transport, &first_body);

        let outcome = engine
            .drive(&mut acc, &mut CheckpointTracker::disabled())
            .await
            .unwrap();
        // Offset for page 2 with page_size 2 is (2-1)*2 = 2.
        assert_eq!(outcome, PaginationOutcome::Exhausted { total_known: false });
        assert_eq!(engine.accepted_key().unwrap().name, "start");
        assert_eq!(acc.len(), 3);
    }

    #[tokio::test]
    async fn test_no_candidate_works_is_unavailable() {
        let config = config();
        let first_body = listing_page(&[("00000001", "A"), ("00000002", "B")], None);
        let echo = listing_page(&[("00000001", "A"), ("00000002", "B")], None);
        let transport = FakeTransport::new(vec![Rule::get("/search/results").body(&echo)]);

        let mut acc = Accumulator::new(0);
        seed(&mut acc, page1_rows(&config));
        let mut engine = engine(&config, &transport, &first_body);

        let outcome = engine
            .drive(&mut acc, &mut CheckpointTracker::disabled())
            .await
            .unwrap();
        assert_eq!(outcome, PaginationOutcome::Unavailable);
        assert_eq!(acc.len(), 2);
        assert!(engine.accepted_key().is_none());
    }

    #[tokio::test]
    async fn test_stall_after_consecutive_stale_pages() {
        let config = config();
        let first_body = listing_page(&[("00000001", "A"), ("00000002", "B")], None);
        let stale = listing_page(&[("00000003", "C")], None);
        let transport = FakeTransport::new(vec![
            Rule::get("/search/results")
                .param("results_page", "2")
                .body(&listing_page(&[("00000003", "C")], None)),
            // Pages 3.. keep returning the same already-seen row.
            Rule::get("/search/results").param("results_page", "3").body(&stale),
            Rule::get("/search/results").param("results_page", "4").body(&stale),
            Rule::get("/search/results").param("results_page", "5").body(&stale),
        ]);

        let mut acc = Accumulator::new(0);
        seed(&mut acc, page1_rows(&config));
        let mut engine = engine(&config, &transport, &first_body);

        let outcome = engine
            .drive(&mut acc, &mut CheckpointTracker::disabled())
            .await
            .unwrap();
        assert_eq!(outcome, PaginationOutcome::Stalled);
        assert_eq!(acc.len(), 3);
        // Stall triggers after exactly 2 stale pages (pages 3 and 4).
        assert_eq!(transport.requests_to("/search/results").len(), 3);
    }

    #[tokio::test]
    async fn test_cap_stops_draining_immediately() {
        let config = config();
        let first_body = listing_page(&[("00000001", "A"), ("00000002", "B")], None);
        let transport = FakeTransport::new(vec![
            Rule::get("/search/results")
                .param("results_page", "2")
                .body(&listing_page(&[("00000003", "C"), ("00000004", "D")], None)),
            Rule::get("/search/results")
                .param("results_page", "3")
                .body(&listing_page(&[("00000005", "E")], None)),
        ]);

        let mut acc = Accumulator::new(3);
        seed(&mut acc, page1_rows(&config));
        let mut engine = engine(&config, &transport, &first_body);

        let outcome = engine
            .drive(&mut acc, &mut CheckpointTracker::disabled())
            .await
            .unwrap();
        assert_eq!(outcome, PaginationOutcome::CapReached);
        assert_eq!(acc.len(), 3);
        // The cap hit during the page-2 probe; page 3 was never requested.
        assert_eq!(transport.requests_to("/search/results").len(), 1);
    }

    #[tokio::test]
    async fn test_total_bounds_page_walk() {
        let config = config();
        // 4 entries at 2 per page -> pages 1..=2, nothing past page 2.
        let first_body = listing_page(&[("00000001", "A"), ("00000002", "B")], Some(4));
        let transport = FakeTransport::new(vec![
            Rule::get("/search/results")
                .param("results_page", "2")
                .body(&listing_page(&[("00000003", "C"), ("00000004", "D")], None)),
        ]);

        let mut acc = Accumulator::new(0);
        seed(&mut acc, page1_rows(&config));
        let mut engine = engine(&config, &transport, &first_body);
        assert_eq!(engine.total(), Some(4));

        let outcome = engine
            .drive(&mut acc, &mut CheckpointTracker::disabled())
            .await
            .unwrap();
        assert_eq!(outcome, PaginationOutcome::Exhausted { total_known: true });
        assert_eq!(acc.len(), 4);
        assert_eq!(transport.requests_to("/search/results").len(), 1);
    }

    #[tokio::test]
    async fn test_empty_first_page_is_unavailable() {
        let config = config();
        let transport = FakeTransport::new(vec![]);
        let mut acc = Accumulator::new(0);
        let mut engine = engine(&config, &transport, "");

        let outcome = engine
            .drive(&mut acc, &mut CheckpointTracker::disabled())
            .await
            .unwrap();
        assert_eq!(outcome, PaginationOutcome::Unavailable);
        assert_eq!(transport.request_count(), 0);
    }
}

// src/services/sweep.rs

//! Shard sweep engine.
//!
//! Fallback enumeration strategy: partition the key space into ordered shard
//! tokens and fully drain each shard's own pagination before advancing to the
//! next token. Used when linear paging cannot advance past the first page,
//! and to top up coverage when paging under-delivers.

use std::time::Duration;

use crate::error::Result;
use crate::models::{
    EndpointCandidate, EndpointRole, HarvestConfig, PagingCursor, Record, Shard, ShardKind,
    StrategyTag, SweepOrder, sweep_candidates,
};
use crate::pipeline::{Accumulator, CheckpointTracker};
use crate::services::listing::parse_listing;
use crate::services::prober::AjaxConfig;
use crate::utils::http::{Method, Transport};

/// Generic paging-parameter names tried for HTML shard draining.
const SHARD_PAGING_NAMES: &[&str] = &["results_page", "page", "p"];

/// Terminal state of a sweep run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    /// Every token of both spaces was visited (or early-stopped by policy)
    Complete,
    /// The hard row cap was reached
    CapReached,
}

/// Result of sweeping one shard token.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShardResult {
    /// New unique rows contributed by this shard
    pub added: usize,
    /// Whether any endpoint returned rows at all (distinct from stalled)
    pub saw_rows: bool,
}

/// Outcome of one token group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GroupEnd {
    Finished,
    EarlyStopped,
    CapReached,
}

/// Sweeps the shard spaces in a deterministic, configurable order.
pub struct ShardSweepEngine<'a> {
    config: &'a HarvestConfig,
    transport: &'a dyn Transport,
    baseline: Option<EndpointRole>,
    ajax: Option<AjaxConfig>,
}

impl<'a> ShardSweepEngine<'a> {
    pub fn new(
        config: &'a HarvestConfig,
        transport: &'a dyn Transport,
        baseline: Option<EndpointRole>,
        ajax: Option<AjaxConfig>,
    ) -> Self {
        Self {
            config,
            transport,
            baseline,
            ajax,
        }
    }

    /// Sweep both shard spaces.
    ///
    /// The preferred space's first few tokens are sampled first; when all of
    /// them come up empty, the other space runs before the remainder of the
    /// originally preferred one. Checkpoints are evaluated between shards,
    /// so rows gathered before a fatal abort stay resumable.
    pub async fn run(
        &self,
        acc: &mut Accumulator,
        checkpoints: &mut CheckpointTracker<'_>,
    ) -> Result<SweepOutcome> {
        let (preferred, other) = match self.config.sweep.order {
            SweepOrder::IdentityFirst => (ShardKind::Identity, ShardKind::Name),
            SweepOrder::NameFirst => (ShardKind::Name, ShardKind::Identity),
        };

        let tokens = preferred.tokens();
        let sample_size = self.config.sweep.sample_size.min(tokens.len());
        let (sample, rest) = tokens.split_at(sample_size);

        let mut nonempty = 0usize;
        for token in sample {
            let result = self.sweep_one(preferred, token, acc).await?;
            if result.saw_rows {
                nonempty += 1;
            }
            checkpoints.tick(acc).await?;
            if acc.is_full() {
                return Ok(SweepOutcome::CapReached);
            }
            self.sleep().await;
        }

        let groups: [(ShardKind, Vec<String>); 2] = if nonempty == 0 {
            log::info!(
                "First {sample_size} {:?} shards empty; switching to {:?} shards first",
                preferred,
                other
            );
            [(other, other.tokens()), (preferred, rest.to_vec())]
        } else {
            [(preferred, rest.to_vec()), (other, other.tokens())]
        };

        for (kind, tokens) in groups {
            match self.run_prefix_group(kind, &tokens, acc, checkpoints).await? {
                GroupEnd::CapReached => return Ok(SweepOutcome::CapReached),
                GroupEnd::Finished | GroupEnd::EarlyStopped => {}
            }
        }
        Ok(SweepOutcome::Complete)
    }

    /// Visit tokens in order, tracking the consecutive fully-empty streak.
    ///
    /// The streak counts only shards with zero rows at every endpoint, not
    /// merely stalled ones, and resets on any non-empty shard. A threshold of
    /// 0 never stops early; exhaustive coverage is the default policy.
    async fn run_prefix_group(
        &self,
        kind: ShardKind,
        tokens: &[String],
        acc: &mut Accumulator,
        checkpoints: &mut CheckpointTracker<'_>,
    ) -> Result<GroupEnd> {
        let threshold = self.config.sweep.max_empty_streak;
        let mut empty_streak = 0usize;

        for token in tokens {
            let result = self.sweep_one(kind, token, acc).await?;
            checkpoints.tick(acc).await?;
            if result.saw_rows {
                empty_streak = 0;
            } else {
                empty_streak += 1;
                if threshold > 0 && empty_streak >= threshold {
                    log::info!(
                        "{:?} group early stop after {empty_streak} empty shards in a row",
                        kind
                    );
                    return Ok(GroupEnd::EarlyStopped);
                }
            }
            if acc.is_full() {
                return Ok(GroupEnd::CapReached);
            }
            self.sleep().await;
        }
        Ok(GroupEnd::Finished)
    }

    /// Sweep one shard token: find an endpoint with rows, then drain its
    /// pages. Idempotent; re-sweeping a token cannot change the accumulator
    /// beyond what the first sweep achieved.
    pub async fn sweep_one(
        &self,
        kind: ShardKind,
        token: &str,
        acc: &mut Accumulator,
    ) -> Result<ShardResult> {
        let shard = Shard {
            kind,
            token: token.to_string(),
        };
        let filter = (
            kind.filter_key(&self.config.site).to_string(),
            shard.token.clone(),
        );
        let mut result = ShardResult::default();

        for (candidate, method) in self.page_one_attempts() {
            let rows = match self.fetch_shard_page_one(&candidate, method, &filter).await {
                Ok(rows) => rows,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    log::debug!(
                        "[{}:{}='{}'] error: {e}",
                        candidate.role.as_str(),
                        filter.0,
                        filter.1
                    );
                    continue;
                }
            };
            if rows.is_empty() {
                // Try the next endpoint immediately.
                continue;
            }

            result.saw_rows = true;
            for record in rows {
                if acc.insert(record) {
                    result.added += 1;
                }
                if acc.is_full() {
                    return Ok(result);
                }
            }

            let drained = self
                .drain_shard(&candidate.role.url(&self.config.site), &filter, acc, &mut result)
                .await?;
            if drained == DrainEnd::CapReached {
                return Ok(result);
            }

            if result.added > 0 {
                log::debug!(
                    "[{}:{}='{}'] +{} (cum={})",
                    candidate.role.as_str(),
                    filter.0,
                    filter.1,
                    result.added,
                    acc.len()
                );
            }
            // This token worked; stop trying other endpoints for it.
            break;
        }

        if !result.saw_rows {
            log::debug!("[{}='{}'] empty shard", filter.0, filter.1);
        }
        Ok(result)
    }

    /// Page-1 attempt order: POST against the first candidate (establishes
    /// session-scoped filter state), then GET against every candidate.
    fn page_one_attempts(&self) -> Vec<(EndpointCandidate, Method)> {
        let candidates = sweep_candidates(&self.config.site, self.baseline);
        let mut attempts = Vec::with_capacity(candidates.len() + 1);
        if let Some(first) = candidates.first() {
            attempts.push((*first, Method::Post));
        }
        for candidate in &candidates {
            attempts.push((*candidate, Method::Get));
        }
        attempts
    }

    async fn fetch_shard_page_one(
        &self,
        candidate: &EndpointCandidate,
        method: Method,
        filter: &(String, String),
    ) -> Result<Vec<Record>> {
        self.sleep().await;
        let mut params = self.config.site.base_filters();
        set_param(&mut params, &filter.0, &filter.1);
        let payload = self
            .transport
            .fetch(&candidate.role.url(&self.config.site), method, &params)
            .await?;
        if self.config.site.is_relay_bounce(&payload.final_url) {
            return Ok(Vec::new());
        }
        Ok(parse_listing(&self.config.site, &payload.body))
    }

    /// Drain pages 2.. for one shard, preferring the discovered AJAX JSON
    /// endpoint, then falling back to HTML GET with generic paging names.
    async fn drain_shard(
        &self,
        endpoint_url: &str,
        filter: &(String, String),
        acc: &mut Accumulator,
        result: &mut ShardResult,
    ) -> Result<DrainEnd> {
        let limit = match self.config.sweep.per_shard_page_limit {
            0 => usize::MAX,
            n => n,
        };
        let mut pager = match &self.ajax {
            Some(ajax) => ShardPager::Ajax(ajax.clone()),
            None => ShardPager::Html { adopted: None },
        };
        let mut stale_pages = 0usize;
        let mut page = 2usize;

        while page <= limit {
            self.sleep().await;
            let rows = match self.fetch_drain_page(&mut pager, endpoint_url, filter, page).await {
                Ok(rows) => rows,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    log::debug!("Shard page {page} fetch failed: {e}");
                    return Ok(DrainEnd::Done);
                }
            };

            if rows.is_empty() {
                // The AJAX endpoint may simply not honor this filter; retry
                // the same page once over plain HTML before giving up.
                if matches!(pager, ShardPager::Ajax(_)) && page == 2 {
                    pager = ShardPager::Html { adopted: None };
                    continue;
                }
                return Ok(DrainEnd::Done);
            }

            let mut added = 0usize;
            for record in rows {
                if acc.insert(record) {
                    added += 1;
                    result.added += 1;
                }
                if acc.is_full() {
                    return Ok(DrainEnd::CapReached);
                }
            }

            if added == 0 {
                stale_pages += 1;
                if stale_pages >= self.config.sweep.stall_limit {
                    return Ok(DrainEnd::Done);
                }
            } else {
                stale_pages = 0;
            }
            page += 1;
        }
        Ok(DrainEnd::Done)
    }

    async fn fetch_drain_page(
        &self,
        pager: &mut ShardPager,
        endpoint_url: &str,
        filter: &(String, String),
        page: usize,
    ) -> Result<Vec<Record>> {
        match pager {
            ShardPager::Ajax(ajax) => {
                let cursor = PagingCursor::new(StrategyTag::AjaxJson, page, ajax.page_size);
                let mut params = self.config.site.base_filters();
                set_param(&mut params, &filter.0, &filter.1);
                params.push(("start".to_string(), cursor.offset.to_string()));
                params.push(("length".to_string(), ajax.page_size.to_string()));
                let payload = self.transport.fetch(&ajax.url, Method::Get, &params).await?;
                Ok(parse_listing(&self.config.site, &payload.body))
            }
            ShardPager::Html { adopted } => {
                let names: Vec<&'static str> = match adopted {
                    Some(name) => vec![*name],
                    None => SHARD_PAGING_NAMES.to_vec(),
                };
                for name in names {
                    let mut params = self.config.site.base_filters();
                    set_param(&mut params, &filter.0, &filter.1);
                    params.push((name.to_string(), page.to_string()));
                    let payload = self
                        .transport
                        .fetch(endpoint_url, Method::Get, &params)
                        .await?;
                    let rows = parse_listing(&self.config.site, &payload.body);
                    if !rows.is_empty() {
                        *adopted = Some(name);
                        return Ok(rows);
                    }
                }
                Ok(Vec::new())
            }
        }
    }

    async fn sleep(&self) {
        let millis = self.config.http.request_sleep_ms;
        if millis > 0 {
            tokio::time::sleep(Duration::from_millis(millis)).await;
        }
    }
}

#[derive(Debug, Clone)]
enum ShardPager {
    Ajax(AjaxConfig),
    Html { adopted: Option<&'static str> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DrainEnd {
    Done,
    CapReached,
}

/// Overwrite a parameter if present (the empty filter set already lists every
/// filter key), else append it.
fn set_param(params: &mut Vec<(String, String)>, name: &str, value: &str) {
    if let Some(entry) = params.iter_mut().find(|(n, _)| n == name) {
        entry.1 = value.to_string();
    } else {
        params.push((name.to_string(), value.to_string()));
    }
}

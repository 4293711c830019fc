// src/pipeline/harvest.rs

//! Harvest orchestration.
//!
//! One run wires the phases together: probe the baseline endpoint, drive
//! linear pagination, fall back to the shard sweep when paging cannot cover
//! the catalog, enrich from detail pages, then persist the snapshot and its
//! changeset against the previous baseline.

use chrono::Utc;
use std::time::Instant;

use crate::error::Result;
use crate::models::{HarvestConfig, RunMeta, StopReason, StrategyTag};
use crate::pipeline::{Accumulator, ChangeSet, CheckpointTracker, compute_diff};
use crate::services::pagination::{PaginationEngine, PaginationOutcome};
use crate::services::prober::EndpointProber;
use crate::services::sweep::{ShardSweepEngine, SweepOutcome};
use crate::services::enrich_records;
use crate::storage::HarvestStorage;
use crate::utils::http::Transport;

/// What a completed run produced.
#[derive(Debug)]
pub struct HarvestReport {
    pub run_id: String,
    pub meta: RunMeta,
    pub changes: ChangeSet,
}

/// Run a full harvest. Only fatal errors abort; checkpoints (when enabled)
/// are written at the configured cadence inside the engine loops and survive
/// the abort for the next `resume` run to seed from.
pub async fn run_harvest(
    config: &HarvestConfig,
    transport: &dyn Transport,
    storage: &dyn HarvestStorage,
    resume: bool,
) -> Result<HarvestReport> {
    let started_at = Utc::now();
    let clock = Instant::now();
    let mut acc = Accumulator::new(config.engine.max_rows);
    let mut checkpoints = CheckpointTracker::new(storage, config.checkpoint.cadence_rows);
    let mut strategy = vec!["baseline-probe"];

    if resume {
        if let Some(rows) = storage.load_checkpoint().await? {
            log::info!("Resuming from checkpoint with {} rows", rows.len());
            for record in rows {
                acc.insert(record);
            }
        }
    }

    let discovery = EndpointProber::new(config, transport).discover().await?;
    for record in discovery.first_page.iter().cloned() {
        acc.insert(record);
        if acc.is_full() {
            break;
        }
    }

    let mut paging_strategy = StrategyTag::default();
    let mut page_outcome = None;
    if let Some(endpoint) = discovery.endpoint {
        if !acc.is_full() {
            let mut engine = PaginationEngine::new(
                config,
                transport,
                endpoint.url(&config.site),
                discovery.method,
                &discovery.first_page,
                &discovery.first_body,
                discovery.page_size,
            );
            let outcome = engine.drive(&mut acc, &mut checkpoints).await?;
            log::info!("Pagination finished: {outcome:?} ({} rows)", acc.len());
            if engine.accepted_key().is_some() {
                strategy.push("linear-paging");
            }
            paging_strategy = engine.strategy_tag();
            page_outcome = Some(outcome);
        }
    }

    // Sweep when paging could not run, could not advance, stalled, or ended
    // without a server-side total while the harvest looks under-delivered.
    let need_sweep = !acc.is_full()
        && match page_outcome {
            None => true,
            Some(PaginationOutcome::Unavailable | PaginationOutcome::Stalled) => true,
            Some(PaginationOutcome::Exhausted { total_known: false }) => {
                acc.len() < config.engine.target_min_rows
            }
            Some(_) => false,
        };

    let mut swept = None;
    if need_sweep {
        log::info!("Falling back to shard sweep at {} rows", acc.len());
        strategy.push("shard-sweep");
        let engine =
            ShardSweepEngine::new(config, transport, discovery.endpoint, discovery.ajax.clone());
        swept = Some(engine.run(&mut acc, &mut checkpoints).await?);
    }

    let stop = if acc.is_full() || swept == Some(SweepOutcome::CapReached) {
        StopReason::CapReached
    } else if swept.is_some() {
        StopReason::SweepComplete
    } else {
        StopReason::Exhausted
    };

    let rows = enrich_records(config, transport, acc.into_rows()).await;

    let meta = RunMeta {
        strategy: strategy.join(" + "),
        baseline_endpoint: discovery.endpoint,
        baseline_method: discovery.method.as_str().to_string(),
        paging_strategy,
        page_size: discovery.page_size,
        rows: rows.len(),
        stop,
        elapsed_secs: clock.elapsed().as_secs_f64(),
        started_at,
    };
    log::info!(
        "Harvest done: {} rows via [{}], stopped: {:?}",
        meta.rows,
        meta.strategy,
        meta.stop
    );

    let baseline = storage.load_baseline().await?;
    let changes = compute_diff(&rows, &baseline);
    if !changes.is_empty() {
        log::info!("Changes vs baseline: {}", changes.summary());
    }

    let run_id = storage.write_run(&rows, &meta).await?;
    storage.stage_changes(&run_id, &changes).await?;
    storage.clear_checkpoint().await?;

    Ok(HarvestReport {
        run_id,
        meta,
        changes,
    })
}

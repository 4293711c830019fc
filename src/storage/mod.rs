// src/storage/mod.rs

//! Storage abstractions for harvest persistence.
//!
//! ## Directory Structure
//!
//! ```text
//! storage/
//! ├── current.json          # Latest complete harvest (diff baseline)
//! ├── checkpoint.json       # In-flight snapshot of an interrupted run
//! ├── runs/                 # Immutable per-run snapshots
//! │   └── 20260829T101500Z.json
//! └── changes/              # Staged changesets, one per run
//!     └── 20260829T101500Z.json
//! ```

pub mod local;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{Record, RunMeta};
use crate::pipeline::ChangeSet;

// Re-export for convenience
pub use local::LocalStorage;

/// A complete harvest with its run metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestSnapshot {
    /// ISO 8601 timestamp of the write
    pub written_at: DateTime<Utc>,
    /// Total record count
    pub count: usize,
    /// Run metadata (strategy, stop reason, timings)
    pub meta: RunMeta,
    /// The record array
    pub rows: Vec<Record>,
}

impl HarvestSnapshot {
    pub fn new(rows: Vec<Record>, meta: RunMeta) -> Self {
        Self {
            written_at: Utc::now(),
            count: rows.len(),
            meta,
            rows,
        }
    }
}

/// A mid-run snapshot written at the checkpoint cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub written_at: DateTime<Utc>,
    pub count: usize,
    pub rows: Vec<Record>,
}

impl Checkpoint {
    pub fn new(rows: Vec<Record>) -> Self {
        Self {
            written_at: Utc::now(),
            count: rows.len(),
            rows,
        }
    }
}

/// Trait for harvest storage backends.
#[async_trait]
pub trait HarvestStorage: Send + Sync {
    /// Write a mid-run checkpoint; returns the storage key written.
    async fn write_checkpoint(&self, rows: &[Record]) -> Result<String>;

    /// Load the rows of the latest checkpoint, if one exists.
    async fn load_checkpoint(&self) -> Result<Option<Vec<Record>>>;

    /// Remove the checkpoint after a run completes.
    async fn clear_checkpoint(&self) -> Result<()>;

    /// Write a completed run snapshot and promote it to `current.json`;
    /// returns the run id.
    async fn write_run(&self, rows: &[Record], meta: &RunMeta) -> Result<String>;

    /// Load the diff baseline from `current.json`, keyed by canonical
    /// identity. Empty when no harvest has completed yet.
    async fn load_baseline(&self) -> Result<HashMap<String, Record>>;

    /// Stage a changeset alongside its run.
    async fn stage_changes(&self, run_id: &str, changes: &ChangeSet) -> Result<()>;
}

// src/pipeline/checkpoint.rs

//! Row-count checkpoint cadence.
//!
//! Engines call [`CheckpointTracker::tick`] at quiescent points inside their
//! accumulation loops (between pages, between shards), so rows gathered
//! before a fatal abort survive for the next resumed run.

use crate::error::Result;
use crate::pipeline::Accumulator;
use crate::storage::HarvestStorage;

/// Writes a checkpoint whenever enough new rows accumulated since the last
/// one. A cadence of 0 disables checkpointing entirely.
pub struct CheckpointTracker<'a> {
    storage: Option<&'a dyn HarvestStorage>,
    cadence: usize,
    last_written: usize,
}

impl<'a> CheckpointTracker<'a> {
    pub fn new(storage: &'a dyn HarvestStorage, cadence: usize) -> Self {
        Self {
            storage: Some(storage),
            cadence,
            last_written: 0,
        }
    }

    /// A tracker that never writes, for engines running without a sink.
    pub fn disabled() -> Self {
        Self {
            storage: None,
            cadence: 0,
            last_written: 0,
        }
    }

    /// Write a checkpoint when the cadence has been reached.
    pub async fn tick(&mut self, acc: &Accumulator) -> Result<()> {
        let Some(storage) = self.storage else {
            return Ok(());
        };
        if self.cadence == 0 || acc.len() < self.last_written + self.cadence {
            return Ok(());
        }
        storage.write_checkpoint(&acc.snapshot()).await?;
        self.last_written = acc.len();
        Ok(())
    }
}

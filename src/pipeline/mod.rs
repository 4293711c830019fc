// src/pipeline/mod.rs

//! Harvest pipeline: accumulation, orchestration, and diffing.

mod accumulator;
mod checkpoint;
mod diff;
mod harvest;

pub use accumulator::Accumulator;
pub use checkpoint::CheckpointTracker;
pub use diff::{AddedChange, ChangeSet, ModifiedChange, RemovedChange, compute_diff};
pub use harvest::{HarvestReport, run_harvest};

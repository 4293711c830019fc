// src/models/mod.rs

//! Domain models for the harvester application.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
pub mod endpoint;
mod record;
mod run;

// Re-export all public types
pub use config::{
    CheckpointConfig, EngineConfig, EnrichConfig, HarvestConfig, HttpConfig, Param, SiteConfig,
    SweepConfig, SweepOrder,
};
pub use endpoint::{
    EndpointCandidate, EndpointRole, PagingCursor, PagingKey, PagingKind, Shard, ShardKind,
    StrategyTag, baseline_candidates, sweep_candidates, PAGING_KEYS,
};
pub use record::{COLUMNS, DETAIL_URL_FIELD, IDENTITY_FIELD, Record};
pub use run::{RunMeta, StopReason};

// src/services/mod.rs

//! Harvesting services: probing, parsing, pagination, sharding, enrichment.

pub mod detail;
pub mod listing;
pub mod pagination;
pub mod prober;
pub mod sweep;

#[cfg(test)]
pub(crate) mod fake;

pub use detail::enrich_records;
pub use listing::{extract_total_entries, parse_listing};
pub use pagination::{PaginationEngine, PaginationOutcome};
pub use prober::{AjaxConfig, Discovery, EndpointProber};
pub use sweep::{ShardSweepEngine, SweepOutcome};

//! Run metadata describing how a harvest ended.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::endpoint::{EndpointRole, StrategyTag};

/// Why a harvest stopped accumulating.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum StopReason {
    /// Linear paging covered the estimated total or hit an empty page
    Exhausted,
    /// The hard row cap was reached
    CapReached,
    /// The shard sweep visited every token
    SweepComplete,
}

/// Metadata persisted alongside every run's rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMeta {
    /// Human-readable strategy path, e.g. "baseline-probe + shard-sweep"
    pub strategy: String,

    /// Endpoint the baseline probe settled on (None when all probes failed)
    pub baseline_endpoint: Option<EndpointRole>,

    /// HTTP method used for the baseline
    pub baseline_method: String,

    /// Paging mechanism the run ended up using
    pub paging_strategy: StrategyTag,

    /// Rows per page observed on page 1
    pub page_size: usize,

    /// Total rows accumulated
    pub rows: usize,

    /// Where the harvest stopped
    pub stop: StopReason,

    /// Wall-clock duration in seconds
    pub elapsed_secs: f64,

    /// When the run started
    pub started_at: DateTime<Utc>,
}

impl Default for RunMeta {
    fn default() -> Self {
        Self {
            strategy: String::new(),
            baseline_endpoint: None,
            baseline_method: "GET".to_string(),
            paging_strategy: StrategyTag::default(),
            page_size: 0,
            rows: 0,
            stop: StopReason::Exhausted,
            elapsed_secs: 0.0,
            started_at: Utc::now(),
        }
    }
}

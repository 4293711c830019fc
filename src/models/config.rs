//! Application configuration structures.
//!
//! One immutable [`HarvestConfig`] is constructed at startup and threaded
//! through every component; nothing reads ambient global state.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HarvestConfig {
    /// HTTP transport behavior
    #[serde(default)]
    pub http: HttpConfig,

    /// Pagination engine policy
    #[serde(default)]
    pub engine: EngineConfig,

    /// Shard sweep policy
    #[serde(default)]
    pub sweep: SweepConfig,

    /// Checkpoint cadence
    #[serde(default)]
    pub checkpoint: CheckpointConfig,

    /// Detail enrichment settings
    #[serde(default)]
    pub enrich: EnrichConfig,

    /// Target site endpoints and filter vocabulary
    #[serde(default)]
    pub site: SiteConfig,
}

impl HarvestConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.http.user_agent.trim().is_empty() {
            return Err(AppError::validation("http.user_agent is empty"));
        }
        if self.http.timeout_secs == 0 {
            return Err(AppError::validation("http.timeout_secs must be > 0"));
        }
        if self.http.retries == 0 {
            return Err(AppError::validation("http.retries must be > 0"));
        }
        if self.engine.stall_limit == 0 {
            return Err(AppError::validation("engine.stall_limit must be > 0"));
        }
        if self.sweep.stall_limit == 0 {
            return Err(AppError::validation("sweep.stall_limit must be > 0"));
        }
        if self.sweep.sample_size == 0 {
            return Err(AppError::validation("sweep.sample_size must be > 0"));
        }
        if self.site.base_url.trim().is_empty() {
            return Err(AppError::validation("site.base_url is empty"));
        }
        url::Url::parse(&self.site.base_url)
            .map_err(|e| AppError::validation(format!("site.base_url is invalid: {e}")))?;
        Ok(())
    }
}

/// HTTP transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Retry attempts per request
    #[serde(default = "defaults::retries")]
    pub retries: u32,

    /// Base backoff between retries in milliseconds (grows linearly)
    #[serde(default = "defaults::retry_backoff")]
    pub retry_backoff_ms: u64,

    /// Politeness sleep between requests in milliseconds
    #[serde(default = "defaults::request_sleep")]
    pub request_sleep_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            retries: defaults::retries(),
            retry_backoff_ms: defaults::retry_backoff(),
            request_sleep_ms: defaults::request_sleep(),
        }
    }
}

/// Pagination engine policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Row count below which linear paging alone is considered insufficient
    #[serde(default = "defaults::target_min_rows")]
    pub target_min_rows: usize,

    /// Hard cap on accumulated rows (0 = unlimited)
    #[serde(default)]
    pub max_rows: usize,

    /// Upper page-count fallback when the total is not shown on page 1
    #[serde(default = "defaults::max_pages_fallback")]
    pub max_pages_fallback: usize,

    /// Consecutive pages with zero new identities before the engine stalls
    #[serde(default = "defaults::stall_limit")]
    pub stall_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            target_min_rows: defaults::target_min_rows(),
            max_rows: 0,
            max_pages_fallback: defaults::max_pages_fallback(),
            stall_limit: defaults::stall_limit(),
        }
    }
}

/// Order in which the two shard spaces are visited.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SweepOrder {
    /// Numeric identity-prefix shards first, then name shards
    #[default]
    IdentityFirst,
    /// Name shards first, then identity-prefix shards
    NameFirst,
}

/// Shard sweep policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Which shard space to try first
    #[serde(default)]
    pub order: SweepOrder,

    /// Maximum pages drained per shard (0 = unbounded)
    #[serde(default)]
    pub per_shard_page_limit: usize,

    /// Consecutive no-new pages before a shard stops draining
    #[serde(default = "defaults::stall_limit")]
    pub stall_limit: usize,

    /// Consecutive fully-empty shards before a group is abandoned
    /// (0 = never stop early; exhaustive coverage is the default)
    #[serde(default)]
    pub max_empty_streak: usize,

    /// Tokens sampled from the preferred space before committing to it
    #[serde(default = "defaults::sample_size")]
    pub sample_size: usize,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            order: SweepOrder::default(),
            per_shard_page_limit: 0,
            stall_limit: defaults::stall_limit(),
            max_empty_streak: 0,
            sample_size: defaults::sample_size(),
        }
    }
}

/// Checkpoint cadence.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CheckpointConfig {
    /// Rows accumulated between checkpoints (0 = disabled)
    #[serde(default)]
    pub cadence_rows: usize,
}

/// Detail enrichment settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichConfig {
    /// Fetch detail pages after harvesting
    #[serde(default = "defaults::enrich_enabled")]
    pub enabled: bool,

    /// Concurrent detail fetches (read-only fan-out)
    #[serde(default = "defaults::enrich_concurrency")]
    pub concurrency: usize,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            enabled: defaults::enrich_enabled(),
            concurrency: defaults::enrich_concurrency(),
        }
    }
}

/// A fixed request parameter sent with every listing fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub value: String,
}

/// Target site endpoints and filter vocabulary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Base URL of the catalog
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Path of the search form page
    #[serde(default = "defaults::form_path")]
    pub form_path: String,

    /// Path of the primary results endpoint
    #[serde(default = "defaults::results_path")]
    pub results_path: String,

    /// Path of the dispatch (session-scoped) endpoint
    #[serde(default = "defaults::dispatch_path")]
    pub dispatch_path: String,

    /// Filter parameter carrying an identity prefix
    #[serde(default = "defaults::identity_filter_key")]
    pub identity_filter_key: String,

    /// Filter parameter carrying a name prefix
    #[serde(default = "defaults::name_filter_key")]
    pub name_filter_key: String,

    /// Filter parameters submitted empty on the baseline query
    #[serde(default = "defaults::filter_keys")]
    pub filter_keys: Vec<String>,

    /// Parameters appended to every listing request
    #[serde(default = "defaults::static_params")]
    pub static_params: Vec<Param>,

    /// URL substrings identifying an interstitial relay page
    #[serde(default = "defaults::relay_markers")]
    pub relay_markers: Vec<String>,

    /// Pin the baseline endpoint, e.g. "results:GET" or "dispatch:POST"
    #[serde(default)]
    pub baseline_override: Option<String>,

    /// Pin the first endpoint tried during shard sweeps
    #[serde(default)]
    pub sweep_endpoint_override: Option<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            form_path: defaults::form_path(),
            results_path: defaults::results_path(),
            dispatch_path: defaults::dispatch_path(),
            identity_filter_key: defaults::identity_filter_key(),
            name_filter_key: defaults::name_filter_key(),
            filter_keys: defaults::filter_keys(),
            static_params: defaults::static_params(),
            relay_markers: defaults::relay_markers(),
            baseline_override: None,
            sweep_endpoint_override: None,
        }
    }
}

impl SiteConfig {
    fn join(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    pub fn form_url(&self) -> String {
        self.join(&self.form_path)
    }

    pub fn results_url(&self) -> String {
        self.join(&self.results_path)
    }

    pub fn dispatch_url(&self) -> String {
        self.join(&self.dispatch_path)
    }

    /// The all-empty filter set plus static parameters.
    pub fn base_filters(&self) -> Vec<(String, String)> {
        let mut params: Vec<(String, String)> = self
            .filter_keys
            .iter()
            .map(|k| (k.clone(), String::new()))
            .collect();
        params.extend(
            self.static_params
                .iter()
                .map(|p| (p.name.clone(), p.value.clone())),
        );
        params
    }

    /// True when the response landed on an unrelated interstitial page.
    pub fn is_relay_bounce(&self, final_url: &str) -> bool {
        self.relay_markers.iter().any(|m| final_url.contains(m))
    }
}

mod defaults {
    use super::Param;

    // HTTP defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; catalog-harvester/1.0)".into()
    }
    pub fn timeout() -> u64 {
        90
    }
    pub fn retries() -> u32 {
        5
    }
    pub fn retry_backoff() -> u64 {
        1200
    }
    pub fn request_sleep() -> u64 {
        80
    }

    // Engine defaults
    pub fn target_min_rows() -> usize {
        2000
    }
    pub fn max_pages_fallback() -> usize {
        100
    }
    pub fn stall_limit() -> usize {
        2
    }
    pub fn sample_size() -> usize {
        3
    }

    // Enrichment defaults
    pub fn enrich_enabled() -> bool {
        true
    }
    pub fn enrich_concurrency() -> usize {
        4
    }

    // Site defaults
    pub fn base_url() -> String {
        "https://catalog.example.org".into()
    }
    pub fn form_path() -> String {
        "/search/?lang=eng".into()
    }
    pub fn results_path() -> String {
        "/search/results".into()
    }
    pub fn dispatch_path() -> String {
        "/search/dispatch".into()
    }
    pub fn identity_filter_key() -> String {
        "number".into()
    }
    pub fn name_filter_key() -> String {
        "name".into()
    }
    pub fn filter_keys() -> Vec<String> {
        vec![
            "number".into(),
            "name".into(),
            "company".into(),
            "ingredient".into(),
        ]
    }
    pub fn static_params() -> Vec<Param> {
        vec![
            Param {
                name: "lang".into(),
                value: "eng".into(),
            },
            Param {
                name: "wbdisable".into(),
                value: "true".into(),
            },
        ]
    }
    pub fn relay_markers() -> Vec<String> {
        vec!["/splash".into(), "interstitial".into()]
    }
}

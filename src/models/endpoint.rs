//! Endpoint roles, paging conventions, and shard spaces.
//!
//! Strategy choices are expressed as data (ordered candidate lists) rather
//! than duplicated code paths; the engines iterate these tables.

use serde::{Deserialize, Serialize};

use crate::models::SiteConfig;
use crate::utils::http::Method;

/// The finite set of known endpoint roles, resolved once during probing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EndpointRole {
    /// Stateless results endpoint accepting filters as query parameters
    Results,
    /// Session-scoped dispatch endpoint (POST establishes filter state)
    Dispatch,
}

impl EndpointRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointRole::Results => "results",
            EndpointRole::Dispatch => "dispatch",
        }
    }

    pub fn url(&self, site: &SiteConfig) -> String {
        match self {
            EndpointRole::Results => site.results_url(),
            EndpointRole::Dispatch => site.dispatch_url(),
        }
    }
}

/// A concrete (role, method) pair to try.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointCandidate {
    pub role: EndpointRole,
    pub method: Method,
}

impl EndpointCandidate {
    pub fn new(role: EndpointRole, method: Method) -> Self {
        Self { role, method }
    }

    /// Parse an override such as "results:GET" or "dispatch:POST".
    pub fn parse_override(spec: &str) -> Option<Self> {
        let (name, method) = spec.split_once(':')?;
        let role = match name.trim().to_ascii_lowercase().as_str() {
            "results" => EndpointRole::Results,
            "dispatch" => EndpointRole::Dispatch,
            _ => return None,
        };
        let method = match method.trim().to_ascii_uppercase().as_str() {
            "GET" => Method::Get,
            "POST" => Method::Post,
            _ => return None,
        };
        Some(Self { role, method })
    }
}

/// Ordered endpoint candidates for the baseline (empty-filter) probe.
pub fn baseline_candidates(site: &SiteConfig) -> Vec<EndpointCandidate> {
    let mut candidates = Vec::new();
    if let Some(spec) = &site.baseline_override {
        if let Some(c) = EndpointCandidate::parse_override(spec) {
            candidates.push(c);
        }
    }
    for role in [EndpointRole::Results, EndpointRole::Dispatch] {
        if !candidates.iter().any(|c| c.role == role) {
            candidates.push(EndpointCandidate::new(role, Method::Get));
        }
    }
    candidates
}

/// Ordered endpoint candidates for filtered shard sweeps:
/// explicit override, then the working baseline, then the remaining default.
pub fn sweep_candidates(site: &SiteConfig, baseline: Option<EndpointRole>) -> Vec<EndpointCandidate> {
    let mut candidates = Vec::new();
    if let Some(spec) = &site.sweep_endpoint_override {
        if let Some(c) = EndpointCandidate::parse_override(spec) {
            candidates.push(c);
        }
    }
    if let Some(role) = baseline {
        if !candidates.iter().any(|c| c.role == role) {
            candidates.push(EndpointCandidate::new(role, Method::Get));
        }
    }
    for role in [EndpointRole::Results, EndpointRole::Dispatch] {
        if !candidates.iter().any(|c| c.role == role) {
            candidates.push(EndpointCandidate::new(role, Method::Get));
        }
    }
    candidates
}

/// How a paging parameter encodes the page to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagingKind {
    /// Parameter carries the 1-based page index
    PageIndex,
    /// Parameter carries the result offset `(page - 1) * page_size`
    Offset,
}

/// One candidate paging-parameter convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagingKey {
    pub name: &'static str,
    pub kind: PagingKind,
}

impl PagingKey {
    /// The parameter for fetching `page` (1-based).
    pub fn param(&self, page: usize, page_size: usize) -> (String, String) {
        let value = match self.kind {
            PagingKind::PageIndex => page,
            PagingKind::Offset => (page - 1) * page_size,
        };
        (self.name.to_string(), value.to_string())
    }
}

/// Candidate paging conventions, tried in order against page 2.
pub const PAGING_KEYS: &[PagingKey] = &[
    PagingKey {
        name: "results_page",
        kind: PagingKind::PageIndex,
    },
    PagingKey {
        name: "page",
        kind: PagingKind::PageIndex,
    },
    PagingKey {
        name: "p",
        kind: PagingKind::PageIndex,
    },
    PagingKey {
        name: "start",
        kind: PagingKind::Offset,
    },
];

/// Which mechanism a cursor is advancing through.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyTag {
    #[default]
    Unknown,
    LinearHtml,
    AjaxJson,
}

impl StrategyTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyTag::Unknown => "unknown",
            StrategyTag::LinearHtml => "linear-html",
            StrategyTag::AjaxJson => "ajax-json",
        }
    }
}

/// Position within a paged listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagingCursor {
    pub strategy: StrategyTag,
    pub page: usize,
    pub offset: usize,
}

impl PagingCursor {
    pub fn new(strategy: StrategyTag, page: usize, page_size: usize) -> Self {
        Self {
            strategy,
            page,
            offset: (page.saturating_sub(1)) * page_size,
        }
    }
}

/// The two shard spaces partitioning the key space.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ShardKind {
    /// Numeric identity-prefix filter
    Identity,
    /// Alphanumeric + symbol name-prefix filter
    Name,
}

impl ShardKind {
    pub fn filter_key<'a>(&self, site: &'a SiteConfig) -> &'a str {
        match self {
            ShardKind::Identity => &site.identity_filter_key,
            ShardKind::Name => &site.name_filter_key,
        }
    }

    /// The full ordered token space for this shard kind.
    pub fn tokens(&self) -> Vec<String> {
        match self {
            ShardKind::Identity => ('0'..='9').map(String::from).collect(),
            ShardKind::Name => {
                let mut tokens: Vec<String> = ('A'..='Z').map(String::from).collect();
                tokens.extend(('0'..='9').map(String::from));
                tokens.extend("()[]{}#&+-,.'/".chars().map(String::from));
                tokens
            }
        }
    }
}

/// A (filter key kind, token) pair identifying one queryable subset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shard {
    pub kind: ShardKind,
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_override() {
        let c = EndpointCandidate::parse_override("results:GET").unwrap();
        assert_eq!(c.role, EndpointRole::Results);
        assert_eq!(c.method, Method::Get);

        let c = EndpointCandidate::parse_override("dispatch:post").unwrap();
        assert_eq!(c.role, EndpointRole::Dispatch);
        assert_eq!(c.method, Method::Post);

        assert!(EndpointCandidate::parse_override("bogus:GET").is_none());
        assert!(EndpointCandidate::parse_override("results").is_none());
    }

    #[test]
    fn test_baseline_candidates_override_first() {
        let mut site = SiteConfig::default();
        site.baseline_override = Some("dispatch:POST".into());
        let candidates = baseline_candidates(&site);
        assert_eq!(candidates[0].role, EndpointRole::Dispatch);
        assert_eq!(candidates[0].method, Method::Post);
        // The other role is still appended once.
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[1].role, EndpointRole::Results);
    }

    #[test]
    fn test_sweep_candidates_baseline_preferred() {
        let site = SiteConfig::default();
        let candidates = sweep_candidates(&site, Some(EndpointRole::Dispatch));
        assert_eq!(candidates[0].role, EndpointRole::Dispatch);
        assert_eq!(candidates[1].role, EndpointRole::Results);
    }

    #[test]
    fn test_paging_key_offset_computation() {
        let start = PagingKey {
            name: "start",
            kind: PagingKind::Offset,
        };
        assert_eq!(start.param(3, 25), ("start".to_string(), "50".to_string()));

        let page = PagingKey {
            name: "page",
            kind: PagingKind::PageIndex,
        };
        assert_eq!(page.param(3, 25), ("page".to_string(), "3".to_string()));
    }

    #[test]
    fn test_shard_token_spaces() {
        assert_eq!(ShardKind::Identity.tokens().len(), 10);
        let name_tokens = ShardKind::Name.tokens();
        assert_eq!(name_tokens.len(), 26 + 10 + 14);
        assert_eq!(name_tokens[0], "A");
        assert_eq!(name_tokens[26], "0");
    }
}

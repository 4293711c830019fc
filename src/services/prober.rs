// src/services/prober.rs

//! Endpoint/strategy prober.
//!
//! Decides, before any harvesting begins, which (endpoint, method) yields a
//! non-empty first page for the all-empty filter set, and extracts embedded
//! AJAX pagination configuration when the page carries one. A probe that
//! fails across every candidate is not an error; it degrades to an empty
//! first page and the caller proceeds straight to sharding.

use scraper::{Html, Selector};
use url::Url;

use crate::error::Result;
use crate::models::{
    EndpointRole, HarvestConfig, Record, baseline_candidates,
};
use crate::services::listing::parse_listing;
use crate::utils::http::{Method, Transport};
use crate::utils::resolve_url;

/// Default rows-per-page assumption when page 1 is empty.
pub const DEFAULT_PAGE_SIZE: usize = 25;

/// AJAX pagination configuration embedded in the first page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AjaxConfig {
    /// Absolute URL of the JSON pagination endpoint
    pub url: String,
    /// Server-side page length
    pub page_size: usize,
}

/// Outcome of the probing phase.
#[derive(Debug)]
pub struct Discovery {
    /// Endpoint that yielded rows (None when every candidate came up empty)
    pub endpoint: Option<EndpointRole>,
    /// Method the winning request used
    pub method: Method,
    /// Parsed rows of page 1
    pub first_page: Vec<Record>,
    /// Raw body of page 1, kept for total-count extraction
    pub first_body: String,
    /// Rows per page as observed on page 1
    pub page_size: usize,
    /// Discovered AJAX pagination endpoint, when present
    pub ajax: Option<AjaxConfig>,
}

/// Probes endpoints with the empty filter set.
pub struct EndpointProber<'a> {
    config: &'a HarvestConfig,
    transport: &'a dyn Transport,
}

impl<'a> EndpointProber<'a> {
    pub fn new(config: &'a HarvestConfig, transport: &'a dyn Transport) -> Self {
        Self { config, transport }
    }

    /// Run the probe sequence. Only fatal transport errors propagate.
    pub async fn discover(&self) -> Result<Discovery> {
        let site = &self.config.site;
        let filters = site.base_filters();

        // The search form's action URL plus its default inputs (CSRF token
        // included) seed the initial POST.
        let (action_url, mut payload) = self.discover_form().await?;
        payload.extend(filters.iter().cloned());

        match self
            .transport
            .fetch(&action_url, Method::Post, &payload)
            .await
        {
            Ok(page) if !site.is_relay_bounce(&page.final_url) => {
                let rows = parse_listing(site, &page.body);
                if !rows.is_empty() {
                    log::info!("Baseline established via form POST ({} rows)", rows.len());
                    return Ok(self.build_discovery(
                        Some(EndpointRole::Results),
                        Method::Post,
                        rows,
                        page.body,
                    ));
                }
            }
            Ok(_) => log::debug!("Form POST bounced to a relay page"),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => log::debug!("Form POST failed: {e}"),
        }

        log::info!("Page 1 is empty; probing endpoints to select baseline");
        for candidate in baseline_candidates(site) {
            self.sleep().await;
            let url = candidate.role.url(site);
            match self.transport.fetch(&url, candidate.method, &filters).await {
                Ok(page) => {
                    if site.is_relay_bounce(&page.final_url) {
                        log::debug!(
                            "Probe {}:{} bounced to relay",
                            candidate.role.as_str(),
                            candidate.method.as_str()
                        );
                        continue;
                    }
                    let rows = parse_listing(site, &page.body);
                    log::debug!(
                        "Probe {}:{} -> {} rows",
                        candidate.role.as_str(),
                        candidate.method.as_str(),
                        rows.len()
                    );
                    if !rows.is_empty() {
                        log::info!("Baseline endpoint selected: {}", candidate.role.as_str());
                        return Ok(self.build_discovery(
                            Some(candidate.role),
                            candidate.method,
                            rows,
                            page.body,
                        ));
                    }
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => log::warn!("Baseline probe {} failed: {e}", candidate.role.as_str()),
            }
        }

        // Pagination unavailable; the sweep engine takes over from here.
        Ok(self.build_discovery(None, Method::Get, Vec::new(), String::new()))
    }

    fn build_discovery(
        &self,
        endpoint: Option<EndpointRole>,
        method: Method,
        first_page: Vec<Record>,
        first_body: String,
    ) -> Discovery {
        let ajax = discover_ajax(&self.config.site.base_url, &first_body);
        let page_size = if !first_page.is_empty() {
            first_page.len()
        } else {
            ajax.as_ref()
                .map(|a| a.page_size)
                .unwrap_or(DEFAULT_PAGE_SIZE)
        };
        Discovery {
            endpoint,
            method,
            first_page,
            first_body,
            page_size,
            ajax,
        }
    }

    /// Scrape the search form for its action URL and default inputs.
    ///
    /// Falls back to the results endpoint with no defaults when the form
    /// page is unreachable or carries no form.
    async fn discover_form(&self) -> Result<(String, Vec<(String, String)>)> {
        let site = &self.config.site;
        let fallback = (site.results_url(), Vec::new());

        let page = match self
            .transport
            .fetch(&site.form_url(), Method::Get, &[])
            .await
        {
            Ok(page) => page,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                log::debug!("Form discovery failed: {e}");
                return Ok(fallback);
            }
        };

        let document = Html::parse_document(&page.body);
        let (Ok(form_sel), Ok(input_sel)) = (Selector::parse("form"), Selector::parse("input"))
        else {
            return Ok(fallback);
        };
        let Some(form) = document.select(&form_sel).next() else {
            return Ok(fallback);
        };

        let base = Url::parse(&site.base_url)?;
        let action = form
            .value()
            .attr("action")
            .map(|href| resolve_url(&base, href))
            .unwrap_or_else(|| site.results_url());

        let mut defaults = Vec::new();
        for input in form.select(&input_sel) {
            let Some(name) = input.value().attr("name") else {
                continue;
            };
            let kind = input.value().attr("type").unwrap_or("").to_lowercase();
            let checked = input.value().attr("checked").is_some();
            if (kind == "checkbox" || kind == "radio") && !checked {
                continue;
            }
            let value = input.value().attr("value").unwrap_or("");
            if !defaults.iter().any(|(n, _): &(String, String)| n == name) {
                defaults.push((name.to_string(), value.to_string()));
            }
        }
        Ok((action, defaults))
    }

    async fn sleep(&self) {
        let millis = self.config.http.request_sleep_ms;
        if millis > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(millis)).await;
        }
    }
}

/// Extract an embedded AJAX pagination endpoint and page length.
pub fn discover_ajax(base_url: &str, body: &str) -> Option<AjaxConfig> {
    let url_rx = regex::Regex::new(r#""ajax"\s*:\s*"([^"]+)""#).ok()?;
    let len_rx = regex::Regex::new(r#""pageLength"\s*:\s*(\d+)"#).ok()?;

    let raw_url = url_rx.captures(body)?.get(1)?.as_str().replace("\\/", "/");
    let base = Url::parse(base_url).ok()?;
    let url = resolve_url(&base, &raw_url);
    let page_size = len_rx
        .captures(body)
        .and_then(|c| c.get(1)?.as_str().parse().ok())
        .unwrap_or(DEFAULT_PAGE_SIZE);

    Some(AjaxConfig { url, page_size })
}

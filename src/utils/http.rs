// src/utils/http.rs

//! Transport adapter: HTTP with bounded retry and backoff.
//!
//! Every component above this layer issues requests through the [`Transport`]
//! trait, so engine tests can substitute an in-memory implementation.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::models::HttpConfig;

/// HTTP method for a listing fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// Response payload plus the URL the request finally landed on.
///
/// The final URL is what relay-bounce detection inspects: a POST that
/// redirects to an interstitial page is treated as zero rows by callers.
#[derive(Debug, Clone)]
pub struct Payload {
    pub body: String,
    pub final_url: String,
}

/// Abstraction over the network layer.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue a request with the given filter/paging parameters.
    ///
    /// GET sends `params` as the query string; POST sends them as form data.
    async fn fetch(&self, url: &str, method: Method, params: &[(String, String)])
    -> Result<Payload>;
}

/// Production transport backed by `reqwest` with connection reuse.
pub struct HttpTransport {
    client: reqwest::Client,
    retries: u32,
    backoff: Duration,
}

impl HttpTransport {
    /// Build a configured client. Timeouts and retry policy come from config,
    /// never from ambient state.
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            retries: config.retries.max(1),
            backoff: Duration::from_millis(config.retry_backoff_ms),
        })
    }

    fn retryable_status(status: reqwest::StatusCode) -> bool {
        status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(
        &self,
        url: &str,
        method: Method,
        params: &[(String, String)],
    ) -> Result<Payload> {
        let mut last: Option<AppError> = None;

        for attempt in 1..=self.retries {
            let request = match method {
                Method::Get => self.client.get(url).query(params),
                Method::Post => self.client.post(url).form(params),
            };

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    let final_url = response.url().to_string();
                    if status.is_success() {
                        let body = response.text().await?;
                        return Ok(Payload { body, final_url });
                    }
                    if !Self::retryable_status(status) {
                        return Err(AppError::harvest(
                            url.to_string(),
                            format!("unexpected status {status}"),
                        ));
                    }
                    last = Some(AppError::harvest(
                        url.to_string(),
                        format!("retryable status {status}"),
                    ));
                }
                Err(e) => {
                    let connect_failure = e.is_connect();
                    last = Some(if connect_failure {
                        AppError::Unreachable(format!("{url}: {e}"))
                    } else {
                        AppError::Http(e)
                    });
                }
            }

            if attempt < self.retries {
                // Linear backoff: 1x, 2x, 3x the base delay.
                tokio::time::sleep(self.backoff * attempt).await;
            }
        }

        Err(last.unwrap_or_else(|| AppError::harvest(url.to_string(), "no attempts made")))
    }
}

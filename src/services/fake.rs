// src/services/fake.rs

//! In-memory transport for engine tests.
//!
//! Rules are matched in order: URL substring, optional method, and a set of
//! parameters that must all be present in the request. Unmatched requests
//! answer with an empty body, which parses as zero rows.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::utils::http::{Method, Payload, Transport};

/// A recorded request for assertions.
#[derive(Debug, Clone)]
pub struct RequestLog {
    pub url: String,
    pub method: Method,
    pub params: Vec<(String, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RuleKind {
    Respond,
    FailTransient,
    Unreachable,
}

/// One canned response.
#[derive(Debug, Clone)]
pub struct Rule {
    url_contains: String,
    method: Option<Method>,
    params: Vec<(String, String)>,
    body: String,
    final_url: Option<String>,
    kind: RuleKind,
}

impl Rule {
    fn new(url_contains: &str, method: Option<Method>) -> Self {
        Self {
            url_contains: url_contains.to_string(),
            method,
            params: Vec::new(),
            body: String::new(),
            final_url: None,
            kind: RuleKind::Respond,
        }
    }

    pub fn get(url_contains: &str) -> Self {
        Self::new(url_contains, Some(Method::Get))
    }

    pub fn post(url_contains: &str) -> Self {
        Self::new(url_contains, Some(Method::Post))
    }

    pub fn any(url_contains: &str) -> Self {
        Self::new(url_contains, None)
    }

    /// Require a parameter to be present in the request.
    pub fn param(mut self, name: &str, value: &str) -> Self {
        self.params.push((name.to_string(), value.to_string()));
        self
    }

    pub fn body(mut self, body: &str) -> Self {
        self.body = body.to_string();
        self
    }

    pub fn final_url(mut self, url: &str) -> Self {
        self.final_url = Some(url.to_string());
        self
    }

    /// Respond with a transient failure (retry budget exhausted).
    pub fn fail(mut self) -> Self {
        self.kind = RuleKind::FailTransient;
        self
    }

    /// Respond with a fatal connectivity failure.
    pub fn unreachable(mut self) -> Self {
        self.kind = RuleKind::Unreachable;
        self
    }

    fn matches(&self, url: &str, method: Method, params: &[(String, String)]) -> bool {
        url.contains(&self.url_contains)
            && self.method.is_none_or(|m| m == method)
            && self.params.iter().all(|p| params.contains(p))
    }
}

/// Scripted transport implementation.
pub struct FakeTransport {
    rules: Vec<Rule>,
    log: Mutex<Vec<RequestLog>>,
}

impl FakeTransport {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self {
            rules,
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn request_count(&self) -> usize {
        self.log.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<RequestLog> {
        self.log.lock().unwrap().clone()
    }

    pub fn requests_to(&self, url_contains: &str) -> Vec<RequestLog> {
        self.requests()
            .into_iter()
            .filter(|r| r.url.contains(url_contains))
            .collect()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn fetch(
        &self,
        url: &str,
        method: Method,
        params: &[(String, String)],
    ) -> Result<Payload> {
        self.log.lock().unwrap().push(RequestLog {
            url: url.to_string(),
            method,
            params: params.to_vec(),
        });

        let Some(rule) = self.rules.iter().find(|r| r.matches(url, method, params)) else {
            return Ok(Payload {
                body: String::new(),
                final_url: url.to_string(),
            });
        };

        match rule.kind {
            RuleKind::Respond => Ok(Payload {
                body: rule.body.clone(),
                final_url: rule
                    .final_url
                    .clone()
                    .unwrap_or_else(|| url.to_string()),
            }),
            RuleKind::FailTransient => {
                Err(AppError::harvest(url.to_string(), "scripted transient failure"))
            }
            RuleKind::Unreachable => Err(AppError::Unreachable(url.to_string())),
        }
    }
}

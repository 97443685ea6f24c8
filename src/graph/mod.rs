pub mod applications;
pub mod auth;
pub mod directory;
#[cfg(test)]
pub(crate) mod mock;
pub mod pagination;

use crate::config::GraphSettings;
use crate::error::{AppVaultError, Result};
use async_trait::async_trait;
use pagination::{ListQuery, Page, PageSource};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

pub const GRAPH_API_BASE: &str = "https://graph.microsoft.com/v1.0";

/// Header required by Graph for advanced (filtered/counted) directory queries
const CONSISTENCY_LEVEL_HEADER: &str = "ConsistencyLevel";

const JITTER_FACTOR: f64 = 0.3; // +/- 30% jitter

/// Retry configuration for transient failures
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 1000,
            max_backoff_ms: 30000,
        }
    }
}

impl From<&GraphSettings> for RetryPolicy {
    fn from(settings: &GraphSettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            initial_backoff_ms: settings.initial_backoff_ms,
            max_backoff_ms: settings.max_backoff_ms,
        }
    }
}

impl RetryPolicy {
    /// No waiting between attempts, for tests against local mock servers
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
        }
    }

    /// Exponential backoff with jitter for the given zero-based attempt
    fn backoff(&self, attempt: u32) -> Duration {
        let base_backoff = self
            .initial_backoff_ms
            .saturating_mul(1u64 << attempt.min(20));
        let capped_backoff = base_backoff.min(self.max_backoff_ms);
        if capped_backoff == 0 {
            return Duration::ZERO;
        }

        let jitter_range = (capped_backoff as f64 * JITTER_FACTOR) as u64;
        let jitter = if jitter_range > 0 {
            use std::hash::{Hash, Hasher};
            let mut hasher = std::collections::hash_map::DefaultHasher::new();
            std::time::SystemTime::now().hash(&mut hasher);
            (hasher.finish() % (jitter_range * 2)) as i64 - jitter_range as i64
        } else {
            0
        };

        Duration::from_millis((capped_backoff as i64 + jitter).max(100) as u64)
    }
}

/// Graph API client with retry support
pub struct GraphClient {
    client: Client,
    access_token: String,
    base_url: String,
    retry: RetryPolicy,
}

impl GraphClient {
    pub fn new(access_token: String) -> Self {
        Self {
            client: Client::new(),
            access_token,
            base_url: GRAPH_API_BASE.to_string(),
            retry: RetryPolicy::default(),
        }
    }

    /// Build a client from the `[graph]` settings table
    pub fn with_settings(access_token: String, settings: &GraphSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs.max(1)))
            .build()?;

        Ok(Self {
            client,
            access_token,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            retry: RetryPolicy::from(settings),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Relative endpoints are joined to the base URL; absolute URLs (nextLink) pass through
    fn resolve_url(&self, endpoint: &str) -> String {
        if endpoint.starts_with("https://") || endpoint.starts_with("http://") {
            endpoint.to_string()
        } else {
            format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
        }
    }

    /// GET with retry for transient failures
    pub async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        let resp = self
            .send(Method::GET, &self.resolve_url(endpoint), None, false)
            .await?;
        Ok(resp.json::<T>().await?)
    }

    /// POST a JSON body. Only throttled (429) responses are retried.
    pub async fn post<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<R> {
        let body = serde_json::to_value(body)?;
        let resp = self
            .send(Method::POST, &self.resolve_url(endpoint), Some(&body), false)
            .await?;
        Ok(resp.json::<R>().await?)
    }

    /// PATCH a JSON body. Graph answers 204 No Content, so nothing is decoded.
    pub async fn patch<B: Serialize + ?Sized>(&self, endpoint: &str, body: &B) -> Result<()> {
        let body = serde_json::to_value(body)?;
        self.send(Method::PATCH, &self.resolve_url(endpoint), Some(&body), false)
            .await?;
        Ok(())
    }

    /// Fetch every page of a list query
    pub async fn get_all<T: DeserializeOwned>(&self, query: &ListQuery) -> Result<Vec<T>> {
        pagination::fetch_all(self, query).await
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        eventual_consistency: bool,
    ) -> Result<reqwest::Response> {
        let idempotent = method == Method::GET;
        let attempts = self.retry.max_retries.max(1);

        for attempt in 0..attempts {
            let is_last = attempt + 1 >= attempts;

            let mut request = self
                .client
                .request(method.clone(), url)
                .bearer_auth(&self.access_token);
            if eventual_consistency {
                request = request.header(CONSISTENCY_LEVEL_HEADER, "eventual");
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            debug!(%method, url, attempt = attempt + 1, "graph request");

            match request.send().await {
                Ok(resp) => {
                    let status = resp.status();

                    // A throttled request was never processed, so even creates may retry
                    if status == StatusCode::TOO_MANY_REQUESTS && !is_last {
                        let wait_time = resp
                            .headers()
                            .get("Retry-After")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .map(Duration::from_secs)
                            .unwrap_or_else(|| self.retry.backoff(attempt));
                        warn!(
                            "Rate limited (429) on {} {}. Retrying in {:?} (attempt {}/{})",
                            method,
                            url,
                            wait_time,
                            attempt + 1,
                            attempts
                        );
                        tokio::time::sleep(wait_time).await;
                        continue;
                    }

                    if status.is_server_error() && idempotent && !is_last {
                        let wait_time = self.retry.backoff(attempt);
                        warn!(
                            "Server error ({}) on GET {}. Retrying in {:?} (attempt {}/{})",
                            status,
                            url,
                            wait_time,
                            attempt + 1,
                            attempts
                        );
                        tokio::time::sleep(wait_time).await;
                        continue;
                    }

                    if !status.is_success() {
                        let error_text = resp.text().await.unwrap_or_default();
                        return Err(AppVaultError::GraphApi {
                            status: status.as_u16(),
                            message: crate::error::enhance_graph_error(&error_text),
                        });
                    }

                    return Ok(resp);
                }
                Err(e) => {
                    if idempotent && !is_last && (e.is_timeout() || e.is_connect()) {
                        let wait_time = self.retry.backoff(attempt);
                        warn!(
                            "Connection error: {}. Retrying in {:?} (attempt {}/{})",
                            e,
                            wait_time,
                            attempt + 1,
                            attempts
                        );
                        tokio::time::sleep(wait_time).await;
                        continue;
                    }
                    return Err(e.into());
                }
            }
        }

        Err(AppVaultError::GraphApi {
            status: 0,
            message: format!("{} {} failed after {} attempts", method, url, attempts),
        })
    }
}

#[async_trait]
impl PageSource for GraphClient {
    async fn get_page(&self, url: &str, eventual_consistency: bool) -> Result<Page<Value>> {
        let resp = self
            .send(Method::GET, &self.resolve_url(url), None, eventual_consistency)
            .await?;
        Ok(resp.json::<Page<Value>>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_url_joins_relative_and_keeps_absolute() {
        let client = GraphClient::new("token".into()).with_base_url("http://localhost:1234/v1.0/");
        assert_eq!(
            client.resolve_url("/applications"),
            "http://localhost:1234/v1.0/applications"
        );
        assert_eq!(
            client.resolve_url("https://graph.microsoft.com/v1.0/applications?$skiptoken=abc"),
            "https://graph.microsoft.com/v1.0/applications?$skiptoken=abc"
        );
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy {
            max_retries: 5,
            initial_backoff_ms: 1000,
            max_backoff_ms: 4000,
        };
        // 4000ms cap plus at most 30% jitter
        assert!(policy.backoff(10) <= Duration::from_millis(5200));
        assert!(policy.backoff(0) >= Duration::from_millis(700));
    }

    #[test]
    fn test_immediate_policy_never_waits() {
        let policy = RetryPolicy::immediate(3);
        assert_eq!(policy.backoff(0), Duration::ZERO);
        assert_eq!(policy.backoff(5), Duration::ZERO);
    }
}

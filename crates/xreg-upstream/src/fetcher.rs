//! Upstream HTTP fetcher (spec §4.7): connection reuse, per-host
//! concurrency cap, retry with full-jitter backoff on connection errors and
//! 5xx, and a response size cap.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use rand::Rng;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

#[derive(Error, Debug, Clone)]
pub enum UpstreamError {
    #[error("upstream request timed out after {0:?}")]
    Timeout(Duration),
    #[error("upstream returned HTTP {status}: {body}")]
    Http { status: u16, body: String },
    #[error("upstream response exceeded the {0} byte cap")]
    TooLarge(u64),
    #[error("upstream returned an unexpected shape: {0}")]
    UnexpectedShape(String),
    #[error("network error contacting upstream: {0}")]
    Network(String),
    #[error("upstream concurrency queue is full")]
    QueueOverflow,
}

impl UpstreamError {
    /// 404s are the only class the metadata cache negative-caches (§4.6).
    pub fn is_not_found(&self) -> bool {
        matches!(self, UpstreamError::Http { status, .. } if *status == 404)
    }

    fn is_retryable(&self) -> bool {
        matches!(
            self,
            UpstreamError::Network(_) | UpstreamError::Timeout(_)
        ) || matches!(self, UpstreamError::Http { status, .. } if *status >= 500)
    }
}

#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub per_host_concurrency: usize,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub base_backoff: Duration,
    pub max_response_bytes: u64,
    /// Bounded waiting set per host; once this many requests are queued for
    /// a saturated host's semaphore, new requests fail fast with
    /// `service-unavailable` rather than queuing indefinitely (spec §5).
    pub max_queued_per_host: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        FetcherConfig {
            per_host_concurrency: 32,
            request_timeout: Duration::from_secs(30),
            max_retries: 3,
            base_backoff: Duration::from_millis(100),
            max_response_bytes: 50 * 1024 * 1024,
            max_queued_per_host: 256,
        }
    }
}

/// HTTP client shared by an adapter's upstream calls: one `reqwest::Client`
/// plus one semaphore per host to bound fan-out.
pub struct Fetcher {
    client: reqwest::Client,
    config: FetcherConfig,
    host_semaphores: DashMap<String, Arc<Semaphore>>,
    host_queued: DashMap<String, Arc<std::sync::atomic::AtomicUsize>>,
}

impl Fetcher {
    pub fn new(config: FetcherConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .expect("reqwest client builds with default TLS backend");
        Fetcher {
            client,
            config,
            host_semaphores: DashMap::new(),
            host_queued: DashMap::new(),
        }
    }

    fn semaphore_for(&self, host: &str) -> Arc<Semaphore> {
        self.host_semaphores
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(self.config.per_host_concurrency)))
            .clone()
    }

    fn queued_counter_for(&self, host: &str) -> Arc<std::sync::atomic::AtomicUsize> {
        self.host_queued
            .entry(host.to_string())
            .or_insert_with(|| Arc::new(std::sync::atomic::AtomicUsize::new(0)))
            .clone()
    }

    /// Fetch and deserialize a JSON document from `url`, with auth header
    /// passthrough, retries, and the response size cap applied.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        bearer: Option<&str>,
    ) -> Result<T, UpstreamError> {
        let bytes = self.get_bytes(url, bearer).await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| UpstreamError::UnexpectedShape(e.to_string()))
    }

    /// Fetch raw bytes, applying the per-host concurrency cap, retry
    /// policy, and size cap (spec §4.7).
    pub async fn get_bytes(&self, url: &str, bearer: Option<&str>) -> Result<bytes::Bytes, UpstreamError> {
        let host = reqwest::Url::parse(url)
            .map(|u| u.host_str().unwrap_or("unknown").to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        let counter = self.queued_counter_for(&host);
        let queued = counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
        let _guard = scopeguard(counter.clone());
        if queued > self.config.max_queued_per_host {
            return Err(UpstreamError::QueueOverflow);
        }

        let semaphore = self.semaphore_for(&host);
        let _permit = semaphore
            .acquire()
            .await
            .expect("semaphore is never closed");

        let mut attempt = 0u32;
        loop {
            match self.try_once(url, bearer).await {
                Ok(bytes) => return Ok(bytes),
                Err(err) if err.is_retryable() && attempt < self.config.max_retries => {
                    let delay = full_jitter_backoff(self.config.base_backoff, attempt);
                    warn!(url, attempt, ?delay, error = %err, "retrying upstream request");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn try_once(&self, url: &str, bearer: Option<&str>) -> Result<bytes::Bytes, UpstreamError> {
        let mut request = self.client.get(url);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                UpstreamError::Timeout(self.config.request_timeout)
            } else {
                UpstreamError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if let Some(len) = response.content_length() {
            if len > self.config.max_response_bytes {
                return Err(UpstreamError::TooLarge(self.config.max_response_bytes));
            }
        }
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::Http {
                status: status.as_u16(),
                body: truncate(&body, 512),
            });
        }
        let bytes = response.bytes().await.map_err(|e| UpstreamError::Network(e.to_string()))?;
        if bytes.len() as u64 > self.config.max_response_bytes {
            return Err(UpstreamError::TooLarge(self.config.max_response_bytes));
        }
        debug!(url, bytes = bytes.len(), "fetched upstream resource");
        Ok(bytes)
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        format!("{}…", &s[..max])
    }
}

/// Full-jitter exponential backoff: `random(0, base * 2^attempt)`, matching
/// spec §4.7's retry policy.
fn full_jitter_backoff(base: Duration, attempt: u32) -> Duration {
    let max = base.saturating_mul(1u32 << attempt.min(10));
    let millis = max.as_millis().max(1) as u64;
    let jittered = rand::thread_rng().gen_range(0..=millis);
    Duration::from_millis(jittered)
}

/// RAII decrement for the per-host queued-request counter.
fn scopeguard(counter: Arc<std::sync::atomic::AtomicUsize>) -> impl Drop {
    struct Guard(Arc<std::sync::atomic::AtomicUsize>);
    impl Drop for Guard {
        fn drop(&mut self) {
            self.0.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
        }
    }
    Guard(counter)
}

/// Collected auth/header configuration an adapter attaches to its fetcher
/// for a specific upstream host. Not currently branched on by `Fetcher`
/// itself (bearer tokens are passed per-call) but kept as a typed record per
/// spec §9's "tagged records over options bags" guidance.
#[derive(Debug, Clone, Default)]
pub struct UpstreamAuth {
    pub bearer_token: Option<String>,
    pub extra_headers: HashMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fetches_json_body() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/pkg")
            .with_status(200)
            .with_body(r#"{"name":"express"}"#)
            .create_async()
            .await;

        let fetcher = Fetcher::new(FetcherConfig::default());
        let url = format!("{}/pkg", server.url());
        let value: serde_json::Value = fetcher.get_json(&url, None).await.unwrap();
        assert_eq!(value["name"], "express");
    }

    #[tokio::test]
    async fn surfaces_404_as_http_error() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/missing")
            .with_status(404)
            .create_async()
            .await;

        let fetcher = Fetcher::new(FetcherConfig::default());
        let url = format!("{}/missing", server.url());
        let err = fetcher.get_bytes(&url, None).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn retries_on_5xx_then_succeeds() {
        let mut server = mockito::Server::new_async().await;
        let _first = server
            .mock("GET", "/flaky")
            .with_status(503)
            .expect(1)
            .create_async()
            .await;
        let _second = server
            .mock("GET", "/flaky")
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;

        let mut config = FetcherConfig::default();
        config.base_backoff = Duration::from_millis(1);
        let fetcher = Fetcher::new(config);
        let url = format!("{}/flaky", server.url());
        let bytes = fetcher.get_bytes(&url, None).await.unwrap();
        assert_eq!(&*bytes, b"{}");
    }

    #[test]
    fn backoff_is_bounded_by_base_times_power_of_two() {
        let base = Duration::from_millis(100);
        for attempt in 0..5 {
            let d = full_jitter_backoff(base, attempt);
            assert!(d <= base * (1u32 << attempt));
        }
    }
}

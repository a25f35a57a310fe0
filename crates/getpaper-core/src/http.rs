use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::StatusCode;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, RETRY_AFTER};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::debug;

use crate::config::Config;
use crate::error::{PaperError, Result};

// ─── RateLimitedClient ────────────────────────────────────────────────────────

/// Shared HTTP session for one invocation. INSPIRE asks clients to stay below
/// a few requests per second, so every request waits for `min_interval`.
pub struct RateLimitedClient {
    client: reqwest::Client,
    min_interval: Duration,
    last_request: Arc<Mutex<Option<Instant>>>,
    max_retries: u32,
}

impl RateLimitedClient {
    pub fn new(
        min_interval: Duration,
        max_retries: u32,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .gzip(true)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            min_interval,
            last_request: Arc::new(Mutex::new(None)),
            max_retries,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.min_interval(),
            config.max_retries,
            &config.user_agent,
            config.timeout(),
        )
    }

    async fn wait_for_rate_limit(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(t) = *last {
            let elapsed = t.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    async fn send(&self, url: &str, headers: HeaderMap) -> Result<reqwest::Response> {
        let mut attempt = 0u32;
        loop {
            self.wait_for_rate_limit().await;
            debug!(url, attempt, "GET");
            let resp = self.client.get(url).headers(headers.clone()).send().await;
            match resp {
                Ok(r) if r.status() == StatusCode::TOO_MANY_REQUESTS => {
                    let wait = r
                        .headers()
                        .get(RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.parse::<u64>().ok())
                        .unwrap_or(60);
                    if attempt >= self.max_retries {
                        return Err(PaperError::RateLimit(url.to_string(), wait));
                    }
                    sleep(Duration::from_secs(wait)).await;
                    attempt += 1;
                }
                Ok(r) if r.status() == StatusCode::NOT_FOUND => {
                    return Err(PaperError::NotFound(url.to_string()));
                }
                Ok(r) if !r.status().is_success() => {
                    let status = r.status().as_u16();
                    return Err(PaperError::Remote(url.to_string(), format!("HTTP {status}")));
                }
                Ok(r) => return Ok(r),
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(PaperError::Http(e));
                    }
                    let backoff = 2u64.pow(attempt);
                    sleep(Duration::from_secs(backoff)).await;
                    attempt += 1;
                }
            }
        }
    }

    pub async fn get(&self, url: &str) -> Result<String> {
        let resp = self.send(url, HeaderMap::new()).await?;
        resp.text().await.map_err(PaperError::Http)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        let text = self.send(url, headers).await?.text().await?;
        serde_json::from_str(&text)
            .map_err(|e| PaperError::MalformedResponse(url.to_string(), e.to_string()))
    }

    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let resp = self.send(url, HeaderMap::new()).await?;
        let bytes = resp.bytes().await?;
        Ok(bytes.to_vec())
    }
}

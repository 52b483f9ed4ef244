use std::collections::HashMap;
use std::time::{Duration, Instant};

use reqwest::Client;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
}

/// Result of a single HTTP fetch. Per-domain politeness is enforced by the
/// crawl queue before a URL is ever handed to the fetcher, so this type has
/// no rate-limiting concerns of its own.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub status_code: u16,
    pub body: String,
    pub headers: HashMap<String, String>,
    pub final_url: String,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub first_byte_time_ms: u64,
    pub load_time_ms: u64,
}

/// Pooled HTTP client shared by all workers within a scan.
#[derive(Clone)]
pub struct PageFetcher {
    client: Client,
}

impl PageFetcher {
    /// `timeout`: per-request timeout. `user_agent`: sent on every request.
    /// `pool_size`: capped at `4 * concurrency` per the resource model.
    pub fn new(timeout: Duration, user_agent: &str, pool_size: usize) -> Self {
        let client = Client::builder()
            .user_agent(user_agent.to_string())
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .gzip(true)
            .pool_max_idle_per_host(pool_size)
            .build()
            .expect("failed to build HTTP client");

        PageFetcher { client }
    }

    pub async fn fetch(&self, url: &str) -> Result<FetchResult, FetchError> {
        let start = Instant::now();
        let response = self.client.get(url).send().await?;
        let first_byte_time_ms = start.elapsed().as_millis() as u64;

        let status_code = response.status().as_u16();
        let final_url = response.url().to_string();

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let content_length = response.content_length();

        let mut headers = HashMap::new();
        for (name, value) in response.headers().iter() {
            if let Ok(v) = value.to_str() {
                headers.insert(name.to_string(), v.to_string());
            }
        }

        let body = response.text().await?;
        let load_time_ms = start.elapsed().as_millis() as u64;

        Ok(FetchResult {
            status_code,
            body,
            headers,
            final_url,
            content_type,
            content_length,
            first_byte_time_ms,
            load_time_ms,
        })
    }
}

//! Headless-browser escalation path for pages that render most of their
//! content with client-side JavaScript.
//!
//! Driving an actual browser engine in-process is out of scope for this
//! crate; instead this follows the renderer pattern already used for
//! JS-heavy link discovery and generalizes it to a full SEO extraction,
//! shelling out to a small out-of-process script that drives headless
//! Chromium and prints its findings as JSON on stdout.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Semaphore;

use crate::crawler::parser::{ExtractedLink, Headings};
use crate::domain::TagMap;

#[derive(Error, Debug)]
pub enum HeadlessError {
    #[error("renderer process failed: {0}")]
    ProcessError(String),
    #[error("renderer timed out after {0}s")]
    Timeout(u64),
    #[error("failed to parse renderer JSON output: {0}")]
    ParseError(String),
    #[error("renderer script reported error: {0}")]
    ScriptError(String),
}

/// Full SEO-signal payload rendered via headless Chromium, mirroring the
/// shape the HTTP fetch path extracts from raw HTML.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub status_code: u16,
    pub final_url: String,
    pub first_byte_time_ms: u64,
    pub title: Option<String>,
    pub meta_description: Option<String>,
    pub canonical_url: Option<String>,
    pub headings: Headings,
    pub links: Vec<ExtractedLink>,
    pub image_count: u32,
    pub js_count: u32,
    pub css_count: u32,
    pub has_robots_noindex: bool,
    pub has_robots_nofollow: bool,
    pub open_graph: TagMap,
    pub twitter_card: TagMap,
    pub structured_data: Vec<serde_json::Value>,
}

#[derive(Debug, serde::Deserialize)]
struct RenderOutput {
    #[serde(default)]
    status_code: Option<u16>,
    #[serde(default)]
    final_url: Option<String>,
    #[serde(default)]
    first_byte_time_ms: Option<u64>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    meta_description: Option<String>,
    #[serde(default)]
    canonical_url: Option<String>,
    #[serde(default)]
    h1: Vec<String>,
    #[serde(default)]
    h2: Vec<String>,
    #[serde(default)]
    h3: Vec<String>,
    #[serde(default)]
    links: Vec<RenderedLinkOut>,
    #[serde(default)]
    image_count: u32,
    #[serde(default)]
    js_count: u32,
    #[serde(default)]
    css_count: u32,
    #[serde(default)]
    has_robots_noindex: bool,
    #[serde(default)]
    has_robots_nofollow: bool,
    #[serde(default)]
    open_graph: TagMap,
    #[serde(default)]
    twitter_card: TagMap,
    #[serde(default)]
    structured_data: Vec<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
struct RenderedLinkOut {
    url: String,
    anchor_text: Option<String>,
    link_type: String,
    is_followed: bool,
}

/// Headless Chromium escalation fetcher.
///
/// Bounded by a semaphore so at most `max_concurrent` renderer processes
/// run at once, independent of the HTTP worker concurrency.
#[derive(Clone)]
pub struct HeadlessFetcher {
    semaphore: Arc<Semaphore>,
    timeout: Duration,
    script_path: String,
    user_agent: String,
}

impl HeadlessFetcher {
    pub fn new(max_concurrent: usize, script_path: String, user_agent: String) -> Self {
        HeadlessFetcher {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            timeout: Duration::from_secs(30),
            script_path,
            user_agent,
        }
    }

    /// Render `url` in a headless Chromium tab at a 1280x800 viewport,
    /// waiting for the network to go mostly idle plus a settle period, then
    /// extract the same SEO signals the HTTP path extracts from raw HTML.
    pub async fn render(&self, url: &str) -> Result<RenderedPage, HeadlessError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| HeadlessError::ProcessError(e.to_string()))?;

        let output = tokio::time::timeout(
            self.timeout,
            tokio::process::Command::new("node")
                .arg(&self.script_path)
                .arg(url)
                .arg("--viewport=1280x800")
                .arg(format!("--user-agent={}", self.user_agent))
                .output(),
        )
        .await
        .map_err(|_| HeadlessError::Timeout(self.timeout.as_secs()))?
        .map_err(|e| HeadlessError::ProcessError(e.to_string()))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let parsed: RenderOutput = serde_json::from_str(&stdout)
            .map_err(|e| HeadlessError::ParseError(format!("{}: {}", e, stdout)))?;

        if let Some(err) = parsed.error {
            return Err(HeadlessError::ScriptError(err));
        }

        let links = parsed
            .links
            .into_iter()
            .map(|l| ExtractedLink {
                url: l.url,
                anchor_text: l.anchor_text,
                link_type: match l.link_type.as_str() {
                    "internal" => crate::domain::LinkType::Internal,
                    "resource" => crate::domain::LinkType::Resource,
                    _ => crate::domain::LinkType::External,
                },
                is_followed: l.is_followed,
            })
            .collect();

        Ok(RenderedPage {
            status_code: parsed.status_code.unwrap_or(200),
            final_url: parsed.final_url.unwrap_or_else(|| url.to_string()),
            first_byte_time_ms: parsed.first_byte_time_ms.unwrap_or(0),
            title: parsed.title,
            meta_description: parsed.meta_description,
            canonical_url: parsed.canonical_url,
            headings: Headings {
                h1: parsed.h1,
                h2: parsed.h2,
                h3: parsed.h3,
            },
            links,
            image_count: parsed.image_count,
            js_count: parsed.js_count,
            css_count: parsed.css_count,
            has_robots_noindex: parsed.has_robots_noindex,
            has_robots_nofollow: parsed.has_robots_nofollow,
            open_graph: parsed.open_graph,
            twitter_card: parsed.twitter_card,
            structured_data: parsed.structured_data,
        })
    }
}

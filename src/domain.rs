//! Persisted entities and the value types shared across the crawl core.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanFrequency {
    Daily,
    Weekly,
    Monthly,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: Uuid,
    pub url: String,
    pub name: String,
    pub notification_email: Option<String>,
    pub scan_frequency: ScanFrequency,
    pub max_pages: Option<u32>,
    pub last_scan_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scan {
    pub id: Uuid,
    pub project_id: Uuid,
    pub status: ScanStatus,
    pub queue_position: Option<i32>,
    pub pages_scanned: i32,
    pub links_scanned: i32,
    pub issues_found: i32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Scan {
    pub fn new(project_id: Uuid, queue_position: i32, now: DateTime<Utc>) -> Self {
        Scan {
            id: Uuid::new_v4(),
            project_id,
            status: ScanStatus::Queued,
            queue_position: Some(queue_position),
            pages_scanned: 0,
            links_scanned: 0,
            issues_found: 0,
            created_at: now,
            started_at: None,
            completed_at: None,
        }
    }
}

/// Open Graph / Twitter Card / JSON-LD style maps keyed without their tag prefix.
pub type TagMap = HashMap<String, String>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub id: Uuid,
    pub project_id: Uuid,
    pub url: String,
    pub title: Option<String>,
    pub h1s: Vec<String>,
    pub h2s: Vec<String>,
    pub h3s: Vec<String>,
    pub meta_description: Option<String>,
    pub canonical_url: Option<String>,
    pub http_status: u16,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub is_indexable: bool,
    pub has_robots_noindex: bool,
    pub has_robots_nofollow: bool,
    pub redirect_url: Option<String>,
    pub load_time_ms: u64,
    pub first_byte_time_ms: Option<u64>,
    pub size_bytes: Option<u64>,
    pub image_count: u32,
    pub js_count: u32,
    pub css_count: u32,
    pub open_graph: TagMap,
    pub twitter_card: TagMap,
    pub structured_data: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanPageSnapshot {
    pub id: Uuid,
    pub scan_id: Uuid,
    pub page_id: Uuid,
    pub project_id: Uuid,
    pub snapshot_data: Page,
    pub issues: Vec<Issue>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkType {
    Internal,
    External,
    Resource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageLink {
    pub id: Uuid,
    pub project_id: Uuid,
    pub source_page_id: Uuid,
    pub destination_url: String,
    pub anchor_text: Option<String>,
    pub link_type: LinkType,
    pub is_followed: bool,
    pub is_broken: Option<bool>,
    pub http_status: Option<u16>,
    pub destination_page_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub id: Uuid,
    pub project_id: Uuid,
    pub scan_id: Uuid,
    pub page_id: Uuid,
    pub issue_type: &'static str,
    pub description: String,
    pub severity: Severity,
    pub is_fixed: bool,
    pub details: Option<serde_json::Value>,
}

/// An item waiting in a scan's crawl queue. Ephemeral — never persisted.
#[derive(Debug, Clone)]
pub struct QueueItem {
    pub url: String,
    pub depth: u32,
    pub priority: u8,
    pub referrer: Option<String>,
    pub added_at: DateTime<Utc>,
}

impl QueueItem {
    pub fn seed(url: String, now: DateTime<Utc>) -> Self {
        QueueItem {
            url,
            depth: 0,
            priority: 100,
            referrer: None,
            added_at: now,
        }
    }

    pub fn discovered(url: String, depth: u32, referrer: String, now: DateTime<Utc>) -> Self {
        let priority = 100u32.saturating_sub(10 * depth).min(100) as u8;
        QueueItem {
            url,
            depth,
            priority,
            referrer: Some(referrer),
            added_at: now,
        }
    }
}

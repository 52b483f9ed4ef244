//! Fire-and-forget notification that a scan finished.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use crate::domain::{Project, Scan};

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_scan_complete(&self, project: &Project, scan: &Scan);
}

#[derive(Serialize)]
struct ScanCompletePayload {
    project_id: uuid::Uuid,
    project_url: String,
    scan_id: uuid::Uuid,
    status: &'static str,
    pages_scanned: i32,
    issues_found: i32,
}

/// Posts a JSON payload to the project's notification email's webhook
/// counterpart — in practice an email-dispatch endpoint fronted by the
/// product's own API, reached with a bearer key.
pub struct HttpNotifier {
    client: reqwest::Client,
    api_key: String,
}

impl HttpNotifier {
    pub fn new(api_key: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("failed to build notifier HTTP client");
        HttpNotifier { client, api_key }
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn send_scan_complete(&self, project: &Project, scan: &Scan) {
        let Some(email) = project.notification_email.clone() else {
            return;
        };

        let payload = ScanCompletePayload {
            project_id: project.id,
            project_url: project.url.clone(),
            scan_id: scan.id,
            status: match scan.status {
                crate::domain::ScanStatus::Completed => "completed",
                crate::domain::ScanStatus::Failed => "failed",
                _ => "unknown",
            },
            pages_scanned: scan.pages_scanned,
            issues_found: scan.issues_found,
        };

        let client = self.client.clone();
        let api_key = self.api_key.clone();

        tokio::spawn(async move {
            let result = client
                .post("https://api.rankriot.app/v1/notifications/scan-complete")
                .bearer_auth(api_key)
                .json(&serde_json::json!({
                    "email": email,
                    "payload": payload,
                }))
                .send()
                .await;

            if let Err(e) = result {
                tracing::warn!(error = %e, "failed to send scan-complete notification");
            }
        });
    }
}

/// No-op notifier used when notifications are disabled.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn send_scan_complete(&self, _project: &Project, _scan: &Scan) {}
}

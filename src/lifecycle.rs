//! Scan lifecycle controller: queues, starts, and finalizes scans while
//! serializing scans per project and exposing queue-position semantics.
//!
//! The active-scan set lives here as a small supervisor with explicit
//! locking rather than scattered module-level state, per the design notes:
//! a project is "active" exactly while a task owns its entry in `active`.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::Config;
use crate::coordinator::{CrawlCoordinator, ScanOutcome};
use crate::domain::{Scan, ScanStatus};
use crate::notifier::Notifier;
use crate::repository::{RepoResult, Repository};

/// Errors `QueueScan` can return to its caller (the HTTP API).
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Repository(#[from] crate::repository::RepositoryError),
}

/// Drives scans for every project through `queued -> in_progress ->
/// {completed, failed}`. One instance per process; shared behind an `Arc`.
pub struct LifecycleController<R> {
    repo: Arc<R>,
    coordinator: Arc<CrawlCoordinator<R>>,
    notifier: Arc<dyn Notifier>,
    /// Project ids with a scan currently being driven by `StartScan`. Guards
    /// against double-starting the same project from two callers racing
    /// `QueueScan` and `ProcessNext`.
    active: Mutex<HashSet<Uuid>>,
}

impl<R> LifecycleController<R>
where
    R: Repository + Send + Sync + 'static,
{
    pub fn new(
        repo: Arc<R>,
        coordinator: Arc<CrawlCoordinator<R>>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        LifecycleController {
            repo,
            coordinator,
            notifier,
            active: Mutex::new(HashSet::new()),
        }
    }

    /// Queue a scan for `project_id`. Assigns `queue_position` from the
    /// count of currently queued/in-progress scans for the project, then
    /// kicks off `StartScan` in the background if nothing is active yet.
    pub async fn queue_scan(self: &Arc<Self>, project_id: Uuid) -> RepoResult<Scan> {
        // Confirms the project exists before queuing work for it.
        self.repo.get_project(project_id).await?;

        let position = self.repo.count_ongoing_scans(project_id).await? as i32;
        let scan = Scan::new(project_id, position, Utc::now());
        self.repo.insert_scan(&scan).await?;

        let this = self.clone();
        let scan_id = scan.id;
        tokio::spawn(async move {
            this.start_scan(scan_id).await;
        });

        Ok(scan)
    }

    /// Idempotently drive `scan_id` to completion. If the scan's project is
    /// already active, this is a no-op (the scan stays `queued` until
    /// `ProcessNext` picks it up after the active scan finishes).
    pub async fn start_scan(self: &Arc<Self>, scan_id: Uuid) {
        let scan = match self.repo.get_scan(scan_id).await {
            Ok(s) => s,
            Err(e) => {
                tracing::error!(scan_id = %scan_id, error = %e, "scan not found at start");
                return;
            }
        };

        {
            let mut active = self.active.lock().await;
            if !active.insert(scan.project_id) {
                return;
            }
        }

        let outcome = self.run_scan(&scan).await;

        {
            let mut active = self.active.lock().await;
            active.remove(&scan.project_id);
        }

        if let Err(e) = outcome {
            tracing::error!(scan_id = %scan_id, error = %e, "scan run failed");
        }

        self.process_next().await;
    }

    /// Transition `queued -> in_progress`, run the coordinator, then
    /// transition to a terminal state. Any error escaping this body is a
    /// "fatal scan error" per the error design: the scan is still marked
    /// `failed` and `ProcessNext` still runs.
    async fn run_scan(&self, scan: &Scan) -> RepoResult<()> {
        self.repo
            .update_scan_status(scan.id, ScanStatus::InProgress)
            .await?;

        let project = match self.repo.get_project(scan.project_id).await {
            Ok(p) => p,
            Err(e) => {
                self.repo
                    .update_scan_status(scan.id, ScanStatus::Failed)
                    .await?;
                return Err(e);
            }
        };

        let outcome = self.coordinator.run(&project, scan.id).await;

        let final_status = match outcome {
            ScanOutcome::Completed | ScanOutcome::Paused => ScanStatus::Completed,
        };
        self.repo.update_scan_status(scan.id, final_status).await?;

        if final_status == ScanStatus::Completed {
            self.repo
                .update_project_last_scan(project.id, Utc::now())
                .await?;
        }

        let finished_scan = self.repo.get_scan(scan.id).await?;
        self.notifier.send_scan_complete(&project, &finished_scan).await;

        Ok(())
    }

    /// Projects due for a scheduled scan at `frequency`, for the scheduler's fan-out tick.
    pub async fn list_projects_by_frequency(
        &self,
        frequency: crate::domain::ScanFrequency,
    ) -> RepoResult<Vec<crate::domain::Project>> {
        self.repo.list_projects_by_frequency(frequency).await
    }

    /// Pop the oldest `queued` scan across the whole system and start it.
    /// Called after every scan finishes so a backlog drains one at a time
    /// per project while different projects proceed concurrently.
    pub async fn process_next(self: &Arc<Self>) {
        let queued = match self.repo.list_queued_scans().await {
            Ok(scans) => scans,
            Err(e) => {
                tracing::error!(error = %e, "failed to list queued scans");
                return;
            }
        };

        let active = self.active.lock().await;
        let next = queued
            .into_iter()
            .find(|s| !active.contains(&s.project_id));
        drop(active);

        if let Some(scan) = next {
            let this = self.clone();
            tokio::spawn(async move {
                this.start_scan(scan.id).await;
            });
        }
    }
}

/// Builds the HTTP timeout/concurrency knobs the coordinator needs from the
/// shared `Config`, kept here so `main.rs` only has to wire one thing.
pub fn build_coordinator<R>(
    repo: Arc<R>,
    config: Arc<Config>,
) -> Arc<CrawlCoordinator<R>>
where
    R: Repository + Send + Sync + 'static,
{
    let fetcher = crate::crawler::PageFetcher::new(
        config.crawler_timeout,
        &config.crawler_user_agent,
        config.crawler_concurrency * 4,
    );
    let headless = crate::crawler::HeadlessFetcher::new(
        config.max_concurrent_renderers,
        config.renderer_script_path.clone(),
        config.crawler_user_agent.clone(),
    );
    let engine = Arc::new(crate::crawler::CrawlEngine::new(fetcher, headless));
    Arc::new(CrawlCoordinator::new(repo, engine, config))
}

//! In-memory repository used by integration tests in place of a live
//! Postgres pool. Mirrors the uniqueness constraints and upsert semantics
//! the real `PostgresRepository` enforces via SQL so the core's behavior
//! under test doesn't depend on which backing store it runs against.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crawler::domain::{Issue, Page, PageLink, Project, Scan, ScanFrequency, ScanStatus};
use crawler::repository::{PageRepository, ProjectRepository, RepoResult, RepositoryError, ScanRepository};

#[derive(Default)]
pub struct InMemoryRepository {
    projects: Mutex<HashMap<Uuid, Project>>,
    scans: Mutex<HashMap<Uuid, Scan>>,
    pages: Mutex<HashMap<(Uuid, String), Page>>,
    snapshots: Mutex<Vec<(Uuid, Uuid, Vec<Issue>)>>,
    links: Mutex<HashMap<(Uuid, String), PageLink>>,
    issues: Mutex<Vec<Issue>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_project(self, project: Project) -> Self {
        self.projects.lock().unwrap().insert(project.id, project);
        self
    }

    pub fn pages_for(&self, project_id: Uuid) -> Vec<Page> {
        self.pages
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.project_id == project_id)
            .cloned()
            .collect()
    }

    pub fn snapshot_count(&self, scan_id: Uuid) -> usize {
        self.snapshots
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _, _)| *s == scan_id)
            .count()
    }

    pub fn issues(&self) -> Vec<Issue> {
        self.issues.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProjectRepository for InMemoryRepository {
    async fn insert_project(&self, project: &Project) -> RepoResult<()> {
        self.projects
            .lock()
            .unwrap()
            .insert(project.id, project.clone());
        Ok(())
    }

    async fn get_project(&self, id: Uuid) -> RepoResult<Project> {
        self.projects
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::ProjectNotFound(id))
    }

    async fn list_projects(&self) -> RepoResult<Vec<Project>> {
        Ok(self.projects.lock().unwrap().values().cloned().collect())
    }

    async fn list_projects_by_frequency(
        &self,
        frequency: ScanFrequency,
    ) -> RepoResult<Vec<Project>> {
        Ok(self
            .projects
            .lock()
            .unwrap()
            .values()
            .filter(|p| p.scan_frequency == frequency)
            .cloned()
            .collect())
    }

    async fn update_project_robots(&self, id: Uuid, _robots_cache: &str) -> RepoResult<()> {
        let _ = self.projects.lock().unwrap().get(&id);
        Ok(())
    }

    async fn update_project_last_scan(&self, id: Uuid, at: DateTime<Utc>) -> RepoResult<()> {
        if let Some(p) = self.projects.lock().unwrap().get_mut(&id) {
            p.last_scan_at = Some(at);
        }
        Ok(())
    }
}

#[async_trait]
impl ScanRepository for InMemoryRepository {
    async fn insert_scan(&self, scan: &Scan) -> RepoResult<()> {
        self.scans.lock().unwrap().insert(scan.id, scan.clone());
        Ok(())
    }

    async fn get_scan(&self, id: Uuid) -> RepoResult<Scan> {
        self.scans
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::ScanNotFound(id))
    }

    async fn update_scan_status(&self, id: Uuid, status: ScanStatus) -> RepoResult<()> {
        let mut scans = self.scans.lock().unwrap();
        let scan = scans.get_mut(&id).ok_or(RepositoryError::ScanNotFound(id))?;
        scan.status = status;
        let now = Utc::now();
        match status {
            ScanStatus::InProgress => {
                scan.started_at = Some(now);
                scan.queue_position = None;
            }
            ScanStatus::Completed | ScanStatus::Failed => {
                scan.completed_at = Some(now);
            }
            ScanStatus::Queued => {}
        }
        Ok(())
    }

    async fn increment_scan_progress(
        &self,
        id: Uuid,
        pages_delta: i32,
        links_delta: i32,
        issues_delta: i32,
    ) -> RepoResult<()> {
        let mut scans = self.scans.lock().unwrap();
        let scan = scans.get_mut(&id).ok_or(RepositoryError::ScanNotFound(id))?;
        scan.pages_scanned += pages_delta;
        scan.links_scanned += links_delta;
        scan.issues_found += issues_delta;
        Ok(())
    }

    async fn list_queued_scans(&self) -> RepoResult<Vec<Scan>> {
        let mut queued: Vec<Scan> = self
            .scans
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.status == ScanStatus::Queued)
            .cloned()
            .collect();
        queued.sort_by_key(|s| s.created_at);
        Ok(queued)
    }

    async fn count_ongoing_scans(&self, project_id: Uuid) -> RepoResult<i64> {
        Ok(self
            .scans
            .lock()
            .unwrap()
            .values()
            .filter(|s| {
                s.project_id == project_id
                    && matches!(s.status, ScanStatus::Queued | ScanStatus::InProgress)
            })
            .count() as i64)
    }

    async fn count_issues_for_scan(&self, scan_id: Uuid) -> RepoResult<i64> {
        Ok(self
            .issues
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.scan_id == scan_id)
            .count() as i64)
    }
}

#[async_trait]
impl PageRepository for InMemoryRepository {
    async fn find_page(&self, project_id: Uuid, url: &str) -> RepoResult<Option<Page>> {
        Ok(self
            .pages
            .lock()
            .unwrap()
            .get(&(project_id, url.to_string()))
            .cloned())
    }

    async fn upsert_page(&self, page: &Page) -> RepoResult<()> {
        self.pages
            .lock()
            .unwrap()
            .insert((page.project_id, page.url.clone()), page.clone());
        Ok(())
    }

    async fn insert_scan_snapshot(
        &self,
        scan_id: Uuid,
        page: &Page,
        issues: &[Issue],
    ) -> RepoResult<()> {
        self.snapshots
            .lock()
            .unwrap()
            .push((scan_id, page.id, issues.to_vec()));
        Ok(())
    }

    async fn upsert_links(&self, links: &[PageLink]) -> RepoResult<()> {
        let mut store = self.links.lock().unwrap();
        for link in links {
            store.insert(
                (link.source_page_id, link.destination_url.clone()),
                link.clone(),
            );
        }
        Ok(())
    }

    async fn insert_issues(&self, issues: &[Issue]) -> RepoResult<()> {
        self.issues.lock().unwrap().extend(issues.iter().cloned());
        Ok(())
    }
}

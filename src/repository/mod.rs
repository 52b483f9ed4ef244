pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{Issue, Page, PageLink, Project, Scan, ScanStatus};

pub use postgres::PostgresRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("project {0} not found")]
    ProjectNotFound(Uuid),
    #[error("scan {0} not found")]
    ScanNotFound(Uuid),
}

pub type RepoResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait ProjectRepository: Send + Sync {
    async fn insert_project(&self, project: &Project) -> RepoResult<()>;
    async fn get_project(&self, id: Uuid) -> RepoResult<Project>;
    async fn list_projects(&self) -> RepoResult<Vec<Project>>;
    async fn list_projects_by_frequency(
        &self,
        frequency: crate::domain::ScanFrequency,
    ) -> RepoResult<Vec<Project>>;
    async fn update_project_robots(&self, id: Uuid, robots_cache: &str) -> RepoResult<()>;
    async fn update_project_last_scan(
        &self,
        id: Uuid,
        at: chrono::DateTime<chrono::Utc>,
    ) -> RepoResult<()>;
}

#[async_trait]
pub trait ScanRepository: Send + Sync {
    async fn insert_scan(&self, scan: &Scan) -> RepoResult<()>;
    async fn get_scan(&self, id: Uuid) -> RepoResult<Scan>;
    async fn update_scan_status(&self, id: Uuid, status: ScanStatus) -> RepoResult<()>;
    async fn increment_scan_progress(
        &self,
        id: Uuid,
        pages_delta: i32,
        links_delta: i32,
        issues_delta: i32,
    ) -> RepoResult<()>;
    async fn list_queued_scans(&self) -> RepoResult<Vec<Scan>>;
    async fn count_ongoing_scans(&self, project_id: Uuid) -> RepoResult<i64>;
    async fn count_issues_for_scan(&self, scan_id: Uuid) -> RepoResult<i64>;
}

#[async_trait]
pub trait PageRepository: Send + Sync {
    async fn find_page(&self, project_id: Uuid, url: &str) -> RepoResult<Option<Page>>;
    async fn upsert_page(&self, page: &Page) -> RepoResult<()>;
    async fn insert_scan_snapshot(&self, scan_id: Uuid, page: &Page, issues: &[Issue]) -> RepoResult<()>;
    async fn upsert_links(&self, links: &[PageLink]) -> RepoResult<()>;
    async fn insert_issues(&self, issues: &[Issue]) -> RepoResult<()>;
}

/// Everything the crawl core and the HTTP API need from persistent storage.
/// One pool-backed type implements all three traits.
pub trait Repository: ProjectRepository + ScanRepository + PageRepository {}
impl<T: ProjectRepository + ScanRepository + PageRepository> Repository for T {}

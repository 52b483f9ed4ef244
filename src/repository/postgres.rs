//! Postgres-backed implementation of the repository traits.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::domain::{
    Issue, LinkType, Page, PageLink, Project, Scan, ScanFrequency, ScanStatus, Severity,
};

use super::{PageRepository, ProjectRepository, RepoResult, RepositoryError, ScanRepository};

#[derive(Clone)]
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        PostgresRepository { pool }
    }
}

fn frequency_str(f: ScanFrequency) -> &'static str {
    match f {
        ScanFrequency::Daily => "daily",
        ScanFrequency::Weekly => "weekly",
        ScanFrequency::Monthly => "monthly",
        ScanFrequency::None => "none",
    }
}

fn frequency_from_str(s: &str) -> ScanFrequency {
    match s {
        "daily" => ScanFrequency::Daily,
        "weekly" => ScanFrequency::Weekly,
        "monthly" => ScanFrequency::Monthly,
        _ => ScanFrequency::None,
    }
}

fn status_str(s: ScanStatus) -> &'static str {
    match s {
        ScanStatus::Queued => "queued",
        ScanStatus::InProgress => "in_progress",
        ScanStatus::Completed => "completed",
        ScanStatus::Failed => "failed",
    }
}

fn status_from_str(s: &str) -> ScanStatus {
    match s {
        "in_progress" => ScanStatus::InProgress,
        "completed" => ScanStatus::Completed,
        "failed" => ScanStatus::Failed,
        _ => ScanStatus::Queued,
    }
}

fn severity_str(s: Severity) -> &'static str {
    match s {
        Severity::Low => "low",
        Severity::Medium => "medium",
        Severity::High => "high",
    }
}

fn link_type_str(t: LinkType) -> &'static str {
    match t {
        LinkType::Internal => "internal",
        LinkType::External => "external",
        LinkType::Resource => "resource",
    }
}

fn row_to_project(row: &sqlx::postgres::PgRow) -> Project {
    Project {
        id: row.get("id"),
        url: row.get("url"),
        name: row.get("name"),
        notification_email: row.get("notification_email"),
        scan_frequency: frequency_from_str(row.get::<String, _>("scan_frequency").as_str()),
        max_pages: row.get::<Option<i32>, _>("max_pages").map(|v| v as u32),
        last_scan_at: row.get("last_scan_at"),
    }
}

fn row_to_scan(row: &sqlx::postgres::PgRow) -> Scan {
    Scan {
        id: row.get("id"),
        project_id: row.get("project_id"),
        status: status_from_str(row.get::<String, _>("status").as_str()),
        queue_position: row.get("queue_position"),
        pages_scanned: row.get("pages_scanned"),
        links_scanned: row.get("links_scanned"),
        issues_found: row.get("issues_found"),
        created_at: row.get("created_at"),
        started_at: row.get("started_at"),
        completed_at: row.get("completed_at"),
    }
}

fn row_to_page(row: &sqlx::postgres::PgRow) -> Page {
    Page {
        id: row.get("id"),
        project_id: row.get("project_id"),
        url: row.get("url"),
        title: row.get("title"),
        h1s: row.get::<Json<Vec<String>>, _>("h1s").0,
        h2s: row.get::<Json<Vec<String>>, _>("h2s").0,
        h3s: row.get::<Json<Vec<String>>, _>("h3s").0,
        meta_description: row.get("meta_description"),
        canonical_url: row.get("canonical_url"),
        http_status: row.get::<i32, _>("http_status") as u16,
        content_type: row.get("content_type"),
        content_length: row.get::<Option<i64>, _>("content_length").map(|v| v as u64),
        is_indexable: row.get("is_indexable"),
        has_robots_noindex: row.get("has_robots_noindex"),
        has_robots_nofollow: row.get("has_robots_nofollow"),
        redirect_url: row.get("redirect_url"),
        load_time_ms: row.get::<i64, _>("load_time_ms") as u64,
        first_byte_time_ms: row
            .get::<Option<i64>, _>("first_byte_time_ms")
            .map(|v| v as u64),
        size_bytes: row.get::<Option<i64>, _>("size_bytes").map(|v| v as u64),
        image_count: row.get::<i32, _>("image_count") as u32,
        js_count: row.get::<i32, _>("js_count") as u32,
        css_count: row.get::<i32, _>("css_count") as u32,
        open_graph: row.get::<Json<_>, _>("open_graph").0,
        twitter_card: row.get::<Json<_>, _>("twitter_card").0,
        structured_data: row.get::<Json<_>, _>("structured_data").0,
    }
}

#[async_trait]
impl ProjectRepository for PostgresRepository {
    async fn insert_project(&self, project: &Project) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO projects (id, url, name, notification_email, scan_frequency, max_pages, last_scan_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(project.id)
        .bind(&project.url)
        .bind(&project.name)
        .bind(&project.notification_email)
        .bind(frequency_str(project.scan_frequency))
        .bind(project.max_pages.map(|v| v as i32))
        .bind(project.last_scan_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_project(&self, id: Uuid) -> RepoResult<Project> {
        let row = sqlx::query(
            r#"SELECT id, url, name, notification_email, scan_frequency, max_pages, last_scan_at
               FROM projects WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::ProjectNotFound(id))?;
        Ok(row_to_project(&row))
    }

    async fn list_projects(&self) -> RepoResult<Vec<Project>> {
        let rows = sqlx::query(
            r#"SELECT id, url, name, notification_email, scan_frequency, max_pages, last_scan_at
               FROM projects ORDER BY name ASC"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_project).collect())
    }

    async fn list_projects_by_frequency(
        &self,
        frequency: ScanFrequency,
    ) -> RepoResult<Vec<Project>> {
        let rows = sqlx::query(
            r#"SELECT id, url, name, notification_email, scan_frequency, max_pages, last_scan_at
               FROM projects WHERE scan_frequency = $1"#,
        )
        .bind(frequency_str(frequency))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_project).collect())
    }

    async fn update_project_robots(&self, id: Uuid, robots_cache: &str) -> RepoResult<()> {
        sqlx::query("UPDATE projects SET robots_txt_cache = $1 WHERE id = $2")
            .bind(robots_cache)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_project_last_scan(&self, id: Uuid, at: DateTime<Utc>) -> RepoResult<()> {
        sqlx::query("UPDATE projects SET last_scan_at = $1 WHERE id = $2")
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ScanRepository for PostgresRepository {
    async fn insert_scan(&self, scan: &Scan) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO scans (id, project_id, status, queue_position, pages_scanned, links_scanned, issues_found, created_at, started_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(scan.id)
        .bind(scan.project_id)
        .bind(status_str(scan.status))
        .bind(scan.queue_position)
        .bind(scan.pages_scanned)
        .bind(scan.links_scanned)
        .bind(scan.issues_found)
        .bind(scan.created_at)
        .bind(scan.started_at)
        .bind(scan.completed_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_scan(&self, id: Uuid) -> RepoResult<Scan> {
        let row = sqlx::query(
            r#"SELECT id, project_id, status, queue_position, pages_scanned, links_scanned,
                      issues_found, created_at, started_at, completed_at
               FROM scans WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::ScanNotFound(id))?;
        Ok(row_to_scan(&row))
    }

    async fn update_scan_status(&self, id: Uuid, status: ScanStatus) -> RepoResult<()> {
        let now = Utc::now();
        match status {
            ScanStatus::InProgress => {
                sqlx::query(
                    "UPDATE scans SET status = $1, started_at = $2, queue_position = NULL WHERE id = $3",
                )
                .bind(status_str(status))
                .bind(now)
                .bind(id)
                .execute(&self.pool)
                .await?;
            }
            ScanStatus::Completed | ScanStatus::Failed => {
                sqlx::query("UPDATE scans SET status = $1, completed_at = $2 WHERE id = $3")
                    .bind(status_str(status))
                    .bind(now)
                    .bind(id)
                    .execute(&self.pool)
                    .await?;
            }
            ScanStatus::Queued => {
                sqlx::query("UPDATE scans SET status = $1 WHERE id = $2")
                    .bind(status_str(status))
                    .bind(id)
                    .execute(&self.pool)
                    .await?;
            }
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
        sqlx::query(
            r#"UPDATE scans
               SET pages_scanned = pages_scanned + $1,
                   links_scanned = links_scanned + $2,
                   issues_found = issues_found + $3
               WHERE id = $4"#,
        )
        .bind(pages_delta)
        .bind(links_delta)
        .bind(issues_delta)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_queued_scans(&self) -> RepoResult<Vec<Scan>> {
        let rows = sqlx::query(
            r#"SELECT id, project_id, status, queue_position, pages_scanned, links_scanned,
                      issues_found, created_at, started_at, completed_at
               FROM scans WHERE status = 'queued' ORDER BY created_at ASC"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(row_to_scan).collect())
    }

    async fn count_ongoing_scans(&self, project_id: Uuid) -> RepoResult<i64> {
        let row = sqlx::query(
            r#"SELECT COUNT(*) as count FROM scans
               WHERE project_id = $1 AND status IN ('queued', 'in_progress')"#,
        )
        .bind(project_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get::<i64, _>("count"))
    }

    async fn count_issues_for_scan(&self, scan_id: Uuid) -> RepoResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM issues WHERE scan_id = $1")
            .bind(scan_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("count"))
    }
}

#[async_trait]
impl PageRepository for PostgresRepository {
    async fn find_page(&self, project_id: Uuid, url: &str) -> RepoResult<Option<Page>> {
        let row = sqlx::query(
            r#"SELECT id, project_id, url, title, h1s, h2s, h3s, meta_description, canonical_url,
                      http_status, content_type, content_length, is_indexable, has_robots_noindex,
                      has_robots_nofollow, redirect_url, load_time_ms, first_byte_time_ms,
                      size_bytes, image_count, js_count, css_count, open_graph, twitter_card, structured_data
               FROM pages WHERE project_id = $1 AND url = $2"#,
        )
        .bind(project_id)
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| row_to_page(&r)))
    }

    async fn upsert_page(&self, page: &Page) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO pages (
                id, project_id, url, title, h1s, h2s, h3s, meta_description, canonical_url,
                http_status, content_type, content_length, is_indexable, has_robots_noindex,
                has_robots_nofollow, redirect_url, load_time_ms, first_byte_time_ms,
                size_bytes, image_count, js_count, css_count, open_graph, twitter_card, structured_data
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25)
            ON CONFLICT (project_id, url) DO UPDATE SET
                title = EXCLUDED.title,
                h1s = EXCLUDED.h1s,
                h2s = EXCLUDED.h2s,
                h3s = EXCLUDED.h3s,
                meta_description = EXCLUDED.meta_description,
                canonical_url = EXCLUDED.canonical_url,
                http_status = EXCLUDED.http_status,
                content_type = EXCLUDED.content_type,
                content_length = EXCLUDED.content_length,
                is_indexable = EXCLUDED.is_indexable,
                has_robots_noindex = EXCLUDED.has_robots_noindex,
                has_robots_nofollow = EXCLUDED.has_robots_nofollow,
                redirect_url = EXCLUDED.redirect_url,
                load_time_ms = EXCLUDED.load_time_ms,
                first_byte_time_ms = EXCLUDED.first_byte_time_ms,
                size_bytes = EXCLUDED.size_bytes,
                image_count = EXCLUDED.image_count,
                js_count = EXCLUDED.js_count,
                css_count = EXCLUDED.css_count,
                open_graph = EXCLUDED.open_graph,
                twitter_card = EXCLUDED.twitter_card,
                structured_data = EXCLUDED.structured_data
            "#,
        )
        .bind(page.id)
        .bind(page.project_id)
        .bind(&page.url)
        .bind(&page.title)
        .bind(Json(&page.h1s))
        .bind(Json(&page.h2s))
        .bind(Json(&page.h3s))
        .bind(&page.meta_description)
        .bind(&page.canonical_url)
        .bind(page.http_status as i32)
        .bind(&page.content_type)
        .bind(page.content_length.map(|v| v as i64))
        .bind(page.is_indexable)
        .bind(page.has_robots_noindex)
        .bind(page.has_robots_nofollow)
        .bind(&page.redirect_url)
        .bind(page.load_time_ms as i64)
        .bind(page.first_byte_time_ms.map(|v| v as i64))
        .bind(page.size_bytes.map(|v| v as i64))
        .bind(page.image_count as i32)
        .bind(page.js_count as i32)
        .bind(page.css_count as i32)
        .bind(Json(&page.open_graph))
        .bind(Json(&page.twitter_card))
        .bind(Json(&page.structured_data))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_scan_snapshot(&self, scan_id: Uuid, page: &Page, issues: &[Issue]) -> RepoResult<()> {
        sqlx::query(
            r#"INSERT INTO scan_page_snapshots (id, scan_id, page_id, project_id, snapshot_data, issues, created_at)
               VALUES ($1, $2, $3, $4, $5, $6, $7)"#,
        )
        .bind(Uuid::new_v4())
        .bind(scan_id)
        .bind(page.id)
        .bind(page.project_id)
        .bind(Json(page))
        .bind(Json(issues))
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_links(&self, links: &[PageLink]) -> RepoResult<()> {
        if links.is_empty() {
            return Ok(());
        }

        let mut qb = sqlx::QueryBuilder::new(
            r#"INSERT INTO page_links (
                id, project_id, source_page_id, destination_url, anchor_text,
                link_type, is_followed, is_broken, http_status, destination_page_id
            ) "#,
        );

        qb.push_values(links, |mut b, link| {
            b.push_bind(link.id)
                .push_bind(link.project_id)
                .push_bind(link.source_page_id)
                .push_bind(&link.destination_url)
                .push_bind(&link.anchor_text)
                .push_bind(link_type_str(link.link_type))
                .push_bind(link.is_followed)
                .push_bind(link.is_broken)
                .push_bind(link.http_status.map(|v| v as i32))
                .push_bind(link.destination_page_id);
        });

        qb.push(
            r#" ON CONFLICT (source_page_id, destination_url) DO UPDATE SET
                anchor_text = EXCLUDED.anchor_text,
                link_type = EXCLUDED.link_type,
                is_followed = EXCLUDED.is_followed,
                is_broken = EXCLUDED.is_broken,
                http_status = EXCLUDED.http_status,
                destination_page_id = EXCLUDED.destination_page_id"#,
        );

        qb.build().execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_issues(&self, issues: &[Issue]) -> RepoResult<()> {
        if issues.is_empty() {
            return Ok(());
        }

        let mut qb = sqlx::QueryBuilder::new(
            r#"INSERT INTO issues (
                id, project_id, scan_id, page_id, issue_type, description, severity, is_fixed, details
            ) "#,
        );

        qb.push_values(issues, |mut b, issue| {
            b.push_bind(issue.id)
                .push_bind(issue.project_id)
                .push_bind(issue.scan_id)
                .push_bind(issue.page_id)
                .push_bind(issue.issue_type)
                .push_bind(&issue.description)
                .push_bind(severity_str(issue.severity))
                .push_bind(issue.is_fixed)
                .push_bind(issue.details.clone());
        });

        qb.build().execute(&self.pool).await?;
        Ok(())
    }
}

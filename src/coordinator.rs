//! Drives a single scan to completion: primes the frontier from the seed URL
//! and its sitemaps, then runs a pool of workers that fetch, analyze, and
//! persist pages until the frontier drains or the page budget is spent.

use std::sync::Arc;

use tokio::task::JoinSet;
use uuid::Uuid;

use crate::config::Config;
use crate::crawler::parser::ExtractedLink;
use crate::crawler::queue::{CrawlQueue, NextResult};
use crate::crawler::robots::RobotsPolicy;
use crate::crawler::{sitemap, CrawlEngine};
use crate::domain::{LinkType, PageLink, Project, QueueItem};
use crate::issues;
use crate::repository::{PageRepository, RepoResult, ScanRepository};


/// Sitemap-discovered URLs are seeded below the project's own root but above
/// ordinary discovered links, so they are crawled early without starving the
/// seed itself.
const SITEMAP_PRIORITY: u8 = 80;
const MAX_SITEMAPS_TO_PROCESS: usize = 5;

pub enum ScanOutcome {
    Completed,
    Paused,
}

pub struct CrawlCoordinator<R> {
    repo: Arc<R>,
    engine: Arc<CrawlEngine>,
    config: Arc<Config>,
}

impl<R> CrawlCoordinator<R>
where
    R: ScanRepository + PageRepository + Send + Sync + 'static,
{
    pub fn new(repo: Arc<R>, engine: Arc<CrawlEngine>, config: Arc<Config>) -> Self {
        CrawlCoordinator {
            repo,
            engine,
            config,
        }
    }

    pub async fn run(&self, project: &Project, scan_id: Uuid) -> ScanOutcome {
        let robots = RobotsPolicy::fetch(&project.url, &self.config.crawler_user_agent)
            .await
            .unwrap_or_default();

        let sitemap_result = sitemap::discover(
            &project.url,
            &robots.sitemaps,
            MAX_SITEMAPS_TO_PROCESS,
        )
        .await;

        let mut queue = CrawlQueue::new(self.config.crawler_delay);
        let now = crate::crawler::queue::now();
        queue.add(QueueItem::seed(project.url.clone(), now));
        for url in sitemap_result.urls {
            queue.add(QueueItem {
                url,
                depth: 0,
                priority: SITEMAP_PRIORITY,
                referrer: None,
                added_at: now,
            });
        }

        let effective_max_pages = project.max_pages.unwrap_or(self.config.crawler_max_pages);
        let max_workers = self.config.crawler_concurrency;
        let mut pages_scanned: u32 = 0;
        let mut paused = false;
        let mut join_set: JoinSet<(String, u32, Result<Vec<ExtractedLink>, String>)> =
            JoinSet::new();

        loop {
            while join_set.len() < max_workers {
                if pages_scanned + join_set.len() as u32 >= effective_max_pages {
                    queue.pause();
                    paused = true;
                    break;
                }

                let default_delay = self.config.crawler_delay;
                let crawl_delay = robots.crawl_delay(&self.config.crawler_user_agent, default_delay);
                let item = match queue.next(|_host| crawl_delay).await {
                    NextResult::Item(item) => item,
                    NextResult::Empty | NextResult::Drained => break,
                };

                if self.config.crawler_respect_robots_txt
                    && !robots.is_allowed(&item.url, &self.config.crawler_user_agent)
                {
                    queue.done(&item.url);
                    continue;
                }

                let engine = self.engine.clone();
                let repo = self.repo.clone();
                let project_id = project.id;
                let url = item.url.clone();
                let depth = item.depth;

                join_set.spawn(async move {
                    let crawl_result = engine.crawl(project_id, &url).await;
                    let outcome = persist_page(
                        repo.as_ref(),
                        project_id,
                        scan_id,
                        crawl_result.page.clone(),
                        crawl_result.links.clone(),
                        crawl_result.fetch_failed,
                    )
                    .await
                    .map(|_| crawl_result.links)
                    .map_err(|e| e.to_string());
                    (url, depth, outcome)
                });
            }

            if join_set.is_empty() {
                break;
            }

            if let Some(result) = join_set.join_next().await {
                match result {
                    Ok((url, depth, Ok(links))) => {
                        pages_scanned += 1;
                        for link in links.into_iter().filter(|l| l.link_type == LinkType::Internal)
                        {
                            queue.add(QueueItem::discovered(
                                link.url,
                                depth + 1,
                                url.clone(),
                                crate::crawler::queue::now(),
                            ));
                        }
                        queue.done(&url);
                    }
                    Ok((url, _, Err(e))) => {
                        tracing::warn!(url = %url, error = %e, "page crawl failed");
                        queue.done(&url);
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "crawl worker task panicked");
                    }
                }
            }
        }

        if paused {
            ScanOutcome::Paused
        } else {
            ScanOutcome::Completed
        }
    }
}

/// Persist one crawled page: upsert the canonical page row, append an
/// immutable per-scan snapshot, upsert its outbound links, record issues, and
/// roll the counts into the scan's running totals.
async fn persist_page<R>(
    repo: &R,
    project_id: Uuid,
    scan_id: Uuid,
    mut page: crate::domain::Page,
    links: Vec<ExtractedLink>,
    fetch_failed: bool,
) -> RepoResult<()>
where
    R: ScanRepository + PageRepository,
{
    if let Some(existing) = repo.find_page(project_id, &page.url).await? {
        page.id = existing.id;
    }

    // Issues are pure over the page and computed up front so the snapshot
    // can embed them, but the insert order below still follows
    // UpsertPage -> InsertScanSnapshot -> UpsertLinks -> InsertIssues -> IncrementScanProgress.
    let issues = issues::analyze(project_id, scan_id, &page, fetch_failed);

    repo.upsert_page(&page).await?;
    repo.insert_scan_snapshot(scan_id, &page, &issues).await?;

    let page_links: Vec<PageLink> = links
        .iter()
        .map(|link| PageLink {
            id: Uuid::new_v4(),
            project_id,
            source_page_id: page.id,
            destination_url: link.url.clone(),
            anchor_text: link.anchor_text.clone(),
            link_type: link.link_type,
            is_followed: link.is_followed,
            is_broken: None,
            http_status: None,
            destination_page_id: None,
        })
        .collect();
    repo.upsert_links(&page_links).await?;

    let issues_count = issues.len() as i32;
    repo.insert_issues(&issues).await?;

    repo.increment_scan_progress(scan_id, 1, page_links.len() as i32, issues_count)
        .await?;

    Ok(())
}

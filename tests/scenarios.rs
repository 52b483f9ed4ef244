//! End-to-end scenario coverage beyond the happy path in `api_integration.rs`:
//! page-budget pausing, an unreachable robots.txt, non-HTML responses, and
//! serialized per-project scan queuing.

mod common;

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::InMemoryRepository;
use crawler::config::Config;
use crawler::coordinator::{CrawlCoordinator, ScanOutcome};
use crawler::domain::{Project, Scan, ScanFrequency};
use crawler::lifecycle::{self, LifecycleController};
use crawler::notifier::NoopNotifier;
use crawler::repository::ScanRepository;

fn test_config() -> Config {
    Config {
        port: 0,
        database_url: "postgres://unused".to_string(),
        notifier_enabled: false,
        notifier_api_key: None,
        shared_queue_url: None,
        shared_queue_token: None,
        crawler_concurrency: 2,
        crawler_timeout: Duration::from_secs(5),
        crawler_delay: Duration::from_millis(0),
        crawler_max_pages: 10,
        crawler_respect_robots_txt: true,
        crawler_user_agent: "TestBot/1.0".to_string(),
        scan_frequency_daily_cron: "0 0 0 * * *".to_string(),
        scan_frequency_weekly_cron: "0 0 0 * * 0".to_string(),
        scan_frequency_monthly_cron: "0 0 0 1 * *".to_string(),
        max_concurrent_renderers: 1,
        renderer_script_path: "/nonexistent/render-page.mjs".to_string(),
    }
}

fn project_for(mock_server: &MockServer) -> Project {
    Project {
        id: Uuid::new_v4(),
        url: mock_server.uri(),
        name: "Example".to_string(),
        notification_email: None,
        scan_frequency: ScanFrequency::None,
        max_pages: None,
        last_scan_at: None,
    }
}

/// S2: a 100-page site with `effective_max_pages=3` stops after exactly three
/// pages and pauses the queue rather than draining it.
#[tokio::test]
async fn page_budget_pauses_queue_before_site_is_exhausted() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;

    // Every page links to the next one in a long chain so the frontier never
    // runs dry on its own within the page budget.
    for i in 0..100 {
        let body = format!(
            "<html><head><title>Page {i}</title></head><body><a href=\"/page/{next}\">next</a></body></html>",
            i = i,
            next = i + 1
        );
        Mock::given(method("GET"))
            .and(path(format!("/page/{i}")))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&mock_server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<html><head><title>Root</title></head><body><a href=\"/page/0\">start</a></body></html>",
        ))
        .mount(&mock_server)
        .await;

    let mut config = test_config();
    config.crawler_max_pages = 3;
    let config = Arc::new(config);

    let project = project_for(&mock_server);
    let repo = Arc::new(InMemoryRepository::new().with_project(project.clone()));
    let engine_coordinator: Arc<CrawlCoordinator<InMemoryRepository>> =
        lifecycle::build_coordinator(repo.clone(), config.clone());

    let scan = Scan::new(project.id, 0, chrono::Utc::now());
    ScanRepository::insert_scan(repo.as_ref(), &scan).await.unwrap();

    let outcome = engine_coordinator.run(&project, scan.id).await;
    assert!(matches!(outcome, ScanOutcome::Paused));

    let scan = ScanRepository::get_scan(repo.as_ref(), scan.id).await.unwrap();
    assert_eq!(scan.pages_scanned, 3);
    assert_eq!(repo.pages_for(project.id).len(), 3);
}

/// S3: robots.txt returning 500 falls back to an open (allow-all) policy and
/// the scan still completes normally.
#[tokio::test]
async fn robots_server_error_falls_back_to_open_policy() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<html><head><title>Home</title></head><body>no links here</body></html>",
        ))
        .mount(&mock_server)
        .await;

    let config = Arc::new(test_config());
    let project = project_for(&mock_server);
    let repo = Arc::new(InMemoryRepository::new().with_project(project.clone()));
    let coordinator = lifecycle::build_coordinator(repo.clone(), config);

    let scan = Scan::new(project.id, 0, chrono::Utc::now());
    ScanRepository::insert_scan(repo.as_ref(), &scan).await.unwrap();

    let outcome = coordinator.run(&project, scan.id).await;
    assert!(matches!(outcome, ScanOutcome::Completed));

    let pages = repo.pages_for(project.id);
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].title.as_deref(), Some("Home"));
}

/// S4: a non-HTML response is persisted with zero images/links and the
/// `non_html_content` issue, and contributes no outbound links to the queue.
#[tokio::test]
async fn non_html_content_type_short_circuits_extraction() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/pdf")
                .set_body_bytes(b"%PDF-1.4".to_vec()),
        )
        .mount(&mock_server)
        .await;

    let config = Arc::new(test_config());
    let project = project_for(&mock_server);
    let repo = Arc::new(InMemoryRepository::new().with_project(project.clone()));
    let coordinator = lifecycle::build_coordinator(repo.clone(), config);

    let scan = Scan::new(project.id, 0, chrono::Utc::now());
    ScanRepository::insert_scan(repo.as_ref(), &scan).await.unwrap();

    coordinator.run(&project, scan.id).await;

    let pages = repo.pages_for(project.id);
    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].image_count, 0);
    assert!(pages[0].content_type.as_deref().unwrap().contains("application/pdf"));

    let issues = repo.issues();
    assert!(issues.iter().any(|i| i.issue_type == "non_html_content"));
}

/// S6: two scans queued back-to-back for the same project never run
/// concurrently — the second stays `queued` with `queue_position=1` until
/// the first reaches a terminal state, then it starts.
#[tokio::test]
async fn scans_for_same_project_never_run_concurrently() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<html><head><title>Home</title></head><body>no links</body></html>",
        ))
        .mount(&mock_server)
        .await;

    let config = Arc::new(test_config());
    let project = project_for(&mock_server);
    let repo = Arc::new(InMemoryRepository::new().with_project(project.clone()));
    let coordinator = lifecycle::build_coordinator(repo.clone(), config);
    let lifecycle_controller = Arc::new(LifecycleController::new(
        repo.clone(),
        coordinator,
        Arc::new(NoopNotifier),
    ));

    let first = lifecycle_controller.queue_scan(project.id).await.unwrap();
    let second = lifecycle_controller.queue_scan(project.id).await.unwrap();

    assert_eq!(first.queue_position, Some(0));
    assert_eq!(second.queue_position, Some(1));

    // Poll until both scans reach a terminal state.
    for _ in 0..100 {
        let f = ScanRepository::get_scan(repo.as_ref(), first.id).await.unwrap();
        let s = ScanRepository::get_scan(repo.as_ref(), second.id).await.unwrap();
        if matches!(f.status, crawler::domain::ScanStatus::Completed | crawler::domain::ScanStatus::Failed)
            && matches!(s.status, crawler::domain::ScanStatus::Completed | crawler::domain::ScanStatus::Failed)
        {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let f = ScanRepository::get_scan(repo.as_ref(), first.id).await.unwrap();
    let s = ScanRepository::get_scan(repo.as_ref(), second.id).await.unwrap();
    assert!(matches!(f.status, crawler::domain::ScanStatus::Completed));
    assert!(matches!(s.status, crawler::domain::ScanStatus::Completed));
    // The second scan only starts once the first vacates the active set, so
    // its own start must not precede the first's completion.
    assert!(s.started_at.unwrap() >= f.completed_at.unwrap());
}

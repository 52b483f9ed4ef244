use std::sync::Arc;

use crawler::config::Config;
use crawler::lifecycle::{self, LifecycleController};
use crawler::notifier::{HttpNotifier, NoopNotifier, Notifier};
use crawler::repository::PostgresRepository;
use crawler::{build_app, scheduler, AppState};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Arc::new(Config::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to load configuration");
        std::process::exit(1);
    }));
    let port = config.port;

    let pool = PgPoolOptions::new()
        .max_connections(config.crawler_concurrency as u32 * 4)
        .connect(&config.database_url)
        .await
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to connect to the database");
            std::process::exit(1);
        });

    if let Err(e) = sqlx::migrate!("./migrations").run(&pool).await {
        tracing::error!(error = %e, "failed to run database migrations");
        std::process::exit(1);
    }

    let repo = Arc::new(PostgresRepository::new(pool));

    let notifier: Arc<dyn Notifier> = if config.notifier_enabled {
        match &config.notifier_api_key {
            Some(key) => Arc::new(HttpNotifier::new(key.clone())),
            None => {
                tracing::warn!("NOTIFIER_ENABLED is true but no API key is configured; disabling");
                Arc::new(NoopNotifier)
            }
        }
    } else {
        Arc::new(NoopNotifier)
    };

    let coordinator = lifecycle::build_coordinator(repo.clone(), config.clone());
    let lifecycle_controller = Arc::new(LifecycleController::new(
        repo.clone(),
        coordinator,
        notifier,
    ));

    // Held for the process lifetime; dropping it would stop the cron ticks.
    let _scheduler = scheduler::start(config.clone(), lifecycle_controller.clone())
        .await
        .unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to start scan scheduler");
            std::process::exit(1);
        });

    let state = AppState {
        config: config.clone(),
        repo,
        lifecycle: lifecycle_controller,
    };

    let app = build_app(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!("Crawler service starting on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app).await.expect("Server error");
}

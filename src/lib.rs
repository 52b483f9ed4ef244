pub mod config;
pub mod coordinator;
pub mod crawler;
pub mod domain;
pub mod issues;
pub mod lifecycle;
pub mod notifier;
pub mod repository;
pub mod scheduler;
pub mod server;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::lifecycle::LifecycleController;
use crate::repository::Repository;

/// Shared application state passed to all Axum handlers. Generic over the
/// repository implementation so the HTTP layer can be exercised in tests
/// against an in-memory fake instead of a live Postgres pool.
pub struct AppState<R: Repository + Send + Sync + 'static> {
    pub config: Arc<Config>,
    pub repo: Arc<R>,
    pub lifecycle: Arc<LifecycleController<R>>,
}

impl<R: Repository + Send + Sync + 'static> Clone for AppState<R> {
    fn clone(&self) -> Self {
        AppState {
            config: self.config.clone(),
            repo: self.repo.clone(),
            lifecycle: self.lifecycle.clone(),
        }
    }
}

pub fn build_app<R>(state: AppState<R>) -> Router
where
    R: Repository + Send + Sync + 'static,
{
    // CORS layer — permissive for the internal service; auth/CORS policy
    // belongs to the outer API gateway, not this core.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/scans", post(server::routes::create_scan))
        .route("/api/scans/{id}", get(server::routes::get_scan_status))
        .route("/health", get(server::routes::health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

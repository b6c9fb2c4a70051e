pub mod api;
pub mod blob;
pub mod config;
pub mod entities;
pub mod error;
pub mod middleware;
pub mod services;

use std::sync::Arc;

use axum::Router;
use sea_orm::DatabaseConnection;
use tower_http::trace::TraceLayer;

use crate::blob::BlobStore;
use crate::config::AppConfig;
use crate::middleware::logging::logging_middleware;

/// Shared handles every router receives through an `Extension`.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
    pub blobs: Arc<dyn BlobStore>,
}

pub fn app(state: AppState) -> Router {
    api::create_api_router(state)
        .layer(axum::middleware::from_fn(logging_middleware))
        .layer(TraceLayer::new_for_http())
}

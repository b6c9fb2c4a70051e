pub mod admin;
pub mod public;
pub mod user;

use axum::Router;
use serde::Deserialize;

use crate::AppState;
use admin::admin_api_router;
use public::{public_api_router, uploads::blob_router};
use user::user_api_router;

/// `?deleted=true` includes soft-deleted rows in admin reads.
#[derive(Deserialize, Debug, Default, Clone, Copy)]
pub struct DeletedQuery {
    #[serde(default)]
    pub deleted: bool,
}

/// `?force=true` turns a soft delete into a permanent one.
#[derive(Deserialize, Debug, Default, Clone, Copy)]
pub struct ForceQuery {
    #[serde(default)]
    pub force: bool,
}

pub fn create_api_router(state: AppState) -> Router {
    let api = Router::new()
        .merge(public_api_router(state.clone()))
        .merge(user_api_router(state.clone()))
        .nest("/admin", admin_api_router(state.clone()));

    Router::new()
        .nest("/api", api)
        .merge(blob_router(state))
}

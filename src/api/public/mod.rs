pub mod auth;
pub mod category;
pub mod product;
pub mod uploads;

use axum::Router;

use crate::AppState;
use auth::auth_router;
use category::category_router;
use product::product_router;
use uploads::uploads_router;

pub fn public_api_router(state: AppState) -> Router {
    Router::new()
        .merge(auth_router(state.clone()))
        .merge(category_router(state.clone()))
        .merge(product_router(state.clone()))
        .merge(uploads_router(state))
}

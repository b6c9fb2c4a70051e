pub mod category;
pub mod discount;
pub mod price;
pub mod product;
pub mod upload;
pub mod users;

use axum::{middleware::from_fn_with_state, Router};

use crate::middleware::auth::{auth_middleware, Access, AuthState};
use crate::AppState;
use category::admin_category_router;
use discount::admin_discount_router;
use price::admin_price_router;
use product::admin_product_router;
use upload::upload_router;
use users::admin_users_router;

pub fn admin_api_router(state: AppState) -> Router {
    Router::new()
        .merge(admin_category_router(state.clone()))
        .merge(admin_product_router(state.clone()))
        .merge(admin_price_router(state.clone()))
        .merge(admin_discount_router(state.clone()))
        .merge(upload_router(state.clone()))
        .merge(admin_users_router(state.clone()))
        .route_layer(from_fn_with_state(
            AuthState {
                state,
                access: Access::SuperUser,
            },
            auth_middleware,
        ))
}

pub mod order;
pub mod profile;

use axum::{middleware::from_fn_with_state, Router};

use crate::middleware::auth::{auth_middleware, Access, AuthState};
use crate::AppState;
use order::order_router;
use profile::profile_router;

pub fn user_api_router(state: AppState) -> Router {
    Router::new()
        .merge(profile_router(state.clone()))
        .merge(order_router(state.clone()))
        .route_layer(from_fn_with_state(
            AuthState {
                state,
                access: Access::Authenticated,
            },
            auth_middleware,
        ))
}

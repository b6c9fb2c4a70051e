use axum::{
    extract::{Extension, Path},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use sea_orm::TransactionTrait;

use crate::entities::user;
use crate::error::CatalogResult;
use crate::services::user::{update_user, view_user, UserPatch};
use crate::AppState;

pub fn profile_router(state: AppState) -> Router {
    Router::new()
        .route("/users/self", get(get_self))
        .route("/users/:id", get(get_user_by_id).put(put_user))
        .layer(Extension(state))
}

async fn get_self(Extension(caller): Extension<user::Model>) -> impl IntoResponse {
    Json(caller)
}

async fn get_user_by_id(
    Path(id): Path<i32>,
    Extension(caller): Extension<user::Model>,
    Extension(state): Extension<AppState>,
) -> CatalogResult<impl IntoResponse> {
    Ok(Json(view_user(&*state.db, &caller, id).await?))
}

async fn put_user(
    Path(id): Path<i32>,
    Extension(caller): Extension<user::Model>,
    Extension(state): Extension<AppState>,
    Json(payload): Json<UserPatch>,
) -> CatalogResult<impl IntoResponse> {
    let txn = state.db.begin().await?;
    let user = update_user(&txn, &caller, id, payload).await?;
    txn.commit().await?;
    Ok(Json(user))
}

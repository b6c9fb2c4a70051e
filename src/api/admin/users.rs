use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
    Json, Router,
};
use sea_orm::TransactionTrait;

use crate::entities::user;
use crate::error::CatalogResult;
use crate::services::{
    pagination::PageQuery,
    user::{delete_user, list_users, UserFilter},
};
use crate::AppState;

pub fn admin_users_router(state: AppState) -> Router {
    Router::new()
        .route("/users", get(get_users))
        .route("/users/:id", delete(admin_delete_user))
        .layer(Extension(state))
}

async fn get_users(
    Query(filter): Query<UserFilter>,
    Query(page): Query<PageQuery>,
    Extension(state): Extension<AppState>,
) -> CatalogResult<impl IntoResponse> {
    Ok(Json(list_users(&*state.db, &filter, &page).await?))
}

async fn admin_delete_user(
    Path(id): Path<i32>,
    Extension(caller): Extension<user::Model>,
    Extension(state): Extension<AppState>,
) -> CatalogResult<impl IntoResponse> {
    let txn = state.db.begin().await?;
    delete_user(&txn, &caller, id).await?;
    txn.commit().await?;
    Ok(StatusCode::NO_CONTENT)
}

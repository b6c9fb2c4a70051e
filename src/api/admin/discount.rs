use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use sea_orm::TransactionTrait;

use crate::api::DeletedQuery;
use crate::error::CatalogResult;
use crate::services::discount::{create_discount, get_discount, DiscountInput};
use crate::AppState;

pub fn admin_discount_router(state: AppState) -> Router {
    Router::new()
        .route("/discount", post(post_discount))
        .route("/discount/:id", get(get_discount_by_id))
        .layer(Extension(state))
}

async fn post_discount(
    Extension(state): Extension<AppState>,
    Json(payload): Json<DiscountInput>,
) -> CatalogResult<impl IntoResponse> {
    let txn = state.db.begin().await?;
    let discount = create_discount(&txn, payload).await?;
    txn.commit().await?;
    Ok((StatusCode::CREATED, Json(discount)))
}

async fn get_discount_by_id(
    Query(params): Query<DeletedQuery>,
    Path(id): Path<i32>,
    Extension(state): Extension<AppState>,
) -> CatalogResult<impl IntoResponse> {
    Ok(Json(get_discount(&*state.db, id, params.deleted).await?))
}

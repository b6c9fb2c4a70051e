use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use sea_orm::TransactionTrait;

use crate::entities::user;
use crate::error::CatalogResult;
use crate::services::order::{
    active_order, add_item, checkout, remove_item, set_item_quantity, AddItemInput,
    QuantityInput,
};
use crate::AppState;

pub fn order_router(state: AppState) -> Router {
    Router::new()
        .route("/order", get(get_order))
        .route("/order/item", post(post_item))
        .route("/order/item/:id", patch(patch_item).delete(delete_item))
        .route("/order/checkout", post(post_checkout))
        .layer(Extension(state))
}

async fn get_order(
    Extension(caller): Extension<user::Model>,
    Extension(state): Extension<AppState>,
) -> CatalogResult<impl IntoResponse> {
    Ok(Json(active_order(&*state.db, &caller).await?))
}

async fn post_item(
    Extension(caller): Extension<user::Model>,
    Extension(state): Extension<AppState>,
    Json(payload): Json<AddItemInput>,
) -> CatalogResult<impl IntoResponse> {
    let txn = state.db.begin().await?;
    let order = add_item(&txn, &caller, payload).await?;
    txn.commit().await?;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn patch_item(
    Path(id): Path<i32>,
    Extension(caller): Extension<user::Model>,
    Extension(state): Extension<AppState>,
    Json(payload): Json<QuantityInput>,
) -> CatalogResult<impl IntoResponse> {
    let txn = state.db.begin().await?;
    let order = set_item_quantity(&txn, &caller, id, payload).await?;
    txn.commit().await?;
    Ok(Json(order))
}

async fn delete_item(
    Path(id): Path<i32>,
    Extension(caller): Extension<user::Model>,
    Extension(state): Extension<AppState>,
) -> CatalogResult<impl IntoResponse> {
    let txn = state.db.begin().await?;
    let order = remove_item(&txn, &caller, id).await?;
    txn.commit().await?;
    Ok(Json(order))
}

async fn post_checkout(
    Extension(caller): Extension<user::Model>,
    Extension(state): Extension<AppState>,
) -> CatalogResult<impl IntoResponse> {
    let txn = state.db.begin().await?;
    let receipt = checkout(&txn, &caller).await?;
    txn.commit().await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

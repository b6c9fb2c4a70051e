use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use sea_orm::TransactionTrait;

use crate::api::{DeletedQuery, ForceQuery};
use crate::error::CatalogResult;
use crate::services::{
    price::{add_product_price, set_active_price, PriceInput},
    product::{
        create_product, delete_product, get_product, product_view, update_product, ProductInput,
        ProductPatch,
    },
};
use crate::AppState;

pub fn admin_product_router(state: AppState) -> Router {
    Router::new()
        .route("/product", post(post_product))
        .route(
            "/product/:id",
            get(admin_get_product)
                .patch(patch_product)
                .delete(admin_delete_product),
        )
        .route("/product/:id/price", post(post_product_price))
        .route(
            "/product/:id/price/:price_id/active",
            put(put_active_price),
        )
        .layer(Extension(state))
}

async fn post_product(
    Extension(state): Extension<AppState>,
    Json(payload): Json<ProductInput>,
) -> CatalogResult<impl IntoResponse> {
    let txn = state.db.begin().await?;
    let product = create_product(&txn, payload).await?;
    let view = product_view(&txn, product).await?;
    txn.commit().await?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn admin_get_product(
    Query(params): Query<DeletedQuery>,
    Path(id): Path<i32>,
    Extension(state): Extension<AppState>,
) -> CatalogResult<impl IntoResponse> {
    let product = get_product(&*state.db, id, params.deleted).await?;
    Ok(Json(product_view(&*state.db, product).await?))
}

async fn patch_product(
    Path(id): Path<i32>,
    Extension(state): Extension<AppState>,
    Json(payload): Json<ProductPatch>,
) -> CatalogResult<impl IntoResponse> {
    let txn = state.db.begin().await?;
    let product = update_product(&txn, id, payload).await?;
    let view = product_view(&txn, product).await?;
    txn.commit().await?;
    Ok(Json(view))
}

async fn admin_delete_product(
    Query(params): Query<ForceQuery>,
    Path(id): Path<i32>,
    Extension(state): Extension<AppState>,
) -> CatalogResult<impl IntoResponse> {
    let txn = state.db.begin().await?;
    delete_product(&txn, id, params.force).await?;
    txn.commit().await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn post_product_price(
    Path(id): Path<i32>,
    Extension(state): Extension<AppState>,
    Json(payload): Json<PriceInput>,
) -> CatalogResult<impl IntoResponse> {
    let txn = state.db.begin().await?;
    let price = add_product_price(&txn, id, payload).await?;
    txn.commit().await?;
    Ok((StatusCode::CREATED, Json(price)))
}

async fn put_active_price(
    Path((id, price_id)): Path<(i32, i32)>,
    Extension(state): Extension<AppState>,
) -> CatalogResult<impl IntoResponse> {
    let txn = state.db.begin().await?;
    let link = set_active_price(&txn, id, price_id).await?;
    txn.commit().await?;
    Ok(Json(link))
}

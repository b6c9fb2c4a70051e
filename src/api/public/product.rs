use axum::{
    extract::{Extension, Path, Query},
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use crate::error::CatalogResult;
use crate::services::{
    pagination::PageQuery,
    product::{get_product, list_products, product_view, ProductFilter},
};
use crate::AppState;

pub fn product_router(state: AppState) -> Router {
    Router::new()
        .route("/product", get(get_products))
        .route("/product/:id", get(get_product_by_id))
        .layer(Extension(state))
}

async fn get_products(
    Query(filter): Query<ProductFilter>,
    Query(page): Query<PageQuery>,
    Extension(state): Extension<AppState>,
) -> CatalogResult<impl IntoResponse> {
    Ok(Json(list_products(&*state.db, &filter, &page).await?))
}

async fn get_product_by_id(
    Path(id): Path<i32>,
    Extension(state): Extension<AppState>,
) -> CatalogResult<impl IntoResponse> {
    let product = get_product(&*state.db, id, false).await?;
    Ok(Json(product_view(&*state.db, product).await?))
}

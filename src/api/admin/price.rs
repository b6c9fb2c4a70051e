use axum::{
    extract::{Extension, Path, Query},
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use crate::api::DeletedQuery;
use crate::error::CatalogResult;
use crate::services::price::price_detail;
use crate::AppState;

pub fn admin_price_router(state: AppState) -> Router {
    Router::new()
        .route("/price/:id", get(get_price))
        .layer(Extension(state))
}

/// The price together with the product, discount or payment it belongs to.
async fn get_price(
    Query(params): Query<DeletedQuery>,
    Path(id): Path<i32>,
    Extension(state): Extension<AppState>,
) -> CatalogResult<impl IntoResponse> {
    Ok(Json(price_detail(&*state.db, id, params.deleted).await?))
}

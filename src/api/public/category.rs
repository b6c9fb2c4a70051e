use axum::{
    extract::{Extension, Path, Query},
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use crate::error::CatalogResult;
use crate::services::{
    category::{category_view, get_category, list_categories, CategoryFilter},
    pagination::PageQuery,
};
use crate::AppState;

pub fn category_router(state: AppState) -> Router {
    Router::new()
        .route("/category", get(get_categories))
        .route("/category/:id", get(get_category_by_id))
        .layer(Extension(state))
}

async fn get_categories(
    Query(filter): Query<CategoryFilter>,
    Query(page): Query<PageQuery>,
    Extension(state): Extension<AppState>,
) -> CatalogResult<impl IntoResponse> {
    let page = list_categories(&*state.db, &filter, &page).await?;
    Ok(Json(page))
}

async fn get_category_by_id(
    Path(id): Path<i32>,
    Extension(state): Extension<AppState>,
) -> CatalogResult<impl IntoResponse> {
    let category = get_category(&*state.db, id, false).await?;
    Ok(Json(category_view(&*state.db, category).await?))
}

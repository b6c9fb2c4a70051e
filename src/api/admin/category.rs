use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use sea_orm::TransactionTrait;

use crate::api::{DeletedQuery, ForceQuery};
use crate::error::CatalogResult;
use crate::services::{
    category::{
        category_view, create_category, delete_category, get_category, update_category,
        CategoryInput, CategoryPatch,
    },
    category_tree::{add_subcategory, remove_subcategory},
};
use crate::AppState;

//ROUTERS
pub fn admin_category_router(state: AppState) -> Router {
    Router::new()
        .route("/category", post(post_category))
        .route(
            "/category/:id",
            get(admin_get_category)
                .patch(patch_category)
                .delete(admin_delete_category),
        )
        .route(
            "/category/:id/sub/:sub_id",
            post(post_subcategory).delete(delete_subcategory),
        )
        .layer(Extension(state))
}

//ROUTES
async fn post_category(
    Extension(state): Extension<AppState>,
    Json(payload): Json<CategoryInput>,
) -> CatalogResult<impl IntoResponse> {
    let txn = state.db.begin().await?;
    let category = create_category(&txn, payload).await?;
    txn.commit().await?;
    Ok((StatusCode::CREATED, Json(category)))
}

async fn admin_get_category(
    Query(params): Query<DeletedQuery>,
    Path(id): Path<i32>,
    Extension(state): Extension<AppState>,
) -> CatalogResult<impl IntoResponse> {
    let category = get_category(&*state.db, id, params.deleted).await?;
    Ok(Json(category_view(&*state.db, category).await?))
}

async fn patch_category(
    Path(id): Path<i32>,
    Extension(state): Extension<AppState>,
    Json(payload): Json<CategoryPatch>,
) -> CatalogResult<impl IntoResponse> {
    let txn = state.db.begin().await?;
    let category = update_category(&txn, id, payload).await?;
    txn.commit().await?;
    Ok(Json(category))
}

async fn admin_delete_category(
    Query(params): Query<ForceQuery>,
    Path(id): Path<i32>,
    Extension(state): Extension<AppState>,
) -> CatalogResult<impl IntoResponse> {
    let txn = state.db.begin().await?;
    delete_category(&txn, id, params.force).await?;
    txn.commit().await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn post_subcategory(
    Path((id, sub_id)): Path<(i32, i32)>,
    Extension(state): Extension<AppState>,
) -> CatalogResult<impl IntoResponse> {
    let txn = state.db.begin().await?;
    let child = add_subcategory(&txn, id, sub_id).await?;
    txn.commit().await?;
    Ok(Json(child))
}

async fn delete_subcategory(
    Path((id, sub_id)): Path<(i32, i32)>,
    Extension(state): Extension<AppState>,
) -> CatalogResult<impl IntoResponse> {
    let txn = state.db.begin().await?;
    let child = remove_subcategory(&txn, id, sub_id).await?;
    txn.commit().await?;
    Ok(Json(child))
}

use axum::{
    extract::{Extension, Multipart, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, post},
    Json, Router,
};

use crate::api::ForceQuery;
use crate::entities::user;
use crate::error::{CatalogError, CatalogResult};
use crate::services::image::{delete_image, upload_image, Upload};
use crate::AppState;

pub fn upload_router(state: AppState) -> Router {
    Router::new()
        .route("/image", post(post_image))
        .route("/image/:id", delete(admin_delete_image))
        .layer(Extension(state))
}

/// Takes the first multipart field that carries a file.
async fn read_upload(multipart: &mut Multipart) -> CatalogResult<Upload> {
    let invalid = |err: axum::extract::multipart::MultipartError| {
        CatalogError::Validation(format!("Multipart error: {err}"))
    };

    while let Some(field) = multipart.next_field().await.map_err(invalid)? {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(invalid)?;

        return Ok(Upload {
            file_name,
            content_type,
            bytes,
        });
    }

    Err(CatalogError::Validation(
        "Request has no file field".to_string(),
    ))
}

async fn post_image(
    Extension(caller): Extension<user::Model>,
    Extension(state): Extension<AppState>,
    mut multipart: Multipart,
) -> CatalogResult<impl IntoResponse> {
    let upload = read_upload(&mut multipart).await?;
    let image = upload_image(&state.db, state.blobs.as_ref(), &caller, upload).await?;
    Ok((StatusCode::CREATED, Json(image)))
}

async fn admin_delete_image(
    Query(params): Query<ForceQuery>,
    Path(id): Path<i32>,
    Extension(state): Extension<AppState>,
) -> CatalogResult<impl IntoResponse> {
    delete_image(&state.db, state.blobs.as_ref(), id, params.force).await?;
    Ok(StatusCode::NO_CONTENT)
}

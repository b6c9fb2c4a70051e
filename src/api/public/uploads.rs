use axum::{
    body::Body,
    extract::{Extension, Path},
    http::{header, HeaderMap, HeaderValue},
    response::IntoResponse,
    routing::get,
    Router,
};
use std::io;
use tokio_util::io::ReaderStream;

use crate::error::{CatalogError, CatalogResult};
use crate::services::image::get_image;
use crate::AppState;

pub fn uploads_router(state: AppState) -> Router {
    Router::new()
        .route("/image/:id", get(print_image))
        .layer(Extension(state))
}

/// Serves the URLs the blob store hands out, outside the `/api` prefix.
pub fn blob_router(state: AppState) -> Router {
    Router::new()
        .route("/uploads/:key", get(print_blob))
        .layer(Extension(state))
}

async fn print_image(
    Path(id): Path<i32>,
    Extension(state): Extension<AppState>,
) -> CatalogResult<impl IntoResponse> {
    let image = get_image(&*state.db, id, false).await?;
    stream_blob(&state, &image.blob_key()).await
}

async fn print_blob(
    Path(key): Path<String>,
    Extension(state): Extension<AppState>,
) -> CatalogResult<impl IntoResponse> {
    stream_blob(&state, &key).await
}

async fn stream_blob(state: &AppState, key: &str) -> CatalogResult<impl IntoResponse> {
    let file = state.blobs.open(key).await.map_err(|err| match err.kind() {
        io::ErrorKind::NotFound | io::ErrorKind::InvalidInput => {
            CatalogError::NotFound(format!("Image {key} not found"))
        }
        _ => CatalogError::Blob(err),
    })?;

    let content_type = mime_guess::from_path(key)
        .first_raw()
        .unwrap_or("application/octet-stream");

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(content_type)
            .unwrap_or(HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_static("inline"),
    );

    Ok((headers, Body::from_stream(ReaderStream::new(file))))
}

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use sea_orm::TransactionTrait;
use serde::Serialize;

use crate::entities::user;
use crate::error::CatalogResult;
use crate::middleware::auth::{authenticate, generate_token};
use crate::services::user::{create_guest, login, register, LoginInput, RegisterInput};
use crate::AppState;

pub fn auth_router(state: AppState) -> Router {
    Router::new()
        .route("/auth/register", post(register_user))
        .route("/auth/login", post(login_user))
        .route("/users", post(create_guest_user))
        .layer(Extension(state))
}

#[derive(Serialize, Debug)]
pub struct AuthResponse {
    pub token: String,
    pub user: user::Model,
}

/// A request carrying a guest token upgrades that guest instead of creating
/// a second account.
async fn register_user(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
    Json(payload): Json<RegisterInput>,
) -> CatalogResult<impl IntoResponse> {
    let caller = authenticate(&state, &headers).await?;

    let txn = state.db.begin().await?;
    let user = register(&txn, payload, caller.as_ref()).await?;
    txn.commit().await?;

    let token = generate_token(&user, &state.config)?;
    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

async fn login_user(
    Extension(state): Extension<AppState>,
    Json(payload): Json<LoginInput>,
) -> CatalogResult<impl IntoResponse> {
    let user = login(&*state.db, &payload).await?;
    let token = generate_token(&user, &state.config)?;
    Ok(Json(AuthResponse { token, user }))
}

async fn create_guest_user(
    Extension(state): Extension<AppState>,
) -> CatalogResult<impl IntoResponse> {
    let txn = state.db.begin().await?;
    let user = create_guest(&txn).await?;
    txn.commit().await?;

    let token = generate_token(&user, &state.config)?;
    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

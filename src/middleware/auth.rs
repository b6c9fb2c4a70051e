use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::EntityTrait;
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::entities::user;
use crate::error::{CatalogError, CatalogResult};
use crate::AppState;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i32,
    pub role: String,
    pub exp: usize,
}

/// Who may pass a guarded router.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    Authenticated,
    SuperUser,
}

#[derive(Clone)]
pub struct AuthState {
    pub state: AppState,
    pub access: Access,
}

/// Resolves the bearer token to a user and stores the `user::Model` in the
/// request extensions.
pub async fn auth_middleware(
    State(auth): State<AuthState>,
    mut req: Request,
    next: Next,
) -> CatalogResult<Response> {
    let user = authenticate(&auth.state, req.headers())
        .await?
        .ok_or_else(|| CatalogError::Unauthorized("Missing bearer token".to_string()))?;

    if auth.access == Access::SuperUser && !user.is_super_user() {
        return Err(CatalogError::Forbidden(
            "Administrator access required".to_string(),
        ));
    }

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// `Ok(None)` when no bearer token was sent; a bad token is an error.
pub async fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
) -> CatalogResult<Option<user::Model>> {
    let Some(auth_header) = headers.get(header::AUTHORIZATION) else {
        return Ok(None);
    };
    let token = auth_header
        .to_str()
        .ok()
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| CatalogError::Unauthorized("Malformed authorization header".to_string()))?;

    let claims = validate_token(token, &state.config.secret)?;

    let user = user::Entity::find_by_id(claims.user_id)
        .one(&*state.db)
        .await?
        .ok_or_else(|| CatalogError::Unauthorized("Invalid user or role".to_string()))?;
    if user.role.to_string() != claims.role {
        return Err(CatalogError::Unauthorized(
            "Invalid user or role".to_string(),
        ));
    }

    Ok(Some(user))
}

pub fn generate_token(user: &user::Model, config: &AppConfig) -> CatalogResult<String> {
    let exp = Utc::now()
        .checked_add_signed(Duration::hours(config.token_ttl_hours))
        .ok_or_else(|| CatalogError::Internal("Token expiry overflow".to_string()))?
        .timestamp() as usize;

    let claims = Claims {
        user_id: user.id,
        role: user.role.to_string(),
        exp,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(|e| CatalogError::Internal(format!("Failed to generate token: {e}")))
}

pub fn validate_token(token: &str, secret: &str) -> CatalogResult<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map(|data| data.claims)
    .map_err(|_| CatalogError::Unauthorized("Invalid or expired token".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::user::Role;
    use std::path::PathBuf;

    fn config() -> AppConfig {
        AppConfig {
            database_url: "sqlite::memory:".to_string(),
            secret: "test-secret".to_string(),
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            upload_dir: PathBuf::from("uploads"),
            public_url: "http://localhost".to_string(),
            token_ttl_hours: 1,
            owner: None,
        }
    }

    fn user() -> user::Model {
        user::Model {
            id: 7,
            username: Some("keeper".to_string()),
            email: None,
            password: None,
            role: Role::Admin,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn token_carries_user_and_role() {
        let config = config();
        let token = generate_token(&user(), &config).unwrap();
        let claims = validate_token(&token, &config.secret).unwrap();
        assert_eq!(claims.user_id, 7);
        assert_eq!(claims.role, "admin");
    }

    #[test]
    fn token_signed_with_another_secret_is_rejected() {
        let token = generate_token(&user(), &config()).unwrap();
        let err = validate_token(&token, "other-secret").unwrap_err();
        assert!(matches!(err, CatalogError::Unauthorized(_)));
    }
}

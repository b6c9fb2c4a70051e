use argon2::{
    password_hash::{PasswordHasher, SaltString},
    Argon2,
};
use chrono::Utc;
use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use regex::Regex;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseTransaction, EntityTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use validator::Validate;

use crate::entities::user::{self, Role};
use crate::error::{CatalogError, CatalogResult};
use crate::services::pagination::{fetch_page, Page, PageQuery};

static USERNAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.\-]{4,32}$").unwrap());

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)?
        .to_string();

    Ok(password_hash)
}

#[derive(Deserialize, Clone, Debug, Validate)]
pub struct RegisterInput {
    #[validate(regex(
        path = *USERNAME_REGEX,
        message = "Username must be 4 to 32 letters, digits, '_', '.' or '-'"
    ))]
    pub username: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 8, max = 128, message = "Password must be 8 to 128 characters"))]
    pub password: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct LoginInput {
    /// Username or email.
    pub identifier: String,
    pub password: String,
}

#[derive(Deserialize, Clone, Debug, Default, Validate)]
pub struct UserPatch {
    #[validate(regex(
        path = *USERNAME_REGEX,
        message = "Username must be 4 to 32 letters, digits, '_', '.' or '-'"
    ))]
    pub username: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    pub role: Option<Role>,
}

#[derive(Deserialize, Clone, Debug, Default)]
pub struct UserFilter {
    pub role: Option<Role>,
    pub username: Option<String>,
    pub email: Option<String>,
}

pub async fn get_user<C: ConnectionTrait>(db: &C, id: i32) -> CatalogResult<user::Model> {
    user::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| CatalogError::not_found("User", id))
}

/// `get_user` for callers that are not super users: they only see themselves.
pub async fn view_user<C: ConnectionTrait>(
    db: &C,
    requester: &user::Model,
    id: i32,
) -> CatalogResult<user::Model> {
    if !requester.is_super_user() && requester.id != id {
        return Err(CatalogError::Forbidden(
            "You can only view your own account".to_string(),
        ));
    }
    get_user(db, id).await
}

pub async fn list_users<C: ConnectionTrait>(
    db: &C,
    filter: &UserFilter,
    page: &PageQuery,
) -> CatalogResult<Page<user::Model>> {
    let mut select = user::Entity::find();
    if let Some(role) = filter.role {
        select = select.filter(user::Column::Role.eq(role));
    }
    if let Some(username) = filter.username.as_deref().filter(|u| !u.is_empty()) {
        select = select.filter(user::Column::Username.contains(username));
    }
    if let Some(email) = filter.email.as_deref().filter(|e| !e.is_empty()) {
        select = select.filter(user::Column::Email.contains(email));
    }
    let select = select
        .order_by_desc(user::Column::CreatedAt)
        .order_by_desc(user::Column::Id);

    fetch_page(db, select, page).await
}

pub async fn create_guest(txn: &DatabaseTransaction) -> CatalogResult<user::Model> {
    let now = Utc::now();
    let guest = user::ActiveModel {
        role: Set(Role::Guest),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    Ok(guest.insert(txn).await?)
}

async fn ensure_available(
    txn: &DatabaseTransaction,
    username: Option<&str>,
    email: Option<&str>,
    except: Option<i32>,
) -> CatalogResult<()> {
    let mut taken = Condition::any();
    if let Some(username) = username {
        taken = taken.add(user::Column::Username.eq(username));
    }
    if let Some(email) = email {
        taken = taken.add(user::Column::Email.eq(email));
    }
    if taken.is_empty() {
        return Ok(());
    }

    let mut select = user::Entity::find().filter(taken);
    if let Some(id) = except {
        select = select.filter(user::Column::Id.ne(id));
    }
    if select.one(txn).await?.is_some() {
        return Err(CatalogError::Conflict(
            "Username or email already taken".to_string(),
        ));
    }
    Ok(())
}

/// Registers a new account, or turns the calling guest into a full user.
pub async fn register(
    txn: &DatabaseTransaction,
    input: RegisterInput,
    upgrade_from: Option<&user::Model>,
) -> CatalogResult<user::Model> {
    input.validate()?;
    ensure_available(txn, Some(&input.username), Some(&input.email), None).await?;

    let password = hash_password(&input.password)
        .map_err(|e| CatalogError::Internal(format!("Failed to hash password: {e}")))?;
    let now = Utc::now();

    let user = match upgrade_from {
        Some(guest) if guest.role != Role::Guest => {
            return Err(CatalogError::Conflict(
                "Only guest accounts can be upgraded".to_string(),
            ))
        }
        Some(guest) => {
            let mut user: user::ActiveModel = guest.clone().into();
            user.username = Set(Some(input.username));
            user.email = Set(Some(input.email));
            user.password = Set(Some(password));
            user.role = Set(Role::User);
            user.updated_at = Set(now);
            user.update(txn).await?
        }
        None => {
            user::ActiveModel {
                username: Set(Some(input.username)),
                email: Set(Some(input.email)),
                password: Set(Some(password)),
                role: Set(Role::User),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(txn)
            .await?
        }
    };

    Ok(user)
}

pub async fn login<C: ConnectionTrait>(db: &C, input: &LoginInput) -> CatalogResult<user::Model> {
    let invalid = || CatalogError::Unauthorized("Invalid username or password".to_string());

    let user = user::Entity::find()
        .filter(
            Condition::any()
                .add(user::Column::Username.eq(input.identifier.as_str()))
                .add(user::Column::Email.eq(input.identifier.as_str())),
        )
        .one(db)
        .await?
        .ok_or_else(invalid)?;

    user.check_hash(&input.password).map_err(|_| invalid())?;

    Ok(user)
}

/// Non super users may only edit themselves. Roles are only changed by the
/// owner, and never on their own account.
pub async fn update_user(
    txn: &DatabaseTransaction,
    requester: &user::Model,
    target_id: i32,
    patch: UserPatch,
) -> CatalogResult<user::Model> {
    if !requester.is_super_user() && requester.id != target_id {
        return Err(CatalogError::Forbidden(
            "You can only update your own account".to_string(),
        ));
    }
    if patch.role.is_some() {
        if !requester.is_owner() {
            return Err(CatalogError::Forbidden(
                "Only the owner can change roles".to_string(),
            ));
        }
        if requester.id == target_id {
            return Err(CatalogError::Forbidden(
                "The owner cannot change their own role".to_string(),
            ));
        }
    }
    patch.validate()?;

    let target = get_user(txn, target_id).await?;
    ensure_available(
        txn,
        patch.username.as_deref(),
        patch.email.as_deref(),
        Some(target.id),
    )
    .await?;

    let mut user: user::ActiveModel = target.into();
    if let Some(username) = patch.username {
        user.username = Set(Some(username));
    }
    if let Some(email) = patch.email {
        user.email = Set(Some(email));
    }
    if let Some(role) = patch.role {
        user.role = Set(role);
    }
    user.updated_at = Set(Utc::now());

    Ok(user.update(txn).await?)
}

pub async fn delete_user(
    txn: &DatabaseTransaction,
    requester: &user::Model,
    id: i32,
) -> CatalogResult<()> {
    let target = get_user(txn, id).await?;
    if target.id == requester.id {
        return Err(CatalogError::Forbidden(
            "You cannot delete your own account".to_string(),
        ));
    }
    if target.is_owner() {
        return Err(CatalogError::Forbidden(
            "The owner account cannot be deleted".to_string(),
        ));
    }

    user::Entity::delete_by_id(id).exec(txn).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_pattern() {
        assert!(USERNAME_REGEX.is_match("baker_01"));
        assert!(USERNAME_REGEX.is_match("anna.k-w"));
        assert!(!USERNAME_REGEX.is_match("abc"));
        assert!(!USERNAME_REGEX.is_match("has space"));
    }

    #[test]
    fn hashed_password_verifies() {
        let hash = hash_password("correct horse").unwrap();
        let user = user::Model {
            id: 1,
            username: Some("tester".to_string()),
            email: None,
            password: Some(hash),
            role: Role::User,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(user.check_hash("correct horse").is_ok());
        assert!(user.check_hash("wrong").is_err());
    }
}

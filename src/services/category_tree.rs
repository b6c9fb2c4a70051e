//! Structural rules for the parent-pointer category tree.

use std::collections::HashSet;

use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction,
    EntityTrait, QueryFilter, Set,
};
use tracing::{info, warn};

use crate::entities::{category, SoftDelete};
use crate::error::{CatalogError, CatalogResult};

/// Fails when `candidate` appears on the parent chain of `start`.
///
/// The walk tracks visited ids, so a cycle already persisted in storage ends
/// the walk instead of looping forever.
pub async fn ensure_not_ancestor<C: ConnectionTrait>(
    db: &C,
    start: &category::Model,
    candidate: i32,
) -> CatalogResult<()> {
    let mut visited = HashSet::from([start.id]);
    let mut next = start.parent_id;

    while let Some(id) = next {
        if id == candidate {
            return Err(CatalogError::Conflict(format!(
                "Category {candidate} is an ancestor of category {}",
                start.id
            )));
        }
        if !visited.insert(id) {
            warn!(
                category_id = start.id,
                repeated_id = id,
                "Stored category tree contains a cycle"
            );
            break;
        }
        next = category::Entity::find_by_id(id)
            .one(db)
            .await?
            .and_then(|ancestor| ancestor.parent_id);
    }

    Ok(())
}

/// Checks that `child_id` may hang below `parent`.
pub async fn check_adoption<C: ConnectionTrait>(
    db: &C,
    parent: &category::Model,
    child_id: i32,
) -> CatalogResult<()> {
    if parent.id == child_id {
        return Err(CatalogError::Conflict(
            "A category cannot be a subcategory of itself".to_string(),
        ));
    }
    ensure_not_ancestor(db, parent, child_id).await
}

async fn find_live(txn: &DatabaseTransaction, id: i32) -> CatalogResult<category::Model> {
    category::Entity::find_live_by_id(id)
        .one(txn)
        .await?
        .ok_or_else(|| CatalogError::not_found("Category", id))
}

async fn set_parent(
    txn: &DatabaseTransaction,
    child: category::Model,
    parent_id: Option<i32>,
) -> CatalogResult<category::Model> {
    let mut child: category::ActiveModel = child.into();
    child.parent_id = Set(parent_id);
    child.updated_at = Set(Utc::now());
    Ok(child.update(txn).await?)
}

pub async fn add_subcategory(
    txn: &DatabaseTransaction,
    parent_id: i32,
    child_id: i32,
) -> CatalogResult<category::Model> {
    if parent_id == child_id {
        return Err(CatalogError::Conflict(
            "A category cannot be a subcategory of itself".to_string(),
        ));
    }
    let parent = find_live(txn, parent_id).await?;
    let child = find_live(txn, child_id).await?;

    check_adoption(txn, &parent, child.id).await?;

    if child.parent_id == Some(parent.id) {
        return Err(CatalogError::Conflict(format!(
            "Category {child_id} is already a subcategory of category {parent_id}"
        )));
    }

    set_parent(txn, child, Some(parent.id)).await
}

/// Detaches `child_id` from `parent_id`. The child and its subtree survive as
/// their own tree.
pub async fn remove_subcategory(
    txn: &DatabaseTransaction,
    parent_id: i32,
    child_id: i32,
) -> CatalogResult<category::Model> {
    if parent_id == child_id {
        return Err(CatalogError::Conflict(
            "A category cannot remove itself".to_string(),
        ));
    }
    let parent = find_live(txn, parent_id).await?;
    let child = find_live(txn, child_id).await?;

    if child.parent_id != Some(parent.id) {
        return Err(CatalogError::Conflict(format!(
            "Category {child_id} is not a subcategory of category {parent_id}"
        )));
    }

    set_parent(txn, child, None).await
}

/// Moves the direct subcategories of `category` one level up, to its parent.
/// Roots with live subcategories cannot give them away.
pub async fn reparent_children(
    txn: &DatabaseTransaction,
    category: &category::Model,
) -> CatalogResult<u64> {
    let live_children = category::Entity::find_live()
        .filter(category::Column::ParentId.eq(category.id))
        .all(txn)
        .await?;

    if category.parent_id.is_none() && !live_children.is_empty() {
        return Err(CatalogError::Conflict(format!(
            "Category {} is a root with {} subcategories; remove or move them first",
            category.id,
            live_children.len()
        )));
    }

    // Soft-deleted children move too, so no row points at a removed parent.
    let moved = category::Entity::update_many()
        .col_expr(category::Column::ParentId, Expr::value(category.parent_id))
        .col_expr(category::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(category::Column::ParentId.eq(category.id))
        .exec(txn)
        .await?
        .rows_affected;

    if moved > 0 {
        info!(
            category_id = category.id,
            new_parent = ?category.parent_id,
            moved,
            "Reparented subcategories"
        );
    }

    Ok(moved)
}

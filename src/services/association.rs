//! Replaces an owner's associated set for a many-to-many style relation
//! with a desired set, touching only the rows that differ.

use std::collections::HashSet;

use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ColumnTrait, DatabaseTransaction, DbErr, EntityTrait, QueryFilter,
    QuerySelect,
};

use crate::entities::{category, image, product, product_category, SoftDelete};

/// Add/remove sets needed to turn `current` into `desired`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Delta {
    pub to_add: Vec<i32>,
    pub to_remove: Vec<i32>,
}

impl Delta {
    /// Duplicates in `desired` collapse; output follows input order.
    pub fn between(current: &[i32], desired: &[i32]) -> Delta {
        let current_set: HashSet<i32> = current.iter().copied().collect();
        let desired_set: HashSet<i32> = desired.iter().copied().collect();

        let mut seen = HashSet::new();
        let to_add = desired
            .iter()
            .copied()
            .filter(|id| !current_set.contains(id) && seen.insert(*id))
            .collect();
        let to_remove = current
            .iter()
            .copied()
            .filter(|id| !desired_set.contains(id))
            .collect();

        Delta { to_add, to_remove }
    }

    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_remove.is_empty()
    }
}

/// A relation whose members can be listed, linked and unlinked for one owner.
#[allow(async_fn_in_trait)]
pub trait Association {
    async fn linked(&self, txn: &DatabaseTransaction, owner: i32) -> Result<Vec<i32>, DbErr>;

    async fn link(&self, txn: &DatabaseTransaction, owner: i32, ids: &[i32])
        -> Result<(), DbErr>;

    async fn unlink(
        &self,
        txn: &DatabaseTransaction,
        owner: i32,
        ids: &[i32],
    ) -> Result<(), DbErr>;
}

/// Makes the owner's set equal `desired`. Removals run first so a
/// uniqueness constraint on (owner, related) never sees a transient duplicate.
///
/// Every id in `desired` must already be resolved by the caller.
pub async fn reconcile<A: Association>(
    association: &A,
    txn: &DatabaseTransaction,
    owner: i32,
    desired: &[i32],
) -> Result<Delta, DbErr> {
    let current = association.linked(txn, owner).await?;
    let delta = Delta::between(&current, desired);

    if !delta.to_remove.is_empty() {
        association.unlink(txn, owner, &delta.to_remove).await?;
    }
    if !delta.to_add.is_empty() {
        association.link(txn, owner, &delta.to_add).await?;
    }

    Ok(delta)
}

/// Product <-> Category through the `product_category` join table.
pub struct ProductCategories;

impl Association for ProductCategories {
    async fn linked(&self, txn: &DatabaseTransaction, owner: i32) -> Result<Vec<i32>, DbErr> {
        product_category::Entity::find()
            .select_only()
            .column(product_category::Column::CategoryId)
            .filter(product_category::Column::ProductId.eq(owner))
            .into_tuple::<i32>()
            .all(txn)
            .await
    }

    async fn link(
        &self,
        txn: &DatabaseTransaction,
        owner: i32,
        ids: &[i32],
    ) -> Result<(), DbErr> {
        let rows = ids.iter().map(|&category_id| product_category::ActiveModel {
            product_id: sea_orm::Set(owner),
            category_id: sea_orm::Set(category_id),
        });
        product_category::Entity::insert_many(rows)
            .exec_without_returning(txn)
            .await?;
        Ok(())
    }

    async fn unlink(
        &self,
        txn: &DatabaseTransaction,
        owner: i32,
        ids: &[i32],
    ) -> Result<(), DbErr> {
        product_category::Entity::delete_many()
            .filter(product_category::Column::ProductId.eq(owner))
            .filter(product_category::Column::CategoryId.is_in(ids.to_vec()))
            .exec(txn)
            .await?;
        Ok(())
    }
}

/// Product photos. The product owns their lifecycle, so unlinking an image
/// also soft-deletes it, unless a product thumbnail or a category image still
/// points at it. Those are only detached.
pub struct ProductImages;

impl ProductImages {
    async fn still_referenced(
        txn: &DatabaseTransaction,
        ids: &[i32],
    ) -> Result<HashSet<i32>, DbErr> {
        let thumbnails: Vec<Option<i32>> = product::Entity::find()
            .select_only()
            .column(product::Column::ThumbnailId)
            .filter(product::Column::ThumbnailId.is_in(ids.to_vec()))
            .into_tuple()
            .all(txn)
            .await?;
        let category_images: Vec<Option<i32>> = category::Entity::find()
            .select_only()
            .column(category::Column::ImageId)
            .filter(category::Column::ImageId.is_in(ids.to_vec()))
            .into_tuple()
            .all(txn)
            .await?;
        Ok(thumbnails
            .into_iter()
            .chain(category_images)
            .flatten()
            .collect())
    }
}

impl Association for ProductImages {
    async fn linked(&self, txn: &DatabaseTransaction, owner: i32) -> Result<Vec<i32>, DbErr> {
        image::Entity::find_live()
            .select_only()
            .column(image::Column::Id)
            .filter(image::Column::ProductId.eq(owner))
            .into_tuple::<i32>()
            .all(txn)
            .await
    }

    async fn link(
        &self,
        txn: &DatabaseTransaction,
        owner: i32,
        ids: &[i32],
    ) -> Result<(), DbErr> {
        image::Entity::update_many()
            .col_expr(image::Column::ProductId, Expr::value(owner))
            .col_expr(image::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(image::Column::Id.is_in(ids.to_vec()))
            .exec(txn)
            .await?;
        Ok(())
    }

    async fn unlink(
        &self,
        txn: &DatabaseTransaction,
        owner: i32,
        ids: &[i32],
    ) -> Result<(), DbErr> {
        let kept = Self::still_referenced(txn, ids).await?;
        let (detach, retire): (Vec<i32>, Vec<i32>) =
            ids.iter().copied().partition(|id| kept.contains(id));

        if !retire.is_empty() {
            image::Entity::mark_deleted()
                .filter(image::Column::ProductId.eq(owner))
                .filter(image::Column::Id.is_in(retire))
                .exec(txn)
                .await?;
        }
        if !detach.is_empty() {
            image::Entity::update_many()
                .col_expr(image::Column::ProductId, Expr::value(Option::<i32>::None))
                .col_expr(image::Column::UpdatedAt, Expr::value(Utc::now()))
                .filter(image::Column::ProductId.eq(owner))
                .filter(image::Column::Id.is_in(detach))
                .exec(txn)
                .await?;
        }
        Ok(())
    }
}

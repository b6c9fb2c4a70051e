use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait,
    ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::entities::{category, image, product, product_category, SoftDelete};
use crate::error::{CatalogError, CatalogResult};
use crate::services::{
    category_tree::{check_adoption, reparent_children},
    image::require_live_image,
    pagination::{fetch_page, Page, PageQuery},
};

#[derive(Deserialize, Debug, Clone, Validate)]
pub struct CategoryInput {
    #[validate(length(min = 1, max = 128, message = "Name must be 1 to 128 characters"))]
    pub name: String,
    pub image_id: Option<i32>,
    pub parent_id: Option<i32>,
}

/// Absent fields are left untouched.
#[derive(Deserialize, Debug, Clone, Default, Validate)]
pub struct CategoryPatch {
    #[validate(length(min = 1, max = 128, message = "Name must be 1 to 128 characters"))]
    pub name: Option<String>,
    pub image_id: Option<i32>,
    pub parent_id: Option<i32>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct CategoryFilter {
    pub name: Option<String>,
    pub parent: Option<i32>,
}

#[derive(Serialize, Debug)]
pub struct CategoryView {
    #[serde(flatten)]
    pub category: category::Model,
    pub thumbnail: Option<image::Model>,
    pub subcategories: Vec<category::Model>,
    pub products: Vec<product::Model>,
}

pub async fn get_category<C: ConnectionTrait>(
    db: &C,
    id: i32,
    with_deleted: bool,
) -> CatalogResult<category::Model> {
    category::Entity::find_scoped(with_deleted)
        .filter(category::Column::Id.eq(id))
        .one(db)
        .await?
        .ok_or_else(|| CatalogError::not_found("Category", id))
}

/// Resolves every id to a live category, failing on the first one missing.
pub async fn resolve_categories<C: ConnectionTrait>(
    db: &C,
    ids: &[i32],
) -> CatalogResult<Vec<category::Model>> {
    let found = category::Entity::find_live()
        .filter(category::Column::Id.is_in(ids.to_vec()))
        .all(db)
        .await?;
    if let Some(missing) = ids.iter().find(|id| !found.iter().any(|c| c.id == **id)) {
        return Err(CatalogError::not_found("Category", *missing));
    }
    Ok(found)
}

pub async fn category_view<C: ConnectionTrait>(
    db: &C,
    category: category::Model,
) -> CatalogResult<CategoryView> {
    let thumbnail = match category.image_id {
        Some(image_id) => image::Entity::find_live_by_id(image_id).one(db).await?,
        None => None,
    };
    let subcategories = category::Entity::find_live()
        .filter(category::Column::ParentId.eq(category.id))
        .order_by_asc(category::Column::Id)
        .all(db)
        .await?;
    let products = category
        .find_related(product::Entity)
        .filter(product::Column::DeletedAt.is_null())
        .order_by_asc(product::Column::Id)
        .all(db)
        .await?;

    Ok(CategoryView {
        category,
        thumbnail,
        subcategories,
        products,
    })
}

pub async fn list_categories<C: ConnectionTrait>(
    db: &C,
    filter: &CategoryFilter,
    page: &PageQuery,
) -> CatalogResult<Page<category::Model>> {
    let mut select = category::Entity::find_live();
    if let Some(name) = filter.name.as_deref().filter(|n| !n.is_empty()) {
        select = select.filter(category::Column::Name.contains(name));
    }
    if let Some(parent) = filter.parent {
        select = select.filter(category::Column::ParentId.eq(parent));
    }
    let select = select
        .order_by_desc(category::Column::CreatedAt)
        .order_by_desc(category::Column::Id);

    fetch_page(db, select, page).await
}

pub async fn create_category(
    txn: &DatabaseTransaction,
    input: CategoryInput,
) -> CatalogResult<category::Model> {
    input.validate()?;

    if let Some(image_id) = input.image_id {
        require_live_image(txn, image_id).await?;
    }
    // A brand new category has no descendants, so any live parent is safe.
    if let Some(parent_id) = input.parent_id {
        get_category(txn, parent_id, false).await?;
    }

    let now = Utc::now();
    let new_category = category::ActiveModel {
        name: Set(input.name),
        parent_id: Set(input.parent_id),
        image_id: Set(input.image_id),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    Ok(new_category.insert(txn).await?)
}

pub async fn update_category(
    txn: &DatabaseTransaction,
    id: i32,
    patch: CategoryPatch,
) -> CatalogResult<category::Model> {
    patch.validate()?;
    let current = get_category(txn, id, false).await?;

    if let Some(parent_id) = patch.parent_id {
        let parent = get_category(txn, parent_id, false).await?;
        check_adoption(txn, &parent, current.id).await?;
    }
    if let Some(image_id) = patch.image_id {
        require_live_image(txn, image_id).await?;
    }

    let mut category: category::ActiveModel = current.into();
    if let Some(name) = patch.name {
        category.name = Set(name);
    }
    if let Some(image_id) = patch.image_id {
        category.image_id = Set(Some(image_id));
    }
    if let Some(parent_id) = patch.parent_id {
        category.parent_id = Set(Some(parent_id));
    }
    category.updated_at = Set(Utc::now());

    Ok(category.update(txn).await?)
}

/// Soft delete by default; `force` removes the row. Either way the direct
/// subcategories move up to the deleted category's parent.
pub async fn delete_category(
    txn: &DatabaseTransaction,
    id: i32,
    force: bool,
) -> CatalogResult<()> {
    let category = get_category(txn, id, force).await?;

    let linked_products = product_category::Entity::find()
        .inner_join(product::Entity)
        .filter(product_category::Column::CategoryId.eq(id))
        .filter(product::Column::DeletedAt.is_null())
        .count(txn)
        .await?;
    if linked_products > 0 {
        return Err(CatalogError::Conflict(format!(
            "Category {id} still has {linked_products} products; move them first"
        )));
    }

    reparent_children(txn, &category).await?;

    if force {
        product_category::Entity::delete_many()
            .filter(product_category::Column::CategoryId.eq(id))
            .exec(txn)
            .await?;
        category::Entity::delete_by_id(id).exec(txn).await?;
    } else {
        category::Entity::mark_deleted()
            .filter(category::Column::Id.eq(id))
            .exec(txn)
            .await?;
    }

    Ok(())
}

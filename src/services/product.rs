use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::entities::{
    category, discount, image, order_item, price, product, product_category, product_price,
    SoftDelete,
};
use crate::error::{CatalogError, CatalogResult};
use crate::services::{
    association::{reconcile, ProductCategories, ProductImages},
    category::resolve_categories,
    discount::reduction_for,
    image::{require_live_image, resolve_images},
    pagination::{fetch_page, Page, PageQuery},
    price::{
        active_price, add_product_price, effective_unit_amount, list_product_prices, PriceInput,
        ProductPriceView,
    },
};

fn default_stock() -> i32 {
    1
}

#[derive(Deserialize, Debug, Clone, Validate)]
pub struct ProductInput {
    #[validate(length(min = 1, max = 128, message = "Name must be 1 to 128 characters"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_stock")]
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock: i32,
    pub categories: Vec<i32>,
    pub thumbnail_id: i32,
    #[serde(default)]
    pub images: Vec<i32>,
    pub discount_id: Option<i32>,
    #[validate(nested)]
    pub price: Option<PriceInput>,
}

/// `None` leaves a field as it is. For `categories` and `images` a present
/// list replaces the whole set.
#[derive(Deserialize, Debug, Clone, Default, Validate)]
pub struct ProductPatch {
    #[validate(length(min = 1, max = 128, message = "Name must be 1 to 128 characters"))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub stock: Option<i32>,
    pub categories: Option<Vec<i32>>,
    pub images: Option<Vec<i32>>,
    pub thumbnail_id: Option<i32>,
    pub discount_id: Option<i32>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct ProductFilter {
    pub name: Option<String>,
    pub category: Option<i32>,
}

#[derive(Serialize, Debug)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: product::Model,
    pub categories: Vec<category::Model>,
    pub images: Vec<image::Model>,
    pub thumbnail: Option<image::Model>,
    pub active_price: Option<price::Model>,
    /// Active price amount after the product's discount.
    pub effective_amount: Option<i64>,
    pub prices: Vec<ProductPriceView>,
    pub discount: Option<discount::Model>,
}

fn require_categories(ids: &[i32]) -> CatalogResult<()> {
    if ids.is_empty() {
        return Err(CatalogError::Validation(
            "A product needs at least one category".to_string(),
        ));
    }
    Ok(())
}

async fn require_live_discount<C: ConnectionTrait>(db: &C, id: i32) -> CatalogResult<()> {
    discount::Entity::find_live_by_id(id)
        .one(db)
        .await?
        .map(|_| ())
        .ok_or_else(|| CatalogError::not_found("Discount", id))
}

pub async fn get_product<C: ConnectionTrait>(
    db: &C,
    id: i32,
    with_deleted: bool,
) -> CatalogResult<product::Model> {
    product::Entity::find_scoped(with_deleted)
        .filter(product::Column::Id.eq(id))
        .one(db)
        .await?
        .ok_or_else(|| CatalogError::not_found("Product", id))
}

pub async fn product_view<C: ConnectionTrait>(
    db: &C,
    product: product::Model,
) -> CatalogResult<ProductView> {
    let categories = category::Entity::find_live()
        .inner_join(product_category::Entity)
        .filter(product_category::Column::ProductId.eq(product.id))
        .order_by_asc(category::Column::Id)
        .all(db)
        .await?;
    let images = image::Entity::find_live()
        .filter(image::Column::ProductId.eq(product.id))
        .order_by_asc(image::Column::Id)
        .all(db)
        .await?;
    let thumbnail = match product.thumbnail_id {
        Some(id) => image::Entity::find_live_by_id(id).one(db).await?,
        None => None,
    };
    let discount = match product.discount_id {
        Some(id) => discount::Entity::find_live_by_id(id).one(db).await?,
        None => None,
    };
    let active = active_price(db, product.id).await?;
    let effective_amount = match &active {
        Some(price) => Some(effective_unit_amount(
            price.amount,
            reduction_for(db, product.discount_id).await?,
        )),
        None => None,
    };
    let prices = list_product_prices(db, product.id).await?;

    Ok(ProductView {
        product,
        categories,
        images,
        thumbnail,
        active_price: active,
        effective_amount,
        prices,
        discount,
    })
}

pub async fn list_products<C: ConnectionTrait>(
    db: &C,
    filter: &ProductFilter,
    page: &PageQuery,
) -> CatalogResult<Page<product::Model>> {
    let mut select = product::Entity::find_live();
    if let Some(name) = filter.name.as_deref().filter(|n| !n.is_empty()) {
        select = select.filter(product::Column::Name.contains(name));
    }
    if let Some(category_id) = filter.category {
        select = select
            .inner_join(product_category::Entity)
            .filter(product_category::Column::CategoryId.eq(category_id));
    }
    let select = select
        .order_by_desc(product::Column::CreatedAt)
        .order_by_desc(product::Column::Id);

    fetch_page(db, select, page).await
}

/// Every referenced row is resolved before the first write.
pub async fn create_product(
    txn: &DatabaseTransaction,
    input: ProductInput,
) -> CatalogResult<product::Model> {
    input.validate()?;
    require_categories(&input.categories)?;

    resolve_categories(txn, &input.categories).await?;
    require_live_image(txn, input.thumbnail_id).await?;
    resolve_images(txn, &input.images, None).await?;
    if let Some(discount_id) = input.discount_id {
        require_live_discount(txn, discount_id).await?;
    }

    let now = Utc::now();
    let product = product::ActiveModel {
        name: Set(input.name),
        description: Set(input.description),
        stock: Set(input.stock),
        thumbnail_id: Set(Some(input.thumbnail_id)),
        discount_id: Set(input.discount_id),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(txn)
    .await?;

    reconcile(&ProductCategories, txn, product.id, &input.categories).await?;
    reconcile(&ProductImages, txn, product.id, &input.images).await?;

    if let Some(price) = input.price {
        add_product_price(txn, product.id, price).await?;
    }

    Ok(product)
}

pub async fn update_product(
    txn: &DatabaseTransaction,
    id: i32,
    patch: ProductPatch,
) -> CatalogResult<product::Model> {
    patch.validate()?;
    let current = get_product(txn, id, false).await?;

    if let Some(categories) = &patch.categories {
        require_categories(categories)?;
        resolve_categories(txn, categories).await?;
    }
    if let Some(images) = &patch.images {
        resolve_images(txn, images, Some(id)).await?;
    }
    if let Some(thumbnail_id) = patch.thumbnail_id {
        require_live_image(txn, thumbnail_id).await?;
    }
    if let Some(discount_id) = patch.discount_id {
        require_live_discount(txn, discount_id).await?;
    }

    let mut product: product::ActiveModel = current.into();
    if let Some(name) = patch.name {
        product.name = Set(name);
    }
    if let Some(description) = patch.description {
        product.description = Set(description);
    }
    if let Some(stock) = patch.stock {
        product.stock = Set(stock);
    }
    if let Some(thumbnail_id) = patch.thumbnail_id {
        product.thumbnail_id = Set(Some(thumbnail_id));
    }
    if let Some(discount_id) = patch.discount_id {
        product.discount_id = Set(Some(discount_id));
    }
    product.updated_at = Set(Utc::now());
    let product = product.update(txn).await?;

    if let Some(categories) = &patch.categories {
        reconcile(&ProductCategories, txn, product.id, categories).await?;
    }
    if let Some(images) = &patch.images {
        reconcile(&ProductImages, txn, product.id, images).await?;
    }

    Ok(product)
}

/// Soft delete by default. `force` removes the row with its category links,
/// price links and prices, and retires its images.
pub async fn delete_product(
    txn: &DatabaseTransaction,
    id: i32,
    force: bool,
) -> CatalogResult<()> {
    get_product(txn, id, force).await?;

    if !force {
        product::Entity::mark_deleted()
            .filter(product::Column::Id.eq(id))
            .exec(txn)
            .await?;
        return Ok(());
    }

    let ordered = order_item::Entity::find()
        .filter(order_item::Column::ProductId.eq(id))
        .count(txn)
        .await?;
    if ordered > 0 {
        return Err(CatalogError::Conflict(format!(
            "Product {id} is referenced by {ordered} order items"
        )));
    }

    product_category::Entity::delete_many()
        .filter(product_category::Column::ProductId.eq(id))
        .exec(txn)
        .await?;

    let price_ids: Vec<i32> = product_price::Entity::find()
        .select_only()
        .column(product_price::Column::PriceId)
        .filter(product_price::Column::ProductId.eq(id))
        .into_tuple()
        .all(txn)
        .await?;
    product_price::Entity::delete_many()
        .filter(product_price::Column::ProductId.eq(id))
        .exec(txn)
        .await?;
    if !price_ids.is_empty() {
        price::Entity::delete_many()
            .filter(price::Column::Id.is_in(price_ids))
            .exec(txn)
            .await?;
    }

    image::Entity::mark_deleted()
        .filter(image::Column::ProductId.eq(id))
        .filter(image::Column::DeletedAt.is_null())
        .exec(txn)
        .await?;
    image::Entity::update_many()
        .col_expr(image::Column::ProductId, Expr::value(Option::<i32>::None))
        .filter(image::Column::ProductId.eq(id))
        .exec(txn)
        .await?;

    product::Entity::delete_by_id(id).exec(txn).await?;

    Ok(())
}

//! Product prices: the active-price switch, the price owner lookup and the
//! effective amount after a discount.

use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::entities::{
    price::{self, OwnerKind},
    product, product_price, SoftDelete,
};
use crate::error::{CatalogError, CatalogResult};

#[derive(Deserialize, Debug, Clone, Validate)]
pub struct PriceInput {
    #[validate(range(min = 0, message = "Amount cannot be negative"))]
    pub amount: i64,
    #[validate(range(min = 0.0, max = 1.0, message = "Tax must be between 0 and 1"))]
    pub tax: f32,
    #[serde(default)]
    pub activate: bool,
}

/// A product price together with its activation flag.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ProductPriceView {
    #[serde(flatten)]
    pub price: price::Model,
    pub is_active: bool,
}

/// What a price row prices, resolved from its `owner_kind` tag.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PriceOwner {
    Product { product_id: i32, is_active: bool },
    Discount { discount_id: i32 },
    Payment { payment_id: i32 },
}

#[derive(Serialize, Debug)]
pub struct PriceDetail {
    #[serde(flatten)]
    pub price: price::Model,
    pub owner: PriceOwner,
}

/// How a discount lowers a unit amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    Percentage(i32),
    Fixed(i64),
}

/// Unit amount after `reduction`, never below zero.
pub fn effective_unit_amount(base: i64, reduction: Option<Reduction>) -> i64 {
    let reduced = match reduction {
        None => base,
        Some(Reduction::Percentage(percent)) => {
            // The quotient never exceeds `base`, so narrowing back is lossless.
            let percent = i128::from(percent.clamp(0, 100));
            (i128::from(base) * (100 - percent) / 100) as i64
        }
        Some(Reduction::Fixed(off)) => base.saturating_sub(off),
    };
    reduced.max(0)
}

async fn require_live_product(txn: &DatabaseTransaction, id: i32) -> CatalogResult<()> {
    product::Entity::find_live_by_id(id)
        .one(txn)
        .await?
        .map(|_| ())
        .ok_or_else(|| CatalogError::not_found("Product", id))
}

/// Makes `price_id` the single active price of `product_id`.
///
/// Other links are deactivated before the target is activated, inside the
/// caller's transaction. Activating the already active price changes nothing.
pub async fn set_active_price(
    txn: &DatabaseTransaction,
    product_id: i32,
    price_id: i32,
) -> CatalogResult<product_price::Model> {
    require_live_product(txn, product_id).await?;

    let link = product_price::Entity::find()
        .filter(product_price::Column::ProductId.eq(product_id))
        .filter(product_price::Column::PriceId.eq(price_id))
        .one(txn)
        .await?
        .ok_or_else(|| {
            CatalogError::Conflict(format!(
                "Price {price_id} is not associated with product {product_id}"
            ))
        })?;

    price::Entity::find_live_by_id(price_id)
        .one(txn)
        .await?
        .ok_or_else(|| CatalogError::not_found("Price", price_id))?;

    if link.is_active {
        return Ok(link);
    }

    let now = Utc::now();
    product_price::Entity::update_many()
        .col_expr(product_price::Column::IsActive, Expr::value(false))
        .col_expr(product_price::Column::UpdatedAt, Expr::value(now))
        .filter(product_price::Column::ProductId.eq(product_id))
        .filter(product_price::Column::IsActive.eq(true))
        .exec(txn)
        .await?;

    let mut link: product_price::ActiveModel = link.into();
    link.is_active = Set(true);
    link.updated_at = Set(now);

    Ok(link.update(txn).await?)
}

/// Creates a product-owned price and links it. The product's first price is
/// always activated.
pub async fn add_product_price(
    txn: &DatabaseTransaction,
    product_id: i32,
    input: PriceInput,
) -> CatalogResult<ProductPriceView> {
    input.validate()?;
    require_live_product(txn, product_id).await?;

    let existing = product_price::Entity::find()
        .filter(product_price::Column::ProductId.eq(product_id))
        .count(txn)
        .await?;

    let now = Utc::now();
    let price = price::ActiveModel {
        amount: Set(input.amount),
        tax: Set(input.tax),
        owner_kind: Set(OwnerKind::Product),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(txn)
    .await?;

    let link = product_price::ActiveModel {
        product_id: Set(product_id),
        price_id: Set(price.id),
        is_active: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(txn)
    .await?;

    let link = if input.activate || existing == 0 {
        set_active_price(txn, product_id, price.id).await?
    } else {
        link
    };

    Ok(ProductPriceView {
        price,
        is_active: link.is_active,
    })
}

pub async fn list_product_prices<C: ConnectionTrait>(
    db: &C,
    product_id: i32,
) -> CatalogResult<Vec<ProductPriceView>> {
    let rows = product_price::Entity::find()
        .find_also_related(price::Entity)
        .filter(product_price::Column::ProductId.eq(product_id))
        .filter(price::Column::DeletedAt.is_null())
        .order_by_asc(product_price::Column::Id)
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(link, price)| {
            price.map(|price| ProductPriceView {
                price,
                is_active: link.is_active,
            })
        })
        .collect())
}

pub async fn active_price<C: ConnectionTrait>(
    db: &C,
    product_id: i32,
) -> CatalogResult<Option<price::Model>> {
    Ok(price::Entity::find_live()
        .inner_join(product_price::Entity)
        .filter(product_price::Column::ProductId.eq(product_id))
        .filter(product_price::Column::IsActive.eq(true))
        .one(db)
        .await?)
}

pub async fn get_price<C: ConnectionTrait>(
    db: &C,
    id: i32,
    with_deleted: bool,
) -> CatalogResult<price::Model> {
    price::Entity::find_scoped(with_deleted)
        .filter(price::Column::Id.eq(id))
        .one(db)
        .await?
        .ok_or_else(|| CatalogError::not_found("Price", id))
}

/// Dispatches on `owner_kind` to find the row a price belongs to.
pub async fn resolve_price_owner<C: ConnectionTrait>(
    db: &C,
    price: &price::Model,
) -> CatalogResult<PriceOwner> {
    let dangling = || {
        CatalogError::Internal(format!(
            "Price {} is tagged {:?} but has no owner",
            price.id, price.owner_kind
        ))
    };

    match price.owner_kind {
        OwnerKind::Product => {
            let link = product_price::Entity::find()
                .filter(product_price::Column::PriceId.eq(price.id))
                .one(db)
                .await?
                .ok_or_else(dangling)?;
            Ok(PriceOwner::Product {
                product_id: link.product_id,
                is_active: link.is_active,
            })
        }
        OwnerKind::Discount => price
            .discount_id
            .map(|discount_id| PriceOwner::Discount { discount_id })
            .ok_or_else(dangling),
        OwnerKind::Payment => price
            .payment_id
            .map(|payment_id| PriceOwner::Payment { payment_id })
            .ok_or_else(dangling),
    }
}

pub async fn price_detail<C: ConnectionTrait>(
    db: &C,
    id: i32,
    with_deleted: bool,
) -> CatalogResult<PriceDetail> {
    let price = get_price(db, id, with_deleted).await?;
    let owner = resolve_price_owner(db, &price).await?;
    Ok(PriceDetail { price, owner })
}

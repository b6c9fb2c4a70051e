//! The caller's draft order: items, totals and checkout.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::entities::{
    order::{self, Status},
    order_item, payment,
    price::{self, OwnerKind},
    product, user, SoftDelete,
};
use crate::error::{CatalogError, CatalogResult};
use crate::services::{
    discount::reduction_for,
    price::{active_price, effective_unit_amount},
};

#[derive(Deserialize, Debug, Clone, Validate)]
pub struct AddItemInput {
    pub product_id: i32,
    #[serde(default = "one")]
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
}

fn one() -> i32 {
    1
}

#[derive(Deserialize, Debug, Clone, Validate)]
pub struct QuantityInput {
    #[validate(range(min = 0, message = "Quantity cannot be negative"))]
    pub quantity: i32,
}

#[derive(Serialize, Debug)]
pub struct OrderLine {
    #[serde(flatten)]
    pub item: order_item::Model,
    pub product: product::Model,
    /// `None` while the product has no active price.
    pub unit_amount: Option<i64>,
    pub line_total: Option<i64>,
}

#[derive(Serialize, Debug)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: order::Model,
    pub items: Vec<OrderLine>,
    pub total: i64,
}

#[derive(Serialize, Debug)]
pub struct CheckoutView {
    #[serde(flatten)]
    pub order: OrderView,
    pub payment: payment::Model,
    pub price: price::Model,
}

fn clamp_quantity(quantity: i32, stock: i32) -> i32 {
    quantity.min(stock).max(1)
}

fn amount_overflow() -> CatalogError {
    CatalogError::Conflict("Order amount exceeds the supported range".to_string())
}

fn line_amount(unit: i64, quantity: i32) -> CatalogResult<i64> {
    unit.checked_mul(i64::from(quantity)).ok_or_else(amount_overflow)
}

fn add_amounts(total: i64, line: i64) -> CatalogResult<i64> {
    total.checked_add(line).ok_or_else(amount_overflow)
}

async fn draft_order<C: ConnectionTrait>(
    db: &C,
    user_id: i32,
) -> CatalogResult<Option<order::Model>> {
    Ok(order::Entity::find_live()
        .filter(order::Column::UserId.eq(user_id))
        .filter(order::Column::Status.eq(Status::Draft))
        .order_by_desc(order::Column::CreatedAt)
        .order_by_desc(order::Column::Id)
        .one(db)
        .await?)
}

async fn require_draft<C: ConnectionTrait>(
    db: &C,
    user: &user::Model,
) -> CatalogResult<order::Model> {
    draft_order(db, user.id)
        .await?
        .ok_or_else(|| CatalogError::NotFound("No active order".to_string()))
}

async fn live_product(txn: &DatabaseTransaction, id: i32) -> CatalogResult<product::Model> {
    product::Entity::find_live_by_id(id)
        .one(txn)
        .await?
        .ok_or_else(|| CatalogError::not_found("Product", id))
}

/// The item with `item_id`, if it sits in the caller's draft order.
async fn owned_item(
    txn: &DatabaseTransaction,
    user: &user::Model,
    item_id: i32,
) -> CatalogResult<(order::Model, order_item::Model)> {
    let order = require_draft(txn, user).await?;
    let item = order_item::Entity::find_by_id(item_id)
        .filter(order_item::Column::OrderId.eq(order.id))
        .one(txn)
        .await?
        .ok_or_else(|| CatalogError::not_found("Order item", item_id))?;
    Ok((order, item))
}

async fn order_view<C: ConnectionTrait>(db: &C, order: order::Model) -> CatalogResult<OrderView> {
    let rows = order_item::Entity::find()
        .find_also_related(product::Entity)
        .filter(order_item::Column::OrderId.eq(order.id))
        .order_by_asc(order_item::Column::Id)
        .all(db)
        .await?;

    let mut items = Vec::with_capacity(rows.len());
    let mut total = 0;
    for (item, product) in rows {
        let product =
            product.ok_or_else(|| CatalogError::not_found("Product", item.product_id))?;
        let unit_amount = match active_price(db, product.id).await? {
            Some(price) => Some(effective_unit_amount(
                price.amount,
                reduction_for(db, product.discount_id).await?,
            )),
            None => None,
        };
        let line_total = unit_amount
            .map(|unit| line_amount(unit, item.quantity))
            .transpose()?;
        total = add_amounts(total, line_total.unwrap_or(0))?;
        items.push(OrderLine {
            item,
            product,
            unit_amount,
            line_total,
        });
    }

    Ok(OrderView {
        order,
        items,
        total,
    })
}

pub async fn active_order<C: ConnectionTrait>(
    db: &C,
    user: &user::Model,
) -> CatalogResult<OrderView> {
    let order = require_draft(db, user).await?;
    order_view(db, order).await
}

/// Adds `quantity` of a product, opening a draft order when needed. The
/// resulting line quantity stays within `[1, stock]`.
pub async fn add_item(
    txn: &DatabaseTransaction,
    user: &user::Model,
    input: AddItemInput,
) -> CatalogResult<OrderView> {
    input.validate()?;
    let product = live_product(txn, input.product_id).await?;
    if product.stock < 1 {
        return Err(CatalogError::Conflict(format!(
            "Product {} is out of stock",
            product.id
        )));
    }

    let now = Utc::now();
    let order = match draft_order(txn, user.id).await? {
        Some(order) => order,
        None => {
            order::ActiveModel {
                status: Set(Status::Draft),
                user_id: Set(user.id),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(txn)
            .await?
        }
    };

    let existing = order_item::Entity::find()
        .filter(order_item::Column::OrderId.eq(order.id))
        .filter(order_item::Column::ProductId.eq(product.id))
        .one(txn)
        .await?;

    match existing {
        Some(item) => {
            let quantity =
                clamp_quantity(item.quantity.saturating_add(input.quantity), product.stock);
            let mut item: order_item::ActiveModel = item.into();
            item.quantity = Set(quantity);
            item.updated_at = Set(now);
            item.update(txn).await?;
        }
        None => {
            order_item::ActiveModel {
                quantity: Set(clamp_quantity(input.quantity, product.stock)),
                product_id: Set(product.id),
                order_id: Set(order.id),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(txn)
            .await?;
        }
    }

    order_view(txn, order).await
}

/// Zero removes the line.
pub async fn set_item_quantity(
    txn: &DatabaseTransaction,
    user: &user::Model,
    item_id: i32,
    input: QuantityInput,
) -> CatalogResult<OrderView> {
    input.validate()?;
    let (order, item) = owned_item(txn, user, item_id).await?;

    if input.quantity == 0 {
        order_item::Entity::delete_by_id(item.id).exec(txn).await?;
        return order_view(txn, order).await;
    }

    let product = live_product(txn, item.product_id).await?;
    let mut item: order_item::ActiveModel = item.into();
    item.quantity = Set(clamp_quantity(input.quantity, product.stock));
    item.updated_at = Set(Utc::now());
    item.update(txn).await?;

    order_view(txn, order).await
}

pub async fn remove_item(
    txn: &DatabaseTransaction,
    user: &user::Model,
    item_id: i32,
) -> CatalogResult<OrderView> {
    let (order, item) = owned_item(txn, user, item_id).await?;
    order_item::Entity::delete_by_id(item.id).exec(txn).await?;
    order_view(txn, order).await
}

/// Moves the draft to pending and records a payment for its total.
pub async fn checkout(
    txn: &DatabaseTransaction,
    user: &user::Model,
) -> CatalogResult<CheckoutView> {
    let order = require_draft(txn, user).await?;
    let view = order_view(txn, order).await?;

    if view.items.is_empty() {
        return Err(CatalogError::Conflict("Order is empty".to_string()));
    }
    for line in &view.items {
        if line.unit_amount.is_none() {
            return Err(CatalogError::Conflict(format!(
                "Product {} has no active price",
                line.product.id
            )));
        }
        if line.product.deleted_at.is_some() {
            return Err(CatalogError::Conflict(format!(
                "Product {} is no longer available",
                line.product.id
            )));
        }
        if line.item.quantity > line.product.stock {
            return Err(CatalogError::Conflict(format!(
                "Only {} of product {} left in stock",
                line.product.stock, line.product.id
            )));
        }
    }

    let now = Utc::now();
    let mut order: order::ActiveModel = view.order.clone().into();
    order.status = Set(Status::Pending);
    order.updated_at = Set(now);
    let order = order.update(txn).await?;

    let payment = payment::ActiveModel {
        order_id: Set(order.id),
        external_ref: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(txn)
    .await?;

    let price = price::ActiveModel {
        amount: Set(view.total),
        tax: Set(0.0),
        owner_kind: Set(OwnerKind::Payment),
        payment_id: Set(Some(payment.id)),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(txn)
    .await?;

    Ok(CheckoutView {
        order: OrderView { order, ..view },
        payment,
        price,
    })
}

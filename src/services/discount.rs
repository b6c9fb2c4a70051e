use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction, EntityTrait,
    QueryFilter, Set,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::entities::{
    discount::{self, DiscountKind},
    price::{self, OwnerKind},
    SoftDelete,
};
use crate::error::{CatalogError, CatalogResult};
use crate::services::price::Reduction;

#[derive(Deserialize, Debug, Clone, Validate)]
pub struct DiscountPriceInput {
    #[validate(range(min = 0, message = "Amount cannot be negative"))]
    pub amount: i64,
    #[serde(default)]
    #[validate(range(min = 0.0, max = 1.0, message = "Tax must be between 0 and 1"))]
    pub tax: f32,
}

#[derive(Deserialize, Debug, Clone, Validate)]
pub struct DiscountInput {
    pub kind: DiscountKind,
    #[validate(range(min = 0, max = 100, message = "Value must be between 0 and 100"))]
    pub value: Option<i32>,
    #[validate(nested)]
    pub price: Option<DiscountPriceInput>,
}

impl DiscountInput {
    /// Percentage discounts carry a value, fixed ones carry a price. Never both.
    fn check_kind(&self) -> CatalogResult<()> {
        match (self.kind, self.value, &self.price) {
            (DiscountKind::Percentage, Some(_), None) => Ok(()),
            (DiscountKind::Percentage, None, _) => Err(CatalogError::Validation(
                "Value is required for a percentage discount".to_string(),
            )),
            (DiscountKind::Percentage, Some(_), Some(_)) => Err(CatalogError::Validation(
                "A percentage discount cannot have a price".to_string(),
            )),
            (DiscountKind::Fixed, None, Some(_)) => Ok(()),
            (DiscountKind::Fixed, _, None) => Err(CatalogError::Validation(
                "Price is required for a fixed discount".to_string(),
            )),
            (DiscountKind::Fixed, Some(_), Some(_)) => Err(CatalogError::Validation(
                "A fixed discount cannot have a percentage value".to_string(),
            )),
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct DiscountView {
    #[serde(flatten)]
    pub discount: discount::Model,
    pub price: Option<price::Model>,
}

pub async fn get_discount<C: ConnectionTrait>(
    db: &C,
    id: i32,
    with_deleted: bool,
) -> CatalogResult<DiscountView> {
    let discount = discount::Entity::find_scoped(with_deleted)
        .filter(discount::Column::Id.eq(id))
        .one(db)
        .await?
        .ok_or_else(|| CatalogError::not_found("Discount", id))?;
    let price = discount_price(db, discount.id).await?;

    Ok(DiscountView { discount, price })
}

async fn discount_price<C: ConnectionTrait>(
    db: &C,
    discount_id: i32,
) -> CatalogResult<Option<price::Model>> {
    Ok(price::Entity::find_live()
        .filter(price::Column::OwnerKind.eq(OwnerKind::Discount))
        .filter(price::Column::DiscountId.eq(discount_id))
        .one(db)
        .await?)
}

pub async fn create_discount(
    txn: &DatabaseTransaction,
    input: DiscountInput,
) -> CatalogResult<DiscountView> {
    input.validate()?;
    input.check_kind()?;

    let now = Utc::now();
    let discount = discount::ActiveModel {
        kind: Set(input.kind),
        value: Set(input.value),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(txn)
    .await?;

    let price = match input.price {
        Some(price_input) => Some(
            price::ActiveModel {
                amount: Set(price_input.amount),
                tax: Set(price_input.tax),
                owner_kind: Set(OwnerKind::Discount),
                discount_id: Set(Some(discount.id)),
                created_at: Set(now),
                updated_at: Set(now),
                ..Default::default()
            }
            .insert(txn)
            .await?,
        ),
        None => None,
    };

    Ok(DiscountView { discount, price })
}

/// The reduction a live discount applies, if any.
pub async fn reduction_for<C: ConnectionTrait>(
    db: &C,
    discount_id: Option<i32>,
) -> CatalogResult<Option<Reduction>> {
    let Some(discount_id) = discount_id else {
        return Ok(None);
    };
    let Some(discount) = discount::Entity::find_live_by_id(discount_id).one(db).await? else {
        return Ok(None);
    };

    Ok(match discount.kind {
        DiscountKind::Percentage => discount.value.map(Reduction::Percentage),
        DiscountKind::Fixed => discount_price(db, discount.id)
            .await?
            .map(|price| Reduction::Fixed(price.amount)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(kind: DiscountKind, value: Option<i32>, with_price: bool) -> DiscountInput {
        DiscountInput {
            kind,
            value,
            price: with_price.then(|| DiscountPriceInput {
                amount: 100,
                tax: 0.0,
            }),
        }
    }

    #[test]
    fn percentage_needs_a_value_and_no_price() {
        assert!(input(DiscountKind::Percentage, Some(15), false).check_kind().is_ok());
        assert!(input(DiscountKind::Percentage, None, false).check_kind().is_err());
        assert!(input(DiscountKind::Percentage, Some(15), true).check_kind().is_err());
    }

    #[test]
    fn fixed_needs_a_price_and_no_value() {
        assert!(input(DiscountKind::Fixed, None, true).check_kind().is_ok());
        assert!(input(DiscountKind::Fixed, None, false).check_kind().is_err());
        assert!(input(DiscountKind::Fixed, Some(5), true).check_kind().is_err());
    }

    #[test]
    fn value_above_one_hundred_fails_validation() {
        assert!(input(DiscountKind::Percentage, Some(101), false).validate().is_err());
    }
}

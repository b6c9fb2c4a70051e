pub mod category;
pub mod discount;
pub mod image;
pub mod order;
pub mod order_item;
pub mod payment;
pub mod price;
pub mod product;
pub mod product_category;
pub mod product_price;
pub mod user;

use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    PrimaryKeyTrait, QueryFilter, Schema, Select, Set, TransactionTrait, UpdateMany,
};
use tracing::info;

use crate::config::OwnerSeed;
use crate::services::user::hash_password;

/// Entities that are logically deleted through a `deleted_at` timestamp.
pub trait SoftDelete: EntityTrait {
    fn deleted_at() -> Self::Column;

    /// Default query: soft-deleted rows are excluded.
    fn find_live() -> Select<Self> {
        Self::find().filter(Self::deleted_at().is_null())
    }

    fn find_live_by_id(id: i32) -> Select<Self>
    where
        i32: Into<<Self::PrimaryKey as PrimaryKeyTrait>::ValueType>,
    {
        Self::find_by_id(id).filter(Self::deleted_at().is_null())
    }

    /// `find_live` unless the caller explicitly asked for deleted rows too.
    fn find_scoped(with_deleted: bool) -> Select<Self> {
        if with_deleted {
            Self::find()
        } else {
            Self::find_live()
        }
    }

    /// Update that stamps `deleted_at`; callers add the row filter.
    fn mark_deleted() -> UpdateMany<Self> {
        Self::update_many().col_expr(Self::deleted_at(), Expr::value(Utc::now()))
    }
}

macro_rules! soft_delete {
    ($($module:ident),+ $(,)?) => {
        $(
            impl SoftDelete for $module::Entity {
                fn deleted_at() -> Self::Column {
                    $module::Column::DeletedAt
                }
            }
        )+
    };
}

soft_delete!(product, category, image, price, discount, order);

pub async fn setup_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    // Parents before children so foreign keys resolve on stricter backends.
    let mut statements = vec![
        schema.create_table_from_entity(user::Entity),
        schema.create_table_from_entity(discount::Entity),
        schema.create_table_from_entity(product::Entity),
        schema.create_table_from_entity(image::Entity),
        schema.create_table_from_entity(category::Entity),
        schema.create_table_from_entity(product_category::Entity),
        schema.create_table_from_entity(order::Entity),
        schema.create_table_from_entity(order_item::Entity),
        schema.create_table_from_entity(payment::Entity),
        schema.create_table_from_entity(price::Entity),
        schema.create_table_from_entity(product_price::Entity),
    ];

    for statement in statements.iter_mut() {
        statement.if_not_exists();
        db.execute(backend.build(&*statement)).await?;
    }

    // Storage-level guard for "at most one active price per product".
    db.execute_unprepared(
        "CREATE UNIQUE INDEX IF NOT EXISTS \"idx-product_price-one_active\" \
         ON \"product_price\" (\"product_id\") WHERE \"is_active\"",
    )
    .await?;

    Ok(())
}

/// Creates the first owner account unless one already exists.
pub async fn seed_owner(db: &DatabaseConnection, seed: &OwnerSeed) -> Result<(), DbErr> {
    let existing = user::Entity::find()
        .filter(user::Column::Role.eq(user::Role::Owner))
        .one(db)
        .await?;
    if existing.is_some() {
        return Ok(());
    }

    let password_hash =
        hash_password(&seed.password).map_err(|e| DbErr::Custom(e.to_string()))?;
    let now = Utc::now();
    let owner = user::ActiveModel {
        username: Set(Some(seed.username.clone())),
        email: Set(Some(seed.email.clone())),
        password: Set(Some(password_hash)),
        role: Set(user::Role::Owner),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    let txn = db.begin().await?;
    user::Entity::insert(owner).exec(&txn).await?;
    txn.commit().await?;

    info!(username = %seed.username, "Seeded owner account");
    Ok(())
}

use axum::body::Bytes;
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, QueryFilter, Set, TransactionTrait,
};
use tracing::{error, info};
use uuid::Uuid;

use crate::blob::BlobStore;
use crate::entities::{
    category,
    image::{self, FileExtension},
    product, user, SoftDelete,
};
use crate::error::{CatalogError, CatalogResult};

/// A file taken from a multipart request.
#[derive(Debug, Clone)]
pub struct Upload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl Upload {
    fn extension(&self) -> Option<FileExtension> {
        self.content_type
            .as_deref()
            .and_then(FileExtension::from_content_type)
            .or_else(|| {
                mime_guess::from_path(&self.file_name)
                    .first_raw()
                    .and_then(FileExtension::from_content_type)
            })
    }
}

pub async fn get_image<C: ConnectionTrait>(
    db: &C,
    id: i32,
    with_deleted: bool,
) -> CatalogResult<image::Model> {
    image::Entity::find_scoped(with_deleted)
        .filter(image::Column::Id.eq(id))
        .one(db)
        .await?
        .ok_or_else(|| CatalogError::not_found("Image", id))
}

pub async fn require_live_image<C: ConnectionTrait>(
    db: &C,
    id: i32,
) -> CatalogResult<image::Model> {
    get_image(db, id, false).await
}

/// Resolves every id to a live image, failing on the first one missing.
/// An image already attached to a product other than `owner` is a conflict.
pub async fn resolve_images<C: ConnectionTrait>(
    db: &C,
    ids: &[i32],
    owner: Option<i32>,
) -> CatalogResult<Vec<image::Model>> {
    let found = image::Entity::find_live()
        .filter(image::Column::Id.is_in(ids.to_vec()))
        .all(db)
        .await?;
    if let Some(missing) = ids.iter().find(|id| !found.iter().any(|i| i.id == **id)) {
        return Err(CatalogError::not_found("Image", *missing));
    }
    for image in &found {
        if let Some(other) = image.product_id.filter(|id| Some(*id) != owner) {
            return Err(CatalogError::Conflict(format!(
                "Image {} already belongs to product {other}",
                image.id
            )));
        }
    }
    Ok(found)
}

/// Writes the bytes first, then the record. A record that fails to commit
/// takes its blob with it.
pub async fn upload_image(
    db: &DatabaseConnection,
    blobs: &dyn BlobStore,
    uploader: &user::Model,
    upload: Upload,
) -> CatalogResult<image::Model> {
    let extension = upload.extension().ok_or_else(|| {
        CatalogError::Validation("Only jpeg, png and gif images are accepted".to_string())
    })?;
    if upload.bytes.is_empty() {
        return Err(CatalogError::Validation("Uploaded file is empty".to_string()));
    }

    let path_name = Uuid::new_v4().to_string();
    let key = format!("{path_name}.{extension}");
    let size = upload.bytes.len() as i64;
    let url = blobs.put(&key, upload.bytes).await?;

    let now = Utc::now();
    let record = image::ActiveModel {
        name: Set(upload.file_name),
        url: Set(url),
        path_name: Set(path_name),
        extension: Set(extension),
        size: Set(size),
        user_id: Set(uploader.id),
        product_id: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    let stored = async {
        let txn = db.begin().await?;
        let model = record.insert(&txn).await?;
        txn.commit().await?;
        Ok::<_, CatalogError>(model)
    }
    .await;

    match stored {
        Ok(model) => {
            info!(image_id = model.id, key = %key, size, "Stored image");
            Ok(model)
        }
        Err(err) => {
            if let Err(blob_err) = blobs.remove(&key).await {
                error!(key = %key, error = %blob_err, "Failed to remove orphaned blob");
            }
            Err(err)
        }
    }
}

/// Soft delete keeps the bytes. `force` drops the row, clears thumbnail
/// references to it and then removes the blob.
pub async fn delete_image(
    db: &DatabaseConnection,
    blobs: &dyn BlobStore,
    id: i32,
    force: bool,
) -> CatalogResult<()> {
    let txn = db.begin().await?;
    let image = get_image(&txn, id, force).await?;

    if !force {
        image::Entity::mark_deleted()
            .filter(image::Column::Id.eq(id))
            .exec(&txn)
            .await?;
        txn.commit().await?;
        return Ok(());
    }

    let now = Utc::now();
    product::Entity::update_many()
        .col_expr(product::Column::ThumbnailId, Expr::value(Option::<i32>::None))
        .col_expr(product::Column::UpdatedAt, Expr::value(now))
        .filter(product::Column::ThumbnailId.eq(id))
        .exec(&txn)
        .await?;
    category::Entity::update_many()
        .col_expr(category::Column::ImageId, Expr::value(Option::<i32>::None))
        .col_expr(category::Column::UpdatedAt, Expr::value(now))
        .filter(category::Column::ImageId.eq(id))
        .exec(&txn)
        .await?;
    image::Entity::delete_by_id(id).exec(&txn).await?;
    txn.commit().await?;

    let key = image.blob_key();
    if let Err(err) = blobs.remove(&key).await {
        error!(image_id = id, key = %key, error = %err, "Failed to remove image blob");
    }

    Ok(())
}

use sea_orm::{ConnectionTrait, EntityTrait, PaginatorTrait, Select};
use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, CatalogResult};

pub const MAX_PAGE_SIZE: u64 = 10;

#[derive(Deserialize, Debug, Default, Clone, Copy)]
pub struct PageQuery {
    pub page: Option<u64>,
    pub size: Option<u64>,
}

impl PageQuery {
    /// 1-based page and a size capped at `MAX_PAGE_SIZE`.
    pub fn resolve(&self) -> CatalogResult<(u64, u64)> {
        let page = self.page.unwrap_or(1);
        let size = self.size.unwrap_or(MAX_PAGE_SIZE);
        if page < 1 || size < 1 {
            return Err(CatalogError::Validation(
                "Invalid pagination params".to_string(),
            ));
        }
        Ok((page, size.min(MAX_PAGE_SIZE)))
    }
}

#[derive(Serialize, Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub size: u64,
    pub has_next_page: bool,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            size: self.size,
            has_next_page: self.has_next_page,
        }
    }
}

pub async fn fetch_page<'db, C, E>(
    db: &'db C,
    select: Select<E>,
    query: &PageQuery,
) -> CatalogResult<Page<E::Model>>
where
    C: ConnectionTrait,
    E: EntityTrait,
    E::Model: Send + Sync + 'db,
{
    let (page, size) = query.resolve()?;
    let paginator = select.paginate(db, size);
    let total = paginator.num_items().await?;
    let items = paginator.fetch_page(page - 1).await?;

    Ok(Page {
        items,
        total,
        page,
        size,
        has_next_page: page * size < total,
    })
}

// Catalog entities shared by the importer, the sampler and the store implementations.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reference from a product to its owning category.
///
/// A category created during an import is only assigned a primary key when
/// its batch commits; until then products point at it by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryKey {
    Id(i64),
    Pending(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    /// `None` while the category is staged but not yet committed.
    pub id: Option<i64>,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Category {
    pub fn key(&self) -> CategoryKey {
        match self.id {
            Some(id) => CategoryKey::Id(id),
            None => CategoryKey::Pending(self.name.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: Option<i64>,
    /// External natural key; never changes once set.
    pub identifier: String,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub price_cents: i64,
    pub net_price_cents: i64,
    pub image_url: String,
    pub category: CategoryKey,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Primary key of the owning category, when it has been committed.
    pub fn category_id(&self) -> Option<i64> {
        match self.category {
            CategoryKey::Id(id) => Some(id),
            CategoryKey::Pending(_) => None,
        }
    }
}

/// Unit-of-work write staged against a [`CatalogStore`](super::store::CatalogStore).
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Category(Category),
    Product(Product),
}

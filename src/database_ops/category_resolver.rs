use crate::database_ops::entities::{Category, Entity};
use crate::database_ops::store::CatalogStore;
use crate::normalization::slugify;
use anyhow::Result;
use chrono::Utc;
use tracing::debug;

/// Category name used when a feed row carries neither a usable id nor a name.
pub const DEFAULT_CATEGORY_NAME: &str = "Other";

/// Resolves a feed row's category: by id, then by exact name, else creates it.
///
/// Never mutates an existing category. A newly created category is only staged
/// on the store; it becomes durable with the next commit, together with the
/// product that references it.
#[derive(Debug, Clone)]
pub struct CategoryResolver {
    default_name: String,
}

impl Default for CategoryResolver {
    fn default() -> Self {
        Self::new(DEFAULT_CATEGORY_NAME)
    }
}

impl CategoryResolver {
    pub fn new(default_name: impl Into<String>) -> Self {
        Self {
            default_name: default_name.into(),
        }
    }

    pub fn default_name(&self) -> &str {
        &self.default_name
    }

    pub async fn resolve<S: CatalogStore + ?Sized>(
        &self,
        store: &mut S,
        category_id: Option<&str>,
        category_name: Option<&str>,
    ) -> Result<Category> {
        // An id that does not parse can never match a primary key.
        if let Some(id) = category_id
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .and_then(|s| s.parse::<i64>().ok())
        {
            if let Some(found) = store.find_category_by_id(id).await? {
                return Ok(found);
            }
            debug!(category_id = id, "category id not found; falling back to name");
        }

        let name = category_name
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(self.default_name.as_str());
        if let Some(found) = store.find_category_by_name(name).await? {
            return Ok(found);
        }

        let now = Utc::now();
        let created = Category {
            id: None,
            name: name.to_string(),
            slug: slugify(name),
            description: None,
            created_at: now,
            updated_at: now,
        };
        debug!(name = %created.name, slug = %created.slug, "staging new category");
        store.stage_write(Entity::Category(created.clone()));
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database_ops::entities::CategoryKey;
    use crate::database_ops::memory_store::MemoryCatalogStore;

    #[tokio::test]
    async fn id_wins_over_name() {
        let mut store = MemoryCatalogStore::new();
        store.seed_category(42, "Kitchen", "kitchen");
        store.seed_category(43, "X", "x");

        let cat = CategoryResolver::default()
            .resolve(&mut store, Some("42"), Some("X"))
            .await
            .unwrap();
        assert_eq!(cat.id, Some(42));
        assert_eq!(cat.name, "Kitchen");
        assert_eq!(store.staged_write_count(), 0);
    }

    #[tokio::test]
    async fn missing_id_falls_back_to_name() {
        let mut store = MemoryCatalogStore::new();
        store.seed_category(5, "Garden", "garden");

        let resolver = CategoryResolver::default();
        let cat = resolver
            .resolve(&mut store, Some("999"), Some("Garden"))
            .await
            .unwrap();
        assert_eq!(cat.id, Some(5));

        let cat = resolver
            .resolve(&mut store, Some("not-a-number"), Some("Garden"))
            .await
            .unwrap();
        assert_eq!(cat.id, Some(5));
    }

    #[tokio::test]
    async fn unknown_name_creates_exactly_one_category() {
        let mut store = MemoryCatalogStore::new();
        let resolver = CategoryResolver::default();

        let first = resolver
            .resolve(&mut store, None, Some("NewCat"))
            .await
            .unwrap();
        assert_eq!(first.key(), CategoryKey::Pending("NewCat".into()));
        assert_eq!(first.slug, "newcat");
        assert!(first.description.is_none());
        assert_eq!(first.created_at, first.updated_at);

        // Same unit of work: served from the identity map, not created again.
        let second = resolver
            .resolve(&mut store, None, Some("NewCat"))
            .await
            .unwrap();
        assert_eq!(second, first);
        assert_eq!(store.staged_write_count(), 1);

        store.commit().await.unwrap();
        let cats = store.categories();
        assert_eq!(cats.len(), 1);
        assert_eq!(cats[0].name, "NewCat");
    }

    #[tokio::test]
    async fn blank_name_uses_default() {
        let mut store = MemoryCatalogStore::new();
        let cat = CategoryResolver::new("Egyéb")
            .resolve(&mut store, Some(""), Some("  "))
            .await
            .unwrap();
        assert_eq!(cat.name, "Egyéb");
        assert_eq!(cat.slug, "egyeb");
    }
}

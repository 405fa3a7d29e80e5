// In-process catalog store: backs `import --dry-run` and the importer/sampler tests.

use crate::database_ops::entities::{Category, CategoryKey, Entity, Product};
use crate::database_ops::store::{CatalogReader, CatalogStore, UnitOfWork};
use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use rand::seq::SliceRandom;
use std::collections::{BTreeMap, HashMap};

/// Catalog kept entirely in memory with the same unit-of-work contract as the
/// Postgres store (including unique identifier/slug/category-name rules).
#[derive(Default)]
pub struct MemoryCatalogStore {
    categories: BTreeMap<i64, Category>,
    products: BTreeMap<i64, Product>,
    next_category_id: i64,
    next_product_id: i64,
    unit: UnitOfWork,
    commits: usize,
    staged_total: usize,
    reverse_fetch_order: bool,
}

impl MemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an already-committed category, as catalog administration would.
    pub fn seed_category(&mut self, id: i64, name: &str, slug: &str) -> Category {
        let now = chrono::Utc::now();
        let category = Category {
            id: Some(id),
            name: name.to_string(),
            slug: slug.to_string(),
            description: None,
            created_at: now,
            updated_at: now,
        };
        self.categories.insert(id, category.clone());
        self.next_category_id = self.next_category_id.max(id);
        category
    }

    /// Make `fetch_products_by_ids` answer in descending key order, the way a
    /// storage engine is free to.
    pub fn with_reversed_fetch_order(mut self) -> Self {
        self.reverse_fetch_order = true;
        self
    }

    pub fn commit_count(&self) -> usize {
        self.commits
    }

    /// Every write staged over the lifetime of the store.
    pub fn staged_write_count(&self) -> usize {
        self.staged_total
    }

    /// Entities currently held by the unit of work.
    pub fn identity_cache_len(&self) -> usize {
        self.unit.cached_len()
    }

    pub fn categories(&self) -> Vec<Category> {
        self.categories.values().cloned().collect()
    }

    pub fn products(&self) -> Vec<Product> {
        self.products.values().cloned().collect()
    }

    pub fn product_by_identifier(&self, identifier: &str) -> Option<&Product> {
        self.products.values().find(|p| p.identifier == identifier)
    }

    pub fn delete_product(&mut self, id: i64) -> Option<Product> {
        self.products.remove(&id)
    }

    fn committed_category_by_name(&self, name: &str) -> Option<&Category> {
        self.categories.values().find(|c| c.name == name)
    }

    fn apply_category(&mut self, mut category: Category) -> Result<i64> {
        if let Some(id) = category.id {
            if !self.categories.contains_key(&id) {
                bail!("category {id} vanished before commit");
            }
            self.categories.insert(id, category);
            return Ok(id);
        }
        // Unique on name: a concurrent writer may have created it first.
        if let Some(existing) = self.committed_category_by_name(&category.name) {
            return existing
                .id
                .ok_or_else(|| anyhow!("committed category without id"));
        }
        self.next_category_id += 1;
        let id = self.next_category_id;
        category.id = Some(id);
        self.categories.insert(id, category);
        Ok(id)
    }

    /// `created` holds the categories applied earlier in the same commit; a
    /// pending key can only bind to one of those.
    fn apply_product(
        &mut self,
        mut product: Product,
        created: &HashMap<String, i64>,
    ) -> Result<i64> {
        if let CategoryKey::Pending(name) = &product.category {
            let id = *created
                .get(name)
                .ok_or_else(|| anyhow!("category '{name}' was never staged"))?;
            product.category = CategoryKey::Id(id);
        }
        let CategoryKey::Id(category_id) = product.category else {
            bail!("product {} has no category", product.identifier);
        };
        if !self.categories.contains_key(&category_id) {
            bail!(
                "product {} references unknown category {category_id}",
                product.identifier
            );
        }

        let existing_id = product.id.or_else(|| {
            self.product_by_identifier(&product.identifier)
                .and_then(|p| p.id)
        });
        if let Some(clash) = self
            .products
            .values()
            .find(|p| p.slug == product.slug && p.identifier != product.identifier)
        {
            bail!(
                "duplicate product slug '{}' (already used by {})",
                product.slug,
                clash.identifier
            );
        }

        let id = match existing_id {
            Some(id) => {
                if let Some(current) = self.products.get(&id) {
                    product.created_at = current.created_at;
                    product.identifier = current.identifier.clone();
                }
                id
            }
            None => {
                self.next_product_id += 1;
                self.next_product_id
            }
        };
        product.id = Some(id);
        self.products.insert(id, product);
        Ok(id)
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn find_product_by_identifier(&mut self, identifier: &str) -> Result<Option<Product>> {
        if let Some(p) = self.unit.product(identifier) {
            return Ok(Some(p.clone()));
        }
        let found = self.product_by_identifier(identifier).cloned();
        if let Some(p) = &found {
            self.unit.remember_product(p.clone());
        }
        Ok(found)
    }

    async fn find_category_by_id(&mut self, id: i64) -> Result<Option<Category>> {
        if let Some(c) = self.unit.category_by_id(id) {
            return Ok(Some(c.clone()));
        }
        let found = self.categories.get(&id).cloned();
        if let Some(c) = &found {
            self.unit.remember_category(c.clone());
        }
        Ok(found)
    }

    async fn find_category_by_name(&mut self, name: &str) -> Result<Option<Category>> {
        if let Some(c) = self.unit.category_by_name(name) {
            return Ok(Some(c.clone()));
        }
        let found = self.committed_category_by_name(name).cloned();
        if let Some(c) = &found {
            self.unit.remember_category(c.clone());
        }
        Ok(found)
    }

    fn stage_write(&mut self, entity: Entity) {
        self.staged_total += 1;
        self.unit.stage(entity);
    }

    async fn commit(&mut self) -> Result<()> {
        let staged = self.unit.take_staged();
        // all-or-nothing, like a database transaction
        let snapshot = (
            self.categories.clone(),
            self.products.clone(),
            self.next_category_id,
            self.next_product_id,
        );
        let mut created: HashMap<String, i64> = HashMap::new();
        for entity in staged {
            let applied = match entity {
                Entity::Category(c) => {
                    let name = c.name.clone();
                    self.apply_category(c).map(|id| {
                        created.insert(name, id);
                        id
                    })
                }
                Entity::Product(p) => self.apply_product(p, &created),
            };
            if let Err(e) = applied {
                (
                    self.categories,
                    self.products,
                    self.next_category_id,
                    self.next_product_id,
                ) = snapshot;
                return Err(e);
            }
        }
        self.commits += 1;
        Ok(())
    }

    fn release_identity_cache(&mut self) {
        self.unit.release();
    }
}

#[async_trait]
impl CatalogReader for MemoryCatalogStore {
    async fn select_random_product_ids(&self, limit: i64) -> Result<Vec<i64>> {
        let mut ids: Vec<i64> = self.products.keys().copied().collect();
        ids.shuffle(&mut rand::thread_rng());
        ids.truncate(usize::try_from(limit.max(0)).unwrap_or(0));
        Ok(ids)
    }

    async fn fetch_products_by_ids(&self, ids: &[i64]) -> Result<Vec<Product>> {
        let mut out: Vec<Product> = self
            .products
            .values()
            .filter(|p| p.id.is_some_and(|id| ids.contains(&id)))
            .cloned()
            .collect();
        if self.reverse_fetch_order {
            out.reverse();
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn product(identifier: &str, slug: &str, category: CategoryKey) -> Product {
        let now = Utc::now();
        Product {
            id: None,
            identifier: identifier.to_string(),
            name: identifier.to_string(),
            slug: slug.to_string(),
            description: "d".into(),
            price_cents: 100,
            net_price_cents: 80,
            image_url: String::new(),
            category,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn staged_writes_are_invisible_until_commit() {
        let mut store = MemoryCatalogStore::new();
        store.seed_category(1, "Tools", "tools");
        store.stage_write(Entity::Product(product("A1", "a1", CategoryKey::Id(1))));

        assert!(store.products().is_empty());
        // ...but the unit of work already serves it
        assert!(store.find_product_by_identifier("A1").await.unwrap().is_some());

        store.commit().await.unwrap();
        assert_eq!(store.products().len(), 1);
        assert_eq!(store.commit_count(), 1);
    }

    #[tokio::test]
    async fn pending_category_is_bound_on_commit() {
        let mut store = MemoryCatalogStore::new();
        let now = Utc::now();
        store.stage_write(Entity::Category(Category {
            id: None,
            name: "Garden".into(),
            slug: "garden".into(),
            description: None,
            created_at: now,
            updated_at: now,
        }));
        store.stage_write(Entity::Product(product(
            "G1",
            "g1",
            CategoryKey::Pending("Garden".into()),
        )));
        store.commit().await.unwrap();

        let cats = store.categories();
        assert_eq!(cats.len(), 1);
        let p = store.product_by_identifier("G1").unwrap();
        assert_eq!(p.category_id(), cats[0].id);
    }

    #[tokio::test]
    async fn duplicate_category_name_reuses_existing_row() {
        let mut store = MemoryCatalogStore::new();
        store.seed_category(7, "Garden", "garden");
        let now = Utc::now();
        store.stage_write(Entity::Category(Category {
            id: None,
            name: "Garden".into(),
            slug: "garden".into(),
            description: None,
            created_at: now,
            updated_at: now,
        }));
        store.commit().await.unwrap();
        assert_eq!(store.categories().len(), 1);
    }

    #[tokio::test]
    async fn slug_clash_between_identifiers_is_rejected() {
        let mut store = MemoryCatalogStore::new();
        store.seed_category(1, "Tools", "tools");
        store.stage_write(Entity::Product(product("A1", "same", CategoryKey::Id(1))));
        store.stage_write(Entity::Product(product("A2", "same", CategoryKey::Id(1))));
        let err = store.commit().await.unwrap_err();
        assert!(err.to_string().contains("duplicate product slug"));
    }

    #[tokio::test]
    async fn pending_key_needs_category_staged_in_same_commit() {
        let mut store = MemoryCatalogStore::new();
        store.seed_category(3, "Garden", "garden");
        store.stage_write(Entity::Product(product(
            "G2",
            "g2",
            CategoryKey::Pending("Garden".into()),
        )));
        let err = store.commit().await.unwrap_err();
        assert!(err.to_string().contains("never staged"));
        assert!(store.products().is_empty());
        assert_eq!(store.commit_count(), 0);
    }

    #[tokio::test]
    async fn release_drops_identity_cache() {
        let mut store = MemoryCatalogStore::new();
        store.seed_category(1, "Tools", "tools");
        store.find_category_by_id(1).await.unwrap();
        assert!(store.identity_cache_len() > 0);
        store.release_identity_cache();
        assert_eq!(store.identity_cache_len(), 0);
    }
}

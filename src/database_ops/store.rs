use crate::database_ops::entities::{Category, Entity, Product};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// Write side of the catalog store, shaped as a unit of work.
///
/// Lookups see both committed rows and writes staged since the last
/// [`commit`](CatalogStore::commit). Nothing reaches durable storage before
/// `commit`; after it, [`release_identity_cache`](CatalogStore::release_identity_cache)
/// drops every entity the unit of work is holding so a long import stays bounded.
#[async_trait]
pub trait CatalogStore: Send {
    async fn find_product_by_identifier(&mut self, identifier: &str) -> Result<Option<Product>>;

    async fn find_category_by_id(&mut self, id: i64) -> Result<Option<Category>>;

    async fn find_category_by_name(&mut self, name: &str) -> Result<Option<Category>>;

    fn stage_write(&mut self, entity: Entity);

    async fn commit(&mut self) -> Result<()>;

    fn release_identity_cache(&mut self);
}

/// Read side used by the random sampler.
#[async_trait]
pub trait CatalogReader: Send + Sync {
    /// Primary keys in an engine-randomized order, at most `limit` of them.
    async fn select_random_product_ids(&self, limit: i64) -> Result<Vec<i64>>;

    /// Products for the given keys. Order is unspecified and missing keys are
    /// simply absent from the result.
    async fn fetch_products_by_ids(&self, ids: &[i64]) -> Result<Vec<Product>>;
}

/// Identity map plus pending writes, shared by the store implementations.
///
/// Staging a write also records the entity, so later lookups in the same
/// batch see it before it is committed.
#[derive(Debug, Default)]
pub struct UnitOfWork {
    products: HashMap<String, Product>,
    categories_by_id: HashMap<i64, Category>,
    categories_by_name: HashMap<String, Category>,
    staged: Vec<Entity>,
}

impl UnitOfWork {
    pub fn product(&self, identifier: &str) -> Option<&Product> {
        self.products.get(identifier)
    }

    pub fn category_by_id(&self, id: i64) -> Option<&Category> {
        self.categories_by_id.get(&id)
    }

    pub fn category_by_name(&self, name: &str) -> Option<&Category> {
        self.categories_by_name.get(name)
    }

    pub fn remember_product(&mut self, product: Product) {
        self.products.insert(product.identifier.clone(), product);
    }

    pub fn remember_category(&mut self, category: Category) {
        if let Some(id) = category.id {
            self.categories_by_id.insert(id, category.clone());
        }
        self.categories_by_name
            .insert(category.name.clone(), category);
    }

    pub fn stage(&mut self, entity: Entity) {
        match &entity {
            Entity::Category(c) => self.remember_category(c.clone()),
            Entity::Product(p) => self.remember_product(p.clone()),
        }
        self.staged.push(entity);
    }

    pub fn take_staged(&mut self) -> Vec<Entity> {
        std::mem::take(&mut self.staged)
    }

    pub fn has_staged(&self) -> bool {
        !self.staged.is_empty()
    }

    /// Number of entities held in the identity map.
    pub fn cached_len(&self) -> usize {
        self.products.len() + self.categories_by_id.len() + self.categories_by_name.len()
    }

    /// Forget every loaded entity. Pending writes are kept.
    pub fn release(&mut self) {
        self.products = HashMap::new();
        self.categories_by_id = HashMap::new();
        self.categories_by_name = HashMap::new();
    }
}

// Postgres-backed catalog store. Expects the tables described in schema/catalog.sql.

use crate::database_ops::db::{Db, Engine};
use crate::database_ops::entities::{Category, CategoryKey, Entity, Product};
use crate::database_ops::store::{CatalogReader, CatalogStore, UnitOfWork};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, Row};
use std::collections::HashMap;
use tracing::{debug, instrument};

const PRODUCT_COLUMNS: &str = "id, identifier, category_id, name, slug, description, \
     price_cents, net_price_cents, image_url, created_at, updated_at";

const CATEGORY_COLUMNS: &str = "id, name, slug, description, created_at, updated_at";

fn product_from_row(r: &PgRow) -> Result<Product> {
    Ok(Product {
        id: Some(r.try_get("id")?),
        identifier: r.try_get("identifier")?,
        name: r.try_get("name")?,
        slug: r.try_get("slug")?,
        description: r.try_get("description")?,
        price_cents: r.try_get("price_cents")?,
        net_price_cents: r.try_get("net_price_cents")?,
        image_url: r.try_get("image_url")?,
        category: CategoryKey::Id(r.try_get("category_id")?),
        created_at: r.try_get("created_at")?,
        updated_at: r.try_get("updated_at")?,
    })
}

fn category_from_row(r: &PgRow) -> Result<Category> {
    Ok(Category {
        id: Some(r.try_get("id")?),
        name: r.try_get("name")?,
        slug: r.try_get("slug")?,
        description: r.try_get("description")?,
        created_at: r.try_get("created_at")?,
        updated_at: r.try_get("updated_at")?,
    })
}

/// Unit-of-work writer used by the importer. One instance per import run.
pub struct PgCatalogStore {
    db: Db,
    unit: UnitOfWork,
}

impl PgCatalogStore {
    pub fn new(db: Db) -> Self {
        Self {
            db,
            unit: UnitOfWork::default(),
        }
    }

    pub fn db(&self) -> &Db {
        &self.db
    }
}

// Categories are unique on name; losing an insert race means reading the winner.
async fn insert_category(conn: &mut PgConnection, c: &Category) -> Result<i64> {
    let inserted: Option<i64> = sqlx::query_scalar(
        "INSERT INTO categories (name, slug, description, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5)
         ON CONFLICT (name) DO NOTHING
         RETURNING id",
    )
    .bind(&c.name)
    .bind(&c.slug)
    .bind(&c.description)
    .bind(c.created_at)
    .bind(c.updated_at)
    .fetch_optional(&mut *conn)
    .await
    .with_context(|| format!("insert category '{}'", c.name))?;
    if let Some(id) = inserted {
        return Ok(id);
    }
    debug!(name = %c.name, "category already present; reusing existing row");
    let id: i64 = sqlx::query_scalar("SELECT id FROM categories WHERE name = $1")
        .bind(&c.name)
        .fetch_one(&mut *conn)
        .await
        .with_context(|| format!("re-fetch category '{}'", c.name))?;
    Ok(id)
}

async fn upsert_product(conn: &mut PgConnection, p: &Product, category_id: i64) -> Result<()> {
    let result = match p.id {
        Some(id) => {
            sqlx::query(
                "UPDATE products
                 SET category_id = $2, name = $3, slug = $4, description = $5,
                     price_cents = $6, net_price_cents = $7, image_url = $8, updated_at = $9
                 WHERE id = $1",
            )
            .bind(id)
            .bind(category_id)
            .bind(&p.name)
            .bind(&p.slug)
            .bind(&p.description)
            .bind(p.price_cents)
            .bind(p.net_price_cents)
            .bind(&p.image_url)
            .bind(p.updated_at)
            .execute(&mut *conn)
            .await
        }
        None => {
            sqlx::query(
                "INSERT INTO products (identifier, category_id, name, slug, description,
                                       price_cents, net_price_cents, image_url, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                 ON CONFLICT (identifier) DO UPDATE
                 SET category_id = EXCLUDED.category_id,
                     name = EXCLUDED.name,
                     slug = EXCLUDED.slug,
                     description = EXCLUDED.description,
                     price_cents = EXCLUDED.price_cents,
                     net_price_cents = EXCLUDED.net_price_cents,
                     image_url = EXCLUDED.image_url,
                     updated_at = EXCLUDED.updated_at",
            )
            .bind(&p.identifier)
            .bind(category_id)
            .bind(&p.name)
            .bind(&p.slug)
            .bind(&p.description)
            .bind(p.price_cents)
            .bind(p.net_price_cents)
            .bind(&p.image_url)
            .bind(p.created_at)
            .bind(p.updated_at)
            .execute(&mut *conn)
            .await
        }
    };
    result.with_context(|| format!("upsert product '{}'", p.identifier))?;
    Ok(())
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn find_product_by_identifier(&mut self, identifier: &str) -> Result<Option<Product>> {
        if let Some(p) = self.unit.product(identifier) {
            return Ok(Some(p.clone()));
        }
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE identifier = $1");
        let row = sqlx::query(&sql)
            .bind(identifier)
            .fetch_optional(&self.db.pool)
            .await?;
        let found = row.as_ref().map(product_from_row).transpose()?;
        if let Some(p) = &found {
            self.unit.remember_product(p.clone());
        }
        Ok(found)
    }

    async fn find_category_by_id(&mut self, id: i64) -> Result<Option<Category>> {
        if let Some(c) = self.unit.category_by_id(id) {
            return Ok(Some(c.clone()));
        }
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.db.pool)
            .await?;
        let found = row.as_ref().map(category_from_row).transpose()?;
        if let Some(c) = &found {
            self.unit.remember_category(c.clone());
        }
        Ok(found)
    }

    async fn find_category_by_name(&mut self, name: &str) -> Result<Option<Category>> {
        if let Some(c) = self.unit.category_by_name(name) {
            return Ok(Some(c.clone()));
        }
        let sql = format!("SELECT {CATEGORY_COLUMNS} FROM categories WHERE name = $1 ORDER BY id LIMIT 1");
        let row = sqlx::query(&sql)
            .bind(name)
            .fetch_optional(&self.db.pool)
            .await?;
        let found = row.as_ref().map(category_from_row).transpose()?;
        if let Some(c) = &found {
            self.unit.remember_category(c.clone());
        }
        Ok(found)
    }

    fn stage_write(&mut self, entity: Entity) {
        self.unit.stage(entity);
    }

    /// Apply every staged write inside one transaction.
    #[instrument(skip(self))]
    async fn commit(&mut self) -> Result<()> {
        if !self.unit.has_staged() {
            return Ok(());
        }
        let staged = self.unit.take_staged();
        let mut tx = self.db.pool.begin().await.context("begin import batch")?;
        let mut created: HashMap<String, i64> = HashMap::new();
        let mut products = 0usize;

        for entity in &staged {
            match entity {
                Entity::Category(c) => {
                    let id = match c.id {
                        Some(id) => id,
                        None => insert_category(&mut tx, c).await?,
                    };
                    created.insert(c.name.clone(), id);
                }
                Entity::Product(p) => {
                    let category_id = match &p.category {
                        CategoryKey::Id(id) => *id,
                        CategoryKey::Pending(name) => *created
                            .get(name)
                            .ok_or_else(|| anyhow!("category '{name}' was never staged"))?,
                    };
                    upsert_product(&mut tx, p, category_id).await?;
                    products += 1;
                }
            }
        }

        tx.commit().await.context("commit import batch")?;
        debug!(
            writes = staged.len(),
            products,
            categories = created.len(),
            "batch applied"
        );
        Ok(())
    }

    fn release_identity_cache(&mut self) {
        self.unit.release();
    }
}

/// Read side for the sampler. The random-ordering expression is chosen once,
/// from the engine the pool is connected to.
#[derive(Clone)]
pub struct PgCatalogReader {
    db: Db,
    random_primitive: &'static str,
}

impl PgCatalogReader {
    pub async fn connect(db: Db) -> Result<Self> {
        let engine = db.detect_engine().await?;
        Ok(Self::with_engine(db, engine))
    }

    pub fn with_engine(db: Db, engine: Engine) -> Self {
        Self {
            db,
            random_primitive: engine.random_primitive(),
        }
    }

    pub fn db(&self) -> &Db {
        &self.db
    }
}

#[async_trait]
impl CatalogReader for PgCatalogReader {
    async fn select_random_product_ids(&self, limit: i64) -> Result<Vec<i64>> {
        // random_primitive comes from a fixed table, never from input
        let sql = format!(
            "SELECT id FROM products ORDER BY {} LIMIT $1",
            self.random_primitive
        );
        let ids: Vec<i64> = sqlx::query_scalar(&sql)
            .bind(limit)
            .fetch_all(&self.db.pool)
            .await
            .context("select random product ids")?;
        Ok(ids)
    }

    async fn fetch_products_by_ids(&self, ids: &[i64]) -> Result<Vec<Product>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1)");
        let rows = sqlx::query(&sql)
            .bind(ids)
            .fetch_all(&self.db.pool)
            .await
            .context("fetch products by id")?;
        rows.iter().map(product_from_row).collect()
    }
}

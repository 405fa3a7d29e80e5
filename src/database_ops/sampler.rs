use crate::database_ops::entities::Product;
use crate::database_ops::store::CatalogReader;
use anyhow::Result;
use std::collections::HashMap;
use tracing::debug;

pub const MIN_SAMPLE: i64 = 1;
pub const MAX_SAMPLE: i64 = 12;
pub const DEFAULT_SAMPLE: i64 = 4;

/// Clamp a requested sample size into `[MIN_SAMPLE, MAX_SAMPLE]`.
pub fn clamp_count(requested: i64) -> i64 {
    requested.clamp(MIN_SAMPLE, MAX_SAMPLE)
}

/// Lenient parsing for query-string input: absent or non-numeric means
/// [`DEFAULT_SAMPLE`]; anything numeric is clamped.
pub fn parse_count(raw: Option<&str>) -> i64 {
    let requested = raw
        .and_then(|s| s.trim().parse::<i64>().ok())
        .unwrap_or(DEFAULT_SAMPLE);
    clamp_count(requested)
}

/// Two-phase random sample of the catalog.
///
/// Phase one asks the engine for a random ordering of primary keys only;
/// phase two loads the full products in one batch and re-projects them onto
/// the phase-one order. Keys that no longer resolve are dropped.
pub struct RandomSampler<R> {
    reader: R,
}

impl<R: CatalogReader> RandomSampler<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    /// `None` samples [`DEFAULT_SAMPLE`] products.
    pub async fn sample(&self, count: Option<i64>) -> Result<Vec<Product>> {
        let limit = clamp_count(count.unwrap_or(DEFAULT_SAMPLE));
        let ids = self.reader.select_random_product_ids(limit).await?;
        if ids.is_empty() {
            debug!(limit, "no products to sample");
            return Ok(Vec::new());
        }

        let fetched = self.reader.fetch_products_by_ids(&ids).await?;
        let ordered = reorder_by_ids(&ids, fetched);
        debug!(
            requested = ?count,
            limit,
            selected = ids.len(),
            resolved = ordered.len(),
            "random sample"
        );
        Ok(ordered)
    }
}

/// Emit `products` in the order of `ids`, omitting ids with no product.
fn reorder_by_ids(ids: &[i64], products: Vec<Product>) -> Vec<Product> {
    let mut by_id: HashMap<i64, Product> = products
        .into_iter()
        .filter_map(|p| p.id.map(|id| (id, p)))
        .collect();
    ids.iter().filter_map(|id| by_id.remove(id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database_ops::entities::CategoryKey;
    use crate::database_ops::importer::CatalogImporter;
    use crate::database_ops::memory_store::MemoryCatalogStore;
    use async_trait::async_trait;
    use chrono::Utc;

    fn product(id: i64) -> Product {
        let now = Utc::now();
        Product {
            id: Some(id),
            identifier: format!("P{id}"),
            name: format!("Product {id}"),
            slug: format!("product-{id}"),
            description: String::new(),
            price_cents: 0,
            net_price_cents: 0,
            image_url: String::new(),
            category: CategoryKey::Id(1),
            created_at: now,
            updated_at: now,
        }
    }

    /// Fixed "random" order; fetch answers sorted by key and only knows `present`.
    struct ScriptedReader {
        order: Vec<i64>,
        present: Vec<i64>,
    }

    #[async_trait]
    impl CatalogReader for ScriptedReader {
        async fn select_random_product_ids(&self, limit: i64) -> Result<Vec<i64>> {
            Ok(self.order.iter().copied().take(limit as usize).collect())
        }

        async fn fetch_products_by_ids(&self, ids: &[i64]) -> Result<Vec<Product>> {
            let mut hits: Vec<i64> = self
                .present
                .iter()
                .copied()
                .filter(|id| ids.contains(id))
                .collect();
            hits.sort_unstable();
            Ok(hits.into_iter().map(product).collect())
        }
    }

    async fn seeded_store(count: usize) -> MemoryCatalogStore {
        let mut store = MemoryCatalogStore::new().with_reversed_fetch_order();
        let mut feed = String::from("identifier;name;category;price;net_price\n");
        for i in 0..count {
            feed.push_str(&format!("S{i};Item {i};Misc;1;1\n"));
        }
        CatalogImporter::default()
            .import_reader(&mut store, feed.as_bytes())
            .await
            .unwrap();
        store
    }

    #[test]
    fn clamps_and_parses_counts() {
        assert_eq!(clamp_count(100), 12);
        assert_eq!(clamp_count(0), 1);
        assert_eq!(clamp_count(-3), 1);
        assert_eq!(clamp_count(7), 7);
        assert_eq!(parse_count(None), 4);
        assert_eq!(parse_count(Some("abc")), 4);
        assert_eq!(parse_count(Some(" 9 ")), 9);
        assert_eq!(parse_count(Some("0")), 1);
        assert_eq!(parse_count(Some("50")), 12);
    }

    #[tokio::test]
    async fn keeps_phase_one_order_despite_fetch_order() {
        let sampler = RandomSampler::new(ScriptedReader {
            order: vec![30, 10, 20],
            present: vec![10, 20, 30],
        });
        let out = sampler.sample(Some(3)).await.unwrap();
        let ids: Vec<i64> = out.iter().filter_map(|p| p.id).collect();
        assert_eq!(ids, vec![30, 10, 20]);
    }

    #[tokio::test]
    async fn omits_ids_that_vanished_between_phases() {
        let sampler = RandomSampler::new(ScriptedReader {
            order: vec![5, 6, 7, 8],
            present: vec![5, 8],
        });
        let out = sampler.sample(None).await.unwrap();
        let ids: Vec<i64> = out.iter().filter_map(|p| p.id).collect();
        assert_eq!(ids, vec![5, 8]);
    }

    #[tokio::test]
    async fn empty_catalog_yields_empty_sample() {
        let sampler = RandomSampler::new(MemoryCatalogStore::new());
        assert!(sampler.sample(Some(5)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sample_sizes_are_clamped() {
        let sampler = RandomSampler::new(seeded_store(20).await);
        assert_eq!(sampler.sample(Some(100)).await.unwrap().len(), 12);
        assert_eq!(sampler.sample(Some(0)).await.unwrap().len(), 1);
        assert_eq!(sampler.sample(None).await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn small_catalog_returns_everything_once() {
        let sampler = RandomSampler::new(seeded_store(3).await);
        let out = sampler.sample(Some(12)).await.unwrap();
        assert_eq!(out.len(), 3);
        let mut ids: Vec<i64> = out.iter().filter_map(|p| p.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn reorder_follows_id_sequence() {
        let out = reorder_by_ids(&[3, 1, 2], vec![product(1), product(2), product(3)]);
        let ids: Vec<i64> = out.iter().filter_map(|p| p.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }
}

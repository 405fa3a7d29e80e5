// Catalog feed importer: `;`-separated product rows upserted by identifier,
// committed in fixed-size batches.

use crate::database_ops::category_resolver::{CategoryResolver, DEFAULT_CATEGORY_NAME};
use crate::database_ops::entities::{Entity, Product};
use crate::database_ops::store::CatalogStore;
use crate::normalization::{parse_price_cents, slugify};
use crate::util::env as env_util;
use chrono::Utc;
use csv::{ReaderBuilder, StringRecord};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, instrument};

pub const DEFAULT_BATCH_SIZE: usize = 200;
pub const PLACEHOLDER_DESCRIPTION: &str = "Lorem ipsum dolor sit amet.";

const BOM: char = '\u{feff}';

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("feed not found: {}", path.display())]
    SourceNotFound { path: PathBuf },
    #[error("failed to open feed {}: {source}", path.display())]
    SourceUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("feed header is missing or empty (data row on line {line})")]
    MissingHeader { line: u64 },
    #[error("malformed feed: {0}")]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub imported: u64,
    pub updated: u64,
    pub skipped: u64,
}

impl fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Imported: {}, Updated: {}, Skipped: {}",
            self.imported, self.updated, self.skipped
        )
    }
}

#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Rows upserted between two commits. Clamped to at least 1.
    pub batch_size: usize,
    pub default_category: String,
    pub placeholder_description: String,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            default_category: DEFAULT_CATEGORY_NAME.to_string(),
            placeholder_description: PLACEHOLDER_DESCRIPTION.to_string(),
        }
    }
}

impl ImportOptions {
    /// IMPORT_BATCH_SIZE / IMPORT_DEFAULT_CATEGORY / IMPORT_PLACEHOLDER_DESCRIPTION
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            batch_size: env_util::env_parse("IMPORT_BATCH_SIZE", defaults.batch_size).max(1),
            default_category: env_util::env_opt("IMPORT_DEFAULT_CATEGORY")
                .unwrap_or(defaults.default_category),
            placeholder_description: env_util::env_opt("IMPORT_PLACEHOLDER_DESCRIPTION")
                .unwrap_or(defaults.placeholder_description),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}

/// Column positions keyed by lower-cased, trimmed header name.
#[derive(Debug, Default)]
struct FeedHeader {
    columns: HashMap<String, usize>,
}

impl FeedHeader {
    fn parse(record: &StringRecord) -> Self {
        let mut columns = HashMap::new();
        for (idx, raw) in record.iter().enumerate() {
            let raw = if idx == 0 {
                raw.trim_start_matches(BOM)
            } else {
                raw
            };
            let name = raw.trim().to_lowercase();
            if !name.is_empty() {
                // a repeated column name maps to its last occurrence
                columns.insert(name, idx);
            }
        }
        Self { columns }
    }

    fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Trimmed cell; `None` when the column is absent or the row is short.
    fn cell<'r>(&self, record: &'r StringRecord, column: &str) -> Option<&'r str> {
        let idx = *self.columns.get(column)?;
        record.get(idx).map(str::trim)
    }

    fn non_blank<'r>(&self, record: &'r StringRecord, column: &str) -> Option<&'r str> {
        self.cell(record, column).filter(|s| !s.is_empty())
    }
}

fn is_blank(record: &StringRecord) -> bool {
    record.iter().all(|v| v.trim().is_empty())
}

enum RowOutcome {
    Imported,
    Updated,
    Skipped,
}

pub struct CatalogImporter {
    options: ImportOptions,
    resolver: CategoryResolver,
}

impl Default for CatalogImporter {
    fn default() -> Self {
        Self::new(ImportOptions::default())
    }
}

impl CatalogImporter {
    pub fn new(options: ImportOptions) -> Self {
        let resolver = CategoryResolver::new(options.default_category.clone());
        Self { options, resolver }
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    /// Import a feed file. Fails before reading anything when the file is absent.
    #[instrument(skip(self, store), fields(batch_size = self.options.batch_size))]
    pub async fn import_path<S: CatalogStore + ?Sized>(
        &self,
        store: &mut S,
        path: &Path,
    ) -> Result<ImportSummary, ImportError> {
        if !path.is_file() {
            return Err(ImportError::SourceNotFound {
                path: path.to_path_buf(),
            });
        }
        let file = File::open(path).map_err(|source| ImportError::SourceUnreadable {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "importing catalog feed");
        self.import_reader(store, BufReader::with_capacity(1 << 20, file))
            .await
    }

    /// Import from any byte source.
    ///
    /// Rows are normalized, their category resolved and the product upserted
    /// by `identifier`. Every `batch_size` upserted rows the store commits and
    /// drops its identity cache; the remainder is committed at the end. An
    /// error aborts the run but leaves earlier batches committed.
    pub async fn import_reader<S, R>(
        &self,
        store: &mut S,
        reader: R,
    ) -> Result<ImportSummary, ImportError>
    where
        S: CatalogStore + ?Sized,
        R: Read,
    {
        let mut rdr = ReaderBuilder::new()
            .delimiter(b';')
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::None)
            .from_reader(reader);

        let batch_size = self.options.batch_size.max(1);
        let mut summary = ImportSummary::default();
        let mut header: Option<FeedHeader> = None;
        let mut pending = 0usize;
        let mut batches = 0u64;
        let mut rec = StringRecord::new();

        while rdr.read_record(&mut rec)? {
            let line = rec.position().map(|p| p.line()).unwrap_or(0);
            if header.is_none() {
                header = Some(FeedHeader::parse(&rec));
                continue;
            }
            if is_blank(&rec) {
                continue;
            }
            let columns = match &header {
                Some(h) if !h.is_empty() => h,
                _ => return Err(ImportError::MissingHeader { line }),
            };

            match self.process_row(store, columns, &rec).await? {
                RowOutcome::Skipped => {
                    summary.skipped += 1;
                    debug!(line, "row without identifier skipped");
                    continue;
                }
                RowOutcome::Imported => summary.imported += 1,
                RowOutcome::Updated => summary.updated += 1,
            }

            pending += 1;
            if pending == batch_size {
                store.commit().await?;
                store.release_identity_cache();
                batches += 1;
                pending = 0;
                info!(
                    batch = batches,
                    rows = batch_size,
                    imported = summary.imported,
                    updated = summary.updated,
                    skipped = summary.skipped,
                    "batch committed"
                );
            }
        }

        if pending > 0 {
            store.commit().await?;
            store.release_identity_cache();
            batches += 1;
            info!(batch = batches, rows = pending, "final batch committed");
        }
        info!(
            imported = summary.imported,
            updated = summary.updated,
            skipped = summary.skipped,
            batches,
            "catalog import finished"
        );
        Ok(summary)
    }

    async fn process_row<S: CatalogStore + ?Sized>(
        &self,
        store: &mut S,
        header: &FeedHeader,
        rec: &StringRecord,
    ) -> anyhow::Result<RowOutcome> {
        let Some(identifier) = header.non_blank(rec, "identifier") else {
            return Ok(RowOutcome::Skipped);
        };

        let name = header.cell(rec, "name").unwrap_or("");
        let slug = slugify(name);
        let description = header
            .non_blank(rec, "description")
            .unwrap_or(self.options.placeholder_description.as_str());
        let image_url = header.cell(rec, "image_url").unwrap_or("");
        let price_cents = parse_price_cents(header.cell(rec, "price"));
        let net_price_cents = parse_price_cents(header.cell(rec, "net_price"));

        let category = self
            .resolver
            .resolve(
                store,
                header.non_blank(rec, "category_id"),
                header.non_blank(rec, "category"),
            )
            .await?;

        let now = Utc::now();
        let (product, outcome) = match store.find_product_by_identifier(identifier).await? {
            Some(mut existing) => {
                existing.name = name.to_string();
                existing.slug = slug;
                existing.description = description.to_string();
                existing.image_url = image_url.to_string();
                existing.price_cents = price_cents;
                existing.net_price_cents = net_price_cents;
                existing.category = category.key();
                existing.updated_at = now;
                (existing, RowOutcome::Updated)
            }
            None => (
                Product {
                    id: None,
                    identifier: identifier.to_string(),
                    name: name.to_string(),
                    slug,
                    description: description.to_string(),
                    price_cents,
                    net_price_cents,
                    image_url: image_url.to_string(),
                    category: category.key(),
                    created_at: now,
                    updated_at: now,
                },
                RowOutcome::Imported,
            ),
        };
        store.stage_write(Entity::Product(product));
        Ok(outcome)
    }
}

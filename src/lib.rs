pub mod api;
pub mod database_ops;
pub mod env_boot;
pub mod normalization;
pub mod telemetry;

pub mod util {
    pub mod env;
}

pub use database_ops::category_resolver::CategoryResolver;
pub use database_ops::importer::{CatalogImporter, ImportError, ImportOptions, ImportSummary};
pub use database_ops::sampler::RandomSampler;

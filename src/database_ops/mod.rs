pub mod category_resolver;
pub mod db;
pub mod entities;
pub mod importer;
pub mod memory_store;
pub mod pg_store;
pub mod sampler;
pub mod store;

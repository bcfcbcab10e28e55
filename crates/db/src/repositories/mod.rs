//! Store traits and their in-memory and Postgres backings.

pub mod catalog;
pub mod generation_store;
pub mod memory_store;
pub mod pg_store;

pub use catalog::{AssetCatalog, InMemoryAssetCatalog, PgAssetCatalog};
pub use generation_store::{GenerationStore, SegmentWrite};
pub use memory_store::InMemoryGenerationStore;
pub use pg_store::PgGenerationStore;

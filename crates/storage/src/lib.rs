//! Storage abstractions for the enrichment backfill.
//!
//! Provides:
//! - The `DocumentStore` trait over systems, history and enrichment records
//! - A SQLite implementation with unique (system, date) keys
//! - An in-memory implementation for tests and dry runs
//! - A batching writer for unordered bulk writes

pub mod memory;
pub mod sqlite;
pub mod store;
pub mod writer;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;
pub use store::{
    BulkWriteResult, Collection, DocumentStore, EnrichmentWrite, HistoryCursor, StoreStats,
    WriteFailure,
};
pub use writer::{BatchWriter, FlushReport};

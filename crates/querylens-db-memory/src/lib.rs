//! In-memory storage backend for querylens.
//!
//! This crate provides an in-memory implementation of the `ProfilerStorage`
//! trait from `querylens-storage`. It backs unit tests and demos, and lets the
//! profiler run embedded without a database.
//!
//! # Example
//!
//! ```ignore
//! use querylens_db_memory::InMemoryStorage;
//! use querylens_storage::ProfilerStorage;
//!
//! let storage = InMemoryStorage::new();
//! let patterns = storage.recent_patterns(10).await?;
//! ```

mod profiler_impl;
pub mod storage;

pub use querylens_storage::{ProfilerStorage, StorageError};
pub use storage::InMemoryStorage;

/// Type alias for a shareable in-memory storage instance.
pub type DynMemoryStorage = std::sync::Arc<InMemoryStorage>;

/// Creates a new shareable in-memory storage.
#[must_use]
pub fn create_profiler_storage() -> DynMemoryStorage {
    std::sync::Arc::new(InMemoryStorage::new())
}

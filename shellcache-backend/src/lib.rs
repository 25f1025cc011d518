//! Namespaced response storage for shellcache.
//!
//! A [`CacheStore`] holds any number of named namespaces, each mapping
//! [`EntryKey`](shellcache_core::EntryKey)s to buffered responses. The
//! coordinator derives namespace names from generations; stores treat them as
//! opaque strings.
//!
//! [`MemoryStore`] is the bundled implementation. Embedders with persistent
//! storage implement [`CacheStore`] themselves.
mod error;
#[cfg(any(test, feature = "test-helpers"))]
pub mod faulty;
mod memory;
mod store;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use store::{CacheStore, StoreResult};

/// Status of a delete operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteStatus {
    /// Deleted, with the number of entries removed.
    Deleted(u32),
    /// Nothing to delete.
    Missing,
}

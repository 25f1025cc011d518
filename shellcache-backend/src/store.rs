use std::sync::Arc;

use async_trait::async_trait;
use shellcache_core::{EntryKey, ResponseSnapshot};
use smol_str::SmolStr;

use crate::{DeleteStatus, StoreError};

pub type StoreResult<T> = Result<T, StoreError>;

/// Storage of named namespaces of responses.
///
/// Namespaces are created by [`open`](CacheStore::open) or implicitly by the
/// first [`write`](CacheStore::write). Reads never create a namespace.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Creates the namespace if it does not exist yet.
    async fn open(&self, namespace: &str) -> StoreResult<()>;

    /// Whether the namespace exists.
    async fn has(&self, namespace: &str) -> StoreResult<bool>;

    /// Names of all existing namespaces.
    async fn namespaces(&self) -> StoreResult<Vec<SmolStr>>;

    /// Deletes the namespace with every entry in it.
    async fn delete(&self, namespace: &str) -> StoreResult<DeleteStatus>;

    /// Reads an entry. A missing namespace reads as a miss.
    async fn read(&self, namespace: &str, key: &EntryKey) -> StoreResult<Option<ResponseSnapshot>>;

    /// Writes an entry, replacing any previous one under the same key.
    async fn write(&self, namespace: &str, key: &EntryKey, value: ResponseSnapshot)
    -> StoreResult<()>;

    /// Removes a single entry.
    async fn remove(&self, namespace: &str, key: &EntryKey) -> StoreResult<DeleteStatus>;

    /// Keys stored in the namespace. Empty for a missing namespace.
    async fn keys(&self, namespace: &str) -> StoreResult<Vec<EntryKey>>;

    /// Returns the name of this store for logs.
    fn label(&self) -> &str {
        "store"
    }
}

#[async_trait]
impl CacheStore for &dyn CacheStore {
    async fn open(&self, namespace: &str) -> StoreResult<()> {
        (*self).open(namespace).await
    }

    async fn has(&self, namespace: &str) -> StoreResult<bool> {
        (*self).has(namespace).await
    }

    async fn namespaces(&self) -> StoreResult<Vec<SmolStr>> {
        (*self).namespaces().await
    }

    async fn delete(&self, namespace: &str) -> StoreResult<DeleteStatus> {
        (*self).delete(namespace).await
    }

    async fn read(&self, namespace: &str, key: &EntryKey) -> StoreResult<Option<ResponseSnapshot>> {
        (*self).read(namespace, key).await
    }

    async fn write(
        &self,
        namespace: &str,
        key: &EntryKey,
        value: ResponseSnapshot,
    ) -> StoreResult<()> {
        (*self).write(namespace, key, value).await
    }

    async fn remove(&self, namespace: &str, key: &EntryKey) -> StoreResult<DeleteStatus> {
        (*self).remove(namespace, key).await
    }

    async fn keys(&self, namespace: &str) -> StoreResult<Vec<EntryKey>> {
        (*self).keys(namespace).await
    }

    fn label(&self) -> &str {
        (*self).label()
    }
}

#[async_trait]
impl CacheStore for Box<dyn CacheStore> {
    async fn open(&self, namespace: &str) -> StoreResult<()> {
        (**self).open(namespace).await
    }

    async fn has(&self, namespace: &str) -> StoreResult<bool> {
        (**self).has(namespace).await
    }

    async fn namespaces(&self) -> StoreResult<Vec<SmolStr>> {
        (**self).namespaces().await
    }

    async fn delete(&self, namespace: &str) -> StoreResult<DeleteStatus> {
        (**self).delete(namespace).await
    }

    async fn read(&self, namespace: &str, key: &EntryKey) -> StoreResult<Option<ResponseSnapshot>> {
        (**self).read(namespace, key).await
    }

    async fn write(
        &self,
        namespace: &str,
        key: &EntryKey,
        value: ResponseSnapshot,
    ) -> StoreResult<()> {
        (**self).write(namespace, key, value).await
    }

    async fn remove(&self, namespace: &str, key: &EntryKey) -> StoreResult<DeleteStatus> {
        (**self).remove(namespace, key).await
    }

    async fn keys(&self, namespace: &str) -> StoreResult<Vec<EntryKey>> {
        (**self).keys(namespace).await
    }

    fn label(&self) -> &str {
        (**self).label()
    }
}

#[async_trait]
impl CacheStore for Arc<dyn CacheStore + 'static> {
    async fn open(&self, namespace: &str) -> StoreResult<()> {
        (**self).open(namespace).await
    }

    async fn has(&self, namespace: &str) -> StoreResult<bool> {
        (**self).has(namespace).await
    }

    async fn namespaces(&self) -> StoreResult<Vec<SmolStr>> {
        (**self).namespaces().await
    }

    async fn delete(&self, namespace: &str) -> StoreResult<DeleteStatus> {
        (**self).delete(namespace).await
    }

    async fn read(&self, namespace: &str, key: &EntryKey) -> StoreResult<Option<ResponseSnapshot>> {
        (**self).read(namespace, key).await
    }

    async fn write(
        &self,
        namespace: &str,
        key: &EntryKey,
        value: ResponseSnapshot,
    ) -> StoreResult<()> {
        (**self).write(namespace, key, value).await
    }

    async fn remove(&self, namespace: &str, key: &EntryKey) -> StoreResult<DeleteStatus> {
        (**self).remove(namespace, key).await
    }

    async fn keys(&self, namespace: &str) -> StoreResult<Vec<EntryKey>> {
        (**self).keys(namespace).await
    }

    fn label(&self) -> &str {
        (**self).label()
    }
}

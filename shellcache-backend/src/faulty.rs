//! Fault injection for tests.
//!
//! [`FaultyStore`] wraps another store and fails selected operations on
//! selected namespaces, which lets tests exercise partial cleanup and
//! storage failures without a real backend misbehaving.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashSet;
use shellcache_core::{EntryKey, ResponseSnapshot};
use smol_str::SmolStr;

use crate::{CacheStore, DeleteStatus, StoreError, StoreResult};

/// Operations a [`FaultyStore`] can be told to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    /// Fail [`CacheStore::read`].
    Read,
    /// Fail [`CacheStore::write`].
    Write,
    /// Fail [`CacheStore::delete`].
    Delete,
    /// Fail [`CacheStore::remove`].
    Remove,
    /// Fail [`CacheStore::namespaces`]. Configure it on `"*"`.
    List,
}

/// Store wrapper that fails configured `(operation, namespace)` pairs.
///
/// A namespace of `"*"` matches every namespace.
#[derive(Clone)]
pub struct FaultyStore<S> {
    inner: S,
    faults: Arc<DashSet<(Fault, SmolStr)>>,
}

impl<S> FaultyStore<S> {
    /// Wraps `inner` with no faults configured.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            faults: Arc::new(DashSet::new()),
        }
    }

    /// Makes `fault` fail for `namespace`.
    pub fn fail(&self, fault: Fault, namespace: &str) {
        self.faults.insert((fault, SmolStr::new(namespace)));
    }

    /// Removes every configured fault.
    pub fn heal(&self) {
        self.faults.clear();
    }

    /// Returns the wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn check(&self, fault: Fault, namespace: &str) -> StoreResult<()> {
        let hit = self.faults.contains(&(fault, SmolStr::new(namespace)))
            || self.faults.contains(&(fault, SmolStr::new_static("*")));
        if hit {
            Err(StoreError::message(format!(
                "injected {fault:?} failure on {namespace}"
            )))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl<S> CacheStore for FaultyStore<S>
where
    S: CacheStore,
{
    async fn open(&self, namespace: &str) -> StoreResult<()> {
        self.inner.open(namespace).await
    }

    async fn has(&self, namespace: &str) -> StoreResult<bool> {
        self.inner.has(namespace).await
    }

    async fn namespaces(&self) -> StoreResult<Vec<SmolStr>> {
        self.check(Fault::List, "*")?;
        self.inner.namespaces().await
    }

    async fn delete(&self, namespace: &str) -> StoreResult<DeleteStatus> {
        self.check(Fault::Delete, namespace)?;
        self.inner.delete(namespace).await
    }

    async fn read(&self, namespace: &str, key: &EntryKey) -> StoreResult<Option<ResponseSnapshot>> {
        self.check(Fault::Read, namespace)?;
        self.inner.read(namespace, key).await
    }

    async fn write(
        &self,
        namespace: &str,
        key: &EntryKey,
        value: ResponseSnapshot,
    ) -> StoreResult<()> {
        self.check(Fault::Write, namespace)?;
        self.inner.write(namespace, key, value).await
    }

    async fn remove(&self, namespace: &str, key: &EntryKey) -> StoreResult<DeleteStatus> {
        self.check(Fault::Remove, namespace)?;
        self.inner.remove(namespace, key).await
    }

    async fn keys(&self, namespace: &str) -> StoreResult<Vec<EntryKey>> {
        self.inner.keys(namespace).await
    }

    fn label(&self) -> &str {
        self.inner.label()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    #[tokio::test]
    async fn test_delete_fault_is_per_namespace() {
        let store = FaultyStore::new(MemoryStore::new());
        store.inner().open("a").await.unwrap();
        store.inner().open("b").await.unwrap();
        store.fail(Fault::Delete, "a");

        assert!(store.delete("a").await.is_err());
        assert!(store.delete("b").await.is_ok());
        assert_eq!(store.namespaces().await.unwrap(), vec!["a"]);

        store.heal();
        assert!(store.delete("a").await.is_ok());
    }

    #[tokio::test]
    async fn test_list_fault_and_label() {
        let store = FaultyStore::new(MemoryStore::new().with_label("primary"));
        store.inner().open("a").await.unwrap();
        store.fail(Fault::List, "*");

        assert!(store.namespaces().await.is_err());
        assert!(store.has("a").await.unwrap());
        assert_eq!(store.label(), "primary");
    }
}

//! In-memory store backed by `DashMap`.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use shellcache_core::{EntryKey, ResponseSnapshot, StoreLabel};
use smol_str::SmolStr;
use tracing::trace;

use crate::{CacheStore, DeleteStatus, StoreError, StoreResult};

type Namespace = Arc<DashMap<EntryKey, ResponseSnapshot>>;

/// Thread-safe in-memory [`CacheStore`]. Clones share state.
///
/// An optional per-namespace entry quota makes writes beyond it fail with
/// [`StoreError::QuotaExceeded`]; replacing an existing key never counts
/// against the quota.
#[derive(Clone)]
pub struct MemoryStore {
    namespaces: Arc<DashMap<SmolStr, Namespace>>,
    quota: Option<usize>,
    label: StoreLabel,
}

impl MemoryStore {
    /// Creates an empty store without quota.
    pub fn new() -> Self {
        Self {
            namespaces: Arc::new(DashMap::new()),
            quota: None,
            label: StoreLabel::new_static("memory"),
        }
    }

    /// Limits every namespace to `entries` entries.
    pub fn with_quota(mut self, entries: usize) -> Self {
        self.quota = Some(entries);
        self
    }

    /// Sets the store label.
    pub fn with_label(mut self, label: impl Into<StoreLabel>) -> Self {
        self.label = label.into();
        self
    }

    /// Number of entries in `namespace`, or `None` if it does not exist.
    pub fn len(&self, namespace: &str) -> Option<usize> {
        self.namespaces.get(namespace).map(|ns| ns.len())
    }

    /// Whether no namespace exists.
    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }

    fn namespace(&self, namespace: &str) -> Option<Namespace> {
        self.namespaces.get(namespace).map(|ns| Arc::clone(&ns))
    }

    fn namespace_or_create(&self, namespace: &str) -> Namespace {
        Arc::clone(
            &self
                .namespaces
                .entry(SmolStr::new(namespace))
                .or_insert_with(|| Arc::new(DashMap::new())),
        )
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn open(&self, namespace: &str) -> StoreResult<()> {
        self.namespace_or_create(namespace);
        Ok(())
    }

    async fn has(&self, namespace: &str) -> StoreResult<bool> {
        Ok(self.namespaces.contains_key(namespace))
    }

    async fn namespaces(&self) -> StoreResult<Vec<SmolStr>> {
        let mut names: Vec<SmolStr> = self.namespaces.iter().map(|e| e.key().clone()).collect();
        names.sort();
        Ok(names)
    }

    async fn delete(&self, namespace: &str) -> StoreResult<DeleteStatus> {
        Ok(match self.namespaces.remove(namespace) {
            Some((_, entries)) => {
                trace!(namespace, entries = entries.len(), "namespace deleted");
                DeleteStatus::Deleted(entries.len() as u32)
            }
            None => DeleteStatus::Missing,
        })
    }

    async fn read(&self, namespace: &str, key: &EntryKey) -> StoreResult<Option<ResponseSnapshot>> {
        Ok(self
            .namespace(namespace)
            .and_then(|ns| ns.get(key).map(|v| v.clone())))
    }

    async fn write(
        &self,
        namespace: &str,
        key: &EntryKey,
        value: ResponseSnapshot,
    ) -> StoreResult<()> {
        let ns = self.namespace_or_create(namespace);
        if let Some(quota) = self.quota
            && !ns.contains_key(key)
            && ns.len() >= quota
        {
            return Err(StoreError::QuotaExceeded {
                namespace: SmolStr::new(namespace),
            });
        }
        ns.insert(key.clone(), value);
        Ok(())
    }

    async fn remove(&self, namespace: &str, key: &EntryKey) -> StoreResult<DeleteStatus> {
        let removed = self
            .namespace(namespace)
            .and_then(|ns| ns.remove(key))
            .is_some();
        Ok(if removed {
            DeleteStatus::Deleted(1)
        } else {
            DeleteStatus::Missing
        })
    }

    async fn keys(&self, namespace: &str) -> StoreResult<Vec<EntryKey>> {
        Ok(self
            .namespace(namespace)
            .map(|ns| ns.iter().map(|e| e.key().clone()).collect())
            .unwrap_or_default())
    }

    fn label(&self) -> &str {
        self.label.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;

    fn key(path: &str) -> EntryKey {
        EntryKey::get(&Url::parse(&format!("https://a.test{path}")).unwrap())
    }

    #[tokio::test]
    async fn test_read_does_not_create_namespace() {
        let store = MemoryStore::new();
        assert!(store.read("ns", &key("/")).await.unwrap().is_none());
        assert!(!store.has("ns").await.unwrap());
    }

    #[tokio::test]
    async fn test_write_creates_namespace() {
        let store = MemoryStore::new();
        store
            .write("ns", &key("/"), ResponseSnapshot::ok("root"))
            .await
            .unwrap();
        assert!(store.has("ns").await.unwrap());
        assert_eq!(store.len("ns"), Some(1));
    }

    #[tokio::test]
    async fn test_quota_allows_replacement() {
        let store = MemoryStore::new().with_quota(1);
        store
            .write("ns", &key("/a"), ResponseSnapshot::ok("1"))
            .await
            .unwrap();
        store
            .write("ns", &key("/a"), ResponseSnapshot::ok("2"))
            .await
            .unwrap();
        let err = store
            .write("ns", &key("/b"), ResponseSnapshot::ok("3"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::QuotaExceeded { namespace } if namespace == "ns"));
    }

    #[tokio::test]
    async fn test_delete_reports_entry_count() {
        let store = MemoryStore::new();
        store.open("empty").await.unwrap();
        store
            .write("ns", &key("/a"), ResponseSnapshot::ok("1"))
            .await
            .unwrap();
        store
            .write("ns", &key("/b"), ResponseSnapshot::ok("2"))
            .await
            .unwrap();
        assert_eq!(store.delete("ns").await.unwrap(), DeleteStatus::Deleted(2));
        assert_eq!(store.delete("ns").await.unwrap(), DeleteStatus::Missing);
        assert_eq!(store.namespaces().await.unwrap(), vec!["empty"]);
    }
}

//! Promotion and cleanup of superseded generations.

use std::collections::BTreeSet;
use std::sync::Arc;

use shellcache_backend::{CacheStore, DeleteStatus, StoreResult};
use shellcache_core::{GenerationId, NamespaceName};
use smol_str::SmolStr;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::error::ActivationError;
use crate::{CacheVersionRegistry, ClientRegistry, metrics};

/// Outcome of a sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Namespaces retained: the current and the pending generation's.
    pub kept: Vec<SmolStr>,
    /// Namespaces deleted.
    pub deleted: Vec<SmolStr>,
    /// Namespaces whose deletion failed.
    pub failed: Vec<SmolStr>,
    /// Number of clients claimed afterwards.
    pub claimed: usize,
}

/// Outcome of a purge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeReport {
    /// Namespaces emptied and deleted.
    pub deleted: Vec<SmolStr>,
    /// Entries removed across all deleted namespaces.
    pub entries: usize,
    /// Namespaces whose deletion failed.
    pub failed: Vec<SmolStr>,
}

/// Deletes namespaces that no longer belong to a live generation.
///
/// Only namespaces named under the configured prefix are managed; anything
/// else in the store is left alone.
pub struct ActivationSweeper {
    registry: Arc<CacheVersionRegistry>,
    clients: Arc<ClientRegistry>,
    store: Arc<dyn CacheStore>,
    prefix: SmolStr,
}

impl ActivationSweeper {
    /// Creates a sweeper.
    pub fn new(
        registry: Arc<CacheVersionRegistry>,
        clients: Arc<ClientRegistry>,
        store: Arc<dyn CacheStore>,
        prefix: impl Into<SmolStr>,
    ) -> Self {
        Self {
            registry,
            clients,
            store,
            prefix: prefix.into(),
        }
    }

    /// Promotes the pending generation and sweeps.
    ///
    /// Returns `Ok(None)` when nothing is pending.
    pub async fn activate(&self) -> Result<Option<SweepReport>, ActivationError> {
        let Some(pending) = self.registry.pending() else {
            debug!("nothing pending, activation skipped");
            return Ok(None);
        };
        self.registry.promote(&pending)?;
        Ok(Some(self.sweep().await?))
    }

    /// Deletes every managed namespace outside the current and pending
    /// generations, then claims all clients for the current generation.
    ///
    /// Deletion is best-effort: failures are logged and reported, and do not
    /// stop the sweep. Clients are claimed even when the store cannot list
    /// its namespaces.
    pub async fn sweep(&self) -> StoreResult<SweepReport> {
        let current = self.registry.current_generation();
        let span = info_span!(
            "sweep",
            current = current.as_ref().map(|g| g.as_str()),
            store = self.store.label()
        );
        self.sweep_inner(current).instrument(span).await
    }

    async fn sweep_inner(&self, current: Option<GenerationId>) -> StoreResult<SweepReport> {
        let result = self.delete_stale(current.as_ref()).await;
        let claimed = current
            .as_ref()
            .map_or(0, |current| self.clients.claim(current));
        let mut report = match result {
            Ok(report) => report,
            Err(error) => {
                warn!(%error, claimed, "sweep failed to list namespaces");
                return Err(error);
            }
        };
        report.claimed = claimed;
        metrics::record_namespace_deletions(report.deleted.len(), report.failed.len());
        info!(
            kept = report.kept.len(),
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            claimed = report.claimed,
            "sweep finished"
        );
        Ok(report)
    }

    async fn delete_stale(&self, current: Option<&GenerationId>) -> StoreResult<SweepReport> {
        let pending = self.registry.pending();
        let live = |generation: &GenerationId| {
            current == Some(generation) || pending.as_ref() == Some(generation)
        };

        let mut report = SweepReport::default();
        let mut touched = BTreeSet::new();
        let mut survivors = BTreeSet::new();

        for raw in self.store.namespaces().await? {
            let Some(name) = NamespaceName::parse(&self.prefix, &raw) else {
                continue;
            };
            let generation = name.generation().clone();
            if live(&generation) {
                report.kept.push(raw);
                continue;
            }
            touched.insert(generation.clone());
            match self.store.delete(&raw).await {
                Ok(_) => report.deleted.push(raw),
                Err(error) => {
                    warn!(namespace = %raw, %error, "failed to delete stale namespace");
                    survivors.insert(generation);
                    report.failed.push(raw);
                }
            }
        }

        for generation in self.registry.all_known_generations() {
            if !live(&generation) && !survivors.contains(&generation) {
                touched.insert(generation);
            }
        }
        for generation in touched.difference(&survivors) {
            self.registry.forget(generation);
        }
        Ok(report)
    }

    /// Removes every entry of every managed namespace, then the emptied
    /// namespaces themselves. The registry is not touched.
    pub async fn purge(&self) -> StoreResult<PurgeReport> {
        let span = info_span!("purge", store = self.store.label());
        self.purge_inner().instrument(span).await
    }

    async fn purge_inner(&self) -> StoreResult<PurgeReport> {
        let mut report = PurgeReport::default();
        for raw in self.store.namespaces().await? {
            if NamespaceName::parse(&self.prefix, &raw).is_none() {
                continue;
            }
            match self.purge_namespace(&raw).await {
                Ok(removed) => {
                    report.entries += removed;
                    report.deleted.push(raw);
                }
                Err(error) => {
                    warn!(namespace = %raw, %error, "failed to purge namespace");
                    report.failed.push(raw);
                }
            }
        }
        metrics::record_namespace_deletions(report.deleted.len(), report.failed.len());
        info!(
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            entries = report.entries,
            "caches purged"
        );
        Ok(report)
    }

    async fn purge_namespace(&self, namespace: &str) -> StoreResult<usize> {
        let mut removed = 0;
        for key in self.store.keys(namespace).await? {
            if let DeleteStatus::Deleted(_) = self.store.remove(namespace, &key).await? {
                removed += 1;
            }
        }
        self.store.delete(namespace).await?;
        debug!(namespace, removed, "namespace purged");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shellcache_backend::MemoryStore;
    use shellcache_backend::faulty::{Fault, FaultyStore};
    use shellcache_core::{EntryKey, ResponseSnapshot};

    fn id(s: &str) -> GenerationId {
        GenerationId::new(s)
    }

    async fn seed(store: &dyn CacheStore, names: &[&str]) {
        for name in names {
            store.open(name).await.unwrap();
        }
    }

    fn sweeper(
        registry: &Arc<CacheVersionRegistry>,
        store: Arc<dyn CacheStore>,
    ) -> (ActivationSweeper, Arc<ClientRegistry>) {
        let clients = Arc::new(ClientRegistry::new(Arc::clone(registry)));
        (
            ActivationSweeper::new(Arc::clone(registry), Arc::clone(&clients), store, "app"),
            clients,
        )
    }

    #[tokio::test]
    async fn test_activate_without_pending_is_noop() {
        let registry = Arc::new(CacheVersionRegistry::with_current(id("v1")));
        let store = MemoryStore::new();
        seed(&store, &["app:v0:shell"]).await;
        let (sweeper, _) = sweeper(&registry, Arc::new(store.clone()));

        assert!(sweeper.activate().await.unwrap().is_none());
        assert!(store.has("app:v0:shell").await.unwrap());
    }

    #[tokio::test]
    async fn test_sweep_keeps_current_and_pending() {
        let registry = Arc::new(CacheVersionRegistry::new());
        registry.mark_installed(id("v1"));
        registry.promote(&id("v1")).unwrap();
        registry.mark_installed(id("v2"));

        let store = MemoryStore::new();
        seed(
            &store,
            &[
                "app:v0:runtime",
                "app:v0:shell",
                "app:v1:runtime",
                "app:v1:shell",
                "app:v2:shell",
                "other:v0:shell",
            ],
        )
        .await;
        let (sweeper, clients) = sweeper(&registry, Arc::new(store.clone()));
        let client = clients.connect();

        let report = sweeper.sweep().await.unwrap();
        assert_eq!(report.deleted, vec!["app:v0:runtime", "app:v0:shell"]);
        assert_eq!(
            report.kept,
            vec!["app:v1:runtime", "app:v1:shell", "app:v2:shell"]
        );
        assert!(report.failed.is_empty());
        assert_eq!(report.claimed, 1);
        assert_eq!(clients.controller(client), Some(id("v1")));
        assert!(store.has("other:v0:shell").await.unwrap());
    }

    #[tokio::test]
    async fn test_failed_delete_does_not_block_sweep() {
        let registry = Arc::new(CacheVersionRegistry::new());
        registry.mark_installed(id("v1"));
        registry.mark_installed(id("v2"));
        registry.mark_installed(id("v3"));
        registry.promote(&id("v3")).unwrap();

        let store = FaultyStore::new(MemoryStore::new());
        seed(&store, &["app:v1:shell", "app:v2:shell", "app:v3:shell"]).await;
        store.fail(Fault::Delete, "app:v1:shell");
        let (sweeper, _) = sweeper(&registry, Arc::new(store.clone()));

        let report = sweeper.sweep().await.unwrap();
        assert_eq!(report.failed, vec!["app:v1:shell"]);
        assert_eq!(report.deleted, vec!["app:v2:shell"]);
        assert_eq!(
            registry.all_known_generations().into_iter().collect::<Vec<_>>(),
            vec![id("v1"), id("v3")]
        );

        store.heal();
        let report = sweeper.sweep().await.unwrap();
        assert_eq!(report.deleted, vec!["app:v1:shell"]);
        assert_eq!(
            registry.all_known_generations().into_iter().collect::<Vec<_>>(),
            vec![id("v3")]
        );
    }

    #[tokio::test]
    async fn test_purge_leaves_registry() {
        let registry = Arc::new(CacheVersionRegistry::with_current(id("v2")));
        let store = MemoryStore::new();
        seed(&store, &["app:v1:shell", "app:v2:runtime", "app:v2:shell"]).await;
        let (sweeper, _) = sweeper(&registry, Arc::new(store.clone()));

        let report = sweeper.purge().await.unwrap();
        assert_eq!(report.deleted.len(), 3);
        assert_eq!(report.entries, 0);
        assert!(store.namespaces().await.unwrap().is_empty());
        assert_eq!(registry.current_generation(), Some(id("v2")));
    }

    #[tokio::test]
    async fn test_purge_removes_entries_one_by_one() {
        let registry = Arc::new(CacheVersionRegistry::with_current(id("v2")));
        let store = FaultyStore::new(MemoryStore::new());
        for (namespace, path) in [
            ("app:v2:shell", "/"),
            ("app:v2:shell", "/app.js"),
            ("app:v2:runtime", "/logo.png"),
            ("other:v1:shell", "/"),
        ] {
            let url = url::Url::parse("https://school.example").unwrap().join(path).unwrap();
            store
                .write(namespace, &EntryKey::get(&url), ResponseSnapshot::ok(path))
                .await
                .unwrap();
        }
        store.fail(Fault::Remove, "app:v2:runtime");
        let (sweeper, _) = sweeper(&registry, Arc::new(store.clone()));

        let report = sweeper.purge().await.unwrap();
        assert_eq!(report.deleted, vec!["app:v2:shell"]);
        assert_eq!(report.failed, vec!["app:v2:runtime"]);
        assert_eq!(report.entries, 2);
        // The namespace whose entries could not be removed is kept whole.
        assert_eq!(store.inner().len("app:v2:runtime"), Some(1));
        assert_eq!(store.inner().len("other:v1:shell"), Some(1));

        store.heal();
        let report = sweeper.purge().await.unwrap();
        assert_eq!(report.deleted, vec!["app:v2:runtime"]);
        assert_eq!(report.entries, 1);
        assert_eq!(
            store.namespaces().await.unwrap().iter().map(|ns| ns.as_str()).collect::<Vec<_>>(),
            vec!["other:v1:shell"]
        );
    }

    #[tokio::test]
    async fn test_failed_listing_still_claims_clients() {
        let registry = Arc::new(CacheVersionRegistry::with_current(id("v1")));
        registry.mark_installed(id("v2"));
        let store = FaultyStore::new(MemoryStore::new());
        seed(&store, &["app:v1:shell", "app:v2:shell"]).await;
        let (sweeper, clients) = sweeper(&registry, Arc::new(store.clone()));
        let client = clients.connect();
        assert_eq!(clients.controller(client), Some(id("v1")));

        store.fail(Fault::List, "*");
        let err = sweeper.activate().await.unwrap_err();
        assert!(matches!(err, ActivationError::Store(_)));
        assert_eq!(registry.current_generation(), Some(id("v2")));
        assert_eq!(clients.controller(client), Some(id("v2")));
        // Nothing was deleted; the next sweep catches up.
        assert!(store.has("app:v1:shell").await.unwrap());

        store.heal();
        let report = sweeper.sweep().await.unwrap();
        assert_eq!(report.deleted, vec!["app:v1:shell"]);
    }
}

//! All-or-nothing installation of a generation's shell namespace.

use std::sync::Arc;

use futures::future::join_all;
use shellcache_backend::{CacheStore, DeleteStatus};
use shellcache_core::{
    GenerationId, InterceptedRequest, NamespaceName, Network, ResponseSnapshot,
};
use smol_str::SmolStr;
use tracing::{Instrument, debug, info, info_span, warn};
use url::Url;

use crate::error::InstallError;
use crate::{CacheVersionRegistry, PrecacheManifest, metrics};

/// Result of a successful install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    /// The installed generation, now pending promotion.
    pub generation: GenerationId,
    /// Name of the populated shell namespace.
    pub namespace: SmolStr,
    /// Number of entries written.
    pub entries: usize,
}

/// Populates a generation's shell namespace from a [`PrecacheManifest`].
///
/// Every entry is fetched before anything is written, so a network failure
/// never leaves a namespace behind. A storage failure while writing discards
/// the partially written namespace. On success the generation is marked
/// installed in the registry; promotion is left to activation.
pub struct InstallCoordinator {
    registry: Arc<CacheVersionRegistry>,
    store: Arc<dyn CacheStore>,
    network: Arc<dyn Network>,
    origin: Url,
    prefix: SmolStr,
}

impl InstallCoordinator {
    /// Creates an installer for clients served from `origin`, naming
    /// namespaces under `prefix`.
    pub fn new(
        registry: Arc<CacheVersionRegistry>,
        store: Arc<dyn CacheStore>,
        network: Arc<dyn Network>,
        origin: Url,
        prefix: impl Into<SmolStr>,
    ) -> Self {
        Self {
            registry,
            store,
            network,
            origin,
            prefix: prefix.into(),
        }
    }

    /// Installs `generation` from `manifest`.
    pub async fn install(
        &self,
        manifest: &PrecacheManifest,
        generation: GenerationId,
    ) -> Result<InstallReport, InstallError> {
        let span = info_span!(
            "install",
            generation = %generation,
            entries = manifest.len(),
            store = self.store.label(),
            network = self.network.label()
        );
        let result = self.install_inner(manifest, generation).instrument(span).await;
        match &result {
            Ok(_) => metrics::record_install("installed"),
            Err(error) => {
                warn!(%error, "install failed");
                metrics::record_install("failed");
            }
        }
        result
    }

    async fn install_inner(
        &self,
        manifest: &PrecacheManifest,
        generation: GenerationId,
    ) -> Result<InstallReport, InstallError> {
        if generation.is_empty() {
            return Err(InstallError::EmptyGeneration);
        }
        if self.registry.is_current(&generation) {
            return Err(InstallError::AlreadyCurrent(generation));
        }

        let fetched = self.fetch_all(manifest).await?;

        let namespace = NamespaceName::shell(self.prefix.clone(), generation.clone()).to_raw();
        // The namespace is about to be rebuilt; it stops being promotable now.
        self.registry.withdraw(&generation);
        if let DeleteStatus::Deleted(entries) = self.store.delete(&namespace).await? {
            debug!(%namespace, entries, "leftover shell namespace removed");
        }

        self.store.open(&namespace).await?;
        for (request, response) in &fetched {
            if let Err(error) = self.store.write(&namespace, &request.key(), response.clone()).await {
                self.discard(&namespace).await;
                return Err(error.into());
            }
        }

        self.registry.mark_installed(generation.clone());
        info!(%namespace, entries = fetched.len(), "generation installed");
        Ok(InstallReport {
            generation,
            namespace,
            entries: fetched.len(),
        })
    }

    /// Fetches every entry; the first failure in manifest order is reported.
    async fn fetch_all(
        &self,
        manifest: &PrecacheManifest,
    ) -> Result<Vec<(InterceptedRequest, ResponseSnapshot)>, InstallError> {
        let mut requests = Vec::with_capacity(manifest.len());
        for (entry, url) in manifest.resolve(&self.origin) {
            let url = url.map_err(|e| InstallError::MissingEntry {
                entry: SmolStr::new(entry),
                reason: e.to_string(),
            })?;
            requests.push((entry, InterceptedRequest::get(url)));
        }

        let responses = join_all(
            requests
                .iter()
                .map(|(_, request)| self.network.fetch(request)),
        )
        .await;

        let mut fetched = Vec::with_capacity(requests.len());
        for ((entry, request), response) in requests.into_iter().zip(responses) {
            let response = match response {
                Ok(response) if response.is_success() => response,
                Ok(response) => {
                    return Err(InstallError::MissingEntry {
                        entry: SmolStr::new(entry),
                        reason: format!("status {}", response.status()),
                    });
                }
                Err(error) => {
                    return Err(InstallError::MissingEntry {
                        entry: SmolStr::new(entry),
                        reason: error.to_string(),
                    });
                }
            };
            fetched.push((request, response));
        }
        Ok(fetched)
    }

    async fn discard(&self, namespace: &str) {
        if let Err(error) = self.store.delete(namespace).await {
            warn!(namespace, %error, "failed to discard partial shell namespace");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shellcache_backend::MemoryStore;
    use shellcache_backend::faulty::{Fault, FaultyStore};
    use shellcache_core::NetworkError;
    use shellcache_core::mock::MockNetwork;

    const ORIGIN: &str = "https://school.example";

    fn installer(
        registry: &Arc<CacheVersionRegistry>,
        store: Arc<dyn CacheStore>,
        network: &MockNetwork,
    ) -> InstallCoordinator {
        InstallCoordinator::new(
            Arc::clone(registry),
            store,
            Arc::new(network.clone()),
            Url::parse(ORIGIN).unwrap(),
            "app",
        )
    }

    fn network() -> MockNetwork {
        let network = MockNetwork::new();
        network.respond_ok("https://school.example/", "<html>");
        network.respond_ok("https://school.example/app.js", "js");
        network
    }

    #[tokio::test]
    async fn test_install_marks_pending() {
        let registry = Arc::new(CacheVersionRegistry::new());
        let store = MemoryStore::new();
        let network = network();
        let installer = installer(&registry, Arc::new(store.clone()), &network);

        let manifest = PrecacheManifest::new(["/", "/app.js"]);
        let report = installer
            .install(&manifest, GenerationId::new("v1"))
            .await
            .unwrap();

        assert_eq!(report.namespace, "app:v1:shell");
        assert_eq!(report.entries, 2);
        assert_eq!(store.len("app:v1:shell"), Some(2));
        assert_eq!(registry.pending(), Some(GenerationId::new("v1")));
        assert!(registry.current_generation().is_none());
    }

    #[tokio::test]
    async fn test_non_success_status_fails_install() {
        let registry = Arc::new(CacheVersionRegistry::new());
        let store = MemoryStore::new();
        let network = network();
        let installer = installer(&registry, Arc::new(store.clone()), &network);

        let manifest = PrecacheManifest::new(["/", "/missing.css"]);
        let err = installer
            .install(&manifest, GenerationId::new("v1"))
            .await
            .unwrap_err();

        assert!(
            matches!(err, InstallError::MissingEntry { ref entry, .. } if entry == "/missing.css")
        );
        assert!(store.is_empty());
        assert!(registry.pending().is_none());
    }

    #[tokio::test]
    async fn test_write_failure_discards_namespace() {
        let registry = Arc::new(CacheVersionRegistry::new());
        let store = FaultyStore::new(MemoryStore::new().with_quota(1));
        let network = network();
        let installer = installer(&registry, Arc::new(store.clone()), &network);

        let manifest = PrecacheManifest::new(["/", "/app.js"]);
        let err = installer
            .install(&manifest, GenerationId::new("v1"))
            .await
            .unwrap_err();

        assert!(matches!(err, InstallError::Store(_)));
        assert!(!store.has("app:v1:shell").await.unwrap());
        assert!(registry.pending().is_none());
    }

    #[tokio::test]
    async fn test_leftover_namespace_is_replaced() {
        let registry = Arc::new(CacheVersionRegistry::new());
        let store = FaultyStore::new(MemoryStore::new());
        let network = network();
        let installer = installer(&registry, Arc::new(store.clone()), &network);
        store
            .write(
                "app:v1:shell",
                &shellcache_core::EntryKey::get(&Url::parse("https://school.example/old.js").unwrap()),
                ResponseSnapshot::ok("old"),
            )
            .await
            .unwrap();

        installer
            .install(&PrecacheManifest::new(["/"]), GenerationId::new("v1"))
            .await
            .unwrap();
        assert_eq!(store.inner().len("app:v1:shell"), Some(1));

        // The leftover cannot be removed: nothing is written.
        store.fail(Fault::Delete, "app:v1:shell");
        let err = installer
            .install(&PrecacheManifest::new(["/", "/app.js"]), GenerationId::new("v1"))
            .await
            .unwrap_err();
        assert!(matches!(err, InstallError::Store(_)));
        assert_eq!(store.inner().len("app:v1:shell"), Some(1));
        assert!(registry.pending().is_none());
    }

    #[tokio::test]
    async fn test_failed_reinstall_withdraws_pending() {
        let registry = Arc::new(CacheVersionRegistry::with_current(GenerationId::new("v1")));
        let store = FaultyStore::new(MemoryStore::new());
        let network = network();
        let installer = installer(&registry, Arc::new(store.clone()), &network);
        let manifest = PrecacheManifest::new(["/", "/app.js"]);

        installer
            .install(&manifest, GenerationId::new("v2"))
            .await
            .unwrap();
        assert_eq!(registry.pending(), Some(GenerationId::new("v2")));

        store.fail(Fault::Write, "app:v2:shell");
        let err = installer
            .install(&manifest, GenerationId::new("v2"))
            .await
            .unwrap_err();
        assert!(matches!(err, InstallError::Store(_)));
        assert!(!store.has("app:v2:shell").await.unwrap());
        assert!(registry.pending().is_none());
        assert!(registry.promote(&GenerationId::new("v2")).is_err());
        assert_eq!(registry.current_generation(), Some(GenerationId::new("v1")));
    }

    #[tokio::test]
    async fn test_reinstall_of_current_is_rejected() {
        let registry = Arc::new(CacheVersionRegistry::with_current(GenerationId::new("v1")));
        let network = network();
        network.fail("https://school.example/app.js", NetworkError::Timeout);
        let installer = installer(&registry, Arc::new(MemoryStore::new()), &network);

        let err = installer
            .install(&PrecacheManifest::new(["/"]), GenerationId::new("v1"))
            .await
            .unwrap_err();
        assert!(matches!(err, InstallError::AlreadyCurrent(_)));
        assert_eq!(network.total_calls(), 0);
    }
}

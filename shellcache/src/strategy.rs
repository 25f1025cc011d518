//! Response strategies per request class.
//!
//! | Class          | Strategy                                   |
//! |----------------|--------------------------------------------|
//! | `AppShell`     | cache-first, root document as last resort  |
//! | `RuntimeAsset` | network-first, runtime copy then root      |
//! | `ApiCall`      | network-only                               |
//! | `CrossOrigin`  | pass-through                               |
//!
//! Namespaces are only touched by `GET` requests once a generation is
//! current, and only 2xx responses are stored. Every write re-checks that its
//! generation is still current; a write for a generation superseded while the
//! fetch was in flight is skipped. The check and the write are not atomic, so
//! the generation is checked again afterwards and an entry that landed in a
//! superseded namespace is removed. Whatever is left of that namespace goes
//! with the next sweep.

use std::sync::Arc;

use shellcache_backend::CacheStore;
use shellcache_core::{
    EntryKey, GenerationId, InterceptedRequest, NamespaceName, NamespaceRole, Network,
    NetworkError, RequestClass, ResponseSnapshot, ResponseSource,
};
use smol_str::SmolStr;
use tracing::{Instrument, debug, debug_span, warn};
use url::Url;

use crate::error::FetchError;
use crate::{CacheVersionRegistry, metrics};

/// A response together with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ServedResponse {
    /// The response.
    pub response: ResponseSnapshot,
    /// Its provenance.
    pub source: ResponseSource,
}

impl ServedResponse {
    fn network(response: ResponseSnapshot) -> Self {
        Self {
            response,
            source: ResponseSource::Network,
        }
    }

    fn cached(response: ResponseSnapshot, namespace: SmolStr) -> Self {
        Self {
            response,
            source: ResponseSource::Cache(namespace),
        }
    }

    fn fallback(response: ResponseSnapshot, namespace: SmolStr) -> Self {
        Self {
            response,
            source: ResponseSource::Fallback(namespace),
        }
    }
}

/// Result of handling an intercepted fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Respond to the page with this response.
    Respond(ServedResponse),
    /// Fail the request.
    Fail(FetchError),
    /// Not intercepted; the platform handles the request itself.
    PassThrough,
}

impl FetchOutcome {
    /// The served response, if any.
    pub fn response(&self) -> Option<&ServedResponse> {
        match self {
            FetchOutcome::Respond(served) => Some(served),
            _ => None,
        }
    }

    /// Whether the request was left to the platform.
    pub fn is_pass_through(&self) -> bool {
        matches!(self, FetchOutcome::PassThrough)
    }

    /// `Ok(Some(_))` for a response, `Ok(None)` for pass-through.
    pub fn into_result(self) -> Result<Option<ServedResponse>, FetchError> {
        match self {
            FetchOutcome::Respond(served) => Ok(Some(served)),
            FetchOutcome::Fail(error) => Err(error),
            FetchOutcome::PassThrough => Ok(None),
        }
    }

    fn failed(error: NetworkError) -> Self {
        FetchOutcome::Fail(FetchError::Network(error))
    }
}

/// Executes the strategy of a classified request.
pub struct StrategyExecutor {
    registry: Arc<CacheVersionRegistry>,
    store: Arc<dyn CacheStore>,
    network: Arc<dyn Network>,
    prefix: SmolStr,
    root_key: EntryKey,
}

impl StrategyExecutor {
    /// Creates an executor. `root_document` is the absolute URL of the
    /// document served as offline fallback.
    pub fn new(
        registry: Arc<CacheVersionRegistry>,
        store: Arc<dyn CacheStore>,
        network: Arc<dyn Network>,
        prefix: impl Into<SmolStr>,
        root_document: &Url,
    ) -> Self {
        Self {
            registry,
            store,
            network,
            prefix: prefix.into(),
            root_key: EntryKey::get(root_document),
        }
    }

    /// Resolves `request` according to `class`.
    pub async fn execute(&self, class: RequestClass, request: &InterceptedRequest) -> FetchOutcome {
        let span = debug_span!(
            "fetch",
            %class,
            method = %request.method(),
            url = %request.url(),
            store = self.store.label(),
            network = self.network.label()
        );
        self.execute_inner(class, request).instrument(span).await
    }

    async fn execute_inner(&self, class: RequestClass, request: &InterceptedRequest) -> FetchOutcome {
        let outcome = match class {
            RequestClass::CrossOrigin => return FetchOutcome::PassThrough,
            RequestClass::ApiCall => self.network_only(request).await,
            RequestClass::AppShell | RequestClass::RuntimeAsset => {
                match self.registry.current_generation() {
                    Some(generation) if request.is_get() => {
                        if class == RequestClass::AppShell {
                            self.cache_first(generation, request).await
                        } else {
                            self.network_first(generation, request).await
                        }
                    }
                    _ => self.network_only(request).await,
                }
            }
        };

        match &outcome {
            FetchOutcome::Respond(served) => {
                debug!(%class, source = %served.source, status = served.response.status().as_u16(), "fetch served");
                metrics::record_fetch(class, &served.source);
            }
            FetchOutcome::Fail(error) => {
                debug!(%class, %error, "fetch failed");
                metrics::record_fetch_failed(class);
            }
            FetchOutcome::PassThrough => {}
        }
        outcome
    }

    async fn network_only(&self, request: &InterceptedRequest) -> FetchOutcome {
        match self.network.fetch(request).await {
            Ok(response) => FetchOutcome::Respond(ServedResponse::network(response)),
            Err(error) => FetchOutcome::failed(error),
        }
    }

    async fn cache_first(&self, generation: GenerationId, request: &InterceptedRequest) -> FetchOutcome {
        let shell = self.namespace(&generation, NamespaceRole::Shell);
        let key = request.key();

        if let Some(hit) = self.read(&shell, &key).await {
            return FetchOutcome::Respond(ServedResponse::cached(hit, shell));
        }

        match self.network.fetch(request).await {
            Ok(response) => {
                if response.is_success() {
                    self.write(&generation, NamespaceRole::Shell, &shell, &key, &response)
                        .await;
                }
                FetchOutcome::Respond(ServedResponse::network(response))
            }
            Err(error) => match self.read(&shell, &self.root_key).await {
                Some(root) => FetchOutcome::Respond(ServedResponse::fallback(root, shell)),
                None => FetchOutcome::failed(error),
            },
        }
    }

    async fn network_first(
        &self,
        generation: GenerationId,
        request: &InterceptedRequest,
    ) -> FetchOutcome {
        let runtime = self.namespace(&generation, NamespaceRole::Runtime);
        let key = request.key();

        let error = match self.network.fetch(request).await {
            Ok(response) => {
                if response.is_success() {
                    self.write(&generation, NamespaceRole::Runtime, &runtime, &key, &response)
                        .await;
                }
                return FetchOutcome::Respond(ServedResponse::network(response));
            }
            Err(error) => error,
        };

        if let Some(hit) = self.read(&runtime, &key).await {
            return FetchOutcome::Respond(ServedResponse::cached(hit, runtime));
        }
        let shell = self.namespace(&generation, NamespaceRole::Shell);
        match self.read(&shell, &self.root_key).await {
            Some(root) => FetchOutcome::Respond(ServedResponse::fallback(root, shell)),
            None => FetchOutcome::failed(error),
        }
    }

    fn namespace(&self, generation: &GenerationId, role: NamespaceRole) -> SmolStr {
        NamespaceName::new(self.prefix.clone(), generation.clone(), role).to_raw()
    }

    /// Read failures count as misses.
    async fn read(&self, namespace: &str, key: &EntryKey) -> Option<ResponseSnapshot> {
        match self.store.read(namespace, key).await {
            Ok(hit) => hit,
            Err(error) => {
                warn!(namespace, %key, %error, "cache read failed, treating as miss");
                None
            }
        }
    }

    /// Write failures are logged; the caller still serves the response.
    async fn write(
        &self,
        generation: &GenerationId,
        role: NamespaceRole,
        namespace: &str,
        key: &EntryKey,
        response: &ResponseSnapshot,
    ) {
        if !self.registry.is_current(generation) {
            debug!(namespace, %key, "generation superseded, write skipped");
            return;
        }
        if let Err(error) = self.store.write(namespace, key, response.clone()).await {
            warn!(namespace, %key, %error, "failed to store response");
            metrics::record_store_write_failed(role.as_str());
            return;
        }
        // Promoted while the write was in flight.
        if !self.registry.is_current(generation) {
            match self.store.remove(namespace, key).await {
                Ok(_) => debug!(namespace, %key, "generation superseded during write, entry removed"),
                Err(error) => {
                    warn!(namespace, %key, %error, "failed to remove entry of superseded generation")
                }
            }
        }
    }
}

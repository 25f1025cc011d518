//! Event dispatch.
//!
//! Every lifecycle phase, intercepted fetch and control message arrives as an
//! [`Event`]. The [`Coordinator`] routes each event through a dispatch table
//! from [`EventKind`] to an [`EventHandler`]; embedders may replace any entry
//! (for example to give background sync real behavior).

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use indexmap::IndexMap;
use shellcache_backend::CacheStore;
use shellcache_core::{ControlCommand, ControlMessage, GenerationId, InterceptedRequest, Network};
use smol_str::SmolStr;
use tracing::{debug, info};

use crate::error::{ConfigError, CoordinatorError};
use crate::install::{InstallCoordinator, InstallReport};
use crate::strategy::{FetchOutcome, StrategyExecutor};
use crate::sweep::{ActivationSweeper, PurgeReport, SweepReport};
use crate::{
    CacheVersionRegistry, ClientRegistry, CoordinatorConfig, PrecacheManifest, RequestClassifier,
};

/// An inbound event.
#[derive(Debug, Clone)]
pub enum Event {
    /// Install the configured generation.
    Install,
    /// Promote the pending generation and sweep.
    Activate,
    /// Resolve an intercepted request.
    Fetch(InterceptedRequest),
    /// Execute a control command.
    Message(ControlMessage),
    /// Background sync was requested under `tag`.
    Sync {
        /// Sync registration tag.
        tag: SmolStr,
    },
}

impl Event {
    /// The kind used to look up the handler.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Install => EventKind::Install,
            Event::Activate => EventKind::Activate,
            Event::Fetch(_) => EventKind::Fetch,
            Event::Message(_) => EventKind::Message,
            Event::Sync { .. } => EventKind::Sync,
        }
    }
}

/// Discriminant of [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// [`Event::Install`]
    Install,
    /// [`Event::Activate`]
    Activate,
    /// [`Event::Fetch`]
    Fetch,
    /// [`Event::Message`]
    Message,
    /// [`Event::Sync`]
    Sync,
}

impl EventKind {
    /// Returns the kind name used in logs.
    pub const fn as_str(&self) -> &'static str {
        match self {
            EventKind::Install => "install",
            EventKind::Activate => "activate",
            EventKind::Fetch => "fetch",
            EventKind::Message => "message",
            EventKind::Sync => "sync",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a handled control command did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlReport {
    /// `SkipWaiting`: `None` when nothing was pending.
    SkipWaiting(Option<SweepReport>),
    /// `ClearCache`.
    ClearCache(PurgeReport),
}

/// Result of a handled event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventOutcome {
    /// The generation was installed and waits for promotion.
    Installed(InstallReport),
    /// Activation ran; `None` when nothing was pending.
    Activated(Option<SweepReport>),
    /// The fetch was resolved.
    Fetched(FetchOutcome),
    /// A control command was executed.
    Controlled(ControlReport),
    /// Background sync finished.
    Synced,
}

/// Handles one kind of event.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handles `event`.
    async fn handle(&self, event: Event) -> Result<EventOutcome, CoordinatorError>;
}

#[async_trait]
impl<H> EventHandler for Arc<H>
where
    H: EventHandler + ?Sized,
{
    async fn handle(&self, event: Event) -> Result<EventOutcome, CoordinatorError> {
        (**self).handle(event).await
    }
}

/// Installs the configured generation from the configured manifest.
pub struct InstallHandler {
    installer: Arc<InstallCoordinator>,
    manifest: Arc<PrecacheManifest>,
    generation: GenerationId,
}

#[async_trait]
impl EventHandler for InstallHandler {
    async fn handle(&self, event: Event) -> Result<EventOutcome, CoordinatorError> {
        if !matches!(event, Event::Install) {
            return Err(CoordinatorError::Unhandled(event.kind()));
        }
        let report = self
            .installer
            .install(&self.manifest, self.generation.clone())
            .await?;
        Ok(EventOutcome::Installed(report))
    }
}

/// Promotes the pending generation and sweeps.
pub struct ActivateHandler {
    sweeper: Arc<ActivationSweeper>,
}

#[async_trait]
impl EventHandler for ActivateHandler {
    async fn handle(&self, event: Event) -> Result<EventOutcome, CoordinatorError> {
        if !matches!(event, Event::Activate) {
            return Err(CoordinatorError::Unhandled(event.kind()));
        }
        Ok(EventOutcome::Activated(self.sweeper.activate().await?))
    }
}

/// Classifies a request and executes its strategy.
pub struct FetchHandler {
    classifier: Arc<RequestClassifier>,
    executor: Arc<StrategyExecutor>,
}

#[async_trait]
impl EventHandler for FetchHandler {
    async fn handle(&self, event: Event) -> Result<EventOutcome, CoordinatorError> {
        let request = match event {
            Event::Fetch(request) => request,
            other => return Err(CoordinatorError::Unhandled(other.kind())),
        };
        let class = self.classifier.classify(request.url());
        let outcome = self.executor.execute(class, &request).await;
        Ok(EventOutcome::Fetched(outcome))
    }
}

/// Executes control commands.
pub struct MessageHandler {
    sweeper: Arc<ActivationSweeper>,
}

#[async_trait]
impl EventHandler for MessageHandler {
    async fn handle(&self, event: Event) -> Result<EventOutcome, CoordinatorError> {
        let message = match event {
            Event::Message(message) => message,
            other => return Err(CoordinatorError::Unhandled(other.kind())),
        };
        info!(command = message.command().as_str(), "control command received");
        let report = match message.command() {
            ControlCommand::SkipWaiting => ControlReport::SkipWaiting(self.sweeper.activate().await?),
            ControlCommand::ClearCache => ControlReport::ClearCache(self.sweeper.purge().await?),
        };
        Ok(EventOutcome::Controlled(report))
    }
}

/// Default background sync handler: logs and finishes.
pub struct SyncHandler;

#[async_trait]
impl EventHandler for SyncHandler {
    async fn handle(&self, event: Event) -> Result<EventOutcome, CoordinatorError> {
        let tag = match event {
            Event::Sync { tag } => tag,
            other => return Err(CoordinatorError::Unhandled(other.kind())),
        };
        debug!(%tag, "background sync requested, nothing to replay");
        Ok(EventOutcome::Synced)
    }
}

/// The offline cache coordinator.
///
/// Built from a [`CoordinatorConfig`], a [`CacheStore`] and a [`Network`].
/// Coordinators of successive deployments share the store and the
/// [`CacheVersionRegistry`]; the new one installs its generation while the
/// old generation keeps serving.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use shellcache::{Coordinator, CoordinatorConfig};
/// use shellcache_backend::MemoryStore;
/// # use async_trait::async_trait;
/// # use shellcache_core::{InterceptedRequest, Network, NetworkError, ResponseSnapshot};
/// # struct Offline;
/// # #[async_trait]
/// # impl Network for Offline {
/// #     async fn fetch(&self, _: &InterceptedRequest) -> Result<ResponseSnapshot, NetworkError> {
/// #         Err(NetworkError::Unavailable("offline".into()))
/// #     }
/// # }
///
/// let config = CoordinatorConfig::new("https://school.example", "v1", ["/", "/app.js"]);
/// let coordinator = Coordinator::builder(config)
///     .store(Arc::new(MemoryStore::new()))
///     .network(Arc::new(Offline))
///     .build()
///     .unwrap();
/// assert!(coordinator.registry().current_generation().is_none());
/// ```
pub struct Coordinator {
    config: CoordinatorConfig,
    registry: Arc<CacheVersionRegistry>,
    clients: Arc<ClientRegistry>,
    store: Arc<dyn CacheStore>,
    classifier: Arc<RequestClassifier>,
    executor: Arc<StrategyExecutor>,
    installer: Arc<InstallCoordinator>,
    sweeper: Arc<ActivationSweeper>,
    handlers: IndexMap<EventKind, Arc<dyn EventHandler>>,
}

impl Coordinator {
    /// Starts building a coordinator.
    pub fn builder(config: CoordinatorConfig) -> CoordinatorBuilder {
        CoordinatorBuilder {
            config,
            store: None,
            network: None,
            registry: None,
            clients: None,
        }
    }

    /// Routes `event` to its handler.
    pub async fn dispatch(&self, event: Event) -> Result<EventOutcome, CoordinatorError> {
        let kind = event.kind();
        let handler = self
            .handlers
            .get(&kind)
            .ok_or(CoordinatorError::Unhandled(kind))?;
        handler.handle(event).await
    }

    /// Replaces the handler of `kind`.
    pub fn set_handler(&mut self, kind: EventKind, handler: Arc<dyn EventHandler>) {
        self.handlers.insert(kind, handler);
    }

    /// Classifies and resolves `request` directly, bypassing the table.
    pub async fn fetch(&self, request: &InterceptedRequest) -> FetchOutcome {
        let class = self.classifier.classify(request.url());
        self.executor.execute(class, request).await
    }

    /// The configuration.
    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    /// The generation registry.
    pub fn registry(&self) -> &Arc<CacheVersionRegistry> {
        &self.registry
    }

    /// The client registry.
    pub fn clients(&self) -> &Arc<ClientRegistry> {
        &self.clients
    }

    /// The cache store.
    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    /// The request classifier.
    pub fn classifier(&self) -> &RequestClassifier {
        &self.classifier
    }

    /// The installer.
    pub fn installer(&self) -> &InstallCoordinator {
        &self.installer
    }

    /// The sweeper.
    pub fn sweeper(&self) -> &ActivationSweeper {
        &self.sweeper
    }
}

/// Builder for [`Coordinator`].
pub struct CoordinatorBuilder {
    config: CoordinatorConfig,
    store: Option<Arc<dyn CacheStore>>,
    network: Option<Arc<dyn Network>>,
    registry: Option<Arc<CacheVersionRegistry>>,
    clients: Option<Arc<ClientRegistry>>,
}

impl CoordinatorBuilder {
    /// Sets the cache store. Required.
    pub fn store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the network. Required.
    pub fn network(mut self, network: Arc<dyn Network>) -> Self {
        self.network = Some(network);
        self
    }

    /// Shares a registry with an earlier coordinator.
    pub fn registry(mut self, registry: Arc<CacheVersionRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Shares a client registry with an earlier coordinator.
    pub fn clients(mut self, clients: Arc<ClientRegistry>) -> Self {
        self.clients = Some(clients);
        self
    }

    /// Validates the configuration and wires the components.
    pub fn build(self) -> Result<Coordinator, ConfigError> {
        let config = self.config;
        config.validate()?;
        let store = self
            .store
            .ok_or_else(|| ConfigError::invalid("store", "not set"))?;
        let network = self
            .network
            .ok_or_else(|| ConfigError::invalid("network", "not set"))?;
        let registry = self.registry.unwrap_or_default();
        let clients = self
            .clients
            .unwrap_or_else(|| Arc::new(ClientRegistry::new(Arc::clone(&registry))));

        let origin = config.origin_url()?;
        let prefix = config.cache_prefix.clone();
        let manifest = Arc::new(config.manifest());
        let classifier = Arc::new(config.classifier()?);
        let executor = Arc::new(StrategyExecutor::new(
            Arc::clone(&registry),
            Arc::clone(&store),
            Arc::clone(&network),
            prefix.clone(),
            &config.root_url()?,
        ));
        let installer = Arc::new(InstallCoordinator::new(
            Arc::clone(&registry),
            Arc::clone(&store),
            network,
            origin,
            prefix.clone(),
        ));
        let sweeper = Arc::new(ActivationSweeper::new(
            Arc::clone(&registry),
            Arc::clone(&clients),
            Arc::clone(&store),
            prefix,
        ));

        let mut handlers: IndexMap<EventKind, Arc<dyn EventHandler>> = IndexMap::new();
        handlers.insert(
            EventKind::Install,
            Arc::new(InstallHandler {
                installer: Arc::clone(&installer),
                manifest,
                generation: config.generation.clone(),
            }),
        );
        handlers.insert(
            EventKind::Activate,
            Arc::new(ActivateHandler {
                sweeper: Arc::clone(&sweeper),
            }),
        );
        handlers.insert(
            EventKind::Fetch,
            Arc::new(FetchHandler {
                classifier: Arc::clone(&classifier),
                executor: Arc::clone(&executor),
            }),
        );
        handlers.insert(
            EventKind::Message,
            Arc::new(MessageHandler {
                sweeper: Arc::clone(&sweeper),
            }),
        );
        handlers.insert(EventKind::Sync, Arc::new(SyncHandler));

        Ok(Coordinator {
            config,
            registry,
            clients,
            store,
            classifier,
            executor,
            installer,
            sweeper,
            handlers,
        })
    }
}

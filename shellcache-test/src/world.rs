use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Error, anyhow};
use cucumber::World;
use shellcache::{
    CacheVersionRegistry, ClientId, ClientRegistry, Coordinator, CoordinatorConfig,
    CoordinatorError, Event, EventOutcome, FetchOutcome, InterceptedRequest, Worker,
};
use shellcache_backend::MemoryStore;
use shellcache_backend::faulty::FaultyStore;
use shellcache_core::mock::MockNetwork;
use smol_str::SmolStr;
use tracing::instrument::WithSubscriber;
use url::Url;

use crate::tracing::SpanCollector;

static WORLD_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// State of one scenario.
///
/// Every deployment builds a new [`Coordinator`] that shares the store, the
/// network, the version registry and the client registry with the previous
/// one, the way a freshly deployed worker script inherits the caches of the
/// old one.
#[derive(World)]
#[world(init = Self::new)]
pub struct ShellWorld {
    pub id: u64,
    pub origin: String,
    pub prefix: String,
    pub precache: Vec<String>,
    pub store: FaultyStore<MemoryStore>,
    pub network: MockNetwork,
    pub registry: Arc<CacheVersionRegistry>,
    pub clients: Arc<ClientRegistry>,
    pub coordinator: Option<Arc<Coordinator>>,
    pub worker: Option<Worker>,
    pub connected: Vec<ClientId>,
    /// Outcome of the last fetch.
    pub outcome: Option<FetchOutcome>,
    /// Error of the last install or activation.
    pub error: Option<CoordinatorError>,
    pub span_collector: SpanCollector,
}

impl ShellWorld {
    pub fn new() -> Self {
        let registry = Arc::new(CacheVersionRegistry::new());
        Self {
            id: WORLD_ID_COUNTER.fetch_add(1, Ordering::SeqCst),
            origin: "https://school.example".to_string(),
            prefix: "school".to_string(),
            precache: vec!["/".into(), "/index.html".into(), "/app.js".into()],
            store: FaultyStore::new(MemoryStore::new()),
            network: MockNetwork::new(),
            clients: Arc::new(ClientRegistry::new(Arc::clone(&registry))),
            registry,
            coordinator: None,
            worker: None,
            connected: Vec::new(),
            outcome: None,
            error: None,
            span_collector: SpanCollector::new(),
        }
    }

    pub fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(Url::parse(&self.origin)?.join(path)?)
    }

    /// Scripts the network to serve the shell entries with bodies naming
    /// `label`.
    pub fn serve_shell(&self, label: &str) -> Result<(), Error> {
        for entry in &self.precache {
            let url = self.url(entry)?;
            self.network
                .respond_ok(url.as_str(), &format!("{label}:{entry}"));
        }
        Ok(())
    }

    fn config(&self, generation: &str) -> CoordinatorConfig {
        CoordinatorConfig::new(
            self.origin.as_str(),
            generation,
            self.precache.iter().map(SmolStr::new),
        )
        .with_cache_prefix(self.prefix.as_str())
    }

    /// Builds the coordinator of a new deployment and spawns its worker.
    /// The previous worker is dropped.
    pub fn deploy(&mut self, generation: &str) -> Result<Arc<Coordinator>, Error> {
        let coordinator = Coordinator::builder(self.config(generation))
            .store(Arc::new(self.store.clone()))
            .network(Arc::new(self.network.clone()))
            .registry(Arc::clone(&self.registry))
            .clients(Arc::clone(&self.clients))
            .build()?;
        let coordinator = Arc::new(coordinator);
        self.worker = Some(Worker::spawn(Arc::clone(&coordinator)));
        self.coordinator = Some(Arc::clone(&coordinator));
        Ok(coordinator)
    }

    pub fn coordinator(&self) -> Result<&Arc<Coordinator>, Error> {
        self.coordinator
            .as_ref()
            .ok_or_else(|| anyhow!("no generation deployed"))
    }

    pub fn worker(&self) -> Result<&Worker, Error> {
        self.worker
            .as_ref()
            .ok_or_else(|| anyhow!("no worker running"))
    }

    /// Dispatches `event` on the latest deployment with spans captured.
    pub async fn dispatch(&mut self, event: Event) -> Result<Option<EventOutcome>, Error> {
        let coordinator = Arc::clone(self.coordinator()?);
        let result = coordinator
            .dispatch(event)
            .with_subscriber(self.span_collector.dispatch().clone())
            .await;
        match result {
            Ok(outcome) => {
                self.error = None;
                Ok(Some(outcome))
            }
            Err(error) => {
                self.error = Some(error);
                Ok(None)
            }
        }
    }

    /// Deploys `generation` and runs its install.
    pub async fn install(&mut self, generation: &str) -> Result<(), Error> {
        self.deploy(generation)?;
        self.dispatch(Event::Install).await?;
        Ok(())
    }

    pub async fn activate(&mut self) -> Result<(), Error> {
        self.dispatch(Event::Activate).await?;
        Ok(())
    }

    /// Installs and activates `generation`, failing the step on any error.
    pub async fn deploy_active(&mut self, generation: &str) -> Result<(), Error> {
        self.install(generation).await?;
        if let Some(error) = self.error.take() {
            return Err(anyhow!("install of {generation} failed: {error}"));
        }
        self.activate().await?;
        if let Some(error) = self.error.take() {
            return Err(anyhow!("activation of {generation} failed: {error}"));
        }
        Ok(())
    }

    /// Posts a raw control message and waits until the worker handled it.
    pub async fn post(&self, raw: &str) -> Result<bool, Error> {
        let worker = self.worker()?;
        let queued = worker.control().post_json(raw);
        // Events are handled in order, so the sync reply means the message
        // before it was handled too.
        worker
            .send(Event::Sync {
                tag: SmolStr::new_static("barrier"),
            })
            .await?;
        Ok(queued)
    }

    pub async fn request(&mut self, path: &str) -> Result<(), Error> {
        let request = InterceptedRequest::get(self.url(path)?);
        let coordinator = Arc::clone(self.coordinator()?);
        let outcome = coordinator
            .fetch(&request)
            .with_subscriber(self.span_collector.dispatch().clone())
            .await;
        self.outcome = Some(outcome);
        Ok(())
    }

    pub fn outcome(&self) -> Result<&FetchOutcome, Error> {
        self.outcome
            .as_ref()
            .ok_or_else(|| anyhow!("no request was made"))
    }

    pub async fn namespaces(&self) -> Result<Vec<String>, Error> {
        use shellcache_backend::CacheStore;

        Ok(self
            .store
            .namespaces()
            .await?
            .into_iter()
            .map(|ns| ns.to_string())
            .collect())
    }
}

impl Default for ShellWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ShellWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShellWorld")
            .field("id", &self.id)
            .field("origin", &self.origin)
            .field("prefix", &self.prefix)
            .field("precache", &self.precache)
            .field("snapshot", &self.registry.snapshot())
            .field("outcome", &self.outcome)
            .finish_non_exhaustive()
    }
}

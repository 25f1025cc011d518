#![allow(dead_code)]

use std::sync::Arc;

use shellcache::{Coordinator, CoordinatorConfig};
use shellcache_backend::CacheStore;
use shellcache_core::InterceptedRequest;
use shellcache_core::mock::MockNetwork;
use url::Url;

pub const ORIGIN: &str = "https://school.example";

pub fn url(path: &str) -> String {
    format!("{ORIGIN}{path}")
}

pub fn get(path: &str) -> InterceptedRequest {
    InterceptedRequest::get(Url::parse(&url(path)).unwrap())
}

/// Network serving a shell of `/`, `/index.html` and `/app.js` whose bodies
/// carry `label`.
pub fn shell_network(label: &str) -> MockNetwork {
    let network = MockNetwork::new();
    serve_shell(&network, label);
    network
}

pub fn serve_shell(network: &MockNetwork, label: &str) {
    network.respond_ok(&url("/"), &format!("<html>{label}</html>"));
    network.respond_ok(&url("/index.html"), &format!("<html>{label}</html>"));
    network.respond_ok(&url("/app.js"), &format!("// {label}"));
}

pub fn config(generation: &str) -> CoordinatorConfig {
    CoordinatorConfig::new(ORIGIN, generation, ["/", "/index.html", "/app.js"])
        .with_cache_prefix("school")
}

/// A coordinator for `generation`, optionally sharing state with the
/// coordinator of an earlier deployment.
pub fn coordinator(
    generation: &str,
    store: Arc<dyn CacheStore>,
    network: &MockNetwork,
    previous: Option<&Coordinator>,
) -> Coordinator {
    let mut builder = Coordinator::builder(config(generation))
        .store(store)
        .network(Arc::new(network.clone()));
    if let Some(previous) = previous {
        builder = builder
            .registry(Arc::clone(previous.registry()))
            .clients(Arc::clone(previous.clients()));
    }
    builder.build().unwrap()
}

pub fn body(outcome: &shellcache::FetchOutcome) -> String {
    let served = outcome.response().expect("expected a response");
    String::from_utf8(served.response.body().to_vec()).unwrap()
}

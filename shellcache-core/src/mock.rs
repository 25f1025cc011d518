//! In-memory network double for tests.
//!
//! Routes are keyed by normalized URL. Unrouted requests answer `404`, so a
//! test only declares the resources it cares about.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use http::StatusCode;
use smol_str::SmolStr;

use crate::request::normalize_url;
use crate::{InterceptedRequest, Network, NetworkError, ResponseSnapshot};

#[derive(Default)]
struct Inner {
    routes: DashMap<SmolStr, ResponseSnapshot>,
    failures: DashMap<SmolStr, NetworkError>,
    calls: DashMap<SmolStr, usize>,
    offline: AtomicBool,
    total: AtomicUsize,
}

/// Scriptable [`Network`] implementation. Clones share state.
#[derive(Clone, Default)]
pub struct MockNetwork {
    inner: Arc<Inner>,
}

impl MockNetwork {
    /// Creates an online network with no routes.
    pub fn new() -> Self {
        Self::default()
    }

    fn key(url: &str) -> SmolStr {
        match url::Url::parse(url) {
            Ok(url) => normalize_url(&url),
            Err(_) => SmolStr::new(url),
        }
    }

    /// Answers requests for `url` with `response`.
    pub fn respond(&self, url: &str, response: ResponseSnapshot) -> &Self {
        let key = Self::key(url);
        self.inner.failures.remove(&key);
        self.inner.routes.insert(key, response);
        self
    }

    /// Answers requests for `url` with `200 OK` and `body`.
    pub fn respond_ok(&self, url: &str, body: &str) -> &Self {
        self.respond(url, ResponseSnapshot::ok(body.to_owned()))
    }

    /// Answers requests for `url` with `status` and `body`.
    pub fn respond_status(&self, url: &str, status: StatusCode, body: &str) -> &Self {
        self.respond(url, ResponseSnapshot::new(status, body.to_owned()))
    }

    /// Fails requests for `url` with `error`.
    pub fn fail(&self, url: &str, error: NetworkError) -> &Self {
        self.inner.failures.insert(Self::key(url), error);
        self
    }

    /// Fails every request with [`NetworkError::Unavailable`].
    pub fn go_offline(&self) {
        self.inner.offline.store(true, Ordering::SeqCst);
    }

    /// Restores connectivity.
    pub fn go_online(&self) {
        self.inner.offline.store(false, Ordering::SeqCst);
    }

    /// Number of fetches issued for `url`, including failed ones.
    pub fn calls_to(&self, url: &str) -> usize {
        self.inner
            .calls
            .get(&Self::key(url))
            .map(|c| *c)
            .unwrap_or(0)
    }

    /// Number of fetches issued in total.
    pub fn total_calls(&self) -> usize {
        self.inner.total.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Network for MockNetwork {
    async fn fetch(&self, request: &InterceptedRequest) -> Result<ResponseSnapshot, NetworkError> {
        let key = normalize_url(request.url());
        *self.inner.calls.entry(key.clone()).or_insert(0) += 1;
        self.inner.total.fetch_add(1, Ordering::SeqCst);

        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(NetworkError::Unavailable("offline".to_owned()));
        }
        if let Some(error) = self.inner.failures.get(&key) {
            return Err(error.clone());
        }
        Ok(self
            .inner
            .routes
            .get(&key)
            .map(|r| r.clone())
            .unwrap_or_else(|| ResponseSnapshot::new(StatusCode::NOT_FOUND, "")))
    }

    fn label(&self) -> &str {
        "mock"
    }
}

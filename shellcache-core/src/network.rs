//! Network access.
//!
//! The coordinator never talks to the network directly. Every fetch goes
//! through a [`Network`] implementation, which lets the reqwest integration,
//! an embedding host or a test double stand behind the same seam.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::{InterceptedRequest, ResponseSnapshot};

/// A failed fetch. Non-2xx responses are not errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    /// No connectivity.
    #[error("network unavailable: {0}")]
    Unavailable(String),
    /// The request did not complete in time.
    #[error("network request timed out")]
    Timeout,
    /// Any other transport failure.
    #[error("network error: {0}")]
    Other(String),
}

/// Performs network fetches on behalf of the coordinator.
#[async_trait]
pub trait Network: Send + Sync {
    /// Fetches `request` and buffers the whole response.
    async fn fetch(&self, request: &InterceptedRequest) -> Result<ResponseSnapshot, NetworkError>;

    /// Name of the network in logs.
    fn label(&self) -> &str {
        "network"
    }
}

#[async_trait]
impl<N> Network for &N
where
    N: Network + ?Sized,
{
    async fn fetch(&self, request: &InterceptedRequest) -> Result<ResponseSnapshot, NetworkError> {
        (**self).fetch(request).await
    }

    fn label(&self) -> &str {
        (**self).label()
    }
}

#[async_trait]
impl<N> Network for Box<N>
where
    N: Network + ?Sized,
{
    async fn fetch(&self, request: &InterceptedRequest) -> Result<ResponseSnapshot, NetworkError> {
        (**self).fetch(request).await
    }

    fn label(&self) -> &str {
        (**self).label()
    }
}

#[async_trait]
impl<N> Network for Arc<N>
where
    N: Network + ?Sized,
{
    async fn fetch(&self, request: &InterceptedRequest) -> Result<ResponseSnapshot, NetworkError> {
        (**self).fetch(request).await
    }

    fn label(&self) -> &str {
        (**self).label()
    }
}

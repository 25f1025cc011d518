//! Network wrapper around `reqwest::Client`.

use async_trait::async_trait;
use bytes::Bytes;
use shellcache_core::{InterceptedRequest, Network, NetworkError, ResponseSnapshot};
use tracing::debug;

/// Sends intercepted requests through a shared `reqwest::Client`.
///
/// Transport failures map to [`NetworkError`]; any HTTP status, including
/// 4xx and 5xx, is a successful fetch.
#[derive(Clone, Debug)]
pub struct ReqwestNetwork {
    client: reqwest::Client,
}

impl ReqwestNetwork {
    /// Create a new network over `client`.
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// The underlying client.
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

impl Default for ReqwestNetwork {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

#[async_trait]
impl Network for ReqwestNetwork {
    async fn fetch(&self, request: &InterceptedRequest) -> Result<ResponseSnapshot, NetworkError> {
        let mut builder = self
            .client
            .request(request.method().clone(), request.url().as_str())
            .headers(request.headers().clone());
        if let Some(body) = request.body() {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await.map_err(into_network_error)?;
        let status = response.status();
        let headers = response.headers().clone();
        let body: Bytes = response.bytes().await.map_err(into_network_error)?;

        debug!(url = %request.url(), status = status.as_u16(), "upstream responded");
        Ok(ResponseSnapshot::new(status, body).with_headers(headers))
    }

    fn label(&self) -> &str {
        "reqwest"
    }
}

fn into_network_error(error: reqwest::Error) -> NetworkError {
    if error.is_timeout() {
        NetworkError::Timeout
    } else if error.is_connect() {
        NetworkError::Unavailable(error.to_string())
    } else {
        NetworkError::Other(error.to_string())
    }
}

//! Response snapshots and their provenance.

use std::fmt;

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use smol_str::SmolStr;

/// A fully buffered response, as fetched from the network or read from a
/// namespace.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSnapshot {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl ResponseSnapshot {
    /// Creates a snapshot without headers.
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Creates a `200 OK` snapshot.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::new(StatusCode::OK, body)
    }

    /// Adds a header.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Replaces all headers.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Returns the status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the body.
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Whether the status is 2xx. Only successful responses are stored.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Splits the snapshot into status, headers and body.
    pub fn into_parts(self) -> (StatusCode, HeaderMap, Bytes) {
        (self.status, self.headers, self.body)
    }
}

/// Where a served response came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseSource {
    /// Fetched from the network during this request.
    Network,
    /// Stored copy of the requested resource, from the named namespace.
    Cache(SmolStr),
    /// Root document served in place of the requested resource.
    Fallback(SmolStr),
}

impl ResponseSource {
    /// Short name used in logs and metrics labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseSource::Network => "network",
            ResponseSource::Cache(_) => "cache",
            ResponseSource::Fallback(_) => "fallback",
        }
    }

    /// Namespace the response was read from, if any.
    pub fn namespace(&self) -> Option<&str> {
        match self {
            ResponseSource::Network => None,
            ResponseSource::Cache(ns) | ResponseSource::Fallback(ns) => Some(ns),
        }
    }
}

impl fmt::Display for ResponseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.namespace() {
            Some(ns) => write!(f, "{}({})", self.as_str(), ns),
            None => f.write_str(self.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_is_2xx_only() {
        assert!(ResponseSnapshot::ok("x").is_success());
        assert!(ResponseSnapshot::new(StatusCode::NO_CONTENT, "").is_success());
        assert!(!ResponseSnapshot::new(StatusCode::NOT_MODIFIED, "").is_success());
        assert!(!ResponseSnapshot::new(StatusCode::NOT_FOUND, "").is_success());
    }

    #[test]
    fn test_source_display() {
        assert_eq!(ResponseSource::Network.to_string(), "network");
        assert_eq!(
            ResponseSource::Fallback("app:v1:shell".into()).to_string(),
            "fallback(app:v1:shell)"
        );
    }
}

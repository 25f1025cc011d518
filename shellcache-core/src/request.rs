//! Intercepted requests and their storage keys.
//!
//! - [`InterceptedRequest`] - an outbound request offered to the coordinator
//! - [`EntryKey`] - the descriptor a response is stored under: method plus
//!   normalized URL
//!
//! ## Normalization
//!
//! The fragment never reaches the network, so it is dropped from the key.
//! Scheme and host are already lowercased by URL parsing; the query string is
//! kept because it selects a different resource.

use std::fmt;

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method};
use smol_str::SmolStr;
use url::Url;

/// Returns `url` without its fragment, as a string.
pub fn normalize_url(url: &Url) -> SmolStr {
    if url.fragment().is_none() {
        return SmolStr::new(url.as_str());
    }
    let mut url = url.clone();
    url.set_fragment(None);
    SmolStr::from(String::from(url))
}

/// Key of a stored response inside a namespace.
///
/// # Example
/// ```
/// use http::Method;
/// use shellcache_core::EntryKey;
/// use url::Url;
///
/// let url = Url::parse("https://School.Example/logo.png#top").unwrap();
/// let key = EntryKey::new(Method::GET, &url);
/// assert_eq!(key.url(), "https://school.example/logo.png");
/// assert_eq!(key.to_string(), "GET https://school.example/logo.png");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryKey {
    method: Method,
    url: SmolStr,
}

impl EntryKey {
    /// Creates the key for `method` and `url`.
    pub fn new(method: Method, url: &Url) -> Self {
        Self {
            method,
            url: normalize_url(url),
        }
    }

    /// Key of a `GET` request for `url`.
    pub fn get(url: &Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Returns the request method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the normalized URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// An outbound request intercepted from the page.
#[derive(Debug, Clone)]
pub struct InterceptedRequest {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Bytes>,
}

impl InterceptedRequest {
    /// Creates a request without headers or body.
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Creates a `GET` request.
    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    /// Adds a header.
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Sets the request body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Returns the request method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Returns the URL path.
    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// Returns the request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the request body, if any.
    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Whether the request is a `GET`. Only `GET` responses are stored.
    pub fn is_get(&self) -> bool {
        self.method == Method::GET
    }

    /// Returns the key this request's response is stored under.
    pub fn key(&self) -> EntryKey {
        EntryKey::new(self.method.clone(), &self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_keeps_query() {
        let url = Url::parse("https://school.example/app.js?v=3").unwrap();
        let key = InterceptedRequest::get(url).key();
        assert_eq!(key.url(), "https://school.example/app.js?v=3");
    }

    #[test]
    fn test_key_distinguishes_method() {
        let url = Url::parse("https://school.example/form").unwrap();
        let get = InterceptedRequest::get(url.clone()).key();
        let post = InterceptedRequest::new(Method::POST, url).key();
        assert_ne!(get, post);
    }

    #[test]
    fn test_fragment_variants_share_key() {
        let a = Url::parse("https://school.example/#/students").unwrap();
        let b = Url::parse("https://school.example/").unwrap();
        assert_eq!(EntryKey::get(&a), EntryKey::get(&b));
    }
}

//! Store label type for identifying cache stores.
//!
//! `StoreLabel` is a newtype wrapper around `SmolStr` used to name a cache
//! store in logs and metrics.

use smol_str::SmolStr;
use std::fmt;

/// A label identifying a cache store.
///
/// # Example
/// ```
/// use shellcache_core::StoreLabel;
///
/// let label = StoreLabel::new("memory");
/// assert_eq!(label.as_str(), "memory");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct StoreLabel(SmolStr);

impl StoreLabel {
    /// Creates a new store label.
    #[inline]
    pub fn new(s: impl Into<SmolStr>) -> Self {
        Self(s.into())
    }

    /// Creates a store label from a static string (no allocation).
    #[inline]
    pub const fn new_static(s: &'static str) -> Self {
        Self(SmolStr::new_static(s))
    }

    /// Returns the label as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StoreLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for StoreLabel {
    #[inline]
    fn from(s: &str) -> Self {
        Self(SmolStr::new(s))
    }
}

impl From<String> for StoreLabel {
    #[inline]
    fn from(s: String) -> Self {
        Self(SmolStr::from(s))
    }
}

impl AsRef<str> for StoreLabel {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.0
    }
}

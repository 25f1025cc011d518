//! Generation identifiers.
//!
//! A generation is one cohort of caches, usually one per deployment. The
//! identifier is opaque: the coordinator only compares generations for
//! equality and embeds them into namespace names.

use std::fmt;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Opaque identifier of a cache generation.
///
/// # Example
/// ```
/// use shellcache_core::GenerationId;
///
/// let generation = GenerationId::new("v2");
/// assert_eq!(generation.as_str(), "v2");
/// assert_eq!(format!("{}", generation), "v2");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenerationId(SmolStr);

impl GenerationId {
    /// Creates a generation identifier.
    #[inline]
    pub fn new(id: impl Into<SmolStr>) -> Self {
        Self(id.into())
    }

    /// Creates a generation identifier from a static string (no allocation).
    #[inline]
    pub const fn new_static(id: &'static str) -> Self {
        Self(SmolStr::new_static(id))
    }

    /// Returns the identifier as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the identifier is empty.
    ///
    /// Empty identifiers cannot be embedded into namespace names and are
    /// rejected by configuration validation.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for GenerationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for GenerationId {
    #[inline]
    fn from(s: &str) -> Self {
        Self(SmolStr::new(s))
    }
}

impl From<String> for GenerationId {
    #[inline]
    fn from(s: String) -> Self {
        Self(SmolStr::from(s))
    }
}

impl AsRef<str> for GenerationId {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equality_is_by_value() {
        assert_eq!(GenerationId::new("v1"), GenerationId::from("v1"));
        assert_ne!(GenerationId::new("v1"), GenerationId::new("v2"));
    }

    #[test]
    fn test_blank_is_empty() {
        assert!(GenerationId::new("").is_empty());
        assert!(GenerationId::new("  ").is_empty());
        assert!(!GenerationId::new_static("v1").is_empty());
    }

    #[test]
    fn test_serde_transparent() {
        let generation: GenerationId = serde_json::from_str("\"2024-09-01\"").unwrap();
        assert_eq!(generation.as_str(), "2024-09-01");
        assert_eq!(serde_json::to_string(&generation).unwrap(), "\"2024-09-01\"");
    }
}

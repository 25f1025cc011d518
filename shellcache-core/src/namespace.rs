//! Generation-scoped namespace naming.
//!
//! Every generation owns two namespaces, one per [`NamespaceRole`]. The
//! namespace name embeds the generation id so stale namespaces can be
//! identified unambiguously when a newer generation is promoted.
//!
//! ## Format
//!
//! `{prefix}:{generation}:{role}`
//!
//! ```
//! use shellcache_core::{GenerationId, NamespaceName, NamespaceRole};
//!
//! let name = NamespaceName::new("shellcache", GenerationId::new("v2"), NamespaceRole::Shell);
//! assert_eq!(name.to_string(), "shellcache:v2:shell");
//!
//! let parsed = NamespaceName::parse("shellcache", "shellcache:v2:runtime").unwrap();
//! assert_eq!(parsed.generation().as_str(), "v2");
//! assert_eq!(parsed.role(), NamespaceRole::Runtime);
//! ```

use std::fmt;

use smol_str::SmolStr;

use crate::GenerationId;

const SEPARATOR: char = ':';

/// Role of a namespace within its generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NamespaceRole {
    /// Precached application shell, immutable until the next generation.
    Shell,
    /// Opportunistic copies of successful same-origin responses.
    Runtime,
}

impl NamespaceRole {
    /// Both roles, in a stable order.
    pub const ALL: [NamespaceRole; 2] = [NamespaceRole::Shell, NamespaceRole::Runtime];

    /// Returns the role as it appears in namespace names.
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            NamespaceRole::Shell => "shell",
            NamespaceRole::Runtime => "runtime",
        }
    }

    fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "shell" => Some(NamespaceRole::Shell),
            "runtime" => Some(NamespaceRole::Runtime),
            _ => None,
        }
    }
}

impl fmt::Display for NamespaceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fully qualified name of one `(generation, role)` namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamespaceName {
    prefix: SmolStr,
    generation: GenerationId,
    role: NamespaceRole,
}

impl NamespaceName {
    /// Creates a namespace name.
    pub fn new(prefix: impl Into<SmolStr>, generation: GenerationId, role: NamespaceRole) -> Self {
        Self {
            prefix: prefix.into(),
            generation,
            role,
        }
    }

    /// Shell namespace of `generation`.
    pub fn shell(prefix: impl Into<SmolStr>, generation: GenerationId) -> Self {
        Self::new(prefix, generation, NamespaceRole::Shell)
    }

    /// Runtime namespace of `generation`.
    pub fn runtime(prefix: impl Into<SmolStr>, generation: GenerationId) -> Self {
        Self::new(prefix, generation, NamespaceRole::Runtime)
    }

    /// Parses a raw namespace name produced under `prefix`.
    ///
    /// Returns `None` for names that were not produced by this naming scheme
    /// (a different prefix, an unknown role or an empty generation).
    /// The role is taken from the last segment, so generation ids that
    /// themselves contain the separator still parse.
    pub fn parse(prefix: &str, raw: &str) -> Option<Self> {
        let rest = raw.strip_prefix(prefix)?.strip_prefix(SEPARATOR)?;
        let (generation, role) = rest.rsplit_once(SEPARATOR)?;
        if generation.is_empty() {
            return None;
        }
        Some(Self {
            prefix: SmolStr::new(prefix),
            generation: GenerationId::new(generation),
            role: NamespaceRole::from_segment(role)?,
        })
    }

    /// Returns the naming prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns the owning generation.
    pub fn generation(&self) -> &GenerationId {
        &self.generation
    }

    /// Returns the namespace role.
    pub fn role(&self) -> NamespaceRole {
        self.role
    }

    /// Returns the raw name as stored in a cache store.
    pub fn to_raw(&self) -> SmolStr {
        SmolStr::from(self.to_string())
    }
}

impl fmt::Display for NamespaceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{SEPARATOR}{}{SEPARATOR}{}",
            self.prefix, self.generation, self.role
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roundtrip() {
        let name = NamespaceName::runtime("app", GenerationId::new("v7"));
        let parsed = NamespaceName::parse("app", &name.to_raw()).unwrap();
        assert_eq!(parsed, name);
    }

    #[test]
    fn test_parse_generation_with_separator() {
        let parsed = NamespaceName::parse("app", "app:2024:09:shell").unwrap();
        assert_eq!(parsed.generation().as_str(), "2024:09");
        assert_eq!(parsed.role(), NamespaceRole::Shell);
    }

    #[test]
    fn test_parse_rejects_foreign_names() {
        assert!(NamespaceName::parse("app", "other:v1:shell").is_none());
        assert!(NamespaceName::parse("app", "app:v1:images").is_none());
        assert!(NamespaceName::parse("app", "app::shell").is_none());
        assert!(NamespaceName::parse("app", "application:v1:shell").is_none());
        assert!(NamespaceName::parse("app", "app").is_none());
    }
}

//! Coordinator configuration.
//!
//! Loaded from YAML:
//!
//! ```yaml
//! origin: https://school.example
//! generation: "2024-09-01"
//! cache_prefix: school
//! root_document: /
//! precache:
//!   - /
//!   - /index.html
//!   - /app.js
//! api:
//!   - /api/*
//! ```
//!
//! `cache_prefix`, `root_document` and `api` are optional. Changing the
//! precache list requires a new `generation`.

use serde::{Deserialize, Serialize};
use shellcache_core::GenerationId;
use smol_str::SmolStr;
use url::Url;

use crate::classifier::ApiPattern;
use crate::error::ConfigError;
use crate::{PrecacheManifest, RequestClassifier};

fn default_prefix() -> SmolStr {
    SmolStr::new_static("shellcache")
}

fn default_root_document() -> SmolStr {
    SmolStr::new_static("/")
}

fn default_api() -> Vec<SmolStr> {
    vec![SmolStr::new_static("/api/*")]
}

/// Configuration of one deployed generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CoordinatorConfig {
    /// Origin the application is served from.
    pub origin: String,
    /// Generation id of this deployment.
    pub generation: GenerationId,
    /// Prefix of every namespace name.
    #[serde(default = "default_prefix")]
    pub cache_prefix: SmolStr,
    /// Document served as offline fallback. Must be precached.
    #[serde(default = "default_root_document")]
    pub root_document: SmolStr,
    /// Paths of the application shell.
    pub precache: Vec<SmolStr>,
    /// Patterns of same-origin API paths.
    #[serde(default = "default_api")]
    pub api: Vec<SmolStr>,
}

impl CoordinatorConfig {
    /// Creates a configuration with default prefix, root document and API
    /// patterns.
    pub fn new<I, S>(origin: impl Into<String>, generation: impl Into<GenerationId>, precache: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        Self {
            origin: origin.into(),
            generation: generation.into(),
            cache_prefix: default_prefix(),
            root_document: default_root_document(),
            precache: precache.into_iter().map(Into::into).collect(),
            api: default_api(),
        }
    }

    /// Sets the namespace prefix.
    pub fn with_cache_prefix(mut self, prefix: impl Into<SmolStr>) -> Self {
        self.cache_prefix = prefix.into();
        self
    }

    /// Sets the root document.
    pub fn with_root_document(mut self, path: impl Into<SmolStr>) -> Self {
        self.root_document = path.into();
        self
    }

    /// Replaces the API patterns.
    pub fn with_api<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        self.api = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Parses and validates a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_saphyr::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.generation.is_empty() {
            return Err(ConfigError::invalid("generation", "must not be empty"));
        }
        if self.cache_prefix.trim().is_empty() {
            return Err(ConfigError::invalid("cache_prefix", "must not be empty"));
        }
        self.origin_url()?;

        if self.precache.is_empty() {
            return Err(ConfigError::invalid("precache", "must list at least one path"));
        }
        for path in &self.precache {
            if !path.starts_with('/') {
                return Err(ConfigError::invalid(
                    "precache",
                    format!("path {path:?} must start with '/'"),
                ));
            }
        }
        if !self.root_document.starts_with('/') {
            return Err(ConfigError::invalid("root_document", "must start with '/'"));
        }
        if !self.precache.contains(&self.root_document) {
            return Err(ConfigError::invalid(
                "root_document",
                format!("{:?} is not precached", self.root_document),
            ));
        }
        for pattern in &self.api {
            ApiPattern::check(pattern)?;
        }
        Ok(())
    }

    /// The parsed origin.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        let url =
            Url::parse(&self.origin).map_err(|e| ConfigError::invalid("origin", e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::invalid(
                "origin",
                format!("scheme {:?} is not http(s)", url.scheme()),
            ));
        }
        if url.host().is_none() {
            return Err(ConfigError::invalid("origin", "has no host"));
        }
        Ok(url)
    }

    /// Absolute URL of the root document.
    pub fn root_url(&self) -> Result<Url, ConfigError> {
        self.origin_url()?
            .join(&self.root_document)
            .map_err(|e| ConfigError::invalid("root_document", e.to_string()))
    }

    /// The precache manifest.
    pub fn manifest(&self) -> PrecacheManifest {
        self.precache.iter().cloned().collect()
    }

    /// The request classifier.
    pub fn classifier(&self) -> Result<RequestClassifier, ConfigError> {
        RequestClassifier::new(
            &self.origin_url()?,
            &self.manifest(),
            &self.root_document,
            self.api.iter().map(SmolStr::as_str),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shellcache_core::RequestClass;

    const YAML: &str = r#"
origin: https://school.example
generation: v2
precache:
  - /
  - /index.html
  - /app.js
"#;

    #[test]
    fn test_defaults() {
        let config = CoordinatorConfig::from_yaml(YAML).unwrap();
        assert_eq!(config.generation, GenerationId::new("v2"));
        assert_eq!(config.cache_prefix, "shellcache");
        assert_eq!(config.root_document, "/");
        assert_eq!(config.api, vec![SmolStr::new("/api/*")]);
        assert_eq!(config.manifest().len(), 3);
    }

    #[test]
    fn test_invalid_pattern_never_reaches_the_router() {
        let config = CoordinatorConfig::new("https://school.example", "v1", ["/"])
            .with_api(["/reports/{year:\\d{4}"]);
        assert!(matches!(
            config.classifier(),
            Err(ConfigError::Invalid { field: "api", .. })
        ));
    }

    #[test]
    fn test_classifier_from_config() {
        let config = CoordinatorConfig::from_yaml(YAML).unwrap();
        let classifier = config.classifier().unwrap();
        let url = Url::parse("https://school.example/api/students").unwrap();
        assert_eq!(classifier.classify(&url), RequestClass::ApiCall);
    }

    #[test]
    fn test_unknown_field_is_parse_error() {
        let yaml = format!("{YAML}ttl: 60\n");
        assert!(matches!(
            CoordinatorConfig::from_yaml(&yaml),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_validation() {
        let base = CoordinatorConfig::new("https://school.example", "v1", ["/", "/app.js"]);
        assert!(base.validate().is_ok());

        let cases = [
            (base.clone().with_root_document("/index.html"), "root_document"),
            (CoordinatorConfig::new("https://school.example", " ", ["/"]), "generation"),
            (CoordinatorConfig::new("ftp://school.example", "v1", ["/"]), "origin"),
            (CoordinatorConfig::new("https://school.example", "v1", ["app.js", "/"]), "precache"),
            (
                CoordinatorConfig::new("https://school.example", "v1", Vec::<&str>::new()),
                "precache",
            ),
            (base.clone().with_api(["/api/{id"]), "api"),
            (base.clone().with_api(["/api/{id:(}"]), "api"),
            (base.clone().with_api(["/api/*", "/files/{tail}*/raw"]), "api"),
            (base.clone().with_cache_prefix(""), "cache_prefix"),
        ];
        for (config, expected) in cases {
            match config.validate() {
                Err(ConfigError::Invalid { field, .. }) => assert_eq!(field, expected),
                other => panic!("expected invalid {expected}, got {other:?}"),
            }
        }
    }
}

//! Request classification.
//!
//! Rules are evaluated in order, first match wins:
//!
//! 1. Origin differs from the client origin: [`RequestClass::CrossOrigin`]
//! 2. Path matches an API pattern: [`RequestClass::ApiCall`]
//! 3. Path is precached or is the root document: [`RequestClass::AppShell`]
//! 4. Anything else: [`RequestClass::RuntimeAsset`]
//!
//! # Pattern Syntax
//!
//! Patterns are [actix-router](https://docs.rs/actix-router) resources.
//!
//! - `/api/*` matches `/api` and everything below it on a segment boundary
//! - `/api/users/{id}` matches a single dynamic segment
//! - `/files/{tail}*` matches the remaining segments
//! - `/reports/{year:\d{4}}` restricts a segment with a regex

use std::collections::HashSet;

use actix_router::ResourceDef;
use indexmap::IndexSet;
use regex::Regex;
use shellcache_core::RequestClass;
use smol_str::SmolStr;
use url::{Origin, Url};

use crate::PrecacheManifest;
use crate::error::ConfigError;

/// Dynamic segments the router accepts in one pattern.
const MAX_DYNAMIC_SEGMENTS: usize = 16;

/// A compiled API pattern.
#[derive(Debug, Clone)]
pub struct ApiPattern {
    raw: SmolStr,
    resource: ResourceDef,
}

impl ApiPattern {
    /// Compiles `pattern` after [`ApiPattern::check`] accepted it.
    pub fn new(pattern: &str) -> Result<Self, ConfigError> {
        Self::check(pattern)?;
        let resource = match pattern.strip_suffix("/*") {
            Some("") => ResourceDef::new("/{tail}*"),
            Some(prefix) => ResourceDef::prefix(prefix),
            None => ResourceDef::new(pattern),
        };
        Ok(Self {
            raw: SmolStr::new(pattern),
            resource,
        })
    }

    /// Rejects patterns the router cannot compile.
    ///
    /// Dynamic segments are `{name}` or `{name:regex}` with a unique name.
    /// Custom regexes may nest braces (`{year:\d{4}}`) and must compile. A
    /// `{name}*` tail takes no regex and only closes the pattern.
    pub fn check(pattern: &str) -> Result<(), ConfigError> {
        let invalid =
            |reason: String| ConfigError::invalid("api", format!("pattern {pattern:?} {reason}"));
        if !pattern.starts_with('/') {
            return Err(invalid("must start with '/'".to_string()));
        }

        let body = pattern.strip_suffix("/*").unwrap_or(pattern);
        let mut names = HashSet::new();
        let mut rest = body;
        while let Some(start) = rest.find(['{', '}']) {
            let segment = &rest[start..];
            let end = segment
                .starts_with('{')
                .then(|| closing_brace(segment))
                .flatten()
                .ok_or_else(|| invalid("has unbalanced braces".to_string()))?;

            let (name, custom) = match segment[1..end].split_once(':') {
                Some((name, regex)) => (name, Some(regex)),
                None => (&segment[1..end], None),
            };
            if !is_segment_name(name) {
                return Err(invalid(format!("has invalid segment name {name:?}")));
            }
            if !names.insert(name) {
                return Err(invalid(format!("repeats segment {name:?}")));
            }
            if let Some(regex) = custom {
                Regex::new(regex)
                    .map_err(|e| invalid(format!("has an invalid regex in {{{name}}}: {e}")))?;
            }

            rest = &segment[end + 1..];
            if let Some(after) = rest.strip_prefix('*') {
                if custom.is_some() {
                    return Err(invalid(format!("cannot use a regex in tail {{{name}}}")));
                }
                if !after.is_empty() || body.len() != pattern.len() {
                    return Err(invalid(format!("must end with tail {{{name}}}*")));
                }
                rest = after;
            }
        }

        if names.len() > MAX_DYNAMIC_SEGMENTS {
            return Err(invalid(format!(
                "has more than {MAX_DYNAMIC_SEGMENTS} dynamic segments"
            )));
        }
        Ok(())
    }

    /// The pattern as configured.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether `path` matches.
    pub fn is_match(&self, path: &str) -> bool {
        self.resource.is_match(path)
    }
}

/// Byte offset of the brace closing the one `segment` starts with.
fn closing_brace(segment: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in segment.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn is_segment_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Pure classifier from request URL to [`RequestClass`].
#[derive(Debug, Clone)]
pub struct RequestClassifier {
    origin: Origin,
    api: Vec<ApiPattern>,
    shell: IndexSet<SmolStr>,
}

impl RequestClassifier {
    /// Creates a classifier for clients served from `origin`.
    ///
    /// Fails on the first API pattern [`ApiPattern::check`] rejects.
    pub fn new<'a>(
        origin: &Url,
        manifest: &PrecacheManifest,
        root_document: &str,
        api_patterns: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, ConfigError> {
        let mut shell: IndexSet<SmolStr> = manifest.iter().map(SmolStr::new).collect();
        shell.insert(SmolStr::new(root_document));
        Ok(Self {
            origin: origin.origin(),
            api: api_patterns
                .into_iter()
                .map(ApiPattern::new)
                .collect::<Result<_, _>>()?,
            shell,
        })
    }

    /// Classifies `url`.
    pub fn classify(&self, url: &Url) -> RequestClass {
        if url.origin() != self.origin {
            return RequestClass::CrossOrigin;
        }
        let path = url.path();
        if self.api.iter().any(|pattern| pattern.is_match(path)) {
            return RequestClass::ApiCall;
        }
        if self.is_shell(url) {
            return RequestClass::AppShell;
        }
        RequestClass::RuntimeAsset
    }

    fn is_shell(&self, url: &Url) -> bool {
        let path = url.path();
        if self.shell.contains(path) {
            return true;
        }
        match url.query() {
            Some(query) => self.shell.contains(format!("{path}?{query}").as_str()),
            None => false,
        }
    }

    /// The configured API patterns.
    pub fn api_patterns(&self) -> &[ApiPattern] {
        &self.api
    }
}

//! The precache manifest.

use indexmap::IndexSet;
use smol_str::SmolStr;
use url::Url;

/// Ordered, de-duplicated set of root-relative paths that make up the
/// application shell.
///
/// # Example
/// ```
/// use shellcache::PrecacheManifest;
///
/// let manifest = PrecacheManifest::new(["/", "/app.js", "/", "/app.css"]);
/// assert_eq!(manifest.len(), 3);
/// assert!(manifest.contains("/app.js"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrecacheManifest {
    entries: IndexSet<SmolStr>,
}

impl PrecacheManifest {
    /// Creates a manifest. Duplicates keep their first position.
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<SmolStr>,
    {
        Self {
            entries: entries.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether `path` is part of the shell.
    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains(path)
    }

    /// Entries in manifest order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(SmolStr::as_str)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the manifest is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolves every entry against `origin`, in manifest order.
    pub fn resolve<'a>(
        &'a self,
        origin: &'a Url,
    ) -> impl Iterator<Item = (&'a str, Result<Url, url::ParseError>)> + 'a {
        self.iter().map(move |entry| (entry, origin.join(entry)))
    }
}

impl<S: Into<SmolStr>> FromIterator<S> for PrecacheManifest {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_is_preserved() {
        let manifest: PrecacheManifest = ["/index.html", "/", "/app.js", "/index.html"]
            .into_iter()
            .collect();
        assert_eq!(
            manifest.iter().collect::<Vec<_>>(),
            vec!["/index.html", "/", "/app.js"]
        );
    }

    #[test]
    fn test_resolve_against_origin() {
        let origin = Url::parse("https://school.example").unwrap();
        let manifest = PrecacheManifest::new(["/", "/static/app.js?v=2"]);
        let urls: Vec<String> = manifest
            .resolve(&origin)
            .map(|(_, url)| url.unwrap().to_string())
            .collect();
        assert_eq!(
            urls,
            vec![
                "https://school.example/",
                "https://school.example/static/app.js?v=2"
            ]
        );
    }
}

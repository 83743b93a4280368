//! Manifest resolution.
//!
//! Turns a collection identifier and optional filter into the ordered,
//! deduplicated list of file names a run will request.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::archive::ArchiveCatalog;
use crate::error::{FetchError, FetchResult};
use crate::job::NameFilter;

/// Ordered sequence of unique file names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileManifest {
    names: Vec<String>,
}

impl FileManifest {
    /// Build a manifest, dropping repeated names but keeping first-seen order.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let names = names
            .into_iter()
            .map(Into::into)
            .filter(|name: &String| seen.insert(name.clone()))
            .collect();
        Self { names }
    }

    /// File names in manifest order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Number of files.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Returns true if the manifest has no files.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Consume the manifest, returning its names.
    pub fn into_names(self) -> Vec<String> {
        self.names
    }
}

/// Resolves file manifests through an [`ArchiveCatalog`].
pub struct ManifestResolver<'a> {
    catalog: &'a dyn ArchiveCatalog,
}

impl<'a> ManifestResolver<'a> {
    /// Create a resolver over `catalog`.
    pub fn new(catalog: &'a dyn ArchiveCatalog) -> Self {
        Self { catalog }
    }

    /// Resolve the manifest of `identifier`, keeping names matching `filter`.
    ///
    /// Makes exactly one catalog call. Any catalog failure is reported as
    /// [`FetchError::ManifestUnavailable`].
    pub fn resolve(
        &self,
        identifier: &str,
        filter: Option<&NameFilter>,
    ) -> FetchResult<FileManifest> {
        let files = self
            .catalog
            .list_files(identifier, filter)
            .map_err(|source| FetchError::ManifestUnavailable {
                identifier: identifier.to_string(),
                source,
            })?;

        let listed = files.len();
        let manifest = FileManifest::new(files.into_iter().map(|f| f.name));

        if manifest.len() < listed {
            debug!(
                identifier,
                duplicates = listed - manifest.len(),
                "Dropped duplicate names from catalog listing"
            );
        }
        info!(
            identifier,
            filter = filter.map(|f| f.as_str()),
            files = manifest.len(),
            "Resolved manifest"
        );

        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{CatalogError, FileDescriptor};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticCatalog {
        names: Vec<&'static str>,
        calls: AtomicUsize,
    }

    impl StaticCatalog {
        fn new(names: Vec<&'static str>) -> Self {
            Self {
                names,
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl ArchiveCatalog for StaticCatalog {
        fn list_files(
            &self,
            _identifier: &str,
            filter: Option<&NameFilter>,
        ) -> Result<Vec<FileDescriptor>, CatalogError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .names
                .iter()
                .filter(|n| filter.map_or(true, |f| f.matches(n)))
                .map(|n| FileDescriptor::named(*n))
                .collect())
        }
    }

    struct OfflineCatalog;

    impl ArchiveCatalog for OfflineCatalog {
        fn list_files(
            &self,
            _identifier: &str,
            _filter: Option<&NameFilter>,
        ) -> Result<Vec<FileDescriptor>, CatalogError> {
            Err(CatalogError::Request("connection refused".to_string()))
        }
    }

    #[test]
    fn test_manifest_drops_duplicates_in_order() {
        let manifest = FileManifest::new(["b", "a", "b", "c", "a"]);
        assert_eq!(manifest.names(), &["b", "a", "c"]);
        assert_eq!(manifest.len(), 3);
    }

    #[test]
    fn test_resolve_single_catalog_call() {
        let catalog = StaticCatalog::new(vec!["a.txt", "b.txt", "a.txt"]);
        let resolver = ManifestResolver::new(&catalog);

        let manifest = resolver.resolve("demo", None).unwrap();

        assert_eq!(manifest.names(), &["a.txt", "b.txt"]);
        assert_eq!(catalog.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_resolve_applies_filter() {
        let catalog = StaticCatalog::new(vec!["a.txt", "b.pdf", "c.txt"]);
        let resolver = ManifestResolver::new(&catalog);
        let filter = NameFilter::new("*.txt").unwrap();

        let manifest = resolver.resolve("demo", Some(&filter)).unwrap();

        assert_eq!(manifest.names(), &["a.txt", "c.txt"]);
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let catalog = StaticCatalog::new(vec!["a.txt", "b.txt"]);
        let resolver = ManifestResolver::new(&catalog);

        let first = resolver.resolve("demo", None).unwrap();
        let second = resolver.resolve("demo", None).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_resolve_failure_is_manifest_unavailable() {
        let resolver = ManifestResolver::new(&OfflineCatalog);

        let err = resolver.resolve("demo", None).unwrap_err();

        assert!(matches!(
            err,
            FetchError::ManifestUnavailable { ref identifier, .. } if identifier == "demo"
        ));
    }
}

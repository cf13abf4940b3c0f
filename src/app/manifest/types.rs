//! Core types for manifest resolution

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::app::models::ResolvedUrl;

/// Counters gathered while reading a manifest document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestStats {
    /// Entries taken from `urlVersions`
    pub versioned_entries: usize,
    /// Entries taken from `urlMappings`
    pub mapped_entries: usize,
    /// Version values that were neither strings nor null
    pub coerced_versions: usize,
}

impl ManifestStats {
    /// Total number of URLs the manifest resolves to
    pub fn total_entries(&self) -> usize {
        self.versioned_entries + self.mapped_entries
    }
}

/// An immutable snapshot of a resource manifest
///
/// The document shape is
/// `{ "manifest": { "urlVersions": { path: query }, "urlMappings": { path: null } } }`.
/// Key order of both maps is kept exactly as written, because it decides
/// the fetch order whenever no priority patterns are given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    url_versions: Vec<(String, Option<String>)>,
    url_mappings: Vec<String>,
    stats: ManifestStats,
}

impl Manifest {
    /// An empty manifest
    pub fn empty() -> Self {
        Self::default()
    }

    /// Read a manifest from a parsed JSON document
    ///
    /// Anything that does not have the expected shape contributes no
    /// entries; a completely malformed document is an empty manifest.
    pub fn from_document(document: &Value) -> Self {
        let Some(inner) = document.get("manifest").and_then(Value::as_object) else {
            if !document.is_null() && document.as_object().is_some_and(|o| !o.is_empty()) {
                warn!("Manifest document has no 'manifest' object, nothing to prefetch");
            }
            return Self::empty();
        };

        let mut stats = ManifestStats::default();

        let url_versions: Vec<(String, Option<String>)> = object_field(inner, "urlVersions")
            .map(|versions| {
                versions
                    .iter()
                    .map(|(path, query)| {
                        let query = match query {
                            Value::Null => None,
                            Value::String(s) => Some(s.clone()),
                            other => {
                                stats.coerced_versions += 1;
                                Some(other.to_string())
                            }
                        };
                        (path.clone(), query)
                    })
                    .collect()
            })
            .unwrap_or_default();

        let url_mappings: Vec<String> = object_field(inner, "urlMappings")
            .map(|mappings| mappings.keys().cloned().collect())
            .unwrap_or_default();

        stats.versioned_entries = url_versions.len();
        stats.mapped_entries = url_mappings.len();

        Self {
            url_versions,
            url_mappings,
            stats,
        }
    }

    /// Expand both maps into absolute URLs
    ///
    /// Versioned entries come first, each as `origin + path + query`,
    /// followed by mapped entries as `origin + path`.
    pub fn resolve(&self, origin: &str) -> Vec<ResolvedUrl> {
        let versioned = self
            .url_versions
            .iter()
            .map(|(path, query)| ResolvedUrl::new(origin, path, query.as_deref()));
        let mapped = self
            .url_mappings
            .iter()
            .map(|path| ResolvedUrl::new(origin, path, None));

        versioned.chain(mapped).collect()
    }

    pub fn url_versions(&self) -> &[(String, Option<String>)] {
        &self.url_versions
    }

    pub fn url_mappings(&self) -> &[String] {
        &self.url_mappings
    }

    pub fn stats(&self) -> &ManifestStats {
        &self.stats
    }

    pub fn len(&self) -> usize {
        self.stats.total_entries()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn object_field<'a>(object: &'a Map<String, Value>, field: &str) -> Option<&'a Map<String, Value>> {
    match object.get(field) {
        Some(Value::Object(map)) => Some(map),
        None | Some(Value::Null) => None,
        Some(_) => {
            warn!("Manifest field '{}' is not an object, ignoring it", field);
            None
        }
    }
}

//! Manifest reading and URL resolution
//!
//! A manifest maps resource paths to cache-busting version queries. This
//! module reads it from a key-value store, parses it leniently, and expands
//! it into absolute URLs for a given origin.
//!
//! # Example
//!
//! ```rust
//! use prefetcher::app::manifest::{resolve_urls, Manifest};
//! use serde_json::json;
//!
//! let document = json!({
//!     "manifest": {
//!         "urlVersions": { "/app.js": "?v=42" },
//!         "urlMappings": { "/logo.svg": null }
//!     }
//! });
//!
//! let urls = resolve_urls(&document, "https://example.com");
//! assert_eq!(urls[0].as_str(), "https://example.com/app.js?v=42");
//! assert_eq!(urls[1].as_str(), "https://example.com/logo.svg");
//! assert!(Manifest::from_document(&json!("garbage")).is_empty());
//! ```

pub mod store;
pub mod types;

#[cfg(test)]
mod tests;

pub use store::{DirectoryStore, ManifestStore, MemoryStore};
pub use types::{Manifest, ManifestStats};

use serde_json::Value;
use tracing::{debug, warn};

use crate::app::models::ResolvedUrl;
use crate::errors::{ManifestError, ManifestResult};

/// Resolve a manifest document into absolute URLs
///
/// A malformed document resolves to no URLs.
pub fn resolve_urls(document: &Value, origin: &str) -> Vec<ResolvedUrl> {
    Manifest::from_document(document).resolve(origin)
}

/// Parse a raw manifest string into a JSON document
pub fn parse_document(raw: &str) -> ManifestResult<Value> {
    Ok(serde_json::from_str(raw)?)
}

/// Read and parse the manifest stored under `key`
pub fn read_document(store: &dyn ManifestStore, key: &str) -> ManifestResult<Value> {
    let raw = store.get_item(key)?.ok_or_else(|| ManifestError::Missing {
        key: key.to_string(),
    })?;
    parse_document(&raw)
}

/// Read the manifest stored under `key`, degrading to an empty document
///
/// Read and parse failures are logged; the resulting run has nothing to
/// fetch but still completes normally.
pub fn load_document(store: &dyn ManifestStore, key: &str) -> Value {
    match read_document(store, key) {
        Ok(document) => {
            debug!("Loaded manifest document from key '{}'", key);
            document
        }
        Err(e) => {
            warn!("Using empty manifest: {}", e);
            Value::Object(Default::default())
        }
    }
}

//! Core data types shared across the prefetch pipeline

use std::fmt;

use serde::{Deserialize, Serialize};

/// An absolute URL produced from a manifest entry
///
/// Built as `origin + path + version query` by plain concatenation, exactly
/// as the manifest describes it. The value is never modified after creation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResolvedUrl(String);

impl ResolvedUrl {
    /// Join an origin, a manifest path and an optional version query
    pub fn new(origin: &str, path: &str, version_query: Option<&str>) -> Self {
        let mut url = String::with_capacity(
            origin.len() + path.len() + version_query.map_or(0, str::len),
        );
        url.push_str(origin);
        url.push_str(path);
        if let Some(query) = version_query {
            url.push_str(query);
        }
        Self(url)
    }

    /// Borrow the URL as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the underlying string
    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<String> for ResolvedUrl {
    fn from(url: String) -> Self {
        Self(url)
    }
}

impl From<&str> for ResolvedUrl {
    fn from(url: &str) -> Self {
        Self(url.to_string())
    }
}

impl AsRef<str> for ResolvedUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResolvedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

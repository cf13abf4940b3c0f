//! On-disk response cache with atomic writes
//!
//! Every URL path becomes a directory under `<root>/<host>[_<port>]`, and the
//! body lives in a `#body` (or `#index`, for a trailing slash) leaf inside
//! it. `/docs` and `/docs/intro.html` therefore map to `docs/#body` and
//! `docs/intro.html/#body` and never collide. A query string is folded into
//! the leaf name so differently versioned copies sit side by side. Writes go
//! to a temporary sibling first and are renamed into place, so a reader never
//! sees a half-written file.

use std::path::{Component, Path, PathBuf};

use tokio::io::AsyncWriteExt;
use url::Url;

use crate::constants::cache;
use crate::errors::{FetchError, FetchResult};

/// Response body cache rooted at a directory
#[derive(Debug, Clone)]
pub struct ResponseCache {
    root: PathBuf,
}

impl ResponseCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Default location under the user cache directory
    pub fn default_root() -> PathBuf {
        dirs::cache_dir()
            .map(|dir| dir.join(cache::APP_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from("./cache"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path a URL's body is stored at
    pub fn path_for(&self, url: &Url) -> PathBuf {
        let mut path = self.root.clone();

        let host = url.host_str().unwrap_or("local");
        match url.port() {
            Some(port) => path.push(format!("{}_{}", host, port)),
            None => path.push(host),
        }

        // Only keep normal components so ".." in a URL can never escape the root
        let url_path = Path::new(url.path().trim_start_matches('/'));
        for component in url_path.components() {
            if let Component::Normal(part) = component {
                path.push(part);
            }
        }

        let leaf = if url.path().ends_with('/') {
            cache::INDEX_FILE_NAME
        } else {
            cache::BODY_FILE_NAME
        };
        match url.query() {
            Some(query) => path.push(format!(
                "{}{}{}",
                leaf,
                cache::QUERY_SEPARATOR,
                sanitize(query)
            )),
            None => path.push(leaf),
        }

        path
    }

    /// Store a response body for `url`, replacing any previous copy
    pub async fn store(&self, url: &Url, body: &[u8]) -> FetchResult<PathBuf> {
        let destination = self.path_for(url);
        let cache_error = |source: std::io::Error, path: &Path| FetchError::CacheWrite {
            url: url.to_string(),
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| cache_error(e, parent))?;
        }

        let mut temp_name = destination
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        temp_name.push(cache::TEMP_FILE_SUFFIX);
        let temp_path = destination.with_file_name(temp_name);

        let write_result = async {
            let mut file = tokio::fs::File::create(&temp_path).await?;
            file.write_all(body).await?;
            file.flush().await?;
            tokio::fs::rename(&temp_path, &destination).await
        }
        .await;

        if let Err(e) = write_result {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(cache_error(e, &destination));
        }

        tracing::debug!("Cached {} bytes at {}", body.len(), destination.display());
        Ok(destination)
    }
}

fn sanitize(query: &str) -> String {
    query
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect()
}

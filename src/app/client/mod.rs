//! Fetching resources for the prefetch queue
//!
//! The queue only knows about the [`ResourceFetcher`] trait. [`HttpFetcher`]
//! is the real implementation: a plain GET through `reqwest`, with an
//! optional on-disk [`ResponseCache`] that keeps the body.
//!
//! - `config`: HTTP client configuration and building
//! - `http`: GET with a request-rate ceiling
//! - `cache`: atomic on-disk body storage

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::app::models::ResolvedUrl;
use crate::errors::{FetchError, FetchResult};

pub mod cache;
pub mod config;
pub mod http;

pub use cache::ResponseCache;
pub use config::ClientConfig;

use http::HttpHandler;

/// What a successful fetch produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchOutcome {
    /// HTTP status code
    pub status: u16,
    /// Body size in bytes
    pub bytes: u64,
    /// Time from request to fully read body
    pub elapsed: Duration,
}

/// Something that can fetch a resolved URL
///
/// Implementations must not retry; the queue treats every call as a
/// single best-effort attempt.
#[async_trait]
pub trait ResourceFetcher: Send + Sync {
    async fn fetch(&self, url: &ResolvedUrl) -> FetchResult<FetchOutcome>;
}

#[async_trait]
impl<F: ResourceFetcher + ?Sized> ResourceFetcher for Arc<F> {
    async fn fetch(&self, url: &ResolvedUrl) -> FetchResult<FetchOutcome> {
        (**self).fetch(url).await
    }
}

/// HTTP fetcher backed by `reqwest`
#[derive(Debug)]
pub struct HttpFetcher {
    http_handler: HttpHandler,
    cache: Option<ResponseCache>,
}

impl HttpFetcher {
    /// Create a fetcher with the default client configuration
    pub fn new() -> FetchResult<Self> {
        Self::with_config(&ClientConfig::default())
    }

    /// Create a fetcher with a custom client configuration
    pub fn with_config(config: &ClientConfig) -> FetchResult<Self> {
        let client = config.build_http_client()?;
        let http_handler = HttpHandler::new(client, config.max_requests_per_second)?;
        let cache = config.cache_dir.clone().map(ResponseCache::new);

        if let Some(cache) = &cache {
            tracing::info!("Caching prefetched bodies under {}", cache.root().display());
        }

        Ok(Self {
            http_handler,
            cache,
        })
    }

    pub fn cache(&self) -> Option<&ResponseCache> {
        self.cache.as_ref()
    }
}

#[async_trait]
impl ResourceFetcher for HttpFetcher {
    async fn fetch(&self, url: &ResolvedUrl) -> FetchResult<FetchOutcome> {
        let parsed = Url::parse(url.as_str()).map_err(|e| FetchError::InvalidUrl {
            url: url.to_string(),
            error: e.to_string(),
        })?;

        let started = Instant::now();
        let response = self.http_handler.get(&parsed).await?;
        let status = response.status().as_u16();

        // Reading the body to the end is what actually warms any cache in between
        let body = response.bytes().await.map_err(|source| FetchError::Http {
            url: url.to_string(),
            source,
        })?;

        if let Some(cache) = &self.cache {
            cache.store(&parsed, &body).await?;
        }

        Ok(FetchOutcome {
            status,
            bytes: body.len() as u64,
            elapsed: started.elapsed(),
        })
    }
}

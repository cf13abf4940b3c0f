//! Prelude module for the prefetcher library
//!
//! Re-exports the items most integrations need with a single
//! `use prefetcher::prelude::*;` statement.
//!
//! # Usage
//!
//! ```rust,no_run
//! use prefetcher::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let scope = ServiceScope::new();
//!     let fetcher = Arc::new(HttpFetcher::with_config(&ClientConfig::default())?);
//!     let service = PrefetchService::new("https://example.com", fetcher)?.spawn(&scope);
//!
//!     let prefetcher = Prefetcher::new(Arc::new(scope.client()), Arc::new(MemoryStore::new()));
//!     let mut handle = prefetcher.init("{}", "manifest", None);
//!     handle.next_completion().await;
//!
//!     service.shutdown();
//!     Ok(())
//! }
//! ```

// Core result types
pub use crate::errors::{AppError, Result};

pub use crate::app::{
    // Background
    ClientConfig,
    DrainReport,
    HttpFetcher,
    PrefetchService,
    QueueEvent,
    QueueProcessor,
    ResourceFetcher,
    ServiceHandle,

    // Foreground
    IdlePolicy,
    PrefetchHandle,
    Prefetcher,

    // Shared data and plumbing
    Channel,
    Envelope,
    FilterConfig,
    ManifestStore,
    MemoryStore,
    ResolvedUrl,
    ServiceScope,
};

pub use crate::config::AppConfig;

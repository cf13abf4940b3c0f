//! Core application logic for the prefetcher
//!
//! The background half (filtering, prioritizing and draining the queue)
//! and the foreground half (building the request and waiting for completion)
//! talk only through [`messaging`].
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use prefetcher::app::{HttpFetcher, MemoryStore, PrefetchService, Prefetcher, ServiceScope};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let scope = ServiceScope::new();
//! let service = PrefetchService::new("https://example.com", Arc::new(HttpFetcher::new()?))?
//!     .spawn(&scope);
//!
//! let store = MemoryStore::with_item(
//!     "manifest",
//!     r#"{"manifest":{"urlVersions":{"/app.js":"?v=1"},"urlMappings":{}}}"#,
//! );
//! let prefetcher = Prefetcher::new(Arc::new(scope.client()), Arc::new(store));
//! let mut handle = prefetcher.init(r#"{"delay":250}"#, "manifest", None);
//! handle.next_completion().await;
//!
//! prefetcher.remove_event_listener();
//! service.shutdown();
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod filter;
pub mod foreground;
pub mod manifest;
pub mod messaging;
pub mod models;
pub mod priority;
pub mod queue;
pub mod service;

// Re-export main public API
pub use client::{ClientConfig, FetchOutcome, HttpFetcher, ResourceFetcher, ResponseCache};
pub use filter::{should_include, FilterConfig, PatternSet};
pub use foreground::{IdlePolicy, PrefetchHandle, Prefetcher};
pub use manifest::{DirectoryStore, Manifest, ManifestStore, MemoryStore};
pub use messaging::{Channel, Envelope, PrefetchRequest, ServiceScope};
pub use models::ResolvedUrl;
pub use priority::prioritize;
pub use queue::{plan_run, DrainReport, QueueEvent, QueueProcessor, QueueStats};
pub use service::{PrefetchService, ServiceHandle};

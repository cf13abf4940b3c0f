//! Prefetch queue: planning and throttled sequential dispatch
//!
//! A prefetch run is planned by [`plan_run`] (resolve the manifest, drop
//! filtered URLs, order by priority) and then drained by the
//! [`QueueProcessor`] one fetch at a time.
//!
//! # Basic Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use prefetcher::app::client::HttpFetcher;
//! use prefetcher::app::filter::FilterConfig;
//! use prefetcher::app::queue::QueueProcessor;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let processor = QueueProcessor::new(Arc::new(HttpFetcher::new()?));
//! let mut events = processor.subscribe();
//!
//! let document: serde_json::Value = serde_json::from_str(
//!     r#"{"manifest":{"urlVersions":{"/app.js":"?v=1"},"urlMappings":{}}}"#,
//! )?;
//! let filters = FilterConfig::resolve(r#"{"delay": 250}"#);
//! processor.start_run(&document, "https://example.com", &filters).await;
//!
//! let report = prefetcher::app::queue::wait_for_drain_event(&mut events).await;
//! println!("{:?}", report);
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod state;
pub mod types;

#[cfg(test)]
mod tests;

pub use self::core::{wait_for_drain_event, QueueProcessor};
pub use types::{
    DispatchRecord, DispatchResult, DrainReport, ProcessorState, QueueEvent, QueueStats,
};

use serde_json::Value;

use crate::app::filter::{filter_urls, FilterConfig};
use crate::app::manifest::resolve_urls;
use crate::app::models::ResolvedUrl;
use crate::app::priority::prioritize;

/// Resolve, filter and prioritize a manifest into dispatch order
///
/// Pure planning step shared by [`QueueProcessor::start_run`] and dry runs.
pub fn plan_run(document: &Value, origin: &str, filters: &FilterConfig) -> Vec<ResolvedUrl> {
    let urls = resolve_urls(document, origin);
    let urls = filter_urls(urls, &filters.include_set(), &filters.exclude_set());
    prioritize(urls, &filters.priority_set())
}

//! Prefetcher Library
//!
//! Resolves a manifest of versioned resource paths into URLs, filters and
//! prioritizes them, and fetches them one at a time at a throttled rate.
//! A foreground context sends the request and a background context runs
//! the queue; the two only exchange JSON messages.

pub mod app;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod prelude;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};

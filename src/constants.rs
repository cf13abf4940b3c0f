//! Application constants for the prefetcher
//!
//! Constants are grouped by the component that owns them.

use std::time::Duration;

/// Message protocol between the foreground and background contexts
pub mod protocol {
    /// Discriminator field carried by every envelope
    pub const ACTION_FIELD: &str = "action";

    /// Foreground asks the background to start a prefetch run
    pub const PREFETCH_RESOURCES: &str = "prefetchResources";

    /// Background tells every client that a run has drained
    pub const PREFETCH_COMPLETE: &str = "prefetchComplete";

    /// Buffered envelopes per client before slow listeners start lagging
    pub const CLIENT_BUFFER: usize = 64;
}

/// Foreground scheduling defaults
pub mod idle {
    use super::Duration;

    /// Upper bound on waiting for the host to report idleness
    pub const IDLE_TIMEOUT: Duration = Duration::from_millis(2000);

    /// Delay used when the host provides no idle signal at all
    pub const FALLBACK_DELAY: Duration = Duration::from_millis(500);
}

/// Queue processor defaults
pub mod queue {
    /// Delay between dispatches when the request does not carry one
    pub const DEFAULT_DELAY_MS: u64 = 0;

    /// Buffered queue events before slow subscribers start lagging
    pub const EVENT_BUFFER: usize = 256;
}

/// HTTP client configuration constants
pub mod http {
    use super::Duration;

    /// Default user agent for all HTTP requests
    pub const USER_AGENT: &str = concat!("prefetcher/", env!("CARGO_PKG_VERSION"));

    /// Default HTTP request timeout
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Connection pool idle timeout
    pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

    /// Maximum idle connections per host in pool
    pub const POOL_MAX_PER_HOST: usize = 4;

    /// Hard ceiling on outgoing requests per second
    pub const DEFAULT_MAX_RPS: u32 = 15;
}

/// Response cache layout
pub mod cache {
    /// Suffix for in-flight cache writes
    pub const TEMP_FILE_SUFFIX: &str = ".tmp";

    /// Leaf file holding the body of a path without a trailing slash
    ///
    /// Starts with `#`, which never appears in a URL path segment, so a
    /// body file can never take the place of a directory.
    pub const BODY_FILE_NAME: &str = "#body";

    /// Leaf file holding the body of a path that ends in a slash
    pub const INDEX_FILE_NAME: &str = "#index";

    /// Separates the leaf file name from the folded query string
    pub const QUERY_SEPARATOR: char = '@';

    /// Application directory name under the user cache/config dirs
    pub const APP_DIR_NAME: &str = "prefetcher";
}

/// Runtime configuration file locations
pub mod config {
    /// Project-local configuration file
    pub const LOCAL_CONFIG_FILE: &str = "prefetcher.toml";

    /// Configuration file name inside the user config directory
    pub const USER_CONFIG_FILE: &str = "config.toml";
}

// Re-exports for convenience
pub use http::USER_AGENT;
pub use protocol::{PREFETCH_COMPLETE, PREFETCH_RESOURCES};

//! Error types for the prefetcher
//!
//! Each component owns a small error enum. Most of these failures are
//! absorbed where they occur (a bad filter string becomes an empty filter, a
//! failed fetch is logged and skipped), so the enums mostly show up in logs
//! and in the handful of operations that can fail outright, such as loading
//! the runtime configuration or building the HTTP client.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while fetching a single resource
#[derive(Error, Debug)]
pub enum FetchError {
    /// Transport-level failure (DNS, connect, TLS, body read)
    #[error("HTTP request failed for {url}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Server answered with a non-success status
    #[error("Server returned HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    /// The resolved URL could not be parsed
    #[error("Invalid URL: {url} - {error}")]
    InvalidUrl { url: String, error: String },

    /// Writing the response body into the cache failed
    #[error("Failed to store {url} in cache at {path}")]
    CacheWrite {
        url: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// HTTP client could not be constructed
    #[error("Failed to build HTTP client")]
    ClientBuild(#[source] reqwest::Error),

    /// Rate limit ceiling configured as zero
    #[error("Rate limit must be greater than zero")]
    ZeroRateLimit,
}

/// Manifest reading and parsing errors
#[derive(Error, Debug)]
pub enum ManifestError {
    /// No value stored under the given key
    #[error("No manifest stored under key '{key}'")]
    Missing { key: String },

    /// Stored value is not valid JSON
    #[error("Manifest is not valid JSON")]
    JsonParse(#[from] serde_json::Error),

    /// Storage backend could not be read
    #[error("Failed to read manifest store at {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The storage key cannot be mapped to a file name
    #[error("Invalid storage key: '{key}'")]
    InvalidKey { key: String },
}

/// Runtime configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file explicitly requested but absent
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Configuration file could not be read
    #[error("Failed to read configuration file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid TOML
    #[error("Invalid configuration format")]
    InvalidFormat(#[from] toml::de::Error),

    /// A value parsed but is not acceptable
    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    /// The filter configuration string is not a JSON object
    #[error("Filter configuration is not a JSON object: {reason}")]
    InvalidFilters { reason: String },
}

/// Cross-context messaging errors
#[derive(Error, Debug)]
pub enum ChannelError {
    /// The receiving context has gone away
    #[error("Message channel closed")]
    Closed,

    /// The envelope could not be encoded
    #[error("Failed to encode message envelope")]
    Encode(#[from] serde_json::Error),

    /// The background context was dropped before it ever activated
    #[error("Background context is no longer available")]
    NoController,
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Whether a later attempt could plausibly succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            AppError::Fetch(FetchError::Http { .. })
            | AppError::Fetch(FetchError::Status { .. })
            | AppError::Fetch(FetchError::CacheWrite { .. })
            | AppError::Manifest(ManifestError::Missing { .. }) => true,

            AppError::Config(_)
            | AppError::Fetch(FetchError::InvalidUrl { .. })
            | AppError::Fetch(FetchError::ZeroRateLimit)
            | AppError::Channel(ChannelError::Closed) => false,

            _ => false,
        }
    }

    /// Error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Fetch(_) => "fetch",
            AppError::Manifest(_) => "manifest",
            AppError::Config(_) => "config",
            AppError::Channel(_) => "channel",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Fetch result type alias
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Manifest result type alias
pub type ManifestResult<T> = std::result::Result<T, ManifestError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Channel result type alias
pub type ChannelResult<T> = std::result::Result<T, ChannelError>;

//! HTTP client configuration and building logic

use std::path::PathBuf;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::constants::http;
use crate::errors::{FetchError, FetchResult};

/// Configuration for the prefetch HTTP client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// User agent sent with every request
    pub user_agent: String,
    /// Whole-request timeout
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Connect timeout
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Connection pool idle timeout
    #[serde(with = "humantime_serde")]
    pub pool_idle_timeout: Option<Duration>,
    /// Maximum idle connections kept per host
    pub pool_max_per_host: usize,
    /// Hard ceiling on requests per second, independent of the run delay
    pub max_requests_per_second: u32,
    /// Where fetched bodies are stored; `None` only warms the connection/HTTP path
    pub cache_dir: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            user_agent: http::USER_AGENT.to_string(),
            request_timeout: http::DEFAULT_TIMEOUT,
            connect_timeout: http::CONNECT_TIMEOUT,
            pool_idle_timeout: Some(http::POOL_IDLE_TIMEOUT),
            pool_max_per_host: http::POOL_MAX_PER_HOST,
            max_requests_per_second: http::DEFAULT_MAX_RPS,
            cache_dir: None,
        }
    }
}

impl ClientConfig {
    /// Builds the HTTP client with the specified configuration
    pub fn build_http_client(&self) -> FetchResult<Client> {
        let mut client_builder = Client::builder()
            .timeout(self.request_timeout)
            .connect_timeout(self.connect_timeout)
            .user_agent(self.user_agent.as_str())
            .pool_max_idle_per_host(self.pool_max_per_host);

        if let Some(idle_timeout) = self.pool_idle_timeout {
            client_builder = client_builder.pool_idle_timeout(idle_timeout);
        }

        client_builder.build().map_err(FetchError::ClientBuild)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_requests_per_second == 0 {
            return Err("max_requests_per_second cannot be zero".to_string());
        }

        if self.request_timeout.is_zero() {
            return Err("request_timeout cannot be zero".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_default() {
        let config = ClientConfig::default();
        assert!(config.user_agent.starts_with("prefetcher/"));
        assert_eq!(config.max_requests_per_second, http::DEFAULT_MAX_RPS);
        assert!(config.cache_dir.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_client_config_validation() {
        let config = ClientConfig {
            max_requests_per_second: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ClientConfig {
            request_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_http_client_creation() {
        let config = ClientConfig {
            request_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
            ..Default::default()
        };
        assert!(config.build_http_client().is_ok());
    }
}

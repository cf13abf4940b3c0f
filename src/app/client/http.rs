//! Core HTTP operations with a request-rate ceiling
//!
//! Pacing between prefetches is the queue's job. The limiter here is a
//! safety ceiling so that a zero delay can never flood an origin.

use std::num::NonZeroU32;

use governor::{clock::DefaultClock, state::InMemoryState, state::NotKeyed, Quota, RateLimiter};
use reqwest::Client;
use url::Url;

use crate::errors::{FetchError, FetchResult};

/// HTTP operations handler
#[derive(Debug)]
pub struct HttpHandler {
    client: Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl HttpHandler {
    /// Creates a new HttpHandler with the given client and rate ceiling
    ///
    /// # Errors
    ///
    /// Returns `FetchError::ZeroRateLimit` if `max_rps` is zero
    pub fn new(client: Client, max_rps: u32) -> FetchResult<Self> {
        let rate_limiter = Self::build_rate_limiter(max_rps)?;
        Ok(Self {
            client,
            rate_limiter,
        })
    }

    fn build_rate_limiter(
        max_rps: u32,
    ) -> FetchResult<RateLimiter<NotKeyed, InMemoryState, DefaultClock>> {
        let quota = Quota::per_second(NonZeroU32::new(max_rps).ok_or(FetchError::ZeroRateLimit)?);
        Ok(RateLimiter::direct(quota))
    }

    /// Issue a single GET and require a success status
    ///
    /// No retries: a failed prefetch is simply skipped.
    pub async fn get(&self, url: &Url) -> FetchResult<reqwest::Response> {
        self.rate_limiter.until_ready().await;

        let response = self
            .client
            .get(url.as_str())
            .send()
            .await
            .map_err(|source| FetchError::Http {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        tracing::debug!("Fetched {} ({})", url, status);
        Ok(response)
    }

    /// Get a reference to the underlying HTTP client
    pub fn client(&self) -> &Client {
        &self.client
    }
}

//! Deferring work until the host is idle

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tracing::debug;

use crate::constants::idle;

/// How long the foreground waits before sending its prefetch request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdlePolicy {
    /// Longest wait for the host's idle signal
    #[serde(with = "humantime_serde")]
    pub idle_timeout: Duration,
    /// Fixed wait when the host has no idle signal
    #[serde(with = "humantime_serde")]
    pub fallback_delay: Duration,
}

impl Default for IdlePolicy {
    fn default() -> Self {
        Self {
            idle_timeout: idle::IDLE_TIMEOUT,
            fallback_delay: idle::FALLBACK_DELAY,
        }
    }
}

impl IdlePolicy {
    /// Send as soon as possible; for tests and batch use
    pub fn immediate() -> Self {
        Self {
            idle_timeout: Duration::ZERO,
            fallback_delay: Duration::ZERO,
        }
    }
}

/// Wait until the host is idle
///
/// With an idle signal this returns when the signal fires or after
/// `idle_timeout`, whichever comes first. Without one it waits
/// `fallback_delay`.
pub async fn wait_for_idle(policy: &IdlePolicy, signal: Option<&Notify>) {
    match signal {
        Some(signal) => {
            tokio::select! {
                _ = signal.notified() => debug!("Host reported idle"),
                _ = tokio::time::sleep(policy.idle_timeout) => {
                    debug!("Idle wait timed out after {:?}", policy.idle_timeout)
                }
            }
        }
        None => tokio::time::sleep(policy.fallback_delay).await,
    }
}

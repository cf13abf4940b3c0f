//! Core data structures for the prefetch queue
//!
//! Events, per-run reports and statistics snapshots.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::app::client::FetchOutcome;
use crate::app::models::ResolvedUrl;

/// Lifecycle state of the queue processor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProcessorState {
    /// No drain loop is running
    Idle,
    /// A drain loop is dispatching from the queue
    Draining,
}

/// Result of one dispatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchResult {
    /// The fetch completed with a success status
    Fetched(FetchOutcome),
    /// The fetch failed; the message is already logged
    Failed { error: String },
}

impl DispatchResult {
    pub fn is_success(&self) -> bool {
        matches!(self, DispatchResult::Fetched(_))
    }
}

/// A single settled dispatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchRecord {
    /// Drain loop that dispatched it
    pub run_id: u64,
    /// The URL fetched
    pub url: ResolvedUrl,
    /// What happened
    pub result: DispatchResult,
    /// URLs still waiting after this dispatch
    pub remaining: usize,
}

/// Summary emitted exactly once when a drain loop empties the queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrainReport {
    /// Sequential id of the drain loop, starting at 1
    pub run_id: u64,
    /// URLs dispatched by this loop
    pub dispatched: u64,
    /// Dispatches that fetched successfully
    pub succeeded: u64,
    /// Dispatches that failed
    pub failed: u64,
    /// When the loop started
    pub started_at: DateTime<Utc>,
    /// When the queue was found empty
    pub finished_at: DateTime<Utc>,
}

impl DrainReport {
    /// Wall-clock duration of the loop
    pub fn duration(&self) -> Duration {
        self.finished_at
            .signed_duration_since(self.started_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Success rate as percentage; 100 for an empty run
    pub fn success_rate(&self) -> f64 {
        if self.dispatched == 0 {
            100.0
        } else {
            (self.succeeded as f64 / self.dispatched as f64) * 100.0
        }
    }
}

/// Events broadcast by the queue processor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueEvent {
    /// A fetch settled, successfully or not
    Dispatched(DispatchRecord),
    /// The queue drained and the loop exited
    Drained(DrainReport),
}

/// Statistics snapshot across the processor's lifetime
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// URLs waiting to be dispatched
    pub pending_count: u64,
    /// Whether a drain loop is active
    pub is_processing: bool,
    /// URLs ever enqueued
    pub total_enqueued: u64,
    /// URLs ever dispatched
    pub total_dispatched: u64,
    /// Dispatches that fetched successfully
    pub total_succeeded: u64,
    /// Dispatches that failed
    pub total_failed: u64,
    /// Drain loops that ran to empty
    pub runs_completed: u64,
}

impl QueueStats {
    /// Success rate as percentage; 100 before anything was dispatched
    pub fn success_rate(&self) -> f64 {
        if self.total_dispatched == 0 {
            100.0
        } else {
            (self.total_succeeded as f64 / self.total_dispatched as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_report_rates() {
        let now = Utc::now();
        let report = DrainReport {
            run_id: 1,
            dispatched: 4,
            succeeded: 3,
            failed: 1,
            started_at: now,
            finished_at: now + chrono::Duration::milliseconds(250),
        };
        assert_eq!(report.success_rate(), 75.0);
        assert_eq!(report.duration(), Duration::from_millis(250));

        let empty = DrainReport {
            dispatched: 0,
            succeeded: 0,
            failed: 0,
            ..report
        };
        assert_eq!(empty.success_rate(), 100.0);
    }

    #[test]
    fn test_stats_success_rate_matches_report() {
        let idle = QueueStats::default();
        assert_eq!(idle.success_rate(), 100.0);

        let stats = QueueStats {
            total_dispatched: 4,
            total_succeeded: 1,
            total_failed: 3,
            ..Default::default()
        };
        assert_eq!(stats.success_rate(), 25.0);
    }

    #[test]
    fn test_dispatch_result() {
        let ok = DispatchResult::Fetched(FetchOutcome {
            status: 200,
            bytes: 10,
            elapsed: Duration::from_millis(5),
        });
        assert!(ok.is_success());
        assert!(!DispatchResult::Failed {
            error: "boom".into()
        }
        .is_success());
    }
}

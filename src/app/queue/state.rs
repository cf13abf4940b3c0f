//! Internal state of the queue processor
//!
//! Everything here is mutated under the processor's mutex. Checking for
//! an empty queue and clearing the processing flag happen in one critical
//! section, which is what makes "one loop, one completion" hold.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::types::{DispatchResult, DrainReport, QueueStats};
use crate::app::models::ResolvedUrl;

/// Counters for the drain loop currently running
#[derive(Debug)]
struct RunCounters {
    run_id: u64,
    dispatched: u64,
    succeeded: u64,
    failed: u64,
    started_at: DateTime<Utc>,
}

/// Internal state of the queue processor
#[derive(Debug)]
pub struct QueueState {
    /// URLs waiting for dispatch, in dispatch order
    pending: VecDeque<ResolvedUrl>,
    /// Single-flight guard
    processing: bool,
    /// Pause before each dispatch
    delay: Duration,
    /// Counters for the active loop
    current_run: Option<RunCounters>,
    /// Lifetime statistics
    stats: QueueStats,
    next_run_id: u64,
}

impl QueueState {
    pub fn new(delay: Duration) -> Self {
        Self {
            pending: VecDeque::new(),
            processing: false,
            delay,
            current_run: None,
            stats: QueueStats::default(),
            next_run_id: 1,
        }
    }

    pub fn push(&mut self, url: ResolvedUrl) {
        self.pending.push_back(url);
        self.stats.total_enqueued += 1;
    }

    pub fn pop(&mut self) -> Option<ResolvedUrl> {
        self.pending.pop_front()
    }

    /// Take the single-flight guard; returns false if a loop already holds it
    pub fn try_begin_run(&mut self) -> bool {
        if self.processing {
            return false;
        }
        self.processing = true;
        self.current_run = Some(RunCounters {
            run_id: self.next_run_id,
            dispatched: 0,
            succeeded: 0,
            failed: 0,
            started_at: Utc::now(),
        });
        self.next_run_id += 1;
        true
    }

    /// Release the guard and produce the run's report
    pub fn finish_run(&mut self) -> DrainReport {
        self.processing = false;
        self.stats.runs_completed += 1;

        let run = self.current_run.take().unwrap_or_else(|| RunCounters {
            run_id: self.next_run_id - 1,
            dispatched: 0,
            succeeded: 0,
            failed: 0,
            started_at: Utc::now(),
        });

        DrainReport {
            run_id: run.run_id,
            dispatched: run.dispatched,
            succeeded: run.succeeded,
            failed: run.failed,
            started_at: run.started_at,
            finished_at: Utc::now(),
        }
    }

    /// Record a settled dispatch
    pub fn record(&mut self, result: &DispatchResult) {
        let success = result.is_success();

        self.stats.total_dispatched += 1;
        if success {
            self.stats.total_succeeded += 1;
        } else {
            self.stats.total_failed += 1;
        }

        if let Some(run) = self.current_run.as_mut() {
            run.dispatched += 1;
            if success {
                run.succeeded += 1;
            } else {
                run.failed += 1;
            }
        }
    }

    pub fn current_run_id(&self) -> u64 {
        self.current_run
            .as_ref()
            .map(|run| run.run_id)
            .unwrap_or(0)
    }

    pub fn is_processing(&self) -> bool {
        self.processing
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn set_delay(&mut self, delay: Duration) {
        self.delay = delay;
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn pending(&self) -> impl Iterator<Item = &ResolvedUrl> {
        self.pending.iter()
    }

    /// Drop all waiting URLs, returning how many were removed
    pub fn clear_pending(&mut self) -> usize {
        let removed = self.pending.len();
        self.pending.clear();
        removed
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            pending_count: self.pending.len() as u64,
            is_processing: self.processing,
            ..self.stats.clone()
        }
    }
}

//! Core queue processor implementation
//!
//! The processor owns a FIFO of resolved URLs and at most one drain loop.
//! The loop takes the front URL, waits the configured delay, fetches it,
//! and repeats until the queue is empty. It then releases the single-flight
//! guard and broadcasts a [`QueueEvent::Drained`] report.

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, Stream};
use serde_json::Value;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, error, info};

use super::plan_run;
use super::state::QueueState;
use super::types::{DispatchRecord, DispatchResult, DrainReport, ProcessorState, QueueEvent, QueueStats};
use crate::app::client::ResourceFetcher;
use crate::app::filter::FilterConfig;
use crate::app::models::ResolvedUrl;
use crate::constants::queue;

struct Inner {
    state: Mutex<QueueState>,
    fetcher: Arc<dyn ResourceFetcher>,
    events: broadcast::Sender<QueueEvent>,
}

/// Rate-limited, single-flight prefetch queue
///
/// Cloning is cheap and every clone drives the same queue.
#[derive(Clone)]
pub struct QueueProcessor {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for QueueProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueProcessor").finish_non_exhaustive()
    }
}

impl QueueProcessor {
    /// Create an idle processor with no delay
    pub fn new(fetcher: Arc<dyn ResourceFetcher>) -> Self {
        Self::with_delay(fetcher, Duration::from_millis(queue::DEFAULT_DELAY_MS))
    }

    /// Create an idle processor with a delay before each dispatch
    pub fn with_delay(fetcher: Arc<dyn ResourceFetcher>, delay: Duration) -> Self {
        let (events, _) = broadcast::channel(queue::EVENT_BUFFER);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(QueueState::new(delay)),
                fetcher,
                events,
            }),
        }
    }

    /// Subscribe to dispatch and drain events
    ///
    /// Subscribe before enqueuing to be sure to see the run's events.
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.inner.events.subscribe()
    }

    /// Dispatch and drain events as a stream
    ///
    /// Subscribes immediately. Events missed by a lagging consumer are
    /// skipped.
    pub fn event_stream(&self) -> impl Stream<Item = QueueEvent> + Send + 'static {
        stream::unfold(self.subscribe(), |mut events| async move {
            loop {
                match events.recv().await {
                    Ok(event) => return Some((event, events)),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("Event stream lagged, skipped {} events", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        })
    }

    /// Append a URL; starts a drain loop if none is running
    pub async fn enqueue(&self, url: ResolvedUrl) {
        self.enqueue_all(std::iter::once(url)).await;
    }

    /// Append URLs in order; starts a drain loop if none is running
    ///
    /// While a loop is running this only extends its queue, so dispatch
    /// order stays strictly FIFO across calls.
    pub async fn enqueue_all<I>(&self, urls: I) -> usize
    where
        I: IntoIterator<Item = ResolvedUrl>,
    {
        let mut state = self.inner.state.lock().await;
        let mut added = 0;
        for url in urls {
            debug!("Queued {}", url);
            state.push(url);
            added += 1;
        }
        if added > 0 {
            self.ensure_draining(&mut state);
        }
        added
    }

    /// Start a prefetch run from a manifest document
    ///
    /// Resolves the manifest against `origin`, filters and prioritizes the
    /// URLs, sets the dispatch delay from `filters`, and enqueues the result.
    /// A run with nothing to fetch still drains, so its completion event is
    /// emitted like any other. Returns the number of URLs enqueued.
    pub async fn start_run(&self, document: &Value, origin: &str, filters: &FilterConfig) -> usize {
        let urls = plan_run(document, origin, filters);

        let mut state = self.inner.state.lock().await;
        state.set_delay(filters.delay());

        let count = urls.len();
        for url in urls {
            state.push(url);
        }
        info!(
            "Starting prefetch run: {} URLs queued, {}ms delay",
            count, filters.delay_ms
        );

        // An empty run still needs a loop to report completion
        self.ensure_draining(&mut state);
        count
    }

    /// Wait for the next drained report
    pub async fn wait_for_drain(&self) -> Option<DrainReport> {
        let mut events = self.subscribe();
        wait_for_drain_event(&mut events).await
    }

    /// Change the delay used by subsequent dispatches
    pub async fn set_delay(&self, delay: Duration) {
        self.inner.state.lock().await.set_delay(delay);
    }

    pub async fn delay(&self) -> Duration {
        self.inner.state.lock().await.delay()
    }

    /// Drop every URL still waiting; an in-flight dispatch is not affected
    pub async fn reset(&self) -> usize {
        let removed = self.inner.state.lock().await.clear_pending();
        if removed > 0 {
            info!("Reset prefetch queue, dropped {} pending URLs", removed);
        }
        removed
    }

    pub async fn state(&self) -> ProcessorState {
        if self.inner.state.lock().await.is_processing() {
            ProcessorState::Draining
        } else {
            ProcessorState::Idle
        }
    }

    pub async fn is_processing(&self) -> bool {
        self.inner.state.lock().await.is_processing()
    }

    /// URLs still waiting, in dispatch order
    pub async fn pending(&self) -> Vec<ResolvedUrl> {
        self.inner.state.lock().await.pending().cloned().collect()
    }

    pub async fn stats(&self) -> QueueStats {
        self.inner.state.lock().await.stats()
    }

    /// Spawn a drain loop unless one is already running
    fn ensure_draining(&self, state: &mut QueueState) {
        if state.try_begin_run() {
            debug!("Starting drain loop {}", state.current_run_id());
            tokio::spawn(drain(Arc::clone(&self.inner)));
        }
    }
}

/// Wait on an event receiver until a drain report arrives
pub async fn wait_for_drain_event(
    events: &mut broadcast::Receiver<QueueEvent>,
) -> Option<DrainReport> {
    loop {
        match events.recv().await {
            Ok(QueueEvent::Drained(report)) => return Some(report),
            Ok(QueueEvent::Dispatched(_)) => continue,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!("Drain waiter lagged, skipped {} events", skipped);
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

async fn drain(inner: Arc<Inner>) {
    loop {
        let (url, delay, run_id) = {
            let mut state = inner.state.lock().await;
            match state.pop() {
                Some(url) => (url, state.delay(), state.current_run_id()),
                None => {
                    let report = state.finish_run();
                    info!(
                        "Prefetch complete: {} dispatched, {} succeeded, {} failed in {:?}",
                        report.dispatched,
                        report.succeeded,
                        report.failed,
                        report.duration()
                    );
                    // Sent while the guard is released under the same lock
                    let _ = inner.events.send(QueueEvent::Drained(report));
                    return;
                }
            }
        };

        if delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(delay).await;
        }

        debug!("Dispatching {}", url);
        let result = match inner.fetcher.fetch(&url).await {
            Ok(outcome) => {
                debug!("Prefetched: {} ({} bytes)", url, outcome.bytes);
                DispatchResult::Fetched(outcome)
            }
            Err(e) => {
                error!("Failed to fetch {}: {}", url, e);
                DispatchResult::Failed {
                    error: e.to_string(),
                }
            }
        };

        let remaining = {
            let mut state = inner.state.lock().await;
            state.record(&result);
            state.pending_len()
        };

        let _ = inner.events.send(QueueEvent::Dispatched(DispatchRecord {
            run_id,
            url,
            result,
            remaining,
        }));
    }
}

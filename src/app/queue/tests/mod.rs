//! Unit tests for the queue processor
//!
//! Pacing tests run on a paused clock so the delays are exact and instant.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::time::Instant;

use super::*;
use crate::app::client::{FetchOutcome, ResourceFetcher};
use crate::errors::{FetchError, FetchResult};

/// Fetcher that records every call and fails URLs containing "fail"
#[derive(Default)]
struct RecordingFetcher {
    calls: Mutex<Vec<(ResolvedUrl, Instant)>>,
    latency: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RecordingFetcher {
    fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Default::default()
        }
    }

    fn urls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(url, _)| url.to_string())
            .collect()
    }

    fn times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(_, t)| *t).collect()
    }
}

#[async_trait]
impl ResourceFetcher for RecordingFetcher {
    async fn fetch(&self, url: &ResolvedUrl) -> FetchResult<FetchOutcome> {
        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);
        self.calls.lock().unwrap().push((url.clone(), Instant::now()));

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if url.as_str().contains("fail") {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: 500,
            });
        }
        Ok(FetchOutcome {
            status: 200,
            bytes: url.as_str().len() as u64,
            elapsed: self.latency,
        })
    }
}

fn processor(fetcher: &Arc<RecordingFetcher>, delay: Duration) -> QueueProcessor {
    QueueProcessor::with_delay(fetcher.clone(), delay)
}

fn url(path: &str) -> ResolvedUrl {
    ResolvedUrl::new("https://example.com", path, None)
}

/// Collect every event until (and including) the first drain report
async fn collect_run(events: &mut tokio::sync::broadcast::Receiver<QueueEvent>) -> Vec<QueueEvent> {
    let mut seen = Vec::new();
    loop {
        let event = events.recv().await.unwrap();
        let done = matches!(event, QueueEvent::Drained(_));
        seen.push(event);
        if done {
            return seen;
        }
    }
}

#[test]
fn test_plan_run_resolves_filters_and_prioritizes() {
    let document = json!({
        "manifest": { "urlVersions": { "/a": "", "/b": "", "/c": "" }, "urlMappings": {} }
    });
    let filters = FilterConfig::from_parts(
        Some(vec!["a".into(), "c".into()]),
        Some(vec!["b".into()]),
        Some(vec!["c".into(), "a".into()]),
        Some(0),
    );

    let planned: Vec<String> = plan_run(&document, "https://example.com", &filters)
        .into_iter()
        .map(ResolvedUrl::into_string)
        .collect();
    assert_eq!(
        planned,
        vec!["https://example.com/c", "https://example.com/a"]
    );
}

#[test]
fn test_plan_run_without_order_keeps_manifest_order() {
    let document = json!({
        "manifest": {
            "urlVersions": { "/z.js": "?1", "/a.js": "?2" },
            "urlMappings": { "/m.png": null }
        }
    });

    let planned: Vec<String> = plan_run(&document, "https://example.com", &FilterConfig::default())
        .into_iter()
        .map(ResolvedUrl::into_string)
        .collect();
    assert_eq!(
        planned,
        vec![
            "https://example.com/z.js?1",
            "https://example.com/a.js?2",
            "https://example.com/m.png",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_drain_emits_exactly_one_completion_after_last_dispatch() {
    let fetcher = Arc::new(RecordingFetcher::with_latency(Duration::from_millis(20)));
    let queue = processor(&fetcher, Duration::from_millis(100));
    let mut events = queue.subscribe();

    queue
        .enqueue_all(vec![url("/1"), url("/2"), url("/3")])
        .await;
    let seen = collect_run(&mut events).await;

    assert_eq!(seen.len(), 4);
    assert!(seen[..3]
        .iter()
        .all(|event| matches!(event, QueueEvent::Dispatched(_))));
    let QueueEvent::Drained(report) = &seen[3] else {
        panic!("last event should be the drain report");
    };
    assert_eq!(report.dispatched, 3);
    assert_eq!(report.succeeded, 3);

    // Nothing else arrives once the loop has exited
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(matches!(
        events.try_recv(),
        Err(tokio::sync::broadcast::error::TryRecvError::Empty)
    ));

    let stats = queue.stats().await;
    assert_eq!(stats.runs_completed, 1);
    assert!(!stats.is_processing);
    assert_eq!(queue.state().await, ProcessorState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_delay_applies_before_every_dispatch() {
    let fetcher = Arc::new(RecordingFetcher::default());
    let queue = processor(&fetcher, Duration::from_millis(250));
    let mut events = queue.subscribe();

    let start = Instant::now();
    queue.enqueue_all(vec![url("/a"), url("/b"), url("/c")]).await;
    collect_run(&mut events).await;

    let times = fetcher.times();
    assert_eq!(times.len(), 3);
    // First dispatch is throttled too
    assert!(times[0] - start >= Duration::from_millis(250));
    assert!(times[1] - times[0] >= Duration::from_millis(250));
    assert!(times[2] - times[1] >= Duration::from_millis(250));
}

#[tokio::test]
async fn test_zero_delay_still_dispatches_asynchronously() {
    let fetcher = Arc::new(RecordingFetcher::default());
    let queue = processor(&fetcher, Duration::ZERO);
    let mut events = queue.subscribe();

    queue.enqueue(url("/a")).await;
    // Enqueue returns before anything has been fetched
    assert!(fetcher.urls().is_empty());

    collect_run(&mut events).await;
    assert_eq!(fetcher.urls(), vec!["https://example.com/a"]);
}

#[tokio::test(start_paused = true)]
async fn test_enqueue_while_draining_extends_the_same_loop() {
    let fetcher = Arc::new(RecordingFetcher::with_latency(Duration::from_millis(10)));
    let queue = processor(&fetcher, Duration::from_millis(50));
    let mut events = queue.subscribe();

    queue.enqueue_all(vec![url("/1"), url("/2")]).await;

    // Wait for the first dispatch to settle, then add more
    let first = events.recv().await.unwrap();
    assert!(matches!(first, QueueEvent::Dispatched(_)));
    assert!(queue.is_processing().await);
    queue.enqueue_all(vec![url("/3"), url("/4")]).await;

    let rest = collect_run(&mut events).await;
    let drains: Vec<&DrainReport> = rest
        .iter()
        .filter_map(|event| match event {
            QueueEvent::Drained(report) => Some(report),
            _ => None,
        })
        .collect();
    assert_eq!(drains.len(), 1);
    assert_eq!(drains[0].dispatched, 4);
    assert_eq!(drains[0].run_id, 1);

    assert_eq!(
        fetcher.urls(),
        vec![
            "https://example.com/1",
            "https://example.com/2",
            "https://example.com/3",
            "https://example.com/4",
        ]
    );
    assert_eq!(fetcher.max_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(queue.stats().await.runs_completed, 1);
}

#[tokio::test(start_paused = true)]
async fn test_failures_are_logged_and_do_not_stop_the_loop() {
    let fetcher = Arc::new(RecordingFetcher::default());
    let queue = processor(&fetcher, Duration::from_millis(10));
    let mut events = queue.subscribe();

    queue
        .enqueue_all(vec![url("/ok-1"), url("/fail"), url("/ok-2")])
        .await;
    let seen = collect_run(&mut events).await;

    let failed: Vec<&DispatchRecord> = seen
        .iter()
        .filter_map(|event| match event {
            QueueEvent::Dispatched(record) if !record.result.is_success() => Some(record),
            _ => None,
        })
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].url.as_str(), "https://example.com/fail");

    let QueueEvent::Drained(report) = seen.last().unwrap() else {
        panic!("expected drain report");
    };
    assert_eq!(report.dispatched, 3);
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, 1);
    assert_eq!(fetcher.urls().len(), 3);
}

#[tokio::test]
async fn test_empty_run_still_completes() {
    let fetcher = Arc::new(RecordingFetcher::default());
    let queue = processor(&fetcher, Duration::from_millis(500));
    let mut events = queue.subscribe();

    let queued = queue
        .start_run(&json!("not a manifest"), "https://example.com", &FilterConfig::default())
        .await;
    assert_eq!(queued, 0);

    let report = wait_for_drain_event(&mut events).await.unwrap();
    assert_eq!(report.dispatched, 0);
    assert!(fetcher.urls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_start_run_sets_delay_and_dispatch_order() {
    let fetcher = Arc::new(RecordingFetcher::default());
    let queue = QueueProcessor::new(fetcher.clone());
    let mut events = queue.subscribe();

    let document = json!({
        "manifest": {
            "urlVersions": { "/vendor.js": "?v=1", "/main.js": "?v=2", "/legacy.js": "?v=3" },
            "urlMappings": { "/logo.svg": null }
        }
    });
    let filters = FilterConfig::resolve(r#"{"exclude":["legacy"],"order":["main"],"delay":40}"#);

    let queued = queue
        .start_run(&document, "https://example.com", &filters)
        .await;
    assert_eq!(queued, 3);
    assert_eq!(queue.delay().await, Duration::from_millis(40));

    collect_run(&mut events).await;
    assert_eq!(
        fetcher.urls(),
        vec![
            "https://example.com/main.js?v=2",
            "https://example.com/logo.svg",
            "https://example.com/vendor.js?v=1",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_reset_drops_pending_and_loop_completes() {
    let fetcher = Arc::new(RecordingFetcher::default());
    let queue = processor(&fetcher, Duration::from_millis(100));
    let mut events = queue.subscribe();

    queue
        .enqueue_all(vec![url("/1"), url("/2"), url("/3")])
        .await;
    // The loop has taken "/1" and is waiting out its delay
    tokio::task::yield_now().await;
    let removed = queue.reset().await;
    assert!(removed >= 1);
    assert!(queue.pending().await.is_empty());

    let seen = collect_run(&mut events).await;
    let QueueEvent::Drained(report) = seen.last().unwrap() else {
        panic!("expected drain report");
    };
    assert!(report.dispatched <= 1);
}

#[tokio::test(start_paused = true)]
async fn test_new_loop_after_idle_gets_its_own_completion() {
    let fetcher = Arc::new(RecordingFetcher::default());
    let queue = processor(&fetcher, Duration::from_millis(10));
    let mut events = queue.subscribe();

    queue.enqueue(url("/first")).await;
    let first = wait_for_drain_event(&mut events).await.unwrap();

    queue.enqueue(url("/second")).await;
    let second = wait_for_drain_event(&mut events).await.unwrap();

    assert_eq!(first.run_id, 1);
    assert_eq!(second.run_id, 2);
    assert_eq!(first.dispatched, 1);
    assert_eq!(second.dispatched, 1);
    assert_eq!(queue.stats().await.runs_completed, 2);
}

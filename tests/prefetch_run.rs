//! End-to-end prefetch runs through the in-process channel
//!
//! A foreground `Prefetcher` sends its request over a `ServiceScope` to a
//! `PrefetchService`, which drains the queue through a recording fetcher
//! and broadcasts the completion notice back.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::{timeout, Instant};
use tokio_test::assert_ok;

use prefetcher::app::client::{FetchOutcome, ResourceFetcher};
use prefetcher::app::foreground::{IdlePolicy, Prefetcher};
use prefetcher::app::manifest::MemoryStore;
use prefetcher::app::messaging::{Channel, Envelope, ServiceScope};
use prefetcher::app::models::ResolvedUrl;
use prefetcher::app::service::PrefetchService;
use prefetcher::errors::{FetchError, FetchResult};

const KEY: &str = "prefetch-manifest";

#[derive(Default)]
struct RecordingFetcher {
    calls: Mutex<Vec<(String, Instant)>>,
    latency: Duration,
}

impl RecordingFetcher {
    fn urls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }
}

#[async_trait]
impl ResourceFetcher for RecordingFetcher {
    async fn fetch(&self, url: &ResolvedUrl) -> FetchResult<FetchOutcome> {
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), Instant::now()));
        tokio::time::sleep(self.latency).await;

        if url.as_str().contains("broken") {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: 503,
            });
        }
        Ok(FetchOutcome {
            status: 200,
            bytes: 1,
            elapsed: self.latency,
        })
    }
}

struct Harness {
    scope: ServiceScope,
    fetcher: Arc<RecordingFetcher>,
    service: PrefetchService,
}

impl Harness {
    fn new(latency: Duration) -> Self {
        let fetcher = Arc::new(RecordingFetcher {
            latency,
            ..Default::default()
        });
        let service = PrefetchService::new("https://example.com", fetcher.clone()).unwrap();
        Self {
            scope: ServiceScope::new(),
            fetcher,
            service,
        }
    }

    fn prefetcher(&self, manifest: Option<&str>) -> Prefetcher {
        let store = match manifest {
            Some(raw) => MemoryStore::with_item(KEY, raw),
            None => MemoryStore::new(),
        };
        Prefetcher::new(Arc::new(self.scope.client()), Arc::new(store))
            .with_idle_policy(IdlePolicy::immediate())
    }
}

const ABC_MANIFEST: &str =
    r#"{"manifest":{"urlVersions":{"/a":"","/b":"","/c":""},"urlMappings":{}}}"#;

#[tokio::test(start_paused = true)]
async fn test_filtered_prioritized_run_completes_once() {
    let harness = Harness::new(Duration::from_millis(5));
    let service = harness.service.clone().spawn(&harness.scope);
    let prefetcher = harness.prefetcher(Some(ABC_MANIFEST));

    let (tx, mut callbacks) = mpsc::unbounded_channel();
    let mut handle = prefetcher.init(
        r#"{"include":["a","c"],"exclude":["b"],"order":["c","a"],"delay":100}"#,
        KEY,
        Some(Arc::new(move || {
            let _ = tx.send(());
        })),
    );
    assert_ok!(handle.sent().await);

    assert!(handle.next_completion().await);
    assert!(callbacks.recv().await.is_some());
    assert_eq!(
        harness.fetcher.urls(),
        vec!["https://example.com/c", "https://example.com/a"]
    );

    // No further completion for the same run
    assert!(timeout(Duration::from_secs(10), handle.next_completion())
        .await
        .is_err());

    let stats = service.queue().stats().await;
    assert_eq!(stats.runs_completed, 1);
    assert_eq!(stats.total_dispatched, 2);
    service.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_run_delay_paces_every_dispatch() {
    let harness = Harness::new(Duration::ZERO);
    let service = harness.service.clone().spawn(&harness.scope);
    let prefetcher = harness.prefetcher(Some(ABC_MANIFEST));

    let start = Instant::now();
    let mut handle = prefetcher.init(r#"{"delay":1000}"#, KEY, None);
    assert!(handle.next_completion().await);

    let times: Vec<Instant> = harness
        .fetcher
        .calls
        .lock()
        .unwrap()
        .iter()
        .map(|(_, t)| *t)
        .collect();
    assert_eq!(times.len(), 3);
    assert!(times[0] - start >= Duration::from_secs(1));
    assert!(times[1] - times[0] >= Duration::from_secs(1));
    assert!(times[2] - times[1] >= Duration::from_secs(1));
    service.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_completion_reaches_every_client() {
    let harness = Harness::new(Duration::ZERO);
    let service = harness.service.clone().spawn(&harness.scope);

    // A second client that never sent anything still hears the notice
    let bystander = harness.scope.client();
    let (tx, mut heard) = mpsc::unbounded_channel();
    bystander.on_message(Arc::new(move |envelope| {
        let _ = tx.send(envelope);
    }));

    let prefetcher = harness.prefetcher(Some(ABC_MANIFEST));
    let mut handle = prefetcher.init("{}", KEY, None);

    assert!(handle.next_completion().await);
    assert_eq!(heard.recv().await, Some(Envelope::PrefetchComplete));
    service.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_request_sent_before_activation_is_delivered() {
    let harness = Harness::new(Duration::ZERO);
    let prefetcher = harness.prefetcher(Some(ABC_MANIFEST));

    let mut handle = prefetcher.init("{}", KEY, None);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(harness.fetcher.urls().is_empty());
    assert!(!harness.scope.is_active());

    let service = harness.service.clone().spawn(&harness.scope);
    assert_ok!(handle.sent().await);
    assert!(handle.next_completion().await);
    assert_eq!(harness.fetcher.urls().len(), 3);
    service.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_unparseable_config_fetches_everything_in_manifest_order() {
    let harness = Harness::new(Duration::ZERO);
    let service = harness.service.clone().spawn(&harness.scope);
    let prefetcher = harness.prefetcher(Some(
        r#"{"manifest":{"urlVersions":{"/z.js":"?v=2","/m.js":"?v=1"},"urlMappings":{"/a.png":null}}}"#,
    ));

    let mut handle = prefetcher.init("{ this is not json", KEY, None);
    assert!(handle.next_completion().await);

    assert_eq!(
        harness.fetcher.urls(),
        vec![
            "https://example.com/z.js?v=2",
            "https://example.com/m.js?v=1",
            "https://example.com/a.png",
        ]
    );
    service.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_missing_manifest_still_completes() {
    let harness = Harness::new(Duration::ZERO);
    let service = harness.service.clone().spawn(&harness.scope);
    let prefetcher = harness.prefetcher(None);

    let mut handle = prefetcher.init(r#"{"delay":50}"#, KEY, None);
    assert!(handle.next_completion().await);
    assert!(harness.fetcher.urls().is_empty());
    service.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_failed_fetches_do_not_stop_the_run() {
    let harness = Harness::new(Duration::ZERO);
    let service = harness.service.clone().spawn(&harness.scope);
    let prefetcher = harness.prefetcher(Some(
        r#"{"manifest":{"urlVersions":{"/ok-1":"","/broken":"","/ok-2":""},"urlMappings":{}}}"#,
    ));

    let mut handle = prefetcher.init("{}", KEY, None);
    assert!(handle.next_completion().await);

    assert_eq!(harness.fetcher.urls().len(), 3);
    let stats = service.queue().stats().await;
    assert_eq!(stats.total_failed, 1);
    assert_eq!(stats.total_succeeded, 2);
    service.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_second_request_while_draining_joins_the_same_run() {
    let harness = Harness::new(Duration::from_millis(50));
    let service = harness.service.clone().spawn(&harness.scope);
    let first = harness.prefetcher(Some(ABC_MANIFEST));
    let second = harness.prefetcher(Some(
        r#"{"manifest":{"urlVersions":{},"urlMappings":{"/late.css":null}}}"#,
    ));

    let mut first_handle = first.init(r#"{"delay":100}"#, KEY, None);
    assert_ok!(first_handle.sent().await);
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert!(service.queue().is_processing().await);

    let mut second_handle = second.init(r#"{"delay":100}"#, KEY, None);
    assert_ok!(second_handle.sent().await);

    assert!(first_handle.next_completion().await);
    assert!(second_handle.next_completion().await);
    assert_eq!(
        harness.fetcher.urls(),
        vec![
            "https://example.com/a",
            "https://example.com/b",
            "https://example.com/c",
            "https://example.com/late.css",
        ]
    );

    // One loop, one completion
    assert!(timeout(Duration::from_secs(10), first_handle.next_completion())
        .await
        .is_err());
    assert_eq!(service.queue().stats().await.runs_completed, 1);
    service.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_removed_listener_hears_nothing() {
    let harness = Harness::new(Duration::ZERO);
    let service = harness.service.clone().spawn(&harness.scope);
    let prefetcher = harness.prefetcher(Some(ABC_MANIFEST));

    let mut handle = prefetcher.init(r#"{"delay":100}"#, KEY, None);
    assert_ok!(handle.sent().await);
    assert_eq!(prefetcher.remove_event_listener(), 1);

    assert!(!handle.next_completion().await);
    // The run itself is unaffected
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(harness.fetcher.urls().len(), 3);
    service.shutdown();
}

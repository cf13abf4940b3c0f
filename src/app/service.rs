//! Background prefetch service
//!
//! The service is the background half of the prefetcher. It owns the
//! [`QueueProcessor`], starts a run for every `prefetchResources` request
//! it receives, and tells every client when a run has drained.

use std::sync::Arc;

use futures::{Stream, StreamExt};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use url::Url;

use crate::app::client::ResourceFetcher;
use crate::app::messaging::{BackgroundEndpoint, ClientBroadcaster, Envelope, ServiceScope};
use crate::app::queue::{QueueEvent, QueueProcessor};
use crate::errors::{FetchError, FetchResult};

/// Background service answering prefetch requests for one origin
#[derive(Debug, Clone)]
pub struct PrefetchService {
    origin: String,
    queue: QueueProcessor,
}

impl PrefetchService {
    /// Create a service for `origin` with a fresh queue
    pub fn new(origin: &str, fetcher: Arc<dyn ResourceFetcher>) -> FetchResult<Self> {
        Self::with_queue(origin, QueueProcessor::new(fetcher))
    }

    /// Create a service around an existing queue
    ///
    /// Only the scheme, host and port of `origin` are kept.
    pub fn with_queue(origin: &str, queue: QueueProcessor) -> FetchResult<Self> {
        let parsed = Url::parse(origin).map_err(|e| FetchError::InvalidUrl {
            url: origin.to_string(),
            error: e.to_string(),
        })?;
        if !parsed.has_host() {
            return Err(FetchError::InvalidUrl {
                url: origin.to_string(),
                error: "origin has no host".to_string(),
            });
        }

        Ok(Self {
            origin: parsed.origin().ascii_serialization(),
            queue,
        })
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn queue(&self) -> &QueueProcessor {
        &self.queue
    }

    /// Activate on `scope` and serve requests in the background
    ///
    /// Must be called within a tokio runtime.
    pub fn spawn(self, scope: &ServiceScope) -> ServiceHandle {
        let endpoint = scope.activate();
        let queue = self.queue.clone();

        // Subscribe before any request can be handled so no drain is missed
        let forwarder = spawn_completion_forwarder(queue.event_stream(), endpoint.clients());
        let server = tokio::spawn(self.serve(endpoint));

        ServiceHandle {
            queue,
            tasks: vec![server, forwarder],
        }
    }

    /// Handle inbound messages until the scope goes away
    async fn serve(self, mut endpoint: BackgroundEndpoint) {
        while let Some(message) = endpoint.recv().await {
            self.handle_message(&message).await;
        }
        debug!("Background inbox closed, service stopping");
    }

    /// Handle one raw message; returns the number of URLs queued if it started a run
    pub async fn handle_message(&self, message: &Value) -> Option<usize> {
        match Envelope::decode(message)? {
            Envelope::PrefetchResources(request) => {
                let filters = request.filters();
                let queued = self
                    .queue
                    .start_run(&request.manifest, &self.origin, &filters)
                    .await;
                Some(queued)
            }
            Envelope::PrefetchComplete => {
                debug!("Ignoring completion notice sent to the background context");
                None
            }
        }
    }
}

/// Broadcast a completion notice to all clients for every drained run
fn spawn_completion_forwarder(
    events: impl Stream<Item = QueueEvent> + Send + 'static,
    clients: ClientBroadcaster,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut events = Box::pin(events);
        while let Some(event) = events.next().await {
            let QueueEvent::Drained(report) = event else {
                continue;
            };
            match clients.post(&Envelope::PrefetchComplete) {
                Ok(delivered) => debug!(
                    "Run {} complete, notified {} clients",
                    report.run_id, delivered
                ),
                Err(e) => error!("Failed to notify clients of completion: {}", e),
            }
        }
    })
}

/// Running background service
#[derive(Debug)]
pub struct ServiceHandle {
    queue: QueueProcessor,
    tasks: Vec<JoinHandle<()>>,
}

impl ServiceHandle {
    /// The queue driven by this service
    pub fn queue(&self) -> &QueueProcessor {
        &self.queue
    }

    /// Stop serving requests; an in-flight drain loop finishes on its own
    pub fn shutdown(self) {
        info!("Shutting down prefetch service");
        for task in self.tasks {
            task.abort();
        }
    }
}

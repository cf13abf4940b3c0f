//! Foreground prefetcher
//!
//! The foreground half builds the prefetch request from a filter
//! configuration string and a stored manifest, sends it to the background
//! context once the host is idle, and listens for completion notices.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use prefetcher::app::foreground::Prefetcher;
//! use prefetcher::app::manifest::MemoryStore;
//! use prefetcher::app::messaging::ServiceScope;
//!
//! # async fn example() {
//! let scope = ServiceScope::new();
//! let store = Arc::new(MemoryStore::with_item("manifest", r#"{"manifest":{}}"#));
//! let prefetcher = Prefetcher::new(Arc::new(scope.client()), store);
//!
//! let mut handle = prefetcher.init(
//!     r#"{"order":["main"],"delay":100}"#,
//!     "manifest",
//!     Some(Arc::new(|| println!("prefetch complete"))),
//! );
//! handle.next_completion().await;
//! # }
//! ```

pub mod idle;

pub use idle::{wait_for_idle, IdlePolicy};

use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::app::filter::config::{delay_millis, string_list};
use crate::app::manifest::{load_document, ManifestStore};
use crate::app::messaging::{Channel, Envelope, ListenerId, PrefetchRequest};
use crate::errors::{ChannelError, ChannelResult};

/// Called once for every completion notice received
pub type CompletionCallback = Arc<dyn Fn() + Send + Sync>;

/// Foreground side of the prefetcher
pub struct Prefetcher {
    channel: Arc<dyn Channel>,
    store: Arc<dyn ManifestStore>,
    idle: IdlePolicy,
    idle_signal: Option<Arc<Notify>>,
    listeners: Mutex<Vec<ListenerId>>,
}

impl std::fmt::Debug for Prefetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Prefetcher")
            .field("idle", &self.idle)
            .field("has_idle_signal", &self.idle_signal.is_some())
            .finish_non_exhaustive()
    }
}

impl Prefetcher {
    pub fn new(channel: Arc<dyn Channel>, store: Arc<dyn ManifestStore>) -> Self {
        Self {
            channel,
            store,
            idle: IdlePolicy::default(),
            idle_signal: None,
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn with_idle_policy(mut self, idle: IdlePolicy) -> Self {
        self.idle = idle;
        self
    }

    /// Use a host-provided idle signal instead of the fixed fallback delay
    pub fn with_idle_signal(mut self, signal: Arc<Notify>) -> Self {
        self.idle_signal = Some(signal);
        self
    }

    /// Start a prefetch
    ///
    /// Registers one completion listener, then sends the request built from
    /// `config` and the manifest under `storage_key` once the host is idle.
    /// Must be called within a tokio runtime.
    pub fn init(
        &self,
        config: &str,
        storage_key: &str,
        on_complete: Option<CompletionCallback>,
    ) -> PrefetchHandle {
        let (completions_tx, completions) = mpsc::unbounded_channel();
        let listener = self.channel.on_message(Arc::new(move |envelope| {
            if envelope == Envelope::PrefetchComplete {
                debug!("Prefetch complete");
                if let Some(callback) = &on_complete {
                    callback();
                }
                let _ = completions_tx.send(());
            }
        }));
        self.lock_listeners().push(listener);

        let channel = Arc::clone(&self.channel);
        let store = Arc::clone(&self.store);
        let idle = self.idle;
        let idle_signal = self.idle_signal.clone();
        let config = config.to_string();
        let storage_key = storage_key.to_string();

        let request = tokio::spawn(async move {
            wait_for_idle(&idle, idle_signal.as_deref()).await;

            // Built at send time so the freshest stored manifest is used
            let message = build_message(store.as_ref(), &config, &storage_key);
            let result = channel.send(message).await;
            if let Err(e) = &result {
                error!("Failed to send prefetch request: {}", e);
            }
            result
        });

        PrefetchHandle {
            listener,
            completions,
            request: Some(request),
            delivered: false,
        }
    }

    /// Build the request envelope for `config` and the manifest under `storage_key`
    pub fn create_message(&self, config: &str, storage_key: &str) -> Envelope {
        build_message(self.store.as_ref(), config, storage_key)
    }

    /// Remove every listener registered by [`Prefetcher::init`]
    pub fn remove_event_listener(&self) -> usize {
        let listeners: Vec<ListenerId> = self.lock_listeners().drain(..).collect();
        listeners
            .into_iter()
            .filter(|id| self.channel.remove_listener(*id))
            .count()
    }

    fn lock_listeners(&self) -> MutexGuard<'_, Vec<ListenerId>> {
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Handle to one `init` call
#[derive(Debug)]
pub struct PrefetchHandle {
    listener: ListenerId,
    completions: mpsc::UnboundedReceiver<()>,
    request: Option<JoinHandle<ChannelResult<()>>>,
    delivered: bool,
}

impl PrefetchHandle {
    pub fn listener(&self) -> ListenerId {
        self.listener
    }

    /// Wait for the next completion notice
    ///
    /// Returns false once the listener has been removed.
    pub async fn next_completion(&mut self) -> bool {
        self.completions.recv().await.is_some()
    }

    /// Wait until the request has been handed to the background context
    ///
    /// Later calls report the first outcome again; a failed send is
    /// reported as [`ChannelError::Closed`] after the first call.
    pub async fn sent(&mut self) -> ChannelResult<()> {
        let Some(request) = self.request.as_mut() else {
            return if self.delivered {
                Ok(())
            } else {
                Err(ChannelError::Closed)
            };
        };

        let result = match request.await {
            Ok(result) => result,
            Err(_) => Err(ChannelError::Closed),
        };
        self.request = None;
        self.delivered = result.is_ok();
        result
    }
}

/// Build a request; configuration fields are absent when the string is unusable
fn build_message(store: &dyn ManifestStore, config: &str, storage_key: &str) -> Envelope {
    let fields = match serde_json::from_str::<Value>(config) {
        Ok(Value::Object(fields)) => fields,
        Ok(_) | Err(_) => {
            debug!("Prefetch configuration is not a JSON object, sending no filters");
            Default::default()
        }
    };

    let list = |name: &str| match fields.get(name) {
        None | Some(Value::Null) => None,
        value => Some(string_list(value, name)),
    };

    Envelope::PrefetchResources(PrefetchRequest {
        manifest: load_document(store, storage_key),
        include_list: list("include"),
        exclude_list: list("exclude"),
        priority_patterns: list("order"),
        delay: match fields.get("delay") {
            None | Some(Value::Null) => None,
            value => Some(delay_millis(value)),
        },
    })
}

//! Message channel between foreground clients and the background context
//!
//! [`Channel`] is the seam the foreground talks through. [`ServiceScope`]
//! is the in-process implementation: one background context at a time
//! holds the scope's inbox after [`ServiceScope::activate`], and every
//! client created from the scope, before or after activation, receives
//! what the background posts.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::envelope::Envelope;
use crate::constants::protocol;
use crate::errors::{ChannelError, ChannelResult};

/// Callback invoked for every decoded inbound envelope
pub type MessageHandler = Arc<dyn Fn(Envelope) + Send + Sync>;

/// Identifies a listener registered with [`Channel::on_message`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Foreground side of the cross-context messenger
#[async_trait]
pub trait Channel: Send + Sync {
    /// Deliver an envelope to the background context
    ///
    /// Waits until a background context is active instead of dropping the
    /// message.
    async fn send(&self, envelope: Envelope) -> ChannelResult<()>;

    /// Register a handler for envelopes posted by the background context
    fn on_message(&self, handler: MessageHandler) -> ListenerId;

    /// Deregister a handler; returns false if it was not registered
    fn remove_listener(&self, id: ListenerId) -> bool;
}

struct ScopeInner {
    controller: watch::Sender<Option<mpsc::UnboundedSender<Value>>>,
    clients: broadcast::Sender<Value>,
}

/// In-process scope shared by one background context and its clients
#[derive(Clone)]
pub struct ServiceScope {
    inner: Arc<ScopeInner>,
}

impl std::fmt::Debug for ServiceScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceScope")
            .field("active", &self.is_active())
            .field("clients", &self.inner.clients.receiver_count())
            .finish()
    }
}

impl Default for ServiceScope {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceScope {
    pub fn new() -> Self {
        let (controller, _) = watch::channel(None);
        let (clients, _) = broadcast::channel(protocol::CLIENT_BUFFER);
        Self {
            inner: Arc::new(ScopeInner {
                controller,
                clients,
            }),
        }
    }

    /// Activate a background context and claim every client in the scope
    ///
    /// Messages that clients were holding back until activation are
    /// delivered to the returned endpoint. Activating again replaces the
    /// previous background context.
    pub fn activate(&self) -> BackgroundEndpoint {
        let (inbox_tx, inbox) = mpsc::unbounded_channel();
        self.inner.controller.send_replace(Some(inbox_tx));
        info!(
            "Background context activated, claimed {} listening clients",
            self.inner.clients.receiver_count()
        );

        BackgroundEndpoint {
            inbox,
            clients: ClientBroadcaster {
                sender: self.inner.clients.clone(),
            },
        }
    }

    /// Create a foreground client in this scope
    pub fn client(&self) -> ClientEndpoint {
        ClientEndpoint {
            scope: Arc::clone(&self.inner),
            listeners: Mutex::new(HashMap::new()),
            next_listener: AtomicU64::new(1),
        }
    }

    pub fn is_active(&self) -> bool {
        self.inner.controller.borrow().is_some()
    }
}

/// Background side of a [`ServiceScope`]
#[derive(Debug)]
pub struct BackgroundEndpoint {
    inbox: mpsc::UnboundedReceiver<Value>,
    clients: ClientBroadcaster,
}

impl BackgroundEndpoint {
    /// Next raw message from any client; `None` once the scope is gone
    pub async fn recv(&mut self) -> Option<Value> {
        self.inbox.recv().await
    }

    /// Handle for posting to every client, usable from other tasks
    pub fn clients(&self) -> ClientBroadcaster {
        self.clients.clone()
    }
}

/// Posts envelopes to every listening client of a scope
#[derive(Debug, Clone)]
pub struct ClientBroadcaster {
    sender: broadcast::Sender<Value>,
}

impl ClientBroadcaster {
    /// Post to all clients, returning how many listeners received it
    ///
    /// Having no listeners is not an error.
    pub fn post(&self, envelope: &Envelope) -> ChannelResult<usize> {
        let value = envelope.encode()?;
        Ok(self.sender.send(value).unwrap_or(0))
    }
}

/// Foreground client of a [`ServiceScope`]
///
/// Listener tasks are aborted when the endpoint is dropped.
pub struct ClientEndpoint {
    scope: Arc<ScopeInner>,
    listeners: Mutex<HashMap<ListenerId, JoinHandle<()>>>,
    next_listener: AtomicU64,
}

impl std::fmt::Debug for ClientEndpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientEndpoint")
            .field("listeners", &self.lock_listeners().len())
            .finish()
    }
}

impl ClientEndpoint {
    pub fn listener_count(&self) -> usize {
        self.lock_listeners().len()
    }

    fn lock_listeners(&self) -> MutexGuard<'_, HashMap<ListenerId, JoinHandle<()>>> {
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl Channel for ClientEndpoint {
    async fn send(&self, envelope: Envelope) -> ChannelResult<()> {
        let value = envelope.encode()?;
        let mut controller = self.scope.controller.subscribe();

        let inbox = loop {
            let current = controller.borrow_and_update().clone();
            if let Some(inbox) = current {
                break inbox;
            }
            debug!(
                "Background context not active, deferring '{}' message",
                envelope.action()
            );
            controller
                .changed()
                .await
                .map_err(|_| ChannelError::NoController)?;
        };

        inbox.send(value).map_err(|_| ChannelError::Closed)
    }

    /// Must be called within a tokio runtime
    fn on_message(&self, handler: MessageHandler) -> ListenerId {
        // Subscribe before spawning so nothing posted after this call is missed
        let mut inbound = self.scope.clients.subscribe();
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));

        let task = tokio::spawn(async move {
            loop {
                match inbound.recv().await {
                    Ok(value) => {
                        if let Some(envelope) = Envelope::decode(&value) {
                            handler(envelope);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Message listener lagged, skipped {} messages", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        self.lock_listeners().insert(id, task);
        id
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        match self.lock_listeners().remove(&id) {
            Some(task) => {
                task.abort();
                true
            }
            None => false,
        }
    }
}

impl Drop for ClientEndpoint {
    fn drop(&mut self) {
        for (_, task) in self.lock_listeners().drain() {
            task.abort();
        }
    }
}

//! Cross-context messaging
//!
//! The foreground and background contexts share no state; they exchange
//! [`Envelope`]s over a [`Channel`]. [`ServiceScope`] provides the
//! in-process channel used by the CLI and the tests.

pub mod channel;
pub mod envelope;

pub use channel::{
    BackgroundEndpoint, Channel, ClientBroadcaster, ClientEndpoint, ListenerId, MessageHandler,
    ServiceScope,
};
pub use envelope::{Envelope, PrefetchRequest};

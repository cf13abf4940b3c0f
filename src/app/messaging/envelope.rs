//! JSON envelopes exchanged between the foreground and background contexts
//!
//! Every envelope is a JSON object whose `action` field names the message:
//!
//! ```json
//! { "action": "prefetchResources", "manifest": {...}, "includeList": [], "excludeList": [], "priorityPatterns": [], "delay": 250 }
//! { "action": "prefetchComplete" }
//! ```
//!
//! Decoding is lenient: an object with an unknown action decodes to `None`
//! and is ignored by the receiver, and request fields of the wrong type
//! default to empty.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::app::filter::config::{delay_millis, string_list};
use crate::app::filter::FilterConfig;
use crate::constants::protocol;

/// Payload of a `prefetchResources` request
///
/// List fields are `None` when the foreground configuration did not carry
/// them; the background treats that the same as an empty list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrefetchRequest {
    /// The manifest document as read from storage
    #[serde(default)]
    pub manifest: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_list: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_list: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority_patterns: Option<Vec<String>>,
    /// Milliseconds to wait before each dispatch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<u64>,
}

impl PrefetchRequest {
    /// Filter settings carried by this request, absent fields defaulted
    pub fn filters(&self) -> FilterConfig {
        FilterConfig::from_parts(
            self.include_list.clone(),
            self.exclude_list.clone(),
            self.priority_patterns.clone(),
            self.delay,
        )
    }

    fn from_fields(fields: &serde_json::Map<String, Value>) -> Self {
        let list = |name: &str| match fields.get(name) {
            None | Some(Value::Null) => None,
            value => Some(string_list(value, name)),
        };

        Self {
            manifest: fields.get("manifest").cloned().unwrap_or(Value::Null),
            include_list: list("includeList"),
            exclude_list: list("excludeList"),
            priority_patterns: list("priorityPatterns"),
            delay: match fields.get("delay") {
                None | Some(Value::Null) => None,
                value => Some(delay_millis(value)),
            },
        }
    }
}

/// A message on the cross-context channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum Envelope {
    /// Foreground asks the background to run a prefetch
    #[serde(rename = "prefetchResources")]
    PrefetchResources(PrefetchRequest),
    /// Background reports that a run drained
    #[serde(rename = "prefetchComplete")]
    PrefetchComplete,
}

impl Envelope {
    pub fn action(&self) -> &'static str {
        match self {
            Envelope::PrefetchResources(_) => protocol::PREFETCH_RESOURCES,
            Envelope::PrefetchComplete => protocol::PREFETCH_COMPLETE,
        }
    }

    /// Decode a raw message, returning `None` for anything unrecognized
    pub fn decode(value: &Value) -> Option<Self> {
        let Value::Object(fields) = value else {
            debug!("Ignoring non-object message");
            return None;
        };

        match fields.get(protocol::ACTION_FIELD).and_then(Value::as_str) {
            Some(protocol::PREFETCH_RESOURCES) => {
                Some(Envelope::PrefetchResources(PrefetchRequest::from_fields(fields)))
            }
            Some(protocol::PREFETCH_COMPLETE) => Some(Envelope::PrefetchComplete),
            Some(other) => {
                debug!("Ignoring message with unknown action '{}'", other);
                None
            }
            None => {
                debug!("Ignoring message without an action");
                None
            }
        }
    }

    /// Encode into the JSON form sent over the channel
    pub fn encode(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

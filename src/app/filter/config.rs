//! Filter configuration resolved from a raw JSON string
//!
//! The configuration string is authored outside this crate, typically
//! embedded in a page, and looks like:
//!
//! ```json
//! { "include": ["\\.js$"], "exclude": ["legacy"], "order": ["main", "vendor"], "delay": 250 }
//! ```
//!
//! Every field is optional. A string that is not a JSON object resolves to
//! an empty configuration so that a broken config never stops prefetching.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::patterns::PatternSet;
use crate::errors::{ConfigError, ConfigResult};

/// Typed filter, priority and pacing settings for one prefetch run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// URLs must match one of these (when non-empty)
    pub include: Vec<String>,
    /// URLs matching any of these are dropped
    pub exclude: Vec<String>,
    /// Priority patterns; earlier patterns are fetched first
    pub order: Vec<String>,
    /// Pause before every dispatch, in milliseconds
    pub delay_ms: u64,
}

impl FilterConfig {
    /// Resolve a raw configuration string, degrading to an empty config
    pub fn resolve(raw: &str) -> Self {
        match Self::try_parse(raw) {
            Ok(config) => config,
            Err(e) => {
                warn!("Ignoring filter configuration: {}", e);
                Self::default()
            }
        }
    }

    /// Parse a raw configuration string
    ///
    /// Fails only when the string is not a JSON object. Individual fields
    /// of the wrong type fall back to empty/zero.
    pub fn try_parse(raw: &str) -> ConfigResult<Self> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| ConfigError::InvalidFilters {
                reason: e.to_string(),
            })?;

        let Value::Object(fields) = value else {
            return Err(ConfigError::InvalidFilters {
                reason: format!("expected an object, found {}", json_kind(&value)),
            });
        };

        let config = Self {
            include: string_list(fields.get("include"), "include"),
            exclude: string_list(fields.get("exclude"), "exclude"),
            order: string_list(fields.get("order"), "order"),
            delay_ms: delay_millis(fields.get("delay")),
        };
        debug!(
            "Resolved filter configuration: {} include, {} exclude, {} order, {}ms delay",
            config.include.len(),
            config.exclude.len(),
            config.order.len(),
            config.delay_ms
        );
        Ok(config)
    }

    /// Build a config from already-split lists, as carried by a request
    pub fn from_parts(
        include: Option<Vec<String>>,
        exclude: Option<Vec<String>>,
        order: Option<Vec<String>>,
        delay_ms: Option<u64>,
    ) -> Self {
        Self {
            include: include.unwrap_or_default(),
            exclude: exclude.unwrap_or_default(),
            order: order.unwrap_or_default(),
            delay_ms: delay_ms.unwrap_or_default(),
        }
    }

    /// True when the config neither filters, orders nor delays
    pub fn is_empty(&self) -> bool {
        self.include.is_empty()
            && self.exclude.is_empty()
            && self.order.is_empty()
            && self.delay_ms == 0
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn include_set(&self) -> PatternSet {
        PatternSet::compile(&self.include)
    }

    pub fn exclude_set(&self) -> PatternSet {
        PatternSet::compile(&self.exclude)
    }

    pub fn priority_set(&self) -> PatternSet {
        PatternSet::compile(&self.order)
    }
}

pub(crate) fn string_list(value: Option<&Value>, field: &str) -> Vec<String> {
    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.clone()),
                other => {
                    warn!("Skipping non-string entry in '{}': {}", field, other);
                    None
                }
            })
            .collect(),
        Some(other) => {
            warn!("Expected a list for '{}', found {}", field, json_kind(other));
            Vec::new()
        }
    }
}

pub(crate) fn delay_millis(value: Option<&Value>) -> u64 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Number(n)) => {
            if let Some(ms) = n.as_u64() {
                ms
            } else {
                // Negative or fractional delays clamp/round into range
                n.as_f64()
                    .filter(|ms| ms.is_finite() && *ms > 0.0)
                    .map(|ms| ms.round() as u64)
                    .unwrap_or(0)
            }
        }
        Some(other) => {
            warn!("Expected a number for 'delay', found {}", json_kind(other));
            0
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_full_config() {
        let raw = r#"{"include":["test"],"exclude":[],"order":["main"],"delay":1000}"#;
        let config = FilterConfig::resolve(raw);

        assert_eq!(config.include, vec!["test"]);
        assert!(config.exclude.is_empty());
        assert_eq!(config.order, vec!["main"]);
        assert_eq!(config.delay_ms, 1000);
        assert_eq!(config.delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_unparseable_config_is_empty() {
        for raw in ["", "not json", "{\"include\": [", "[1, 2]", "null", "42"] {
            let config = FilterConfig::resolve(raw);
            assert_eq!(config, FilterConfig::default(), "input: {:?}", raw);
            assert!(config.is_empty());
        }
    }

    #[test]
    fn test_try_parse_reports_errors() {
        assert!(FilterConfig::try_parse("{").is_err());
        assert!(FilterConfig::try_parse("\"string\"").is_err());
        assert!(FilterConfig::try_parse("{}").is_ok());
    }

    #[test]
    fn test_missing_and_mistyped_fields_default() {
        let config = FilterConfig::resolve(r#"{"include":"js","order":["a",3,"b"],"delay":"soon"}"#);
        assert!(config.include.is_empty());
        assert!(config.exclude.is_empty());
        assert_eq!(config.order, vec!["a", "b"]);
        assert_eq!(config.delay_ms, 0);
    }

    #[test]
    fn test_delay_is_never_negative() {
        assert_eq!(FilterConfig::resolve(r#"{"delay":-50}"#).delay_ms, 0);
        assert_eq!(FilterConfig::resolve(r#"{"delay":12.6}"#).delay_ms, 13);
    }

    #[test]
    fn test_from_parts_defaults_absent_lists() {
        let config = FilterConfig::from_parts(Some(vec!["a".into()]), None, None, Some(5));
        assert_eq!(config.include, vec!["a"]);
        assert!(config.exclude.is_empty());
        assert!(config.order.is_empty());
        assert_eq!(config.delay_ms, 5);
    }
}

//! Coordinator configuration.
//!
//! ```rust,ignore
//! let config = ValidatorConfig::from_json(r#"{
//!     "validateOn": ["blur", "submit"],
//!     "live": true,
//!     "debounce": "250ms",
//!     "remote": { "timeout": "2s", "cacheTtl": "1m" }
//! }"#)?;
//! ```

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Events that may trigger validation of a single field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    /// The field lost focus.
    Blur,
    /// The value changed while typing.
    Input,
    /// The value was committed.
    Change,
    /// The form was submitted.
    Submit,
}

/// Settings of `remote`, `unique` and `exists`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RemoteConfig {
    /// Request timeout; a rule's `timeout` param overrides it.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Whether results are cached per (rule, url, value).
    pub cache: bool,
    /// How long a cached result stays fresh.
    #[serde(with = "humantime_serde")]
    pub cache_ttl: Duration,
}

impl RemoteConfig {
    /// 5 s timeout, caching on, 30 s freshness.
    pub const DEFAULT: Self = Self {
        timeout: Duration::from_secs(5),
        cache: true,
        cache_ttl: Duration::from_secs(30),
    };
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Field id -> rule name -> message template.
pub type MessageOverrides = HashMap<String, HashMap<String, String>>;

/// Configuration of a [`FormValidator`](crate::form::FormValidator).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ValidatorConfig {
    /// Events that validate the field they happen on.
    pub validate_on: Vec<Trigger>,
    /// Validate on input, debounced.
    pub live: bool,
    /// Quiet period before a live validation runs.
    #[serde(with = "humantime_serde")]
    pub debounce: Duration,
    /// `validate()` stops at the first invalid field.
    pub stop_on_first_error: bool,
    /// Which form fields `discover_fields` considers; every field when unset.
    pub field_selector: Option<String>,
    /// Message templates merged under each field's own messages.
    pub messages: MessageOverrides,
    /// Remote-rule settings.
    pub remote: RemoteConfig,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            validate_on: vec![Trigger::Blur, Trigger::Change, Trigger::Submit],
            live: false,
            debounce: Duration::from_millis(300),
            stop_on_first_error: false,
            field_selector: None,
            messages: HashMap::new(),
            remote: RemoteConfig::DEFAULT,
        }
    }
}

impl ValidatorConfig {
    /// Parses a JSON configuration; missing keys take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(json).map_err(|source| ConfigError::MalformedJson {
            context: "validator config".into(),
            source,
        })
    }

    /// Whether `trigger` validates a field.
    pub fn triggers_on(&self, trigger: Trigger) -> bool {
        self.validate_on.contains(&trigger)
    }

    /// Sets the validation triggers.
    #[must_use = "builder methods must be chained or built"]
    pub fn validate_on(mut self, triggers: impl IntoIterator<Item = Trigger>) -> Self {
        self.validate_on = triggers.into_iter().collect();
        self
    }

    /// Turns live validation on or off.
    #[must_use = "builder methods must be chained or built"]
    pub fn live(mut self, live: bool) -> Self {
        self.live = live;
        self
    }

    /// Sets the live-validation debounce.
    #[must_use = "builder methods must be chained or built"]
    pub fn debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Stop `validate()` at the first invalid field.
    #[must_use = "builder methods must be chained or built"]
    pub fn stop_on_first_error(mut self, stop: bool) -> Self {
        self.stop_on_first_error = stop;
        self
    }

    /// Restricts `discover_fields` to fields matching `selector`.
    #[must_use = "builder methods must be chained or built"]
    pub fn field_selector(mut self, selector: impl Into<String>) -> Self {
        self.field_selector = Some(selector.into());
        self
    }

    /// Adds a message template for one rule of one field.
    #[must_use = "builder methods must be chained or built"]
    pub fn message(mut self, field: impl Into<String>, rule: impl Into<String>, template: impl Into<String>) -> Self {
        self.messages
            .entry(field.into())
            .or_default()
            .insert(rule.into(), template.into());
        self
    }

    /// Replaces the remote-rule settings.
    #[must_use = "builder methods must be chained or built"]
    pub fn remote(mut self, remote: RemoteConfig) -> Self {
        self.remote = remote;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults() {
        let config = ValidatorConfig::default();
        assert_eq!(config.validate_on, vec![Trigger::Blur, Trigger::Change, Trigger::Submit]);
        assert!(!config.live);
        assert_eq!(config.debounce, Duration::from_millis(300));
        assert_eq!(config.remote.timeout, Duration::from_secs(5));
        assert_eq!(config.remote.cache_ttl, Duration::from_secs(30));
        assert!(config.remote.cache);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = ValidatorConfig::from_json(
            r#"{
                "validateOn": ["input", "submit"],
                "live": true,
                "debounce": "250ms",
                "stopOnFirstError": true,
                "messages": { "email": { "required": "Email please" } },
                "remote": { "timeout": "2s" }
            }"#,
        )
        .unwrap();

        assert!(config.triggers_on(Trigger::Input));
        assert!(!config.triggers_on(Trigger::Blur));
        assert_eq!(config.debounce, Duration::from_millis(250));
        assert!(config.stop_on_first_error);
        assert_eq!(config.messages["email"]["required"], "Email please");
        assert_eq!(config.remote.timeout, Duration::from_secs(2));
        assert_eq!(config.remote.cache_ttl, Duration::from_secs(30));
        assert!(config.field_selector.is_none());
    }

    #[test]
    fn malformed_json_is_a_config_error() {
        let err = ValidatorConfig::from_json(r#"{"debounce": "soon"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::MalformedJson { .. }));
    }

    #[test]
    fn builder() {
        let config = ValidatorConfig::default()
            .live(true)
            .debounce(Duration::from_millis(10))
            .message("email", "email", "Bad email")
            .field_selector("[data-validate]");
        assert!(config.live);
        assert_eq!(config.messages["email"]["email"], "Bad email");
        assert_eq!(config.field_selector.as_deref(), Some("[data-validate]"));
    }
}

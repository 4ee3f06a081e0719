//! Error types
//!
//! Two families live here:
//!
//! - [`FieldError`]: the structured payload of a *failed validation*. It is
//!   data, not a Rust error in the control-flow sense: the engine returns it
//!   inside [`EngineResult::Invalid`](crate::engine::EngineResult).
//! - [`ConfigError`], [`RuleError`], [`FormError`]: the `thiserror` enums
//!   for configuration mistakes, evaluator failures and construction errors.
//!
//! `FieldError` string fields use `Cow<'static, str>` so built-in rule names
//! and default messages never allocate.

use std::borrow::Cow;
use std::fmt;

use serde_json::{Map, Value};

// ============================================================================
// FIELD ERROR
// ============================================================================

/// The first failing rule of a field, with its message already interpolated.
///
/// # Examples
///
/// ```rust,ignore
/// use formguard::FieldError;
///
/// let error = FieldError::new("minLength", "Please enter at least 5 characters")
///     .with_field("username")
///     .with_param("min", 5);
/// assert_eq!(error.param("min"), Some(&serde_json::json!(5)));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    /// Name of the rule that failed, e.g. `"required"`, `"minLength"`.
    pub rule: Cow<'static, str>,

    /// Human-readable message with `{token}` placeholders resolved.
    pub message: Cow<'static, str>,

    /// Id of the field the error belongs to, once known.
    pub field: Option<Cow<'static, str>>,

    /// The rule's canonical parameters at the time it failed.
    pub params: Map<String, Value>,
}

impl FieldError {
    /// Creates a new field error from a rule name and message.
    pub fn new(rule: impl Into<Cow<'static, str>>, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            rule: rule.into(),
            message: message.into(),
            field: None,
            params: Map::new(),
        }
    }

    /// Sets the field id for this error.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_field(mut self, field: impl Into<Cow<'static, str>>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Adds a single parameter.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Replaces all parameters.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_params(mut self, params: Map<String, Value>) -> Self {
        self.params = params;
        self
    }

    /// Looks up a parameter by key.
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(field) = &self.field {
            write!(f, "[{}] {}: {}", field, self.rule, self.message)
        } else {
            write!(f, "{}: {}", self.rule, self.message)
        }
    }
}

// ============================================================================
// CONFIGURATION ERRORS
// ============================================================================

/// A rule declaration, inline metadata attribute or configuration document
/// that could not be understood.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The root of a rule declaration is neither an array nor an object.
    #[error("rule declaration must be an array or an object, got {found}")]
    InvalidDeclaration {
        /// JSON type that was found instead.
        found: &'static str,
    },

    /// An array entry is neither a rule name nor a single-key object.
    #[error("rule entry #{index} must be a rule name or a single-key object")]
    InvalidEntry {
        /// Position of the offending entry.
        index: usize,
    },

    /// A rule's configuration value cannot be interpreted.
    #[error("rule '{rule}' has an unusable configuration: {reason}")]
    InvalidRuleConfig {
        /// Rule name.
        rule: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Custom messages must map rule names to strings.
    #[error("messages for field '{field}' must be an object of strings")]
    InvalidMessages {
        /// Field id the messages were meant for.
        field: String,
    },

    /// Inline metadata or a configuration document is not valid JSON.
    #[error("malformed JSON in {context}: {source}")]
    MalformedJson {
        /// Where the JSON came from (attribute name, config file…).
        context: String,
        /// Underlying parser error.
        #[source]
        source: serde_json::Error,
    },

    /// The referenced field is not registered.
    #[error("field '{0}' is not registered")]
    UnknownField(String),
}

// ============================================================================
// RULE EVALUATION ERRORS
// ============================================================================

/// Failure raised by a rule evaluator.
///
/// The engine never propagates these: each one becomes a failing result whose
/// message reports the cause.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RuleError {
    /// A parameter is missing or has the wrong shape.
    #[error("invalid parameter '{param}': {reason}")]
    InvalidParam {
        /// Parameter key.
        param: String,
        /// Explanation.
        reason: String,
    },

    /// A user-supplied pattern did not compile.
    #[error("invalid pattern: {0}")]
    Pattern(String),

    /// The callback named by a `callback` rule is not registered.
    #[error("no callback registered under '{0}'")]
    MissingCallback(String),

    /// Free-form failure from a custom evaluator.
    #[error("{0}")]
    Custom(String),
}

impl RuleError {
    /// Shorthand for [`RuleError::InvalidParam`].
    pub fn invalid_param(param: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParam {
            param: param.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for [`RuleError::Custom`].
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom(message.into())
    }
}

impl From<regex::Error> for RuleError {
    fn from(error: regex::Error) -> Self {
        Self::Pattern(error.to_string())
    }
}

// ============================================================================
// CONSTRUCTION ERRORS
// ============================================================================

/// Errors raised while constructing a [`FormValidator`](crate::form::FormValidator).
///
/// This is the only error type that crosses the validation API boundary.
#[derive(Debug, thiserror::Error)]
pub enum FormError {
    /// The element handed to the coordinator is not a form.
    #[error("element is not a form")]
    NotAForm,
}

// ============================================================================
// TESTS
// ============================================================================

//! Rule parameters.
//!
//! Declarations arrive in four shapes (`false`, `true`, a scalar, an object).
//! [`RuleConfig`] is that tagged variant; the normalizer turns every shape
//! into a [`RuleEntry`] holding canonical [`RuleParams`], and nothing
//! downstream ever looks at the original shape again.

use std::borrow::Cow;
use std::fmt;

use serde_json::{Map, Value};

use crate::rule::CallbackFn;
use crate::value::{json_to_text, parse_number};

// ============================================================================
// RULE CONFIG
// ============================================================================

/// A single rule's declaration before normalization.
#[derive(Clone)]
pub enum RuleConfig {
    /// `false`: declared but switched off.
    Disabled,
    /// `true`: enabled with no parameters.
    Empty,
    /// A bare scalar or array, canonicalized to `{ "value": scalar }`.
    Scalar(Value),
    /// A full parameter object.
    Params(RuleParams),
}

impl RuleConfig {
    /// Interprets a JSON declaration. `null` is not a configuration.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(false) => Some(Self::Disabled),
            Value::Bool(true) => Some(Self::Empty),
            Value::Object(map) => Some(Self::Params(RuleParams::from_map(map.clone()))),
            scalar => Some(Self::Scalar(scalar.clone())),
        }
    }
}

impl fmt::Debug for RuleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => f.write_str("Disabled"),
            Self::Empty => f.write_str("Empty"),
            Self::Scalar(value) => f.debug_tuple("Scalar").field(value).finish(),
            Self::Params(params) => f.debug_tuple("Params").field(params).finish(),
        }
    }
}

impl From<bool> for RuleConfig {
    fn from(enabled: bool) -> Self {
        if enabled { Self::Empty } else { Self::Disabled }
    }
}

impl From<RuleParams> for RuleConfig {
    fn from(params: RuleParams) -> Self {
        Self::Params(params)
    }
}

impl From<Value> for RuleConfig {
    fn from(value: Value) -> Self {
        Self::from_json(&value).unwrap_or(Self::Disabled)
    }
}

macro_rules! scalar_config {
    ($($ty:ty),+) => {
        $(impl From<$ty> for RuleConfig {
            fn from(value: $ty) -> Self {
                Self::Scalar(Value::from(value))
            }
        })+
    };
}

scalar_config!(i32, i64, u32, u64, f64, &str, String);

// ============================================================================
// RULE ENTRY
// ============================================================================

/// A canonical rule slot: parameters plus an enabled flag.
///
/// Disabled rules keep their slot so a later re-enable preserves order.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleEntry {
    /// Canonical parameters.
    pub params: RuleParams,
    /// Disabled rules are never evaluated.
    pub enabled: bool,
}

impl RuleEntry {
    /// An enabled entry with the given parameters.
    pub fn enabled(params: RuleParams) -> Self {
        Self {
            params,
            enabled: true,
        }
    }

    /// A disabled entry with no parameters.
    pub fn disabled() -> Self {
        Self {
            params: RuleParams::new(),
            enabled: false,
        }
    }
}

impl From<RuleConfig> for RuleEntry {
    fn from(config: RuleConfig) -> Self {
        match config {
            RuleConfig::Disabled => Self::disabled(),
            RuleConfig::Empty => Self::enabled(RuleParams::new()),
            RuleConfig::Scalar(value) => Self::enabled(RuleParams::new().with("value", value)),
            RuleConfig::Params(params) => Self::enabled(params),
        }
    }
}

// ============================================================================
// RULE PARAMS
// ============================================================================

/// Canonical parameter object of one rule.
///
/// A string-keyed JSON map plus an optional attached function, used by the
/// `custom` and `when` rules (functions cannot travel through JSON).
#[derive(Clone, Default)]
pub struct RuleParams {
    values: Map<String, Value>,
    handler: Option<CallbackFn>,
}

impl RuleParams {
    /// Empty parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an existing JSON map.
    pub fn from_map(values: Map<String, Value>) -> Self {
        Self {
            values,
            handler: None,
        }
    }

    /// Adds or replaces a parameter.
    #[must_use = "builder methods must be chained or built"]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Attaches a function for `custom` / `when`.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_handler(mut self, handler: CallbackFn) -> Self {
        self.handler = Some(handler);
        self
    }

    /// The attached function, if any.
    pub fn handler(&self) -> Option<&CallbackFn> {
        self.handler.as_ref()
    }

    /// The raw JSON map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    /// Raw parameter value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Whether a key is present.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// The `value` parameter produced by scalar declarations.
    pub fn value(&self) -> Option<&Value> {
        self.values.get("value")
    }

    /// The per-declaration message override.
    pub fn message(&self) -> Option<&str> {
        self.values.get("message").and_then(Value::as_str)
    }

    /// String parameter; numbers and booleans are rendered.
    pub fn str(&self, key: &str) -> Option<Cow<'_, str>> {
        match self.values.get(key)? {
            Value::String(s) => Some(Cow::Borrowed(s.as_str())),
            other @ (Value::Number(_) | Value::Bool(_)) => Some(Cow::Owned(json_to_text(other))),
            _ => None,
        }
    }

    /// Numeric parameter; numeric strings are accepted.
    pub fn f64(&self, key: &str) -> Option<f64> {
        match self.values.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => parse_number(s),
            _ => None,
        }
    }

    /// Non-negative integer parameter.
    pub fn usize(&self, key: &str) -> Option<usize> {
        self.f64(key)
            .filter(|n| *n >= 0.0 && n.fract() == 0.0)
            .map(|n| n as usize)
    }

    /// Boolean parameter; `"true"` / `"false"` strings are accepted.
    pub fn bool(&self, key: &str) -> Option<bool> {
        match self.values.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.trim() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// List parameter: a JSON array, or a comma-separated string.
    pub fn list(&self, key: &str) -> Option<Vec<String>> {
        match self.values.get(key)? {
            Value::Array(items) => Some(items.iter().map(json_to_text).collect()),
            Value::String(s) => Some(
                s.split(',')
                    .map(str::trim)
                    .filter(|part| !part.is_empty())
                    .map(str::to_owned)
                    .collect(),
            ),
            other => Some(vec![json_to_text(other)]),
        }
    }

    /// First numeric parameter among `keys`, e.g. `["min", "value"]`.
    pub fn first_f64(&self, keys: &[&str]) -> Option<f64> {
        keys.iter().find_map(|key| self.f64(key))
    }

    /// First non-negative integer parameter among `keys`.
    pub fn first_usize(&self, keys: &[&str]) -> Option<usize> {
        keys.iter().find_map(|key| self.usize(key))
    }

    /// First string parameter among `keys`.
    pub fn first_str(&self, keys: &[&str]) -> Option<Cow<'_, str>> {
        keys.iter().find_map(|key| self.str(key))
    }

    /// First list parameter among `keys`.
    pub fn first_list(&self, keys: &[&str]) -> Option<Vec<String>> {
        keys.iter().find_map(|key| self.list(key))
    }

    /// Text rendering of a parameter, for message interpolation.
    pub fn display(&self, key: &str) -> Option<String> {
        self.values.get(key).map(json_to_text)
    }
}

impl fmt::Debug for RuleParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleParams")
            .field("values", &self.values)
            .field("handler", &self.handler.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl PartialEq for RuleParams {
    fn eq(&self, other: &Self) -> bool {
        let same_handler = match (&self.handler, &other.handler) {
            (None, None) => true,
            (Some(a), Some(b)) => std::sync::Arc::ptr_eq(a, b),
            _ => false,
        };
        self.values == other.values && same_handler
    }
}

impl From<Map<String, Value>> for RuleParams {
    fn from(values: Map<String, Value>) -> Self {
        Self::from_map(values)
    }
}

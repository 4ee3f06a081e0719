//! Rule declaration normalization.
//!
//! Two declaration shapes are accepted and both collapse into one
//! [`CanonicalRuleMap`]:
//!
//! ```json
//! ["required", "email", { "minLength": 5 }]
//! { "required": true, "email": true, "minLength": 5 }
//! ```
//!
//! Insertion order is preserved. Forcing `required` to the front is the
//! engine's job, not the normalizer's.

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::ConfigError;
use crate::rule::{CallbackFn, RuleConfig, RuleEntry, RuleParams};

/// Ordered rule name → canonical entry mapping of one field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalRuleMap {
    entries: IndexMap<String, RuleEntry>,
}

impl CanonicalRuleMap {
    /// An empty rule set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule from any declaration shape.
    #[must_use = "builder methods must be chained or built"]
    pub fn rule(mut self, name: impl Into<String>, config: impl Into<RuleConfig>) -> Self {
        self.insert(name, config);
        self
    }

    /// Adds `required`.
    #[must_use = "builder methods must be chained or built"]
    pub fn required(self) -> Self {
        self.rule("required", true)
    }

    /// Adds a `custom` rule backed by `f`.
    #[must_use = "builder methods must be chained or built"]
    pub fn custom(self, f: CallbackFn) -> Self {
        self.rule("custom", RuleParams::new().with_handler(f))
    }

    /// Inserts or replaces a rule. A replaced rule keeps its position.
    pub fn insert(&mut self, name: impl Into<String>, config: impl Into<RuleConfig>) {
        self.entries.insert(name.into(), RuleEntry::from(config.into()));
    }

    /// Removes a rule, preserving the order of the others.
    pub fn remove(&mut self, name: &str) -> Option<RuleEntry> {
        self.entries.shift_remove(name)
    }

    /// Switches a declared rule on or off. Returns `false` if it is not declared.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> bool {
        match self.entries.get_mut(name) {
            Some(entry) => {
                entry.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Looks up a rule.
    pub fn get(&self, name: &str) -> Option<&RuleEntry> {
        self.entries.get(name)
    }

    /// Whether the rule is declared and enabled.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.entries.get(name).is_some_and(|entry| entry.enabled)
    }

    /// Whether the rule is declared at all.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Rules in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RuleEntry)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    /// Rule names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Number of declared rules, disabled ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no rule is declared.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TryFrom<&Value> for CanonicalRuleMap {
    type Error = ConfigError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        normalize(value)
    }
}

impl TryFrom<Value> for CanonicalRuleMap {
    type Error = ConfigError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        normalize(&value)
    }
}

impl<'a> IntoIterator for &'a CanonicalRuleMap {
    type Item = (&'a String, &'a RuleEntry);
    type IntoIter = indexmap::map::Iter<'a, String, RuleEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Converts an array-form or object-form declaration into canonical form.
///
/// Unknown rule names are accepted; the engine deals with them at
/// evaluation time.
pub fn normalize(rules: &Value) -> Result<CanonicalRuleMap, ConfigError> {
    let mut map = CanonicalRuleMap::new();

    match rules {
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                match item {
                    Value::String(name) => map.insert(name.as_str(), RuleConfig::Empty),
                    Value::Object(obj) if obj.len() == 1 => {
                        for (name, config) in obj {
                            map.insert(name.as_str(), rule_config(name, config)?);
                        }
                    }
                    _ => return Err(ConfigError::InvalidEntry { index }),
                }
            }
        }
        Value::Object(obj) => {
            for (name, config) in obj {
                map.insert(name.as_str(), rule_config(name, config)?);
            }
        }
        other => {
            return Err(ConfigError::InvalidDeclaration {
                found: json_type(other),
            });
        }
    }

    Ok(map)
}

fn rule_config(name: &str, config: &Value) -> Result<RuleConfig, ConfigError> {
    RuleConfig::from_json(config).ok_or_else(|| ConfigError::InvalidRuleConfig {
        rule: name.to_owned(),
        reason: "null is not a rule configuration".to_owned(),
    })
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

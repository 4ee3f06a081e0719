//! Registered fields: configuration, lifecycle state and identity.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::engine::Messages;
use crate::error::ConfigError;
use crate::field::FieldRef;
use crate::rule::{CanonicalRuleMap, RuleConfig};

/// Prefix of ids generated for fields that have neither id nor name.
pub const GENERATED_ID_PREFIX: &str = "formguard-field-";

/// Lifecycle state of one field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldState {
    /// `None` until the first validation run.
    pub valid: Option<bool>,
    /// The value was edited.
    pub dirty: bool,
    /// The field lost focus at least once.
    pub touched: bool,
}

/// A partial update of [`FieldState`]; unset parts are left alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatePatch {
    valid: Option<Option<bool>>,
    dirty: Option<bool>,
    touched: Option<bool>,
}

impl StatePatch {
    /// An empty patch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a validation result.
    #[must_use = "builder methods must be chained or built"]
    pub fn valid(mut self, valid: bool) -> Self {
        self.valid = Some(Some(valid));
        self
    }

    /// Forgets the last validation result.
    #[must_use = "builder methods must be chained or built"]
    pub fn unvalidated(mut self) -> Self {
        self.valid = Some(None);
        self
    }

    /// Sets the dirty flag.
    #[must_use = "builder methods must be chained or built"]
    pub fn dirty(mut self, dirty: bool) -> Self {
        self.dirty = Some(dirty);
        self
    }

    /// Sets the touched flag.
    #[must_use = "builder methods must be chained or built"]
    pub fn touched(mut self, touched: bool) -> Self {
        self.touched = Some(touched);
        self
    }

    /// A patch returning a field to its initial state.
    pub fn reset() -> Self {
        Self::new().unvalidated().dirty(false).touched(false)
    }

    fn apply(self, state: &mut FieldState) {
        if let Some(valid) = self.valid {
            state.valid = valid;
        }
        if let Some(dirty) = self.dirty {
            state.dirty = dirty;
        }
        if let Some(touched) = self.touched {
            state.touched = touched;
        }
    }
}

/// Everything the coordinator knows about one field.
#[derive(Clone)]
pub struct FieldRecord {
    /// Stable id.
    pub id: String,
    /// The host element.
    pub element: FieldRef,
    /// Canonical rules.
    pub rules: CanonicalRuleMap,
    /// Rule name -> message template.
    pub messages: Messages,
    /// Human-readable label, captured at registration.
    pub label: String,
    /// Lifecycle state.
    pub state: FieldState,
}

impl std::fmt::Debug for FieldRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldRecord")
            .field("id", &self.id)
            .field("rules", &self.rules)
            .field("messages", &self.messages)
            .field("label", &self.label)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Owning registry of fields, keyed by stable id in registration order.
///
/// Element identity is pointer identity of the shared handle; the registry
/// keeps an element -> id table so the same handle always maps to the same
/// record.
#[derive(Debug, Default)]
pub struct FieldRegistry {
    records: IndexMap<String, FieldRecord>,
    elements: HashMap<usize, String>,
    generated: usize,
}

fn element_key(element: &FieldRef) -> usize {
    Arc::as_ptr(element).cast::<()>() as usize
}

impl FieldRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `element`, replacing any earlier registration of it, and
    /// returns its id.
    ///
    /// The id is the element's id, else its name, else a generated
    /// `formguard-field-N` written back to the element.
    pub fn add_field(&mut self, element: FieldRef, rules: CanonicalRuleMap, messages: Messages) -> String {
        let key = element_key(&element);
        let id = match self.elements.get(&key) {
            Some(id) => id.clone(),
            None => self.resolve_id(&element),
        };
        let label = capture_label(&element, &id);

        if let Some(previous) = self.records.get(&id) {
            let previous_key = element_key(&previous.element);
            if previous_key != key {
                tracing::debug!(field = %id, "field id re-registered by another element");
                self.elements.remove(&previous_key);
            }
        }

        self.elements.insert(key, id.clone());
        let record = FieldRecord {
            id: id.clone(),
            element,
            rules,
            messages,
            label,
            state: FieldState::default(),
        };
        // insert() keeps an existing slot's position
        self.records.insert(id.clone(), record);
        id
    }

    fn resolve_id(&mut self, element: &FieldRef) -> String {
        let existing = element
            .id()
            .filter(|id| !id.trim().is_empty())
            .or_else(|| element.name().filter(|name| !name.trim().is_empty()));
        if let Some(id) = existing {
            return id;
        }
        loop {
            self.generated += 1;
            let id = format!("{GENERATED_ID_PREFIX}{}", self.generated);
            if !self.records.contains_key(&id) {
                element.assign_id(&id);
                return id;
            }
        }
    }

    /// Id under which `element` is registered.
    ///
    /// Falls back to the element's own id, then its name, when the handle is
    /// not the registered one.
    pub fn id_of(&self, element: &FieldRef) -> Option<String> {
        if let Some(id) = self.elements.get(&element_key(element)) {
            return Some(id.clone());
        }
        [element.id(), element.name()]
            .into_iter()
            .flatten()
            .find(|candidate| self.records.contains_key(candidate))
    }

    /// Unregisters `element`.
    pub fn remove_field(&mut self, element: &FieldRef) -> Option<FieldRecord> {
        let id = self.id_of(element)?;
        self.remove_by_id(&id)
    }

    /// Unregisters the field with `id`.
    pub fn remove_by_id(&mut self, id: &str) -> Option<FieldRecord> {
        let record = self.records.shift_remove(id)?;
        self.elements.remove(&element_key(&record.element));
        Some(record)
    }

    /// The record of `element`.
    pub fn get_field(&self, element: &FieldRef) -> Option<&FieldRecord> {
        self.id_of(element).and_then(|id| self.records.get(&id))
    }

    /// The record with `id`.
    pub fn get_field_by_id(&self, id: &str) -> Option<&FieldRecord> {
        self.records.get(id)
    }

    /// Mutable record with `id`.
    pub fn get_field_mut(&mut self, id: &str) -> Option<&mut FieldRecord> {
        self.records.get_mut(id)
    }

    /// Adds or replaces one rule of a registered field. A replaced rule keeps
    /// its position.
    pub fn add_rule(&mut self, id: &str, rule: impl Into<String>, config: impl Into<RuleConfig>) -> Result<(), ConfigError> {
        let record = self
            .records
            .get_mut(id)
            .ok_or_else(|| ConfigError::UnknownField(id.to_owned()))?;
        record.rules.insert(rule, config);
        Ok(())
    }

    /// Removes one rule; `false` when the field or rule is unknown.
    pub fn remove_rule(&mut self, id: &str, rule: &str) -> bool {
        self.records
            .get_mut(id)
            .is_some_and(|record| record.rules.remove(rule).is_some())
    }

    /// Applies `patch` and returns the new state.
    pub fn update_state(&mut self, id: &str, patch: StatePatch) -> Option<FieldState> {
        let record = self.records.get_mut(id)?;
        patch.apply(&mut record.state);
        Some(record.state)
    }

    /// Records in registration order.
    pub fn fields(&self) -> impl Iterator<Item = &FieldRecord> {
        self.records.values()
    }

    /// Ids in registration order.
    pub fn ids(&self) -> Vec<String> {
        self.records.keys().cloned().collect()
    }

    /// Number of registered fields.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no field is registered.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drops every record.
    pub fn clear(&mut self) {
        self.records.clear();
        self.elements.clear();
    }
}

/// Label text: the element's label without required markers, else a
/// humanized name or id.
fn capture_label(element: &FieldRef, id: &str) -> String {
    if let Some(label) = element.label() {
        let cleaned = label.trim().trim_end_matches(['*', ':', ' ']).trim();
        if !cleaned.is_empty() {
            return cleaned.to_owned();
        }
    }
    humanize(element.name().as_deref().unwrap_or(id))
}

/// `first_name`, `first-name`, `firstName` -> `First name`.
fn humanize(raw: &str) -> String {
    let mut words = String::with_capacity(raw.len());
    let mut previous_lower = false;
    for c in raw.chars() {
        if matches!(c, '_' | '-' | '.' | '[' | ']') || c.is_whitespace() {
            if !words.ends_with(' ') && !words.is_empty() {
                words.push(' ');
            }
            previous_lower = false;
            continue;
        }
        if c.is_uppercase() && previous_lower {
            words.push(' ');
        }
        previous_lower = c.is_lowercase() || c.is_ascii_digit();
        words.extend(c.to_lowercase());
    }
    let words = words.trim();
    let mut chars = words.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::MemoryField;
    use rstest::rstest;

    fn field(f: MemoryField) -> FieldRef {
        Arc::new(f)
    }

    #[test]
    fn identity_prefers_id_then_name_then_generated() {
        let mut registry = FieldRegistry::new();
        let with_id = field(MemoryField::new().with_id("email").with_name("user_email"));
        let with_name = field(MemoryField::new().with_name("password"));
        let anonymous = field(MemoryField::new());

        assert_eq!(registry.add_field(with_id, CanonicalRuleMap::new(), Messages::new()), "email");
        assert_eq!(registry.add_field(with_name, CanonicalRuleMap::new(), Messages::new()), "password");
        let generated = registry.add_field(Arc::clone(&anonymous), CanonicalRuleMap::new(), Messages::new());
        assert_eq!(generated, "formguard-field-1");
        assert_eq!(anonymous.id().as_deref(), Some("formguard-field-1"));
        assert_eq!(registry.ids(), ["email", "password", "formguard-field-1"]);
    }

    #[test]
    fn re_adding_the_same_element_replaces_in_place() {
        let mut registry = FieldRegistry::new();
        let a = field(MemoryField::new().with_name("a"));
        let b = field(MemoryField::new().with_name("b"));
        registry.add_field(Arc::clone(&a), CanonicalRuleMap::new(), Messages::new());
        registry.add_field(b, CanonicalRuleMap::new(), Messages::new());
        registry.add_field(Arc::clone(&a), CanonicalRuleMap::new().required(), Messages::new());

        assert_eq!(registry.ids(), ["a", "b"]);
        assert!(registry.get_field(&a).unwrap().rules.contains("required"));
    }

    #[test]
    fn remove_falls_back_to_element_identity() {
        let mut registry = FieldRegistry::new();
        registry.add_field(field(MemoryField::new().with_id("email")), CanonicalRuleMap::new(), Messages::new());

        let other_handle = field(MemoryField::new().with_id("email"));
        assert!(registry.remove_field(&other_handle).is_some());
        assert!(registry.is_empty());
        assert!(registry.elements.is_empty());
    }

    #[test]
    fn rules_and_state() {
        let mut registry = FieldRegistry::new();
        let id = registry.add_field(field(MemoryField::new().with_name("age")), CanonicalRuleMap::new(), Messages::new());

        registry.add_rule(&id, "min", 18).unwrap();
        assert!(registry.get_field_by_id(&id).unwrap().rules.is_enabled("min"));
        assert!(registry.remove_rule(&id, "min"));
        assert!(!registry.remove_rule(&id, "min"));
        assert!(matches!(
            registry.add_rule("nope", "min", 1),
            Err(ConfigError::UnknownField(_))
        ));

        let state = registry.update_state(&id, StatePatch::new().touched(true).valid(false)).unwrap();
        assert_eq!(state, FieldState { valid: Some(false), dirty: false, touched: true });
        let state = registry.update_state(&id, StatePatch::reset()).unwrap();
        assert_eq!(state, FieldState::default());
    }

    #[rstest]
    #[case(Some("Email address *"), "email", "Email address")]
    #[case(Some("Password:"), "pw", "Password")]
    #[case(None, "first_name", "First name")]
    #[case(None, "billingZipCode", "Billing zip code")]
    #[case(Some("  "), "confirm-password", "Confirm password")]
    fn labels(#[case] label: Option<&str>, #[case] name: &str, #[case] expected: &str) {
        let mut f = MemoryField::new().with_name(name);
        if let Some(label) = label {
            f = f.with_label(label);
        }
        let mut registry = FieldRegistry::new();
        let id = registry.add_field(field(f), CanonicalRuleMap::new(), Messages::new());
        assert_eq!(registry.get_field_by_id(&id).unwrap().label, expected);
    }
}

//! Host element abstraction and the field registry.
//!
//! The coordinator never touches a document directly: forms and fields are
//! reached through [`FormElement`] and [`FieldElement`]. A browser binding,
//! a server-side renderer or the in-memory [`MemoryForm`] can stand behind
//! them.
//!
//! Selectors understood by [`FormElement::find`] and
//! [`FormElement::select`]:
//!
//! - `#id`
//! - `[attr]` and `[attr=value]` (value optionally quoted)
//! - `*`
//! - a bare word, matching the field name, then the id
//!
//! Comma-separated selectors match if any part matches.

pub mod memory;
pub mod registry;

use std::sync::Arc;

pub use memory::{MemoryField, MemoryForm};
pub use registry::{FieldRecord, FieldRegistry, FieldState, StatePatch};

use crate::value::FieldValue;

/// Shared handle to a host field.
pub type FieldRef = Arc<dyn FieldElement>;

/// A form control as the host exposes it.
pub trait FieldElement: Send + Sync {
    /// The element's id attribute, if set.
    fn id(&self) -> Option<String>;

    /// The element's name attribute, if set.
    fn name(&self) -> Option<String>;

    /// Persists a generated id on the element.
    fn assign_id(&self, id: &str);

    /// Current value.
    fn value(&self) -> FieldValue;

    /// Text of the associated label, if any.
    fn label(&self) -> Option<String>;

    /// Any other attribute, e.g. inline `rules` metadata.
    fn attribute(&self, name: &str) -> Option<String>;

    /// Moves input focus to the element.
    fn focus(&self);
}

/// A form as the host exposes it.
pub trait FormElement: Send + Sync {
    /// Whether the element really is a form.
    fn is_form(&self) -> bool;

    /// Every field of the form, in document order.
    fn fields(&self) -> Vec<FieldRef>;

    /// The first field matching a selector, name or id.
    fn find(&self, key: &str) -> Option<FieldRef> {
        let fields = self.fields();
        if is_selector(key) {
            return fields.into_iter().find(|field| matches_selector(field.as_ref(), key));
        }
        let by_name = fields
            .iter()
            .find(|field| field.name().as_deref() == Some(key))
            .cloned();
        by_name.or_else(|| fields.into_iter().find(|field| field.id().as_deref() == Some(key)))
    }

    /// Every field matching `selector`.
    fn select(&self, selector: &str) -> Vec<FieldRef> {
        self.fields()
            .into_iter()
            .filter(|field| matches_selector(field.as_ref(), selector))
            .collect()
    }
}

/// Whether `key` uses selector syntax rather than a bare name.
pub fn is_selector(key: &str) -> bool {
    key.starts_with('#') || key.starts_with('[') || key.contains(',') || key == "*"
}

/// Whether `field` matches a selector.
pub fn matches_selector(field: &dyn FieldElement, selector: &str) -> bool {
    selector
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .any(|part| matches_simple(field, part))
}

fn matches_simple(field: &dyn FieldElement, selector: &str) -> bool {
    if selector == "*" {
        return true;
    }
    if let Some(id) = selector.strip_prefix('#') {
        return field.id().as_deref() == Some(id);
    }
    if let Some(inner) = selector.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        let (attr, expected) = match inner.split_once('=') {
            Some((attr, expected)) => (attr.trim(), Some(unquote(expected.trim()))),
            None => (inner.trim(), None),
        };
        let actual = match attr {
            "id" => field.id(),
            "name" => field.name(),
            other => field.attribute(other),
        };
        return match (actual, expected) {
            (Some(actual), Some(expected)) => actual == expected,
            (Some(_), None) => true,
            (None, _) => false,
        };
    }
    field.name().as_deref() == Some(selector) || field.id().as_deref() == Some(selector)
}

fn unquote(text: &str) -> &str {
    text.strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .or_else(|| text.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')))
        .unwrap_or(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn sample() -> MemoryForm {
        MemoryForm::new()
            .with_field(MemoryField::new().with_id("email").with_name("user_email"))
            .with_field(
                MemoryField::new()
                    .with_name("password")
                    .with_attribute("data-validate", "true"),
            )
    }

    #[rstest]
    #[case("#email", Some("user_email"))]
    #[case("[name=password]", Some("password"))]
    #[case("[name='password']", Some("password"))]
    #[case("[data-validate]", Some("password"))]
    #[case("password", Some("password"))]
    #[case("email", Some("user_email"))]
    #[case("#nope", None)]
    fn find_by_selector_name_or_id(#[case] key: &str, #[case] name: Option<&str>) {
        let found = sample().find(key);
        assert_eq!(found.and_then(|field| field.name()).as_deref(), name);
    }

    #[test]
    fn select_with_alternatives() {
        let form = sample();
        assert_eq!(form.select("*").len(), 2);
        assert_eq!(form.select("#email, [data-validate]").len(), 2);
        assert_eq!(form.select("[data-validate=false]").len(), 0);
    }
}

//! In-memory form and field elements.
//!
//! Used by tests and by hosts without a document model (server-side form
//! handling, CLIs). Every mutator takes `&self` so a field can be shared with
//! the coordinator and still be edited.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

use crate::field::{FieldElement, FieldRef, FormElement};
use crate::value::FieldValue;

/// A field held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryField {
    id: RwLock<Option<String>>,
    name: Option<String>,
    label: Option<String>,
    value: RwLock<FieldValue>,
    attributes: RwLock<HashMap<String, String>>,
    focus_count: AtomicUsize,
}

impl MemoryField {
    /// A field with no identity and a null value.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the id attribute.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_id(self, id: impl Into<String>) -> Self {
        *self.id.write() = Some(id.into());
        self
    }

    /// Sets the name attribute.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the label text.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Sets the initial value.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_value(self, value: impl Into<FieldValue>) -> Self {
        self.set_value(value);
        self
    }

    /// Sets an attribute.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_attribute(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Replaces the value.
    pub fn set_value(&self, value: impl Into<FieldValue>) {
        *self.value.write() = value.into();
    }

    /// Replaces an attribute.
    pub fn set_attribute(&self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.write().insert(name.into(), value.into());
    }

    /// How many times the field received focus.
    pub fn focus_count(&self) -> usize {
        self.focus_count.load(Ordering::Relaxed)
    }
}

impl FieldElement for MemoryField {
    fn id(&self) -> Option<String> {
        self.id.read().clone()
    }

    fn name(&self) -> Option<String> {
        self.name.clone()
    }

    fn assign_id(&self, id: &str) {
        *self.id.write() = Some(id.to_owned());
    }

    fn value(&self) -> FieldValue {
        self.value.read().clone()
    }

    fn label(&self) -> Option<String> {
        self.label.clone()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.attributes.read().get(name).cloned()
    }

    fn focus(&self) {
        self.focus_count.fetch_add(1, Ordering::Relaxed);
    }
}

/// A form holding [`MemoryField`]s in insertion order.
#[derive(Debug)]
pub struct MemoryForm {
    is_form: bool,
    fields: RwLock<Vec<Arc<MemoryField>>>,
}

impl MemoryForm {
    /// An empty form.
    pub fn new() -> Self {
        Self {
            is_form: true,
            fields: RwLock::new(Vec::new()),
        }
    }

    /// An element that is not a form; coordinators refuse it.
    pub fn not_a_form() -> Self {
        Self {
            is_form: false,
            ..Self::new()
        }
    }

    /// Appends a field.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_field(self, field: impl Into<Arc<MemoryField>>) -> Self {
        self.add(field);
        self
    }

    /// Appends a field to a live form.
    pub fn add(&self, field: impl Into<Arc<MemoryField>>) {
        self.fields.write().push(field.into());
    }

    /// Removes a field from a live form.
    pub fn remove(&self, field: &Arc<MemoryField>) -> bool {
        let mut fields = self.fields.write();
        let before = fields.len();
        fields.retain(|existing| !Arc::ptr_eq(existing, field));
        fields.len() != before
    }
}

impl Default for MemoryForm {
    fn default() -> Self {
        Self::new()
    }
}

impl FormElement for MemoryForm {
    fn is_form(&self) -> bool {
        self.is_form
    }

    fn fields(&self) -> Vec<FieldRef> {
        self.fields
            .read()
            .iter()
            .map(|field| Arc::clone(field) as FieldRef)
            .collect()
    }
}

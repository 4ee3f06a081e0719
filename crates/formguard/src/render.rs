//! Presentation hooks.
//!
//! The coordinator decides *what* to show; a [`Renderer`] decides how the
//! field itself reflects it and an [`ErrorPanel`] keeps a form-level summary.
//! Both default to doing nothing, so hosts implement only what they draw.

use crate::field::FieldRef;

/// Per-field presentation.
///
/// After every single-field validation exactly one of [`show_error`] or
/// [`show_success`] is called.
///
/// [`show_error`]: Renderer::show_error
/// [`show_success`]: Renderer::show_success
pub trait Renderer: Send + Sync {
    /// The field failed with `message`.
    fn show_error(&self, id: &str, field: &FieldRef, message: &str) {
        let _ = (id, field, message);
    }

    /// Removes a previously shown error without marking success. Called
    /// before `reset_field` when a field with an error is reset or removed.
    fn hide_error(&self, id: &str, field: &FieldRef) {
        let _ = (id, field);
    }

    /// The field passed.
    fn show_success(&self, id: &str, field: &FieldRef) {
        let _ = (id, field);
    }

    /// Returns the field to its pristine look.
    fn reset_field(&self, id: &str, field: &FieldRef) {
        let _ = (id, field);
    }
}

/// Renderer that draws nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRenderer;

impl Renderer for NoopRenderer {}

/// Form-level list of current errors.
///
/// Entries are keyed by field id. Clicking an entry is expected to call
/// [`FormValidator::navigate_to`](crate::form::FormValidator::navigate_to).
pub trait ErrorPanel: Send + Sync {
    /// A field became invalid.
    fn add_error(&self, id: &str, label: &str, message: &str) {
        let _ = (id, label, message);
    }

    /// An invalid field's message changed.
    fn update_error(&self, id: &str, message: &str) {
        let _ = (id, message);
    }

    /// A field is no longer invalid.
    fn remove_error(&self, id: &str) {
        let _ = id;
    }

    /// Every entry is gone.
    fn clear_all(&self) {}
}

/// Panel that shows nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPanel;

impl ErrorPanel for NoPanel {}

impl<R: Renderer + ?Sized> Renderer for std::sync::Arc<R> {
    fn show_error(&self, id: &str, field: &FieldRef, message: &str) {
        (**self).show_error(id, field, message);
    }

    fn hide_error(&self, id: &str, field: &FieldRef) {
        (**self).hide_error(id, field);
    }

    fn show_success(&self, id: &str, field: &FieldRef) {
        (**self).show_success(id, field);
    }

    fn reset_field(&self, id: &str, field: &FieldRef) {
        (**self).reset_field(id, field);
    }
}

impl<P: ErrorPanel + ?Sized> ErrorPanel for std::sync::Arc<P> {
    fn add_error(&self, id: &str, label: &str, message: &str) {
        (**self).add_error(id, label, message);
    }

    fn update_error(&self, id: &str, message: &str) {
        (**self).update_error(id, message);
    }

    fn remove_error(&self, id: &str) {
        (**self).remove_error(id);
    }

    fn clear_all(&self) {
        (**self).clear_all();
    }
}

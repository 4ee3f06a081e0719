//! Prelude module for convenient imports.
//!
//! Provides a single `use formguard::prelude::*;` import that brings in the
//! coordinator, the host element traits, the rule-authoring types and the
//! helpers tests usually need.
//!
//! # Examples
//!
//! ```rust,ignore
//! use formguard::prelude::*;
//!
//! let catalog = Arc::new(RuleCatalog::with_builtins());
//! let rules = normalize(&json!(["required", {"minLength": 3}]))?;
//! ```

pub use std::sync::Arc;

pub use serde_json::json;

// ============================================================================
// COORDINATION
// ============================================================================

pub use crate::config::{RemoteConfig, Trigger, ValidatorConfig};
pub use crate::form::{ErrorMap, FieldEvent, FormValidator};
pub use crate::render::{ErrorPanel, NoPanel, NoopRenderer, Renderer};

// ============================================================================
// HOST ELEMENTS
// ============================================================================

pub use crate::field::{
    FieldElement, FieldRef, FieldState, FormElement, MemoryField, MemoryForm,
};

// ============================================================================
// RULES
// ============================================================================

pub use crate::catalog::RuleCatalog;
pub use crate::engine::{Engine, EngineResult, Messages};
pub use crate::rule::{
    CallbackFn, CanonicalRuleMap, FieldResolver, ImageInspector, IntoOutcome, Outcome, Rule,
    RuleCategory, RuleConfig, RuleContext, RuleDefinition, RuleParams, normalize,
};

// ============================================================================
// VALUES AND ERRORS
// ============================================================================

pub use crate::error::{ConfigError, FieldError, FormError, RuleError};
pub use crate::value::{FieldValue, FileInfo};

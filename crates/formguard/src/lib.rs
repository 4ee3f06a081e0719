//! # formguard
//!
//! A declarative, asynchronous form-validation rule engine.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use formguard::prelude::*;
//!
//! let email = Arc::new(MemoryField::new().with_name("email").with_value("bob@"));
//! let form = Arc::new(MemoryForm::new().with_field(email.clone()));
//!
//! let validator = FormValidator::new(form, ValidatorConfig::default())?;
//! validator.add_field(email, &json!({"required": true, "email": true}), None)?;
//!
//! assert!(!validator.validate().await);
//! assert_eq!(validator.error("email").as_deref(), Some("Please enter a valid email address"));
//! ```
//!
//! ## Layers
//!
//! - [`rule`]: rule traits, parameters, the normalizer and the evaluation
//!   context
//! - [`rules`]: the built-in rule families
//! - [`catalog`]: name -> rule registry, named callbacks, remote cache
//! - [`engine`]: one field's rule pipeline
//! - [`field`]: host element traits and the field registry
//! - [`form`]: the [`FormValidator`](form::FormValidator) coordinator
//!
//! ## Declaring Rules
//!
//! Use the [`rule!`] macro for new rules, or implement
//! [`Rule`](rule::Rule) by hand, and register the definition on a
//! [`RuleCatalog`](catalog::RuleCatalog).

// FieldError carries its params map; boxing it buys nothing on the cold
// failure path.
#![allow(clippy::result_large_err)]

#[macro_use]
mod macros;

pub mod catalog;
pub mod config;
pub mod engine;
pub mod error;
pub mod field;
pub mod form;
pub mod message;
pub mod prelude;
pub mod render;
pub mod rule;
pub mod rules;
pub mod value;

pub use catalog::RuleCatalog;
pub use config::{RemoteConfig, Trigger, ValidatorConfig};
pub use engine::{Engine, EngineResult};
pub use error::{ConfigError, FieldError, FormError, RuleError};
pub use form::{ErrorMap, FieldEvent, FormValidator};
pub use rule::{CanonicalRuleMap, Outcome, Rule, RuleDefinition, RuleParams, normalize};
pub use value::{FieldValue, FileInfo};

#[doc(hidden)]
pub mod __private {
    pub use async_trait::async_trait;
}

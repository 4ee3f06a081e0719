//! Rule abstractions.
//!
//! A rule is a named predicate over a field value plus parameters. Every
//! evaluator has the same async signature, so synchronous and asynchronous
//! rules are interchangeable; a synchronous rule simply never suspends.
//!
//! ```rust,ignore
//! use formguard::rule::{Outcome, Rule, RuleContext, RuleParams};
//!
//! struct NoAdmin;
//!
//! #[async_trait::async_trait]
//! impl Rule for NoAdmin {
//!     async fn evaluate(
//!         &self,
//!         value: &FieldValue,
//!         _params: &RuleParams,
//!         _ctx: &RuleContext<'_>,
//!     ) -> Result<Outcome, RuleError> {
//!         Ok((value.as_text() != "admin").into())
//!     }
//! }
//! ```

pub mod context;
pub mod normalize;
pub mod params;

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RuleError;
use crate::value::FieldValue;

pub use context::{FieldResolver, ImageInspector, RuleContext};
pub use normalize::{CanonicalRuleMap, normalize};
pub use params::{RuleConfig, RuleEntry, RuleParams};

// ============================================================================
// OUTCOME
// ============================================================================

/// Result of evaluating one rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The rule is satisfied.
    Valid,
    /// The rule failed, optionally with its own message.
    Invalid(Option<String>),
}

impl Outcome {
    /// A failure carrying a message.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(Some(message.into()))
    }

    /// Whether the rule passed.
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// The failure message, if the rule supplied one.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Valid => None,
            Self::Invalid(message) => message.as_deref(),
        }
    }
}

impl From<bool> for Outcome {
    fn from(valid: bool) -> Self {
        if valid { Self::Valid } else { Self::Invalid(None) }
    }
}

/// A bare string is a failure with that message.
impl From<String> for Outcome {
    fn from(message: String) -> Self {
        Self::Invalid(Some(message))
    }
}

impl From<&str> for Outcome {
    fn from(message: &str) -> Self {
        Self::Invalid(Some(message.to_owned()))
    }
}

/// The `{ valid, message }` shape.
impl From<(bool, Option<String>)> for Outcome {
    fn from((valid, message): (bool, Option<String>)) -> Self {
        if valid { Self::Valid } else { Self::Invalid(message) }
    }
}

/// Conversion of evaluator bodies into the uniform evaluator result.
///
/// Lets built-in rule bodies return a plain `bool`, an [`Outcome`], or a
/// fallible version of either.
pub trait IntoOutcome {
    /// Performs the conversion.
    fn into_outcome(self) -> Result<Outcome, RuleError>;
}

impl IntoOutcome for bool {
    fn into_outcome(self) -> Result<Outcome, RuleError> {
        Ok(self.into())
    }
}

impl IntoOutcome for Outcome {
    fn into_outcome(self) -> Result<Outcome, RuleError> {
        Ok(self)
    }
}

impl<T: IntoOutcome> IntoOutcome for Result<T, RuleError> {
    fn into_outcome(self) -> Result<Outcome, RuleError> {
        self.and_then(IntoOutcome::into_outcome)
    }
}

// ============================================================================
// RULE TRAIT
// ============================================================================

/// An evaluator registered in the [`RuleCatalog`](crate::catalog::RuleCatalog).
#[async_trait]
pub trait Rule: Send + Sync {
    /// Evaluates the rule against `value`.
    ///
    /// Returning `Err` marks the field invalid with a diagnostic message; the
    /// error never reaches the caller of the validation API.
    async fn evaluate(
        &self,
        value: &FieldValue,
        params: &RuleParams,
        ctx: &RuleContext<'_>,
    ) -> Result<Outcome, RuleError>;
}

/// Signature of functions attached to `custom` / `when` rules and of named
/// callbacks used by the `callback` rule.
pub type CallbackFn = Arc<
    dyn Fn(&FieldValue, &RuleParams, &RuleContext<'_>) -> Result<Outcome, RuleError>
        + Send
        + Sync,
>;

/// Wraps a synchronous closure as a [`Rule`].
///
/// The closure is called for every value, empty ones included; the engine's
/// empty exemption still applies before it is reached.
pub struct FnRule<F>(F);

impl<F> FnRule<F>
where
    F: Fn(&FieldValue, &RuleParams, &RuleContext<'_>) -> Result<Outcome, RuleError> + Send + Sync,
{
    /// Wraps `f`.
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> Rule for FnRule<F>
where
    F: Fn(&FieldValue, &RuleParams, &RuleContext<'_>) -> Result<Outcome, RuleError> + Send + Sync,
{
    async fn evaluate(
        &self,
        value: &FieldValue,
        params: &RuleParams,
        ctx: &RuleContext<'_>,
    ) -> Result<Outcome, RuleError> {
        (self.0)(value, params, ctx)
    }
}

// ============================================================================
// RULE DEFINITION
// ============================================================================

/// Grouping used for introspection and documentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleCategory {
    /// Length, character class, substring rules.
    String,
    /// Format rules backed by regexes or checksums.
    Pattern,
    /// Number parsing and bounds.
    Numeric,
    /// Dates, times and ages.
    Date,
    /// File inputs.
    File,
    /// Rules that read another field.
    Comparison,
    /// Multi-value selections.
    Selection,
    /// HTTP round-trips.
    Remote,
    /// Caller-supplied logic.
    Custom,
}

/// A registered rule: evaluator, default message and metadata.
///
/// Immutable once registered; re-registering a name replaces the definition.
#[derive(Clone)]
pub struct RuleDefinition {
    name: Cow<'static, str>,
    category: RuleCategory,
    default_message: Cow<'static, str>,
    evaluates_empty: bool,
    rule: Arc<dyn Rule>,
}

impl RuleDefinition {
    /// Creates a definition.
    pub fn new(
        name: impl Into<Cow<'static, str>>,
        category: RuleCategory,
        default_message: impl Into<Cow<'static, str>>,
        rule: impl Rule + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            category,
            default_message: default_message.into(),
            evaluates_empty: false,
            rule: Arc::new(rule),
        }
    }

    /// Creates a definition from a synchronous closure.
    pub fn from_fn<F>(
        name: impl Into<Cow<'static, str>>,
        category: RuleCategory,
        default_message: impl Into<Cow<'static, str>>,
        f: F,
    ) -> Self
    where
        F: Fn(&FieldValue, &RuleParams, &RuleContext<'_>) -> Result<Outcome, RuleError>
            + Send
            + Sync
            + 'static,
    {
        Self::new(name, category, default_message, FnRule::new(f))
    }

    /// Marks the rule as one that decides requiredness, so the engine still
    /// runs it when the value is empty (`requiredIf`, `fileRequired`, …).
    #[must_use = "builder methods must be chained or built"]
    pub fn evaluating_empty(mut self) -> Self {
        self.evaluates_empty = true;
        self
    }

    /// Rule name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rule category.
    pub fn category(&self) -> RuleCategory {
        self.category
    }

    /// Message used when neither the field nor the outcome supplies one.
    pub fn default_message(&self) -> &str {
        &self.default_message
    }

    /// Whether the rule runs on empty values.
    pub fn evaluates_empty(&self) -> bool {
        self.evaluates_empty
    }

    /// Runs the evaluator.
    pub async fn evaluate(
        &self,
        value: &FieldValue,
        params: &RuleParams,
        ctx: &RuleContext<'_>,
    ) -> Result<Outcome, RuleError> {
        self.rule.evaluate(value, params, ctx).await
    }
}

impl fmt::Debug for RuleDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleDefinition")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("default_message", &self.default_message)
            .field("evaluates_empty", &self.evaluates_empty)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_conversions() {
        assert_eq!(Outcome::from(true), Outcome::Valid);
        assert_eq!(Outcome::from(false), Outcome::Invalid(None));
        assert_eq!(Outcome::from("bad"), Outcome::invalid("bad"));
        assert_eq!(
            Outcome::from((false, Some("nope".to_owned()))).message(),
            Some("nope")
        );
        assert!(Outcome::from((true, Some("ignored".to_owned()))).is_valid());
    }

    #[test]
    fn into_outcome_flattens_results() {
        assert_eq!(true.into_outcome().unwrap(), Outcome::Valid);
        let failed: Result<bool, RuleError> = Err(RuleError::custom("boom"));
        assert!(failed.into_outcome().is_err());
    }

    #[test]
    fn definition_metadata() {
        let def = RuleDefinition::from_fn("even", RuleCategory::Numeric, "Must be even", |_, _, _| {
            Ok(Outcome::Valid)
        });
        assert_eq!(def.name(), "even");
        assert_eq!(def.category(), RuleCategory::Numeric);
        assert!(!def.evaluates_empty());
        assert!(def.evaluating_empty().evaluates_empty());
    }
}

//! The validation engine.
//!
//! Runs one field's rule pipeline:
//!
//! 1. `required`, when declared and enabled, always runs first.
//! 2. An empty value without `required` is valid; only rules that decide
//!    requiredness themselves (`requiredIf`, `fileRequired`, …) still run.
//! 3. The remaining enabled rules run in declaration order and the first
//!    failure ends the run.
//!
//! Evaluator errors and panics become failures; nothing escapes to the caller.

use std::any::Any;
use std::borrow::Cow;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;

use crate::catalog::RuleCatalog;
use crate::error::FieldError;
use crate::message::interpolate;
use crate::rule::{CanonicalRuleMap, Outcome, RuleContext, RuleParams};
use crate::value::FieldValue;

const REQUIRED: &str = "required";

/// Per-field rule → message overrides.
pub type Messages = HashMap<String, String>;

/// Result of validating one field.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineResult {
    /// Every rule passed (or was exempt).
    Valid,
    /// The first failing rule.
    Invalid(FieldError),
}

impl EngineResult {
    /// Whether the field passed.
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// The failure, if any.
    pub fn error(&self) -> Option<&FieldError> {
        match self {
            Self::Valid => None,
            Self::Invalid(error) => Some(error),
        }
    }

    /// The failure message, if any.
    pub fn message(&self) -> Option<&str> {
        self.error().map(|error| error.message.as_ref())
    }
}

/// Evaluates canonical rule maps against values.
#[derive(Debug, Clone)]
pub struct Engine {
    catalog: Arc<RuleCatalog>,
}

impl Engine {
    /// Creates an engine over `catalog`.
    pub fn new(catalog: Arc<RuleCatalog>) -> Self {
        Self { catalog }
    }

    /// The catalog rules are looked up in.
    pub fn catalog(&self) -> &Arc<RuleCatalog> {
        &self.catalog
    }

    /// A bare evaluation context over this engine's catalog.
    pub fn context(&self) -> RuleContext<'_> {
        RuleContext::new(&self.catalog)
    }

    /// Validates `value` against `rules`.
    pub async fn validate_field(
        &self,
        ctx: &RuleContext<'_>,
        value: &FieldValue,
        rules: &CanonicalRuleMap,
        messages: &Messages,
    ) -> EngineResult {
        let required = rules.get(REQUIRED).filter(|entry| entry.enabled);

        if let Some(entry) = required {
            if let Some(error) = self.run(REQUIRED, &entry.params, ctx, value, messages).await {
                return EngineResult::Invalid(error);
            }
        }

        let exempt = value.is_empty() && required.is_none();

        for (name, entry) in rules.iter() {
            if name == REQUIRED || !entry.enabled {
                continue;
            }
            if exempt && !evaluates_empty(ctx, name) {
                continue;
            }
            if let Some(error) = self.run(name, &entry.params, ctx, value, messages).await {
                return EngineResult::Invalid(error);
            }
        }

        EngineResult::Valid
    }

    /// Evaluates a single rule by name, outside any pipeline.
    ///
    /// Unknown rules are valid. Errors and panics become failures carrying
    /// their cause.
    pub async fn evaluate_rule(
        &self,
        name: &str,
        params: &RuleParams,
        value: &FieldValue,
        ctx: &RuleContext<'_>,
    ) -> Outcome {
        let Some(definition) = ctx.catalog.get(name) else {
            tracing::warn!(rule = %name, field = %ctx.field_id, "unknown rule, treating as valid");
            return Outcome::Valid;
        };

        let evaluation = AssertUnwindSafe(definition.evaluate(value, params, ctx)).catch_unwind();
        match evaluation.await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(error)) => {
                tracing::debug!(rule = %name, field = %ctx.field_id, %error, "rule evaluation failed");
                Outcome::invalid(format!("Validation error: {error}"))
            }
            Err(panic) => {
                let cause = panic_message(panic.as_ref());
                tracing::warn!(rule = %name, field = %ctx.field_id, %cause, "rule panicked");
                Outcome::invalid(format!("Validation error: {cause}"))
            }
        }
    }

    async fn run(
        &self,
        name: &str,
        params: &RuleParams,
        ctx: &RuleContext<'_>,
        value: &FieldValue,
        messages: &Messages,
    ) -> Option<FieldError> {
        let outcome = self.evaluate_rule(name, params, value, ctx).await;
        tracing::debug!(rule = %name, field = %ctx.field_id, valid = outcome.is_valid(), "rule evaluated");

        let Outcome::Invalid(own_message) = outcome else {
            return None;
        };

        let template: Cow<'_, str> = if let Some(custom) = messages.get(name) {
            Cow::Borrowed(custom)
        } else if let Some(message) = params.message() {
            Cow::Borrowed(message)
        } else if let Some(message) = own_message {
            Cow::Owned(message)
        } else if let Some(definition) = ctx.catalog.get(name) {
            Cow::Owned(definition.default_message().to_owned())
        } else {
            Cow::Borrowed("Invalid value")
        };

        let message = interpolate(&template, value, params).into_owned();
        let mut error = FieldError::new(name.to_owned(), message).with_params(params.as_map().clone());
        if !ctx.field_id.is_empty() {
            error = error.with_field(ctx.field_id.to_owned());
        }
        Some(error)
    }
}

fn evaluates_empty(ctx: &RuleContext<'_>, name: &str) -> bool {
    ctx.catalog
        .get(name)
        .is_some_and(|definition| definition.evaluates_empty())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "rule panicked".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RuleError;
    use crate::rule::{RuleCategory, RuleDefinition};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn engine() -> Engine {
        Engine::new(Arc::new(RuleCatalog::with_builtins()))
    }

    fn rules(value: serde_json::Value) -> CanonicalRuleMap {
        CanonicalRuleMap::try_from(value).unwrap()
    }

    async fn check(engine: &Engine, value: &str, decl: serde_json::Value) -> EngineResult {
        let ctx = engine.context().with_field("f", "F");
        engine
            .validate_field(&ctx, &FieldValue::from(value), &rules(decl), &Messages::new())
            .await
    }

    #[tokio::test]
    async fn required_runs_first_even_when_declared_last() {
        let engine = engine();
        let result = check(&engine, "", json!(["email", "required"])).await;
        assert_eq!(result.error().unwrap().rule, "required");
    }

    #[tokio::test]
    async fn empty_value_without_required_is_exempt() {
        let engine = engine();
        assert!(check(&engine, "   ", json!(["email", {"minLength": 5}])).await.is_valid());
    }

    #[tokio::test]
    async fn short_circuits_on_first_failure() {
        let engine = engine();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        engine.catalog().register(RuleDefinition::from_fn(
            "counted",
            RuleCategory::Custom,
            "never",
            move |_, _, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Outcome::Valid)
            },
        ));

        let result = check(&engine, "ab", json!(["email", "counted"])).await;
        assert_eq!(result.error().unwrap().rule, "email");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unknown_rule_is_valid() {
        let engine = engine();
        assert!(check(&engine, "x", json!(["doesNotExist"])).await.is_valid());
    }

    #[tokio::test]
    async fn disabled_rule_is_skipped() {
        let engine = engine();
        assert!(check(&engine, "not-an-email", json!({"email": false})).await.is_valid());
    }

    #[tokio::test]
    async fn message_precedence() {
        let engine = engine();
        let ctx = engine.context();
        let decl = rules(json!({"minLength": {"value": 5, "message": "From params {min}"}}));
        let value = FieldValue::from("abc");

        let result = engine.validate_field(&ctx, &value, &decl, &Messages::new()).await;
        assert_eq!(result.message(), Some("From params 5"));

        let custom = Messages::from([("minLength".to_owned(), "Custom {min}".to_owned())]);
        let result = engine.validate_field(&ctx, &value, &decl, &custom).await;
        assert_eq!(result.message(), Some("Custom 5"));

        let plain = rules(json!({"minLength": 5}));
        let result = engine.validate_field(&ctx, &value, &plain, &Messages::new()).await;
        assert_eq!(result.message(), Some("Please enter at least 5 characters"));
    }

    #[tokio::test]
    async fn outcome_message_beats_default() {
        let engine = engine();
        engine.catalog().register(RuleDefinition::from_fn(
            "picky",
            RuleCategory::Custom,
            "Default",
            |_, _, _| Ok(Outcome::invalid("Own message")),
        ));
        let result = check(&engine, "x", json!(["picky"])).await;
        assert_eq!(result.message(), Some("Own message"));
    }

    #[tokio::test]
    async fn errors_and_panics_become_failures() {
        let engine = engine();
        engine.catalog().register(RuleDefinition::from_fn(
            "broken",
            RuleCategory::Custom,
            "Broken",
            |_, _, _| Err(RuleError::custom("backend down")),
        ));
        engine.catalog().register(RuleDefinition::from_fn(
            "panicky",
            RuleCategory::Custom,
            "Panicky",
            |_, _, _| panic!("boom"),
        ));

        let result = check(&engine, "x", json!(["broken"])).await;
        assert_eq!(result.message(), Some("Validation error: backend down"));

        let result = check(&engine, "x", json!(["panicky"])).await;
        assert_eq!(result.message(), Some("Validation error: boom"));
    }

    #[tokio::test]
    async fn failure_carries_field_and_params() {
        let engine = engine();
        let result = check(&engine, "abc", json!({"minLength": 5})).await;
        let error = result.error().unwrap();
        assert_eq!(error.field.as_deref(), Some("f"));
        assert_eq!(error.param("value"), Some(&json!(5)));
    }
}

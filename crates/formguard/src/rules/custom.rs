//! Caller-supplied logic: attached functions, named callbacks and
//! conditional delegation.

use serde_json::Value;

use crate::error::RuleError;
use crate::message::interpolate;
use crate::rule::{Outcome, RuleContext, RuleDefinition, RuleParams};
use crate::rules::is_filled;
use crate::value::{FieldValue, json_to_text};

/// Definitions of this family.
pub fn definitions() -> Vec<RuleDefinition> {
    vec![Custom::definition(), Callback::definition(), When::definition()]
}

rule! {
    /// Runs the function attached to the params with
    /// [`RuleParams::with_handler`].
    pub Custom = "custom" in Custom;
    message "Invalid value";
    evaluate(value, params, ctx) {
        let handler = params
            .handler()
            .ok_or_else(|| RuleError::invalid_param("handler", "custom rule needs an attached function"))?;
        handler(value, params, ctx)?
    }
}

rule! {
    /// Runs a callback registered on the catalog under `name`.
    pub Callback = "callback" in Custom;
    message "Invalid value";
    evaluate(value, params, ctx) {
        let name = params
            .first_str(&["name", "callback", "value"])
            .ok_or_else(|| RuleError::invalid_param("name", "callback rule needs a callback name"))?;
        let callback = ctx
            .catalog
            .callback(&name)
            .ok_or_else(|| RuleError::MissingCallback(name.into_owned()))?;
        callback(value, params, ctx)?
    }
}

rule! {
    /// Runs `rule` with `params` only when the condition holds.
    ///
    /// The condition is a `condition` boolean, an attached function, or a
    /// `field` that must be filled (or equal `equals`, when given). Empty
    /// values reach the delegate only if it decides requiredness.
    pub When = "when" in Custom;
    message "Invalid value";
    evaluate_empty(value, params, ctx) {
        if condition_holds(value, params, ctx)? {
            delegate(value, params, ctx).await?
        } else {
            Outcome::Valid
        }
    }
}

fn condition_holds(value: &FieldValue, params: &RuleParams, ctx: &RuleContext<'_>) -> Result<bool, RuleError> {
    if let Some(condition) = params.bool("condition") {
        return Ok(condition);
    }
    if let Some(handler) = params.handler() {
        return Ok(handler(value, params, ctx)?.is_valid());
    }
    let key = params
        .str("field")
        .ok_or_else(|| RuleError::invalid_param("condition", "when rule needs a condition, function or field"))?;
    let Some(other) = ctx.field(&key) else {
        return Err(RuleError::invalid_param("field", format!("no field matches '{key}'")));
    };
    Ok(match params.get("equals") {
        Some(Value::Array(options)) => {
            let actual = other.as_text();
            options.iter().any(|option| json_to_text(option) == actual)
        }
        Some(expected) => json_to_text(expected) == other.as_text(),
        None => is_filled(&other),
    })
}

async fn delegate(value: &FieldValue, params: &RuleParams, ctx: &RuleContext<'_>) -> Result<Outcome, RuleError> {
    let name = params
        .str("rule")
        .ok_or_else(|| RuleError::invalid_param("rule", "when rule needs a rule to delegate to"))?;
    let Some(definition) = ctx.catalog.get(&name) else {
        tracing::warn!(field = %ctx.field_id, rule = %name, "when rule delegates to an unknown rule, treating as valid");
        return Ok(Outcome::Valid);
    };
    let inner = match params.get("params") {
        Some(Value::Object(map)) => RuleParams::from_map(map.clone()),
        Some(Value::Null) | None => RuleParams::new(),
        Some(scalar) => RuleParams::new().with("value", scalar.clone()),
    };
    if value.is_empty() && !definition.evaluates_empty() {
        return Ok(Outcome::Valid);
    }

    Ok(match definition.evaluate(value, &inner, ctx).await? {
        Outcome::Invalid(None) => {
            let template = inner.message().unwrap_or_else(|| definition.default_message());
            Outcome::invalid(interpolate(template, value, &inner).into_owned())
        }
        outcome => outcome,
    })
}

//! Cross-field and literal comparisons.
//!
//! The operand comes from [`RuleContext::operand`]: a `field` reference, or a
//! `value` that is tried as a field before being taken literally. Ordering
//! compares numerically when both sides are numbers and falls back to string
//! order otherwise.

use std::cmp::Ordering;

use crate::error::RuleError;
use crate::rule::{Outcome, RuleContext, RuleDefinition, RuleParams};
use crate::rules::is_filled;
use crate::value::{FieldValue, json_to_text};

/// Definitions of this family.
pub fn definitions() -> Vec<RuleDefinition> {
    vec![
        Equals::definition(),
        NotEquals::definition(),
        ConfirmedBy::definition(),
        Matches::definition(),
        Different::definition(),
        LessThan::definition(),
        GreaterThan::definition(),
        LessThanOrEqual::definition(),
        GreaterThanOrEqual::definition(),
        RequiredIf::definition(),
        RequiredUnless::definition(),
        RequiredWith::definition(),
        RequiredWithout::definition(),
    ]
}

fn compare(left: &FieldValue, right: &FieldValue) -> Ordering {
    match (left.as_number(), right.as_number()) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        _ => left.as_text().cmp(&right.as_text()),
    }
}

fn same(left: &FieldValue, right: &FieldValue) -> bool {
    left.as_text() == right.as_text()
}

fn ordered(
    value: &FieldValue,
    params: &RuleParams,
    ctx: &RuleContext<'_>,
    accept: fn(Ordering) -> bool,
    phrase: &str,
) -> Result<Outcome, RuleError> {
    let operand = ctx.operand(params)?;
    if accept(compare(value, &operand)) {
        Ok(Outcome::Valid)
    } else {
        Ok(Outcome::invalid(format!("Must be {phrase} {operand}")))
    }
}

/// Whether the condition of `requiredIf` / `requiredUnless` holds.
///
/// With a `field` param, an optional `value` (scalar or list) is the expected
/// content of that field; without one the field merely has to be filled. A
/// bare scalar declaration names the field.
fn condition(params: &RuleParams, ctx: &RuleContext<'_>) -> Result<bool, RuleError> {
    let (key, expected) = match params.str("field") {
        Some(key) => (key, params.value()),
        None => (crate::rules::text(params, &["value"])?, None),
    };
    let other = ctx
        .field(&key)
        .ok_or_else(|| RuleError::invalid_param("field", format!("no field matches '{key}'")))?;

    Ok(match expected {
        None => is_filled(&other),
        Some(serde_json::Value::Array(options)) => {
            let actual = other.as_text();
            options.iter().any(|option| json_to_text(option) == actual)
        }
        Some(expected) => json_to_text(expected) == other.as_text(),
    })
}

/// Fill state of each field listed in `fields` (or `field` / `value`).
fn listed_fields_filled(params: &RuleParams, ctx: &RuleContext<'_>) -> Result<Vec<bool>, RuleError> {
    let keys = crate::rules::list(params, &["fields", "field", "value"])?;
    keys.iter()
        .map(|key| {
            ctx.field(key)
                .map(|other| is_filled(&other))
                .ok_or_else(|| RuleError::invalid_param("fields", format!("no field matches '{key}'")))
        })
        .collect()
}

rule! {
    pub Equals = "equals" in Comparison;
    message "Please enter the expected value";
    evaluate(value, params, ctx) {
        same(value, &ctx.operand(params)?)
    }
}

rule! {
    pub NotEquals = "notEquals" in Comparison;
    message "This value is not allowed";
    evaluate(value, params, ctx) {
        !same(value, &ctx.operand(params)?)
    }
}

rule! {
    /// Confirmation field: must equal the referenced field.
    pub ConfirmedBy = "confirmedBy" in Comparison;
    message "Confirmation does not match";
    evaluate(value, params, ctx) {
        same(value, &ctx.operand(params)?)
    }
}

rule! {
    pub Matches = "matches" in Comparison;
    message "Values do not match";
    evaluate(value, params, ctx) {
        same(value, &ctx.operand(params)?)
    }
}

rule! {
    /// Must differ from another field, which has to exist.
    pub Different = "different" in Comparison;
    message "Must be different from the other field";
    evaluate(value, params, ctx) {
        !same(value, &ctx.required_field(params, &["field", "value"])?)
    }
}

rule! {
    pub LessThan = "lessThan" in Comparison;
    message "Must be less than the compared value";
    evaluate(value, params, ctx) {
        ordered(value, params, ctx, Ordering::is_lt, "less than")?
    }
}

rule! {
    pub GreaterThan = "greaterThan" in Comparison;
    message "Must be greater than the compared value";
    evaluate(value, params, ctx) {
        ordered(value, params, ctx, Ordering::is_gt, "greater than")?
    }
}

rule! {
    pub LessThanOrEqual = "lessThanOrEqual" in Comparison;
    message "Must be at most the compared value";
    evaluate(value, params, ctx) {
        ordered(value, params, ctx, Ordering::is_le, "at most")?
    }
}

rule! {
    pub GreaterThanOrEqual = "greaterThanOrEqual" in Comparison;
    message "Must be at least the compared value";
    evaluate(value, params, ctx) {
        ordered(value, params, ctx, Ordering::is_ge, "at least")?
    }
}

rule! {
    /// Required when another field is filled, or holds the expected value.
    pub RequiredIf = "requiredIf" in Comparison;
    message "This field is required";
    evaluate_empty(value, params, ctx) {
        !condition(params, ctx)? || is_filled(value)
    }
}

rule! {
    /// Required unless another field is filled, or holds the expected value.
    pub RequiredUnless = "requiredUnless" in Comparison;
    message "This field is required";
    evaluate_empty(value, params, ctx) {
        condition(params, ctx)? || is_filled(value)
    }
}

rule! {
    /// Required when any of the listed fields is filled.
    pub RequiredWith = "requiredWith" in Comparison;
    message "This field is required";
    evaluate_empty(value, params, ctx) {
        let others = listed_fields_filled(params, ctx)?;
        !others.iter().any(|filled| *filled) || is_filled(value)
    }
}

rule! {
    /// Required when any of the listed fields is empty.
    pub RequiredWithout = "requiredWithout" in Comparison;
    message "This field is required";
    evaluate_empty(value, params, ctx) {
        let others = listed_fields_filled(params, ctx)?;
        others.iter().all(|filled| *filled) || is_filled(value)
    }
}

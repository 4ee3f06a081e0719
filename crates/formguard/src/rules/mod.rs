//! Built-in rules, one module per family.
//!
//! Every rule here passes on empty input except the ones that decide
//! requiredness (`required`, `requiredIf`, `fileRequired`, …); emptiness is
//! `required`'s job.

pub mod comparison;
pub mod custom;
pub mod date;
pub mod file;
pub mod numeric;
pub mod pattern;
pub mod remote;
pub mod selection;
pub mod string;

use std::borrow::Cow;

use crate::catalog::RuleCatalog;
use crate::error::RuleError;
use crate::rule::RuleParams;
use crate::value::FieldValue;

/// Registers every built-in family into `catalog`.
pub fn register_builtins(catalog: &RuleCatalog) {
    let families = [
        string::definitions(),
        pattern::definitions(),
        numeric::definitions(),
        date::definitions(),
        file::definitions(),
        comparison::definitions(),
        selection::definitions(),
        remote::definitions(),
        custom::definitions(),
    ];
    for definition in families.into_iter().flatten() {
        catalog.register(definition);
    }
}

/// Whether a value counts as provided: `true` for checkboxes, non-empty
/// otherwise.
pub(crate) fn is_filled(value: &FieldValue) -> bool {
    match value {
        FieldValue::Bool(checked) => *checked,
        other => !other.is_empty(),
    }
}

/// A mandatory numeric parameter, looked up under the first present key.
pub(crate) fn number(params: &RuleParams, keys: &[&str]) -> Result<f64, RuleError> {
    params
        .first_f64(keys)
        .ok_or_else(|| RuleError::invalid_param(keys[0], "expected a number"))
}

/// A mandatory non-negative integer parameter.
pub(crate) fn count(params: &RuleParams, keys: &[&str]) -> Result<usize, RuleError> {
    params
        .first_usize(keys)
        .ok_or_else(|| RuleError::invalid_param(keys[0], "expected a non-negative integer"))
}

/// A mandatory string parameter.
pub(crate) fn text<'p>(params: &'p RuleParams, keys: &[&str]) -> Result<Cow<'p, str>, RuleError> {
    params
        .first_str(keys)
        .ok_or_else(|| RuleError::invalid_param(keys[0], "expected a string"))
}

/// A mandatory list parameter.
pub(crate) fn list(params: &RuleParams, keys: &[&str]) -> Result<Vec<String>, RuleError> {
    params
        .first_list(keys)
        .ok_or_else(|| RuleError::invalid_param(keys[0], "expected a list"))
}

#[cfg(test)]
pub(crate) mod test_support {
    use serde_json::Value;

    use crate::catalog::RuleCatalog;
    use crate::rule::{Outcome, RuleContext, RuleParams};
    use crate::value::FieldValue;

    /// Evaluates one built-in rule directly.
    pub async fn eval(rule: &str, value: impl Into<FieldValue>, params: Value) -> Outcome {
        let catalog = RuleCatalog::with_builtins();
        eval_in(&catalog, RuleContext::new(&catalog), rule, value, params).await
    }

    /// Evaluates one rule with a prepared context. Evaluator errors are
    /// reported as failures carrying the error text.
    pub async fn eval_in(
        catalog: &RuleCatalog,
        ctx: RuleContext<'_>,
        rule: &str,
        value: impl Into<FieldValue>,
        params: Value,
    ) -> Outcome {
        let params = match params {
            Value::Object(map) => RuleParams::from_map(map),
            Value::Null => RuleParams::new(),
            scalar => RuleParams::new().with("value", scalar),
        };
        let definition = catalog.get(rule).unwrap_or_else(|| panic!("no rule {rule}"));
        match definition.evaluate(&value.into(), &params, &ctx).await {
            Ok(outcome) => outcome,
            Err(error) => Outcome::invalid(format!("error: {error}")),
        }
    }

    /// Whether the rule passed.
    pub async fn passes(rule: &str, value: impl Into<FieldValue>, params: Value) -> bool {
        eval(rule, value, params).await.is_valid()
    }
}

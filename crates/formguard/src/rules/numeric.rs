//! Numeric rules. Text must be a plain decimal literal to count as a number.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::RuleError;
use crate::rule::{Outcome, RuleDefinition, RuleParams};
use crate::rules::{count, number};
use crate::value::{FieldValue, format_number};

/// Definitions of this family.
pub fn definitions() -> Vec<RuleDefinition> {
    vec![
        Numeric::definition(),
        Integer::definition(),
        Float::definition(),
        Positive::definition(),
        Negative::definition(),
        Min::definition(),
        Max::definition(),
        Range::definition(),
        DivisibleBy::definition(),
        Even::definition(),
        Odd::definition(),
        Decimal::definition(),
        Percentage::definition(),
        Currency::definition(),
    ]
}

static INTEGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?\d+$").expect("integer regex is valid"));

fn integer(value: &FieldValue) -> Option<f64> {
    match value {
        FieldValue::Number(n) if n.is_finite() && n.fract() == 0.0 => Some(*n),
        FieldValue::Text(s) if INTEGER.is_match(s.trim()) => value.as_number(),
        _ => None,
    }
}

rule! {
    pub Numeric = "numeric" in Numeric;
    message "Please enter a valid number";
    evaluate(value, _params, _ctx) {
        value.as_number().is_some()
    }
}

rule! {
    pub Integer = "integer" in Numeric;
    message "Please enter a whole number";
    evaluate(value, _params, _ctx) {
        integer(value).is_some()
    }
}

rule! {
    pub Float = "float" in Numeric;
    message "Please enter a decimal number";
    evaluate(value, _params, _ctx) {
        value.as_number().is_some()
    }
}

rule! {
    pub Positive = "positive" in Numeric;
    message "Please enter a positive number";
    evaluate(value, _params, _ctx) {
        value.as_number().is_some_and(|n| n > 0.0)
    }
}

rule! {
    pub Negative = "negative" in Numeric;
    message "Please enter a negative number";
    evaluate(value, _params, _ctx) {
        value.as_number().is_some_and(|n| n < 0.0)
    }
}

rule! {
    pub Min = "min" in Numeric;
    message "Please enter a value of at least {min}";
    evaluate(value, params, _ctx) {
        let min = number(params, &["min", "value"])?;
        value.as_number().is_some_and(|n| n >= min)
    }
}

rule! {
    pub Max = "max" in Numeric;
    message "Please enter a value no greater than {max}";
    evaluate(value, params, _ctx) {
        let max = number(params, &["max", "value"])?;
        value.as_number().is_some_and(|n| n <= max)
    }
}

rule! {
    pub Range = "range" in Numeric;
    message "Please enter a value between {min} and {max}";
    evaluate(value, params, _ctx) {
        let min = number(params, &["min"])?;
        let max = number(params, &["max"])?;
        value.as_number().is_some_and(|n| (min..=max).contains(&n))
    }
}

rule! {
    pub DivisibleBy = "divisibleBy" in Numeric;
    message "Must be divisible by {divisor}";
    evaluate(value, params, _ctx) {
        let divisor = number(params, &["divisor", "value"])?;
        if divisor == 0.0 {
            return Err(RuleError::invalid_param("divisor", "must not be zero"));
        }
        match value.as_number() {
            Some(n) if (n % divisor).abs() < 1e-9 => Outcome::Valid,
            _ => Outcome::invalid(format!("Must be divisible by {}", format_number(divisor))),
        }
    }
}

rule! {
    pub Even = "even" in Numeric;
    message "Please enter an even number";
    evaluate(value, _params, _ctx) {
        integer(value).is_some_and(|n| n % 2.0 == 0.0)
    }
}

rule! {
    pub Odd = "odd" in Numeric;
    message "Please enter an odd number";
    evaluate(value, _params, _ctx) {
        integer(value).is_some_and(|n| n % 2.0 != 0.0)
    }
}

rule! {
    /// At most `places` fractional digits.
    pub Decimal = "decimal" in Numeric;
    message "Please enter no more than {places} decimal places";
    evaluate(value, params, _ctx) {
        let places = count(params, &["places", "value"])?;
        let text = value.as_text();
        let text = text.trim();
        value.as_number().is_some()
            && !text.contains(['e', 'E'])
            && text.split_once('.').is_none_or(|(_, fraction)| fraction.len() <= places)
    }
}

rule! {
    /// 0..=100, with an optional trailing `%`; `integer: true` forbids fractions.
    pub Percentage = "percentage" in Numeric;
    message "Please enter a percentage between 0 and 100";
    evaluate(value, params, _ctx) {
        let text = value.as_text();
        let stripped = FieldValue::from(text.trim().trim_end_matches('%'));
        let n = if params.bool("integer").unwrap_or(false) {
            integer(&stripped)
        } else {
            stripped.as_number()
        };
        n.is_some_and(|n| (0.0..=100.0).contains(&n))
    }
}

rule! {
    /// Monetary amount. Currency symbols, whitespace and the thousands
    /// `separator` (default `,`) are stripped; `decimals` (default 2) caps
    /// fractional digits; `allowNegative` defaults to `false`.
    pub Currency = "currency" in Numeric;
    message "Please enter a valid amount";
    evaluate(value, params, _ctx) {
        currency(&value.as_text(), params)?
    }
}

fn currency(text: &str, params: &RuleParams) -> Result<bool, RuleError> {
    let symbol = params.str("symbol");
    let separator = params.str("separator").unwrap_or(",".into());
    let decimal = params.str("decimal").unwrap_or(".".into());
    let decimals = params.usize("decimals").unwrap_or(2);
    let allow_negative = params.bool("allowNegative").unwrap_or(false);

    let mut cleaned = text.trim().to_owned();
    if let Some(symbol) = symbol.as_deref().filter(|s| !s.is_empty()) {
        cleaned = cleaned.replace(symbol, "");
    }
    cleaned.retain(|c| !matches!(c, '$' | '€' | '£' | '¥' | '₹') && !c.is_whitespace());
    if !separator.is_empty() && separator != decimal {
        cleaned = cleaned.replace(&*separator, "");
    }
    if decimal != "." {
        cleaned = cleaned.replace(&*decimal, ".");
    }

    let pattern = if decimals == 0 {
        r"^(-)?\d+$".to_owned()
    } else {
        format!(r"^(-)?\d+(?:\.\d{{1,{decimals}}})?$")
    };
    let regex = Regex::new(&pattern)?;
    Ok(match regex.captures(&cleaned) {
        Some(caps) => allow_negative || caps.get(1).is_none(),
        None => false,
    })
}

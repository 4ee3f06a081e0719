//! String rules: presence, length, character classes and substrings.
//!
//! Lengths are counted in characters, not bytes.

use crate::rule::{Outcome, RuleDefinition, RuleParams};
use crate::rules::{count, is_filled, text};
use crate::value::FieldValue;

/// Definitions of this family.
pub fn definitions() -> Vec<RuleDefinition> {
    vec![
        Required::definition(),
        MinLength::definition(),
        MaxLength::definition(),
        ExactLength::definition(),
        RangeLength::definition(),
        Alpha::definition(),
        AlphaNumeric::definition(),
        AlphaSpace::definition(),
        AlphaDash::definition(),
        NoWhitespace::definition(),
        Trimmed::definition(),
        Lowercase::definition(),
        Uppercase::definition(),
        Contains::definition(),
        NotContains::definition(),
        StartsWith::definition(),
        EndsWith::definition(),
        WordCount::definition(),
    ]
}

fn char_count(value: &FieldValue) -> usize {
    value.as_text().chars().count()
}

/// Applies `caseSensitive` (default `true`) to both sides of a substring test.
fn fold(value: &FieldValue, needle: &str, params: &RuleParams) -> (String, String) {
    let haystack = value.as_text().into_owned();
    if params.bool("caseSensitive").unwrap_or(true) {
        (haystack, needle.to_owned())
    } else {
        (haystack.to_lowercase(), needle.to_lowercase())
    }
}

rule! {
    /// The value must be provided: a checked checkbox, a non-empty selection
    /// or file list, or non-blank text.
    pub Required = "required" in String;
    message "This field is required";
    evaluate_empty(value, _params, _ctx) {
        is_filled(value)
    }
}

rule! {
    pub MinLength = "minLength" in String;
    message "Please enter at least {min} characters";
    evaluate(value, params, _ctx) {
        char_count(value) >= count(params, &["min", "value"])?
    }
}

rule! {
    pub MaxLength = "maxLength" in String;
    message "Please enter no more than {max} characters";
    evaluate(value, params, _ctx) {
        char_count(value) <= count(params, &["max", "value"])?
    }
}

rule! {
    pub ExactLength = "exactLength" in String;
    message "Please enter exactly {length} characters";
    evaluate(value, params, _ctx) {
        char_count(value) == count(params, &["length", "value"])?
    }
}

rule! {
    pub RangeLength = "rangeLength" in String;
    message "Please enter between {min} and {max} characters";
    evaluate(value, params, _ctx) {
        let (min, max) = bounds(params)?;
        (min..=max).contains(&char_count(value))
    }
}

/// `{min, max}`, or a `[min, max]` pair in `value`.
fn bounds(params: &RuleParams) -> Result<(usize, usize), crate::error::RuleError> {
    if let Some(pair) = params.list("value").filter(|pair| pair.len() == 2) {
        let parse = |s: &str| s.trim().parse::<usize>().ok();
        if let (Some(min), Some(max)) = (parse(&pair[0]), parse(&pair[1])) {
            return Ok((min, max));
        }
    }
    Ok((count(params, &["min"])?, count(params, &["max"])?))
}

rule! {
    pub Alpha = "alpha" in String;
    message "Please use letters only";
    evaluate(value, _params, _ctx) {
        value.as_text().chars().all(char::is_alphabetic)
    }
}

rule! {
    pub AlphaNumeric = "alphaNumeric" in String;
    message "Please use letters and numbers only";
    evaluate(value, _params, _ctx) {
        value.as_text().chars().all(char::is_alphanumeric)
    }
}

rule! {
    pub AlphaSpace = "alphaSpace" in String;
    message "Please use letters and spaces only";
    evaluate(value, _params, _ctx) {
        value.as_text().chars().all(|c| c.is_alphabetic() || c.is_whitespace())
    }
}

rule! {
    pub AlphaDash = "alphaDash" in String;
    message "Please use letters, numbers, dashes and underscores only";
    evaluate(value, _params, _ctx) {
        value.as_text().chars().all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    }
}

rule! {
    pub NoWhitespace = "noWhitespace" in String;
    message "Spaces are not allowed";
    evaluate(value, _params, _ctx) {
        !value.as_text().chars().any(char::is_whitespace)
    }
}

rule! {
    pub Trimmed = "trimmed" in String;
    message "Please remove leading and trailing spaces";
    evaluate(value, _params, _ctx) {
        let text = value.as_text();
        text.trim() == text
    }
}

rule! {
    pub Lowercase = "lowercase" in String;
    message "Please use lowercase letters only";
    evaluate(value, _params, _ctx) {
        let text = value.as_text();
        text.to_lowercase() == text
    }
}

rule! {
    pub Uppercase = "uppercase" in String;
    message "Please use uppercase letters only";
    evaluate(value, _params, _ctx) {
        let text = value.as_text();
        text.to_uppercase() == text
    }
}

rule! {
    pub Contains = "contains" in String;
    message "Must contain \"{text}\"";
    evaluate(value, params, _ctx) {
        let needle = text(params, &["text", "value"])?;
        let (haystack, needle) = fold(value, &needle, params);
        haystack.contains(&needle)
    }
}

rule! {
    pub NotContains = "notContains" in String;
    message "Must not contain \"{text}\"";
    evaluate(value, params, _ctx) {
        let needle = text(params, &["text", "value"])?;
        let (haystack, needle) = fold(value, &needle, params);
        !haystack.contains(&needle)
    }
}

rule! {
    pub StartsWith = "startsWith" in String;
    message "Must start with \"{text}\"";
    evaluate(value, params, _ctx) {
        let needle = text(params, &["text", "value"])?;
        let (haystack, needle) = fold(value, &needle, params);
        haystack.starts_with(&needle)
    }
}

rule! {
    pub EndsWith = "endsWith" in String;
    message "Must end with \"{text}\"";
    evaluate(value, params, _ctx) {
        let needle = text(params, &["text", "value"])?;
        let (haystack, needle) = fold(value, &needle, params);
        haystack.ends_with(&needle)
    }
}

rule! {
    /// Whitespace-separated word count within `min` / `max`, or exactly `value`.
    pub WordCount = "wordCount" in String;
    message "Please enter the required number of words";
    evaluate(value, params, _ctx) {
        let words = value.as_text().split_whitespace().count();
        if let Some(exact) = params.usize("value") {
            if words != exact {
                return Ok(Outcome::invalid(format!("Please enter exactly {exact} words")));
            }
        }
        if let Some(min) = params.usize("min") {
            if words < min {
                return Ok(Outcome::invalid(format!("Please enter at least {min} words")));
            }
        }
        if let Some(max) = params.usize("max") {
            if words > max {
                return Ok(Outcome::invalid(format!("Please enter no more than {max} words")));
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use crate::rules::test_support::{eval, passes};
    use crate::value::FieldValue;
    use rstest::rstest;
    use serde_json::{Value, json};

    #[rstest]
    #[case(FieldValue::from("x"), true)]
    #[case(FieldValue::from("  "), false)]
    #[case(FieldValue::Null, false)]
    #[case(FieldValue::Bool(true), true)]
    #[case(FieldValue::Bool(false), false)]
    #[case(FieldValue::List(vec![]), false)]
    #[case(FieldValue::Number(0.0), true)]
    #[tokio::test]
    async fn required(#[case] value: FieldValue, #[case] ok: bool) {
        assert_eq!(passes("required", value, Value::Null).await, ok);
    }

    #[rstest]
    #[case("minLength", "héllo", json!(5), true)]
    #[case("minLength", "abc", json!({"min": 4}), false)]
    #[case("maxLength", "abc", json!(3), true)]
    #[case("maxLength", "abcd", json!(3), false)]
    #[case("exactLength", "abcd", json!({"length": 4}), true)]
    #[case("rangeLength", "abc", json!({"min": 2, "max": 4}), true)]
    #[case("rangeLength", "abcde", json!([2, 4]), false)]
    #[tokio::test]
    async fn lengths(#[case] rule: &str, #[case] input: &str, #[case] params: Value, #[case] ok: bool) {
        assert_eq!(passes(rule, input, params).await, ok);
    }

    #[rstest]
    #[case("alpha", "Zoë", true)]
    #[case("alpha", "abc1", false)]
    #[case("alphaNumeric", "abc123", true)]
    #[case("alphaSpace", "Jean Luc", true)]
    #[case("alphaDash", "my_slug-1", true)]
    #[case("alphaDash", "no spaces", false)]
    #[case("noWhitespace", "a b", false)]
    #[case("trimmed", " a", false)]
    #[case("lowercase", "abc", true)]
    #[case("uppercase", "ABc", false)]
    #[tokio::test]
    async fn character_classes(#[case] rule: &str, #[case] input: &str, #[case] ok: bool) {
        assert_eq!(passes(rule, input, Value::Null).await, ok);
    }

    #[rstest]
    #[case("contains", "Hello World", json!("World"), true)]
    #[case("contains", "Hello World", json!({"value": "world"}), false)]
    #[case("contains", "Hello World", json!({"value": "world", "caseSensitive": false}), true)]
    #[case("notContains", "password1", json!("password"), false)]
    #[case("startsWith", "https://x", json!("https://"), true)]
    #[case("endsWith", "report.pdf", json!(".pdf"), true)]
    #[tokio::test]
    async fn substrings(#[case] rule: &str, #[case] input: &str, #[case] params: Value, #[case] ok: bool) {
        assert_eq!(passes(rule, input, params).await, ok);
    }

    #[tokio::test]
    async fn word_count_messages() {
        let outcome = eval("wordCount", "one two", json!({"min": 3})).await;
        assert_eq!(outcome.message(), Some("Please enter at least 3 words"));
        assert!(passes("wordCount", "one two three", json!({"min": 1, "max": 3})).await);
        assert!(!passes("wordCount", "one", json!(2)).await);
    }

    #[tokio::test]
    async fn empty_input_is_not_checked() {
        assert!(passes("minLength", "", json!(5)).await);
        assert!(passes("alpha", "", Value::Null).await);
    }

    #[tokio::test]
    async fn missing_param_is_an_error() {
        let outcome = eval("minLength", "abc", Value::Null).await;
        assert!(outcome.message().unwrap().starts_with("error: invalid parameter 'min'"));
    }
}

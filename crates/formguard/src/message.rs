//! Message template interpolation.
//!
//! `{token}` placeholders resolve, in order, from the field value (`{value}`),
//! the rule's own params by key, and finally a small alias table so scalar
//! declarations like `{ "minLength": 5 }` can still fill `{min}`. Anything
//! left unresolved is kept verbatim.

use std::borrow::Cow;

use crate::rule::RuleParams;
use crate::value::FieldValue;

/// Tokens that fall back to `params.value`.
const VALUE_ALIASES: &[&str] = &["min", "max", "length", "size", "count", "places", "age"];

/// Resolves `{token}` placeholders in `template`.
pub fn interpolate<'t>(template: &'t str, value: &FieldValue, params: &RuleParams) -> Cow<'t, str> {
    if !template.contains('{') {
        return Cow::Borrowed(template);
    }

    let mut out = String::with_capacity(template.len() + 16);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            out.push_str(&rest[open..]);
            return Cow::Owned(out);
        };
        let token = &after[..close];
        match resolve(token, value, params) {
            Some(text) => out.push_str(&text),
            None => {
                out.push('{');
                out.push_str(token);
                out.push('}');
            }
        }
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    Cow::Owned(out)
}

fn resolve(token: &str, value: &FieldValue, params: &RuleParams) -> Option<String> {
    if token.is_empty() || token.contains('{') {
        return None;
    }
    if token == "value" {
        return Some(value.to_string());
    }
    if let Some(text) = params.display(token) {
        return Some(text);
    }
    if VALUE_ALIASES.contains(&token) {
        return params.display("value");
    }
    None
}

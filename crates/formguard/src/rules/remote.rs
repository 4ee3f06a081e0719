//! Remote rules: ask an HTTP endpoint whether the value is acceptable.
//!
//! Parameters of `remote` (`unique` and `exists` accept the same):
//!
//! | key           | meaning                                              |
//! |---------------|------------------------------------------------------|
//! | `url`         | endpoint (a bare scalar declaration is the url)      |
//! | `method`      | `GET` (default) or `POST`                            |
//! | `param`       | name the value is sent under (default: field id)     |
//! | `encoding`    | POST body: `form` (default) or `json`                |
//! | `data`        | extra static key/values sent with the value          |
//! | `headers`     | extra request headers                                |
//! | `responseKey` | boolean key to read from a JSON object response      |
//! | `cache`       | overrides the coordinator's cache switch             |
//! | `timeout`     | milliseconds, overrides the coordinator's timeout    |
//!
//! Responses are read as a bare boolean, `responseKey`, or the first of
//! `valid`, `success`, `error`; a `message` field supplies the failure
//! message. Network errors, timeouts and non-2xx statuses fail open with a
//! warning and are never cached.

use std::time::Duration;

use serde_json::{Map, Value};

use crate::catalog::RemoteKey;
use crate::error::RuleError;
use crate::rule::{Outcome, RuleContext, RuleDefinition, RuleParams};
use crate::value::{FieldValue, json_to_text};

/// Definitions of this family.
pub fn definitions() -> Vec<RuleDefinition> {
    vec![Remote::definition(), Unique::definition(), Exists::definition()]
}

/// What a wrapper rule adds to a plain remote check.
#[derive(Debug, Clone, Copy, Default)]
struct Flavor {
    rule: &'static str,
    response_key: Option<&'static str>,
    send_field: bool,
}

const PLAIN: Flavor = Flavor {
    rule: Remote::NAME,
    response_key: None,
    send_field: false,
};

rule! {
    pub Remote = "remote" in Remote;
    message "This value is not valid";
    evaluate(value, params, ctx) {
        check(value, params, ctx, PLAIN).await?
    }
}

rule! {
    /// `remote` reading `unique` from the response and sending the field name
    /// as `field`.
    pub Unique = "unique" in Remote;
    message "This value is already taken";
    evaluate(value, params, ctx) {
        let flavor = Flavor { rule: Unique::NAME, response_key: Some("unique"), send_field: true };
        check(value, params, ctx, flavor).await?
    }
}

rule! {
    /// `remote` reading `exists` from the response and sending the field name
    /// as `field`.
    pub Exists = "exists" in Remote;
    message "This value does not exist";
    evaluate(value, params, ctx) {
        let flavor = Flavor { rule: Exists::NAME, response_key: Some("exists"), send_field: true };
        check(value, params, ctx, flavor).await?
    }
}

/// Request parameters resolved from rule params and context.
#[derive(Debug)]
struct RemoteRequest {
    url: String,
    post: bool,
    json: bool,
    fields: Map<String, Value>,
    headers: Vec<(String, String)>,
    timeout: Duration,
}

impl RemoteRequest {
    fn build(url: String, value: &str, params: &RuleParams, ctx: &RuleContext<'_>, flavor: Flavor) -> Self {
        let param = params
            .str("param")
            .map(|p| p.into_owned())
            .filter(|p| !p.is_empty())
            .or_else(|| (!ctx.field_id.is_empty()).then(|| ctx.field_id.to_owned()))
            .unwrap_or_else(|| "value".to_owned());

        let mut fields = Map::new();
        fields.insert(param, Value::String(value.to_owned()));
        if flavor.send_field {
            let field = params.str("field").map_or_else(|| ctx.field_id.to_owned(), |f| f.into_owned());
            if !field.is_empty() {
                fields.insert("field".to_owned(), Value::String(field));
            }
        }
        if let Some(Value::Object(data)) = params.get("data") {
            for (key, extra) in data {
                fields.entry(key.clone()).or_insert_with(|| extra.clone());
            }
        }

        let headers = match params.get("headers") {
            Some(Value::Object(map)) => map.iter().map(|(k, v)| (k.clone(), json_to_text(v))).collect(),
            _ => Vec::new(),
        };

        let timeout = params
            .usize("timeout")
            .map_or(ctx.remote.timeout, |ms| Duration::from_millis(ms as u64));

        Self {
            url,
            post: params.str("method").is_some_and(|m| m.eq_ignore_ascii_case("post")),
            json: params.str("encoding").is_some_and(|e| e.eq_ignore_ascii_case("json")),
            fields,
            headers,
            timeout,
        }
    }
}

async fn check(
    value: &FieldValue,
    params: &RuleParams,
    ctx: &RuleContext<'_>,
    flavor: Flavor,
) -> Result<Outcome, RuleError> {
    let Some(url) = params.first_str(&["url", "value"]) else {
        tracing::warn!(field = %ctx.field_id, "remote rule has no url, treating as valid");
        return Ok(Outcome::Valid);
    };
    let text = value.as_text();
    let key = RemoteKey::new(flavor.rule, &*url, &*text);
    let cache = params.bool("cache").unwrap_or(ctx.remote.cache);

    if cache {
        if let Some(outcome) = ctx.catalog.remote_cache().get(&key, ctx.remote.cache_ttl) {
            tracing::debug!(field = %ctx.field_id, url = %key.url, "remote result served from cache");
            return Ok(outcome);
        }
    }

    let request = RemoteRequest::build(url.into_owned(), &text, params, ctx, flavor);
    let response_key = params
        .str("responseKey")
        .map(|k| k.into_owned())
        .or_else(|| flavor.response_key.map(str::to_owned));

    let Some(body) = send(&request, ctx).await else {
        return Ok(Outcome::Valid);
    };
    let outcome = interpret(&body, response_key.as_deref());

    if cache {
        ctx.catalog.remote_cache().insert(key, outcome.clone());
    }
    Ok(outcome)
}

/// Sends the request; `None` means fail open.
#[cfg(feature = "remote")]
async fn send(request: &RemoteRequest, ctx: &RuleContext<'_>) -> Option<Value> {
    let client = ctx.catalog.http_client();

    let builder = if request.post {
        let builder = client.post(&request.url);
        if request.json {
            builder.json(&request.fields)
        } else {
            let pairs: Vec<(&str, String)> = request
                .fields
                .iter()
                .map(|(k, v)| (k.as_str(), json_to_text(v)))
                .collect();
            builder.form(&pairs)
        }
    } else {
        let mut url = match url::Url::parse(&request.url) {
            Ok(url) => url,
            Err(error) => {
                tracing::warn!(field = %ctx.field_id, url = %request.url, %error, "invalid remote url, treating as valid");
                return None;
            }
        };
        url.query_pairs_mut()
            .extend_pairs(request.fields.iter().map(|(k, v)| (k.as_str(), json_to_text(v))));
        client.get(url)
    };
    let builder = request
        .headers
        .iter()
        .fold(builder, |builder, (name, value)| builder.header(name.as_str(), value.as_str()));

    let exchange = async {
        let response = builder.send().await?.error_for_status()?;
        Ok::<Value, reqwest::Error>(response.json().await?)
    };

    match tokio::time::timeout(request.timeout, exchange).await {
        Ok(Ok(body)) => Some(body),
        Ok(Err(error)) => {
            tracing::warn!(field = %ctx.field_id, url = %request.url, %error, "remote validation failed, treating as valid");
            None
        }
        Err(_) => {
            tracing::warn!(
                field = %ctx.field_id,
                url = %request.url,
                timeout_ms = request.timeout.as_millis() as u64,
                "remote validation timed out, treating as valid"
            );
            None
        }
    }
}

#[cfg(not(feature = "remote"))]
async fn send(request: &RemoteRequest, ctx: &RuleContext<'_>) -> Option<Value> {
    tracing::warn!(
        field = %ctx.field_id,
        url = %request.url,
        "built without the `remote` feature, treating as valid"
    );
    None
}

/// Reads an endpoint's verdict.
fn interpret(body: &Value, response_key: Option<&str>) -> Outcome {
    match body {
        Value::Bool(valid) => (*valid).into(),
        Value::String(s) if s.eq_ignore_ascii_case("true") => Outcome::Valid,
        Value::String(s) if s.eq_ignore_ascii_case("false") => Outcome::Invalid(None),
        Value::String(s) if !s.trim().is_empty() => Outcome::invalid(s.clone()),
        Value::Object(map) => {
            let message = map.get("message").and_then(Value::as_str).map(str::to_owned);
            let verdict = response_key
                .and_then(|key| map.get(key))
                .or_else(|| map.get("valid"))
                .or_else(|| map.get("success"))
                .map(truthy);
            match verdict {
                Some(valid) => (valid, message).into(),
                None => match map.get("error") {
                    Some(Value::String(error)) if !error.is_empty() => {
                        Outcome::invalid(message.unwrap_or_else(|| error.clone()))
                    }
                    Some(error) if truthy(error) => Outcome::Invalid(message),
                    _ => Outcome::Valid,
                },
            }
        }
        _ => {
            tracing::debug!(%body, "unrecognized remote response, treating as valid");
            Outcome::Valid
        }
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty() && s != "false" && s != "0",
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(json!(true), None, true)]
    #[case(json!(false), None, false)]
    #[case(json!("true"), None, true)]
    #[case(json!({"valid": true}), None, true)]
    #[case(json!({"valid": false, "message": "Taken"}), None, false)]
    #[case(json!({"success": 1}), None, true)]
    #[case(json!({"error": "Nope"}), None, false)]
    #[case(json!({"error": null}), None, true)]
    #[case(json!({"available": false}), Some("available"), false)]
    #[case(json!({"unique": true, "valid": false}), Some("unique"), true)]
    #[case(json!({"other": 1}), None, true)]
    #[case(json!(42), None, true)]
    fn response_shapes(#[case] body: Value, #[case] key: Option<&str>, #[case] valid: bool) {
        assert_eq!(interpret(&body, key).is_valid(), valid);
    }

    #[test]
    fn response_messages() {
        assert_eq!(
            interpret(&json!({"valid": false, "message": "Taken"}), None).message(),
            Some("Taken")
        );
        assert_eq!(interpret(&json!({"error": "Nope"}), None).message(), Some("Nope"));
        assert_eq!(interpret(&json!("Bad value"), None).message(), Some("Bad value"));
    }
}

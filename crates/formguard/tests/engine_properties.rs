//! Pipeline properties of the engine and normalizer.

use std::sync::atomic::{AtomicUsize, Ordering};

use formguard::message::interpolate;
use formguard::prelude::*;
use proptest::prelude::*;
use rstest::rstest;
use serde_json::{Map, Value};

// ============================================================================
// HELPERS
// ============================================================================

async fn run(rules: Value, value: impl Into<FieldValue>) -> EngineResult {
    let engine = Engine::new(Arc::new(RuleCatalog::with_builtins()));
    let rules = normalize(&rules).unwrap();
    engine
        .validate_field(&engine.context(), &value.into(), &rules, &Messages::new())
        .await
}

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

// ============================================================================
// ORDERING AND EXEMPTION
// ============================================================================

#[tokio::test]
async fn required_runs_first_wherever_declared() {
    let result = run(json!([{"minLength": 3}, "email", "required"]), "").await;
    assert_eq!(result.error().unwrap().rule, "required");
}

#[rstest]
#[case(json!({"minLength": 3, "email": true}), FieldValue::from(""))]
#[case(json!({"minLength": 3, "email": true}), FieldValue::from("   "))]
#[case(json!({"minSelected": 2}), FieldValue::List(vec![]))]
#[case(json!({"required": false, "numeric": true}), FieldValue::Null)]
#[tokio::test]
async fn empty_values_are_exempt_without_required(#[case] rules: Value, #[case] value: FieldValue) {
    assert!(run(rules, value).await.is_valid());
}

#[tokio::test]
async fn requiredness_rules_still_run_on_empty_values() {
    let engine = Engine::new(Arc::new(RuleCatalog::with_builtins()));
    let other = |key: &str| (key == "#newsletter").then_some(FieldValue::Bool(true));
    let ctx = engine.context().with_resolver(&other);
    let rules = normalize(&json!({"requiredIf": "#newsletter", "email": true})).unwrap();

    let result = engine
        .validate_field(&ctx, &FieldValue::from(""), &rules, &Messages::new())
        .await;
    assert_eq!(result.error().unwrap().rule, "requiredIf");
}

#[tokio::test]
async fn first_failure_stops_the_pipeline() {
    let catalog = Arc::new(RuleCatalog::with_builtins());
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    catalog.register(RuleDefinition::from_fn("counted", RuleCategory::Custom, "counted", move |_, _, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Outcome::Valid)
    }));
    let engine = Engine::new(catalog);

    let failing = normalize(&json!(["numeric", "counted"])).unwrap();
    let result = engine
        .validate_field(&engine.context(), &"abc".into(), &failing, &Messages::new())
        .await;
    assert_eq!(result.error().unwrap().rule, "numeric");
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let passing = normalize(&json!(["numeric", "counted"])).unwrap();
    let result = engine
        .validate_field(&engine.context(), &"42".into(), &passing, &Messages::new())
        .await;
    assert!(result.is_valid());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failures_carry_rule_params_and_interpolated_message() {
    let result = run(json!({"minLength": {"min": 5, "message": "At least {min}, got '{value}'"}}), "abc").await;
    let error = result.error().unwrap();
    assert_eq!(error.rule, "minLength");
    assert_eq!(error.message, "At least 5, got 'abc'");
    assert_eq!(error.param("min"), Some(&json!(5)));
}

// ============================================================================
// CHECKSUMS
// ============================================================================

#[rstest]
#[case("creditCard", "4532015112830366", true)]
#[case("creditCard", "4532015112830367", false)]
#[case("iban", "GB29NWBK60161331926819", true)]
#[case("iban", "GB29NWBK60161331926818", false)]
#[tokio::test]
async fn checksum_rules(#[case] rule: &str, #[case] input: &str, #[case] ok: bool) {
    assert_eq!(run(json!([rule]), input).await.is_valid(), ok);
}

// ============================================================================
// INTERPOLATION
// ============================================================================

#[rstest]
#[case("Must be at least {min}", json!({"value": 5}), "Must be at least 5")]
#[case("Between {min} and {max}", json!({"min": 1, "max": 9}), "Between 1 and 9")]
#[case("Hello {nobody}", json!({}), "Hello {nobody}")]
#[case("Got {value}", json!({"value": 3}), "Got abc")]
fn interpolation(#[case] template: &str, #[case] params: Value, #[case] expected: &str) {
    let Value::Object(map) = params else { unreachable!() };
    let params = RuleParams::from_map(map);
    assert_eq!(interpolate(template, &"abc".into(), &params), expected);
}

// ============================================================================
// PROPERTIES
// ============================================================================

fn declarations() -> impl Strategy<Value = Vec<(String, Option<u32>)>> {
    prop::collection::vec(("[a-z]{1,8}", prop::option::of(0u32..100)), 0..8).prop_map(|mut rules| {
        let mut seen = std::collections::HashSet::new();
        rules.retain(|(name, _)| seen.insert(name.clone()));
        rules
    })
}

proptest! {
    #[test]
    fn array_and_object_forms_normalize_alike(rules in declarations()) {
        let array: Vec<Value> = rules
            .iter()
            .map(|(name, param)| match param {
                None => Value::String(name.clone()),
                Some(n) => json!({ name.clone(): n }),
            })
            .collect();
        let object: Map<String, Value> = rules
            .iter()
            .map(|(name, param)| (name.clone(), param.map_or(Value::Bool(true), Value::from)))
            .collect();

        let from_array = normalize(&Value::Array(array)).unwrap();
        let from_object = normalize(&Value::Object(object)).unwrap();
        prop_assert_eq!(&from_array, &from_object);
        prop_assert_eq!(
            from_array.names().collect::<Vec<_>>(),
            rules.iter().map(|(name, _)| name.as_str()).collect::<Vec<_>>()
        );
    }

    #[test]
    fn validation_is_deterministic(text in ".{0,24}", min in 0usize..12, max in 0usize..24) {
        let rules = json!({"minLength": min, "maxLength": max, "alphaNumeric": true});
        let first = block_on(run(rules.clone(), text.as_str()));
        let second = block_on(run(rules, text.as_str()));
        prop_assert_eq!(first, second);
    }

    #[test]
    fn blank_text_without_required_always_passes(spaces in " {0,6}", min in 1usize..10) {
        let result = block_on(run(json!({"minLength": min, "email": true}), spaces.as_str()));
        prop_assert!(result.is_valid());
    }
}

//! End-to-end coordinator scenarios over in-memory forms.

use std::time::Duration;

use formguard::prelude::*;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

// ============================================================================
// HELPERS
// ============================================================================

/// Records every presentation call in order.
#[derive(Debug, Default)]
struct Recorder {
    events: Mutex<Vec<String>>,
}

impl Recorder {
    fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.events.lock())
    }

    fn push(&self, event: String) {
        self.events.lock().push(event);
    }
}

impl Renderer for Recorder {
    fn show_error(&self, id: &str, _field: &FieldRef, message: &str) {
        self.push(format!("error {id}: {message}"));
    }

    fn hide_error(&self, id: &str, _field: &FieldRef) {
        self.push(format!("hide {id}"));
    }

    fn show_success(&self, id: &str, _field: &FieldRef) {
        self.push(format!("success {id}"));
    }

    fn reset_field(&self, id: &str, _field: &FieldRef) {
        self.push(format!("reset {id}"));
    }
}

impl ErrorPanel for Recorder {
    fn add_error(&self, id: &str, label: &str, message: &str) {
        self.push(format!("panel add {id} ({label}): {message}"));
    }

    fn update_error(&self, id: &str, message: &str) {
        self.push(format!("panel update {id}: {message}"));
    }

    fn remove_error(&self, id: &str) {
        self.push(format!("panel remove {id}"));
    }

    fn clear_all(&self) {
        self.push("panel clear".to_owned());
    }
}

fn field(name: &str, value: &str) -> Arc<MemoryField> {
    Arc::new(MemoryField::new().with_name(name).with_value(value))
}

fn form_of(fields: &[&Arc<MemoryField>]) -> Arc<MemoryForm> {
    let form = MemoryForm::new();
    for f in fields {
        form.add(Arc::clone(f));
    }
    Arc::new(form)
}

// ============================================================================
// SIGNUP SCENARIO
// ============================================================================

#[tokio::test]
async fn signup_form_reports_both_failures() {
    let email = field("email", "");
    let password = field("password", "abc");
    let confirm = field("confirmPassword", "xyz");
    let validator = FormValidator::new(form_of(&[&email, &password, &confirm]), ValidatorConfig::default()).unwrap();

    validator
        .add_field(email.clone(), &json!({"required": true, "email": true}), None)
        .unwrap();
    validator
        .add_field(confirm.clone(), &json!({"confirmedBy": {"field": "password"}}), None)
        .unwrap();

    assert!(!validator.validate().await);

    let mut expected = ErrorMap::new();
    expected.insert("email".to_owned(), "This field is required".to_owned());
    expected.insert("confirmPassword".to_owned(), "Confirmation does not match".to_owned());
    assert_eq!(validator.errors(), expected);
    assert!(!validator.is_valid());

    email.set_value("ann@example.com");
    confirm.set_value("abc");
    assert!(validator.validate().await);
    assert!(validator.errors().is_empty());
}

#[tokio::test]
async fn validation_is_idempotent() {
    let email = field("email", "not-an-email");
    let validator = FormValidator::new(form_of(&[&email]), ValidatorConfig::default()).unwrap();
    validator.add_field(email, &json!(["required", "email"]), None).unwrap();

    let first = validator.validate().await;
    let errors = validator.errors();
    let second = validator.validate().await;
    assert_eq!(first, second);
    assert_eq!(validator.errors(), errors);
}

// ============================================================================
// PRESENTATION
// ============================================================================

#[tokio::test]
async fn every_run_shows_exactly_one_outcome() {
    let name = Arc::new(MemoryField::new().with_name("name").with_label("Full name:"));
    let recorder = Arc::new(Recorder::default());
    let validator = FormValidator::new(form_of(&[&name]), ValidatorConfig::default())
        .unwrap()
        .with_renderer(Arc::clone(&recorder))
        .with_panel(Arc::clone(&recorder));
    validator
        .add_field(name.clone(), &json!({"required": true, "minLength": 3}), None)
        .unwrap();

    validator.validate_field("name").await;
    assert_eq!(
        recorder.take(),
        [
            "error name: This field is required",
            "panel add name (Full name): This field is required",
        ]
    );

    name.set_value("Al");
    validator.validate_field("name").await;
    assert_eq!(
        recorder.take(),
        [
            "error name: Please enter at least 3 characters",
            "panel update name: Please enter at least 3 characters",
        ]
    );

    validator.validate_field("name").await;
    assert_eq!(recorder.take(), ["error name: Please enter at least 3 characters"]);

    name.set_value("Alice");
    validator.validate_field("name").await;
    assert_eq!(recorder.take(), ["success name", "panel remove name"]);

    validator.clear_errors();
    assert_eq!(recorder.take(), ["reset name", "panel clear"]);
}

#[tokio::test]
async fn removed_fields_are_reset() {
    let a = field("a", "");
    let recorder = Arc::new(Recorder::default());
    let validator = FormValidator::new(form_of(&[&a]), ValidatorConfig::default())
        .unwrap()
        .with_renderer(Arc::clone(&recorder))
        .with_panel(Arc::clone(&recorder));
    validator.add_field(a.clone(), &json!(["required"]), None).unwrap();
    validator.validate().await;
    recorder.take();

    assert!(validator.remove_field_by_id("a"));
    assert_eq!(recorder.take(), ["hide a", "panel remove a", "reset a"]);
    assert!(validator.validate_field("a").await);
    assert!(recorder.take().is_empty());
}

#[tokio::test]
async fn reset_field_hides_a_shown_error() {
    let a = field("a", "");
    let b = field("b", "ok");
    let recorder = Arc::new(Recorder::default());
    let validator = FormValidator::new(form_of(&[&a, &b]), ValidatorConfig::default())
        .unwrap()
        .with_renderer(Arc::clone(&recorder))
        .with_panel(Arc::clone(&recorder));
    validator.add_field(a.clone(), &json!(["required"]), None).unwrap();
    validator.add_field(b.clone(), &json!(["required"]), None).unwrap();
    validator.validate().await;
    recorder.take();

    assert!(validator.reset_field("a"));
    assert_eq!(recorder.take(), ["hide a", "panel remove a", "reset a"]);

    // no error shown, nothing to hide
    assert!(validator.reset_field("b"));
    assert_eq!(recorder.take(), ["reset b"]);
}

// ============================================================================
// LIVE VALIDATION
// ============================================================================

#[tokio::test(start_paused = true)]
async fn superseded_keystrokes_never_validate() {
    let name = field("name", "J");
    let config = ValidatorConfig::default()
        .live(true)
        .debounce(Duration::from_millis(300));
    let validator = FormValidator::new(form_of(&[&name]), config).unwrap();
    validator.add_field(name.clone(), &json!({"minLength": 3}), None).unwrap();
    let handle: FieldRef = name.clone();

    let (first, second) = tokio::join!(validator.handle_event(&handle, FieldEvent::Input), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        name.set_value("Jo");
        validator.handle_event(&handle, FieldEvent::Input).await
    });

    assert_eq!(first, None);
    assert_eq!(second, Some(false));
    assert_eq!(validator.error("name").as_deref(), Some("Please enter at least 3 characters"));
    assert!(validator.field_state("name").unwrap().dirty);
}

#[tokio::test(start_paused = true)]
async fn blur_cancels_pending_live_run() {
    let name = field("name", "Jo");
    let config = ValidatorConfig::default().live(true);
    let validator = FormValidator::new(form_of(&[&name]), config).unwrap();
    validator.add_field(name.clone(), &json!({"minLength": 3}), None).unwrap();
    let handle: FieldRef = name.clone();

    let (typed, blurred) = tokio::join!(validator.handle_event(&handle, FieldEvent::Input), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        validator.handle_event(&handle, FieldEvent::Blur).await
    });

    assert_eq!(typed, None);
    assert_eq!(blurred, Some(false));
    assert!(validator.field_state("name").unwrap().touched);
}

// ============================================================================
// CUSTOM RULES AND CALLBACKS
// ============================================================================

#[tokio::test]
async fn registered_rules_and_callbacks_are_used() {
    let code = field("code", "abc");
    let validator = FormValidator::new(form_of(&[&code]), ValidatorConfig::default()).unwrap();

    validator.register_rule(RuleDefinition::from_fn(
        "shouting",
        RuleCategory::Custom,
        "Please use capitals",
        |value, _, _| Ok((value.as_text() == value.as_text().to_uppercase()).into()),
    ));
    validator.register_callback(
        "noDigits",
        Arc::new(|value, _, _| Ok((!value.as_text().chars().any(|c| c.is_ascii_digit())).into())),
    );
    validator
        .add_field(code.clone(), &json!({"shouting": true, "callback": "noDigits"}), None)
        .unwrap();

    assert!(!validator.validate().await);
    assert_eq!(validator.error("code").as_deref(), Some("Please use capitals"));

    code.set_value("ABC1");
    assert!(!validator.validate().await);
    assert_eq!(validator.error("code").as_deref(), Some("Invalid value"));

    assert!(validator.unregister_callback("noDigits"));
    assert!(!validator.validate().await);
    assert_eq!(
        validator.error("code").as_deref(),
        Some("Validation error: no callback registered under 'noDigits'")
    );
}

#[tokio::test]
async fn coordinators_sharing_a_catalog_share_rules() {
    let catalog = Arc::new(RuleCatalog::with_builtins());
    let a = field("a", "x");
    let b = field("b", "x");
    let first = FormValidator::new(form_of(&[&a]), ValidatorConfig::default())
        .unwrap()
        .with_catalog(Arc::clone(&catalog));
    let second = FormValidator::new(form_of(&[&b]), ValidatorConfig::default())
        .unwrap()
        .with_catalog(Arc::clone(&catalog));

    first.register_rule(RuleDefinition::from_fn("never", RuleCategory::Custom, "Never", |_, _, _| {
        Ok(Outcome::Invalid(None))
    }));
    second.add_field(b, &json!(["never"]), None).unwrap();
    assert!(!second.validate().await);
    assert_eq!(second.error("b").as_deref(), Some("Never"));

    // unknown to a private catalog: treated as valid
    let isolated = FormValidator::new(form_of(&[&a]), ValidatorConfig::default()).unwrap();
    isolated.add_field(a, &json!(["never"]), None).unwrap();
    assert!(isolated.validate().await);
}

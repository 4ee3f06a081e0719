//! The form coordinator.
//!
//! [`FormValidator`] ties everything together: it owns the field registry
//! and the error map, runs the engine for one field or the whole form, routes
//! host events (blur, input, change, submit) and drives the rendering hooks.
//!
//! ```rust,ignore
//! let form = Arc::new(MemoryForm::new().with_field(email.clone()));
//! let validator = FormValidator::new(form, ValidatorConfig::default())?;
//! validator.add_field(email.clone(), &json!({"required": true, "email": true}), None)?;
//!
//! if !validator.validate().await {
//!     println!("{:?}", validator.errors());
//! }
//! ```
//!
//! No lock is held while rules run. Two overlapping runs on the same field
//! are not cancelled; whichever finishes last decides the error map entry and
//! field state. Live input validation is the exception: each keystroke takes
//! a token, and a run only starts if its token is still the newest once the
//! debounce has elapsed.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use crate::catalog::RuleCatalog;
use crate::config::{Trigger, ValidatorConfig};
use crate::engine::{Engine, EngineResult, Messages};
use crate::error::{ConfigError, FormError};
use crate::field::{FieldRef, FieldRegistry, FieldState, FormElement, StatePatch};
use crate::render::{ErrorPanel, NoPanel, NoopRenderer, Renderer};
use crate::rule::{CallbackFn, CanonicalRuleMap, FieldResolver, RuleConfig, RuleContext, RuleDefinition, normalize};
use crate::value::FieldValue;

/// Field id -> current error message, in the order errors appeared.
pub type ErrorMap = IndexMap<String, String>;

/// Host events routed through [`FormValidator::handle_event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldEvent {
    /// The field lost focus.
    Blur,
    /// A keystroke or paste.
    Input,
    /// The value was committed.
    Change,
}

impl From<FieldEvent> for Trigger {
    fn from(event: FieldEvent) -> Self {
        match event {
            FieldEvent::Blur => Self::Blur,
            FieldEvent::Input => Self::Input,
            FieldEvent::Change => Self::Change,
        }
    }
}

/// Coordinates validation of one form.
pub struct FormValidator {
    form: Arc<dyn FormElement>,
    config: ValidatorConfig,
    engine: Engine,
    registry: RwLock<FieldRegistry>,
    errors: RwLock<ErrorMap>,
    live_tokens: Mutex<HashMap<String, u64>>,
    renderer: Arc<dyn Renderer>,
    panel: Arc<dyn ErrorPanel>,
}

/// Cross-field lookups against the live form.
struct FormResolver<'a> {
    form: &'a dyn FormElement,
    registry: &'a RwLock<FieldRegistry>,
}

impl FieldResolver for FormResolver<'_> {
    fn resolve(&self, key: &str) -> Option<FieldValue> {
        let registered = self
            .registry
            .read()
            .get_field_by_id(key)
            .map(|record| Arc::clone(&record.element));
        registered
            .or_else(|| self.form.find(key))
            .map(|element| element.value())
    }
}

impl FormValidator {
    /// Creates a coordinator over `form` with a private catalog of the
    /// built-in rules. Use [`with_catalog`](Self::with_catalog) to share one.
    pub fn new(form: Arc<dyn FormElement>, config: ValidatorConfig) -> Result<Self, FormError> {
        if !form.is_form() {
            return Err(FormError::NotAForm);
        }
        tracing::info!(
            live = config.live,
            stop_on_first_error = config.stop_on_first_error,
            "form validator created"
        );
        Ok(Self {
            form,
            config,
            engine: Engine::new(Arc::new(RuleCatalog::with_builtins())),
            registry: RwLock::new(FieldRegistry::new()),
            errors: RwLock::new(ErrorMap::new()),
            live_tokens: Mutex::new(HashMap::new()),
            renderer: Arc::new(NoopRenderer),
            panel: Arc::new(NoPanel),
        })
    }

    /// Uses `catalog`; coordinators given the same `Arc` share registrations
    /// and the remote cache.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_catalog(mut self, catalog: Arc<RuleCatalog>) -> Self {
        self.engine = Engine::new(catalog);
        self
    }

    /// Sets the per-field renderer.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_renderer(mut self, renderer: impl Renderer + 'static) -> Self {
        self.renderer = Arc::new(renderer);
        self
    }

    /// Sets the error summary panel.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_panel(mut self, panel: impl ErrorPanel + 'static) -> Self {
        self.panel = Arc::new(panel);
        self
    }

    /// The active configuration.
    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// The catalog rules are looked up in.
    pub fn catalog(&self) -> &Arc<RuleCatalog> {
        self.engine.catalog()
    }

    // ── fields and rules ───────────────────────────────────────────────────

    /// Registers a field from JSON rule and message declarations.
    pub fn add_field(&self, element: FieldRef, rules: &Value, messages: Option<&Value>) -> Result<String, ConfigError> {
        let rules = normalize(rules)?;
        let owner = element.id().or_else(|| element.name()).unwrap_or_default();
        let messages = messages.map_or_else(|| Ok(Messages::new()), |m| parse_messages(m, &owner))?;
        Ok(self.add_field_with(element, rules, messages))
    }

    /// Registers a field whose element is found by selector, name or id.
    pub fn add_field_by_key(&self, key: &str, rules: &Value, messages: Option<&Value>) -> Result<String, ConfigError> {
        let element = self
            .form
            .find(key)
            .ok_or_else(|| ConfigError::UnknownField(key.to_owned()))?;
        self.add_field(element, rules, messages)
    }

    /// Registers a field from an already canonical rule map.
    pub fn add_field_with(&self, element: FieldRef, rules: CanonicalRuleMap, messages: Messages) -> String {
        let id = self.registry.write().add_field(element, rules, messages);
        tracing::debug!(field = %id, "field registered");
        id
    }

    /// Unregisters a field and clears what it shows.
    pub fn remove_field(&self, element: &FieldRef) -> bool {
        let id = self.registry.read().id_of(element);
        id.is_some_and(|id| self.remove_field_by_id(&id))
    }

    /// Unregisters the field with `id`.
    pub fn remove_field_by_id(&self, id: &str) -> bool {
        let (record, had_error) = {
            let mut registry = self.registry.write();
            let Some(record) = registry.remove_by_id(id) else {
                return false;
            };
            let had_error = self.errors.write().shift_remove(id).is_some();
            (record, had_error)
        };
        self.live_tokens.lock().remove(id);
        if had_error {
            self.renderer.hide_error(id, &record.element);
            self.panel.remove_error(id);
        }
        self.renderer.reset_field(id, &record.element);
        tracing::debug!(field = %id, "field removed");
        true
    }

    /// Adds or replaces a rule from its JSON declaration.
    pub fn add_rule(&self, id: &str, rule: &str, config: &Value) -> Result<(), ConfigError> {
        let config = RuleConfig::from_json(config).ok_or_else(|| ConfigError::InvalidRuleConfig {
            rule: rule.to_owned(),
            reason: "null is not a rule configuration".to_owned(),
        })?;
        self.add_rule_with(id, rule, config)
    }

    /// Adds or replaces a rule.
    pub fn add_rule_with(&self, id: &str, rule: &str, config: impl Into<RuleConfig>) -> Result<(), ConfigError> {
        self.registry.write().add_rule(id, rule, config)
    }

    /// Removes a rule; `false` when the field or rule is unknown.
    pub fn remove_rule(&self, id: &str, rule: &str) -> bool {
        self.registry.write().remove_rule(id, rule)
    }

    /// Registers a rule in this coordinator's catalog.
    pub fn register_rule(&self, definition: RuleDefinition) -> Option<RuleDefinition> {
        self.catalog().register(definition)
    }

    /// Registers a named callback for the `callback` rule.
    pub fn register_callback(&self, name: impl Into<String>, callback: CallbackFn) {
        self.catalog().register_callback(name, callback);
    }

    /// Removes a named callback.
    pub fn unregister_callback(&self, name: &str) -> bool {
        self.catalog().unregister_callback(name)
    }

    /// Registers every field carrying an inline `rules` attribute.
    ///
    /// Only fields matching `field_selector` are considered when it is set.
    /// A field with malformed metadata is logged and skipped. Returns the
    /// number of fields registered.
    pub fn discover_fields(&self) -> usize {
        let candidates = match &self.config.field_selector {
            Some(selector) => self.form.select(selector),
            None => self.form.fields(),
        };
        let mut registered = 0;
        for element in candidates {
            let Some(rules) = element.attribute("rules") else {
                continue;
            };
            let owner = element.id().or_else(|| element.name()).unwrap_or_default();
            match inline_declaration(&owner, &rules, element.attribute("messages").as_deref()) {
                Ok((rules, messages)) => {
                    self.add_field_with(element, rules, messages);
                    registered += 1;
                }
                Err(error) => {
                    tracing::warn!(field = %owner, %error, "skipping field with malformed inline rules");
                }
            }
        }
        tracing::debug!(registered, "inline fields discovered");
        registered
    }

    /// Registered field ids in registration order.
    pub fn field_ids(&self) -> Vec<String> {
        self.registry.read().ids()
    }

    /// Lifecycle state of a field.
    pub fn field_state(&self, id: &str) -> Option<FieldState> {
        self.registry.read().get_field_by_id(id).map(|record| record.state)
    }

    /// Label captured when the field was registered.
    pub fn field_label(&self, id: &str) -> Option<String> {
        self.registry.read().get_field_by_id(id).map(|record| record.label.clone())
    }

    // ── validation ─────────────────────────────────────────────────────────

    /// Validates every field in registration order.
    ///
    /// With `stop_on_first_error`, fields after the first invalid one are
    /// not validated.
    #[tracing::instrument(skip(self), fields(fields = self.registry.read().len()))]
    pub async fn validate(&self) -> bool {
        let ids = self.field_ids();
        let mut all_valid = true;
        for id in ids {
            if !self.validate_field(&id).await {
                all_valid = false;
                if self.config.stop_on_first_error {
                    break;
                }
            }
        }
        tracing::debug!(valid = all_valid, "form validated");
        all_valid
    }

    /// Validates one field, updates the error map and state, and renders
    /// the result. Unregistered fields are valid.
    #[tracing::instrument(skip(self))]
    pub async fn validate_field(&self, id: &str) -> bool {
        let Some(record) = self.registry.read().get_field_by_id(id).cloned() else {
            tracing::debug!("field is not registered");
            return true;
        };

        let value = record.element.value();
        let messages = self.messages_for(id, &record.messages);
        let resolver = FormResolver {
            form: self.form.as_ref(),
            registry: &self.registry,
        };
        let ctx = RuleContext::new(self.catalog())
            .with_field(&record.id, &record.label)
            .with_resolver(&resolver)
            .with_remote(&self.config.remote);

        let result = self
            .engine
            .validate_field(&ctx, &value, &record.rules, &messages)
            .await;

        // Lock order everywhere: registry, then errors.
        let previous = {
            let mut registry = self.registry.write();
            if registry
                .update_state(id, StatePatch::new().valid(result.is_valid()))
                .is_none()
            {
                tracing::debug!("field was removed during validation");
                return result.is_valid();
            }
            let mut errors = self.errors.write();
            match &result {
                EngineResult::Valid => errors.shift_remove(id),
                EngineResult::Invalid(error) => errors.insert(id.to_owned(), error.message.to_string()),
            }
        };

        match result {
            EngineResult::Valid => {
                self.renderer.show_success(id, &record.element);
                if previous.is_some() {
                    self.panel.remove_error(id);
                }
                true
            }
            EngineResult::Invalid(error) => {
                let message = error.message.into_owned();
                tracing::debug!(rule = %error.rule, %message, "field invalid");
                self.renderer.show_error(id, &record.element, &message);
                match previous {
                    None => self.panel.add_error(id, &record.label, &message),
                    Some(old) if old != message => self.panel.update_error(id, &message),
                    Some(_) => {}
                }
                false
            }
        }
    }

    /// Validates a field by element handle.
    pub async fn validate_element(&self, element: &FieldRef) -> bool {
        let id = self.registry.read().id_of(element);
        match id {
            Some(id) => self.validate_field(&id).await,
            None => true,
        }
    }

    fn messages_for(&self, id: &str, own: &Messages) -> Messages {
        let mut merged = self.config.messages.get(id).cloned().unwrap_or_default();
        merged.extend(own.iter().map(|(rule, template)| (rule.clone(), template.clone())));
        merged
    }

    // ── errors and state ───────────────────────────────────────────────────

    /// Snapshot of the error map.
    pub fn errors(&self) -> ErrorMap {
        self.errors.read().clone()
    }

    /// Current error of one field.
    pub fn error(&self, id: &str) -> Option<String> {
        self.errors.read().get(id).cloned()
    }

    /// Whether the error map is empty. Does not revalidate.
    pub fn is_valid(&self) -> bool {
        self.errors.read().is_empty()
    }

    /// Empties the error map and resets every field's look and state.
    pub fn clear_errors(&self) {
        let elements: Vec<(String, FieldRef)> = {
            let mut registry = self.registry.write();
            for id in registry.ids() {
                registry.update_state(&id, StatePatch::new().unvalidated());
            }
            self.errors.write().clear();
            registry
                .fields()
                .map(|record| (record.id.clone(), Arc::clone(&record.element)))
                .collect()
        };
        for (id, element) in &elements {
            self.renderer.reset_field(id, element);
        }
        self.panel.clear_all();
    }

    /// Clears one field's error and state.
    pub fn reset_field(&self, id: &str) -> bool {
        let (element, had_error) = {
            let mut registry = self.registry.write();
            if registry.update_state(id, StatePatch::reset()).is_none() {
                return false;
            }
            let had_error = self.errors.write().shift_remove(id).is_some();
            let element = registry.get_field_by_id(id).map(|record| Arc::clone(&record.element));
            (element, had_error)
        };
        self.live_tokens.lock().remove(id);
        if had_error {
            if let Some(element) = &element {
                self.renderer.hide_error(id, element);
            }
            self.panel.remove_error(id);
        }
        if let Some(element) = element {
            self.renderer.reset_field(id, &element);
        }
        true
    }

    /// Clears everything and unregisters every field.
    pub fn destroy(&self) {
        let elements: Vec<(String, FieldRef)> = {
            let mut registry = self.registry.write();
            let elements = registry
                .fields()
                .map(|record| (record.id.clone(), Arc::clone(&record.element)))
                .collect();
            registry.clear();
            self.errors.write().clear();
            elements
        };
        self.live_tokens.lock().clear();
        for (id, element) in &elements {
            self.renderer.reset_field(id, element);
        }
        self.panel.clear_all();
        tracing::info!("form validator destroyed");
    }

    // ── events ─────────────────────────────────────────────────────────────

    /// Routes a host event for `element`.
    ///
    /// Blur marks the field touched, input and change mark it dirty. The
    /// field is validated when the event is one of `validate_on`; input is
    /// validated when `live` is on, after the debounce, and only if no newer
    /// input arrived meanwhile. Returns the validation result, or `None` when
    /// no validation ran.
    pub async fn handle_event(&self, element: &FieldRef, event: FieldEvent) -> Option<bool> {
        let id = self.registry.read().id_of(element)?;
        let patch = match event {
            FieldEvent::Blur => StatePatch::new().touched(true),
            FieldEvent::Input | FieldEvent::Change => StatePatch::new().dirty(true),
        };
        self.registry.write().update_state(&id, patch);

        match event {
            FieldEvent::Input if self.config.live => self.validate_debounced(&id).await,
            FieldEvent::Input => {
                if self.config.triggers_on(Trigger::Input) {
                    Some(self.validate_field(&id).await)
                } else {
                    None
                }
            }
            FieldEvent::Blur | FieldEvent::Change => {
                if self.config.triggers_on(event.into()) {
                    self.supersede_live(&id);
                    Some(self.validate_field(&id).await)
                } else {
                    None
                }
            }
        }
    }

    async fn validate_debounced(&self, id: &str) -> Option<bool> {
        let token = self.supersede_live(id);
        tokio::time::sleep(self.config.debounce).await;
        if self.live_tokens.lock().get(id) != Some(&token) {
            tracing::trace!(field = %id, "live validation superseded");
            return None;
        }
        Some(self.validate_field(id).await)
    }

    /// Invalidates pending live runs of `id` and returns the new token.
    fn supersede_live(&self, id: &str) -> u64 {
        let mut tokens = self.live_tokens.lock();
        let token = tokens.entry(id.to_owned()).or_default();
        *token += 1;
        *token
    }

    /// Handles form submission: validates the form when `submit` is a
    /// trigger and focuses the first invalid field. Returns whether the form
    /// may be submitted.
    #[tracing::instrument(skip(self))]
    pub async fn handle_submit(&self) -> bool {
        let valid = if self.config.triggers_on(Trigger::Submit) {
            self.validate().await
        } else {
            self.is_valid()
        };
        if !valid {
            let first_invalid = {
                let registry = self.registry.read();
                let errors = self.errors.read();
                registry
                    .fields()
                    .find(|record| errors.contains_key(&record.id))
                    .map(|record| Arc::clone(&record.element))
            };
            if let Some(element) = first_invalid {
                element.focus();
            }
        }
        valid
    }

    /// Focuses a field, e.g. from an error panel entry.
    pub fn navigate_to(&self, id: &str) -> bool {
        let element = self
            .registry
            .read()
            .get_field_by_id(id)
            .map(|record| Arc::clone(&record.element));
        element.is_some_and(|element| {
            element.focus();
            true
        })
    }
}

impl std::fmt::Debug for FormValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormValidator")
            .field("config", &self.config)
            .field("fields", &self.registry.read().len())
            .field("errors", &*self.errors.read())
            .finish_non_exhaustive()
    }
}

/// Parses a `{ rule: template }` object.
fn parse_messages(value: &Value, field: &str) -> Result<Messages, ConfigError> {
    let invalid = || ConfigError::InvalidMessages { field: field.to_owned() };
    let map = value.as_object().ok_or_else(invalid)?;
    map.iter()
        .map(|(rule, template)| {
            template
                .as_str()
                .map(|template| (rule.clone(), template.to_owned()))
                .ok_or_else(invalid)
        })
        .collect()
}

/// Parses the inline `rules` / `messages` attributes of a field.
fn inline_declaration(field: &str, rules: &str, messages: Option<&str>) -> Result<(CanonicalRuleMap, Messages), ConfigError> {
    let malformed = |attribute: &str, source| ConfigError::MalformedJson {
        context: format!("{attribute} attribute of field '{field}'"),
        source,
    };
    let rules: Value = serde_json::from_str(rules).map_err(|e| malformed("rules", e))?;
    let rules = normalize(&rules)?;
    let messages = match messages {
        Some(raw) => {
            let value: Value = serde_json::from_str(raw).map_err(|e| malformed("messages", e))?;
            parse_messages(&value, field)?
        }
        None => Messages::new(),
    };
    Ok((rules, messages))
}

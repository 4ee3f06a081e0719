//! The rule catalog.
//!
//! A [`RuleCatalog`] maps rule names to [`RuleDefinition`]s and owns the
//! state rules share: the named-callback registry, the remote-rule cache, the
//! HTTP client and the image inspector. It is injected as `Arc<RuleCatalog>`;
//! coordinators built from the same `Arc` share registrations and cache.
//!
//! All methods take `&self`. Lookups clone the definition out of the lock, so
//! no lock is ever held while a rule is awaited.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::Instant;

use crate::rule::context::HeaderInspector;
use crate::rule::{CallbackFn, ImageInspector, Outcome, RuleDefinition};

/// Default remote cache capacity.
const DEFAULT_CACHE_CAPACITY: u64 = 1000;

// ============================================================================
// REMOTE CACHE
// ============================================================================

/// Cache key of a remote check: rule, endpoint and serialized value.
///
/// `remote`, `unique` and `exists` read different response keys, so one
/// endpoint yields separate entries per rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteKey {
    /// Rule that produced the result.
    pub rule: String,
    /// Endpoint URL as declared.
    pub url: String,
    /// Value as sent.
    pub value: String,
}

impl RemoteKey {
    /// Creates a key.
    pub fn new(rule: impl Into<String>, url: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            rule: rule.into(),
            url: url.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone)]
struct CachedOutcome {
    outcome: Outcome,
    stored_at: Instant,
}

/// Remote results with a freshness window checked on read.
///
/// Capacity is bounded (LRU via `moka`); the TTL comes from the caller's
/// remote settings so coordinators sharing one catalog may use different
/// windows.
pub struct RemoteCache {
    entries: moka::sync::Cache<RemoteKey, CachedOutcome>,
}

impl RemoteCache {
    /// Creates a cache holding at most `capacity` entries.
    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            entries: moka::sync::Cache::builder().max_capacity(capacity).build(),
        }
    }

    /// A fresh cached outcome, if any. Stale entries are evicted.
    pub fn get(&self, key: &RemoteKey, ttl: Duration) -> Option<Outcome> {
        let cached = self.entries.get(key)?;
        if cached.stored_at.elapsed() < ttl {
            Some(cached.outcome)
        } else {
            self.entries.invalidate(key);
            None
        }
    }

    /// Stores an outcome, replacing any previous one.
    pub fn insert(&self, key: RemoteKey, outcome: Outcome) {
        self.entries.insert(
            key,
            CachedOutcome {
                outcome,
                stored_at: Instant::now(),
            },
        );
    }

    /// Number of cached entries.
    pub fn len(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.entries.invalidate_all();
        self.entries.run_pending_tasks();
    }
}

impl Default for RemoteCache {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }
}

impl std::fmt::Debug for RemoteCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteCache")
            .field("entries", &self.entries.entry_count())
            .finish()
    }
}

// ============================================================================
// RULE CATALOG
// ============================================================================

/// Registry of rules and named callbacks.
pub struct RuleCatalog {
    rules: RwLock<HashMap<String, RuleDefinition>>,
    callbacks: RwLock<HashMap<String, CallbackFn>>,
    remote_cache: RemoteCache,
    image_inspector: Arc<dyn ImageInspector>,
    #[cfg(feature = "remote")]
    http: reqwest::Client,
}

impl RuleCatalog {
    /// An empty catalog.
    pub fn new() -> Self {
        Self {
            rules: RwLock::new(HashMap::new()),
            callbacks: RwLock::new(HashMap::new()),
            remote_cache: RemoteCache::default(),
            image_inspector: Arc::new(HeaderInspector),
            #[cfg(feature = "remote")]
            http: reqwest::Client::new(),
        }
    }

    /// A catalog pre-populated with every built-in rule.
    pub fn with_builtins() -> Self {
        let catalog = Self::new();
        crate::rules::register_builtins(&catalog);
        tracing::debug!(rules = catalog.len(), "rule catalog initialized");
        catalog
    }

    /// Replaces the image inspector used by `imageDimensions`.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_image_inspector(mut self, inspector: impl ImageInspector + 'static) -> Self {
        self.image_inspector = Arc::new(inspector);
        self
    }

    /// Uses a preconfigured HTTP client for remote rules.
    #[cfg(feature = "remote")]
    #[must_use = "builder methods must be chained or built"]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    // ── rules ──────────────────────────────────────────────────────────────

    /// Registers a rule under its name. The last registration wins.
    pub fn register(&self, definition: RuleDefinition) -> Option<RuleDefinition> {
        let name = definition.name().to_owned();
        let previous = self.rules.write().insert(name.clone(), definition);
        if previous.is_some() {
            tracing::debug!(rule = %name, "rule definition replaced");
        }
        previous
    }

    /// Removes a rule.
    pub fn unregister(&self, name: &str) -> Option<RuleDefinition> {
        self.rules.write().remove(name)
    }

    /// Looks up a rule.
    pub fn get(&self, name: &str) -> Option<RuleDefinition> {
        self.rules.read().get(name).cloned()
    }

    /// Whether a rule is registered.
    pub fn has(&self, name: &str) -> bool {
        self.rules.read().contains_key(name)
    }

    /// Snapshot of every registered rule.
    pub fn all(&self) -> Vec<RuleDefinition> {
        let mut all: Vec<_> = self.rules.read().values().cloned().collect();
        all.sort_by(|a, b| a.name().cmp(b.name()));
        all
    }

    /// Registered rule names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.rules.read().keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Number of registered rules.
    pub fn len(&self) -> usize {
        self.rules.read().len()
    }

    /// Whether no rule is registered.
    pub fn is_empty(&self) -> bool {
        self.rules.read().is_empty()
    }

    // ── callbacks ──────────────────────────────────────────────────────────

    /// Registers a named callback for the `callback` rule.
    pub fn register_callback(&self, name: impl Into<String>, callback: CallbackFn) {
        self.callbacks.write().insert(name.into(), callback);
    }

    /// Removes a named callback.
    pub fn unregister_callback(&self, name: &str) -> bool {
        self.callbacks.write().remove(name).is_some()
    }

    /// Looks up a named callback.
    pub fn callback(&self, name: &str) -> Option<CallbackFn> {
        self.callbacks.read().get(name).cloned()
    }

    // ── shared rule state ──────────────────────────────────────────────────

    /// The remote-rule cache.
    pub fn remote_cache(&self) -> &RemoteCache {
        &self.remote_cache
    }

    /// Empties the remote-rule cache.
    pub fn clear_remote_cache(&self) {
        self.remote_cache.clear();
    }

    /// The image inspector.
    pub fn image_inspector(&self) -> &dyn ImageInspector {
        self.image_inspector.as_ref()
    }

    /// The HTTP client used by remote rules.
    #[cfg(feature = "remote")]
    pub fn http_client(&self) -> &reqwest::Client {
        &self.http
    }
}

impl Default for RuleCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RuleCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleCatalog")
            .field("rules", &self.len())
            .field("callbacks", &self.callbacks.read().len())
            .field("remote_cache", &self.remote_cache)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::RuleCategory;

    fn always(valid: bool) -> RuleDefinition {
        RuleDefinition::from_fn("probe", RuleCategory::Custom, "Probe failed", move |_, _, _| {
            Ok(valid.into())
        })
    }

    #[test]
    fn last_registration_wins() {
        let catalog = RuleCatalog::new();
        assert!(catalog.register(always(true)).is_none());
        assert!(catalog.register(always(false)).is_some());
        assert!(catalog.has("probe"));
        assert_eq!(catalog.len(), 1);

        assert!(catalog.unregister("probe").is_some());
        assert!(!catalog.has("probe"));
        assert!(catalog.get("probe").is_none());
    }

    #[test]
    fn builtins_cover_every_family() {
        let catalog = RuleCatalog::with_builtins();
        for name in [
            "required",
            "minLength",
            "email",
            "creditCard",
            "numeric",
            "date",
            "fileSize",
            "confirmedBy",
            "inList",
            "remote",
            "custom",
        ] {
            assert!(catalog.has(name), "missing built-in {name}");
        }
        let names = catalog.names();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }

    #[test]
    fn callbacks_round_trip() {
        let catalog = RuleCatalog::new();
        catalog.register_callback("ok", Arc::new(|_, _, _| Ok(Outcome::Valid)));
        assert!(catalog.callback("ok").is_some());
        assert!(catalog.unregister_callback("ok"));
        assert!(!catalog.unregister_callback("ok"));
        assert!(catalog.callback("ok").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn remote_cache_expires_on_read() {
        let cache = RemoteCache::default();
        let key = RemoteKey::new("remote", "/check", "bob");
        cache.insert(key.clone(), Outcome::Valid);

        let ttl = Duration::from_secs(30);
        assert_eq!(cache.get(&key, ttl), Some(Outcome::Valid));

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(cache.get(&key, ttl), None);
    }

    #[test]
    fn remote_cache_clear() {
        let cache = RemoteCache::default();
        cache.insert(RemoteKey::new("remote", "/a", "1"), Outcome::Valid);
        cache.insert(RemoteKey::new("remote", "/a", "2"), Outcome::invalid("taken"));
        assert_eq!(cache.len(), 2);
        cache.clear();
        assert!(cache.is_empty());
    }
}

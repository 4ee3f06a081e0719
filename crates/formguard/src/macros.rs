//! Macros for declaring rules with minimal boilerplate.
//!
//! # Available Macros
//!
//! - [`rule!`]: Declare a rule (unit struct + `Rule` impl + `definition()`)
//!
//! # Examples
//!
//! ```rust,ignore
//! use formguard::rule;
//!
//! rule! {
//!     /// Text must be a palindrome.
//!     pub Palindrome = "palindrome" in Custom;
//!     message "Must read the same both ways";
//!     evaluate(value, _params, _ctx) {
//!         let text = value.as_text();
//!         text.chars().eq(text.chars().rev())
//!     }
//! }
//!
//! catalog.register(Palindrome::definition());
//! ```

// ============================================================================
// RULE MACRO
// ============================================================================

/// Declares a rule: a unit struct, its `NAME` / `DEFAULT_MESSAGE` constants,
/// a `definition()` constructor and the async [`Rule`](crate::rule::Rule)
/// implementation.
///
/// The body may `.await`, may use `?` on `RuleError`, and must evaluate to
/// anything implementing [`IntoOutcome`](crate::rule::IntoOutcome)
/// (`bool` or `Outcome`).
///
/// # Variants
///
/// **`evaluate`**: empty values pass without running the body.
/// ```rust,ignore
/// rule! {
///     pub MinLength = "minLength" in String;
///     message "Please enter at least {min} characters";
///     evaluate(value, params, _ctx) { value.as_text().chars().count() >= min(params)? }
/// }
/// ```
///
/// **`evaluate_empty`**: the body sees every value, empty ones included, and
/// the definition is marked so the engine runs it on empty values. Used by
/// rules that decide requiredness.
/// ```rust,ignore
/// rule! {
///     pub FileRequired = "fileRequired" in File;
///     message "Please select a file";
///     evaluate_empty(value, _params, _ctx) { !value.files().is_empty() }
/// }
/// ```
#[macro_export]
macro_rules! rule {
    // ── Variant 1: empty values pass ─────────────────────────────────────
    (
        $(#[$meta:meta])*
        $vis:vis $name:ident = $rule_name:literal in $category:ident;
        message $message:literal;
        evaluate($value:ident, $params:ident, $ctx:ident) $body:block
    ) => {
        $crate::rule! {
            @define
            $(#[$meta])*
            $vis $name = $rule_name in $category;
            message $message;
            empty false;
            evaluate($value, $params, $ctx) {
                if $value.is_empty() {
                    return Ok($crate::rule::Outcome::Valid);
                }
                $body
            }
        }
    };

    // ── Variant 2: body also sees empty values ───────────────────────────
    (
        $(#[$meta:meta])*
        $vis:vis $name:ident = $rule_name:literal in $category:ident;
        message $message:literal;
        evaluate_empty($value:ident, $params:ident, $ctx:ident) $body:block
    ) => {
        $crate::rule! {
            @define
            $(#[$meta])*
            $vis $name = $rule_name in $category;
            message $message;
            empty true;
            evaluate($value, $params, $ctx) $body
        }
    };

    // ── Internal: struct, constants and Rule impl ────────────────────────
    (
        @define
        $(#[$meta:meta])*
        $vis:vis $name:ident = $rule_name:literal in $category:ident;
        message $message:literal;
        empty $empty:literal;
        evaluate($value:ident, $params:ident, $ctx:ident) $body:block
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
        $vis struct $name;

        impl $name {
            /// Catalog name of this rule.
            pub const NAME: &'static str = $rule_name;
            /// Message used when nothing more specific is configured.
            pub const DEFAULT_MESSAGE: &'static str = $message;

            /// The catalog definition of this rule.
            pub fn definition() -> $crate::rule::RuleDefinition {
                let definition = $crate::rule::RuleDefinition::new(
                    Self::NAME,
                    $crate::rule::RuleCategory::$category,
                    Self::DEFAULT_MESSAGE,
                    Self,
                );
                if $empty { definition.evaluating_empty() } else { definition }
            }
        }

        #[$crate::__private::async_trait]
        impl $crate::rule::Rule for $name {
            #[allow(unused_variables, clippy::unused_async)]
            async fn evaluate(
                &self,
                $value: &$crate::value::FieldValue,
                $params: &$crate::rule::RuleParams,
                $ctx: &$crate::rule::RuleContext<'_>,
            ) -> ::std::result::Result<$crate::rule::Outcome, $crate::error::RuleError> {
                let outcome = $body;
                $crate::rule::IntoOutcome::into_outcome(outcome)
            }
        }
    };
}

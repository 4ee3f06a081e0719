//! Pattern rules: formats backed by regexes, parsers or checksums.

use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::LazyLock;

use base64::Engine as _;
use base64::alphabet;
use base64::engine::{GeneralPurpose, GeneralPurposeConfig};
use regex::{Regex, RegexBuilder};

use crate::error::RuleError;
use crate::rule::{Outcome, RuleDefinition};
use crate::rules::text;

/// Definitions of this family.
pub fn definitions() -> Vec<RuleDefinition> {
    vec![
        Email::definition(),
        Url::definition(),
        Phone::definition(),
        PostalCode::definition(),
        IpAddress::definition(),
        HexColor::definition(),
        Slug::definition(),
        Username::definition(),
        CreditCard::definition(),
        Iban::definition(),
        Uuid::definition(),
        Password::definition(),
        Pattern::definition(),
        Json::definition(),
        Base64::definition(),
    ]
}

// ============================================================================
// STATIC PATTERNS
// ============================================================================

/// Standard alphabet, padding required, non-zero trailing bits accepted.
const BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_allow_trailing_bits(true),
);

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$",
    )
    .expect("email regex is valid")
});

static HEX_COLOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^#(?:[0-9a-fA-F]{3}|[0-9a-fA-F]{4}|[0-9a-fA-F]{6}|[0-9a-fA-F]{8})$")
        .expect("hex color regex is valid")
});

static SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("slug regex is valid"));

static USERNAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9](?:[a-zA-Z0-9._-]*[a-zA-Z0-9])?$").expect("username regex is valid")
});

static PHONE_FORMATS: LazyLock<HashMap<&'static str, Regex>> = LazyLock::new(|| {
    [
        ("international", r"^\+[1-9]\d{6,14}$"),
        ("us", r"^(?:\+?1)?\d{10}$"),
        ("uk", r"^(?:\+44|0)\d{9,10}$"),
        ("generic", r"^\+?\d{7,15}$"),
    ]
    .into_iter()
    .map(|(name, pattern)| (name, Regex::new(pattern).expect("phone regex is valid")))
    .collect()
});

static POSTAL_CODES: LazyLock<HashMap<&'static str, Regex>> = LazyLock::new(|| {
    [
        ("US", r"^\d{5}(?:-\d{4})?$"),
        ("UK", r"^[A-Z]{1,2}\d[A-Z\d]?\s?\d[A-Z]{2}$"),
        ("GB", r"^[A-Z]{1,2}\d[A-Z\d]?\s?\d[A-Z]{2}$"),
        ("CA", r"^[A-Z]\d[A-Z]\s?\d[A-Z]\d$"),
        ("DE", r"^\d{5}$"),
        ("FR", r"^\d{5}$"),
        ("ES", r"^\d{5}$"),
        ("IT", r"^\d{5}$"),
        ("NL", r"^\d{4}\s?[A-Z]{2}$"),
        ("BE", r"^\d{4}$"),
        ("AU", r"^\d{4}$"),
        ("JP", r"^\d{3}-?\d{4}$"),
        ("IN", r"^\d{6}$"),
        ("BR", r"^\d{5}-?\d{3}$"),
        ("generic", r"^[A-Z0-9][A-Z0-9\s-]{1,8}[A-Z0-9]$"),
    ]
    .into_iter()
    .map(|(country, pattern)| {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .expect("postal code regex is valid");
        (country, regex)
    })
    .collect()
});

// ============================================================================
// CHECKSUMS
// ============================================================================

/// Luhn mod-10 check over ASCII digits.
pub fn luhn(digits: &str) -> bool {
    let mut sum = 0;
    for (i, c) in digits.chars().rev().enumerate() {
        let Some(mut d) = c.to_digit(10) else {
            return false;
        };
        if i % 2 == 1 {
            d *= 2;
            if d > 9 {
                d -= 9;
            }
        }
        sum += d;
    }
    sum % 10 == 0
}

/// ISO 13616 IBAN check: structure plus mod-97 == 1.
pub fn iban(input: &str) -> bool {
    let iban: String = input
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    if !(15..=34).contains(&iban.len()) {
        return false;
    }
    let bytes = iban.as_bytes();
    let structure_ok = bytes[..2].iter().all(u8::is_ascii_uppercase)
        && bytes[2..4].iter().all(u8::is_ascii_digit)
        && bytes[4..].iter().all(u8::is_ascii_alphanumeric);
    if !structure_ok {
        return false;
    }

    let rearranged = iban[4..].chars().chain(iban[..4].chars());
    let mut remainder: u32 = 0;
    for c in rearranged {
        let Some(n) = c.to_digit(36) else {
            return false;
        };
        remainder = if n >= 10 {
            (remainder * 100 + n) % 97
        } else {
            (remainder * 10 + n) % 97
        };
    }
    remainder == 1
}

// ============================================================================
// RULES
// ============================================================================

rule! {
    pub Email = "email" in Pattern;
    message "Please enter a valid email address";
    evaluate(value, _params, _ctx) {
        EMAIL.is_match(value.as_text().trim())
    }
}

rule! {
    /// Absolute URL whose scheme is in `protocols` (default `http`, `https`).
    pub Url = "url" in Pattern;
    message "Please enter a valid URL";
    evaluate(value, params, _ctx) {
        let protocols = params
            .first_list(&["protocols", "value"])
            .unwrap_or_else(|| vec!["http".to_owned(), "https".to_owned()]);
        match url::Url::parse(value.as_text().trim()) {
            Ok(parsed) => {
                parsed.has_host()
                    && protocols
                        .iter()
                        .any(|p| p.trim_end_matches(':').eq_ignore_ascii_case(parsed.scheme()))
            }
            Err(_) => false,
        }
    }
}

rule! {
    /// Phone number in the `format` given (`international`, `us`, `uk`,
    /// `generic`); unknown formats fall back to `generic`. Spaces, dots,
    /// dashes and parentheses are ignored.
    pub Phone = "phone" in Pattern;
    message "Please enter a valid phone number";
    evaluate(value, params, _ctx) {
        let format = params
            .first_str(&["format", "value"])
            .map_or_else(|| "generic".to_owned(), |f| f.to_ascii_lowercase());
        let compact: String = value
            .as_text()
            .chars()
            .filter(|c| !matches!(c, ' ' | '.' | '-' | '(' | ')'))
            .collect();
        let regex = PHONE_FORMATS
            .get(format.as_str())
            .or_else(|| PHONE_FORMATS.get("generic"));
        regex.is_some_and(|re| re.is_match(&compact))
    }
}

rule! {
    /// Postal code for `country` (ISO alpha-2); unknown countries use a
    /// generic alphanumeric pattern.
    pub PostalCode = "postalCode" in Pattern;
    message "Please enter a valid postal code";
    evaluate(value, params, _ctx) {
        let country = params
            .first_str(&["country", "value"])
            .map_or_else(|| "generic".to_owned(), |c| c.to_ascii_uppercase());
        let regex = POSTAL_CODES
            .get(country.as_str())
            .or_else(|| POSTAL_CODES.get("generic"));
        regex.is_some_and(|re| re.is_match(value.as_text().trim()))
    }
}

rule! {
    /// IP address; `version` is `v4`, `v6` or `both` (default).
    pub IpAddress = "ipAddress" in Pattern;
    message "Please enter a valid IP address";
    evaluate(value, params, _ctx) {
        let text = value.as_text();
        let text = text.trim();
        let v4 = || text.parse::<Ipv4Addr>().is_ok();
        let v6 = || text.parse::<Ipv6Addr>().is_ok();
        match params.first_str(&["version", "value"]).as_deref() {
            Some("v4" | "4" | "ipv4") => v4(),
            Some("v6" | "6" | "ipv6") => v6(),
            _ => v4() || v6(),
        }
    }
}

rule! {
    pub HexColor = "hexColor" in Pattern;
    message "Please enter a valid hex color";
    evaluate(value, _params, _ctx) {
        HEX_COLOR.is_match(value.as_text().trim())
    }
}

rule! {
    pub Slug = "slug" in Pattern;
    message "Please use lowercase letters, numbers and single dashes only";
    evaluate(value, _params, _ctx) {
        SLUG.is_match(&value.as_text())
    }
}

rule! {
    /// Letters, digits, `.`, `_`, `-`, starting and ending alphanumeric,
    /// `min`..=`max` characters (default 3..=20).
    pub Username = "username" in Pattern;
    message "Please enter a valid username";
    evaluate(value, params, _ctx) {
        let text = value.as_text();
        let min = params.usize("min").unwrap_or(3);
        let max = params.usize("max").unwrap_or(20);
        (min..=max).contains(&text.chars().count()) && USERNAME.is_match(&text)
    }
}

rule! {
    pub CreditCard = "creditCard" in Pattern;
    message "Please enter a valid credit card number";
    evaluate(value, _params, _ctx) {
        let digits: String = value
            .as_text()
            .chars()
            .filter(|c| !matches!(c, ' ' | '-'))
            .collect();
        (13..=19).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit()) && luhn(&digits)
    }
}

rule! {
    pub Iban = "iban" in Pattern;
    message "Please enter a valid IBAN";
    evaluate(value, _params, _ctx) {
        iban(&value.as_text())
    }
}

rule! {
    /// Hyphenated UUID, optionally pinned to a `version`.
    pub Uuid = "uuid" in Pattern;
    message "Please enter a valid UUID";
    evaluate(value, params, _ctx) {
        let text = value.as_text();
        let text = text.trim();
        let parsed = if text.len() == 36 { uuid::Uuid::try_parse(text).ok() } else { None };
        match (parsed, params.first_usize(&["version", "value"])) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(id), Some(version)) => id.get_version_num() == version,
        }
    }
}

rule! {
    /// Password strength. `minLength` defaults to 8; each `require*` flag
    /// defaults to `true`.
    pub Password = "password" in Pattern;
    message "Password is not strong enough";
    evaluate(value, params, _ctx) {
        let text = value.as_text();
        let min = params.usize("minLength").unwrap_or(8);
        let flag = |key: &str| params.bool(key).unwrap_or(true);

        if text.chars().count() < min {
            Outcome::invalid(format!("Password must be at least {min} characters"))
        } else if flag("requireUppercase") && !text.chars().any(char::is_uppercase) {
            Outcome::invalid("Password must contain an uppercase letter")
        } else if flag("requireLowercase") && !text.chars().any(char::is_lowercase) {
            Outcome::invalid("Password must contain a lowercase letter")
        } else if flag("requireNumber") && !text.chars().any(|c| c.is_ascii_digit()) {
            Outcome::invalid("Password must contain a number")
        } else if flag("requireSpecial") && text.chars().all(char::is_alphanumeric) {
            Outcome::invalid("Password must contain a special character")
        } else {
            Outcome::Valid
        }
    }
}

rule! {
    /// Unanchored match against `pattern` with optional `flags`
    /// (`i`, `m`, `s`, `x`; others are ignored).
    pub Pattern = "regex" in Pattern;
    message "Please match the requested format";
    evaluate(value, params, _ctx) {
        let pattern = text(params, &["pattern", "value"])?;
        let flags = params.str("flags").unwrap_or_default();
        let regex = build_regex(&pattern, &flags)?;
        regex.is_match(&value.as_text())
    }
}

fn build_regex(pattern: &str, flags: &str) -> Result<Regex, RuleError> {
    let mut builder = RegexBuilder::new(pattern);
    for flag in flags.chars() {
        match flag {
            'i' => builder.case_insensitive(true),
            'm' => builder.multi_line(true),
            's' => builder.dot_matches_new_line(true),
            'x' => builder.ignore_whitespace(true),
            _ => &mut builder,
        };
    }
    Ok(builder.build()?)
}

rule! {
    pub Json = "json" in Pattern;
    message "Please enter valid JSON";
    evaluate(value, _params, _ctx) {
        serde_json::from_str::<serde_json::Value>(&value.as_text()).is_ok()
    }
}

rule! {
    pub Base64 = "base64" in Pattern;
    message "Please enter valid Base64";
    evaluate(value, _params, _ctx) {
        let compact: String = value.as_text().chars().filter(|c| !c.is_whitespace()).collect();
        BASE64.decode(compact).is_ok()
    }
}

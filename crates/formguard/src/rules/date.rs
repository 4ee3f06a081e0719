//! Date and time rules.
//!
//! Dates parse as ISO 8601 first, then a few common layouts. A `format`
//! param switches to strict token matching (`YYYY`, `YY`, `MM`, `DD`, `HH`,
//! `hh`, `mm`, `ss`, `A`). Comparison references are a literal date, the
//! word `today`, or another field.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime, Weekday};
use regex::Regex;

use crate::error::RuleError;
use crate::rule::{Outcome, RuleContext, RuleDefinition, RuleParams};
use crate::rules::{count, text};

/// Definitions of this family.
pub fn definitions() -> Vec<RuleDefinition> {
    vec![
        Date::definition(),
        Datetime::definition(),
        Time::definition(),
        DateFormat::definition(),
        DateAfter::definition(),
        DateBefore::definition(),
        DateBetween::definition(),
        Age::definition(),
        FutureDate::definition(),
        PastDate::definition(),
        IsWeekday::definition(),
        IsWeekend::definition(),
    ]
}

const DATE_LAYOUTS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y"];

const DATETIME_LAYOUTS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

static TIME_24H: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[01]?\d|2[0-3]):[0-5]\d(?::[0-5]\d)?$").expect("24h regex is valid")
});

static TIME_12H: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:0?[1-9]|1[0-2]):[0-5]\d(?::[0-5]\d)?\s?(?i:am|pm)$").expect("12h regex is valid")
});

// ============================================================================
// PARSING
// ============================================================================

/// A user-facing date format translated for matching and parsing.
struct TokenFormat {
    strict: Regex,
    chrono: String,
    has_time: bool,
}

const TOKENS: &[(&str, &str, &str)] = &[
    ("YYYY", r"\d{4}", "%Y"),
    ("YY", r"\d{2}", "%y"),
    ("MM", r"\d{2}", "%m"),
    ("DD", r"\d{2}", "%d"),
    ("HH", r"\d{2}", "%H"),
    ("hh", r"\d{2}", "%I"),
    ("mm", r"\d{2}", "%M"),
    ("ss", r"\d{2}", "%S"),
    ("A", r"(?:AM|PM|am|pm)", "%p"),
];

impl TokenFormat {
    fn parse(format: &str) -> Result<Self, RuleError> {
        let mut strict = String::from("^");
        let mut chrono = String::new();
        let mut has_time = false;
        let mut rest = format;

        'scan: while let Some(c) = rest.chars().next() {
            for (token, pattern, spec) in TOKENS {
                if let Some(after) = rest.strip_prefix(token) {
                    strict.push_str(pattern);
                    chrono.push_str(spec);
                    has_time |= matches!(*token, "HH" | "hh" | "mm" | "ss" | "A");
                    rest = after;
                    continue 'scan;
                }
            }
            strict.push_str(&regex::escape(&c.to_string()));
            if c == '%' {
                chrono.push_str("%%");
            } else {
                chrono.push(c);
            }
            rest = &rest[c.len_utf8()..];
        }
        strict.push('$');

        Ok(Self {
            strict: Regex::new(&strict)?,
            chrono,
            has_time,
        })
    }

    fn parse_datetime(&self, text: &str) -> Option<NaiveDateTime> {
        if !self.strict.is_match(text) {
            return None;
        }
        if self.has_time {
            NaiveDateTime::parse_from_str(text, &self.chrono).ok()
        } else {
            NaiveDate::parse_from_str(text, &self.chrono)
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        }
    }
}

/// Parses a date leniently (ISO first, then common layouts).
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    DATE_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDate::parse_from_str(text, layout).ok())
        .or_else(|| parse_datetime(text).map(|dt| dt.date()))
}

/// Parses a date-time leniently (RFC 3339, then common layouts).
pub fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.naive_local())
        .ok()
        .or_else(|| {
            DATETIME_LAYOUTS
                .iter()
                .find_map(|layout| NaiveDateTime::parse_from_str(text, layout).ok())
        })
}

/// The field's date, honouring an optional `format` param.
fn field_date(value: &str, params: &RuleParams) -> Result<Option<NaiveDate>, RuleError> {
    match params.str("format") {
        Some(format) => Ok(TokenFormat::parse(&format)?
            .parse_datetime(value.trim())
            .map(|dt| dt.date())),
        None => Ok(parse_date(value)),
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// A comparison date and how to name it in messages.
///
/// `Ok(None)` means the reference is another field that is empty or not a
/// date; there is nothing to compare against.
fn reference(
    params: &RuleParams,
    keys: &[&str],
    ctx: &RuleContext<'_>,
) -> Result<Option<(NaiveDate, String)>, RuleError> {
    let raw = text(params, keys)?;
    if raw.eq_ignore_ascii_case("today") {
        return Ok(Some((today(), "today".to_owned())));
    }
    let selector = raw.starts_with('#') || raw.starts_with('[');
    if let Some(other) = ctx.field(&raw) {
        let date = parse_date(&other.as_text());
        return Ok(date.map(|d| (d, d.format("%Y-%m-%d").to_string())));
    }
    if selector {
        return Err(RuleError::invalid_param(keys[0], format!("no field matches '{raw}'")));
    }
    parse_date(&raw)
        .map(|d| Some((d, raw.clone().into_owned())))
        .ok_or_else(|| RuleError::invalid_param(keys[0], format!("'{raw}' is not a date")))
}

// ============================================================================
// RULES
// ============================================================================

rule! {
    pub Date = "date" in Date;
    message "Please enter a valid date";
    evaluate(value, params, _ctx) {
        field_date(&value.as_text(), params)?.is_some()
    }
}

rule! {
    pub Datetime = "datetime" in Date;
    message "Please enter a valid date and time";
    evaluate(value, params, _ctx) {
        let text = value.as_text();
        match params.str("format") {
            Some(format) => TokenFormat::parse(&format)?.parse_datetime(text.trim()).is_some(),
            None => parse_datetime(&text).is_some(),
        }
    }
}

rule! {
    /// `format` is `24h` (default) or `12h`.
    pub Time = "time" in Date;
    message "Please enter a valid time";
    evaluate(value, params, _ctx) {
        let text = value.as_text();
        let text = text.trim();
        match params.first_str(&["format", "value"]).as_deref() {
            Some("12h" | "12") => TIME_12H.is_match(text),
            _ => TIME_24H.is_match(text),
        }
    }
}

rule! {
    /// The text must match `format` token for token and be a real date.
    pub DateFormat = "dateFormat" in Date;
    message "Please enter a date in the {format} format";
    evaluate(value, params, _ctx) {
        let format = text(params, &["format", "value"])?;
        match TokenFormat::parse(&format)?.parse_datetime(value.as_text().trim()) {
            Some(_) => Outcome::Valid,
            None => Outcome::invalid(format!("Please enter a date in the {format} format")),
        }
    }
}

rule! {
    pub DateAfter = "dateAfter" in Date;
    message "Please enter a later date";
    evaluate(value, params, ctx) {
        let Some(date) = field_date(&value.as_text(), params)? else {
            return Ok(Outcome::invalid("Please enter a valid date"));
        };
        match reference(params, &["date", "value"], ctx)? {
            Some((limit, label)) if date <= limit => {
                Outcome::invalid(format!("Please enter a date after {label}"))
            }
            _ => Outcome::Valid,
        }
    }
}

rule! {
    pub DateBefore = "dateBefore" in Date;
    message "Please enter an earlier date";
    evaluate(value, params, ctx) {
        let Some(date) = field_date(&value.as_text(), params)? else {
            return Ok(Outcome::invalid("Please enter a valid date"));
        };
        match reference(params, &["date", "value"], ctx)? {
            Some((limit, label)) if date >= limit => {
                Outcome::invalid(format!("Please enter a date before {label}"))
            }
            _ => Outcome::Valid,
        }
    }
}

rule! {
    /// Inclusive range between `start` and `end`.
    pub DateBetween = "dateBetween" in Date;
    message "Please enter a date within the allowed range";
    evaluate(value, params, ctx) {
        let Some(date) = field_date(&value.as_text(), params)? else {
            return Ok(Outcome::invalid("Please enter a valid date"));
        };
        let start = reference(params, &["start", "min"], ctx)?;
        let end = reference(params, &["end", "max"], ctx)?;
        match (start, end) {
            (Some((start, from)), Some((end, to))) if date < start || date > end => {
                Outcome::invalid(format!("Please enter a date between {from} and {to}"))
            }
            _ => Outcome::Valid,
        }
    }
}

rule! {
    /// Year-accurate age computed from a birth date: at least `min`, and at
    /// most `max` when given.
    pub Age = "age" in Date;
    message "You must be at least {min} years old";
    evaluate(value, params, _ctx) {
        let Some(birth) = field_date(&value.as_text(), params)? else {
            return Ok(Outcome::invalid("Please enter a valid date"));
        };
        let min = count(params, &["min", "value"])?;
        let age = today().years_since(birth).unwrap_or(0) as usize;
        if age < min {
            Outcome::Invalid(None)
        } else if params.usize("max").is_some_and(|max| age > max) {
            Outcome::invalid("You must be at most {max} years old")
        } else {
            Outcome::Valid
        }
    }
}

rule! {
    pub FutureDate = "futureDate" in Date;
    message "Please enter a date in the future";
    evaluate(value, params, _ctx) {
        field_date(&value.as_text(), params)?.is_some_and(|d| d > today())
    }
}

rule! {
    pub PastDate = "pastDate" in Date;
    message "Please enter a date in the past";
    evaluate(value, params, _ctx) {
        field_date(&value.as_text(), params)?.is_some_and(|d| d < today())
    }
}

rule! {
    pub IsWeekday = "weekday" in Date;
    message "Please choose a weekday";
    evaluate(value, params, _ctx) {
        field_date(&value.as_text(), params)?
            .is_some_and(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
    }
}

rule! {
    pub IsWeekend = "weekend" in Date;
    message "Please choose a weekend day";
    evaluate(value, params, _ctx) {
        field_date(&value.as_text(), params)?
            .is_some_and(|d| matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
    }
}

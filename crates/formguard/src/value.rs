//! Field values as read from the host.
//!
//! Form controls produce a handful of shapes: text inputs yield strings,
//! checkboxes booleans, multi-selects lists, file inputs file lists.
//! [`FieldValue`] is that closed set, with the projections the rules need
//! (text, number, selected values) and the single emptiness definition the
//! engine's empty exemption relies on.

use std::borrow::Cow;
use std::fmt;

use bytes::Bytes;
use serde_json::Value;

/// Metadata (and optionally content) of one selected file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileInfo {
    /// File name including extension.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// MIME type as reported by the host, e.g. `image/png`.
    pub mime: String,
    /// Pixel dimensions when the host already knows them.
    pub dimensions: Option<(u32, u32)>,
    /// Raw content, when the host makes it available for inspection.
    pub data: Option<Bytes>,
}

impl FileInfo {
    /// Creates file metadata without content.
    pub fn new(name: impl Into<String>, size: u64, mime: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size,
            mime: mime.into(),
            dimensions: None,
            data: None,
        }
    }

    /// Attaches known pixel dimensions.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.dimensions = Some((width, height));
        self
    }

    /// Attaches raw content.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Lowercased extension without the dot.
    pub fn extension(&self) -> Option<String> {
        let (stem, ext) = self.name.rsplit_once('.')?;
        if stem.is_empty() && !self.name.starts_with('.') {
            return None;
        }
        Some(ext.to_ascii_lowercase())
    }

    /// Whether the MIME type is in the `image/*` category.
    pub fn is_image(&self) -> bool {
        self.mime.to_ascii_lowercase().starts_with("image/")
    }
}

/// The current value of a form field.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum FieldValue {
    /// No value at all.
    #[default]
    Null,
    /// Checkbox / toggle state.
    Bool(bool),
    /// Numeric value supplied programmatically.
    Number(f64),
    /// Text input, textarea, single select, radio group.
    Text(String),
    /// Multi-select or checkbox group.
    List(Vec<String>),
    /// File input.
    Files(Vec<FileInfo>),
}

impl FieldValue {
    /// Emptiness as used by the engine's empty exemption.
    ///
    /// Null, blank or whitespace-only text, an empty list and an empty file
    /// list are empty. Booleans and numbers never are.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Bool(_) | Self::Number(_) => false,
            Self::Text(s) => s.trim().is_empty(),
            Self::List(items) => items.is_empty(),
            Self::Files(files) => files.is_empty(),
        }
    }

    /// Text projection used by string and pattern rules.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            Self::Text(s) => Cow::Borrowed(s.as_str()),
            other => Cow::Owned(other.to_string()),
        }
    }

    /// Numeric projection. Text must be a plain decimal literal.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) if n.is_finite() => Some(*n),
            Self::Text(s) => parse_number(s),
            _ => None,
        }
    }

    /// Selected-values projection used by the selection rules.
    ///
    /// Text becomes a singleton (blank text becomes nothing), `true` becomes
    /// the singleton `"true"`, `false` nothing.
    pub fn selected(&self) -> Vec<String> {
        match self {
            Self::Null => Vec::new(),
            Self::Bool(true) => vec!["true".to_owned()],
            Self::Bool(false) => Vec::new(),
            Self::Number(_) => vec![self.to_string()],
            Self::Text(s) if s.trim().is_empty() => Vec::new(),
            Self::Text(s) => vec![s.clone()],
            Self::List(items) => items.clone(),
            Self::Files(files) => files.iter().map(|f| f.name.clone()).collect(),
        }
    }

    /// The selected files, empty for non-file values.
    pub fn files(&self) -> &[FileInfo] {
        match self {
            Self::Files(files) => files,
            _ => &[],
        }
    }

    /// Converts a JSON literal (as found in rule parameters) into a value.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => n.as_f64().map_or(Self::Null, Self::Number),
            Value::String(s) => Self::Text(s.clone()),
            Value::Array(items) => Self::List(items.iter().map(json_to_text).collect()),
            Value::Object(_) => Self::Text(value.to_string()),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => f.write_str(&format_number(*n)),
            Self::Text(s) => f.write_str(s),
            Self::List(items) => f.write_str(&items.join(", ")),
            Self::Files(files) => {
                let names: Vec<&str> = files.iter().map(|file| file.name.as_str()).collect();
                f.write_str(&names.join(", "))
            }
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Number(value as f64)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(value: Vec<String>) -> Self {
        Self::List(value)
    }
}

impl From<Vec<FileInfo>> for FieldValue {
    fn from(value: Vec<FileInfo>) -> Self {
        Self::Files(value)
    }
}

/// Parses a plain decimal literal (`12`, `-3.5`, `.5`, `1e3`).
///
/// Rejects `NaN`, `inf`, hex and anything with surrounding garbage, which
/// `str::parse::<f64>` alone would partly accept.
pub fn parse_number(text: &str) -> Option<f64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let digits = text.strip_prefix(['+', '-']).unwrap_or(text);
    let starts_ok = digits.starts_with(|c: char| c.is_ascii_digit() || c == '.');
    let charset_ok = digits
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'));
    if !starts_ok || !charset_ok {
        return None;
    }
    text.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Renders a number without a trailing `.0` for integral values.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// Renders a JSON scalar the way it would appear in a form field.
pub fn json_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.as_f64().map_or_else(|| n.to_string(), format_number),
        Value::Bool(b) => b.to_string(),
        Value::Array(items) => items.iter().map(json_to_text).collect::<Vec<_>>().join(", "),
        Value::Object(_) => value.to_string(),
    }
}

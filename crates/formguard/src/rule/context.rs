//! Evaluation context handed to every rule.
//!
//! Rules never reach into the host directly. Cross-field lookups go through
//! [`FieldResolver`]; image decoding goes through [`ImageInspector`].

use async_trait::async_trait;

use crate::catalog::RuleCatalog;
use crate::config::RemoteConfig;
use crate::error::RuleError;
use crate::rule::RuleParams;
use crate::value::{FieldValue, FileInfo};

// ============================================================================
// FIELD RESOLVER
// ============================================================================

/// Looks up another field's current value.
///
/// `key` is a selector (`#id`, `[name=x]`), a field name or a field id.
pub trait FieldResolver: Send + Sync {
    /// Current value of the referenced field, if it exists.
    fn resolve(&self, key: &str) -> Option<FieldValue>;
}

/// A resolver that knows no fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFields;

impl FieldResolver for NoFields {
    fn resolve(&self, _key: &str) -> Option<FieldValue> {
        None
    }
}

impl<F> FieldResolver for F
where
    F: Fn(&str) -> Option<FieldValue> + Send + Sync,
{
    fn resolve(&self, key: &str) -> Option<FieldValue> {
        self(key)
    }
}

// ============================================================================
// IMAGE INSPECTOR
// ============================================================================

/// Reads pixel dimensions of an image file.
#[async_trait]
pub trait ImageInspector: Send + Sync {
    /// `(width, height)`, or `None` when the file cannot be decoded.
    async fn dimensions(&self, file: &FileInfo) -> Option<(u32, u32)>;
}

/// Default inspector: trusts host-supplied dimensions, otherwise parses the
/// PNG, GIF or JPEG header from the file content.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderInspector;

#[async_trait]
impl ImageInspector for HeaderInspector {
    async fn dimensions(&self, file: &FileInfo) -> Option<(u32, u32)> {
        if let Some(dims) = file.dimensions {
            return Some(dims);
        }
        let data = file.data.as_deref()?;
        png_dimensions(data)
            .or_else(|| gif_dimensions(data))
            .or_else(|| jpeg_dimensions(data))
    }
}

fn png_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    const SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";
    if data.len() < 24 || !data.starts_with(SIGNATURE) || &data[12..16] != b"IHDR" {
        return None;
    }
    let width = u32::from_be_bytes(data[16..20].try_into().ok()?);
    let height = u32::from_be_bytes(data[20..24].try_into().ok()?);
    Some((width, height))
}

fn gif_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    if data.len() < 10 || !(data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a")) {
        return None;
    }
    let width = u16::from_le_bytes([data[6], data[7]]);
    let height = u16::from_le_bytes([data[8], data[9]]);
    Some((u32::from(width), u32::from(height)))
}

fn jpeg_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    if !data.starts_with(&[0xFF, 0xD8]) {
        return None;
    }
    let mut pos = 2;
    while pos + 9 < data.len() {
        if data[pos] != 0xFF {
            return None;
        }
        let marker = data[pos + 1];
        let len = usize::from(u16::from_be_bytes([data[pos + 2], data[pos + 3]]));
        // SOF0..SOF15, minus DHT (C4), JPG (C8) and DAC (CC)
        if (0xC0..=0xCF).contains(&marker) && !matches!(marker, 0xC4 | 0xC8 | 0xCC) {
            let height = u16::from_be_bytes([data[pos + 5], data[pos + 6]]);
            let width = u16::from_be_bytes([data[pos + 7], data[pos + 8]]);
            return Some((u32::from(width), u32::from(height)));
        }
        pos += 2 + len;
    }
    None
}

// ============================================================================
// RULE CONTEXT
// ============================================================================

static NO_FIELDS: NoFields = NoFields;
static DEFAULT_REMOTE: RemoteConfig = RemoteConfig::DEFAULT;

/// Everything an evaluator may consult besides the value and its params.
#[derive(Clone, Copy)]
pub struct RuleContext<'a> {
    /// Id of the field under validation.
    pub field_id: &'a str,
    /// Human-readable label of that field.
    pub label: &'a str,
    /// Cross-field lookups.
    pub resolver: &'a dyn FieldResolver,
    /// The catalog the rule came from; used by `when`, `callback` and the
    /// remote cache.
    pub catalog: &'a RuleCatalog,
    /// Remote-rule settings of the owning coordinator.
    pub remote: &'a RemoteConfig,
}

impl<'a> RuleContext<'a> {
    /// A context with no field identity, no other fields and default remote
    /// settings.
    pub fn new(catalog: &'a RuleCatalog) -> Self {
        Self {
            field_id: "",
            label: "",
            resolver: &NO_FIELDS,
            catalog,
            remote: &DEFAULT_REMOTE,
        }
    }

    /// Sets the field identity.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_field(mut self, field_id: &'a str, label: &'a str) -> Self {
        self.field_id = field_id;
        self.label = label;
        self
    }

    /// Sets the cross-field resolver.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_resolver(mut self, resolver: &'a dyn FieldResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Sets the remote-rule settings.
    #[must_use = "builder methods must be chained or built"]
    pub fn with_remote(mut self, remote: &'a RemoteConfig) -> Self {
        self.remote = remote;
        self
    }

    /// Value of another field.
    pub fn field(&self, key: &str) -> Option<FieldValue> {
        self.resolver.resolve(key)
    }

    /// The comparison operand of a rule.
    ///
    /// A `field` param must name an existing field. A `value` param that is a
    /// selector (`#…`, `[…]`) must resolve too; any other string is tried as a
    /// field name or id and otherwise taken literally.
    pub fn operand(&self, params: &RuleParams) -> Result<FieldValue, RuleError> {
        if let Some(key) = params.str("field") {
            return self.field(&key).ok_or_else(|| missing_field(&key));
        }
        let Some(raw) = params.value() else {
            return Err(RuleError::invalid_param("value", "a value or field is required"));
        };
        if let Some(key) = raw.as_str() {
            if is_selector(key) {
                return self.field(key).ok_or_else(|| missing_field(key));
            }
            if let Some(value) = self.field(key) {
                return Ok(value);
            }
        }
        Ok(FieldValue::from_json(raw))
    }

    /// A field named by a param, which must exist.
    pub fn required_field(&self, params: &RuleParams, keys: &[&str]) -> Result<FieldValue, RuleError> {
        let key = params
            .first_str(keys)
            .ok_or_else(|| RuleError::invalid_param(keys[0], "a field reference is required"))?;
        self.field(&key).ok_or_else(|| missing_field(&key))
    }
}

fn is_selector(key: &str) -> bool {
    key.starts_with('#') || key.starts_with('[')
}

fn missing_field(key: &str) -> RuleError {
    RuleError::invalid_param("field", format!("no field matches '{key}'"))
}

impl std::fmt::Debug for RuleContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleContext")
            .field("field_id", &self.field_id)
            .field("label", &self.label)
            .field("remote", self.remote)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn resolver(key: &str) -> Option<FieldValue> {
        match key {
            "#password" | "password" => Some(FieldValue::from("secret")),
            _ => None,
        }
    }

    #[test]
    fn operand_resolution() {
        let catalog = RuleCatalog::new();
        let ctx = RuleContext::new(&catalog).with_resolver(&resolver);

        let by_field = RuleParams::new().with("field", "#password");
        assert_eq!(ctx.operand(&by_field).unwrap(), FieldValue::from("secret"));

        let by_name = RuleParams::new().with("value", "password");
        assert_eq!(ctx.operand(&by_name).unwrap(), FieldValue::from("secret"));

        let literal = RuleParams::new().with("value", "yes");
        assert_eq!(ctx.operand(&literal).unwrap(), FieldValue::from("yes"));

        let number = RuleParams::new().with("value", json!(5));
        assert_eq!(ctx.operand(&number).unwrap(), FieldValue::Number(5.0));

        let missing = RuleParams::new().with("value", "#nope");
        assert!(ctx.operand(&missing).is_err());
        assert!(ctx.operand(&RuleParams::new()).is_err());
    }

    #[tokio::test]
    async fn header_inspector_reads_png_and_gif() {
        let mut png = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR".to_vec();
        png.extend_from_slice(&640u32.to_be_bytes());
        png.extend_from_slice(&480u32.to_be_bytes());
        let file = FileInfo::new("a.png", png.len() as u64, "image/png").with_data(png);
        assert_eq!(HeaderInspector.dimensions(&file).await, Some((640, 480)));

        let gif = b"GIF89a\x20\x00\x10\x00".to_vec();
        let file = FileInfo::new("a.gif", 10, "image/gif").with_data(gif);
        assert_eq!(HeaderInspector.dimensions(&file).await, Some((32, 16)));

        let known = FileInfo::new("b.webp", 1, "image/webp").with_dimensions(10, 20);
        assert_eq!(HeaderInspector.dimensions(&known).await, Some((10, 20)));

        let opaque = FileInfo::new("c.bin", 1, "image/x-unknown").with_data(vec![1, 2, 3]);
        assert_eq!(HeaderInspector.dimensions(&opaque).await, None);
    }

    #[tokio::test]
    async fn header_inspector_reads_jpeg() {
        let jpeg = vec![
            0xFF, 0xD8, // SOI
            0xFF, 0xE0, 0x00, 0x04, 0x00, 0x00, // APP0, empty payload
            0xFF, 0xC0, 0x00, 0x11, 0x08, 0x00, 0x40, 0x00, 0x80, 0x03, 0, 0, 0, 0,
        ];
        let file = FileInfo::new("a.jpg", jpeg.len() as u64, "image/jpeg").with_data(jpeg);
        assert_eq!(HeaderInspector.dimensions(&file).await, Some((128, 64)));
    }
}

//! File-input rules.
//!
//! Sizes accept plain byte counts or human units (`500KB`, `5MB`, `1.5 GB`;
//! binary multiples). Type lists accept MIME types, `type/*` wildcards and
//! `.ext` entries.

use crate::error::RuleError;
use crate::rule::{Outcome, RuleDefinition, RuleParams};
use crate::rules::{count, list};
use crate::value::{FileInfo, parse_number};

/// Definitions of this family.
pub fn definitions() -> Vec<RuleDefinition> {
    vec![
        FileRequired::definition(),
        FileSize::definition(),
        FileMinSize::definition(),
        TotalFileSize::definition(),
        FileType::definition(),
        FileExtension::definition(),
        ImageOnly::definition(),
        ImageDimensions::definition(),
        MaxFiles::definition(),
        MinFiles::definition(),
    ]
}

/// Parses `5MB`, `500 kb`, `1.5G`, `2048` into bytes.
pub fn parse_size(text: &str) -> Option<u64> {
    let text = text.trim();
    let split = text
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(text.len());
    let (number, unit) = text.split_at(split);
    let number = parse_number(number)?;
    let multiplier: u64 = match unit.trim().to_ascii_uppercase().as_str() {
        "" | "B" => 1,
        "K" | "KB" | "KIB" => 1 << 10,
        "M" | "MB" | "MIB" => 1 << 20,
        "G" | "GB" | "GIB" => 1 << 30,
        "T" | "TB" | "TIB" => 1 << 40,
        _ => return None,
    };
    (number >= 0.0).then(|| (number * multiplier as f64).round() as u64)
}

fn size_param(params: &RuleParams, keys: &[&str]) -> Result<u64, RuleError> {
    let raw = params
        .first_str(keys)
        .ok_or_else(|| RuleError::invalid_param(keys[0], "expected a size"))?;
    parse_size(&raw).ok_or_else(|| RuleError::invalid_param(keys[0], format!("'{raw}' is not a size")))
}

/// Whether `file` matches one allow-list entry.
fn type_matches(file: &FileInfo, accepted: &str) -> bool {
    let accepted = accepted.trim().to_ascii_lowercase();
    let mime = file.mime.to_ascii_lowercase();
    if let Some(ext) = accepted.strip_prefix('.') {
        return file.extension().as_deref() == Some(ext);
    }
    if let Some(category) = accepted.strip_suffix("/*") {
        return mime.split('/').next() == Some(category);
    }
    mime == accepted
}

rule! {
    /// At least one file must be selected.
    pub FileRequired = "fileRequired" in File;
    message "Please select a file";
    evaluate_empty(value, _params, _ctx) {
        !value.files().is_empty()
    }
}

rule! {
    /// Every file at most `max` bytes.
    pub FileSize = "fileSize" in File;
    message "File size must not exceed {max}";
    evaluate(value, params, _ctx) {
        let max = size_param(params, &["max", "value"])?;
        value.files().iter().all(|file| file.size <= max)
    }
}

rule! {
    /// Every file at least `min` bytes.
    pub FileMinSize = "fileMinSize" in File;
    message "File size must be at least {min}";
    evaluate(value, params, _ctx) {
        let min = size_param(params, &["min", "value"])?;
        value.files().iter().all(|file| file.size >= min)
    }
}

rule! {
    pub TotalFileSize = "totalFileSize" in File;
    message "Total file size must not exceed {max}";
    evaluate(value, params, _ctx) {
        let max = size_param(params, &["max", "value"])?;
        value.files().iter().map(|file| file.size).sum::<u64>() <= max
    }
}

rule! {
    pub FileType = "fileType" in File;
    message "Please select a file of an allowed type";
    evaluate(value, params, _ctx) {
        let accepted = list(params, &["types", "value"])?;
        value
            .files()
            .iter()
            .all(|file| accepted.iter().any(|entry| type_matches(file, entry)))
    }
}

rule! {
    pub FileExtension = "fileExtension" in File;
    message "Please select a file with an allowed extension";
    evaluate(value, params, _ctx) {
        let allowed: Vec<String> = list(params, &["extensions", "value"])?
            .iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
            .collect();
        let ok = value
            .files()
            .iter()
            .all(|file| file.extension().is_some_and(|ext| allowed.contains(&ext)));
        if ok {
            Outcome::Valid
        } else {
            Outcome::invalid(format!("Allowed file extensions: {}", allowed.join(", ")))
        }
    }
}

rule! {
    pub ImageOnly = "imageOnly" in File;
    message "Please select an image file";
    evaluate(value, _params, _ctx) {
        value.files().iter().all(FileInfo::is_image)
    }
}

rule! {
    /// Pixel bounds via the catalog's image inspector: `width` / `height`
    /// (exact), `minWidth`, `maxWidth`, `minHeight`, `maxHeight`.
    pub ImageDimensions = "imageDimensions" in File;
    message "Image dimensions are not allowed";
    evaluate(value, params, ctx) {
        let inspector = ctx.catalog.image_inspector();
        let mut outcome = Outcome::Valid;
        for file in value.files() {
            let Some((width, height)) = inspector.dimensions(file).await else {
                outcome = Outcome::invalid(format!("Could not read the dimensions of {}", file.name));
                break;
            };
            if !dimensions_allowed(width, height, params) {
                outcome = Outcome::invalid(format!(
                    "Image dimensions {width}x{height} are not allowed"
                ));
                break;
            }
        }
        outcome
    }
}

fn dimensions_allowed(width: u32, height: u32, params: &RuleParams) -> bool {
    let (width, height) = (width as usize, height as usize);
    let check = |key: &str, ok: &dyn Fn(usize) -> bool| params.usize(key).is_none_or(ok);
    check("width", &|w| width == w)
        && check("height", &|h| height == h)
        && check("minWidth", &|w| width >= w)
        && check("maxWidth", &|w| width <= w)
        && check("minHeight", &|h| height >= h)
        && check("maxHeight", &|h| height <= h)
}

rule! {
    pub MaxFiles = "maxFiles" in File;
    message "Please select no more than {max} files";
    evaluate(value, params, _ctx) {
        value.files().len() <= count(params, &["max", "value"])?
    }
}

rule! {
    pub MinFiles = "minFiles" in File;
    message "Please select at least {min} files";
    evaluate(value, params, _ctx) {
        value.files().len() >= count(params, &["min", "value"])?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::RuleCatalog;
    use crate::rule::{ImageInspector, RuleContext};
    use crate::rules::test_support::{eval, eval_in, passes};
    use crate::value::FieldValue;
    use rstest::rstest;
    use serde_json::{Value, json};

    fn files(list: &[(&str, u64, &str)]) -> FieldValue {
        FieldValue::Files(
            list.iter()
                .map(|(name, size, mime)| FileInfo::new(*name, *size, *mime))
                .collect(),
        )
    }

    #[rstest]
    #[case("2048", Some(2048))]
    #[case("5MB", Some(5 * 1024 * 1024))]
    #[case("500 kb", Some(500 * 1024))]
    #[case("1.5G", Some(1_610_612_736))]
    #[case("5 parsecs", None)]
    #[case("-1KB", None)]
    fn sizes(#[case] text: &str, #[case] bytes: Option<u64>) {
        assert_eq!(parse_size(text), bytes);
    }

    #[tokio::test]
    async fn file_required_sees_empty_lists() {
        assert!(!passes("fileRequired", FieldValue::Files(vec![]), Value::Null).await);
        assert!(passes("fileRequired", files(&[("a.txt", 1, "text/plain")]), Value::Null).await);
    }

    #[tokio::test]
    async fn size_limits() {
        let two = files(&[("a.pdf", 3 * 1024 * 1024, "application/pdf"), ("b.pdf", 1024, "application/pdf")]);
        assert!(passes("fileSize", two.clone(), json!("5MB")).await);
        assert!(!passes("fileSize", two.clone(), json!({"max": "2MB"})).await);
        assert!(!passes("fileMinSize", two.clone(), json!("2KB")).await);
        assert!(!passes("totalFileSize", two.clone(), json!("3MB")).await);
        assert!(passes("totalFileSize", two, json!("4MB")).await);
    }

    #[tokio::test]
    async fn type_and_extension_lists() {
        let png = files(&[("photo.PNG", 10, "image/png")]);
        assert!(passes("fileType", png.clone(), json!(["image/*"])).await);
        assert!(passes("fileType", png.clone(), json!("application/pdf, .png")).await);
        assert!(!passes("fileType", png.clone(), json!(["application/pdf"])).await);
        assert!(passes("fileExtension", png.clone(), json!(["jpg", ".png"])).await);
        assert!(passes("imageOnly", png.clone(), Value::Null).await);

        let outcome = eval("fileExtension", png, json!("pdf,doc")).await;
        assert_eq!(outcome.message(), Some("Allowed file extensions: pdf, doc"));
    }

    #[tokio::test]
    async fn file_counts() {
        let three = files(&[("a", 1, "x/y"), ("b", 1, "x/y"), ("c", 1, "x/y")]);
        assert!(!passes("maxFiles", three.clone(), json!(2)).await);
        assert!(passes("minFiles", three, json!({"min": 3})).await);
    }

    struct Fixed(u32, u32);

    #[async_trait::async_trait]
    impl ImageInspector for Fixed {
        async fn dimensions(&self, _file: &FileInfo) -> Option<(u32, u32)> {
            Some((self.0, self.1))
        }
    }

    #[tokio::test]
    async fn image_dimensions_use_the_inspector() {
        let catalog = RuleCatalog::with_builtins().with_image_inspector(Fixed(800, 600));
        let ctx = RuleContext::new(&catalog);
        let image = files(&[("a.png", 10, "image/png")]);

        let ok = eval_in(&catalog, ctx, "imageDimensions", image.clone(), json!({"maxWidth": 1024})).await;
        assert!(ok.is_valid());

        let bad = eval_in(&catalog, ctx, "imageDimensions", image, json!({"minWidth": 1024})).await;
        assert_eq!(bad.message(), Some("Image dimensions 800x600 are not allowed"));
    }

    #[tokio::test]
    async fn undecodable_image_fails() {
        let image = files(&[("a.png", 10, "image/png")]);
        let outcome = eval("imageDimensions", image, json!({"maxWidth": 10})).await;
        assert_eq!(outcome.message(), Some("Could not read the dimensions of a.png"));
    }
}

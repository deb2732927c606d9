// Annotation document discovery and parsing
//
// Annotation sources are JSON files anywhere under the root that score or
// label videos. They are recognized by shape, not filename: a `results` list
// whose first element carries a `score` field, either wrapped in an object
// or as a bare top-level list.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::constants::UNCATEGORIZED;
use crate::error::{Result, ShelfError};
use crate::ids::scoped_id;

/// One scored video inside an annotation document.
#[derive(Debug, Clone, Deserialize)]
pub struct AnnotationRecord {
    /// Source URL or local path of the video.
    #[serde(default, alias = "url", alias = "video_url")]
    pub video: Option<String>,
    pub score: f64,
    #[serde(default)]
    pub question: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

/// A parsed annotation document, placed in the hierarchy by its storage path.
#[derive(Debug, Clone)]
pub struct AnnotationSource {
    pub category: String,
    pub subconcept: String,
    /// Folder key derived from the document path (root-relative, no extension).
    pub folder: String,
    /// Display name derived from the file stem.
    pub query: String,
    pub records: Vec<AnnotationRecord>,
}

#[derive(Debug, Deserialize)]
struct WrappedResults {
    results: Vec<Value>,
}

/// Check whether a parsed JSON value has the annotation shape.
pub fn is_annotation_shape(value: &Value) -> bool {
    let results = match value {
        Value::Object(map) => match map.get("results") {
            Some(Value::Array(items)) => items,
            _ => return false,
        },
        Value::Array(items) => items,
        _ => return false,
    };
    matches!(results.first(), Some(Value::Object(first)) if first.contains_key("score"))
}

/// Parse one annotation document. `path` must be under `root`.
pub fn parse_annotation_file(root: &Path, path: &Path) -> Result<Option<AnnotationSource>> {
    let data = std::fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&data)
        .map_err(|e| ShelfError::Annotation(format!("{}: {}", path.display(), e)))?;

    if !is_annotation_shape(&value) {
        return Ok(None);
    }

    let items = match value {
        Value::Object(_) => {
            let wrapped: WrappedResults = serde_json::from_str(&data)
                .map_err(|e| ShelfError::Annotation(format!("{}: {}", path.display(), e)))?;
            wrapped.results
        }
        Value::Array(items) => items,
        _ => unreachable!(),
    };

    let mut records = Vec::with_capacity(items.len());
    for item in items {
        match serde_json::from_value::<AnnotationRecord>(item) {
            Ok(record) => records.push(record),
            Err(e) => {
                // One bad record does not sink the document
                log::warn!("Skipping malformed record in {}: {}", path.display(), e);
            }
        }
    }

    let rel = path.strip_prefix(root).unwrap_or(path);
    let segments: Vec<&str> = rel
        .parent()
        .map(|p| {
            p.components()
                .filter_map(|c| c.as_os_str().to_str())
                .collect()
        })
        .unwrap_or_default();

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("annotations")
        .to_string();

    let category = segments
        .first()
        .map(|s| s.to_string())
        .unwrap_or_else(|| UNCATEGORIZED.to_string());
    let subconcept = segments
        .get(1)
        .map(|s| s.to_string())
        .unwrap_or_else(|| crate::scan::humanize_name(&stem));

    let folder = rel
        .with_extension("")
        .to_string_lossy()
        .replace('\\', "/");

    Ok(Some(AnnotationSource {
        category,
        subconcept,
        folder,
        query: crate::scan::humanize_name(&stem),
        records,
    }))
}

static URL_EMBEDDED_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d{2,})").unwrap());

/// Derive the per-video identity used to build a stable id.
///
/// Priority: numeric id embedded in the URL's last segment, else the last
/// path segment itself, else a positional fallback.
pub fn derive_identity(video_url: Option<&str>, index: usize) -> String {
    if let Some(url) = video_url {
        // Query strings and fragments vary per fetch and must not leak into
        // the identity, or ids stop being stable.
        let trimmed = url.split(['?', '#']).next().unwrap_or(url);
        let last = trimmed
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(trimmed);
        if let Some(caps) = URL_EMBEDDED_ID.captures(last) {
            return caps[1].to_string();
        }
        if !last.is_empty() {
            return last.to_string();
        }
    }
    format!("entry{}", index)
}

/// Final stable id for an annotation record: hash of the owning document's
/// path combined with the derived identity.
pub fn annotation_video_id(source_folder: &str, video_url: Option<&str>, index: usize) -> String {
    scoped_id(source_folder, &derive_identity(video_url, index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(root: &Path, rel: &str, json: &str) -> std::path::PathBuf {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(json.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_shape_detection_wrapped_and_bare() {
        let wrapped: Value =
            serde_json::from_str(r#"{"results": [{"score": 0.9, "video": "x.mp4"}]}"#).unwrap();
        let bare: Value = serde_json::from_str(r#"[{"score": 0.5}]"#).unwrap();
        let not_annotation: Value =
            serde_json::from_str(r#"{"results": [{"rank": 1}]}"#).unwrap();
        let empty: Value = serde_json::from_str(r#"{"results": []}"#).unwrap();

        assert!(is_annotation_shape(&wrapped));
        assert!(is_annotation_shape(&bare));
        assert!(!is_annotation_shape(&not_annotation));
        assert!(!is_annotation_shape(&empty));
    }

    #[test]
    fn test_category_from_path_segments() {
        let tmp = TempDir::new().unwrap();
        let path = write_file(
            tmp.path(),
            "Camera/Dolly/dolly.json",
            r#"{"results": [{"video": "https://x/adobe_stock_42.mp4", "score": 0.9, "question": "Is it dolly?"}]}"#,
        );

        let source = parse_annotation_file(tmp.path(), &path).unwrap().unwrap();
        assert_eq!(source.category, "Camera");
        assert_eq!(source.subconcept, "Dolly");
        assert_eq!(source.folder, "Camera/Dolly/dolly");
        assert_eq!(source.records.len(), 1);
        assert_eq!(source.records[0].score, 0.9);
        assert_eq!(source.records[0].question.as_deref(), Some("Is it dolly?"));
    }

    #[test]
    fn test_root_level_document_is_uncategorized() {
        let tmp = TempDir::new().unwrap();
        let path = write_file(tmp.path(), "scores.json", r#"[{"score": 0.1}]"#);
        let source = parse_annotation_file(tmp.path(), &path).unwrap().unwrap();
        assert_eq!(source.category, UNCATEGORIZED);
        assert_eq!(source.subconcept, "Scores");
    }

    #[test]
    fn test_non_annotation_json_is_ignored() {
        let tmp = TempDir::new().unwrap();
        let path = write_file(tmp.path(), "notes.json", r#"{"hello": "world"}"#);
        assert!(parse_annotation_file(tmp.path(), &path).unwrap().is_none());
    }

    #[test]
    fn test_unparseable_json_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = write_file(tmp.path(), "broken.json", "{nope");
        assert!(parse_annotation_file(tmp.path(), &path).is_err());
    }

    #[test]
    fn test_derive_identity_priority() {
        assert_eq!(
            derive_identity(Some("https://x/adobe_stock_42.mp4"), 0),
            "42"
        );
        assert_eq!(derive_identity(Some("https://x/clip.mp4"), 3), "clip.mp4");
        assert_eq!(derive_identity(None, 3), "entry3");
    }

    #[test]
    fn test_identity_ignores_query_string_and_fragment() {
        // Signed URLs carry per-fetch tokens; the identity must not move
        assert_eq!(
            derive_identity(Some("https://x/adobe_stock_42.mp4?sig=98765"), 0),
            "42"
        );
        assert_eq!(
            derive_identity(Some("https://x/clip.mp4?token=abc#t=2"), 0),
            "clip.mp4"
        );
    }

    #[test]
    fn test_annotation_ids_are_reproducible() {
        let a = annotation_video_id("Camera/Dolly/dolly", Some("https://x/adobe_stock_42.mp4"), 0);
        let b = annotation_video_id("Camera/Dolly/dolly", Some("https://x/adobe_stock_42.mp4"), 0);
        let other = annotation_video_id("Camera/Pan/pan", Some("https://x/adobe_stock_42.mp4"), 0);
        assert_eq!(a, b);
        assert_ne!(a, other);
    }
}

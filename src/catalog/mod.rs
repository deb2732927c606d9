// Catalog document model and persistence
//
// The catalog is a three-level hierarchy (category -> subconcept -> queries)
// rebuilt on every re-index cycle and persisted as a single JSON document.
// Writes go through a temp file + rename so readers never see a torn file.

pub mod labels;
pub mod merge;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::constants::TIMESTAMP_FORMAT;
use crate::error::{Result, ShelfError};

/// One video entry in a query's result list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRecord {
    pub id: String,
    pub title: String,
    pub filename: String,
    /// Path relative to the query folder.
    pub filepath: String,
    /// "M:SS"
    pub duration: String,
    /// "4K" | "1080p" | "720p" | "<n>p" | "HD" | "Unknown"
    pub resolution: String,
    /// Human-readable size, e.g. "12.4 MB"
    pub file_size: String,
    pub modified: String,
    /// Search tags derived from folder structure and filename.
    #[serde(default)]
    pub tags: Vec<String>,
    pub thumbnail: Option<String>,
    /// Source URL for annotation records, root-relative path for scanned files.
    pub url: String,
    pub local_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub is_annotation: bool,
}

/// One query folder (or annotation document) worth of videos.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRecord {
    /// Display name shown in the viewer.
    pub query: String,
    /// Folder key, relative to the watched root. Unique within a subconcept.
    pub folder: String,
    pub timestamp: String,
    pub total_results: usize,
    pub videos: Vec<VideoRecord>,
    #[serde(default)]
    pub is_annotation: bool,
    #[serde(default)]
    pub processing_time: f64,
}

/// Queries grouped under one subconcept.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubconceptEntry {
    pub queries: Vec<QueryRecord>,
}

/// The full catalog: category -> subconcept -> queries.
///
/// BTreeMap keeps category and subconcept ordering deterministic across
/// re-scans; query order within a subconcept is discovery order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CatalogDocument {
    pub categories: BTreeMap<String, BTreeMap<String, SubconceptEntry>>,
}

impl CatalogDocument {
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Total number of query records across all subconcepts.
    pub fn query_count(&self) -> usize {
        self.categories
            .values()
            .flat_map(|subs| subs.values())
            .map(|s| s.queries.len())
            .sum()
    }

    /// Append a query record under a category/subconcept pair.
    ///
    /// Existing entries for other queries are never touched. A record with
    /// the same folder key and annotation flag replaces the stale one so
    /// repeated merges do not duplicate.
    pub fn upsert_query(&mut self, category: &str, subconcept: &str, record: QueryRecord) {
        let entry = self
            .categories
            .entry(category.to_string())
            .or_default()
            .entry(subconcept.to_string())
            .or_default();

        if let Some(existing) = entry
            .queries
            .iter_mut()
            .find(|q| q.folder == record.folder && q.is_annotation == record.is_annotation)
        {
            *existing = record;
        } else {
            entry.queries.push(record);
        }
    }
}

/// Format a byte count the way the viewer expects ("12.4 MB").
pub fn human_file_size(size_bytes: u64) -> String {
    if size_bytes == 0 {
        return "0 B".to_string();
    }

    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = size_bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    format!("{:.1} {}", size, UNITS[unit])
}

/// Current local time in the catalog's timestamp format.
pub fn now_timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Load a previously persisted catalog. Missing file yields an empty document.
pub fn load_document(path: &Path) -> Result<CatalogDocument> {
    if !path.exists() {
        return Ok(CatalogDocument::default());
    }
    let data = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

/// Persist the catalog atomically: write a temp file next to the target,
/// then rename over it. A failed write leaves the prior document intact.
pub fn persist_document(path: &Path, doc: &CatalogDocument) -> Result<()> {
    let json = serde_json::to_string_pretty(doc)?;

    let tmp_path = path.with_extension("json.tmp");
    if let Err(e) = fs::write(&tmp_path, json.as_bytes()) {
        let _ = fs::remove_file(&tmp_path);
        return Err(ShelfError::Persist(format!(
            "failed to write {}: {}",
            tmp_path.display(),
            e
        )));
    }

    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(ShelfError::Persist(format!(
            "failed to replace {}: {}",
            path.display(),
            e
        )));
    }

    info!(
        "Persisted catalog with {} queries to {}",
        doc.query_count(),
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn query(folder: &str, annotation: bool) -> QueryRecord {
        QueryRecord {
            query: folder.to_string(),
            folder: folder.to_string(),
            timestamp: now_timestamp(),
            total_results: 0,
            videos: Vec::new(),
            is_annotation: annotation,
            processing_time: 0.0,
        }
    }

    #[test]
    fn test_human_file_size() {
        assert_eq!(human_file_size(0), "0 B");
        assert_eq!(human_file_size(512), "512.0 B");
        assert_eq!(human_file_size(2048), "2.0 KB");
        assert_eq!(human_file_size(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(human_file_size(3 * 1024 * 1024 * 1024), "3.0 GB");
    }

    #[test]
    fn test_upsert_replaces_same_folder() {
        let mut doc = CatalogDocument::default();
        doc.upsert_query("Nature", "Landscapes", query("mountains", false));
        doc.upsert_query("Nature", "Landscapes", query("mountains", false));
        doc.upsert_query("Nature", "Landscapes", query("rivers", false));

        let subs = &doc.categories["Nature"]["Landscapes"];
        assert_eq!(subs.queries.len(), 2);
        assert_eq!(subs.queries[0].folder, "mountains");
        assert_eq!(subs.queries[1].folder, "rivers");
    }

    #[test]
    fn test_upsert_keeps_annotation_and_scan_entries_apart() {
        let mut doc = CatalogDocument::default();
        doc.upsert_query("Camera", "Dolly", query("dolly", false));
        doc.upsert_query("Camera", "Dolly", query("dolly", true));
        assert_eq!(doc.categories["Camera"]["Dolly"].queries.len(), 2);
    }

    #[test]
    fn test_persist_and_load_round_trip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("scraped-data.json");

        let mut doc = CatalogDocument::default();
        doc.upsert_query("Nature", "Landscapes", query("mountains", false));
        persist_document(&path, &doc).unwrap();

        let loaded = load_document(&path).unwrap();
        assert_eq!(loaded.query_count(), 1);
        assert!(loaded.categories.contains_key("Nature"));

        // No temp file left behind
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn test_load_missing_is_empty() {
        let tmp = TempDir::new().unwrap();
        let doc = load_document(&tmp.path().join("nope.json")).unwrap();
        assert!(doc.is_empty());
    }
}

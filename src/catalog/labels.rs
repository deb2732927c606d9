// Video label store and label export
//
// The web viewer labels videos yes/no per query and exports the "yes" set
// into the query folder. Exports append: a second export for the same folder
// unions by video id and never drops previously exported entries.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::constants::{LABEL_EXPORT_FILENAME, LABEL_STORE_FILENAME};
use crate::error::{Result, ShelfError};

/// One video inside a label export file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedVideo {
    pub id: String,
    pub title: String,
    pub filename: String,
    pub url: String,
    pub thumbnail: Option<String>,
    pub duration: String,
    pub resolution: String,
    pub file_size: String,
}

/// The on-disk export document for one query folder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelExport {
    pub query: String,
    pub folder: String,
    pub timestamp: String,
    pub exported_videos: Vec<ExportedVideo>,
}

/// Append an export into `query_folder`, de-duplicating by video id against
/// what is already on disk. Returns the total number of entries persisted.
pub fn export_labels(query_folder: &Path, export: LabelExport) -> Result<usize> {
    let path = query_folder.join(LABEL_EXPORT_FILENAME);

    let mut merged = match load_export(&path)? {
        Some(mut existing) => {
            // Keep prior entries; refresh header fields from the new export
            existing.query = export.query;
            existing.timestamp = export.timestamp;
            existing
        }
        None => LabelExport {
            query: export.query,
            folder: export.folder.clone(),
            timestamp: export.timestamp,
            exported_videos: Vec::new(),
        },
    };

    let added: Vec<ExportedVideo> = export
        .exported_videos
        .into_iter()
        .filter(|v| !merged.exported_videos.iter().any(|e| e.id == v.id))
        .collect();
    let added_count = added.len();
    merged.exported_videos.extend(added);

    write_json_atomic(&path, &merged)?;
    info!(
        "Exported labels for '{}': {} new, {} total",
        merged.folder,
        added_count,
        merged.exported_videos.len()
    );
    Ok(merged.exported_videos.len())
}

fn load_export(path: &Path) -> Result<Option<LabelExport>> {
    if !path.exists() {
        return Ok(None);
    }
    let data = fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&data)?))
}

/// Load the label store (video id -> label). Missing file is an empty map.
pub fn load_labels(store_dir: &Path) -> Result<BTreeMap<String, String>> {
    let path = store_dir.join(LABEL_STORE_FILENAME);
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let data = fs::read_to_string(&path)?;
    Ok(serde_json::from_str(&data)?)
}

/// Replace the label store contents.
pub fn save_labels(store_dir: &Path, labels: &BTreeMap<String, String>) -> Result<()> {
    write_json_atomic(&store_dir.join(LABEL_STORE_FILENAME), labels)
}

/// Remove all stored labels.
pub fn clear_labels(store_dir: &Path) -> Result<()> {
    let path = store_dir.join(LABEL_STORE_FILENAME);
    if path.exists() {
        fs::remove_file(&path)?;
    }
    Ok(())
}

fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
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
    Ok(())
}

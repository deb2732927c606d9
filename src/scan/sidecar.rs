// Query-folder sidecar metadata
//
// A query folder may carry a query_metadata.json mapping external stable ids
// to the files that were downloaded for them. When a file matches a mapping,
// the external id wins over the path-hash id so re-downloads keep their ids.
//
// Matching priority is fixed and must not be reordered: exact filename,
// stem without extension, case-insensitive substring in either direction,
// then a title substring pass. First match wins.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::constants::{QUERY_METADATA_FILENAME, VIDEO_EXTENSIONS};
use crate::error::{Result, ShelfError};

#[derive(Debug, Clone, Deserialize)]
pub struct FileMapping {
    pub filename: String,
    #[serde(default)]
    pub title: Option<String>,
}

/// Parsed sidecar metadata for one query folder.
#[derive(Debug, Clone, Default)]
pub struct SidecarMetadata {
    /// external id -> mapping, iterated in key order for determinism.
    mappings: BTreeMap<String, FileMapping>,
}

#[derive(Debug, Deserialize)]
struct SidecarFile {
    #[serde(default)]
    video_file_mappings: BTreeMap<String, FileMapping>,
}

impl SidecarMetadata {
    /// Load the sidecar file for a query folder, if present.
    pub fn load(query_folder: &Path) -> Result<Option<SidecarMetadata>> {
        let path = query_folder.join(QUERY_METADATA_FILENAME);
        if !path.exists() {
            return Ok(None);
        }

        let data = fs::read_to_string(&path)?;
        let parsed: SidecarFile = serde_json::from_str(&data)
            .map_err(|e| ShelfError::Sidecar(format!("{}: {}", path.display(), e)))?;

        Ok(Some(SidecarMetadata {
            mappings: parsed.video_file_mappings,
        }))
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Resolve the external id for a scanned file.
    pub fn resolve(&self, filename: &str, title: &str) -> Option<&str> {
        // 1) Exact filename
        for (id, mapping) in &self.mappings {
            if mapping.filename == filename {
                return Some(id);
            }
        }

        // 2) Stem equality, ignoring a known video extension
        let stem = strip_video_extension(filename);
        for (id, mapping) in &self.mappings {
            if strip_video_extension(&mapping.filename) == stem {
                return Some(id);
            }
        }

        // 3) Case-insensitive substring, either direction
        let stem_lower = stem.to_lowercase();
        for (id, mapping) in &self.mappings {
            let map_lower = strip_video_extension(&mapping.filename).to_lowercase();
            if map_lower.is_empty() || stem_lower.is_empty() {
                continue;
            }
            if map_lower.contains(&stem_lower) || stem_lower.contains(&map_lower) {
                return Some(id);
            }
        }

        // 4) Title substring pass
        let title_lower = title.to_lowercase();
        if !title_lower.is_empty() {
            for (id, mapping) in &self.mappings {
                if let Some(map_title) = &mapping.title {
                    let map_title = map_title.to_lowercase();
                    if map_title.is_empty() {
                        continue;
                    }
                    if map_title.contains(&title_lower) || title_lower.contains(&map_title) {
                        return Some(id);
                    }
                }
            }
        }

        None
    }
}

fn strip_video_extension(filename: &str) -> &str {
    if let Some((stem, ext)) = filename.rsplit_once('.') {
        if VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()) {
            return stem;
        }
    }
    filename
}

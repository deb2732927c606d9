// Filesystem scanner
//
// Walks the watched root and classifies first-level folders into the
// category/subconcept/query hierarchy. A first-level folder with video files
// directly inside it is always an uncategorized query folder, even when it
// also nests deeper structure; this mirrors the viewer's expectations and is
// deliberate. Folders with no recognized videos anywhere below contribute
// nothing.

pub mod annotations;
pub mod probe;
pub mod sidecar;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime};

use chrono::{DateTime, Local};
use log::{debug, warn};
use walkdir::WalkDir;

use crate::catalog::merge::PlacedQuery;
use crate::catalog::{
    human_file_size, now_timestamp, CatalogDocument, QueryRecord, VideoRecord,
};
use crate::constants::{
    ANNOTATION_THUMB_WORKERS, MAX_VIDEO_TAGS, QUERY_METADATA_FILENAME,
    RANKING_RESULTS_FILENAME, SCAN_THUMB_WORKERS, TAG_STOP_WORDS, THUMBS_FOLDER,
    TIMESTAMP_FORMAT, UNCATEGORIZED, VIDEO_EXTENSIONS,
};
use crate::error::Result;
use crate::ids::stable_id;
use crate::thumbs::pool::{run_batch, ThumbJob};
use crate::thumbs::{ThumbnailGenerator, VideoSource};

use annotations::{annotation_video_id, parse_annotation_file, AnnotationSource};
use sidecar::SidecarMetadata;

/// Scans a root directory into catalog records.
pub struct Scanner<'a> {
    root: &'a Path,
    generator: &'a ThumbnailGenerator,
}

impl<'a> Scanner<'a> {
    pub fn new(root: &'a Path, generator: &'a ThumbnailGenerator) -> Self {
        Self { root, generator }
    }

    /// Scan the tree into a catalog document (filesystem entries only).
    pub fn scan_tree(&self) -> Result<CatalogDocument> {
        let mut doc = CatalogDocument::default();

        if !self.root.exists() {
            warn!("Watched root does not exist: {}", self.root.display());
            return Ok(doc);
        }

        for entry in sorted_dirs(self.root)? {
            let name = dir_name(&entry);
            if name.starts_with('.') || name == THUMBS_FOLDER {
                continue;
            }

            if has_direct_video_files(&entry) || !has_nested_structure(&entry) {
                // Flat (or mixed) folder: one uncategorized query
                if has_video_files(&entry) {
                    if let Some(record) = self.scan_query_folder(&entry)? {
                        doc.upsert_query(UNCATEGORIZED, &humanize_name(&name), record);
                    }
                }
                continue;
            }

            // Nested: first level is the category, second the subconcept,
            // third the query folders.
            for sub in sorted_dirs(&entry)? {
                let sub_name = dir_name(&sub);
                if sub_name.starts_with('.') {
                    continue;
                }
                for query_dir in sorted_dirs(&sub)? {
                    if dir_name(&query_dir).starts_with('.') || !has_video_files(&query_dir) {
                        continue;
                    }
                    if let Some(record) = self.scan_query_folder(&query_dir)? {
                        doc.upsert_query(&name, &sub_name, record);
                    }
                }
            }
        }

        Ok(doc)
    }

    /// Build one query record from a folder of videos.
    ///
    /// Thumbnails for the whole folder are dispatched as a batch first, so
    /// the per-record existence checks below see up-to-date state.
    fn scan_query_folder(&self, folder: &Path) -> Result<Option<QueryRecord>> {
        let started = Instant::now();

        let mut files: Vec<PathBuf> = WalkDir::new(folder)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file() && is_video_file(e.path()))
            .map(|e| e.path().to_path_buf())
            .collect();
        files.sort();

        if files.is_empty() {
            return Ok(None);
        }

        // Sidecar metadata is optional; a malformed one is skipped, the
        // folder still scans.
        let metadata = match SidecarMetadata::load(folder) {
            Ok(m) => m,
            Err(e) => {
                warn!("Ignoring sidecar in {}: {}", folder.display(), e);
                None
            }
        };

        // Resolve ids up front so the thumbnail batch and the records agree
        let entries: Vec<(PathBuf, String)> = files
            .into_iter()
            .map(|path| {
                let id = self.resolve_id(&path, metadata.as_ref());
                (path, id)
            })
            .collect();

        let jobs: Vec<ThumbJob> = entries
            .iter()
            .map(|(path, id)| ThumbJob {
                id: id.clone(),
                source: VideoSource::Local(path.clone()),
            })
            .collect();
        run_batch(self.generator, jobs, SCAN_THUMB_WORKERS);

        let mut videos: Vec<VideoRecord> = entries
            .iter()
            .map(|(path, id)| self.video_record(folder, path, id))
            .collect();
        videos.sort_by(|a, b| a.title.cmp(&b.title));

        let folder_key = self.folder_key(folder);
        Ok(Some(QueryRecord {
            query: dir_name(folder),
            folder: folder_key,
            timestamp: now_timestamp(),
            total_results: videos.len(),
            videos,
            is_annotation: false,
            processing_time: started.elapsed().as_secs_f64(),
        }))
    }

    fn resolve_id(&self, path: &Path, metadata: Option<&SidecarMetadata>) -> String {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let title = title_from_stem(
            path.file_stem().and_then(|s| s.to_str()).unwrap_or_default(),
        );

        if let Some(meta) = metadata {
            if let Some(external) = meta.resolve(filename, &title) {
                return external.to_string();
            }
        }
        stable_id(&path.to_string_lossy())
    }

    fn video_record(&self, folder: &Path, path: &Path, id: &str) -> VideoRecord {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();

        // Stat failures degrade to defaults; the file is still cataloged
        let (size, modified) = match fs::metadata(path) {
            Ok(meta) => {
                let modified = meta
                    .modified()
                    .unwrap_or_else(|_| SystemTime::now());
                (meta.len(), modified)
            }
            Err(e) => {
                debug!("Stat failed for {}: {}", path.display(), e);
                (0, SystemTime::now())
            }
        };
        let modified: DateTime<Local> = modified.into();

        let info = probe::probe_or_infer(path);
        let thumbnail = self
            .generator
            .asset_exists(id)
            .then(|| format!("{}/{}.jpg", THUMBS_FOLDER, id));

        let filepath = path
            .strip_prefix(folder)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");
        let url = self.serving_path(path);

        VideoRecord {
            id: id.to_string(),
            title: title_from_stem(stem),
            filename,
            filepath,
            duration: info.duration,
            resolution: info.resolution,
            file_size: human_file_size(size),
            modified: modified.format(TIMESTAMP_FORMAT).to_string(),
            tags: generate_tags(folder, path),
            thumbnail,
            url,
            local_path: Some(path.to_string_lossy().into_owned()),
            score: None,
            question: None,
            label: None,
            is_annotation: false,
        }
    }

    /// Discover annotation documents under the root and turn each into a
    /// placed query record. Thumbnails for remote sources run as one batch.
    pub fn scan_annotations(&self) -> Vec<PlacedQuery> {
        let mut placed = Vec::new();

        for entry in WalkDir::new(self.root)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let filename = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            if filename == RANKING_RESULTS_FILENAME || filename == QUERY_METADATA_FILENAME {
                continue;
            }

            match parse_annotation_file(self.root, path) {
                Ok(Some(source)) => placed.push(self.annotation_query(source)),
                Ok(None) => {}
                Err(e) => {
                    // One malformed document never aborts the scan
                    warn!("Skipping annotation source {}: {}", path.display(), e);
                }
            }
        }

        placed
    }

    fn annotation_query(&self, source: AnnotationSource) -> PlacedQuery {
        let started = Instant::now();

        let entries: Vec<(usize, String)> = source
            .records
            .iter()
            .enumerate()
            .map(|(i, r)| (i, annotation_video_id(&source.folder, r.video.as_deref(), i)))
            .collect();

        let jobs: Vec<ThumbJob> = entries
            .iter()
            .filter_map(|(i, id)| {
                let record = &source.records[*i];
                let location = record.video.as_deref()?;
                let src = if location.starts_with("http://") || location.starts_with("https://") {
                    VideoSource::Remote(location.to_string())
                } else {
                    VideoSource::Local(self.root.join(location))
                };
                Some(ThumbJob {
                    id: id.clone(),
                    source: src,
                })
            })
            .collect();
        run_batch(self.generator, jobs, ANNOTATION_THUMB_WORKERS);

        let mut videos: Vec<VideoRecord> = entries
            .iter()
            .map(|(i, id)| {
                let record = &source.records[*i];
                let url = record.video.clone().unwrap_or_default();
                // Query strings and fragments never belong in the filename
                let filename = url
                    .split(['?', '#'])
                    .next()
                    .unwrap_or_default()
                    .trim_end_matches('/')
                    .rsplit('/')
                    .next()
                    .unwrap_or_default()
                    .to_string();
                let stem = filename
                    .rsplit_once('.')
                    .map(|(s, _)| s)
                    .unwrap_or(filename.as_str())
                    .to_string();

                let local = {
                    let candidate = self.root.join(&url);
                    candidate.exists().then(|| candidate.to_string_lossy().into_owned())
                };

                let thumbnail = self
                    .generator
                    .asset_exists(id)
                    .then(|| format!("{}/{}.jpg", THUMBS_FOLDER, id));

                VideoRecord {
                    id: id.clone(),
                    title: title_from_stem(&stem),
                    filename,
                    filepath: String::new(),
                    duration: probe::infer_duration(&stem),
                    resolution: probe::infer_resolution(&stem),
                    file_size: "Unknown".to_string(),
                    modified: now_timestamp(),
                    tags: Vec::new(),
                    thumbnail,
                    url,
                    local_path: local,
                    score: Some(record.score),
                    question: record.question.clone(),
                    label: record.label.clone(),
                    is_annotation: true,
                }
            })
            .collect();

        // Annotation entries rank by confidence, best first
        videos.sort_by(|a, b| {
            b.score
                .unwrap_or(f64::MIN)
                .partial_cmp(&a.score.unwrap_or(f64::MIN))
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        PlacedQuery {
            category: source.category,
            subconcept: source.subconcept,
            record: QueryRecord {
                query: source.query,
                folder: source.folder,
                timestamp: now_timestamp(),
                total_results: videos.len(),
                videos,
                is_annotation: true,
                processing_time: started.elapsed().as_secs_f64(),
            },
        }
    }

    /// Collect ranking-result documents for the web layer, keyed by their
    /// folder relative to the root.
    pub fn collect_ranking_results(&self) -> std::collections::BTreeMap<String, serde_json::Value> {
        let mut results = std::collections::BTreeMap::new();

        for entry in WalkDir::new(self.root)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !path.is_file()
                || path.file_name().and_then(|n| n.to_str()) != Some(RANKING_RESULTS_FILENAME)
            {
                continue;
            }

            let data = match fs::read_to_string(path) {
                Ok(d) => d,
                Err(e) => {
                    warn!("Cannot read {}: {}", path.display(), e);
                    continue;
                }
            };
            match serde_json::from_str::<serde_json::Value>(&data) {
                Ok(value) => {
                    let key = path
                        .parent()
                        .and_then(|p| p.strip_prefix(self.root).ok())
                        .map(|p| p.to_string_lossy().replace('\\', "/"))
                        .unwrap_or_default();
                    results.insert(key, value);
                }
                Err(e) => warn!("Skipping {}: {}", path.display(), e),
            }
        }

        results
    }

    /// Folder key relative to the root, forward slashes.
    fn folder_key(&self, folder: &Path) -> String {
        folder
            .strip_prefix(self.root)
            .unwrap_or(folder)
            .to_string_lossy()
            .replace('\\', "/")
    }

    /// Root-relative serving path including the root folder name, the shape
    /// the web layer expects for its static file routes.
    fn serving_path(&self, path: &Path) -> String {
        let base = self.root.parent().unwrap_or(self.root);
        path.strip_prefix(base)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }
}

/// Recognized video file check (case-insensitive extension).
pub fn is_video_file(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str()),
        None => false,
    }
}

/// Any video files anywhere below this directory.
fn has_video_files(dir: &Path) -> bool {
    WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .any(|e| e.path().is_file() && is_video_file(e.path()))
}

/// Video files as immediate children of this directory.
fn has_direct_video_files(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .any(|e| e.path().is_file() && is_video_file(&e.path()))
        })
        .unwrap_or(false)
}

/// True when some child directory holds a grandchild directory with videos,
/// i.e. the category/subconcept/query layout.
fn has_nested_structure(dir: &Path) -> bool {
    let subs = match sorted_dirs(dir) {
        Ok(s) => s,
        Err(_) => return false,
    };
    for sub in subs {
        match sorted_dirs(&sub) {
            Ok(grandchildren) => {
                if grandchildren.iter().any(|g| has_video_files(g)) {
                    return true;
                }
            }
            Err(_) => continue,
        }
    }
    false
}

fn sorted_dirs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    Ok(dirs)
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string()
}

/// "sunset_beach-4k" -> "Sunset Beach 4k"
pub fn humanize_name(name: &str) -> String {
    title_from_stem(name)
}

/// Filename stem to display title: separators to spaces, words capitalized.
pub fn title_from_stem(stem: &str) -> String {
    stem.replace(['_', '-'], " ")
        .split_whitespace()
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Search tags for one video: query-folder words first, then the names of
/// intermediate folders (nearest first), then filename words with short and
/// non-descriptive ones filtered out. De-duplicated in order, capped, each
/// tag capitalized.
pub fn generate_tags(query_folder: &Path, path: &Path) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();

    let query_name = dir_name(query_folder).to_lowercase();
    tags.extend(query_name.split_whitespace().map(str::to_string));

    let rel = path.strip_prefix(query_folder).unwrap_or(path);
    let mut cursor = rel.parent();
    while let Some(parent) = cursor {
        if let Some(name) = parent.file_name().and_then(|n| n.to_str()) {
            tags.extend(name.to_lowercase().split_whitespace().map(str::to_string));
        }
        cursor = parent.parent();
    }

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_lowercase()
        .replace(['_', '-'], " ");
    for word in stem.split_whitespace() {
        if word.len() > 2 && !TAG_STOP_WORDS.contains(&word) {
            tags.push(word.to_string());
        }
    }

    let mut seen = std::collections::HashSet::new();
    let mut unique = Vec::new();
    for tag in tags {
        if seen.insert(tag.clone()) {
            unique.push(tag);
        }
        if unique.len() == MAX_VIDEO_TAGS {
            break;
        }
    }
    unique.iter().map(|t| capitalize(t)).collect()
}

#[cfg(test)]
mod tests;

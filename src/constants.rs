// Stockshelf constants
// Policy values shared across the pipeline. Keep in sync with the web viewer.

// Catalog artifacts
pub const CATALOG_FILENAME: &str = "scraped-data.json";
pub const THUMBS_FOLDER: &str = "thumbnails";
pub const UNCATEGORIZED: &str = "Uncategorized";

// Reserved filenames never treated as annotation sources
pub const RANKING_RESULTS_FILENAME: &str = "ranking_results.json";
pub const QUERY_METADATA_FILENAME: &str = "query_metadata.json";
pub const LABEL_EXPORT_FILENAME: &str = "exported_labels.json";
pub const LABEL_STORE_FILENAME: &str = "video_labels.json";

// Video extensions recognized during scans
pub const VIDEO_EXTENSIONS: [&str; 7] = ["mp4", "avi", "mov", "mkv", "webm", "flv", "wmv"];

// Thumbnail settings
pub const THUMB_WIDTH: u32 = 300;
pub const THUMB_HEIGHT: u32 = 180;
pub const THUMB_SEEK_SECONDS: u32 = 2;
pub const THUMB_LOCAL_TIMEOUT_SECS: u64 = 15;
pub const THUMB_REMOTE_TIMEOUT_SECS: u64 = 45;
pub const THUMB_MAX_ATTEMPTS: u32 = 3;
pub const THUMB_BACKOFF_BASE_SECS: f64 = 1.0;

// Worker pool ceilings
pub const SCAN_THUMB_WORKERS: usize = 4;
pub const ANNOTATION_THUMB_WORKERS: usize = 6;
pub const BULK_THUMB_WORKERS: usize = 8;

// Rate limiter
pub const RATE_WINDOW_SECS: u64 = 60;
pub const RATE_WINDOW_MAX_REQUESTS: usize = 10;
pub const RATE_LIMIT_COOLDOWN_SECS: u64 = 300;
pub const RATE_FLAGGED_DELAY_RANGE: (f64, f64) = (2.0, 5.0);
pub const RATE_BUSY_DELAY_RANGE: (f64, f64) = (0.5, 1.5);

// Tag derivation
pub const MAX_VIDEO_TAGS: usize = 8;
// Filename words carrying no descriptive value for search
pub const TAG_STOP_WORDS: [&str; 31] = [
    "video", "clip", "stock", "adobe", "the", "and", "or", "but", "in", "on", "at", "to",
    "for", "of", "with", "by", "from", "up", "about", "into", "through", "during", "before",
    "after", "above", "below", "between", "among", "entire", "complete", "full",
];

// Re-index loop
pub const DEBOUNCE_WINDOW_SECS: u64 = 1;

// Timestamp format used in catalog documents
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// Stable id length (hex chars of the blake3 digest)
pub const VIDEO_ID_LEN: usize = 8;

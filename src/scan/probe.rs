// Duration and resolution probing
//
// Prefers ffprobe when available; degrades to filename-pattern inference
// when the tool is missing or the container is unreadable.

use std::path::Path;
use std::process::Command;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::error::{Result, ShelfError};

/// Probed (or inferred) display attributes for one video.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoInfo {
    /// "M:SS"
    pub duration: String,
    /// "4K" | "1080p" | "720p" | "<n>p" | "HD" | "Unknown"
    pub resolution: String,
}

impl Default for VideoInfo {
    fn default() -> Self {
        Self {
            duration: "0:00".to_string(),
            resolution: "Unknown".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct FFprobeOutput {
    streams: Option<Vec<FFprobeStream>>,
    format: Option<FFprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FFprobeStream {
    codec_type: Option<String>,
    width: Option<i64>,
    height: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct FFprobeFormat {
    duration: Option<String>,
}

/// Probe a local file with ffprobe.
pub fn probe(path: &Path) -> Result<VideoInfo> {
    let output = Command::new(crate::tools::ffprobe_path())
        .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
        .arg(path)
        .output()
        .map_err(|e| ShelfError::FFprobe(format!("Failed to run ffprobe: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ShelfError::FFprobe(format!("ffprobe failed: {}", stderr)));
    }

    let probed: FFprobeOutput = serde_json::from_slice(&output.stdout)
        .map_err(|e| ShelfError::FFprobe(format!("Failed to parse ffprobe output: {}", e)))?;

    let duration = probed
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .and_then(|d| d.parse::<f64>().ok())
        .map(format_duration)
        .unwrap_or_else(|| "0:00".to_string());

    let height = probed
        .streams
        .as_ref()
        .and_then(|streams| {
            streams
                .iter()
                .find(|s| s.codec_type.as_deref() == Some("video"))
        })
        .and_then(|s| s.height);

    Ok(VideoInfo {
        duration,
        resolution: resolution_from_height(height),
    })
}

/// Probe with fallback: ffprobe first, filename patterns when it fails.
pub fn probe_or_infer(path: &Path) -> VideoInfo {
    match probe(path) {
        Ok(info) => info,
        Err(e) => {
            log::debug!("Probe failed for {}: {}, inferring from name", path.display(), e);
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default();
            VideoInfo {
                duration: infer_duration(stem),
                resolution: infer_resolution(stem),
            }
        }
    }
}

/// Format seconds as "M:SS".
pub fn format_duration(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

fn resolution_from_height(height: Option<i64>) -> String {
    match height {
        Some(h) if h >= 2160 => "4K".to_string(),
        Some(h) if h >= 1080 => "1080p".to_string(),
        Some(h) if h >= 720 => "720p".to_string(),
        Some(h) if h > 0 => format!("{}p", h),
        _ => "Unknown".to_string(),
    }
}

static DURATION_MIN_SEC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)m(\d+)s").unwrap());
static DURATION_MIN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)min").unwrap());
static DURATION_SEC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)s").unwrap());
static DURATION_COLON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,2}):(\d{2})").unwrap());

/// Infer a duration from filename patterns like "1m30s", "2min", "30s", "1:30".
pub fn infer_duration(stem: &str) -> String {
    let lower = stem.to_lowercase();

    if let Some(caps) = DURATION_MIN_SEC.captures(&lower) {
        let secs: u32 = caps[2].parse().unwrap_or(0);
        return format!("{}:{:02}", &caps[1], secs);
    }
    if let Some(caps) = DURATION_MIN.captures(&lower) {
        return format!("{}:00", &caps[1]);
    }
    if let Some(caps) = DURATION_SEC.captures(&lower) {
        let secs: u32 = caps[1].parse().unwrap_or(0);
        return format!("0:{:02}", secs);
    }
    if let Some(caps) = DURATION_COLON.captures(&lower) {
        return format!("{}:{}", &caps[1], &caps[2]);
    }

    "0:00".to_string()
}

/// Infer a resolution label from filename substrings.
pub fn infer_resolution(stem: &str) -> String {
    let lower = stem.to_lowercase();

    if lower.contains("4k") || lower.contains("uhd") || lower.contains("2160p") {
        "4K".to_string()
    } else if lower.contains("1080p") || lower.contains("fhd") {
        "1080p".to_string()
    } else if lower.contains("720p") {
        "720p".to_string()
    } else if lower.contains("480p") {
        "480P".to_string()
    } else if lower.contains("360p") {
        "360P".to_string()
    } else if lower.contains("hd") {
        "HD".to_string()
    } else {
        "Unknown".to_string()
    }
}

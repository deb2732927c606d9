// Thumbnail generation
//
// Extracts a single frame at the 2-second mark onto a fixed 300x180 canvas,
// aspect preserved with padding. Local files get a short ffmpeg timeout,
// remote URLs a longer one plus rate-limiter-directed pauses and retry with
// exponential backoff. This module never fails past its boundary: the worst
// outcome is a deterministic placeholder.

pub mod placeholder;
pub mod pool;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, warn};
use rand::Rng;

use crate::constants::{
    THUMB_BACKOFF_BASE_SECS, THUMB_HEIGHT, THUMB_LOCAL_TIMEOUT_SECS, THUMB_MAX_ATTEMPTS,
    THUMB_REMOTE_TIMEOUT_SECS, THUMB_SEEK_SECONDS, THUMB_WIDTH,
};
use crate::ratelimit::RateLimiter;

/// Where a video lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VideoSource {
    Local(PathBuf),
    Remote(String),
}

impl VideoSource {
    pub fn location(&self) -> String {
        match self {
            VideoSource::Local(p) => p.to_string_lossy().into_owned(),
            VideoSource::Remote(u) => u.clone(),
        }
    }

    fn timeout(&self) -> Duration {
        match self {
            VideoSource::Local(_) => Duration::from_secs(THUMB_LOCAL_TIMEOUT_SECS),
            VideoSource::Remote(_) => Duration::from_secs(THUMB_REMOTE_TIMEOUT_SECS),
        }
    }
}

/// How a thumbnail request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThumbStatus {
    /// Asset already existed, nothing invoked.
    AlreadyExists,
    /// Frame extracted by ffmpeg.
    Extracted,
    /// Placeholder written; `reason` says why extraction was skipped or gave up.
    Placeholder { reason: String },
}

/// Outcome for one video, always carrying a usable asset path.
#[derive(Debug, Clone)]
pub struct ThumbOutcome {
    pub id: String,
    pub path: PathBuf,
    pub status: ThumbStatus,
}

/// Generates `<id>.jpg` assets under a fixed thumbnails directory.
#[derive(Debug)]
pub struct ThumbnailGenerator {
    thumbs_dir: PathBuf,
    limiter: Arc<RateLimiter>,
}

impl ThumbnailGenerator {
    pub fn new(thumbs_dir: PathBuf, limiter: Arc<RateLimiter>) -> Self {
        Self { thumbs_dir, limiter }
    }

    pub fn thumbs_dir(&self) -> &Path {
        &self.thumbs_dir
    }

    pub fn asset_path(&self, id: &str) -> PathBuf {
        self.thumbs_dir.join(format!("{}.jpg", id))
    }

    pub fn asset_exists(&self, id: &str) -> bool {
        self.asset_path(id).exists()
    }

    /// Produce a thumbnail for one video. Idempotent: an existing asset is
    /// never regenerated. Never returns an error; failures degrade to a
    /// placeholder.
    pub fn generate(&self, source: &VideoSource, id: &str) -> ThumbOutcome {
        let out_path = self.asset_path(id);
        if out_path.exists() {
            return ThumbOutcome {
                id: id.to_string(),
                path: out_path,
                status: ThumbStatus::AlreadyExists,
            };
        }

        if let VideoSource::Local(path) = source {
            if !path.exists() {
                return self.fallback(id, out_path, "source file missing");
            }
        }

        if !crate::tools::is_tool_available("ffmpeg") {
            return self.fallback(id, out_path, "ffmpeg unavailable");
        }

        let mut last_error = String::new();
        for attempt in 0..THUMB_MAX_ATTEMPTS {
            if attempt > 0 {
                std::thread::sleep(backoff_delay(attempt));
            }

            if let VideoSource::Remote(url) = source {
                if self.limiter.should_delay(url) {
                    let pause = self.limiter.delay_for(url);
                    debug!("Rate limiter pause {:?} before {}", pause, url);
                    std::thread::sleep(pause);
                }
                self.limiter.record_request(url);
            }

            match extract_frame(source, &out_path) {
                Ok(()) => {
                    return ThumbOutcome {
                        id: id.to_string(),
                        path: out_path,
                        status: ThumbStatus::Extracted,
                    };
                }
                Err(stderr) => {
                    if is_rate_limit_error(&stderr) {
                        if let VideoSource::Remote(url) = source {
                            self.limiter.record_rate_limit(url);
                        }
                    }
                    warn!(
                        "Thumbnail attempt {}/{} failed for {}: {}",
                        attempt + 1,
                        THUMB_MAX_ATTEMPTS,
                        source.location(),
                        first_line(&stderr)
                    );
                    last_error = stderr;
                }
            }
        }

        self.fallback(id, out_path, &format!("retries exhausted: {}", first_line(&last_error)))
    }

    fn fallback(&self, id: &str, out_path: PathBuf, reason: &str) -> ThumbOutcome {
        let status = match placeholder::write_placeholder(id, &out_path) {
            Ok(()) => ThumbStatus::Placeholder {
                reason: reason.to_string(),
            },
            Err(e) => {
                // Even the placeholder failed; report the asset path anyway,
                // the viewer falls back to its own default art.
                warn!("Placeholder write failed for {}: {}", id, e);
                ThumbStatus::Placeholder {
                    reason: format!("{} (placeholder write failed: {})", reason, e),
                }
            }
        };
        ThumbOutcome {
            id: id.to_string(),
            path: out_path,
            status,
        }
    }
}

/// Classify ffmpeg diagnostics for rate-limit conditions.
fn is_rate_limit_error(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    lower.contains("429") || lower.contains("too many requests") || lower.contains("rate limit")
}

fn first_line(s: &str) -> &str {
    s.lines().next().unwrap_or("").trim()
}

/// Exponential backoff with jitter: base * 2^(attempt-1) + [0,0.5)s.
fn backoff_delay(attempt: u32) -> Duration {
    let base = THUMB_BACKOFF_BASE_SECS * f64::from(1u32 << (attempt - 1));
    let jitter: f64 = rand::thread_rng().gen_range(0.0..0.5);
    Duration::from_secs_f64(base + jitter)
}

/// Run ffmpeg to extract one padded frame, bounded by the source's timeout.
/// Returns the tool's stderr on failure.
fn extract_frame(source: &VideoSource, out_path: &Path) -> std::result::Result<(), String> {
    if let Some(parent) = out_path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            return Err(format!("cannot create thumbnails dir: {}", e));
        }
    }

    let tmp_path = out_path.with_extension("tmp.jpg");
    let filter = format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2",
        w = THUMB_WIDTH,
        h = THUMB_HEIGHT
    );

    let mut cmd = Command::new(crate::tools::ffmpeg_path());
    cmd.args(["-y", "-ss", &format!("00:00:{:02}", THUMB_SEEK_SECONDS), "-i"])
        .arg(source.location())
        .args(["-vframes", "1", "-vf", &filter])
        .arg(&tmp_path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped());

    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => return Err(format!("failed to spawn ffmpeg: {}", e)),
    };

    // Drain stderr on a side thread so a chatty ffmpeg cannot block on a
    // full pipe while we poll for completion.
    let mut stderr_pipe = child.stderr.take();
    let reader = std::thread::spawn(move || {
        let mut buf = String::new();
        if let Some(pipe) = stderr_pipe.as_mut() {
            let _ = pipe.read_to_string(&mut buf);
        }
        buf
    });

    let deadline = Instant::now() + source.timeout();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break Some(status),
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    break None;
                }
                std::thread::sleep(Duration::from_millis(100));
            }
            Err(e) => {
                let _ = child.kill();
                let _ = std::fs::remove_file(&tmp_path);
                return Err(format!("wait failed: {}", e));
            }
        }
    };

    let stderr = reader.join().unwrap_or_default();

    let status = match status {
        Some(s) => s,
        None => {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(format!("timed out after {:?}", source.timeout()));
        }
    };

    if !status.success() {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(stderr);
    }

    // Guard against zero-byte output from a "successful" run
    match std::fs::metadata(&tmp_path) {
        Ok(m) if m.len() > 0 => {}
        _ => {
            let _ = std::fs::remove_file(&tmp_path);
            return Err("ffmpeg produced no output".to_string());
        }
    }

    std::fs::rename(&tmp_path, out_path).map_err(|e| format!("rename failed: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::{RateLimiter, SystemClock};
    use tempfile::TempDir;

    fn generator(tmp: &TempDir) -> ThumbnailGenerator {
        ThumbnailGenerator::new(
            tmp.path().join("thumbnails"),
            Arc::new(RateLimiter::new(Arc::new(SystemClock))),
        )
    }

    #[test]
    fn test_missing_local_file_yields_placeholder() {
        let tmp = TempDir::new().unwrap();
        let gen = generator(&tmp);
        let source = VideoSource::Local(tmp.path().join("nope.mp4"));

        let outcome = gen.generate(&source, "vid00001");
        assert!(matches!(outcome.status, ThumbStatus::Placeholder { .. }));
        assert!(outcome.path.exists());
    }

    #[test]
    fn test_existing_asset_is_noop() {
        let tmp = TempDir::new().unwrap();
        let gen = generator(&tmp);
        let source = VideoSource::Local(tmp.path().join("nope.mp4"));

        let first = gen.generate(&source, "vid00002");
        assert!(first.path.exists());
        let before = std::fs::metadata(&first.path).unwrap().modified().unwrap();

        let second = gen.generate(&source, "vid00002");
        assert_eq!(second.status, ThumbStatus::AlreadyExists);
        let after = std::fs::metadata(&second.path).unwrap().modified().unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_rate_limit_classification() {
        assert!(is_rate_limit_error("HTTP error 429 Too Many Requests"));
        assert!(is_rate_limit_error("server said: rate limit exceeded"));
        assert!(!is_rate_limit_error("No such file or directory"));
    }

    #[test]
    fn test_backoff_grows() {
        let d1 = backoff_delay(1);
        let d2 = backoff_delay(2);
        assert!(d1 >= Duration::from_secs_f64(THUMB_BACKOFF_BASE_SECS));
        assert!(d2 >= Duration::from_secs_f64(THUMB_BACKOFF_BASE_SECS * 2.0));
        assert!(d2 < Duration::from_secs_f64(THUMB_BACKOFF_BASE_SECS * 2.0 + 0.5));
    }
}

// Change-triggered re-index loop
//
// Two states: idle and reindexing. Any filesystem mutation under the root is
// a trigger; triggers arriving less than the debounce window after the last
// completed cycle are dropped, so event bursts collapse into one pass. A
// failed cycle is logged and the loop keeps running; the next trigger gets a
// fresh attempt. Shutdown lets an in-flight cycle finish so the persisted
// document is never torn.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};

use crate::catalog::merge;
use crate::catalog::{load_document, persist_document, CatalogDocument};
use crate::constants::DEBOUNCE_WINDOW_SECS;
use crate::error::Result;
use crate::scan::Scanner;
use crate::thumbs::ThumbnailGenerator;
use crate::ShelfConfig;

/// A change notification from the watcher. The loop only cares that
/// something changed; the path is for logging.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub path: Option<PathBuf>,
}

/// Debounce policy: re-index only when the last completed cycle is at least
/// a full window in the past.
pub fn should_reindex(since_last_completed: Duration) -> bool {
    since_last_completed >= Duration::from_secs(DEBOUNCE_WINDOW_SECS)
}

/// One full scan -> merge -> persist cycle. Returns the number of queries
/// in the persisted document.
///
/// Fresh entries are folded over the previously persisted document, so
/// entries the current scan does not mention survive the cycle. An
/// unreadable prior document is logged and treated as empty.
pub fn run_cycle(config: &ShelfConfig, generator: &ThumbnailGenerator) -> Result<usize> {
    if !config.root.is_dir() {
        return Err(crate::ShelfError::RootNotFound(config.root.clone()));
    }
    let scanner = Scanner::new(&config.root, generator);
    let scanned = scanner.scan_tree()?;
    let annotations = scanner.scan_annotations();
    let fresh = merge::combine(scanned, annotations);

    let previous = match load_document(&config.catalog_path) {
        Ok(doc) => doc,
        Err(e) => {
            warn!(
                "Ignoring unreadable prior catalog {}: {}",
                config.catalog_path.display(),
                e
            );
            CatalogDocument::default()
        }
    };
    let doc = merge::fold_into_previous(previous, fresh);
    persist_document(&config.catalog_path, &doc)?;
    Ok(doc.query_count())
}

/// Watch the root and re-index on changes until `shutdown` is set.
///
/// Runs one initial cycle up front so consumers have a document before the
/// first filesystem event arrives.
pub fn run_monitor(
    config: &ShelfConfig,
    generator: &ThumbnailGenerator,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    let (tx, rx) = mpsc::channel::<ChangeEvent>();

    let mut watcher: RecommendedWatcher = notify::recommended_watcher(
        move |res: std::result::Result<notify::Event, notify::Error>| match res {
            Ok(event) => {
                let change = ChangeEvent {
                    path: event.paths.first().cloned(),
                };
                // Receiver gone means we are shutting down
                let _ = tx.send(change);
            }
            Err(e) => error!("Watch error: {}", e),
        },
    )?;
    watcher.watch(&config.root, RecursiveMode::Recursive)?;
    info!("Watching {} for changes", config.root.display());

    let mut last_completed: Option<Instant> = None;

    // Initial pass
    match run_cycle(config, generator) {
        Ok(count) => {
            info!("Initial index complete: {} queries", count);
            last_completed = Some(Instant::now());
        }
        Err(e) => error!("Initial index failed: {}", e),
    }

    while !shutdown.load(Ordering::SeqCst) {
        let event = match rx.recv_timeout(Duration::from_millis(250)) {
            Ok(event) => event,
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        };

        if let Some(completed) = last_completed {
            if !should_reindex(completed.elapsed()) {
                debug!("Debounced change event: {:?}", event.path);
                continue;
            }
        }

        debug!("Change detected: {:?}", event.path);
        match run_cycle(config, generator) {
            Ok(count) => {
                info!("Re-index complete: {} queries", count);
            }
            Err(e) => {
                // Contained: the prior persisted document stays valid
                error!("Re-index cycle failed: {}", e);
            }
        }
        last_completed = Some(Instant::now());
    }

    info!("Monitor stopped");
    Ok(())
}

// Stockshelf - library entry point
//
// Watches a downloads tree of stock video footage, builds a hierarchical
// catalog document for the web viewer, and keeps preview thumbnails
// generated out-of-band.

pub mod catalog;
pub mod constants;
pub mod error;
pub mod ids;
pub mod monitor;
pub mod ratelimit;
pub mod scan;
pub mod thumbs;
pub mod tools;

use std::path::PathBuf;

use constants::{CATALOG_FILENAME, THUMBS_FOLDER};

pub use error::{Result, ShelfError};

/// Resolved locations for one watched root.
#[derive(Debug, Clone)]
pub struct ShelfConfig {
    /// The directory tree being watched.
    pub root: PathBuf,
    /// Where the catalog document is persisted.
    pub catalog_path: PathBuf,
    /// Where thumbnail assets live.
    pub thumbs_dir: PathBuf,
}

impl ShelfConfig {
    /// Defaults: catalog and thumbnails live next to the root, so writes to
    /// them do not feed back into the watcher.
    pub fn for_root(root: PathBuf) -> Self {
        let base = root
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| root.clone());
        Self {
            catalog_path: base.join(CATALOG_FILENAME),
            thumbs_dir: base.join(THUMBS_FOLDER),
            root,
        }
    }

    pub fn with_catalog_path(mut self, path: PathBuf) -> Self {
        self.catalog_path = path;
        self
    }

    pub fn with_thumbs_dir(mut self, dir: PathBuf) -> Self {
        self.thumbs_dir = dir;
        self
    }
}

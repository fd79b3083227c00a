//! Filesystem monitoring and change detection
//!
//! Raw notifications pass through three stages before the engine sees them:
//! - [`ChangeFilter`] drops VCS-internal, OS metadata and ignored paths
//! - [`DuplicateSuppressor`] collapses bursts for one path into one signal
//! - [`DiffFingerprinter`] drops events that left the diff unchanged

pub mod filter;
pub mod fingerprint;
pub mod suppressor;
pub mod watcher;

pub use filter::ChangeFilter;
pub use fingerprint::DiffFingerprinter;
pub use suppressor::DuplicateSuppressor;
pub use watcher::{FileWatcher, WatcherConfig};

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::SystemTime;

/// Represents a detected filesystem change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: PathBuf,
    pub change_type: ChangeType,
    pub timestamp: SystemTime,
}

impl FileChange {
    pub fn new(path: impl Into<PathBuf>, change_type: ChangeType) -> Self {
        Self {
            path: path.into(),
            change_type,
            timestamp: SystemTime::now(),
        }
    }
}

/// Types of filesystem changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Created,
    Modified,
    Deleted,
}

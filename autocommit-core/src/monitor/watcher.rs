//! Core file system watcher implementation using notify crate

use crate::monitor::{ChangeFilter, ChangeType, FileChange};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Configuration for the file watcher
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub root: PathBuf,
    pub recursive: bool,
    pub ignore_patterns: Vec<String>,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            recursive: true,
            ignore_patterns: Vec::new(),
        }
    }
}

/// Watches a working tree and forwards actionable changes
///
/// Events are filtered here so ignored paths never reach the engine mailbox.
/// The watcher stops when this value is dropped.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    root: PathBuf,
}

impl FileWatcher {
    /// Start watching; changes are delivered on the returned receiver
    pub fn start(
        config: WatcherConfig,
    ) -> notify::Result<(Self, mpsc::UnboundedReceiver<FileChange>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let filter = ChangeFilter::with_patterns(&config.root, &config.ignore_patterns);
        let filter = Arc::new(filter);

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for change in process_event(event, &filter) {
                    if let Err(e) = tx.send(change) {
                        debug!("Change receiver closed: {}", e);
                    }
                }
            }
            Err(e) => error!("Watch error: {:?}", e),
        })?;

        let mode = if config.recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        watcher.watch(&config.root, mode)?;
        info!(
            "Watching path: {:?} (recursive: {})",
            config.root, config.recursive
        );

        let watcher = Self {
            _watcher: watcher,
            root: config.root,
        };
        Ok((watcher, rx))
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }
}

/// Map a notify event to zero or more changes
fn process_event(event: Event, filter: &ChangeFilter) -> Vec<FileChange> {
    let change_type = match event.kind {
        EventKind::Create(_) => ChangeType::Created,
        EventKind::Remove(_) => ChangeType::Deleted,
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => ChangeType::Deleted,
        EventKind::Modify(_) => ChangeType::Modified,
        _ => return Vec::new(),
    };

    // A rename pair reports [from, to]; only the destination matters
    let paths = match event.kind {
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            event.paths.last().cloned().into_iter().collect()
        }
        _ => event.paths,
    };

    paths
        .into_iter()
        .filter(|path| !filter.is_ignored(path))
        .map(|path| FileChange::new(path, change_type))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange};
    use tempfile::TempDir;
    use tokio::time::{Duration, timeout};

    #[test]
    fn test_process_event_filters_vcs_paths() {
        let filter = ChangeFilter::new("/repo");
        let event = Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path(PathBuf::from("/repo/.git/index.lock"))
            .add_path(PathBuf::from("/repo/src/lib.rs"));

        let changes = process_event(event, &filter);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].path, PathBuf::from("/repo/src/lib.rs"));
        assert_eq!(changes[0].change_type, ChangeType::Modified);
    }

    #[test]
    fn test_rename_reports_destination() {
        let filter = ChangeFilter::new("/repo");
        let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(PathBuf::from("/repo/old.rs"))
            .add_path(PathBuf::from("/repo/new.rs"));

        let changes = process_event(event, &filter);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].path, PathBuf::from("/repo/new.rs"));
    }

    #[test]
    fn test_access_events_ignored() {
        let filter = ChangeFilter::new("/repo");
        let event = Event::new(EventKind::Access(notify::event::AccessKind::Any))
            .add_path(PathBuf::from("/repo/src/lib.rs"));
        assert!(process_event(event, &filter).is_empty());

        let event = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/repo/.DS_Store"));
        assert!(process_event(event, &filter).is_empty());
    }

    #[tokio::test]
    async fn test_file_watcher_detects_changes() {
        let temp_dir = TempDir::new().unwrap();
        let config = WatcherConfig {
            root: temp_dir.path().to_path_buf(),
            ..Default::default()
        };

        let (_watcher, mut rx) = FileWatcher::start(config).unwrap();
        std::fs::write(temp_dir.path().join("test.md"), "test content").unwrap();

        // Backends differ in latency; only check what arrives
        if let Ok(Some(change)) = timeout(Duration::from_secs(2), rx.recv()).await {
            assert!(change.path.ends_with("test.md"));
        }
    }
}

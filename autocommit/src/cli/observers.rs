//! State observers used by the CLI surface

use autocommit_core::engine::{ActivityKind, OrchestrationState, StateObserver, StateSnapshot};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::fs;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Renders state changes to the log
///
/// Only differences from the previously seen snapshot are printed, so a
/// countdown shows one line per second and history entries appear once.
#[derive(Default)]
pub struct LogObserver {
    last: Mutex<Option<StateSnapshot>>,
}

impl StateObserver for LogObserver {
    fn on_state_change(&self, snapshot: &StateSnapshot) {
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let previous = last.take().unwrap_or_default();

        if snapshot.countdown_remaining != previous.countdown_remaining {
            if let Some(remaining) = snapshot.countdown_remaining {
                info!("Committing in {}s (Ctrl-C to cancel)", remaining);
            }
        }

        if snapshot.pending_commit != previous.pending_commit {
            debug!("Pending commit: {}", snapshot.pending_commit);
        }

        // History is most-recent-first; print everything newer than the last seen head
        let new_entries = snapshot
            .history
            .iter()
            .take_while(|entry| previous.latest() != Some(*entry))
            .collect::<Vec<_>>();
        for entry in new_entries.into_iter().rev() {
            match entry.kind {
                ActivityKind::Error => error!("{}", entry.message),
                ActivityKind::AiAnalysis => info!("Advisor: {}", entry.message),
                _ => info!("{}", entry.message),
            }
            if let Some(details) = &entry.details {
                debug!("  {}", details);
            }
        }

        *last = Some(snapshot.clone());
    }
}

/// Mirrors the latest snapshot into a JSON file for `autocommit status`
///
/// Runs on its own task and writes with `tokio::fs`, so countdown ticks never
/// block a runtime worker. Snapshots that arrive during a write are coalesced.
#[derive(Debug, Clone)]
pub struct SnapshotFileObserver {
    path: PathBuf,
}

impl SnapshotFileObserver {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Write every new revision until the state is dropped
    pub fn spawn(self, state: &OrchestrationState) -> JoinHandle<()> {
        let mut rx = state.subscribe();
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let snapshot = rx.borrow_and_update().clone();
                self.write(&snapshot).await;
            }
        })
    }

    pub async fn write(&self, snapshot: &StateSnapshot) {
        let json = match serde_json::to_string_pretty(snapshot) {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize state snapshot: {}", e);
                return;
            }
        };
        if let Some(parent) = self.path.parent() {
            if let Err(e) = fs::create_dir_all(parent).await {
                warn!("Failed to create {:?}: {}", parent, e);
                return;
            }
        }
        if let Err(e) = fs::write(&self.path, json).await {
            warn!("Failed to write {:?}: {}", self.path, e);
        }
    }
}

/// Read a snapshot written by [`SnapshotFileObserver`]
pub async fn read_snapshot(path: &Path) -> anyhow::Result<Option<StateSnapshot>> {
    if !fs::try_exists(path).await? {
        return Ok(None);
    }
    let content = fs::read_to_string(path).await?;
    Ok(Some(serde_json::from_str(&content)?))
}

//! Shared orchestration state
//!
//! One record holds everything outer surfaces display. Every mutation goes
//! through the same `watch::Sender`, which serializes writers and wakes
//! observers without ever blocking the engine.

use super::WatchMode;
use crate::advisor::{CommitDecision, CommitThreshold, Completeness, Significance};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::trace;

/// Number of history entries retained
pub const HISTORY_CAPACITY: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    FileChange,
    AiAnalysis,
    Commit,
    Error,
    WatchStart,
    WatchStop,
}

/// Why a commit was made
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitReason {
    Manual,
    Periodic,
    BufferTimeout,
    AiDecision,
}

/// Advisor verdict as recorded in history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiAnalysis {
    pub should_commit: bool,
    pub significance: Significance,
    pub completeness: Option<Completeness>,
    pub change_type: Option<String>,
    pub reasoning: String,
}

impl From<&CommitDecision> for AiAnalysis {
    fn from(decision: &CommitDecision) -> Self {
        Self {
            should_commit: decision.should_commit,
            significance: decision.significance,
            completeness: decision.completeness,
            change_type: decision.change_type.clone(),
            reasoning: decision.reason.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitMetadata {
    pub reason: CommitReason,
    pub mode: WatchMode,
    pub buffer_time_seconds: u32,
    pub auto_push: bool,
    pub threshold: Option<CommitThreshold>,
    pub changed_files: Vec<PathBuf>,
    pub diff_summary: String,
    pub ai_analysis: Option<AiAnalysis>,
}

/// One immutable line of activity history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityHistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub kind: ActivityKind,
    pub message: String,
    pub details: Option<String>,
    pub commit_metadata: Option<CommitMetadata>,
}

impl ActivityHistoryEntry {
    pub fn new(kind: ActivityKind, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            message: message.into(),
            details: None,
            commit_metadata: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_commit(mut self, metadata: CommitMetadata) -> Self {
        self.commit_metadata = Some(metadata);
        self
    }
}

/// Read-only copy of the orchestration state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSnapshot {
    /// Incremented on every mutation
    pub revision: u64,
    pub is_watching: bool,
    pub changed_file_paths: BTreeSet<PathBuf>,
    pub last_change_at: Option<DateTime<Utc>>,
    pub last_commit_at: Option<DateTime<Utc>>,
    pub pending_commit: bool,
    pub countdown_remaining: Option<u32>,
    /// Most recent first
    pub history: VecDeque<ActivityHistoryEntry>,
}

impl StateSnapshot {
    pub fn files_changed_count(&self) -> usize {
        self.changed_file_paths.len()
    }

    pub fn latest(&self) -> Option<&ActivityHistoryEntry> {
        self.history.front()
    }
}

/// Partial update; `Some` fields replace, `None` fields are retained
#[derive(Debug, Clone, Default)]
pub struct StateUpdate {
    pub is_watching: Option<bool>,
    pub pending_commit: Option<bool>,
    pub countdown_remaining: Option<Option<u32>>,
    pub last_change_at: Option<DateTime<Utc>>,
    pub last_commit_at: Option<DateTime<Utc>>,
    pub changed_file_paths: Option<BTreeSet<PathBuf>>,
}

impl StateUpdate {
    fn apply(self, state: &mut StateSnapshot) {
        if let Some(v) = self.is_watching {
            state.is_watching = v;
        }
        if let Some(v) = self.pending_commit {
            state.pending_commit = v;
        }
        if let Some(v) = self.countdown_remaining {
            state.countdown_remaining = v;
        }
        if let Some(v) = self.last_change_at {
            state.last_change_at = Some(v);
        }
        if let Some(v) = self.last_commit_at {
            state.last_commit_at = Some(v);
        }
        if let Some(v) = self.changed_file_paths {
            state.changed_file_paths = v;
        }
    }
}

/// Owner of the single shared state record
#[derive(Debug, Clone)]
pub struct OrchestrationState {
    tx: Arc<watch::Sender<StateSnapshot>>,
}

impl Default for OrchestrationState {
    fn default() -> Self {
        Self::new()
    }
}

impl OrchestrationState {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(StateSnapshot::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn snapshot(&self) -> StateSnapshot {
        self.tx.borrow().clone()
    }

    /// Receiver that wakes after every mutation
    pub fn subscribe(&self) -> watch::Receiver<StateSnapshot> {
        self.tx.subscribe()
    }

    /// Merge a partial update
    pub fn update(&self, update: StateUpdate) {
        self.modify(|state| update.apply(state));
    }

    /// Prepend a history entry, dropping the oldest beyond capacity
    pub fn append_history(&self, entry: ActivityHistoryEntry) {
        self.modify(|state| push_history(state, entry));
    }

    /// Record an actionable change to `path`
    pub fn record_change(&self, path: PathBuf) {
        self.modify(|state| {
            state.last_change_at = Some(Utc::now());
            let message = format!("File changed: {}", path.display());
            state.changed_file_paths.insert(path);
            let entry = ActivityHistoryEntry::new(ActivityKind::FileChange, message);
            push_history(state, entry);
        });
    }

    /// Reset the session and mark it watching
    pub fn start_watching(&self, mode: WatchMode) {
        self.modify(|state| {
            reset_session(state);
            state.is_watching = true;
            let message = format!("Started watching ({} mode)", mode);
            let entry = ActivityHistoryEntry::new(ActivityKind::WatchStart, message);
            push_history(state, entry);
        });
    }

    pub fn stop_watching(&self) {
        self.modify(|state| {
            reset_session(state);
            state.is_watching = false;
            let entry = ActivityHistoryEntry::new(ActivityKind::WatchStop, "Stopped watching");
            push_history(state, entry);
        });
    }

    /// Clear the changed-file set and pending flag after a commit
    pub fn complete_commit(&self, entry: ActivityHistoryEntry) {
        self.modify(|state| {
            state.changed_file_paths.clear();
            state.pending_commit = false;
            state.countdown_remaining = None;
            state.last_commit_at = Some(entry.timestamp);
            push_history(state, entry);
        });
    }

    /// Apply several changes as one mutation
    pub fn modify(&self, f: impl FnOnce(&mut StateSnapshot)) {
        self.tx.send_modify(|state| {
            f(state);
            state.revision += 1;
            trace!("State revision {}", state.revision);
        });
    }
}

fn push_history(state: &mut StateSnapshot, entry: ActivityHistoryEntry) {
    state.history.push_front(entry);
    state.history.truncate(HISTORY_CAPACITY);
}

fn reset_session(state: &mut StateSnapshot) {
    state.changed_file_paths.clear();
    state.pending_commit = false;
    state.countdown_remaining = None;
    state.last_change_at = None;
}

/// Receives every state change
pub trait StateObserver: Send + Sync + 'static {
    fn on_state_change(&self, snapshot: &StateSnapshot);
}

/// Run `observer` on its own task until the state is dropped
///
/// Observers that fall behind see the latest snapshot; intermediate
/// revisions are coalesced rather than queued.
pub fn spawn_observer<O: StateObserver>(
    state: &OrchestrationState,
    observer: O,
) -> JoinHandle<()> {
    let mut rx = state.subscribe();
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let snapshot = rx.borrow_and_update().clone();
            observer.on_state_change(&snapshot);
        }
    })
}

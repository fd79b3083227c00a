//! Change-to-commit orchestration engine
//!
//! The engine turns a stream of file changes into well-timed commits:
//! - [`ActivityScheduler`] decides when a burst of edits has settled
//! - [`CommitDecisionGate`] optionally asks an advisor whether to commit
//! - [`BufferCountdown`] gives a window to cancel before anything is written
//! - [`CommitExecutor`] stages, commits and pushes with bounded retry
//!
//! All of it is driven by a single actor ([`Engine`]); outer surfaces observe
//! [`OrchestrationState`] and the [`EngineNotice`] stream but never mutate.

pub mod countdown;
pub mod decision_gate;
pub mod executor;
pub mod orchestrator;
pub mod scheduler;
pub mod state;
pub mod timer;


pub use countdown::{
    BufferCountdown, CancelReason, CountdownOutcome, PendingCommitHandle, SurfaceGuard,
};
pub use decision_gate::{CommitDecisionGate, GateOutcome};
pub use executor::{CommitExecutor, CommitFailure, CommitSuccess, RecoveryOption, RetryPolicy};
pub use orchestrator::{Engine, EngineHandle};
pub use scheduler::{ActivityScheduler, FireOutcome, SchedulerPhase, SchedulingStrategy};
pub use state::{
    ActivityHistoryEntry, ActivityKind, AiAnalysis, CommitMetadata, CommitReason,
    OrchestrationState, StateObserver, StateSnapshot, StateUpdate,
};
pub use timer::Timer;

use crate::advisor::{CommitThreshold, Significance};
use crate::vcs::VcsError;
use crate::vcs::commit_builder::DEFAULT_COMMIT_MESSAGE;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Scheduling strategy selected for a watch session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatchMode {
    #[default]
    Periodic,
    Intelligent,
}

impl fmt::Display for WatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchMode::Periodic => write!(f, "periodic"),
            WatchMode::Intelligent => write!(f, "intelligent"),
        }
    }
}

/// Fixed-delay debounce settings
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodicPolicy {
    pub debounce: Duration,
    pub buffer_time_seconds: u32,
    pub cancel_on_new_changes: bool,
}

impl Default for PeriodicPolicy {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(30_000),
            buffer_time_seconds: 0,
            cancel_on_new_changes: true,
        }
    }
}

/// Activity-settle settings with a cooldown floor
#[derive(Debug, Clone, PartialEq)]
pub struct IntelligentCommitPolicy {
    pub commit_threshold: CommitThreshold,
    pub min_time_between_commits: Duration,
    pub activity_settle_time: Duration,
    pub require_completeness: bool,
    pub buffer_time_seconds: u32,
    pub cancel_on_new_changes: bool,
}

impl Default for IntelligentCommitPolicy {
    fn default() -> Self {
        Self {
            commit_threshold: CommitThreshold::Medium,
            min_time_between_commits: Duration::from_millis(1_800_000),
            activity_settle_time: Duration::from_millis(300_000),
            require_completeness: true,
            buffer_time_seconds: 30,
            cancel_on_new_changes: true,
        }
    }
}

/// Immutable engine settings, fixed for one watch session
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub mode: WatchMode,
    pub auto_push: bool,
    pub default_message: String,
    pub periodic: PeriodicPolicy,
    pub intelligent: IntelligentCommitPolicy,
    pub suppression_window: Duration,
    pub retry: RetryPolicy,
    pub retry_later_delay: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: WatchMode::Periodic,
            auto_push: false,
            default_message: DEFAULT_COMMIT_MESSAGE.to_string(),
            periodic: PeriodicPolicy::default(),
            intelligent: IntelligentCommitPolicy::default(),
            suppression_window: crate::monitor::suppressor::DEFAULT_WINDOW,
            retry: RetryPolicy::default(),
            retry_later_delay: Duration::from_secs(300),
        }
    }
}

impl EngineConfig {
    pub fn buffer_time_seconds(&self) -> u32 {
        match self.mode {
            WatchMode::Periodic => self.periodic.buffer_time_seconds,
            WatchMode::Intelligent => self.intelligent.buffer_time_seconds,
        }
    }

    pub fn cancel_on_new_changes(&self) -> bool {
        match self.mode {
            WatchMode::Periodic => self.periodic.cancel_on_new_changes,
            WatchMode::Intelligent => self.intelligent.cancel_on_new_changes,
        }
    }

    pub fn threshold(&self) -> Option<CommitThreshold> {
        match self.mode {
            WatchMode::Periodic => None,
            WatchMode::Intelligent => Some(self.intelligent.commit_threshold),
        }
    }

    pub fn strategy(&self) -> SchedulingStrategy {
        match self.mode {
            WatchMode::Periodic => SchedulingStrategy::Periodic {
                debounce: self.periodic.debounce,
            },
            WatchMode::Intelligent => SchedulingStrategy::Intelligent {
                settle: self.intelligent.activity_settle_time,
                min_between_commits: self.intelligent.min_time_between_commits,
            },
        }
    }
}

/// Something outer surfaces may want to react to
#[derive(Debug, Clone)]
pub enum EngineNotice {
    CountdownStarted {
        handle_id: Uuid,
        message: String,
        seconds: u32,
    },
    Committed {
        commit_id: String,
        message: String,
        pushed: bool,
        reason: CommitReason,
    },
    Skipped {
        reason: String,
        significance: Significance,
    },
    Cancelled {
        reason: CancelReason,
    },
    CommitFailed {
        failure: CommitFailure,
        reason: CommitReason,
    },
}

/// Errors surfaced by the engine itself
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Engine is not running")]
    Stopped,

    #[error("A commit is already in progress")]
    Busy,

    #[error("Nothing to commit")]
    NothingToCommit,

    #[error("Commit failed: {0}")]
    CommitFailed(#[from] CommitFailure),

    #[error("Not a git repository: {0}")]
    NotARepository(PathBuf),

    #[error("Version control error: {0}")]
    Vcs(#[from] VcsError),

    #[error("File watcher error: {0}")]
    Watcher(#[from] notify::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;

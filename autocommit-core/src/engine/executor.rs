//! Stage, commit and push with bounded retry
//!
//! A failing step retries the whole sequence. Once this run has created its
//! commit the commit step is not repeated, so a push failure never produces a
//! second commit on retry.

use super::state::{ActivityHistoryEntry, ActivityKind, OrchestrationState};
use crate::vcs::{Repository, VcsError};
use std::fmt;
use std::time::Duration;
use tracing::{error, info, warn};

/// Attempt count and backoff for the commit sequence
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Wait after failed attempt `attempt` (1-based): 1s, 2s, 4s, ...
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitStep {
    Stage,
    Commit,
    Push,
}

impl fmt::Display for CommitStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitStep::Stage => write!(f, "stage"),
            CommitStep::Commit => write!(f, "commit"),
            CommitStep::Push => write!(f, "push"),
        }
    }
}

/// Ways an outer surface can help after a terminal failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryOption {
    ViewOutput,
    RetryLater,
    OpenTerminal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSuccess {
    pub commit_id: String,
    pub message: String,
    pub pushed: bool,
    pub attempts: u32,
}

/// Terminal failure after retries were exhausted
#[derive(Debug, Clone)]
pub struct CommitFailure {
    pub message: String,
    pub push: bool,
    pub attempts: u32,
    pub step: CommitStep,
    pub last_error: VcsError,
    /// Commit created before a later step failed
    pub commit_id: Option<String>,
}

impl CommitFailure {
    pub fn output(&self) -> Option<String> {
        self.last_error.output()
    }

    pub fn recovery_options(&self) -> Vec<RecoveryOption> {
        let mut options = Vec::with_capacity(3);
        if self.output().is_some() {
            options.push(RecoveryOption::ViewOutput);
        }
        options.push(RecoveryOption::RetryLater);
        options.push(RecoveryOption::OpenTerminal);
        options
    }
}

impl fmt::Display for CommitFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} failed after {} attempts: {}",
            self.step, self.attempts, self.last_error
        )
    }
}

impl std::error::Error for CommitFailure {}

pub struct CommitExecutor {
    repo: Repository,
    state: OrchestrationState,
    policy: RetryPolicy,
}

impl CommitExecutor {
    pub fn new(repo: Repository, state: OrchestrationState, policy: RetryPolicy) -> Self {
        Self {
            repo,
            state,
            policy,
        }
    }

    pub fn repository(&self) -> &Repository {
        &self.repo
    }

    pub async fn execute(
        &self,
        message: &str,
        push: bool,
    ) -> Result<CommitSuccess, CommitFailure> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut committed: Option<String> = None;
        let mut attempt = 1;

        loop {
            match self.run_sequence(message, push, &mut committed).await {
                Ok(commit_id) => {
                    info!("Commit {} succeeded on attempt {}", commit_id, attempt);
                    return Ok(CommitSuccess {
                        commit_id,
                        message: message.to_string(),
                        pushed: push,
                        attempts: attempt,
                    });
                }
                Err((step, err)) if attempt >= max_attempts => {
                    error!(
                        "Giving up on commit after {} attempts: {} failed: {}",
                        attempt, step, err
                    );
                    return Err(CommitFailure {
                        message: message.to_string(),
                        push,
                        attempts: attempt,
                        step,
                        last_error: err,
                        commit_id: committed,
                    });
                }
                Err((step, err)) => {
                    let delay = self.policy.delay_after(attempt);
                    warn!(
                        "Attempt {}/{} failed at {}: {}",
                        attempt, max_attempts, step, err
                    );
                    let summary = format!(
                        "Commit attempt {}/{} failed at {}, retrying in {}s",
                        attempt,
                        max_attempts,
                        step,
                        delay.as_secs()
                    );
                    let entry = ActivityHistoryEntry::new(ActivityKind::Error, summary)
                        .with_details(err.to_string());
                    self.state.append_history(entry);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn run_sequence(
        &self,
        message: &str,
        push: bool,
        committed: &mut Option<String>,
    ) -> Result<String, (CommitStep, VcsError)> {
        let commit_id = match committed {
            Some(id) => id.clone(),
            None => {
                self.repo
                    .stage_all()
                    .await
                    .map_err(|e| (CommitStep::Stage, e))?;
                let id = self
                    .repo
                    .commit(message)
                    .await
                    .map_err(|e| (CommitStep::Commit, e))?;
                *committed = Some(id.clone());
                id
            }
        };

        if push {
            self.repo.push().await.map_err(|e| (CommitStep::Push, e))?;
        }
        Ok(commit_id)
    }
}

//! Engine actor wiring the change-to-commit pipeline
//!
//! One task owns the scheduler and the ingest stages and processes a single
//! mailbox in arrival order. The evaluate/decide/countdown/execute run happens
//! on a separate task so the mailbox keeps draining, but at most one run is in
//! flight: changes arriving meanwhile only update state and mark the session
//! dirty, and the scheduler is re-armed once the run reports back.

use super::countdown::{BufferCountdown, CancelReason, CountdownOutcome, PendingCommitHandle};
use super::decision_gate::CommitDecisionGate;
use super::executor::{CommitExecutor, CommitFailure, CommitSuccess};
use super::scheduler::{ActivityScheduler, FireOutcome};
use super::state::{
    ActivityHistoryEntry, ActivityKind, AiAnalysis, CommitMetadata, CommitReason,
    OrchestrationState, StateSnapshot, StateUpdate,
};
use super::{EngineConfig, EngineError, EngineNotice, Result, WatchMode};
use crate::advisor::{CommitAdvisor, MessageGenerator};
use crate::monitor::{ChangeFilter, DiffFingerprinter, DuplicateSuppressor, FileChange};
use crate::vcs::Repository;
use regex_utils::{diffstat, message, porcelain};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

const NOTICE_CAPACITY: usize = 64;

type CommitReply = oneshot::Sender<Result<CommitSuccess>>;

enum EngineCommand {
    FileChanged(FileChange),
    CommitNow {
        message: Option<String>,
        reply: CommitReply,
    },
    RetryCommit(RetryRequest),
    Stop { reply: oneshot::Sender<()> },
}

/// A failed commit submitted again
struct RetryRequest {
    message: String,
    push: bool,
    reason: CommitReason,
}

/// What started a pipeline run
enum Trigger {
    Scheduled,
    Manual {
        message: Option<String>,
        reply: CommitReply,
    },
    Retry(RetryRequest),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PipelineOutcome {
    Committed,
    Skipped,
    Cancelled,
    Failed,
    NothingToCommit,
}

/// Builder for an engine instance; nothing runs until [`Engine::start`]
pub struct Engine {
    config: EngineConfig,
    repo: Repository,
    state: OrchestrationState,
    filter: ChangeFilter,
    advisor: Option<Arc<dyn CommitAdvisor>>,
    messages: Option<Arc<dyn MessageGenerator>>,
}

impl Engine {
    pub fn new(config: EngineConfig, repo: Repository, state: OrchestrationState) -> Self {
        let filter = ChangeFilter::new(repo.root());
        Self {
            config,
            repo,
            state,
            filter,
            advisor: None,
            messages: None,
        }
    }

    pub fn with_filter(mut self, filter: ChangeFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Decision collaborator; consulted in intelligent mode only
    pub fn with_advisor(mut self, advisor: Arc<dyn CommitAdvisor>) -> Self {
        self.advisor = Some(advisor);
        self
    }

    pub fn with_message_generator(mut self, messages: Arc<dyn MessageGenerator>) -> Self {
        self.messages = Some(messages);
        self
    }

    pub fn state(&self) -> &OrchestrationState {
        &self.state
    }

    /// Spawn the engine task and begin a watch session
    pub fn start(self) -> EngineHandle {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (fires_tx, fires_rx) = mpsc::unbounded_channel();
        let (finished_tx, finished_rx) = mpsc::unbounded_channel();
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);

        let countdown = Arc::new(BufferCountdown::new(self.state.clone()));
        let executor = CommitExecutor::new(
            self.repo.clone(),
            self.state.clone(),
            self.config.retry.clone(),
        );
        let pipeline = Arc::new(Pipeline {
            config: self.config.clone(),
            repo: self.repo.clone(),
            state: self.state.clone(),
            gate: CommitDecisionGate::new(self.advisor),
            messages: self.messages,
            countdown: countdown.clone(),
            executor,
            notices: notices.clone(),
        });

        let actor = Actor {
            scheduler: ActivityScheduler::new(self.config.strategy(), fires_tx),
            suppressor: DuplicateSuppressor::new(self.config.suppression_window),
            fingerprinter: DiffFingerprinter::new(),
            filter: self.filter,
            config: self.config.clone(),
            repo: self.repo,
            state: self.state.clone(),
            countdown: countdown.clone(),
            pipeline,
            commands: commands_rx,
            fires: fires_rx,
            finished: finished_rx,
            finished_tx,
            in_flight: None,
            dirty: false,
            queued_retry: None,
        };

        info!("Starting engine in {} mode", self.config.mode);
        let task = tokio::spawn(actor.run());

        EngineHandle {
            commands: commands_tx,
            state: self.state,
            countdown,
            notices,
            retry_later_delay: self.config.retry_later_delay,
            task,
        }
    }
}

/// Handle used by outer surfaces to drive a running engine
pub struct EngineHandle {
    commands: mpsc::UnboundedSender<EngineCommand>,
    state: OrchestrationState,
    countdown: Arc<BufferCountdown>,
    notices: broadcast::Sender<EngineNotice>,
    retry_later_delay: std::time::Duration,
    task: JoinHandle<()>,
}

impl EngineHandle {
    /// Feed a filesystem change into the engine
    pub fn notify_change(&self, change: FileChange) -> Result<()> {
        self.commands
            .send(EngineCommand::FileChanged(change))
            .map_err(|_| EngineError::Stopped)
    }

    /// Commit immediately, skipping the decision gate and countdown
    pub async fn commit_now(&self, message: Option<String>) -> Result<CommitSuccess> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(EngineCommand::CommitNow { message, reply })
            .map_err(|_| EngineError::Stopped)?;
        rx.await.map_err(|_| EngineError::Stopped)?
    }

    /// Cancel the pending countdown, or the run about to start one
    ///
    /// False when there was nothing left to cancel.
    pub fn cancel_pending(&self) -> bool {
        self.countdown.interrupt(CancelReason::UserRequested)
    }

    /// The live countdown, for surfaces that tie it to their own lifetime
    pub fn pending_commit(&self) -> Option<Arc<PendingCommitHandle>> {
        self.countdown.active().filter(|handle| handle.is_active())
    }

    pub fn has_pending_commit(&self) -> bool {
        self.countdown.is_pending()
    }

    /// Re-submit a failed commit after the configured delay
    pub fn retry_later(&self, failure: &CommitFailure, reason: CommitReason) -> JoinHandle<()> {
        let commands = self.commands.clone();
        let delay = self.retry_later_delay;
        let retry = RetryRequest {
            message: failure.message.clone(),
            push: failure.push,
            reason,
        };
        info!("Retrying commit in {}s", delay.as_secs());

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if commands.send(EngineCommand::RetryCommit(retry)).is_err() {
                debug!("Engine stopped before retry");
            }
        })
    }

    pub fn snapshot(&self) -> StateSnapshot {
        self.state.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<StateSnapshot> {
        self.state.subscribe()
    }

    pub fn notices(&self) -> broadcast::Receiver<EngineNotice> {
        self.notices.subscribe()
    }

    pub fn state(&self) -> &OrchestrationState {
        &self.state
    }

    /// Stop watching and wait for the engine task to finish
    pub async fn stop(self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        if self.commands.send(EngineCommand::Stop { reply }).is_ok() {
            let _ = rx.await;
        }
        self.task.await.map_err(|e| {
            error!("Engine task failed: {}", e);
            EngineError::Stopped
        })
    }
}

struct Actor {
    scheduler: ActivityScheduler,
    suppressor: DuplicateSuppressor,
    fingerprinter: DiffFingerprinter,
    filter: ChangeFilter,
    config: EngineConfig,
    repo: Repository,
    state: OrchestrationState,
    countdown: Arc<BufferCountdown>,
    pipeline: Arc<Pipeline>,
    commands: mpsc::UnboundedReceiver<EngineCommand>,
    fires: mpsc::UnboundedReceiver<u64>,
    finished: mpsc::UnboundedReceiver<PipelineOutcome>,
    finished_tx: mpsc::UnboundedSender<PipelineOutcome>,
    in_flight: Option<JoinHandle<()>>,
    dirty: bool,
    queued_retry: Option<Trigger>,
}

impl Actor {
    async fn run(mut self) {
        self.state.start_watching(self.config.mode);

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(EngineCommand::Stop { reply }) => {
                        self.shutdown().await;
                        let _ = reply.send(());
                        return;
                    }
                    Some(command) => self.handle(command).await,
                    None => break,
                },
                Some(generation) = self.fires.recv() => self.on_fire(generation),
                Some(outcome) = self.finished.recv() => self.on_pipeline_finished(outcome),
            }
        }

        self.shutdown().await;
    }

    async fn handle(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::FileChanged(change) => self.on_file_changed(change).await,
            EngineCommand::CommitNow { message, reply } => {
                if self.in_flight.is_some() {
                    let _ = reply.send(Err(EngineError::Busy));
                } else {
                    self.spawn_pipeline(Trigger::Manual { message, reply });
                }
            }
            EngineCommand::RetryCommit(retry) => {
                let trigger = Trigger::Retry(retry);
                if self.in_flight.is_some() {
                    debug!("Run in flight, queueing retry");
                    self.queued_retry = Some(trigger);
                } else {
                    self.spawn_pipeline(trigger);
                }
            }
            EngineCommand::Stop { .. } => {}
        }
    }

    async fn on_file_changed(&mut self, change: FileChange) {
        if self.filter.is_ignored(&change.path) {
            return;
        }

        let now = Instant::now();
        self.suppressor.purge_expired(now);
        if !self.suppressor.admit_at(&change.path, now) {
            return;
        }

        let content = match self.diff_content().await {
            Ok(content) => content,
            Err(e) => {
                warn!(
                    "Could not read diff after change to {:?}: {}",
                    change.path, e
                );
                let summary = "Failed to read repository diff";
                let entry = ActivityHistoryEntry::new(ActivityKind::Error, summary);
                self.state.append_history(entry.with_details(e.to_string()));
                return;
            }
        };
        if !self.fingerprinter.observe(&content) {
            debug!("Diff unchanged after event for {:?}", change.path);
            return;
        }

        let path = change
            .path
            .strip_prefix(self.repo.root())
            .map(PathBuf::from)
            .unwrap_or(change.path);
        debug!("Actionable change ({:?}): {:?}", change.change_type, path);
        self.state.record_change(path);

        if self.in_flight.is_some() {
            self.dirty = true;
            if self.config.cancel_on_new_changes()
                && self.countdown.interrupt(CancelReason::NewChanges)
            {
                info!("New changes cancelled the pending commit");
            }
            return;
        }
        self.scheduler.on_activity();
    }

    /// Text whose fingerprint decides whether anything changed
    async fn diff_content(&self) -> std::result::Result<String, crate::vcs::VcsError> {
        let diff = self.repo.unstaged_diff().await?;
        let status = self.repo.status().await?;
        Ok(format!("{}\0{}", diff, status))
    }

    fn on_fire(&mut self, generation: u64) {
        match self.scheduler.on_fire(generation, Instant::now()) {
            FireOutcome::Evaluate => {
                if self.in_flight.is_some() {
                    self.dirty = true;
                    self.scheduler.finish_evaluation();
                } else {
                    self.spawn_pipeline(Trigger::Scheduled);
                }
            }
            FireOutcome::Wait(remaining) => {
                debug!("Waiting {}s for commit cooldown", remaining.as_secs());
            }
            FireOutcome::Stale => {}
        }
    }

    fn spawn_pipeline(&mut self, trigger: Trigger) {
        if matches!(trigger, Trigger::Scheduled) {
            self.countdown.begin_run();
        }
        let pipeline = self.pipeline.clone();
        let finished = self.finished_tx.clone();
        self.dirty = false;
        self.in_flight = Some(tokio::spawn(async move {
            let outcome = pipeline.run(trigger).await;
            let _ = finished.send(outcome);
        }));
    }

    fn on_pipeline_finished(&mut self, outcome: PipelineOutcome) {
        self.in_flight = None;
        self.countdown.end_run();
        self.scheduler.finish_evaluation();
        debug!("Pipeline finished: {:?}", outcome);

        if outcome == PipelineOutcome::Committed {
            self.scheduler.record_commit(Instant::now());
            self.fingerprinter.reset();
            self.pipeline.gate.reset();
        }

        if let Some(retry) = self.queued_retry.take() {
            self.spawn_pipeline(retry);
        } else if self.dirty {
            self.dirty = false;
            self.scheduler.on_activity();
        }
    }

    async fn shutdown(&mut self) {
        self.scheduler.cancel();
        self.countdown.stop();
        if let Some(run) = self.in_flight.take() {
            if let Err(e) = run.await {
                error!("Pipeline task failed: {}", e);
            }
        }
        self.state.stop_watching();
        info!("Engine stopped");
    }
}

/// Everything one evaluate/decide/countdown/execute run needs
struct Pipeline {
    config: EngineConfig,
    repo: Repository,
    state: OrchestrationState,
    gate: CommitDecisionGate,
    messages: Option<Arc<dyn MessageGenerator>>,
    countdown: Arc<BufferCountdown>,
    executor: CommitExecutor,
    notices: broadcast::Sender<EngineNotice>,
}

/// Repository view captured at the start of a run
struct Pending {
    status: String,
    diff: String,
}

impl Pipeline {
    async fn run(&self, trigger: Trigger) -> PipelineOutcome {
        match trigger {
            Trigger::Scheduled => self.run_scheduled().await,
            Trigger::Manual { message, reply } => {
                let result = self.run_manual(message).await;
                let outcome = match &result {
                    Ok(_) => PipelineOutcome::Committed,
                    Err(EngineError::NothingToCommit) => PipelineOutcome::NothingToCommit,
                    Err(_) => PipelineOutcome::Failed,
                };
                let _ = reply.send(result);
                outcome
            }
            Trigger::Retry(retry) => self.run_retry(retry).await,
        }
    }

    async fn run_retry(&self, retry: RetryRequest) -> PipelineOutcome {
        if self.countdown.is_stopping() {
            debug!("Engine stopping, dropping retry");
            return PipelineOutcome::Cancelled;
        }
        let pending = match self.pending().await {
            Ok(Some(pending)) => pending,
            Ok(None) => return PipelineOutcome::NothingToCommit,
            Err(_) => return PipelineOutcome::Failed,
        };
        info!("Retrying commit: {}", retry.message);
        self.execute(&pending, &retry.message, retry.push, retry.reason, None)
            .await
    }

    async fn run_scheduled(&self) -> PipelineOutcome {
        let pending = match self.pending().await {
            Ok(Some(pending)) => pending,
            Ok(None) => return PipelineOutcome::NothingToCommit,
            Err(_) => return PipelineOutcome::Failed,
        };

        let policy = match self.config.mode {
            WatchMode::Periodic => None,
            WatchMode::Intelligent => Some(&self.config.intelligent),
        };
        let gate = self
            .gate
            .evaluate(&pending.diff, &pending.status, policy)
            .await;

        if let Some(analysis) = &gate.analysis {
            let verdict = if gate.proceed {
                "recommends committing"
            } else {
                "recommends waiting"
            };
            let summary = format!(
                "Advisor {} ({} significance)",
                verdict, analysis.significance
            );
            let mut entry = ActivityHistoryEntry::new(ActivityKind::AiAnalysis, summary);
            entry.details = Some(gate.reason.clone());
            self.state.append_history(entry);
        }
        if !gate.proceed {
            info!("Skipping commit: {}", gate.reason);
            let _ = self.notices.send(EngineNotice::Skipped {
                reason: gate.reason.clone(),
                significance: gate.significance,
            });
            return PipelineOutcome::Skipped;
        }
        if let Some(cancel) = self.countdown.take_interruption() {
            return self.cancelled(cancel);
        }

        let suggested = gate
            .suggested_message
            .as_deref()
            .and_then(message::sanitize);
        let commit_message = match suggested {
            Some(m) => m,
            None => self.generate_message(&pending).await,
        };

        let mut reason = match self.config.mode {
            WatchMode::Periodic => CommitReason::Periodic,
            WatchMode::Intelligent => CommitReason::AiDecision,
        };

        let seconds = self.config.buffer_time_seconds();
        let commit_message = if seconds > 0 {
            let status = pending.status.clone();
            let handle = self.countdown.start(commit_message, status, seconds);
            if handle.is_active() {
                let _ = self.notices.send(EngineNotice::CountdownStarted {
                    handle_id: handle.id(),
                    message: handle.target_message().to_string(),
                    seconds,
                });
            }
            match self.countdown.run(handle).await {
                CountdownOutcome::Elapsed { message, .. } => {
                    reason = CommitReason::BufferTimeout;
                    message
                }
                CountdownOutcome::Cancelled(cancel) => return self.cancelled(cancel),
            }
        } else if let Some(cancel) = self.countdown.finish_preparing() {
            return self.cancelled(cancel);
        } else {
            commit_message
        };

        let push = self.config.auto_push;
        self.execute(&pending, &commit_message, push, reason, gate.analysis)
            .await
    }

    fn cancelled(&self, reason: CancelReason) -> PipelineOutcome {
        info!("Commit run cancelled ({:?})", reason);
        let _ = self.notices.send(EngineNotice::Cancelled { reason });
        PipelineOutcome::Cancelled
    }

    async fn run_manual(&self, requested: Option<String>) -> Result<CommitSuccess> {
        let pending = self.pending().await?.ok_or(EngineError::NothingToCommit)?;
        let commit_message = match requested.as_deref().and_then(message::sanitize) {
            Some(m) => m,
            None => self.generate_message(&pending).await,
        };

        let push = self.config.auto_push;
        self.execute_inner(&pending, &commit_message, push, CommitReason::Manual, None)
            .await
            .map_err(EngineError::CommitFailed)
    }

    /// Current status and diff; `None` when the tree is clean
    async fn pending(&self) -> Result<Option<Pending>> {
        let read = async {
            let status = self.repo.status().await?;
            let diff = self.repo.pending_diff().await?;
            Ok::<_, crate::vcs::VcsError>(Pending { status, diff })
        };

        match read.await {
            Ok(pending) if pending.status.trim().is_empty() => {
                debug!("Working tree clean, nothing to commit");
                self.state.update(StateUpdate {
                    changed_file_paths: Some(BTreeSet::new()),
                    ..Default::default()
                });
                Ok(None)
            }
            Ok(pending) => Ok(Some(pending)),
            Err(e) => {
                error!("Could not read repository state: {}", e);
                let summary = "Failed to read repository state";
                let entry = ActivityHistoryEntry::new(ActivityKind::Error, summary);
                self.state.append_history(entry.with_details(e.to_string()));
                Err(EngineError::Vcs(e))
            }
        }
    }

    async fn generate_message(&self, pending: &Pending) -> String {
        let Some(messages) = &self.messages else {
            return self.config.default_message.clone();
        };
        match messages.generate(&pending.diff, &pending.status).await {
            Ok(text) => match message::sanitize(&text) {
                Some(m) => m,
                None => self.config.default_message.clone(),
            },
            Err(e) => {
                warn!("Message generation failed, using default: {}", e);
                self.config.default_message.clone()
            }
        }
    }

    async fn execute(
        &self,
        pending: &Pending,
        commit_message: &str,
        push: bool,
        reason: CommitReason,
        analysis: Option<AiAnalysis>,
    ) -> PipelineOutcome {
        let result = self.execute_inner(pending, commit_message, push, reason, analysis);
        match result.await {
            Ok(_) => PipelineOutcome::Committed,
            Err(_) => PipelineOutcome::Failed,
        }
    }

    async fn execute_inner(
        &self,
        pending: &Pending,
        commit_message: &str,
        push: bool,
        reason: CommitReason,
        analysis: Option<AiAnalysis>,
    ) -> std::result::Result<CommitSuccess, CommitFailure> {
        self.state.update(StateUpdate {
            pending_commit: Some(true),
            ..Default::default()
        });
        match self.executor.execute(commit_message, push).await {
            Ok(success) => {
                let metadata = CommitMetadata {
                    reason,
                    mode: self.config.mode,
                    buffer_time_seconds: self.config.buffer_time_seconds(),
                    auto_push: push,
                    threshold: self.config.threshold(),
                    changed_files: porcelain::parse(&pending.status)
                        .into_iter()
                        .map(|e| PathBuf::from(e.path))
                        .collect(),
                    diff_summary: diffstat::summarize(&pending.diff).to_string(),
                    ai_analysis: analysis,
                };
                let short_id: String = success.commit_id.chars().take(8).collect();
                let summary = format!("Committed {}: {}", short_id, commit_message);
                let entry = ActivityHistoryEntry::new(ActivityKind::Commit, summary);
                self.state.complete_commit(entry.with_commit(metadata));
                let _ = self.notices.send(EngineNotice::Committed {
                    commit_id: success.commit_id.clone(),
                    message: success.message.clone(),
                    pushed: success.pushed,
                    reason,
                });
                Ok(success)
            }
            Err(failure) => {
                self.state.modify(|state| {
                    state.pending_commit = false;
                    state.countdown_remaining = None;
                });
                let mut entry = ActivityHistoryEntry::new(
                    ActivityKind::Error,
                    format!("Commit failed after {} attempts", failure.attempts),
                );
                let details = match failure.output() {
                    Some(output) => output,
                    None => failure.last_error.to_string(),
                };
                entry.details = Some(details);
                self.state.append_history(entry);
                let notice = EngineNotice::CommitFailed {
                    failure: failure.clone(),
                    reason,
                };
                let _ = self.notices.send(notice);
                Err(failure)
            }
        }
    }
}

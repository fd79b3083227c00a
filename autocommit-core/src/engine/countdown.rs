//! Cancellable countdown before a buffered commit
//!
//! At most one handle is live per engine. Starting a new countdown force-cancels
//! the previous one before the new handle is published. Every cancellation
//! path funnels through one compare-and-swap on the handle status, so cancel
//! is idempotent and a cancelled handle can never fire.

use super::state::{OrchestrationState, StateUpdate};
use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};
use uuid::Uuid;

const TICK: Duration = Duration::from_secs(1);

const ACTIVE: u8 = 0;
const CANCELLED: u8 = 1;
const FIRED: u8 = 2;

/// Why a countdown was cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// Explicit user action
    UserRequested,
    /// The surface showing the countdown went away
    SurfaceDisposed,
    /// A newer countdown replaced this one
    Superseded,
    /// Fresh changes arrived while waiting
    NewChanges,
}

/// The one pending commit shown to observers
#[derive(Debug)]
pub struct PendingCommitHandle {
    id: Uuid,
    target_message: String,
    staged_status: String,
    remaining: AtomicU32,
    status: AtomicU8,
    reason: Mutex<Option<CancelReason>>,
    wake: Notify,
}

impl PendingCommitHandle {
    fn new(target_message: String, staged_status: String, seconds: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            target_message,
            staged_status,
            remaining: AtomicU32::new(seconds),
            status: AtomicU8::new(ACTIVE),
            reason: Mutex::new(None),
            wake: Notify::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn target_message(&self) -> &str {
        &self.target_message
    }

    /// `git status` captured when the countdown started
    pub fn staged_status(&self) -> &str {
        &self.staged_status
    }

    pub fn seconds_remaining(&self) -> u32 {
        self.remaining.load(Ordering::SeqCst)
    }

    pub fn is_active(&self) -> bool {
        self.status.load(Ordering::SeqCst) == ACTIVE
    }

    pub fn is_cancelled(&self) -> bool {
        self.status.load(Ordering::SeqCst) == CANCELLED
    }

    pub fn has_fired(&self) -> bool {
        self.status.load(Ordering::SeqCst) == FIRED
    }

    pub fn cancel_reason(&self) -> Option<CancelReason> {
        *self.reason.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Cancel if still active; a no-op on cancelled or fired handles
    pub fn cancel(&self, reason: CancelReason) -> bool {
        if self
            .status
            .compare_exchange(ACTIVE, CANCELLED, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }
        *self.reason.lock().unwrap_or_else(|e| e.into_inner()) = Some(reason);
        self.wake.notify_one();
        true
    }

    /// Cancel with [`CancelReason::SurfaceDisposed`] when the guard drops
    pub fn surface_guard(self: &Arc<Self>) -> SurfaceGuard {
        SurfaceGuard {
            handle: Arc::clone(self),
        }
    }

    fn mark_fired(&self) -> bool {
        self.status
            .compare_exchange(ACTIVE, FIRED, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

/// Ties a countdown to the lifetime of whatever displays it
pub struct SurfaceGuard {
    handle: Arc<PendingCommitHandle>,
}

impl Drop for SurfaceGuard {
    fn drop(&mut self) {
        if self.handle.cancel(CancelReason::SurfaceDisposed) {
            debug!("Countdown {} cancelled by surface disposal", self.handle.id);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountdownOutcome {
    /// Time ran out; commit with what was shown
    Elapsed {
        message: String,
        staged_status: String,
    },
    Cancelled(CancelReason),
}

/// Bookkeeping behind the one countdown slot
#[derive(Debug, Default)]
struct Slot {
    handle: Option<Arc<PendingCommitHandle>>,
    /// A run is deciding or writing its message; no handle exists yet
    preparing: bool,
    /// Cancellation that arrived while preparing
    interrupted: Option<CancelReason>,
    /// Set once the engine stops; every later start is refused
    stopping: bool,
}

impl Slot {
    fn take_interruption(&mut self) -> Option<CancelReason> {
        if self.stopping {
            Some(CancelReason::UserRequested)
        } else {
            self.interrupted.take()
        }
    }
}

pub struct BufferCountdown {
    state: OrchestrationState,
    slot: Mutex<Slot>,
}

impl BufferCountdown {
    pub fn new(state: OrchestrationState) -> Self {
        Self {
            state,
            slot: Mutex::new(Slot::default()),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// A run started preparing a commit; cancellations are held until it starts counting
    pub fn begin_run(&self) {
        let mut slot = self.slot();
        slot.preparing = true;
        slot.interrupted = None;
    }

    /// The run is over, whatever its outcome
    pub fn end_run(&self) {
        let mut slot = self.slot();
        slot.preparing = false;
        slot.interrupted = None;
    }

    /// Cancellation recorded for the preparing run, if any
    pub fn take_interruption(&self) -> Option<CancelReason> {
        self.slot().take_interruption()
    }

    /// Leave the preparing phase without a countdown; returns a held cancellation
    pub fn finish_preparing(&self) -> Option<CancelReason> {
        let mut slot = self.slot();
        slot.preparing = false;
        slot.take_interruption()
    }

    /// Cancel the live countdown, or the run still preparing one
    pub fn interrupt(&self, reason: CancelReason) -> bool {
        let mut slot = self.slot();
        if let Some(handle) = &slot.handle {
            if handle.cancel(reason) {
                return true;
            }
        }
        if slot.preparing {
            if slot.interrupted.is_none() {
                debug!("Holding {:?} for the run being prepared", reason);
                slot.interrupted = Some(reason);
            }
            return true;
        }
        false
    }

    /// Refuse all further countdowns and cancel the current one
    pub fn stop(&self) {
        self.slot().stopping = true;
        self.interrupt(CancelReason::UserRequested);
    }

    pub fn is_stopping(&self) -> bool {
        self.slot().stopping
    }

    /// Publish a new handle, force-cancelling any live one first
    ///
    /// A cancellation held for the preparing run (or a stopped engine) yields
    /// an already-cancelled handle that is never published.
    pub fn start(
        &self,
        message: String,
        staged_status: String,
        seconds: u32,
    ) -> Arc<PendingCommitHandle> {
        let handle = Arc::new(PendingCommitHandle::new(message, staged_status, seconds));

        let previous = {
            let mut slot = self.slot();
            slot.preparing = false;
            if let Some(reason) = slot.take_interruption() {
                handle.cancel(reason);
                debug!("Countdown {} refused ({:?})", handle.id, reason);
                return handle;
            }
            slot.handle.replace(Arc::clone(&handle))
        };
        if let Some(previous) = previous {
            if previous.cancel(CancelReason::Superseded) {
                info!("Pending commit {} superseded by {}", previous.id, handle.id);
            }
        }

        self.state.update(StateUpdate {
            pending_commit: Some(true),
            countdown_remaining: Some(Some(seconds)),
            ..Default::default()
        });
        info!("Committing in {}s: {}", seconds, handle.target_message);
        handle
    }

    /// Tick `handle` down to zero or until cancelled
    pub async fn run(&self, handle: Arc<PendingCommitHandle>) -> CountdownOutcome {
        let mut ticker = tokio::time::interval_at(Instant::now() + TICK, TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if let Some(reason) = self.cancelled(&handle) {
                return CountdownOutcome::Cancelled(reason);
            }

            if handle.seconds_remaining() == 0 {
                if !handle.mark_fired() {
                    // Lost the race with a cancel
                    continue;
                }
                self.release(&handle);
                self.state.update(StateUpdate {
                    countdown_remaining: Some(None),
                    ..Default::default()
                });
                return CountdownOutcome::Elapsed {
                    message: handle.target_message.clone(),
                    staged_status: handle.staged_status.clone(),
                };
            }

            tokio::select! {
                biased;
                _ = handle.wake.notified() => {}
                _ = ticker.tick() => {
                    if !handle.is_active() {
                        continue;
                    }
                    let remaining = handle.remaining.fetch_sub(1, Ordering::SeqCst) - 1;
                    self.state.update(StateUpdate {
                        countdown_remaining: Some(Some(remaining)),
                        ..Default::default()
                    });
                }
            }
        }
    }

    /// Cancel the live countdown, if any
    pub fn cancel(&self, reason: CancelReason) -> bool {
        match self.active() {
            Some(handle) => handle.cancel(reason),
            None => false,
        }
    }

    pub fn active(&self) -> Option<Arc<PendingCommitHandle>> {
        self.slot().handle.clone()
    }

    pub fn is_pending(&self) -> bool {
        self.active().is_some_and(|h| h.is_active())
    }

    fn cancelled(&self, handle: &Arc<PendingCommitHandle>) -> Option<CancelReason> {
        if !handle.is_cancelled() {
            return None;
        }
        let reason = handle
            .cancel_reason()
            .unwrap_or(CancelReason::UserRequested);

        // A superseding countdown owns the pending flag now
        if self.release(handle) {
            self.state.update(StateUpdate {
                pending_commit: Some(false),
                countdown_remaining: Some(None),
                ..Default::default()
            });
        }
        info!("Pending commit {} cancelled ({:?})", handle.id, reason);
        Some(reason)
    }

    /// Clear the active slot if it still holds `handle`
    fn release(&self, handle: &Arc<PendingCommitHandle>) -> bool {
        let mut slot = self.slot();
        if slot.handle.as_ref().is_some_and(|a| Arc::ptr_eq(a, handle)) {
            slot.handle = None;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn countdown() -> (Arc<BufferCountdown>, OrchestrationState) {
        let state = OrchestrationState::new();
        (Arc::new(BufferCountdown::new(state.clone())), state)
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapses_with_captured_snapshot() {
        let (countdown, state) = countdown();
        let start = Instant::now();
        let handle = countdown.start("feat: x".to_string(), " M a.rs".to_string(), 3);
        assert!(state.snapshot().pending_commit);

        let outcome = countdown.run(handle.clone()).await;
        assert_eq!(
            outcome,
            CountdownOutcome::Elapsed {
                message: "feat: x".to_string(),
                staged_status: " M a.rs".to_string(),
            }
        );
        assert_eq!(start.elapsed(), Duration::from_secs(3));
        assert!(handle.has_fired());
        assert!(!countdown.is_pending());
        assert_eq!(state.snapshot().countdown_remaining, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_seconds_fires_immediately() {
        let (countdown, _state) = countdown();
        let handle = countdown.start("m".to_string(), String::new(), 0);
        let outcome = countdown.run(handle).await;
        assert!(matches!(outcome, CountdownOutcome::Elapsed { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_is_idempotent() {
        let (countdown, _state) = countdown();
        let handle = countdown.start("m".to_string(), String::new(), 0);
        countdown.run(handle.clone()).await;

        // Already fired
        assert!(!handle.cancel(CancelReason::UserRequested));
        assert!(!handle.is_cancelled());

        let second = countdown.start("m".to_string(), String::new(), 5);
        assert!(second.cancel(CancelReason::UserRequested));
        assert!(!second.cancel(CancelReason::UserRequested));
        assert_eq!(second.cancel_reason(), Some(CancelReason::UserRequested));
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_handle_never_fires() {
        let (countdown, state) = countdown();
        let first = countdown.start("first".to_string(), String::new(), 10);
        let runner = {
            let countdown = countdown.clone();
            let first = first.clone();
            tokio::spawn(async move { countdown.run(first).await })
        };

        tokio::time::advance(Duration::from_secs(2)).await;
        let second = countdown.start("second".to_string(), String::new(), 10);

        assert_eq!(
            runner.await.unwrap(),
            CountdownOutcome::Cancelled(CancelReason::Superseded)
        );
        assert!(first.is_cancelled());
        assert!(second.is_active());
        assert!(Arc::ptr_eq(&countdown.active().unwrap(), &second));
        // The new countdown still owns the pending flag
        assert!(state.snapshot().pending_commit);
    }

    #[tokio::test(start_paused = true)]
    async fn test_surface_disposal_cancels() {
        let (countdown, state) = countdown();
        let handle = countdown.start("m".to_string(), String::new(), 10);
        let guard = handle.surface_guard();
        drop(guard);

        assert_eq!(
            countdown.run(handle).await,
            CountdownOutcome::Cancelled(CancelReason::SurfaceDisposed)
        );
        assert!(!state.snapshot().pending_commit);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_while_preparing_refuses_next_start() {
        let (countdown, state) = countdown();
        assert!(!countdown.interrupt(CancelReason::NewChanges));

        countdown.begin_run();
        assert!(countdown.interrupt(CancelReason::NewChanges));
        // The first held reason wins
        assert!(countdown.interrupt(CancelReason::UserRequested));

        let handle = countdown.start("stale".to_string(), String::new(), 10);
        assert!(handle.is_cancelled());
        assert!(countdown.active().is_none());
        assert_eq!(
            countdown.run(handle).await,
            CountdownOutcome::Cancelled(CancelReason::NewChanges)
        );
        assert!(!state.snapshot().pending_commit);
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_run_discards_held_interruption() {
        let (countdown, _state) = countdown();
        countdown.begin_run();
        countdown.interrupt(CancelReason::NewChanges);
        countdown.end_run();

        countdown.begin_run();
        assert_eq!(countdown.take_interruption(), None);
        let handle = countdown.start("fresh".to_string(), String::new(), 1);
        assert!(handle.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_refuses_every_later_start() {
        let (countdown, _state) = countdown();
        let live = countdown.start("live".to_string(), String::new(), 10);
        countdown.stop();

        assert_eq!(live.cancel_reason(), Some(CancelReason::UserRequested));
        assert!(countdown.is_stopping());
        assert_eq!(
            countdown.finish_preparing(),
            Some(CancelReason::UserRequested)
        );

        let later = countdown.start("later".to_string(), String::new(), 10);
        assert!(later.is_cancelled());
        assert_eq!(
            countdown.run(later).await,
            CountdownOutcome::Cancelled(CancelReason::UserRequested)
        );
    }
}

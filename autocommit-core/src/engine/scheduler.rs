//! Decides when a burst of activity has settled enough to evaluate
//!
//! Two strategies, chosen once per watch session:
//!
//! - **Periodic**: every event re-arms a fixed debounce timer
//!   (`Idle -> Debouncing -> Evaluating -> Idle`).
//! - **Intelligent**: every event re-arms an activity-settle timer. When it
//!   fires inside the cooldown after the last commit, a one-shot timer waits
//!   out exactly the remaining cooldown
//!   (`Idle -> Settling -> [CooldownWait] -> Evaluating -> Idle`).
//!   New activity always wins and restarts the settle window.
//!
//! Activity faster than the settle time means the intelligent strategy never
//! fires. Mid-edit commits are what it exists to avoid.
//!
//! Fires are delivered as generation numbers on a channel so that the owner
//! can process them in its own loop; see [`ActivityScheduler::on_fire`].

use super::timer::Timer;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulingStrategy {
    Periodic { debounce: Duration },
    Intelligent {
        settle: Duration,
        min_between_commits: Duration,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    Idle,
    Debouncing,
    Settling,
    CooldownWait,
    Evaluating,
}

/// What the owner should do with a timer fire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireOutcome {
    /// Run the commit pipeline now
    Evaluate,
    /// Still inside the cooldown; re-armed for the remaining time
    Wait(Duration),
    /// Fire from a superseded arming
    Stale,
}

pub struct ActivityScheduler {
    strategy: SchedulingStrategy,
    timer: Timer,
    phase: SchedulerPhase,
    activity_count: u64,
    last_commit: Option<Instant>,
    fires: mpsc::UnboundedSender<u64>,
}

impl ActivityScheduler {
    pub fn new(strategy: SchedulingStrategy, fires: mpsc::UnboundedSender<u64>) -> Self {
        Self {
            strategy,
            timer: Timer::new(),
            phase: SchedulerPhase::Idle,
            activity_count: 0,
            last_commit: None,
            fires,
        }
    }

    pub fn strategy(&self) -> SchedulingStrategy {
        self.strategy
    }

    pub fn phase(&self) -> SchedulerPhase {
        self.phase
    }

    pub fn activity_count(&self) -> u64 {
        self.activity_count
    }

    /// Note one actionable change and (re)arm the timer
    pub fn on_activity(&mut self) {
        self.activity_count += 1;

        let (delay, phase) = match self.strategy {
            SchedulingStrategy::Periodic { debounce } => (debounce, SchedulerPhase::Debouncing),
            SchedulingStrategy::Intelligent { settle, .. } => (settle, SchedulerPhase::Settling),
        };
        if self.phase == SchedulerPhase::CooldownWait {
            debug!("Activity during cooldown wait, restarting settle window");
        }
        self.arm(delay);
        self.phase = phase;
        trace!(
            "Activity #{} armed {:?} for {:?}",
            self.activity_count, phase, delay
        );
    }

    /// Handle a fire delivered on the channel
    pub fn on_fire(&mut self, generation: u64, now: Instant) -> FireOutcome {
        if !self.timer.take_fire(generation) {
            trace!("Ignoring stale scheduler fire {}", generation);
            return FireOutcome::Stale;
        }

        if let Some(cooldown) = self.cooldown() {
            if let Some(remaining) = self.cooldown_remaining(now, cooldown) {
                debug!("Cooldown active, re-checking in {:?}", remaining);
                self.arm(remaining);
                self.phase = SchedulerPhase::CooldownWait;
                return FireOutcome::Wait(remaining);
            }
            self.activity_count = 0;
        }

        self.phase = SchedulerPhase::Evaluating;
        FireOutcome::Evaluate
    }

    /// The pipeline finished or was skipped
    pub fn finish_evaluation(&mut self) {
        if self.phase == SchedulerPhase::Evaluating {
            self.phase = SchedulerPhase::Idle;
        }
    }

    pub fn record_commit(&mut self, at: Instant) {
        self.last_commit = Some(at);
    }

    pub fn cancel(&mut self) {
        self.timer.cancel();
        self.phase = SchedulerPhase::Idle;
    }

    fn cooldown(&self) -> Option<Duration> {
        match self.strategy {
            SchedulingStrategy::Intelligent {
                min_between_commits,
                ..
            } => Some(min_between_commits),
            SchedulingStrategy::Periodic { .. } => None,
        }
    }

    fn cooldown_remaining(&self, now: Instant, min_between: Duration) -> Option<Duration> {
        let since = now.saturating_duration_since(self.last_commit?);
        (since < min_between).then(|| min_between - since)
    }

    fn arm(&mut self, delay: Duration) {
        let fires = self.fires.clone();
        self.timer.arm(delay, move |generation| {
            // Receiver gone means the engine stopped
            let _ = fires.send(generation);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Fires = mpsc::UnboundedReceiver<u64>;

    fn periodic(debounce_secs: u64) -> (ActivityScheduler, Fires) {
        let (tx, rx) = mpsc::unbounded_channel();
        let strategy = SchedulingStrategy::Periodic {
            debounce: Duration::from_secs(debounce_secs),
        };
        (ActivityScheduler::new(strategy, tx), rx)
    }

    fn intelligent(settle: u64, cooldown: u64) -> (ActivityScheduler, Fires) {
        let (tx, rx) = mpsc::unbounded_channel();
        let strategy = SchedulingStrategy::Intelligent {
            settle: Duration::from_secs(settle),
            min_between_commits: Duration::from_secs(cooldown),
        };
        (ActivityScheduler::new(strategy, tx), rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_debounces_to_last_event() {
        let (mut scheduler, mut rx) = periodic(30);
        let start = Instant::now();

        scheduler.on_activity();
        tokio::time::advance(Duration::from_secs(5)).await;
        scheduler.on_activity();
        tokio::time::advance(Duration::from_secs(5)).await;
        scheduler.on_activity();
        assert_eq!(scheduler.phase(), SchedulerPhase::Debouncing);

        let generation = rx.recv().await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_secs(40));
        assert_eq!(
            scheduler.on_fire(generation, Instant::now()),
            FireOutcome::Evaluate
        );
        assert_eq!(scheduler.phase(), SchedulerPhase::Evaluating);

        scheduler.finish_evaluation();
        assert_eq!(scheduler.phase(), SchedulerPhase::Idle);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_intelligent_without_prior_commit_evaluates() {
        let (mut scheduler, mut rx) = intelligent(300, 1800);
        scheduler.on_activity();
        scheduler.on_activity();
        assert_eq!(scheduler.activity_count(), 2);

        let generation = rx.recv().await.unwrap();
        assert_eq!(
            scheduler.on_fire(generation, Instant::now()),
            FireOutcome::Evaluate
        );
        assert_eq!(scheduler.activity_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_during_cooldown_restarts_settle() {
        let (mut scheduler, mut rx) = intelligent(300, 1800);
        scheduler.record_commit(Instant::now());

        scheduler.on_activity();
        let generation = rx.recv().await.unwrap();
        assert_eq!(
            scheduler.on_fire(generation, Instant::now()),
            FireOutcome::Wait(Duration::from_secs(1500))
        );
        assert_eq!(scheduler.phase(), SchedulerPhase::CooldownWait);

        tokio::time::advance(Duration::from_secs(100)).await;
        scheduler.on_activity();
        assert_eq!(scheduler.phase(), SchedulerPhase::Settling);

        let settle_start = Instant::now();
        let generation = rx.recv().await.unwrap();
        assert_eq!(settle_start.elapsed(), Duration::from_secs(300));
        // 700s since the commit, 1100s of cooldown left
        assert_eq!(
            scheduler.on_fire(generation, Instant::now()),
            FireOutcome::Wait(Duration::from_secs(1100))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_fire_ignored() {
        let (mut scheduler, _rx) = periodic(1);
        scheduler.on_activity();
        scheduler.cancel();
        assert_eq!(scheduler.on_fire(0, Instant::now()), FireOutcome::Stale);
        assert_eq!(scheduler.on_fire(1, Instant::now()), FireOutcome::Stale);
    }
}

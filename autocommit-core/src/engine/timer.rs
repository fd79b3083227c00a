//! Cancellable delayed callback on the tokio clock

use std::time::Duration;
use tokio::task::JoinHandle;

/// A single re-armable timer
///
/// Each arming gets a generation number. Arming again or cancelling
/// invalidates earlier generations, so a fire that was already in flight
/// when the timer was re-armed is recognised as stale by [`Timer::take_fire`].
#[derive(Debug, Default)]
pub struct Timer {
    handle: Option<JoinHandle<()>>,
    generation: u64,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the timer, cancelling any previous arming
    pub fn arm<F>(&mut self, delay: Duration, on_fire: F) -> u64
    where
        F: FnOnce(u64) + Send + 'static,
    {
        self.cancel();
        let generation = self.generation;
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            on_fire(generation);
        }));
        generation
    }

    /// Returns true if an armed timer was cancelled
    pub fn cancel(&mut self) -> bool {
        self.generation += 1;
        match self.handle.take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.handle.is_some()
    }

    /// Accept a fire for `generation` if it is still current; disarms the timer
    pub fn take_fire(&mut self, generation: u64) -> bool {
        if self.handle.is_some() && generation == self.generation {
            self.handle = None;
            true
        } else {
            false
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_fires_after_delay() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = Timer::new();
        let start = Instant::now();

        let generation = timer.arm(Duration::from_secs(5), move |g| {
            let _ = tx.send(g);
        });

        assert_eq!(rx.recv().await, Some(generation));
        assert_eq!(start.elapsed(), Duration::from_secs(5));
        assert!(timer.take_fire(generation));
        assert!(!timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_cancels_previous() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut timer = Timer::new();

        let tx1 = tx.clone();
        let first = timer.arm(Duration::from_secs(1), move |g| {
            let _ = tx1.send(g);
        });
        let second = timer.arm(Duration::from_secs(3), move |g| {
            let _ = tx.send(g);
        });

        assert_ne!(first, second);
        assert_eq!(rx.recv().await, Some(second));
        assert!(!timer.take_fire(first));
        assert!(timer.take_fire(second));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_invalidates_generation() {
        let (tx, mut rx) = mpsc::unbounded_channel::<u64>();
        let mut timer = Timer::new();
        let generation = timer.arm(Duration::from_secs(1), move |g| {
            let _ = tx.send(g);
        });

        assert!(timer.cancel());
        assert!(!timer.cancel());
        assert!(!timer.take_fire(generation));
        // The aborted task drops its sender without sending
        assert_eq!(rx.recv().await, None);
    }
}

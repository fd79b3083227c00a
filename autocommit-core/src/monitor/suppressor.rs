//! Per-path suppression window for duplicate notifications
//!
//! One save usually produces several raw events (truncate, write, chmod).
//! The first event for a path passes; the rest are dropped until the window
//! has elapsed.

use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::time::Instant;
use tracing::trace;

/// Default suppression window
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(1);

pub struct DuplicateSuppressor {
    window: Duration,
    seen: DashMap<PathBuf, Instant>,
}

impl DuplicateSuppressor {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            seen: DashMap::new(),
        }
    }

    /// Returns true when the event for `path` should pass through
    pub fn admit(&self, path: &Path) -> bool {
        self.admit_at(path, Instant::now())
    }

    pub fn admit_at(&self, path: &Path, now: Instant) -> bool {
        if let Some(mut first_seen) = self.seen.get_mut(path) {
            if now.saturating_duration_since(*first_seen) < self.window {
                trace!("Suppressing duplicate event for {:?}", path);
                return false;
            }
            *first_seen = now;
            return true;
        }

        self.seen.insert(path.to_path_buf(), now);
        true
    }

    /// Drop entries whose window has closed
    pub fn purge_expired(&self, now: Instant) {
        self.seen
            .retain(|_, seen| now.saturating_duration_since(*seen) < self.window);
    }

    pub fn tracked(&self) -> usize {
        self.seen.len()
    }

    pub fn clear(&self) {
        self.seen.clear();
    }
}

impl Default for DuplicateSuppressor {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_second_event_within_window_dropped() {
        let suppressor = DuplicateSuppressor::default();
        let now = Instant::now();
        let path = Path::new("src/lib.rs");

        assert!(suppressor.admit_at(path, now));
        assert!(!suppressor.admit_at(path, now + Duration::from_millis(400)));
        assert!(suppressor.admit_at(path, now + Duration::from_millis(1000)));
    }

    #[test]
    fn test_distinct_paths_independent() {
        let suppressor = DuplicateSuppressor::default();
        let now = Instant::now();

        assert!(suppressor.admit_at(Path::new("a.rs"), now));
        assert!(suppressor.admit_at(Path::new("b.rs"), now));
        assert_eq!(suppressor.tracked(), 2);
    }

    #[test]
    fn test_purge_expired() {
        let suppressor = DuplicateSuppressor::default();
        let now = Instant::now();
        suppressor.admit_at(Path::new("old.rs"), now);
        suppressor.admit_at(Path::new("new.rs"), now + Duration::from_millis(900));

        suppressor.purge_expired(now + Duration::from_millis(1500));
        assert_eq!(suppressor.tracked(), 1);
    }

    proptest! {
        #[test]
        fn prop_burst_within_window_passes_once(
            offsets in proptest::collection::vec(0u64..1000, 1..50)
        ) {
            let suppressor = DuplicateSuppressor::default();
            let start = Instant::now();
            let path = Path::new("src/engine.rs");

            let mut sorted = offsets.clone();
            sorted.sort_unstable();
            let passed = sorted
                .iter()
                .filter(|ms| suppressor.admit_at(path, start + Duration::from_millis(**ms)))
                .count();

            prop_assert_eq!(passed, 1);
        }
    }
}

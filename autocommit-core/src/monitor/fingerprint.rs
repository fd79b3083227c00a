//! Detects notifications that did not change the diff

use sha2::{Digest, Sha256};
use std::sync::Mutex;

/// Stable 64-bit hash of diff text
pub fn fingerprint(text: &str) -> u64 {
    let digest = Sha256::digest(text.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes)
}

/// Remembers the last observed diff fingerprint
#[derive(Debug, Default)]
pub struct DiffFingerprinter {
    last: Mutex<Option<u64>>,
}

impl DiffFingerprinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `text`; returns false when it hashes the same as last time
    pub fn observe(&self, text: &str) -> bool {
        let hash = fingerprint(text);
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        if *last == Some(hash) {
            return false;
        }
        *last = Some(hash);
        true
    }

    pub fn last(&self) -> Option<u64> {
        *self.last.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Forget the last fingerprint, e.g. after a commit
    pub fn reset(&self) {
        *self.last.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }
}

#![cfg(test)]
//! Scripted advisors for engine tests

use super::{
    AdvisorError, CommitAdvisor, CommitDecision, DecisionRequest, MessageGenerator, Significance,
};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Advisor answering from a queue, falling back to a fixed verdict
pub struct MockAdvisor {
    queue: Mutex<VecDeque<Result<CommitDecision, AdvisorError>>>,
    fallback: Result<CommitDecision, AdvisorError>,
    delay: Duration,
    calls: AtomicUsize,
}

impl MockAdvisor {
    pub fn approving() -> Self {
        Self::always(Ok(decision(true, Significance::Medium)))
    }

    pub fn declining() -> Self {
        Self::always(Ok(decision(false, Significance::Low)))
    }

    pub fn failing() -> Self {
        Self::always(Err(AdvisorError::Failed {
            message: "advisor offline".to_string(),
        }))
    }

    pub fn always(result: Result<CommitDecision, AdvisorError>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback: result,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// Answer only after `delay`, like a slow remote model
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn push(&self, result: Result<CommitDecision, AdvisorError>) {
        self.queue.lock().unwrap().push_back(result);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn decision(should_commit: bool, significance: Significance) -> CommitDecision {
    CommitDecision {
        should_commit,
        reason: if should_commit {
            "ready".to_string()
        } else {
            "not yet".to_string()
        },
        significance,
        completeness: None,
        change_type: None,
        suggested_message: None,
    }
}

#[async_trait]
impl CommitAdvisor for MockAdvisor {
    fn name(&self) -> &str {
        "mock"
    }

    async fn decide(&self, _request: &DecisionRequest) -> Result<CommitDecision, AdvisorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let queued = self.queue.lock().unwrap().pop_front();
        queued.unwrap_or_else(|| self.fallback.clone())
    }
}

/// Message generator returning a fixed result
pub struct MockMessageGenerator {
    result: Result<String, AdvisorError>,
    delay: Duration,
    calls: AtomicUsize,
}

impl MockMessageGenerator {
    pub fn returning(message: &str) -> Self {
        Self::with_result(Ok(message.to_string()))
    }

    pub fn failing() -> Self {
        Self::with_result(Err(AdvisorError::EmptyResponse))
    }

    fn with_result(result: Result<String, AdvisorError>) -> Self {
        Self {
            result,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageGenerator for MockMessageGenerator {
    async fn generate(&self, _staged_diff: &str, _status: &str) -> Result<String, AdvisorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.result.clone()
    }
}

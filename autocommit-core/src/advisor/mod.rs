//! Commit advisors
//!
//! Advisors are the advisory collaborators of the engine: one decides whether
//! the pending changes deserve a commit, the other writes the message. Both may
//! fail; callers must fall back to safe defaults rather than propagate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod cli_tools;
pub mod errors;
pub mod heuristic;
mod mock;
pub mod prompts;

pub use cli_tools::CommandAdvisor;
pub use errors::AdvisorError;
pub use heuristic::{HeuristicAdvisor, HeuristicMessageGenerator};

#[cfg(test)]
pub(crate) use mock::{MockAdvisor, MockMessageGenerator, decision as mock_decision};

/// How significant a set of changes is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Significance {
    Low,
    Medium,
    High,
}

impl fmt::Display for Significance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Significance::Low => "LOW",
            Significance::Medium => "MEDIUM",
            Significance::High => "HIGH",
        };
        write!(f, "{}", s)
    }
}

/// Minimum significance a change needs before it is committed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitThreshold {
    Any,
    #[default]
    Medium,
    Major,
}

impl CommitThreshold {
    pub fn admits(self, significance: Significance) -> bool {
        match self {
            CommitThreshold::Any => true,
            CommitThreshold::Medium => significance >= Significance::Medium,
            CommitThreshold::Major => significance >= Significance::High,
        }
    }
}

impl fmt::Display for CommitThreshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CommitThreshold::Any => "any",
            CommitThreshold::Medium => "medium",
            CommitThreshold::Major => "major",
        };
        write!(f, "{}", s)
    }
}

/// Whether the work in progress looks finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Completeness {
    Complete,
    Partial,
    Incomplete,
}

/// Input handed to a [`CommitAdvisor`]
#[derive(Debug, Clone, Default)]
pub struct DecisionRequest {
    pub staged_diff: String,
    pub status: String,
    pub threshold: Option<CommitThreshold>,
    pub require_completeness: Option<bool>,
}

/// Typed advisor verdict; malformed responses fail to deserialize
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitDecision {
    pub should_commit: bool,
    pub reason: String,
    pub significance: Significance,
    #[serde(default)]
    pub completeness: Option<Completeness>,
    #[serde(default)]
    pub change_type: Option<String>,
    #[serde(default)]
    pub suggested_message: Option<String>,
}

/// Decides whether pending changes should be committed now
#[async_trait]
pub trait CommitAdvisor: Send + Sync {
    fn name(&self) -> &str;

    async fn decide(&self, request: &DecisionRequest) -> Result<CommitDecision, AdvisorError>;
}

/// Writes a commit message for the staged changes
#[async_trait]
pub trait MessageGenerator: Send + Sync {
    async fn generate(&self, staged_diff: &str, status: &str) -> Result<String, AdvisorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_admits() {
        assert!(CommitThreshold::Any.admits(Significance::Low));
        assert!(!CommitThreshold::Medium.admits(Significance::Low));
        assert!(CommitThreshold::Medium.admits(Significance::Medium));
        assert!(!CommitThreshold::Major.admits(Significance::Medium));
        assert!(CommitThreshold::Major.admits(Significance::High));
    }

    #[test]
    fn test_decision_deserializes_from_collaborator_json() {
        let json = r#"{
            "shouldCommit": true,
            "reason": "feature looks complete",
            "significance": "HIGH",
            "completeness": "complete",
            "changeType": "feature",
            "suggestedMessage": "feat: add scheduler"
        }"#;
        let decision: CommitDecision = serde_json::from_str(json).unwrap();

        assert!(decision.should_commit);
        assert_eq!(decision.significance, Significance::High);
        assert_eq!(decision.completeness, Some(Completeness::Complete));
        assert_eq!(
            decision.suggested_message.as_deref(),
            Some("feat: add scheduler")
        );
    }

    #[test]
    fn test_decision_rejects_untyped_significance() {
        let json = r#"{"shouldCommit": true, "reason": "x", "significance": "enormous"}"#;
        assert!(serde_json::from_str::<CommitDecision>(json).is_err());
    }
}

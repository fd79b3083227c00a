//! Local advisors that decide without calling out to a model
//!
//! Significance is rated from the size of the diff; obviously unfinished work
//! (conflict markers, freshly added TODO/FIXME lines) is reported as such.

use super::{
    AdvisorError, CommitAdvisor, CommitDecision, Completeness, DecisionRequest, MessageGenerator,
    Significance,
};
use crate::vcs::commit_builder::{CommitBuilder, infer_commit_type};
use async_trait::async_trait;
use regex_utils::{diffstat, porcelain};
use tracing::trace;

/// Size limits used to rate significance
#[derive(Debug, Clone)]
pub struct HeuristicLimits {
    /// Lines changed at which a change counts as MEDIUM
    pub medium_lines: usize,
    /// Lines changed at which a change counts as HIGH
    pub high_lines: usize,
    /// Files touched at which a change counts as HIGH
    pub high_files: usize,
}

impl Default for HeuristicLimits {
    fn default() -> Self {
        Self {
            medium_lines: 20,
            high_lines: 150,
            high_files: 8,
        }
    }
}

/// Rule-based commit advisor
#[derive(Debug, Clone, Default)]
pub struct HeuristicAdvisor {
    limits: HeuristicLimits,
    builder: CommitBuilder,
}

impl HeuristicAdvisor {
    pub fn new(limits: HeuristicLimits) -> Self {
        Self {
            limits,
            builder: CommitBuilder::default(),
        }
    }

    fn rate(&self, lines: usize, files: usize) -> Significance {
        if lines >= self.limits.high_lines || files >= self.limits.high_files {
            Significance::High
        } else if lines >= self.limits.medium_lines || files >= 3 {
            Significance::Medium
        } else {
            Significance::Low
        }
    }
}

#[async_trait]
impl CommitAdvisor for HeuristicAdvisor {
    fn name(&self) -> &str {
        "heuristic"
    }

    async fn decide(&self, request: &DecisionRequest) -> Result<CommitDecision, AdvisorError> {
        let stat = diffstat::summarize(&request.staged_diff);
        let entries = porcelain::parse(&request.status);

        // Untracked files show up in status but not in the diff
        let mut files: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
        for path in &stat.files {
            if !files.contains(&path.as_str()) {
                files.push(path.as_str());
            }
        }

        if files.is_empty() && stat.lines_changed() == 0 {
            return Ok(CommitDecision {
                should_commit: false,
                reason: "No changes to commit".to_string(),
                significance: Significance::Low,
                completeness: None,
                change_type: None,
                suggested_message: None,
            });
        }

        let significance = self.rate(stat.lines_changed(), files.len());
        let completeness = if stat.conflict_markers > 0 {
            Completeness::Incomplete
        } else if stat.unfinished_markers > 0 {
            Completeness::Partial
        } else {
            Completeness::Complete
        };
        trace!(
            "Heuristic rating: {} ({:?}) for {}",
            significance, completeness, stat
        );

        let added = entries.iter().filter(|e| e.is_added()).count();
        let deleted = entries.iter().filter(|e| e.is_deleted()).count();
        let change_type = infer_commit_type(&files, added, deleted);

        let threshold_ok = request.threshold.is_none_or(|t| t.admits(significance));
        let complete_ok = !request.require_completeness.unwrap_or(false)
            || completeness == Completeness::Complete;

        let reason = if !complete_ok {
            format!("Work looks {:?} ({})", completeness, stat).to_lowercase()
        } else if !threshold_ok {
            format!("{} change below threshold ({})", significance, stat)
        } else {
            format!("{} change ({})", significance, stat)
        };

        Ok(CommitDecision {
            should_commit: threshold_ok && complete_ok,
            reason,
            significance,
            completeness: Some(completeness),
            change_type: Some(change_type.to_string()),
            suggested_message: Some(self.builder.from_status(&entries)),
        })
    }
}

/// Builds conventional messages from `git status`
#[derive(Debug, Clone, Default)]
pub struct HeuristicMessageGenerator {
    builder: CommitBuilder,
}

impl HeuristicMessageGenerator {
    pub fn new(builder: CommitBuilder) -> Self {
        Self { builder }
    }
}

#[async_trait]
impl MessageGenerator for HeuristicMessageGenerator {
    async fn generate(&self, _staged_diff: &str, status: &str) -> Result<String, AdvisorError> {
        let entries = porcelain::parse(status);
        if entries.is_empty() {
            return Err(AdvisorError::EmptyResponse);
        }
        Ok(self.builder.from_status(&entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisor::CommitThreshold;

    fn diff_with_lines(path: &str, lines: usize, extra: &str) -> String {
        let mut diff = format!("diff --git a/{p} b/{p}\n--- a/{p}\n+++ b/{p}\n", p = path);
        for i in 0..lines {
            diff.push_str(&format!("+line {}\n", i));
        }
        diff.push_str(extra);
        diff
    }

    #[tokio::test]
    async fn test_small_change_below_medium_threshold() {
        let advisor = HeuristicAdvisor::default();
        let request = DecisionRequest {
            staged_diff: diff_with_lines("src/a.rs", 3, ""),
            status: " M src/a.rs\n".to_string(),
            threshold: Some(CommitThreshold::Medium),
            require_completeness: Some(true),
        };

        let decision = advisor.decide(&request).await.unwrap();
        assert!(!decision.should_commit);
        assert_eq!(decision.significance, Significance::Low);
        assert!(decision.reason.contains("below threshold"));
    }

    #[tokio::test]
    async fn test_large_change_commits() {
        let advisor = HeuristicAdvisor::default();
        let request = DecisionRequest {
            staged_diff: diff_with_lines("src/a.rs", 200, ""),
            status: " M src/a.rs\n".to_string(),
            threshold: Some(CommitThreshold::Major),
            require_completeness: Some(true),
        };

        let decision = advisor.decide(&request).await.unwrap();
        assert!(decision.should_commit);
        assert_eq!(decision.significance, Significance::High);
        assert_eq!(decision.completeness, Some(Completeness::Complete));
        assert_eq!(
            decision.suggested_message.as_deref(),
            Some("refactor(src): update a.rs")
        );
    }

    #[tokio::test]
    async fn test_conflict_markers_block_when_completeness_required() {
        let advisor = HeuristicAdvisor::default();
        let request = DecisionRequest {
            staged_diff: diff_with_lines("a.rs", 40, "+<<<<<<< HEAD\n"),
            status: " M a.rs\n".to_string(),
            threshold: Some(CommitThreshold::Any),
            require_completeness: Some(true),
        };

        let decision = advisor.decide(&request).await.unwrap();
        assert!(!decision.should_commit);
        assert_eq!(decision.completeness, Some(Completeness::Incomplete));
    }

    #[tokio::test]
    async fn test_untracked_files_count_as_changes() {
        let advisor = HeuristicAdvisor::default();
        let request = DecisionRequest {
            staged_diff: String::new(),
            status: "?? a.txt\n?? b.txt\n?? c.txt\n".to_string(),
            threshold: Some(CommitThreshold::Medium),
            require_completeness: None,
        };

        let decision = advisor.decide(&request).await.unwrap();
        assert!(decision.should_commit);
        assert_eq!(decision.change_type.as_deref(), Some("feat"));
    }

    #[tokio::test]
    async fn test_message_generator_requires_status() {
        let generator = HeuristicMessageGenerator::default();
        assert!(generator.generate("", "").await.is_err());
        assert_eq!(
            generator.generate("", "?? notes.txt\n").await.unwrap(),
            "feat: add notes.txt"
        );
    }
}

//! Optional advisory check before committing
//!
//! Only intelligent mode consults the advisor. Advisor failure never blocks a
//! commit: the gate proceeds with MEDIUM significance instead.

use super::IntelligentCommitPolicy;
use super::state::AiAnalysis;
use crate::advisor::{CommitAdvisor, Completeness, DecisionRequest, Significance};
use crate::monitor::fingerprint::fingerprint;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct GateOutcome {
    pub proceed: bool,
    pub reason: String,
    pub significance: Significance,
    pub suggested_message: Option<String>,
    /// Present when an advisor answered
    pub analysis: Option<AiAnalysis>,
}

impl GateOutcome {
    fn proceed(reason: impl Into<String>) -> Self {
        Self {
            proceed: true,
            reason: reason.into(),
            significance: Significance::Medium,
            suggested_message: None,
            analysis: None,
        }
    }
}

pub struct CommitDecisionGate {
    advisor: Option<Arc<dyn CommitAdvisor>>,
    /// Fingerprint of the content the advisor last declined
    last_declined: Mutex<Option<u64>>,
}

impl CommitDecisionGate {
    pub fn new(advisor: Option<Arc<dyn CommitAdvisor>>) -> Self {
        Self {
            advisor,
            last_declined: Mutex::new(None),
        }
    }

    fn declined(&self) -> MutexGuard<'_, Option<u64>> {
        self.last_declined.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Decide whether to proceed; `policy` is `None` in periodic mode
    pub async fn evaluate(
        &self,
        staged_diff: &str,
        status: &str,
        policy: Option<&IntelligentCommitPolicy>,
    ) -> GateOutcome {
        let Some(policy) = policy else {
            return GateOutcome::proceed("Periodic commit");
        };
        let Some(advisor) = &self.advisor else {
            return GateOutcome::proceed("No advisor configured");
        };

        let content = fingerprint(&format!("{}\0{}", staged_diff, status));
        if *self.declined() == Some(content) {
            debug!("Content unchanged since advisor declined, skipping");
            return GateOutcome {
                proceed: false,
                reason: "Unchanged since last declined".to_string(),
                significance: Significance::Low,
                suggested_message: None,
                analysis: None,
            };
        }

        let request = DecisionRequest {
            staged_diff: staged_diff.to_string(),
            status: status.to_string(),
            threshold: Some(policy.commit_threshold),
            require_completeness: Some(policy.require_completeness),
        };

        let decision = match advisor.decide(&request).await {
            Ok(decision) => decision,
            Err(e) => {
                warn!(
                    "Advisor '{}' failed, committing anyway: {}",
                    advisor.name(),
                    e
                );
                return GateOutcome::proceed(format!("Advisor unavailable ({})", e));
            }
        };

        let meets_threshold = policy.commit_threshold.admits(decision.significance);
        let finished = matches!(decision.completeness, None | Some(Completeness::Complete));
        let complete = !policy.require_completeness || finished;
        let proceed = decision.should_commit && meets_threshold && complete;

        let reason = if !decision.should_commit {
            decision.reason.clone()
        } else if !meets_threshold {
            format!(
                "{} is below the '{}' threshold",
                decision.significance, policy.commit_threshold
            )
        } else if !complete {
            "Work does not look complete".to_string()
        } else {
            decision.reason.clone()
        };
        let verdict = if proceed { "commit" } else { "skip" };
        info!("Advisor '{}': {} ({})", advisor.name(), verdict, reason);

        *self.declined() = if proceed { None } else { Some(content) };

        GateOutcome {
            proceed,
            reason,
            significance: decision.significance,
            suggested_message: decision.suggested_message.clone(),
            analysis: Some(AiAnalysis::from(&decision)),
        }
    }

    /// Forget the last declined content
    pub fn reset(&self) {
        *self.declined() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisor::{CommitThreshold, MockAdvisor, mock_decision};

    fn policy() -> IntelligentCommitPolicy {
        IntelligentCommitPolicy::default()
    }

    #[tokio::test]
    async fn test_periodic_mode_never_consults() {
        let advisor = Arc::new(MockAdvisor::declining());
        let gate = CommitDecisionGate::new(Some(advisor.clone()));

        let outcome = gate.evaluate("+x", " M a", None).await;
        assert!(outcome.proceed);
        assert_eq!(advisor.calls(), 0);
    }

    #[tokio::test]
    async fn test_advisor_failure_proceeds_with_medium() {
        let gate = CommitDecisionGate::new(Some(Arc::new(MockAdvisor::failing())));

        let outcome = gate.evaluate("+x", " M a", Some(&policy())).await;
        assert!(outcome.proceed);
        assert_eq!(outcome.significance, Significance::Medium);
        assert!(outcome.reason.contains("advisor offline"));
    }

    #[tokio::test]
    async fn test_threshold_enforced_locally() {
        let decision = mock_decision(true, Significance::Medium);
        let gate = CommitDecisionGate::new(Some(Arc::new(MockAdvisor::always(Ok(decision)))));
        let policy = IntelligentCommitPolicy {
            commit_threshold: CommitThreshold::Major,
            ..policy()
        };

        let outcome = gate.evaluate("+x", " M a", Some(&policy)).await;
        assert!(!outcome.proceed);
        assert!(outcome.reason.contains("below"));
        assert!(outcome.analysis.unwrap().should_commit);
    }

    #[tokio::test]
    async fn test_incomplete_work_blocked() {
        let mut decision = mock_decision(true, Significance::High);
        decision.completeness = Some(Completeness::Partial);
        let gate = CommitDecisionGate::new(Some(Arc::new(MockAdvisor::always(Ok(decision)))));

        assert!(!gate.evaluate("+x", " M a", Some(&policy())).await.proceed);

        let relaxed = IntelligentCommitPolicy {
            require_completeness: false,
            ..policy()
        };
        gate.reset();
        assert!(gate.evaluate("+x", " M a", Some(&relaxed)).await.proceed);
    }

    #[tokio::test]
    async fn test_declined_content_not_resubmitted() {
        let advisor = Arc::new(MockAdvisor::declining());
        let gate = CommitDecisionGate::new(Some(advisor.clone()));

        assert!(!gate.evaluate("+x", " M a", Some(&policy())).await.proceed);
        assert!(!gate.evaluate("+x", " M a", Some(&policy())).await.proceed);
        assert_eq!(advisor.calls(), 1);

        gate.evaluate("+x\n+y", " M a", Some(&policy())).await;
        assert_eq!(advisor.calls(), 2);
    }
}

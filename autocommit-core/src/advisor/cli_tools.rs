//! Advisor backed by an external command-line tool
//!
//! The prompt is written to the tool's stdin and its stdout is parsed. Works
//! with any AI CLI that answers a prompt on stdin (e.g. `claude --print`).

use super::prompts::PromptTemplates;
use super::{AdvisorError, CommitAdvisor, CommitDecision, DecisionRequest, MessageGenerator};
use async_trait::async_trait;
use regex_utils::{fences, message};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Runs a configured command for decisions and commit messages
#[derive(Debug, Clone)]
pub struct CommandAdvisor {
    command: Vec<String>,
    timeout: Duration,
}

impl CommandAdvisor {
    pub fn new(command: Vec<String>, timeout: Duration) -> Result<Self, AdvisorError> {
        if command.is_empty() || command[0].trim().is_empty() {
            return Err(AdvisorError::NotConfigured);
        }
        Ok(Self { command, timeout })
    }

    fn display_command(&self) -> String {
        self.command.join(" ")
    }

    async fn run(&self, prompt: &str) -> Result<String, AdvisorError> {
        let (program, args) = self
            .command
            .split_first()
            .ok_or(AdvisorError::NotConfigured)?;

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AdvisorError::Unavailable {
                command: self.display_command(),
                message: e.to_string(),
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            // A tool that ignores stdin may close it early
            if let Err(e) = stdin.write_all(prompt.as_bytes()).await {
                debug!("Advisor closed stdin early: {}", e);
            }
        }

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| AdvisorError::Timeout {
                duration: self.timeout,
            })?
            .map_err(|e| AdvisorError::Failed {
                message: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AdvisorError::Failed {
                message: format!(
                    "{} exited with {}: {}",
                    program,
                    output.status,
                    stderr.trim()
                ),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        if stdout.trim().is_empty() {
            return Err(AdvisorError::EmptyResponse);
        }
        Ok(stdout)
    }
}

/// Parse a decision out of free-form tool output
pub fn parse_decision(response: &str) -> Result<CommitDecision, AdvisorError> {
    let json = fences::extract_json_object(response).ok_or_else(|| {
        AdvisorError::MalformedResponse {
            message: "no JSON object in response".to_string(),
        }
    })?;

    serde_json::from_str(&json).map_err(|e| AdvisorError::MalformedResponse {
        message: e.to_string(),
    })
}

#[async_trait]
impl CommitAdvisor for CommandAdvisor {
    fn name(&self) -> &str {
        "command"
    }

    async fn decide(&self, request: &DecisionRequest) -> Result<CommitDecision, AdvisorError> {
        let prompt = PromptTemplates::decision_prompt(request);
        let response = self.run(&prompt).await?;
        let decision = parse_decision(&response);
        if let Err(e) = &decision {
            warn!("Could not parse advisor response: {}", e);
        }
        decision
    }
}

#[async_trait]
impl MessageGenerator for CommandAdvisor {
    async fn generate(&self, staged_diff: &str, status: &str) -> Result<String, AdvisorError> {
        let prompt = PromptTemplates::message_prompt(staged_diff, status);
        let response = self.run(&prompt).await?;
        message::sanitize(&response).ok_or(AdvisorError::EmptyResponse)
    }
}

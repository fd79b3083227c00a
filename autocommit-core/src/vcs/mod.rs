//! Version control integration
//!
//! The engine never talks to git directly: every operation goes through a
//! [`CommandRunner`], which makes the repository an opaque subprocess boundary
//! that tests can script.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub mod commit_builder;
pub mod git_ops;
mod mock;

pub use commit_builder::{CommitBuilder, CommitType};
pub use git_ops::{GitCli, Repository};

#[cfg(test)]
pub(crate) use mock::ScriptedRunner;

/// Captured result of one version-control command
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: 0,
        }
    }

    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code,
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Errors raised at the version-control boundary
#[derive(Debug, Clone, Error)]
pub enum VcsError {
    /// The command could not be started at all
    #[error("Failed to run `git {command}`: {message}")]
    Spawn { command: String, message: String },

    /// The command ran and exited non-zero
    #[error("`git {command}` exited with code {exit_code}: {stderr}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stdout: String,
        stderr: String,
    },

    /// The command succeeded but produced output we could not use
    #[error("Unexpected output from `git {command}`: {message}")]
    UnexpectedOutput { command: String, message: String },
}

impl VcsError {
    /// Combined command output, for "view output" style recovery
    pub fn output(&self) -> Option<String> {
        match self {
            VcsError::CommandFailed { stdout, stderr, .. } => {
                let mut text = String::new();
                if !stdout.trim().is_empty() {
                    text.push_str(stdout.trim_end());
                    text.push('\n');
                }
                text.push_str(stderr.trim_end());
                Some(text)
            }
            _ => None,
        }
    }
}

/// Runs one version-control command in a working directory
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, args: &[&str], cwd: &Path) -> Result<CommandOutput, VcsError>;
}

//! Git operations over the `git` executable

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info, trace};

use super::{CommandOutput, CommandRunner, VcsError};

/// Runs the system `git` binary
#[derive(Debug, Clone)]
pub struct GitCli {
    program: String,
}

impl GitCli {
    pub fn new() -> Self {
        Self {
            program: "git".to_string(),
        }
    }

    /// Use a specific git executable
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandRunner for GitCli {
    async fn run(&self, args: &[&str], cwd: &Path) -> Result<CommandOutput, VcsError> {
        trace!("Running {} {:?} in {:?}", self.program, args, cwd);

        let output = Command::new(&self.program)
            .args(args)
            .current_dir(cwd)
            // Never block on a credential prompt
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| VcsError::Spawn {
                command: args.join(" "),
                message: e.to_string(),
            })?;

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }
}

/// High-level repository operations used by the engine
#[derive(Clone)]
pub struct Repository {
    root: PathBuf,
    runner: Arc<dyn CommandRunner>,
}

impl Repository {
    pub fn new(root: impl AsRef<Path>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            runner,
        }
    }

    /// Repository backed by the system git binary
    pub fn open(root: impl AsRef<Path>) -> Self {
        Self::new(root, Arc::new(GitCli::new()))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Run a command and treat a non-zero exit as an error
    async fn git(&self, args: &[&str]) -> Result<CommandOutput, VcsError> {
        let output = self.runner.run(args, &self.root).await?;
        if output.is_success() {
            Ok(output)
        } else {
            Err(VcsError::CommandFailed {
                command: args.join(" "),
                exit_code: output.exit_code,
                stdout: output.stdout,
                stderr: output.stderr,
            })
        }
    }

    /// Check that the root is inside a git work tree
    pub async fn is_repository(&self) -> bool {
        let args = ["rev-parse", "--is-inside-work-tree"];
        match self.runner.run(&args, &self.root).await {
            Ok(output) => output.is_success() && output.stdout.trim() == "true",
            Err(_) => false,
        }
    }

    /// Get current branch name
    pub async fn current_branch(&self) -> Result<String, VcsError> {
        let output = self.git(&["rev-parse", "--abbrev-ref", "HEAD"]).await?;
        Ok(output.stdout.trim().to_string())
    }

    /// `git status --porcelain`
    pub async fn status(&self) -> Result<String, VcsError> {
        Ok(self.git(&["status", "--porcelain"]).await?.stdout)
    }

    /// Working-tree changes not yet staged
    pub async fn unstaged_diff(&self) -> Result<String, VcsError> {
        Ok(self.git(&["diff"]).await?.stdout)
    }

    /// Everything a commit of the whole tree would contain (untracked contents excluded)
    pub async fn pending_diff(&self) -> Result<String, VcsError> {
        let staged = self.git(&["diff", "--cached"]).await?.stdout;
        let unstaged = self.git(&["diff"]).await?.stdout;
        Ok(format!("{}{}", staged, unstaged))
    }

    /// Stage all changes, including deletions and untracked files
    pub async fn stage_all(&self) -> Result<(), VcsError> {
        self.git(&["add", "-A"]).await?;
        debug!("Staged all changes in {:?}", self.root);
        Ok(())
    }

    /// Create a commit and return its id
    pub async fn commit(&self, message: &str) -> Result<String, VcsError> {
        self.git(&["commit", "-m", message]).await?;
        let head = self.git(&["rev-parse", "HEAD"]).await?;
        let id = head.stdout.trim().to_string();
        if id.is_empty() {
            return Err(VcsError::UnexpectedOutput {
                command: "rev-parse HEAD".to_string(),
                message: "empty commit id".to_string(),
            });
        }

        info!("Created commit: {}", id);
        Ok(id)
    }

    /// Push the current branch to its upstream
    pub async fn push(&self) -> Result<(), VcsError> {
        self.git(&["push"]).await?;
        info!("Pushed to remote");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vcs::ScriptedRunner;

    fn repo_with(runner: &Arc<ScriptedRunner>) -> Repository {
        Repository::new("/repo", runner.clone())
    }

    #[tokio::test]
    async fn test_nonzero_exit_becomes_error() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.respond(
            "add",
            Ok(CommandOutput::failure(128, "fatal: index.lock exists")),
        );
        let repo = repo_with(&runner);

        let err = repo.stage_all().await.unwrap_err();
        match &err {
            VcsError::CommandFailed {
                command, exit_code, ..
            } => {
                assert_eq!(command, "add -A");
                assert_eq!(*exit_code, 128);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(err.output().unwrap().contains("index.lock"));
    }

    #[tokio::test]
    async fn test_commit_returns_head_id() {
        let runner = Arc::new(ScriptedRunner::new());
        runner.respond("rev-parse HEAD", Ok(CommandOutput::success("abc123\n")));
        let repo = repo_with(&runner);

        let id = repo.commit("chore: test").await.unwrap();
        assert_eq!(id, "abc123");
        assert_eq!(runner.calls()[0], vec!["commit", "-m", "chore: test"]);
    }

    #[tokio::test]
    async fn test_git_cli_against_real_repository() {
        let git = GitCli::new();
        let dir = tempfile::TempDir::new().unwrap();
        // Skip quietly where git is not installed
        if git.run(&["--version"], dir.path()).await.is_err() {
            return;
        }

        let init = git.run(&["init", "-q"], dir.path()).await.unwrap();
        assert!(init.is_success());

        let repo = Repository::open(dir.path());
        assert!(repo.is_repository().await);

        std::fs::write(dir.path().join("a.txt"), "hello").unwrap();
        let status = repo.status().await.unwrap();
        assert!(status.contains("?? a.txt"));
    }
}

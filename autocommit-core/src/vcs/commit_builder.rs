//! Commit message builder for semantic commits

use regex_utils::porcelain::StatusEntry;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Message used when no collaborator produced anything usable
pub const DEFAULT_COMMIT_MESSAGE: &str = "chore: automated commit";

/// Commit message style
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitStyle {
    #[default]
    Conventional,
    Simple,
}

/// Type of commit according to conventional commits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitType {
    /// New feature
    Feat,
    /// Bug fix
    Fix,
    /// Code refactoring
    Refactor,
    /// Performance improvement
    Perf,
    /// Documentation changes
    Docs,
    /// Style changes (formatting, etc)
    Style,
    /// Test changes
    Test,
    /// Build system changes
    Build,
    /// CI/CD changes
    Ci,
    /// Chore/maintenance
    Chore,
}

impl fmt::Display for CommitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CommitType::Feat => "feat",
            CommitType::Fix => "fix",
            CommitType::Refactor => "refactor",
            CommitType::Perf => "perf",
            CommitType::Docs => "docs",
            CommitType::Style => "style",
            CommitType::Test => "test",
            CommitType::Build => "build",
            CommitType::Ci => "ci",
            CommitType::Chore => "chore",
        };
        write!(f, "{}", s)
    }
}

/// Builds semantic commit messages
#[derive(Debug, Clone, Default)]
pub struct CommitBuilder {
    style: CommitStyle,
}

impl CommitBuilder {
    pub fn new(style: CommitStyle) -> Self {
        Self { style }
    }

    /// Build a commit message
    pub fn build_message(
        &self,
        commit_type: CommitType,
        scope: Option<&str>,
        description: &str,
    ) -> String {
        match self.style {
            CommitStyle::Conventional => match scope {
                Some(scope) => format!("{}({}): {}", commit_type, scope, description),
                None => format!("{}: {}", commit_type, description),
            },
            CommitStyle::Simple => description.to_string(),
        }
    }

    /// Generate a commit message from `git status --porcelain` entries
    pub fn from_status(&self, entries: &[StatusEntry]) -> String {
        if entries.is_empty() {
            return DEFAULT_COMMIT_MESSAGE.to_string();
        }

        let added = entries.iter().filter(|e| e.is_added()).count();
        let deleted = entries.iter().filter(|e| e.is_deleted()).count();
        let modified = entries.len() - added - deleted;

        let paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
        let scope = find_common_scope(&paths);

        let description = if entries.len() == 1 {
            let verb = if added == 1 {
                "add"
            } else if deleted == 1 {
                "remove"
            } else {
                "update"
            };
            format!("{} {}", verb, file_name(paths[0]))
        } else if added > modified && added > deleted {
            format!("add {} files", added)
        } else if deleted > modified {
            format!("remove {} files", deleted)
        } else {
            format!("update {} files", entries.len())
        };

        let commit_type = infer_commit_type(&paths, added, deleted);
        self.build_message(commit_type, scope.as_deref(), &description)
    }
}

/// Infer commit type from the touched paths
pub fn infer_commit_type(paths: &[&str], added: usize, deleted: usize) -> CommitType {
    let all = |pred: fn(&str) -> bool| !paths.is_empty() && paths.iter().all(|p| pred(p));

    if all(|p| p.ends_with(".md") || p.starts_with("docs/")) {
        CommitType::Docs
    } else if all(|p| p.contains("test")) {
        CommitType::Test
    } else if all(|p| p.starts_with(".github/") || p.starts_with(".gitlab")) {
        CommitType::Ci
    } else if all(|p| {
        matches!(
            file_name(p),
            "Cargo.toml" | "Cargo.lock" | "package.json" | "package-lock.json" | "Makefile"
        )
    }) {
        CommitType::Build
    } else if added * 2 > paths.len() {
        CommitType::Feat
    } else if deleted == paths.len() {
        CommitType::Chore
    } else {
        CommitType::Refactor
    }
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Find common top-level directory of the paths
fn find_common_scope(paths: &[&str]) -> Option<String> {
    let first = paths.first()?.split('/').collect::<Vec<_>>();
    if first.len() < 2 {
        return None;
    }

    let top = first[0];
    if paths.iter().all(|p| {
        let mut parts = p.split('/');
        parts.next() == Some(top) && parts.next().is_some()
    }) && top != "."
    {
        Some(top.to_string())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex_utils::porcelain;

    #[test]
    fn test_conventional_commit() {
        let builder = CommitBuilder::new(CommitStyle::Conventional);
        let message = builder.build_message(CommitType::Feat, Some("vcs"), "add git integration");

        assert_eq!(message, "feat(vcs): add git integration");
    }

    #[test]
    fn test_simple_commit() {
        let builder = CommitBuilder::new(CommitStyle::Simple);
        let message = builder.build_message(CommitType::Fix, None, "resolve merge conflict");

        assert_eq!(message, "resolve merge conflict");
    }

    #[test]
    fn test_from_status_single_file() {
        let builder = CommitBuilder::default();
        let entries = porcelain::parse(" M src/engine/state.rs\n");

        assert_eq!(
            builder.from_status(&entries),
            "refactor(src): update state.rs"
        );
    }

    #[test]
    fn test_from_status_new_files() {
        let builder = CommitBuilder::default();
        let entries = porcelain::parse("?? src/a.rs\n?? src/b.rs\n M src/lib.rs\n");

        assert_eq!(builder.from_status(&entries), "feat(src): add 2 files");
    }

    #[test]
    fn test_from_status_docs_only() {
        let builder = CommitBuilder::default();
        let entries = porcelain::parse(" M README.md\n M docs/guide.md\n");

        assert_eq!(builder.from_status(&entries), "docs: update 2 files");
    }

    #[test]
    fn test_empty_status_uses_default() {
        let builder = CommitBuilder::default();
        assert_eq!(builder.from_status(&[]), DEFAULT_COMMIT_MESSAGE);
    }
}

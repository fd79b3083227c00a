//! Classifies raw filesystem events as ignorable or actionable

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::{Component, Path};
use tracing::{trace, warn};

/// Lock and scratch files git writes while it works
const VCS_CONTROL_FILES: &[&str] = &[
    "index.lock",
    "HEAD.lock",
    "MERGE_HEAD",
    "MERGE_MSG",
    "MERGE_MODE",
    "COMMIT_EDITMSG",
    "ORIG_HEAD",
    "FETCH_HEAD",
    "packed-refs.lock",
    "config.lock",
    "shallow.lock",
];

const OS_METADATA_FILES: &[&str] = &[".DS_Store", "Thumbs.db", "desktop.ini"];

const VCS_DIR: &str = ".git";

/// Why a path was ignored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    VcsControlFile,
    OsMetadata,
    VcsDirectory,
    UserPattern,
}

/// Decides whether a filesystem event deserves attention
#[derive(Debug, Clone)]
pub struct ChangeFilter {
    root: std::path::PathBuf,
    patterns: Option<Gitignore>,
}

impl ChangeFilter {
    /// Filter with only the fixed rules
    pub fn new(root: impl Into<std::path::PathBuf>) -> Self {
        Self {
            root: root.into(),
            patterns: None,
        }
    }

    /// Filter that also honours the repository `.gitignore` and extra patterns
    pub fn with_patterns(root: impl Into<std::path::PathBuf>, patterns: &[String]) -> Self {
        let root = root.into();
        let mut builder = GitignoreBuilder::new(&root);

        let gitignore = root.join(".gitignore");
        if gitignore.is_file() {
            if let Some(e) = builder.add(&gitignore) {
                warn!("Could not read {:?}: {}", gitignore, e);
            }
        }
        for pattern in patterns {
            if let Err(e) = builder.add_line(None, pattern) {
                warn!("Invalid ignore pattern '{}': {}", pattern, e);
            }
        }

        let patterns = match builder.build() {
            Ok(gi) if !gi.is_empty() => Some(gi),
            Ok(_) => None,
            Err(e) => {
                warn!("Failed to build ignore matcher: {}", e);
                None
            }
        };

        Self { root, patterns }
    }

    pub fn is_ignored(&self, path: &Path) -> bool {
        self.classify(path).is_some()
    }

    /// Returns the first rule that ignores `path`, if any
    pub fn classify(&self, path: &Path) -> Option<IgnoreReason> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        let reason = if VCS_CONTROL_FILES.contains(&&*name) {
            Some(IgnoreReason::VcsControlFile)
        } else if OS_METADATA_FILES.contains(&&*name) || name.starts_with("._") {
            Some(IgnoreReason::OsMetadata)
        } else if inside_vcs_dir(path) {
            Some(IgnoreReason::VcsDirectory)
        } else if self.matches_pattern(path) {
            Some(IgnoreReason::UserPattern)
        } else {
            None
        };

        if let Some(reason) = reason {
            trace!("Ignoring {:?} ({:?})", path, reason);
        }
        reason
    }

    fn matches_pattern(&self, path: &Path) -> bool {
        let Some(patterns) = &self.patterns else {
            return false;
        };
        // Patterns only apply inside the repository
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return false;
        };
        patterns
            .matched_path_or_any_parents(relative, path.is_dir())
            .is_ignore()
    }
}

fn inside_vcs_dir(path: &Path) -> bool {
    path.components()
        .any(|c| matches!(c, Component::Normal(n) if n == VCS_DIR))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_vcs_control_files_ignored() {
        let filter = ChangeFilter::new("/repo");
        assert_eq!(
            filter.classify(Path::new("/repo/index.lock")),
            Some(IgnoreReason::VcsControlFile)
        );
        assert_eq!(
            filter.classify(Path::new("/repo/COMMIT_EDITMSG")),
            Some(IgnoreReason::VcsControlFile)
        );
    }

    #[test]
    fn test_os_metadata_ignored() {
        let filter = ChangeFilter::new("/repo");
        assert!(filter.is_ignored(Path::new("/repo/src/.DS_Store")));
        assert!(filter.is_ignored(Path::new("/repo/Thumbs.db")));
        assert!(filter.is_ignored(Path::new("/repo/._notes.md")));
    }

    #[test]
    fn test_vcs_directory_ignored() {
        let filter = ChangeFilter::new("/repo");
        assert_eq!(
            filter.classify(Path::new("/repo/.git/objects/ab/cdef")),
            Some(IgnoreReason::VcsDirectory)
        );
        assert!(!filter.is_ignored(Path::new("/repo/.github/workflows/ci.yml")));
    }

    #[test]
    fn test_source_files_actionable() {
        let filter = ChangeFilter::new("/repo");
        assert!(!filter.is_ignored(Path::new("/repo/src/main.rs")));
        assert!(!filter.is_ignored(Path::new("/repo/README.md")));
    }

    #[test]
    fn test_user_patterns_and_gitignore() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".gitignore"), "target/\n*.log\n").unwrap();
        let filter = ChangeFilter::with_patterns(dir.path(), &["*.tmp".to_string()]);

        assert_eq!(
            filter.classify(&dir.path().join("build.log")),
            Some(IgnoreReason::UserPattern)
        );
        assert!(filter.is_ignored(&dir.path().join("scratch.tmp")));
        assert!(filter.is_ignored(&dir.path().join("target/debug/app")));
        assert!(!filter.is_ignored(&dir.path().join("src/lib.rs")));
    }
}

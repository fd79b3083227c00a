//! Configuration file model
//!
//! Settings live in `.autocommit/config.toml` at the repository root. The
//! engine never reads this file; it receives an [`EngineConfig`] built from it
//! when a watch session starts.

use crate::advisor::CommitThreshold;
use crate::engine::{EngineConfig, IntelligentCommitPolicy, PeriodicPolicy, WatchMode};
use crate::vcs::commit_builder::DEFAULT_COMMIT_MESSAGE;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Directory holding configuration and runtime state
pub const CONFIG_DIR: &str = ".autocommit";
pub const CONFIG_FILE: &str = "config.toml";
pub const STATE_FILE: &str = "state.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid configuration in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("{path} already exists")]
    AlreadyExists { path: PathBuf },
}

/// Top-level configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoCommitConfig {
    /// Scheduling strategy: `periodic` or `intelligent`
    pub mode: WatchMode,

    /// Push after every commit
    pub auto_push: bool,

    /// Extra gitignore-style patterns the watcher skips
    pub ignore_patterns: Vec<String>,

    /// Message used when no better one can be produced
    pub default_message: String,

    pub periodic: PeriodicSection,
    pub intelligent: IntelligentSection,
    pub advisor: AdvisorSection,
}

impl Default for AutoCommitConfig {
    fn default() -> Self {
        Self {
            mode: WatchMode::Periodic,
            auto_push: false,
            ignore_patterns: vec![
                "target/".to_string(),
                "node_modules/".to_string(),
                "*.swp".to_string(),
            ],
            default_message: DEFAULT_COMMIT_MESSAGE.to_string(),
            periodic: PeriodicSection::default(),
            intelligent: IntelligentSection::default(),
            advisor: AdvisorSection::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeriodicSection {
    pub debounce_ms: u64,
    pub buffer_time_seconds: u32,
    pub cancel_on_new_changes: bool,
}

impl Default for PeriodicSection {
    fn default() -> Self {
        Self {
            debounce_ms: 30_000,
            buffer_time_seconds: 0,
            cancel_on_new_changes: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntelligentSection {
    pub commit_threshold: CommitThreshold,
    pub min_time_between_commits_ms: u64,
    pub activity_settle_time_ms: u64,
    pub require_completeness: bool,
    pub buffer_time_seconds: u32,
    pub cancel_on_new_changes: bool,
}

impl Default for IntelligentSection {
    fn default() -> Self {
        Self {
            commit_threshold: CommitThreshold::Medium,
            min_time_between_commits_ms: 1_800_000,
            activity_settle_time_ms: 300_000,
            require_completeness: true,
            buffer_time_seconds: 30,
            cancel_on_new_changes: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdvisorKind {
    /// Local rules, no external calls
    #[default]
    Heuristic,
    /// External command reading a prompt on stdin
    Command,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisorSection {
    pub kind: AdvisorKind,
    /// Program and arguments, e.g. `["claude", "--print"]`
    pub command: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for AdvisorSection {
    fn default() -> Self {
        Self {
            kind: AdvisorKind::Heuristic,
            command: Vec::new(),
            timeout_secs: 60,
        }
    }
}

impl AdvisorSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl AutoCommitConfig {
    /// Default location for a repository root
    pub fn path_for(root: &Path) -> PathBuf {
        root.join(CONFIG_DIR).join(CONFIG_FILE)
    }

    /// Load from `path`; a missing file yields defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path, overwrite: bool) -> Result<(), ConfigError> {
        if path.exists() && !overwrite {
            return Err(ConfigError::AlreadyExists {
                path: path.to_path_buf(),
            });
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Immutable snapshot handed to the engine
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            mode: self.mode,
            auto_push: self.auto_push,
            default_message: self.default_message.clone(),
            periodic: PeriodicPolicy {
                debounce: Duration::from_millis(self.periodic.debounce_ms),
                buffer_time_seconds: self.periodic.buffer_time_seconds,
                cancel_on_new_changes: self.periodic.cancel_on_new_changes,
            },
            intelligent: IntelligentCommitPolicy {
                commit_threshold: self.intelligent.commit_threshold,
                min_time_between_commits: Duration::from_millis(
                    self.intelligent.min_time_between_commits_ms,
                ),
                activity_settle_time: Duration::from_millis(
                    self.intelligent.activity_settle_time_ms,
                ),
                require_completeness: self.intelligent.require_completeness,
                buffer_time_seconds: self.intelligent.buffer_time_seconds,
                cancel_on_new_changes: self.intelligent.cancel_on_new_changes,
            },
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let path = AutoCommitConfig::path_for(dir.path());
        let config = AutoCommitConfig::load(&path).unwrap();
        assert_eq!(config, AutoCommitConfig::default());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "mode = \"intelligent\"\nauto_push = true\n\n\
             [intelligent]\ncommit_threshold = \"major\"\n",
        )
        .unwrap();

        let config = AutoCommitConfig::load(&path).unwrap();
        assert_eq!(config.mode, WatchMode::Intelligent);
        assert!(config.auto_push);
        assert_eq!(config.intelligent.commit_threshold, CommitThreshold::Major);
        assert_eq!(config.intelligent.activity_settle_time_ms, 300_000);
        assert_eq!(config.periodic.debounce_ms, 30_000);
    }

    #[test]
    fn test_invalid_value_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "mode = \"sometimes\"\n").unwrap();

        assert!(matches!(
            AutoCommitConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_save_refuses_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = AutoCommitConfig::path_for(dir.path());
        let config = AutoCommitConfig::default();

        config.save(&path, false).unwrap();
        assert!(matches!(
            config.save(&path, false),
            Err(ConfigError::AlreadyExists { .. })
        ));
        config.save(&path, true).unwrap();
        assert_eq!(AutoCommitConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_engine_config_conversion() {
        let config = AutoCommitConfig {
            mode: WatchMode::Intelligent,
            ..Default::default()
        };
        let engine = config.engine_config();

        assert_eq!(
            engine.intelligent.activity_settle_time,
            Duration::from_secs(300)
        );
        assert_eq!(
            engine.intelligent.min_time_between_commits,
            Duration::from_secs(1800)
        );
        assert_eq!(engine.buffer_time_seconds(), 30);
        assert_eq!(engine.threshold(), Some(CommitThreshold::Medium));
    }
}

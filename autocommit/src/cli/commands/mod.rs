//! Subcommand implementations

pub mod commit;
pub mod init;
pub mod status;
pub mod watch;

use anyhow::{Context, Result, bail};
use autocommit_core::advisor::{
    CommandAdvisor, CommitAdvisor, HeuristicAdvisor, HeuristicMessageGenerator, MessageGenerator,
};
use autocommit_core::config::{AdvisorKind, CONFIG_DIR, STATE_FILE};
use autocommit_core::monitor::ChangeFilter;
use autocommit_core::{AutoCommitConfig, Engine, EngineConfig, OrchestrationState, Repository};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Resolved repository root and loaded configuration shared by every command
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub root: PathBuf,
    pub config_path: PathBuf,
    pub config: AutoCommitConfig,
}

impl CommandContext {
    pub fn load(repo: PathBuf, config_path: Option<PathBuf>) -> Result<Self> {
        let root = repo
            .canonicalize()
            .with_context(|| format!("Repository path {:?} does not exist", repo))?;
        let config_path = config_path.unwrap_or_else(|| AutoCommitConfig::path_for(&root));
        let config = AutoCommitConfig::load(&config_path)
            .with_context(|| format!("Failed to load configuration from {:?}", config_path))?;
        debug!("Loaded configuration for {:?}: {:?}", root, config);

        Ok(Self {
            root,
            config_path,
            config,
        })
    }

    pub fn state_path(&self) -> PathBuf {
        self.root.join(CONFIG_DIR).join(STATE_FILE)
    }

    /// Configured patterns plus the session state file, which must never trigger a commit
    pub fn ignore_patterns(&self) -> Vec<String> {
        let mut patterns = self.config.ignore_patterns.clone();
        patterns.push(format!("/{}/{}", CONFIG_DIR, STATE_FILE));
        patterns
    }

    /// Open the repository, failing when the root is not a git work tree
    pub async fn repository(&self) -> Result<Repository> {
        let repo = Repository::open(&self.root);
        if !repo.is_repository().await {
            bail!("{:?} is not inside a git work tree", self.root);
        }
        Ok(repo)
    }

    /// Assemble an engine with the configured advisor and message generator
    pub fn build_engine(&self, engine_config: EngineConfig, repo: Repository) -> Result<Engine> {
        let (advisor, messages) = build_collaborators(&self.config)?;
        let filter = ChangeFilter::with_patterns(&self.root, &self.ignore_patterns());

        let engine = Engine::new(engine_config, repo, OrchestrationState::new())
            .with_filter(filter)
            .with_advisor(advisor)
            .with_message_generator(messages);
        Ok(engine)
    }
}

fn build_collaborators(
    config: &AutoCommitConfig,
) -> Result<(Arc<dyn CommitAdvisor>, Arc<dyn MessageGenerator>)> {
    match config.advisor.kind {
        AdvisorKind::Heuristic => {
            info!("Using heuristic advisor");
            let advisor = Arc::new(HeuristicAdvisor::default());
            Ok((advisor, Arc::new(HeuristicMessageGenerator::default())))
        }
        AdvisorKind::Command => {
            let command = config.advisor.command.clone();
            let advisor = CommandAdvisor::new(command, config.advisor.timeout())
                .context("advisor.kind is \"command\" but advisor.command is empty")?;
            let advisor = Arc::new(advisor);
            let command_line = config.advisor.command.join(" ");
            info!("Using command advisor: {}", command_line);
            Ok((advisor.clone(), advisor))
        }
    }
}

/// Keep the session state file out of `git status`
pub fn ensure_state_ignored(root: &Path) -> Result<()> {
    let dir = root.join(CONFIG_DIR);
    let gitignore = dir.join(".gitignore");
    if gitignore.exists() {
        return Ok(());
    }

    fs::create_dir_all(&dir).with_context(|| format!("Failed to create {:?}", dir))?;
    fs::write(&gitignore, format!("{}\n", STATE_FILE))
        .with_context(|| format!("Failed to write {:?}", gitignore))?;
    debug!("Created {:?}", gitignore);
    Ok(())
}

//! `autocommit init`: write the default configuration

use super::{CommandContext, ensure_state_ignored};
use crate::cli::app::InitArgs;
use anyhow::{Context, Result};
use autocommit_core::{AutoCommitConfig, ConfigError};
use tracing::{info, warn};

pub fn execute(context: &CommandContext, args: InitArgs) -> Result<()> {
    match AutoCommitConfig::default().save(&context.config_path, args.force) {
        Ok(()) => info!("Wrote {:?}", context.config_path),
        Err(ConfigError::AlreadyExists { path }) => {
            warn!("{:?} already exists; use --force to overwrite", path);
            return Ok(());
        }
        Err(e) => return Err(e).context("Failed to write configuration"),
    }

    ensure_state_ignored(&context.root)?;
    println!("Initialized autocommit in {:?}", context.root);
    println!(
        "Edit {:?} and run `autocommit watch` to start",
        context.config_path
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_writes_loadable_config() {
        let dir = TempDir::new().unwrap();
        let context = CommandContext::load(dir.path().to_path_buf(), None).unwrap();

        execute(&context, InitArgs { force: false }).unwrap();

        let loaded = AutoCommitConfig::load(&context.config_path).unwrap();
        assert_eq!(loaded, AutoCommitConfig::default());
        assert!(dir.path().join(".autocommit/.gitignore").exists());
    }

    #[test]
    fn test_init_keeps_existing_without_force() {
        let dir = TempDir::new().unwrap();
        let context = CommandContext::load(dir.path().to_path_buf(), None).unwrap();
        std::fs::create_dir_all(context.config_path.parent().unwrap()).unwrap();
        std::fs::write(&context.config_path, "auto_push = true\n").unwrap();

        execute(&context, InitArgs { force: false }).unwrap();
        let kept = AutoCommitConfig::load(&context.config_path).unwrap();
        assert!(kept.auto_push);

        execute(&context, InitArgs { force: true }).unwrap();
        let replaced = AutoCommitConfig::load(&context.config_path).unwrap();
        assert!(!replaced.auto_push);
    }
}

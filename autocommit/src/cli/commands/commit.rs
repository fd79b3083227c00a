//! `autocommit commit`: one manual commit without a watch session

use super::CommandContext;
use crate::cli::app::CommitArgs;
use anyhow::{Context, Result, bail};
use autocommit_core::EngineError;
use tracing::{error, info};

pub async fn execute(context: CommandContext, args: CommitArgs) -> Result<()> {
    let repo = context.repository().await?;

    let mut engine_config = context.config.engine_config();
    engine_config.auto_push |= args.push;

    let handle = context.build_engine(engine_config, repo)?.start();
    let result = handle.commit_now(args.message).await;
    handle
        .stop()
        .await
        .context("Engine did not shut down cleanly")?;

    match result {
        Ok(success) => {
            let pushed = if success.pushed { " and pushed" } else { "" };
            let id = short_id(&success.commit_id);
            println!("Committed {}{}: {}", id, pushed, success.message);
            Ok(())
        }
        Err(EngineError::NothingToCommit) => {
            info!("Nothing to commit, working tree clean");
            Ok(())
        }
        Err(EngineError::CommitFailed(failure)) => {
            if let Some(output) = failure.output() {
                error!("git output:\n{}", output);
            }
            if let Some(commit_id) = &failure.commit_id {
                let id = short_id(commit_id);
                info!("Commit {} was created; only the push failed", id);
            }
            bail!("Commit failed: {}", failure)
        }
        Err(e) => Err(e).context("Commit failed"),
    }
}

fn short_id(commit_id: &str) -> &str {
    commit_id.get(..7).unwrap_or(commit_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("0123456789abcdef"), "0123456");
        assert_eq!(short_id("abc"), "abc");
    }
}

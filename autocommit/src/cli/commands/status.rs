//! `autocommit status`: repository changes and the last recorded session

use super::CommandContext;
use crate::cli::app::StatusArgs;
use crate::cli::observers::read_snapshot;
use anyhow::{Context, Result};
use autocommit_core::engine::StateSnapshot;
use chrono::{DateTime, Local, Utc};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub async fn execute(context: CommandContext, args: StatusArgs) -> Result<()> {
    let snapshot = read_snapshot(&context.state_path())
        .await
        .with_context(|| format!("Failed to read {:?}", context.state_path()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    let repo = context.repository().await?;
    let branch = repo
        .current_branch()
        .await
        .context("Failed to read current branch")?;
    let status = repo.status().await.context("Failed to read git status")?;

    println!("Repository: {}", context.root.display());
    println!("Branch:     {}", branch);
    println!("Mode:       {}", context.config.mode);

    if status.trim().is_empty() {
        println!("\nWorking tree clean");
    } else {
        println!("\nUncommitted changes:");
        for line in status.lines() {
            println!("  {}", line);
        }
    }

    match snapshot {
        Some(snapshot) => print_session(&snapshot),
        None => println!("\nNo watch session recorded"),
    }

    Ok(())
}

fn print_session(snapshot: &StateSnapshot) {
    println!("\nSession:");
    let watching = if snapshot.is_watching { "yes" } else { "no" };
    println!("  Watching:       {}", watching);
    println!("  Files changed:  {}", snapshot.files_changed_count());
    println!("  Last change:    {}", format_time(snapshot.last_change_at));
    println!("  Last commit:    {}", format_time(snapshot.last_commit_at));
    if let Some(remaining) = snapshot.countdown_remaining {
        println!("  Committing in:  {}s", remaining);
    } else if snapshot.pending_commit {
        println!("  Commit in progress");
    }

    if !snapshot.history.is_empty() {
        println!("\nRecent activity:");
        for entry in snapshot.history.iter().take(10) {
            let time = entry.timestamp.with_timezone(&Local).format("%H:%M:%S");
            println!("  {}  {}", time, entry.message);
        }
    }
}

fn format_time(time: Option<DateTime<Utc>>) -> String {
    match time {
        Some(time) => time.with_timezone(&Local).format(TIME_FORMAT).to_string(),
        None => "never".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_time_never() {
        assert_eq!(format_time(None), "never");
    }

    #[test]
    fn test_format_time_local() {
        let time = Utc::now();
        let expected = time.with_timezone(&Local).format(TIME_FORMAT).to_string();
        assert_eq!(format_time(Some(time)), expected);
    }
}

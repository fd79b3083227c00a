//! `autocommit watch`: run a watch session until interrupted

use super::{CommandContext, ensure_state_ignored};
use crate::cli::app::WatchArgs;
use crate::cli::observers::{LogObserver, SnapshotFileObserver};
use anyhow::{Context, Result};
use autocommit_core::engine::state::spawn_observer;
use autocommit_core::engine::{EngineHandle, RecoveryOption, SurfaceGuard};
use autocommit_core::monitor::{FileWatcher, WatcherConfig};
use autocommit_core::{EngineConfig, EngineNotice};
use std::path::Path;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

pub async fn execute(context: CommandContext, args: WatchArgs) -> Result<()> {
    let engine_config = session_config(&context, &args);
    let repo = context.repository().await?;
    ensure_state_ignored(&context.root)?;

    let engine = context.build_engine(engine_config.clone(), repo)?;
    let state = engine.state().clone();
    let snapshot_file = SnapshotFileObserver::new(context.state_path());
    let observers = [
        spawn_observer(&state, LogObserver::default()),
        snapshot_file.clone().spawn(&state),
    ];

    let handle = engine.start();
    let mut notices = handle.notices();

    let (watcher, mut changes) = FileWatcher::start(WatcherConfig {
        root: context.root.clone(),
        recursive: true,
        ignore_patterns: context.ignore_patterns(),
    })
    .context("Failed to start file watcher")?;

    info!(
        "Watching {:?} in {} mode (buffer {}s, push {})",
        context.root,
        engine_config.mode,
        engine_config.buffer_time_seconds(),
        engine_config.auto_push
    );
    info!("Press Ctrl-C to cancel a pending commit or stop watching");

    let mut retries: Vec<JoinHandle<()>> = Vec::new();
    // The countdown lives only as long as this session shows it
    let mut surface: Option<SurfaceGuard> = None;

    loop {
        tokio::select! {
            Some(change) = changes.recv() => {
                if handle.notify_change(change).is_err() {
                    warn!("Engine stopped unexpectedly");
                    break;
                }
            }
            notice = notices.recv() => match notice {
                Ok(notice) => {
                    if matches!(notice, EngineNotice::CountdownStarted { .. }) {
                        surface = handle.pending_commit().map(|pending| pending.surface_guard());
                    }
                    if let Some(retry) = report_notice(&handle, &context.root, notice) {
                        retries.retain(|task| !task.is_finished());
                        retries.push(retry);
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!("Missed {} engine notices", skipped),
                Err(RecvError::Closed) => break,
            },
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                if handle.cancel_pending() {
                    info!("Pending commit cancelled; press Ctrl-C again to stop watching");
                } else {
                    break;
                }
            }
        }
    }

    info!("Stopping watch session");
    drop(surface);
    drop(watcher);
    for retry in retries {
        retry.abort();
    }
    handle
        .stop()
        .await
        .context("Engine did not shut down cleanly")?;

    // Observers coalesce, so write the final state explicitly before exiting
    snapshot_file.write(&state.snapshot()).await;
    for observer in observers {
        observer.abort();
    }

    Ok(())
}

/// Apply command-line overrides on top of the configuration file
fn session_config(context: &CommandContext, args: &WatchArgs) -> EngineConfig {
    let mut config = context.config.clone();
    if let Some(mode) = args.mode {
        config.mode = mode.into();
    }
    if args.push {
        config.auto_push = true;
    }

    let mut engine_config = config.engine_config();
    if let Some(buffer) = args.buffer {
        engine_config.periodic.buffer_time_seconds = buffer;
        engine_config.intelligent.buffer_time_seconds = buffer;
    }
    engine_config
}

/// Log a notice; a terminal commit failure schedules a retry
fn report_notice(
    handle: &EngineHandle,
    root: &Path,
    notice: EngineNotice,
) -> Option<JoinHandle<()>> {
    match notice {
        EngineNotice::Skipped {
            reason,
            significance,
        } => {
            info!("Not committing ({}): {}", significance, reason);
            None
        }
        EngineNotice::Cancelled { reason } => {
            info!("Commit cancelled: {:?}", reason);
            None
        }
        EngineNotice::CountdownStarted { .. } | EngineNotice::Committed { .. } => None,
        EngineNotice::CommitFailed { failure, reason } => {
            error!("Commit failed: {}", failure);
            let mut retry = None;
            for option in failure.recovery_options() {
                match option {
                    RecoveryOption::ViewOutput => {
                        if let Some(output) = failure.output() {
                            error!("git output:\n{}", output);
                        }
                    }
                    RecoveryOption::RetryLater => {
                        retry = Some(handle.retry_later(&failure, reason));
                    }
                    RecoveryOption::OpenTerminal => {
                        info!("Resolve manually with git in {:?}", root);
                    }
                }
            }
            retry
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::app::ModeArg;
    use autocommit_core::WatchMode;
    use tempfile::TempDir;

    fn context() -> (TempDir, CommandContext) {
        let dir = TempDir::new().unwrap();
        let context = CommandContext::load(dir.path().to_path_buf(), None).unwrap();
        (dir, context)
    }

    #[test]
    fn test_overrides_apply_to_active_mode() {
        let (_dir, context) = context();
        let args = WatchArgs {
            mode: Some(ModeArg::Intelligent),
            push: true,
            buffer: Some(5),
        };

        let config = session_config(&context, &args);
        assert_eq!(config.mode, WatchMode::Intelligent);
        assert!(config.auto_push);
        assert_eq!(config.buffer_time_seconds(), 5);
    }

    #[test]
    fn test_no_overrides_keep_file_values() {
        let (_dir, context) = context();
        let args = WatchArgs {
            mode: None,
            push: false,
            buffer: None,
        };

        let config = session_config(&context, &args);
        assert_eq!(config.mode, WatchMode::Periodic);
        assert!(!config.auto_push);
        assert_eq!(config.buffer_time_seconds(), 0);
    }
}

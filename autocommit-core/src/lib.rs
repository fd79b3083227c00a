//! Core functionality for autocommit
//!
//! This crate turns working-tree activity into well-timed git commits:
//! change detection, debounce/settle scheduling, an optional advisory
//! decision, a cancellable countdown and a retrying commit executor.

pub mod advisor;
pub mod config;
pub mod engine;
pub mod monitor;
pub mod vcs;

pub use config::{AutoCommitConfig, ConfigError};
pub use engine::{
    Engine, EngineConfig, EngineError, EngineHandle, EngineNotice, OrchestrationState, WatchMode,
};
pub use vcs::Repository;

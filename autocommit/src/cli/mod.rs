pub mod app;
pub mod commands;
pub mod observers;

pub use app::{Cli, Commands};

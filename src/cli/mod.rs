//! Command-line interface components
//!
//! Argument parsing, command handlers and run progress display.

pub mod args;
pub mod commands;
pub mod progress;

pub use args::{Cli, Commands, GlobalArgs, PlanArgs, RunArgs, SourceArgs};
pub use commands::{build_plan, handle_plan, handle_run};
pub use progress::{ProgressConfig, RunProgress};

//! Command-line argument parsing for the prefetcher
//!
//! This module defines the CLI structure using clap derive macros.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Prefetcher - warm a cache from a resource manifest
#[derive(Parser, Debug)]
#[command(
    name = "prefetcher",
    version,
    about = "Resolve a resource manifest and prefetch it at a throttled rate",
    long_about = "Resolves a manifest of versioned resource paths into URLs, filters and prioritizes them,
and fetches them one at a time with a fixed delay between requests."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long = "config-file", global = true, value_name = "FILE")]
    pub config_file: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Prefetch every resource in a manifest
    Run(RunArgs),

    /// Show the dispatch order for a manifest without fetching anything
    Plan(PlanArgs),
}

/// Manifest, origin and filters shared by both commands
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Manifest document (JSON) to prefetch
    #[arg(short, long, value_name = "FILE")]
    pub manifest: PathBuf,

    /// Origin the manifest paths are resolved against
    #[arg(short, long, value_name = "URL")]
    pub origin: Option<String>,

    /// Filter configuration string, e.g. '{"include":["\\.js$"],"delay":250}'
    #[arg(short, long, value_name = "JSON")]
    pub filters: Option<String>,
}

/// Arguments for the run command
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Store fetched bodies under this directory
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Store fetched bodies under the user cache directory
    #[arg(long, conflicts_with = "cache_dir")]
    pub cache: bool,

    /// Send the request immediately instead of waiting for the idle deferral
    #[arg(long)]
    pub no_idle_wait: bool,
}

/// Arguments for the plan command
#[derive(Args, Debug, Clone)]
pub struct PlanArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Print the plan as a JSON array
    #[arg(long)]
    pub json: bool,
}

impl SourceArgs {
    /// Pick the origin from the arguments or the configured default
    pub fn resolve_origin(&self, configured: Option<&str>) -> Result<String, String> {
        let origin = self
            .origin
            .as_deref()
            .or(configured)
            .ok_or_else(|| "No origin given; pass --origin or set prefetch.origin".to_string())?;

        let parsed = url::Url::parse(origin).map_err(|e| format!("Invalid origin '{}': {}", origin, e))?;
        if !parsed.has_host() {
            return Err(format!("Invalid origin '{}': no host", origin));
        }
        Ok(parsed.origin().ascii_serialization())
    }

    /// Pick the filter string from the arguments or the configured default
    pub fn resolve_filters(&self, configured: Option<&str>) -> String {
        self.filters
            .as_deref()
            .or(configured)
            .unwrap_or("{}")
            .to_string()
    }
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the logging level based on global arguments
    pub fn log_level(&self) -> tracing::Level {
        if self.global.quiet {
            tracing::Level::ERROR
        } else if self.global.very_verbose {
            tracing::Level::DEBUG
        } else if self.global.verbose {
            tracing::Level::INFO
        } else {
            tracing::Level::WARN
        }
    }

    /// True when no verbosity flag was given
    pub fn uses_default_verbosity(&self) -> bool {
        !self.global.quiet && !self.global.verbose && !self.global.very_verbose
    }
}

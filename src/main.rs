//! Prefetcher CLI application
//!
//! Command-line interface for prefetching the resources in a manifest.

use std::process;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use prefetcher::cli::{handle_plan, handle_run, Cli, Commands};
use prefetcher::config::AppConfig;

#[tokio::main]
async fn main() {
    let result = run().await;

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

/// Main application logic
async fn run() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let cli = Cli::parse_args();

    let config = AppConfig::load(cli.global.config_file.clone())
        .await
        .context("Failed to load configuration")?;

    init_logging(&cli, &config)?;

    info!("Prefetcher v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Run(args) => {
            info!("Executing run command");
            let manifest = args.source.manifest.display().to_string();
            handle_run(args, &config, cli.global.quiet)
                .await
                .with_context(|| format!("Prefetch run for {} failed", manifest))
        }
        Commands::Plan(args) => {
            info!("Executing plan command");
            handle_plan(args, &config)
                .await
                .context("Failed to plan prefetch run")
        }
    }
}

/// Initialize logging based on CLI verbosity and the configured default level
fn init_logging(cli: &Cli, config: &AppConfig) -> anyhow::Result<()> {
    let level = if cli.uses_default_verbosity() {
        config.logging.level.to_ascii_lowercase()
    } else {
        cli.log_level().to_string().to_ascii_lowercase()
    };

    let directive = format!("prefetcher={}", level)
        .parse()
        .with_context(|| format!("Invalid log level '{}'", level))?;
    let filter = EnvFilter::from_default_env().add_directive(directive);

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(cli.global.very_verbose)
        .init();

    if cli.global.very_verbose {
        info!("Very verbose logging enabled");
    } else if cli.global.verbose {
        info!("Verbose logging enabled");
    }
    Ok(())
}

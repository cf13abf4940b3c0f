//! Command handlers for the prefetcher CLI
//!
//! `run` wires the foreground and background halves together in one
//! process: the manifest file is placed in an in-memory store, a
//! [`PrefetchService`] is activated on a fresh [`ServiceScope`], and a
//! [`Prefetcher`] sends it the request and waits for the completion notice.

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::app::client::{HttpFetcher, ResponseCache};
use crate::app::filter::FilterConfig;
use crate::app::foreground::{IdlePolicy, Prefetcher};
use crate::app::manifest::{parse_document, Manifest, MemoryStore};
use crate::app::messaging::ServiceScope;
use crate::app::models::ResolvedUrl;
use crate::app::queue::plan_run;
use crate::app::service::PrefetchService;
use crate::cli::progress::{print_summary, ProgressConfig, RunProgress};
use crate::cli::{PlanArgs, RunArgs, SourceArgs};
use crate::config::AppConfig;
use crate::errors::{AppError, ManifestError, Result};

/// Storage key the manifest file is placed under for a CLI run
const MANIFEST_KEY: &str = "prefetch-manifest";

/// Handle the run command
pub async fn handle_run(args: RunArgs, config: &AppConfig, quiet: bool) -> Result<()> {
    let origin = args
        .source
        .resolve_origin(config.prefetch.origin.as_deref())
        .map_err(AppError::generic)?;
    let filters = args
        .source
        .resolve_filters(config.prefetch.filters.as_deref());
    let raw = read_manifest(&args.source.manifest).await?;

    let mut client_config = config.client.clone();
    if args.cache_dir.is_some() {
        client_config.cache_dir = args.cache_dir.clone();
    } else if args.cache {
        client_config.cache_dir = Some(ResponseCache::default_root());
    }
    let fetcher = HttpFetcher::with_config(&client_config)?;

    let planned = plan_run(&lenient_document(&raw), &origin, &FilterConfig::resolve(&filters));
    info!("Prefetching {} URLs from {}", planned.len(), origin);

    let scope = ServiceScope::new();
    let service = PrefetchService::new(&origin, Arc::new(fetcher))?;

    let progress_config = ProgressConfig {
        enable_progress_bar: !quiet,
        print_dispatches: !quiet,
        ..Default::default()
    };
    let progress = RunProgress::new(&progress_config, planned.len()).follow(service.queue().subscribe());
    let service = service.spawn(&scope);

    let idle = if args.no_idle_wait {
        IdlePolicy::immediate()
    } else {
        config.prefetch.idle
    };
    let prefetcher = Prefetcher::new(
        Arc::new(scope.client()),
        Arc::new(MemoryStore::with_item(MANIFEST_KEY, raw)),
    )
    .with_idle_policy(idle);

    let mut handle = prefetcher.init(&filters, MANIFEST_KEY, None);
    handle.sent().await?;
    handle.next_completion().await;

    let report = progress
        .await
        .map_err(|e| AppError::generic(format!("Progress display failed: {}", e)))?;

    prefetcher.remove_event_listener();
    service.shutdown();

    match report {
        Some(report) => {
            if !quiet {
                print_summary(&report);
            }
            if report.failed > 0 {
                warn!("{} of {} prefetches failed", report.failed, report.dispatched);
            }
            Ok(())
        }
        None => Err(AppError::generic("Prefetch queue stopped before the run completed")),
    }
}

/// Handle the plan command
pub async fn handle_plan(args: PlanArgs, config: &AppConfig) -> Result<()> {
    let (manifest, planned) = build_plan(&args.source, config).await?;

    if args.json {
        let urls: Vec<&str> = planned.iter().map(ResolvedUrl::as_str).collect();
        let rendered = serde_json::to_string_pretty(&urls).map_err(ManifestError::from)?;
        println!("{}", rendered);
        return Ok(());
    }

    let stats = manifest.stats();
    println!(
        "Manifest: {} versioned, {} mapped entries",
        stats.versioned_entries, stats.mapped_entries
    );
    if stats.coerced_versions > 0 {
        println!("  ({} non-string versions were stringified)", stats.coerced_versions);
    }
    println!(
        "Dispatch order ({} of {} URLs after filtering):",
        planned.len(),
        stats.total_entries()
    );
    for (i, url) in planned.iter().enumerate() {
        println!("  {:>4}. {}", i + 1, url);
    }
    Ok(())
}

/// Resolve, filter and prioritize the manifest named by `source`
pub async fn build_plan(source: &SourceArgs, config: &AppConfig) -> Result<(Manifest, Vec<ResolvedUrl>)> {
    let origin = source
        .resolve_origin(config.prefetch.origin.as_deref())
        .map_err(AppError::generic)?;
    let filters = FilterConfig::resolve(&source.resolve_filters(config.prefetch.filters.as_deref()));

    let document = lenient_document(&read_manifest(&source.manifest).await?);
    let manifest = Manifest::from_document(&document);
    let planned = plan_run(&document, &origin, &filters);
    Ok((manifest, planned))
}

async fn read_manifest(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path).await.map_err(|source| {
        ManifestError::Io {
            path: path.to_path_buf(),
            source,
        }
        .into()
    })
}

fn lenient_document(raw: &str) -> Value {
    parse_document(raw).unwrap_or_else(|e| {
        warn!("Using empty manifest: {}", e);
        Value::Object(Default::default())
    })
}

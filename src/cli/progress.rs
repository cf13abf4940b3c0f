//! Progress display for prefetch runs
//!
//! On a terminal the run is shown as a progress bar fed by queue events.
//! Otherwise every dispatch is printed as a plain line.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::app::queue::{DispatchResult, DrainReport, QueueEvent};

/// Progress display configuration
#[derive(Debug, Clone)]
pub struct ProgressConfig {
    /// Draw a bar when stderr is a terminal
    pub enable_progress_bar: bool,
    /// Print one line per dispatch when no bar is drawn
    pub print_dispatches: bool,
    /// Refresh rate of the spinner
    pub tick_interval: Duration,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            enable_progress_bar: true,
            print_dispatches: true,
            tick_interval: Duration::from_millis(100),
        }
    }
}

/// Follows one prefetch run and reports each dispatch
pub struct RunProgress {
    bar: Option<ProgressBar>,
    print_dispatches: bool,
}

impl RunProgress {
    /// Create a display for a run of `total` URLs
    pub fn new(config: &ProgressConfig, total: usize) -> Self {
        let is_terminal = atty::is(atty::Stream::Stderr);
        if !config.enable_progress_bar || !is_terminal {
            return Self {
                bar: None,
                print_dispatches: config.print_dispatches,
            };
        }

        let bar = ProgressBar::new(total as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
            .map(|style| style.progress_chars("##-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        bar.enable_steady_tick(config.tick_interval);
        bar.set_message("Prefetching");

        Self {
            bar: Some(bar),
            print_dispatches: false,
        }
    }

    /// Consume queue events until the run drains
    ///
    /// Returns the run's report, or `None` if the queue went away first.
    pub fn follow(self, mut events: broadcast::Receiver<QueueEvent>) -> JoinHandle<Option<DrainReport>> {
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(QueueEvent::Dispatched(record)) => {
                        if let Some(bar) = &self.bar {
                            bar.inc(1);
                            bar.set_message(record.url.to_string());
                        } else if self.print_dispatches {
                            match &record.result {
                                DispatchResult::Fetched(outcome) => println!(
                                    "✓ {} ({} bytes in {:?})",
                                    record.url, outcome.bytes, outcome.elapsed
                                ),
                                DispatchResult::Failed { error } => {
                                    println!("✗ {} ({})", record.url, error)
                                }
                            }
                        }
                    }
                    Ok(QueueEvent::Drained(report)) => {
                        if let Some(bar) = &self.bar {
                            bar.finish_and_clear();
                        }
                        return Some(report);
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("Progress display lagged, skipped {} events", skipped);
                        if let Some(bar) = &self.bar {
                            bar.inc(skipped);
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        if let Some(bar) = &self.bar {
                            bar.abandon();
                        }
                        return None;
                    }
                }
            }
        })
    }
}

/// Print the end-of-run summary
pub fn print_summary(report: &DrainReport) {
    println!();
    println!("Prefetch complete");
    println!("  Dispatched: {}", report.dispatched);
    println!("  Succeeded:  {}", report.succeeded);
    println!("  Failed:     {}", report.failed);
    println!("  Duration:   {:.1}s", report.duration().as_secs_f64());
    if report.dispatched > 0 {
        println!("  Success:    {:.1}%", report.success_rate());
    }
}

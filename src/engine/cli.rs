//! CLI command handler: layer settings, install logging, run the pipeline.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::path::Path;
use std::time::{Duration, Instant};

use crate::classify_queries;
use crate::engine::arg_parser::Cli;
use crate::pipeline::{Shutdown, category_dir};
use crate::types::{Category, RunSummary};
use crate::utils::config::{Config, Settings};
use crate::utils::settings_file::{apply_file_to_settings, load_settings_file};
use crate::utils::setup_logging;

/// Defaults, then the settings file, then the command line.
pub fn resolve_settings(cli: &Cli, cwd: &Path) -> Result<Settings> {
    let mut settings = Settings::default();
    if let Some(file) = load_settings_file(cli.config.as_deref(), cwd)? {
        apply_file_to_settings(&file, &mut settings);
    }
    cli.apply_to(&mut settings);
    Ok(settings)
}

fn log_summary(cfg: &Config, summary: &RunSummary) {
    for category in Category::PERSISTED {
        info!(
            "{:<12} {} queries -> {}",
            category.as_str(),
            summary.written_for(category),
            category_dir(&cfg.output_dir, category).display()
        );
    }
    if summary.skipped_unknown > 0 {
        warn!("{} queries fit no category", summary.skipped_unknown);
    }
}

/// Classify the queries file named by the layered settings. Ctrl-C cancels the run.
pub fn handle_run(cli: &Cli) -> Result<()> {
    let start_time = Instant::now();
    let cwd = std::env::current_dir().context("cannot read working directory")?;
    let settings = resolve_settings(cli, &cwd)?;
    let _log_guard = setup_logging(
        settings.verbose,
        Duration::from_millis(settings.log_period_ms.max(1)),
    );
    let cfg = settings.validate()?;

    let shutdown = Shutdown::new();
    shutdown
        .trigger_on_ctrlc()
        .context("cannot install Ctrl-C handler")?;

    debug!("Classifying {}...", cfg.queries_path.display());
    let summary = classify_queries(&cfg, &shutdown)?;
    log_summary(&cfg, &summary);
    debug!("Total time: {:?}", start_time.elapsed());
    Ok(())
}

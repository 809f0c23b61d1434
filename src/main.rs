//! netenum - Paged Directory-Service Enumeration
//!
//! Entry point for the CLI application.

use anyhow::{Context, Result};
use clap::Parser;
use netenum::config::{CliArgs, EnumConfig, Job, OutputFormat};
use netenum::db::{ExportWriter, DEFAULT_BATCH_SIZE};
use netenum::output;
use netenum::progress::{print_header, print_summary, ProgressReporter, RunSummary};
use netenum::query::{run_paged_query, EnumerationRequest};
use netenum::service::{MemoryDirectory, ResourceScope};
use netenum::walker::{ResourceWalker, WalkOptions};
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether every enumeration completed
fn run() -> Result<bool> {
    // Unknown or missing KIND exits here with usage (status 2)
    let args = CliArgs::parse();

    setup_logging(args.verbose)?;

    let config = EnumConfig::from_args(args).context("Invalid configuration")?;

    let service = MemoryDirectory::from_json_file(&config.snapshot_path)
        .with_context(|| format!("Failed to load snapshot {}", config.snapshot_path.display()))?;

    if config.show_progress {
        print_header(
            config.kind.keyword(),
            &config.target_label(),
            &config.snapshot_path.display().to_string(),
        );
    }

    match &config.job {
        Job::Query(request) => run_query(&config, &service, request),
        Job::Walk { scope, options } => run_walk(&config, &service, *scope, options.clone()),
    }
}

fn run_query(
    config: &EnumConfig,
    service: &MemoryDirectory,
    request: &EnumerationRequest,
) -> Result<bool> {
    let start = Instant::now();
    let progress = config.show_progress.then(ProgressReporter::new);
    if let Some(ref p) = progress {
        p.set_status(&format!("Enumerating {}...", request.key()));
    }

    let outcome = run_paged_query(service, request);

    if let Some(ref p) = progress {
        p.finish_and_clear();
    }

    match config.format {
        OutputFormat::Text => print!("{}", output::render_entries(request, &outcome)),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&output::query_json(request, &outcome))
                .context("Failed to serialize results")?
        ),
    }

    let target = request.target().to_string();
    if let Some(path) = &config.output_path {
        let mut writer =
            ExportWriter::create(path, request.kind().name(), &target, DEFAULT_BATCH_SIZE)
                .context("Failed to create export database")?;
        for entry in &outcome.entries {
            writer.add_entry(&target, entry).context("Export failed")?;
        }
        if let Some(err) = &outcome.error {
            writer.add_failure(None, &target, err);
        }
        writer.finish().context("Failed to finish export")?;
    }

    if let Some(err) = &outcome.error {
        warn!(
            "{} incomplete: {} ({} entries kept)",
            request.key(),
            err,
            outcome.entries.len()
        );
    }

    if config.show_progress {
        print_summary(
            "Enumeration",
            &RunSummary {
                entries: outcome.entries.len() as u64,
                pages: outcome.stats.pages,
                depth: None,
                errors: u64::from(outcome.error.is_some()),
                duration: start.elapsed(),
                export: config.output_path.as_ref().map(|p| p.display().to_string()),
            },
        );
    }

    Ok(outcome.is_complete())
}

fn run_walk(
    config: &EnumConfig,
    service: &MemoryDirectory,
    scope: ResourceScope,
    options: WalkOptions,
) -> Result<bool> {
    let progress = config.show_progress.then(ProgressReporter::new);
    if let Some(ref p) = progress {
        p.set_status(&format!("Walking {} network...", scope));
    }

    let outcome = {
        let mut walker = ResourceWalker::new(service, options).with_progress(|stats| {
            if let Some(ref p) = progress {
                p.update(stats);
            }
        });
        walker.walk(scope)
    };

    if let Some(ref p) = progress {
        p.finish_and_clear();
    }

    match config.format {
        OutputFormat::Text => print!("{}", output::render_walk(&outcome)),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&output::walk_json(&outcome))
                .context("Failed to serialize walk")?
        ),
    }

    if let Some(path) = &config.output_path {
        let target = config.target_label();
        let mut writer = ExportWriter::create(path, "resource", &target, DEFAULT_BATCH_SIZE)
            .context("Failed to create export database")?;
        writer
            .write_walk(&outcome.tree, &outcome.failures)
            .context("Export failed")?;
        writer.finish().context("Failed to finish export")?;
    }

    if !outcome.is_complete() {
        info!(errors = outcome.failures.len(), "Walk completed with errors");
    }

    if config.show_progress {
        print_summary(
            "Walk",
            &RunSummary {
                entries: outcome.stats.nodes,
                pages: outcome.stats.pages,
                depth: Some(outcome.stats.max_depth),
                errors: outcome.failures.len() as u64,
                duration: outcome.stats.elapsed,
                export: config.output_path.as_ref().map(|p| p.display().to_string()),
            },
        );
    }

    Ok(outcome.is_complete())
}

fn setup_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("netenum=debug,warn")
    } else {
        EnvFilter::new("netenum=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    Ok(())
}

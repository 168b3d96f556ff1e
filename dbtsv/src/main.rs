//! dbtsv: export database tables to TSV files and restore them.
//!
//! # Security Guarantees
//! - Credentials are never logged; connection strings are redacted
//! - Generated SQL quotes every identifier and string value

use anyhow::Context;
use clap::Parser;
use dbtsv::{Cli, Command};
use dbtsv_core::{
    ExportCoordinator, InformationSchemaCatalog, LineCodec, RestoreCoordinator, RunReport,
    StaticCatalog, TableCatalog, create_executor, error::redact_database_url,
    logging::init_logging,
};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    init_logging(cli.global.verbose, cli.global.quiet)?;

    let report = match &cli.command {
        Command::Export(args) => export(&cli, &args.dir).await?,
        Command::Restore(args) => restore(&cli, &args.dir).await?,
        Command::Test => {
            test_connection(&cli).await?;
            return Ok(ExitCode::SUCCESS);
        }
    };

    if let Some(path) = &cli.report {
        write_report(&report, path).await?;
    }

    println!(
        "{} tables completed, {} failed ({} ms)",
        report.tables_completed, report.tables_failed, report.duration_ms
    );

    if report.tables_failed > 0 {
        error!("{} tables failed; see the log above", report.tables_failed);
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

/// Checks that the database is reachable with the given settings.
async fn test_connection(cli: &Cli) -> anyhow::Result<()> {
    let url = cli.database_url()?;
    info!("Testing connection to {}", redact_database_url(url));

    let executor = create_executor(url, &cli.connection_settings())?;
    executor
        .ping()
        .await
        .inspect_err(|e| error!("Connection test failed: {}", e))?;

    info!("✓ Connection test successful");
    println!("Connection to {} database successful", executor.dialect());
    Ok(())
}

/// Exports every catalogued table into `dir`.
async fn export(cli: &Cli, dir: &Path) -> anyhow::Result<RunReport> {
    let url = cli.database_url()?;
    let settings = cli.connection_settings();
    let config = cli.export_config();
    config.validate()?;

    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Cannot create export directory {}", dir.display()))?;

    info!("Export from {} to {}", redact_database_url(url), dir.display());
    let executor = create_executor(url, &settings)?;
    executor.ping().await?;

    let catalog: Box<dyn TableCatalog> = match &cli.tables {
        Some(tables) => Box::new(StaticCatalog::new(tables.iter().cloned())),
        None => Box::new(InformationSchemaCatalog::new(Arc::clone(&executor))),
    };
    let tables = catalog.list_export_tables().await?;
    info!("Found {} tables to export", tables.len());

    let started_at = chrono::Utc::now();
    let clock = Instant::now();
    let coordinator =
        ExportCoordinator::new(executor, Arc::new(LineCodec::default()), &config, &settings);
    let summaries = coordinator.run(&tables, dir).await;

    Ok(RunReport::for_export(
        dir.to_path_buf(),
        started_at,
        clock.elapsed(),
        summaries,
    ))
}

/// Restores every table file in `dir` on a single pinned session.
async fn restore(cli: &Cli, dir: &Path) -> anyhow::Result<RunReport> {
    let url = cli.database_url()?;
    let settings = cli.connection_settings().for_restore();

    info!("Restore from {} into {}", dir.display(), redact_database_url(url));
    let executor = create_executor(url, &settings)?;
    executor.ping().await?;

    let started_at = chrono::Utc::now();
    let clock = Instant::now();
    let coordinator = RestoreCoordinator::new(executor, cli.restore_config())?;
    let summaries = coordinator.run(dir).await?;

    Ok(RunReport::for_restore(
        dir.to_path_buf(),
        started_at,
        clock.elapsed(),
        summaries,
    ))
}

async fn write_report(report: &RunReport, path: &Path) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(report).context("Serializing the run report")?;
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("Failed to write report to {}", path.display()))?;
    info!("Run report written to {}", path.display());
    Ok(())
}

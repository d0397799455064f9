//! solar-report entry point: CLI wiring, loading, analysis and export.

use std::fs::File;
use std::io::{self, BufWriter};
use std::process;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use solar_report::analysis::analyze;
use solar_report::cli::Cli;
use solar_report::io::export::{export_monthly_csv, write_json};
use solar_report::io::loader::{discover_files, load_files};

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    let config = cli.load_config()?;
    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("{e}");
        }
        bail!("configuration has {} error(s)", errors.len());
    }

    let files = discover_files(&cli.data_dir, &cli.prefix)
        .with_context(|| format!("cannot read data directory {}", cli.data_dir.display()))?;
    if files.is_empty() {
        warn!(
            dir = %cli.data_dir.display(),
            prefix = %cli.prefix,
            "no telemetry files found"
        );
    }
    let dataset = load_files(&files).into_dataset();
    let result = analyze(&dataset, &config);

    match &cli.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("cannot create {}", path.display()))?;
            write_json(&result, BufWriter::new(file), cli.pretty)?;
            info!(path = %path.display(), "report written");
        }
        None => write_json(&result, io::stdout().lock(), cli.pretty)?,
    }

    if let Some(path) = &cli.monthly_csv {
        match result.monthly_totals.computed() {
            Some(totals) => {
                export_monthly_csv(totals, path)
                    .with_context(|| format!("failed to write CSV {}", path.display()))?;
                info!(path = %path.display(), "monthly summary written");
            }
            None => warn!("no monthly totals, summary CSV skipped"),
        }
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_tracing();
    if let Err(e) = run(&cli) {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

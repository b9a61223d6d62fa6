//! Run one density / collision-rate evaluation from files on disk.

use anyhow::{Context, Result};
use clap::Parser;
use density_cli::{load_dataset, load_run_config, summary_line, Config, Report};
use density_core::{evaluate, Capabilities};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Estimate traffic density and encounter rate over an area or along a track
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Density dataset JSON (falls back to DENSITY_DATASET)
    #[arg(long)]
    dataset: Option<PathBuf>,

    /// Correlated encounter model (falls back to DENSITY_CORRELATED_MODEL)
    #[arg(long)]
    correlated: Option<PathBuf>,

    /// Uncorrelated encounter model (falls back to DENSITY_UNCORRELATED_MODEL)
    #[arg(long)]
    uncorrelated: Option<PathBuf>,

    /// Run configuration JSON
    #[arg(long)]
    config: PathBuf,

    /// Report destination; stdout when omitted
    #[arg(long)]
    output: Option<PathBuf>,

    /// Run without statistics backends (computeub/computemax are skipped)
    #[arg(long)]
    no_backends: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("density_core=info".parse()?)
                .add_directive("density_cli=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let paths = Config::from_env().overridden_by(Config {
        dataset_path: args.dataset,
        correlated_model_path: args.correlated,
        uncorrelated_model_path: args.uncorrelated,
    });
    let dataset_path = paths
        .dataset_path
        .context("No dataset given (use --dataset or DENSITY_DATASET)")?;
    let correlated_path = paths
        .correlated_model_path
        .context("No correlated model given (use --correlated or DENSITY_CORRELATED_MODEL)")?;
    let uncorrelated_path = paths.uncorrelated_model_path.context(
        "No uncorrelated model given (use --uncorrelated or DENSITY_UNCORRELATED_MODEL)",
    )?;

    let dataset = load_dataset(&dataset_path, &correlated_path, &uncorrelated_path)?;
    let run_config = load_run_config(&args.config)?;
    let capabilities = if args.no_backends {
        Capabilities::none()
    } else {
        Capabilities::default()
    };

    let output = evaluate(&run_config, &dataset, &capabilities).context("Evaluation failed")?;
    Report::new(dataset_path.display().to_string(), &run_config, &output)
        .write(args.output.as_deref())?;

    eprintln!("{}", summary_line(&output));
    Ok(())
}

//! floorheat CLI: batch-solve floor plans and print interior statistics as CSV.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use floorheat::{run_batch, Backend, BatchConfig};

#[derive(Parser)]
#[command(name = "floorheat")]
#[command(version, about = "Steady-state floor-plan temperatures by Jacobi relaxation")]
struct Cli {
    /// Number of buildings to process from building_ids.txt.
    n_buildings: Option<usize>,

    /// Batch config file (TOML). Flags override its values.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory with building_ids.txt and the .npy arrays.
    #[arg(short, long)]
    load_dir: Option<PathBuf>,

    /// Maximum number of sweeps per building.
    #[arg(long, allow_negative_numbers = true)]
    max_iter: Option<i64>,

    /// Absolute convergence tolerance.
    #[arg(long, conflicts_with = "no_tol")]
    tol: Option<f64>,

    /// Run the full sweep budget without early stopping.
    #[arg(long)]
    no_tol: bool,

    /// Compute backend.
    #[arg(short, long, value_enum)]
    backend: Option<Backend>,

    /// Skip the finite-value check on solved fields.
    #[arg(long)]
    no_check_finite: bool,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<BatchConfig> {
        let mut config = match &self.config {
            Some(path) => BatchConfig::from_file(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => BatchConfig::default(),
        };
        if let Some(n) = self.n_buildings {
            config.n_buildings = n;
        }
        if let Some(dir) = self.load_dir {
            config.load_dir = dir;
        }
        if let Some(max_iter) = self.max_iter {
            config.max_iter = max_iter;
        }
        if let Some(tol) = self.tol {
            config.abs_tol = tol;
            config.fixed_budget = false;
        }
        if self.no_tol {
            config.fixed_budget = true;
        }
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if self.no_check_finite {
            config.check_finite = false;
        }
        Ok(config)
    }
}

fn run() -> anyhow::Result<ExitCode> {
    let config = Cli::parse().into_config()?;
    let report = run_batch(&config).context("batch run failed")?;

    for record in &report.records {
        eprintln!(
            "{}: {:.4} s ({} sweeps{})",
            record.building_id,
            record.elapsed.as_secs_f64(),
            record.sweeps,
            if record.converged { ", converged" } else { "" }
        );
    }
    for failure in &report.failures {
        eprintln!("{}: skipped ({})", failure.building_id, failure.error);
    }
    if let Some(avg) = report.average_elapsed() {
        eprintln!("Average run time: {:.4} s", avg.as_secs_f64());
    }

    print!("{}", report.to_csv());

    if report.records.is_empty() && !report.failures.is_empty() {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

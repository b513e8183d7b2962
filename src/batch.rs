//! Batch driver: load, solve and summarise a list of buildings.
//!
//! Buildings are processed one after another. A failing building is logged
//! and recorded; the rest of the batch still runs.

use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::config::BatchConfig;
use crate::error::{JacobiError, JacobiResult};
use crate::loader::GridLoader;
use crate::solver::{solve_with, Backend, SolverOptions};
use crate::stats::{summary_stats, SummaryStats, CSV_HEADER};

/// Outcome of one successfully processed building.
#[derive(Debug, Clone)]
pub struct BuildingRecord {
    pub building_id: String,
    /// Wall time of the solve call alone.
    pub elapsed: Duration,
    pub sweeps: usize,
    pub converged: bool,
    pub backend: Backend,
    pub stats: SummaryStats,
}

/// A building that could not be processed.
#[derive(Debug)]
pub struct BuildingFailure {
    pub building_id: String,
    pub error: JacobiError,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub records: Vec<BuildingRecord>,
    pub failures: Vec<BuildingFailure>,
}

impl BatchReport {
    /// Mean solve time over successful buildings.
    pub fn average_elapsed(&self) -> Option<Duration> {
        let n = u32::try_from(self.records.len()).ok().filter(|&n| n > 0)?;
        let total: Duration = self.records.iter().map(|r| r.elapsed).sum();
        Some(total / n)
    }

    /// CSV header plus one row per successful building.
    pub fn to_csv(&self) -> String {
        let mut out = String::from(CSV_HEADER);
        out.push('\n');
        for record in &self.records {
            out.push_str(&record.stats.csv_row(&record.building_id));
            out.push('\n');
        }
        out
    }
}

fn process_building(
    loader: &GridLoader,
    building_id: &str,
    options: &SolverOptions,
) -> JacobiResult<BuildingRecord> {
    let (u0, mask) = loader.load(building_id)?;

    let start = Instant::now();
    let outcome = solve_with(u0, mask.view(), options)?;
    let elapsed = start.elapsed();

    let stats = summary_stats(outcome.field.view(), mask.view())?;
    Ok(BuildingRecord {
        building_id: building_id.to_string(),
        elapsed,
        sweeps: outcome.sweeps,
        converged: outcome.converged,
        backend: outcome.backend,
        stats,
    })
}

/// Solve each id in `building_ids` with the given options.
pub fn run_buildings(
    loader: &GridLoader,
    building_ids: &[String],
    options: &SolverOptions,
) -> BatchReport {
    let mut report = BatchReport::default();
    for building_id in building_ids {
        match process_building(loader, building_id, options) {
            Ok(record) => {
                info!(
                    building_id = %record.building_id,
                    elapsed_s = record.elapsed.as_secs_f64(),
                    sweeps = record.sweeps,
                    converged = record.converged,
                    backend = ?record.backend,
                    "building solved"
                );
                report.records.push(record);
            }
            Err(error) => {
                warn!(building_id = %building_id, %error, "skipping building");
                report.failures.push(BuildingFailure {
                    building_id: building_id.clone(),
                    error,
                });
            }
        }
    }
    report
}

/// Run the first `config.n_buildings` buildings listed in the load directory.
pub fn run_batch(config: &BatchConfig) -> JacobiResult<BatchReport> {
    config.validate()?;
    let options = config.solver_options()?;
    let loader = GridLoader::new(&config.load_dir).with_size(config.grid_size);

    let mut building_ids = loader.building_ids()?;
    if building_ids.len() < config.n_buildings {
        warn!(
            requested = config.n_buildings,
            available = building_ids.len(),
            "fewer buildings listed than requested"
        );
    }
    building_ids.truncate(config.n_buildings);

    info!(
        buildings = building_ids.len(),
        load_dir = %config.load_dir.display(),
        max_iter = config.max_iter,
        tol = ?config.tolerance(),
        "starting batch"
    );
    Ok(run_buildings(&loader, &building_ids, &options))
}

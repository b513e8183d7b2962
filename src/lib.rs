pub mod batch;
pub mod config;
pub mod error;
pub mod field;
#[cfg(feature = "gpu")]
pub mod gpu;
pub mod loader;
pub mod solver;
pub mod stats;

pub use batch::{run_batch, BatchReport, BuildingRecord};
pub use config::BatchConfig;
pub use error::{JacobiError, JacobiResult};
pub use field::{Field, InteriorMask};
pub use solver::{solve, solve_with, Backend, SolveOutcome, SolverOptions};
pub use stats::{summary_stats, SummaryStats};

#[cfg(feature = "python")]
use pyo3::prelude::*;

#[cfg(feature = "python")]
#[pymodule]
fn floorheat(py_module: &Bound<'_, PyModule>) -> PyResult<()> {
    register_solver_module(py_module)?;
    register_stats_module(py_module)?;
    register_loader_module(py_module)?;

    #[cfg(feature = "gpu")]
    py_module.add("GPU_ENABLED", true)?;
    #[cfg(not(feature = "gpu"))]
    py_module.add("GPU_ENABLED", false)?;

    py_module.add("__doc__", "Steady-state floor-plan temperature fields via Jacobi relaxation.")?;

    Ok(())
}

#[cfg(feature = "python")]
fn register_solver_module(py_module: &Bound<'_, PyModule>) -> PyResult<()> {
    let submodule = PyModule::new(py_module.py(), "solver")?;
    submodule.add("__doc__", "Jacobi relaxation of padded temperature fields.")?;
    submodule.add_class::<solver::SolveResult>()?;
    submodule.add_function(wrap_pyfunction!(solver::solve_py, &submodule)?)?;
    submodule.add_function(wrap_pyfunction!(solver::solve_detailed, &submodule)?)?;
    submodule.add("DEFAULT_MAX_ITER", solver::DEFAULT_MAX_ITER)?;
    submodule.add("DEFAULT_ABS_TOL", solver::DEFAULT_ABS_TOL)?;

    #[cfg(feature = "gpu")]
    {
        submodule.add_function(wrap_pyfunction!(solver::enable_gpu, &submodule)?)?;
        submodule.add_function(wrap_pyfunction!(solver::disable_gpu, &submodule)?)?;
        submodule.add_function(wrap_pyfunction!(solver::is_gpu_enabled, &submodule)?)?;
    }

    py_module.add_submodule(&submodule)?;
    Ok(())
}

#[cfg(feature = "python")]
fn register_stats_module(py_module: &Bound<'_, PyModule>) -> PyResult<()> {
    let submodule = PyModule::new(py_module.py(), "stats")?;
    submodule.add("__doc__", "Interior temperature statistics.")?;
    submodule.add_class::<stats::SummaryStats>()?;
    submodule.add_function(wrap_pyfunction!(stats::summary_stats_py, &submodule)?)?;
    submodule.add("CSV_HEADER", stats::CSV_HEADER)?;
    py_module.add_submodule(&submodule)?;
    Ok(())
}

#[cfg(feature = "python")]
fn register_loader_module(py_module: &Bound<'_, PyModule>) -> PyResult<()> {
    let submodule = PyModule::new(py_module.py(), "loader")?;
    submodule.add("__doc__", "Floor-plan loading from .npy arrays.")?;
    submodule.add_function(wrap_pyfunction!(loader::load_data, &submodule)?)?;
    py_module.add_submodule(&submodule)?;
    Ok(())
}

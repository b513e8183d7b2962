//! Jacobi relaxation of a padded floor-plan field.
//!
//! Every free cell is replaced by the mean of its four neighbours taken from
//! the previous sweep only. Two owned buffers alternate as source and
//! destination; border and obstacle cells are identical in both buffers from
//! the start and are never written, so a sweep only touches free cells.

use ndarray::ArrayView2;
use rayon::prelude::*;
use serde::Deserialize;
use tracing::debug;

#[cfg(feature = "python")]
use numpy::{IntoPyArray, PyArray2, PyReadonlyArray2};
#[cfg(feature = "python")]
use pyo3::prelude::*;

#[cfg(feature = "gpu")]
use crate::gpu::JacobiGpuContext;
#[cfg(feature = "gpu")]
use std::sync::OnceLock;

use crate::error::{JacobiError, JacobiResult};
use crate::field::{CellLayout, Field};

pub const DEFAULT_MAX_ITER: i64 = 20_000;
pub const DEFAULT_ABS_TOL: f64 = 1e-4;

// Minimum rows handed to one rayon task.
const MIN_ROWS_PER_TASK: usize = 8;

#[cfg(feature = "gpu")]
static GPU_CONTEXT: OnceLock<Option<JacobiGpuContext>> = OnceLock::new();

#[cfg(feature = "gpu")]
static GPU_ENABLED: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(true);

#[cfg(feature = "gpu")]
pub(crate) fn get_gpu_context() -> Option<&'static JacobiGpuContext> {
    if !GPU_ENABLED.load(std::sync::atomic::Ordering::Relaxed) {
        return None;
    }

    GPU_CONTEXT
        .get_or_init(|| match crate::gpu::create_jacobi_gpu_context() {
            Ok(ctx) => {
                tracing::info!("[GPU] Jacobi GPU context initialized ({})", ctx.adapter_name());
                Some(ctx)
            }
            Err(e) => {
                tracing::warn!("[GPU] Failed to initialize GPU context: {}. Falling back to CPU.", e);
                None
            }
        })
        .as_ref()
}

/// Enable GPU acceleration for `Backend::Auto` solves.
#[cfg(feature = "gpu")]
#[cfg_attr(feature = "python", pyfunction)]
pub fn enable_gpu() {
    GPU_ENABLED.store(true, std::sync::atomic::Ordering::Relaxed);
    tracing::info!("[GPU] GPU acceleration enabled");
}

/// Disable GPU acceleration; `Backend::Auto` then always runs on CPU.
#[cfg(feature = "gpu")]
#[cfg_attr(feature = "python", pyfunction)]
pub fn disable_gpu() {
    GPU_ENABLED.store(false, std::sync::atomic::Ordering::Relaxed);
    tracing::info!("[GPU] GPU acceleration disabled - using CPU");
}

/// Check if GPU acceleration is currently enabled.
#[cfg(feature = "gpu")]
#[cfg_attr(feature = "python", pyfunction)]
pub fn is_gpu_enabled() -> bool {
    GPU_ENABLED.load(std::sync::atomic::Ordering::Relaxed)
}

/// Where sweeps are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// GPU when built with `gpu` and an f64-capable adapter exists, else CPU.
    #[default]
    Auto,
    /// rayon row-parallel sweeps.
    Cpu,
    /// wgpu compute; fails instead of falling back.
    Gpu,
}

/// Validated solve parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolverOptions {
    max_iter: usize,
    tol: Option<f64>,
    backend: Backend,
    check_finite: bool,
}

impl SolverOptions {
    /// `tol: None` runs the whole budget; `Some(t)` stops once a sweep changes
    /// no free cell by `t` or more.
    pub fn new(max_iter: i64, tol: Option<f64>) -> JacobiResult<Self> {
        let max_iter =
            usize::try_from(max_iter).map_err(|_| JacobiError::InvalidIterationCount(max_iter))?;
        if let Some(t) = tol {
            if t.is_nan() || t < 0.0 {
                return Err(JacobiError::InvalidTolerance(t));
            }
        }
        Ok(Self {
            max_iter,
            tol,
            backend: Backend::Auto,
            check_finite: true,
        })
    }

    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    /// Toggle the post-solve scan for NaN/Inf in free cells.
    pub fn with_finite_check(mut self, enabled: bool) -> Self {
        self.check_finite = enabled;
        self
    }

    pub fn max_iter(&self) -> usize {
        self.max_iter
    }

    pub fn tol(&self) -> Option<f64> {
        self.tol
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn check_finite(&self) -> bool {
        self.check_finite
    }
}

/// Relaxed field plus bookkeeping from one solve.
#[derive(Debug, Clone)]
pub struct SolveOutcome {
    pub field: Field,
    /// Sweeps actually executed.
    pub sweeps: usize,
    /// True when a tolerance was set and the last delta fell below it.
    pub converged: bool,
    /// Convergence delta of the last executed sweep.
    pub last_delta: Option<f64>,
    /// Backend that executed the sweeps (`Cpu` or `Gpu`).
    pub backend: Backend,
}

/// Mean of the four axis-aligned neighbours of `(row, col)`.
#[inline]
pub fn avg4(u: ArrayView2<f64>, row: usize, col: usize) -> f64 {
    0.25 * (u[[row - 1, col]] + u[[row + 1, col]] + u[[row, col - 1]] + u[[row, col + 1]])
}

#[inline(always)]
fn avg4_flat(src: &[f64], idx: usize, cols: usize) -> f64 {
    0.25 * (src[idx - cols] + src[idx + cols] + src[idx - 1] + src[idx + 1])
}

/// One Jacobi sweep from `src` into `dst`, returning the max absolute change.
///
/// Rows are independent tasks; the per-row maxima are combined with a rayon
/// reduction. `max` is exact, so the result does not depend on task order.
fn sweep_into(src: &[f64], dst: &mut [f64], layout: &CellLayout) -> f64 {
    let cols = layout.dim().1;
    dst.par_chunks_mut(cols)
        .with_min_len(MIN_ROWS_PER_TASK)
        .enumerate()
        .map(|(row, dst_row)| {
            let base = row * cols;
            let mut delta = 0.0_f64;
            for &(start, end) in layout.row_runs(row) {
                for col in start..end {
                    let idx = base + col;
                    let value = avg4_flat(src, idx, cols);
                    delta = delta.max((value - src[idx]).abs());
                    dst_row[col] = value;
                }
            }
            delta
        })
        .reduce(|| 0.0, f64::max)
}

/// Stepwise CPU Jacobi solver over a ping-pong buffer pair.
///
/// Both buffers are allocated in `new`; `sweep` never allocates.
#[derive(Debug, Clone)]
pub struct JacobiSolver {
    layout: CellLayout,
    current: Vec<f64>,
    next: Vec<f64>,
    sweeps: usize,
}

impl JacobiSolver {
    pub fn new(u0: &Field, mask: ArrayView2<bool>) -> JacobiResult<Self> {
        let layout = CellLayout::new(u0.dim(), mask)?;
        Ok(Self::with_layout(u0, layout))
    }

    fn with_layout(u0: &Field, layout: CellLayout) -> Self {
        // logical row-major order regardless of u0's memory layout
        let current: Vec<f64> = u0.iter().copied().collect();
        let next = current.clone();
        Self {
            layout,
            current,
            next,
            sweeps: 0,
        }
    }

    /// Run one sweep and swap buffer roles. Returns the convergence delta.
    pub fn sweep(&mut self) -> f64 {
        let delta = sweep_into(&self.current, &mut self.next, &self.layout);
        std::mem::swap(&mut self.current, &mut self.next);
        self.sweeps += 1;
        delta
    }

    pub fn sweeps(&self) -> usize {
        self.sweeps
    }

    pub fn layout(&self) -> &CellLayout {
        &self.layout
    }

    /// The latest completed sweep (or `u0` before the first sweep).
    pub fn current(&self) -> ArrayView2<'_, f64> {
        // len == rows * cols by construction
        ArrayView2::from_shape(self.layout.dim(), &self.current)
            .expect("buffer length matches field shape")
    }

    pub fn into_field(self) -> Field {
        Field::from_shape_vec(self.layout.dim(), self.current)
            .expect("buffer length matches field shape")
    }
}

fn solve_cpu(u0: &Field, layout: CellLayout, options: &SolverOptions) -> SolveOutcome {
    let mut solver = JacobiSolver::with_layout(u0, layout);
    let mut converged = false;
    let mut last_delta = None;

    for _ in 0..options.max_iter {
        let delta = solver.sweep();
        last_delta = Some(delta);
        if let Some(tol) = options.tol {
            if delta < tol {
                converged = true;
                break;
            }
        }
    }

    SolveOutcome {
        sweeps: solver.sweeps(),
        field: solver.into_field(),
        converged,
        last_delta,
        backend: Backend::Cpu,
    }
}

#[cfg(feature = "gpu")]
fn solve_gpu(
    ctx: &JacobiGpuContext,
    u0: &Field,
    layout: &CellLayout,
    options: &SolverOptions,
) -> JacobiResult<SolveOutcome> {
    let run = ctx.solve(u0.view(), layout, options.max_iter, options.tol)?;
    Ok(SolveOutcome {
        field: run.field,
        sweeps: run.sweeps,
        converged: run.converged,
        last_delta: run.last_delta,
        backend: Backend::Gpu,
    })
}

/// Dispatch to the requested backend. `Auto` degrades to CPU on GPU failure.
fn run_backend(u0: &Field, layout: CellLayout, options: &SolverOptions) -> JacobiResult<SolveOutcome> {
    match options.backend {
        Backend::Cpu => Ok(solve_cpu(u0, layout, options)),
        Backend::Gpu => {
            #[cfg(feature = "gpu")]
            {
                let ctx = get_gpu_context()
                    .ok_or_else(|| JacobiError::Gpu("no GPU context available".to_string()))?;
                solve_gpu(ctx, u0, &layout, options)
            }
            #[cfg(not(feature = "gpu"))]
            {
                let _ = layout;
                Err(JacobiError::Gpu("built without the `gpu` feature".to_string()))
            }
        }
        Backend::Auto => {
            #[cfg(feature = "gpu")]
            {
                if let Some(ctx) = get_gpu_context() {
                    match solve_gpu(ctx, u0, &layout, options) {
                        Ok(outcome) => return Ok(outcome),
                        Err(e) => {
                            tracing::warn!("[GPU] Jacobi solve failed: {}. Falling back to CPU.", e);
                        }
                    }
                }
            }
            Ok(solve_cpu(u0, layout, options))
        }
    }
}

/// First free cell holding NaN or Inf, in row-major order.
fn find_non_finite(field: &Field, layout: &CellLayout) -> Option<(usize, usize, f64)> {
    let (rows, _) = layout.dim();
    (0..rows).find_map(|row| {
        layout.row_runs(row).iter().find_map(|&(start, end)| {
            (start..end)
                .map(|col| (row, col, field[[row, col]]))
                .find(|&(_, _, v)| !v.is_finite())
        })
    })
}

/// Relax `u0` under `mask` and report how the run ended.
pub fn solve_with(
    u0: Field,
    mask: ArrayView2<bool>,
    options: &SolverOptions,
) -> JacobiResult<SolveOutcome> {
    let layout = CellLayout::new(u0.dim(), mask)?;
    let (rows, cols) = layout.dim();
    debug!(
        rows,
        cols,
        free_cells = layout.free_count(),
        max_iter = options.max_iter,
        tol = ?options.tol,
        backend = ?options.backend,
        "starting Jacobi solve"
    );

    if options.max_iter == 0 || layout.free_count() == 0 {
        return Ok(SolveOutcome {
            field: u0,
            sweeps: 0,
            converged: false,
            last_delta: None,
            backend: Backend::Cpu,
        });
    }

    let outcome = run_backend(&u0, layout.clone(), options)?;

    if options.check_finite {
        if let Some((row, col, value)) = find_non_finite(&outcome.field, &layout) {
            return Err(JacobiError::NonFiniteResult {
                row,
                col,
                value,
                sweeps: outcome.sweeps,
            });
        }
    }

    debug!(
        sweeps = outcome.sweeps,
        converged = outcome.converged,
        last_delta = ?outcome.last_delta,
        backend = ?outcome.backend,
        "Jacobi solve finished"
    );
    Ok(outcome)
}

/// Relax `u0` for at most `max_iter` sweeps, stopping early once the
/// convergence delta drops below `tol` when one is given.
pub fn solve(
    u0: Field,
    mask: ArrayView2<bool>,
    max_iter: i64,
    tol: Option<f64>,
) -> JacobiResult<Field> {
    let options = SolverOptions::new(max_iter, tol)?;
    solve_with(u0, mask, &options).map(|outcome| outcome.field)
}

#[cfg(feature = "python")]
#[pyclass]
/// Relaxed field and run bookkeeping (Python version).
pub struct SolveResult {
    #[pyo3(get)]
    pub field: Py<PyArray2<f64>>,
    #[pyo3(get)]
    pub sweeps: usize,
    #[pyo3(get)]
    pub converged: bool,
    #[pyo3(get)]
    pub last_delta: Option<f64>,
    #[pyo3(get)]
    pub used_gpu: bool,
}

/// Jacobi solve (PyO3 wrapper).
///
/// Args:
///     u0: Padded (H+2, W+2) float64 field.
///     mask: (H, W) bool interior mask.
///     max_iter: Sweep budget.
///     tol: Optional absolute convergence tolerance.
///
/// Returns:
///     Relaxed (H+2, W+2) float64 field.
#[cfg(feature = "python")]
#[pyfunction(name = "solve")]
#[pyo3(signature = (u0, mask, max_iter = DEFAULT_MAX_ITER, tol = None))]
pub fn solve_py(
    py: Python<'_>,
    u0: PyReadonlyArray2<f64>,
    mask: PyReadonlyArray2<bool>,
    max_iter: i64,
    tol: Option<f64>,
) -> PyResult<Py<PyArray2<f64>>> {
    let u0 = u0.as_array().to_owned();
    let mask = mask.as_array().to_owned();
    let field = py.allow_threads(|| solve(u0, mask.view(), max_iter, tol))?;
    Ok(field.into_pyarray(py).unbind())
}

/// Jacobi solve returning sweep count and convergence state.
#[cfg(feature = "python")]
#[pyfunction]
#[pyo3(signature = (u0, mask, max_iter = DEFAULT_MAX_ITER, tol = None, use_gpu = true))]
pub fn solve_detailed(
    py: Python<'_>,
    u0: PyReadonlyArray2<f64>,
    mask: PyReadonlyArray2<bool>,
    max_iter: i64,
    tol: Option<f64>,
    use_gpu: bool,
) -> PyResult<SolveResult> {
    let u0 = u0.as_array().to_owned();
    let mask = mask.as_array().to_owned();
    let backend = if use_gpu { Backend::Auto } else { Backend::Cpu };
    let options = SolverOptions::new(max_iter, tol)?.with_backend(backend);
    let outcome = py.allow_threads(|| solve_with(u0, mask.view(), &options))?;
    Ok(SolveResult {
        sweeps: outcome.sweeps,
        converged: outcome.converged,
        last_delta: outcome.last_delta,
        used_gpu: outcome.backend == Backend::Gpu,
        field: outcome.field.into_pyarray(py).unbind(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{array, s, Array2, ShapeBuilder};
    use ndarray_stats::DeviationExt;

    use crate::field::InteriorMask;

    fn cpu(max_iter: i64, tol: Option<f64>) -> SolverOptions {
        SolverOptions::new(max_iter, tol).unwrap().with_backend(Backend::Cpu)
    }

    /// Warm border on the left, cold elsewhere, with a wall of obstacles.
    fn room() -> (Field, InteriorMask) {
        let n = 12;
        let mut u0 = Field::zeros((n + 2, n + 2));
        u0.column_mut(0).fill(20.0);
        u0.row_mut(0).fill(5.0);
        u0.slice_mut(s![1..n + 1, 1..n + 1]).fill(10.0);
        let mut mask = InteriorMask::from_elem((n, n), true);
        mask.slice_mut(s![3..9, 6]).fill(false);
        u0.slice_mut(s![4..10, 7]).fill(30.0);
        mask[[0, 0]] = false;
        u0[[1, 1]] = -3.0;
        (u0, mask)
    }

    fn hot_spot(n: usize) -> (Field, InteriorMask) {
        let mut u0 = Field::zeros((n + 2, n + 2));
        u0[[n / 2 + 1, n / 2 + 1]] = 100.0;
        (u0, InteriorMask::from_elem((n, n), true))
    }

    fn interior_extrema(field: ArrayView2<f64>) -> (f64, f64) {
        let (rows, cols) = field.dim();
        field
            .slice(s![1..rows - 1, 1..cols - 1])
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
    }

    #[test]
    fn test_single_sweep_uses_previous_values_only() {
        let u0 = array![
            [0.0, 4.0, 8.0, 0.0],
            [4.0, 1.0, 2.0, 8.0],
            [0.0, 3.0, 4.0, 0.0],
            [0.0, 12.0, 16.0, 0.0],
        ];
        let mask = Array2::from_elem((2, 2), true);
        let out = solve_with(u0.clone(), mask.view(), &cpu(1, None)).unwrap().field;

        // Gauss-Seidel would see the updated (1,1) when computing (1,2).
        assert_eq!(out[[1, 1]], 0.25 * (4.0 + 3.0 + 4.0 + 2.0));
        assert_eq!(out[[1, 2]], 0.25 * (8.0 + 4.0 + 1.0 + 8.0));
        assert_eq!(out[[2, 1]], 0.25 * (1.0 + 12.0 + 0.0 + 4.0));
        assert_eq!(out[[2, 2]], 0.25 * (2.0 + 16.0 + 3.0 + 0.0));
        assert_eq!(out[[1, 1]], avg4(u0.view(), 1, 1));
    }

    #[test]
    fn test_border_and_obstacles_are_bit_identical() {
        let (u0, mask) = room();
        for max_iter in [0, 1, 2, 7, 150] {
            let out = solve_with(u0.clone(), mask.view(), &cpu(max_iter, None)).unwrap().field;
            let layout = CellLayout::new(u0.dim(), mask.view()).unwrap();
            for ((r, c), &v) in out.indexed_iter() {
                if layout.kind(r, c) != crate::field::CellKind::Free {
                    assert_eq!(v.to_bits(), u0[[r, c]].to_bits(), "cell ({r}, {c}) changed");
                }
            }
        }
    }

    #[test]
    fn test_zero_iterations_returns_input() {
        let (u0, mask) = room();
        let out = solve(u0.clone(), mask.view(), 0, Some(1e-4)).unwrap();
        assert_eq!(out, u0);
        let out = solve(u0.clone(), mask.view(), 0, None).unwrap();
        assert_eq!(out, u0);
    }

    #[test]
    fn test_shape_mismatch() {
        let u0 = Field::zeros((6, 6));
        let mask = InteriorMask::from_elem((6, 6), true);
        assert!(matches!(
            solve(u0, mask.view(), 10, None),
            Err(JacobiError::ShapeMismatch { field: (6, 6), mask: (6, 6) })
        ));
    }

    #[test]
    fn test_negative_iteration_count() {
        let (u0, mask) = hot_spot(4);
        assert!(matches!(
            solve(u0, mask.view(), -1, None),
            Err(JacobiError::InvalidIterationCount(-1))
        ));
    }

    #[test]
    fn test_invalid_tolerance() {
        assert!(matches!(
            SolverOptions::new(10, Some(-1e-3)),
            Err(JacobiError::InvalidTolerance(_))
        ));
        assert!(SolverOptions::new(10, Some(f64::NAN)).is_err());
        assert!(SolverOptions::new(10, Some(0.0)).is_ok());
    }

    #[test]
    fn test_hot_spot_diffuses_monotonically() {
        let (u0, mask) = hot_spot(15);
        let mut solver = JacobiSolver::new(&u0, mask.view()).unwrap();
        let (mut lo, mut hi) = interior_extrema(solver.current());
        let mut prev_delta = f64::INFINITY;

        for _ in 0..2000 {
            let delta = solver.sweep();
            let (new_lo, new_hi) = interior_extrema(solver.current());
            assert!(new_hi <= hi + 1e-12, "max rose from {hi} to {new_hi}");
            assert!(new_lo >= lo - 1e-12, "min fell from {lo} to {new_lo}");
            assert!(
                delta <= prev_delta * (1.0 + 1e-9),
                "delta rose from {prev_delta} to {delta}"
            );
            lo = new_lo;
            hi = new_hi;
            prev_delta = delta;
        }
        // cold border: the harmonic solution is identically zero
        assert!(prev_delta < 1e-6);
        assert!(hi < 1e-3);
        assert_eq!(solver.sweeps(), 2000);
    }

    #[test]
    fn test_early_stop_matches_full_run() {
        let (u0, mask) = room();
        let full = solve_with(u0.clone(), mask.view(), &cpu(5000, None)).unwrap();
        let early = solve_with(u0.clone(), mask.view(), &cpu(5000, Some(1e-7))).unwrap();

        assert!(early.converged);
        assert!(!full.converged);
        assert!(early.sweeps < full.sweeps);
        assert!(early.last_delta.unwrap() < 1e-7);
        let diff = early.field.linf_dist(&full.field).unwrap();
        assert!(diff < 1e-4, "early-stopped field differs by {diff}");
    }

    #[test]
    fn test_zero_tolerance_runs_full_budget() {
        let (u0, mask) = room();
        let out = solve_with(u0, mask.view(), &cpu(40, Some(0.0))).unwrap();
        assert_eq!(out.sweeps, 40);
        assert!(!out.converged);
    }

    #[test]
    fn test_converges_to_linear_profile() {
        // Channel between a 0 and a 10 wall whose top and bottom walls carry
        // the linear profile: the profile itself is the steady state.
        let n = 9;
        let profile = |c: usize| 10.0 * c as f64 / (n + 1) as f64;
        let mut u0 = Field::zeros((3, n + 2));
        u0[[1, n + 1]] = 10.0;
        for c in 0..n + 2 {
            u0[[0, c]] = profile(c);
            u0[[2, c]] = profile(c);
        }
        let mask = InteriorMask::from_elem((1, n), true);
        let out = solve(u0, mask.view(), 100_000, Some(1e-12)).unwrap();
        for c in 1..=n {
            assert_relative_eq!(out[[1, c]], profile(c), epsilon = 1e-9);
        }
    }

    #[test]
    fn test_reproducible() {
        let (u0, mask) = room();
        let a = solve(u0.clone(), mask.view(), 333, None).unwrap();
        let b = solve(u0, mask.view(), 333, None).unwrap();
        assert!(a.iter().zip(b.iter()).all(|(x, y)| x.to_bits() == y.to_bits()));
    }

    #[test]
    fn test_non_finite_result_is_reported() {
        let (mut u0, mask) = hot_spot(4);
        u0[[0, 2]] = f64::INFINITY;
        let err = solve(u0.clone(), mask.view(), 3, None).unwrap_err();
        // (1, 2) blows up first, then spreads to (1, 1) on the next sweep
        assert!(matches!(err, JacobiError::NonFiniteResult { row: 1, col: 1, sweeps: 3, .. }));

        let out = solve_with(u0, mask.view(), &cpu(3, None).with_finite_check(false)).unwrap();
        assert!(out.field[[1, 2]].is_infinite());
    }

    #[test]
    fn test_no_free_cells() {
        let u0 = Field::from_elem((5, 5), 7.0);
        let mask = InteriorMask::from_elem((3, 3), false);
        let out = solve_with(u0.clone(), mask.view(), &cpu(10, None)).unwrap();
        assert_eq!(out.sweeps, 0);
        assert_eq!(out.field, u0);
    }

    #[test]
    fn test_non_standard_layout_input() {
        let (u0, mask) = room();
        let mut column_major = Field::zeros(u0.dim().f());
        column_major.assign(&u0);
        assert!(!column_major.is_standard_layout());
        let a = solve(u0, mask.view(), 25, None).unwrap();
        let b = solve(column_major, mask.view(), 25, None).unwrap();
        assert_eq!(a, b);
    }

    #[cfg(not(feature = "gpu"))]
    #[test]
    fn test_gpu_backend_unavailable() {
        let (u0, mask) = hot_spot(4);
        let options = SolverOptions::new(5, None).unwrap().with_backend(Backend::Gpu);
        assert!(matches!(
            solve_with(u0, mask.view(), &options),
            Err(JacobiError::Gpu(_))
        ));
    }
}

//! Padded temperature fields, interior masks and the per-cell classification
//! the solver derives from them.
//!
//! A field of shape `(H + 2, W + 2)` carries a one-cell fixed border around an
//! `H x W` interior. The mask is `H x W` and `mask[[r, c]]` describes field cell
//! `(r + 1, c + 1)`.

use ndarray::{s, Array2, ArrayView2};

use crate::error::{JacobiError, JacobiResult};

/// Interior edge length of the stored floor plans.
pub const GRID_SIZE: usize = 512;

/// Padded double-precision temperature grid.
pub type Field = Array2<f64>;

/// Interior mask: `true` cells are relaxed, `false` cells are fixed obstacles.
pub type InteriorMask = Array2<bool>;

/// Role of a single field cell, fixed for the lifetime of a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    /// Outer one-cell frame, never written.
    Border,
    /// Interior cell outside the mask, never written.
    Obstacle,
    /// Interior cell relaxed every sweep.
    Free,
}

/// Check that `mask` is exactly two cells smaller than `field` in each axis.
pub fn check_shapes(field: (usize, usize), mask: (usize, usize)) -> JacobiResult<()> {
    let (rows, cols) = field;
    if rows < 2 || cols < 2 || mask != (rows - 2, cols - 2) {
        return Err(JacobiError::ShapeMismatch { field, mask });
    }
    Ok(())
}

/// Embed an `H x W` domain into a zero-bordered `(H + 2) x (W + 2)` field.
pub fn pad_domain(domain: ArrayView2<f64>) -> Field {
    let (rows, cols) = domain.dim();
    let mut field = Field::zeros((rows + 2, cols + 2));
    field.slice_mut(s![1..rows + 1, 1..cols + 1]).assign(&domain);
    field
}

/// View of the interior of a padded field, aligned with its mask.
///
/// The field must be at least 2 x 2.
pub fn interior(field: &Field) -> ArrayView2<'_, f64> {
    let (rows, cols) = field.dim();
    field.slice(s![1..rows - 1, 1..cols - 1])
}

/// Precomputed cell classification for one field/mask pair.
///
/// `kinds` holds the tag of every field cell. The tag is lowered once into
/// two branch-free forms: per-row runs of contiguous free columns for the CPU
/// sweep, and a flat list of free-cell indices for the GPU kernel.
#[derive(Debug, Clone)]
pub struct CellLayout {
    rows: usize,
    cols: usize,
    kinds: Array2<CellKind>,
    // row r owns runs[row_offsets[r]..row_offsets[r + 1]]
    row_offsets: Vec<usize>,
    runs: Vec<(usize, usize)>,
    free_count: usize,
}

impl CellLayout {
    /// Classify every cell of a `field_dim` field under `mask`.
    pub fn new(field_dim: (usize, usize), mask: ArrayView2<bool>) -> JacobiResult<Self> {
        check_shapes(field_dim, mask.dim())?;
        let (rows, cols) = field_dim;

        let kinds = Array2::from_shape_fn((rows, cols), |(r, c)| {
            if r == 0 || c == 0 || r == rows - 1 || c == cols - 1 {
                CellKind::Border
            } else if mask[[r - 1, c - 1]] {
                CellKind::Free
            } else {
                CellKind::Obstacle
            }
        });

        let mut row_offsets = Vec::with_capacity(rows + 1);
        let mut runs = Vec::new();
        let mut free_count = 0;
        for row in kinds.rows() {
            row_offsets.push(runs.len());
            let mut start = None;
            for (c, kind) in row.iter().enumerate() {
                match (kind, start) {
                    (CellKind::Free, None) => start = Some(c),
                    (CellKind::Free, Some(_)) => {}
                    (_, Some(s0)) => {
                        runs.push((s0, c));
                        free_count += c - s0;
                        start = None;
                    }
                    (_, None) => {}
                }
            }
            // The last column is always Border, so every run has closed here.
            debug_assert!(start.is_none());
        }
        row_offsets.push(runs.len());

        Ok(Self {
            rows,
            cols,
            kinds,
            row_offsets,
            runs,
            free_count,
        })
    }

    pub fn dim(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn kind(&self, row: usize, col: usize) -> CellKind {
        self.kinds[[row, col]]
    }

    pub fn kinds(&self) -> ArrayView2<'_, CellKind> {
        self.kinds.view()
    }

    /// Number of free cells.
    pub fn free_count(&self) -> usize {
        self.free_count
    }

    /// Half-open column runs `[start, end)` of free cells in `row`.
    #[inline]
    pub fn row_runs(&self, row: usize) -> &[(usize, usize)] {
        &self.runs[self.row_offsets[row]..self.row_offsets[row + 1]]
    }

    /// Row-major flat indices of all free cells, in ascending order.
    pub fn free_indices(&self) -> Vec<u32> {
        let mut out = Vec::with_capacity(self.free_count);
        for row in 0..self.rows {
            for &(start, end) in self.row_runs(row) {
                out.extend((start..end).map(|c| (row * self.cols + c) as u32));
            }
        }
        out
    }
}

//! Summary statistics over the interior of a solved floor plan.

use ndarray::{Array1, ArrayView2};
use ndarray_stats::SummaryStatisticsExt;

#[cfg(feature = "python")]
use numpy::PyReadonlyArray2;
#[cfg(feature = "python")]
use pyo3::prelude::*;

use crate::error::{JacobiError, JacobiResult};
use crate::field::check_shapes;

/// Cells strictly above this temperature count as warm.
pub const WARM_THRESHOLD: f64 = 18.0;
/// Cells strictly below this temperature count as cold.
pub const COLD_THRESHOLD: f64 = 15.0;

pub const CSV_HEADER: &str = "building_id, mean_temp, std_temp, pct_above_18, pct_below_15";

#[cfg_attr(feature = "python", pyclass(get_all, frozen))]
#[derive(Debug, Clone, Copy, PartialEq)]
/// Statistics of the mask-selected cells of one field.
pub struct SummaryStats {
    pub mean_temp: f64,
    /// Population standard deviation.
    pub std_temp: f64,
    pub pct_above_18: f64,
    pub pct_below_15: f64,
}

impl SummaryStats {
    /// One CSV line in the column order of `CSV_HEADER`.
    pub fn csv_row(&self, building_id: &str) -> String {
        format!(
            "{}, {}, {}, {}, {}",
            building_id, self.mean_temp, self.std_temp, self.pct_above_18, self.pct_below_15
        )
    }
}

/// Statistics of `field` over the interior cells selected by `mask`.
///
/// `field` is the padded `(H + 2) x (W + 2)` grid and `mask` its `H x W`
/// interior mask.
pub fn summary_stats(field: ArrayView2<f64>, mask: ArrayView2<bool>) -> JacobiResult<SummaryStats> {
    check_shapes(field.dim(), mask.dim())?;
    let (rows, cols) = mask.dim();

    let values: Array1<f64> = field
        .slice(ndarray::s![1..rows + 1, 1..cols + 1])
        .iter()
        .zip(mask.iter())
        .filter_map(|(&v, &inside)| inside.then_some(v))
        .collect();

    let mean_temp = SummaryStatisticsExt::mean(&values).map_err(|_| JacobiError::EmptyInterior)?;
    let variance = values
        .central_moment(2)
        .map_err(|_| JacobiError::EmptyInterior)?;

    let n = values.len() as f64;
    let above = values.iter().filter(|&&v| v > WARM_THRESHOLD).count() as f64;
    let below = values.iter().filter(|&&v| v < COLD_THRESHOLD).count() as f64;

    Ok(SummaryStats {
        mean_temp,
        std_temp: variance.sqrt(),
        pct_above_18: above / n * 100.0,
        pct_below_15: below / n * 100.0,
    })
}

/// Summary statistics (PyO3 wrapper).
#[cfg(feature = "python")]
#[pyfunction(name = "summary_stats")]
pub fn summary_stats_py(
    field: PyReadonlyArray2<f64>,
    mask: PyReadonlyArray2<bool>,
) -> PyResult<SummaryStats> {
    Ok(summary_stats(field.as_array(), mask.as_array())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{s, Array2};

    use crate::field::pad_domain;

    fn stripes() -> Array2<f64> {
        Array2::from_shape_fn((4, 4), |(_, c)| [10.0, 20.0, 30.0, 40.0][c])
    }

    #[test]
    fn test_stats_full_mask() {
        let field = pad_domain(stripes().view());
        let mask = Array2::from_elem((4, 4), true);
        let stats = summary_stats(field.view(), mask.view()).unwrap();

        assert_relative_eq!(stats.mean_temp, 25.0);
        assert_relative_eq!(stats.std_temp, 125.0_f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(stats.pct_above_18, 75.0);
        assert_relative_eq!(stats.pct_below_15, 25.0);
    }

    #[test]
    fn test_stats_ignore_masked_and_border_cells() {
        let mut field = pad_domain(stripes().view());
        field.row_mut(0).fill(1000.0);
        let mut mask = Array2::from_elem((4, 4), true);
        mask.slice_mut(s![.., 3]).fill(false);
        let stats = summary_stats(field.view(), mask.view()).unwrap();

        assert_relative_eq!(stats.mean_temp, 20.0);
        assert_relative_eq!(stats.pct_above_18, 200.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(stats.pct_below_15, 100.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_thresholds_are_strict() {
        let domain = Array2::from_shape_vec((1, 2), vec![18.0, 15.0]).unwrap();
        let field = pad_domain(domain.view());
        let mask = Array2::from_elem((1, 2), true);
        let stats = summary_stats(field.view(), mask.view()).unwrap();
        assert_eq!(stats.pct_above_18, 0.0);
        assert_eq!(stats.pct_below_15, 0.0);
    }

    #[test]
    fn test_empty_interior() {
        let field = pad_domain(stripes().view());
        let mask = Array2::from_elem((4, 4), false);
        assert!(matches!(
            summary_stats(field.view(), mask.view()),
            Err(JacobiError::EmptyInterior)
        ));
    }

    #[test]
    fn test_shape_mismatch() {
        let field = pad_domain(stripes().view());
        let mask = Array2::from_elem((6, 6), true);
        assert!(matches!(
            summary_stats(field.view(), mask.view()),
            Err(JacobiError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_csv_row() {
        let stats = SummaryStats {
            mean_temp: 25.0,
            std_temp: 1.5,
            pct_above_18: 75.0,
            pct_below_15: 25.0,
        };
        assert_eq!(stats.csv_row("10000"), "10000, 25, 1.5, 75, 25");
    }
}

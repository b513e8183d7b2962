//! Floor-plan loading from a directory of per-building `.npy` arrays.
//!
//! Layout of the data directory:
//! - `building_ids.txt`: one building id per line
//! - `<id>_domain.npy`: `size x size` float64 initial interior temperatures
//! - `<id>_interior.npy`: `size x size` bool interior mask

use std::fs;
use std::path::{Path, PathBuf};

use ndarray::Array2;
use ndarray_npy::{read_npy, ReadableElement};

#[cfg(feature = "python")]
use numpy::{IntoPyArray, PyArray2};
#[cfg(feature = "python")]
use pyo3::prelude::*;

use crate::error::{JacobiError, JacobiResult};
use crate::field::{pad_domain, Field, InteriorMask, GRID_SIZE};

pub const BUILDING_IDS_FILE: &str = "building_ids.txt";

/// Building ids listed in `<dir>/building_ids.txt`, blank lines dropped.
pub fn read_building_ids(dir: &Path) -> JacobiResult<Vec<String>> {
    let text = fs::read_to_string(dir.join(BUILDING_IDS_FILE))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_owned)
        .collect())
}

/// Reads padded fields and masks for individual buildings.
#[derive(Debug, Clone)]
pub struct GridLoader {
    dir: PathBuf,
    size: usize,
}

impl GridLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            size: GRID_SIZE,
        }
    }

    /// Expect `size x size` arrays instead of the default 512 x 512.
    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn building_ids(&self) -> JacobiResult<Vec<String>> {
        read_building_ids(&self.dir)
    }

    fn read_square<A: ReadableElement>(&self, path: PathBuf) -> JacobiResult<Array2<A>> {
        let array: Array2<A> = read_npy(&path).map_err(|source| JacobiError::Npy {
            path: path.display().to_string(),
            source,
        })?;
        let dim = array.dim();
        if dim != (self.size, self.size) {
            return Err(JacobiError::UnexpectedShape {
                path: path.display().to_string(),
                expected: (self.size, self.size),
                found: dim,
            });
        }
        Ok(array)
    }

    /// Padded field (zero border) and interior mask for `building_id`.
    pub fn load(&self, building_id: &str) -> JacobiResult<(Field, InteriorMask)> {
        let domain: Array2<f64> =
            self.read_square(self.dir.join(format!("{building_id}_domain.npy")))?;
        let mask: InteriorMask =
            self.read_square(self.dir.join(format!("{building_id}_interior.npy")))?;
        Ok((pad_domain(domain.view()), mask))
    }
}

/// Load one building (PyO3 wrapper). Returns `(u0, mask)`.
#[cfg(feature = "python")]
#[pyfunction]
#[pyo3(signature = (load_dir, building_id, size = GRID_SIZE))]
pub fn load_data(
    py: Python<'_>,
    load_dir: PathBuf,
    building_id: &str,
    size: usize,
) -> PyResult<(Py<PyArray2<f64>>, Py<PyArray2<bool>>)> {
    let (u0, mask) = GridLoader::new(load_dir).with_size(size).load(building_id)?;
    Ok((u0.into_pyarray(py).unbind(), mask.into_pyarray(py).unbind()))
}

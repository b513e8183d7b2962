//! Batch configuration, loadable from TOML.
//!
//! Every key is optional:
//!
//! ```toml
//! load_dir = "data/modified_swiss_dwellings"
//! n_buildings = 4
//! max_iter = 20000
//! abs_tol = 1e-4      # ignored when fixed_budget = true
//! fixed_budget = false
//! backend = "auto"    # auto | cpu | gpu
//! check_finite = true
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{JacobiError, JacobiResult};
use crate::solver::{Backend, SolverOptions, DEFAULT_ABS_TOL, DEFAULT_MAX_ITER};

pub const DEFAULT_LOAD_DIR: &str = "data/modified_swiss_dwellings";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatchConfig {
    /// Directory holding `building_ids.txt` and the `.npy` arrays.
    pub load_dir: PathBuf,
    /// Number of buildings taken from the head of the id list.
    pub n_buildings: usize,
    pub max_iter: i64,
    pub abs_tol: f64,
    /// Run the whole iteration budget, ignoring `abs_tol`.
    pub fixed_budget: bool,
    pub backend: Backend,
    pub check_finite: bool,
    /// Expected interior edge length of the stored arrays.
    pub grid_size: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            load_dir: PathBuf::from(DEFAULT_LOAD_DIR),
            n_buildings: 1,
            max_iter: DEFAULT_MAX_ITER,
            abs_tol: DEFAULT_ABS_TOL,
            fixed_budget: false,
            backend: Backend::Auto,
            check_finite: true,
            grid_size: crate::field::GRID_SIZE,
        }
    }
}

impl BatchConfig {
    pub fn from_toml_str(text: &str) -> JacobiResult<Self> {
        toml::from_str(text).map_err(|e| JacobiError::Config(e.to_string()))
    }

    pub fn from_file(path: &Path) -> JacobiResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Tolerance handed to the solver, `None` for a fixed budget.
    pub fn tolerance(&self) -> Option<f64> {
        (!self.fixed_budget).then_some(self.abs_tol)
    }

    /// Validated solver options for every building of the batch.
    pub fn solver_options(&self) -> JacobiResult<SolverOptions> {
        Ok(SolverOptions::new(self.max_iter, self.tolerance())?
            .with_backend(self.backend)
            .with_finite_check(self.check_finite))
    }

    pub fn validate(&self) -> JacobiResult<()> {
        if self.n_buildings == 0 {
            return Err(JacobiError::Config("n_buildings must be at least 1".to_string()));
        }
        if self.grid_size == 0 {
            return Err(JacobiError::Config("grid_size must be at least 1".to_string()));
        }
        self.solver_options().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BatchConfig::from_toml_str("").unwrap();
        assert_eq!(config, BatchConfig::default());
        assert_eq!(config.n_buildings, 1);
        assert_eq!(config.max_iter, 20_000);
        assert_eq!(config.tolerance(), Some(1e-4));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_overrides() {
        let config = BatchConfig::from_toml_str(
            r#"
            load_dir = "/tmp/plans"
            n_buildings = 8
            max_iter = 500
            fixed_budget = true
            backend = "cpu"
            "#,
        )
        .unwrap();
        assert_eq!(config.load_dir, PathBuf::from("/tmp/plans"));
        assert_eq!(config.n_buildings, 8);
        assert_eq!(config.tolerance(), None);
        let options = config.solver_options().unwrap();
        assert_eq!(options.max_iter(), 500);
        assert_eq!(options.backend(), Backend::Cpu);
    }

    #[test]
    fn test_rejects_unknown_keys_and_bad_values() {
        assert!(matches!(
            BatchConfig::from_toml_str("max_iters = 3"),
            Err(JacobiError::Config(_))
        ));
        assert!(matches!(
            BatchConfig::from_toml_str("backend = \"tpu\""),
            Err(JacobiError::Config(_))
        ));

        let config = BatchConfig::from_toml_str("max_iter = -5").unwrap();
        assert!(matches!(
            config.validate(),
            Err(JacobiError::InvalidIterationCount(-5))
        ));
        let config = BatchConfig::from_toml_str("n_buildings = 0").unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("batch.toml");
        std::fs::write(&path, "abs_tol = 1e-6\n").unwrap();
        let config = BatchConfig::from_file(&path).unwrap();
        assert_eq!(config.tolerance(), Some(1e-6));
    }
}

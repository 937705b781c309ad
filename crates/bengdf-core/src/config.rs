//! Options controlling table builds and extensions.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use bengdf_core_common::{Crs, DerivedColumn, Sensor};

use crate::error::ConfigError;

/// What a build does when a patch cannot be processed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Abort with the first failure in discovery order
    #[default]
    FailFast,
    /// Keep going; failing patches become rows with an error marker
    Lenient,
}

impl FailurePolicy {
    /// Returns the string representation of this policy.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            FailurePolicy::FailFast => "fail-fast",
            FailurePolicy::Lenient => "lenient",
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail-fast" | "failfast" => Ok(FailurePolicy::FailFast),
            "lenient" => Ok(FailurePolicy::Lenient),
            other => Err(format!(
                "unknown failure policy '{other}', expected fail-fast or lenient"
            )),
        }
    }
}

/// Worker threads used when no count is given.
pub const DEFAULT_WORKERS: usize = 8;

fn validate_workers(n_workers: usize) -> Result<(), ConfigError> {
    if n_workers == 0 {
        return Err(ConfigError::InvalidOption {
            option: "n_workers".to_string(),
            message: "at least one worker is required".to_string(),
        });
    }
    Ok(())
}

/// Options for building a table from a patch archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    /// Sensor whose patches are collected
    pub sensor: Sensor,
    /// CRS of the output geometries
    pub target_crs: Crs,
    /// Number of worker threads
    pub n_workers: usize,
    /// Handling of patches that fail to process
    pub policy: FailurePolicy,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            sensor: Sensor::S2,
            target_crs: Crs::ETRS89_LAEA,
            n_workers: DEFAULT_WORKERS,
            policy: FailurePolicy::FailFast,
        }
    }
}

impl BuildOptions {
    /// Options for `sensor` with every other value at its default.
    #[must_use]
    pub fn for_sensor(sensor: Sensor) -> Self {
        Self {
            sensor,
            ..Self::default()
        }
    }

    /// Set the sensor
    #[must_use]
    pub fn with_sensor(mut self, sensor: Sensor) -> Self {
        self.sensor = sensor;
        self
    }

    /// Set the target CRS
    #[must_use]
    pub fn with_target_crs(mut self, crs: Crs) -> Self {
        self.target_crs = crs;
        self
    }

    /// Set the number of worker threads
    #[must_use]
    pub fn with_n_workers(mut self, n_workers: usize) -> Self {
        self.n_workers = n_workers;
        self
    }

    /// Set the failure policy
    #[must_use]
    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Checks the options for values no build can work with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOption`] if `n_workers` is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_workers(self.n_workers)
    }
}

/// Which derived columns an extension computes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendSpec {
    /// Columns to compute
    pub columns: BTreeSet<DerivedColumn>,
    /// Replace values of columns the table already holds
    pub overwrite: bool,
    /// Number of worker threads
    pub n_workers: usize,
}

impl Default for ExtendSpec {
    fn default() -> Self {
        Self {
            columns: BTreeSet::new(),
            overwrite: false,
            n_workers: DEFAULT_WORKERS,
        }
    }
}

impl ExtendSpec {
    /// Computes the given columns without overwriting.
    #[must_use]
    pub fn new(columns: impl IntoIterator<Item = DerivedColumn>) -> Self {
        Self {
            columns: columns.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Computes every derived column.
    #[must_use]
    pub fn all() -> Self {
        Self::new(DerivedColumn::ALL)
    }

    /// Set whether existing columns are overwritten
    #[must_use]
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Set the number of worker threads
    #[must_use]
    pub fn with_n_workers(mut self, n_workers: usize) -> Self {
        self.n_workers = n_workers;
        self
    }

    /// Checks that at least one column and one worker are requested.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingRequired`] for an empty column set and
    /// [`ConfigError::InvalidOption`] if `n_workers` is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.columns.is_empty() {
            return Err(ConfigError::MissingRequired {
                option: "columns".to_string(),
            });
        }
        validate_workers(self.n_workers)
    }
}

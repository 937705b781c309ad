//! External patch name lists for seasonal snow and cloud or shadow.
//!
//! The archive ships these as headerless CSV files holding one S2 patch name
//! per row.

use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

use bengdf_core_common::QualityFlags;
use bengdf_shared::{SourcePosition, SpatialFormatError, SpatialFormatResult};

use crate::error::{IoErrorExt, Result};

/// Patch names flagged by the archive's quality lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QualityLists {
    snow: HashSet<String>,
    cloud_or_shadow: HashSet<String>,
}

impl QualityLists {
    /// Lists without any flagged patch.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates lists from already loaded names.
    #[must_use]
    pub fn new(
        snow: impl IntoIterator<Item = String>,
        cloud_or_shadow: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            snow: snow.into_iter().collect(),
            cloud_or_shadow: cloud_or_shadow.into_iter().collect(),
        }
    }

    /// Loads whichever of the two list files is given.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if a file cannot be read or parsed.
    pub fn from_files(snow: Option<&Path>, cloud_or_shadow: Option<&Path>) -> Result<Self> {
        let load = |path: Option<&Path>| -> Result<HashSet<String>> {
            let Some(path) = path else {
                return Ok(HashSet::new());
            };
            let file = std::fs::File::open(path).with_read_context("CSV", path)?;
            let names = read_name_list(file).with_read_context("CSV", path)?;
            log::info!("Loaded {} patch names from {}", names.len(), path.display());
            Ok(names)
        };

        Ok(Self {
            snow: load(snow)?,
            cloud_or_shadow: load(cloud_or_shadow)?,
        })
    }

    /// Number of patches with seasonal snow.
    #[must_use]
    pub fn snow_count(&self) -> usize {
        self.snow.len()
    }

    /// Number of patches with cloud or shadow.
    #[must_use]
    pub fn cloud_or_shadow_count(&self) -> usize {
        self.cloud_or_shadow.len()
    }

    /// Flags for the S2 patch `s2_name`.
    ///
    /// The cloud-or-shadow list does not tell the two apart, so a hit sets both.
    #[must_use]
    pub fn flags_for(&self, s2_name: &str) -> QualityFlags {
        let cloud_or_shadow = self.cloud_or_shadow.contains(s2_name);
        QualityFlags {
            cloud: cloud_or_shadow,
            shadow: cloud_or_shadow,
            snow: self.snow.contains(s2_name),
        }
    }
}

/// Reads a headerless single-column CSV of patch names.
///
/// Blank rows are skipped; surrounding whitespace is trimmed.
///
/// # Errors
///
/// Returns [`SpatialFormatError::Parse`] with the offending row on malformed CSV.
pub fn read_name_list<R: Read>(reader: R) -> SpatialFormatResult<HashSet<String>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut names = HashSet::new();
    for (record, row) in csv_reader.records().zip(1_u64..) {
        let record = record.map_err(|err| SpatialFormatError::Parse {
            message: err.to_string(),
            position: Some(SourcePosition {
                line: err.position().map(csv::Position::line),
                record: Some(row),
                ..SourcePosition::default()
            }),
            context: None,
        })?;
        if let Some(name) = record.get(0)
            && !name.is_empty()
        {
            names.insert(name.to_string());
        }
    }
    Ok(names)
}

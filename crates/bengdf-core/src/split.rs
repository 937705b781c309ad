//! The archive's original train/validation/test partition.
//!
//! Each split ships as a headerless CSV of S2 patch names, the same layout as
//! the quality lists.

use std::collections::HashSet;
use std::path::Path;

use bengdf_core_common::OriginalSplit;

use crate::error::{IoErrorExt, Result};
use crate::quality::read_name_list;

/// Patch names of the three original splits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitLists {
    train: HashSet<String>,
    validation: HashSet<String>,
    test: HashSet<String>,
}

impl SplitLists {
    /// Lists in which no patch is assigned.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates lists from already loaded names.
    #[must_use]
    pub fn new(
        train: impl IntoIterator<Item = String>,
        validation: impl IntoIterator<Item = String>,
        test: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            train: train.into_iter().collect(),
            validation: validation.into_iter().collect(),
            test: test.into_iter().collect(),
        }
    }

    /// Loads whichever of the split files are given.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if a file cannot be read or parsed.
    pub fn from_files(
        train: Option<&Path>,
        validation: Option<&Path>,
        test: Option<&Path>,
    ) -> Result<Self> {
        let load = |path: Option<&Path>| -> Result<HashSet<String>> {
            let Some(path) = path else {
                return Ok(HashSet::new());
            };
            let file = std::fs::File::open(path).with_read_context("CSV", path)?;
            let names = read_name_list(file).with_read_context("CSV", path)?;
            log::info!("Loaded {} split entries from {}", names.len(), path.display());
            Ok(names)
        };

        Ok(Self {
            train: load(train)?,
            validation: load(validation)?,
            test: load(test)?,
        })
    }

    /// Returns `true` if no split holds a patch.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.train.is_empty() && self.validation.is_empty() && self.test.is_empty()
    }

    /// Split of the S2 patch `s2_name`.
    ///
    /// A name listed in several splits belongs to the first of train,
    /// validation and test.
    #[must_use]
    pub fn split_of(&self, s2_name: &str) -> OriginalSplit {
        if self.train.contains(s2_name) {
            OriginalSplit::Train
        } else if self.validation.contains(s2_name) {
            OriginalSplit::Validation
        } else if self.test.contains(s2_name) {
            OriginalSplit::Test
        } else {
            OriginalSplit::Unassigned
        }
    }
}

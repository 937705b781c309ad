//! I/O traits for persisting tables.
//!
//! This module defines the traits a table format must implement so that the
//! operations in `bengdf-core` can read and write assembled tables without
//! depending on a particular file format.

use std::path::Path;

use bengdf_shared::SpatialFormatResult;

use crate::table::Table;

/// Trait for reading a persisted table.
pub trait TableReader: Send + Sync {
    /// Short name of the format, used in error messages (e.g. `"GeoParquet"`).
    fn format_name(&self) -> &'static str;

    /// Reads the table stored at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or does not describe a table.
    fn read_table(&self, path: &Path) -> SpatialFormatResult<Table>;
}

/// Trait for persisting a table.
pub trait TableWriter: Send + Sync {
    /// Short name of the format, used in error messages (e.g. `"GeoParquet"`).
    fn format_name(&self) -> &'static str;

    /// Writes `table` to `path`, replacing any existing file.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or writing fails.
    fn write_table(&self, table: &Table, path: &Path) -> SpatialFormatResult<()>;
}

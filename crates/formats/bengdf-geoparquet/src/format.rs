//! [`TableReader`] and [`TableWriter`] implementations for GeoParquet.

use std::path::Path;

use bengdf_core_common::{Table, TableReader, TableWriter};
use bengdf_shared::SpatialFormatResult;

use crate::reader::read_geoparquet;
use crate::writer::{GeoParquetWriterOptions, write_geoparquet};

/// GeoParquet persistence of assembled tables.
#[derive(Debug, Clone, Default)]
pub struct GeoParquetFormat {
    options: GeoParquetWriterOptions,
}

impl GeoParquetFormat {
    /// Creates a format using the given writer options.
    #[must_use]
    pub fn new(options: GeoParquetWriterOptions) -> Self {
        Self { options }
    }

    /// Writer options in use.
    #[must_use]
    pub fn options(&self) -> &GeoParquetWriterOptions {
        &self.options
    }
}

impl TableReader for GeoParquetFormat {
    fn format_name(&self) -> &'static str {
        "GeoParquet"
    }

    fn read_table(&self, path: &Path) -> SpatialFormatResult<Table> {
        read_geoparquet(path)
    }
}

impl TableWriter for GeoParquetFormat {
    fn format_name(&self) -> &'static str {
        "GeoParquet"
    }

    fn write_table(&self, table: &Table, path: &Path) -> SpatialFormatResult<()> {
        write_geoparquet(table, path, &self.options)
    }
}

//! GeoParquet persistence of patch tables.
//!
//! A table is stored as one Parquet file with a WKB `geometry` column tagged
//! with the `geoarrow.wkb` extension type and a `geo` file metadata entry
//! naming the table CRS. Derived columns are written only when the table holds
//! them, and reading restores the same set.

pub mod format;
pub mod metadata;
pub mod reader;
pub mod schema;
pub mod writer;

pub use format::GeoParquetFormat;
pub use metadata::{GEO_METADATA_KEY, GeoParquetMetadata, GeometryColumnMetadata};
pub use reader::{GeoParquetSummary, inspect_geoparquet, read_geoparquet};
pub use writer::{GeoParquetWriterOptions, write_geoparquet};

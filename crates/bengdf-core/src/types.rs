//! Data types describing persisted tables.
//!
//! These structures carry what the `info` operation reports about a table
//! file: its format, CRS, row count, geometry columns and field schema.

use bengdf_core_common::DerivedColumn;

/// Information about a persisted table.
#[derive(Debug, Clone)]
pub struct DatasetInfo {
    /// Path to the table file
    pub dataset: String,
    /// Format name
    pub format: String,
    /// Table CRS, if the file declares one
    pub crs: Option<String>,
    /// Number of rows
    pub num_rows: i64,
    /// Derived columns the table holds
    pub derived_columns: Vec<DerivedColumn>,
    /// Geometry columns information
    pub geometry_columns: Vec<GeometryColumnInfo>,
    /// Schema fields
    pub fields: Vec<FieldInfo>,
}

/// Information about a geometry column.
#[derive(Debug, Clone)]
pub struct GeometryColumnInfo {
    /// Column name
    pub name: String,
    /// Encoding, e.g. `WKB`
    pub encoding: String,
    /// Extension name (e.g., "geoarrow.wkb")
    pub extension: Option<String>,
    /// CRS information
    pub crs: Option<String>,
    /// Bounding box as `[minx, miny, maxx, maxy]`
    pub bbox: Option<Vec<f64>>,
}

/// Information about a field/column.
#[derive(Debug, Clone)]
pub struct FieldInfo {
    /// Field name
    pub name: String,
    /// Data type
    pub data_type: String,
    /// Whether the field is nullable
    pub nullable: bool,
}

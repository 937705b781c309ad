//! Display utilities for formatting CLI output.
//!
//! This module provides table row structures and formatting functions
//! for presenting build summaries and table information in a human-readable format.

use tabled::{Table, Tabled};

use bengdf_core::operations::BuildArtifact;
use bengdf_core::types::DatasetInfo;
use bengdf_core::PatchFailure;

/// Table row representation for displaying geometry column information.
#[derive(Tabled)]
pub struct GeometryRow {
    /// Name of the geometry column.
    #[tabled(rename = "Column")]
    pub name: String,
    /// Encoding of the stored geometries.
    #[tabled(rename = "Encoding")]
    pub encoding: String,
    /// `GeoArrow` extension name for the geometry type.
    #[tabled(rename = "Extension")]
    pub extension: String,
    /// Coordinate Reference System information.
    #[tabled(rename = "CRS")]
    pub crs: String,
    /// Bounding box of all geometries.
    #[tabled(rename = "BBox")]
    pub bbox: String,
}

/// Table row representation for displaying field/column information.
#[derive(Tabled)]
pub struct FieldRow {
    /// Name of the field.
    #[tabled(rename = "Field")]
    pub name: String,
    /// Data type of the field.
    #[tabled(rename = "Type")]
    pub data_type: String,
    /// Whether the field can contain null values.
    #[tabled(rename = "Nullable")]
    pub nullable: String,
}

/// Table row representation for a patch that failed during a build.
#[derive(Tabled)]
pub struct FailureRow {
    /// Patch name.
    #[tabled(rename = "Patch")]
    pub name: String,
    /// Error kind.
    #[tabled(rename = "Kind")]
    pub kind: String,
    /// Error message.
    #[tabled(rename = "Error")]
    pub error: String,
}

impl From<&PatchFailure> for FailureRow {
    fn from(failure: &PatchFailure) -> Self {
        Self {
            name: failure.name.clone(),
            kind: failure.kind.clone(),
            error: failure.error.clone(),
        }
    }
}

fn format_bbox(bbox: Option<&[f64]>) -> String {
    match bbox {
        Some(values) if !values.is_empty() => values
            .iter()
            .map(|value| format!("{value:.1}"))
            .collect::<Vec<_>>()
            .join(", "),
        _ => "N/A".to_string(),
    }
}

/// Display dataset information in a formatted table.
pub fn display_dataset_info(info: &DatasetInfo) {
    println!("\nDataset: {}", info.dataset);
    println!("Format: {}", info.format);
    println!("CRS: {}", info.crs.as_deref().unwrap_or("N/A"));
    println!("Rows: {}", info.num_rows);
    if !info.derived_columns.is_empty() {
        let derived: Vec<_> = info.derived_columns.iter().map(ToString::to_string).collect();
        println!("Derived columns: {}", derived.join(", "));
    }

    if !info.geometry_columns.is_empty() {
        println!("\n=== Geometry Columns ===");

        let geo_rows: Vec<GeometryRow> = info
            .geometry_columns
            .iter()
            .map(|g| GeometryRow {
                name: g.name.clone(),
                encoding: g.encoding.clone(),
                extension: g.extension.clone().unwrap_or_else(|| "N/A".to_string()),
                crs: g.crs.clone().unwrap_or_else(|| "N/A".to_string()),
                bbox: format_bbox(g.bbox.as_deref()),
            })
            .collect();

        println!("{}", Table::new(geo_rows));
    }

    if !info.fields.is_empty() {
        println!("\n=== Fields ===");

        let field_rows: Vec<FieldRow> = info
            .fields
            .iter()
            .map(|f| FieldRow {
                name: f.name.clone(),
                data_type: f.data_type.clone(),
                nullable: if f.nullable { "Yes" } else { "No" }.to_string(),
            })
            .collect();

        println!("{}", Table::new(field_rows));
    }
}

/// Display the outcome of a build, listing failed patches if there are any.
pub fn display_build_summary(artifact: &BuildArtifact) {
    println!(
        "Wrote {} rows to {} ({} of {} patches failed)",
        artifact.rows,
        artifact.path.display(),
        artifact.report.failures.len(),
        artifact.report.discovered
    );

    if !artifact.report.failures.is_empty() {
        println!("\n=== Failed Patches ===");
        let rows: Vec<FailureRow> = artifact.report.failures.iter().map(FailureRow::from).collect();
        println!("{}", Table::new(rows));
    }
}

//! Writing tables as GeoParquet.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow_array::builder::{BinaryBuilder, BooleanBuilder, ListBuilder, StringBuilder};
use arrow_array::{ArrayRef, RecordBatch};
use bengdf_core_common::{DerivedColumn, Row, Table};
use bengdf_shared::{SourcePosition, SpatialFormatError, SpatialFormatResult};
use geozero::{CoordDimensions, ToWkb};
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::metadata::KeyValue;
use parquet::file::properties::WriterProperties;

use crate::metadata::{GEO_METADATA_KEY, GeoParquetMetadata};
use crate::schema::table_schema;

/// Options for writing GeoParquet files.
#[derive(Debug, Clone)]
pub struct GeoParquetWriterOptions {
    /// Parquet compression codec
    pub compression: Compression,
    /// Maximum number of rows per row group and per record batch
    pub max_row_group_size: usize,
}

impl Default for GeoParquetWriterOptions {
    fn default() -> Self {
        Self {
            compression: Compression::SNAPPY,
            max_row_group_size: 64 * 1024,
        }
    }
}

impl GeoParquetWriterOptions {
    /// Set the compression codec
    #[must_use]
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Set the maximum row group size
    #[must_use]
    pub fn with_max_row_group_size(mut self, rows: usize) -> Self {
        self.max_row_group_size = rows.max(1);
        self
    }
}

/// Writes `table` to a GeoParquet file at `path`, replacing any existing file.
///
/// # Errors
///
/// Returns an error if a geometry cannot be encoded as WKB or the file cannot
/// be written.
pub fn write_geoparquet(
    table: &Table,
    path: &Path,
    options: &GeoParquetWriterOptions,
) -> SpatialFormatResult<()> {
    let context = path.display().to_string();
    let schema = table_schema(table.crs(), table.columns());
    let geo = GeoParquetMetadata::for_table(table).to_json()?;

    let props = WriterProperties::builder()
        .set_compression(options.compression)
        .set_max_row_group_size(options.max_row_group_size)
        .set_key_value_metadata(Some(vec![KeyValue::new(
            GEO_METADATA_KEY.to_string(),
            geo,
        )]))
        .build();

    let file = File::create(path).map_err(|source| SpatialFormatError::Io {
        source,
        context: Some(context.clone()),
    })?;
    let mut writer = ArrowWriter::try_new(file, Arc::clone(&schema), Some(props))
        .map_err(|err| parquet_error(&err, &context))?;

    for (chunk_idx, chunk) in table.rows().chunks(options.max_row_group_size).enumerate() {
        let offset = chunk_idx * options.max_row_group_size;
        let columns = rows_to_columns(chunk, table, offset)
            .map_err(|err| err.with_additional_context(context.clone()))?;
        let batch = RecordBatch::try_new(Arc::clone(&schema), columns).map_err(|err| {
            SpatialFormatError::Encode {
                message: err.to_string(),
                context: Some(context.clone()),
            }
        })?;
        writer
            .write(&batch)
            .map_err(|err| parquet_error(&err, &context))?;
    }

    writer
        .close()
        .map_err(|err| parquet_error(&err, &context))?;
    log::debug!("Wrote {} rows to {context}", table.len());
    Ok(())
}

fn parquet_error(err: &parquet::errors::ParquetError, context: &str) -> SpatialFormatError {
    SpatialFormatError::Encode {
        message: err.to_string(),
        context: Some(context.to_string()),
    }
}

/// Encodes rows into arrays matching [`table_schema`].
fn rows_to_columns(
    rows: &[Row],
    table: &Table,
    offset: usize,
) -> SpatialFormatResult<Vec<ArrayRef>> {
    let mut name = StringBuilder::new();
    let mut sensor = StringBuilder::new();
    let mut acquisition = StringBuilder::new();
    let mut labels = ListBuilder::new(StringBuilder::new());
    let mut corresponding = StringBuilder::new();
    let mut source_crs = StringBuilder::new();
    let mut error = StringBuilder::new();
    let mut season = StringBuilder::new();
    let mut country = StringBuilder::new();
    let mut cloud = BooleanBuilder::new();
    let mut shadow = BooleanBuilder::new();
    let mut snow = BooleanBuilder::new();
    let mut original_split = StringBuilder::new();
    let mut new_labels = ListBuilder::new(StringBuilder::new());
    let mut geometry = BinaryBuilder::new();

    for (idx, row) in rows.iter().enumerate() {
        name.append_value(&row.name);
        sensor.append_value(row.sensor.as_str());
        acquisition.append_option(row.formatted_acquisition());
        for label in &row.labels {
            labels.values().append_value(label);
        }
        labels.append(true);
        corresponding.append_option(row.corresponding_s2_patch.as_deref());
        source_crs.append_option(row.source_crs.map(|crs| crs.authority_code()));
        error.append_option(row.error.as_deref());
        season.append_option(row.season.map(|s| s.as_str()));
        country.append_option(row.country.as_ref().and_then(|c| c.name()));
        cloud.append_option(row.quality.map(|q| q.cloud));
        shadow.append_option(row.quality.map(|q| q.shadow));
        snow.append_option(row.quality.map(|q| q.snow));
        original_split.append_option(row.original_split.and_then(|split| split.name()));
        // an empty conversion is stored as null
        match row.new_labels.as_deref() {
            Some(converted) if !converted.is_empty() => {
                for label in converted {
                    new_labels.values().append_value(label);
                }
                new_labels.append(true);
            },
            _ => new_labels.append(false),
        }

        match &row.geometry {
            Some(patch_geometry) => {
                let wkb = geo_types::Geometry::Polygon(patch_geometry.polygon().clone())
                    .to_wkb(CoordDimensions::xy())
                    .map_err(|err| SpatialFormatError::Encode {
                        message: format!("failed to encode geometry of '{}': {err}", row.name),
                        context: Some(
                            SourcePosition::record((offset + idx + 1) as u64).to_string(),
                        ),
                    })?;
                geometry.append_value(wkb);
            },
            None => geometry.append_null(),
        }
    }

    let mut columns: Vec<ArrayRef> = vec![
        Arc::new(name.finish()),
        Arc::new(sensor.finish()),
        Arc::new(acquisition.finish()),
        Arc::new(labels.finish()),
        Arc::new(corresponding.finish()),
        Arc::new(source_crs.finish()),
        Arc::new(error.finish()),
    ];
    for column in table.columns() {
        match column {
            DerivedColumn::Season => columns.push(Arc::new(season.finish())),
            DerivedColumn::Country => columns.push(Arc::new(country.finish())),
            DerivedColumn::Quality => {
                columns.push(Arc::new(cloud.finish()));
                columns.push(Arc::new(shadow.finish()));
                columns.push(Arc::new(snow.finish()));
            },
            DerivedColumn::OriginalSplit => columns.push(Arc::new(original_split.finish())),
            DerivedColumn::NewLabels => columns.push(Arc::new(new_labels.finish())),
        }
    }
    columns.push(Arc::new(geometry.finish()));
    Ok(columns)
}

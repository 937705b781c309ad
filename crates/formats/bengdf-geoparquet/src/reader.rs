//! Reading tables back from GeoParquet.

use std::collections::BTreeSet;
use std::fs::File;
use std::path::Path;

use arrow_array::cast::AsArray;
use arrow_array::{Array, BinaryArray, BooleanArray, ListArray, RecordBatch, StringArray};
use arrow_schema::{DataType, SchemaRef};
use bengdf_core_common::{
    CountryLabel, Crs, DerivedColumn, OriginalSplit, PatchGeometry, QualityFlags, Row, Season,
    Sensor, Table,
};
use bengdf_shared::{SourcePosition, SpatialFormatError, SpatialFormatResult};
use chrono::NaiveDateTime;
use geozero::ToGeo;
use geozero::wkb::Wkb;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

use crate::metadata::{GEO_METADATA_KEY, GeoParquetMetadata};
use crate::schema::{
    ACQUISITION_DATE, CLOUD, CORRESPONDING_S2_PATCH, COUNTRY, ERROR, GEOMETRY, LABELS, NAME,
    NEW_LABELS, ORIGINAL_SPLIT, SEASON, SENSOR, SHADOW, SNOW, SOURCE_CRS, derived_columns_in,
    label_list_type,
};

/// Schema, geometry metadata and size of a GeoParquet file.
#[derive(Debug, Clone)]
pub struct GeoParquetSummary {
    /// Arrow schema of the file
    pub schema: SchemaRef,
    /// Parsed `geo` metadata, `None` for plain Parquet files
    pub geo: Option<GeoParquetMetadata>,
    /// Total number of rows
    pub num_rows: i64,
}

/// Reads the schema and file metadata without decoding any rows.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or is not valid Parquet, or
/// if its `geo` metadata is malformed.
pub fn inspect_geoparquet(path: &Path) -> SpatialFormatResult<GeoParquetSummary> {
    let context = path.display().to_string();
    let builder = open(path, &context)?;
    let geo = geo_metadata(&builder).map_err(|err| err.with_additional_context(&context))?;

    Ok(GeoParquetSummary {
        schema: builder.schema().clone(),
        geo,
        num_rows: builder.metadata().file_metadata().num_rows(),
    })
}

/// Reads a table written by [`write_geoparquet`](crate::write_geoparquet).
///
/// # Errors
///
/// Returns an error if the file cannot be read, lacks `geo` metadata or a
/// required column, or holds values that do not decode.
pub fn read_geoparquet(path: &Path) -> SpatialFormatResult<Table> {
    let context = path.display().to_string();
    let builder = open(path, &context)?;
    let geo = geo_metadata(&builder)
        .and_then(|geo| {
            geo.ok_or_else(|| SpatialFormatError::Schema {
                message: format!("missing '{GEO_METADATA_KEY}' file metadata"),
                context: None,
            })
        })
        .map_err(|err| err.with_additional_context(&context))?;
    let crs = geo
        .primary_crs()
        .map_err(|err| err.with_additional_context(&context))?;
    let columns = derived_columns_in(builder.schema());

    let reader = builder
        .build()
        .map_err(|err| parquet_error(&err, &context))?;

    let mut table = Table::with_columns(crs, columns.iter().copied());
    let mut record = 0_u64;
    for batch in reader {
        let batch = batch.map_err(|err| SpatialFormatError::Parse {
            message: err.to_string(),
            position: None,
            context: Some(context.clone()),
        })?;
        for row in batch_to_rows(&batch, crs, &columns, record)
            .map_err(|err| err.with_additional_context(&context))?
        {
            table.push(row).map_err(|err| SpatialFormatError::Schema {
                message: err.to_string(),
                context: Some(context.clone()),
            })?;
        }
        record += batch.num_rows() as u64;
    }

    log::debug!("Read {} rows from {context}", table.len());
    Ok(table)
}

fn open(path: &Path, context: &str) -> SpatialFormatResult<ParquetRecordBatchReaderBuilder<File>> {
    let file = File::open(path).map_err(|source| SpatialFormatError::Io {
        source,
        context: Some(context.to_string()),
    })?;
    ParquetRecordBatchReaderBuilder::try_new(file).map_err(|err| parquet_error(&err, context))
}

fn parquet_error(err: &parquet::errors::ParquetError, context: &str) -> SpatialFormatError {
    SpatialFormatError::Parse {
        message: err.to_string(),
        position: None,
        context: Some(context.to_string()),
    }
}

fn geo_metadata(
    builder: &ParquetRecordBatchReaderBuilder<File>,
) -> SpatialFormatResult<Option<GeoParquetMetadata>> {
    let Some(entries) = builder.metadata().file_metadata().key_value_metadata() else {
        return Ok(None);
    };
    entries
        .iter()
        .find(|kv| kv.key == GEO_METADATA_KEY)
        .and_then(|kv| kv.value.as_deref())
        .map(GeoParquetMetadata::from_json)
        .transpose()
}

fn batch_to_rows(
    batch: &RecordBatch,
    crs: Crs,
    columns: &BTreeSet<DerivedColumn>,
    first_record: u64,
) -> SpatialFormatResult<Vec<Row>> {
    let names = string_column(batch, NAME)?;
    let sensors = string_column(batch, SENSOR)?;
    let acquisitions = string_column(batch, ACQUISITION_DATE)?;
    let labels = list_column(batch, LABELS)?;
    let corresponding = string_column(batch, CORRESPONDING_S2_PATCH)?;
    let source_crss = string_column(batch, SOURCE_CRS)?;
    let errors = string_column(batch, ERROR)?;
    let geometries = binary_column(batch, GEOMETRY)?;

    let seasons = columns
        .contains(&DerivedColumn::Season)
        .then(|| string_column(batch, SEASON))
        .transpose()?;
    let countries = columns
        .contains(&DerivedColumn::Country)
        .then(|| string_column(batch, COUNTRY))
        .transpose()?;
    let quality = columns
        .contains(&DerivedColumn::Quality)
        .then(|| {
            Ok::<_, SpatialFormatError>((
                bool_column(batch, CLOUD)?,
                bool_column(batch, SHADOW)?,
                bool_column(batch, SNOW)?,
            ))
        })
        .transpose()?;
    let splits = columns
        .contains(&DerivedColumn::OriginalSplit)
        .then(|| string_column(batch, ORIGINAL_SPLIT))
        .transpose()?;
    let converted = columns
        .contains(&DerivedColumn::NewLabels)
        .then(|| list_column(batch, NEW_LABELS))
        .transpose()?;

    let mut rows = Vec::with_capacity(batch.num_rows());
    for idx in 0..batch.num_rows() {
        let position = SourcePosition::record(first_record + idx as u64 + 1);
        let invalid = |message: String| SpatialFormatError::Parse {
            message,
            position: Some(position.clone()),
            context: None,
        };

        let sensor = sensors
            .value(idx)
            .parse::<Sensor>()
            .map_err(&invalid)?;
        let acquisition = optional_str(acquisitions, idx)
            .map(|value| {
                NaiveDateTime::parse_from_str(value, sensor.timestamp_format()).map_err(|err| {
                    invalid(format!("invalid {ACQUISITION_DATE} '{value}': {err}"))
                })
            })
            .transpose()?;
        let source_crs = optional_str(source_crss, idx)
            .map(|value| value.parse::<Crs>().map_err(|err| invalid(err.to_string())))
            .transpose()?;
        let geometry = if geometries.is_null(idx) {
            None
        } else {
            Some(decode_polygon(geometries.value(idx), crs).map_err(&invalid)?)
        };
        let row_labels = string_list(labels, idx, LABELS).map_err(&invalid)?;
        let failed = !errors.is_null(idx);

        let season = seasons
            .and_then(|seasons| optional_str(seasons, idx))
            .map(|value| value.parse::<Season>().map_err(&invalid))
            .transpose()?;
        // a null country next to a geometry means "no overlap"
        let country = countries.and_then(|countries| match optional_str(countries, idx) {
            Some(name) => Some(CountryLabel::Known(name.to_string())),
            None => geometry.is_some().then_some(CountryLabel::Unknown),
        });
        let flags = quality.and_then(|(cloud, shadow, snow)| {
            if cloud.is_null(idx) && shadow.is_null(idx) && snow.is_null(idx) {
                return None;
            }
            Some(QualityFlags {
                cloud: !cloud.is_null(idx) && cloud.value(idx),
                shadow: !shadow.is_null(idx) && shadow.value(idx),
                snow: !snow.is_null(idx) && snow.value(idx),
            })
        });

        // null split or labels on a processed row mean "none"
        let original_split = splits
            .and_then(|splits| match optional_str(splits, idx) {
                Some(name) => Some(name.parse::<OriginalSplit>().map_err(&invalid)),
                None => (!failed).then_some(Ok(OriginalSplit::Unassigned)),
            })
            .transpose()?;
        let new_labels = match converted {
            Some(converted) if !converted.is_null(idx) => {
                Some(string_list(converted, idx, NEW_LABELS).map_err(&invalid)?)
            },
            Some(_) if !failed => Some(Vec::new()),
            _ => None,
        };

        rows.push(Row {
            name: names.value(idx).to_string(),
            sensor,
            geometry,
            source_crs,
            acquisition,
            labels: row_labels,
            corresponding_s2_patch: optional_str(corresponding, idx).map(str::to_string),
            season,
            country,
            quality: flags,
            original_split,
            new_labels,
            error: optional_str(errors, idx).map(str::to_string),
        });
    }
    Ok(rows)
}

fn decode_polygon(bytes: &[u8], crs: Crs) -> Result<PatchGeometry, String> {
    match Wkb(bytes.to_vec()).to_geo() {
        Ok(geo_types::Geometry::Polygon(polygon)) => Ok(PatchGeometry::new(polygon, crs)),
        Ok(other) => Err(format!(
            "expected a Polygon geometry, found {}",
            geometry_kind(&other)
        )),
        Err(err) => Err(format!("invalid WKB geometry: {err}")),
    }
}

fn geometry_kind(geometry: &geo_types::Geometry<f64>) -> &'static str {
    match geometry {
        geo_types::Geometry::Point(_) => "Point",
        geo_types::Geometry::Line(_) => "Line",
        geo_types::Geometry::LineString(_) => "LineString",
        geo_types::Geometry::Polygon(_) => "Polygon",
        geo_types::Geometry::MultiPoint(_) => "MultiPoint",
        geo_types::Geometry::MultiLineString(_) => "MultiLineString",
        geo_types::Geometry::MultiPolygon(_) => "MultiPolygon",
        geo_types::Geometry::GeometryCollection(_) => "GeometryCollection",
        geo_types::Geometry::Rect(_) => "Rect",
        geo_types::Geometry::Triangle(_) => "Triangle",
    }
}

fn string_list(array: &ListArray, idx: usize, name: &str) -> Result<Vec<String>, String> {
    if array.is_null(idx) {
        return Ok(Vec::new());
    }
    let values = array.value(idx);
    let values = values
        .as_string_opt::<i32>()
        .ok_or_else(|| format!("column '{name}' must hold strings"))?;
    Ok(values.iter().flatten().map(str::to_string).collect())
}

fn optional_str(array: &StringArray, idx: usize) -> Option<&str> {
    (!array.is_null(idx)).then(|| array.value(idx))
}

fn column<'a>(batch: &'a RecordBatch, name: &str) -> SpatialFormatResult<&'a dyn Array> {
    batch
        .column_by_name(name)
        .map(|array| &**array)
        .ok_or_else(|| SpatialFormatError::Schema {
            message: format!("missing column '{name}'"),
            context: None,
        })
}

fn type_error(name: &str, expected: &DataType, found: &DataType) -> SpatialFormatError {
    SpatialFormatError::Schema {
        message: format!("column '{name}' must be {expected}, found {found}"),
        context: None,
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> SpatialFormatResult<&'a StringArray> {
    let array = column(batch, name)?;
    array
        .as_string_opt::<i32>()
        .ok_or_else(|| type_error(name, &DataType::Utf8, array.data_type()))
}

fn binary_column<'a>(batch: &'a RecordBatch, name: &str) -> SpatialFormatResult<&'a BinaryArray> {
    let array = column(batch, name)?;
    array
        .as_binary_opt::<i32>()
        .ok_or_else(|| type_error(name, &DataType::Binary, array.data_type()))
}

fn bool_column<'a>(batch: &'a RecordBatch, name: &str) -> SpatialFormatResult<&'a BooleanArray> {
    let array = column(batch, name)?;
    array
        .as_boolean_opt()
        .ok_or_else(|| type_error(name, &DataType::Boolean, array.data_type()))
}

fn list_column<'a>(batch: &'a RecordBatch, name: &str) -> SpatialFormatResult<&'a ListArray> {
    let array = column(batch, name)?;
    array
        .as_list_opt::<i32>()
        .ok_or_else(|| type_error(name, &label_list_type(), array.data_type()))
}

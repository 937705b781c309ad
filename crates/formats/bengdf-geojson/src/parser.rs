//! `GeoJSON` parsing into plain feature records.
#![allow(clippy::result_large_err)]

use std::convert::TryInto;
use std::fmt;
use std::path::Path;

use bengdf_shared::{SourcePosition, SpatialFormatError, SpatialFormatResult};
use geo_types::Geometry;
use geojson::{
    Feature, FeatureCollection, GeoJson, Geometry as GeoJsonGeometry, JsonObject, JsonValue,
};

/// Parsed `GeoJSON` feature with materialized properties and geometry.
#[derive(Debug, Clone)]
pub struct FeatureRecord {
    /// Feature properties, empty when the feature has none
    pub properties: JsonObject,
    /// Feature geometry converted to `geo-types`
    pub geometry: Option<Geometry<f64>>,
}

impl FeatureRecord {
    /// Reads a string property.
    ///
    /// Missing and `null` properties yield `None`.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialFormatError::Schema`] if the property holds anything
    /// other than a string.
    pub fn string_property(&self, key: &str) -> SpatialFormatResult<Option<&str>> {
        match self.properties.get(key) {
            None | Some(JsonValue::Null) => Ok(None),
            Some(JsonValue::String(value)) => Ok(Some(value.as_str())),
            Some(other) => Err(SpatialFormatError::Schema {
                message: format!(
                    "property '{key}' must be a string, found {}",
                    describe_value(other)
                ),
                context: None,
            }),
        }
    }
}

/// Reads every feature of a `GeoJSON` file.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be read and a parse error if its
/// content is neither a `GeoJSON` document nor a `GeoJSON` sequence.
pub fn read_geojson_file(path: &Path) -> SpatialFormatResult<Vec<FeatureRecord>> {
    let context = path.display().to_string();
    let bytes = std::fs::read(path).map_err(|source| SpatialFormatError::Io {
        source,
        context: Some(context.clone()),
    })?;
    parse_geojson_bytes(&bytes, context)
}

/// Parse raw bytes into a vector of `FeatureRecord`s.
///
/// # Errors
///
/// Returns [`SpatialFormatError::Parse`] when the bytes hold neither a
/// `GeoJSON` document nor newline-delimited `GeoJSON`.
pub fn parse_geojson_bytes(
    bytes: &[u8],
    context: impl Into<String>,
) -> SpatialFormatResult<Vec<FeatureRecord>> {
    let context = context.into();

    match serde_json::from_slice::<GeoJson>(bytes) {
        Ok(geojson) => geojson_to_records(geojson, &context),
        Err(document_err) => match parse_geojson_sequence(bytes, &context) {
            Ok(records) => Ok(records),
            Err(sequence_err) => Err(combine_errors(&document_err, &sequence_err, context)),
        },
    }
}

fn geojson_to_records(geojson: GeoJson, context: &str) -> SpatialFormatResult<Vec<FeatureRecord>> {
    match geojson {
        GeoJson::FeatureCollection(collection) => {
            feature_collection_to_records(collection, context)
        },
        GeoJson::Feature(feature) => Ok(vec![feature_to_record(feature, 1, context)?]),
        GeoJson::Geometry(geometry) => Ok(vec![FeatureRecord {
            properties: JsonObject::new(),
            geometry: Some(convert_geometry(geometry, None, context)?),
        }]),
    }
}

fn feature_collection_to_records(
    collection: FeatureCollection,
    context: &str,
) -> SpatialFormatResult<Vec<FeatureRecord>> {
    collection
        .features
        .into_iter()
        .zip(1_u64..)
        .map(|(feature, record)| feature_to_record(feature, record, context))
        .collect()
}

fn feature_to_record(
    feature: Feature,
    record: u64,
    context: &str,
) -> SpatialFormatResult<FeatureRecord> {
    let geometry = feature
        .geometry
        .map(|geometry| convert_geometry(geometry, Some(record), context))
        .transpose()?;

    Ok(FeatureRecord {
        properties: feature.properties.unwrap_or_default(),
        geometry,
    })
}

fn convert_geometry(
    geometry: GeoJsonGeometry,
    record: Option<u64>,
    context: &str,
) -> SpatialFormatResult<Geometry<f64>> {
    geometry
        .try_into()
        .map_err(|err| SpatialFormatError::Parse {
            message: format!("Failed to convert GeoJSON geometry: {err}"),
            position: record.map(SourcePosition::record),
            context: Some(context.to_string()),
        })
}

fn parse_geojson_sequence(bytes: &[u8], context: &str) -> SpatialFormatResult<Vec<FeatureRecord>> {
    let mut records = Vec::new();
    for (raw_line, line_number) in bytes.split(|b| *b == b'\n').zip(1_u64..) {
        let position = || {
            Some(SourcePosition {
                line: Some(line_number),
                ..SourcePosition::default()
            })
        };
        let line = std::str::from_utf8(raw_line)
            .map_err(|err| SpatialFormatError::Parse {
                message: format!("GeoJSON line is not valid UTF-8: {err}"),
                position: position(),
                context: Some(context.to_string()),
            })?
            .trim();

        if line.is_empty() {
            continue;
        }

        let geojson = line
            .parse::<GeoJson>()
            .map_err(|err| SpatialFormatError::Parse {
                message: format!("Failed to parse GeoJSON feature: {err}"),
                position: position(),
                context: Some(context.to_string()),
            })?;
        records.extend(geojson_to_records(geojson, context)?);
    }

    if records.is_empty() {
        return Err(SpatialFormatError::Parse {
            message: "No GeoJSON features found".to_string(),
            position: None,
            context: Some(context.to_string()),
        });
    }
    Ok(records)
}

fn combine_errors(
    document_err: &serde_json::Error,
    sequence_err: &SpatialFormatError,
    context: String,
) -> SpatialFormatError {
    SpatialFormatError::Parse {
        message: format!(
            "Failed to parse GeoJSON document ({document_err}); \
             also failed to parse as GeoJSON sequence: {sequence_err}"
        ),
        position: SourcePosition::from_json_error(document_err),
        context: Some(context),
    }
}

/// Helper to describe JSON value kinds for error messages.
pub(crate) fn describe_value(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

impl fmt::Display for FeatureRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let geom = match &self.geometry {
            Some(Geometry::Polygon(_)) => "Polygon",
            Some(Geometry::MultiPolygon(_)) => "MultiPolygon",
            Some(_) => "Some(Geometry)",
            None => "None",
        };
        write!(
            f,
            "FeatureRecord(properties={} keys, geometry={geom})",
            self.properties.len()
        )
    }
}

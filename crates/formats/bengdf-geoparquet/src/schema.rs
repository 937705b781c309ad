//! Arrow schema of a persisted table.

use std::collections::BTreeSet;
use std::sync::Arc;

use arrow_schema::{DataType, Field, Schema, SchemaRef};
use bengdf_core_common::{Crs, DerivedColumn};
use geoarrow_schema::{Crs as GeoArrowCrs, GeoArrowType, Metadata, WkbType};

/// Patch name, the table key.
pub const NAME: &str = "name";
/// Sensor (`S1` or `S2`).
pub const SENSOR: &str = "sensor";
/// Acquisition timestamp in the sensor-specific layout.
pub const ACQUISITION_DATE: &str = "acquisition_date";
/// Land-cover labels.
pub const LABELS: &str = "labels";
/// Matching S2 patch of an S1 patch.
pub const CORRESPONDING_S2_PATCH: &str = "corresponding_s2_patch";
/// Native CRS of the patch, as `EPSG:nnnn`.
pub const SOURCE_CRS: &str = "source_crs";
/// Error marker of a patch that failed to process.
pub const ERROR: &str = "error";
/// Season derived from the acquisition timestamp.
pub const SEASON: &str = "season";
/// Country with the largest overlap; null when unknown.
pub const COUNTRY: &str = "country";
/// Cloud flag.
pub const CLOUD: &str = "cloud";
/// Cloud shadow flag.
pub const SHADOW: &str = "shadow";
/// Seasonal snow flag.
pub const SNOW: &str = "snow";
/// Split of the original partition; null when unassigned.
pub const ORIGINAL_SPLIT: &str = "original_split";
/// Labels in the 19-class nomenclature; null when none has a counterpart.
pub const NEW_LABELS: &str = "new_labels";
/// WKB-encoded footprint, the primary geometry column.
pub const GEOMETRY: &str = "geometry";

/// Builds the WKB geometry field carrying the table CRS as `GeoArrow` metadata.
#[must_use]
pub fn geometry_field(crs: Crs) -> Field {
    let metadata = Metadata::new(GeoArrowCrs::from_authority_code(crs.authority_code()), None);
    GeoArrowType::Wkb(WkbType::new(Arc::new(metadata))).to_field(GEOMETRY, true)
}

/// Column names holding the values of a derived column.
#[must_use]
pub fn derived_column_names(column: DerivedColumn) -> &'static [&'static str] {
    match column {
        DerivedColumn::Season => &[SEASON],
        DerivedColumn::Country => &[COUNTRY],
        DerivedColumn::Quality => &[CLOUD, SHADOW, SNOW],
        DerivedColumn::OriginalSplit => &[ORIGINAL_SPLIT],
        DerivedColumn::NewLabels => &[NEW_LABELS],
    }
}

/// List-of-strings type of the label columns.
#[must_use]
pub fn label_list_type() -> DataType {
    DataType::List(Arc::new(Field::new_list_field(DataType::Utf8, true)))
}

/// Schema of a table in `crs` holding the given derived columns.
///
/// Base columns come first, then derived columns in [`DerivedColumn`] order,
/// then the geometry.
#[must_use]
pub fn table_schema(crs: Crs, columns: &BTreeSet<DerivedColumn>) -> SchemaRef {
    let mut fields = vec![
        Field::new(NAME, DataType::Utf8, false),
        Field::new(SENSOR, DataType::Utf8, false),
        Field::new(ACQUISITION_DATE, DataType::Utf8, true),
        Field::new(LABELS, label_list_type(), false),
        Field::new(CORRESPONDING_S2_PATCH, DataType::Utf8, true),
        Field::new(SOURCE_CRS, DataType::Utf8, true),
        Field::new(ERROR, DataType::Utf8, true),
    ];

    for column in columns {
        match column {
            DerivedColumn::Season => fields.push(Field::new(SEASON, DataType::Utf8, true)),
            DerivedColumn::Country => fields.push(Field::new(COUNTRY, DataType::Utf8, true)),
            DerivedColumn::Quality => {
                for name in [CLOUD, SHADOW, SNOW] {
                    fields.push(Field::new(name, DataType::Boolean, true));
                }
            },
            DerivedColumn::OriginalSplit => {
                fields.push(Field::new(ORIGINAL_SPLIT, DataType::Utf8, true));
            },
            DerivedColumn::NewLabels => {
                fields.push(Field::new(NEW_LABELS, label_list_type(), true));
            },
        }
    }

    fields.push(geometry_field(crs));
    Arc::new(Schema::new(fields))
}

/// Derived columns present in a schema.
///
/// A derived column counts as present only when all of its value columns are.
#[must_use]
pub fn derived_columns_in(schema: &Schema) -> BTreeSet<DerivedColumn> {
    DerivedColumn::ALL
        .into_iter()
        .filter(|column| {
            derived_column_names(*column)
                .iter()
                .all(|name| schema.index_of(name).is_ok())
        })
        .collect()
}

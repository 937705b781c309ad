//! The GeoParquet `geo` file metadata.

use std::collections::BTreeMap;

use bengdf_core_common::{Crs, Table};
use bengdf_shared::{SpatialFormatError, SpatialFormatResult};
use geo_types::{Coord, Rect};
use serde::{Deserialize, Serialize};

use crate::schema::GEOMETRY;

/// Key of the file metadata entry holding [`GeoParquetMetadata`].
pub const GEO_METADATA_KEY: &str = "geo";

/// GeoParquet specification version written by this crate.
pub const GEOPARQUET_VERSION: &str = "1.1.0";

/// File-level GeoParquet metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoParquetMetadata {
    /// GeoParquet specification version
    pub version: String,
    /// Name of the default geometry column
    pub primary_column: String,
    /// Per geometry column metadata
    pub columns: BTreeMap<String, GeometryColumnMetadata>,
}

/// Metadata of a single geometry column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryColumnMetadata {
    /// Geometry encoding, always `WKB` for files written here
    pub encoding: String,
    /// Geometry types present in the column
    pub geometry_types: Vec<String>,
    /// PROJJSON-style CRS; absent means OGC:CRS84
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crs: Option<CrsMetadata>,
    /// `[xmin, ymin, xmax, ymax]` of all geometries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<Vec<f64>>,
}

/// The subset of PROJJSON used to identify a CRS by authority code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrsMetadata {
    /// Authority identifier
    pub id: CrsId,
}

/// Authority and code of a CRS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrsId {
    /// Issuing authority, `EPSG` for every CRS written here
    pub authority: String,
    /// Code within the authority
    pub code: u32,
}

impl GeoParquetMetadata {
    /// Describes the geometry column of `table`.
    #[must_use]
    pub fn for_table(table: &Table) -> Self {
        let crs = table.crs();
        let column = GeometryColumnMetadata {
            encoding: "WKB".to_string(),
            geometry_types: vec!["Polygon".to_string()],
            crs: Some(CrsMetadata {
                id: CrsId {
                    authority: "EPSG".to_string(),
                    code: u32::from(crs.epsg()),
                },
            }),
            bbox: table_bounds(table).map(|rect| {
                vec![rect.min().x, rect.min().y, rect.max().x, rect.max().y]
            }),
        };

        Self {
            version: GEOPARQUET_VERSION.to_string(),
            primary_column: GEOMETRY.to_string(),
            columns: BTreeMap::from([(GEOMETRY.to_string(), column)]),
        }
    }

    /// Parses the JSON value of the `geo` key.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialFormatError::Parse`] if the value is not valid metadata.
    pub fn from_json(value: &str) -> SpatialFormatResult<Self> {
        serde_json::from_str(value)
            .map_err(|err| SpatialFormatError::from_json(&err, "geo metadata"))
    }

    /// Serializes the metadata to JSON.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialFormatError::Encode`] if serialization fails.
    pub fn to_json(&self) -> SpatialFormatResult<String> {
        serde_json::to_string(self).map_err(|err| SpatialFormatError::Encode {
            message: err.to_string(),
            context: Some("geo metadata".to_string()),
        })
    }

    /// CRS of the primary geometry column.
    ///
    /// # Errors
    ///
    /// Returns [`SpatialFormatError::Schema`] if the primary column is not
    /// described, the CRS is not an EPSG code, or no CRS is given.
    pub fn primary_crs(&self) -> SpatialFormatResult<Crs> {
        let column = self.columns.get(&self.primary_column).ok_or_else(|| {
            SpatialFormatError::Schema {
                message: format!(
                    "primary column '{}' has no geometry metadata",
                    self.primary_column
                ),
                context: Some("geo metadata".to_string()),
            }
        })?;

        // Tables are never written without an explicit CRS.
        let Some(crs) = &column.crs else {
            return Err(SpatialFormatError::Schema {
                message: "geometry column has no CRS".to_string(),
                context: Some("geo metadata".to_string()),
            });
        };

        if !crs.id.authority.eq_ignore_ascii_case("EPSG") {
            return Err(SpatialFormatError::Schema {
                message: format!("unsupported CRS authority '{}'", crs.id.authority),
                context: Some("geo metadata".to_string()),
            });
        }
        let code = u16::try_from(crs.id.code).map_err(|_| SpatialFormatError::Schema {
            message: format!("EPSG code {} is out of range", crs.id.code),
            context: Some("geo metadata".to_string()),
        })?;
        Ok(Crs::from_epsg(code))
    }
}

fn table_bounds(table: &Table) -> Option<Rect<f64>> {
    table
        .iter()
        .filter_map(|row| row.geometry.as_ref()?.bounds())
        .reduce(|acc, rect| {
            Rect::new(
                Coord {
                    x: acc.min().x.min(rect.min().x),
                    y: acc.min().y.min(rect.min().y),
                },
                Coord {
                    x: acc.max().x.max(rect.max().x),
                    y: acc.max().y.max(rect.max().y),
                },
            )
        })
}

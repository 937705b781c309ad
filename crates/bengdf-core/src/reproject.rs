//! Reprojector: coordinate transformation between EPSG coordinate systems.
//!
//! Projections are resolved with `proj4rs` from its bundled EPSG definitions.
//! `proj4rs` expects geographic coordinates in radians, so degree values are
//! converted on the way in and out.

use bengdf_core_common::{Crs, PatchError, PatchGeometry, PatchResult, Table};
use geo::{Coord, MapCoords, MultiPolygon};
use proj4rs::proj::Proj;
use proj4rs::transform::transform;

/// A resolved transformation from one CRS to another.
pub struct Reprojector {
    source: Crs,
    target: Crs,
    projections: Option<(Proj, Proj)>,
}

impl std::fmt::Debug for Reprojector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reprojector")
            .field("source", &self.source)
            .field("target", &self.target)
            .field("identity", &self.projections.is_none())
            .finish()
    }
}

fn resolve(crs: Crs) -> PatchResult<Proj> {
    Proj::from_epsg_code(crs.epsg()).map_err(|err| PatchError::UnsupportedProjection {
        crs: crs.to_string(),
        reason: format!("{err:?}"),
    })
}

impl Reprojector {
    /// Resolves both coordinate systems.
    ///
    /// Source and target are resolved even when equal, so an unsupported CRS is
    /// reported regardless of the direction.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::UnsupportedProjection`] if either CRS is unknown.
    pub fn new(source: Crs, target: Crs) -> PatchResult<Self> {
        let source_proj = resolve(source)?;
        let target_proj = resolve(target)?;
        let projections = (source != target).then_some((source_proj, target_proj));
        Ok(Self {
            source,
            target,
            projections,
        })
    }

    /// Source CRS.
    #[must_use]
    pub fn source(&self) -> Crs {
        self.source
    }

    /// Target CRS.
    #[must_use]
    pub fn target(&self) -> Crs {
        self.target
    }

    /// Transforms a single coordinate.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::UnsupportedProjection`] if the point cannot be
    /// transformed (for example, it lies outside the projection's domain).
    pub fn transform_coord(&self, coord: Coord<f64>) -> PatchResult<Coord<f64>> {
        let Some((source, target)) = &self.projections else {
            return Ok(coord);
        };

        let mut point = if source.is_latlong() {
            (coord.x.to_radians(), coord.y.to_radians(), 0.0)
        } else {
            (coord.x, coord.y, 0.0)
        };
        transform(source, target, &mut point).map_err(|err| {
            PatchError::UnsupportedProjection {
                crs: self.target.to_string(),
                reason: format!(
                    "cannot transform ({}, {}) from {}: {err:?}",
                    coord.x, coord.y, self.source
                ),
            }
        })?;

        let (x, y) = if target.is_latlong() {
            (point.0.to_degrees(), point.1.to_degrees())
        } else {
            (point.0, point.1)
        };
        if !x.is_finite() || !y.is_finite() {
            return Err(PatchError::UnsupportedProjection {
                crs: self.target.to_string(),
                reason: format!(
                    "({}, {}) from {} has no finite image",
                    coord.x, coord.y, self.source
                ),
            });
        }
        Ok(Coord { x, y })
    }

    /// Transforms a patch geometry.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::CrsMismatch`] if the geometry is not in the source
    /// CRS, or [`PatchError::UnsupportedProjection`] if a vertex fails to
    /// transform.
    pub fn reproject(&self, geometry: &PatchGeometry) -> PatchResult<PatchGeometry> {
        if geometry.crs() != self.source {
            return Err(PatchError::CrsMismatch {
                expected: self.source,
                found: geometry.crs(),
            });
        }
        if self.projections.is_none() {
            return Ok(geometry.clone());
        }
        let polygon = geometry
            .polygon()
            .try_map_coords(|coord| self.transform_coord(coord))?;
        Ok(PatchGeometry::new(polygon, self.target))
    }

    /// Transforms every vertex of a multi-polygon.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::UnsupportedProjection`] if a vertex fails to transform.
    pub fn reproject_multi_polygon(
        &self,
        geometry: &MultiPolygon<f64>,
    ) -> PatchResult<MultiPolygon<f64>> {
        if self.projections.is_none() {
            return Ok(geometry.clone());
        }
        geometry.try_map_coords(|coord| self.transform_coord(coord))
    }
}

/// Reprojects a single geometry into `target`.
///
/// Equal source and target CRS return an identical copy.
///
/// # Errors
///
/// Returns [`PatchError::UnsupportedProjection`] if either CRS is unknown or a
/// vertex cannot be transformed.
pub fn reproject(geometry: &PatchGeometry, target: Crs) -> PatchResult<PatchGeometry> {
    Reprojector::new(geometry.crs(), target)?.reproject(geometry)
}

/// Returns a copy of `table` with every geometry expressed in `target`.
///
/// Rows without a geometry are carried over unchanged.
///
/// # Errors
///
/// Returns [`PatchError::UnsupportedProjection`] on the first geometry that
/// cannot be transformed.
pub fn reproject_table(table: &Table, target: Crs) -> PatchResult<Table> {
    let reprojector = Reprojector::new(table.crs(), target)?;
    let rows = table
        .iter()
        .map(|row| {
            let mut row = row.clone();
            row.geometry = row
                .geometry
                .as_ref()
                .map(|geometry| reprojector.reproject(geometry))
                .transpose()?;
            Ok(row)
        })
        .collect::<PatchResult<Vec<_>>>()?;
    Table::from_rows(target, table.columns().iter().copied(), rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use bengdf_core_common::{CornerCoordinates, DerivedColumn, Row, Sensor};
    use geo::{Area, CoordsIter};

    use crate::geometry::build_geometry;

    #[test]
    fn test_identity_returns_equal_geometry() {
        let geometry = build_geometry(
            &CornerCoordinates::new(10.0, 20.0, 30.0, 5.0),
            Crs::ETRS89_LAEA,
        )
        .unwrap();
        let same = reproject(&geometry, Crs::ETRS89_LAEA).unwrap();
        assert_eq!(same, geometry);
    }

    #[test]
    fn test_same_crs_leaves_coordinates_alone() {
        for (crs, coord) in [
            (
                Crs::from_epsg(32633),
                Coord {
                    x: 382_680.0,
                    y: 5_380_560.0,
                },
            ),
            (Crs::WGS84, Coord { x: 12.5, y: 41.9 }),
        ] {
            let reprojector = Reprojector::new(crs, crs).unwrap();
            assert_eq!(reprojector.source(), reprojector.target());
            let same = reprojector.transform_coord(coord).unwrap();
            assert_abs_diff_eq!(same.x, coord.x, epsilon = 1e-9);
            assert_abs_diff_eq!(same.y, coord.y, epsilon = 1e-9);

            let corners = CornerCoordinates::new(coord.x, coord.y, coord.x + 1.0, coord.y - 1.0);
            let geometry = build_geometry(&corners, crs).unwrap();
            let projected = reprojector.reproject(&geometry).unwrap();
            assert_eq!(projected.crs(), crs);
            for (a, b) in projected
                .polygon()
                .exterior()
                .coords()
                .zip(geometry.polygon().exterior().coords())
            {
                assert_abs_diff_eq!(a.x, b.x, epsilon = 1e-9);
                assert_abs_diff_eq!(a.y, b.y, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_utm_origin_to_wgs84() {
        // false easting of UTM 33N lies on its 15 degree central meridian
        let reprojector = Reprojector::new(Crs::from_epsg(32633), Crs::WGS84).unwrap();
        let coord = reprojector
            .transform_coord(Coord {
                x: 500_000.0,
                y: 0.0,
            })
            .unwrap();
        assert_abs_diff_eq!(coord.x, 15.0, epsilon = 1e-6);
        assert_abs_diff_eq!(coord.y, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_wgs84_to_laea_and_back() {
        // LAEA Europe is centred on 10E 52N with false origin (4321000, 3210000)
        let forward = Reprojector::new(Crs::WGS84, Crs::ETRS89_LAEA).unwrap();
        let centre = forward.transform_coord(Coord { x: 10.0, y: 52.0 }).unwrap();
        assert_abs_diff_eq!(centre.x, 4_321_000.0, epsilon = 0.01);
        assert_abs_diff_eq!(centre.y, 3_210_000.0, epsilon = 0.01);

        let backward = Reprojector::new(Crs::ETRS89_LAEA, Crs::WGS84).unwrap();
        let lon_lat = backward.transform_coord(centre).unwrap();
        assert_abs_diff_eq!(lon_lat.x, 10.0, epsilon = 1e-7);
        assert_abs_diff_eq!(lon_lat.y, 52.0, epsilon = 1e-7);
    }

    #[test]
    fn test_patch_keeps_its_shape() {
        let geometry = build_geometry(
            &CornerCoordinates::new(535_140.0, 4_650_720.0, 536_340.0, 4_649_520.0),
            Crs::from_epsg(32629),
        )
        .unwrap();
        let projected = reproject(&geometry, Crs::ETRS89_LAEA).unwrap();

        assert_eq!(projected.crs(), Crs::ETRS89_LAEA);
        assert_eq!(projected.polygon().exterior().coords_count(), 5);
        // both systems are metric, so the area barely changes
        let ratio = projected.polygon().unsigned_area() / geometry.area();
        assert_abs_diff_eq!(ratio, 1.0, epsilon = 0.01);
    }

    #[test]
    fn test_rejects_foreign_crs() {
        let geometry =
            build_geometry(&CornerCoordinates::new(0.0, 1.0, 1.0, 0.0), Crs::WGS84).unwrap();
        let reprojector = Reprojector::new(Crs::ETRS89_LAEA, Crs::WGS84).unwrap();
        let err = reprojector.reproject(&geometry).unwrap_err();
        assert!(matches!(err, PatchError::CrsMismatch { .. }));
    }

    #[test]
    fn test_unknown_epsg_code() {
        let err = Reprojector::new(Crs::from_epsg(1), Crs::WGS84).unwrap_err();
        assert!(matches!(err, PatchError::UnsupportedProjection { .. }));
        assert!(err.to_string().contains("EPSG:1"));
    }

    #[test]
    fn test_reproject_table_keeps_columns() {
        let geometry = build_geometry(
            &CornerCoordinates::new(500_000.0, 1200.0, 501_200.0, 0.0),
            Crs::from_epsg(32633),
        )
        .unwrap();
        let mut row = Row::failed(
            "S2A_MSIL2A_20170613T101031_33UUP_61_39",
            Sensor::S2,
            &PatchError::UnknownPatchKey { key: String::new() },
        );
        row.error = None;
        row.geometry = Some(geometry);
        let table =
            Table::from_rows(Crs::from_epsg(32633), [DerivedColumn::Season], [row]).unwrap();

        let projected = reproject_table(&table, Crs::WGS84).unwrap();
        assert_eq!(projected.crs(), Crs::WGS84);
        assert!(projected.has_column(DerivedColumn::Season));
        let geometry = projected.rows()[0].geometry.as_ref().unwrap();
        assert_eq!(geometry.crs(), Crs::WGS84);
        assert_abs_diff_eq!(geometry.bounds().unwrap().min().x, 15.0, epsilon = 1e-6);
        // the source table is untouched
        assert_eq!(table.crs(), Crs::from_epsg(32633));
    }
}

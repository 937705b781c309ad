//! Polygons with an explicit coordinate reference system.

use geo::{Area, BoundingRect, CoordsIter, Polygon, Rect};

use crate::crs::Crs;

/// A patch footprint together with the CRS its coordinates are expressed in.
///
/// The CRS is part of the value: there is no way to build a `PatchGeometry`
/// without naming it, and reprojection always produces a new value.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchGeometry {
    polygon: Polygon<f64>,
    crs: Crs,
}

impl PatchGeometry {
    /// Wraps a polygon whose coordinates are in `crs`.
    #[must_use]
    pub fn new(polygon: Polygon<f64>, crs: Crs) -> Self {
        Self { polygon, crs }
    }

    /// The footprint polygon.
    #[must_use]
    pub fn polygon(&self) -> &Polygon<f64> {
        &self.polygon
    }

    /// The CRS of [`Self::polygon`].
    #[must_use]
    pub fn crs(&self) -> Crs {
        self.crs
    }

    /// Consumes the geometry and returns its parts.
    #[must_use]
    pub fn into_parts(self) -> (Polygon<f64>, Crs) {
        (self.polygon, self.crs)
    }

    /// Planar area in squared CRS units.
    #[must_use]
    pub fn area(&self) -> f64 {
        self.polygon.unsigned_area()
    }

    /// Axis-aligned bounds, `None` for an empty polygon.
    #[must_use]
    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.polygon.bounding_rect()
    }

    /// A polygon is degenerate when it has no area or a non-finite coordinate.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        let finite = self
            .polygon
            .coords_iter()
            .all(|c| c.x.is_finite() && c.y.is_finite());
        let area = self.area();
        !finite || !area.is_finite() || area <= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{LineString, polygon};

    #[test]
    fn area_and_bounds() {
        let geometry = PatchGeometry::new(
            polygon![(x: 0.0, y: 0.0), (x: 4.0, y: 0.0), (x: 4.0, y: 2.0), (x: 0.0, y: 2.0)],
            Crs::ETRS89_LAEA,
        );

        approx::assert_relative_eq!(geometry.area(), 8.0);
        let bounds = geometry.bounds().unwrap();
        assert_eq!(bounds.min().x, 0.0);
        assert_eq!(bounds.max().y, 2.0);
        assert!(!geometry.is_degenerate());
    }

    #[test]
    fn flat_and_empty_polygons_are_degenerate() {
        let flat = PatchGeometry::new(
            polygon![(x: 0.0, y: 0.0), (x: 4.0, y: 0.0), (x: 4.0, y: 0.0), (x: 0.0, y: 0.0)],
            Crs::WGS84,
        );
        assert!(flat.is_degenerate());

        let empty = PatchGeometry::new(Polygon::new(LineString::new(vec![]), vec![]), Crs::WGS84);
        assert!(empty.is_degenerate());
        assert!(empty.bounds().is_none());
    }

    #[test]
    fn non_finite_polygons_are_degenerate() {
        let geometry = PatchGeometry::new(
            polygon![(x: 0.0, y: 0.0), (x: f64::NAN, y: 0.0), (x: 4.0, y: 2.0)],
            Crs::WGS84,
        );
        assert!(geometry.is_degenerate());
    }
}

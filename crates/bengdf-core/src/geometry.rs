//! Geometry Builder: patch footprints from corner coordinates.

use bengdf_core_common::{CornerCoordinates, Crs, PatchError, PatchGeometry, PatchResult};
use geo::{Coord, Rect};

/// Builds the axis-aligned footprint of a patch in its native CRS.
///
/// The upper-left corner must lie strictly left of and above the lower-right
/// corner, and all four values must be finite.
///
/// # Errors
///
/// Returns [`PatchError::InvalidGeometry`] when the corners do not span a
/// rectangle with positive area.
pub fn build_geometry(corners: &CornerCoordinates, crs: Crs) -> PatchResult<PatchGeometry> {
    let CornerCoordinates {
        upper_left: ul,
        lower_right: lr,
    } = *corners;

    if ![ul.x, ul.y, lr.x, lr.y].iter().all(|v| v.is_finite()) {
        return Err(PatchError::InvalidGeometry {
            reason: format!(
                "corner coordinates must be finite, got ({}, {}) / ({}, {})",
                ul.x, ul.y, lr.x, lr.y
            ),
        });
    }
    if ul.x >= lr.x {
        return Err(PatchError::InvalidGeometry {
            reason: format!(
                "upper-left x ({}) must be smaller than lower-right x ({})",
                ul.x, lr.x
            ),
        });
    }
    if ul.y <= lr.y {
        return Err(PatchError::InvalidGeometry {
            reason: format!(
                "upper-left y ({}) must be greater than lower-right y ({})",
                ul.y, lr.y
            ),
        });
    }

    let rect = Rect::new(Coord { x: ul.x, y: lr.y }, Coord { x: lr.x, y: ul.y });
    Ok(PatchGeometry::new(rect.to_polygon(), crs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use geo::CoordsIter;

    #[test]
    fn test_builds_closed_rectangle() {
        // a 1200 m x 1200 m S2 patch in UTM 29N
        let corners = CornerCoordinates::new(535_140.0, 4_650_720.0, 536_340.0, 4_649_520.0);
        let geometry = build_geometry(&corners, Crs::from_epsg(32629)).unwrap();

        assert_eq!(geometry.crs(), Crs::from_epsg(32629));
        assert_relative_eq!(geometry.area(), 1200.0 * 1200.0);
        let polygon = geometry.polygon();
        assert_eq!(polygon.exterior().coords_count(), 5);
        assert!(polygon.exterior().is_closed());
        assert!(polygon.interiors().is_empty());

        let bounds = geometry.bounds().unwrap();
        assert_eq!(bounds.min(), Coord { x: 535_140.0, y: 4_649_520.0 });
        assert_eq!(bounds.max(), Coord { x: 536_340.0, y: 4_650_720.0 });
    }

    #[test]
    fn test_area_across_scales() {
        for (width, height) in [
            (0.25, 0.5),
            (1.0, 1.0),
            (10.0, 120.0),
            (1200.0, 1200.0),
            (100_000.0, 100_000.0),
            (600_000.0, 250.0),
        ] {
            let (x, y) = (400_000.0, 5_000_000.0);
            let corners = CornerCoordinates::new(x, y + height, x + width, y);
            let geometry = build_geometry(&corners, Crs::from_epsg(32633)).unwrap();
            assert_relative_eq!(geometry.area(), width * height, max_relative = 1e-9);
        }
    }

    #[test]
    fn test_rejects_swapped_corners() {
        let swapped_x = CornerCoordinates::new(10.0, 10.0, 0.0, 0.0);
        let err = build_geometry(&swapped_x, Crs::WGS84).unwrap_err();
        assert!(matches!(err, PatchError::InvalidGeometry { .. }));
        assert!(err.to_string().contains("upper-left x"));

        let swapped_y = CornerCoordinates::new(0.0, 0.0, 10.0, 10.0);
        let err = build_geometry(&swapped_y, Crs::WGS84).unwrap_err();
        assert!(err.to_string().contains("upper-left y"));
    }

    #[test]
    fn test_rejects_zero_width_and_non_finite() {
        let flat = CornerCoordinates::new(5.0, 10.0, 5.0, 0.0);
        assert!(build_geometry(&flat, Crs::WGS84).is_err());

        let nan = CornerCoordinates::new(f64::NAN, 10.0, 5.0, 0.0);
        let err = build_geometry(&nan, Crs::WGS84).unwrap_err();
        assert!(err.to_string().contains("finite"));
    }
}

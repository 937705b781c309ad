//! Country Assigner and the Country Reference Set it works against.

use std::collections::HashSet;
use std::path::Path;

use bengdf_core_common::{CountryLabel, Crs, PatchError, PatchGeometry, PatchResult};
use bengdf_geojson::{FeatureRecord, read_geojson_file};
use bengdf_shared::{SourcePosition, SpatialFormatError};
use geo::{Area, BooleanOps, BoundingRect, Geometry, Intersects, MultiPolygon, Rect};

use crate::error::{IoErrorExt, Result};
use crate::reproject::Reprojector;

/// ISO 3166-1 alpha-2 codes of the countries covered by BigEarthNet.
pub const BEN_COUNTRIES_ISO_A2: [&str; 10] =
    ["AT", "BE", "CH", "FI", "IE", "LT", "LU", "PT", "RS", "XK"];

/// A named country boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct Country {
    /// Country name, the value assigned to patches
    pub name: String,
    /// ISO 3166-1 alpha-2 code, if known
    pub iso_a2: Option<String>,
    /// Boundary in the reference set's CRS
    pub geometry: MultiPolygon<f64>,
    bounds: Option<Rect<f64>>,
}

impl Country {
    /// Creates a country, caching its bounds.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        iso_a2: Option<String>,
        geometry: MultiPolygon<f64>,
    ) -> Self {
        let bounds = geometry.bounding_rect();
        Self {
            name: name.into(),
            iso_a2,
            geometry,
            bounds,
        }
    }

    /// Planar area of the overlap with `patch`.
    fn overlap_area(&self, patch: &MultiPolygon<f64>, patch_bounds: Option<Rect<f64>>) -> f64 {
        if let (Some(own), Some(other)) = (self.bounds, patch_bounds)
            && !own.intersects(&other)
        {
            return 0.0;
        }
        patch.intersection(&self.geometry).unsigned_area()
    }
}

/// Options for loading a Country Reference Set from `GeoJSON`.
#[derive(Debug, Clone)]
pub struct CountryLoadOptions {
    /// CRS of the file's coordinates
    pub crs: Crs,
    /// Property holding the country name
    pub name_property: String,
    /// Property holding the ISO 3166-1 alpha-2 code
    pub iso_a2_property: String,
}

impl Default for CountryLoadOptions {
    fn default() -> Self {
        Self {
            crs: Crs::WGS84,
            name_property: "NAME".to_string(),
            iso_a2_property: "ISO_A2".to_string(),
        }
    }
}

impl CountryLoadOptions {
    /// Set the CRS of the file
    #[must_use]
    pub fn with_crs(mut self, crs: Crs) -> Self {
        self.crs = crs;
        self
    }

    /// Set the name property
    #[must_use]
    pub fn with_name_property(mut self, property: impl Into<String>) -> Self {
        self.name_property = property.into();
        self
    }

    /// Set the ISO code property
    #[must_use]
    pub fn with_iso_a2_property(mut self, property: impl Into<String>) -> Self {
        self.iso_a2_property = property.into();
        self
    }
}

/// A set of country boundaries sharing one CRS.
#[derive(Debug, Clone, PartialEq)]
pub struct CountryReferenceSet {
    crs: Crs,
    countries: Vec<Country>,
}

impl CountryReferenceSet {
    /// Creates a set whose boundaries are all in `crs`.
    #[must_use]
    pub fn new(crs: Crs, countries: Vec<Country>) -> Self {
        Self { crs, countries }
    }

    /// Loads country boundaries from a local `GeoJSON` file.
    ///
    /// Natural Earth leaves the ISO code of Kosovo unset (`-99`); such an
    /// entry is given the user-assigned code `XK`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read, or if a feature lacks
    /// a string name or a polygonal geometry.
    pub fn from_geojson_file(path: &Path, options: &CountryLoadOptions) -> Result<Self> {
        let records = read_geojson_file(path).with_read_context("GeoJSON", path)?;
        let countries = records
            .into_iter()
            .zip(1_u64..)
            .map(|(record, idx)| country_from_record(record, idx, options))
            .collect::<std::result::Result<Vec<_>, _>>()
            .with_read_context("GeoJSON", path)?;

        log::info!(
            "Loaded {} countries from {} ({})",
            countries.len(),
            path.display(),
            options.crs
        );
        Ok(Self::new(options.crs, countries))
    }

    /// CRS of every boundary in the set.
    #[must_use]
    pub fn crs(&self) -> Crs {
        self.crs
    }

    /// Countries in load order.
    #[must_use]
    pub fn countries(&self) -> &[Country] {
        &self.countries
    }

    /// Number of countries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.countries.len()
    }

    /// Returns `true` if the set holds no country.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.countries.is_empty()
    }

    /// Keeps only countries whose ISO code is listed, preserving order.
    #[must_use]
    pub fn restrict_to_iso_a2<S: AsRef<str>>(&self, codes: &[S]) -> Self {
        let codes: HashSet<String> = codes
            .iter()
            .map(|code| code.as_ref().to_ascii_uppercase())
            .collect();
        let countries = self
            .countries
            .iter()
            .filter(|country| {
                country
                    .iso_a2
                    .as_ref()
                    .is_some_and(|code| codes.contains(&code.to_ascii_uppercase()))
            })
            .cloned()
            .collect();
        Self::new(self.crs, countries)
    }

    /// Returns the set with every boundary expressed in `target`.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::UnsupportedProjection`] if a boundary cannot be
    /// transformed.
    pub fn to_crs(&self, target: Crs) -> PatchResult<Self> {
        let reprojector = Reprojector::new(self.crs, target)?;
        let countries = self
            .countries
            .iter()
            .map(|country| {
                Ok(Country::new(
                    country.name.clone(),
                    country.iso_a2.clone(),
                    reprojector.reproject_multi_polygon(&country.geometry)?,
                ))
            })
            .collect::<PatchResult<Vec<_>>>()?;
        Ok(Self::new(target, countries))
    }
}

fn country_from_record(
    record: FeatureRecord,
    idx: u64,
    options: &CountryLoadOptions,
) -> std::result::Result<Country, SpatialFormatError> {
    let at_record = |message: String| SpatialFormatError::Parse {
        message,
        position: Some(SourcePosition::record(idx)),
        context: None,
    };

    let name = record
        .string_property(&options.name_property)?
        .ok_or_else(|| at_record(format!("feature has no '{}' property", options.name_property)))?
        .to_string();
    let mut iso_a2 = record
        .string_property(&options.iso_a2_property)?
        .map(str::to_string);
    if name == "Kosovo" && iso_a2.as_deref().is_none_or(|code| code == "-99") {
        iso_a2 = Some("XK".to_string());
    }

    let geometry = match record.geometry {
        Some(Geometry::Polygon(polygon)) => MultiPolygon::new(vec![polygon]),
        Some(Geometry::MultiPolygon(multi)) => multi,
        Some(_) => return Err(at_record(format!("geometry of '{name}' is not polygonal"))),
        None => return Err(at_record(format!("feature '{name}' has no geometry"))),
    };

    Ok(Country::new(name, iso_a2, geometry))
}

/// Assigns the country whose boundary overlaps the patch the most.
///
/// Overlap is measured as planar area in the common CRS. Ties keep the country
/// that comes first in the reference set. A patch that overlaps no country is
/// [`CountryLabel::Unknown`].
///
/// # Errors
///
/// Returns [`PatchError::CrsMismatch`] if the patch and the reference set are
/// in different coordinate systems.
pub fn assign_country(
    geometry: &PatchGeometry,
    countries: &CountryReferenceSet,
) -> PatchResult<CountryLabel> {
    if geometry.crs() != countries.crs() {
        return Err(PatchError::CrsMismatch {
            expected: countries.crs(),
            found: geometry.crs(),
        });
    }

    let patch = MultiPolygon::new(vec![geometry.polygon().clone()]);
    let patch_bounds = geometry.bounds();

    let mut best: Option<(&Country, f64)> = None;
    for country in countries.countries() {
        let area = country.overlap_area(&patch, patch_bounds);
        if area > best.map_or(0.0, |(_, best_area)| best_area) {
            best = Some((country, area));
        }
    }

    Ok(match best {
        Some((country, _)) => CountryLabel::Known(country.name.clone()),
        None => CountryLabel::Unknown,
    })
}

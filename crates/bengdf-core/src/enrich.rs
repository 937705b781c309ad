//! Metadata Enricher: turns a loaded patch into a table row.

use std::collections::BTreeSet;

use bengdf_core_common::{
    CountryLabel, Crs, DerivedColumn, DerivedValue, Patch, PatchGeometry, PatchResult, Row,
    Season,
};

use crate::country::{CountryReferenceSet, assign_country};
use crate::geometry::build_geometry;
use crate::labels::to_nineteen_class;
use crate::quality::QualityLists;
use crate::reproject::reproject;
use crate::split::SplitLists;

/// Read-only inputs shared by every enrichment call of a build.
#[derive(Debug, Clone)]
pub struct EnrichContext {
    countries: CountryReferenceSet,
    quality_lists: QualityLists,
    split_lists: SplitLists,
    target_crs: Crs,
}

impl EnrichContext {
    /// Context producing rows in `target_crs`, assigning against `countries`.
    #[must_use]
    pub fn new(countries: CountryReferenceSet, target_crs: Crs) -> Self {
        Self {
            countries,
            quality_lists: QualityLists::empty(),
            split_lists: SplitLists::empty(),
            target_crs,
        }
    }

    /// Set the quality lists consulted when recomputing flags
    #[must_use]
    pub fn with_quality_lists(mut self, lists: QualityLists) -> Self {
        self.quality_lists = lists;
        self
    }

    /// Set the original split lists
    #[must_use]
    pub fn with_split_lists(mut self, lists: SplitLists) -> Self {
        self.split_lists = lists;
        self
    }

    /// Country boundaries used for assignment.
    #[must_use]
    pub fn countries(&self) -> &CountryReferenceSet {
        &self.countries
    }

    /// Quality lists used when recomputing flags.
    #[must_use]
    pub fn quality_lists(&self) -> &QualityLists {
        &self.quality_lists
    }

    /// Lists of the original train/validation/test split.
    #[must_use]
    pub fn split_lists(&self) -> &SplitLists {
        &self.split_lists
    }

    /// CRS of the produced row geometries.
    #[must_use]
    pub fn target_crs(&self) -> Crs {
        self.target_crs
    }

    /// Assigns a country to a geometry given in any CRS.
    fn country_of(&self, geometry: &PatchGeometry) -> PatchResult<CountryLabel> {
        if geometry.crs() == self.countries.crs() {
            assign_country(geometry, &self.countries)
        } else {
            assign_country(&reproject(geometry, self.countries.crs())?, &self.countries)
        }
    }
}

/// Builds the enriched row of a patch.
///
/// The footprint is built in the patch's native CRS, reprojected into the
/// context's target CRS for the table, and separately into the CRS of the
/// country boundaries for assignment. The patch is not modified.
///
/// # Errors
///
/// Returns [`bengdf_core_common::PatchError::InvalidGeometry`] for malformed
/// corners and [`bengdf_core_common::PatchError::UnsupportedProjection`] if a
/// transformation fails.
pub fn enrich(patch: &Patch, ctx: &EnrichContext) -> PatchResult<Row> {
    let native = build_geometry(&patch.corners, patch.crs)?;
    let geometry = reproject(&native, ctx.target_crs)?;
    let country = ctx.country_of(&native)?;

    Ok(Row {
        name: patch.name.clone(),
        sensor: patch.sensor,
        geometry: Some(geometry),
        source_crs: Some(patch.crs),
        acquisition: Some(patch.acquisition),
        labels: patch.labels.clone(),
        corresponding_s2_patch: patch.corresponding_s2_patch.clone(),
        season: Some(Season::of(&patch.acquisition)),
        country: Some(country),
        quality: Some(patch.quality),
        original_split: Some(ctx.split_lists.split_of(patch.s2_name())),
        new_labels: Some(to_nineteen_class(&patch.labels)),
        error: None,
    })
}

/// Computes the requested derived values of a freshly loaded patch.
///
/// # Errors
///
/// Fails like [`enrich`] when the country column is requested.
pub fn derive_from_patch(
    patch: &Patch,
    columns: &BTreeSet<DerivedColumn>,
    ctx: &EnrichContext,
) -> PatchResult<Vec<DerivedValue>> {
    columns
        .iter()
        .map(|column| match column {
            DerivedColumn::Season => Ok(DerivedValue::Season(Season::of(&patch.acquisition))),
            DerivedColumn::Country => {
                let native = build_geometry(&patch.corners, patch.crs)?;
                Ok(DerivedValue::Country(ctx.country_of(&native)?))
            },
            DerivedColumn::Quality => Ok(DerivedValue::Quality(patch.quality)),
            DerivedColumn::OriginalSplit => Ok(DerivedValue::OriginalSplit(
                ctx.split_lists.split_of(patch.s2_name()),
            )),
            DerivedColumn::NewLabels => Ok(DerivedValue::NewLabels(to_nineteen_class(
                &patch.labels,
            ))),
        })
        .collect()
}

/// Recomputes the requested derived values from a row's own attributes.
///
/// A value whose input is missing from the row (no timestamp, no geometry) is
/// left out, and rows carrying an error marker get no quality, split or label
/// values. Quality flags are the row's flags combined with the context's
/// quality lists.
///
/// # Errors
///
/// Returns [`bengdf_core_common::PatchError::UnsupportedProjection`] if the
/// row geometry cannot be brought into the country CRS.
pub fn derive_from_row(
    row: &Row,
    columns: &BTreeSet<DerivedColumn>,
    ctx: &EnrichContext,
) -> PatchResult<Vec<DerivedValue>> {
    let mut values = Vec::with_capacity(columns.len());
    for column in columns {
        match column {
            DerivedColumn::Season => {
                if let Some(acquisition) = &row.acquisition {
                    values.push(DerivedValue::Season(Season::of(acquisition)));
                }
            },
            DerivedColumn::Country => {
                if let Some(geometry) = &row.geometry {
                    values.push(DerivedValue::Country(ctx.country_of(geometry)?));
                }
            },
            DerivedColumn::Quality => {
                if !row.is_failed() {
                    let listed = ctx.quality_lists.flags_for(row.s2_name());
                    let flags = row.quality.unwrap_or_default().union(listed);
                    values.push(DerivedValue::Quality(flags));
                }
            },
            DerivedColumn::OriginalSplit => {
                if !row.is_failed() {
                    let split = ctx.split_lists.split_of(row.s2_name());
                    values.push(DerivedValue::OriginalSplit(split));
                }
            },
            DerivedColumn::NewLabels => {
                if !row.is_failed() {
                    values.push(DerivedValue::NewLabels(to_nineteen_class(&row.labels)));
                }
            },
        }
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use bengdf_core_common::{CornerCoordinates, OriginalSplit, PatchError, QualityFlags, Sensor};
    use chrono::NaiveDate;
    use geo::{MultiPolygon, polygon};
    use std::path::PathBuf;

    use crate::country::Country;

    fn laea_countries() -> CountryReferenceSet {
        CountryReferenceSet::new(
            Crs::ETRS89_LAEA,
            vec![Country::new(
                "Portugal",
                Some("PT".to_string()),
                MultiPolygon::new(vec![polygon![
                    (x: 2_600_000.0, y: 1_700_000.0),
                    (x: 2_900_000.0, y: 1_700_000.0),
                    (x: 2_900_000.0, y: 2_300_000.0),
                    (x: 2_600_000.0, y: 2_300_000.0),
                ]]),
            )],
        )
    }

    fn patch(ulx: f64, uly: f64, month: u32) -> Patch {
        Patch {
            name: "S2B_MSIL2A_20180525T112119_29_76".to_string(),
            path: PathBuf::from("S2B_MSIL2A_20180525T112119_29_76"),
            sensor: Sensor::S2,
            corners: CornerCoordinates::new(ulx, uly, ulx + 1200.0, uly - 1200.0),
            crs: Crs::ETRS89_LAEA,
            acquisition: NaiveDate::from_ymd_opt(2018, month, 25)
                .unwrap()
                .and_hms_opt(11, 21, 19)
                .unwrap(),
            labels: vec!["Coniferous forest".to_string()],
            corresponding_s2_patch: None,
            quality: QualityFlags {
                snow: true,
                ..QualityFlags::clear()
            },
        }
    }

    #[test]
    fn test_enrich_fills_every_column() {
        let ctx = EnrichContext::new(laea_countries(), Crs::ETRS89_LAEA);
        let patch = patch(2_700_000.0, 2_000_000.0, 5);
        let row = enrich(&patch, &ctx).unwrap();

        assert_eq!(row.name, patch.name);
        assert_eq!(row.season, Some(Season::Spring));
        assert_eq!(row.country, Some(CountryLabel::Known("Portugal".to_string())));
        assert_eq!(row.quality, Some(patch.quality));
        assert_eq!(row.source_crs, Some(Crs::ETRS89_LAEA));
        assert_eq!(row.formatted_acquisition().as_deref(), Some("2018-05-25 11:21:19"));
        assert_relative_eq!(row.geometry.as_ref().unwrap().area(), 1_440_000.0);
        assert_eq!(row.original_split, Some(OriginalSplit::Unassigned));
        assert_eq!(row.new_labels, Some(vec!["Coniferous forest".to_string()]));
        assert!(!row.is_failed());
    }

    #[test]
    fn test_enrich_looks_up_split_by_s2_name() {
        let splits = SplitLists::new(
            Vec::new(),
            Vec::new(),
            ["S2A_MSIL2A_20180525T112119_29_76".to_string()],
        );
        let ctx = EnrichContext::new(laea_countries(), Crs::ETRS89_LAEA).with_split_lists(splits);
        let mut s1 = patch(2_700_000.0, 2_000_000.0, 5);
        s1.name = "S1B_IW_GRDH_1SDV_20180525T182452_29SND_76_11".to_string();
        s1.sensor = Sensor::S1;
        s1.corresponding_s2_patch = Some("S2A_MSIL2A_20180525T112119_29_76".to_string());
        s1.labels = vec!["Airports".to_string()];

        let row = enrich(&s1, &ctx).unwrap();
        assert_eq!(row.original_split, Some(OriginalSplit::Test));
        assert_eq!(row.new_labels, Some(Vec::new()));
    }

    #[test]
    fn test_enrich_outside_every_country() {
        let ctx = EnrichContext::new(laea_countries(), Crs::ETRS89_LAEA);
        let row = enrich(&patch(100_000.0, 100_000.0, 12), &ctx).unwrap();
        assert_eq!(row.country, Some(CountryLabel::Unknown));
        assert_eq!(row.season, Some(Season::Winter));
    }

    #[test]
    fn test_enrich_reprojects_into_target() {
        let ctx = EnrichContext::new(laea_countries(), Crs::WGS84);
        let row = enrich(&patch(2_700_000.0, 2_000_000.0, 7), &ctx).unwrap();
        let geometry = row.geometry.unwrap();
        assert_eq!(geometry.crs(), Crs::WGS84);
        // still assigned in the country CRS
        assert_eq!(row.country, Some(CountryLabel::Known("Portugal".to_string())));
        let bounds = geometry.bounds().unwrap();
        assert!(bounds.min().x < 0.0 && bounds.min().y > 35.0);
    }

    #[test]
    fn test_enrich_rejects_bad_corners() {
        let ctx = EnrichContext::new(laea_countries(), Crs::ETRS89_LAEA);
        let mut bad = patch(2_700_000.0, 2_000_000.0, 7);
        bad.corners = CornerCoordinates::new(10.0, 0.0, 0.0, 10.0);
        let err = enrich(&bad, &ctx).unwrap_err();
        assert!(matches!(err, PatchError::InvalidGeometry { .. }));
    }

    #[test]
    fn test_derive_from_row_skips_missing_inputs() {
        let lists = QualityLists::new(
            Vec::new(),
            ["S2B_MSIL2A_20180525T112119_29_76".to_string()],
        );
        let ctx = EnrichContext::new(laea_countries(), Crs::ETRS89_LAEA).with_quality_lists(lists);
        let mut row = enrich(&patch(2_700_000.0, 2_000_000.0, 10), &ctx).unwrap();
        row.geometry = None;

        let columns = BTreeSet::from(DerivedColumn::ALL);
        let values = derive_from_row(&row, &columns, &ctx).unwrap();
        assert_eq!(
            values,
            vec![
                DerivedValue::Season(Season::Fall),
                DerivedValue::Quality(QualityFlags {
                    cloud: true,
                    shadow: true,
                    snow: true
                }),
                DerivedValue::OriginalSplit(OriginalSplit::Unassigned),
                DerivedValue::NewLabels(vec!["Coniferous forest".to_string()]),
            ]
        );

        let failed = Row::failed(
            row.name.clone(),
            Sensor::S2,
            &PatchError::MissingMetadata {
                patch: row.name.clone(),
                field: "labels".to_string(),
            },
        );
        assert!(derive_from_row(&failed, &columns, &ctx).unwrap().is_empty());
    }

    #[test]
    fn test_derive_from_patch_matches_enrich() {
        let ctx = EnrichContext::new(laea_countries(), Crs::ETRS89_LAEA);
        let patch = patch(2_700_000.0, 2_000_000.0, 8);
        let row = enrich(&patch, &ctx).unwrap();
        let values =
            derive_from_patch(&patch, &BTreeSet::from([DerivedColumn::Country]), &ctx).unwrap();
        assert_eq!(values, vec![DerivedValue::Country(row.country.unwrap())]);
    }
}

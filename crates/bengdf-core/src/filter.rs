//! Quality Filter: drops rows flagged as discouraged.

use std::collections::BTreeSet;
use std::fmt;

use bengdf_core_common::{CountryLabel, PatchGeometry, Row, Table};

use crate::labels::has_nineteen_class_labels;

/// Names of the BigEarthNet countries, matching the Natural Earth `NAME` values.
pub const BEN_COUNTRY_NAMES: [&str; 10] = [
    "Austria",
    "Belgium",
    "Finland",
    "Ireland",
    "Kosovo",
    "Lithuania",
    "Luxembourg",
    "Portugal",
    "Serbia",
    "Switzerland",
];

/// Why a row is discouraged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discouraged {
    /// Missing or degenerate footprint
    BadGeometry,
    /// Error marker or missing timestamp
    MissingMetadata,
    /// No label has a counterpart in the 19-class nomenclature
    NoTargetLabels,
    /// Country outside the allow-list
    Country(String),
    /// Cloud flag set
    Cloud,
    /// Shadow flag set
    Shadow,
    /// Seasonal snow flag set
    Snow,
}

impl fmt::Display for Discouraged {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Discouraged::BadGeometry => f.write_str("bad geometry"),
            Discouraged::MissingMetadata => f.write_str("missing metadata"),
            Discouraged::NoTargetLabels => f.write_str("no 19-class labels"),
            Discouraged::Country(name) => write!(f, "country '{name}' not allowed"),
            Discouraged::Cloud => f.write_str("cloud"),
            Discouraged::Shadow => f.write_str("shadow"),
            Discouraged::Snow => f.write_str("seasonal snow"),
        }
    }
}

/// The predicate set deciding which rows are removed.
///
/// An [`CountryLabel::Unknown`] country is never discouraged by the
/// allow-list; a row without a country column value is not either.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityFilter {
    /// Country names that are kept; `None` allows every country
    pub allowed_countries: Option<BTreeSet<String>>,
    /// Remove rows with the cloud flag
    pub discourage_cloud: bool,
    /// Remove rows with the shadow flag
    pub discourage_shadow: bool,
    /// Remove rows with the snow flag
    pub discourage_snow: bool,
    /// Remove rows whose labels all lack a 19-class counterpart
    pub require_labels: bool,
}

impl Default for QualityFilter {
    fn default() -> Self {
        Self {
            allowed_countries: Some(BEN_COUNTRY_NAMES.iter().map(ToString::to_string).collect()),
            discourage_cloud: true,
            discourage_shadow: true,
            discourage_snow: true,
            require_labels: true,
        }
    }
}

impl QualityFilter {
    /// Set the allowed country names; `None` disables the country predicate
    #[must_use]
    pub fn with_allowed_countries<S: Into<String>>(
        mut self,
        countries: Option<impl IntoIterator<Item = S>>,
    ) -> Self {
        self.allowed_countries = countries.map(|names| names.into_iter().map(Into::into).collect());
        self
    }

    /// Set whether cloudy rows are removed
    #[must_use]
    pub fn with_discourage_cloud(mut self, discourage: bool) -> Self {
        self.discourage_cloud = discourage;
        self
    }

    /// Set whether rows with cloud shadow are removed
    #[must_use]
    pub fn with_discourage_shadow(mut self, discourage: bool) -> Self {
        self.discourage_shadow = discourage;
        self
    }

    /// Set whether rows with seasonal snow are removed
    #[must_use]
    pub fn with_discourage_snow(mut self, discourage: bool) -> Self {
        self.discourage_snow = discourage;
        self
    }

    /// Set whether rows need at least one 19-class label
    #[must_use]
    pub fn with_require_labels(mut self, require: bool) -> Self {
        self.require_labels = require;
        self
    }

    /// Every predicate that fires for `row`, in a fixed order.
    #[must_use]
    pub fn reasons(&self, row: &Row) -> Vec<Discouraged> {
        let mut reasons = Vec::new();

        if row
            .geometry
            .as_ref()
            .is_none_or(PatchGeometry::is_degenerate)
        {
            reasons.push(Discouraged::BadGeometry);
        }
        if row.is_failed() || row.acquisition.is_none() {
            reasons.push(Discouraged::MissingMetadata);
        } else if self.require_labels && !has_nineteen_class_labels(&row.labels) {
            reasons.push(Discouraged::NoTargetLabels);
        }
        if let (Some(allowed), Some(CountryLabel::Known(name))) =
            (&self.allowed_countries, &row.country)
            && !allowed.contains(name)
        {
            reasons.push(Discouraged::Country(name.clone()));
        }
        if let Some(flags) = row.quality {
            if self.discourage_cloud && flags.cloud {
                reasons.push(Discouraged::Cloud);
            }
            if self.discourage_shadow && flags.shadow {
                reasons.push(Discouraged::Shadow);
            }
            if self.discourage_snow && flags.snow {
                reasons.push(Discouraged::Snow);
            }
        }
        reasons
    }

    /// Returns `true` if no predicate fires for `row`.
    #[must_use]
    pub fn keeps(&self, row: &Row) -> bool {
        self.reasons(row).is_empty()
    }

    /// A new table holding the rows no predicate fires for, in their order.
    #[must_use]
    pub fn apply(&self, table: &Table) -> Table {
        let kept = table.filtered(|row| {
            let reasons = self.reasons(row);
            if !reasons.is_empty() {
                log::trace!(
                    "Discouraging {}: {}",
                    row.name,
                    reasons
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(", ")
                );
            }
            reasons.is_empty()
        });
        log::info!(
            "Quality filter kept {} of {} rows",
            kept.len(),
            table.len()
        );
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bengdf_core_common::{
        CornerCoordinates, Crs, DerivedColumn, PatchError, QualityFlags, Sensor,
    };
    use chrono::NaiveDate;
    use geo::{LineString, Polygon};

    use crate::geometry::build_geometry;

    fn clean_row(name: &str) -> Row {
        let key = PatchError::UnknownPatchKey {
            key: String::new(),
        };
        let mut row = Row::failed(name, Sensor::S2, &key);
        row.error = None;
        let corners = CornerCoordinates::new(0.0, 1200.0, 1200.0, 0.0);
        row.geometry = Some(build_geometry(&corners, Crs::ETRS89_LAEA).unwrap());
        row.acquisition =
            NaiveDate::from_ymd_opt(2017, 6, 13).and_then(|d| d.and_hms_opt(10, 10, 31));
        row.labels = vec!["Pastures".to_string()];
        row.country = Some(CountryLabel::Known("Austria".to_string()));
        row.quality = Some(QualityFlags::clear());
        row
    }

    fn table(rows: Vec<Row>) -> Table {
        Table::from_rows(Crs::ETRS89_LAEA, DerivedColumn::ALL, rows).unwrap()
    }

    #[test]
    fn test_clean_row_is_kept() {
        assert!(QualityFilter::default().keeps(&clean_row("a")));
    }

    #[test]
    fn test_each_predicate() {
        let filter = QualityFilter::default();

        let mut cloudy = clean_row("cloudy");
        cloudy.quality = Some(QualityFlags { cloud: true, ..QualityFlags::clear() });
        assert_eq!(filter.reasons(&cloudy), vec![Discouraged::Cloud]);

        let mut french = clean_row("french");
        french.country = Some(CountryLabel::Known("France".to_string()));
        assert_eq!(
            filter.reasons(&french),
            vec![Discouraged::Country("France".to_string())]
        );

        let mut offshore = clean_row("offshore");
        offshore.country = Some(CountryLabel::Unknown);
        assert!(filter.keeps(&offshore));

        let mut unlabeled = clean_row("unlabeled");
        unlabeled.labels.clear();
        assert_eq!(filter.reasons(&unlabeled), vec![Discouraged::NoTargetLabels]);
        assert!(filter.clone().with_require_labels(false).keeps(&unlabeled));

        let mut flat = clean_row("flat");
        flat.geometry = Some(PatchGeometry::new(
            Polygon::new(LineString::new(vec![]), vec![]),
            Crs::ETRS89_LAEA,
        ));
        assert_eq!(filter.reasons(&flat), vec![Discouraged::BadGeometry]);

        let failed = Row::failed(
            "failed",
            Sensor::S2,
            &PatchError::InvalidGeometry {
                reason: "swapped corners".to_string(),
            },
        );
        assert_eq!(
            filter.reasons(&failed),
            vec![Discouraged::BadGeometry, Discouraged::MissingMetadata]
        );
    }

    #[test]
    fn test_rows_without_nineteen_class_labels_are_removed() {
        let mut harbour = clean_row("harbour");
        harbour.labels = vec!["Port areas".to_string(), "Intertidal flats".to_string()];
        let mut mixed = clean_row("mixed");
        mixed.labels = vec!["Port areas".to_string(), "Sea and ocean".to_string()];
        let table = table(vec![harbour.clone(), mixed]);

        let filter = QualityFilter::default();
        assert_eq!(filter.reasons(&harbour), vec![Discouraged::NoTargetLabels]);
        let kept = filter.apply(&table);
        let names: Vec<_> = kept.iter().map(|row| row.name.as_str()).collect();
        assert_eq!(names, vec!["mixed"]);
        assert_eq!(filter.with_require_labels(false).apply(&table).len(), 2);
    }

    #[test]
    fn test_disabled_predicates() {
        let mut row = clean_row("snowy");
        row.quality = Some(QualityFlags { snow: true, ..QualityFlags::clear() });
        row.country = Some(CountryLabel::Known("France".to_string()));

        let filter = QualityFilter::default()
            .with_discourage_snow(false)
            .with_allowed_countries(None::<Vec<String>>);
        assert!(filter.keeps(&row));
    }

    #[test]
    fn test_apply_keeps_order_and_is_idempotent() {
        let mut cloudy = clean_row("b");
        cloudy.quality = Some(QualityFlags { shadow: true, ..QualityFlags::clear() });
        let table = table(vec![clean_row("c"), cloudy, clean_row("a")]);

        let filter = QualityFilter::default();
        let once = filter.apply(&table);
        let names: Vec<_> = once.iter().map(|row| row.name.as_str()).collect();
        assert_eq!(names, vec!["c", "a"]);
        assert_eq!(filter.apply(&once), once);
        // the input is untouched
        assert_eq!(table.len(), 3);
    }
}

//! Assembled output records and their derived attributes.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDateTime};

use crate::crs::Crs;
use crate::error::PatchError;
use crate::geometry::PatchGeometry;
use crate::patch::{QualityFlags, Sensor};

/// Meteorological season of an acquisition, northern-hemisphere convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Season {
    /// December, January, February
    Winter,
    /// March, April, May
    Spring,
    /// June, July, August
    Summer,
    /// September, October, November
    Fall,
}

impl Season {
    /// All seasons, in calendar order starting with winter.
    pub const ALL: [Season; 4] = [Season::Winter, Season::Spring, Season::Summer, Season::Fall];

    /// Maps a month (1-12) to its season; `None` for anything else.
    ///
    /// The mapping ignores the hemisphere the patch lies in.
    #[must_use]
    pub fn from_month(month: u32) -> Option<Self> {
        if !(1..=12).contains(&month) {
            return None;
        }
        Some(Self::ALL[(month % 12 / 3) as usize])
    }

    /// Season of a timestamp.
    #[must_use]
    pub fn of(timestamp: &NaiveDateTime) -> Self {
        Self::ALL[(timestamp.month() % 12 / 3) as usize]
    }

    /// Returns the string representation of this season.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Season::Winter => "Winter",
            Season::Spring => "Spring",
            Season::Summer => "Summer",
            Season::Fall => "Fall",
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Season {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|season| season.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown season '{s}'"))
    }
}

/// Result of assigning a patch to a country.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CountryLabel {
    /// Name of the country with the largest overlap
    Known(String),
    /// No reference polygon overlaps the patch
    Unknown,
}

impl CountryLabel {
    /// Text used for [`CountryLabel::Unknown`] in reports and displays.
    pub const UNKNOWN: &'static str = "unknown";

    /// The country name, `None` when unknown.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            CountryLabel::Known(name) => Some(name),
            CountryLabel::Unknown => None,
        }
    }

    /// Returns `true` for [`CountryLabel::Unknown`].
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        matches!(self, CountryLabel::Unknown)
    }
}

impl fmt::Display for CountryLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CountryLabel::Known(name) => f.write_str(name),
            CountryLabel::Unknown => f.write_str(Self::UNKNOWN),
        }
    }
}

/// Split of the archive's original train/validation/test partition a patch belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OriginalSplit {
    /// Listed in the training split
    Train,
    /// Listed in the validation split
    Validation,
    /// Listed in the test split
    Test,
    /// Listed in none of the splits
    Unassigned,
}

impl OriginalSplit {
    /// The persisted split name, `None` when unassigned.
    #[must_use]
    pub fn name(&self) -> Option<&'static str> {
        match self {
            OriginalSplit::Train => Some("train"),
            OriginalSplit::Validation => Some("validation"),
            OriginalSplit::Test => Some("test"),
            OriginalSplit::Unassigned => None,
        }
    }
}

impl fmt::Display for OriginalSplit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name().unwrap_or("unassigned"))
    }
}

impl FromStr for OriginalSplit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "train" => Ok(OriginalSplit::Train),
            "validation" | "val" => Ok(OriginalSplit::Validation),
            "test" => Ok(OriginalSplit::Test),
            _ => Err(format!("unknown split '{s}'")),
        }
    }
}

/// Columns computed by enrichment that a table may or may not hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DerivedColumn {
    /// `season`
    Season,
    /// `country`
    Country,
    /// `cloud`, `shadow` and `snow`
    Quality,
    /// `original_split`
    OriginalSplit,
    /// `new_labels`, the 19-class nomenclature
    NewLabels,
}

impl DerivedColumn {
    /// Every derived column.
    pub const ALL: [DerivedColumn; 5] = [
        DerivedColumn::Season,
        DerivedColumn::Country,
        DerivedColumn::Quality,
        DerivedColumn::OriginalSplit,
        DerivedColumn::NewLabels,
    ];

    /// Returns the string representation of this column.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DerivedColumn::Season => "season",
            DerivedColumn::Country => "country",
            DerivedColumn::Quality => "quality",
            DerivedColumn::OriginalSplit => "original_split",
            DerivedColumn::NewLabels => "new_labels",
        }
    }
}

impl fmt::Display for DerivedColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DerivedColumn {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|column| column.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                let known: Vec<_> = Self::ALL.iter().map(DerivedColumn::as_str).collect();
                format!("unknown derived column '{s}', expected one of: {}", known.join(", "))
            })
    }
}

/// A single computed value of a derived column.
#[derive(Debug, Clone, PartialEq)]
pub enum DerivedValue {
    /// Value of the `season` column
    Season(Season),
    /// Value of the `country` column
    Country(CountryLabel),
    /// Values of the quality flag columns
    Quality(QualityFlags),
    /// Value of the `original_split` column
    OriginalSplit(OriginalSplit),
    /// Value of the `new_labels` column; empty when no label has a counterpart
    NewLabels(Vec<String>),
}

impl DerivedValue {
    /// The column this value belongs to.
    #[must_use]
    pub fn column(&self) -> DerivedColumn {
        match self {
            DerivedValue::Season(_) => DerivedColumn::Season,
            DerivedValue::Country(_) => DerivedColumn::Country,
            DerivedValue::Quality(_) => DerivedColumn::Quality,
            DerivedValue::OriginalSplit(_) => DerivedColumn::OriginalSplit,
            DerivedValue::NewLabels(_) => DerivedColumn::NewLabels,
        }
    }
}

/// One output record: a patch, its geometry and its derived attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Patch name, the table key
    pub name: String,
    /// Sensor of the patch
    pub sensor: Sensor,
    /// Footprint in the table CRS; `None` when it could not be computed
    pub geometry: Option<PatchGeometry>,
    /// Native CRS of the patch
    pub source_crs: Option<Crs>,
    /// Acquisition timestamp
    pub acquisition: Option<NaiveDateTime>,
    /// Land-cover labels
    pub labels: Vec<String>,
    /// Matching S2 patch of an S1 patch
    pub corresponding_s2_patch: Option<String>,
    /// Derived `season` value
    pub season: Option<Season>,
    /// Derived `country` value
    pub country: Option<CountryLabel>,
    /// Quality flags
    pub quality: Option<QualityFlags>,
    /// Derived `original_split` value
    pub original_split: Option<OriginalSplit>,
    /// Derived 19-class labels
    pub new_labels: Option<Vec<String>>,
    /// Error marker of a patch that could not be processed
    pub error: Option<String>,
}

impl Row {
    /// A row recording that `name` failed to process.
    ///
    /// Only the key, the sensor and the error marker are set.
    #[must_use]
    pub fn failed(name: impl Into<String>, sensor: Sensor, error: &PatchError) -> Self {
        Self {
            name: name.into(),
            sensor,
            geometry: None,
            source_crs: None,
            acquisition: None,
            labels: Vec::new(),
            corresponding_s2_patch: None,
            season: None,
            country: None,
            quality: None,
            original_split: None,
            new_labels: None,
            error: Some(format!("{}: {error}", error.kind())),
        }
    }

    /// Returns `true` when the row carries an error marker.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    /// The name quality lists are keyed by.
    #[must_use]
    pub fn s2_name(&self) -> &str {
        self.corresponding_s2_patch.as_deref().unwrap_or(&self.name)
    }

    /// Acquisition timestamp in the sensor-specific output layout.
    #[must_use]
    pub fn formatted_acquisition(&self) -> Option<String> {
        self.acquisition
            .map(|ts| ts.format(self.sensor.timestamp_format()).to_string())
    }

    /// Reads the current value of a derived column.
    #[must_use]
    pub fn derived(&self, column: DerivedColumn) -> Option<DerivedValue> {
        match column {
            DerivedColumn::Season => self.season.map(DerivedValue::Season),
            DerivedColumn::Country => self.country.clone().map(DerivedValue::Country),
            DerivedColumn::Quality => self.quality.map(DerivedValue::Quality),
            DerivedColumn::OriginalSplit => self.original_split.map(DerivedValue::OriginalSplit),
            DerivedColumn::NewLabels => self.new_labels.clone().map(DerivedValue::NewLabels),
        }
    }

    /// Returns a copy with one derived value replaced.
    #[must_use]
    pub fn with_derived(mut self, value: DerivedValue) -> Self {
        match value {
            DerivedValue::Season(season) => self.season = Some(season),
            DerivedValue::Country(country) => self.country = Some(country),
            DerivedValue::Quality(flags) => self.quality = Some(flags),
            DerivedValue::OriginalSplit(split) => self.original_split = Some(split),
            DerivedValue::NewLabels(labels) => self.new_labels = Some(labels),
        }
        self
    }
}

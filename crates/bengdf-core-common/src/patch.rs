//! Patches as discovered in the archive, before enrichment.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::NaiveDateTime;
use geo::Coord;

use crate::crs::Crs;

/// The sensor a patch was acquired with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sensor {
    /// Sentinel-1 radar
    S1,
    /// Sentinel-2 optical
    S2,
}

impl Sensor {
    /// Returns the string representation of this sensor.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Sensor::S1 => "S1",
            Sensor::S2 => "S2",
        }
    }

    /// Directory name prefixes of the sensor's missions.
    #[must_use]
    pub fn mission_prefixes(&self) -> &'static [&'static str] {
        match self {
            Sensor::S1 => &["S1A_", "S1B_"],
            Sensor::S2 => &["S2A_", "S2B_"],
        }
    }

    /// Timestamp layout used when formatting acquisition times of this sensor.
    #[must_use]
    pub fn timestamp_format(&self) -> &'static str {
        match self {
            Sensor::S1 => "%Y-%m-%dT%H:%M:%S",
            Sensor::S2 => "%Y-%m-%d %H:%M:%S",
        }
    }
}

impl fmt::Display for Sensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sensor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "S1" => Ok(Sensor::S1),
            "S2" => Ok(Sensor::S2),
            other => Err(format!("unknown sensor '{other}', expected S1 or S2")),
        }
    }
}

/// Cloud, shadow and snow flags of a patch.
///
/// The flags describe the optical (S2) acquisition. S1 patches inherit them
/// from their corresponding S2 patch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct QualityFlags {
    /// Patch is covered by clouds
    pub cloud: bool,
    /// Patch is covered by cloud shadow
    pub shadow: bool,
    /// Patch is covered by seasonal snow
    pub snow: bool,
}

impl QualityFlags {
    /// Flags with nothing set.
    #[must_use]
    pub fn clear() -> Self {
        Self::default()
    }

    /// Returns `true` if any flag is set.
    #[must_use]
    pub fn any(&self) -> bool {
        self.cloud || self.shadow || self.snow
    }

    /// Flag-wise OR of two flag sets.
    #[must_use]
    pub fn union(self, other: QualityFlags) -> Self {
        Self {
            cloud: self.cloud || other.cloud,
            shadow: self.shadow || other.shadow,
            snow: self.snow || other.snow,
        }
    }
}

/// Upper-left / lower-right corner coordinates in the patch's native CRS.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CornerCoordinates {
    /// Upper-left corner
    pub upper_left: Coord<f64>,
    /// Lower-right corner
    pub lower_right: Coord<f64>,
}

impl CornerCoordinates {
    /// Builds corners from the `ulx`, `uly`, `lrx`, `lry` values of a metadata file.
    #[must_use]
    pub fn new(ulx: f64, uly: f64, lrx: f64, lry: f64) -> Self {
        Self {
            upper_left: Coord { x: ulx, y: uly },
            lower_right: Coord { x: lrx, y: lry },
        }
    }
}

/// One image tile of the archive.
#[derive(Debug, Clone, PartialEq)]
pub struct Patch {
    /// Unique patch name (the directory name)
    pub name: String,
    /// Patch directory
    pub path: PathBuf,
    /// Sensor the patch belongs to
    pub sensor: Sensor,
    /// Corner coordinates in [`Self::crs`]
    pub corners: CornerCoordinates,
    /// Native CRS of the corner coordinates
    pub crs: Crs,
    /// Acquisition timestamp
    pub acquisition: NaiveDateTime,
    /// Land-cover labels, passed through unchanged
    pub labels: Vec<String>,
    /// Name of the matching S2 patch (S1 only)
    pub corresponding_s2_patch: Option<String>,
    /// Raw quality flags
    pub quality: QualityFlags,
}

impl Patch {
    /// The name quality lists are keyed by: the S2 patch name, also for S1 patches.
    #[must_use]
    pub fn s2_name(&self) -> &str {
        self.corresponding_s2_patch.as_deref().unwrap_or(&self.name)
    }

    /// Acquisition timestamp in the sensor-specific output layout.
    #[must_use]
    pub fn formatted_acquisition(&self) -> String {
        self.acquisition
            .format(self.sensor.timestamp_format())
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_patch(sensor: Sensor) -> Patch {
        Patch {
            name: "S1A_IW_GRDH_1SDV_20170613T165043_33UUP_61_39".to_string(),
            path: PathBuf::from("/archive/S1A_IW_GRDH_1SDV_20170613T165043_33UUP_61_39"),
            sensor,
            corners: CornerCoordinates::new(0.0, 10.0, 10.0, 0.0),
            crs: Crs::from_epsg(32633),
            acquisition: NaiveDate::from_ymd_opt(2017, 6, 13)
                .unwrap()
                .and_hms_opt(16, 50, 43)
                .unwrap(),
            labels: vec!["Pastures".to_string()],
            corresponding_s2_patch: Some("S2A_MSIL2A_20170613T101031_0_48".to_string()),
            quality: QualityFlags::clear(),
        }
    }

    #[test]
    fn timestamp_layout_depends_on_sensor() {
        assert_eq!(
            sample_patch(Sensor::S1).formatted_acquisition(),
            "2017-06-13T16:50:43"
        );
        assert_eq!(
            sample_patch(Sensor::S2).formatted_acquisition(),
            "2017-06-13 16:50:43"
        );
    }

    #[test]
    fn s1_patches_are_keyed_by_their_s2_twin() {
        let mut patch = sample_patch(Sensor::S1);
        assert_eq!(patch.s2_name(), "S2A_MSIL2A_20170613T101031_0_48");
        patch.corresponding_s2_patch = None;
        assert_eq!(patch.s2_name(), patch.name);
    }

    #[test]
    fn sensor_parsing() {
        assert_eq!("s2".parse::<Sensor>().unwrap(), Sensor::S2);
        assert_eq!("S1".parse::<Sensor>().unwrap(), Sensor::S1);
        assert!("S3".parse::<Sensor>().is_err());
    }

    #[test]
    fn flag_union() {
        let cloudy = QualityFlags {
            cloud: true,
            ..QualityFlags::clear()
        };
        let snowy = QualityFlags {
            snow: true,
            ..QualityFlags::clear()
        };
        let both = cloudy.union(snowy);
        assert!(both.cloud && both.snow && !both.shadow);
        assert!(!QualityFlags::clear().any());
    }
}

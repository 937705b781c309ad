//! Patch discovery and metadata loading.
//!
//! Every patch of the archive is a directory named after the patch, holding a
//! `<name>_labels_metadata.json` file next to the band images.

use std::path::{Path, PathBuf};

use bengdf_core_common::{
    CornerCoordinates, Crs, Patch, PatchError, PatchResult, QualityFlags, Sensor,
};
use bengdf_shared::SpatialFormatError;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Deserialize;

use crate::error::{IoErrorExt, Result};
use crate::quality::QualityLists;

/// Suffix of a patch's metadata file, following the patch name.
pub const METADATA_SUFFIX: &str = "_labels_metadata.json";

#[derive(Debug, Deserialize)]
struct RawMetadata {
    labels: Option<Vec<String>>,
    coordinates: Option<RawCoordinates>,
    projection: Option<String>,
    acquisition_date: Option<String>,
    acquisition_time: Option<String>,
    corresponding_s2_patch: Option<String>,
    #[serde(default)]
    cloud: bool,
    #[serde(default)]
    shadow: bool,
    #[serde(default)]
    snow: bool,
}

#[derive(Debug, Deserialize)]
struct RawCoordinates {
    ulx: f64,
    uly: f64,
    lrx: f64,
    lry: f64,
}

/// Lists the patch directories directly below `root` that belong to `sensor`.
///
/// Entries are returned in the order the filesystem reports them. Files and
/// directories without a mission prefix of the sensor are skipped. The prefix
/// is matched on the raw name, so names that are not valid UTF-8 past the
/// prefix are still found.
///
/// # Errors
///
/// Returns an I/O error if `root` cannot be listed.
pub fn discover_patch_directories(root: &Path, sensor: Sensor) -> Result<Vec<PathBuf>> {
    let prefixes = sensor.mission_prefixes();
    let mut patches = Vec::new();

    for entry in std::fs::read_dir(root).with_read_context("patch archive", root)? {
        let entry = entry.with_read_context("patch archive", root)?;
        let path = entry.path();
        let name = entry.file_name();
        let name = name.as_encoded_bytes();

        if !prefixes
            .iter()
            .any(|prefix| name.starts_with(prefix.as_bytes()))
        {
            log::debug!("Skipping {}: not an {sensor} patch", path.display());
            continue;
        }
        if !path.is_dir() {
            log::debug!("Skipping {}: not a directory", path.display());
            continue;
        }
        patches.push(path);
    }

    log::info!(
        "Discovered {} {sensor} patches in {}",
        patches.len(),
        root.display()
    );
    Ok(patches)
}

/// Resolves the metadata file of a patch given its directory or the file itself.
#[must_use]
pub fn metadata_path(patch_path: &Path) -> PathBuf {
    if patch_path.is_file() {
        return patch_path.to_path_buf();
    }
    let mut file = patch_path
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    file.push(METADATA_SUFFIX);
    patch_path.join(file)
}

/// Patch name of a patch directory or metadata file.
#[must_use]
pub fn patch_name(patch_path: &Path) -> String {
    let name = patch_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.strip_suffix(METADATA_SUFFIX) {
        Some(stripped) => stripped.to_string(),
        None => name,
    }
}

/// Parses an acquisition timestamp with best effort.
///
/// Accepted layouts: `YYYY-MM-DD hh:mm:ss`, `YYYY-MM-DDThh:mm:ss` (both with
/// optional fractional seconds), RFC 3339 with offset, and a bare date.
#[must_use]
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    for layout in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(value, layout) {
            return Some(ts);
        }
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.naive_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

/// Loads a patch from its directory or metadata file.
///
/// The raw flags of the metadata file are combined with the quality lists,
/// looked up by the S2 patch name.
///
/// # Errors
///
/// Returns [`PatchError::MetadataRead`] if the file cannot be read or is not
/// valid JSON, [`PatchError::MissingMetadata`] if a required field is absent,
/// [`PatchError::MalformedMetadata`] for an unparseable timestamp and
/// [`PatchError::UnsupportedProjection`] for a CRS without an EPSG code.
pub fn load_patch(patch_path: &Path, sensor: Sensor, lists: &QualityLists) -> PatchResult<Patch> {
    let name = patch_name(patch_path);
    let json_path = metadata_path(patch_path);

    let bytes = std::fs::read(&json_path).map_err(|source| PatchError::MetadataRead {
        path: json_path.clone(),
        source: SpatialFormatError::Io {
            source,
            context: Some(format!("metadata of {name}")),
        },
    })?;
    let raw: RawMetadata =
        serde_json::from_slice(&bytes).map_err(|err| PatchError::MetadataRead {
            path: json_path.clone(),
            source: SpatialFormatError::from_json(&err, format!("metadata of {name}")),
        })?;

    let missing = |field: &str| PatchError::MissingMetadata {
        patch: name.clone(),
        field: field.to_string(),
    };

    let coordinates = raw.coordinates.ok_or_else(|| missing("coordinates"))?;
    let projection = raw.projection.ok_or_else(|| missing("projection"))?;
    let labels = raw.labels.ok_or_else(|| missing("labels"))?;
    let (field, timestamp) = match sensor {
        Sensor::S2 => ("acquisition_date", raw.acquisition_date.or(raw.acquisition_time)),
        Sensor::S1 => ("acquisition_time", raw.acquisition_time.or(raw.acquisition_date)),
    };
    let timestamp = timestamp.ok_or_else(|| missing(field))?;
    let corresponding_s2_patch = match sensor {
        Sensor::S1 => Some(
            raw.corresponding_s2_patch
                .ok_or_else(|| missing("corresponding_s2_patch"))?,
        ),
        Sensor::S2 => None,
    };

    let crs = projection.parse::<Crs>()?;
    let acquisition =
        parse_timestamp(&timestamp).ok_or_else(|| PatchError::MalformedMetadata {
            patch: name.clone(),
            field: field.to_string(),
            message: format!("unrecognised timestamp '{timestamp}'"),
        })?;

    let mut patch = Patch {
        name,
        path: patch_path.to_path_buf(),
        sensor,
        corners: CornerCoordinates::new(
            coordinates.ulx,
            coordinates.uly,
            coordinates.lrx,
            coordinates.lry,
        ),
        crs,
        acquisition,
        labels,
        corresponding_s2_patch,
        quality: QualityFlags {
            cloud: raw.cloud,
            shadow: raw.shadow,
            snow: raw.snow,
        },
    };
    patch.quality = patch.quality.union(lists.flags_for(patch.s2_name()));
    Ok(patch)
}

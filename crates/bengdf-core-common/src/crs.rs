//! Explicit coordinate reference system identifiers.
//!
//! Every geometry handled by the builder carries a [`Crs`]. The identifier is an
//! EPSG authority code; the projection maths behind it is resolved by the
//! reprojector in `bengdf-core`.

use std::fmt;
use std::str::FromStr;

use crate::error::PatchError;

/// An EPSG coordinate reference system code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Crs(u16);

impl Crs {
    /// WGS 84 longitude/latitude.
    pub const WGS84: Crs = Crs(4326);
    /// ETRS89 / LAEA Europe, the common CRS of the assembled tables.
    pub const ETRS89_LAEA: Crs = Crs(3035);

    /// Creates a CRS from an EPSG code.
    #[must_use]
    pub const fn from_epsg(code: u16) -> Self {
        Crs(code)
    }

    /// The EPSG code.
    #[must_use]
    pub const fn epsg(&self) -> u16 {
        self.0
    }

    /// The `authority:code` form used in file metadata, e.g. `EPSG:3035`.
    #[must_use]
    pub fn authority_code(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

impl FromStr for Crs {
    type Err = PatchError;

    /// Accepts `EPSG:nnnn` (any case), a bare code, or a WKT string whose
    /// outermost `AUTHORITY["EPSG","nnnn"]` / `ID["EPSG",nnnn]` names the CRS.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let unsupported = |reason: &str| PatchError::UnsupportedProjection {
            crs: abbreviate(trimmed),
            reason: reason.to_string(),
        };

        if trimmed.is_empty() {
            return Err(unsupported("empty CRS definition"));
        }

        let code = if let Some(rest) = strip_prefix_ignore_case(trimmed, "EPSG:") {
            rest.trim()
        } else if trimmed.chars().all(|c| c.is_ascii_digit()) {
            trimmed
        } else if let Some(code) = last_epsg_authority(trimmed) {
            code
        } else {
            return Err(unsupported("no EPSG authority code found"));
        };

        code.parse::<u16>()
            .map(Crs)
            .map_err(|_| unsupported("EPSG code is not a valid number"))
    }
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &value[prefix.len()..])
}

/// Returns the code of the last EPSG authority in a WKT string.
///
/// In WKT1 and WKT2 the authority of the outermost object is written last.
fn last_epsg_authority(wkt: &str) -> Option<&str> {
    const MARKERS: [&str; 2] = ["AUTHORITY[\"EPSG\",", "ID[\"EPSG\","];

    let (start, marker) = MARKERS
        .iter()
        .filter_map(|marker| wkt.rfind(marker).map(|idx| (idx, *marker)))
        .max_by_key(|(idx, _)| *idx)?;

    let rest = wkt[start + marker.len()..].trim_start().trim_start_matches('"');
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    (end > 0).then(|| &rest[..end])
}

fn abbreviate(value: &str) -> String {
    const MAX: usize = 60;
    if value.chars().count() <= MAX {
        value.to_string()
    } else {
        let head: String = value.chars().take(MAX).collect();
        format!("{head}...")
    }
}

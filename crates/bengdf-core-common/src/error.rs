//! Per-patch and per-table errors.
//!
//! These are the failures the assembly pipeline can report for a single patch or
//! for a key-based table operation. Country assignment never fails with "no
//! country"; that outcome is the [`CountryLabel::Unknown`](crate::row::CountryLabel)
//! value.

use std::path::PathBuf;

use bengdf_shared::SpatialFormatError;
use thiserror::Error;

use crate::crs::Crs;

/// Errors raised while turning a patch into a row or while merging rows into a table.
#[derive(Debug, Error)]
pub enum PatchError {
    /// Corner coordinates do not describe a valid upper-left/lower-right rectangle.
    #[error("Invalid geometry: {reason}")]
    InvalidGeometry {
        /// What is wrong with the coordinates
        reason: String,
    },

    /// A CRS could not be resolved by the projection capability.
    #[error("Unsupported projection '{crs}': {reason}")]
    UnsupportedProjection {
        /// The CRS definition as given
        crs: String,
        /// Why it could not be resolved
        reason: String,
    },

    /// A geometry is not in the CRS an operation requires.
    #[error("Geometry is in {found} but {expected} is required")]
    CrsMismatch {
        /// The CRS the operation works in
        expected: Crs,
        /// The CRS of the offending geometry
        found: Crs,
    },

    /// A key-based merge referenced a patch that is not in the base table.
    #[error("Patch '{key}' is not present in the base table")]
    UnknownPatchKey {
        /// The patch name that was looked up
        key: String,
    },

    /// A row with the same patch name is already part of the table.
    #[error("Patch '{key}' appears more than once")]
    DuplicatePatchKey {
        /// The repeated patch name
        key: String,
    },

    /// A required metadata field is absent.
    #[error("Patch '{patch}' is missing required metadata field '{field}'")]
    MissingMetadata {
        /// The patch name
        patch: String,
        /// The missing field
        field: String,
    },

    /// A metadata field is present but cannot be interpreted.
    #[error("Patch '{patch}' has malformed metadata field '{field}': {message}")]
    MalformedMetadata {
        /// The patch name
        patch: String,
        /// The malformed field
        field: String,
        /// Why the value was rejected
        message: String,
    },

    /// The metadata file of a patch could not be read or parsed.
    #[error("Failed to read patch metadata '{path}': {source}")]
    MetadataRead {
        /// The metadata file or patch directory
        path: PathBuf,
        /// The underlying read or parse failure
        #[source]
        source: SpatialFormatError,
    },
}

impl PatchError {
    /// Short, stable name of the error kind, used in reports and error columns.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidGeometry { .. } => "InvalidGeometry",
            Self::UnsupportedProjection { .. } => "UnsupportedProjection",
            Self::CrsMismatch { .. } => "CrsMismatch",
            Self::UnknownPatchKey { .. } => "UnknownPatchKey",
            Self::DuplicatePatchKey { .. } => "DuplicatePatchKey",
            Self::MissingMetadata { .. } => "MissingMetadata",
            Self::MalformedMetadata { .. } => "MalformedMetadata",
            Self::MetadataRead { .. } => "MetadataRead",
        }
    }
}

/// Result type alias for patch-level operations.
pub type PatchResult<T> = std::result::Result<T, PatchError>;

//! Error types for `bengdf` operations.
//!
//! Per-patch failures are [`PatchError`]s from `bengdf-core-common`; this module
//! wraps them together with I/O and configuration failures into the root
//! [`BenGdfError`] returned by the public operations.

use std::path::PathBuf;

use bengdf_core_common::PatchError;
use thiserror::Error;

/// Main error type for `bengdf` operations.
///
/// This is the root error type that encompasses all domain-specific errors.
/// It uses `#[error(transparent)]` to delegate display formatting to the
/// underlying error variants.
#[derive(Debug, Error)]
pub enum BenGdfError {
    /// A patch could not be turned into a row, or a table merge failed
    #[error(transparent)]
    Patch(#[from] PatchError),

    /// I/O errors (file read/write, path issues, permissions)
    #[error(transparent)]
    Io(#[from] IoError),

    /// Configuration errors
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generic errors from dependencies
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// I/O related errors.
///
/// These errors occur while reading patch archives, reference data and
/// persisted tables, or while writing tables and reports.
#[derive(Debug, Error)]
pub enum IoError {
    /// Failed to read from a file
    #[error("Failed to read {format} file '{path}': {source}")]
    Read {
        /// The format being read (e.g., "GeoParquet", "`GeoJSON`")
        format: String,
        /// The file path
        path: PathBuf,
        /// The underlying error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Failed to write to a file
    #[error("Failed to write {format} file '{path}': {source}")]
    Write {
        /// The format being written
        format: String,
        /// The file path
        path: PathBuf,
        /// The underlying error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Path is invalid
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath {
        /// The invalid path
        path: PathBuf,
        /// Why the path is invalid
        reason: String,
    },

    /// File was not found
    #[error("File not found: '{path}'")]
    FileNotFound {
        /// The missing file path
        path: PathBuf,
    },

    /// Permission was denied
    #[error("Permission denied for '{path}'")]
    PermissionDenied {
        /// The path with permission issues
        path: PathBuf,
    },
}

/// Configuration errors.
///
/// These errors occur when options or configuration are invalid.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid option value
    #[error("Invalid {option} option: {message}")]
    InvalidOption {
        /// The option name
        option: String,
        /// Why it's invalid
        message: String,
    },

    /// Required option is missing
    #[error("Missing required option: {option}")]
    MissingRequired {
        /// The missing option name
        option: String,
    },

    /// Options conflict with each other
    #[error("Conflicting options: {options}")]
    ConflictingOptions {
        /// Description of the conflicting options
        options: String,
    },
}

/// Type alias for Results using `BenGdfError`.
pub type Result<T> = std::result::Result<T, BenGdfError>;

impl BenGdfError {
    /// Get a user-friendly error message.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Patch(e) => format!("Patch error: {e}"),
            Self::Io(e) => e.user_message(),
            Self::Config(e) => format!("Configuration error: {e}"),
            Self::Other(e) => format!("Error: {e}"),
        }
    }

    /// Get recovery suggestions if available.
    #[must_use]
    pub fn recovery_suggestion(&self) -> Option<String> {
        match self {
            Self::Patch(e) => patch_recovery_suggestion(e),
            Self::Io(e) => e.recovery_suggestion(),
            Self::Config(_) | Self::Other(_) => None,
        }
    }

    /// Check if this error is potentially recoverable.
    ///
    /// Recoverable errors might be fixed by retrying with different
    /// parameters or after the user takes some action.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::Patch(
                    PatchError::InvalidGeometry { .. }
                        | PatchError::MissingMetadata { .. }
                        | PatchError::MalformedMetadata { .. }
                        | PatchError::MetadataRead { .. }
                )
        )
    }
}

fn patch_recovery_suggestion(error: &PatchError) -> Option<String> {
    match error {
        PatchError::InvalidGeometry { .. }
        | PatchError::MissingMetadata { .. }
        | PatchError::MalformedMetadata { .. }
        | PatchError::MetadataRead { .. } => Some(
            "Rerun with --lenient to record failing patches in the error column instead of aborting."
                .to_string(),
        ),
        PatchError::UnsupportedProjection { .. } => {
            Some("Use an EPSG code known to the projection library (e.g. EPSG:3035).".to_string())
        },
        PatchError::CrsMismatch { .. } => Some(
            "Make sure the country reference set and the table use the same target CRS."
                .to_string(),
        ),
        PatchError::UnknownPatchKey { .. } => Some(
            "Extend only with patches from the archive the table was built from.".to_string(),
        ),
        PatchError::DuplicatePatchKey { .. } => None,
    }
}

impl IoError {
    fn user_message(&self) -> String {
        match self {
            Self::Read { format, path, .. } => {
                format!("Failed to read {} file: {}", format, path.display())
            },
            Self::Write { format, path, .. } => {
                format!("Failed to write {} file: {}", format, path.display())
            },
            Self::FileNotFound { path } => {
                format!("File not found: {}", path.display())
            },
            _ => self.to_string(),
        }
    }

    fn recovery_suggestion(&self) -> Option<String> {
        match self {
            Self::FileNotFound { .. } => {
                Some("Check that the file path is correct and the file exists.".to_string())
            },
            Self::PermissionDenied { .. } => {
                Some("Check file permissions and ensure you have access.".to_string())
            },
            Self::InvalidPath { .. } => {
                Some("Ensure the path is valid and properly formatted.".to_string())
            },
            _ => None,
        }
    }
}

/// Extension trait for adding I/O context to errors.
///
/// This trait provides convenient methods to wrap errors with file and format
/// context, creating more informative error messages.
pub trait IoErrorExt<T> {
    /// Add read context to an error.
    ///
    /// # Errors
    ///
    /// Returns an [`IoError::Read`] if the underlying operation fails.
    fn with_read_context(self, format: &str, path: impl Into<PathBuf>) -> Result<T>;

    /// Add write context to an error.
    ///
    /// # Errors
    ///
    /// Returns an [`IoError::Write`] if the underlying operation fails.
    fn with_write_context(self, format: &str, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T, E> IoErrorExt<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn with_read_context(self, format: &str, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| {
            BenGdfError::Io(IoError::Read {
                format: format.to_string(),
                path: path.into(),
                source: Box::new(e),
            })
        })
    }

    fn with_write_context(self, format: &str, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| {
            BenGdfError::Io(IoError::Write {
                format: format.to_string(),
                path: path.into(),
                source: Box::new(e),
            })
        })
    }
}

/// Checks that `path` exists, mapping the common failures onto [`IoError`].
///
/// # Errors
///
/// Returns [`IoError::FileNotFound`] or [`IoError::PermissionDenied`].
pub fn ensure_exists(path: &std::path::Path) -> Result<()> {
    match std::fs::metadata(path) {
        Ok(_) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(IoError::PermissionDenied {
                path: path.to_path_buf(),
            }
            .into())
        },
        Err(_) => Err(IoError::FileNotFound {
            path: path.to_path_buf(),
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patch_errors_are_transparent() {
        let err: BenGdfError = PatchError::UnknownPatchKey {
            key: "S2A_MSIL2A_20170617T113321_4_55".to_string(),
        }
        .into();
        assert_eq!(
            err.to_string(),
            "Patch 'S2A_MSIL2A_20170617T113321_4_55' is not present in the base table"
        );
        assert!(err.recovery_suggestion().is_some());
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_read_context() {
        let result: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::other("broken pipe"));
        let err = result
            .with_read_context("GeoParquet", "/tmp/raw.parquet")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to read GeoParquet file '/tmp/raw.parquet': broken pipe"
        );
        assert_eq!(
            err.user_message(),
            "Failed to read GeoParquet file: /tmp/raw.parquet"
        );
    }

    #[test]
    fn test_config_errors_are_recoverable() {
        let err: BenGdfError = ConfigError::InvalidOption {
            option: "n_workers".to_string(),
            message: "must be at least 1".to_string(),
        }
        .into();
        assert!(err.is_recoverable());
        assert_eq!(
            err.user_message(),
            "Configuration error: Invalid n_workers option: must be at least 1"
        );
    }

    #[test]
    fn test_ensure_exists() {
        let dir = tempfile::TempDir::new().unwrap();
        assert!(ensure_exists(dir.path()).is_ok());
        let err = ensure_exists(&dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, BenGdfError::Io(IoError::FileNotFound { .. })));
        assert!(err.recovery_suggestion().is_some());
    }
}

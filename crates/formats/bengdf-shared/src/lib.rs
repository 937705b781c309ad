//! Error and position types shared by the `bengdf` format crates.

use std::error::Error as StdError;
use std::fmt;

/// A position within a source file, such as a JSON document or a name list.
///
/// All indices are 1-based where possible to align with human expectations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourcePosition {
    /// Line number in the source (1-based)
    pub line: Option<u64>,
    /// Column number in the source (1-based)
    pub column: Option<u64>,
    /// Logical record number (feature index, CSV row, record batch row)
    pub record: Option<u64>,
}

impl SourcePosition {
    /// Returns true when the position does not contain any location metadata.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.line.is_none() && self.column.is_none() && self.record.is_none()
    }

    /// Position of a record (row, feature) within a source.
    #[must_use]
    pub fn record(record: u64) -> Self {
        Self {
            record: Some(record),
            ..Self::default()
        }
    }

    /// Extracts the line/column reported by a `serde_json` error.
    ///
    /// `serde_json` reports `0` for errors that are not tied to a location
    /// (for example I/O failures); those yield `None`.
    #[must_use]
    pub fn from_json_error(err: &serde_json::Error) -> Option<Self> {
        if err.line() == 0 {
            return None;
        }
        Some(Self {
            line: Some(err.line() as u64),
            column: Some(err.column() as u64),
            record: None,
        })
    }
}

impl fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();

        if let Some(line) = self.line {
            parts.push(format!("line {line}"));
        }
        if let Some(column) = self.column {
            parts.push(format!("column {column}"));
        }
        if let Some(record) = self.record {
            parts.push(format!("record {record}"));
        }

        if parts.is_empty() {
            write!(f, "unknown position")
        } else {
            write!(f, "{}", parts.join(", "))
        }
    }
}

/// Errors that can occur when reading or writing the spatial formats used by the builder.
#[derive(Debug)]
pub enum SpatialFormatError {
    /// An underlying I/O failure occurred.
    Io {
        /// The originating error.
        source: std::io::Error,
        /// Optional context describing what was being read or written.
        context: Option<String>,
    },
    /// Parsing failed for the input source.
    Parse {
        /// Human readable description of the failure.
        message: String,
        /// Optional position describing where the failure occurred.
        position: Option<SourcePosition>,
        /// Optional context describing what was being read.
        context: Option<String>,
    },
    /// The source does not have the columns or types the reader expects.
    Schema {
        /// Human readable description of the failure.
        message: String,
        /// Optional context describing what was being read.
        context: Option<String>,
    },
    /// Encoding a value for output failed.
    Encode {
        /// Human readable description of the failure.
        message: String,
        /// Optional context describing what was being written.
        context: Option<String>,
    },
    /// Other error type not classified above.
    Other {
        /// Human readable description of the failure.
        message: String,
    },
}

impl SpatialFormatError {
    fn fmt_context(context: Option<&str>) -> String {
        context.map(|c| format!(" ({c})")).unwrap_or_default()
    }

    fn fmt_position(position: Option<&SourcePosition>) -> String {
        position.map(|pos| format!(" at {pos}")).unwrap_or_default()
    }

    /// Builds a [`SpatialFormatError::Parse`] from a `serde_json` failure.
    #[must_use]
    pub fn from_json(err: &serde_json::Error, context: impl Into<String>) -> Self {
        SpatialFormatError::Parse {
            message: err.to_string(),
            position: SourcePosition::from_json_error(err),
            context: Some(context.into()),
        }
    }

    /// Attach additional context to the error, returning the updated error.
    #[must_use]
    pub fn with_additional_context(mut self, context: impl Into<String>) -> Self {
        let context = context.into();
        match &mut self {
            SpatialFormatError::Io {
                context: existing, ..
            }
            | SpatialFormatError::Parse {
                context: existing, ..
            }
            | SpatialFormatError::Schema {
                context: existing, ..
            }
            | SpatialFormatError::Encode {
                context: existing, ..
            } => match existing {
                Some(existing) if !existing.is_empty() => {
                    existing.push_str("; ");
                    existing.push_str(&context);
                },
                _ => *existing = Some(context),
            },
            SpatialFormatError::Other { message } => {
                message.push_str(" (");
                message.push_str(&context);
                message.push(')');
            },
        }
        self
    }
}

impl fmt::Display for SpatialFormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpatialFormatError::Io { source, context } => {
                write!(
                    f,
                    "I/O error{}: {source}",
                    Self::fmt_context(context.as_deref())
                )
            },
            SpatialFormatError::Parse {
                message,
                position,
                context,
            } => write!(
                f,
                "Parse error{}{}: {message}",
                Self::fmt_context(context.as_deref()),
                Self::fmt_position(position.as_ref())
            ),
            SpatialFormatError::Schema { message, context } => write!(
                f,
                "Schema error{}: {message}",
                Self::fmt_context(context.as_deref())
            ),
            SpatialFormatError::Encode { message, context } => write!(
                f,
                "Encode error{}: {message}",
                Self::fmt_context(context.as_deref())
            ),
            SpatialFormatError::Other { message } => f.write_str(message),
        }
    }
}

impl StdError for SpatialFormatError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            SpatialFormatError::Io { source, .. } => Some(source),
            SpatialFormatError::Parse { .. }
            | SpatialFormatError::Schema { .. }
            | SpatialFormatError::Encode { .. }
            | SpatialFormatError::Other { .. } => None,
        }
    }
}

impl From<std::io::Error> for SpatialFormatError {
    fn from(source: std::io::Error) -> Self {
        SpatialFormatError::Io {
            source,
            context: None,
        }
    }
}

/// Result type alias that uses [`SpatialFormatError`].
pub type SpatialFormatResult<T> = Result<T, SpatialFormatError>;

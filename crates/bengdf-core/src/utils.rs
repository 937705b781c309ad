//! Helpers shared by the table operations.

use std::path::{Path, PathBuf};

use arrow_schema::{DataType, Field};

use crate::error::{IoError, Result};

/// Extension trait for formatting Arrow [`DataType`] into human-readable strings.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use arrow_schema::{DataType, Field};
/// use bengdf_core::utils::ArrowDataTypeExt;
///
/// assert_eq!(DataType::Utf8.format(), "String");
/// let labels = DataType::List(Arc::new(Field::new_list_field(DataType::Utf8, true)));
/// assert_eq!(labels.format(), "List<String>");
/// ```
pub trait ArrowDataTypeExt {
    /// Format the data type into a human-readable string.
    fn format(&self) -> String;
}

impl ArrowDataTypeExt for DataType {
    fn format(&self) -> String {
        match self {
            DataType::Boolean => "Boolean".to_string(),
            DataType::Int32 => "Int32".to_string(),
            DataType::Int64 => "Int64".to_string(),
            DataType::Float64 => "Float64".to_string(),
            DataType::Utf8 => "String".to_string(),
            DataType::LargeUtf8 => "LargeString".to_string(),
            DataType::Utf8View => "StringView".to_string(),
            DataType::Binary => "Binary".to_string(),
            DataType::LargeBinary => "LargeBinary".to_string(),
            DataType::Timestamp(unit, tz) => {
                let tz_str = tz.as_ref().map_or("", |t| t.as_ref());
                format!("Timestamp({unit:?}, {tz_str})")
            },
            DataType::List(item) => format!("List<{}>", item.data_type().format()),
            DataType::LargeList(item) => format!("LargeList<{}>", item.data_type().format()),
            _ => format!("{self:?}"),
        }
    }
}

/// Extension type name of a field, e.g. `geoarrow.wkb`.
#[must_use]
pub fn extension_name(field: &Field) -> Option<String> {
    field.extension_type_name().map(str::to_string)
}

/// Path of a file named `file_name` in the directory of `input`.
///
/// # Errors
///
/// Returns [`IoError::InvalidPath`] if `file_name` is empty or contains a
/// directory component.
pub fn sibling_path(input: &Path, file_name: &str) -> Result<PathBuf> {
    let name = Path::new(file_name);
    if file_name.is_empty() || name.file_name().is_none_or(|base| base != name.as_os_str()) {
        return Err(IoError::InvalidPath {
            path: name.to_path_buf(),
            reason: "expected a bare file name".to_string(),
        }
        .into());
    }
    let dir = input.parent().unwrap_or_else(|| Path::new(""));
    Ok(dir.join(name))
}

/// Path of `file_name` inside `dir`, creating `dir` when missing.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub fn output_path_in(dir: &Path, file_name: &str) -> Result<PathBuf> {
    if !dir.exists() {
        std::fs::create_dir_all(dir).map_err(|err| IoError::InvalidPath {
            path: dir.to_path_buf(),
            reason: err.to_string(),
        })?;
    }
    Ok(dir.join(file_name))
}

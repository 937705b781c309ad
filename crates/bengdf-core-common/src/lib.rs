//! Data model shared across the `bengdf` crates.
//!
//! This crate holds the types that both the assembly pipeline in `bengdf-core`
//! and the format crates need, preventing circular dependencies:
//! coordinate reference systems, patch geometries, patches, rows, tables, the
//! per-patch error type and the table I/O traits.

pub mod crs;
pub mod error;
pub mod geometry;
pub mod io;
pub mod patch;
pub mod row;
pub mod table;

// Re-export commonly used types
pub use crs::Crs;
pub use error::{PatchError, PatchResult};
pub use geometry::PatchGeometry;
pub use io::{TableReader, TableWriter};
pub use patch::{CornerCoordinates, Patch, QualityFlags, Sensor};
pub use row::{CountryLabel, DerivedColumn, DerivedValue, OriginalSplit, Row, Season};
pub use table::{DerivedUpdate, Table};

//! `bengdf-core` builds GeoParquet indexes of BigEarthNet patches.
//!
//! This crate includes:
//! - **Discovery**: listing patch directories and loading their metadata files.
//! - **Geometry and reprojection**: patch footprints with an explicit CRS.
//! - **Enrichment**: season, country, quality flags, original split and
//!   19-class labels of every patch.
//! - **Assembly**: raw and recommended tables, extension by key, quality filtering.
//! - **Operations**: the same steps on persisted GeoParquet tables.
//!
//! The data model itself lives in `bengdf-core-common`.

pub mod assemble;
pub mod config;
pub mod country;
pub mod enrich;
pub mod error;
pub mod filter;
pub mod geometry;
pub mod labels;
pub mod operations;
pub mod quality;
pub mod reproject;
pub mod scan;
pub mod split;
pub mod types;
pub mod utils;

pub use assemble::{
    BuildOutput, BuildReport, PatchFailure, build_raw, build_recommended, build_table_from_paths,
    extend, extend_from_archive, extend_from_patches, filter_season,
};
pub use config::{BuildOptions, DEFAULT_WORKERS, ExtendSpec, FailurePolicy};
pub use country::{
    BEN_COUNTRIES_ISO_A2, Country, CountryLoadOptions, CountryReferenceSet, assign_country,
};
pub use enrich::{EnrichContext, enrich};
pub use error::{BenGdfError, ConfigError, IoError, Result};
pub use filter::{BEN_COUNTRY_NAMES, Discouraged, QualityFilter};
pub use geometry::build_geometry;
pub use labels::{NINETEEN_CLASS_LABELS, to_nineteen_class};
pub use quality::QualityLists;
pub use reproject::{Reprojector, reproject, reproject_table};
pub use scan::{discover_patch_directories, load_patch};
pub use split::SplitLists;

//! `GeoJSON` reading for reference data such as country boundaries.
//!
//! Both regular `GeoJSON` documents (FeatureCollection, Feature, bare Geometry)
//! and newline-delimited `GeoJSON` sequences are accepted.

pub mod parser;

pub use parser::{FeatureRecord, parse_geojson_bytes, read_geojson_file};

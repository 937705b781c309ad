//! Table operations on persisted files.
//!
//! These functions tie the assembly pipeline to the table formats: they load
//! the reference data, build or transform a table and persist the result,
//! returning the path that was written.

use std::path::{Path, PathBuf};

use bengdf_core_common::{Crs, Season, Sensor, Table, TableReader, TableWriter};
use bengdf_geoparquet::inspect_geoparquet;
use bengdf_geoparquet::schema::{GEOMETRY, derived_columns_in};
use log::info;

use crate::assemble::{BuildReport, build_raw, extend, extend_from_archive, filter_season};
use crate::config::{BuildOptions, ExtendSpec};
use crate::country::{BEN_COUNTRIES_ISO_A2, CountryLoadOptions, CountryReferenceSet};
use crate::enrich::EnrichContext;
use crate::error::{IoErrorExt, Result, ensure_exists};
use crate::filter::QualityFilter;
use crate::quality::QualityLists;
use crate::split::SplitLists;
use crate::types::{DatasetInfo, FieldInfo, GeometryColumnInfo};
use crate::utils::{ArrowDataTypeExt, extension_name, output_path_in, sibling_path};

/// Files the enrichment context is loaded from.
#[derive(Debug, Clone)]
pub struct ReferenceInputs {
    /// Country boundaries (`GeoJSON`)
    pub countries: PathBuf,
    /// How the boundary file is interpreted
    pub country_options: CountryLoadOptions,
    /// Keep only the BigEarthNet countries
    pub restrict_to_ben: bool,
    /// Names of patches with seasonal snow
    pub snow_list: Option<PathBuf>,
    /// Names of patches with cloud or shadow
    pub cloud_shadow_list: Option<PathBuf>,
    /// Names of patches in the original training split
    pub train_list: Option<PathBuf>,
    /// Names of patches in the original validation split
    pub validation_list: Option<PathBuf>,
    /// Names of patches in the original test split
    pub test_list: Option<PathBuf>,
}

impl ReferenceInputs {
    /// Inputs reading country boundaries from `countries` with default options.
    #[must_use]
    pub fn new(countries: impl Into<PathBuf>) -> Self {
        Self {
            countries: countries.into(),
            country_options: CountryLoadOptions::default(),
            restrict_to_ben: true,
            snow_list: None,
            cloud_shadow_list: None,
            train_list: None,
            validation_list: None,
            test_list: None,
        }
    }

    /// Set the country load options
    #[must_use]
    pub fn with_country_options(mut self, options: CountryLoadOptions) -> Self {
        self.country_options = options;
        self
    }

    /// Set whether the boundaries are restricted to the BigEarthNet countries
    #[must_use]
    pub fn with_restrict_to_ben(mut self, restrict: bool) -> Self {
        self.restrict_to_ben = restrict;
        self
    }

    /// Set the seasonal snow list
    #[must_use]
    pub fn with_snow_list(mut self, path: Option<PathBuf>) -> Self {
        self.snow_list = path;
        self
    }

    /// Set the cloud-or-shadow list
    #[must_use]
    pub fn with_cloud_shadow_list(mut self, path: Option<PathBuf>) -> Self {
        self.cloud_shadow_list = path;
        self
    }

    /// Set the train, validation and test split lists
    #[must_use]
    pub fn with_split_lists(
        mut self,
        train: Option<PathBuf>,
        validation: Option<PathBuf>,
        test: Option<PathBuf>,
    ) -> Self {
        self.train_list = train;
        self.validation_list = validation;
        self.test_list = test;
        self
    }
}

/// Loads the country boundaries, quality lists and split lists into an
/// enrichment context.
///
/// Boundaries are reprojected into `target_crs`, so country overlap is
/// measured in the same CRS the table uses.
///
/// # Errors
///
/// Returns an I/O error if a file cannot be read, or a patch error if the
/// boundaries cannot be reprojected.
pub fn load_context(inputs: &ReferenceInputs, target_crs: Crs) -> Result<EnrichContext> {
    ensure_exists(&inputs.countries)?;
    let mut countries =
        CountryReferenceSet::from_geojson_file(&inputs.countries, &inputs.country_options)?;
    if inputs.restrict_to_ben {
        countries = countries.restrict_to_iso_a2(&BEN_COUNTRIES_ISO_A2);
        info!("Restricted country boundaries to {} countries", countries.len());
    }
    let countries = countries.to_crs(target_crs)?;

    let lists = QualityLists::from_files(
        inputs.snow_list.as_deref(),
        inputs.cloud_shadow_list.as_deref(),
    )?;
    let splits = SplitLists::from_files(
        inputs.train_list.as_deref(),
        inputs.validation_list.as_deref(),
        inputs.test_list.as_deref(),
    )?;
    if splits.is_empty() {
        info!("No split lists given; every patch is unassigned");
    }
    Ok(EnrichContext::new(countries, target_crs)
        .with_quality_lists(lists)
        .with_split_lists(splits))
}

/// A written table together with the report of the build that produced it.
#[derive(Debug, Clone)]
pub struct BuildArtifact {
    /// Path the table was written to
    pub path: PathBuf,
    /// Number of rows written
    pub rows: usize,
    /// Report of the build
    pub report: BuildReport,
}

fn default_file_name(sensor: Sensor, variant: &str) -> String {
    format!("{sensor}_{variant}.parquet")
}

/// Resolves an output argument: an existing directory receives the default file name.
fn resolve_output(output: &Path, sensor: Sensor, variant: &str) -> PathBuf {
    if output.is_dir() {
        output.join(default_file_name(sensor, variant))
    } else {
        output.to_path_buf()
    }
}

fn read_table<F: TableReader>(format: &F, path: &Path) -> Result<Table> {
    ensure_exists(path)?;
    let table = format
        .read_table(path)
        .with_read_context(format.format_name(), path)?;
    info!("Read {} rows from {}", table.len(), path.display());
    Ok(table)
}

fn write_table<F: TableWriter>(format: &F, table: &Table, path: &Path) -> Result<()> {
    format
        .write_table(table, path)
        .with_write_context(format.format_name(), path)?;
    info!("Wrote {} rows to {}", table.len(), path.display());
    Ok(())
}

/// Builds the raw table of an archive and persists it.
///
/// # Errors
///
/// Fails like [`build_raw`], or if the table cannot be written.
pub fn build_raw_parquet<F: TableWriter>(
    root: &Path,
    output: &Path,
    options: &BuildOptions,
    ctx: &EnrichContext,
    format: &F,
) -> Result<BuildArtifact> {
    let built = build_raw(root, options, ctx)?;
    let path = resolve_output(output, options.sensor, "raw");
    write_table(format, &built.table, &path)?;
    Ok(BuildArtifact {
        path,
        rows: built.table.len(),
        report: built.report,
    })
}

/// Builds the recommended table of an archive and persists it.
///
/// With `intermediate_dir` the unfiltered table is also written there as
/// `<sensor>_raw.parquet`.
///
/// # Errors
///
/// Fails like [`build_raw`], or if a table cannot be written.
pub fn build_recommended_parquet<F: TableWriter>(
    root: &Path,
    output: &Path,
    options: &BuildOptions,
    ctx: &EnrichContext,
    filter: &QualityFilter,
    intermediate_dir: Option<&Path>,
    format: &F,
) -> Result<BuildArtifact> {
    let built = build_raw(root, options, ctx)?;
    if let Some(dir) = intermediate_dir {
        let raw_path = output_path_in(dir, &default_file_name(options.sensor, "raw"))?;
        write_table(format, &built.table, &raw_path)?;
    }

    let recommended = filter.apply(&built.table);
    let path = resolve_output(output, options.sensor, "recommended");
    write_table(format, &recommended, &path)?;
    Ok(BuildArtifact {
        path,
        rows: recommended.len(),
        report: built.report,
    })
}

/// Where [`extend_parquet`] takes its values from.
#[derive(Debug, Clone, Copy)]
pub enum ExtendSource<'a> {
    /// Each row's own geometry, timestamp and name
    Rows,
    /// Freshly loaded patches of an archive
    Archive {
        /// Archive root
        root: &'a Path,
        /// Sensor of the archive's patches
        sensor: Sensor,
    },
}

/// Extends a persisted table and writes it next to the input as `file_name`.
///
/// # Errors
///
/// Returns an I/O error for unreadable input or an invalid `file_name`, and
/// fails like [`extend`] or [`extend_from_archive`].
pub fn extend_parquet<F: TableReader + TableWriter>(
    input: &Path,
    file_name: &str,
    spec: &ExtendSpec,
    source: ExtendSource<'_>,
    ctx: &EnrichContext,
    format: &F,
) -> Result<PathBuf> {
    let output = sibling_path(input, file_name)?;
    let table = read_table(format, input)?;
    let extended = match source {
        ExtendSource::Rows => extend(&table, spec, ctx)?,
        ExtendSource::Archive { root, sensor } => {
            extend_from_archive(&table, root, sensor, spec, ctx)?
        },
    };
    write_table(format, &extended, &output)?;
    Ok(output)
}

/// Removes discouraged rows from a persisted table and writes the rest next
/// to the input as `file_name`.
///
/// # Errors
///
/// Returns an I/O error for unreadable input, an invalid `file_name` or a
/// failed write.
pub fn remove_discouraged_parquet<F: TableReader + TableWriter>(
    input: &Path,
    file_name: &str,
    filter: &QualityFilter,
    format: &F,
) -> Result<PathBuf> {
    let output = sibling_path(input, file_name)?;
    let table = read_table(format, input)?;
    write_table(format, &filter.apply(&table), &output)?;
    Ok(output)
}

/// Keeps the rows of one season and writes them next to the input as `file_name`.
///
/// # Errors
///
/// Same as [`remove_discouraged_parquet`].
pub fn filter_season_parquet<F: TableReader + TableWriter>(
    input: &Path,
    file_name: &str,
    season: Season,
    format: &F,
) -> Result<PathBuf> {
    let output = sibling_path(input, file_name)?;
    let table = read_table(format, input)?;
    write_table(format, &filter_season(&table, season), &output)?;
    Ok(output)
}

/// Describes a persisted table without decoding its rows.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be opened or is not GeoParquet.
pub fn dataset_info(path: &Path) -> Result<DatasetInfo> {
    ensure_exists(path)?;
    let summary = inspect_geoparquet(path).with_read_context("GeoParquet", path)?;
    let schema = &summary.schema;

    let crs = summary
        .geo
        .as_ref()
        .and_then(|geo| geo.primary_crs().ok())
        .map(|crs| crs.to_string());

    let geometry_columns = summary
        .geo
        .iter()
        .flat_map(|geo| geo.columns.iter())
        .map(|(name, column)| GeometryColumnInfo {
            name: name.clone(),
            encoding: column.encoding.clone(),
            extension: schema
                .field_with_name(name)
                .ok()
                .and_then(extension_name),
            crs: column
                .crs
                .as_ref()
                .map(|crs| format!("{}:{}", crs.id.authority, crs.id.code)),
            bbox: column.bbox.clone(),
        })
        .collect();

    let fields = schema
        .fields()
        .iter()
        .filter(|field| field.name() != GEOMETRY)
        .map(|field| FieldInfo {
            name: field.name().clone(),
            data_type: field.data_type().format(),
            nullable: field.is_nullable(),
        })
        .collect();

    Ok(DatasetInfo {
        dataset: path.display().to_string(),
        format: if summary.geo.is_some() {
            "GeoParquet".to_string()
        } else {
            "Parquet".to_string()
        },
        crs,
        num_rows: summary.num_rows,
        derived_columns: derived_columns_in(schema).into_iter().collect(),
        geometry_columns,
        fields,
    })
}

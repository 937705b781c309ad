//! Table Assembler: builds, filters and extends tables of patch rows.

use std::path::{Path, PathBuf};

use bengdf_core_common::{
    DerivedColumn, DerivedUpdate, Patch, PatchError, PatchResult, Row, Season, Sensor, Table,
};
use rayon::prelude::*;
use serde::Serialize;

use crate::config::{BuildOptions, ExtendSpec, FailurePolicy};
use crate::enrich::{EnrichContext, derive_from_patch, derive_from_row, enrich};
use crate::error::{ConfigError, IoErrorExt, Result};
use crate::filter::QualityFilter;
use crate::scan::{discover_patch_directories, load_patch, patch_name};

/// A patch that could not be turned into a row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatchFailure {
    /// Patch name
    pub name: String,
    /// Patch directory or metadata file
    pub path: PathBuf,
    /// Error kind, e.g. `MissingMetadata`
    pub kind: String,
    /// Full error message
    pub error: String,
}

/// Side report of a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    /// Sensor of the build
    pub sensor: String,
    /// Failure policy of the build
    pub policy: String,
    /// Number of discovered patches
    pub discovered: usize,
    /// Number of rows in the produced table
    pub rows: usize,
    /// Every patch that failed, in discovery order
    pub failures: Vec<PatchFailure>,
}

impl BuildReport {
    fn new(options: &BuildOptions, discovered: usize) -> Self {
        Self {
            sensor: options.sensor.to_string(),
            policy: options.policy.to_string(),
            discovered,
            rows: 0,
            failures: Vec::new(),
        }
    }

    /// Returns `true` if no patch failed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Serializes the report as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self).map_err(anyhow::Error::from)?)
    }

    /// Writes the report as JSON to `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be written.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = self.to_json()?;
        std::fs::write(path, json).with_write_context("JSON", path)?;
        log::info!("Wrote build report to {}", path.display());
        Ok(())
    }
}

/// A built table together with its side report.
#[derive(Debug, Clone)]
pub struct BuildOutput {
    /// The assembled table
    pub table: Table,
    /// Failures and counts of the build
    pub report: BuildReport,
}

fn check_context(options: &BuildOptions, ctx: &EnrichContext) -> Result<()> {
    options.validate()?;
    if options.target_crs != ctx.target_crs() {
        return Err(ConfigError::ConflictingOptions {
            options: format!(
                "build target {} differs from enrichment target {}",
                options.target_crs,
                ctx.target_crs()
            ),
        }
        .into());
    }
    Ok(())
}

/// A pool of `n_workers` named threads.
fn worker_pool(n_workers: usize) -> Result<rayon::ThreadPool> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(n_workers)
        .thread_name(|idx| format!("bengdf-worker-{idx}"))
        .build()
        .map_err(anyhow::Error::from)?;
    Ok(pool)
}

fn process_patch(path: &Path, sensor: Sensor, ctx: &EnrichContext) -> PatchResult<Row> {
    let patch = load_patch(path, sensor, ctx.quality_lists())?;
    enrich(&patch, ctx)
}

/// Builds a table from the given patch directories or metadata files.
///
/// Patches are processed on a pool of `options.n_workers` threads; rows keep
/// the order of `paths`. With [`FailurePolicy::FailFast`] the first failing
/// patch in that order aborts the build. With [`FailurePolicy::Lenient`] a
/// failing patch becomes a row carrying only its name and an error marker,
/// and is listed in the report.
///
/// # Errors
///
/// Returns a configuration error for invalid options, the first patch error
/// in fail-fast mode, or [`PatchError::DuplicatePatchKey`] if two paths
/// resolve to the same patch name.
pub fn build_table_from_paths(
    paths: &[PathBuf],
    options: &BuildOptions,
    ctx: &EnrichContext,
) -> Result<BuildOutput> {
    check_context(options, ctx)?;

    let pool = worker_pool(options.n_workers)?;
    log::debug!(
        "Processing {} patches on {} workers",
        paths.len(),
        options.n_workers
    );

    let outcomes: Vec<PatchResult<Row>> = pool.install(|| {
        paths
            .par_iter()
            .map(|path| process_patch(path, options.sensor, ctx))
            .collect()
    });

    let mut report = BuildReport::new(options, paths.len());
    let mut rows = Vec::with_capacity(outcomes.len());
    for (path, outcome) in paths.iter().zip(outcomes) {
        match outcome {
            Ok(row) => rows.push(row),
            Err(err) => match options.policy {
                FailurePolicy::FailFast => return Err(err.into()),
                FailurePolicy::Lenient => {
                    let name = patch_name(path);
                    log::warn!("Patch {name} failed: {err}");
                    report.failures.push(PatchFailure {
                        name: name.clone(),
                        path: path.clone(),
                        kind: err.kind().to_string(),
                        error: err.to_string(),
                    });
                    rows.push(Row::failed(name, options.sensor, &err));
                },
            },
        }
    }

    let table = Table::from_rows(options.target_crs, DerivedColumn::ALL, rows)?;
    report.rows = table.len();
    if !report.is_clean() {
        log::warn!(
            "{} of {} patches failed and carry an error marker",
            report.failures.len(),
            report.discovered
        );
    }
    Ok(BuildOutput { table, report })
}

/// Builds the unfiltered table of every `options.sensor` patch below `root`.
///
/// An archive without patches yields an empty table.
///
/// # Errors
///
/// Fails like [`build_table_from_paths`], or with an I/O error if `root`
/// cannot be listed.
pub fn build_raw(root: &Path, options: &BuildOptions, ctx: &EnrichContext) -> Result<BuildOutput> {
    check_context(options, ctx)?;
    let paths = discover_patch_directories(root, options.sensor)?;
    let output = build_table_from_paths(&paths, options, ctx)?;
    log::info!(
        "Built raw {} table with {} rows",
        options.sensor,
        output.table.len()
    );
    Ok(output)
}

/// Builds the raw table and removes the rows `filter` discourages.
///
/// The report describes the raw build.
///
/// # Errors
///
/// Fails like [`build_raw`].
pub fn build_recommended(
    root: &Path,
    options: &BuildOptions,
    ctx: &EnrichContext,
    filter: &QualityFilter,
) -> Result<BuildOutput> {
    let raw = build_raw(root, options, ctx)?;
    Ok(BuildOutput {
        table: filter.apply(&raw.table),
        report: raw.report,
    })
}

fn warn_about_kept_columns(table: &Table, spec: &ExtendSpec) {
    if spec.overwrite {
        return;
    }
    for column in spec.columns.iter().filter(|column| table.has_column(**column)) {
        log::warn!("Column '{column}' already exists and is kept; pass overwrite to recompute it");
    }
}

/// Recomputes derived columns from each row's own attributes.
///
/// Rows are processed on a pool of `spec.n_workers` threads. Base columns
/// and, unless `spec.overwrite` is set, derived columns the table already
/// holds are left untouched.
///
/// # Errors
///
/// Returns a configuration error for an empty column set or zero workers,
/// or the first patch error raised while computing a value.
pub fn extend(table: &Table, spec: &ExtendSpec, ctx: &EnrichContext) -> Result<Table> {
    spec.validate()?;
    warn_about_kept_columns(table, spec);

    let updates = worker_pool(spec.n_workers)?.install(|| {
        table
            .rows()
            .par_iter()
            .map(|row| Ok((row.name.clone(), derive_from_row(row, &spec.columns, ctx)?)))
            .collect::<PatchResult<Vec<DerivedUpdate>>>()
    })?;

    let extended = table.join_derived(updates, &spec.columns, spec.overwrite)?;
    log::info!(
        "Extended {} rows with {}",
        extended.len(),
        spec.columns
            .iter()
            .map(DerivedColumn::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    );
    Ok(extended)
}

/// Computes derived columns from freshly loaded patches and joins them by name.
///
/// Patches are processed on a pool of `spec.n_workers` threads. Rows without
/// a matching patch keep their values.
///
/// # Errors
///
/// Returns [`PatchError::UnknownPatchKey`] if a patch is not in `table`, or
/// the first patch error raised while computing a value.
pub fn extend_from_patches(
    table: &Table,
    patches: &[Patch],
    spec: &ExtendSpec,
    ctx: &EnrichContext,
) -> Result<Table> {
    spec.validate()?;
    if let Some(patch) = patches.iter().find(|patch| !table.contains_key(&patch.name)) {
        return Err(PatchError::UnknownPatchKey {
            key: patch.name.clone(),
        }
        .into());
    }
    warn_about_kept_columns(table, spec);

    let updates = worker_pool(spec.n_workers)?.install(|| {
        patches
            .par_iter()
            .map(|patch| {
                let values = derive_from_patch(patch, &spec.columns, ctx)?;
                Ok((patch.name.clone(), values))
            })
            .collect::<PatchResult<Vec<DerivedUpdate>>>()
    })?;
    Ok(table.join_derived(updates, &spec.columns, spec.overwrite)?)
}

/// Loads every patch below `root` and extends `table` with them.
///
/// # Errors
///
/// Fails like [`extend_from_patches`], or with the first patch that cannot
/// be loaded.
pub fn extend_from_archive(
    table: &Table,
    root: &Path,
    sensor: Sensor,
    spec: &ExtendSpec,
    ctx: &EnrichContext,
) -> Result<Table> {
    spec.validate()?;
    let paths = discover_patch_directories(root, sensor)?;
    let patches = worker_pool(spec.n_workers)?.install(|| {
        paths
            .par_iter()
            .map(|path| load_patch(path, sensor, ctx.quality_lists()))
            .collect::<PatchResult<Vec<_>>>()
    })?;
    extend_from_patches(table, &patches, spec, ctx)
}

/// Keeps the rows acquired in `season`.
///
/// The stored season is used when present, otherwise it is derived from the
/// acquisition timestamp. Rows with neither are dropped.
#[must_use]
pub fn filter_season(table: &Table, season: Season) -> Table {
    table.filtered(|row| {
        row.season
            .or_else(|| row.acquisition.as_ref().map(Season::of))
            .is_some_and(|row_season| row_season == season)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bengdf_core_common::Crs;
    use chrono::NaiveDate;

    use crate::country::CountryReferenceSet;
    use crate::error::BenGdfError;

    fn unknown_key() -> PatchError {
        PatchError::UnknownPatchKey {
            key: String::new(),
        }
    }

    fn row(name: &str, month: u32) -> Row {
        let mut row = Row::failed(name, Sensor::S2, &unknown_key());
        row.error = None;
        row.acquisition =
            NaiveDate::from_ymd_opt(2018, month, 1).and_then(|d| d.and_hms_opt(0, 0, 0));
        row
    }

    #[test]
    fn test_filter_season() {
        let mut stored = row("stored", 1);
        stored.season = Some(Season::Summer);
        let table = Table::from_rows(
            Crs::ETRS89_LAEA,
            [],
            [
                row("jan", 1),
                row("jul", 7),
                stored,
                Row::failed("x", Sensor::S2, &unknown_key()),
            ],
        )
        .unwrap();

        let summer = filter_season(&table, Season::Summer);
        let names: Vec<_> = summer.iter().map(|row| row.name.as_str()).collect();
        assert_eq!(names, vec!["jul", "stored"]);
        assert_eq!(filter_season(&table, Season::Winter).len(), 1);
    }

    #[test]
    fn test_report_serializes() {
        let options = BuildOptions::default().with_policy(FailurePolicy::Lenient);
        let mut report = BuildReport::new(&options, 2);
        report.rows = 2;
        report.failures.push(PatchFailure {
            name: "S2A_MSIL2A_20170613T101031_0_45".to_string(),
            path: PathBuf::from("/archive/S2A_MSIL2A_20170613T101031_0_45"),
            kind: "MissingMetadata".to_string(),
            error: "missing".to_string(),
        });

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["policy"], "lenient");
        assert_eq!(json["sensor"], "S2");
        assert_eq!(json["failures"][0]["kind"], "MissingMetadata");
        assert!(!report.is_clean());
    }

    #[test]
    fn test_conflicting_targets_rejected() {
        let countries = CountryReferenceSet::new(Crs::WGS84, Vec::new());
        let ctx = EnrichContext::new(countries, Crs::WGS84);
        let err = build_table_from_paths(&[], &BuildOptions::default(), &ctx).unwrap_err();
        assert!(matches!(
            err,
            BenGdfError::Config(ConfigError::ConflictingOptions { .. })
        ));

        let options = BuildOptions::default().with_n_workers(0);
        let err = build_table_from_paths(&[], &options, &ctx).unwrap_err();
        assert!(matches!(
            err,
            BenGdfError::Config(ConfigError::InvalidOption { .. })
        ));
    }

    #[test]
    fn test_extend_runs_on_the_requested_workers() {
        let countries = CountryReferenceSet::new(Crs::ETRS89_LAEA, Vec::new());
        let ctx = EnrichContext::new(countries, Crs::ETRS89_LAEA);
        let table = Table::from_rows(Crs::ETRS89_LAEA, [], [row("jan", 1), row("jul", 7)]).unwrap();

        let spec = ExtendSpec::new([DerivedColumn::Season]).with_n_workers(2);
        let extended = extend(&table, &spec, &ctx).unwrap();
        assert_eq!(extended.get("jul").unwrap().season, Some(Season::Summer));

        let err = extend(&table, &spec.clone().with_n_workers(0), &ctx).unwrap_err();
        assert!(matches!(
            err,
            BenGdfError::Config(ConfigError::InvalidOption { .. })
        ));
        let err = extend_from_patches(&table, &[], &spec.with_n_workers(0), &ctx).unwrap_err();
        assert!(matches!(
            err,
            BenGdfError::Config(ConfigError::InvalidOption { .. })
        ));
    }
}

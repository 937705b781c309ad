//! Command-line interface for `bengdf`, a builder of BigEarthNet patch indexes.
//!
//! This binary provides a thin façade over the [`bengdf_core`] library: it
//! parses arguments, configures logging and delegates to the table operations.
//!
//! # Architecture
//!
//! The CLI is built using [`clap`] for argument parsing and [`tracing`] for structured logging.
//! Library crates log through the `log` facade, which is bridged into `tracing`.
//!
//! # Available Commands
//!
//! - `build-raw` - Build the unfiltered table of a patch archive
//! - `build-recommended` - Build the quality-filtered table of a patch archive
//! - `extend` - Add derived columns to an existing table
//! - `remove-discouraged` - Remove discouraged rows from an existing table
//! - `filter-season` - Keep the rows of one season
//! - `info` - Display table information and metadata

mod display;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::{Level, error, info, warn};
use tracing_log::LogTracer;
use tracing_subscriber::FmtSubscriber;

use bengdf_core::operations::{
    self, ExtendSource, ReferenceInputs, build_raw_parquet, build_recommended_parquet,
};
use bengdf_core::{
    BEN_COUNTRY_NAMES, BenGdfError, BuildOptions, CountryLoadOptions, DEFAULT_WORKERS, ExtendSpec,
    FailurePolicy, QualityFilter,
};
use bengdf_core_common::{Crs, DerivedColumn, Season, Sensor};
use bengdf_geoparquet::{GeoParquetFormat, GeoParquetWriterOptions};

#[derive(Parser)]
#[command(
    name = "bengdf",
    version,
    about = "Build GeoParquet indexes of BigEarthNet patches",
    long_about = "bengdf scans a BigEarthNet S1 or S2 archive and writes one row per patch with its\n\
                  footprint, acquisition date, season, country and cloud/shadow/snow flags."
)]
/// Command-line arguments and options for the `bengdf` CLI.
struct Cli {
    /// Enable verbose (INFO level) logging output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug (DEBUG level) logging output with detailed diagnostics.
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Reference data needed to enrich patches.
#[derive(Args, Debug, Clone)]
struct ReferenceArgs {
    /// Country boundaries as `GeoJSON` (e.g. Natural Earth admin 0 countries).
    #[arg(long, value_name = "GEOJSON")]
    countries: PathBuf,

    /// CRS of the country boundary coordinates.
    #[arg(long, value_name = "CRS", default_value = "EPSG:4326")]
    countries_crs: Crs,

    /// Feature property holding the country name.
    #[arg(long, value_name = "PROPERTY", default_value = "NAME")]
    name_property: String,

    /// Use every country of the boundary file, not only the BigEarthNet ones.
    #[arg(long)]
    all_countries: bool,

    /// CSV list of patches with seasonal snow.
    #[arg(long, value_name = "CSV")]
    snow_list: Option<PathBuf>,

    /// CSV list of patches with clouds or cloud shadow.
    #[arg(long, value_name = "CSV")]
    cloud_shadow_list: Option<PathBuf>,

    /// CSV list of the S2 patches of the original training split.
    #[arg(long, value_name = "CSV")]
    train_list: Option<PathBuf>,

    /// CSV list of the S2 patches of the original validation split.
    #[arg(long, value_name = "CSV")]
    validation_list: Option<PathBuf>,

    /// CSV list of the S2 patches of the original test split.
    #[arg(long, value_name = "CSV")]
    test_list: Option<PathBuf>,

    /// CRS of the written geometries.
    #[arg(long, value_name = "CRS", default_value = "EPSG:3035")]
    target_crs: Crs,
}

impl ReferenceArgs {
    fn inputs(&self) -> ReferenceInputs {
        ReferenceInputs::new(&self.countries)
            .with_country_options(
                CountryLoadOptions::default()
                    .with_crs(self.countries_crs)
                    .with_name_property(&self.name_property),
            )
            .with_restrict_to_ben(!self.all_countries)
            .with_snow_list(self.snow_list.clone())
            .with_cloud_shadow_list(self.cloud_shadow_list.clone())
            .with_split_lists(
                self.train_list.clone(),
                self.validation_list.clone(),
                self.test_list.clone(),
            )
    }
}

/// Options shared by the build commands.
#[derive(Args, Debug, Clone)]
struct BuildArgs {
    /// Root directory of the patch archive.
    #[arg(value_name = "ARCHIVE")]
    archive: PathBuf,

    /// Output file, or an existing directory to write `<sensor>_<variant>.parquet` into.
    #[arg(short, long, value_name = "PATH", default_value = ".")]
    output: PathBuf,

    /// Sensor whose patches are collected (S1 or S2).
    #[arg(long, default_value = "S2")]
    sensor: Sensor,

    /// Number of worker threads.
    #[arg(short = 'j', long, default_value_t = DEFAULT_WORKERS)]
    workers: usize,

    /// Record failing patches in the error column instead of aborting.
    #[arg(long)]
    lenient: bool,

    /// Write the build report as JSON to this file.
    #[arg(long, value_name = "JSON")]
    report: Option<PathBuf>,

    /// Maximum number of rows per Parquet row group.
    #[arg(long, value_name = "ROWS")]
    row_group_size: Option<usize>,

    #[command(flatten)]
    reference: ReferenceArgs,
}

impl BuildArgs {
    fn options(&self) -> BuildOptions {
        BuildOptions::for_sensor(self.sensor)
            .with_target_crs(self.reference.target_crs)
            .with_n_workers(self.workers)
            .with_policy(if self.lenient {
                FailurePolicy::Lenient
            } else {
                FailurePolicy::FailFast
            })
    }
}

/// Predicates of the quality filter.
#[derive(Args, Debug, Clone)]
struct FilterArgs {
    /// Allowed country name; repeat for several. Defaults to the BigEarthNet countries.
    #[arg(long = "allow-country", value_name = "NAME")]
    allow_countries: Vec<String>,

    /// Keep rows of every country.
    #[arg(long, conflicts_with = "allow_countries")]
    any_country: bool,

    /// Keep cloudy rows.
    #[arg(long)]
    keep_cloud: bool,

    /// Keep rows with cloud shadow.
    #[arg(long)]
    keep_shadow: bool,

    /// Keep rows with seasonal snow.
    #[arg(long)]
    keep_snow: bool,

    /// Keep rows without labels.
    #[arg(long)]
    allow_unlabeled: bool,
}

impl FilterArgs {
    fn filter(&self) -> QualityFilter {
        let allowed = if self.any_country {
            None
        } else if self.allow_countries.is_empty() {
            Some(BEN_COUNTRY_NAMES.iter().map(ToString::to_string).collect::<Vec<_>>())
        } else {
            Some(self.allow_countries.clone())
        };
        QualityFilter::default()
            .with_allowed_countries(allowed)
            .with_discourage_cloud(!self.keep_cloud)
            .with_discourage_shadow(!self.keep_shadow)
            .with_discourage_snow(!self.keep_snow)
            .with_require_labels(!self.allow_unlabeled)
    }
}

/// Available subcommands for the `bengdf` CLI.
#[derive(Subcommand)]
enum Commands {
    /// Builds the unfiltered table of a patch archive.
    BuildRaw {
        #[command(flatten)]
        build: BuildArgs,
    },

    /// Builds the table of a patch archive without discouraged patches.
    BuildRecommended {
        #[command(flatten)]
        build: BuildArgs,

        #[command(flatten)]
        filter: FilterArgs,

        /// Also write the unfiltered table into this directory.
        #[arg(long, value_name = "DIR")]
        intermediate_dir: Option<PathBuf>,
    },

    /// Adds derived columns to an existing table.
    ///
    /// Columns the table already holds are kept unless `--overwrite` is given.
    Extend {
        /// Table to extend.
        #[arg(value_name = "TABLE")]
        input: PathBuf,

        /// File name of the extended table, written next to the input.
        #[arg(long, value_name = "NAME")]
        file_name: String,

        /// Derived columns to compute (season, country, quality, original_split, new_labels).
        #[arg(
            long,
            value_delimiter = ',',
            default_value = "season,country,quality,original_split,new_labels"
        )]
        columns: Vec<DerivedColumn>,

        /// Recompute columns the table already holds.
        #[arg(long)]
        overwrite: bool,

        /// Number of worker threads.
        #[arg(short = 'j', long, default_value_t = DEFAULT_WORKERS)]
        workers: usize,

        /// Compute values from the patches of this archive instead of the table rows.
        #[arg(long, value_name = "ARCHIVE")]
        archive: Option<PathBuf>,

        /// Sensor of the archive's patches.
        #[arg(long, default_value = "S2")]
        sensor: Sensor,

        #[command(flatten)]
        reference: ReferenceArgs,
    },

    /// Removes discouraged rows from an existing table.
    RemoveDiscouraged {
        /// Table to filter.
        #[arg(value_name = "TABLE")]
        input: PathBuf,

        /// File name of the filtered table, written next to the input.
        #[arg(long, value_name = "NAME")]
        file_name: String,

        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Keeps the rows acquired in one season.
    FilterSeason {
        /// Table to filter.
        #[arg(value_name = "TABLE")]
        input: PathBuf,

        /// File name of the filtered table, written next to the input.
        #[arg(long, value_name = "NAME")]
        file_name: String,

        /// Season to keep (Winter, Spring, Summer, Fall).
        #[arg(long)]
        season: Season,
    },

    /// Displays information about a persisted table.
    Info {
        /// Path to the table.
        #[arg(value_name = "TABLE")]
        input: PathBuf,
    },
}

/// Entry point for the `bengdf` command-line interface.
///
/// Library errors are printed with their recovery hint and turn into a
/// non-zero exit code.
///
/// # Errors
///
/// Returns an error if the logging system cannot be initialized.
fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let log_level = if cli.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::INFO
    } else {
        Level::WARN
    };

    // Bridge logs from the `log` crate to the `tracing` ecosystem.
    LogTracer::init()?;

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    match run(cli.command) {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) => {
            error!("{err}");
            eprintln!("{}", err.user_message());
            if let Some(hint) = err.recovery_suggestion() {
                eprintln!("Hint: {hint}");
            }
            Ok(ExitCode::FAILURE)
        },
    }
}

fn run(command: Commands) -> Result<(), BenGdfError> {
    match command {
        Commands::BuildRaw { build } => handle_build_raw(&build),
        Commands::BuildRecommended {
            build,
            filter,
            intermediate_dir,
        } => handle_build_recommended(&build, &filter, intermediate_dir.as_deref()),
        Commands::Extend {
            input,
            file_name,
            columns,
            overwrite,
            workers,
            archive,
            sensor,
            reference,
        } => {
            let spec = ExtendSpec::new(columns)
                .with_overwrite(overwrite)
                .with_n_workers(workers);
            let source = match &archive {
                Some(root) => ExtendSource::Archive { root, sensor },
                None => ExtendSource::Rows,
            };
            handle_extend(&input, &file_name, &spec, source, &reference)
        },
        Commands::RemoveDiscouraged {
            input,
            file_name,
            filter,
        } => {
            let path = operations::remove_discouraged_parquet(
                &input,
                &file_name,
                &filter.filter(),
                &GeoParquetFormat::default(),
            )?;
            println!("Wrote {}", path.display());
            Ok(())
        },
        Commands::FilterSeason {
            input,
            file_name,
            season,
        } => {
            let path = operations::filter_season_parquet(
                &input,
                &file_name,
                season,
                &GeoParquetFormat::default(),
            )?;
            println!("Wrote {}", path.display());
            Ok(())
        },
        Commands::Info { input } => {
            info!("Displaying info for {}", input.display());
            let info = operations::dataset_info(&input)?;
            display::display_dataset_info(&info);
            Ok(())
        },
    }
}

fn format_for(build: &BuildArgs) -> GeoParquetFormat {
    let mut options = GeoParquetWriterOptions::default();
    if let Some(rows) = build.row_group_size {
        options = options.with_max_row_group_size(rows);
    }
    GeoParquetFormat::new(options)
}

fn finish_build(
    build: &BuildArgs,
    artifact: &operations::BuildArtifact,
) -> Result<(), BenGdfError> {
    if let Some(path) = &build.report {
        artifact.report.write_json(path)?;
    } else if !artifact.report.is_clean() {
        warn!("Pass --report to keep the list of failed patches");
    }
    display::display_build_summary(artifact);
    Ok(())
}

fn handle_build_raw(build: &BuildArgs) -> Result<(), BenGdfError> {
    info!("Building raw {} table from {}", build.sensor, build.archive.display());
    let options = build.options();
    options.validate()?;
    let ctx = operations::load_context(&build.reference.inputs(), options.target_crs)?;
    let artifact = build_raw_parquet(
        &build.archive,
        &build.output,
        &options,
        &ctx,
        &format_for(build),
    )?;
    finish_build(build, &artifact)
}

fn handle_build_recommended(
    build: &BuildArgs,
    filter: &FilterArgs,
    intermediate_dir: Option<&Path>,
) -> Result<(), BenGdfError> {
    info!(
        "Building recommended {} table from {}",
        build.sensor,
        build.archive.display()
    );
    let options = build.options();
    options.validate()?;
    let ctx = operations::load_context(&build.reference.inputs(), options.target_crs)?;
    let artifact = build_recommended_parquet(
        &build.archive,
        &build.output,
        &options,
        &ctx,
        &filter.filter(),
        intermediate_dir,
        &format_for(build),
    )?;
    finish_build(build, &artifact)
}

fn handle_extend(
    input: &Path,
    file_name: &str,
    spec: &ExtendSpec,
    source: ExtendSource<'_>,
    reference: &ReferenceArgs,
) -> Result<(), BenGdfError> {
    info!("Extending {} with {:?}", input.display(), spec.columns);
    let ctx = operations::load_context(&reference.inputs(), reference.target_crs)?;
    let path = operations::extend_parquet(
        input,
        file_name,
        spec,
        source,
        &ctx,
        &GeoParquetFormat::default(),
    )?;
    println!("Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_build_args_map_onto_options() {
        let cli = Cli::try_parse_from([
            "bengdf",
            "build-raw",
            "archive",
            "--countries",
            "countries.geojson",
            "--sensor",
            "s1",
            "-j",
            "3",
            "--lenient",
            "--target-crs",
            "4326",
        ])
        .unwrap();
        let Commands::BuildRaw { build } = cli.command else {
            panic!("expected build-raw");
        };
        let options = build.options();
        assert_eq!(options.sensor, Sensor::S1);
        assert_eq!(options.n_workers, 3);
        assert_eq!(options.policy, FailurePolicy::Lenient);
        assert_eq!(options.target_crs, Crs::WGS84);
        assert!(build.reference.inputs().restrict_to_ben);
    }

    #[test]
    fn test_filter_args_default_to_ben_countries() {
        let cli = Cli::try_parse_from([
            "bengdf",
            "remove-discouraged",
            "t.parquet",
            "--file-name",
            "o.parquet",
        ])
        .unwrap();
        let Commands::RemoveDiscouraged { filter, .. } = cli.command else {
            panic!("expected remove-discouraged");
        };
        assert_eq!(filter.filter(), QualityFilter::default());

        let cli = Cli::try_parse_from([
            "bengdf",
            "remove-discouraged",
            "t.parquet",
            "--file-name",
            "o.parquet",
            "--any-country",
            "--keep-snow",
        ])
        .unwrap();
        let Commands::RemoveDiscouraged { filter, .. } = cli.command else {
            panic!("expected remove-discouraged");
        };
        let filter = filter.filter();
        assert!(filter.allowed_countries.is_none());
        assert!(!filter.discourage_snow);
        assert!(filter.discourage_cloud);
    }

    #[test]
    fn test_extend_columns_are_comma_separated() {
        let cli = Cli::try_parse_from([
            "bengdf",
            "extend",
            "t.parquet",
            "--file-name",
            "o.parquet",
            "--countries",
            "c.geojson",
            "--columns",
            "season,country",
        ])
        .unwrap();
        let Commands::Extend { columns, .. } = cli.command else {
            panic!("expected extend");
        };
        assert_eq!(columns, vec![DerivedColumn::Season, DerivedColumn::Country]);
    }

    #[test]
    fn test_extend_defaults_and_split_lists() {
        let cli = Cli::try_parse_from([
            "bengdf",
            "extend",
            "t.parquet",
            "--file-name",
            "o.parquet",
            "--countries",
            "c.geojson",
            "--train-list",
            "train.csv",
            "--test-list",
            "test.csv",
            "-j",
            "2",
        ])
        .unwrap();
        let Commands::Extend {
            columns,
            workers,
            reference,
            ..
        } = cli.command
        else {
            panic!("expected extend");
        };
        assert_eq!(columns, DerivedColumn::ALL.to_vec());
        assert_eq!(workers, 2);

        let inputs = reference.inputs();
        assert_eq!(inputs.train_list, Some(PathBuf::from("train.csv")));
        assert_eq!(inputs.validation_list, None);
        assert_eq!(inputs.test_list, Some(PathBuf::from("test.csv")));
    }

    #[test]
    fn test_invalid_crs_is_rejected() {
        assert!(
            Cli::try_parse_from([
                "bengdf",
                "build-raw",
                "archive",
                "--countries",
                "c.geojson",
                "--target-crs",
                "+proj=longlat",
            ])
            .is_err()
        );
    }
}

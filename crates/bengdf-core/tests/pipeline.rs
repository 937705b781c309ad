//! End-to-end tests of the build pipeline on a small synthetic archive.

use std::fs;
use std::path::{Path, PathBuf};

use bengdf_core::operations::{
    ExtendSource, ReferenceInputs, build_raw_parquet, build_recommended_parquet, dataset_info,
    extend_parquet, load_context, remove_discouraged_parquet,
};
use bengdf_core::{
    BenGdfError, BuildOptions, EnrichContext, ExtendSpec, FailurePolicy, QualityFilter,
    build_raw, build_recommended, extend, extend_from_archive,
};
use bengdf_core_common::{
    CountryLabel, Crs, DerivedColumn, OriginalSplit, PatchError, Season, Sensor, Table,
    TableReader,
};
use bengdf_geoparquet::GeoParquetFormat;
use serde_json::json;
use tempfile::TempDir;

const CLEAN: &str = "S2A_MSIL2A_20170613T101031_33_0";
const CLOUDY: &str = "S2A_MSIL2A_20170613T101031_33_1";
const SNOWY: &str = "S2B_MSIL2A_20180205T100211_33_2";

fn write_patch(root: &Path, name: &str, metadata: &serde_json::Value) -> PathBuf {
    let dir = root.join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join(format!("{name}_labels_metadata.json")),
        serde_json::to_vec_pretty(metadata).unwrap(),
    )
    .unwrap();
    dir
}

/// A 1200 m patch in UTM 33N, a little north of Salzburg.
fn s2_metadata(column: f64, date: &str, cloud: bool) -> serde_json::Value {
    let ulx = 500_000.0 + column * 1200.0;
    json!({
        "labels": ["Coniferous forest", "Pastures"],
        "coordinates": {"ulx": ulx, "uly": 5_300_000.0, "lrx": ulx + 1200.0, "lry": 5_298_800.0},
        "projection": "PROJCS[\"WGS 84 / UTM zone 33N\",AUTHORITY[\"EPSG\",\"32633\"]]",
        "acquisition_date": date,
        "cloud": cloud,
    })
}

fn countries_file(dir: &Path) -> PathBuf {
    let path = dir.join("countries.geojson");
    fs::write(
        &path,
        json!({
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": {"NAME": "Austria", "ISO_A2": "AT"},
                    "geometry": {"type": "Polygon", "coordinates": [[
                        [9.5, 46.3], [17.2, 46.3], [17.2, 49.0], [9.5, 49.0], [9.5, 46.3]
                    ]]}
                },
                {
                    "type": "Feature",
                    "properties": {"NAME": "Germany", "ISO_A2": "DE"},
                    "geometry": {"type": "Polygon", "coordinates": [[
                        [6.0, 49.0], [15.0, 49.0], [15.0, 55.0], [6.0, 55.0], [6.0, 49.0]
                    ]]}
                }
            ]
        })
        .to_string(),
    )
    .unwrap();
    path
}

struct Fixture {
    _dir: TempDir,
    archive: PathBuf,
    work: PathBuf,
    ctx: EnrichContext,
}

fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("BigEarthNet-S2");
    let work = dir.path().join("work");
    fs::create_dir_all(&archive).unwrap();
    fs::create_dir_all(&work).unwrap();

    write_patch(&archive, CLEAN, &s2_metadata(0.0, "2017-06-13 10:10:31", false));
    write_patch(&archive, CLOUDY, &s2_metadata(1.0, "2017-06-13 10:10:31", true));
    // not a patch
    fs::write(archive.join("README.txt"), "BigEarthNet").unwrap();

    let inputs = ReferenceInputs::new(countries_file(&work));
    let ctx = load_context(&inputs, Crs::ETRS89_LAEA).unwrap();
    Fixture {
        _dir: dir,
        archive,
        work,
        ctx,
    }
}

fn sorted_names(table: &Table) -> Vec<String> {
    let mut names: Vec<_> = table.iter().map(|row| row.name.clone()).collect();
    names.sort();
    names
}

#[test]
fn test_recommended_drops_cloudy_patch() {
    let fx = fixture();
    let options = BuildOptions::default().with_n_workers(2);

    let raw = build_raw(&fx.archive, &options, &fx.ctx).unwrap();
    assert_eq!(raw.table.len(), 2);
    assert!(raw.report.is_clean());
    assert_eq!(raw.report.discovered, 2);

    let recommended =
        build_recommended(&fx.archive, &options, &fx.ctx, &QualityFilter::default()).unwrap();
    assert_eq!(sorted_names(&recommended.table), vec![CLEAN.to_string()]);

    let row = recommended.table.get(CLEAN).unwrap();
    assert_eq!(row.country, Some(CountryLabel::Known("Austria".to_string())));
    assert_eq!(row.season, Some(Season::Summer));
    assert_eq!(row.source_crs, Some(Crs::from_epsg(32633)));
    assert_eq!(row.geometry.as_ref().unwrap().crs(), Crs::ETRS89_LAEA);
    assert_eq!(row.formatted_acquisition().as_deref(), Some("2017-06-13 10:10:31"));
}

#[test]
fn test_empty_archive_gives_empty_table() {
    let fx = fixture();
    let empty = fx.work.join("empty");
    fs::create_dir_all(&empty).unwrap();

    let built = build_raw(&empty, &BuildOptions::default(), &fx.ctx).unwrap();
    assert!(built.table.is_empty());
    assert_eq!(built.table.crs(), Crs::ETRS89_LAEA);
    assert!(built.report.is_clean());
}

#[test]
fn test_missing_archive_is_an_io_error() {
    let fx = fixture();
    let err = build_raw(&fx.work.join("nowhere"), &BuildOptions::default(), &fx.ctx).unwrap_err();
    assert!(matches!(err, BenGdfError::Io(_)));
}

#[test]
fn test_failure_policies() {
    let fx = fixture();
    let mut broken = s2_metadata(2.0, "2018-02-05 10:02:11", false);
    broken.as_object_mut().unwrap().remove("coordinates");
    write_patch(&fx.archive, SNOWY, &broken);

    let err = build_raw(&fx.archive, &BuildOptions::default(), &fx.ctx).unwrap_err();
    assert!(matches!(
        err,
        BenGdfError::Patch(PatchError::MissingMetadata { ref patch, ref field })
            if patch == SNOWY && field == "coordinates"
    ));

    let lenient = BuildOptions::default().with_policy(FailurePolicy::Lenient);
    let built = build_raw(&fx.archive, &lenient, &fx.ctx).unwrap();
    assert_eq!(built.table.len(), 3);
    assert_eq!(built.report.failures.len(), 1);
    assert_eq!(built.report.failures[0].name, SNOWY);
    assert_eq!(built.report.failures[0].kind, "MissingMetadata");

    let failed = built.table.get(SNOWY).unwrap();
    assert!(failed.is_failed());
    assert!(failed.geometry.is_none());
    // failed rows never reach the recommended table
    let recommended = QualityFilter::default().apply(&built.table);
    assert!(!recommended.contains_key(SNOWY));
}

#[test]
fn test_quality_lists_flag_s1_patches_through_their_twin() {
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("BigEarthNet-S1");
    fs::create_dir_all(&archive).unwrap();
    let s1_name = "S1A_IW_GRDH_1SDV_20170613T165043_33UUP_0_0";
    write_patch(
        &archive,
        s1_name,
        &json!({
            "labels": ["Pastures"],
            "coordinates": {
                "ulx": 500_000.0, "uly": 5_300_000.0, "lrx": 501_200.0, "lry": 5_298_800.0
            },
            "projection": "EPSG:32633",
            "acquisition_time": "2017-06-13T16:50:43",
            "corresponding_s2_patch": CLOUDY,
        }),
    );
    let cloud_list = dir.path().join("patches_with_cloud_and_shadow.csv");
    fs::write(&cloud_list, format!("{CLOUDY}\n")).unwrap();

    let inputs = ReferenceInputs::new(countries_file(dir.path()))
        .with_cloud_shadow_list(Some(cloud_list));
    let ctx = load_context(&inputs, Crs::ETRS89_LAEA).unwrap();
    let options = BuildOptions::for_sensor(Sensor::S1);

    let built = build_raw(&archive, &options, &ctx).unwrap();
    let row = built.table.get(s1_name).unwrap();
    let flags = row.quality.unwrap();
    assert!(flags.cloud && flags.shadow && !flags.snow);
    assert_eq!(row.formatted_acquisition().as_deref(), Some("2017-06-13T16:50:43"));

    let recommended =
        build_recommended(&archive, &options, &ctx, &QualityFilter::default()).unwrap();
    assert!(recommended.table.is_empty());
}

#[test]
fn test_extend_adds_missing_columns_only() {
    let fx = fixture();
    let built = build_raw(&fx.archive, &BuildOptions::default(), &fx.ctx).unwrap();

    // a table holding only the country column, with a stale value
    let rows = built.table.iter().cloned().map(|mut row| {
        row.season = None;
        row.quality = None;
        row.country = Some(CountryLabel::Known("Atlantis".to_string()));
        row
    });
    let base = Table::from_rows(Crs::ETRS89_LAEA, [DerivedColumn::Country], rows).unwrap();

    let extended = extend(&base, &ExtendSpec::all(), &fx.ctx).unwrap();
    assert_eq!(extended.columns().len(), DerivedColumn::ALL.len());
    for (before, after) in base.iter().zip(extended.iter()) {
        assert_eq!(after.name, before.name);
        assert_eq!(after.geometry, before.geometry);
        assert_eq!(after.acquisition, before.acquisition);
        assert_eq!(after.country, before.country);
        assert_eq!(after.season, Some(Season::Summer));
        assert!(after.quality.is_some());
    }

    let overwritten = extend(&base, &ExtendSpec::all().with_overwrite(true), &fx.ctx).unwrap();
    assert_eq!(
        overwritten.get(CLEAN).unwrap().country,
        Some(CountryLabel::Known("Austria".to_string()))
    );
}

#[test]
fn test_recommended_drops_patches_without_nineteen_class_labels() {
    let fx = fixture();
    let mut harbour = s2_metadata(2.0, "2017-06-13 10:10:31", false);
    harbour["labels"] = json!(["Port areas", "Airports"]);
    write_patch(&fx.archive, SNOWY, &harbour);

    let raw = build_raw(&fx.archive, &BuildOptions::default(), &fx.ctx).unwrap();
    let row = raw.table.get(SNOWY).unwrap();
    assert_eq!(row.new_labels, Some(Vec::new()));
    assert_eq!(
        raw.table.get(CLEAN).unwrap().new_labels,
        Some(vec!["Pastures".to_string(), "Coniferous forest".to_string()])
    );

    let recommended = QualityFilter::default().apply(&raw.table);
    assert_eq!(sorted_names(&recommended), vec![CLEAN.to_string()]);
    let kept = QualityFilter::default()
        .with_require_labels(false)
        .apply(&raw.table);
    assert!(kept.contains_key(SNOWY));
}

#[test]
fn test_split_lists_fill_original_split() {
    let fx = fixture();
    let train = fx.work.join("train.csv");
    let test = fx.work.join("test.csv");
    fs::write(&train, format!("{CLEAN}\n")).unwrap();
    fs::write(&test, format!("{CLOUDY}\n")).unwrap();
    let format = GeoParquetFormat::default();

    // built without split lists
    let raw = build_raw_parquet(
        &fx.archive,
        &fx.work,
        &BuildOptions::default(),
        &fx.ctx,
        &format,
    )
    .unwrap();
    let before = format.read_table(&raw.path).unwrap();
    assert!(
        before
            .iter()
            .all(|row| row.original_split == Some(OriginalSplit::Unassigned))
    );

    let inputs = ReferenceInputs::new(countries_file(&fx.work)).with_split_lists(
        Some(train),
        None,
        Some(test),
    );
    let ctx = load_context(&inputs, Crs::ETRS89_LAEA).unwrap();
    let spec = ExtendSpec::new([DerivedColumn::OriginalSplit])
        .with_overwrite(true)
        .with_n_workers(2);
    let extended = extend_parquet(
        &raw.path,
        "S2_split.parquet",
        &spec,
        ExtendSource::Archive {
            root: &fx.archive,
            sensor: Sensor::S2,
        },
        &ctx,
        &format,
    )
    .unwrap();

    let table = format.read_table(&extended).unwrap();
    let clean = table.get(CLEAN).unwrap();
    assert_eq!(clean.original_split, Some(OriginalSplit::Train));
    assert_eq!(clean.new_labels, before.get(CLEAN).unwrap().new_labels);
    assert_eq!(
        table.get(CLOUDY).unwrap().original_split,
        Some(OriginalSplit::Test)
    );
}

#[test]
fn test_extend_from_archive_rejects_unknown_patches() {
    let fx = fixture();
    let recommended = build_recommended(
        &fx.archive,
        &BuildOptions::default(),
        &fx.ctx,
        &QualityFilter::default(),
    )
    .unwrap();

    let err = extend_from_archive(
        &recommended.table,
        &fx.archive,
        Sensor::S2,
        &ExtendSpec::new([DerivedColumn::Season]),
        &fx.ctx,
    )
    .unwrap_err();
    assert!(matches!(
        err,
        BenGdfError::Patch(PatchError::UnknownPatchKey { ref key }) if key == CLOUDY
    ));
}

#[test]
fn test_parquet_operations() {
    let fx = fixture();
    let format = GeoParquetFormat::default();
    let options = BuildOptions::default();
    let intermediate = fx.work.join("intermediate");

    let raw = build_raw_parquet(&fx.archive, &fx.work, &options, &fx.ctx, &format).unwrap();
    assert_eq!(raw.path, fx.work.join("S2_raw.parquet"));
    assert_eq!(raw.rows, 2);

    let recommended = build_recommended_parquet(
        &fx.archive,
        &fx.work.join("recommended.parquet"),
        &options,
        &fx.ctx,
        &QualityFilter::default(),
        Some(&intermediate),
        &format,
    )
    .unwrap();
    assert_eq!(recommended.rows, 1);
    assert!(intermediate.join("S2_raw.parquet").is_file());

    let info = dataset_info(&recommended.path).unwrap();
    assert_eq!(info.format, "GeoParquet");
    assert_eq!(info.crs.as_deref(), Some("EPSG:3035"));
    assert_eq!(info.num_rows, 1);
    assert_eq!(info.derived_columns, DerivedColumn::ALL.to_vec());
    assert_eq!(info.geometry_columns.len(), 1);
    assert_eq!(info.geometry_columns[0].encoding, "WKB");
    assert!(info.fields.iter().any(|field| field.name == "season"));

    let cleaned = remove_discouraged_parquet(
        &raw.path,
        "S2_cleaned.parquet",
        &QualityFilter::default(),
        &format,
    )
    .unwrap();
    assert_eq!(cleaned, fx.work.join("S2_cleaned.parquet"));
    let once = format.read_table(&cleaned).unwrap();
    assert_eq!(sorted_names(&once), vec![CLEAN.to_string()]);

    let twice = remove_discouraged_parquet(
        &cleaned,
        "S2_cleaned_twice.parquet",
        &QualityFilter::default(),
        &format,
    )
    .unwrap();
    assert_eq!(format.read_table(&twice).unwrap(), once);

    let extended = extend_parquet(
        &raw.path,
        "S2_extended.parquet",
        &ExtendSpec::all(),
        ExtendSource::Rows,
        &fx.ctx,
        &format,
    )
    .unwrap();
    // every column already exists, so nothing changes
    assert_eq!(
        format.read_table(&extended).unwrap(),
        format.read_table(&raw.path).unwrap()
    );
}

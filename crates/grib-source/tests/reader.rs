//! Reader tests: field assembly feeding the level transform, and an
//! optional pass over a real DINI run directory.

use chrono::{DateTime, TimeZone, Utc};
use grib_source::{
    copy_cf_standard_names, DecodedMessage, FieldCollector, GribSourceReader, GridMapping,
    ParameterTable, SourceConfig,
};
use level_transform::{
    resolve, stitch, LevelRequest, LevelType, NameTemplate, OrderedMap, SourceReader,
};
use test_utils::{assert_no_missing, require_test_file};

fn analysis() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 2, 17, 1, 0, 0).unwrap()
}

/// Messages as they appear in a Harmonie run: `u` on model heights,
/// with 10 m and 100 m reported as `10u` / `100u`.
fn wind_messages(table: &ParameterTable) -> Vec<DecodedMessage> {
    let mut messages = Vec::new();
    for step in [0.0, 1.0] {
        for level in [10.0, 50.0, 100.0, 150.0] {
            let entry = table
                .lookup((0, 2, 2), Some(LevelType::HeightAboveGround), level)
                .unwrap()
                .clone();
            messages.push(DecodedMessage {
                entry,
                level,
                step_hours: step,
                grid: (2, 2),
                values: vec![level as f32 + step as f32; 4],
            });
        }
    }
    messages
}

#[test]
fn test_collected_wind_stitches_dense() {
    let table = ParameterTable::builtin();
    let mut collector = FieldCollector::new(LevelType::HeightAboveGround, analysis());
    for message in wind_messages(&table) {
        collector.push(message).unwrap();
    }
    let mut fields = collector.finish().unwrap();
    copy_cf_standard_names(&mut fields);

    assert_eq!(fields["u"].labels("level").unwrap(), vec![50.0, 150.0]);
    assert_eq!(fields["10u"].level_attr(), Some(10.0));
    assert_eq!(fields["100u"].attrs["paramId"], 228246);

    let groups = [level_transform::SpecialFieldGroup {
        quantity: "u".into(),
        alternates: vec![("10u".into(), 10.0), ("100u".into(), 100.0)],
    }];
    let stitched = stitch(fields, &groups).unwrap();
    let u = &stitched["u"];
    assert_eq!(u.labels("level").unwrap(), vec![50.0, 150.0, 10.0, 100.0]);
    assert_no_missing!(u.values.iter());
    assert_eq!(u.attrs["standard_name"], "eastward_wind");

    let at_100 = u.sel_one("level", 100.0).unwrap();
    assert_eq!(at_100.values[[1, 0, 0]], 101.0);
}

#[test]
fn test_collected_fields_resolve_with_template() {
    let table = ParameterTable::builtin();
    let mut collector = FieldCollector::new(LevelType::HeightAboveGround, analysis());
    for message in wind_messages(&table) {
        collector.push(message).unwrap();
    }
    let fields = collector.finish().unwrap();

    let vars: OrderedMap<LevelRequest> = [("10u", LevelRequest::Implicit)].into_iter().collect();
    let template = NameTemplate::parse("u10m").unwrap();
    let out = resolve(&fields, LevelType::HeightAboveGround, &vars, Some(&template)).unwrap();
    assert!(out.fields.contains_key("u10m"));
}

#[test]
fn test_grid_mapping_travels_with_selection() {
    let table = ParameterTable::builtin();
    let mut collector = FieldCollector::new(LevelType::HeightAboveGround, analysis());
    for message in wind_messages(&table) {
        collector.push(message).unwrap();
    }
    let mut fields = collector.finish().unwrap();
    let mapping: GridMapping = serde_yaml::from_str(
        "name: dini_projection\nattributes:\n  grid_mapping_name: lambert_conformal_conic\n",
    )
    .unwrap();
    mapping.apply(&mut fields).unwrap();

    let vars: OrderedMap<LevelRequest> = [("u", LevelRequest::Explicit(vec![50.0]))]
        .into_iter()
        .collect();
    let out = resolve(&fields, LevelType::HeightAboveGround, &vars, None).unwrap();
    assert!(out.auxiliary.contains_key("dini_projection"));
}

#[test]
fn test_read_sample_run() {
    let sample = require_test_file!("dini_run");
    let root = sample.parent().unwrap().to_path_buf();
    let config = SourceConfig::new(root, analysis()).with_run_dir_pattern("dini_run");
    let mut reader = GribSourceReader::new(config, ParameterTable::builtin());

    let fields = reader.read_level_type(LevelType::HeightAboveGround).unwrap();
    assert!(!fields.is_empty());
    for field in fields.values() {
        assert_eq!(field.dims[0], "time");
        assert!(field.attrs.contains_key("shortName"));
    }
}

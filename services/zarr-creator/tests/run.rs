//! Runs against an in-memory source writing local stores.

use std::collections::HashMap;
use std::io;

use chrono::{DateTime, Utc};
use level_transform::{CollectionSpec, LevelType, SourceReader};
use nwp_common::FieldSet;
use test_utils::grids::{NX, NY, STEPS};
use test_utils::times::{ANALYSIS_TIME, STORE_TIME};
use test_utils::{
    assert_approx_eq, cell_value, field_set, profile_field, surface_field,
    temp_test_dir_with_prefix,
};
use zarr_creator::config_loader::OutputSection;
use zarr_creator::{run_collection, PartStatus};
use zarr_store::{read_group_attributes, read_variable, StoreConfig, ZarrCompression};

struct MemoryReader(HashMap<LevelType, FieldSet>);

impl SourceReader for MemoryReader {
    type Error = io::Error;

    fn read_level_type(&mut self, level_type: LevelType) -> Result<FieldSet, io::Error> {
        self.0.get(&level_type).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("no {level_type} data"))
        })
    }
}

fn analysis() -> DateTime<Utc> {
    ANALYSIS_TIME.parse().unwrap()
}

fn reader() -> MemoryReader {
    let above_ground = field_set([
        surface_field("hcc", STEPS, 0.0, NY, NX, 0.5),
        profile_field("t", STEPS, &[0.0, 50.0], NY, NX),
        surface_field("2t", STEPS, 2.0, NY, NX, 275.0),
    ]);
    let isobaric = field_set([profile_field("t", STEPS, &[850.0, 500.0], NY, NX)]);
    MemoryReader(HashMap::from([
        (LevelType::HeightAboveGround, above_ground),
        (LevelType::IsobaricInhPa, isobaric),
    ]))
}

fn collection() -> CollectionSpec {
    CollectionSpec::from_yaml(
        r#"
description: test run
strict_chunking: true
chunking:
  time: 1
  x: {split: 2}
  y: {split: 2}
parts:
  - name: single_levels
    selections:
      - level_type: heightAboveGround
        variables:
          hcc: null
      - level_type: heightAboveGround
        variables:
          t: [2]
        level_name_mapping: "{var_name}{level:d}m"
  - name: geopotential
    selections:
      - level_type: isobaricInhPa
        variables:
          z: [850]
  - name: pressure_levels
    selections:
      - level_type: isobaricInhPa
        variables:
          t: [850, 500]
"#,
    )
    .unwrap()
}

fn output(root: &std::path::Path) -> OutputSection {
    OutputSection {
        template: format!("{}/{{member}}/{{t_analysis}}/{{dataset_id}}.zarr", root.display()),
        member: "control".to_string(),
        store: StoreConfig {
            compression: ZarrCompression::None,
            ..Default::default()
        },
    }
}

#[tokio::test]
async fn test_failed_part_does_not_stop_run() {
    let tmp = tempfile::tempdir().unwrap();
    let report = run_collection(&collection(), reader(), &output(tmp.path()), analysis(), false)
        .await
        .unwrap();

    assert_eq!(report.outcomes.len(), 3);
    assert_eq!(report.failed(), vec!["geopotential"]);
    assert!(!report.is_success());
    assert!(matches!(report.outcomes[0].status, PartStatus::Written(_)));
    assert!(matches!(report.outcomes[2].status, PartStatus::Written(_)));
    let run_dir = tmp.path().join("control").join(STORE_TIME);
    assert!(!run_dir.join("geopotential.zarr").exists());

    let single = run_dir.join("single_levels.zarr");
    let t2m = read_variable(&single, "t2m").unwrap();
    assert_eq!(t2m.dims, vec!["time", "y", "x"]);
    assert!(t2m.values.iter().all(|&v| v == 275.0));
    assert_eq!(t2m.attrs["level"], 2.0);
    assert!(read_variable(&single, "hcc").is_ok());

    let attrs = read_group_attributes(&single).unwrap();
    assert_eq!(attrs["zarr_creator_version"], level_transform::VERSION);
    assert_eq!(attrs["description"], "test run");

    let t = read_variable(&run_dir.join("pressure_levels.zarr"), "t").unwrap();
    assert_eq!(t.dims, vec!["time", "pressure", "y", "x"]);
    assert_approx_eq!(t.values[[1, 0, 2, 3]], cell_value(850.0, 1, 2, 3), 1e-6);
    assert_approx_eq!(t.values[[2, 1, 0, 5]], cell_value(500.0, 2, 0, 5), 1e-6);
}

#[tokio::test]
async fn test_dry_run_writes_nothing() {
    let tmp = temp_test_dir_with_prefix("zarr_creator_dry_run_");
    let report = run_collection(&collection(), reader(), &output(tmp.path()), analysis(), true)
        .await
        .unwrap();

    assert!(matches!(
        report.outcomes[0].status,
        PartStatus::Planned { variables: 2 }
    ));
    assert_eq!(report.failed(), vec!["geopotential"]);
    assert!(!tmp.path().join("control").exists());
}

#[tokio::test]
async fn test_naming_collision_fails_before_write() {
    let collection = CollectionSpec::from_yaml(
        r#"
parts:
  - name: surface
    selections:
      - level_type: heightAboveGround
        variables:
          t: [0]
        level_name_mapping: "{var_name}{level:d}m"
      - level_type: heightAboveGround
        variables:
          t: [0, 2]
        level_name_mapping: "{var_name}{level:d}m"
"#,
    )
    .unwrap();
    let tmp = tempfile::tempdir().unwrap();
    let report = run_collection(&collection, reader(), &output(tmp.path()), analysis(), false)
        .await
        .unwrap();

    assert_eq!(report.failed(), vec!["surface"]);
    match &report.outcomes[0].status {
        PartStatus::Failed(reason) => assert!(reason.contains("t0m"), "{reason}"),
        other => panic!("expected failure, got {other:?}"),
    }
    let stores: Vec<_> = walkdir::WalkDir::new(tmp.path())
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "zarr"))
        .collect();
    assert!(stores.is_empty());
    assert!(!tmp.path().join("control").exists());
}

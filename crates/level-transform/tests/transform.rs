//! End-to-end tests of resolve, stitch, assemble and plan on synthetic
//! DINI-like fields.

use std::collections::BTreeMap;

use level_transform::{
    assemble, plan_dims, resolve, stitch, ChunkSize, LevelRequest, LevelType, NameTemplate,
    OrderedMap, SpecialFieldGroup, Strictness, TransformError,
};
use nwp_common::FieldSet;
use test_utils::grids::{NX, NY, STEPS};
use test_utils::levels::{PRESSURE_HPA, WIND_HEIGHTS_M};
use test_utils::{
    assert_no_missing, cell_value, field_set, profile_field, surface_field, with_missing_levels,
};

fn u_source() -> FieldSet {
    let u = with_missing_levels(
        profile_field("u", STEPS, &[10.0, 50.0, 100.0, 150.0], NY, NX),
        &[10.0, 100.0],
    );
    field_set([
        u,
        surface_field("10u", STEPS, 10.0, NY, NX, 5.0),
        surface_field("100u", STEPS, 100.0, NY, NX, 8.0),
    ])
}

fn u_group() -> SpecialFieldGroup {
    SpecialFieldGroup {
        quantity: "u".into(),
        alternates: vec![("10u".into(), 10.0), ("100u".into(), 100.0)],
    }
}

#[test]
fn test_stitch_wind_levels() {
    let fields = stitch(u_source(), &[u_group()]).unwrap();

    assert!(!fields.contains_key("10u"));
    assert!(!fields.contains_key("100u"));

    let u = &fields["u"];
    assert_eq!(u.labels("level").unwrap(), vec![50.0, 150.0, 10.0, 100.0]);
    assert_no_missing!(u.values.iter());

    let at = |level: f64| u.sel_one("level", level).unwrap();
    assert!(at(10.0).values.iter().all(|&v| v == 5.0));
    assert!(at(100.0).values.iter().all(|&v| v == 8.0));
    assert_eq!(at(50.0).values[[1, 2, 3]], cell_value(50.0, 1, 2, 3));
    assert_eq!(at(150.0).values[[0, 0, 0]], cell_value(150.0, 0, 0, 0));
}

#[test]
fn test_stitch_level_axis_is_union_without_duplicates() {
    let groups = [u_group()];
    for original in [
        vec![10.0, 50.0, 100.0, 150.0],
        vec![50.0, 150.0],
        vec![100.0, 10.0, 250.0],
        WIND_HEIGHTS_M.to_vec(),
    ] {
        let fields = field_set([
            profile_field("u", 1, &original, 2, 2),
            surface_field("10u", 1, 10.0, 2, 2, 5.0),
            surface_field("100u", 1, 100.0, 2, 2, 8.0),
        ]);
        let stitched = stitch(fields, &groups).unwrap();
        let labels = stitched["u"].labels("level").unwrap();

        let mut expected: Vec<f64> = original
            .iter()
            .copied()
            .filter(|l| *l != 10.0 && *l != 100.0)
            .collect();
        expected.extend([10.0, 100.0]);
        assert_eq!(labels, expected);
        assert_no_missing!(stitched["u"].values.iter());
    }
}

#[test]
fn test_stitch_missing_alternate() {
    let mut fields = u_source();
    fields.remove("100u");
    let err = stitch(fields, &[u_group()]).unwrap_err();
    assert!(matches!(
        err,
        TransformError::MissingSpecialField { ref field, level } if field == "100u" && level == 100.0
    ));
}

#[test]
fn test_resolve_preserves_values() {
    let source = field_set([profile_field("z", STEPS, &PRESSURE_HPA, NY, NX)]);
    for &level in &PRESSURE_HPA {
        let vars: OrderedMap<LevelRequest> = [("z", LevelRequest::Explicit(vec![level]))]
            .into_iter()
            .collect();
        let out = resolve(&source, LevelType::IsobaricInhPa, &vars, None).unwrap();
        let z = &out.fields["z"].field;
        let expected = source["z"].sel("level", &[level]).unwrap();
        assert!(z.identical(&expected));
    }
}

#[test]
fn test_resolve_template_into_flat_names() {
    let source = field_set([profile_field("t", STEPS, &[0.0, 2.0], NY, NX)]);
    let vars: OrderedMap<LevelRequest> = [("t", LevelRequest::Explicit(vec![0.0, 2.0]))]
        .into_iter()
        .collect();
    let template = NameTemplate::parse("{var_name}{level:d}m").unwrap();
    let out = resolve(&source, LevelType::HeightAboveGround, &vars, Some(&template)).unwrap();

    let names: Vec<_> = out.fields.keys().cloned().collect();
    assert_eq!(names, vec!["t0m".to_string(), "t2m".to_string()]);
    for (name, level) in [("t0m", 0.0), ("t2m", 2.0)] {
        let field = &out.fields[name].field;
        let slice = source["t"].sel_one("level", level).unwrap();
        assert_eq!(field.dims, slice.dims);
        assert_eq!(field.values, slice.values);
        assert_eq!(field.level_attr(), Some(level));
    }
}

#[test]
fn test_naming_collision_across_selections() {
    let template = NameTemplate::parse("{var_name}{level:d}m").unwrap();
    let vars: OrderedMap<LevelRequest> = [("t", LevelRequest::Explicit(vec![0.0]))]
        .into_iter()
        .collect();

    let above_ground = field_set([profile_field("t", 1, &[0.0, 2.0], 2, 2)]);
    let above_sea = field_set([profile_field("t", 1, &[0.0], 2, 2)]);
    let first = resolve(&above_ground, LevelType::HeightAboveGround, &vars, Some(&template)).unwrap();
    let second = resolve(&above_sea, LevelType::HeightAboveSea, &vars, Some(&template)).unwrap();

    let err = assemble(&[first, second]).unwrap_err();
    assert!(matches!(err, TransformError::NamingCollision { ref name, .. } if name == "t0m"));
}

#[test]
fn test_assemble_twice_is_identical() {
    let source = stitch(u_source(), &[u_group()]).unwrap();
    let levels: OrderedMap<LevelRequest> = [
        ("u", LevelRequest::Explicit(vec![50.0, 100.0])),
    ]
    .into_iter()
    .collect();
    let flat: OrderedMap<LevelRequest> = [("u", LevelRequest::Explicit(vec![10.0]))]
        .into_iter()
        .collect();
    let template = NameTemplate::parse("{var_name}{level:d}m").unwrap();

    let outputs = || {
        vec![
            resolve(&source, LevelType::HeightAboveGround, &levels, None).unwrap(),
            resolve(&source, LevelType::HeightAboveGround, &flat, Some(&template)).unwrap(),
        ]
    };
    let a = assemble(&outputs()).unwrap();
    let b = assemble(&outputs()).unwrap();
    assert!(a.identical(&b));
    assert_eq!(a.variable("u").unwrap().dims[1], "altitude");
    assert!(a.contains("u10m"));
}

#[test]
fn test_plan_on_assembled_part() {
    let source = field_set([profile_field("z", STEPS, &PRESSURE_HPA, NY, NX)]);
    let vars: OrderedMap<LevelRequest> = [("z", LevelRequest::Explicit(PRESSURE_HPA.to_vec()))]
        .into_iter()
        .collect();
    let ds = assemble(&[resolve(&source, LevelType::IsobaricInhPa, &vars, None).unwrap()]).unwrap();

    let requested: BTreeMap<String, ChunkSize> = [
        ("time".to_string(), ChunkSize::Length(1)),
        ("x".to_string(), ChunkSize::Split { split: 2 }),
        ("y".to_string(), ChunkSize::Split { split: 2 }),
        ("pressure".to_string(), ChunkSize::Length(100)),
    ]
    .into_iter()
    .collect();
    let plan = plan_dims(ds.dim_sizes(), &requested, Strictness::Strict).unwrap();
    assert_eq!(plan.chunks["time"], 1);
    assert_eq!(plan.chunks["x"], NX / 2);
    assert_eq!(plan.chunks["y"], NY / 2);
    assert_eq!(plan.chunks["pressure"], PRESSURE_HPA.len());
    assert_eq!(plan.warnings.len(), 1);
}

//! Dataset assembly for one collection part.

use std::collections::BTreeMap;

use nwp_common::{Dataset, Field, LEVEL_DIM};
use tracing::debug;

use crate::error::{Result, TransformError};
use crate::resolver::Resolved;

/// Rename the generic `level` dimension to the level-type's vertical name.
fn rename_vertical(mut field: Field, resolved: &Resolved) -> Result<Field> {
    if let Some(vertical) = resolved.level_type.vertical_dim() {
        if field.axis(LEVEL_DIM).is_some() {
            field.rename_dim(LEVEL_DIM, vertical)?;
            if let (Some(units), Some(coord)) =
                (resolved.level_type.level_units(), field.coords.get_mut(vertical))
            {
                coord.attrs.insert("units".into(), units.into());
            }
        }
    }
    Ok(field)
}

/// Merge resolved selections into one dataset.
///
/// Output names must be unique across all selections; grid-mapping
/// fields may repeat if identical. The `level` dimension becomes
/// `pressure` or `altitude` depending on the level-type. Coordinates not
/// spanned by any data variable are dropped, so a part without variables
/// yields an empty dataset.
pub fn assemble(outputs: &[Resolved]) -> Result<Dataset> {
    // Collisions are checked before anything is merged.
    let mut origins: BTreeMap<&str, String> = BTreeMap::new();
    let mut aux: BTreeMap<&str, (&Field, String)> = BTreeMap::new();
    for resolved in outputs {
        for name in resolved.fields.keys() {
            let here = resolved.describe(name);
            let first = origins
                .get(name.as_str())
                .or_else(|| aux.get(name.as_str()).map(|(_, origin)| origin));
            if let Some(first) = first {
                return Err(TransformError::NamingCollision {
                    name: name.clone(),
                    first: first.clone(),
                    second: here,
                });
            }
            origins.insert(name, here);
        }
        for (name, field) in &resolved.auxiliary {
            let here = resolved.describe(name);
            if let Some(first) = origins.get(name.as_str()) {
                return Err(TransformError::NamingCollision {
                    name: name.clone(),
                    first: first.clone(),
                    second: here,
                });
            }
            match aux.get(name.as_str()) {
                Some((existing, _)) if existing.identical(field) => {}
                Some((_, first)) => {
                    return Err(TransformError::NamingCollision {
                        name: name.clone(),
                        first: first.clone(),
                        second: here,
                    })
                }
                None => {
                    aux.insert(name, (field, here));
                }
            }
        }
    }

    let mut dataset = Dataset::new();
    for resolved in outputs {
        for (name, output) in &resolved.fields {
            let field = rename_vertical(output.field.clone(), resolved)?;
            debug!(variable = %name, level_type = %resolved.level_type, "Merging variable");
            dataset.insert_field(field)?;
        }
    }
    for (field, _) in aux.into_values() {
        dataset.insert_field(field.clone())?;
    }

    drop_orphaned_coords(&mut dataset);
    Ok(dataset)
}

/// Drop coordinates whose dimensions no data variable spans.
fn drop_orphaned_coords(dataset: &mut Dataset) {
    let orphans: Vec<String> = dataset
        .coords()
        .iter()
        .filter(|(_, coord)| {
            !dataset
                .data_vars()
                .values()
                .any(|var| coord.dims.iter().all(|d| var.dims.contains(d)))
        })
        .map(|(name, _)| name.clone())
        .collect();
    for name in orphans {
        debug!(coord = %name, "Dropping unused coordinate");
        dataset.drop_coord(&name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level_type::LevelType;
    use crate::resolver::ResolvedField;
    use ndarray::{ArrayD, IxDyn};
    use nwp_common::Coordinate;

    fn leveled(name: &str, levels: &[f64]) -> Field {
        let values = ArrayD::from_elem(IxDyn(&[levels.len(), 2]), 1.0f32);
        Field::new(name, vec!["level".into(), "x".into()], values)
            .unwrap()
            .with_coord("level", Coordinate::index("level", levels.to_vec()))
            .unwrap()
            .with_coord("x", Coordinate::index("x", vec![0.0, 1.0]))
            .unwrap()
    }

    fn resolved(level_type: LevelType, fields: Vec<Field>) -> Resolved {
        Resolved {
            level_type,
            fields: fields
                .into_iter()
                .map(|f| {
                    (
                        f.name.clone(),
                        ResolvedField {
                            source: f.name.clone(),
                            field: f,
                        },
                    )
                })
                .collect(),
            auxiliary: BTreeMap::new(),
        }
    }

    #[test]
    fn test_renames_vertical_dimension() {
        let ds = assemble(&[resolved(LevelType::IsobaricInhPa, vec![leveled("z", &[500.0])])])
            .unwrap();
        let z = ds.variable("z").unwrap();
        assert_eq!(z.dims, vec!["pressure".to_string(), "x".to_string()]);
        assert!(ds.coord("level").is_none());
        assert_eq!(ds.coord("pressure").unwrap().attrs["units"], "hPa");
    }

    #[test]
    fn test_entire_atmosphere_keeps_level() {
        let ds = assemble(&[resolved(
            LevelType::EntireAtmosphere,
            vec![leveled("cape", &[0.0, 1.0])],
        )])
        .unwrap();
        assert_eq!(ds.variable("cape").unwrap().dims[0], "level");
    }

    #[test]
    fn test_collision_across_selections() {
        let a = resolved(LevelType::HeightAboveGround, vec![leveled("t0m", &[0.0])]);
        let b = resolved(LevelType::HeightAboveSea, vec![leveled("t0m", &[0.0])]);
        let err = assemble(&[a, b]).unwrap_err();
        match err {
            TransformError::NamingCollision { name, first, second } => {
                assert_eq!(name, "t0m");
                assert!(first.contains("heightAboveGround"));
                assert!(second.contains("heightAboveSea"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_part_is_empty_dataset() {
        let ds = assemble(&[resolved(LevelType::HeightAboveGround, vec![])]).unwrap();
        assert!(ds.is_empty());
        assert!(ds.coords().is_empty());
        assert!(ds.dim_sizes().is_empty());
    }

    #[test]
    fn test_orphaned_coordinate_dropped() {
        let mut ds = Dataset::new();
        ds.insert_field(leveled("t", &[2.0])).unwrap();
        ds.insert_coord("step", Coordinate::index("step", vec![0.0, 1.0]))
            .unwrap();
        drop_orphaned_coords(&mut ds);
        assert!(ds.coord("step").is_none());
        assert!(ds.coord("x").is_some());
        assert!(!ds.dim_sizes().contains_key("step"));
    }

    #[test]
    fn test_conflicting_vertical_labels() {
        // Both level-types map to `altitude` but with different labels.
        let a = resolved(LevelType::HeightAboveGround, vec![leveled("t", &[2.0])]);
        let b = resolved(LevelType::HeightAboveSea, vec![leveled("pres", &[0.0])]);
        let err = assemble(&[a, b]).unwrap_err();
        assert!(matches!(err, TransformError::Dataset(_)));
    }

    #[test]
    fn test_identical_grid_mapping_shared() {
        let projection = Field::new("crs", vec![], ArrayD::from_elem(IxDyn(&[]), 0.0)).unwrap();
        let mut a = resolved(LevelType::HeightAboveGround, vec![leveled("t", &[2.0])]);
        a.auxiliary.insert("crs".into(), projection.clone());
        let mut c = resolved(LevelType::EntireAtmosphere, vec![leveled("cape", &[0.0])]);
        c.auxiliary.insert("crs".into(), projection.clone());
        let ds = assemble(&[a.clone(), c.clone()]).unwrap();
        assert!(ds.contains("crs"));

        let other = projection.with_attr("grid_mapping_name", "rotated_latitude_longitude");
        c.auxiliary.insert("crs".into(), other);
        assert!(matches!(
            assemble(&[a, c]),
            Err(TransformError::NamingCollision { .. })
        ));
    }

    #[test]
    fn test_assemble_is_deterministic() {
        let outputs = vec![
            resolved(LevelType::HeightAboveGround, vec![leveled("u", &[10.0, 50.0])]),
            resolved(LevelType::EntireAtmosphere, vec![leveled("cape", &[0.0])]),
        ];
        let first = assemble(&outputs).unwrap();
        let second = assemble(&outputs).unwrap();
        assert!(first.identical(&second));
    }
}

//! Level-selection resolver.

use std::collections::BTreeMap;

use nwp_common::{DatasetError, Field, FieldSet, LEVEL_DIM};

use crate::config::{LevelRequest, LevelSelectionSpec, OrderedMap};
use crate::error::{Result, TransformError};
use crate::level_type::LevelType;
use crate::stitcher::level_axis_position;
use crate::template::NameTemplate;

/// Attribute naming the CF grid-mapping variable of a field.
pub const GRID_MAPPING_ATTR: &str = "grid_mapping";

/// An output variable and the source variable it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedField {
    pub source: String,
    pub field: Field,
}

/// Everything one level selection contributes to a part.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub level_type: LevelType,
    /// Output variables keyed by output name.
    pub fields: BTreeMap<String, ResolvedField>,
    /// Grid-mapping fields referenced by the outputs, copied unchanged.
    pub auxiliary: BTreeMap<String, Field>,
}

impl Resolved {
    /// Human-readable origin of an output, used in collision reports.
    pub fn describe(&self, name: &str) -> String {
        match self.fields.get(name) {
            Some(f) => format!("`{}` ({})", f.source, self.level_type),
            None => format!("grid mapping `{name}` ({})", self.level_type),
        }
    }
}

impl LevelSelectionSpec {
    pub fn resolve(&self, source: &FieldSet) -> Result<Resolved> {
        resolve(
            source,
            self.level_type,
            &self.variables,
            self.level_name_mapping.as_ref(),
        )
    }
}

/// Project the configured variables of one level-type onto output fields.
///
/// - [`LevelRequest::Implicit`]: copied as-is, renamed through a
///   level-free template when one is given.
/// - Explicit levels without a template: selected along `level` in the
///   requested order.
/// - Explicit levels with a template: one single-level field per level,
///   named by the template. The level value is kept as the `level`
///   attribute.
///
/// Requested levels must exist in the source.
pub fn resolve(
    source: &FieldSet,
    level_type: LevelType,
    variables: &OrderedMap<LevelRequest>,
    template: Option<&NameTemplate>,
) -> Result<Resolved> {
    let mut resolved = Resolved {
        level_type,
        fields: BTreeMap::new(),
        auxiliary: BTreeMap::new(),
    };

    for (var_name, request) in variables.iter() {
        let field = source
            .get(var_name)
            .ok_or_else(|| TransformError::VariableNotFound {
                variable: var_name.to_string(),
                level_type: level_type.to_string(),
            })?;
        let selection_error = |e: DatasetError| match e {
            DatasetError::LevelNotFound { level, .. } => TransformError::Selection {
                variable: var_name.to_string(),
                level_type: level_type.to_string(),
                level,
            },
            other => TransformError::Dataset(other),
        };

        match (request, template) {
            (LevelRequest::Implicit, None) => {
                insert_output(&mut resolved, var_name.to_string(), var_name, field.clone())?;
            }
            (LevelRequest::Implicit, Some(template)) => {
                let name = template.render(var_name, None)?;
                insert_output(&mut resolved, name, var_name, field.clone())?;
            }
            (LevelRequest::Explicit(levels), None) => {
                let selected = select_levels(field, levels).map_err(selection_error)?;
                insert_output(&mut resolved, var_name.to_string(), var_name, selected)?;
            }
            (LevelRequest::Explicit(levels), Some(template)) => {
                for &level in levels {
                    let slice = select_one(field, level).map_err(selection_error)?;
                    let name = template.render(var_name, Some(level))?;
                    insert_output(&mut resolved, name, var_name, slice)?;
                }
            }
        }

        if let Some(mapping) = field.attrs.get(GRID_MAPPING_ATTR).and_then(|v| v.as_str()) {
            let aux = source
                .get(mapping)
                .ok_or_else(|| TransformError::VariableNotFound {
                    variable: mapping.to_string(),
                    level_type: level_type.to_string(),
                })?;
            resolved
                .auxiliary
                .entry(mapping.to_string())
                .or_insert_with(|| aux.clone());
        }
    }

    Ok(resolved)
}

fn insert_output(resolved: &mut Resolved, name: String, source: &str, field: Field) -> Result<()> {
    if resolved.fields.contains_key(&name) {
        return Err(TransformError::NamingCollision {
            first: resolved.describe(&name),
            second: format!("`{source}` ({})", resolved.level_type),
            name,
        });
    }
    let field = field.renamed(name.clone());
    resolved.fields.insert(
        name,
        ResolvedField {
            source: source.to_string(),
            field,
        },
    );
    Ok(())
}

/// Select `levels` along `level`, keeping their order.
///
/// A single-level source (no `level` axis) matches only its own level and
/// gains a length-1 axis.
fn select_levels(field: &Field, levels: &[f64]) -> std::result::Result<Field, DatasetError> {
    if field.axis(LEVEL_DIM).is_some() {
        return field.sel(LEVEL_DIM, levels);
    }
    let own = scalar_level(field, levels)?;
    let position = level_axis_position(field);
    field.clone().expand_dim(LEVEL_DIM, own, position)
}

/// Select one level and drop the `level` axis.
fn select_one(field: &Field, level: f64) -> std::result::Result<Field, DatasetError> {
    if field.axis(LEVEL_DIM).is_some() {
        return field.sel_one(LEVEL_DIM, level);
    }
    scalar_level(field, &[level])?;
    Ok(field.clone())
}

/// The level of a single-level field, checked against the request.
fn scalar_level(field: &Field, levels: &[f64]) -> std::result::Result<f64, DatasetError> {
    let own = field.level_attr();
    for &level in levels {
        if own != Some(level) {
            return Err(DatasetError::LevelNotFound {
                field: field.name.clone(),
                dim: LEVEL_DIM.to_string(),
                level,
            });
        }
    }
    own.ok_or_else(|| DatasetError::dimension_not_found(&field.name, LEVEL_DIM))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{ArrayD, IxDyn};
    use nwp_common::Coordinate;

    fn leveled(name: &str, levels: &[f64]) -> Field {
        let data: Vec<f32> = levels
            .iter()
            .flat_map(|l| [*l as f32, *l as f32 + 0.5])
            .collect();
        let values = ArrayD::from_shape_vec(IxDyn(&[levels.len(), 2]), data).unwrap();
        Field::new(name, vec!["level".into(), "x".into()], values)
            .unwrap()
            .with_coord("level", Coordinate::index("level", levels.to_vec()))
            .unwrap()
            .with_coord("x", Coordinate::index("x", vec![0.0, 1.0]))
            .unwrap()
    }

    fn source(fields: Vec<Field>) -> FieldSet {
        fields.into_iter().map(|f| (f.name.clone(), f)).collect()
    }

    #[test]
    fn test_implicit_copies_field() {
        let src = source(vec![leveled("hcc", &[0.0])]);
        let vars: OrderedMap<LevelRequest> = [("hcc", LevelRequest::Implicit)].into_iter().collect();
        let out = resolve(&src, LevelType::HeightAboveGround, &vars, None).unwrap();
        assert!(out.fields["hcc"].field.identical(&src["hcc"]));
    }

    #[test]
    fn test_implicit_with_template_renames() {
        let src = source(vec![leveled("cape", &[0.0])]);
        let vars: OrderedMap<LevelRequest> =
            [("cape", LevelRequest::Implicit)].into_iter().collect();
        let template = NameTemplate::parse("{var_name}_column").unwrap();
        let out = resolve(&src, LevelType::EntireAtmosphere, &vars, Some(&template)).unwrap();
        assert_eq!(out.fields["cape_column"].source, "cape");
        assert_eq!(out.fields["cape_column"].field.name, "cape_column");
    }

    #[test]
    fn test_implicit_with_level_template_fails() {
        let src = source(vec![leveled("hcc", &[0.0])]);
        let vars: OrderedMap<LevelRequest> = [("hcc", LevelRequest::Implicit)].into_iter().collect();
        let template = NameTemplate::parse("{var_name}{level:d}m").unwrap();
        let err = resolve(&src, LevelType::HeightAboveGround, &vars, Some(&template)).unwrap_err();
        assert!(matches!(err, TransformError::Template(_)));
    }

    #[test]
    fn test_explicit_selects_in_order() {
        let src = source(vec![leveled("z", &[1000.0, 850.0, 500.0])]);
        let vars: OrderedMap<LevelRequest> =
            [("z", LevelRequest::Explicit(vec![500.0, 1000.0]))].into_iter().collect();
        let out = resolve(&src, LevelType::IsobaricInhPa, &vars, None).unwrap();
        let z = &out.fields["z"].field;
        assert_eq!(z.labels("level").unwrap(), vec![500.0, 1000.0]);
        assert_eq!(z.values[[0, 0]], 500.0);
        assert_eq!(z.values[[1, 1]], 1000.5);
    }

    #[test]
    fn test_missing_level_is_selection_error() {
        let src = source(vec![leveled("z", &[1000.0, 850.0])]);
        let vars: OrderedMap<LevelRequest> =
            [("z", LevelRequest::Explicit(vec![700.0]))].into_iter().collect();
        let err = resolve(&src, LevelType::IsobaricInhPa, &vars, None).unwrap_err();
        assert!(matches!(
            err,
            TransformError::Selection { ref variable, level, .. } if variable == "z" && level == 700.0
        ));
    }

    #[test]
    fn test_missing_variable() {
        let src = source(vec![]);
        let vars: OrderedMap<LevelRequest> = [("z", LevelRequest::Implicit)].into_iter().collect();
        assert!(matches!(
            resolve(&src, LevelType::IsobaricInhPa, &vars, None),
            Err(TransformError::VariableNotFound { .. })
        ));
    }

    #[test]
    fn test_scalar_level_source_matches_own_level() {
        let r = Field::new("r", vec!["x".into()], ArrayD::from_elem(IxDyn(&[2]), 0.8))
            .unwrap()
            .with_attr("level", 2.0);
        let src = source(vec![r]);
        let template = NameTemplate::parse("{var_name}{level:d}m").unwrap();

        let vars: OrderedMap<LevelRequest> =
            [("r", LevelRequest::Explicit(vec![2.0]))].into_iter().collect();
        let out = resolve(&src, LevelType::HeightAboveGround, &vars, Some(&template)).unwrap();
        assert_eq!(out.fields["r2m"].field.level_attr(), Some(2.0));

        let vars: OrderedMap<LevelRequest> =
            [("r", LevelRequest::Explicit(vec![10.0]))].into_iter().collect();
        assert!(resolve(&src, LevelType::HeightAboveGround, &vars, Some(&template)).is_err());

        let vars: OrderedMap<LevelRequest> =
            [("r", LevelRequest::Explicit(vec![2.0]))].into_iter().collect();
        let out = resolve(&src, LevelType::HeightAboveGround, &vars, None).unwrap();
        assert_eq!(out.fields["r"].field.labels("level").unwrap(), vec![2.0]);
    }

    #[test]
    fn test_grid_mapping_is_copied() {
        let projection = Field::new("dini_projection", vec![], ArrayD::from_elem(IxDyn(&[]), 0.0))
            .unwrap()
            .with_attr("grid_mapping_name", "lambert_conformal_conic");
        let t = leveled("t", &[2.0]).with_attr(GRID_MAPPING_ATTR, "dini_projection");
        let src = source(vec![t, projection.clone()]);
        let vars: OrderedMap<LevelRequest> = [("t", LevelRequest::Implicit)].into_iter().collect();
        let out = resolve(&src, LevelType::HeightAboveGround, &vars, None).unwrap();
        assert!(out.auxiliary["dini_projection"].identical(&projection));
    }

    #[test]
    fn test_template_collision_within_selection() {
        let src = source(vec![leveled("t", &[0.0, 2.0])]);
        let vars: OrderedMap<LevelRequest> =
            [("t", LevelRequest::Explicit(vec![0.0, 2.0]))].into_iter().collect();
        let template = NameTemplate::parse("{var_name}_near_surface").unwrap();
        let err = resolve(&src, LevelType::HeightAboveGround, &vars, Some(&template)).unwrap_err();
        assert!(matches!(err, TransformError::NamingCollision { .. }));
    }
}

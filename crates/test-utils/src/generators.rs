//! Synthetic forecast fields with predictable values.
//!
//! Values follow `level * 1000 + step * 100 + row * 10 + col` so a test can
//! tell exactly which slice ended up where.

use ndarray::{ArrayD, Axis, IxDyn};
use nwp_common::{Coordinate, Field, FieldSet, LEVEL_DIM, TIME_DIM};

/// Value of a generated cell.
pub fn cell_value(level: f64, step: usize, row: usize, col: usize) -> f32 {
    (level * 1000.0) as f32 + (step * 100 + row * 10 + col) as f32
}

fn index_values(len: usize) -> Vec<f64> {
    (0..len).map(|i| i as f64).collect()
}

fn dims(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// Attach `time`, `y` and `x` coordinates (hours and grid indices).
fn with_grid_coords(field: Field, steps: usize, ny: usize, nx: usize) -> Field {
    field
        .with_coord(
            TIME_DIM,
            Coordinate::index(TIME_DIM, index_values(steps)).with_attr("units", "hours"),
        )
        .and_then(|f| f.with_coord("y", Coordinate::index("y", index_values(ny))))
        .and_then(|f| f.with_coord("x", Coordinate::index("x", index_values(nx))))
        .expect("generated coordinates match the field shape")
}

/// A `[time, level, y, x]` field on the given levels.
pub fn profile_field(name: &str, steps: usize, levels: &[f64], ny: usize, nx: usize) -> Field {
    let mut data = Vec::with_capacity(steps * levels.len() * ny * nx);
    for step in 0..steps {
        for &level in levels {
            for row in 0..ny {
                for col in 0..nx {
                    data.push(cell_value(level, step, row, col));
                }
            }
        }
    }
    let values = ArrayD::from_shape_vec(IxDyn(&[steps, levels.len(), ny, nx]), data)
        .expect("generated data matches the shape");
    let field = Field::new(name, dims(&[TIME_DIM, LEVEL_DIM, "y", "x"]), values)
        .expect("generated dims match the array rank")
        .with_coord(LEVEL_DIM, Coordinate::index(LEVEL_DIM, levels.to_vec()))
        .expect("level coordinate matches the shape");
    with_grid_coords(field, steps, ny, nx)
}

/// A single-level `[time, y, x]` field filled with `value`, its level
/// recorded as the `level` attribute.
pub fn surface_field(name: &str, steps: usize, level: f64, ny: usize, nx: usize, value: f32) -> Field {
    let values = ArrayD::from_elem(IxDyn(&[steps, ny, nx]), value);
    let field = Field::new(name, dims(&[TIME_DIM, "y", "x"]), values)
        .expect("generated dims match the array rank")
        .with_attr(LEVEL_DIM, level);
    with_grid_coords(field, steps, ny, nx)
}

/// Overwrite the given levels of a profile field with missing values.
pub fn with_missing_levels(mut field: Field, levels: &[f64]) -> Field {
    let axis = field.axis(LEVEL_DIM).expect("field has a level axis");
    let positions = field
        .level_positions(LEVEL_DIM, levels)
        .expect("levels exist on the field");
    for position in positions {
        field
            .values
            .index_axis_mut(Axis(axis), position)
            .fill(f32::NAN);
    }
    field
}

/// Key fields by name.
pub fn field_set(fields: impl IntoIterator<Item = Field>) -> FieldSet {
    fields.into_iter().map(|f| (f.name.clone(), f)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_field_values() {
        let field = profile_field("u", 2, &[10.0, 50.0], 3, 4);
        assert_eq!(field.shape(), &[2, 2, 3, 4]);
        assert_eq!(field.values[[1, 1, 2, 3]], cell_value(50.0, 1, 2, 3));
        assert_eq!(field.labels("level").unwrap(), vec![10.0, 50.0]);
    }

    #[test]
    fn test_surface_field() {
        let field = surface_field("10u", 2, 10.0, 3, 4, 5.0);
        assert_eq!(field.shape(), &[2, 3, 4]);
        assert_eq!(field.level_attr(), Some(10.0));
        assert!(field.values.iter().all(|&v| v == 5.0));
    }

    #[test]
    fn test_with_missing_levels() {
        let field = with_missing_levels(profile_field("u", 1, &[10.0, 50.0], 2, 2), &[10.0]);
        let at_10 = field.sel_one("level", 10.0).unwrap();
        let at_50 = field.sel_one("level", 50.0).unwrap();
        assert!(at_10.values.iter().all(|v| v.is_nan()));
        assert!(!at_50.has_missing());
    }
}

//! Time-invariant squeeze for `CONSTANTS` fields.

use ndarray::Axis;
use nwp_common::{Field, TIME_DIM};

use crate::error::{Result, TransformError};

/// Drop the `time` axis of a field that must not vary in time.
///
/// Every time slice is compared with the first (missing values compare
/// equal to each other). Fields without a `time` axis are returned as-is.
pub fn squeeze_time_invariant(field: Field) -> Result<Field> {
    let Some(axis) = field.axis(TIME_DIM) else {
        return Ok(field);
    };
    let steps = field.values.len_of(Axis(axis));
    if steps == 0 {
        return Ok(field);
    }

    let first = field.values.index_axis(Axis(axis), 0);
    for index in 1..steps {
        let slice = field.values.index_axis(Axis(axis), index);
        let same = first
            .iter()
            .zip(slice.iter())
            .all(|(a, b)| a == b || (a.is_nan() && b.is_nan()));
        if !same {
            return Err(TransformError::TimeVarying {
                field: field.name.clone(),
                index,
            });
        }
    }

    Ok(field.isel_squeeze(TIME_DIM, 0)?)
}

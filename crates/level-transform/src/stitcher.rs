//! Special-field stitching.
//!
//! Some quantities are reported under a different short name (and
//! parameter identifier) at particular heights: `u` is `10u` at 10 m and
//! `100u` at 100 m. The generic field then holds only missing values at
//! those heights. Stitching replaces each such level with the alternate
//! field and drops the alternates.

use nwp_common::{DatasetError, Field, FieldSet, LEVEL_DIM, TIME_DIM};
use tracing::debug;

use crate::error::{Result, TransformError};

/// Alternate short names feeding one quantity's level axis.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecialFieldGroup {
    /// Short name of the true quantity (`u`).
    pub quantity: String,
    /// `(alternate short name, level)` pairs in declaration order.
    pub alternates: Vec<(String, f64)>,
}

/// Where a new vertical axis goes: right after `time`, else outermost.
pub(crate) fn level_axis_position(field: &Field) -> usize {
    field.axis(TIME_DIM).map(|ax| ax + 1).unwrap_or(0)
}

/// Give a single-level field a length-1 level axis.
fn with_level_axis(field: Field) -> Result<Field> {
    if field.axis(LEVEL_DIM).is_some() {
        return Ok(field);
    }
    let level = field
        .level_attr()
        .ok_or_else(|| DatasetError::dimension_not_found(&field.name, LEVEL_DIM))?;
    let position = level_axis_position(&field);
    Ok(field.expand_dim(LEVEL_DIM, level, position)?)
}

/// Reduce an alternate field to the slice at `level`.
fn single_level(field: &Field, level: f64) -> Result<Field> {
    let mut slice = match field.dim_size(LEVEL_DIM) {
        None => field.clone(),
        Some(1) => field.isel_squeeze(LEVEL_DIM, 0)?,
        Some(_) => field.sel_one(LEVEL_DIM, level)?,
    };
    slice.attrs.remove(LEVEL_DIM);
    Ok(slice)
}

/// Stitch every group into its quantity.
///
/// For each `(alternate, level)` pair in order, `level` is removed from the
/// quantity's axis (exact match) and the alternate's slice is appended at
/// that level. Retained levels therefore come first in their original
/// order, followed by the substituted ones in declaration order. Groups
/// whose quantity is absent from `fields` are skipped.
pub fn stitch(mut fields: FieldSet, groups: &[SpecialFieldGroup]) -> Result<FieldSet> {
    for group in groups {
        let Some(quantity) = fields.get(&group.quantity) else {
            debug!(quantity = %group.quantity, "Quantity absent, skipping special-field group");
            continue;
        };
        let mut stitched = with_level_axis(quantity.clone())?;
        let axis = stitched.axis(LEVEL_DIM).unwrap_or(0);

        for (alternate, level) in &group.alternates {
            let source = fields
                .get(alternate)
                .ok_or_else(|| TransformError::MissingSpecialField {
                    field: alternate.clone(),
                    level: *level,
                })?;

            let keep: Vec<f64> = stitched
                .labels(LEVEL_DIM)?
                .into_iter()
                .filter(|l| l != level)
                .collect();
            let retained = stitched.sel(LEVEL_DIM, &keep)?;
            let substitute = single_level(source, *level)?.expand_dim(LEVEL_DIM, *level, axis)?;

            stitched = Field::concat(&[retained, substitute], LEVEL_DIM)?;
            debug!(
                quantity = %group.quantity,
                alternate = %alternate,
                level = level,
                "Stitched special field"
            );
        }

        fields.insert(group.quantity.clone(), stitched);
        for (alternate, _) in &group.alternates {
            fields.remove(alternate);
        }
    }
    Ok(fields)
}

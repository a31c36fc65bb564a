//! CF grid-mapping injection.
//!
//! The GRIB decoder does not surface projection parameters for the
//! Harmonie grids, so they are configured and attached to every field as
//! a scalar grid-mapping variable referenced by a `grid_mapping` attribute
//! (CF conventions, appendix F).

use level_transform::resolver::GRID_MAPPING_ATTR;
use ndarray::{ArrayD, IxDyn};
use nwp_common::{Attributes, Field, FieldSet};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A named CF grid-mapping variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridMapping {
    /// Variable name, e.g. `dini_projection`.
    pub name: String,
    /// CF grid-mapping attributes (`grid_mapping_name`, `crs_wkt`, ...).
    #[serde(default)]
    pub attributes: Attributes,
}

impl GridMapping {
    /// The scalar variable holding the mapping attributes.
    pub fn field(&self) -> Result<Field> {
        let mut field = Field::new(
            self.name.clone(),
            Vec::new(),
            ArrayD::from_elem(IxDyn(&[]), f32::NAN),
        )?;
        field.attrs = self.attributes.clone();
        Ok(field)
    }

    /// Reference the mapping from every field and add the mapping itself.
    pub fn apply(&self, fields: &mut FieldSet) -> Result<()> {
        if fields.is_empty() {
            return Ok(());
        }
        for field in fields.values_mut() {
            field
                .attrs
                .insert(GRID_MAPPING_ATTR.into(), self.name.clone().into());
        }
        fields.insert(self.name.clone(), self.field()?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::{field_set, surface_field};

    fn lambert() -> GridMapping {
        serde_yaml::from_str(
            r#"
name: dini_projection
attributes:
  grid_mapping_name: lambert_conformal_conic
  standard_parallel: [55.5, 55.5]
  longitude_of_central_meridian: -8.0
  latitude_of_projection_origin: 55.5
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_mapping_attached() {
        let mut fields = field_set([
            surface_field("hcc", 1, 0.0, 2, 2, 0.5),
            surface_field("lcc", 1, 0.0, 2, 2, 0.5),
        ]);
        lambert().apply(&mut fields).unwrap();

        assert_eq!(fields.len(), 3);
        assert_eq!(fields["hcc"].attrs["grid_mapping"], "dini_projection");
        let mapping = &fields["dini_projection"];
        assert!(mapping.dims.is_empty());
        assert!(mapping.attrs.get("grid_mapping").is_none());
        assert_eq!(mapping.attrs["grid_mapping_name"], "lambert_conformal_conic");
    }

    #[test]
    fn test_empty_set_untouched() {
        let mut fields = FieldSet::new();
        lambert().apply(&mut fields).unwrap();
        assert!(fields.is_empty());
    }
}

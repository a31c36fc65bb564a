//! CF attribute adapters applied at the reader boundary.

use nwp_common::FieldSet;

/// Copy the `cfName` attribute into `standard_name` where present.
pub fn copy_cf_standard_names(fields: &mut FieldSet) {
    for field in fields.values_mut() {
        if let Some(cf_name) = field.attrs.get("cfName").cloned() {
            field.attrs.insert("standard_name".into(), cf_name);
        }
    }
}

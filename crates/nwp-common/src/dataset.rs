//! Data variables merged onto a shared coordinate table.

use std::collections::BTreeMap;

use ndarray::ArrayD;

use crate::coordinate::Coordinate;
use crate::error::{DatasetError, Result};
use crate::field::Field;
use crate::{bitwise_eq_f32, Attributes, Encoding};

/// A data variable inside a [`Dataset`]. Coordinates live on the dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub dims: Vec<String>,
    pub values: ArrayD<f32>,
    pub attrs: Attributes,
    pub encoding: Encoding,
}

impl Variable {
    fn identical(&self, other: &Variable) -> bool {
        self.dims == other.dims
            && bitwise_eq_f32(&self.values, &other.values)
            && self.attrs == other.attrs
            && self.encoding == other.encoding
    }
}

/// A set of data variables sharing dimension sizes and coordinates.
///
/// All maps are ordered by name so iteration (and anything written from
/// it) is deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    data_vars: BTreeMap<String, Variable>,
    coords: BTreeMap<String, Coordinate>,
    dims: BTreeMap<String, usize>,
    /// Global attributes.
    pub attrs: Attributes,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field as a data variable, merging its coordinates.
    ///
    /// Dimension sizes must agree with the dataset and coordinates sharing
    /// a name must carry identical labels. Nothing is modified on error.
    /// An existing variable of the same name is replaced.
    pub fn insert_field(&mut self, field: Field) -> Result<()> {
        for (dim, &actual) in field.dims.iter().zip(field.values.shape()) {
            if let Some(&expected) = self.dims.get(dim) {
                if expected != actual {
                    return Err(DatasetError::DimensionMismatch {
                        name: field.name.clone(),
                        dim: dim.clone(),
                        expected,
                        actual,
                    });
                }
            }
        }
        for (name, coord) in &field.coords {
            if let Some(existing) = self.coords.get(name) {
                if !existing.same_labels(coord) {
                    return Err(DatasetError::CoordinateConflict(name.clone()));
                }
            }
        }

        let Field {
            name,
            dims,
            values,
            coords,
            attrs,
            encoding,
        } = field;
        for (dim, &len) in dims.iter().zip(values.shape()) {
            self.dims.insert(dim.clone(), len);
        }
        for (coord_name, coord) in coords {
            self.coords.entry(coord_name).or_insert(coord);
        }
        self.data_vars.insert(
            name,
            Variable {
                dims,
                values,
                attrs,
                encoding,
            },
        );
        Ok(())
    }

    /// Insert a coordinate, checking its dimension sizes.
    pub fn insert_coord(&mut self, name: impl Into<String>, coord: Coordinate) -> Result<()> {
        let name = name.into();
        for (dim, &actual) in coord.dims.iter().zip(coord.values.shape()) {
            if let Some(&expected) = self.dims.get(dim) {
                if expected != actual {
                    return Err(DatasetError::DimensionMismatch {
                        name,
                        dim: dim.clone(),
                        expected,
                        actual,
                    });
                }
            }
        }
        if let Some(existing) = self.coords.get(&name) {
            if !existing.same_labels(&coord) {
                return Err(DatasetError::CoordinateConflict(name));
            }
        }
        for (dim, &len) in coord.dims.iter().zip(coord.values.shape()) {
            self.dims.insert(dim.clone(), len);
        }
        self.coords.insert(name, coord);
        Ok(())
    }

    /// Rebuild a self-contained field from a data variable.
    ///
    /// Coordinates whose dimensions all belong to the variable are attached.
    pub fn field(&self, name: &str) -> Result<Field> {
        let var = self
            .data_vars
            .get(name)
            .ok_or_else(|| DatasetError::VariableNotFound(name.to_string()))?;
        let coords = self
            .coords
            .iter()
            .filter(|(_, c)| c.dims.iter().all(|d| var.dims.contains(d)))
            .map(|(n, c)| (n.clone(), c.clone()))
            .collect();
        Ok(Field {
            name: name.to_string(),
            dims: var.dims.clone(),
            values: var.values.clone(),
            coords,
            attrs: var.attrs.clone(),
            encoding: var.encoding.clone(),
        })
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.data_vars.get(name)
    }

    pub fn variable_mut(&mut self, name: &str) -> Option<&mut Variable> {
        self.data_vars.get_mut(name)
    }

    pub fn coord(&self, name: &str) -> Option<&Coordinate> {
        self.coords.get(name)
    }

    pub fn data_vars(&self) -> &BTreeMap<String, Variable> {
        &self.data_vars
    }

    pub fn coords(&self) -> &BTreeMap<String, Coordinate> {
        &self.coords
    }

    /// Dimension name to length.
    pub fn dim_sizes(&self) -> &BTreeMap<String, usize> {
        &self.dims
    }

    pub fn contains(&self, name: &str) -> bool {
        self.data_vars.contains_key(name)
    }

    /// Number of data variables.
    pub fn len(&self) -> usize {
        self.data_vars.len()
    }

    /// True when there are no data variables.
    pub fn is_empty(&self) -> bool {
        self.data_vars.is_empty()
    }

    /// Remove a data variable.
    pub fn remove(&mut self, name: &str) -> Option<Variable> {
        let removed = self.data_vars.remove(name);
        if removed.is_some() {
            self.recompute_dims();
        }
        removed
    }

    /// Remove a coordinate.
    pub fn drop_coord(&mut self, name: &str) -> Option<Coordinate> {
        let removed = self.coords.remove(name);
        if removed.is_some() {
            self.recompute_dims();
        }
        removed
    }

    /// Clear storage hints on every variable and coordinate.
    pub fn clear_encoding(&mut self) {
        for var in self.data_vars.values_mut() {
            var.encoding.clear();
        }
        for coord in self.coords.values_mut() {
            coord.encoding.clear();
        }
    }

    /// True when any variable or coordinate still carries storage hints.
    pub fn has_encoding_hints(&self) -> bool {
        self.data_vars.values().any(|v| !v.encoding.is_empty())
            || self.coords.values().any(|c| !c.encoding.is_empty())
    }

    /// Bit-identical comparison (NaN payloads included).
    pub fn identical(&self, other: &Dataset) -> bool {
        self.dims == other.dims
            && self.attrs == other.attrs
            && self.data_vars.len() == other.data_vars.len()
            && self.coords.len() == other.coords.len()
            && self
                .data_vars
                .iter()
                .all(|(n, v)| other.data_vars.get(n).is_some_and(|o| v.identical(o)))
            && self
                .coords
                .iter()
                .all(|(n, c)| other.coords.get(n).is_some_and(|o| c.identical(o)))
    }

    fn recompute_dims(&mut self) {
        let mut dims = BTreeMap::new();
        for var in self.data_vars.values() {
            for (dim, &len) in var.dims.iter().zip(var.values.shape()) {
                dims.insert(dim.clone(), len);
            }
        }
        for coord in self.coords.values() {
            for (dim, &len) in coord.dims.iter().zip(coord.values.shape()) {
                dims.insert(dim.clone(), len);
            }
        }
        self.dims = dims;
    }
}

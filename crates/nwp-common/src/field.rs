//! Named data arrays with their own coordinates.

use std::collections::BTreeMap;

use ndarray::{ArrayD, Axis};

use crate::coordinate::Coordinate;
use crate::error::{DatasetError, Result};
use crate::{bitwise_eq_f32, Attributes, Encoding, LEVEL_DIM};

/// Fields keyed by output name, as handed out by a source reader for one
/// level-type.
pub type FieldSet = BTreeMap<String, Field>;

/// One named data array.
///
/// Each field is self-contained: it carries the coordinates of its own
/// dimensions, so fields of the same level-type may sit on different
/// level axes.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Variable name (GRIB short name at the source boundary).
    pub name: String,
    /// Dimension names, outermost first.
    pub dims: Vec<String>,
    /// Data values, `NaN` where missing.
    pub values: ArrayD<f32>,
    /// Coordinates keyed by name. Their dims are a subset of `dims`.
    pub coords: BTreeMap<String, Coordinate>,
    /// CF and GRIB attributes.
    pub attrs: Attributes,
    /// Storage hints from the source reader.
    pub encoding: Encoding,
}

impl Field {
    /// Create a field without coordinates.
    pub fn new(name: impl Into<String>, dims: Vec<String>, values: ArrayD<f32>) -> Result<Self> {
        let name = name.into();
        if dims.len() != values.ndim() {
            return Err(DatasetError::shape_mismatch(
                name,
                format!("{} dims for a {}-d array", dims.len(), values.ndim()),
            ));
        }
        for (i, dim) in dims.iter().enumerate() {
            if dims[..i].contains(dim) {
                return Err(DatasetError::DimensionExists { name, dim: dim.clone() });
            }
        }
        Ok(Self {
            name,
            dims,
            values,
            coords: BTreeMap::new(),
            attrs: Attributes::new(),
            encoding: Encoding::default(),
        })
    }

    /// Attach a coordinate. Its dimensions must exist on the field with
    /// matching sizes.
    pub fn with_coord(mut self, name: impl Into<String>, coord: Coordinate) -> Result<Self> {
        self.set_coord(name, coord)?;
        Ok(self)
    }

    /// Attach or replace a coordinate in place.
    pub fn set_coord(&mut self, name: impl Into<String>, coord: Coordinate) -> Result<()> {
        let name = name.into();
        for (i, dim) in coord.dims.iter().enumerate() {
            let actual = coord.values.shape()[i];
            match self.dim_size(dim) {
                Some(expected) if expected == actual => {}
                Some(expected) => {
                    return Err(DatasetError::DimensionMismatch {
                        name,
                        dim: dim.clone(),
                        expected,
                        actual,
                    })
                }
                None => return Err(DatasetError::dimension_not_found(&self.name, dim)),
            }
        }
        self.coords.insert(name, coord);
        Ok(())
    }

    /// Attach an attribute.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    /// Replace the encoding hints.
    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Same field under a new name.
    pub fn renamed(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn axis(&self, dim: &str) -> Option<usize> {
        self.dims.iter().position(|d| d == dim)
    }

    pub fn dim_size(&self, dim: &str) -> Option<usize> {
        self.axis(dim).map(|ax| self.values.shape()[ax])
    }

    pub fn shape(&self) -> &[usize] {
        self.values.shape()
    }

    /// The index coordinate of `dim`, if one is attached.
    pub fn index_coord(&self, dim: &str) -> Option<&Coordinate> {
        self.coords.get(dim).filter(|c| c.is_index_of(dim))
    }

    /// Labels along `dim`.
    pub fn labels(&self, dim: &str) -> Result<Vec<f64>> {
        self.index_coord(dim)
            .map(Coordinate::to_vec)
            .ok_or_else(|| DatasetError::dimension_not_found(&self.name, dim))
    }

    /// Scalar level recorded on a single-level field.
    pub fn level_attr(&self) -> Option<f64> {
        self.attrs.get(LEVEL_DIM).and_then(serde_json::Value::as_f64)
    }

    /// True when any value is missing.
    pub fn has_missing(&self) -> bool {
        self.values.iter().any(|v| v.is_nan())
    }

    /// Positions of `levels` on the `dim` axis, in request order.
    ///
    /// Matching is exact: a label must compare equal to the requested value.
    pub fn level_positions(&self, dim: &str, levels: &[f64]) -> Result<Vec<usize>> {
        let labels = self.labels(dim)?;
        levels
            .iter()
            .map(|&level| {
                labels
                    .iter()
                    .position(|&l| l == level)
                    .ok_or_else(|| DatasetError::LevelNotFound {
                        field: self.name.clone(),
                        dim: dim.to_string(),
                        level,
                    })
            })
            .collect()
    }

    /// Keep exactly `levels` along `dim`, in the given order.
    pub fn sel(&self, dim: &str, levels: &[f64]) -> Result<Field> {
        let positions = self.level_positions(dim, levels)?;
        self.isel(dim, &positions)
    }

    /// Keep `positions` along `dim`, in the given order.
    pub fn isel(&self, dim: &str, positions: &[usize]) -> Result<Field> {
        let ax = self
            .axis(dim)
            .ok_or_else(|| DatasetError::dimension_not_found(&self.name, dim))?;
        let len = self.values.shape()[ax];
        if let Some(&bad) = positions.iter().find(|&&p| p >= len) {
            return Err(DatasetError::shape_mismatch(
                &self.name,
                format!("position {bad} out of range for `{dim}` of length {len}"),
            ));
        }
        let coords = self
            .coords
            .iter()
            .map(|(name, c)| (name.clone(), c.select(dim, positions)))
            .collect();
        Ok(Field {
            name: self.name.clone(),
            dims: self.dims.clone(),
            values: self.values.select(Axis(ax), positions),
            coords,
            attrs: self.attrs.clone(),
            encoding: self.encoding.clone(),
        })
    }

    /// Select a single level and remove the `dim` axis.
    ///
    /// The selected value is recorded as the `level` attribute.
    pub fn sel_one(&self, dim: &str, level: f64) -> Result<Field> {
        let positions = self.level_positions(dim, &[level])?;
        let mut field = self.isel_squeeze(dim, positions[0])?;
        field.attrs.insert(LEVEL_DIM.to_string(), serde_json::Value::from(level));
        Ok(field)
    }

    /// Take position `index` along `dim` and remove the axis together with
    /// its index coordinate.
    pub fn isel_squeeze(&self, dim: &str, index: usize) -> Result<Field> {
        let ax = self
            .axis(dim)
            .ok_or_else(|| DatasetError::dimension_not_found(&self.name, dim))?;
        let len = self.values.shape()[ax];
        if index >= len {
            return Err(DatasetError::shape_mismatch(
                &self.name,
                format!("index {index} out of range for `{dim}` of length {len}"),
            ));
        }
        let mut dims = self.dims.clone();
        dims.remove(ax);
        let coords = self
            .coords
            .iter()
            .filter(|(_, c)| !c.is_index_of(dim))
            .map(|(name, c)| (name.clone(), c.index_axis(dim, index)))
            .collect();
        let mut encoding = self.encoding.clone();
        encoding.remove_dim(dim);
        Ok(Field {
            name: self.name.clone(),
            dims,
            values: self.values.index_axis(Axis(ax), index).to_owned(),
            coords,
            attrs: self.attrs.clone(),
            encoding,
        })
    }

    /// Insert a length-1 `dim` axis at `position` labelled with `value`.
    ///
    /// Clears the scalar `level` attribute, since the value now lives on
    /// the axis.
    pub fn expand_dim(self, dim: &str, value: f64, position: usize) -> Result<Field> {
        if self.axis(dim).is_some() {
            return Err(DatasetError::DimensionExists {
                name: self.name,
                dim: dim.to_string(),
            });
        }
        if position > self.dims.len() {
            return Err(DatasetError::shape_mismatch(
                self.name,
                format!("cannot insert `{dim}` at position {position}"),
            ));
        }
        let Field {
            name,
            mut dims,
            values,
            mut coords,
            mut attrs,
            mut encoding,
        } = self;
        dims.insert(position, dim.to_string());
        coords.insert(dim.to_string(), Coordinate::index(dim, vec![value]));
        attrs.remove(LEVEL_DIM);
        if let Some(chunks) = encoding.preferred_chunks.as_mut() {
            chunks.insert(dim.to_string(), 1);
        }
        Ok(Field {
            name,
            dims,
            values: values.insert_axis(Axis(position)),
            coords,
            attrs,
            encoding,
        })
    }

    /// Join fields along `dim`, in order.
    ///
    /// All fields must share the first field's dimensions and carry an
    /// index coordinate for `dim`. Other coordinates must agree; name,
    /// attributes and encoding come from the first field.
    pub fn concat(fields: &[Field], dim: &str) -> Result<Field> {
        let first = fields
            .first()
            .ok_or_else(|| DatasetError::shape_mismatch(dim, "nothing to concatenate"))?;
        let ax = first
            .axis(dim)
            .ok_or_else(|| DatasetError::dimension_not_found(&first.name, dim))?;

        let mut labels = Vec::new();
        for field in fields {
            if field.dims != first.dims {
                return Err(DatasetError::shape_mismatch(
                    &field.name,
                    format!("dims {:?} differ from {:?}", field.dims, first.dims),
                ));
            }
            labels.extend(field.labels(dim)?);
            for (name, coord) in &field.coords {
                if coord.axis(dim).is_some() {
                    continue;
                }
                match first.coords.get(name) {
                    Some(c) if c.same_labels(coord) => {}
                    _ => return Err(DatasetError::CoordinateConflict(name.clone())),
                }
            }
        }

        let views: Vec<_> = fields.iter().map(|f| f.values.view()).collect();
        let values = ndarray::concatenate(Axis(ax), &views)
            .map_err(|e| DatasetError::shape_mismatch(&first.name, e.to_string()))?;

        let mut coords: BTreeMap<String, Coordinate> = first
            .coords
            .iter()
            .filter(|(_, c)| c.axis(dim).is_none())
            .map(|(n, c)| (n.clone(), c.clone()))
            .collect();
        let mut index = Coordinate::index(dim, labels);
        if let Some(c) = first.index_coord(dim) {
            index.attrs = c.attrs.clone();
        }
        coords.insert(dim.to_string(), index);

        Ok(Field {
            name: first.name.clone(),
            dims: first.dims.clone(),
            values,
            coords,
            attrs: first.attrs.clone(),
            encoding: first.encoding.clone(),
        })
    }

    /// Rename a dimension, its index coordinate and its encoding hint.
    pub fn rename_dim(&mut self, old: &str, new: &str) -> Result<()> {
        if self.axis(new).is_some() {
            return Err(DatasetError::DimensionExists {
                name: self.name.clone(),
                dim: new.to_string(),
            });
        }
        let Some(ax) = self.axis(old) else {
            return Err(DatasetError::dimension_not_found(&self.name, old));
        };
        self.dims[ax] = new.to_string();
        if let Some(mut index) = self.coords.remove(old).filter(|c| c.is_index_of(old)) {
            index.rename_dim(old, new);
            self.coords.insert(new.to_string(), index);
        }
        for coord in self.coords.values_mut() {
            coord.rename_dim(old, new);
        }
        self.encoding.rename_dim(old, new);
        Ok(())
    }

    /// Same name, dimensions, bit-identical values, coordinates and attributes.
    pub fn identical(&self, other: &Field) -> bool {
        self.name == other.name
            && self.dims == other.dims
            && bitwise_eq_f32(&self.values, &other.values)
            && self.attrs == other.attrs
            && self.encoding == other.encoding
            && self.coords.len() == other.coords.len()
            && self
                .coords
                .iter()
                .all(|(n, c)| other.coords.get(n).is_some_and(|o| c.identical(o)))
    }
}

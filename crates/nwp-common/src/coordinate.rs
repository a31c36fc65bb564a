//! Coordinate variables (numeric labels along dimensions).

use ndarray::{ArrayD, Axis, IxDyn};

use crate::error::{DatasetError, Result};
use crate::{bitwise_eq_f64, Attributes, Encoding};

/// Numeric labels along one or more dimensions.
///
/// A coordinate whose single dimension carries its own name (e.g. `level`
/// along `level`) is an *index coordinate*: it is what value-based
/// selection looks up.
#[derive(Debug, Clone, PartialEq)]
pub struct Coordinate {
    /// Dimension names, outermost first.
    pub dims: Vec<String>,
    /// Label values.
    pub values: ArrayD<f64>,
    /// CF attributes (`units`, `standard_name`, ...).
    pub attrs: Attributes,
    /// Storage hints from the source reader.
    pub encoding: Encoding,
}

impl Coordinate {
    /// Create a coordinate, checking that `dims` matches the array rank.
    pub fn new(dims: Vec<String>, values: ArrayD<f64>) -> Result<Self> {
        if dims.len() != values.ndim() {
            return Err(DatasetError::shape_mismatch(
                dims.join(","),
                format!("{} dims for a {}-d coordinate", dims.len(), values.ndim()),
            ));
        }
        Ok(Self {
            dims,
            values,
            attrs: Attributes::new(),
            encoding: Encoding::default(),
        })
    }

    /// A 1-D index coordinate along `dim`.
    pub fn index(dim: impl Into<String>, values: Vec<f64>) -> Self {
        let len = values.len();
        Self {
            dims: vec![dim.into()],
            values: ArrayD::from_shape_vec(IxDyn(&[len]), values)
                .unwrap_or_else(|_| ArrayD::zeros(IxDyn(&[0]))),
            attrs: Attributes::new(),
            encoding: Encoding::default(),
        }
    }

    /// Attach an attribute.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    /// Position of `dim` among this coordinate's dimensions.
    pub fn axis(&self, dim: &str) -> Option<usize> {
        self.dims.iter().position(|d| d == dim)
    }

    /// True when this is the 1-D index coordinate of `dim`.
    pub fn is_index_of(&self, dim: &str) -> bool {
        self.dims.len() == 1 && self.dims[0] == dim
    }

    /// Flattened label values in logical order.
    pub fn to_vec(&self) -> Vec<f64> {
        self.values.iter().copied().collect()
    }

    /// Number of labels.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when the coordinate holds no labels.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Same dimensions and bit-identical labels. Attributes are not compared.
    pub fn same_labels(&self, other: &Coordinate) -> bool {
        self.dims == other.dims && bitwise_eq_f64(&self.values, &other.values)
    }

    /// Same dimensions, labels, attributes and encoding.
    pub fn identical(&self, other: &Coordinate) -> bool {
        self.same_labels(other) && self.attrs == other.attrs && self.encoding == other.encoding
    }

    /// Keep only `positions` along `dim`, in that order.
    pub(crate) fn select(&self, dim: &str, positions: &[usize]) -> Coordinate {
        match self.axis(dim) {
            Some(ax) => Coordinate {
                dims: self.dims.clone(),
                values: self.values.select(Axis(ax), positions),
                attrs: self.attrs.clone(),
                encoding: self.encoding.clone(),
            },
            None => self.clone(),
        }
    }

    /// Take position `index` along `dim`, removing that dimension.
    pub(crate) fn index_axis(&self, dim: &str, index: usize) -> Coordinate {
        match self.axis(dim) {
            Some(ax) => {
                let mut dims = self.dims.clone();
                dims.remove(ax);
                let mut encoding = self.encoding.clone();
                encoding.remove_dim(dim);
                Coordinate {
                    dims,
                    values: self.values.index_axis(Axis(ax), index).to_owned(),
                    attrs: self.attrs.clone(),
                    encoding,
                }
            }
            None => self.clone(),
        }
    }

    pub(crate) fn rename_dim(&mut self, old: &str, new: &str) {
        for d in self.dims.iter_mut() {
            if d == old {
                *d = new.to_string();
            }
        }
        self.encoding.rename_dim(old, new);
    }
}

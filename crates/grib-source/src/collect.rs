//! Gathers decoded GRIB2 messages of one level-type into fields.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use level_transform::LevelType;
use ndarray::{ArrayD, IxDyn};
use nwp_common::{Coordinate, Encoding, Field, FieldSet, LEVEL_DIM, TIME_DIM};
use tracing::{debug, warn};

use crate::error::{Result, SourceError};
use crate::table::ParameterEntry;

/// A decoded message already assigned to a level-type.
#[derive(Debug, Clone)]
pub struct DecodedMessage {
    pub entry: ParameterEntry,
    pub level: f64,
    /// Forecast step in hours since the analysis time.
    pub step_hours: f64,
    /// Grid shape as `(ny, nx)`.
    pub grid: (usize, usize),
    /// Row-major values, `ny * nx` of them.
    pub values: Vec<f32>,
}

#[derive(Debug)]
struct Pending {
    entry: ParameterEntry,
    slices: Vec<(f64, f64, Vec<f32>)>,
}

impl Pending {
    /// A slice at `step` exists, on `level` or on any level when `None`.
    fn has(&self, step: f64, level: Option<f64>) -> bool {
        self.slices
            .iter()
            .any(|(s, l, _)| *s == step && level.map_or(true, |level| *l == level))
    }
}

/// Builds one field per short name from messages of a single level-type.
///
/// Every field shares the level-type's time axis (the union of all
/// forecast steps seen); combinations that were never reported stay
/// missing.
#[derive(Debug)]
pub struct FieldCollector {
    level_type: LevelType,
    reference_time: DateTime<Utc>,
    grid: Option<(usize, usize)>,
    steps: Vec<f64>,
    pending: BTreeMap<String, Pending>,
}

impl FieldCollector {
    pub fn new(level_type: LevelType, reference_time: DateTime<Utc>) -> Self {
        Self {
            level_type,
            reference_time,
            grid: None,
            steps: Vec::new(),
            pending: BTreeMap::new(),
        }
    }

    pub fn level_type(&self) -> LevelType {
        self.level_type
    }

    /// Number of fields collected so far.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Add a message. The first message fixes the grid.
    pub fn push(&mut self, message: DecodedMessage) -> Result<()> {
        let (ny, nx) = message.grid;
        if message.values.len() != ny * nx {
            return Err(SourceError::Grib(format!(
                "{}: decoded {} values for a {ny}x{nx} grid",
                message.entry.short_name,
                message.values.len()
            )));
        }
        match self.grid {
            Some(expected) if expected != message.grid => {
                return Err(SourceError::GridMismatch {
                    field: message.entry.short_name,
                    expected,
                    found: message.grid,
                })
            }
            Some(_) => {}
            None => self.grid = Some(message.grid),
        }

        let short_name = message.entry.short_name.clone();
        let pending = self.pending.entry(short_name.clone()).or_insert_with(|| Pending {
            entry: message.entry.clone(),
            slices: Vec::new(),
        });
        // Constant fields carry no level axis: one slice per step.
        let level = (self.level_type != LevelType::Constants).then_some(message.level);
        if pending.has(message.step_hours, level) {
            warn!(
                short_name = %short_name,
                step = message.step_hours,
                level = message.level,
                "Duplicate GRIB message, keeping the first"
            );
            return Ok(());
        }
        if !self.steps.contains(&message.step_hours) {
            self.steps.push(message.step_hours);
        }
        pending
            .slices
            .push((message.step_hours, message.level, message.values));
        Ok(())
    }

    /// Assemble the collected fields.
    ///
    /// Fields reported on exactly one level (and all `CONSTANTS` fields)
    /// carry no `level` axis; the level is kept as the `level` attribute.
    pub fn finish(mut self) -> Result<FieldSet> {
        let Some((ny, nx)) = self.grid else {
            return Ok(FieldSet::new());
        };
        self.steps.sort_by(f64::total_cmp);

        let mut fields = FieldSet::new();
        for (name, pending) in std::mem::take(&mut self.pending) {
            let field = self.build(pending, ny, nx)?;
            debug!(
                field = %name,
                level_type = %self.level_type,
                shape = ?field.shape(),
                "Collected field"
            );
            fields.insert(name, field);
        }
        Ok(fields)
    }

    fn build(&self, pending: Pending, ny: usize, nx: usize) -> Result<Field> {
        let mut levels: Vec<f64> = Vec::new();
        for (_, level, _) in &pending.slices {
            if !levels.contains(level) {
                levels.push(*level);
            }
        }
        levels.sort_by(f64::total_cmp);
        let scalar = levels.len() == 1 || self.level_type == LevelType::Constants;

        let steps = self.steps.len();
        let (dims, shape): (Vec<&str>, Vec<usize>) = if scalar {
            (vec![TIME_DIM, "y", "x"], vec![steps, ny, nx])
        } else {
            (
                vec![TIME_DIM, LEVEL_DIM, "y", "x"],
                vec![steps, levels.len(), ny, nx],
            )
        };

        let mut values = ArrayD::from_elem(IxDyn(&shape), f32::NAN);
        let grid_len = ny * nx;
        {
            let flat = values
                .as_slice_mut()
                .ok_or_else(|| SourceError::Grib("non-contiguous field buffer".into()))?;
            for (step, level, data) in &pending.slices {
                let t = position(&self.steps, *step, TIME_DIM)?;
                let offset = if scalar {
                    t * grid_len
                } else {
                    (t * levels.len() + position(&levels, *level, LEVEL_DIM)?) * grid_len
                };
                flat[offset..offset + grid_len].copy_from_slice(data);
            }
        }

        let entry = &pending.entry;
        let mut field = Field::new(
            entry.short_name.clone(),
            dims.iter().map(|d| d.to_string()).collect(),
            values,
        )?
        .with_coord(
            TIME_DIM,
            Coordinate::index(TIME_DIM, self.steps.clone())
                .with_attr("standard_name", "forecast_period")
                .with_attr(
                    "units",
                    format!(
                        "hours since {}",
                        self.reference_time.format("%Y-%m-%d %H:%M:%S")
                    ),
                ),
        )?
        .with_coord("y", Coordinate::index("y", grid_index(ny)))?
        .with_coord("x", Coordinate::index("x", grid_index(nx)))?
        .with_attr("shortName", entry.short_name.clone())
        .with_attr("paramId", entry.param_id)
        .with_attr("level_type", self.level_type.as_str());

        if let Some(cf_name) = &entry.cf_name {
            field = field.with_attr("cfName", cf_name.clone());
        }
        if let Some(units) = &entry.units {
            field = field.with_attr("units", units.clone());
        }
        if let Some(long_name) = &entry.long_name {
            field = field.with_attr("long_name", long_name.clone());
        }

        let mut chunks = vec![(TIME_DIM, 1), ("y", ny), ("x", nx)];
        if scalar {
            if self.level_type != LevelType::Constants {
                field = field.with_attr(LEVEL_DIM, levels[0]);
            }
        } else {
            let mut coord = Coordinate::index(LEVEL_DIM, levels)
                .with_attr("long_name", self.level_type.as_str());
            if let Some(units) = self.level_type.level_units() {
                coord = coord.with_attr("units", units);
            }
            field.set_coord(LEVEL_DIM, coord)?;
            chunks.push((LEVEL_DIM, 1));
        }

        Ok(field.with_encoding(Encoding::with_preferred_chunks(chunks)))
    }
}

fn position(labels: &[f64], value: f64, axis: &str) -> Result<usize> {
    labels
        .iter()
        .position(|l| *l == value)
        .ok_or_else(|| SourceError::Grib(format!("{value} is not a {axis} label of the field")))
}

fn grid_index(len: usize) -> Vec<f64> {
    (0..len).map(|i| i as f64).collect()
}

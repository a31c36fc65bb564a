//! GRIB2 parameter table.
//!
//! Maps (discipline, category, number) plus the level a message is
//! reported on to a short name, parameter identifier and CF metadata. The
//! same physical quantity may be split over several entries: `u` at 10 m
//! is `10u` (paramId 165), at 100 m it is `100u` (paramId 228246) and
//! everywhere else plain `u` (paramId 131). Lookup therefore prefers the
//! most specific entry that matches.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use level_transform::LevelType;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SourceError};

/// Lookup key for a parameter: (discipline, category, number)
pub type ParamKey = (u8, u8, u8);

/// One short-name definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterEntry {
    pub short_name: String,
    pub param_id: u32,
    pub discipline: u8,
    pub category: u8,
    pub number: u8,
    /// Restrict the entry to messages on this level-type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level_type: Option<LevelType>,
    /// Restrict the entry to this level value. Requires `level_type`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cf_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_name: Option<String>,
    /// Time-invariant field, reported under `CONSTANTS` only.
    #[serde(default)]
    pub constant: bool,
}

impl ParameterEntry {
    pub fn key(&self) -> ParamKey {
        (self.discipline, self.category, self.number)
    }

    fn specificity(&self) -> u8 {
        match (self.level_type, self.level) {
            (Some(_), Some(_)) => 2,
            (Some(_), None) => 1,
            _ => 0,
        }
    }

    fn matches(&self, level_type: Option<LevelType>, level: f64) -> bool {
        let type_ok = self.level_type.map_or(true, |lt| Some(lt) == level_type);
        let level_ok = self.level.map_or(true, |l| l == level);
        type_ok && level_ok
    }
}

#[derive(Debug, Deserialize)]
struct TableFile {
    parameters: Vec<ParameterEntry>,
}

/// Parameter definitions passed explicitly to the source reader.
#[derive(Debug, Clone, Default)]
pub struct ParameterTable {
    entries: HashMap<ParamKey, Vec<ParameterEntry>>,
}

impl ParameterTable {
    /// Build a table, rejecting ambiguous or malformed entries.
    pub fn from_entries(entries: impl IntoIterator<Item = ParameterEntry>) -> Result<Self> {
        let mut table = Self::default();
        for entry in entries {
            if entry.short_name.is_empty() {
                return Err(SourceError::InvalidTable(format!(
                    "entry {:?} has an empty short name",
                    entry.key()
                )));
            }
            if entry.level.is_some() && entry.level_type.is_none() {
                return Err(SourceError::InvalidTable(format!(
                    "`{}` restricts the level without a level_type",
                    entry.short_name
                )));
            }
            if entry.level_type == Some(LevelType::Constants) {
                return Err(SourceError::InvalidTable(format!(
                    "`{}` uses level_type CONSTANTS; set `constant: true` instead",
                    entry.short_name
                )));
            }
            let slot = table.entries.entry(entry.key()).or_default();
            if let Some(existing) = slot
                .iter()
                .find(|e| e.level_type == entry.level_type && e.level == entry.level)
            {
                return Err(SourceError::InvalidTable(format!(
                    "`{}` and `{}` both match {:?} on {:?} level {:?}",
                    existing.short_name,
                    entry.short_name,
                    entry.key(),
                    entry.level_type,
                    entry.level
                )));
            }
            slot.push(entry);
        }
        Ok(table)
    }

    /// Parse a table from YAML (`parameters:` list).
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let file: TableFile = serde_yaml::from_str(yaml)
            .map_err(|e| SourceError::InvalidTable(e.to_string()))?;
        Self::from_entries(file.parameters)
    }

    /// Load a table from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content).map_err(|e| match e {
            SourceError::InvalidTable(msg) => {
                SourceError::InvalidTable(format!("{}: {msg}", path.as_ref().display()))
            }
            other => other,
        })
    }

    /// The most specific entry for a message.
    ///
    /// Level-specific entries win over level-type entries, which win over
    /// generic ones. `level_type` is `None` for surfaces that map to no
    /// known level-type; only generic entries match those.
    pub fn lookup(
        &self,
        key: ParamKey,
        level_type: Option<LevelType>,
        level: f64,
    ) -> Option<&ParameterEntry> {
        self.entries
            .get(&key)?
            .iter()
            .filter(|e| e.matches(level_type, level))
            .max_by_key(|e| e.specificity())
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Definitions for the DINI Harmonie output.
    pub fn builtin() -> Self {
        let mut table = Self::default();
        for entry in builtin_entries() {
            table.entries.entry(entry.key()).or_default().push(entry);
        }
        table
    }
}

struct Def {
    short_name: &'static str,
    param_id: u32,
    key: ParamKey,
    at: Option<(LevelType, f64)>,
    cf_name: Option<&'static str>,
    units: &'static str,
    long_name: &'static str,
    constant: bool,
}

const fn def(
    short_name: &'static str,
    param_id: u32,
    key: ParamKey,
    cf_name: Option<&'static str>,
    units: &'static str,
    long_name: &'static str,
) -> Def {
    Def {
        short_name,
        param_id,
        key,
        at: None,
        cf_name,
        units,
        long_name,
        constant: false,
    }
}

const fn at_height(mut d: Def, level: f64) -> Def {
    d.at = Some((LevelType::HeightAboveGround, level));
    d
}

const fn constant(mut d: Def) -> Def {
    d.constant = true;
    d
}

const BUILTIN: &[Def] = &[
    def("t", 130, (0, 0, 0), Some("air_temperature"), "K", "Temperature"),
    at_height(
        def("2t", 167, (0, 0, 0), Some("air_temperature"), "K", "2 metre temperature"),
        2.0,
    ),
    def("r", 157, (0, 1, 1), Some("relative_humidity"), "%", "Relative humidity"),
    def("u", 131, (0, 2, 2), Some("eastward_wind"), "m s**-1", "U component of wind"),
    at_height(
        def("10u", 165, (0, 2, 2), Some("eastward_wind"), "m s**-1", "10 metre U wind component"),
        10.0,
    ),
    at_height(
        def("100u", 228246, (0, 2, 2), Some("eastward_wind"), "m s**-1", "100 metre U wind component"),
        100.0,
    ),
    def("v", 132, (0, 2, 3), Some("northward_wind"), "m s**-1", "V component of wind"),
    at_height(
        def("10v", 166, (0, 2, 3), Some("northward_wind"), "m s**-1", "10 metre V wind component"),
        10.0,
    ),
    at_height(
        def("100v", 228247, (0, 2, 3), Some("northward_wind"), "m s**-1", "100 metre V wind component"),
        100.0,
    ),
    def("pres", 54, (0, 3, 0), Some("air_pressure"), "Pa", "Pressure"),
    def("z", 129, (0, 3, 4), Some("geopotential"), "m**2 s**-2", "Geopotential"),
    def("lcc", 3073, (0, 6, 3), None, "%", "Low cloud cover"),
    def("mcc", 3074, (0, 6, 4), None, "%", "Medium cloud cover"),
    def("hcc", 3075, (0, 6, 5), None, "%", "High cloud cover"),
    def("cape", 59, (0, 7, 6), None, "J kg**-1", "Convective available potential energy"),
    def("vis", 3020, (0, 19, 0), Some("visibility_in_air"), "m", "Visibility"),
    def("mld", 3067, (0, 19, 3), None, "m", "Mixed layer depth"),
    constant(def("lsm", 172, (2, 0, 0), Some("land_binary_mask"), "(0 - 1)", "Land-sea mask")),
];

fn builtin_entries() -> impl Iterator<Item = ParameterEntry> {
    BUILTIN.iter().map(|d| ParameterEntry {
        short_name: d.short_name.to_string(),
        param_id: d.param_id,
        discipline: d.key.0,
        category: d.key.1,
        number: d.key.2,
        level_type: d.at.map(|(lt, _)| lt),
        level: d.at.map(|(_, l)| l),
        cf_name: d.cf_name.map(str::to_string),
        units: Some(d.units.to_string()),
        long_name: Some(d.long_name.to_string()),
        constant: d.constant,
    })
}

//! Collection configuration: which variables to extract at which levels.
//!
//! A collection holds named parts, each written as its own store. A part
//! lists level selections (one level-type each) mapping variable short
//! names to the levels to extract.
//!
//! ```yaml
//! description: DINI forecast
//! strict_chunking: true
//! chunking: {time: 1, x: {split: 2}, y: {split: 2}}
//! parts:
//!   - name: single_levels
//!     selections:
//!       - level_type: heightAboveGround
//!         variables: {t: [0, 2], r: [2]}
//!         level_name_mapping: "{var_name}{level:d}m"
//! ```

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::marker::PhantomData;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::chunking::{ChunkSize, Strictness};
use crate::error::{Result, TransformError};
use crate::level_type::LevelType;
use crate::stitcher::SpecialFieldGroup;
use crate::template::NameTemplate;

/// A string-keyed map that keeps declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedMap<V>(pub Vec<(String, V)>);

impl<V> OrderedMap<V> {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<V> Default for OrderedMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Into<String>, V> FromIterator<(K, V)> for OrderedMap<V> {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl<'de, V: Deserialize<'de>> Deserialize<'de> for OrderedMap<V> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct OrderedMapVisitor<V>(PhantomData<V>);

        impl<'de, V: Deserialize<'de>> Visitor<'de> for OrderedMapVisitor<V> {
            type Value = OrderedMap<V>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut entries: Vec<(String, V)> = Vec::new();
                while let Some((key, value)) = access.next_entry::<String, V>()? {
                    if entries.iter().any(|(k, _)| *k == key) {
                        return Err(serde::de::Error::custom(format!("duplicate key `{key}`")));
                    }
                    entries.push((key, value));
                }
                Ok(OrderedMap(entries))
            }
        }

        deserializer.deserialize_map(OrderedMapVisitor(PhantomData))
    }
}

impl<V: Serialize> Serialize for OrderedMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(k, v)| (k, v)))
    }
}

/// Levels to extract for one variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Option<Vec<f64>>", into = "Option<Vec<f64>>")]
pub enum LevelRequest {
    /// Exactly one implicit level; the field is copied as-is.
    Implicit,
    /// These levels, in this order.
    Explicit(Vec<f64>),
}

impl From<Option<Vec<f64>>> for LevelRequest {
    fn from(value: Option<Vec<f64>>) -> Self {
        match value {
            None => LevelRequest::Implicit,
            Some(levels) => LevelRequest::Explicit(levels),
        }
    }
}

impl From<LevelRequest> for Option<Vec<f64>> {
    fn from(value: LevelRequest) -> Self {
        match value {
            LevelRequest::Implicit => None,
            LevelRequest::Explicit(levels) => Some(levels),
        }
    }
}

/// Variables to extract from one level-type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelSelectionSpec {
    pub level_type: LevelType,
    pub variables: OrderedMap<LevelRequest>,
    /// Flatten levels into per-level variable names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level_name_mapping: Option<NameTemplate>,
}

impl LevelSelectionSpec {
    fn validate(&self, part: &str) -> Result<()> {
        let ctx = |msg: String| {
            TransformError::InvalidConfig(format!("part `{part}`, {}: {msg}", self.level_type))
        };
        if self.variables.is_empty() {
            return Err(ctx("no variables selected".into()));
        }
        for (var, request) in self.variables.iter() {
            match (request, &self.level_name_mapping) {
                (LevelRequest::Implicit, Some(template)) if template.has_level() => {
                    return Err(TransformError::Template(format!(
                        "`{template}` references the level but `{var}` has no explicit levels"
                    )));
                }
                (LevelRequest::Explicit(levels), template) => {
                    if levels.is_empty() {
                        return Err(ctx(format!("empty level list for `{var}`")));
                    }
                    if let Some(&bad) = levels.iter().find(|l| !l.is_finite()) {
                        return Err(ctx(format!("non-finite level {bad} for `{var}`")));
                    }
                    for (i, level) in levels.iter().enumerate() {
                        if levels[..i].contains(level) {
                            return Err(ctx(format!("duplicate level {level} for `{var}`")));
                        }
                    }
                    if let Some(template) = template {
                        if !template.has_level() && levels.len() > 1 {
                            return Err(TransformError::Template(format!(
                                "`{template}` has no level placeholder but `{var}` selects {} levels",
                                levels.len()
                            )));
                        }
                        for &level in levels {
                            template.render(var, Some(level))?;
                        }
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// One independently written group of variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartSpec {
    pub name: String,
    pub selections: Vec<LevelSelectionSpec>,
    /// Overrides the collection chunking per dimension.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunking: Option<BTreeMap<String, ChunkSize>>,
    /// Overrides the collection strictness.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strict_chunking: Option<bool>,
}

impl PartSpec {
    /// Chunk requests for this part: collection defaults, then overrides.
    pub fn chunking(&self, collection: &CollectionSpec) -> BTreeMap<String, ChunkSize> {
        let mut chunking = collection.chunking.clone();
        if let Some(overrides) = &self.chunking {
            chunking.extend(overrides.iter().map(|(d, c)| (d.clone(), *c)));
        }
        chunking
    }

    pub fn strictness(&self, collection: &CollectionSpec) -> Strictness {
        Strictness::from_flag(self.strict_chunking.unwrap_or(collection.strict_chunking))
    }

    /// Level-types this part reads, in first-use order.
    pub fn level_types(&self) -> Vec<LevelType> {
        let mut seen = Vec::new();
        for selection in &self.selections {
            if !seen.contains(&selection.level_type) {
                seen.push(selection.level_type);
            }
        }
        seen
    }
}

/// The full extraction configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSpec {
    #[serde(default)]
    pub description: String,
    pub parts: Vec<PartSpec>,
    /// Requested chunk size per dimension, for every part.
    #[serde(default)]
    pub chunking: BTreeMap<String, ChunkSize>,
    /// Require whole chunks along every dimension.
    #[serde(default)]
    pub strict_chunking: bool,
    /// Alternate short names stitched into `heightAboveGround` quantities.
    #[serde(default = "default_special_fields")]
    pub special_fields: OrderedMap<OrderedMap<f64>>,
}

impl CollectionSpec {
    /// Parse and validate a collection from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let spec: CollectionSpec = serde_yaml::from_str(yaml)
            .map_err(|e| TransformError::InvalidConfig(format!("collection YAML: {e}")))?;
        spec.validate()?;
        Ok(spec)
    }

    /// Run every load-time check.
    pub fn validate(&self) -> Result<()> {
        if self.parts.is_empty() {
            return Err(TransformError::InvalidConfig("collection has no parts".into()));
        }
        let mut names = HashSet::new();
        for part in &self.parts {
            if part.name.is_empty() {
                return Err(TransformError::InvalidConfig("part with empty name".into()));
            }
            if !names.insert(part.name.as_str()) {
                return Err(TransformError::InvalidConfig(format!(
                    "duplicate part name `{}`",
                    part.name
                )));
            }
            if part.selections.is_empty() {
                return Err(TransformError::InvalidConfig(format!(
                    "part `{}` has no selections",
                    part.name
                )));
            }
            for selection in &part.selections {
                selection.validate(&part.name)?;
            }
            if let Some((dim, _)) = part.chunking(self).iter().find(|(_, c)| !c.is_valid()) {
                return Err(TransformError::InvalidConfig(format!(
                    "part `{}`: chunk size for `{dim}` must be positive",
                    part.name
                )));
            }
        }
        for (quantity, alternates) in self.special_fields.iter() {
            if alternates.is_empty() {
                return Err(TransformError::InvalidConfig(format!(
                    "special field group `{quantity}` has no alternates"
                )));
            }
            let levels: Vec<f64> = alternates.iter().map(|(_, l)| *l).collect();
            for (i, level) in levels.iter().enumerate() {
                if levels[..i].contains(level) {
                    return Err(TransformError::InvalidConfig(format!(
                        "special field group `{quantity}` substitutes level {level} twice"
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn part(&self, name: &str) -> Option<&PartSpec> {
        self.parts.iter().find(|p| p.name == name)
    }

    pub fn special_field_groups(&self) -> Vec<SpecialFieldGroup> {
        self.special_fields
            .iter()
            .map(|(quantity, alternates)| SpecialFieldGroup {
                quantity: quantity.to_string(),
                alternates: alternates.iter().map(|(n, l)| (n.to_string(), *l)).collect(),
            })
            .collect()
    }
}

/// `u`/`v` at 10 m and 100 m and `t` at 2 m are reported under their own
/// short names and parameter identifiers.
pub fn default_special_fields() -> OrderedMap<OrderedMap<f64>> {
    OrderedMap(vec![
        (
            "u".to_string(),
            OrderedMap(vec![("10u".to_string(), 10.0), ("100u".to_string(), 100.0)]),
        ),
        (
            "v".to_string(),
            OrderedMap(vec![("10v".to_string(), 10.0), ("100v".to_string(), 100.0)]),
        ),
        ("t".to_string(), OrderedMap(vec![("2t".to_string(), 2.0)])),
    ])
}

fn explicit(vars: &[&str], levels: &[f64]) -> OrderedMap<LevelRequest> {
    vars.iter()
        .map(|v| (*v, LevelRequest::Explicit(levels.to_vec())))
        .collect()
}

fn implicit(vars: &[&str]) -> OrderedMap<LevelRequest> {
    vars.iter().map(|v| (*v, LevelRequest::Implicit)).collect()
}

fn template(s: &str) -> Option<NameTemplate> {
    NameTemplate::parse(s).ok()
}

impl Default for CollectionSpec {
    /// The DINI collection: height levels, pressure levels and single levels.
    fn default() -> Self {
        const PRESSURE_LEVELS: [f64; 14] = [
            1000.0, 950.0, 925.0, 900.0, 850.0, 800.0, 700.0, 600.0, 500.0, 400.0, 300.0, 250.0,
            200.0, 100.0,
        ];

        let parts = vec![
            PartSpec {
                name: "height_levels".into(),
                selections: vec![LevelSelectionSpec {
                    level_type: LevelType::HeightAboveGround,
                    variables: explicit(&["t", "r", "u", "v"], &[50.0, 100.0, 150.0, 250.0]),
                    level_name_mapping: None,
                }],
                chunking: None,
                strict_chunking: None,
            },
            PartSpec {
                name: "pressure_levels".into(),
                selections: vec![LevelSelectionSpec {
                    level_type: LevelType::IsobaricInhPa,
                    variables: explicit(&["z", "t", "u", "v", "r"], &PRESSURE_LEVELS),
                    level_name_mapping: None,
                }],
                chunking: None,
                strict_chunking: None,
            },
            PartSpec {
                name: "single_levels".into(),
                selections: vec![
                    LevelSelectionSpec {
                        level_type: LevelType::HeightAboveGround,
                        variables: implicit(&["hcc", "lcc", "mcc", "mld", "pres", "vis"]),
                        level_name_mapping: None,
                    },
                    LevelSelectionSpec {
                        level_type: LevelType::HeightAboveGround,
                        variables: OrderedMap(vec![
                            ("t".into(), LevelRequest::Explicit(vec![0.0, 2.0])),
                            ("r".into(), LevelRequest::Explicit(vec![2.0])),
                            ("u".into(), LevelRequest::Explicit(vec![10.0])),
                            ("v".into(), LevelRequest::Explicit(vec![10.0])),
                        ]),
                        level_name_mapping: template("{var_name}{level:d}m"),
                    },
                    LevelSelectionSpec {
                        level_type: LevelType::EntireAtmosphere,
                        variables: implicit(&["cape"]),
                        level_name_mapping: template("{var_name}_column"),
                    },
                    LevelSelectionSpec {
                        level_type: LevelType::HeightAboveSea,
                        variables: implicit(&["pres"]),
                        level_name_mapping: template("{var_name}_seasurface"),
                    },
                ],
                chunking: None,
                strict_chunking: None,
            },
        ];

        Self {
            description: "DINI Harmonie forecast, control member".into(),
            parts,
            chunking: [
                ("time".to_string(), ChunkSize::Length(1)),
                ("x".to_string(), ChunkSize::Split { split: 2 }),
                ("y".to_string(), ChunkSize::Split { split: 2 }),
            ]
            .into_iter()
            .collect(),
            strict_chunking: true,
            special_fields: default_special_fields(),
        }
    }
}

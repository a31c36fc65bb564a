//! Vertical coordinate systems a source field can be reported on.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TransformError;

/// Level-type of a source field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum LevelType {
    /// Pressure surfaces in hPa.
    IsobaricInhPa,
    /// Height above ground in metres.
    HeightAboveGround,
    /// Height above mean sea level in metres.
    HeightAboveSea,
    /// Whole atmospheric column.
    EntireAtmosphere,
    /// Time-invariant fields (land-sea mask, orography).
    Constants,
}

impl LevelType {
    pub const ALL: [LevelType; 5] = [
        LevelType::IsobaricInhPa,
        LevelType::HeightAboveGround,
        LevelType::HeightAboveSea,
        LevelType::EntireAtmosphere,
        LevelType::Constants,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LevelType::IsobaricInhPa => "isobaricInhPa",
            LevelType::HeightAboveGround => "heightAboveGround",
            LevelType::HeightAboveSea => "heightAboveSea",
            LevelType::EntireAtmosphere => "entireAtmosphere",
            LevelType::Constants => "CONSTANTS",
        }
    }

    /// Name the generic `level` dimension takes in written datasets.
    ///
    /// `None` means the level-type keeps no renamed vertical dimension.
    pub fn vertical_dim(&self) -> Option<&'static str> {
        match self {
            LevelType::IsobaricInhPa => Some("pressure"),
            LevelType::HeightAboveGround | LevelType::HeightAboveSea => Some("altitude"),
            LevelType::EntireAtmosphere | LevelType::Constants => None,
        }
    }

    /// Units of the level values.
    pub fn level_units(&self) -> Option<&'static str> {
        match self {
            LevelType::IsobaricInhPa => Some("hPa"),
            LevelType::HeightAboveGround | LevelType::HeightAboveSea => Some("m"),
            LevelType::EntireAtmosphere | LevelType::Constants => None,
        }
    }
}

impl FromStr for LevelType {
    type Err = TransformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LevelType::ALL
            .into_iter()
            .find(|lt| lt.as_str() == s)
            .ok_or_else(|| TransformError::UnsupportedLevelType(s.to_string()))
    }
}

impl TryFrom<String> for LevelType {
    type Error = TransformError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LevelType> for String {
    fn from(value: LevelType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for LevelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

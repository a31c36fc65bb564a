//! GRIB2 fixed-surface classification (code table 4.5).

use level_transform::LevelType;

use crate::table::ParameterEntry;

/// Ground or water surface.
pub const SURFACE_GROUND: u8 = 1;
/// Entire atmosphere as a single layer.
pub const SURFACE_ENTIRE_ATMOSPHERE: u8 = 10;
/// Isobaric surface, value in Pa.
pub const SURFACE_ISOBARIC: u8 = 100;
/// Mean sea level.
pub const SURFACE_MEAN_SEA_LEVEL: u8 = 101;
/// Specific altitude above mean sea level, value in m.
pub const SURFACE_ABOVE_SEA: u8 = 102;
/// Specified height level above ground, value in m.
pub const SURFACE_ABOVE_GROUND: u8 = 103;
/// Entire atmosphere (local use).
pub const SURFACE_ENTIRE_ATMOSPHERE_LOCAL: u8 = 200;

/// Level-type and level value of a first fixed surface.
///
/// Pressure is converted from Pa to hPa. Surfaces without a level value
/// report level 0. Returns `None` for surface types with no level-type.
pub fn classify_surface(surface_type: u8, value: f64) -> Option<(LevelType, f64)> {
    match surface_type {
        SURFACE_ISOBARIC => Some((LevelType::IsobaricInhPa, tidy(value / 100.0))),
        SURFACE_ABOVE_GROUND => Some((LevelType::HeightAboveGround, tidy(value))),
        SURFACE_ABOVE_SEA => Some((LevelType::HeightAboveSea, tidy(value))),
        SURFACE_GROUND => Some((LevelType::HeightAboveGround, 0.0)),
        SURFACE_MEAN_SEA_LEVEL => Some((LevelType::HeightAboveSea, 0.0)),
        SURFACE_ENTIRE_ATMOSPHERE | SURFACE_ENTIRE_ATMOSPHERE_LOCAL => {
            Some((LevelType::EntireAtmosphere, 0.0))
        }
        _ => None,
    }
}

/// Level-type a message is reported under once its table entry is known.
///
/// Constant entries always go to `CONSTANTS`, keeping the level of their
/// surface when there is one.
pub fn target_level(
    entry: &ParameterEntry,
    surface: Option<(LevelType, f64)>,
) -> Option<(LevelType, f64)> {
    if entry.constant {
        Some((LevelType::Constants, surface.map_or(0.0, |(_, level)| level)))
    } else {
        surface
    }
}

/// Round away scale-factor noise (e.g. 84999.99999 Pa).
fn tidy(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}

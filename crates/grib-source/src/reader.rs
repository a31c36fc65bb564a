//! GRIB2 run-directory reader.
//!
//! One directory per analysis time holds every GRIB2 file of the run.
//! Reading a level-type scans all files, keeps the messages whose table
//! entry and fixed surface place them on that level-type, and assembles
//! one field per short name.

use std::fmt::Write as _;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use grib::codetables::grib2::Table4_4;
use grib::codetables::Code;
use level_transform::{LevelType, SourceReader};
use nwp_common::FieldSet;
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use crate::cf::copy_cf_standard_names;
use crate::collect::{DecodedMessage, FieldCollector};
use crate::error::{Result, SourceError};
use crate::projection::GridMapping;
use crate::surface::{classify_surface, target_level};
use crate::table::{ParamKey, ParameterTable};

/// Run directory name, formatted from the analysis time.
pub const DEFAULT_RUN_DIR_PATTERN: &str = "%Y-%m-%dT%H%MZ";

/// File extensions treated as GRIB.
pub const GRIB_EXTENSIONS: [&str; 4] = ["grib2", "grb2", "grib", "grb"];

/// Where to find the GRIB files of one forecast run.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Directory holding one run directory per analysis time.
    pub root: PathBuf,
    /// `chrono` format string for the run directory name.
    pub run_dir_pattern: String,
    /// Analysis time of the run.
    pub t_analysis: DateTime<Utc>,
}

impl SourceConfig {
    pub fn new(root: impl Into<PathBuf>, t_analysis: DateTime<Utc>) -> Self {
        Self {
            root: root.into(),
            run_dir_pattern: DEFAULT_RUN_DIR_PATTERN.to_string(),
            t_analysis,
        }
    }

    pub fn with_run_dir_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.run_dir_pattern = pattern.into();
        self
    }

    /// Directory of this run, e.g. `{root}/2025-02-17T0100Z`.
    pub fn run_dir(&self) -> Result<PathBuf> {
        let mut name = String::new();
        write!(name, "{}", self.t_analysis.format(&self.run_dir_pattern))
            .map_err(|_| SourceError::InvalidRunDirPattern(self.run_dir_pattern.clone()))?;
        if name.is_empty() {
            return Err(SourceError::InvalidRunDirPattern(self.run_dir_pattern.clone()));
        }
        Ok(self.root.join(name))
    }
}

/// GRIB files below `dir`, sorted by path.
pub fn discover_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(SourceError::RunDirectoryNotFound(dir.to_path_buf()));
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::from)?;
        if entry.file_type().is_file() && is_grib(entry.path()) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

fn is_grib(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| GRIB_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Source reader over a GRIB2 run directory.
///
/// The parameter table is passed in explicitly; nothing is read from
/// process-wide decoder state.
#[derive(Debug)]
pub struct GribSourceReader {
    config: SourceConfig,
    table: ParameterTable,
    grid_mapping: Option<GridMapping>,
    files: Option<Vec<PathBuf>>,
}

impl GribSourceReader {
    pub fn new(config: SourceConfig, table: ParameterTable) -> Self {
        Self {
            config,
            table,
            grid_mapping: None,
            files: None,
        }
    }

    /// Attach a CF grid mapping to every field read.
    pub fn with_grid_mapping(mut self, grid_mapping: GridMapping) -> Self {
        self.grid_mapping = Some(grid_mapping);
        self
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    /// GRIB files of the run, discovered on first use.
    pub fn files(&mut self) -> Result<&[PathBuf]> {
        if self.files.is_none() {
            let run_dir = self.config.run_dir()?;
            let files = discover_files(&run_dir)?;
            info!(run_dir = %run_dir.display(), files = files.len(), "Discovered GRIB files");
            self.files = Some(files);
        }
        Ok(self.files.as_deref().unwrap_or_default())
    }

    /// Decode the messages of one file that belong to the collector's level-type.
    #[instrument(skip(self, collector), fields(file = %path.display()))]
    fn scan_file(&self, path: &Path, collector: &mut FieldCollector) -> Result<usize> {
        let grib_error =
            |e: &dyn std::fmt::Display| SourceError::Grib(format!("{}: {e}", path.display()));
        let reader = BufReader::new(File::open(path)?);
        let grib2 = grib::from_reader(reader).map_err(|e| grib_error(&e))?;

        let mut kept = 0usize;
        for (index, submsg) in grib2.iter() {
            let discipline = submsg.indicator().discipline;
            let prod_def = submsg.prod_def();
            let (Some(category), Some(number)) =
                (prod_def.parameter_category(), prod_def.parameter_number())
            else {
                debug!(?index, "Message without parameter, skipping");
                continue;
            };
            let key: ParamKey = (discipline, category, number);

            let surface = match prod_def.fixed_surfaces() {
                Some((first, _)) => {
                    let classified = classify_surface(first.surface_type, first.value());
                    if classified.is_none() {
                        debug!(?index, surface_type = first.surface_type, "Unknown surface type");
                    }
                    classified
                }
                None => None,
            };

            let Some(entry) = self
                .table
                .lookup(key, surface.map(|(lt, _)| lt), surface.map_or(0.0, |(_, l)| l))
            else {
                debug!(?index, ?key, "No parameter table entry, skipping");
                continue;
            };
            let Some((level_type, level)) = target_level(entry, surface) else {
                continue;
            };
            if level_type != collector.level_type() {
                continue;
            }

            let step_hours = match prod_def.forecast_time() {
                Some(ft) => match ft.unit {
                    Code::Name(Table4_4::Hour) => f64::from(ft.value),
                    Code::Name(Table4_4::Minute) => f64::from(ft.value) / 60.0,
                    _ => {
                        warn!(?index, short_name = %entry.short_name, "Unsupported forecast time unit, skipping");
                        continue;
                    }
                },
                None => {
                    warn!(?index, short_name = %entry.short_name, "Message without forecast time, skipping");
                    continue;
                }
            };

            let (ni, nj) = submsg.grid_shape().map_err(|e| grib_error(&e))?;
            let entry = entry.clone();
            let values: Vec<f32> = grib::Grib2SubmessageDecoder::from(submsg)
                .map_err(|e| grib_error(&e))?
                .dispatch()
                .map_err(|e| grib_error(&e))?
                .collect();

            collector.push(DecodedMessage {
                entry,
                level,
                step_hours,
                grid: (nj, ni),
                values,
            })?;
            kept += 1;
        }
        Ok(kept)
    }
}

impl SourceReader for GribSourceReader {
    type Error = SourceError;

    fn read_level_type(&mut self, level_type: LevelType) -> Result<FieldSet> {
        let files = self.files()?.to_vec();
        let mut collector = FieldCollector::new(level_type, self.config.t_analysis);
        let mut messages = 0usize;
        for path in &files {
            messages += self.scan_file(path, &mut collector)?;
        }

        let mut fields = collector.finish()?;
        if fields.is_empty() {
            warn!(level_type = %level_type, "No GRIB messages found for level-type");
        }
        copy_cf_standard_names(&mut fields);
        if let Some(grid_mapping) = &self.grid_mapping {
            grid_mapping.apply(&mut fields)?;
        }

        info!(
            level_type = %level_type,
            files = files.len(),
            messages = messages,
            fields = fields.len(),
            "Read level-type"
        );
        Ok(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs;
    use test_utils::times::RUN_DIR;

    fn analysis() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 17, 1, 0, 0).unwrap()
    }

    #[test]
    fn test_run_dir_default_pattern() {
        let config = SourceConfig::new("/data/CONTROL", analysis());
        assert_eq!(
            config.run_dir().unwrap(),
            PathBuf::from("/data/CONTROL").join(RUN_DIR)
        );
    }

    #[test]
    fn test_run_dir_custom_pattern() {
        let config = SourceConfig::new("/data", analysis()).with_run_dir_pattern("%Y%m%d/%H");
        assert_eq!(config.run_dir().unwrap(), PathBuf::from("/data/20250217/01"));
    }

    #[test]
    fn test_discover_grib_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("sub");
        fs::create_dir(&nested).unwrap();
        for name in ["b.grib2", "a.GRB2", "notes.txt"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        fs::write(nested.join("c.grib"), b"").unwrap();

        let files = discover_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("a.GRB2"),
                PathBuf::from("b.grib2"),
                PathBuf::from("sub/c.grib"),
            ]
        );
    }

    #[test]
    fn test_missing_run_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut reader = GribSourceReader::new(
            SourceConfig::new(dir.path(), analysis()),
            ParameterTable::builtin(),
        );
        let err = reader.read_level_type(LevelType::HeightAboveGround).unwrap_err();
        assert!(matches!(err, SourceError::RunDirectoryNotFound(_)));
    }

    #[test]
    fn test_empty_run_dir_yields_no_fields() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join(RUN_DIR)).unwrap();
        let mut reader = GribSourceReader::new(
            SourceConfig::new(dir.path(), analysis()),
            ParameterTable::builtin(),
        );
        let fields = reader.read_level_type(LevelType::IsobaricInhPa).unwrap();
        assert!(fields.is_empty());
    }
}

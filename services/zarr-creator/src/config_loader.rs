//! Configuration loader for zarr-creator.
//!
//! One YAML file describes where the GRIB2 runs live, where stores go and
//! which parts to build. Every section is optional; missing sections fall
//! back to the built-in DINI configuration. Supports environment variable
//! substitution using ${VAR} and ${VAR:-default} syntax.

use anyhow::{Context, Result};
use grib_source::{GridMapping, ParameterTable, DEFAULT_RUN_DIR_PATTERN};
use level_transform::CollectionSpec;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use zarr_store::{StoreConfig, DEFAULT_MEMBER, DEFAULT_TEMPLATE};

// ============================================================================
// Creator Configuration
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatorConfig {
    #[serde(default)]
    pub source: SourceSection,
    #[serde(default)]
    pub output: OutputSection,
    /// Parts to build; the built-in collection when absent.
    #[serde(default)]
    pub collection: Option<CollectionSpec>,
    /// CF grid mapping attached to every variable.
    #[serde(default)]
    pub grid_mapping: Option<GridMapping>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourceSection {
    /// Directory holding one run directory per analysis time.
    pub root: PathBuf,
    /// `chrono` format of the run directory name.
    pub run_dir_pattern: String,
    /// Parameter table YAML; the built-in table when absent.
    pub definitions: Option<PathBuf>,
}

impl Default for SourceSection {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            run_dir_pattern: DEFAULT_RUN_DIR_PATTERN.to_string(),
            definitions: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSection {
    /// Destination template with `{member}`, `{t_analysis}`, `{dataset_id}`.
    pub template: String,
    pub member: String,
    #[serde(flatten)]
    pub store: StoreConfig,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_string(),
            member: DEFAULT_MEMBER.to_string(),
            store: StoreConfig::default(),
        }
    }
}

impl CreatorConfig {
    /// The collection to build.
    pub fn collection(&self) -> CollectionSpec {
        self.collection.clone().unwrap_or_default()
    }
}

// ============================================================================
// Loading Functions
// ============================================================================

/// Load and parse a creator config with environment variable substitution
pub fn load_creator_config<P: AsRef<Path>>(path: P) -> Result<CreatorConfig> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read creator config from {:?}", path.as_ref()))?;

    parse_creator_config(&content)
        .with_context(|| format!("Invalid creator config {:?}", path.as_ref()))
}

/// Parse a creator config from YAML text.
pub fn parse_creator_config(content: &str) -> Result<CreatorConfig> {
    let expanded = expand_env_vars(content)?;

    let config: CreatorConfig =
        serde_yaml::from_str(&expanded).context("Failed to parse creator config YAML")?;

    validate_creator_config(&config)?;

    Ok(config)
}

/// Load a parameter table YAML file with environment variable substitution
pub fn load_parameter_table<P: AsRef<Path>>(path: P) -> Result<ParameterTable> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read parameter table from {:?}", path.as_ref()))?;

    let expanded = expand_env_vars(&content)?;

    ParameterTable::from_yaml(&expanded)
        .with_context(|| format!("Failed to parse parameter table from {:?}", path.as_ref()))
}

// ============================================================================
// Environment Variable Expansion
// ============================================================================

/// Expand environment variables in YAML content
/// Supports ${VAR} and ${VAR:-default} syntax. Comment text is copied as-is.
pub fn expand_env_vars(content: &str) -> Result<String> {
    let mut result = String::with_capacity(content.len());
    let mut chars = content.chars().peekable();
    let mut quote: Option<char> = None;
    let mut in_comment = false;
    let mut prev: Option<char> = None;

    while let Some(ch) = chars.next() {
        if in_comment {
            in_comment = ch != '\n';
        } else if let Some(q) = quote {
            if ch == q {
                quote = None;
            }
        } else if ch == '"' || ch == '\'' {
            quote = Some(ch);
        } else if ch == '#' && prev.map_or(true, char::is_whitespace) {
            in_comment = true;
        }
        if ch == '\n' {
            quote = None;
        }
        prev = Some(ch);

        if !in_comment && ch == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'

            let mut var_expr = String::new();
            let mut brace_count = 1;

            while brace_count > 0 {
                match chars.next() {
                    Some('{') => {
                        brace_count += 1;
                        var_expr.push('{');
                    }
                    Some('}') => {
                        brace_count -= 1;
                        if brace_count > 0 {
                            var_expr.push('}');
                        }
                    }
                    Some(c) => var_expr.push(c),
                    None => anyhow::bail!("Unclosed variable substitution: ${{{}", var_expr),
                }
            }

            result.push_str(&resolve_var_expr(&var_expr)?);
        } else {
            result.push(ch);
        }
    }

    Ok(result)
}

/// Resolve variable expression (supports VAR and VAR:-default syntax)
fn resolve_var_expr(expr: &str) -> Result<String> {
    if let Some((var_name, default)) = expr.split_once(":-") {
        match std::env::var(var_name.trim()) {
            Ok(val) if !val.is_empty() => Ok(val),
            _ => Ok(default.to_string()),
        }
    } else {
        std::env::var(expr.trim()).with_context(|| format!("Environment variable {} not set", expr))
    }
}

// ============================================================================
// Validation
// ============================================================================

fn validate_creator_config(config: &CreatorConfig) -> Result<()> {
    anyhow::ensure!(
        !config.source.run_dir_pattern.is_empty(),
        "source.run_dir_pattern cannot be empty"
    );
    anyhow::ensure!(
        !config.output.template.is_empty(),
        "output.template cannot be empty"
    );
    anyhow::ensure!(!config.output.member.is_empty(), "output.member cannot be empty");

    config.output.store.validate()?;

    if let Some(collection) = &config.collection {
        collection.validate()?;
    }

    if let Some(mapping) = &config.grid_mapping {
        anyhow::ensure!(!mapping.name.is_empty(), "grid_mapping.name cannot be empty");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use zarr_store::ZarrCompression;

    #[test]
    fn test_expand_env_vars_simple() {
        std::env::set_var("ZC_TEST_SIMPLE", "/data/dini");
        let result = expand_env_vars("root: ${ZC_TEST_SIMPLE}/runs").unwrap();
        assert_eq!(result, "root: /data/dini/runs");
    }

    #[test]
    fn test_expand_env_vars_with_default() {
        std::env::remove_var("ZC_TEST_UNSET");
        let result = expand_env_vars("member: ${ZC_TEST_UNSET:-control}").unwrap();
        assert_eq!(result, "member: control");
    }

    #[test]
    fn test_expand_env_vars_missing_required() {
        std::env::remove_var("ZC_TEST_REQUIRED");
        assert!(expand_env_vars("root: ${ZC_TEST_REQUIRED}").is_err());
    }

    #[test]
    fn test_expand_env_vars_unclosed() {
        let err = expand_env_vars("root: ${ZC_TEST_SIMPLE").unwrap_err();
        assert!(err.to_string().contains("Unclosed"));
    }

    #[test]
    fn test_expand_env_vars_skips_comments() {
        std::env::remove_var("ZC_TEST_IN_COMMENT");
        std::env::set_var("ZC_TEST_AFTER_COMMENT", "control");
        let content = "# uses ${ZC_TEST_IN_COMMENT}\nmember: ${ZC_TEST_AFTER_COMMENT} # not ${ZC_TEST_IN_COMMENT}\nroot: \"/data/#1\"\n";
        let result = expand_env_vars(content).unwrap();
        assert_eq!(
            result,
            "# uses ${ZC_TEST_IN_COMMENT}\nmember: control # not ${ZC_TEST_IN_COMMENT}\nroot: \"/data/#1\"\n"
        );
    }

    #[test]
    fn test_expand_env_vars_in_quoted_hash_value() {
        std::env::set_var("ZC_TEST_QUOTED", "run");
        let result = expand_env_vars("pattern: \"#${ZC_TEST_QUOTED}\"").unwrap();
        assert_eq!(result, "pattern: \"#run\"");
    }

    #[test]
    fn test_resolve_var_expr_override_default() {
        std::env::set_var("ZC_TEST_OVERRIDE", "member1");
        assert_eq!(resolve_var_expr("ZC_TEST_OVERRIDE:-control").unwrap(), "member1");
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_creator_config("{}").unwrap();
        assert_eq!(config.output.template, DEFAULT_TEMPLATE);
        assert_eq!(config.output.member, "control");
        assert_eq!(config.output.store.region, "eu-central-1");
        assert_eq!(config.source.run_dir_pattern, DEFAULT_RUN_DIR_PATTERN);
        assert_eq!(config.collection(), CollectionSpec::default());
        assert!(config.grid_mapping.is_none());
    }

    #[test]
    fn test_full_config() {
        std::env::set_var("ZC_TEST_ROOT", "/mnt/harmonie");
        let config = parse_creator_config(
            r#"
source:
  root: ${ZC_TEST_ROOT}/CONTROL
  run_dir_pattern: "%Y%m%d%H"
output:
  template: /tmp/zarr/{member}/{dataset_id}.zarr
  member: ${ZC_TEST_MEMBER:-control}
  compression: blosc_lz4
  compression_level: 5
  local_copy: /tmp/copies
grid_mapping:
  name: dini_projection
  attributes:
    grid_mapping_name: lambert_conformal_conic
collection:
  chunking:
    time: 1
  parts:
    - name: cloud
      selections:
        - level_type: heightAboveGround
          variables:
            hcc: null
"#,
        )
        .unwrap();

        assert_eq!(config.source.root, PathBuf::from("/mnt/harmonie/CONTROL"));
        assert_eq!(config.source.run_dir_pattern, "%Y%m%d%H");
        assert_eq!(config.output.store.compression, ZarrCompression::BloscLz4);
        assert_eq!(config.output.store.compression_level, 5);
        assert_eq!(config.output.store.local_copy, Some(PathBuf::from("/tmp/copies")));
        assert_eq!(config.collection().parts.len(), 1);
        assert_eq!(config.grid_mapping.unwrap().name, "dini_projection");
    }

    #[test]
    fn test_bundled_config_files() {
        let config_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config");
        let config = load_creator_config(config_dir.join("creator.yaml")).unwrap();
        let collection = config.collection();
        let names: Vec<_> = collection.parts.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["height_levels", "pressure_levels", "single_levels"]);
        assert_eq!(config.grid_mapping.unwrap().name, "dini_projection");

        let table = load_parameter_table(config_dir.join("parameters.yaml")).unwrap();
        assert_eq!(table.len(), ParameterTable::builtin().len());
    }

    #[test]
    fn test_invalid_collection_rejected() {
        let err = parse_creator_config("collection:\n  parts: []\n").unwrap_err();
        assert!(format!("{err:#}").contains("no parts"));
    }

    #[test]
    fn test_unknown_section_rejected() {
        assert!(parse_creator_config("sources: {}\n").is_err());
    }

    #[test]
    fn test_invalid_compression_level_rejected() {
        assert!(parse_creator_config("output:\n  compression_level: 0\n").is_err());
    }
}

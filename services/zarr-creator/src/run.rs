//! Run orchestration: build every selected part and write its store.
//!
//! Parts are processed one after another. A part that fails to build or
//! write is logged and skipped; the remaining parts still run and the
//! report records every failure.

use std::fmt;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use grib_source::{GribSourceReader, ParameterTable, SourceConfig};
use level_transform::{BuiltPart, CollectionSpec, PartBuilder, SourceReader};
use tracing::{error, info, warn};
use zarr_store::{Destination, WriteSummary, ZarrStoreWriter};

use crate::config_loader::{load_parameter_table, CreatorConfig, OutputSection};

/// Everything one invocation needs.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub t_analysis: DateTime<Utc>,
    pub config: CreatorConfig,
    /// Only build these parts (all when empty).
    pub parts: Vec<String>,
    /// Build and chunk-plan every part without writing.
    pub dry_run: bool,
}

/// What happened to one part.
#[derive(Debug)]
pub enum PartStatus {
    Written(WriteSummary),
    Planned { variables: usize },
    Failed(String),
}

#[derive(Debug)]
pub struct PartOutcome {
    pub name: String,
    pub status: PartStatus,
}

/// Outcome of every part of a run, in collection order.
#[derive(Debug, Default)]
pub struct RunReport {
    pub outcomes: Vec<PartOutcome>,
}

impl RunReport {
    pub fn failed(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, PartStatus::Failed(_)))
            .map(|o| o.name.as_str())
            .collect()
    }

    pub fn is_success(&self) -> bool {
        self.failed().is_empty()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for outcome in &self.outcomes {
            match &outcome.status {
                PartStatus::Written(summary) => writeln!(
                    f,
                    "{}: wrote {} arrays ({} bytes) to {}",
                    outcome.name, summary.arrays, summary.bytes_written, summary.destination
                )?,
                PartStatus::Planned { variables } => {
                    writeln!(f, "{}: planned {} variables", outcome.name, variables)?
                }
                PartStatus::Failed(reason) => writeln!(f, "{}: FAILED: {}", outcome.name, reason)?,
            }
        }
        Ok(())
    }
}

/// Run the configured collection against the GRIB2 run of `t_analysis`.
pub async fn run(options: &RunOptions) -> Result<RunReport> {
    let config = &options.config;
    let collection = select_parts(config.collection(), &options.parts)?;

    let table = match &config.source.definitions {
        Some(path) => load_parameter_table(path)?,
        None => ParameterTable::builtin(),
    };
    info!(entries = table.len(), "Loaded parameter table");

    let source = SourceConfig::new(config.source.root.clone(), options.t_analysis)
        .with_run_dir_pattern(config.source.run_dir_pattern.clone());
    let mut reader = GribSourceReader::new(source, table);
    if let Some(mapping) = &config.grid_mapping {
        reader = reader.with_grid_mapping(mapping.clone());
    }

    run_collection(
        &collection,
        reader,
        &config.output,
        options.t_analysis,
        options.dry_run,
    )
    .await
}

/// Build and write every part of `collection` from `reader`.
pub async fn run_collection<R: SourceReader>(
    collection: &CollectionSpec,
    reader: R,
    output: &OutputSection,
    t_analysis: DateTime<Utc>,
    dry_run: bool,
) -> Result<RunReport> {
    let writer = ZarrStoreWriter::new(output.store.clone());
    let mut builder = PartBuilder::new(collection, reader);
    let mut report = RunReport::default();

    for part in &collection.parts {
        let status = match builder.build_part(part) {
            Ok(built) if dry_run => {
                info!(part = %built.name, chunks = ?built.plan.chunks, "Dry run, not writing");
                PartStatus::Planned {
                    variables: built.dataset.len(),
                }
            }
            Ok(built) => match write_part(&writer, &built, output, t_analysis).await {
                Ok(summary) => PartStatus::Written(summary),
                Err(e) => {
                    error!(part = %part.name, error = %format!("{e:#}"), "Failed to write part");
                    PartStatus::Failed(format!("{e:#}"))
                }
            },
            Err(e) => {
                error!(part = %part.name, error = %e, "Failed to build part");
                PartStatus::Failed(e.to_string())
            }
        };
        report.outcomes.push(PartOutcome {
            name: part.name.clone(),
            status,
        });
    }

    let failed = report.failed();
    if failed.is_empty() {
        info!(parts = report.outcomes.len(), "Run complete");
    } else {
        warn!(parts = report.outcomes.len(), failed = ?failed, "Run complete with failures");
    }
    Ok(report)
}

async fn write_part(
    writer: &ZarrStoreWriter,
    built: &BuiltPart,
    output: &OutputSection,
    t_analysis: DateTime<Utc>,
) -> Result<WriteSummary> {
    let destination =
        Destination::from_template(&output.template, &output.member, t_analysis, &built.name)
            .context("Invalid output template")?;
    let summary = writer
        .write(&built.dataset, &built.plan, &destination)
        .await
        .with_context(|| format!("Failed to write {destination}"))?;
    Ok(summary)
}

/// Restrict `collection` to the named parts, keeping collection order.
pub fn select_parts(mut collection: CollectionSpec, names: &[String]) -> Result<CollectionSpec> {
    if names.is_empty() {
        return Ok(collection);
    }
    for name in names {
        anyhow::ensure!(
            collection.part(name).is_some(),
            "Unknown part {:?}; available: {:?}",
            name,
            collection.parts.iter().map(|p| p.name.as_str()).collect::<Vec<_>>()
        );
    }
    collection.parts.retain(|p| names.contains(&p.name));
    Ok(collection)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_parts_keeps_order() {
        let collection = select_parts(
            CollectionSpec::default(),
            &["single_levels".to_string(), "height_levels".to_string()],
        )
        .unwrap();
        let names: Vec<_> = collection.parts.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["height_levels", "single_levels"]);
    }

    #[test]
    fn test_select_unknown_part() {
        let err = select_parts(CollectionSpec::default(), &["surface".to_string()]).unwrap_err();
        assert!(err.to_string().contains("surface"));
    }

    #[test]
    fn test_no_filter_keeps_everything() {
        let all = CollectionSpec::default();
        assert_eq!(select_parts(all.clone(), &[]).unwrap(), all);
    }
}

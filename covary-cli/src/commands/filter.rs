//! Filter command implementation - load a dataset and list co-varying pairs

use anyhow::{Context, Result};
use covary_core::dataset::Completion;
use covary_core::{CooccurMetric, DatasetManifest, DatasetSession, FilteredEntry, Thresholds};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};

use super::map_file;
use crate::config::Config;
use crate::error::CliError;

/// Command-line values that take precedence over the configuration file.
#[derive(Debug, Clone, Default)]
pub struct ThresholdOverrides {
    pub min_depth_percent: Option<f64>,
    pub min_variant_fraction: Option<f64>,
    pub also_j: bool,
    pub min_abs_metric: Option<f64>,
    pub synonymy: bool,
    pub syn_metric: Option<CooccurMetric>,
}

impl ThresholdOverrides {
    pub fn apply(&self, mut thresholds: Thresholds) -> Thresholds {
        if let Some(value) = self.min_depth_percent {
            thresholds.min_depth_percent = value;
        }
        if let Some(value) = self.min_variant_fraction {
            thresholds.min_variant_fraction = value;
        }
        if let Some(value) = self.min_abs_metric {
            thresholds.min_abs_metric = value;
        }
        if let Some(metric) = self.syn_metric {
            thresholds.syn_metric = metric;
        }
        thresholds.min_variant_fraction_also_for_j |= self.also_j;
        thresholds.synonymy |= self.synonymy;
        thresholds
    }
}

pub fn execute(
    config: &Config,
    manifest: PathBuf,
    dataset: String,
    data_dir: Option<PathBuf>,
    metric_index: Option<usize>,
    overrides: ThresholdOverrides,
    out: Option<PathBuf>,
) -> Result<()> {
    let thresholds = overrides.apply(config.filter.thresholds());
    validate_thresholds(&thresholds)?;

    let data_dir = data_dir
        .or_else(|| config.dataset.data_dir.clone())
        .unwrap_or_else(|| manifest.parent().map(Path::to_path_buf).unwrap_or_default());
    let metric_index = metric_index.unwrap_or(config.dataset.metric_index);

    let mut session = load_dataset(&manifest, &dataset, &data_dir, metric_index)?;
    let entries = session.filter(&thresholds).ok_or_else(|| not_ready(&session, &dataset))?;

    print_summary(&entries, &thresholds, config.output.max_entries);

    if let Some(path) = out {
        let json = if config.output.pretty {
            serde_json::to_string_pretty(&entries)
        } else {
            serde_json::to_string(&entries)
        }
        .context("Failed to serialize filter result")?;
        std::fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        log::info!("Filter result written to: {}", path.display());
    }

    Ok(())
}

/// Decode every file of `dataset` into a fresh session.
///
/// Files that are missing or fail to decode are logged and left out;
/// readiness is decided by the caller.
pub fn load_dataset(manifest: &Path, dataset: &str, data_dir: &Path, metric_index: usize) -> Result<DatasetSession> {
    if !manifest.exists() {
        return Err(CliError::file_not_found(manifest.to_path_buf()).into());
    }
    let manifest = DatasetManifest::load_from_file(manifest)
        .with_context(|| format!("Failed to load manifest {}", manifest.display()))?;
    let mut session = DatasetSession::new(manifest);
    let plan = session.begin(dataset, metric_index)?;

    let progress = ProgressBar::new(plan.requests.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );

    for request in &plan.requests {
        progress.set_message(request.metric.clone());
        let data = match map_file(&data_dir.join(&request.file)) {
            Ok(data) => data,
            Err(err) => {
                log::warn!("Skipping {}: {}", request.file, err);
                progress.inc(1);
                continue;
            }
        };
        match session.complete(plan.epoch, &request.metric, &data) {
            Ok(Completion::Decoded(report)) => {
                log::debug!("{}: {} pairs from {}", request.metric, report.inserted, request.file);
            }
            Ok(_) => {}
            Err(err) => log::warn!("Skipping {}: {}", request.file, err),
        }
        progress.inc(1);
    }
    progress.finish_and_clear();

    if let Some(file) = &plan.annotations {
        let path = data_dir.join(file);
        let bytes = std::fs::read(&path).with_context(|| format!("Failed to read annotations {}", path.display()))?;
        if let Completion::Annotations { genes, domains } = session.complete_annotations(plan.epoch, &bytes)? {
            log::info!("{} genes, {} domains", genes, domains);
        }
    }

    Ok(session)
}

fn not_ready(session: &DatasetSession, dataset: &str) -> anyhow::Error {
    let missing: Vec<String> = session
        .failed()
        .map(|(metric, reason)| format!("{} ({})", metric, reason))
        .chain(session.pending().map(str::to_string))
        .collect();
    CliError::not_ready(dataset.to_string(), missing.join(", ")).into()
}

fn validate_thresholds(thresholds: &Thresholds) -> Result<(), CliError> {
    if !(0.0..=1.0).contains(&thresholds.min_depth_percent) {
        return Err(CliError::validation(format!(
            "min depth percent must be within [0, 1], got {}",
            thresholds.min_depth_percent
        )));
    }
    if !(0.0..=1.0).contains(&thresholds.min_variant_fraction) {
        return Err(CliError::validation(format!(
            "min variant fraction must be within [0, 1], got {}",
            thresholds.min_variant_fraction
        )));
    }
    if thresholds.min_abs_metric < 0.0 {
        return Err(CliError::validation(format!(
            "min abs metric must not be negative, got {}",
            thresholds.min_abs_metric
        )));
    }
    Ok(())
}

fn print_summary(entries: &[FilteredEntry], thresholds: &Thresholds, max_entries: usize) {
    let pairs: usize = entries.iter().map(|e| e.num_found).sum();
    println!("{} positions, {} pairs pass", entries.len(), pairs);
    println!(
        "  depth >= {:.0}% of max, variant fraction >= {}{}, |metric| >= {}{}",
        thresholds.min_depth_percent * 100.0,
        thresholds.min_variant_fraction,
        if thresholds.min_variant_fraction_also_for_j { " (i and j)" } else { "" },
        thresholds.min_abs_metric,
        if thresholds.synonymy { format!(", synonymy ({:?})", thresholds.syn_metric) } else { String::new() },
    );

    for entry in entries.iter().take(max_entries) {
        let partners: Vec<String> = entry
            .related_pairs
            .iter()
            .map(|pair| {
                let score = if thresholds.synonymy { pair.metric_syn.or(pair.metric) } else { pair.metric };
                format!("{}:{:.3}", pair.posj, score.unwrap_or(0.0))
            })
            .collect();
        println!("  {:>6}  {:>3}  {}", entry.pos, entry.num_found, partners.join(" "));
    }
    if entries.len() > max_entries {
        println!("  ... {} more positions", entries.len() - max_entries);
    }
}

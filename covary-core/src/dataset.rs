//! Dataset manifest and the load session built around it.
//!
//! A session owns everything that belongs to the selected dataset:
//! - Store        { decoded metrics, bounds, reference }
//! - Annotations  { genes and flattened domains }
//! - Filter cache { synonymy side table }
//!
//! Selecting a dataset resets all of it at once and bumps an epoch. Every
//! completion carries the epoch it was requested under; completions from an
//! earlier epoch are dropped without touching the new dataset.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use thiserror::Error;

use crate::annotation::{AnnotationError, AnnotationSet};
use crate::decode::{BinaryMatrixDecoder, DecodeError, DecodeReport};
use crate::filter::{FilterEngine, FilteredEntry, Thresholds};
use crate::store::PairStatisticsStore;
use crate::types::*;
use crate::variants::VariantMatrix;

/// Metrics that must decode before the dataset can be filtered.
pub const REQUIRED_METRICS: [&str; 3] = [metric_names::DEPTH, metric_names::COUNTS, metric_names::METRIC];

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid manifest JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown dataset: {0}")]
    UnknownDataset(String),
}

pub type ManifestResult<T> = Result<T, ManifestError>;

/// Files making up one dataset, relative to the data directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetEntry {
    /// Read depth file.
    pub attenuation: String,
    /// Alternative co-occurrence metric files; one is loaded at a time.
    pub metrics: Vec<String>,
    pub variant_counts: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fullcounts: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refdata: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_counts: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subunits: Option<serde_json::Value>,
}

/// Dataset name to file set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetManifest {
    datasets: BTreeMap<String, DatasetEntry>,
}

impl DatasetManifest {
    pub fn from_json(bytes: &[u8]) -> ManifestResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> ManifestResult<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_json(&bytes)
    }

    pub fn insert(&mut self, name: impl Into<String>, entry: DatasetEntry) {
        self.datasets.insert(name.into(), entry);
    }

    pub fn get(&self, name: &str) -> ManifestResult<&DatasetEntry> {
        self.datasets
            .get(name)
            .ok_or_else(|| ManifestError::UnknownDataset(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.datasets.keys().map(String::as_str)
    }

    pub fn to_json_pretty(&self) -> ManifestResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("Metric index {index} out of range: dataset has {available} metrics")]
    MetricIndexOutOfRange { index: usize, available: usize },

    #[error("Metric '{0}' was not requested for this dataset")]
    UnexpectedMetric(String),

    #[error("Failed to decode {metric}: {source}")]
    Decode {
        metric: String,
        #[source]
        source: DecodeError,
    },

    #[error(transparent)]
    Annotations(#[from] AnnotationError),
}

pub type SessionResult<T> = Result<T, SessionError>;

/// One file the caller has to fetch and hand back through [`DatasetSession::complete`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub metric: String,
    pub file: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadPlan {
    pub epoch: u64,
    pub dataset: String,
    pub requests: Vec<LoadRequest>,
    pub annotations: Option<String>,
}

#[derive(Debug)]
pub enum Completion {
    Decoded(DecodeReport),
    Annotations { genes: usize, domains: usize },
    /// The completion belonged to a superseded dataset and was ignored.
    Stale,
}

#[derive(Debug, Default)]
pub struct DatasetSession {
    manifest: DatasetManifest,
    decoder: BinaryMatrixDecoder,
    store: PairStatisticsStore,
    annotations: AnnotationSet,
    engine: FilterEngine,
    epoch: u64,
    dataset: Option<String>,
    pending: BTreeSet<String>,
    completed: BTreeSet<String>,
    failed: BTreeMap<String, String>,
}

impl DatasetSession {
    pub fn new(manifest: DatasetManifest) -> Self {
        Self { manifest, ..Self::default() }
    }

    pub fn manifest(&self) -> &DatasetManifest {
        &self.manifest
    }

    /// Switch to `dataset` using its `metric_index`-th metric file.
    ///
    /// Nothing changes when the dataset or metric cannot be resolved.
    pub fn begin(&mut self, dataset: &str, metric_index: usize) -> SessionResult<LoadPlan> {
        let entry = self.manifest.get(dataset)?;
        let metric_file = entry.metrics.get(metric_index).ok_or(SessionError::MetricIndexOutOfRange {
            index: metric_index,
            available: entry.metrics.len(),
        })?;

        let mut requests = vec![
            LoadRequest { metric: metric_names::DEPTH.to_string(), file: entry.attenuation.clone() },
            LoadRequest { metric: metric_names::METRIC.to_string(), file: metric_file.clone() },
            LoadRequest { metric: metric_names::COUNTS.to_string(), file: entry.variant_counts.clone() },
        ];
        let optional = [
            (metric_names::FULL_COUNTS, &entry.fullcounts),
            (metric_names::REF_DATA, &entry.refdata),
            (metric_names::BASE_COUNTS, &entry.base_counts),
        ];
        for (metric, file) in optional {
            if let Some(file) = file {
                requests.push(LoadRequest { metric: metric.to_string(), file: file.clone() });
            }
        }
        let annotations = entry.annotations.clone();

        self.store.reset();
        self.annotations = AnnotationSet::default();
        self.engine.invalidate();
        self.completed.clear();
        self.failed.clear();
        self.pending = requests.iter().map(|r| r.metric.clone()).collect();
        self.epoch += 1;
        self.dataset = Some(dataset.to_string());

        log::info!("loading dataset {} (epoch {}, {} files)", dataset, self.epoch, requests.len());
        Ok(LoadPlan { epoch: self.epoch, dataset: dataset.to_string(), requests, annotations })
    }

    /// Deliver the bytes of a requested metric file.
    pub fn complete(&mut self, epoch: u64, metric: &str, bytes: &[u8]) -> SessionResult<Completion> {
        if epoch != self.epoch {
            log::debug!("dropping stale {} from epoch {} (current {})", metric, epoch, self.epoch);
            return Ok(Completion::Stale);
        }
        if !self.pending.remove(metric) {
            return Err(SessionError::UnexpectedMetric(metric.to_string()));
        }

        match self.decoder.decode(bytes, metric, &mut self.store) {
            Ok(report) => {
                self.completed.insert(metric.to_string());
                Ok(Completion::Decoded(report))
            }
            Err(source) => {
                log::warn!("{}: {}", metric, source);
                self.failed.insert(metric.to_string(), source.to_string());
                Err(SessionError::Decode { metric: metric.to_string(), source })
            }
        }
    }

    pub fn complete_annotations(&mut self, epoch: u64, bytes: &[u8]) -> SessionResult<Completion> {
        if epoch != self.epoch {
            return Ok(Completion::Stale);
        }
        self.annotations = AnnotationSet::from_json(bytes)?;
        self.engine.invalidate();
        Ok(Completion::Annotations {
            genes: self.annotations.genes().len(),
            domains: self.annotations.domains().len(),
        })
    }

    /// All required metrics decoded successfully.
    pub fn is_ready(&self) -> bool {
        REQUIRED_METRICS.iter().all(|m| self.completed.contains(*m))
    }

    /// No requested file is still outstanding.
    pub fn is_settled(&self) -> bool {
        self.pending.is_empty()
    }

    /// `None` until the dataset is ready.
    pub fn filter(&mut self, thresholds: &Thresholds) -> Option<Vec<FilteredEntry>> {
        if !self.is_ready() {
            return None;
        }
        Some(self.engine.filter(&self.store, &self.annotations, thresholds))
    }

    pub fn variant_matrix(&self, i: Position, j: Position, synonymy: bool) -> Option<VariantMatrix> {
        self.engine.variant_matrix(&self.store, &self.annotations, i, j, synonymy)
    }

    pub fn store(&self) -> &PairStatisticsStore {
        &self.store
    }

    pub fn annotations(&self) -> &AnnotationSet {
        &self.annotations
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn dataset(&self) -> Option<&str> {
        self.dataset.as_deref()
    }

    pub fn pending(&self) -> impl Iterator<Item = &str> {
        self.pending.iter().map(String::as_str)
    }

    pub fn failed(&self) -> impl Iterator<Item = (&str, &str)> {
        self.failed.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{HeaderFlags, MatrixHeader};
    use crate::writer::MatrixWriter;

    const MANIFEST: &str = r#"{
        "tiny": {
            "attenuation": "depth.dat",
            "metrics": ["diff.dat", "ratio.dat"],
            "variantCounts": "counts.dat",
            "refdata": "ref.dat",
            "annotations": "genes.json",
            "subunits": {"S": [1, 2]}
        },
        "other": {
            "attenuation": "d2.dat",
            "metrics": ["m2.dat"],
            "variantCounts": "c2.dat"
        }
    }"#;

    fn session() -> DatasetSession {
        DatasetSession::new(DatasetManifest::from_json(MANIFEST.as_bytes()).unwrap())
    }

    fn dense(value: f64) -> Vec<u8> {
        let header = MatrixHeader { num_window: 3, num_pos: 2, flags: HeaderFlags::dense_f32(1) };
        MatrixWriter::dense(header, &[value; 6]).unwrap()
    }

    fn counts() -> Vec<u8> {
        let header = MatrixHeader { num_window: 3, num_pos: 2, flags: HeaderFlags::sparse_int(4, 4) };
        MatrixWriter::sparse(header, &[(2, vec![5.0, 0.0, 5.0, 5.0])]).unwrap()
    }

    #[test]
    fn test_manifest_parsing() {
        let manifest = DatasetManifest::from_json(MANIFEST.as_bytes()).unwrap();
        assert_eq!(manifest.names().collect::<Vec<_>>(), vec!["other", "tiny"]);
        let tiny = manifest.get("tiny").unwrap();
        assert_eq!(tiny.variant_counts, "counts.dat");
        assert_eq!(tiny.refdata.as_deref(), Some("ref.dat"));
        assert!(tiny.subunits.is_some());
        assert!(matches!(manifest.get("nope"), Err(ManifestError::UnknownDataset(_))));
    }

    #[test]
    fn test_plan_lists_required_then_optional() {
        let mut session = session();
        let plan = session.begin("tiny", 1).unwrap();
        let metrics: Vec<&str> = plan.requests.iter().map(|r| r.metric.as_str()).collect();
        assert_eq!(metrics, vec!["depth", "metric", "counts", "refdata"]);
        assert_eq!(plan.requests[1].file, "ratio.dat");
        assert_eq!(plan.annotations.as_deref(), Some("genes.json"));
        assert_eq!(plan.epoch, 1);
    }

    #[test]
    fn test_ready_after_required_metrics() {
        let mut session = session();
        let plan = session.begin("other", 0).unwrap();
        assert!(!session.is_ready());
        assert!(session.filter(&Thresholds::default()).is_none());

        session.complete(plan.epoch, "depth", &dense(10.0)).unwrap();
        session.complete(plan.epoch, "metric", &dense(0.5)).unwrap();
        assert!(!session.is_ready());
        session.complete(plan.epoch, "counts", &counts()).unwrap();

        assert!(session.is_ready());
        assert!(session.is_settled());
        let result = session.filter(&Thresholds::default()).unwrap();
        // flat 2 -> (1, 2); counts give vi = 10 of depth 10
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].related_pairs[0].posj, 2);
    }

    #[test]
    fn test_stale_completion_is_ignored() {
        let mut session = session();
        let first = session.begin("tiny", 0).unwrap();
        let second = session.begin("other", 0).unwrap();
        assert_eq!(second.epoch, first.epoch + 1);

        let outcome = session.complete(first.epoch, "depth", &dense(10.0)).unwrap();
        assert!(matches!(outcome, Completion::Stale));
        assert!(session.store().is_empty());
        assert_eq!(session.pending().count(), 3);
        assert_eq!(session.dataset(), Some("other"));
    }

    #[test]
    fn test_failed_file_does_not_block_others() {
        let mut session = session();
        let plan = session.begin("other", 0).unwrap();

        let mut broken = dense(1.0);
        broken.truncate(20);
        let err = session.complete(plan.epoch, "metric", &broken).unwrap_err();
        assert!(matches!(err, SessionError::Decode { ref metric, .. } if metric == "metric"));

        session.complete(plan.epoch, "depth", &dense(10.0)).unwrap();
        assert!(session.store().is_loaded("depth"));
        assert!(!session.is_ready());
        assert_eq!(session.failed().count(), 1);
        assert!(!session.is_settled());
    }

    #[test]
    fn test_bad_selection_keeps_current_dataset() {
        let mut session = session();
        let plan = session.begin("other", 0).unwrap();
        session.complete(plan.epoch, "depth", &dense(10.0)).unwrap();

        assert!(matches!(
            session.begin("tiny", 5),
            Err(SessionError::MetricIndexOutOfRange { index: 5, available: 2 })
        ));
        assert!(session.begin("missing", 0).is_err());
        assert_eq!(session.epoch(), plan.epoch);
        assert!(!session.store().is_empty());
    }

    #[test]
    fn test_unexpected_metric_rejected() {
        let mut session = session();
        let plan = session.begin("other", 0).unwrap();
        assert!(matches!(
            session.complete(plan.epoch, "fullcounts", &dense(1.0)),
            Err(SessionError::UnexpectedMetric(_))
        ));
    }

    #[test]
    fn test_annotations_completion() {
        let mut session = session();
        let plan = session.begin("tiny", 0).unwrap();
        let genes = br#"[{"gene": "S", "locations": [{"min": 1, "max": 6}]}]"#;
        let outcome = session.complete_annotations(plan.epoch, genes).unwrap();
        assert!(matches!(outcome, Completion::Annotations { genes: 1, domains: 1 }));
        assert!(matches!(session.complete_annotations(0, genes).unwrap(), Completion::Stale));
    }
}

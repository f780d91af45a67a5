//! In-memory pair statistics store
//!
//! Holds every decoded metric of the current dataset, keyed by `(i, j)`:
//! - Pairs   { `(i, j)` -> metric bundle }
//! - Bounds  { metric -> per-slot running min/max over nonzero values }
//! - Meta    { dataset dims, loaded metrics, reference sequence }
//!
//! The store is rebuilt from scratch on every dataset switch through
//! [`PairStatisticsStore::reset`]; within one dataset, metric files are
//! merged in whatever order they finish decoding.

use crate::types::*;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Placeholder stored at index 0 of the 1-indexed reference.
pub const REFERENCE_SENTINEL: u8 = b'-';

/// A 1-indexed reference sequence; byte 0 is [`REFERENCE_SENTINEL`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceSequence {
    bases: Vec<u8>,
}

impl ReferenceSequence {
    pub fn from_bases(bases: &[u8]) -> Self {
        let mut padded = Vec::with_capacity(bases.len() + 1);
        padded.push(REFERENCE_SENTINEL);
        padded.extend_from_slice(bases);
        Self { bases: padded }
    }

    /// Number of real positions (the sentinel excluded).
    pub fn len(&self) -> usize {
        self.bases.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn base_at(&self, pos: Position) -> Option<Nucleotide> {
        if pos < 1 {
            return None;
        }
        self.bases.get(pos as usize).and_then(|&b| Nucleotide::from_ascii(b))
    }

    /// Bytes indexed directly by absolute position, sentinel included.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bases
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.bases[1..]).unwrap_or("")
    }
}

/// Sparse map from position pairs to merged metric bundles.
#[derive(Debug, Default)]
pub struct PairStatisticsStore {
    dims: Option<DatasetDims>,
    pairs: BTreeMap<PairKey, MetricBundle>,
    bounds: HashMap<String, Vec<Option<Bounds>>>,
    loaded: BTreeSet<String>,
    reference: Option<ReferenceSequence>,
    revision: u64,
}

impl PairStatisticsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything belonging to the current dataset.
    pub fn reset(&mut self) {
        self.dims = None;
        self.pairs.clear();
        self.bounds.clear();
        self.loaded.clear();
        self.reference = None;
        self.revision += 1;
    }

    /// Bumped on every mutation; lets derived caches detect staleness.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn dims(&self) -> Option<DatasetDims> {
        self.dims
    }

    /// Record dims from the first decoded file. Returns the established dims.
    pub fn establish_dims(&mut self, dims: DatasetDims) -> DatasetDims {
        *self.dims.get_or_insert(dims)
    }

    /// Insert or overwrite the value of `metric` at `(i, j)`.
    pub fn upsert(&mut self, i: Position, j: Position, metric: &str, value: MetricValue) {
        let bundle = self.pairs.entry(PairKey::new(i, j)).or_default();
        match bundle.get_mut(metric) {
            Some(existing) => *existing = value,
            None => {
                bundle.insert(metric.to_string(), value);
            }
        }
        self.revision += 1;
    }

    /// Fold a nonzero value into the bounds of `metric` slot `slot`.
    pub fn observe_bound(&mut self, metric: &str, slot: usize, value: f64) {
        if value == 0.0 || value.is_nan() {
            return;
        }
        let slots = self.bounds.entry(metric.to_string()).or_default();
        if slots.len() <= slot {
            slots.resize(slot + 1, None);
        }
        match &mut slots[slot] {
            Some(b) => b.observe(value),
            empty => *empty = Some(Bounds::new(value)),
        }
    }

    pub fn bounds(&self, metric: &str, slot: usize) -> Option<Bounds> {
        self.bounds.get(metric).and_then(|slots| slots.get(slot).copied().flatten())
    }

    pub fn get(&self, i: Position, j: Position) -> Option<&MetricBundle> {
        self.pairs.get(&PairKey::new(i, j))
    }

    pub fn get_metric(&self, i: Position, j: Position, metric: &str) -> Option<&MetricValue> {
        self.get(i, j).and_then(|bundle| bundle.get(metric))
    }

    /// Scalar view of a metric; vectors yield their first slot.
    pub fn scalar(&self, i: Position, j: Position, metric: &str) -> Option<f64> {
        self.get_metric(i, j, metric).and_then(MetricValue::as_scalar)
    }

    /// All stored pairs in ascending `(i, j)` order.
    pub fn pairs(&self) -> impl Iterator<Item = (&PairKey, &MetricBundle)> {
        self.pairs.iter()
    }

    pub fn all_pairs(&self) -> impl Iterator<Item = PairKey> + '_ {
        self.pairs.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn mark_loaded(&mut self, metric: &str) {
        self.loaded.insert(metric.to_string());
    }

    pub fn is_loaded(&self, metric: &str) -> bool {
        self.loaded.contains(metric)
    }

    pub fn loaded_metrics(&self) -> impl Iterator<Item = &str> {
        self.loaded.iter().map(String::as_str)
    }

    pub fn set_reference(&mut self, reference: ReferenceSequence) {
        self.reference = Some(reference);
        self.revision += 1;
    }

    pub fn reference(&self) -> Option<&ReferenceSequence> {
        self.reference.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_overwrites_same_metric() {
        let mut store = PairStatisticsStore::new();
        store.upsert(3, 4, "depth", MetricValue::Scalar(10.0));
        store.upsert(3, 4, "metric", MetricValue::Scalar(0.5));
        store.upsert(3, 4, "depth", MetricValue::Scalar(12.0));

        let bundle = store.get(3, 4).unwrap();
        assert_eq!(bundle.len(), 2);
        assert_eq!(store.scalar(3, 4, "depth"), Some(12.0));
        assert_eq!(store.scalar(3, 4, "metric"), Some(0.5));
        assert!(store.get(4, 3).is_none());
    }

    #[test]
    fn test_bounds_skip_zero_and_track_slots() {
        let mut store = PairStatisticsStore::new();
        store.observe_bound("counts", 0, 0.0);
        assert_eq!(store.bounds("counts", 0), None);

        store.observe_bound("counts", 2, 5.0);
        store.observe_bound("counts", 2, -3.0);
        assert_eq!(store.bounds("counts", 2), Some(Bounds { min: -3.0, max: 5.0 }));
        assert_eq!(store.bounds("counts", 1), None);
        assert_eq!(store.bounds("missing", 0), None);
    }

    #[test]
    fn test_pairs_iterate_in_order() {
        let mut store = PairStatisticsStore::new();
        store.upsert(10, 9, "depth", MetricValue::Scalar(1.0));
        store.upsert(2, 3, "depth", MetricValue::Scalar(1.0));
        store.upsert(10, 8, "depth", MetricValue::Scalar(1.0));

        let keys: Vec<PairKey> = store.all_pairs().collect();
        assert_eq!(keys, vec![PairKey::new(2, 3), PairKey::new(10, 8), PairKey::new(10, 9)]);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut store = PairStatisticsStore::new();
        store.establish_dims(DatasetDims { num_window: 5, num_pos: 3 });
        store.upsert(1, 1, "depth", MetricValue::Scalar(4.0));
        store.observe_bound("depth", 0, 4.0);
        store.mark_loaded("depth");
        store.set_reference(ReferenceSequence::from_bases(b"ATG"));
        let before = store.revision();

        store.reset();
        assert!(store.is_empty());
        assert!(store.dims().is_none());
        assert!(store.bounds("depth", 0).is_none());
        assert!(!store.is_loaded("depth"));
        assert!(store.reference().is_none());
        assert!(store.revision() > before);
    }

    #[test]
    fn test_reference_is_one_indexed() {
        let reference = ReferenceSequence::from_bases(b"ATG");
        assert_eq!(reference.len(), 3);
        assert_eq!(reference.base_at(0), None);
        assert_eq!(reference.base_at(1), Some(Nucleotide::A));
        assert_eq!(reference.base_at(3), Some(Nucleotide::G));
        assert_eq!(reference.base_at(4), None);
        assert_eq!(reference.as_bytes()[0], REFERENCE_SENTINEL);
        assert_eq!(reference.as_str(), "ATG");
    }

    #[test]
    fn test_first_dims_win() {
        let mut store = PairStatisticsStore::new();
        let first = DatasetDims { num_window: 601, num_pos: 2500 };
        assert_eq!(store.establish_dims(first), first);
        assert_eq!(store.establish_dims(DatasetDims { num_window: 5, num_pos: 3 }), first);
    }
}

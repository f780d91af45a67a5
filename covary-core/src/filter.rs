//! Threshold filtering of the pair store into per-position result groups.
//!
//! Each off-diagonal pair passes through, in order:
//! - depth floor     { `depth >= floor(max_depth * min_depth_percent)` }
//! - variant at `i`  { `(vivj + vimj) / depth >= min_variant_fraction` }
//! - variant at `j`  { same on `(vivj + mivj)`, only when enabled }
//! - metric floor    { `|metric| >= min_abs_metric`, synonymy-adjusted when enabled }
//!
//! Survivors are grouped by `i`; groups come out ascending by `i`, pairs
//! inside a group ascending by `j`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::annotation::AnnotationSet;
use crate::store::PairStatisticsStore;
use crate::synonymy::CodonSynonymyClassifier;
use crate::types::*;
use crate::variants::{CooccurMetric, VariantMatrix};

/// Runtime filter configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Fraction of the dataset's maximum depth a pair must reach.
    pub min_depth_percent: f64,
    /// Minimum share of a pair's reads carrying a variant at `i`.
    pub min_variant_fraction: f64,
    /// Apply `min_variant_fraction` to the variants at `j` as well.
    pub min_variant_fraction_also_for_j: bool,
    /// Minimum absolute co-occurrence score.
    pub min_abs_metric: f64,
    /// Treat synonymous bases as modal and score with `syn_metric`.
    pub synonymy: bool,
    /// Metric recomputed from the synonymy-adjusted contingency.
    pub syn_metric: CooccurMetric,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_depth_percent: 0.1,
            min_variant_fraction: 0.01,
            min_variant_fraction_also_for_j: false,
            min_abs_metric: 0.1,
            synonymy: false,
            syn_metric: CooccurMetric::default(),
        }
    }
}

/// One qualifying pair, as handed to renderers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PairRecord {
    pub posi: Position,
    pub posj: Position,
    pub depth: f64,
    pub metric: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric_syn: Option<f64>,
    pub variants: VariantMatrix,
}

/// All qualifying pairs anchored at one position `i`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilteredEntry {
    pub pos: Position,
    pub num_found: usize,
    pub related_pairs: Vec<PairRecord>,
}

/// Where a pair's contingency came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContingencySource {
    FullCounts,
    Counts,
}

/// Synonymy-adjusted contingency and score for one pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SynonymyMetric {
    pub variants: VariantMatrix,
    pub metric_syn: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CacheKey {
    revision: u64,
    syn_metric: CooccurMetric,
}

/// Filter driver. Owns the lazily filled synonymy side table.
#[derive(Debug, Default)]
pub struct FilterEngine {
    classifier: CodonSynonymyClassifier,
    syn_cache: HashMap<PairKey, Option<SynonymyMetric>>,
    cache_key: Option<CacheKey>,
}

impl FilterEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop cached synonymy results, e.g. after annotations change.
    pub fn invalidate(&mut self) {
        self.syn_cache.clear();
        self.cache_key = None;
    }

    pub fn cached_pairs(&self) -> usize {
        self.syn_cache.len()
    }

    pub fn filter(
        &mut self,
        store: &PairStatisticsStore,
        annotations: &AnnotationSet,
        thresholds: &Thresholds,
    ) -> Vec<FilteredEntry> {
        if thresholds.synonymy {
            self.sync_cache(store, thresholds.syn_metric);
        }

        let max_depth = store.bounds(metric_names::DEPTH, 0).map_or(0.0, |b| b.max);
        let min_depth = (max_depth * thresholds.min_depth_percent).floor();
        log::debug!("filtering {} pairs, min depth {}", store.len(), min_depth);

        let mut entries: Vec<FilteredEntry> = Vec::new();
        for (key, bundle) in store.pairs() {
            if key.is_self_pair() {
                continue;
            }
            let depth = match bundle.get(metric_names::DEPTH).and_then(MetricValue::as_scalar) {
                Some(depth) if depth >= min_depth => depth,
                _ => continue,
            };

            let metric = bundle.get(metric_names::METRIC).and_then(MetricValue::as_scalar);
            let (variants, metric_syn) = if thresholds.synonymy {
                match self.synonymy_metric(store, annotations, *key, thresholds.syn_metric) {
                    Some(syn) => (syn.variants, Some(syn.metric_syn)),
                    None => match contingency(store, annotations, &self.classifier, *key, false) {
                        Some((variants, _)) => (variants, None),
                        None => continue,
                    },
                }
            } else {
                match contingency(store, annotations, &self.classifier, *key, false) {
                    Some((variants, _)) => (variants, None),
                    None => continue,
                }
            };

            if variants.variant_fraction_i(depth) < thresholds.min_variant_fraction {
                continue;
            }
            if thresholds.min_variant_fraction_also_for_j
                && variants.variant_fraction_j(depth) < thresholds.min_variant_fraction
            {
                continue;
            }

            let score = if thresholds.synonymy { metric_syn.or(metric) } else { metric };
            if score.unwrap_or(0.0).abs() < thresholds.min_abs_metric {
                continue;
            }

            let record = PairRecord { posi: key.i, posj: key.j, depth, metric, metric_syn, variants };
            match entries.last_mut() {
                Some(entry) if entry.pos == key.i => {
                    entry.num_found += 1;
                    entry.related_pairs.push(record);
                }
                _ => entries.push(FilteredEntry { pos: key.i, num_found: 1, related_pairs: vec![record] }),
            }
        }

        log::debug!("{} positions with qualifying pairs", entries.len());
        entries
    }

    /// Contingency for `(i, j)` without touching the cache.
    pub fn variant_matrix(
        &self,
        store: &PairStatisticsStore,
        annotations: &AnnotationSet,
        i: Position,
        j: Position,
        synonymy: bool,
    ) -> Option<VariantMatrix> {
        contingency(store, annotations, &self.classifier, PairKey::new(i, j), synonymy).map(|(m, _)| m)
    }

    fn sync_cache(&mut self, store: &PairStatisticsStore, syn_metric: CooccurMetric) {
        let key = CacheKey { revision: store.revision(), syn_metric };
        if self.cache_key != Some(key) {
            self.syn_cache.clear();
            self.cache_key = Some(key);
        }
    }

    fn synonymy_metric(
        &mut self,
        store: &PairStatisticsStore,
        annotations: &AnnotationSet,
        key: PairKey,
        syn_metric: CooccurMetric,
    ) -> Option<SynonymyMetric> {
        if let Some(cached) = self.syn_cache.get(&key) {
            return *cached;
        }
        let computed = match contingency(store, annotations, &self.classifier, key, true) {
            Some((variants, ContingencySource::FullCounts)) => Some(SynonymyMetric {
                variants,
                metric_syn: syn_metric.compute(&variants),
            }),
            _ => None,
        };
        self.syn_cache.insert(key, computed);
        computed
    }
}

/// Derive the contingency of a pair: `fullcounts` against the reference
/// first, then the producer's `counts` vector.
pub fn contingency(
    store: &PairStatisticsStore,
    annotations: &AnnotationSet,
    classifier: &CodonSynonymyClassifier,
    key: PairKey,
    synonymy: bool,
) -> Option<(VariantMatrix, ContingencySource)> {
    let full = store
        .get_metric(key.i, key.j, metric_names::FULL_COUNTS)
        .and_then(MetricValue::as_base_counts);
    if let Some(entries) = full {
        let modal_i = modal_bases(store, annotations, classifier, key.i, synonymy);
        let modal_j = modal_bases(store, annotations, classifier, key.j, synonymy);
        if let (Some(mi), Some(mj)) = (modal_i, modal_j) {
            let matrix = VariantMatrix::from_base_counts(entries, |b| mi.contains(&b), |b| mj.contains(&b));
            return Some((matrix, ContingencySource::FullCounts));
        }
    }

    store
        .get_metric(key.i, key.j, metric_names::COUNTS)
        .and_then(MetricValue::as_vector)
        .and_then(VariantMatrix::from_counts_vector)
        .map(|m| (m, ContingencySource::Counts))
}

/// Bases counted as modal at `pos`: the reference base, plus every
/// synonymous base when synonymy is on and a reference is loaded.
fn modal_bases(
    store: &PairStatisticsStore,
    annotations: &AnnotationSet,
    classifier: &CodonSynonymyClassifier,
    pos: Position,
    synonymy: bool,
) -> Option<Vec<Nucleotide>> {
    let mut bases = vec![reference_base(store, pos)?];
    if synonymy {
        if let Some(reference) = store.reference() {
            for base in classifier.synonymous_bases(pos, annotations, reference.as_bytes()) {
                if !bases.contains(&base) {
                    bases.push(base);
                }
            }
        }
    }
    Some(bases)
}

/// Reference base at `pos`: decoded reference, else the modal base of the
/// self-pair `basecounts`, else the modal first base of the self-pair `fullcounts`.
pub fn reference_base(store: &PairStatisticsStore, pos: Position) -> Option<Nucleotide> {
    if let Some(base) = store.reference().and_then(|r| r.base_at(pos)) {
        return Some(base);
    }

    if let Some(slots) = store
        .get_metric(pos, pos, metric_names::BASE_COUNTS)
        .and_then(MetricValue::as_vector)
    {
        return modal(Nucleotide::ALL.iter().copied().zip(slots.iter().copied()));
    }

    let entries = store
        .get_metric(pos, pos, metric_names::FULL_COUNTS)
        .and_then(MetricValue::as_base_counts)?;
    let mut totals = [0.0f64; 4];
    for entry in entries {
        totals[entry.base.at_i.code() as usize] += entry.num as f64;
    }
    modal(Nucleotide::ALL.iter().copied().zip(totals))
}

/// Base with the highest positive count; ties go to the earlier base.
fn modal(counts: impl Iterator<Item = (Nucleotide, f64)>) -> Option<Nucleotide> {
    let mut best: Option<(Nucleotide, f64)> = None;
    for (base, count) in counts {
        if count > 0.0 && best.map_or(true, |(_, c)| count > c) {
            best = Some((base, count));
        }
    }
    best.map(|(base, _)| base)
}

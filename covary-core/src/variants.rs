//! 2x2 variant/modal contingency and the co-occurrence metrics derived from it.

use serde::{Deserialize, Serialize};

use crate::types::{BasePairCount, Nucleotide};

/// Read counts split by whether each of `i` and `j` shows a variant (`v`)
/// or the modal/reference base (`m`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VariantMatrix {
    pub vivj: f64,
    pub vimj: f64,
    pub mivj: f64,
    pub mimj: f64,
}

impl VariantMatrix {
    /// From a `counts` vector in producer slot order `(mm, mv, vm, vv)`.
    pub fn from_counts_vector(slots: &[f64]) -> Option<Self> {
        match slots {
            [mm, mv, vm, vv, ..] => Some(Self { vivj: *vv, vimj: *vm, mivj: *mv, mimj: *mm }),
            _ => None,
        }
    }

    /// Classify every observed base pair with the given modality predicates.
    pub fn from_base_counts<I, J>(entries: &[BasePairCount], is_modal_i: I, is_modal_j: J) -> Self
    where
        I: Fn(Nucleotide) -> bool,
        J: Fn(Nucleotide) -> bool,
    {
        let mut matrix = Self::default();
        for entry in entries {
            let num = entry.num as f64;
            match (is_modal_i(entry.base.at_i), is_modal_j(entry.base.at_j)) {
                (false, false) => matrix.vivj += num,
                (false, true) => matrix.vimj += num,
                (true, false) => matrix.mivj += num,
                (true, true) => matrix.mimj += num,
            }
        }
        matrix
    }

    pub fn total(&self) -> f64 {
        self.vivj + self.vimj + self.mivj + self.mimj
    }

    /// Reads with a variant at `i`.
    pub fn variants_i(&self) -> f64 {
        self.vivj + self.vimj
    }

    pub fn variants_j(&self) -> f64 {
        self.vivj + self.mivj
    }

    pub fn variant_fraction_i(&self, depth: f64) -> f64 {
        ratio(self.variants_i(), depth)
    }

    pub fn variant_fraction_j(&self, depth: f64) -> f64 {
        ratio(self.variants_j(), depth)
    }
}

fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

/// Co-occurrence score computed from a [`VariantMatrix`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CooccurMetric {
    /// `P(vj | vi) - P(vj | mi)`
    #[default]
    DiffFromExpected,
    /// As [`CooccurMetric::DiffFromExpected`], zero when `vi / total < 0.05`.
    GatedDiffFromExpected,
    /// `P(vi, vj) / P(vi)`
    ConjProb,
    /// `ln(P(vi, vj) / (P(vi) P(vj)))`, clamped to `[-5, 5]`.
    RatioOfObservedToExpected,
}

const GATE_FRACTION: f64 = 0.05;
const RATIO_CLAMP: f64 = 5.0;

impl CooccurMetric {
    pub fn compute(self, m: &VariantMatrix) -> f64 {
        let total = m.total();
        match self {
            CooccurMetric::DiffFromExpected | CooccurMetric::GatedDiffFromExpected => {
                let vi = m.variants_i();
                let mi = m.mivj + m.mimj;
                if self == CooccurMetric::GatedDiffFromExpected && (total == 0.0 || vi / total < GATE_FRACTION) {
                    return 0.0;
                }
                ratio(m.vivj, vi) - ratio(m.mivj, mi)
            }
            CooccurMetric::ConjProb => {
                let total = total.max(1.0);
                ratio(m.vivj / total, m.variants_i() / total)
            }
            CooccurMetric::RatioOfObservedToExpected => {
                let total = total.max(1.0);
                let p_ij = m.vivj / total;
                let p_i = m.variants_i() / total;
                let p_j = m.variants_j() / total;
                if p_i * p_j <= 0.0 {
                    0.0
                } else {
                    (p_ij / (p_i * p_j)).ln().clamp(-RATIO_CLAMP, RATIO_CLAMP)
                }
            }
        }
    }
}

impl std::str::FromStr for CooccurMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "diff" | "diff_from_expected" => Ok(CooccurMetric::DiffFromExpected),
            "gated" | "gated_diff_from_expected" => Ok(CooccurMetric::GatedDiffFromExpected),
            "conj" | "conj_prob" => Ok(CooccurMetric::ConjProb),
            "ratio" | "ratio_of_observed_to_expected" => Ok(CooccurMetric::RatioOfObservedToExpected),
            other => Err(format!("unknown co-occurrence metric: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BasePair;

    fn matrix(vivj: f64, vimj: f64, mivj: f64, mimj: f64) -> VariantMatrix {
        VariantMatrix { vivj, vimj, mivj, mimj }
    }

    #[test]
    fn test_counts_vector_slot_order() {
        let m = VariantMatrix::from_counts_vector(&[40.0, 3.0, 2.0, 5.0]).unwrap();
        assert_eq!(m, matrix(5.0, 2.0, 3.0, 40.0));
        assert_eq!(m.variant_fraction_i(50.0), 7.0 / 50.0);
        assert_eq!(m.variant_fraction_j(50.0), 8.0 / 50.0);
        assert!(VariantMatrix::from_counts_vector(&[1.0, 2.0]).is_none());
    }

    #[test]
    fn test_from_base_counts() {
        let entries = [
            BasePairCount { base: BasePair { at_i: Nucleotide::A, at_j: Nucleotide::A }, num: 10 },
            BasePairCount { base: BasePair { at_i: Nucleotide::G, at_j: Nucleotide::T }, num: 4 },
            BasePairCount { base: BasePair { at_i: Nucleotide::G, at_j: Nucleotide::A }, num: 1 },
            BasePairCount { base: BasePair { at_i: Nucleotide::A, at_j: Nucleotide::C }, num: 2 },
        ];
        let m = VariantMatrix::from_base_counts(&entries, |b| b == Nucleotide::A, |b| b == Nucleotide::A);
        assert_eq!(m, matrix(4.0, 1.0, 2.0, 10.0));
    }

    #[test]
    fn test_metrics() {
        let m = matrix(4.0, 1.0, 2.0, 13.0);
        let diff = CooccurMetric::DiffFromExpected.compute(&m);
        assert!((diff - (4.0 / 5.0 - 2.0 / 15.0)).abs() < 1e-12);
        assert!((CooccurMetric::ConjProb.compute(&m) - 0.8).abs() < 1e-12);

        let ratio = CooccurMetric::RatioOfObservedToExpected.compute(&m);
        let expected = ((4.0 / 20.0) / ((5.0 / 20.0) * (6.0 / 20.0)) as f64).ln();
        assert!((ratio - expected).abs() < 1e-12);
    }

    #[test]
    fn test_gated_and_degenerate() {
        let rare = matrix(1.0, 0.0, 0.0, 99.0);
        assert_eq!(CooccurMetric::GatedDiffFromExpected.compute(&rare), 0.0);
        assert_eq!(CooccurMetric::DiffFromExpected.compute(&rare), 1.0);

        let empty = VariantMatrix::default();
        for metric in [
            CooccurMetric::DiffFromExpected,
            CooccurMetric::GatedDiffFromExpected,
            CooccurMetric::ConjProb,
            CooccurMetric::RatioOfObservedToExpected,
        ] {
            assert_eq!(metric.compute(&empty), 0.0);
        }

        // vivj == 0 with variants at both ends: ln(0) clamps
        let apart = matrix(0.0, 5.0, 5.0, 10.0);
        assert_eq!(CooccurMetric::RatioOfObservedToExpected.compute(&apart), -5.0);
    }
}

//! Synonymous-substitution classification against annotated reading frames.
//!
//! Forward frames (`min <= max`) read codons upward from `min`. Reverse frames
//! (`min > max`) read downward from `min` on the minus strand, so the codon is
//! reverse-complemented before translation.

use crate::annotation::{AnnotationDomain, AnnotationSet};
use crate::codon::{reverse_complement, translate_codon};
use crate::types::{Nucleotide, Position};

#[derive(Debug, Default, Clone, Copy)]
pub struct CodonSynonymyClassifier;

impl CodonSynonymyClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Whether placing `candidate` at `pos` keeps the amino acid of every
    /// frame covering `pos`. `reference` is indexed directly by position.
    /// False when no frame can be evaluated.
    pub fn is_synonymous(
        &self,
        candidate: Nucleotide,
        pos: Position,
        annotations: &AnnotationSet,
        reference: &[u8],
    ) -> bool {
        let mut evaluated = 0usize;
        for domain in annotations.overlapping(pos) {
            match self.frame_is_synonymous(candidate, pos, domain, reference) {
                Some(true) => evaluated += 1,
                Some(false) => return false,
                None => log::trace!("no codon for {} at {} in {}", candidate, pos, domain.gene),
            }
        }
        evaluated > 0
    }

    /// All bases that are synonymous at `pos`. Empty outside any frame.
    pub fn synonymous_bases(&self, pos: Position, annotations: &AnnotationSet, reference: &[u8]) -> Vec<Nucleotide> {
        Nucleotide::ALL
            .into_iter()
            .filter(|&base| self.is_synonymous(base, pos, annotations, reference))
            .collect()
    }

    /// `None` when the codon runs off the reference or holds a non-nucleotide.
    fn frame_is_synonymous(
        &self,
        candidate: Nucleotide,
        pos: Position,
        domain: &AnnotationDomain,
        reference: &[u8],
    ) -> Option<bool> {
        let reverse = domain.min > domain.max;
        let codon_low = if reverse {
            let codon_high = domain.min - ((domain.min - pos) / 3) * 3;
            codon_high - 2
        } else {
            ((pos - domain.min) / 3) * 3 + domain.min
        };
        if codon_low < 0 {
            return None;
        }

        let start = codon_low as usize;
        let original: [u8; 3] = reference.get(start..start + 3)?.try_into().ok()?;
        let mut mutated = original;
        mutated[(pos - codon_low) as usize] = candidate.to_ascii();

        let (original, mutated) = if reverse {
            (reverse_complement(&original), reverse_complement(&mutated))
        } else {
            (original, mutated)
        };
        Some(translate_codon(&original)? == translate_codon(&mutated)?)
    }
}

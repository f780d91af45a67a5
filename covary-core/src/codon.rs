//! Standard genetic code.
//!
//! 64-entry DNA codon table in NCBI `TCAG` order; stop codons translate to `*`.

use crate::types::Nucleotide;

/// NCBI translation table 1, codons ordered `TTT, TTC, TTA, TTG, TCT, ...`.
const STANDARD_AA: &[u8; 64] = b"FFLLSSSSYY**CC*WLLLLPPPPHHQQRRRRIIIMTTTTNNKKSSRRVVVVAAAADDEEGGGG";

/// Amino acid symbol for stop codons.
pub const STOP: u8 = b'*';

fn tcag_index(base: u8) -> Option<usize> {
    match Nucleotide::from_ascii(base)? {
        Nucleotide::T => Some(0),
        Nucleotide::C => Some(1),
        Nucleotide::A => Some(2),
        Nucleotide::G => Some(3),
    }
}

fn codon_index(codon: &[u8; 3]) -> Option<usize> {
    Some(tcag_index(codon[0])? * 16 + tcag_index(codon[1])? * 4 + tcag_index(codon[2])?)
}

/// Translate one codon. `None` when any base is not a nucleotide.
pub fn translate_codon(codon: &[u8; 3]) -> Option<u8> {
    codon_index(codon).map(|idx| STANDARD_AA[idx])
}

/// Reverse complement of a codon read on the minus strand.
pub fn reverse_complement(codon: &[u8; 3]) -> [u8; 3] {
    let flip = |b: u8| Nucleotide::from_ascii(b).map_or(b'N', |n| n.complement().to_ascii());
    [flip(codon[2]), flip(codon[1]), flip(codon[0])]
}

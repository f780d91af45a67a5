//! Gene annotations and their flattened domain records.
//!
//! Annotation files are JSON arrays of genes:
//!
//! ```json
//! [{"gene": "ORF1ab", "locations": [{"min": 266, "max": 13468}, {"min": 13468, "max": 21555}]},
//!  {"gene": "ORF9b", "locations": [{"min": 28573, "max": 28284}]}]
//! ```
//!
//! A location with `min > max` is a reverse reading frame starting at `min`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Position;

#[derive(Debug, Error)]
pub enum AnnotationError {
    #[error("Invalid annotation JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Gene '{0}' has no locations")]
    EmptyGene(String),
}

pub type AnnotationResult<T> = Result<T, AnnotationError>;

/// One contiguous range of a gene, inclusive at both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneRange {
    pub min: Position,
    pub max: Position,
}

impl GeneRange {
    pub fn new(min: Position, max: Position) -> Self {
        Self { min, max }
    }

    pub fn is_reverse(&self) -> bool {
        self.min > self.max
    }

    /// Lower coordinate regardless of strand.
    pub fn low(&self) -> Position {
        self.min.min(self.max)
    }

    pub fn high(&self) -> Position {
        self.min.max(self.max)
    }

    pub fn contains(&self, pos: Position) -> bool {
        pos >= self.low() && pos <= self.high()
    }

    pub fn overlaps(&self, other: &GeneRange) -> bool {
        self.low() <= other.high() && other.low() <= self.high()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub gene: String,
    pub locations: Vec<GeneRange>,
    #[serde(default)]
    pub gene_index: usize,
}

/// A single range of a gene, addressable on its own.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationDomain {
    pub gene: String,
    pub gene_index: usize,
    /// Stable index of this domain across the whole annotation set.
    pub this_index: usize,
    pub min: Position,
    pub max: Position,
}

impl AnnotationDomain {
    pub fn range(&self) -> GeneRange {
        GeneRange::new(self.min, self.max)
    }
}

/// Flatten genes into domains, numbering them in gene then location order.
pub fn annotate_pos(genes: &[Annotation]) -> Vec<AnnotationDomain> {
    genes
        .iter()
        .flat_map(|gene| {
            gene.locations.iter().map(move |loc| (gene, loc))
        })
        .enumerate()
        .map(|(this_index, (gene, loc))| AnnotationDomain {
            gene: gene.gene.clone(),
            gene_index: gene.gene_index,
            this_index,
            min: loc.min,
            max: loc.max,
        })
        .collect()
}

/// Genes of the current dataset together with their flattened domains.
#[derive(Debug, Clone, Default)]
pub struct AnnotationSet {
    genes: Vec<Annotation>,
    domains: Vec<AnnotationDomain>,
}

impl AnnotationSet {
    pub fn new(mut genes: Vec<Annotation>) -> AnnotationResult<Self> {
        for (idx, gene) in genes.iter_mut().enumerate() {
            if gene.locations.is_empty() {
                return Err(AnnotationError::EmptyGene(gene.gene.clone()));
            }
            gene.gene_index = idx;
        }
        let domains = annotate_pos(&genes);
        Ok(Self { genes, domains })
    }

    pub fn from_json(bytes: &[u8]) -> AnnotationResult<Self> {
        let genes: Vec<Annotation> = serde_json::from_slice(bytes)?;
        Self::new(genes)
    }

    pub fn genes(&self) -> &[Annotation] {
        &self.genes
    }

    pub fn domains(&self) -> &[AnnotationDomain] {
        &self.domains
    }

    pub fn is_empty(&self) -> bool {
        self.genes.is_empty()
    }

    /// Domains of `gene_index`, in location order.
    pub fn gene_domains(&self, gene_index: usize) -> impl Iterator<Item = &AnnotationDomain> {
        self.domains.iter().filter(move |d| d.gene_index == gene_index)
    }

    /// Domains whose range covers `pos`.
    pub fn overlapping(&self, pos: Position) -> impl Iterator<Item = &AnnotationDomain> {
        self.domains.iter().filter(move |d| d.range().contains(pos))
    }
}

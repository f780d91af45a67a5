//! Covary Core Library
//!
//! Windowed pair-matrix decoding, the pair statistics store, threshold
//! filtering, codon synonymy and annotation layout for covary.

pub mod types;
pub mod format;
pub mod coords;
pub mod decode;
pub mod writer;
pub mod store;
pub mod codon;
pub mod annotation;
pub mod synonymy;
pub mod layout;
pub mod variants;
pub mod filter;
pub mod dataset;

// Re-export commonly used types and functions
pub use types::{BasePair, BasePairCount, Bounds, DatasetDims, MetricValue, Nucleotide, PairKey, Position};
pub use format::{ElementFormat, HeaderFlags, MatrixHeader};
pub use decode::{BinaryMatrixDecoder, DecodeError, DecodeReport, DecodeWarning};
pub use writer::MatrixWriter;
pub use store::{PairStatisticsStore, ReferenceSequence};
pub use annotation::{Annotation, AnnotationDomain, AnnotationSet};
pub use synonymy::CodonSynonymyClassifier;
pub use layout::layout;
pub use variants::{CooccurMetric, VariantMatrix};
pub use filter::{FilterEngine, FilteredEntry, PairRecord, Thresholds};
pub use dataset::{DatasetManifest, DatasetSession, LoadPlan};

/// Version information for the covary core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}

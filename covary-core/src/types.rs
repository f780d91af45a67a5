use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 1-indexed absolute genomic coordinate.
pub type Position = i64;

/// Well-known metric names shared by the decoder, store and filter.
pub mod metric_names {
    pub const DEPTH: &str = "depth";
    pub const METRIC: &str = "metric";
    pub const COUNTS: &str = "counts";
    pub const BASE_COUNTS: &str = "basecounts";
    pub const FULL_COUNTS: &str = "fullcounts";
    pub const REF_DATA: &str = "refdata";
}

/// Dataset-wide dimensions taken from the first successfully decoded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetDims {
    pub num_window: i32,
    pub num_pos: i32,
}

impl DatasetDims {
    pub fn half_window(&self) -> i64 {
        (self.num_window / 2) as i64
    }
}

/// An ordered `(i, j)` position pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PairKey {
    pub i: Position,
    pub j: Position,
}

impl PairKey {
    pub fn new(i: Position, j: Position) -> Self {
        Self { i, j }
    }

    pub fn is_self_pair(&self) -> bool {
        self.i == self.j
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.i, self.j)
    }
}

/// Nucleotide in the producer's 2-bit order: A=0, T=1, C=2, G=3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Nucleotide {
    A,
    T,
    C,
    G,
}

impl Nucleotide {
    pub const ALL: [Nucleotide; 4] = [Nucleotide::A, Nucleotide::T, Nucleotide::C, Nucleotide::G];

    /// Decode the low two bits of `code`.
    pub fn from_code(code: u8) -> Self {
        match code & 0b11 {
            0 => Nucleotide::A,
            1 => Nucleotide::T,
            2 => Nucleotide::C,
            _ => Nucleotide::G,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Nucleotide::A => 0,
            Nucleotide::T => 1,
            Nucleotide::C => 2,
            Nucleotide::G => 3,
        }
    }

    pub fn from_ascii(b: u8) -> Option<Self> {
        match b {
            b'A' | b'a' => Some(Nucleotide::A),
            b'T' | b't' | b'U' | b'u' => Some(Nucleotide::T),
            b'C' | b'c' => Some(Nucleotide::C),
            b'G' | b'g' => Some(Nucleotide::G),
            _ => None,
        }
    }

    pub fn to_ascii(self) -> u8 {
        match self {
            Nucleotide::A => b'A',
            Nucleotide::T => b'T',
            Nucleotide::C => b'C',
            Nucleotide::G => b'G',
        }
    }

    pub fn complement(self) -> Self {
        match self {
            Nucleotide::A => Nucleotide::T,
            Nucleotide::T => Nucleotide::A,
            Nucleotide::C => Nucleotide::G,
            Nucleotide::G => Nucleotide::C,
        }
    }
}

impl From<Nucleotide> for char {
    fn from(n: Nucleotide) -> Self {
        n.to_ascii() as char
    }
}

impl fmt::Display for Nucleotide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", char::from(*self))
    }
}

/// Bases observed together on one read at positions `i` and `j`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BasePair {
    pub at_i: Nucleotide,
    pub at_j: Nucleotide,
}

impl BasePair {
    /// Unpack a producer base byte: `(i << 2) | j`.
    pub fn from_byte(byte: u8) -> Self {
        Self {
            at_i: Nucleotide::from_code(byte >> 2),
            at_j: Nucleotide::from_code(byte),
        }
    }

    pub fn to_byte(self) -> u8 {
        (self.at_i.code() << 2) | self.at_j.code()
    }
}

impl fmt::Display for BasePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.at_i, self.at_j)
    }
}

impl Serialize for BasePair {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// One `{base: "X,Y", num}` entry of a `fullcounts` list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BasePairCount {
    pub base: BasePair,
    pub num: u32,
}

/// Value stored for one metric at one pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Scalar(f64),
    Vector(Vec<f64>),
    BaseCounts(Vec<BasePairCount>),
}

impl MetricValue {
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            MetricValue::Scalar(v) => Some(*v),
            MetricValue::Vector(v) => v.first().copied(),
            MetricValue::BaseCounts(_) => None,
        }
    }

    pub fn as_vector(&self) -> Option<&[f64]> {
        match self {
            MetricValue::Vector(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_base_counts(&self) -> Option<&[BasePairCount]> {
        match self {
            MetricValue::BaseCounts(c) => Some(c),
            _ => None,
        }
    }
}

/// All metrics loaded so far for one pair, keyed by metric name.
pub type MetricBundle = BTreeMap<String, MetricValue>;

/// Running `{min, max}` over the nonzero values of a metric slot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub fn new(value: f64) -> Self {
        Self { min: value, max: value }
    }

    pub fn observe(&mut self, value: f64) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_byte_unpacking() {
        // (C << 2) | G
        let pair = BasePair::from_byte(0b1011);
        assert_eq!(pair.at_i, Nucleotide::C);
        assert_eq!(pair.at_j, Nucleotide::G);
        assert_eq!(pair.to_string(), "C,G");
        assert_eq!(pair.to_byte(), 0b1011);
    }

    #[test]
    fn test_nucleotide_ascii() {
        assert_eq!(Nucleotide::from_ascii(b'u'), Some(Nucleotide::T));
        assert_eq!(Nucleotide::from_ascii(b'N'), None);
        assert_eq!(Nucleotide::G.complement(), Nucleotide::C);
        assert_eq!(char::from(Nucleotide::A), 'A');
    }

    #[test]
    fn test_bounds_observe() {
        let mut b = Bounds::new(2.5);
        b.observe(-1.0);
        b.observe(7.0);
        assert_eq!(b, Bounds { min: -1.0, max: 7.0 });
    }

    #[test]
    fn test_base_counts_serialize() {
        let value = MetricValue::BaseCounts(vec![BasePairCount {
            base: BasePair { at_i: Nucleotide::A, at_j: Nucleotide::T },
            num: 12,
        }]);
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, r#"[{"base":"A,T","num":12}]"#);
    }
}

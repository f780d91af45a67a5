//! Binary windowed-matrix decoder
//!
//! Interprets one metric file and merges it into a [`PairStatisticsStore`]:
//! - Dense   { `num_pos` rows x `num_window` columns x `spacing` elements }
//! - Sparse  { `(i32 flat_index, element x spacing)` records }
//! - `fullcounts` { `(i32 flat_index, u8 n, n x (u8 base_byte, i32 count))` records }
//! - `refdata`    { 2-bit packed nucleotides, four per byte, high bits first }
//!
//! Malformed-but-parseable input is reported as [`DecodeWarning`]s. Only a
//! buffer too short for what its header declares is fatal, and all fatal
//! checks run before the store is touched, so a failed file leaves no
//! partial state behind.

use byteorder::{BigEndian, ReadBytesExt};
use std::fmt;
use std::io::Cursor;
use std::time::{Duration, Instant};
use thiserror::Error;

use crate::coords::WindowGrid;
use crate::format::{ElementFormat, MatrixHeader, HEADER_SIZE, SPARSE_INDEX_SIZE};
use crate::store::{PairStatisticsStore, ReferenceSequence};
use crate::types::*;

/// Fatal decode failures. The file is skipped; the rest of the dataset is unaffected.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Header truncated: need {HEADER_SIZE} bytes, found {0}")]
    TruncatedHeader(usize),

    #[error("Invalid dimensions: num_window={num_window}, num_pos={num_pos}")]
    InvalidDimensions { num_window: i32, num_pos: i32 },

    #[error("Unsupported integer element width: {0} bytes")]
    UnsupportedElementWidth(usize),

    #[error("Missing data designated by header: expected {expected} bytes, found {actual}")]
    InsufficientData { expected: usize, actual: usize },
}

pub type DecodeResult<T> = Result<T, DecodeError>;

/// Recoverable format problems. Decoding continues with best-effort truncation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeWarning {
    WindowMismatch { expected: i32, found: i32 },
    PositionMismatch { expected: i32, found: i32 },
    TrailingBytes { expected: usize, actual: usize },
    FractionalRecords { records: usize, extra_bytes: usize },
    InvalidFlatIndex { index: i32 },
    PartialRecord { offset: usize },
    ShortReference { expected: usize, decoded: usize },
}

impl fmt::Display for DecodeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeWarning::WindowMismatch { expected, found } => {
                write!(f, "window size does not match dataset: expected {}, found {}", expected, found)
            }
            DecodeWarning::PositionMismatch { expected, found } => {
                write!(f, "number of positions does not match dataset: expected {}, found {}", expected, found)
            }
            DecodeWarning::TrailingBytes { expected, actual } => {
                write!(f, "expected {} bytes from header, found {}; trailing data ignored", expected, actual)
            }
            DecodeWarning::FractionalRecords { records, extra_bytes } => {
                write!(f, "{} whole records plus {} stray bytes; partial record dropped", records, extra_bytes)
            }
            DecodeWarning::InvalidFlatIndex { index } => write!(f, "negative flat index {} skipped", index),
            DecodeWarning::PartialRecord { offset } => write!(f, "partial record at byte {} dropped", offset),
            DecodeWarning::ShortReference { expected, decoded } => {
                write!(f, "reference holds {} bases, header declares {}", decoded, expected)
            }
        }
    }
}

/// Storage layout selected by the header flags and metric name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    Dense,
    Sparse,
    FullCounts,
    RefData,
}

/// Summary of one successful decode.
#[derive(Debug, Clone)]
pub struct DecodeReport {
    pub metric: String,
    pub header: MatrixHeader,
    pub layout: Layout,
    pub element: Option<ElementFormat>,
    /// Records (sparse) or elements (dense) read from the stream.
    pub records: usize,
    /// Store entries written.
    pub inserted: usize,
    /// Dense zero elements omitted from the store.
    pub skipped_zero: usize,
    pub warnings: Vec<DecodeWarning>,
    pub elapsed: Duration,
}

impl DecodeReport {
    fn new(metric: &str, header: MatrixHeader, layout: Layout, element: Option<ElementFormat>) -> Self {
        Self {
            metric: metric.to_string(),
            header,
            layout,
            element,
            records: 0,
            inserted: 0,
            skipped_zero: 0,
            warnings: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    fn warn(&mut self, warning: DecodeWarning) {
        log::warn!("{}: {}", self.metric, warning);
        self.warnings.push(warning);
    }
}

/// Select the layout for a metric file without decoding it.
pub fn layout_for(metric: &str, header: &MatrixHeader) -> Layout {
    match metric {
        metric_names::FULL_COUNTS => Layout::FullCounts,
        metric_names::REF_DATA => Layout::RefData,
        _ if header.flags.is_sparse => Layout::Sparse,
        _ => Layout::Dense,
    }
}

/// Decodes metric files into a shared store.
#[derive(Debug, Default, Clone, Copy)]
pub struct BinaryMatrixDecoder;

impl BinaryMatrixDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Decode `data` as metric `metric` and merge it into `store`.
    pub fn decode(
        &self,
        data: &[u8],
        metric: &str,
        store: &mut PairStatisticsStore,
    ) -> DecodeResult<DecodeReport> {
        let started = Instant::now();
        let header = MatrixHeader::parse(data)?;
        let layout = layout_for(metric, &header);

        let mut report = match layout {
            Layout::RefData => self.decode_refdata(data, metric, header, store),
            Layout::FullCounts => {
                check_dimensions(&header)?;
                let mut report = DecodeReport::new(metric, header, layout, None);
                reconcile_dims(&header, store, &mut report);
                self.decode_fullcounts(data, header, store, &mut report)?;
                report
            }
            Layout::Dense | Layout::Sparse => {
                check_dimensions(&header)?;
                let element = header.flags.element_format()?;
                let mut report = DecodeReport::new(metric, header, layout, Some(element));
                if layout == Layout::Dense {
                    check_dense_length(data, &header, element, &mut report)?;
                    reconcile_dims(&header, store, &mut report);
                    self.decode_dense(data, header, element, store, &mut report)?;
                } else {
                    reconcile_dims(&header, store, &mut report);
                    self.decode_sparse(data, header, element, store, &mut report)?;
                }
                report
            }
        };

        store.mark_loaded(metric);
        report.elapsed = started.elapsed();
        log::info!(
            "decoded {} ({:?}, {} records, {} entries) in {:.1} ms",
            metric,
            layout,
            report.records,
            report.inserted,
            report.elapsed.as_secs_f64() * 1000.0
        );
        Ok(report)
    }

    fn decode_dense(
        &self,
        data: &[u8],
        header: MatrixHeader,
        element: ElementFormat,
        store: &mut PairStatisticsStore,
        report: &mut DecodeReport,
    ) -> DecodeResult<()> {
        let grid = WindowGrid::new(header.num_window, header.num_pos);
        let spacing = header.flags.spacing;
        let mut cursor = Cursor::new(&data[HEADER_SIZE..]);
        let mut slots = vec![0.0f64; spacing];

        for row in 0..header.num_pos as i64 {
            for window_index in 0..header.num_window as i64 {
                for slot in slots.iter_mut() {
                    *slot = element.read(&mut cursor)?;
                }
                report.records += spacing;

                let nonzero = slots.iter().filter(|v| **v != 0.0).count();
                report.skipped_zero += spacing - nonzero;
                if nonzero == 0 {
                    continue;
                }

                let pair = grid.to_pair(row, window_index);
                store_slots(store, pair, &report.metric, &slots);
                report.inserted += 1;
            }
        }
        Ok(())
    }

    fn decode_sparse(
        &self,
        data: &[u8],
        header: MatrixHeader,
        element: ElementFormat,
        store: &mut PairStatisticsStore,
        report: &mut DecodeReport,
    ) -> DecodeResult<()> {
        let grid = WindowGrid::new(header.num_window, header.num_pos);
        let record_len = header.sparse_record_len(element);
        let payload = data.len() - HEADER_SIZE;
        let records = payload / record_len;
        let extra_bytes = payload % record_len;
        if extra_bytes != 0 {
            report.warn(DecodeWarning::FractionalRecords { records, extra_bytes });
        }

        let mut cursor = Cursor::new(&data[HEADER_SIZE..HEADER_SIZE + records * record_len]);
        let mut slots = vec![0.0f64; header.flags.spacing];

        for _ in 0..records {
            let index = cursor.read_i32::<BigEndian>()?;
            for slot in slots.iter_mut() {
                *slot = element.read(&mut cursor)?;
            }
            report.records += 1;

            if index < 0 {
                report.warn(DecodeWarning::InvalidFlatIndex { index });
                continue;
            }

            let pair = grid.flat_to_pair(index as i64);
            store_slots(store, pair, &report.metric, &slots);
            report.inserted += 1;
        }
        Ok(())
    }

    fn decode_fullcounts(
        &self,
        data: &[u8],
        header: MatrixHeader,
        store: &mut PairStatisticsStore,
        report: &mut DecodeReport,
    ) -> DecodeResult<()> {
        const ENTRY_LEN: usize = 5;
        let grid = WindowGrid::new(header.num_window, header.num_pos);
        let mut cursor = Cursor::new(data);
        cursor.set_position(HEADER_SIZE as u64);

        loop {
            let offset = cursor.position() as usize;
            let remaining = data.len() - offset;
            if remaining == 0 {
                break;
            }
            if remaining < SPARSE_INDEX_SIZE + 1 {
                report.warn(DecodeWarning::PartialRecord { offset });
                break;
            }

            let index = cursor.read_i32::<BigEndian>()?;
            let entry_count = cursor.read_u8()? as usize;
            if remaining - SPARSE_INDEX_SIZE - 1 < entry_count * ENTRY_LEN {
                report.warn(DecodeWarning::PartialRecord { offset });
                break;
            }

            let mut entries = Vec::with_capacity(entry_count);
            let mut total = 0.0;
            for _ in 0..entry_count {
                let base = BasePair::from_byte(cursor.read_u8()?);
                let num = cursor.read_i32::<BigEndian>()?.max(0) as u32;
                total += num as f64;
                entries.push(BasePairCount { base, num });
            }
            report.records += 1;

            if index < 0 {
                report.warn(DecodeWarning::InvalidFlatIndex { index });
                continue;
            }

            let pair = grid.flat_to_pair(index as i64);
            log::trace!("{} {}: {} base pairs", report.metric, pair, entries.len());
            store.upsert(pair.i, pair.j, &report.metric, MetricValue::BaseCounts(entries));
            store.observe_bound(&report.metric, 0, total);
            report.inserted += 1;
        }
        Ok(())
    }

    fn decode_refdata(
        &self,
        data: &[u8],
        metric: &str,
        header: MatrixHeader,
        store: &mut PairStatisticsStore,
    ) -> DecodeReport {
        let mut report = DecodeReport::new(metric, header, Layout::RefData, None);
        let packed = &data[HEADER_SIZE..];
        let available = packed.len() * 4;

        let limit = if header.num_pos > 0 {
            let declared = header.num_pos as usize;
            if declared > available {
                report.warn(DecodeWarning::ShortReference { expected: declared, decoded: available });
            }
            declared.min(available)
        } else {
            available
        };

        let bases = unpack_bases(packed, limit);
        report.records = packed.len();
        report.inserted = bases.len();
        store.set_reference(ReferenceSequence::from_bases(&bases));
        report
    }
}

/// Unpack up to `limit` 2-bit nucleotides, four per byte, high bits first.
pub fn unpack_bases(packed: &[u8], limit: usize) -> Vec<u8> {
    packed
        .iter()
        .flat_map(|&byte| [6u8, 4, 2, 0].map(|shift| Nucleotide::from_code(byte >> shift).to_ascii()))
        .take(limit)
        .collect()
}

fn store_slots(store: &mut PairStatisticsStore, pair: PairKey, metric: &str, slots: &[f64]) {
    for (slot, &value) in slots.iter().enumerate() {
        store.observe_bound(metric, slot, value);
    }
    let value = if slots.len() == 1 {
        MetricValue::Scalar(slots[0])
    } else {
        MetricValue::Vector(slots.to_vec())
    };
    store.upsert(pair.i, pair.j, metric, value);
}

fn check_dimensions(header: &MatrixHeader) -> DecodeResult<()> {
    if header.num_window <= 0 || header.num_pos < 0 {
        return Err(DecodeError::InvalidDimensions {
            num_window: header.num_window,
            num_pos: header.num_pos,
        });
    }
    Ok(())
}

fn check_dense_length(
    data: &[u8],
    header: &MatrixHeader,
    element: ElementFormat,
    report: &mut DecodeReport,
) -> DecodeResult<()> {
    let expected = header.expected_dense_len(element).ok_or(DecodeError::InvalidDimensions {
        num_window: header.num_window,
        num_pos: header.num_pos,
    })?;
    if data.len() < expected {
        return Err(DecodeError::InsufficientData { expected, actual: data.len() });
    }
    if data.len() > expected {
        report.warn(DecodeWarning::TrailingBytes { expected, actual: data.len() });
    }
    Ok(())
}

fn reconcile_dims(header: &MatrixHeader, store: &mut PairStatisticsStore, report: &mut DecodeReport) {
    let dims = store.establish_dims(DatasetDims {
        num_window: header.num_window,
        num_pos: header.num_pos,
    });
    if dims.num_window != header.num_window {
        report.warn(DecodeWarning::WindowMismatch { expected: dims.num_window, found: header.num_window });
    }
    if dims.num_pos != header.num_pos {
        report.warn(DecodeWarning::PositionMismatch { expected: dims.num_pos, found: header.num_pos });
    }
}

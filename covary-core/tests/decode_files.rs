use covary_core::format::HeaderFlags;
use covary_core::types::metric_names;
use covary_core::{
    BasePair, BasePairCount, BinaryMatrixDecoder, Bounds, MatrixHeader, MatrixWriter, MetricValue, Nucleotide,
    PairStatisticsStore,
};
use std::io::Write;
use tempfile::NamedTempFile;

fn write_file(bytes: &[u8]) -> NamedTempFile {
    let mut f = NamedTempFile::new().expect("create temp file");
    f.write_all(bytes).expect("write temp file");
    f.flush().expect("flush temp file");
    f
}

#[test]
fn dense_scenario_from_file() {
    let header = MatrixHeader { num_window: 5, num_pos: 3, flags: HeaderFlags::dense_f32(1) };
    let mut values = vec![0.0; 15];
    values[2] = 2.5;
    let file = write_file(&MatrixWriter::dense(header, &values).expect("encode"));

    let bytes = std::fs::read(file.path()).expect("read back");
    let mut store = PairStatisticsStore::new();
    BinaryMatrixDecoder::new()
        .decode(&bytes, metric_names::METRIC, &mut store)
        .expect("decode");

    let pairs: Vec<_> = store.all_pairs().collect();
    assert_eq!(pairs.len(), 1);
    assert_eq!((pairs[0].i, pairs[0].j), (1, 1));
    assert_eq!(store.scalar(1, 1, metric_names::METRIC), Some(2.5));
    assert_eq!(store.bounds(metric_names::METRIC, 0), Some(Bounds { min: 2.5, max: 2.5 }));
}

#[test]
fn fullcounts_reproduce_exact_entries() {
    let header = MatrixHeader { num_window: 7, num_pos: 20, flags: HeaderFlags::sparse_int(4, 1) };
    let entries = vec![
        BasePairCount { base: BasePair { at_i: Nucleotide::A, at_j: Nucleotide::G }, num: 120 },
        BasePairCount { base: BasePair { at_i: Nucleotide::T, at_j: Nucleotide::T }, num: 3 },
        BasePairCount { base: BasePair { at_i: Nucleotide::C, at_j: Nucleotide::A }, num: 1 },
    ];
    // row 4, window 6 -> (5, 8)
    let flat = 4 * 7 + 6;
    let bytes = MatrixWriter::fullcounts(header, &[(flat, entries.clone())]).expect("encode");

    let mut store = PairStatisticsStore::new();
    BinaryMatrixDecoder::new()
        .decode(&bytes, metric_names::FULL_COUNTS, &mut store)
        .expect("decode");

    assert_eq!(store.len(), 1);
    let decoded = store
        .get_metric(5, 8, metric_names::FULL_COUNTS)
        .and_then(MetricValue::as_base_counts)
        .expect("fullcounts at (5, 8)");
    assert_eq!(decoded, &entries[..]);

    let json = serde_json::to_string(store.get(5, 8).expect("bundle")).expect("json");
    assert!(json.contains(r#"{"base":"A,G","num":120}"#));
}

#[test]
fn metrics_merge_in_any_order() {
    let depth = MatrixWriter::dense(
        MatrixHeader { num_window: 3, num_pos: 2, flags: HeaderFlags::dense_f32(1) },
        &[4.0, 5.0, 6.0, 7.0, 8.0, 9.0],
    )
    .expect("encode depth");
    let counts = MatrixWriter::sparse(
        MatrixHeader { num_window: 3, num_pos: 2, flags: HeaderFlags::sparse_int(4, 4) },
        &[(2, vec![1.0, 2.0, 3.0, 4.0]), (3, vec![0.0, 0.0, 0.0, 9.0])],
    )
    .expect("encode counts");

    let decoder = BinaryMatrixDecoder::new();
    let mut forward = PairStatisticsStore::new();
    decoder.decode(&depth, metric_names::DEPTH, &mut forward).expect("depth");
    decoder.decode(&counts, metric_names::COUNTS, &mut forward).expect("counts");

    let mut backward = PairStatisticsStore::new();
    decoder.decode(&counts, metric_names::COUNTS, &mut backward).expect("counts");
    decoder.decode(&depth, metric_names::DEPTH, &mut backward).expect("depth");

    let a: Vec<_> = forward.pairs().map(|(k, b)| (*k, b.clone())).collect();
    let b: Vec<_> = backward.pairs().map(|(k, b)| (*k, b.clone())).collect();
    assert_eq!(a, b);
    assert_eq!(forward.bounds(metric_names::COUNTS, 3), Some(Bounds { min: 4.0, max: 9.0 }));
    assert_eq!(forward.bounds(metric_names::COUNTS, 0), Some(Bounds { min: 1.0, max: 1.0 }));
}

#[test]
fn reference_from_packed_file() {
    let header = MatrixHeader { num_window: 1, num_pos: 9, flags: HeaderFlags::dense_f32(1) };
    let bytes = MatrixWriter::refdata(header, b"ATTAAAGGT").expect("encode");
    assert_eq!(bytes.len(), 12 + 3);

    let mut store = PairStatisticsStore::new();
    BinaryMatrixDecoder::new()
        .decode(&bytes, metric_names::REF_DATA, &mut store)
        .expect("decode");
    let reference = store.reference().expect("reference");
    assert_eq!(reference.as_str(), "ATTAAAGGT");
    assert_eq!(reference.as_bytes()[0], b'-');
    assert!(store.is_loaded(metric_names::REF_DATA));
}

//! Synth command implementation - write a small, seeded dataset
//!
//! Reads are simulated over a random reference. Variants either ride on one
//! of a few haplotypes (and so co-occur) or appear independently, which gives
//! the filter both linked and unlinked pairs to separate.

use anyhow::{Context, Result};
use covary_core::annotation::GeneRange;
use covary_core::dataset::DatasetEntry;
use covary_core::format::HeaderFlags;
use covary_core::{
    Annotation, AnnotationSet, BasePair, BasePairCount, CodonSynonymyClassifier, CooccurMetric, DatasetManifest,
    MatrixHeader, MatrixWriter, Nucleotide, Position, ReferenceSequence, VariantMatrix,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::{Path, PathBuf};

use crate::error::CliError;

pub const DATASET_NAME: &str = "synthetic";

const READS_PER_POSITION: usize = 25;
const HAPLOTYPE_FREQUENCIES: [f64; 3] = [0.3, 0.15, 0.08];
const VARIANT_DENSITY: f64 = 0.08;
const SYNONYMOUS_SHARE: f64 = 0.3;
const NOISE: f64 = 0.002;
const MAX_CELLS: usize = 20_000_000;

#[derive(Debug, Clone, Copy)]
struct Variant {
    alt: Nucleotide,
    haplotype: Option<usize>,
    frequency: f64,
}

#[derive(Debug)]
pub struct SynthSummary {
    pub files: Vec<PathBuf>,
    pub variants: usize,
    pub reads: usize,
    pub max_depth: u32,
}

pub fn execute(out_dir: &Path, num_pos: i32, num_window: i32, seed: u64) -> Result<()> {
    let summary = generate(out_dir, num_pos, num_window, seed)?;
    println!(
        "Wrote dataset '{}' to {} ({} positions, {} variants, {} reads, max depth {})",
        DATASET_NAME,
        out_dir.display(),
        num_pos,
        summary.variants,
        summary.reads,
        summary.max_depth
    );
    for file in &summary.files {
        println!("  {}", file.display());
    }
    Ok(())
}

pub fn generate(out_dir: &Path, num_pos: i32, num_window: i32, seed: u64) -> Result<SynthSummary> {
    validate(num_pos, num_window)?;
    std::fs::create_dir_all(out_dir).with_context(|| format!("Failed to create {}", out_dir.display()))?;

    let mut rng = StdRng::seed_from_u64(seed);
    let np = num_pos as usize;
    let nw = num_window as usize;
    let half = (num_window / 2) as i64;

    let reference: Vec<Nucleotide> = (0..np).map(|_| Nucleotide::from_code(rng.gen::<u8>())).collect();
    let reference_ascii: Vec<u8> = reference.iter().map(|b| b.to_ascii()).collect();
    let ref_at = |pos: i64| reference[(pos - 1) as usize];

    let genes = synthetic_genes(num_pos as Position);
    let annotations = AnnotationSet::new(genes.clone())?;
    let padded = ReferenceSequence::from_bases(&reference_ascii);
    let classifier = CodonSynonymyClassifier::new();

    let mut variants: Vec<Option<Variant>> = vec![None; np + 1];
    for pos in 1..=np as i64 {
        if !rng.gen_bool(VARIANT_DENSITY) {
            continue;
        }
        let haplotype = rng.gen_range(0..=HAPLOTYPE_FREQUENCIES.len());
        let haplotype = (haplotype < HAPLOTYPE_FREQUENCIES.len()).then_some(haplotype);
        let alt = pick_alt(&mut rng, pos, ref_at(pos), &annotations, &classifier, padded.as_bytes());
        variants[pos as usize] = Some(Variant { alt, haplotype, frequency: rng.gen_range(0.02..0.2) });
    }
    // One linked pair well inside the window, so every dataset has a hit.
    let anchor = num_pos as i64 / 2;
    for pos in [anchor, anchor + half.min(3)] {
        let alt = pick_alt(&mut rng, pos, ref_at(pos), &AnnotationSet::default(), &classifier, padded.as_bytes());
        variants[pos as usize] = Some(Variant { alt, haplotype: Some(0), frequency: 0.0 });
    }

    // Base pair tallies per grid cell, indexed by the producer's base byte.
    let mut cells = vec![[0u32; 16]; np * nw];
    let read_len = (nw + 10).min(np) as i64;
    let reads = np * READS_PER_POSITION;
    for _ in 0..reads {
        let start = rng.gen_range(2 - read_len..=num_pos as i64);
        let lo = start.max(1);
        let hi = (start + read_len - 1).min(num_pos as i64);
        let carries: Vec<bool> = HAPLOTYPE_FREQUENCIES.iter().map(|&f| rng.gen_bool(f)).collect();

        let bases: Vec<Nucleotide> = (lo..=hi)
            .map(|pos| {
                let mut base = match variants[pos as usize] {
                    Some(v) => {
                        let carried = match v.haplotype {
                            Some(h) => carries[h],
                            None => rng.gen_bool(v.frequency),
                        };
                        if carried { v.alt } else { ref_at(pos) }
                    }
                    None => ref_at(pos),
                };
                if rng.gen_bool(NOISE) {
                    base = Nucleotide::from_code(rng.gen::<u8>());
                }
                base
            })
            .collect();

        for i in lo..=hi {
            let row = (i - 1) as usize;
            for j in (i - half).max(lo)..=(i + half).min(hi) {
                let w = (j - i + half) as usize;
                let pair = BasePair { at_i: bases[(i - lo) as usize], at_j: bases[(j - lo) as usize] };
                cells[row * nw + w][pair.to_byte() as usize] += 1;
            }
        }
    }

    let mut depth = vec![0.0f64; np * nw];
    let mut diff = vec![0.0f64; np * nw];
    let mut ratio = vec![0.0f64; np * nw];
    let mut base_counts = vec![0.0f64; np * 4];
    let mut counts = Vec::new();
    let mut fullcounts = Vec::new();

    for row in 0..np {
        let i = row as i64 + 1;
        for w in 0..nw {
            let j = i - half + w as i64;
            let flat = row * nw + w;
            let entries: Vec<BasePairCount> = cells[flat]
                .iter()
                .enumerate()
                .filter(|(_, num)| **num > 0)
                .map(|(byte, &num)| BasePairCount { base: BasePair::from_byte(byte as u8), num })
                .collect();
            if entries.is_empty() {
                continue;
            }

            let total: u32 = entries.iter().map(|e| e.num).sum();
            depth[flat] = total as f64;
            if i == j {
                for entry in &entries {
                    base_counts[row * 4 + entry.base.at_i.code() as usize] += entry.num as f64;
                }
                fullcounts.push((flat as i32, entries));
                continue;
            }

            let (ref_i, ref_j) = (ref_at(i), ref_at(j));
            let matrix = VariantMatrix::from_base_counts(&entries, |b| b == ref_i, |b| b == ref_j);
            diff[flat] = CooccurMetric::DiffFromExpected.compute(&matrix);
            ratio[flat] = CooccurMetric::RatioOfObservedToExpected.compute(&matrix);
            if matrix.total() > matrix.mimj {
                counts.push((flat as i32, vec![matrix.mimj, matrix.mivj, matrix.vimj, matrix.vivj]));
                fullcounts.push((flat as i32, entries));
            }
        }
    }

    let grid = |flags| MatrixHeader { num_window, num_pos, flags };
    let mut files = Vec::new();
    let mut write = |name: &str, bytes: Vec<u8>| -> Result<()> {
        let path = out_dir.join(name);
        std::fs::write(&path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
        files.push(path);
        Ok(())
    };

    write("depth.dat", MatrixWriter::dense(grid(HeaderFlags::dense_f32(1)), &depth)?)?;
    write("metric_diff.dat", MatrixWriter::dense(grid(HeaderFlags::dense_f32(1)), &diff)?)?;
    write("metric_ratio.dat", MatrixWriter::dense(grid(HeaderFlags::dense_f32(1)), &ratio)?)?;
    write("counts.dat", MatrixWriter::sparse(grid(HeaderFlags::sparse_int(4, 4)), &counts)?)?;
    write("fullcounts.dat", MatrixWriter::fullcounts(grid(HeaderFlags::from_bits(0)), &fullcounts)?)?;
    let base_records: Vec<(i32, Vec<f64>)> = base_counts
        .chunks(4)
        .enumerate()
        .filter(|(_, slots)| slots.iter().any(|&n| n > 0.0))
        .map(|(row, slots)| (row as i32, slots.to_vec()))
        .collect();
    let single = MatrixHeader { num_window: 1, num_pos, flags: HeaderFlags::sparse_int(4, 4) };
    write("basecounts.dat", MatrixWriter::sparse(single, &base_records)?)?;
    let single = MatrixHeader { num_window: 1, num_pos, flags: HeaderFlags::dense_f32(1) };
    write("ref.dat", MatrixWriter::refdata(single, &reference_ascii)?)?;
    write("genes.json", serde_json::to_vec_pretty(&genes)?)?;

    let mut manifest = DatasetManifest::default();
    manifest.insert(
        DATASET_NAME,
        DatasetEntry {
            attenuation: "depth.dat".to_string(),
            metrics: vec!["metric_diff.dat".to_string(), "metric_ratio.dat".to_string()],
            variant_counts: "counts.dat".to_string(),
            fullcounts: Some("fullcounts.dat".to_string()),
            refdata: Some("ref.dat".to_string()),
            annotations: Some("genes.json".to_string()),
            base_counts: Some("basecounts.dat".to_string()),
            subunits: None,
        },
    );
    write("manifest.json", manifest.to_json_pretty()?.into_bytes())?;

    let summary = SynthSummary {
        files,
        variants: variants.iter().flatten().count(),
        reads,
        max_depth: depth.iter().fold(0.0f64, |a, &b| a.max(b)) as u32,
    };
    log::info!("synthesized {} variants over {} positions", summary.variants, num_pos);
    Ok(summary)
}

fn validate(num_pos: i32, num_window: i32) -> Result<(), CliError> {
    if num_window < 3 || num_window % 2 == 0 {
        return Err(CliError::validation(format!("num_window must be odd and at least 3, got {}", num_window)));
    }
    if num_pos < 12 {
        return Err(CliError::validation(format!("num_pos must be at least 12, got {}", num_pos)));
    }
    if num_pos as usize * num_window as usize > MAX_CELLS {
        return Err(CliError::validation(format!(
            "{} positions x {} window is too large to synthesize",
            num_pos, num_window
        )));
    }
    Ok(())
}

/// A forward gene over the first two fifths and a reverse gene over the last
/// three tenths, both whole codons.
fn synthetic_genes(num_pos: Position) -> Vec<Annotation> {
    let forward_len = (num_pos * 2 / 5) / 3 * 3;
    let reverse_len = (num_pos * 3 / 10) / 3 * 3;
    let forward = GeneRange::new(2, 2 + forward_len - 1);
    let reverse_start = num_pos - 1;
    let reverse = GeneRange::new(reverse_start, reverse_start - reverse_len + 1);
    vec![
        Annotation { gene: "fwd".to_string(), locations: vec![forward], gene_index: 0 },
        Annotation { gene: "rev".to_string(), locations: vec![reverse], gene_index: 1 },
    ]
}

/// A base other than the reference, synonymous some of the time when the
/// position lies in a gene.
fn pick_alt(
    rng: &mut StdRng,
    pos: i64,
    reference: Nucleotide,
    annotations: &AnnotationSet,
    classifier: &CodonSynonymyClassifier,
    padded_reference: &[u8],
) -> Nucleotide {
    if rng.gen_bool(SYNONYMOUS_SHARE) {
        let synonymous: Vec<Nucleotide> = classifier
            .synonymous_bases(pos as Position, annotations, padded_reference)
            .into_iter()
            .filter(|&b| b != reference)
            .collect();
        if !synonymous.is_empty() {
            return synonymous[rng.gen_range(0..synonymous.len())];
        }
    }
    let others: Vec<Nucleotide> = Nucleotide::ALL.into_iter().filter(|&b| b != reference).collect();
    others[rng.gen_range(0..others.len())]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::filter::load_dataset;
    use covary_core::Thresholds;
    use tempfile::TempDir;

    #[test]
    fn test_rejects_even_window() {
        let dir = TempDir::new().expect("tempdir");
        let err = generate(dir.path(), 120, 20, 1).err();
        assert!(matches!(err.map(|e| e.downcast::<CliError>()), Some(Ok(CliError::Validation { .. }))));
    }

    #[test]
    fn test_same_seed_same_bytes() -> Result<()> {
        let a = TempDir::new()?;
        let b = TempDir::new()?;
        generate(a.path(), 60, 11, 7)?;
        generate(b.path(), 60, 11, 7)?;
        for name in ["depth.dat", "counts.dat", "fullcounts.dat", "ref.dat"] {
            assert_eq!(std::fs::read(a.path().join(name))?, std::fs::read(b.path().join(name))?);
        }
        Ok(())
    }

    #[test]
    fn test_synthetic_dataset_filters() -> Result<()> {
        let dir = TempDir::new()?;
        let summary = generate(dir.path(), 120, 21, 42)?;
        assert!(summary.variants >= 2);
        assert_eq!(summary.files.len(), 9);

        let mut session = load_dataset(&dir.path().join("manifest.json"), DATASET_NAME, dir.path(), 0)?;
        assert!(session.is_ready());
        assert!(session.failed().next().is_none());
        assert_eq!(session.annotations().genes().len(), 2);
        assert_eq!(session.store().reference().map(|r| r.len()), Some(120));

        let entries = session.filter(&Thresholds::default()).unwrap_or_default();
        let anchor = 60;
        let hit = entries
            .iter()
            .find(|e| e.pos == anchor)
            .and_then(|e| e.related_pairs.iter().find(|p| p.posj == anchor + 3));
        assert!(hit.is_some(), "planted linked pair should pass default thresholds");

        let synonymy = Thresholds { synonymy: true, ..Thresholds::default() };
        assert!(session.filter(&synonymy).is_some());
        Ok(())
    }
}

//! Inspect command implementation - print a binary matrix file's header and decode summary

use anyhow::{Context, Result};
use covary_core::decode::{layout_for, Layout};
use covary_core::format::HEADER_SIZE;
use covary_core::{BinaryMatrixDecoder, MatrixHeader, PairStatisticsStore};
use std::path::Path;

use super::map_file;

pub fn execute(file: &Path, metric: &str) -> Result<()> {
    let data = map_file(file)?;
    let summary = inspect_bytes(&data, metric).with_context(|| format!("Failed to inspect {}", file.display()))?;
    println!("{}", file.display());
    print!("{}", summary);
    Ok(())
}

/// Header description plus the outcome of a trial decode.
pub fn inspect_bytes(data: &[u8], metric: &str) -> Result<String> {
    let header = MatrixHeader::parse(data)?;
    let layout = layout_for(metric, &header);
    let flags = header.flags;

    let mut out = String::new();
    out.push_str(&format!("  num_window: {}\n", header.num_window));
    out.push_str(&format!("  num_pos:    {}\n", header.num_pos));
    out.push_str(&format!(
        "  flags:      spacing={} precision={} int={} sparse={}\n",
        flags.spacing, flags.precision, flags.is_int, flags.is_sparse
    ));
    out.push_str(&format!("  layout:     {:?}\n", layout));

    match layout {
        Layout::Dense | Layout::Sparse => match flags.element_format() {
            Ok(element) => {
                out.push_str(&format!("  element:    {} ({} bytes)\n", element, element.width()));
                if layout == Layout::Dense {
                    match header.expected_dense_len(element) {
                        Some(expected) => out.push_str(&format!(
                            "  bytes:      {} (header declares {})\n",
                            data.len(),
                            expected
                        )),
                        None => out.push_str(&format!("  bytes:      {} (header size overflows)\n", data.len())),
                    }
                } else {
                    let record_len = header.sparse_record_len(element);
                    let payload = data.len().saturating_sub(HEADER_SIZE);
                    out.push_str(&format!(
                        "  records:    {} of {} bytes (+{} stray bytes)\n",
                        payload / record_len,
                        record_len,
                        payload % record_len
                    ));
                }
            }
            Err(err) => out.push_str(&format!("  element:    {}\n", err)),
        },
        Layout::FullCounts | Layout::RefData => {
            out.push_str(&format!("  payload:    {} bytes\n", data.len().saturating_sub(HEADER_SIZE)));
        }
    }

    let mut store = PairStatisticsStore::new();
    match BinaryMatrixDecoder::new().decode(data, metric, &mut store) {
        Ok(report) => {
            out.push_str(&format!(
                "  decoded:    {} records, {} pairs, {} zero elements skipped, {} warnings\n",
                report.records,
                report.inserted,
                report.skipped_zero,
                report.warnings.len()
            ));
            for warning in &report.warnings {
                out.push_str(&format!("    warning: {}\n", warning));
            }
            for slot in 0..flags.spacing {
                if let Some(bounds) = store.bounds(metric, slot) {
                    out.push_str(&format!("  bounds[{}]:  {} .. {}\n", slot, bounds.min, bounds.max));
                }
            }
            if let Some(reference) = store.reference() {
                let preview: String = reference.as_str().chars().take(60).collect();
                out.push_str(&format!("  reference:  {} bases, {}...\n", reference.len(), preview));
            }
        }
        Err(err) => out.push_str(&format!("  decode failed: {}\n", err)),
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use covary_core::format::HeaderFlags;
    use covary_core::MatrixWriter;

    #[test]
    fn test_inspect_dense() -> Result<()> {
        let header = MatrixHeader { num_window: 3, num_pos: 2, flags: HeaderFlags::dense_f32(1) };
        let data = MatrixWriter::dense(header, &[0.0, 1.5, 0.0, 0.0, 3.0, 0.0])?;
        let summary = inspect_bytes(&data, "depth")?;
        assert!(summary.contains("layout:     Dense"));
        assert!(summary.contains("bytes:      36 (header declares 36)"));
        assert!(summary.contains("2 pairs, 4 zero elements skipped"));
        assert!(summary.contains("bounds[0]:  1.5 .. 3"));
        Ok(())
    }

    #[test]
    fn test_inspect_reports_truncation() -> Result<()> {
        let header = MatrixHeader { num_window: 3, num_pos: 2, flags: HeaderFlags::dense_f32(1) };
        let mut data = MatrixWriter::dense(header, &[1.0; 6])?;
        data.truncate(30);
        let summary = inspect_bytes(&data, "depth")?;
        assert!(summary.contains("decode failed: Missing data designated by header"));
        Ok(())
    }

    #[test]
    fn test_short_header_is_error() {
        assert!(inspect_bytes(&[0u8; 5], "depth").is_err());
    }
}

//! Encoder for the windowed matrix format.
//!
//! Produces byte-exact files in every layout the decoder reads. Used by the
//! `synth` command and by tests that need real inputs.

use byteorder::{BigEndian, WriteBytesExt};

use crate::decode::DecodeResult;
use crate::format::{MatrixHeader, HEADER_SIZE};
use crate::types::*;

pub struct MatrixWriter;

impl MatrixWriter {
    /// Dense layout: `values` is row-major, `num_window * spacing` per row.
    pub fn dense(header: MatrixHeader, values: &[f64]) -> DecodeResult<Vec<u8>> {
        let element = header.flags.element_format()?;
        let mut out = Vec::with_capacity(HEADER_SIZE + values.len() * element.width());
        header.write(&mut out)?;
        for &value in values {
            element.write(&mut out, value)?;
        }
        Ok(out)
    }

    /// Sparse layout: one record per `(flat_index, slots)`; `slots` must hold `spacing` values.
    pub fn sparse(header: MatrixHeader, records: &[(i32, Vec<f64>)]) -> DecodeResult<Vec<u8>> {
        let element = header.flags.element_format()?;
        let mut out = Vec::with_capacity(HEADER_SIZE + records.len() * header.sparse_record_len(element));
        header.write(&mut out)?;
        for (index, slots) in records {
            out.write_i32::<BigEndian>(*index)?;
            for slot in 0..header.flags.spacing {
                element.write(&mut out, slots.get(slot).copied().unwrap_or(0.0))?;
            }
        }
        Ok(out)
    }

    pub fn fullcounts(header: MatrixHeader, records: &[(i32, Vec<BasePairCount>)]) -> DecodeResult<Vec<u8>> {
        let mut out = Vec::new();
        header.write(&mut out)?;
        for (index, entries) in records {
            out.write_i32::<BigEndian>(*index)?;
            let entries = &entries[..entries.len().min(u8::MAX as usize)];
            out.write_u8(entries.len() as u8)?;
            for entry in entries {
                out.write_u8(entry.base.to_byte())?;
                out.write_i32::<BigEndian>(entry.num.min(i32::MAX as u32) as i32)?;
            }
        }
        Ok(out)
    }

    /// Pack ASCII bases two bits each, four per byte. Unknown bases pack as `A`.
    pub fn refdata(header: MatrixHeader, bases: &[u8]) -> DecodeResult<Vec<u8>> {
        let mut out = Vec::with_capacity(HEADER_SIZE + bases.len().div_ceil(4));
        header.write(&mut out)?;
        for chunk in bases.chunks(4) {
            let mut byte = 0u8;
            for (k, &base) in chunk.iter().enumerate() {
                let code = Nucleotide::from_ascii(base).map_or(0, Nucleotide::code);
                byte |= code << (6 - 2 * k);
            }
            out.push(byte);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::HeaderFlags;

    #[test]
    fn test_dense_bytes() -> DecodeResult<()> {
        let header = MatrixHeader { num_window: 1, num_pos: 1, flags: HeaderFlags::dense_f32(1) };
        let bytes = MatrixWriter::dense(header, &[2.5])?;
        assert_eq!(&bytes[..HEADER_SIZE], &[0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 0]);
        assert_eq!(&bytes[HEADER_SIZE..], &2.5f32.to_be_bytes());
        Ok(())
    }

    #[test]
    fn test_sparse_pads_missing_slots() -> DecodeResult<()> {
        let header = MatrixHeader { num_window: 3, num_pos: 2, flags: HeaderFlags::sparse_int(2, 2) };
        let bytes = MatrixWriter::sparse(header, &[(4, vec![9.0])])?;
        assert_eq!(bytes.len(), HEADER_SIZE + 4 + 2 * 2);
        assert_eq!(&bytes[HEADER_SIZE..], &[0, 0, 0, 4, 0, 9, 0, 0]);
        Ok(())
    }

    #[test]
    fn test_refdata_packing() -> DecodeResult<()> {
        let header = MatrixHeader { num_window: 1, num_pos: 5, flags: HeaderFlags::dense_f32(1) };
        let bytes = MatrixWriter::refdata(header, b"ATCGG")?;
        assert_eq!(&bytes[HEADER_SIZE..], &[0b0001_1011, 0b1100_0000]);
        Ok(())
    }
}

//! Header and element layout of the windowed matrix format.
//!
//! Every file starts with three big-endian `i32`s:
//! - `num_window`
//! - `num_pos`
//! - `flags`, bit-packed as `uuuu...u s i pp nn`:
//!   `nn` = spacing - 1, `pp` = precision - 1, `i` = integer elements,
//!   `s` = sparse layout.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::fmt;
use std::io::{self, Read, Write};

use crate::decode::{DecodeError, DecodeResult};

/// Size of the fixed file header in bytes.
pub const HEADER_SIZE: usize = 12;

/// Size of the flat index preceding every sparse record.
pub const SPARSE_INDEX_SIZE: usize = 4;

const SPACING_MASK: i32 = 0b11;
const PRECISION_MASK: i32 = 0b1100;
const INT_FLAG: i32 = 0b1_0000;
const SPARSE_FLAG: i32 = 0b10_0000;

/// Decoded header flag word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderFlags {
    /// Elements per position pair, 1..=4.
    pub spacing: usize,
    /// Byte width selector, 1..=4. Only meaningful for integer elements.
    pub precision: usize,
    pub is_int: bool,
    pub is_sparse: bool,
}

impl HeaderFlags {
    pub fn from_bits(bits: i32) -> Self {
        Self {
            spacing: ((bits & SPACING_MASK) + 1) as usize,
            precision: (((bits & PRECISION_MASK) >> 2) + 1) as usize,
            is_int: bits & INT_FLAG != 0,
            is_sparse: bits & SPARSE_FLAG != 0,
        }
    }

    /// Build a flag word the way the producer does, clamping out-of-range inputs.
    pub fn to_bits(&self) -> i32 {
        let spacing = self.spacing.clamp(1, 4) as i32;
        let precision = self.precision.clamp(1, 4) as i32;

        let mut bits = if self.is_sparse { SPARSE_FLAG } else { 0 };
        bits |= if self.is_int { INT_FLAG } else { 0 };
        bits |= (precision - 1) << 2;
        bits |= spacing - 1;
        bits
    }

    pub fn dense_f32(spacing: usize) -> Self {
        Self { spacing, precision: 4, is_int: false, is_sparse: false }
    }

    pub fn sparse_int(precision: usize, spacing: usize) -> Self {
        Self { spacing, precision, is_int: true, is_sparse: true }
    }

    /// Resolve the element type. Floats are always 4 bytes wide.
    pub fn element_format(&self) -> DecodeResult<ElementFormat> {
        if !self.is_int {
            return Ok(ElementFormat::F32);
        }
        match self.precision {
            1 => Ok(ElementFormat::I8),
            2 => Ok(ElementFormat::I16),
            4 => Ok(ElementFormat::I32),
            width => Err(DecodeError::UnsupportedElementWidth(width)),
        }
    }
}

/// Element type of the data stream, resolved once per file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementFormat {
    F32,
    I8,
    I16,
    I32,
}

impl ElementFormat {
    pub fn width(self) -> usize {
        match self {
            ElementFormat::F32 | ElementFormat::I32 => 4,
            ElementFormat::I16 => 2,
            ElementFormat::I8 => 1,
        }
    }

    pub fn read<R: Read>(self, reader: &mut R) -> io::Result<f64> {
        Ok(match self {
            ElementFormat::F32 => reader.read_f32::<BigEndian>()? as f64,
            ElementFormat::I8 => reader.read_i8()? as f64,
            ElementFormat::I16 => reader.read_i16::<BigEndian>()? as f64,
            ElementFormat::I32 => reader.read_i32::<BigEndian>()? as f64,
        })
    }

    /// Write `value`, truncating toward zero for integer formats.
    pub fn write<W: Write>(self, writer: &mut W, value: f64) -> io::Result<()> {
        match self {
            ElementFormat::F32 => writer.write_f32::<BigEndian>(value as f32),
            ElementFormat::I8 => writer.write_i8(value as i8),
            ElementFormat::I16 => writer.write_i16::<BigEndian>(value as i16),
            ElementFormat::I32 => writer.write_i32::<BigEndian>(value as i32),
        }
    }
}

impl fmt::Display for ElementFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementFormat::F32 => "f32",
            ElementFormat::I8 => "i8",
            ElementFormat::I16 => "i16",
            ElementFormat::I32 => "i32",
        };
        f.write_str(name)
    }
}

/// The 12-byte file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatrixHeader {
    pub num_window: i32,
    pub num_pos: i32,
    pub flags: HeaderFlags,
}

impl MatrixHeader {
    pub fn read<R: Read>(reader: &mut R) -> DecodeResult<Self> {
        let num_window = reader.read_i32::<BigEndian>()?;
        let num_pos = reader.read_i32::<BigEndian>()?;
        let flags = HeaderFlags::from_bits(reader.read_i32::<BigEndian>()?);
        Ok(Self { num_window, num_pos, flags })
    }

    pub fn parse(data: &[u8]) -> DecodeResult<Self> {
        if data.len() < HEADER_SIZE {
            return Err(DecodeError::TruncatedHeader(data.len()));
        }
        Self::read(&mut &data[..HEADER_SIZE])
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_i32::<BigEndian>(self.num_window)?;
        writer.write_i32::<BigEndian>(self.num_pos)?;
        writer.write_i32::<BigEndian>(self.flags.to_bits())?;
        Ok(())
    }

    /// Bytes a dense file with this header must hold, header included.
    /// `None` when the size does not fit in `usize`.
    pub fn expected_dense_len(&self, element: ElementFormat) -> Option<usize> {
        (self.num_window.max(0) as usize)
            .checked_mul(self.num_pos.max(0) as usize)?
            .checked_mul(self.flags.spacing)?
            .checked_mul(element.width())?
            .checked_add(HEADER_SIZE)
    }

    /// Bytes occupied by one plain sparse record.
    pub fn sparse_record_len(&self, element: ElementFormat) -> usize {
        SPARSE_INDEX_SIZE + self.flags.spacing * element.width()
    }
}

//! EBML primitive decoding over in-memory byte windows.
//!
//! Nothing in here performs I/O. Every function takes the window and an
//! offset into it and fails with [`WebmError::InvalidEncoding`] when the
//! bytes at that offset cannot be decoded, including when they run past the
//! end of the window.

use crate::error::{Result, WebmError};

pub mod ids;
pub mod writer;

/// Longest possible ID (4 bytes) plus longest possible size (8 bytes).
pub const MAX_HEADER_LEN: usize = 12;

/// Element content size. All content bits set means the writer did not know
/// the size (live streams), which is never a real length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Size {
    Known(u64),
    Unknown,
}

impl Size {
    pub fn known(self) -> Option<u64> {
        match self {
            Size::Known(size) => Some(size),
            Size::Unknown => None,
        }
    }

    pub fn is_unknown(self) -> bool {
        matches!(self, Size::Unknown)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Vint {
    pub value: Size,
    pub length: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementHeader {
    /// Raw ID, marker bit retained.
    pub id: u64,
    pub size: Size,
    /// Bytes taken by the ID and size fields together.
    pub header_len: usize,
}

impl ElementHeader {
    /// Decodes the ID then the size found at `offset`.
    pub fn parse(bytes: &[u8], offset: usize) -> Result<Self> {
        let (id, id_len) = read_id(bytes, offset)?;
        let size = read_vint(bytes, offset + id_len)?;
        Ok(ElementHeader {
            id,
            size: size.value,
            header_len: id_len + size.length,
        })
    }
}

/// Length of a VINT from its first byte: one plus the leading zero count.
fn vint_length(bytes: &[u8], offset: usize) -> Result<(u8, usize)> {
    let first = *bytes
        .get(offset)
        .ok_or_else(|| WebmError::invalid(offset as u64, "VINT past end of data"))?;
    if first == 0 {
        return Err(WebmError::invalid(offset as u64, "no VINT marker bit"));
    }
    let length = first.leading_zeros() as usize + 1;
    if offset + length > bytes.len() {
        return Err(WebmError::invalid(offset as u64, "truncated VINT"));
    }
    Ok((first, length))
}

pub fn read_vint(bytes: &[u8], offset: usize) -> Result<Vint> {
    let (first, length) = vint_length(bytes, offset)?;
    let marker = 0x80u8 >> (length - 1);

    let mut value = u64::from(first & (marker - 1));
    for b in &bytes[offset + 1..offset + length] {
        value = (value << 8) | u64::from(*b);
    }

    let all_ones = (1u64 << (7 * length)) - 1;
    let value = if value == all_ones {
        Size::Unknown
    } else {
        Size::Known(value)
    };

    Ok(Vint { value, length })
}

/// Same length rule as [`read_vint`] but the marker bit stays in the value.
pub fn read_id(bytes: &[u8], offset: usize) -> Result<(u64, usize)> {
    let (_, length) = vint_length(bytes, offset)?;
    let id = bytes[offset..offset + length]
        .iter()
        .fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
    Ok((id, length))
}

fn window(bytes: &[u8], offset: usize, size: usize) -> Result<&[u8]> {
    offset
        .checked_add(size)
        .and_then(|end| bytes.get(offset..end))
        .ok_or_else(|| WebmError::invalid(offset as u64, "element data past end of data"))
}

/// Big-endian unsigned integer of 0 to 8 bytes.
pub fn read_uint(bytes: &[u8], offset: usize, size: usize) -> Result<u64> {
    if size > 8 {
        return Err(WebmError::invalid(offset as u64, "unsigned integer wider than 8 bytes"));
    }
    Ok(window(bytes, offset, size)?
        .iter()
        .fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
}

pub fn read_float(bytes: &[u8], offset: usize, size: usize) -> Result<f64> {
    match size {
        4 => {
            let mut raw = [0u8; 4];
            raw.copy_from_slice(window(bytes, offset, 4)?);
            Ok(f64::from(f32::from_be_bytes(raw)))
        }
        8 => {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(window(bytes, offset, 8)?);
            Ok(f64::from_be_bytes(raw))
        }
        _ => Err(WebmError::invalid(offset as u64, "float must be 4 or 8 bytes")),
    }
}

/// Lossy UTF-8, with the NUL padding some muxers leave at the end removed.
pub fn read_string(bytes: &[u8], offset: usize, size: usize) -> Result<String> {
    let raw = window(bytes, offset, size)?;
    let text = String::from_utf8_lossy(raw);
    Ok(text.trim_end_matches('\0').to_string())
}

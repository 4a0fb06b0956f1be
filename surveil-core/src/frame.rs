//! Data-block framing, FSPEC parsing, and field extent computation.
//!
//! Responsibilities:
//! - Split a burst into `category + length + records` data blocks
//! - Parse field-specification octets into the ordered list of present FRNs
//! - Determine how many bytes each present field occupies, per its format
//!
//! Nothing here reads past the end of the slice it is given: every length is
//! checked before it is consumed and reported as `TruncatedMessage`.

use tracing::warn;

use crate::catalogue::FieldFormat;
use crate::types::ProtocolError;

/// Bytes in a data-block header (category + 16-bit length).
pub const BLOCK_HEADER_LEN: usize = 3;

/// Largest data block the 16-bit length can describe, header included.
pub const MAX_BLOCK_LEN: usize = u16::MAX as usize;

/// Presence bits carried by one FSPEC octet.
const BITS_PER_OCTET: usize = 7;

// ---------------------------------------------------------------------------
// Data blocks
// ---------------------------------------------------------------------------

/// One data block: a category and the concatenated records that follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataBlock<'a> {
    pub category: u8,
    pub records: &'a [u8],
}

/// Iterator over the data blocks of a burst.
///
/// Yields an error and stops when a header is cut short or a declared length
/// does not fit, since the next block boundary is then unknown.
pub struct Blocks<'a> {
    rest: &'a [u8],
    done: bool,
}

/// Split a burst into data blocks.
pub fn blocks(burst: &[u8]) -> Blocks<'_> {
    Blocks {
        rest: burst,
        done: false,
    }
}

impl<'a> Iterator for Blocks<'a> {
    type Item = Result<DataBlock<'a>, ProtocolError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.rest.is_empty() {
            return None;
        }
        if self.rest.len() < BLOCK_HEADER_LEN {
            self.done = true;
            return Some(Err(ProtocolError::truncated(
                "block header",
                BLOCK_HEADER_LEN,
                self.rest.len(),
            )));
        }

        let category = self.rest[0];
        let declared = u16::from_be_bytes([self.rest[1], self.rest[2]]) as usize;
        if declared < BLOCK_HEADER_LEN || declared > self.rest.len() {
            self.done = true;
            return Some(Err(ProtocolError::InvalidBlockLength {
                declared,
                available: self.rest.len(),
            }));
        }

        let records = &self.rest[BLOCK_HEADER_LEN..declared];
        self.rest = &self.rest[declared..];
        Some(Ok(DataBlock { category, records }))
    }
}

// ---------------------------------------------------------------------------
// FSPEC
// ---------------------------------------------------------------------------

/// Parse a field specification starting at `data[0]`.
///
/// Returns the 1-based positions of set presence bits (most significant bit
/// of the first octet is position 1, FX bits are skipped) and the number of
/// octets consumed.
pub fn parse_fspec(data: &[u8], field: &'static str) -> Result<(Vec<usize>, usize), ProtocolError> {
    let mut present = Vec::new();
    let mut offset = 0;

    loop {
        let octet = *data
            .get(offset)
            .ok_or_else(|| ProtocolError::truncated(field, offset + 1, data.len()))?;

        for bit in 0..BITS_PER_OCTET {
            if octet & (0x80 >> bit) != 0 {
                present.push(offset * BITS_PER_OCTET + bit + 1);
            }
        }

        offset += 1;
        if octet & 0x01 == 0 {
            break;
        }
    }

    Ok((present, offset))
}

// ---------------------------------------------------------------------------
// Field extents
// ---------------------------------------------------------------------------

/// Byte length of a field of the given format starting at `data[0]`.
///
/// `field` names the field in any resulting error.
pub fn field_len(
    format: &FieldFormat,
    data: &[u8],
    field: &'static str,
) -> Result<usize, ProtocolError> {
    let len = match *format {
        FieldFormat::Fixed(n) => n,
        FieldFormat::Variable => {
            let mut n = 0;
            loop {
                let octet = *data
                    .get(n)
                    .ok_or_else(|| ProtocolError::truncated(field, n + 1, data.len()))?;
                n += 1;
                if octet & 0x01 == 0 {
                    break;
                }
            }
            n
        }
        FieldFormat::Repetitive(item_len) => {
            let count = *data
                .first()
                .ok_or_else(|| ProtocolError::truncated(field, 1, 0))?;
            1 + count as usize * item_len
        }
        FieldFormat::Explicit => {
            let declared = *data
                .first()
                .ok_or_else(|| ProtocolError::truncated(field, 1, 0))?;
            (declared as usize).max(1)
        }
        FieldFormat::Compound(subfields) => compound_len(subfields, data, field)?,
    };

    if len > data.len() {
        return Err(ProtocolError::truncated(field, len, data.len()));
    }
    Ok(len)
}

fn compound_len(
    subfields: &[FieldFormat],
    data: &[u8],
    field: &'static str,
) -> Result<usize, ProtocolError> {
    let (present, mut offset) = parse_fspec(data, field)?;

    for pos in present {
        let rest = &data[offset..];
        match pos.checked_sub(1).and_then(|i| subfields.get(i)) {
            Some(format) => offset += field_len(format, rest, field)?,
            None => {
                warn!(field, subfield = pos, "undefined compound subfield, skipping one byte");
                if rest.is_empty() {
                    return Err(ProtocolError::truncated(field, offset + 1, data.len()));
                }
                offset += 1;
            }
        }
    }

    Ok(offset)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Shared types, error enums, and small helpers for surveil-core.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Wire-level decode failures. All are recoverable by skipping the offending
/// record (or block).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("no field catalogue registered for category {0}")]
    UnsupportedCategory(u8),
    #[error("truncated message in {field}: need {needed} bytes, {available} available")]
    TruncatedMessage {
        field: &'static str,
        needed: usize,
        available: usize,
    },
    #[error("data block declares {declared} bytes but {available} are available")]
    InvalidBlockLength { declared: usize, available: usize },
    #[error("record has an empty field specification")]
    EmptyRecord,
    #[error("record of {len} bytes does not fit in a data block")]
    OversizedRecord { len: usize },
}

impl ProtocolError {
    pub(crate) fn truncated(field: &'static str, needed: usize, available: usize) -> Self {
        ProtocolError::TruncatedMessage {
            field,
            needed,
            available,
        }
    }
}

/// No stable track key could be derived from an update.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("no track number or transponder code from source {data_source}")]
    NoTransponderCode { data_source: DataSource },
}

/// Failures of externally driven conflict mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConflictError {
    #[error("unknown conflict {0}")]
    UnknownConflict(String),
    #[error("invalid status transition {from} -> {to}")]
    InvalidTransition { from: String, to: String },
}

/// Invalid or unreadable configuration. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("config serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// System Area Code / System Identification Code pair naming a data source.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct DataSource {
    pub sac: u8,
    pub sic: u8,
}

impl DataSource {
    pub fn new(sac: u8, sic: u8) -> Self {
        DataSource { sac, sic }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.sac, self.sic)
    }
}

/// Stable key of a track in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackKey(pub String);

impl TrackKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrackKey {
    fn from(s: &str) -> Self {
        TrackKey(s.to_string())
    }
}

/// Flight status as reported by the surveillance source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AircraftStatus {
    Airborne,
    OnGround,
    #[default]
    Unknown,
}

// ---------------------------------------------------------------------------
// Hex utilities
// ---------------------------------------------------------------------------

/// Decode a hex string into bytes. Case-insensitive, whitespace between
/// byte pairs is ignored.
pub fn hex_decode(hex: &str) -> Option<Vec<u8>> {
    let digits: Vec<u8> = hex.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
    if digits.len() % 2 != 0 {
        return None;
    }
    let mut bytes = Vec::with_capacity(digits.len() / 2);
    for chunk in digits.chunks(2) {
        let high = hex_digit(chunk[0])?;
        let low = hex_digit(chunk[1])?;
        bytes.push((high << 4) | low);
    }
    Some(bytes)
}

/// Encode bytes as uppercase hex string.
pub fn hex_encode(data: &[u8]) -> String {
    let mut s = String::with_capacity(data.len() * 2);
    for &b in data {
        s.push(HEX_CHARS[(b >> 4) as usize] as char);
        s.push(HEX_CHARS[(b & 0x0F) as usize] as char);
    }
    s
}

const HEX_CHARS: &[u8; 16] = b"0123456789ABCDEF";

fn hex_digit(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// 6-bit identification character set
// ---------------------------------------------------------------------------

/// Map a 6-bit identification code to its character. Codes outside
/// A-Z, 0-9 and space decode as space.
pub fn ident_char(code: u8) -> char {
    match code {
        1..=26 => (b'A' + code - 1) as char,
        48..=57 => (b'0' + code - 48) as char,
        _ => ' ',
    }
}

/// Inverse of [`ident_char`]. Unsupported characters encode as space.
pub fn ident_code(c: char) -> u8 {
    match c {
        'A'..='Z' => c as u8 - b'A' + 1,
        'a'..='z' => c.to_ascii_uppercase() as u8 - b'A' + 1,
        '0'..='9' => c as u8 - b'0' + 48,
        _ => 32,
    }
}

/// Current wall-clock time as Unix seconds.
pub fn unix_now() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

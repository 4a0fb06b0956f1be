//! Record and data-block encoding.
//!
//! The inverse of [`crate::decode`] at the framing level: field payloads are
//! taken as opaque bytes and emitted behind a freshly computed FSPEC. The value
//! encoders below produce payloads in the same scaling the decoders read.

use std::collections::BTreeMap;

use crate::decode::SurveillanceRecord;
use crate::frame::{BLOCK_HEADER_LEN, MAX_BLOCK_LEN};
use crate::types::{ident_code, DataSource, ProtocolError};

/// Build an FSPEC announcing the given FRNs.
///
/// Always at least one octet; FX is set on every octet but the last.
pub fn encode_fspec(frns: &[u8]) -> Vec<u8> {
    let max = frns.iter().copied().max().unwrap_or(0) as usize;
    let octets = max.div_ceil(7).max(1);
    let mut fspec = vec![0u8; octets];

    for &frn in frns {
        if frn == 0 {
            continue;
        }
        let pos = frn as usize - 1;
        fspec[pos / 7] |= 0x80 >> (pos % 7);
    }
    for octet in fspec.iter_mut().take(octets - 1) {
        *octet |= 0x01;
    }
    fspec
}

/// Re-emit a decoded record: FSPEC followed by each field's raw payload.
///
/// Fields skipped during decoding (spare presence bits) are not re-emitted.
pub fn encode_record(record: &SurveillanceRecord) -> Vec<u8> {
    let frns: Vec<u8> = record.fields.iter().map(|f| f.frn).collect();
    let mut out = encode_fspec(&frns);
    for field in &record.fields {
        out.extend_from_slice(&field.raw);
    }
    out
}

/// Wrap records into data blocks of one category.
///
/// Records are packed in order; a new block is started whenever the next
/// record would push the current one past [`MAX_BLOCK_LEN`]. A single record
/// too large for any block is an error.
pub fn block(category: u8, records: &[Vec<u8>]) -> Result<Vec<u8>, ProtocolError> {
    let max_body = MAX_BLOCK_LEN - BLOCK_HEADER_LEN;
    if let Some(r) = records.iter().find(|r| r.len() > max_body) {
        return Err(ProtocolError::OversizedRecord { len: r.len() });
    }

    let mut out = Vec::new();
    let mut chunk: Vec<&[u8]> = Vec::new();
    let mut body = 0;
    for r in records {
        if body + r.len() > max_body {
            push_block(&mut out, category, &chunk, body);
            chunk.clear();
            body = 0;
        }
        chunk.push(r.as_slice());
        body += r.len();
    }
    if !chunk.is_empty() || out.is_empty() {
        push_block(&mut out, category, &chunk, body);
    }
    Ok(out)
}

fn push_block(out: &mut Vec<u8>, category: u8, records: &[&[u8]], body: usize) {
    // body <= MAX_BLOCK_LEN - BLOCK_HEADER_LEN, checked by the caller
    let len = (BLOCK_HEADER_LEN + body) as u16;
    out.push(category);
    out.extend_from_slice(&len.to_be_bytes());
    for r in records {
        out.extend_from_slice(r);
    }
}

/// Assembles one record from (FRN, payload) pairs in any order.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    category: u8,
    fields: BTreeMap<u8, Vec<u8>>,
}

impl RecordBuilder {
    pub fn new(category: u8) -> Self {
        RecordBuilder {
            category,
            fields: BTreeMap::new(),
        }
    }

    pub fn category(&self) -> u8 {
        self.category
    }

    /// Set a field's payload. A repeated FRN replaces the earlier payload.
    pub fn field(mut self, frn: u8, payload: Vec<u8>) -> Self {
        self.fields.insert(frn, payload);
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let frns: Vec<u8> = self.fields.keys().copied().collect();
        let mut out = encode_fspec(&frns);
        for payload in self.fields.values() {
            out.extend_from_slice(payload);
        }
        out
    }

    /// The record wrapped in its own data block.
    pub fn build_block(&self) -> Result<Vec<u8>, ProtocolError> {
        block(self.category, &[self.build()])
    }
}

// ---------------------------------------------------------------------------
// Value encoders
// ---------------------------------------------------------------------------

pub fn data_source(ds: DataSource) -> Vec<u8> {
    vec![ds.sac, ds.sic]
}

fn u24(v: u32) -> Vec<u8> {
    v.to_be_bytes()[1..].to_vec()
}

pub fn time_of_day(seconds: f64) -> Vec<u8> {
    u24(((seconds * 128.0).round() as u32) & 0xFF_FFFF)
}

pub fn polar_position(range_nm: f64, azimuth_deg: f64) -> Vec<u8> {
    let rho = (range_nm * 256.0).round() as u16;
    let theta = (azimuth_deg.rem_euclid(360.0) * 65536.0 / 360.0).round() as u32 as u16;
    [rho.to_be_bytes(), theta.to_be_bytes()].concat()
}

pub fn cartesian_position(x_nm: f64, y_nm: f64) -> Vec<u8> {
    let x = (x_nm * 128.0).round() as i16;
    let y = (y_nm * 128.0).round() as i16;
    [x.to_be_bytes(), y.to_be_bytes()].concat()
}

pub fn wgs84(lat: f64, lon: f64) -> Vec<u8> {
    let scale = (1u32 << 23) as f64 / 180.0;
    let lat = ((lat * scale).round() as i32 as u32) & 0xFF_FFFF;
    let lon = ((lon * scale).round() as i32 as u32) & 0xFF_FFFF;
    [u24(lat), u24(lon)].concat()
}

pub fn wgs84_high_res(lat: f64, lon: f64) -> Vec<u8> {
    let scale = (1u32 << 30) as f64 / 180.0;
    let lat = (lat * scale).round() as i32;
    let lon = (lon * scale).round() as i32;
    [lat.to_be_bytes(), lon.to_be_bytes()].concat()
}

/// Validated, not garbled Mode-3/A code. `code` is the numeric value of the
/// octal digits, e.g. `0o7700`.
pub fn mode3a(code: u16) -> Vec<u8> {
    (code & 0x0FFF).to_be_bytes().to_vec()
}

/// CAT048 flight level: 14-bit signed, V and G clear.
pub fn flight_level(fl: f64) -> Vec<u8> {
    let raw = ((fl * 4.0).round() as i32 as u32 & 0x3FFF) as u16;
    raw.to_be_bytes().to_vec()
}

/// CAT021 flight level: 16-bit signed.
pub fn adsb_flight_level(fl: f64) -> Vec<u8> {
    ((fl * 4.0).round() as i16).to_be_bytes().to_vec()
}

pub fn geometric_height(feet: f64) -> Vec<u8> {
    ((feet / 6.25).round() as i16).to_be_bytes().to_vec()
}

pub fn address(addr: u32) -> Vec<u8> {
    u24(addr & 0xFF_FFFF)
}

/// Eight 6-bit characters, space-padded.
pub fn identification(callsign: &str) -> Vec<u8> {
    let mut bits: u64 = 0;
    let mut chars = callsign.chars();
    for _ in 0..8 {
        let code = chars.next().map(ident_code).unwrap_or(32);
        bits = (bits << 6) | code as u64;
    }
    bits.to_be_bytes()[2..].to_vec()
}

pub fn track_number(n: u16) -> Vec<u8> {
    (n & 0x0FFF).to_be_bytes().to_vec()
}

fn speed_units(speed_kt: f64) -> u16 {
    (speed_kt / 3600.0 * 16384.0).round() as u16
}

fn angle_units(deg: f64) -> u16 {
    (deg.rem_euclid(360.0) * 65536.0 / 360.0).round() as u32 as u16
}

/// CAT048 I048/200.
pub fn radar_track_velocity(speed_kt: f64, heading_deg: f64) -> Vec<u8> {
    [speed_units(speed_kt).to_be_bytes(), angle_units(heading_deg).to_be_bytes()].concat()
}

/// CAT021 I021/160, RE bit clear.
pub fn ground_vector(speed_kt: f64, track_deg: f64) -> Vec<u8> {
    let speed = speed_units(speed_kt) & 0x7FFF;
    [speed.to_be_bytes(), angle_units(track_deg).to_be_bytes()].concat()
}

pub fn vertical_rate(feet_per_min: f64) -> Vec<u8> {
    let raw = ((feet_per_min / 6.25).round() as i32 as u32 & 0x7FFF) as u16;
    raw.to_be_bytes().to_vec()
}

/// CAT021 target report descriptor with the first extension carrying GBS.
pub fn adsb_descriptor(on_ground: bool) -> Vec<u8> {
    vec![0x01, if on_ground { 0x40 } else { 0x00 }]
}

/// CAT048 I048/230 with the given STAT value (0 airborne, 1 on ground).
pub fn flight_status(stat: u8) -> Vec<u8> {
    vec![(stat & 0x07) << 2, 0x00]
}

// ---------------------------------------------------------------------------
// High-level target reports
// ---------------------------------------------------------------------------

/// A target report described by values rather than bytes. Produces CAT021 or
/// CAT048 records carrying whichever items are set.
#[derive(Debug, Clone, Default)]
pub struct TargetReport {
    pub source: DataSource,
    pub time_of_day: Option<f64>,
    pub track_number: Option<u16>,
    pub address: Option<u32>,
    pub mode3a: Option<u16>,
    pub callsign: Option<String>,
    /// Geodetic position (CAT021).
    pub position: Option<(f64, f64)>,
    /// Range and azimuth from the radar (CAT048).
    pub polar: Option<(f64, f64)>,
    pub flight_level: Option<f64>,
    /// Ground speed (kt) and track angle (deg).
    pub ground_vector: Option<(f64, f64)>,
    pub on_ground: Option<bool>,
}

impl TargetReport {
    pub fn to_cat021(&self) -> Vec<u8> {
        let mut b = RecordBuilder::new(21).field(1, data_source(self.source));
        if let Some(g) = self.on_ground {
            b = b.field(2, adsb_descriptor(g));
        }
        if let Some(n) = self.track_number {
            b = b.field(3, track_number(n));
        }
        if let Some(t) = self.time_of_day {
            b = b.field(5, time_of_day(t));
        }
        if let Some((lat, lon)) = self.position {
            b = b.field(7, wgs84_high_res(lat, lon));
        }
        if let Some(a) = self.address {
            b = b.field(11, address(a));
        }
        if let Some(code) = self.mode3a {
            b = b.field(19, mode3a(code));
        }
        if let Some(fl) = self.flight_level {
            b = b.field(21, adsb_flight_level(fl));
        }
        if let Some((speed, track)) = self.ground_vector {
            b = b.field(26, ground_vector(speed, track));
        }
        if let Some(cs) = &self.callsign {
            b = b.field(29, identification(cs));
        }
        b.build()
    }

    pub fn to_cat048(&self) -> Vec<u8> {
        let mut b = RecordBuilder::new(48).field(1, data_source(self.source));
        if let Some(t) = self.time_of_day {
            b = b.field(2, time_of_day(t));
        }
        b = b.field(3, vec![0xA0]);
        if let Some((rho, theta)) = self.polar {
            b = b.field(4, polar_position(rho, theta));
        }
        if let Some(code) = self.mode3a {
            b = b.field(5, mode3a(code));
        }
        if let Some(fl) = self.flight_level {
            b = b.field(6, flight_level(fl));
        }
        if let Some(a) = self.address {
            b = b.field(8, address(a));
        }
        if let Some(cs) = &self.callsign {
            b = b.field(9, identification(cs));
        }
        if let Some(n) = self.track_number {
            b = b.field(11, track_number(n));
        }
        if let Some((speed, heading)) = self.ground_vector {
            b = b.field(13, radar_track_velocity(speed, heading));
        }
        if let Some(g) = self.on_ground {
            b = b.field(21, flight_status(if g { 1 } else { 0 }));
        }
        b.build()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{decode, decode_burst, FieldValue};

    #[test]
    fn test_fspec_layout() {
        assert_eq!(encode_fspec(&[]), vec![0x00]);
        assert_eq!(encode_fspec(&[1, 3]), vec![0b1010_0000]);
        assert_eq!(encode_fspec(&[2, 8, 14]), vec![0b0100_0001, 0b1000_0010]);
        assert_eq!(encode_fspec(&[7]), vec![0b0000_0010]);
        assert_eq!(encode_fspec(&[8]), vec![0x01, 0x80]);
    }

    #[test]
    fn test_builder_orders_by_frn() {
        let a = RecordBuilder::new(48)
            .field(5, vec![0x0F, 0xC0])
            .field(1, vec![1, 2])
            .build();
        let b = RecordBuilder::new(48)
            .field(1, vec![1, 2])
            .field(5, vec![0x0F, 0xC0])
            .build();
        assert_eq!(a, b);
        assert_eq!(a, vec![0b1000_1000, 1, 2, 0x0F, 0xC0]);
    }

    #[test]
    fn test_block_header() {
        let blk = block(48, &[vec![0x80, 1, 2], vec![0x80, 3, 4]]).unwrap();
        assert_eq!(&blk[..3], &[48, 0, 9]);
        assert_eq!(blk.len(), 9);
    }

    #[test]
    fn test_block_splits_at_length_limit() {
        // Three 30000-byte records: two fit in the first block, one in a second
        let rec = vec![0u8; 30_000];
        let blk = block(21, &[rec.clone(), rec.clone(), rec]).unwrap();
        assert_eq!(blk.len(), 90_000 + 2 * BLOCK_HEADER_LEN);
        assert_eq!(&blk[..3], &[21, 0xEA, 0x63]); // 60003
        assert_eq!(&blk[60_003..60_006], &[21, 0x75, 0x33]); // 30003

        let lens: Vec<usize> = crate::frame::blocks(&blk)
            .map(|b| b.unwrap().records.len())
            .collect();
        assert_eq!(lens, vec![60_000, 30_000]);
    }

    #[test]
    fn test_block_rejects_oversized_record() {
        let rec = vec![0u8; MAX_BLOCK_LEN];
        assert_eq!(
            block(48, &[rec]),
            Err(ProtocolError::OversizedRecord { len: MAX_BLOCK_LEN })
        );
        // Largest record that still fits
        let rec = vec![0u8; MAX_BLOCK_LEN - BLOCK_HEADER_LEN];
        assert_eq!(block(48, &[rec]).unwrap().len(), MAX_BLOCK_LEN);
    }

    #[test]
    fn test_reencode_reproduces_record() {
        let report = TargetReport {
            source: DataSource::new(1, 2),
            time_of_day: Some(3600.0),
            track_number: Some(42),
            address: Some(0xABCDEF),
            callsign: Some("UAL9".into()),
            position: Some((51.47, -0.4543)),
            flight_level: Some(120.0),
            ground_vector: Some((250.0, 270.0)),
            on_ground: Some(false),
            ..Default::default()
        };
        let bytes = report.to_cat021();
        let rec = decode(21, &bytes, 0.0).unwrap();
        assert_eq!(encode_record(&rec), bytes);
    }

    #[test]
    fn test_target_report_cat048_values() {
        let report = TargetReport {
            source: DataSource::new(9, 1),
            polar: Some((25.5, 180.0)),
            mode3a: Some(0o1200),
            flight_level: Some(80.0),
            track_number: Some(17),
            ground_vector: Some((300.0, 45.0)),
            on_ground: Some(true),
            ..Default::default()
        };
        let rec = decode(48, &report.to_cat048(), 0.0).unwrap();
        assert_eq!(
            rec.get("I048/040"),
            Some(&FieldValue::PolarPosition {
                range_nm: 25.5,
                azimuth_deg: 180.0
            })
        );
        match rec.get("I048/200") {
            Some(FieldValue::GroundVector { speed_kt, track_deg }) => {
                assert!((speed_kt - 300.0).abs() < 0.5);
                assert!((track_deg - 45.0).abs() < 0.01);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            rec.get("I048/230"),
            Some(FieldValue::FlightStatus {
                status: crate::types::AircraftStatus::OnGround
            })
        ));
    }

    #[test]
    fn test_build_block_decodes() {
        let blk = RecordBuilder::new(21)
            .field(1, data_source(DataSource::new(3, 4)))
            .field(29, identification("ABC"))
            .build_block()
            .unwrap();
        let out = decode_burst(&blk, 0.0);
        assert!(out.errors.is_empty());
        assert_eq!(out.records.len(), 1);
        assert_eq!(out.records[0].source, Some(DataSource::new(3, 4)));
    }

    #[test]
    fn test_negative_encoders() {
        assert_eq!(vertical_rate(-100.0), vec![0x7F, 0xF0]);
        assert_eq!(flight_level(-1.0), vec![0x3F, 0xFC]);
        assert_eq!(geometric_height(-100.0), vec![0xFF, 0xF0]);
    }
}

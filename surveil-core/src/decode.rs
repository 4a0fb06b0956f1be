//! Decode surveillance records into typed field values.
//!
//! Each field decoder is a pure transform from the field's bytes (exactly the
//! length the catalogue declares) to a [`FieldValue`]:
//! - Data source (SAC/SIC) and time of day
//! - Target report descriptors for radar (CAT048) and ADS-B (CAT021)
//! - Polar, cartesian and WGS-84 positions
//! - Mode-3/A code, flight level, geometric height
//! - Aircraft address and 6-bit packed identification
//! - Track number, ground vectors, vertical rate
//! - Flight status from the communications/ACAS capability field

use serde::Serialize;
use tracing::{debug, warn};

use crate::catalogue::{catalogue, Catalogue, FieldKind};
use crate::frame::{self, field_len, parse_fspec};
use crate::types::*;

/// Seconds per time-of-day LSB.
const TIME_LSB: f64 = 1.0 / 128.0;

/// NM/s per speed LSB (2^-14).
const SPEED_LSB_NM_S: f64 = 1.0 / 16384.0;

/// Degrees per 16-bit angle LSB.
const ANGLE_LSB_16: f64 = 360.0 / 65536.0;

// ---------------------------------------------------------------------------
// Decoded values
// ---------------------------------------------------------------------------

/// Target report descriptor flags common to both categories.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetDescriptor {
    /// Report/address type from the first octet's top three bits.
    pub report_type: u8,
    pub simulated: bool,
    pub test: bool,
    pub spi: bool,
    /// Ground bit, only carried by ADS-B reports.
    pub on_ground: Option<bool>,
    pub octets: Vec<u8>,
}

/// Mode-3/A transponder code with its validity flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Mode3A {
    /// 12-bit code, four octal digits.
    pub code: u16,
    pub validated: bool,
    pub garbled: bool,
}

impl Mode3A {
    /// Four-digit octal rendering, e.g. `"7700"`.
    pub fn octal(&self) -> String {
        format!("{:04o}", self.code)
    }
}

/// A decoded field value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldValue {
    DataSource(DataSource),
    /// Seconds since midnight UTC.
    TimeOfDay {
        seconds: f64,
    },
    Descriptor(TargetDescriptor),
    PolarPosition {
        range_nm: f64,
        azimuth_deg: f64,
    },
    CartesianPosition {
        x_nm: f64,
        y_nm: f64,
    },
    Wgs84Position {
        lat: f64,
        lon: f64,
    },
    Mode3A(Mode3A),
    FlightLevel {
        flight_level: f64,
        validated: bool,
        garbled: bool,
    },
    GeometricHeight {
        feet: f64,
    },
    AircraftAddress {
        address: u32,
    },
    Identification {
        callsign: String,
    },
    TrackNumber {
        number: u16,
    },
    GroundVector {
        speed_kt: f64,
        track_deg: f64,
    },
    VerticalRate {
        feet_per_min: f64,
    },
    FlightStatus {
        status: AircraftStatus,
    },
    /// Field without a typed decoder; the bytes live in [`DecodedField::raw`].
    Opaque,
}

/// One present field of a record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedField {
    pub frn: u8,
    pub id: &'static str,
    #[serde(skip)]
    pub raw: Vec<u8>,
    pub value: FieldValue,
}

/// One decoded surveillance record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SurveillanceRecord {
    pub category: u8,
    pub source: Option<DataSource>,
    /// Arrival time (Unix seconds).
    pub timestamp: f64,
    /// Present fields, in catalogue order.
    pub fields: Vec<DecodedField>,
}

impl SurveillanceRecord {
    /// Value of a field by identifier, e.g. `"I048/040"`.
    pub fn get(&self, id: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|f| f.id == id).map(|f| &f.value)
    }

    /// Iterate values in catalogue order.
    pub fn values(&self) -> impl Iterator<Item = &FieldValue> {
        self.fields.iter().map(|f| &f.value)
    }

    pub fn field_ids(&self) -> Vec<&'static str> {
        self.fields.iter().map(|f| f.id).collect()
    }
}

// ---------------------------------------------------------------------------
// Bit helpers
// ---------------------------------------------------------------------------

fn be_u16(b: &[u8]) -> u16 {
    u16::from_be_bytes([b[0], b[1]])
}

fn be_u24(b: &[u8]) -> u32 {
    ((b[0] as u32) << 16) | ((b[1] as u32) << 8) | (b[2] as u32)
}

fn be_i24(b: &[u8]) -> i32 {
    sign_extend(be_u24(b), 24)
}

fn be_i32(b: &[u8]) -> i32 {
    i32::from_be_bytes([b[0], b[1], b[2], b[3]])
}

/// Sign-extend the low `bits` bits of `value`.
fn sign_extend(value: u32, bits: u32) -> i32 {
    let shift = 32 - bits;
    ((value << shift) as i32) >> shift
}

// ---------------------------------------------------------------------------
// Field decoders
// ---------------------------------------------------------------------------

pub fn decode_data_source(b: &[u8]) -> DataSource {
    DataSource::new(b[0], b[1])
}

/// Time of day, LSB 1/128 s.
pub fn decode_time_of_day(b: &[u8]) -> f64 {
    be_u24(b) as f64 * TIME_LSB
}

/// CAT048 I048/020: TYP SIM RDP SPI RAB FX, then TST ERR XPP ME MI FOE/FRI FX.
pub fn decode_radar_descriptor(b: &[u8]) -> TargetDescriptor {
    TargetDescriptor {
        report_type: b[0] >> 5,
        simulated: b[0] & 0x10 != 0,
        test: b.get(1).is_some_and(|o| o & 0x80 != 0),
        spi: b[0] & 0x04 != 0,
        on_ground: None,
        octets: b.to_vec(),
    }
}

/// CAT021 I021/040: ATP ARC RC RAB FX, then DCR GBS SIM TST SAA CL FX.
pub fn decode_adsb_descriptor(b: &[u8]) -> TargetDescriptor {
    let ext = b.get(1).copied();
    TargetDescriptor {
        report_type: b[0] >> 5,
        simulated: ext.is_some_and(|o| o & 0x20 != 0),
        test: ext.is_some_and(|o| o & 0x10 != 0),
        spi: false,
        on_ground: ext.map(|o| o & 0x40 != 0),
        octets: b.to_vec(),
    }
}

/// I048/040: range LSB 1/256 NM, azimuth LSB 360/2^16 degrees.
pub fn decode_polar_position(b: &[u8]) -> (f64, f64) {
    let range_nm = be_u16(&b[0..2]) as f64 / 256.0;
    let azimuth_deg = be_u16(&b[2..4]) as f64 * ANGLE_LSB_16;
    (range_nm, azimuth_deg)
}

/// I048/042: signed X/Y, LSB 1/128 NM.
pub fn decode_cartesian_position(b: &[u8]) -> (f64, f64) {
    let x = be_u16(&b[0..2]) as i16 as f64 / 128.0;
    let y = be_u16(&b[2..4]) as i16 as f64 / 128.0;
    (x, y)
}

/// I021/130: signed 24-bit lat/lon, LSB 180/2^23 degrees.
pub fn decode_wgs84(b: &[u8]) -> (f64, f64) {
    let lsb = 180.0 / (1u32 << 23) as f64;
    (be_i24(&b[0..3]) as f64 * lsb, be_i24(&b[3..6]) as f64 * lsb)
}

/// I021/131: signed 32-bit lat/lon, LSB 180/2^30 degrees.
pub fn decode_wgs84_high_res(b: &[u8]) -> (f64, f64) {
    let lsb = 180.0 / (1u32 << 30) as f64;
    (be_i32(&b[0..4]) as f64 * lsb, be_i32(&b[4..8]) as f64 * lsb)
}

/// Mode-3/A: V G L spare, then 12-bit octal code.
pub fn decode_mode3a(b: &[u8]) -> Mode3A {
    let raw = be_u16(b);
    Mode3A {
        code: raw & 0x0FFF,
        validated: raw & 0x8000 == 0,
        garbled: raw & 0x4000 != 0,
    }
}

/// I048/090: V G, then 14-bit signed flight level, LSB 1/4 FL.
pub fn decode_radar_flight_level(b: &[u8]) -> (f64, bool, bool) {
    let raw = be_u16(b);
    let fl = sign_extend((raw & 0x3FFF) as u32, 14) as f64 / 4.0;
    (fl, raw & 0x8000 == 0, raw & 0x4000 != 0)
}

/// I021/145: 16-bit signed flight level, LSB 1/4 FL.
pub fn decode_flight_level(b: &[u8]) -> f64 {
    be_u16(b) as i16 as f64 / 4.0
}

/// I021/140: signed geometric height, LSB 6.25 ft.
pub fn decode_geometric_height(b: &[u8]) -> f64 {
    be_u16(b) as i16 as f64 * 6.25
}

pub fn decode_address(b: &[u8]) -> u32 {
    be_u24(b)
}

/// Eight 6-bit characters packed into 48 bits. Trailing spaces are trimmed.
pub fn decode_identification(b: &[u8]) -> String {
    let bits = u64::from_be_bytes([0, 0, b[0], b[1], b[2], b[3], b[4], b[5]]);
    let mut callsign = String::with_capacity(8);
    for i in 0..8 {
        let code = ((bits >> (42 - i * 6)) & 0x3F) as u8;
        callsign.push(ident_char(code));
    }
    callsign.trim_end().to_string()
}

/// Track number: 4 spare bits, 12-bit number.
pub fn decode_track_number(b: &[u8]) -> u16 {
    be_u16(b) & 0x0FFF
}

/// I048/200: ground speed LSB 2^-14 NM/s, heading LSB 360/2^16.
pub fn decode_radar_track_velocity(b: &[u8]) -> (f64, f64) {
    let speed_kt = be_u16(&b[0..2]) as f64 * SPEED_LSB_NM_S * 3600.0;
    let heading = be_u16(&b[2..4]) as f64 * ANGLE_LSB_16;
    (speed_kt, heading)
}

/// I021/160: RE bit + 15-bit ground speed, then 16-bit track angle.
pub fn decode_ground_vector(b: &[u8]) -> (f64, f64) {
    let speed_kt = (be_u16(&b[0..2]) & 0x7FFF) as f64 * SPEED_LSB_NM_S * 3600.0;
    let track = be_u16(&b[2..4]) as f64 * ANGLE_LSB_16;
    (speed_kt, track)
}

/// I021/155 and I021/157: RE bit + 15-bit signed rate, LSB 6.25 ft/min.
pub fn decode_vertical_rate(b: &[u8]) -> f64 {
    sign_extend((be_u16(b) & 0x7FFF) as u32, 15) as f64 * 6.25
}

/// I048/230: COM(3) STAT(3) ... Only the flight status is kept.
pub fn decode_flight_status(b: &[u8]) -> AircraftStatus {
    match (b[0] >> 2) & 0x07 {
        0 | 2 => AircraftStatus::Airborne,
        1 | 3 => AircraftStatus::OnGround,
        _ => AircraftStatus::Unknown,
    }
}

/// Apply the typed decoder for `kind` to a field's bytes.
///
/// A length that does not match the decoder's expectation yields `Opaque`
/// rather than a panic.
pub fn decode_value(kind: FieldKind, b: &[u8]) -> FieldValue {
    if let Some(expected) = kind.expected_len() {
        if b.len() != expected {
            return FieldValue::Opaque;
        }
    }
    if b.is_empty() {
        return FieldValue::Opaque;
    }

    match kind {
        FieldKind::DataSource => FieldValue::DataSource(decode_data_source(b)),
        FieldKind::TimeOfDay => FieldValue::TimeOfDay {
            seconds: decode_time_of_day(b),
        },
        FieldKind::RadarDescriptor => FieldValue::Descriptor(decode_radar_descriptor(b)),
        FieldKind::AdsbDescriptor => FieldValue::Descriptor(decode_adsb_descriptor(b)),
        FieldKind::PolarPosition => {
            let (range_nm, azimuth_deg) = decode_polar_position(b);
            FieldValue::PolarPosition {
                range_nm,
                azimuth_deg,
            }
        }
        FieldKind::CartesianPosition => {
            let (x_nm, y_nm) = decode_cartesian_position(b);
            FieldValue::CartesianPosition { x_nm, y_nm }
        }
        FieldKind::Wgs84Position => {
            let (lat, lon) = decode_wgs84(b);
            FieldValue::Wgs84Position { lat, lon }
        }
        FieldKind::Wgs84PositionHighRes => {
            let (lat, lon) = decode_wgs84_high_res(b);
            FieldValue::Wgs84Position { lat, lon }
        }
        FieldKind::Mode3A => FieldValue::Mode3A(decode_mode3a(b)),
        FieldKind::RadarFlightLevel => {
            let (flight_level, validated, garbled) = decode_radar_flight_level(b);
            FieldValue::FlightLevel {
                flight_level,
                validated,
                garbled,
            }
        }
        FieldKind::FlightLevel => FieldValue::FlightLevel {
            flight_level: decode_flight_level(b),
            validated: true,
            garbled: false,
        },
        FieldKind::GeometricHeight => FieldValue::GeometricHeight {
            feet: decode_geometric_height(b),
        },
        FieldKind::AircraftAddress => FieldValue::AircraftAddress {
            address: decode_address(b),
        },
        FieldKind::Identification => FieldValue::Identification {
            callsign: decode_identification(b),
        },
        FieldKind::TrackNumber => FieldValue::TrackNumber {
            number: decode_track_number(b),
        },
        FieldKind::RadarTrackVelocity => {
            let (speed_kt, track_deg) = decode_radar_track_velocity(b);
            FieldValue::GroundVector {
                speed_kt,
                track_deg,
            }
        }
        FieldKind::GroundVector => {
            let (speed_kt, track_deg) = decode_ground_vector(b);
            FieldValue::GroundVector {
                speed_kt,
                track_deg,
            }
        }
        FieldKind::VerticalRate => FieldValue::VerticalRate {
            feet_per_min: decode_vertical_rate(b),
        },
        FieldKind::CommsCapability => FieldValue::FlightStatus {
            status: decode_flight_status(b),
        },
        FieldKind::Opaque => FieldValue::Opaque,
    }
}

// ---------------------------------------------------------------------------
// Record decoding
// ---------------------------------------------------------------------------

/// Decode one record of `category` from the start of `data`.
pub fn decode(category: u8, data: &[u8], timestamp: f64) -> Result<SurveillanceRecord, ProtocolError> {
    let cat = catalogue(category).ok_or(ProtocolError::UnsupportedCategory(category))?;
    decode_record(cat, data, timestamp).map(|(record, _)| record)
}

/// Decode one record and report how many bytes it occupied.
///
/// A presence bit with no catalogue entry is logged and skipped by advancing
/// one byte; the rest of the record is still decoded.
pub fn decode_record(
    cat: &Catalogue,
    data: &[u8],
    timestamp: f64,
) -> Result<(SurveillanceRecord, usize), ProtocolError> {
    let (present, mut offset) = parse_fspec(data, "FSPEC")?;
    if present.is_empty() {
        return Err(ProtocolError::EmptyRecord);
    }

    let mut fields = Vec::with_capacity(present.len());
    let mut source = None;

    for pos in present {
        let rest = &data[offset..];
        let spec = match u8::try_from(pos).ok().and_then(|frn| cat.field(frn)) {
            Some(spec) => spec,
            None => {
                warn!(
                    category = cat.category,
                    frn = pos,
                    "presence bit has no catalogue entry, skipping one byte"
                );
                if rest.is_empty() {
                    return Err(ProtocolError::truncated("spare field", 1, 0));
                }
                offset += 1;
                continue;
            }
        };

        let len = field_len(&spec.format, rest, spec.id)?;
        let raw = rest[..len].to_vec();
        let value = decode_value(spec.kind, &raw);
        if let FieldValue::DataSource(ds) = &value {
            source = Some(*ds);
        }
        fields.push(DecodedField {
            frn: spec.frn,
            id: spec.id,
            raw,
            value,
        });
        offset += len;
    }

    Ok((
        SurveillanceRecord {
            category: cat.category,
            source,
            timestamp,
            fields,
        },
        offset,
    ))
}

/// Outcome of decoding a whole burst.
#[derive(Debug, Default)]
pub struct BurstDecode {
    pub records: Vec<SurveillanceRecord>,
    pub errors: Vec<ProtocolError>,
}

/// Decode every data block of a burst.
///
/// Failures are isolated: an unsupported category skips its block, a
/// malformed record ends its own block (its end is unknown), and later
/// blocks are still decoded.
pub fn decode_burst(burst: &[u8], timestamp: f64) -> BurstDecode {
    let mut out = BurstDecode::default();

    for block in frame::blocks(burst) {
        let block = match block {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %e, "unreadable data block, dropping rest of burst");
                out.errors.push(e);
                break;
            }
        };

        let cat = match catalogue(block.category) {
            Some(c) => c,
            None => {
                warn!(category = block.category, "unsupported category, skipping block");
                out.errors.push(ProtocolError::UnsupportedCategory(block.category));
                continue;
            }
        };

        let mut offset = 0;
        while offset < block.records.len() {
            match decode_record(cat, &block.records[offset..], timestamp) {
                Ok((record, used)) => {
                    offset += used;
                    out.records.push(record);
                }
                Err(e) => {
                    warn!(category = cat.category, offset, error = %e, "dropping malformed record");
                    out.errors.push(e);
                    break;
                }
            }
        }
    }

    debug!(
        records = out.records.len(),
        errors = out.errors.len(),
        "decoded burst"
    );
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

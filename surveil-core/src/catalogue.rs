//! Per-category field catalogues.
//!
//! A catalogue lists, in field-reference-number (FRN) order, which field each
//! FSPEC presence bit announces, how many bytes that field occupies on the
//! wire, and which value decoder applies. Catalogues are static tables
//! resolved by category number at decode time.

/// How a field's on-wire length is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldFormat {
    /// Constant byte length.
    Fixed(usize),
    /// Octets chained by a continuation bit in each octet's LSB.
    Variable,
    /// One count byte followed by `count` items of the given length.
    Repetitive(usize),
    /// Nested FSPEC announcing the listed sub-fields.
    Compound(&'static [FieldFormat]),
    /// First byte is the total length, including itself.
    Explicit,
}

/// Which typed decoder turns the field bytes into a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    DataSource,
    TimeOfDay,
    RadarDescriptor,
    AdsbDescriptor,
    PolarPosition,
    CartesianPosition,
    Wgs84Position,
    Wgs84PositionHighRes,
    Mode3A,
    RadarFlightLevel,
    FlightLevel,
    GeometricHeight,
    AircraftAddress,
    Identification,
    TrackNumber,
    RadarTrackVelocity,
    GroundVector,
    VerticalRate,
    CommsCapability,
    Opaque,
}

impl FieldKind {
    /// Byte length the typed decoder expects, if it is fixed.
    pub fn expected_len(&self) -> Option<usize> {
        match self {
            FieldKind::DataSource => Some(2),
            FieldKind::TimeOfDay => Some(3),
            FieldKind::PolarPosition | FieldKind::CartesianPosition => Some(4),
            FieldKind::Wgs84Position => Some(6),
            FieldKind::Wgs84PositionHighRes => Some(8),
            FieldKind::Mode3A
            | FieldKind::RadarFlightLevel
            | FieldKind::FlightLevel
            | FieldKind::GeometricHeight
            | FieldKind::TrackNumber
            | FieldKind::VerticalRate
            | FieldKind::CommsCapability => Some(2),
            FieldKind::AircraftAddress => Some(3),
            FieldKind::Identification => Some(6),
            FieldKind::RadarTrackVelocity | FieldKind::GroundVector => Some(4),
            FieldKind::RadarDescriptor | FieldKind::AdsbDescriptor | FieldKind::Opaque => None,
        }
    }
}

/// One catalogue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub frn: u8,
    pub id: &'static str,
    pub name: &'static str,
    pub format: FieldFormat,
    pub kind: FieldKind,
}

const fn field(
    frn: u8,
    id: &'static str,
    name: &'static str,
    format: FieldFormat,
    kind: FieldKind,
) -> FieldSpec {
    FieldSpec {
        frn,
        id,
        name,
        format,
        kind,
    }
}

/// Ordered field catalogue for one category.
#[derive(Debug)]
pub struct Catalogue {
    pub category: u8,
    pub name: &'static str,
    pub fields: &'static [FieldSpec],
}

impl Catalogue {
    /// Entry for a presence bit, `None` for spare bits.
    pub fn field(&self, frn: u8) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|f| f.frn == frn)
    }

    /// FRN of a field identifier such as `"I048/040"`.
    pub fn frn(&self, id: &str) -> Option<u8> {
        self.fields.iter().find(|f| f.id == id).map(|f| f.frn)
    }
}

use FieldFormat::{Compound, Explicit, Fixed, Repetitive, Variable};
use FieldKind as K;

const RADAR_PLOT_CHARACTERISTICS: &[FieldFormat] = &[
    Fixed(1),
    Fixed(1),
    Fixed(1),
    Fixed(1),
    Fixed(1),
    Fixed(1),
    Fixed(1),
];

const RADIAL_DOPPLER_SPEED: &[FieldFormat] = &[Fixed(2), Repetitive(6)];

/// Category 48: monoradar target reports.
pub static CAT048: Catalogue = Catalogue {
    category: 48,
    name: "Monoradar Target Reports",
    fields: &[
        field(1, "I048/010", "Data Source Identifier", Fixed(2), K::DataSource),
        field(2, "I048/140", "Time of Day", Fixed(3), K::TimeOfDay),
        field(3, "I048/020", "Target Report Descriptor", Variable, K::RadarDescriptor),
        field(4, "I048/040", "Measured Position in Polar Coordinates", Fixed(4), K::PolarPosition),
        field(5, "I048/070", "Mode-3/A Code", Fixed(2), K::Mode3A),
        field(6, "I048/090", "Flight Level", Fixed(2), K::RadarFlightLevel),
        field(7, "I048/130", "Radar Plot Characteristics", Compound(RADAR_PLOT_CHARACTERISTICS), K::Opaque),
        field(8, "I048/220", "Aircraft Address", Fixed(3), K::AircraftAddress),
        field(9, "I048/240", "Aircraft Identification", Fixed(6), K::Identification),
        field(10, "I048/250", "Mode S MB Data", Repetitive(8), K::Opaque),
        field(11, "I048/161", "Track Number", Fixed(2), K::TrackNumber),
        field(12, "I048/042", "Calculated Position in Cartesian Coordinates", Fixed(4), K::CartesianPosition),
        field(13, "I048/200", "Calculated Track Velocity in Polar Coordinates", Fixed(4), K::RadarTrackVelocity),
        field(14, "I048/170", "Track Status", Variable, K::Opaque),
        field(15, "I048/210", "Track Quality", Fixed(4), K::Opaque),
        field(16, "I048/030", "Warning/Error Conditions", Variable, K::Opaque),
        field(17, "I048/080", "Mode-3/A Code Confidence Indicator", Fixed(2), K::Opaque),
        field(18, "I048/100", "Mode-C Code and Confidence Indicator", Fixed(4), K::Opaque),
        field(19, "I048/110", "Height Measured by 3D Radar", Fixed(2), K::Opaque),
        field(20, "I048/120", "Radial Doppler Speed", Compound(RADIAL_DOPPLER_SPEED), K::Opaque),
        field(21, "I048/230", "Communications/ACAS Capability and Flight Status", Fixed(2), K::CommsCapability),
        field(22, "I048/260", "ACAS Resolution Advisory Report", Fixed(7), K::Opaque),
        field(23, "I048/055", "Mode-1 Code", Fixed(1), K::Opaque),
        field(24, "I048/050", "Mode-2 Code", Fixed(2), K::Opaque),
        field(25, "I048/065", "Mode-1 Code Confidence Indicator", Fixed(1), K::Opaque),
        field(26, "I048/060", "Mode-2 Code Confidence Indicator", Fixed(2), K::Opaque),
        field(27, "I048/SP", "Special Purpose Field", Explicit, K::Opaque),
        field(28, "I048/RE", "Reserved Expansion Field", Explicit, K::Opaque),
    ],
};

const MET_INFORMATION: &[FieldFormat] = &[Fixed(2), Fixed(2), Fixed(2), Fixed(1)];

const TRAJECTORY_INTENT: &[FieldFormat] = &[Variable, Repetitive(15)];

const DATA_AGES: &[FieldFormat] = &[
    Fixed(1),
    Fixed(1),
    Fixed(1),
    Fixed(1),
    Fixed(1),
    Fixed(1),
    Fixed(1),
    Fixed(1),
    Fixed(1),
    Fixed(1),
    Fixed(1),
    Fixed(1),
    Fixed(1),
    Fixed(1),
    Fixed(1),
    Fixed(1),
    Fixed(1),
    Fixed(1),
    Fixed(1),
    Fixed(1),
    Fixed(1),
    Fixed(1),
    Fixed(1),
];

/// Category 21: ADS-B target reports. FRNs 43-47 are spare.
pub static CAT021: Catalogue = Catalogue {
    category: 21,
    name: "ADS-B Target Reports",
    fields: &[
        field(1, "I021/010", "Data Source Identification", Fixed(2), K::DataSource),
        field(2, "I021/040", "Target Report Descriptor", Variable, K::AdsbDescriptor),
        field(3, "I021/161", "Track Number", Fixed(2), K::TrackNumber),
        field(4, "I021/015", "Service Identification", Fixed(1), K::Opaque),
        field(5, "I021/071", "Time of Applicability for Position", Fixed(3), K::TimeOfDay),
        field(6, "I021/130", "Position in WGS-84 Co-ordinates", Fixed(6), K::Wgs84Position),
        field(7, "I021/131", "Position in WGS-84 Co-ordinates, High Res.", Fixed(8), K::Wgs84PositionHighRes),
        field(8, "I021/072", "Time of Applicability for Velocity", Fixed(3), K::TimeOfDay),
        field(9, "I021/150", "Air Speed", Fixed(2), K::Opaque),
        field(10, "I021/151", "True Air Speed", Fixed(2), K::Opaque),
        field(11, "I021/080", "Target Address", Fixed(3), K::AircraftAddress),
        field(12, "I021/073", "Time of Message Reception of Position", Fixed(3), K::TimeOfDay),
        field(13, "I021/074", "Time of Message Reception of Position-High Precision", Fixed(4), K::Opaque),
        field(14, "I021/075", "Time of Message Reception of Velocity", Fixed(3), K::TimeOfDay),
        field(15, "I021/076", "Time of Message Reception of Velocity-High Precision", Fixed(4), K::Opaque),
        field(16, "I021/140", "Geometric Height", Fixed(2), K::GeometricHeight),
        field(17, "I021/090", "Quality Indicators", Variable, K::Opaque),
        field(18, "I021/210", "MOPS Version", Fixed(1), K::Opaque),
        field(19, "I021/070", "Mode 3/A Code", Fixed(2), K::Mode3A),
        field(20, "I021/230", "Roll Angle", Fixed(2), K::Opaque),
        field(21, "I021/145", "Flight Level", Fixed(2), K::FlightLevel),
        field(22, "I021/152", "Magnetic Heading", Fixed(2), K::Opaque),
        field(23, "I021/200", "Target Status", Fixed(1), K::Opaque),
        field(24, "I021/155", "Barometric Vertical Rate", Fixed(2), K::VerticalRate),
        field(25, "I021/157", "Geometric Vertical Rate", Fixed(2), K::VerticalRate),
        field(26, "I021/160", "Airborne Ground Vector", Fixed(4), K::GroundVector),
        field(27, "I021/165", "Track Angle Rate", Fixed(2), K::Opaque),
        field(28, "I021/077", "Time of ASTERIX Report Transmission", Fixed(3), K::TimeOfDay),
        field(29, "I021/170", "Target Identification", Fixed(6), K::Identification),
        field(30, "I021/020", "Emitter Category", Fixed(1), K::Opaque),
        field(31, "I021/220", "Met Information", Compound(MET_INFORMATION), K::Opaque),
        field(32, "I021/146", "Selected Altitude", Fixed(2), K::Opaque),
        field(33, "I021/148", "Final State Selected Altitude", Fixed(2), K::Opaque),
        field(34, "I021/110", "Trajectory Intent", Compound(TRAJECTORY_INTENT), K::Opaque),
        field(35, "I021/016", "Service Management", Fixed(1), K::Opaque),
        field(36, "I021/008", "Aircraft Operational Status", Fixed(1), K::Opaque),
        field(37, "I021/271", "Surface Capabilities and Characteristics", Variable, K::Opaque),
        field(38, "I021/132", "Message Amplitude", Fixed(1), K::Opaque),
        field(39, "I021/250", "Mode S MB Data", Repetitive(8), K::Opaque),
        field(40, "I021/260", "ACAS Resolution Advisory Report", Fixed(7), K::Opaque),
        field(41, "I021/400", "Receiver ID", Fixed(1), K::Opaque),
        field(42, "I021/295", "Data Ages", Compound(DATA_AGES), K::Opaque),
        field(48, "I021/RE", "Reserved Expansion Field", Explicit, K::Opaque),
        field(49, "I021/SP", "Special Purpose Field", Explicit, K::Opaque),
    ],
};

/// Registered catalogues.
pub static CATALOGUES: &[&Catalogue] = &[&CAT021, &CAT048];

/// Look up the catalogue for a category. Returns `None` when unsupported.
pub fn catalogue(category: u8) -> Option<&'static Catalogue> {
    CATALOGUES.iter().copied().find(|c| c.category == category)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

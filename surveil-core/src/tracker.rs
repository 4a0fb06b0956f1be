//! Per-aircraft track table built from decoded surveillance records.
//!
//! Pure logic, no I/O. The caller owns the store and serializes access to it
//! (the server wraps it in a lock); read-isolated copies for detection come
//! from [`TrackStore::snapshot`].
//!
//! Tracks per-aircraft: identity, position, derived velocity, callsign,
//! Mode-3/A code, flight status, quality and staleness.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, warn};

use crate::decode::{FieldValue, SurveillanceRecord};
use crate::geo::{self, local_offset_nm};
use crate::sites::{SiteProvider, SiteRegistry};
use crate::types::*;

/// Tracks are stale after this many seconds without an update.
pub const STALE_TIMEOUT: f64 = 60.0;

/// Quality of a fresh track from a fully reliable source.
pub const INITIAL_QUALITY: f64 = 0.85;

/// Lower bound of the quality score.
pub const QUALITY_FLOOR: f64 = 0.05;

/// Time constant of quality decay, seconds.
const QUALITY_DECAY_SECS: f64 = 30.0;

// ---------------------------------------------------------------------------
// Track state
// ---------------------------------------------------------------------------

/// Horizontal velocity in knots, north and east components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Velocity {
    pub north_kt: f64,
    pub east_kt: f64,
}

impl Velocity {
    /// From ground speed and track angle.
    pub fn from_polar(speed_kt: f64, track_deg: f64) -> Self {
        let rad = track_deg.to_radians();
        Velocity {
            north_kt: speed_kt * rad.cos(),
            east_kt: speed_kt * rad.sin(),
        }
    }

    pub fn speed_kt(&self) -> f64 {
        self.north_kt.hypot(self.east_kt)
    }

    /// Bearing of the velocity vector in [0, 360).
    pub fn heading_deg(&self) -> f64 {
        geo::normalize_deg(self.east_kt.atan2(self.north_kt).to_degrees())
    }
}

/// Surveillance state of one aircraft.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Track {
    pub key: TrackKey,
    pub source: DataSource,
    pub callsign: Option<String>,
    /// Mode-3/A code as four octal digits.
    pub mode3a: Option<String>,
    pub address: Option<u32>,

    // Position
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub altitude_ft: Option<f64>,
    /// Observation time of the current position.
    pub position_time: Option<f64>,

    // Velocity
    pub velocity: Option<Velocity>,
    pub heading_deg: Option<f64>,
    pub ground_speed_kt: Option<f64>,
    pub vertical_rate_fpm: Option<f64>,

    pub status: AircraftStatus,
    pub quality: f64,
    /// Key was synthesized without a track number or transponder code.
    pub low_confidence: bool,
    pub first_seen: f64,
    pub last_update: f64,
    pub message_count: u64,
}

impl Track {
    pub fn new(key: TrackKey, source: DataSource, timestamp: f64) -> Self {
        Track {
            key,
            source,
            callsign: None,
            mode3a: None,
            address: None,
            lat: None,
            lon: None,
            altitude_ft: None,
            position_time: None,
            velocity: None,
            heading_deg: None,
            ground_speed_kt: None,
            vertical_rate_fpm: None,
            status: AircraftStatus::Unknown,
            quality: INITIAL_QUALITY,
            low_confidence: false,
            first_seen: timestamp,
            last_update: timestamp,
            message_count: 0,
        }
    }

    pub fn position(&self) -> Option<(f64, f64)> {
        Some((self.lat?, self.lon?))
    }

    pub fn has_position(&self) -> bool {
        self.position().is_some()
    }

    pub fn age(&self, now: f64) -> f64 {
        now - self.last_update
    }

    pub fn is_stale(&self, now: f64, stale_after: f64) -> bool {
        self.age(now) >= stale_after
    }

    fn set_velocity(&mut self, v: Velocity) {
        self.velocity = Some(v);
        self.ground_speed_kt = Some(v.speed_kt());
        self.heading_deg = Some(v.heading_deg());
    }
}

/// Quality for an update arriving `gap` seconds after the previous one.
pub fn quality_score(reliability: f64, gap: f64) -> f64 {
    (INITIAL_QUALITY * reliability * (-gap.max(0.0) / QUALITY_DECAY_SECS).exp())
        .clamp(QUALITY_FLOOR, 1.0)
}

// ---------------------------------------------------------------------------
// Updates
// ---------------------------------------------------------------------------

/// Track-relevant content of one surveillance record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackUpdate {
    pub source: DataSource,
    pub timestamp: f64,
    pub track_number: Option<u16>,
    pub mode3a: Option<String>,
    pub address: Option<u32>,
    pub callsign: Option<String>,
    pub position: Option<(f64, f64)>,
    pub altitude_ft: Option<f64>,
    /// Reported ground speed (kt) and track angle (deg).
    pub ground_vector: Option<(f64, f64)>,
    pub vertical_rate_fpm: Option<f64>,
    pub status: Option<AircraftStatus>,
}

impl TrackUpdate {
    /// Extract an update from a decoded record. Polar and cartesian positions
    /// are placed using the reporting site's origin; without a known site
    /// they are dropped.
    pub fn from_record(record: &SurveillanceRecord, sites: &dyn SiteProvider) -> Self {
        let source = record.source.unwrap_or_default();
        let mut u = TrackUpdate {
            source,
            timestamp: record.timestamp,
            ..Default::default()
        };
        let mut geometric_height = None;

        for field in &record.fields {
            match &field.value {
                FieldValue::TrackNumber { number } => u.track_number = Some(*number),
                FieldValue::Mode3A(m) if !m.garbled => u.mode3a = Some(m.octal()),
                FieldValue::AircraftAddress { address } => u.address = Some(*address),
                FieldValue::Identification { callsign } if !callsign.is_empty() => {
                    u.callsign = Some(callsign.clone())
                }
                FieldValue::Wgs84Position { lat, lon } => u.position = Some((*lat, *lon)),
                FieldValue::PolarPosition {
                    range_nm,
                    azimuth_deg,
                } => match sites.site(source) {
                    Some(site) => {
                        u.position = Some(geo::polar_to_geodetic(
                            site.lat,
                            site.lon,
                            *range_nm,
                            *azimuth_deg,
                        ))
                    }
                    None => warn!(source = %source, field = field.id, "no site origin for polar position"),
                },
                FieldValue::CartesianPosition { x_nm, y_nm } => match sites.site(source) {
                    Some(site) => {
                        let bearing = geo::normalize_deg(x_nm.atan2(*y_nm).to_degrees());
                        u.position = Some(geo::destination(
                            site.lat,
                            site.lon,
                            bearing,
                            x_nm.hypot(*y_nm),
                        ))
                    }
                    None => warn!(source = %source, field = field.id, "no site origin for cartesian position"),
                },
                FieldValue::FlightLevel {
                    flight_level,
                    garbled,
                    ..
                } if !garbled => u.altitude_ft = Some(flight_level * 100.0),
                FieldValue::GeometricHeight { feet } => geometric_height = Some(*feet),
                FieldValue::GroundVector {
                    speed_kt,
                    track_deg,
                } => u.ground_vector = Some((*speed_kt, *track_deg)),
                FieldValue::VerticalRate { feet_per_min } => {
                    u.vertical_rate_fpm.get_or_insert(*feet_per_min);
                }
                FieldValue::Descriptor(d) => {
                    if let Some(g) = d.on_ground {
                        u.status = Some(if g {
                            AircraftStatus::OnGround
                        } else {
                            AircraftStatus::Airborne
                        });
                    }
                }
                FieldValue::FlightStatus { status } => u.status = Some(*status),
                _ => {}
            }
        }

        if u.altitude_ft.is_none() {
            u.altitude_ft = geometric_height;
        }
        u
    }

    /// Stable key: track number, else Mode-3/A code, else aircraft address.
    pub fn identity(&self) -> Result<TrackKey, IdentityError> {
        let src = self.source;
        if let Some(n) = self.track_number {
            return Ok(TrackKey(format!("TN:{src}:{n}")));
        }
        if let Some(code) = &self.mode3a {
            return Ok(TrackKey(format!("SQ:{src}:{code}")));
        }
        if let Some(addr) = self.address {
            return Ok(TrackKey(format!("AA:{src}:{addr:06X}")));
        }
        Err(IdentityError::NoTransponderCode { data_source: src })
    }
}

// ---------------------------------------------------------------------------
// Track store
// ---------------------------------------------------------------------------

/// In-memory track table keyed by stable identity.
pub struct TrackStore {
    tracks: BTreeMap<TrackKey, Track>,
    sites: SiteRegistry,
    pub stale_after: f64,

    // Counters
    pub messages_applied: u64,
    pub positions_ignored: u64,
    pub low_confidence_keys: u64,
    pub evictions: u64,
}

impl Default for TrackStore {
    fn default() -> Self {
        TrackStore::new(SiteRegistry::new(), STALE_TIMEOUT)
    }
}

impl TrackStore {
    pub fn new(sites: SiteRegistry, stale_after: f64) -> Self {
        TrackStore {
            tracks: BTreeMap::new(),
            sites,
            stale_after,
            messages_applied: 0,
            positions_ignored: 0,
            low_confidence_keys: 0,
            evictions: 0,
        }
    }

    pub fn sites(&self) -> &SiteRegistry {
        &self.sites
    }

    pub fn set_sites(&mut self, sites: SiteRegistry) {
        self.sites = sites;
    }

    /// Apply a decoded record. Returns the key of the track it landed on.
    pub fn apply(&mut self, record: &SurveillanceRecord) -> TrackKey {
        let update = TrackUpdate::from_record(record, &self.sites);
        self.apply_update(update).key.clone()
    }

    /// Create-or-merge a track from an update.
    ///
    /// Fields absent from the update leave the track untouched. Velocity is
    /// re-derived only from a new, distinct position observed strictly later
    /// than the current one; a reported ground vector overrides it.
    pub fn apply_update(&mut self, update: TrackUpdate) -> &Track {
        self.messages_applied += 1;
        let ts = update.timestamp;
        let reliability = self.sites.reliability(update.source);

        let (key, low_confidence) = match update.identity() {
            Ok(k) => (k, false),
            Err(e) => {
                self.low_confidence_keys += 1;
                let suffix = uuid::Uuid::new_v4().simple().to_string();
                let key = TrackKey(format!("LC:{}:{}", update.source, &suffix[..8]));
                warn!(error = %e, track = %key, "low-confidence track key");
                (key, true)
            }
        };

        let track = self.tracks.entry(key.clone()).or_insert_with(|| {
            debug!(track = %key, "new track");
            let mut t = Track::new(key.clone(), update.source, ts);
            t.low_confidence = low_confidence;
            t.quality = quality_score(reliability, 0.0);
            t
        });

        let gap = ts - track.last_update;
        if track.message_count > 0 {
            track.quality = quality_score(reliability, gap);
        }
        track.last_update = track.last_update.max(ts);
        track.message_count += 1;
        track.source = update.source;

        if let Some(cs) = update.callsign {
            track.callsign = Some(cs);
        }
        if let Some(code) = update.mode3a {
            track.mode3a = Some(code);
        }
        if let Some(addr) = update.address {
            track.address = Some(addr);
        }
        if let Some(status) = update.status {
            track.status = status;
        }

        let mut kinematics_current = true;
        if let Some((lat, lon)) = update.position {
            match (track.position(), track.position_time) {
                (Some(_), Some(pt)) if ts < pt => {
                    kinematics_current = false;
                    self.positions_ignored += 1;
                    debug!(track = %track.key, ts, position_time = pt, "ignoring out-of-order position");
                }
                (Some((plat, plon)), Some(pt)) => {
                    if (plat, plon) != (lat, lon) {
                        let dt = ts - pt;
                        if dt > 0.0 {
                            let (north, east) = local_offset_nm(plat, plon, lat, lon);
                            track.set_velocity(Velocity {
                                north_kt: north / dt * 3600.0,
                                east_kt: east / dt * 3600.0,
                            });
                            if let (Some(prev), Some(alt)) = (track.altitude_ft, update.altitude_ft) {
                                track.vertical_rate_fpm = Some((alt - prev) * 60.0 / dt);
                            }
                        }
                        track.lat = Some(lat);
                        track.lon = Some(lon);
                        track.position_time = Some(ts);
                    }
                }
                _ => {
                    track.lat = Some(lat);
                    track.lon = Some(lon);
                    track.position_time = Some(ts);
                }
            }
        }

        if kinematics_current {
            if let Some(alt) = update.altitude_ft {
                track.altitude_ft = Some(alt);
            }
            if let Some((speed, angle)) = update.ground_vector {
                track.set_velocity(Velocity::from_polar(speed, angle));
            }
            if let Some(vr) = update.vertical_rate_fpm {
                track.vertical_rate_fpm = Some(vr);
            }
        }

        track
    }

    /// Copies of all live tracks, ordered by key.
    pub fn snapshot(&self, now: f64) -> Vec<Track> {
        self.tracks
            .values()
            .filter(|t| !t.is_stale(now, self.stale_after))
            .cloned()
            .collect()
    }

    /// Remove tracks whose last update is at least `stale_after` old.
    /// Returns the removed keys.
    pub fn evict_stale(&mut self, now: f64) -> Vec<TrackKey> {
        let stale_after = self.stale_after;
        let stale: Vec<TrackKey> = self
            .tracks
            .iter()
            .filter(|(_, t)| t.is_stale(now, stale_after))
            .map(|(k, _)| k.clone())
            .collect();
        for k in &stale {
            self.tracks.remove(k);
            debug!(track = %k, "evicted stale track");
        }
        self.evictions += stale.len() as u64;
        stale
    }

    pub fn get(&self, key: &TrackKey) -> Option<&Track> {
        self.tracks.get(key)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn clear(&mut self) {
        self.tracks.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::decode;
    use crate::encode::TargetReport;
    use crate::sites::RadarSite;

    const SRC: DataSource = DataSource { sac: 1, sic: 2 };

    fn update(ts: f64) -> TrackUpdate {
        TrackUpdate {
            source: SRC,
            timestamp: ts,
            track_number: Some(100),
            ..Default::default()
        }
    }

    fn at(ts: f64, lat: f64, lon: f64) -> TrackUpdate {
        TrackUpdate {
            position: Some((lat, lon)),
            ..update(ts)
        }
    }

    #[test]
    fn test_new_track_from_track_number() {
        let mut store = TrackStore::default();
        let t = store.apply_update(update(10.0));
        assert_eq!(t.key.as_str(), "TN:1/2:100");
        assert_eq!(t.first_seen, 10.0);
        assert!(!t.low_confidence);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_identity_fallbacks() {
        let mut u = TrackUpdate {
            source: SRC,
            mode3a: Some("7700".into()),
            address: Some(0xABC123),
            ..Default::default()
        };
        assert_eq!(u.identity().unwrap().as_str(), "SQ:1/2:7700");
        u.mode3a = None;
        assert_eq!(u.identity().unwrap().as_str(), "AA:1/2:ABC123");
        u.address = None;
        assert_eq!(
            u.identity(),
            Err(IdentityError::NoTransponderCode { data_source: SRC })
        );
    }

    #[test]
    fn test_low_confidence_key() {
        let mut store = TrackStore::default();
        let u = TrackUpdate {
            source: SRC,
            timestamp: 1.0,
            ..Default::default()
        };
        let key = store.apply_update(u.clone()).key.clone();
        assert!(key.as_str().starts_with("LC:1/2:"));
        assert!(store.get(&key).unwrap().low_confidence);
        store.apply_update(u);
        assert_eq!(store.low_confidence_keys, 2);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_merge_keeps_absent_fields() {
        let mut store = TrackStore::default();
        store.apply_update(TrackUpdate {
            callsign: Some("BAW1".into()),
            altitude_ft: Some(35000.0),
            ..at(0.0, 51.0, 0.0)
        });
        let t = store.apply_update(TrackUpdate {
            mode3a: Some("1234".into()),
            ..update(1.0)
        });
        assert_eq!(t.callsign.as_deref(), Some("BAW1"));
        assert_eq!(t.mode3a.as_deref(), Some("1234"));
        assert_eq!(t.altitude_ft, Some(35000.0));
        assert_eq!(t.position(), Some((51.0, 0.0)));
        assert_eq!(t.message_count, 2);
    }

    #[test]
    fn test_velocity_due_east_heading_90() {
        let mut store = TrackStore::default();
        store.apply_update(at(0.0, 40.0, -74.0));
        let t = store.apply_update(at(60.0, 40.0, -73.9));
        assert_eq!(t.heading_deg, Some(90.0));
        let speed = t.ground_speed_kt.unwrap();
        // ~4.6 NM in one minute
        assert!(speed > 270.0 && speed < 285.0, "speed {speed}");
    }

    #[test]
    fn test_velocity_due_north_and_south() {
        let mut store = TrackStore::default();
        store.apply_update(at(0.0, 40.0, -74.0));
        let t = store.apply_update(at(10.0, 40.01, -74.0));
        assert_eq!(t.heading_deg, Some(0.0));
        let t = store.apply_update(at(20.0, 40.0, -74.0));
        assert_eq!(t.heading_deg, Some(180.0));
    }

    #[test]
    fn test_velocity_unchanged_on_zero_elapsed() {
        let mut store = TrackStore::default();
        store.apply_update(at(0.0, 40.0, -74.0));
        store.apply_update(at(10.0, 40.0, -73.99));
        let before = store.get(&"TN:1/2:100".into()).unwrap().velocity;
        let t = store.apply_update(at(10.0, 40.5, -73.0));
        assert_eq!(t.velocity, before);
        assert_eq!(t.position(), Some((40.5, -73.0)));
    }

    #[test]
    fn test_same_position_keeps_velocity() {
        let mut store = TrackStore::default();
        store.apply_update(at(0.0, 40.0, -74.0));
        store.apply_update(at(10.0, 40.0, -73.99));
        let v = store.get(&"TN:1/2:100".into()).unwrap().velocity;
        let t = store.apply_update(at(20.0, 40.0, -73.99));
        assert_eq!(t.velocity, v);
        assert_eq!(t.position_time, Some(10.0));
    }

    #[test]
    fn test_out_of_order_position_ignored() {
        let mut store = TrackStore::default();
        store.apply_update(at(10.0, 40.0, -74.0));
        let t = store.apply_update(TrackUpdate {
            callsign: Some("LATE".into()),
            ..at(5.0, 41.0, -74.0)
        });
        assert_eq!(t.position(), Some((40.0, -74.0)));
        assert_eq!(t.callsign.as_deref(), Some("LATE"));
        assert_eq!(t.last_update, 10.0);
        assert_eq!(store.positions_ignored, 1);
    }

    #[test]
    fn test_vertical_rate_from_altitude_delta() {
        let mut store = TrackStore::default();
        store.apply_update(TrackUpdate {
            altitude_ft: Some(10000.0),
            ..at(0.0, 40.0, -74.0)
        });
        let t = store.apply_update(TrackUpdate {
            altitude_ft: Some(10500.0),
            ..at(30.0, 40.01, -74.0)
        });
        assert_eq!(t.vertical_rate_fpm, Some(1000.0));
        assert_eq!(t.altitude_ft, Some(10500.0));
    }

    #[test]
    fn test_reported_ground_vector() {
        let mut store = TrackStore::default();
        let t = store.apply_update(TrackUpdate {
            ground_vector: Some((200.0, 180.0)),
            ..at(0.0, 40.72, -74.0)
        });
        let v = t.velocity.unwrap();
        assert!((v.north_kt + 200.0).abs() < 1e-9);
        assert!((t.heading_deg.unwrap() - 180.0).abs() < 1e-9);
    }

    #[test]
    fn test_quality_decay_and_floor() {
        assert_eq!(quality_score(1.0, 0.0), INITIAL_QUALITY);
        assert!(quality_score(1.0, 30.0) < quality_score(1.0, 5.0));
        assert_eq!(quality_score(1.0, 1e6), QUALITY_FLOOR);
        assert_eq!(quality_score(0.5, 0.0), INITIAL_QUALITY * 0.5);

        let mut store = TrackStore::default();
        store.apply_update(update(0.0));
        let q = store.apply_update(update(15.0)).quality;
        assert!((q - INITIAL_QUALITY * (-0.5f64).exp()).abs() < 1e-12);
        assert!((0.0..=1.0).contains(&q));
    }

    #[test]
    fn test_reliability_scales_quality() {
        let sites = SiteRegistry::from_sites(&[RadarSite {
            sac: 1,
            sic: 2,
            name: "R".into(),
            lat: 0.0,
            lon: 0.0,
            reliability: 0.5,
        }]);
        let mut store = TrackStore::new(sites, STALE_TIMEOUT);
        assert_eq!(store.apply_update(update(0.0)).quality, INITIAL_QUALITY * 0.5);
    }

    #[test]
    fn test_staleness_boundary() {
        let mut store = TrackStore::default();
        store.apply_update(update(100.0));
        assert_eq!(store.snapshot(100.0).len(), 1);
        assert_eq!(store.snapshot(159.999).len(), 1);
        assert!(store.snapshot(160.0).is_empty());
        assert!(store.snapshot(500.0).is_empty());
    }

    #[test]
    fn test_evict_stale() {
        let mut store = TrackStore::default();
        store.apply_update(update(0.0));
        store.apply_update(TrackUpdate {
            track_number: Some(7),
            ..update(50.0)
        });
        let evicted = store.evict_stale(60.0);
        assert_eq!(evicted, vec![TrackKey::from("TN:1/2:100")]);
        assert_eq!(store.len(), 1);
        assert_eq!(store.evictions, 1);
    }

    #[test]
    fn test_last_update_monotonic() {
        let mut store = TrackStore::default();
        store.apply_update(update(20.0));
        let t = store.apply_update(update(10.0));
        assert_eq!(t.last_update, 20.0);
    }

    #[test]
    fn test_snapshot_ordered_by_key() {
        let mut store = TrackStore::default();
        for n in [30, 10, 20] {
            store.apply_update(TrackUpdate {
                track_number: Some(n),
                ..update(0.0)
            });
        }
        let keys: Vec<_> = store
            .snapshot(1.0)
            .into_iter()
            .map(|t| t.key.0)
            .collect();
        assert_eq!(keys, vec!["TN:1/2:10", "TN:1/2:20", "TN:1/2:30"]);
    }

    #[test]
    fn test_apply_cat048_polar_with_site() {
        let sites = SiteRegistry::from_sites(&[RadarSite {
            sac: 1,
            sic: 2,
            name: "North".into(),
            lat: 50.0,
            lon: 8.0,
            reliability: 1.0,
        }]);
        let mut store = TrackStore::new(sites, STALE_TIMEOUT);
        let bytes = TargetReport {
            source: SRC,
            polar: Some((60.0, 0.0)),
            mode3a: Some(0o4521),
            flight_level: Some(240.0),
            on_ground: Some(false),
            ..Default::default()
        }
        .to_cat048();
        let rec = decode(48, &bytes, 5.0).unwrap();
        let key = store.apply(&rec);
        let t = store.get(&key).unwrap();
        assert_eq!(key.as_str(), "SQ:1/2:4521");
        assert!((t.lat.unwrap() - 51.0).abs() < 0.01);
        assert_eq!(t.altitude_ft, Some(24000.0));
        assert_eq!(t.status, AircraftStatus::Airborne);
    }

    #[test]
    fn test_polar_without_site_has_no_position() {
        let mut store = TrackStore::default();
        let bytes = TargetReport {
            source: SRC,
            polar: Some((10.0, 90.0)),
            track_number: Some(3),
            ..Default::default()
        }
        .to_cat048();
        let rec = decode(48, &bytes, 0.0).unwrap();
        let key = store.apply(&rec);
        assert!(!store.get(&key).unwrap().has_position());
    }

    #[test]
    fn test_apply_cat021_fields() {
        let mut store = TrackStore::default();
        let bytes = TargetReport {
            source: SRC,
            address: Some(0xA1B2C3),
            callsign: Some("N123AB".into()),
            position: Some((33.9425, -118.4081)),
            flight_level: Some(50.0),
            ground_vector: Some((180.0, 270.0)),
            on_ground: Some(false),
            ..Default::default()
        }
        .to_cat021();
        let rec = decode(21, &bytes, 0.0).unwrap();
        let key = store.apply(&rec);
        let t = store.get(&key).unwrap();
        assert_eq!(key.as_str(), "AA:1/2:A1B2C3");
        assert_eq!(t.callsign.as_deref(), Some("N123AB"));
        assert_eq!(t.altitude_ft, Some(5000.0));
        assert!((t.heading_deg.unwrap() - 270.0).abs() < 0.01);
    }
}

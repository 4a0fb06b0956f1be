//! Pairwise conflict detection and the conflict lifecycle.
//!
//! Each cycle predicts every live track, walks every unordered pair of fresh
//! trajectories sample by sample to find the closest point of approach
//! (CPA), and reconciles the resulting candidates against the active set:
//! - a pair already in conflict keeps its record (and identity), updated
//! - a new pair opens a record in `DETECTED`
//! - an active pair that no longer conflicts is `RESOLVED` and moved to
//!   history
//!
//! Status changes from outside (acknowledge, resolving, resolved) only move
//! forward.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::geo::{self, FEET_PER_NM};
use crate::predict::{Predictor, TrajectoryPrediction};
use crate::tracker::Track;
use crate::types::{AircraftStatus, ConflictError, TrackKey};

// ---------------------------------------------------------------------------
// Conflict vocabulary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictType {
    SeparationViolation,
    AltitudeConflict,
    GroundConflict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Conflict lifecycle. Variants are declared in lifecycle order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictStatus {
    Detected,
    Acknowledged,
    Resolving,
    Resolved,
}

impl ConflictStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictStatus::Detected => "DETECTED",
            ConflictStatus::Acknowledged => "ACKNOWLEDGED",
            ConflictStatus::Resolving => "RESOLVING",
            ConflictStatus::Resolved => "RESOLVED",
        }
    }
}

impl fmt::Display for ConflictStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One suggested resolution for a conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionOption {
    /// Short action code, e.g. `"climb"`, `"turn_left"`, `"manual_intervention"`.
    pub action: String,
    pub description: String,
    /// Aircraft the instruction applies to, if specific.
    #[serde(default)]
    pub aircraft: Option<TrackKey>,
    #[serde(default)]
    pub priority: u8,
}

impl ResolutionOption {
    /// Safe fallback used when no collaborator suggestion is available.
    pub fn manual_intervention() -> Self {
        ResolutionOption {
            action: "manual_intervention".into(),
            description: "Controller to assess and issue separation instructions manually".into(),
            aircraft: None,
            priority: 1,
        }
    }
}

/// A predicted loss of separation between two aircraft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub id: String,
    pub aircraft_a: TrackKey,
    pub aircraft_b: TrackKey,
    pub conflict_type: ConflictType,
    pub severity: Severity,
    pub status: ConflictStatus,
    /// Seconds from the last detection cycle to the CPA.
    pub time_to_conflict: f64,
    pub min_separation_nm: f64,
    pub horizontal_nm: f64,
    pub vertical_ft: f64,
    pub cpa_time: f64,
    pub cpa_lat: f64,
    pub cpa_lon: f64,
    pub detected_at: f64,
    pub updated_at: f64,
    pub resolved_at: Option<f64>,
    pub resolutions: Vec<ResolutionOption>,
}

impl ConflictRecord {
    pub fn pair(&self) -> (TrackKey, TrackKey) {
        (self.aircraft_a.clone(), self.aircraft_b.clone())
    }
}

/// Unordered pair key, smaller key first.
pub fn pair_key(a: &TrackKey, b: &TrackKey) -> (TrackKey, TrackKey) {
    if a <= b {
        (a.clone(), b.clone())
    } else {
        (b.clone(), a.clone())
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// One severity tier: both the separation and the time must be within it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertTier {
    pub separation_nm: f64,
    pub time_secs: f64,
}

impl AlertTier {
    fn contains(&self, separation_nm: f64, time_to_conflict: f64) -> bool {
        separation_nm <= self.separation_nm && time_to_conflict <= self.time_secs
    }
}

/// Nested severity tiers; anything outside `medium` is LOW.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlertTiers {
    pub critical: AlertTier,
    pub high: AlertTier,
    pub medium: AlertTier,
}

impl Default for AlertTiers {
    fn default() -> Self {
        AlertTiers {
            critical: AlertTier {
                separation_nm: 1.0,
                time_secs: 60.0,
            },
            high: AlertTier {
                separation_nm: 2.0,
                time_secs: 120.0,
            },
            medium: AlertTier {
                separation_nm: 3.0,
                time_secs: 180.0,
            },
        }
    }
}

impl AlertTiers {
    pub fn severity(&self, separation_nm: f64, time_to_conflict: f64) -> Severity {
        if self.critical.contains(separation_nm, time_to_conflict) {
            Severity::Critical
        } else if self.high.contains(separation_nm, time_to_conflict) {
            Severity::High
        } else if self.medium.contains(separation_nm, time_to_conflict) {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

/// Detector thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    /// Combined separation below which a CPA is a conflict.
    pub horizontal_nm: f64,
    /// Vertical separation below which a conflict is a separation violation.
    pub vertical_ft: f64,
    /// Aircraft below this altitude make a ground conflict.
    pub low_altitude_ft: f64,
    pub horizon_secs: f64,
    pub tiers: AlertTiers,
    pub history_retention_secs: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        DetectorConfig {
            horizontal_nm: 3.0,
            vertical_ft: 500.0,
            low_altitude_ft: 1000.0,
            horizon_secs: 300.0,
            tiers: AlertTiers::default(),
            history_retention_secs: 24.0 * 3600.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Closest point of approach
// ---------------------------------------------------------------------------

/// Minimum-separation sample of two trajectories.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClosestApproach {
    pub index: usize,
    pub time: f64,
    pub horizontal_nm: f64,
    pub vertical_ft: f64,
    /// `sqrt(horizontal² + (vertical / 6076.12)²)`
    pub separation_nm: f64,
    pub lat: f64,
    pub lon: f64,
    pub altitude_a: Option<f64>,
    pub altitude_b: Option<f64>,
}

/// Walk both trajectories by sample index and return the sample of minimum
/// combined separation. Ties keep the earliest sample. Samples with an
/// unknown altitude count as zero vertical separation.
pub fn closest_approach(a: &TrajectoryPrediction, b: &TrajectoryPrediction) -> Option<ClosestApproach> {
    let mut best: Option<ClosestApproach> = None;

    for (index, (sa, sb)) in a.samples.iter().zip(&b.samples).enumerate() {
        let horizontal_nm = geo::haversine_nm(sa.lat, sa.lon, sb.lat, sb.lon);
        let vertical_ft = match (sa.altitude_ft, sb.altitude_ft) {
            (Some(x), Some(y)) => (x - y).abs(),
            _ => 0.0,
        };
        let separation_nm = horizontal_nm.hypot(vertical_ft / FEET_PER_NM);
        if !separation_nm.is_finite() {
            continue;
        }
        if best.is_some_and(|prev| separation_nm >= prev.separation_nm) {
            continue;
        }
        let (lat, lon) = geo::midpoint(sa.lat, sa.lon, sb.lat, sb.lon);
        best = Some(ClosestApproach {
            index,
            time: sa.time,
            horizontal_nm,
            vertical_ft,
            separation_nm,
            lat,
            lon,
            altitude_a: sa.altitude_ft,
            altitude_b: sb.altitude_ft,
        });
    }

    best
}

/// A conflict found in the current cycle, before reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub pair: (TrackKey, TrackKey),
    pub cpa: ClosestApproach,
    pub time_to_conflict: f64,
    pub conflict_type: ConflictType,
    pub severity: Severity,
}

// ---------------------------------------------------------------------------
// Detector
// ---------------------------------------------------------------------------

/// Changes produced by one detection cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    pub detected: Vec<ConflictRecord>,
    pub updated: Vec<ConflictRecord>,
    pub resolved: Vec<ConflictRecord>,
    /// All active conflicts after the cycle.
    pub active: Vec<ConflictRecord>,
    pub pairs_checked: usize,
    pub tracks_predicted: usize,
}

/// Aggregates over active conflicts and history.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConflictStatistics {
    pub active: usize,
    pub by_severity: BTreeMap<Severity, usize>,
    pub by_type: BTreeMap<ConflictType, usize>,
    pub by_status: BTreeMap<ConflictStatus, usize>,
    pub total_detected: u64,
    pub total_resolved: u64,
    pub history_size: usize,
    pub mean_time_to_conflict: Option<f64>,
}

/// Owns the active conflict set and the resolved history.
pub struct ConflictDetector {
    pub config: DetectorConfig,
    active: BTreeMap<(TrackKey, TrackKey), ConflictRecord>,
    history: VecDeque<ConflictRecord>,

    // Counters
    pub total_detected: u64,
    pub total_resolved: u64,
    pub cycles: u64,
}

impl Default for ConflictDetector {
    fn default() -> Self {
        ConflictDetector::new(DetectorConfig::default())
    }
}

impl ConflictDetector {
    pub fn new(config: DetectorConfig) -> Self {
        ConflictDetector {
            config,
            active: BTreeMap::new(),
            history: VecDeque::new(),
            total_detected: 0,
            total_resolved: 0,
            cycles: 0,
        }
    }

    /// Run one detection cycle over a track snapshot.
    pub fn detect(&mut self, tracks: &[Track], predictor: &mut Predictor, now: f64) -> CycleReport {
        self.cycles += 1;
        let mut report = CycleReport::default();

        let mut predictions: Vec<TrajectoryPrediction> = Vec::with_capacity(tracks.len());
        for track in tracks {
            match predictor.predict(track, now) {
                Some(p) if p.is_fresh() => predictions.push(p),
                Some(_) => debug!(track = %track.key, "trajectory not fresh, skipping"),
                None => debug!(track = %track.key, "no position or velocity, skipping"),
            }
        }
        predictions.sort_by(|a, b| a.track.key.cmp(&b.track.key));
        report.tracks_predicted = predictions.len();

        let mut candidates: BTreeMap<(TrackKey, TrackKey), Candidate> = BTreeMap::new();
        for i in 0..predictions.len() {
            for j in (i + 1)..predictions.len() {
                report.pairs_checked += 1;
                if let Some(c) = self.evaluate_pair(&predictions[i], &predictions[j], now) {
                    candidates.insert(c.pair.clone(), c);
                }
            }
        }

        self.reconcile(candidates, now, &mut report);
        self.purge_history(now);
        predictor.prune(now);

        report.active = self.active();
        report
    }

    /// Evaluate one pair of predictions against the separation standard.
    pub fn evaluate_pair(&self, a: &TrajectoryPrediction, b: &TrajectoryPrediction, now: f64) -> Option<Candidate> {
        let pair = pair_key(&a.track.key, &b.track.key);
        if let (Some(x), Some(y)) = (a.track.address, b.track.address) {
            if x == y {
                debug!(pair = ?pair, "same aircraft address, skipping pair");
                return None;
            }
        }

        let cpa = match closest_approach(a, b) {
            Some(cpa) => cpa,
            None => {
                warn!(pair = ?pair, "no finite separation for pair");
                return None;
            }
        };

        let time_to_conflict = cpa.time - now;
        if cpa.separation_nm >= self.config.horizontal_nm
            || time_to_conflict <= 0.0
            || time_to_conflict > self.config.horizon_secs
        {
            return None;
        }

        let conflict_type = self.classify(&cpa, &a.track, &b.track);
        let severity = self.config.tiers.severity(cpa.separation_nm, time_to_conflict);
        Some(Candidate {
            pair,
            cpa,
            time_to_conflict,
            conflict_type,
            severity,
        })
    }

    fn classify(&self, cpa: &ClosestApproach, a: &Track, b: &Track) -> ConflictType {
        if cpa.vertical_ft < self.config.vertical_ft {
            return ConflictType::SeparationViolation;
        }
        let low = |track: &Track, alt: Option<f64>| {
            track.status == AircraftStatus::OnGround
                || alt.is_some_and(|ft| ft < self.config.low_altitude_ft)
        };
        if low(a, cpa.altitude_a) || low(b, cpa.altitude_b) {
            ConflictType::GroundConflict
        } else {
            ConflictType::AltitudeConflict
        }
    }

    fn reconcile(
        &mut self,
        candidates: BTreeMap<(TrackKey, TrackKey), Candidate>,
        now: f64,
        report: &mut CycleReport,
    ) {
        let gone: Vec<(TrackKey, TrackKey)> = self
            .active
            .keys()
            .filter(|k| !candidates.contains_key(*k))
            .cloned()
            .collect();
        for key in gone {
            if let Some(record) = self.active.remove(&key) {
                let record = self.retire(record, now);
                info!(conflict = %record.id, pair = ?key, "conflict cleared");
                report.resolved.push(record);
            }
        }

        for (key, c) in candidates {
            match self.active.get_mut(&key) {
                Some(record) => {
                    apply_candidate(record, &c, now);
                    report.updated.push(record.clone());
                }
                None => {
                    let mut record = ConflictRecord {
                        id: uuid::Uuid::new_v4().to_string(),
                        aircraft_a: key.0.clone(),
                        aircraft_b: key.1.clone(),
                        conflict_type: c.conflict_type,
                        severity: c.severity,
                        status: ConflictStatus::Detected,
                        time_to_conflict: c.time_to_conflict,
                        min_separation_nm: c.cpa.separation_nm,
                        horizontal_nm: c.cpa.horizontal_nm,
                        vertical_ft: c.cpa.vertical_ft,
                        cpa_time: c.cpa.time,
                        cpa_lat: c.cpa.lat,
                        cpa_lon: c.cpa.lon,
                        detected_at: now,
                        updated_at: now,
                        resolved_at: None,
                        resolutions: Vec::new(),
                    };
                    apply_candidate(&mut record, &c, now);
                    self.total_detected += 1;
                    info!(
                        conflict = %record.id,
                        pair = ?key,
                        severity = ?record.severity,
                        ttc = record.time_to_conflict,
                        "conflict detected"
                    );
                    report.detected.push(record.clone());
                    self.active.insert(key, record);
                }
            }
        }
    }

    fn retire(&mut self, mut record: ConflictRecord, now: f64) -> ConflictRecord {
        record.status = ConflictStatus::Resolved;
        record.resolved_at = Some(now);
        record.updated_at = now;
        self.total_resolved += 1;
        self.history.push_back(record.clone());
        record
    }

    /// Active conflicts, ordered by pair.
    pub fn active(&self) -> Vec<ConflictRecord> {
        self.active.values().cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<&ConflictRecord> {
        self.active.values().find(|r| r.id == id)
    }

    fn key_of(&self, id: &str) -> Result<(TrackKey, TrackKey), ConflictError> {
        self.active
            .iter()
            .find(|(_, r)| r.id == id)
            .map(|(k, _)| k.clone())
            .ok_or_else(|| ConflictError::UnknownConflict(id.to_string()))
    }

    /// Externally driven status change. Only forward transitions are
    /// accepted; setting the current status again is a no-op. `RESOLVED`
    /// moves the record to history.
    pub fn update_status(&mut self, id: &str, status: ConflictStatus, now: f64) -> Result<ConflictRecord, ConflictError> {
        let key = self.key_of(id)?;
        let current = self.active[&key].status;
        if status < current {
            return Err(ConflictError::InvalidTransition {
                from: current.to_string(),
                to: status.to_string(),
            });
        }
        if status == current {
            return Ok(self.active[&key].clone());
        }

        info!(conflict = id, from = %current, to = %status, "conflict status changed");
        if status == ConflictStatus::Resolved {
            let record = self
                .active
                .remove(&key)
                .ok_or_else(|| ConflictError::UnknownConflict(id.to_string()))?;
            return Ok(self.retire(record, now));
        }

        let record = self
            .active
            .get_mut(&key)
            .ok_or_else(|| ConflictError::UnknownConflict(id.to_string()))?;
        record.status = status;
        record.updated_at = now;
        Ok(record.clone())
    }

    /// Store resolution options on an active conflict.
    pub fn attach_resolutions(&mut self, id: &str, options: Vec<ResolutionOption>) -> Result<ConflictRecord, ConflictError> {
        let key = self.key_of(id)?;
        let record = self
            .active
            .get_mut(&key)
            .ok_or_else(|| ConflictError::UnknownConflict(id.to_string()))?;
        record.resolutions = options;
        Ok(record.clone())
    }

    /// Resolved conflicts within the last `window_hours`, newest first.
    pub fn history(&self, window_hours: f64, now: f64) -> Vec<ConflictRecord> {
        let since = now - window_hours * 3600.0;
        self.history
            .iter()
            .rev()
            .filter(|r| r.resolved_at.unwrap_or(r.updated_at) >= since)
            .cloned()
            .collect()
    }

    /// Drop history older than the retention window. Returns count removed.
    pub fn purge_history(&mut self, now: f64) -> usize {
        let cutoff = now - self.config.history_retention_secs;
        let before = self.history.len();
        self.history
            .retain(|r| r.resolved_at.unwrap_or(r.updated_at) >= cutoff);
        before - self.history.len()
    }

    pub fn statistics(&self) -> ConflictStatistics {
        let mut stats = ConflictStatistics {
            active: self.active.len(),
            total_detected: self.total_detected,
            total_resolved: self.total_resolved,
            history_size: self.history.len(),
            ..Default::default()
        };
        for r in self.active.values() {
            *stats.by_severity.entry(r.severity).or_default() += 1;
            *stats.by_type.entry(r.conflict_type).or_default() += 1;
            *stats.by_status.entry(r.status).or_default() += 1;
        }
        if !self.active.is_empty() {
            let sum: f64 = self.active.values().map(|r| r.time_to_conflict).sum();
            stats.mean_time_to_conflict = Some(sum / self.active.len() as f64);
        }
        stats
    }

    /// Drop all active conflicts and history.
    pub fn clear(&mut self) {
        self.active.clear();
        self.history.clear();
    }
}

fn apply_candidate(record: &mut ConflictRecord, c: &Candidate, now: f64) {
    record.conflict_type = c.conflict_type;
    record.severity = c.severity;
    record.time_to_conflict = c.time_to_conflict;
    record.min_separation_nm = c.cpa.separation_nm;
    record.horizontal_nm = c.cpa.horizontal_nm;
    record.vertical_ft = c.cpa.vertical_ft;
    record.cpa_time = c.cpa.time;
    record.cpa_lat = c.cpa.lat;
    record.cpa_lon = c.cpa.lon;
    record.updated_at = now;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::Velocity;
    use crate::types::DataSource;

    fn track(n: u16, lat: f64, lon: f64, alt: f64, heading: f64, speed: f64, t: f64) -> Track {
        let key = TrackKey(format!("TN:1/1:{n}"));
        let mut tr = Track::new(key, DataSource::new(1, 1), t);
        tr.lat = Some(lat);
        tr.lon = Some(lon);
        tr.altitude_ft = Some(alt);
        tr.position_time = Some(t);
        tr.velocity = Some(Velocity::from_polar(speed, heading));
        tr.status = AircraftStatus::Airborne;
        tr
    }

    /// Two aircraft on parallel opposite tracks 2 NM apart laterally, closing
    /// at 480 kt with 16 NM to go: CPA of 2.0 NM at t0 + 120 s.
    fn converging(t0: f64, alt_b: f64) -> Vec<Track> {
        let lat: f64 = 40.0;
        let half = 8.0 / (60.0 * lat.to_radians().cos());
        vec![
            track(1, lat, -74.0 - half, 5000.0, 90.0, 240.0, t0),
            track(2, lat + 2.0 / 60.0, -74.0 + half, alt_b, 270.0, 240.0, t0),
        ]
    }

    fn run(det: &mut ConflictDetector, tracks: &[Track], now: f64) -> CycleReport {
        det.detect(tracks, &mut Predictor::default(), now)
    }

    #[test]
    fn test_severity_tiers() {
        let tiers = AlertTiers::default();
        assert_eq!(tiers.severity(0.5, 30.0), Severity::Critical);
        assert_eq!(tiers.severity(0.5, 90.0), Severity::High);
        assert_eq!(tiers.severity(1.5, 30.0), Severity::High);
        assert_eq!(tiers.severity(2.5, 150.0), Severity::Medium);
        assert_eq!(tiers.severity(2.5, 250.0), Severity::Low);
    }

    #[test]
    fn test_status_order() {
        assert!(ConflictStatus::Detected < ConflictStatus::Acknowledged);
        assert!(ConflictStatus::Resolving < ConflictStatus::Resolved);
        assert_eq!(
            serde_json::to_string(&ConflictStatus::Acknowledged).unwrap(),
            "\"ACKNOWLEDGED\""
        );
    }

    #[test]
    fn test_pair_key_unordered() {
        let a = TrackKey::from("A");
        let b = TrackKey::from("B");
        assert_eq!(pair_key(&a, &b), pair_key(&b, &a));
    }

    #[test]
    fn test_converging_pair_single_conflict() {
        let mut det = ConflictDetector::default();
        let report = run(&mut det, &converging(0.0, 5200.0), 0.0);
        assert_eq!(report.detected.len(), 1);
        assert_eq!(report.active.len(), 1);
        let c = &report.detected[0];
        assert_eq!(c.time_to_conflict, 120.0);
        assert!((c.min_separation_nm - 2.0).abs() < 0.05, "sep {}", c.min_separation_nm);
        assert_eq!(c.conflict_type, ConflictType::SeparationViolation);
        assert_eq!(c.status, ConflictStatus::Detected);
        assert!((c.vertical_ft - 200.0).abs() < 1e-9);
        assert_eq!(c.aircraft_a.as_str(), "TN:1/1:1");
    }

    #[test]
    fn test_identity_stable_across_cycles() {
        let mut det = ConflictDetector::default();
        let tracks = converging(0.0, 5000.0);
        let mut pred = Predictor::default();
        let first = det.detect(&tracks, &mut pred, 0.0);
        let second = det.detect(&tracks, &mut pred, 1.0);
        assert_eq!(second.detected.len(), 0);
        assert_eq!(second.updated.len(), 1);
        assert_eq!(first.detected[0].id, second.updated[0].id);
        assert_eq!(det.total_detected, 1);
        assert_eq!(second.updated[0].detected_at, 0.0);
        assert_eq!(second.updated[0].updated_at, 1.0);
    }

    #[test]
    fn test_diverging_pair_not_in_conflict() {
        // Headings reversed: separation only grows, CPA is now
        let lat = 40.0;
        let tracks = vec![
            track(1, lat, -74.0, 5000.0, 270.0, 240.0, 0.0),
            track(2, lat + 1.0 / 60.0, -74.0, 5000.0, 90.0, 240.0, 0.0),
        ];
        let mut det = ConflictDetector::default();
        assert!(run(&mut det, &tracks, 0.0).active.is_empty());
    }

    #[test]
    fn test_wide_miss_not_in_conflict() {
        let lat: f64 = 40.0;
        let half = 8.0 / (60.0 * lat.to_radians().cos());
        let tracks = vec![
            track(1, lat, -74.0 - half, 5000.0, 90.0, 240.0, 0.0),
            track(2, lat + 4.0 / 60.0, -74.0 + half, 5000.0, 270.0, 240.0, 0.0),
        ];
        let mut det = ConflictDetector::default();
        assert!(run(&mut det, &tracks, 0.0).active.is_empty());
    }

    #[test]
    fn test_cpa_beyond_horizon_ignored() {
        let mut det = ConflictDetector::new(DetectorConfig {
            horizon_secs: 100.0,
            ..Default::default()
        });
        assert!(run(&mut det, &converging(0.0, 5000.0), 0.0).active.is_empty());
    }

    #[test]
    fn test_altitude_and_ground_classification() {
        let mut det = ConflictDetector::default();
        let c = &run(&mut det, &converging(0.0, 5800.0), 0.0).detected[0];
        assert_eq!(c.conflict_type, ConflictType::AltitudeConflict);

        let mut tracks = converging(0.0, 1600.0);
        tracks[0].altitude_ft = Some(800.0);
        let mut det = ConflictDetector::default();
        let c = &run(&mut det, &tracks, 0.0).detected[0];
        assert_eq!(c.conflict_type, ConflictType::GroundConflict);

        let mut tracks = converging(0.0, 5800.0);
        tracks[1].status = AircraftStatus::OnGround;
        let mut det = ConflictDetector::default();
        let c = &run(&mut det, &tracks, 0.0).detected[0];
        assert_eq!(c.conflict_type, ConflictType::GroundConflict);
    }

    #[test]
    fn test_unknown_altitude_is_conservative() {
        let mut tracks = converging(0.0, 9000.0);
        tracks[1].altitude_ft = None;
        let mut det = ConflictDetector::default();
        let c = &run(&mut det, &tracks, 0.0).detected[0];
        assert_eq!(c.vertical_ft, 0.0);
        assert_eq!(c.conflict_type, ConflictType::SeparationViolation);
    }

    #[test]
    fn test_stale_trajectories_skipped() {
        let mut det = ConflictDetector::default();
        let report = run(&mut det, &converging(0.0, 5000.0), 30.0);
        assert_eq!(report.tracks_predicted, 0);
        assert!(report.active.is_empty());
    }

    #[test]
    fn test_same_address_pair_skipped() {
        let mut tracks = converging(0.0, 5000.0);
        tracks[0].address = Some(0xABCDEF);
        tracks[1].address = Some(0xABCDEF);
        let mut det = ConflictDetector::default();
        assert!(run(&mut det, &tracks, 0.0).active.is_empty());
    }

    #[test]
    fn test_pair_resolved_when_absent() {
        let mut det = ConflictDetector::default();
        let id = run(&mut det, &converging(0.0, 5000.0), 0.0).detected[0].id.clone();
        let report = run(&mut det, &[], 5.0);
        assert_eq!(report.resolved.len(), 1);
        assert_eq!(report.resolved[0].id, id);
        assert_eq!(report.resolved[0].status, ConflictStatus::Resolved);
        assert_eq!(report.resolved[0].resolved_at, Some(5.0));
        assert!(det.active().is_empty());
        assert_eq!(det.history(1.0, 5.0).len(), 1);
        assert_eq!(det.total_resolved, 1);
    }

    #[test]
    fn test_update_status_forward_only() {
        let mut det = ConflictDetector::default();
        let id = run(&mut det, &converging(0.0, 5000.0), 0.0).detected[0].id.clone();

        let r = det.update_status(&id, ConflictStatus::Acknowledged, 1.0).unwrap();
        assert_eq!(r.status, ConflictStatus::Acknowledged);
        assert!(det.update_status(&id, ConflictStatus::Acknowledged, 1.5).is_ok());
        assert_eq!(
            det.update_status(&id, ConflictStatus::Detected, 2.0),
            Err(ConflictError::InvalidTransition {
                from: "ACKNOWLEDGED".into(),
                to: "DETECTED".into()
            })
        );
        assert_eq!(
            det.update_status("nope", ConflictStatus::Resolving, 2.0),
            Err(ConflictError::UnknownConflict("nope".into()))
        );
    }

    #[test]
    fn test_status_survives_cycles() {
        let mut det = ConflictDetector::default();
        let tracks = converging(0.0, 5000.0);
        let id = run(&mut det, &tracks, 0.0).detected[0].id.clone();
        det.update_status(&id, ConflictStatus::Resolving, 0.5).unwrap();
        let report = run(&mut det, &tracks, 1.0);
        assert_eq!(report.updated[0].status, ConflictStatus::Resolving);
    }

    #[test]
    fn test_external_resolve_then_redetect() {
        let mut det = ConflictDetector::default();
        let tracks = converging(0.0, 5000.0);
        let id = run(&mut det, &tracks, 0.0).detected[0].id.clone();
        let r = det.update_status(&id, ConflictStatus::Resolved, 1.0).unwrap();
        assert_eq!(r.resolved_at, Some(1.0));
        assert!(det.get(&id).is_none());

        let report = run(&mut det, &tracks, 2.0);
        assert_eq!(report.detected.len(), 1);
        assert_ne!(report.detected[0].id, id);
    }

    #[test]
    fn test_attach_resolutions() {
        let mut det = ConflictDetector::default();
        let id = run(&mut det, &converging(0.0, 5000.0), 0.0).detected[0].id.clone();
        det.attach_resolutions(&id, vec![ResolutionOption::manual_intervention()])
            .unwrap();
        assert_eq!(det.get(&id).unwrap().resolutions.len(), 1);
        assert!(det.attach_resolutions("missing", vec![]).is_err());
    }

    #[test]
    fn test_statistics() {
        let mut det = ConflictDetector::default();
        run(&mut det, &converging(0.0, 5000.0), 0.0);
        let stats = det.statistics();
        assert_eq!(stats.active, 1);
        assert_eq!(stats.total_detected, 1);
        assert_eq!(stats.by_type[&ConflictType::SeparationViolation], 1);
        assert_eq!(stats.by_status[&ConflictStatus::Detected], 1);
        assert_eq!(stats.mean_time_to_conflict, Some(120.0));

        run(&mut det, &[], 5.0);
        let stats = det.statistics();
        assert_eq!(stats.active, 0);
        assert_eq!(stats.history_size, 1);
        assert_eq!(stats.mean_time_to_conflict, None);
    }

    #[test]
    fn test_history_purged_after_retention() {
        let mut det = ConflictDetector::default();
        run(&mut det, &converging(0.0, 5000.0), 0.0);
        run(&mut det, &[], 10.0);
        assert_eq!(det.purge_history(10.0 + 23.0 * 3600.0), 0);
        assert_eq!(det.history(48.0, 10.0 + 23.0 * 3600.0).len(), 1);
        assert_eq!(det.history(1.0, 10.0 + 23.0 * 3600.0).len(), 0);
        assert_eq!(det.purge_history(10.0 + 24.0 * 3600.0 + 1.0), 1);
    }

    #[test]
    fn test_head_on_example_scenario() {
        // A northbound and B southbound on the same meridian, 1.2 NM apart,
        // 200 kt each, same altitude, both seen at t0.
        let t0 = 1000.0;
        let tracks = vec![
            track(1, 40.70, -74.00, 5000.0, 0.0, 200.0, t0),
            track(2, 40.72, -74.00, 5000.0, 180.0, 200.0, t0),
        ];
        let mut det = ConflictDetector::default();
        let report = run(&mut det, &tracks, t0 + 1.0);
        assert_eq!(report.detected.len(), 1);
        let c = &report.detected[0];
        assert_eq!(c.conflict_type, ConflictType::SeparationViolation);
        assert_eq!(c.severity, Severity::Critical);
        assert!(c.time_to_conflict > 0.0 && c.time_to_conflict <= 10.0);
    }

    #[test]
    fn test_severity_escalates_as_cpa_nears() {
        // 12 NM head-on at 400 kt closing: CPA ~108 s after t0. Tracks are
        // refreshed every 5 s cycle.
        let t0 = 0.0;
        let mut det = ConflictDetector::default();
        let mut pred = Predictor::default();
        let mut severities = Vec::new();
        let mut ids = Vec::new();
        for cycle in 0..14 {
            let now = t0 + 1.0 + cycle as f64 * 5.0;
            let moved = 200.0 * (now - t0) / 3600.0 / 60.0;
            let tracks = vec![
                track(1, 40.6 + moved, -74.0, 5000.0, 0.0, 200.0, now),
                track(2, 40.8 - moved, -74.0, 5000.0, 180.0, 200.0, now),
            ];
            let report = det.detect(&tracks, &mut pred, now);
            if let Some(c) = report.active.first() {
                severities.push(c.severity);
                ids.push(c.id.clone());
            }
        }
        assert!(!severities.is_empty());
        assert!(severities.windows(2).all(|w| w[0] <= w[1]), "{severities:?}");
        assert_eq!(severities.first(), Some(&Severity::High));
        assert_eq!(severities.last(), Some(&Severity::Critical));
        assert!(ids.windows(2).all(|w| w[0] == w[1]));
    }
}

//! Straight-line trajectory prediction with a per-track cache.
//!
//! A prediction extrapolates the track's last position along its velocity
//! vector, sampled every `step` seconds from `now` to `now + horizon`
//! inclusive. Confidence decays with data age; the lateral uncertainty
//! radius grows with it.

use std::collections::HashMap;

use serde::Serialize;

use crate::geo;
use crate::tracker::Track;
use crate::types::{AircraftStatus, TrackKey};

pub const DEFAULT_HORIZON_SECS: f64 = 300.0;
pub const DEFAULT_STEP_SECS: f64 = 10.0;

/// Most samples a single prediction may hold.
pub const MAX_SAMPLES: usize = 10_000;

/// Age at which confidence reaches zero.
pub const DEFAULT_CONFIDENCE_WINDOW_SECS: f64 = 30.0;

/// Confidence multiplier for tracks of unknown flight status.
const UNKNOWN_STATUS_PENALTY: f64 = 0.8;

/// Uncertainty radius at zero age, NM.
const BASE_UNCERTAINTY_NM: f64 = 0.1;

/// Uncertainty growth, NM per second of data age.
const UNCERTAINTY_GROWTH_NM_PER_SEC: f64 = 0.02;

/// One predicted position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PredictionSample {
    pub time: f64,
    pub lat: f64,
    pub lon: f64,
    pub altitude_ft: Option<f64>,
}

/// Predicted trajectory of one track.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrajectoryPrediction {
    /// The track as it was when the prediction was computed.
    pub track: Track,
    pub computed_at: f64,
    pub horizon: f64,
    pub step: f64,
    pub samples: Vec<PredictionSample>,
    pub confidence: f64,
    pub uncertainty_nm: f64,
}

impl TrajectoryPrediction {
    /// Usable for conflict detection: data is younger than the confidence
    /// window.
    pub fn is_fresh(&self) -> bool {
        self.confidence > 0.0
    }
}

/// Confidence in [0, 1] for data `age` seconds old.
pub fn confidence(age: f64, window: f64, status: AircraftStatus) -> f64 {
    let base = (1.0 - age.max(0.0) / window).clamp(0.0, 1.0);
    if status == AircraftStatus::Unknown {
        base * UNKNOWN_STATUS_PENALTY
    } else {
        base
    }
}

/// Lateral uncertainty radius in NM for data `age` seconds old.
pub fn uncertainty_nm(age: f64) -> f64 {
    BASE_UNCERTAINTY_NM + UNCERTAINTY_GROWTH_NM_PER_SEC * age.max(0.0)
}

/// Extrapolate a track. Returns `None` for tracks without a position or
/// without a velocity, and when `horizon / step` exceeds [`MAX_SAMPLES`].
pub fn predict(track: &Track, now: f64, horizon: f64, step: f64, window: f64) -> Option<TrajectoryPrediction> {
    track.position()?;
    track.velocity?;
    if !(step > 0.0 && horizon >= 0.0 && horizon / step <= MAX_SAMPLES as f64) {
        return None;
    }

    let count = (horizon / step).floor() as usize;
    let samples = (0..=count)
        .filter_map(|k| sample_at(track, now + k as f64 * step))
        .collect();

    let age = now - track.last_update;
    Some(TrajectoryPrediction {
        track: track.clone(),
        computed_at: now,
        horizon,
        step,
        samples,
        confidence: confidence(age, window, track.status),
        uncertainty_nm: uncertainty_nm(age),
    })
}

/// Position of `track` at `time` along its last velocity vector.
fn sample_at(track: &Track, time: f64) -> Option<PredictionSample> {
    let (lat, lon) = track.position()?;
    let velocity = track.velocity?;
    let dt = time - track.position_time.unwrap_or(track.last_update);
    let (plat, plon) = geo::destination(lat, lon, velocity.heading_deg(), velocity.speed_kt() * dt / 3600.0);
    let vrate = track.vertical_rate_fpm.unwrap_or(0.0);
    Some(PredictionSample {
        time,
        lat: plat,
        lon: plon,
        altitude_ft: track.altitude_ft.map(|alt| alt + vrate * dt / 60.0),
    })
}

impl TrajectoryPrediction {
    /// The same extrapolation seen from a later `now`.
    ///
    /// Samples before `now` are dropped and the tail is extended so the
    /// first sample is at `now` and the last at `now + horizon`, as a fresh
    /// prediction would have them. Confidence and uncertainty follow the age
    /// of `last_update` at `now`.
    fn rebased(&self, now: f64, last_update: f64, window: f64) -> TrajectoryPrediction {
        let count = (self.horizon / self.step).floor() as usize + 1;
        let shift = (now - self.computed_at) / self.step;
        let whole = shift.round();

        let mut samples: Vec<PredictionSample> = if (shift - whole).abs() < 1e-9 {
            self.samples.iter().skip(whole as usize).copied().collect()
        } else {
            // Off the cached grid
            Vec::with_capacity(count)
        };
        while samples.len() < count {
            let time = now + samples.len() as f64 * self.step;
            match sample_at(&self.track, time) {
                Some(sample) => samples.push(sample),
                None => break,
            }
        }

        let age = now - last_update;
        TrajectoryPrediction {
            track: self.track.clone(),
            computed_at: self.computed_at,
            horizon: self.horizon,
            step: self.step,
            samples,
            confidence: confidence(age, window, self.track.status),
            uncertainty_nm: uncertainty_nm(age),
        }
    }
}

// ---------------------------------------------------------------------------
// Predictor with cache
// ---------------------------------------------------------------------------

/// Computes predictions and reuses them per track while the source position
/// and the prediction parameters are unchanged.
pub struct Predictor {
    pub horizon: f64,
    pub step: f64,
    pub confidence_window: f64,
    /// Cached entries older than this are dropped on prune.
    pub freshness: f64,
    cache: HashMap<TrackKey, TrajectoryPrediction>,

    // Counters
    pub cache_hits: u64,
    pub cache_misses: u64,
}

impl Default for Predictor {
    fn default() -> Self {
        Predictor::new(
            DEFAULT_HORIZON_SECS,
            DEFAULT_STEP_SECS,
            DEFAULT_CONFIDENCE_WINDOW_SECS,
            5.0,
        )
    }
}

impl Predictor {
    pub fn new(horizon: f64, step: f64, confidence_window: f64, freshness: f64) -> Self {
        Predictor {
            horizon,
            step,
            confidence_window,
            freshness,
            cache: HashMap::new(),
            cache_hits: 0,
            cache_misses: 0,
        }
    }

    /// Prediction for a track at `now`, from cache when still valid.
    ///
    /// A cached prediction is reused, re-based to `now`, while it is at most
    /// `freshness` seconds old and was computed from the same position and
    /// position time with the same parameters. A newer position replaces the
    /// entry for that track only.
    pub fn predict(&mut self, track: &Track, now: f64) -> Option<TrajectoryPrediction> {
        if let Some(cached) = self.cache.get(&track.key) {
            let age = now - cached.computed_at;
            if (0.0..=self.freshness).contains(&age)
                && cached.horizon == self.horizon
                && cached.step == self.step
                && same_position(&cached.track, track)
            {
                self.cache_hits += 1;
                return Some(cached.rebased(now, track.last_update, self.confidence_window));
            }
        }

        self.cache_misses += 1;
        let prediction = predict(track, now, self.horizon, self.step, self.confidence_window);
        match &prediction {
            Some(p) => {
                self.cache.insert(track.key.clone(), p.clone());
            }
            None => {
                self.cache.remove(&track.key);
            }
        }
        prediction
    }

    /// Drop the cached prediction of a track.
    pub fn invalidate(&mut self, key: &TrackKey) {
        self.cache.remove(key);
    }

    /// Drop entries computed more than `freshness` seconds before `now`.
    pub fn prune(&mut self, now: f64) {
        let freshness = self.freshness;
        self.cache.retain(|_, p| now - p.computed_at <= freshness);
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }
}

fn same_position(a: &Track, b: &Track) -> bool {
    a.position() == b.position() && a.position_time == b.position_time
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::Velocity;
    use crate::types::DataSource;

    fn track(lat: f64, lon: f64, heading: f64, speed: f64, t: f64) -> Track {
        let mut tr = Track::new(TrackKey::from("TN:1/1:1"), DataSource::new(1, 1), t);
        tr.lat = Some(lat);
        tr.lon = Some(lon);
        tr.altitude_ft = Some(5000.0);
        tr.position_time = Some(t);
        tr.velocity = Some(Velocity::from_polar(speed, heading));
        tr.status = AircraftStatus::Airborne;
        tr
    }

    #[test]
    fn test_sample_count_and_spacing() {
        let p = predict(&track(40.0, -74.0, 0.0, 200.0, 0.0), 0.0, 300.0, 10.0, 30.0).unwrap();
        assert_eq!(p.samples.len(), 31);
        assert_eq!(p.samples[0].time, 0.0);
        assert_eq!(p.samples[30].time, 300.0);
    }

    #[test]
    fn test_linear_extrapolation_north() {
        let p = predict(&track(40.0, -74.0, 0.0, 360.0, 0.0), 0.0, 60.0, 10.0, 30.0).unwrap();
        // 360 kt for 60 s is 6 NM, one tenth of a degree of latitude
        let last = p.samples.last().unwrap();
        let d = geo::haversine_nm(40.0, -74.0, last.lat, last.lon);
        assert!((d - 6.0).abs() < 1e-6);
        assert!(last.lat > 40.09 && last.lat < 40.11);
    }

    #[test]
    fn test_extrapolates_from_position_time() {
        // Position observed at t=0, predicted from now=10
        let p = predict(&track(40.0, -74.0, 90.0, 360.0, 0.0), 10.0, 0.0, 10.0, 30.0).unwrap();
        let d = geo::haversine_nm(40.0, -74.0, p.samples[0].lat, p.samples[0].lon);
        assert!((d - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_altitude_follows_vertical_rate() {
        let mut t = track(40.0, -74.0, 0.0, 200.0, 0.0);
        t.vertical_rate_fpm = Some(-1200.0);
        let p = predict(&t, 0.0, 60.0, 30.0, 30.0).unwrap();
        let alts: Vec<_> = p.samples.iter().map(|s| s.altitude_ft.unwrap()).collect();
        assert_eq!(alts, vec![5000.0, 4400.0, 3800.0]);
    }

    #[test]
    fn test_no_prediction_without_velocity() {
        let mut t = track(40.0, -74.0, 0.0, 200.0, 0.0);
        t.velocity = None;
        assert!(predict(&t, 0.0, 300.0, 10.0, 30.0).is_none());
        t.lat = None;
        assert!(predict(&t, 0.0, 300.0, 10.0, 30.0).is_none());
    }

    #[test]
    fn test_sample_count_bounded() {
        let t = track(40.0, -74.0, 0.0, 200.0, 0.0);
        assert!(predict(&t, 0.0, 300.0, 1e-9, 30.0).is_none());
        let p = predict(&t, 0.0, MAX_SAMPLES as f64, 1.0, 30.0).unwrap();
        assert_eq!(p.samples.len(), MAX_SAMPLES + 1);
    }

    #[test]
    fn test_confidence_decay() {
        assert_eq!(confidence(0.0, 30.0, AircraftStatus::Airborne), 1.0);
        assert_eq!(confidence(15.0, 30.0, AircraftStatus::Airborne), 0.5);
        assert_eq!(confidence(30.0, 30.0, AircraftStatus::Airborne), 0.0);
        assert_eq!(confidence(45.0, 30.0, AircraftStatus::OnGround), 0.0);
        assert_eq!(confidence(0.0, 30.0, AircraftStatus::Unknown), 0.8);
    }

    #[test]
    fn test_uncertainty_growth() {
        assert_eq!(uncertainty_nm(0.0), 0.1);
        assert!((uncertainty_nm(10.0) - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_freshness() {
        let t = track(40.0, -74.0, 0.0, 200.0, 0.0);
        assert!(predict(&t, 29.0, 60.0, 10.0, 30.0).unwrap().is_fresh());
        assert!(!predict(&t, 30.0, 60.0, 10.0, 30.0).unwrap().is_fresh());
    }

    #[test]
    fn test_cache_hit_and_invalidation() {
        let mut pred = Predictor::default();
        let mut t = track(40.0, -74.0, 0.0, 200.0, 0.0);
        pred.predict(&t, 1.0).unwrap();
        pred.predict(&t, 1.0).unwrap();
        assert_eq!(pred.cache_hits, 1);
        assert_eq!(pred.cache_misses, 1);

        // New position on the track invalidates its entry
        t.lat = Some(40.01);
        t.position_time = Some(0.5);
        let p = pred.predict(&t, 1.0).unwrap();
        assert_eq!(pred.cache_misses, 2);
        assert_eq!(p.track.lat, Some(40.01));

        // Past the freshness window recomputes
        pred.predict(&t, 6.5).unwrap();
        assert_eq!(pred.cache_misses, 3);
    }

    #[test]
    fn test_cache_reused_across_cycles() {
        let mut pred = Predictor::default();
        let mut t = track(40.0, -74.0, 0.0, 200.0, 0.0);
        for now in [1.0, 3.0, 5.0] {
            pred.predict(&t, now).unwrap();
        }
        assert_eq!(pred.cache_hits, 2);
        assert_eq!(pred.cache_misses, 1);

        // Non-position updates keep the entry
        t.altitude_ft = Some(5100.0);
        t.last_update = 4.0;
        pred.predict(&t, 5.0).unwrap();
        assert_eq!(pred.cache_hits, 3);

        // A newer position does not
        t.lat = Some(40.02);
        t.position_time = Some(4.5);
        pred.predict(&t, 5.0).unwrap();
        assert_eq!(pred.cache_misses, 2);
    }

    #[test]
    fn test_cached_prediction_rebased_to_now() {
        let t = track(40.0, -74.0, 45.0, 300.0, 0.0);
        let mut pred = Predictor::new(300.0, 10.0, 30.0, 20.0);
        pred.predict(&t, 0.0).unwrap();

        // On the cached grid (shift of one step) and off it
        for now in [10.0, 13.0] {
            let hit = pred.predict(&t, now).unwrap();
            let fresh = predict(&t, now, 300.0, 10.0, 30.0).unwrap();
            assert_eq!(hit.samples.len(), fresh.samples.len());
            assert_eq!(hit.samples[0].time, now);
            for (a, b) in hit.samples.iter().zip(&fresh.samples) {
                assert!((a.time - b.time).abs() < 1e-9);
                assert!(geo::haversine_nm(a.lat, a.lon, b.lat, b.lon) < 1e-9);
                assert_eq!(a.altitude_ft, b.altitude_ft);
            }
            assert_eq!(hit.confidence, fresh.confidence);
            assert_eq!(hit.uncertainty_nm, fresh.uncertainty_nm);
        }
        assert_eq!(pred.cache_hits, 2);
    }

    #[test]
    fn test_cache_per_track() {
        let mut pred = Predictor::default();
        let a = track(40.0, -74.0, 0.0, 200.0, 0.0);
        let mut b = track(41.0, -74.0, 0.0, 200.0, 0.0);
        b.key = TrackKey::from("TN:1/1:2");
        pred.predict(&a, 1.0);
        pred.predict(&b, 1.0);
        pred.invalidate(&b.key);
        assert_eq!(pred.cached(), 1);
        pred.predict(&a, 1.0);
        assert_eq!(pred.cache_hits, 1);
    }

    #[test]
    fn test_prune() {
        let mut pred = Predictor::default();
        pred.predict(&track(40.0, -74.0, 0.0, 200.0, 0.0), 0.0);
        pred.prune(5.0);
        assert_eq!(pred.cached(), 1);
        pred.prune(5.1);
        assert_eq!(pred.cached(), 0);
    }
}

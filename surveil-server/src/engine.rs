//! Service facade over the core: ingest, snapshots, subscriptions,
//! detection cycles and conflict lifecycle.
//!
//! Ingest is synchronous and never touches the network. Detection reads a
//! copy of the track store, so bursts arriving mid-cycle do not change the
//! aircraft set a cycle considers. Resolution requests run as spawned tasks
//! and attach their options to the record later.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use surveil_core::config::Config;
use surveil_core::conflict::{
    ConflictDetector, ConflictRecord, ConflictStatistics, ConflictStatus, CycleReport,
    ResolutionOption,
};
use surveil_core::decode::decode_burst;
use surveil_core::predict::Predictor;
use surveil_core::tracker::{Track, TrackStore};
use surveil_core::types::{unix_now, ConfigError, ConflictError, TrackKey};

use crate::resolution::{
    resolve_with_fallback, AircraftSummary, ConflictDescription, FallbackProvider,
    HttpResolutionProvider, ResolutionProvider,
};

/// Capacity of each subscription channel. Slow subscribers lose the oldest
/// messages and are told how many they missed.
pub const CHANNEL_CAPACITY: usize = 256;

/// Pushed to aircraft subscribers after each burst and eviction pass.
#[derive(Debug, Clone, Serialize)]
pub struct AircraftUpdate {
    pub timestamp: f64,
    pub updated: Vec<Track>,
    pub evicted: Vec<TrackKey>,
}

/// Pushed to conflict subscribers whenever the conflict set changes.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "conflict", rename_all = "snake_case")]
pub enum ConflictEvent {
    Detected(ConflictRecord),
    Updated(ConflictRecord),
    Resolved(ConflictRecord),
    StatusChanged(ConflictRecord),
    ResolutionsAttached(ConflictRecord),
}

impl ConflictEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ConflictEvent::Detected(_) => "detected",
            ConflictEvent::Updated(_) => "updated",
            ConflictEvent::Resolved(_) => "resolved",
            ConflictEvent::StatusChanged(_) => "status_changed",
            ConflictEvent::ResolutionsAttached(_) => "resolutions_attached",
        }
    }
}

/// Resolution provider for a configuration: HTTP when a URL is set,
/// otherwise the manual-intervention fallback.
pub fn provider_for(config: &Config) -> Arc<dyn ResolutionProvider> {
    match &config.resolution.url {
        Some(url) => Arc::new(HttpResolutionProvider::new(
            url,
            Duration::from_millis(config.resolution.timeout_ms),
        )),
        None => Arc::new(FallbackProvider),
    }
}

pub struct Engine {
    tracks: RwLock<TrackStore>,
    predictor: Mutex<Predictor>,
    detector: RwLock<ConflictDetector>,
    config: RwLock<Config>,
    resolver: RwLock<Arc<dyn ResolutionProvider>>,
    aircraft_tx: broadcast::Sender<AircraftUpdate>,
    conflict_tx: broadcast::Sender<ConflictEvent>,
}

impl Engine {
    /// Build an engine from an already validated configuration.
    pub fn new(config: Config, resolver: Arc<dyn ResolutionProvider>) -> Self {
        let (aircraft_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (conflict_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Engine {
            tracks: RwLock::new(TrackStore::new(
                config.site_registry(),
                config.tracks.stale_after_secs,
            )),
            predictor: Mutex::new(config.predictor()),
            detector: RwLock::new(ConflictDetector::new(config.detector_config())),
            config: RwLock::new(config),
            resolver: RwLock::new(resolver),
            aircraft_tx,
            conflict_tx,
        }
    }

    /// Validate `config` and build an engine with the matching provider.
    pub fn from_config(config: Config) -> Result<Self, ConfigError> {
        config.validate()?;
        let resolver = provider_for(&config);
        Ok(Engine::new(config, resolver))
    }

    // -----------------------------------------------------------------------
    // Ingest
    // -----------------------------------------------------------------------

    /// Decode a burst, apply every record and return the live snapshot.
    pub fn process_burst(&self, burst: &[u8]) -> Vec<Track> {
        self.process_burst_at(burst, unix_now())
    }

    pub fn process_burst_at(&self, burst: &[u8], now: f64) -> Vec<Track> {
        let decoded = decode_burst(burst, now);
        for err in &decoded.errors {
            warn!(error = %err, "dropped surveillance data");
        }

        let mut tracks = self.tracks.write().unwrap_or_else(PoisonError::into_inner);
        let mut touched = BTreeSet::new();
        for record in &decoded.records {
            touched.insert(tracks.apply(record));
        }
        let updated: Vec<Track> = touched
            .iter()
            .filter_map(|k| tracks.get(k).cloned())
            .collect();
        let snapshot = tracks.snapshot(now);
        drop(tracks);

        debug!(
            bytes = burst.len(),
            records = decoded.records.len(),
            errors = decoded.errors.len(),
            tracks = snapshot.len(),
            "burst processed"
        );
        if !updated.is_empty() {
            let _ = self.aircraft_tx.send(AircraftUpdate {
                timestamp: now,
                updated,
                evicted: Vec::new(),
            });
        }
        snapshot
    }

    pub fn aircraft_snapshot(&self) -> Vec<Track> {
        self.aircraft_snapshot_at(unix_now())
    }

    pub fn aircraft_snapshot_at(&self, now: f64) -> Vec<Track> {
        self.tracks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot(now)
    }

    // -----------------------------------------------------------------------
    // Subscriptions
    // -----------------------------------------------------------------------

    pub fn subscribe_aircraft(&self) -> broadcast::Receiver<AircraftUpdate> {
        self.aircraft_tx.subscribe()
    }

    pub fn subscribe_conflicts(&self) -> broadcast::Receiver<ConflictEvent> {
        self.conflict_tx.subscribe()
    }

    fn publish(&self, event: ConflictEvent) {
        // No receivers is fine
        let _ = self.conflict_tx.send(event);
    }

    // -----------------------------------------------------------------------
    // Detection
    // -----------------------------------------------------------------------

    /// Run one detection cycle at `now`: evict stale tracks, detect over a
    /// snapshot, publish the changes and request resolutions for newly
    /// detected conflicts.
    pub fn run_detection_cycle(self: &Arc<Self>, now: f64) -> CycleReport {
        let evicted = self
            .tracks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .evict_stale(now);
        if !evicted.is_empty() {
            let _ = self.aircraft_tx.send(AircraftUpdate {
                timestamp: now,
                updated: Vec::new(),
                evicted,
            });
        }

        let snapshot = self.aircraft_snapshot_at(now);
        let report = {
            let mut predictor = self.predictor.lock().unwrap_or_else(PoisonError::into_inner);
            let mut detector = self.detector.write().unwrap_or_else(PoisonError::into_inner);
            detector.detect(&snapshot, &mut predictor, now)
        };

        if !report.detected.is_empty() || !report.resolved.is_empty() {
            info!(
                detected = report.detected.len(),
                resolved = report.resolved.len(),
                active = report.active.len(),
                "conflict set changed"
            );
        }

        for record in &report.detected {
            self.publish(ConflictEvent::Detected(record.clone()));
            self.request_resolutions(record, &snapshot);
        }
        for record in &report.updated {
            self.publish(ConflictEvent::Updated(record.clone()));
        }
        for record in &report.resolved {
            self.publish(ConflictEvent::Resolved(record.clone()));
        }
        report
    }

    fn request_resolutions(self: &Arc<Self>, record: &ConflictRecord, snapshot: &[Track]) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!(conflict = %record.id, "no runtime, resolutions not requested");
            return;
        };
        let provider = self
            .resolver
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let description = ConflictDescription::from(record);
        let aircraft: Vec<AircraftSummary> = snapshot
            .iter()
            .filter(|t| t.key == record.aircraft_a || t.key == record.aircraft_b)
            .map(AircraftSummary::from)
            .collect();
        let engine = Arc::clone(self);
        handle.spawn(async move {
            let options = resolve_with_fallback(provider.as_ref(), &description, &aircraft).await;
            engine.attach_resolutions(&description.id, options);
        });
    }

    /// Store resolution options on a still-active conflict and notify
    /// subscribers. Options for a conflict that has since resolved are
    /// dropped.
    pub fn attach_resolutions(&self, id: &str, options: Vec<ResolutionOption>) {
        let result = self
            .detector
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .attach_resolutions(id, options);
        match result {
            Ok(record) => {
                debug!(conflict = id, count = record.resolutions.len(), "resolutions attached");
                self.publish(ConflictEvent::ResolutionsAttached(record));
            }
            Err(e) => debug!(conflict = id, error = %e, "resolutions dropped"),
        }
    }

    // -----------------------------------------------------------------------
    // Conflict lifecycle and aggregates
    // -----------------------------------------------------------------------

    pub fn update_conflict_status(
        &self,
        id: &str,
        status: ConflictStatus,
    ) -> Result<ConflictRecord, ConflictError> {
        let record = self
            .detector
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .update_status(id, status, unix_now())?;
        self.publish(ConflictEvent::StatusChanged(record.clone()));
        Ok(record)
    }

    pub fn active_conflicts(&self) -> Vec<ConflictRecord> {
        self.detector
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .active()
    }

    pub fn conflict(&self, id: &str) -> Option<ConflictRecord> {
        self.detector
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    pub fn conflict_history(&self, window_hours: f64) -> Vec<ConflictRecord> {
        self.conflict_history_at(window_hours, unix_now())
    }

    pub fn conflict_history_at(&self, window_hours: f64, now: f64) -> Vec<ConflictRecord> {
        self.detector
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .history(window_hours, now)
    }

    pub fn conflict_statistics(&self) -> ConflictStatistics {
        self.detector
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .statistics()
    }

    // -----------------------------------------------------------------------
    // Configuration
    // -----------------------------------------------------------------------

    pub fn config(&self) -> Config {
        self.config.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn interval_ms(&self) -> u64 {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .detection
            .interval_ms
    }

    /// Validate and apply a new configuration to every component. On error
    /// the running configuration is left untouched.
    pub fn apply_config(&self, config: Config) -> Result<(), ConfigError> {
        config.validate()?;
        {
            let mut tracks = self.tracks.write().unwrap_or_else(PoisonError::into_inner);
            tracks.set_sites(config.site_registry());
            tracks.stale_after = config.tracks.stale_after_secs;
        }
        *self.predictor.lock().unwrap_or_else(PoisonError::into_inner) = config.predictor();
        self.detector
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .config = config.detector_config();
        *self.resolver.write().unwrap_or_else(PoisonError::into_inner) = provider_for(&config);
        info!(
            sites = config.sites.len(),
            interval_ms = config.detection.interval_ms,
            horizontal_nm = config.separation.horizontal_nm,
            "configuration applied"
        );
        *self.config.write().unwrap_or_else(PoisonError::into_inner) = config;
        Ok(())
    }

    /// Drop all track, prediction and conflict state.
    pub fn clear(&self) {
        self.tracks.write().unwrap_or_else(PoisonError::into_inner).clear();
        self.predictor.lock().unwrap_or_else(PoisonError::into_inner).clear();
        self.detector.write().unwrap_or_else(PoisonError::into_inner).clear();
        info!("engine state cleared");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

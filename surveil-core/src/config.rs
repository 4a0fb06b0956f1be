//! Configuration file management for surveil.
//!
//! Reads/writes `~/.surveil/config.toml` with separation standards, detection
//! cadence, alert tiers, track staleness, the resolution collaborator, the
//! HTTP listener and the radar-site table.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::conflict::{AlertTier, AlertTiers, DetectorConfig};
use crate::predict::{Predictor, MAX_SAMPLES};
use crate::sites::{RadarSite, SiteRegistry};
use crate::types::ConfigError;

/// Full configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub separation: SeparationConfig,
    pub detection: DetectionConfig,
    pub alerts: AlertTiers,
    pub tracks: TrackConfig,
    pub resolution: ResolutionConfig,
    pub server: ServerConfig,
    pub sites: Vec<RadarSite>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeparationConfig {
    pub horizontal_nm: f64,
    pub vertical_ft: f64,
    pub low_altitude_ft: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    pub horizon_secs: f64,
    pub step_secs: f64,
    pub interval_ms: u64,
    pub history_retention_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackConfig {
    pub stale_after_secs: f64,
    pub confidence_window_secs: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionConfig {
    pub url: Option<String>,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for SeparationConfig {
    fn default() -> Self {
        SeparationConfig {
            horizontal_nm: 3.0,
            vertical_ft: 500.0,
            low_altitude_ft: 1000.0,
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        DetectionConfig {
            horizon_secs: 300.0,
            step_secs: 10.0,
            interval_ms: 5000,
            history_retention_hours: 24.0,
        }
    }
}

impl Default for TrackConfig {
    fn default() -> Self {
        TrackConfig {
            stale_after_secs: 60.0,
            confidence_window_secs: 30.0,
        }
    }
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        ResolutionConfig {
            url: None,
            timeout_ms: 3000,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".into(),
            port: 8080,
        }
    }
}

impl Config {
    /// Reject values the detector cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sep = &self.separation;
        positive("separation.horizontal_nm", sep.horizontal_nm)?;
        positive("separation.vertical_ft", sep.vertical_ft)?;
        if !(sep.low_altitude_ft.is_finite() && sep.low_altitude_ft >= 0.0) {
            return Err(invalid("separation.low_altitude_ft must be >= 0"));
        }

        let det = &self.detection;
        positive("detection.horizon_secs", det.horizon_secs)?;
        positive("detection.step_secs", det.step_secs)?;
        positive("detection.history_retention_hours", det.history_retention_hours)?;
        if det.interval_ms == 0 {
            return Err(invalid("detection.interval_ms must be > 0"));
        }
        if det.step_secs > det.horizon_secs {
            return Err(invalid("detection.step_secs must not exceed detection.horizon_secs"));
        }
        if det.horizon_secs / det.step_secs > MAX_SAMPLES as f64 {
            return Err(invalid(&format!(
                "detection.horizon_secs / detection.step_secs must not exceed {MAX_SAMPLES} samples"
            )));
        }

        let tiers = [
            ("alerts.critical", self.alerts.critical),
            ("alerts.high", self.alerts.high),
            ("alerts.medium", self.alerts.medium),
        ];
        for (name, tier) in tiers {
            positive(&format!("{name}.separation_nm"), tier.separation_nm)?;
            positive(&format!("{name}.time_secs"), tier.time_secs)?;
        }
        if !nested(self.alerts.critical, self.alerts.high) || !nested(self.alerts.high, self.alerts.medium) {
            return Err(invalid("alert tiers must be nested: critical <= high <= medium"));
        }

        positive("tracks.stale_after_secs", self.tracks.stale_after_secs)?;
        positive("tracks.confidence_window_secs", self.tracks.confidence_window_secs)?;
        if self.resolution.timeout_ms == 0 {
            return Err(invalid("resolution.timeout_ms must be > 0"));
        }

        let mut seen = HashSet::new();
        for site in &self.sites {
            if !(site.reliability > 0.0 && site.reliability <= 1.0) {
                return Err(invalid(&format!(
                    "site {}/{} reliability must be in (0, 1]",
                    site.sac, site.sic
                )));
            }
            if !(-90.0..=90.0).contains(&site.lat) || !(-180.0..=180.0).contains(&site.lon) {
                return Err(invalid(&format!("site {}/{} origin out of range", site.sac, site.sic)));
            }
            if !seen.insert(site.source()) {
                return Err(invalid(&format!("duplicate site {}/{}", site.sac, site.sic)));
            }
        }
        Ok(())
    }

    pub fn detector_config(&self) -> DetectorConfig {
        DetectorConfig {
            horizontal_nm: self.separation.horizontal_nm,
            vertical_ft: self.separation.vertical_ft,
            low_altitude_ft: self.separation.low_altitude_ft,
            horizon_secs: self.detection.horizon_secs,
            tiers: self.alerts,
            history_retention_secs: self.detection.history_retention_hours * 3600.0,
        }
    }

    /// Predictor whose cache stays valid for one detection cycle.
    pub fn predictor(&self) -> Predictor {
        Predictor::new(
            self.detection.horizon_secs,
            self.detection.step_secs,
            self.tracks.confidence_window_secs,
            self.detection.interval_ms as f64 / 1000.0,
        )
    }

    pub fn site_registry(&self) -> SiteRegistry {
        SiteRegistry::from_sites(&self.sites)
    }
}

fn positive(name: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(&format!("{name} must be > 0, got {value}")))
    }
}

fn nested(inner: AlertTier, outer: AlertTier) -> bool {
    inner.separation_nm <= outer.separation_nm && inner.time_secs <= outer.time_secs
}

fn invalid(msg: &str) -> ConfigError {
    ConfigError::Invalid(msg.to_string())
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

/// Get the config directory path (`~/.surveil/`).
pub fn config_dir() -> PathBuf {
    dirs_home().join(".surveil")
}

/// Get the config file path.
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Parse and validate config text.
pub fn parse_config(text: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(text)?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`, or `~/.surveil/config.toml` when `None`.
///
/// A missing file yields the defaults; an unreadable or invalid one is an
/// error.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(config_file);
    if !path.exists() {
        return Ok(Config::default());
    }
    let text = std::fs::read_to_string(&path)?;
    parse_config(&text)
}

/// Save config to `path`, or `~/.surveil/config.toml` when `None`.
pub fn save_config(config: &Config, path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(config_file);
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let text = toml::to_string_pretty(config)?;
    std::fs::write(&path, text)?;
    Ok(path)
}

/// Write the default config to `path` (or `~/.surveil/config.toml`) unless
/// a file is already there. Returns the path written, or `None` when an
/// existing file was left alone.
pub fn write_defaults(path: Option<&Path>) -> Result<Option<PathBuf>, ConfigError> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(config_file);
    if path.exists() {
        return Ok(None);
    }
    save_config(&Config::default(), Some(&path)).map(Some)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

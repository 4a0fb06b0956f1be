//! Resolution-suggestion collaborator.
//!
//! Conflicts are described to an external service which answers with
//! resolution options. Any failure (transport, timeout, bad payload, empty
//! answer) degrades to the single manual-intervention fallback.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use surveil_core::conflict::{ConflictRecord, ConflictType, ResolutionOption, Severity};
use surveil_core::tracker::Track;
use surveil_core::types::TrackKey;

#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("resolution request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("resolution request timed out after {0} ms")]
    Timeout(u64),
    #[error("invalid resolution response: {0}")]
    InvalidResponse(String),
}

/// What the collaborator is told about a conflict.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConflictDescription {
    pub id: String,
    pub conflict_type: ConflictType,
    pub severity: Severity,
    pub time_to_conflict: f64,
    pub min_separation_nm: f64,
    pub horizontal_nm: f64,
    pub vertical_ft: f64,
    pub cpa_lat: f64,
    pub cpa_lon: f64,
}

impl From<&ConflictRecord> for ConflictDescription {
    fn from(r: &ConflictRecord) -> Self {
        ConflictDescription {
            id: r.id.clone(),
            conflict_type: r.conflict_type,
            severity: r.severity,
            time_to_conflict: r.time_to_conflict,
            min_separation_nm: r.min_separation_nm,
            horizontal_nm: r.horizontal_nm,
            vertical_ft: r.vertical_ft,
            cpa_lat: r.cpa_lat,
            cpa_lon: r.cpa_lon,
        }
    }
}

/// Kinematic summary of one involved aircraft.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AircraftSummary {
    pub key: TrackKey,
    pub callsign: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub altitude_ft: Option<f64>,
    pub heading_deg: Option<f64>,
    pub ground_speed_kt: Option<f64>,
    pub vertical_rate_fpm: Option<f64>,
}

impl From<&Track> for AircraftSummary {
    fn from(t: &Track) -> Self {
        AircraftSummary {
            key: t.key.clone(),
            callsign: t.callsign.clone(),
            lat: t.lat,
            lon: t.lon,
            altitude_ft: t.altitude_ft,
            heading_deg: t.heading_deg,
            ground_speed_kt: t.ground_speed_kt,
            vertical_rate_fpm: t.vertical_rate_fpm,
        }
    }
}

/// Source of resolution options for a conflict.
#[async_trait]
pub trait ResolutionProvider: Send + Sync {
    async fn generate_resolutions(
        &self,
        conflict: &ConflictDescription,
        aircraft: &[AircraftSummary],
    ) -> Result<Vec<ResolutionOption>, CollaboratorError>;
}

/// Provider used when no collaborator is configured.
pub struct FallbackProvider;

#[async_trait]
impl ResolutionProvider for FallbackProvider {
    async fn generate_resolutions(
        &self,
        _conflict: &ConflictDescription,
        _aircraft: &[AircraftSummary],
    ) -> Result<Vec<ResolutionOption>, CollaboratorError> {
        Ok(vec![ResolutionOption::manual_intervention()])
    }
}

#[derive(Serialize)]
struct ResolutionRequest<'a> {
    conflict: &'a ConflictDescription,
    aircraft: &'a [AircraftSummary],
}

#[derive(Deserialize)]
struct ResolutionResponse {
    resolutions: Vec<ResolutionOption>,
}

/// POSTs the conflict as JSON and reads `{"resolutions": [...]}` back.
#[derive(Clone)]
pub struct HttpResolutionProvider {
    url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpResolutionProvider {
    pub fn new(url: &str, timeout: Duration) -> Self {
        HttpResolutionProvider {
            url: url.to_string(),
            client: reqwest::Client::new(),
            timeout,
        }
    }

    async fn request(
        &self,
        conflict: &ConflictDescription,
        aircraft: &[AircraftSummary],
    ) -> Result<Vec<ResolutionOption>, CollaboratorError> {
        let body = ResolutionRequest { conflict, aircraft };
        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        let bytes = response.bytes().await?;
        let parsed: ResolutionResponse = serde_json::from_slice(&bytes)
            .map_err(|e| CollaboratorError::InvalidResponse(e.to_string()))?;
        Ok(parsed.resolutions)
    }
}

#[async_trait]
impl ResolutionProvider for HttpResolutionProvider {
    async fn generate_resolutions(
        &self,
        conflict: &ConflictDescription,
        aircraft: &[AircraftSummary],
    ) -> Result<Vec<ResolutionOption>, CollaboratorError> {
        match tokio::time::timeout(self.timeout, self.request(conflict, aircraft)).await {
            Ok(result) => result,
            Err(_) => Err(CollaboratorError::Timeout(self.timeout.as_millis() as u64)),
        }
    }
}

/// Ask the provider, substituting the manual-intervention fallback on any
/// failure or an empty answer. Never fails.
pub async fn resolve_with_fallback(
    provider: &dyn ResolutionProvider,
    conflict: &ConflictDescription,
    aircraft: &[AircraftSummary],
) -> Vec<ResolutionOption> {
    match provider.generate_resolutions(conflict, aircraft).await {
        Ok(options) if !options.is_empty() => {
            debug!(conflict = %conflict.id, count = options.len(), "resolutions received");
            options
        }
        Ok(_) => {
            warn!(conflict = %conflict.id, "collaborator returned no resolutions, using fallback");
            vec![ResolutionOption::manual_intervention()]
        }
        Err(e) => {
            warn!(conflict = %conflict.id, error = %e, "resolution collaborator failed, using fallback");
            vec![ResolutionOption::manual_intervention()]
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

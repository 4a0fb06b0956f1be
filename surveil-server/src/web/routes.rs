//! REST API route handlers.
//!
//! Handlers are thin: every call goes straight to the engine, which owns
//! locking. Conflict changes are also pushed as server-sent events.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use futures_util::stream::{self, Stream};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use surveil_core::conflict::ConflictStatus;
use surveil_core::types::ConflictError;

use crate::web::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct HistoryParams {
    hours: Option<f64>,
}

#[derive(Deserialize)]
pub struct StatusBody {
    status: ConflictStatus,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn clamp(val: f64, min: f64, max: f64) -> f64 {
    val.max(min).min(max)
}

fn to_json<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(json!(null))
}

// ---------------------------------------------------------------------------
// Ingest
// ---------------------------------------------------------------------------

/// POST /api/v1/bursts: raw surveillance data blocks.
pub async fn api_ingest_burst(State(state): State<Arc<AppState>>, body: Bytes) -> impl IntoResponse {
    if body.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "empty burst"})),
        );
    }
    let tracks = state.engine.process_burst(&body);
    (
        StatusCode::OK,
        Json(json!({
            "count": tracks.len(),
            "aircraft": to_json(&tracks),
        })),
    )
}

// ---------------------------------------------------------------------------
// Aircraft
// ---------------------------------------------------------------------------

/// GET /api/aircraft: live track snapshot.
pub async fn api_aircraft(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let tracks = state.engine.aircraft_snapshot();
    Json(json!({
        "count": tracks.len(),
        "aircraft": to_json(&tracks),
    }))
}

/// GET /api/aircraft/stream: server-sent track updates and evictions.
pub async fn api_aircraft_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let rx = state.engine.subscribe_aircraft();
    let events = stream::unfold(rx, |mut rx| async move {
        let item = match rx.recv().await {
            Ok(update) => Event::default().event("aircraft").json_data(&update),
            Err(RecvError::Lagged(missed)) => {
                warn!(missed, "aircraft stream subscriber lagged");
                Ok(Event::default().event("lagged").data(missed.to_string()))
            }
            Err(RecvError::Closed) => return None,
        };
        Some((item, rx))
    });
    Sse::new(events).keep_alive(KeepAlive::default())
}

// ---------------------------------------------------------------------------
// Conflicts
// ---------------------------------------------------------------------------

/// GET /api/conflicts: active conflicts.
pub async fn api_conflicts(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let conflicts = state.engine.active_conflicts();
    Json(json!({
        "count": conflicts.len(),
        "conflicts": to_json(&conflicts),
    }))
}

/// GET /api/conflicts/:id: one active conflict.
pub async fn api_conflict_detail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.engine.conflict(&id) {
        Some(record) => (StatusCode::OK, Json(to_json(&record))),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "Conflict not found"})),
        ),
    }
}

/// POST /api/conflicts/:id/status: externally driven lifecycle change.
pub async fn api_conflict_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<StatusBody>,
) -> impl IntoResponse {
    match state.engine.update_conflict_status(&id, body.status) {
        Ok(record) => (StatusCode::OK, Json(to_json(&record))),
        Err(e @ ConflictError::UnknownConflict(_)) => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": e.to_string()})),
        ),
        Err(e @ ConflictError::InvalidTransition { .. }) => (
            StatusCode::CONFLICT,
            Json(json!({"error": e.to_string()})),
        ),
    }
}

/// GET /api/conflicts/history?hours=N: resolved conflicts, newest first.
pub async fn api_conflict_history(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HistoryParams>,
) -> impl IntoResponse {
    let hours = clamp(params.hours.unwrap_or(24.0), 0.0, 720.0);
    let history = state.engine.conflict_history(hours);
    Json(json!({
        "hours": hours,
        "count": history.len(),
        "conflicts": to_json(&history),
    }))
}

/// GET /api/conflicts/stats: aggregate counters.
pub async fn api_conflict_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(to_json(&state.engine.conflict_statistics()))
}

/// GET /api/conflicts/stream: server-sent conflict events.
///
/// A subscriber that falls behind receives a `lagged` event carrying the
/// number of dropped events and continues from the oldest retained one.
pub async fn api_conflict_stream(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let rx = state.engine.subscribe_conflicts();
    let events = stream::unfold(rx, |mut rx| async move {
        let item = match rx.recv().await {
            Ok(event) => Event::default().event(event.name()).json_data(&event),
            Err(RecvError::Lagged(missed)) => {
                warn!(missed, "conflict stream subscriber lagged");
                Ok(Event::default().event("lagged").data(missed.to_string()))
            }
            Err(RecvError::Closed) => return None,
        };
        Some((item, rx))
    });
    Sse::new(events).keep_alive(KeepAlive::default())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

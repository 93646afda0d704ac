//! REST API route handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use airboard_core::feed::Completion;
use airboard_core::flight::FlightRecord;

use crate::lifecycle::LifecycleState;
use crate::web::AppState;

#[derive(Deserialize)]
pub struct LifecycleBody {
    state: LifecycleState,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn outcome_label(outcome: Option<Completion>) -> &'static str {
    match outcome {
        Some(Completion::Replaced { .. }) => "replaced",
        Some(Completion::Appended { .. }) => "appended",
        Some(Completion::Failed) => "failed",
        Some(Completion::Stale) => "stale",
        None => "skipped",
    }
}

/// Board columns, pre-formatted.
fn board_row(record: &FlightRecord) -> Value {
    json!({
        "flight": record.display_code(),
        "destination": record.destination(),
        "scheduled": record.scheduled_clock(),
        "estimated": record.estimated_clock(),
        "status": record.status.label(),
        "gate": record.gate_info(),
        "departure_epoch": record.departure_scheduled_epoch,
    })
}

fn board_json(state: &AppState) -> Value {
    let snapshot = state.controller.snapshot();
    let rows: Vec<Value> = snapshot.records.iter().map(board_row).collect();
    json!({
        "airport": state.airport,
        "rows": rows,
        "feed": snapshot,
    })
}

// ---------------------------------------------------------------------------
// Airport endpoints
// ---------------------------------------------------------------------------

/// GET /api/airport: the resolved airport and how it was chosen.
pub async fn api_airport(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "airport": state.airport,
        "is_fallback": state.resolution.is_fallback,
        "distance_km": state.resolution.distance_km,
    }))
}

/// GET /api/airports: the whole directory, in directory order.
pub async fn api_airports(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!(state.directory.airports()))
}

// ---------------------------------------------------------------------------
// Feed endpoints
// ---------------------------------------------------------------------------

/// GET /api/board: current feed snapshot.
pub async fn api_board(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(board_json(&state))
}

/// POST /api/refresh: full fetch; waits for it to land.
pub async fn api_refresh(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let outcome = state.controller.refresh().await;
    let mut body = board_json(&state);
    body["outcome"] = json!(outcome_label(outcome));
    Json(body)
}

/// POST /api/load-more: next page, if any.
pub async fn api_load_more(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let outcome = state.controller.load_more().await;
    let mut body = board_json(&state);
    body["outcome"] = json!(outcome_label(outcome));
    Json(body)
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// GET /api/lifecycle
pub async fn api_lifecycle_get(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "state": state.lifecycle.current(),
        "timer_armed": state.controller.is_timer_armed(),
    }))
}

/// POST /api/lifecycle: `{"state": "active" | "inactive" | "background"}`.
pub async fn api_lifecycle_set(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LifecycleBody>,
) -> impl IntoResponse {
    let changed = state.lifecycle.set(body.state);
    Json(json!({
        "state": state.lifecycle.current(),
        "changed": changed,
    }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

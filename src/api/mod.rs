//! HTTP surface of the service.
//!
//! Thin by design: a trigger endpoint for forecast runs, an injection
//! endpoint for completion signals and a health probe. All domain logic
//! lives in the engine and the rendezvous.

pub mod error;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::error;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::domain::ForecastRun;
use crate::engine::ForecastEngine;
use crate::signals::{CompletionPublisher, InboundSignal, SignalBus};
use crate::store::ForecastStore;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ForecastEngine>,
    pub store: Arc<dyn ForecastStore>,
    pub bus: SignalBus,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/runs", post(trigger_run))
        .route("/api/v1/runs/:request_id", get(get_run))
        .route("/api/v1/signals", post(inject_signal))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TriggerRunRequest {
    /// Minted if the upstream did not supply one.
    request_id: Option<String>,
    plant_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TriggerRunResponse {
    request_id: String,
}

/// Kick off a forecast run in the background.
///
/// A failed run is converted into an explicit-failure signal so the
/// rendezvous resolves immediately instead of waiting out its deadline.
async fn trigger_run(
    State(state): State<AppState>,
    Json(request): Json<TriggerRunRequest>,
) -> (StatusCode, Json<TriggerRunResponse>) {
    let request_id = request
        .request_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let engine = state.engine.clone();
    let bus = state.bus.clone();
    let id = request_id.clone();
    tokio::spawn(async move {
        if let Err(err) = engine
            .compute_forecast_run(&bus, &id, &request.plant_id)
            .await
        {
            error!(request_id = %id, plant_id = %request.plant_id, %err, "forecast run failed");
            bus.failed(&id).await;
        }
    });

    (
        StatusCode::ACCEPTED,
        Json(TriggerRunResponse { request_id }),
    )
}

async fn get_run(
    State(state): State<AppState>,
    Path(request_id): Path<String>,
) -> Result<Json<ForecastRun>, ApiError> {
    match state.store.get_run(&request_id).await? {
        Some(run) => Ok(Json(run)),
        None => Err(ApiError::NotFound(format!("forecast run {request_id}"))),
    }
}

async fn inject_signal(
    State(state): State<AppState>,
    Json(signal): Json<InboundSignal>,
) -> StatusCode {
    state.bus.send(signal);
    StatusCode::ACCEPTED
}

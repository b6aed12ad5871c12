//! JSON API for the call flow.
//!
//! Call endpoints:
//! - `POST /api/calls/start`                — verify the carrier, open a call
//! - `POST /api/calls/{call_id}/pitch`     — candidate loads for the carrier
//! - `POST /api/calls/{call_id}/negotiate` — run one negotiation round
//! - `POST /api/calls/{call_id}/end`       — close the call, book on acceptance
//! - `GET  /api/calls/{call_id}`           — call session detail
//! - `GET  /api/calls/{call_id}/rounds`    — negotiation history
//! - `GET  /api/rounds/group/{token}`      — rounds correlated by group token
//!
//! Load-board and carrier endpoints:
//! - `POST /api/loads`                     — create a load
//! - `POST /api/loads/search`              — filtered load search
//! - `GET  /api/loads/{load_id}`           — load detail
//! - `GET  /api/carriers/{mc_number}`      — stored verified carrier

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use loadline_core::negotiation::messages;
use loadline_core::orchestrator::{CallClosed, CallOrchestrator, CallStarted, RoundReply};
use loadline_core::{
    CallError, CallId, CallOutcome, CallSession, LoadId, LoadPreferences, LoadSnapshot,
    LoadStatus, NegotiationRound, Sentiment, StoredCarrier,
};
use loadline_db::{LoadSearch, SqlLoadCatalog};

#[derive(Clone)]
pub struct ApiState {
    pub orchestrator: Arc<CallOrchestrator>,
    pub loads: Arc<SqlLoadCatalog>,
}

#[derive(Debug, Deserialize)]
pub struct StartCallRequest {
    pub mc_number: String,
    pub load_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PitchRequest {
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub equipment_types: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct NegotiateRequest {
    pub offer: Decimal,
    pub group_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EndCallRequest {
    pub outcome: CallOutcome,
    pub sentiment: Sentiment,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoadCreateRequest {
    pub load_id: String,
    pub origin: String,
    pub destination: String,
    pub pickup_at: DateTime<Utc>,
    pub delivery_at: DateTime<Utc>,
    pub equipment_type: String,
    pub posted_rate: Decimal,
    pub weight_lbs: Option<f64>,
    pub miles: Option<f64>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoadSearchRequest {
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub equipment_type: Option<String>,
    pub min_rate: Option<Decimal>,
    pub max_rate: Option<Decimal>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    pub kind: &'static str,
}

type ApiFailure = (StatusCode, Json<ApiError>);

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/calls/start", post(start_call))
        .route("/api/calls/{call_id}/pitch", post(pitch_loads))
        .route("/api/calls/{call_id}/negotiate", post(negotiate))
        .route("/api/calls/{call_id}/end", post(end_call))
        .route("/api/calls/{call_id}", get(get_call))
        .route("/api/calls/{call_id}/rounds", get(get_rounds))
        .route("/api/rounds/group/{token}", get(get_rounds_by_group))
        .route("/api/loads", post(create_load))
        .route("/api/loads/search", post(search_loads))
        .route("/api/loads/{load_id}", get(get_load))
        .route("/api/carriers/{mc_number}", get(get_carrier))
        .with_state(state)
}

async fn start_call(
    State(state): State<ApiState>,
    Json(request): Json<StartCallRequest>,
) -> Result<Json<CallStarted>, ApiFailure> {
    if request.mc_number.trim().is_empty() {
        return Err(bad_request("mc_number must not be empty"));
    }

    let load_id = request.load_id.filter(|id| !id.trim().is_empty()).map(LoadId);
    let started = state.orchestrator.start_call(&request.mc_number, load_id).await.map_err(failure)?;
    Ok(Json(started))
}

async fn pitch_loads(
    State(state): State<ApiState>,
    Path(call_id): Path<String>,
    Json(request): Json<PitchRequest>,
) -> Result<Json<Vec<LoadSnapshot>>, ApiFailure> {
    let preferences = LoadPreferences {
        origin: request.origin,
        destination: request.destination,
        equipment_types: request.equipment_types,
    };
    let candidates = state
        .orchestrator
        .pitch_loads(&CallId(call_id), &preferences)
        .await
        .map_err(failure)?;
    Ok(Json(candidates))
}

async fn negotiate(
    State(state): State<ApiState>,
    Path(call_id): Path<String>,
    Json(request): Json<NegotiateRequest>,
) -> Result<Json<RoundReply>, ApiFailure> {
    if request.offer <= Decimal::ZERO {
        return Err(bad_request("offer must be a positive amount"));
    }

    let reply = state
        .orchestrator
        .negotiate(&CallId(call_id), request.offer, request.group_token)
        .await
        .map_err(failure)?;
    Ok(Json(reply))
}

async fn end_call(
    State(state): State<ApiState>,
    Path(call_id): Path<String>,
    Json(request): Json<EndCallRequest>,
) -> Result<Json<CallClosed>, ApiFailure> {
    let closed = state
        .orchestrator
        .end_call(&CallId(call_id), request.outcome, request.sentiment, request.notes)
        .await
        .map_err(failure)?;
    Ok(Json(closed))
}

async fn get_call(
    State(state): State<ApiState>,
    Path(call_id): Path<String>,
) -> Result<Json<CallSession>, ApiFailure> {
    let session = state.orchestrator.get_call(&CallId(call_id)).await.map_err(failure)?;
    Ok(Json(session))
}

async fn get_rounds(
    State(state): State<ApiState>,
    Path(call_id): Path<String>,
) -> Result<Json<Vec<NegotiationRound>>, ApiFailure> {
    let rounds = state.orchestrator.rounds_for_call(&CallId(call_id)).await.map_err(failure)?;
    Ok(Json(rounds))
}

async fn get_rounds_by_group(
    State(state): State<ApiState>,
    Path(token): Path<String>,
) -> Result<Json<Vec<NegotiationRound>>, ApiFailure> {
    let rounds = state.orchestrator.rounds_for_group(&token).await.map_err(failure)?;
    Ok(Json(rounds))
}

async fn get_carrier(
    State(state): State<ApiState>,
    Path(mc_number): Path<String>,
) -> Result<Json<StoredCarrier>, ApiFailure> {
    let carrier = state.orchestrator.carrier_profile(&mc_number).await.map_err(failure)?;
    carrier.map(Json).ok_or_else(|| {
        not_found(format!("carrier {mc_number} has not been verified"), "carrier_not_found")
    })
}

async fn create_load(
    State(state): State<ApiState>,
    Json(request): Json<LoadCreateRequest>,
) -> Result<(StatusCode, Json<LoadSnapshot>), ApiFailure> {
    if request.posted_rate <= Decimal::ZERO {
        return Err(bad_request("posted_rate must be a positive amount"));
    }
    if request.delivery_at <= request.pickup_at {
        return Err(bad_request("delivery_at must come after pickup_at"));
    }

    let load = LoadSnapshot {
        load_id: LoadId(request.load_id),
        origin: request.origin,
        destination: request.destination,
        pickup_at: request.pickup_at,
        delivery_at: request.delivery_at,
        equipment_type: request.equipment_type,
        posted_rate: request.posted_rate,
        weight_lbs: request.weight_lbs,
        miles: request.miles,
        notes: request.notes,
        status: LoadStatus::Available,
    };
    state.loads.create(&load).await.map_err(store_failure)?;
    Ok((StatusCode::CREATED, Json(load)))
}

async fn search_loads(
    State(state): State<ApiState>,
    Json(request): Json<LoadSearchRequest>,
) -> Result<Json<Vec<LoadSnapshot>>, ApiFailure> {
    let search = LoadSearch {
        origin: request.origin,
        destination: request.destination,
        equipment_type: request.equipment_type,
        min_rate: request.min_rate,
        max_rate: request.max_rate,
        limit: request.limit.unwrap_or(10).min(100),
    };
    let results = state.loads.search(&search).await.map_err(store_failure)?;
    Ok(Json(results))
}

async fn get_load(
    State(state): State<ApiState>,
    Path(load_id): Path<String>,
) -> Result<Json<LoadSnapshot>, ApiFailure> {
    use loadline_core::LoadCatalog;

    let load = state.loads.get(&LoadId(load_id.clone())).await.map_err(store_failure)?;
    load.map(Json)
        .ok_or_else(|| not_found(format!("load {load_id} not found"), "load_not_found"))
}

fn failure(error: CallError) -> ApiFailure {
    let kind = error.kind();
    let status = match kind {
        "carrier_not_found" | "carrier_ineligible" => StatusCode::UNPROCESSABLE_ENTITY,
        "lookup_failure" => StatusCode::SERVICE_UNAVAILABLE,
        "session_not_found" | "load_not_found" => StatusCode::NOT_FOUND,
        "no_load_bound" | "round_limit_exceeded" | "invalid_call_state" | "booking_conflict" => {
            StatusCode::CONFLICT
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    // The caller hears a retry prompt for transport failures; everything
    // else reports the structured error text.
    let message = if kind == "lookup_failure" {
        warn!(event_name = "api.lookup_degraded", error = %error, "lookup failure surfaced to caller");
        messages::verification_unavailable()
    } else {
        error.to_string()
    };

    (status, Json(ApiError { error: message, kind }))
}

fn store_failure(error: loadline_core::StoreError) -> ApiFailure {
    failure(CallError::Persistence(error.to_string()))
}

fn bad_request(message: &str) -> ApiFailure {
    (
        StatusCode::BAD_REQUEST,
        Json(ApiError { error: message.to_string(), kind: "invalid_request" }),
    )
}

fn not_found(message: String, kind: &'static str) -> ApiFailure {
    (StatusCode::NOT_FOUND, Json(ApiError { error: message, kind }))
}

//! JSON API over the published snapshot and the admin actions

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use crate::admin::AdminHandle;
use crate::binance::CandleSource;
use crate::config::Config;
use crate::error::{AdminError, FetchError};
use crate::report::{self, ReportOutcome};
use crate::state::SharedSnapshot;

pub struct AppState {
    pub config: Arc<Config>,
    pub snapshot: SharedSnapshot,
    pub admin: AdminHandle,
    pub source: Arc<dyn CandleSource>,
}

/// Error body returned by every endpoint
#[derive(Debug)]
pub enum ApiError {
    Admin(AdminError),
    Upstream(FetchError),
}

impl From<AdminError> for ApiError {
    fn from(e: AdminError) -> Self {
        ApiError::Admin(e)
    }
}

impl From<FetchError> for ApiError {
    fn from(e: FetchError) -> Self {
        ApiError::Upstream(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Admin(AdminError::Unauthorized) => StatusCode::FORBIDDEN,
            ApiError::Admin(AdminError::SignalNotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Admin(AdminError::LoopUnavailable) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
        };
        let message = match &self {
            ApiError::Admin(e) => e.to_string(),
            ApiError::Upstream(e) => e.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

// ── Request bodies ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SwitchRequest {
    password: String,
    active: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSignalRequest {
    password: String,
    signal_id: u64,
    observation: String,
}

#[derive(Debug, Deserialize)]
pub struct BroadcastRequest {
    password: String,
    message: String,
}

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    timeframe: Option<String>,
}

// ── Route definitions ────────────────────────────────────────────────────

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/dashboard-data", get(dashboard_data))
        .route("/api/report/{symbol}", get(instrument_report))
        .route("/admin/system-switch", post(system_switch))
        .route("/admin/update-signal", post(update_signal))
        .route("/admin/broadcast-message", post(broadcast_message))
}

pub async fn serve(state: Arc<AppState>, port: u16) -> anyhow::Result<()> {
    let app = routes().with_state(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!("JSON API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

// ── Handlers ─────────────────────────────────────────────────────────────

async fn dashboard_data(State(state): State<Arc<AppState>>) -> Json<Value> {
    let snapshot = state.snapshot.read().await;
    Json(json!({
        "market_summary": snapshot.market_summary,
        "alert_states": snapshot.alert_states,
        "history": snapshot.history,
        "system_active": state.admin.is_active(),
        "last_tick": snapshot.last_tick,
    }))
}

async fn instrument_report(
    State(state): State<Arc<AppState>>,
    Path(symbol): Path<String>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<ReportOutcome>, ApiError> {
    let symbol = symbol.to_uppercase();
    let timeframe = query
        .timeframe
        .or_else(|| state.config.scan.timeframes.first().cloned())
        .unwrap_or_else(|| "2h".to_string());

    let outcome =
        report::evaluate_instrument(state.source.as_ref(), &state.config, &symbol, &timeframe)
            .await?;
    Ok(Json(outcome))
}

async fn system_switch(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SwitchRequest>,
) -> Result<Json<Value>, ApiError> {
    let active = state.admin.set_active(&request.password, request.active)?;
    Ok(Json(json!({ "success": true, "system_active": active })))
}

async fn update_signal(
    State(state): State<Arc<AppState>>,
    Json(request): Json<UpdateSignalRequest>,
) -> Result<Json<Value>, ApiError> {
    let entry = state
        .admin
        .annotate(&request.password, request.signal_id, &request.observation)
        .await?;
    Ok(Json(json!({
        "success": true,
        "edited_messages": entry.sent_messages.len(),
        "entry": entry,
    })))
}

async fn broadcast_message(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BroadcastRequest>,
) -> Result<Json<Value>, ApiError> {
    let delivered = state
        .admin
        .broadcast(&request.password, &request.message)
        .await?;
    Ok(Json(json!({ "success": true, "delivered": delivered })))
}

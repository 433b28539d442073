//! HTTP route definitions

use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::{delete, get, post},
    Router,
};
use glam::DVec3;
use serde::{Deserialize, Serialize};
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use tracing::info;
use uuid::Uuid;

use crate::app::AppState;
use crate::physics::CubeId;
use crate::sim::{InboundEvent, SimError, SimStatus};
use crate::util::time::{unix_millis, uptime_secs};
use crate::ws::handler::ws_handler;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // CORS configuration - support multiple origins (comma-separated in CLIENT_ORIGIN)
    let allowed_origins: Vec<header::HeaderValue> = state
        .config
        .client_origin
        .split(',')
        .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true);

    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/debug", post(debug_handler))
        .route("/cubes", post(spawn_cube_handler))
        .route("/cubes/:id", delete(remove_cube_handler))
        .route("/ws", get(ws_handler))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Health and stats
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    tick: u64,
    cubes: usize,
    players: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = state.sim.status();

    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        tick: status.tick,
        cubes: status.cubes,
        players: status.players,
    })
}

async fn stats_handler(State(state): State<AppState>) -> Json<SimStatus> {
    Json(state.sim.status())
}

// ============================================================================
// Debug toggle
// ============================================================================

#[derive(Deserialize)]
struct DebugRequest {
    enabled: bool,
}

#[derive(Serialize)]
struct AcceptedResponse {
    status: &'static str,
}

async fn debug_handler(
    State(state): State<AppState>,
    Json(req): Json<DebugRequest>,
) -> Result<(StatusCode, Json<AcceptedResponse>), AppError> {
    info!(enabled = req.enabled, "Hit debug toggled");
    state
        .sim
        .send(InboundEvent::SetHitDebug {
            enabled: req.enabled,
        })?;

    Ok(accepted())
}

// ============================================================================
// Cube endpoints
// ============================================================================

#[derive(Deserialize)]
struct SpawnCubeRequest {
    #[serde(default)]
    player_id: Option<Uuid>,
    position: DVec3,
}

async fn spawn_cube_handler(
    State(state): State<AppState>,
    Json(req): Json<SpawnCubeRequest>,
) -> Result<(StatusCode, Json<AcceptedResponse>), AppError> {
    if !req.position.is_finite() {
        return Err(AppError::BadRequest("position must be finite".to_string()));
    }

    if let Some(player) = req.player_id {
        state
            .check_spawn_cooldown(player, unix_millis())
            .map_err(|remaining_ms| {
                AppError::TooManyRequests(format!("spawn available in {remaining_ms} ms"))
            })?;
    }

    state.sim.send(InboundEvent::SpawnCube {
        position: req.position,
        requested_by: req.player_id,
    })?;

    Ok(accepted())
}

async fn remove_cube_handler(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<(StatusCode, Json<AcceptedResponse>), AppError> {
    state.sim.send(InboundEvent::RemoveCube { cube: CubeId(id) })?;

    Ok(accepted())
}

fn accepted() -> (StatusCode, Json<AcceptedResponse>) {
    (StatusCode::ACCEPTED, Json(AcceptedResponse { status: "queued" }))
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Too many requests: {0}")]
    TooManyRequests(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl From<SimError> for AppError {
    fn from(err: SimError) -> Self {
        AppError::ServiceUnavailable(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::TooManyRequests(msg) => (StatusCode::TOO_MANY_REQUESTS, msg.clone()),
            AppError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}

//! Command, location, voice and edge endpoints

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use super::ApiState;
use crate::dispatch::{CommandAck, CommandArgs};
use crate::input::{ButtonId, Level};

/// A remote command: the name plus its optional arguments
#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub command: String,
    #[serde(flatten)]
    pub args: CommandArgs,
}

/// Coordinates from the client's GPS
#[derive(Debug, Deserialize)]
pub struct LocationRequest {
    pub latitude: f64,
    pub longitude: f64,
}

/// Recognized speech from the client
#[derive(Debug, Deserialize)]
pub struct VoiceRequest {
    pub text: String,
}

/// A raw button edge
#[derive(Debug, Deserialize)]
pub struct EdgeRequest {
    /// `BUTTON_1`..`BUTTON_4`, or just the number
    pub button: String,
    pub level: Level,
}

/// Generic acknowledgement
#[derive(Debug, Serialize)]
pub struct Accepted {
    pub status: &'static str,
}

/// Error body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Single distance reading
#[derive(Debug, Serialize)]
pub struct DistanceResponse {
    /// Centimetres, `-1.0` when the reading was invalid
    pub distance_cm: f64,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

const fn accepted() -> Json<Accepted> {
    Json(Accepted { status: "ok" })
}

/// Dispatch a named command
async fn command(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<CommandRequest>,
) -> Json<CommandAck> {
    tracing::info!(command = %request.command, "remote command received");
    Json(state.device.dispatch(&request.command, request.args))
}

/// Record the client location
async fn location(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<LocationRequest>,
) -> Result<Json<Accepted>, ApiError> {
    if !(-90.0..=90.0).contains(&request.latitude) || !(-180.0..=180.0).contains(&request.longitude)
    {
        return Err(bad_request("coordinates out of range"));
    }
    state
        .device
        .set_client_location(request.latitude, request.longitude);
    Ok(accepted())
}

/// Route text recognized on the client
async fn voice(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<VoiceRequest>,
) -> Result<Json<Accepted>, ApiError> {
    let text = request.text.trim();
    if text.is_empty() {
        return Err(bad_request("text is empty"));
    }
    state.device.on_voice_text(text);
    Ok(accepted())
}

/// Inject a raw edge, for hosts without GPIO
async fn edge(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<EdgeRequest>,
) -> Result<Json<Accepted>, ApiError> {
    let button: ButtonId = request
        .button
        .parse()
        .map_err(|e: crate::Error| bad_request(e.to_string()))?;
    if !state.device.on_edge(button, request.level) {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: "edge queue unavailable".to_string(),
            }),
        ));
    }
    Ok(accepted())
}

/// Take one distance reading
async fn distance(State(state): State<Arc<ApiState>>) -> Result<Json<DistanceResponse>, ApiError> {
    let device = Arc::clone(&state.device);
    let distance_cm = tokio::task::spawn_blocking(move || device.get_distance())
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
        })?;
    Ok(Json(DistanceResponse { distance_cm }))
}

/// Build command router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/command", post(command))
        .route("/api/location", post(location))
        .route("/api/voice", post(voice))
        .route("/api/edge", post(edge))
        .route("/api/distance", get(distance))
        .with_state(state)
}

//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    domain::RoomKey,
    infrastructure::dto::http::{HealthDto, RoomSummaryDto},
    ui::state::AppState,
};

/// Health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthDto> {
    Json(HealthDto {
        status: "ok".to_string(),
        uptime: state.started_at.elapsed().as_secs(),
    })
}

/// Get list of rooms
pub async fn get_rooms(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<RoomSummaryDto>>, StatusCode> {
    let rooms = state.hub.rooms().await.map_err(|e| {
        tracing::error!("Failed to list rooms: {}", e);
        StatusCode::SERVICE_UNAVAILABLE
    })?;

    // Domain Model から DTO への変換
    Ok(Json(rooms.into_iter().map(RoomSummaryDto::from).collect()))
}

/// Get room detail by key
pub async fn get_room_detail(
    State(state): State<Arc<AppState>>,
    Path(room_key): Path<String>,
) -> Result<Json<RoomSummaryDto>, StatusCode> {
    let room_key = RoomKey::required(Some(&room_key)).map_err(|_| StatusCode::NOT_FOUND)?;

    match state.hub.room(room_key).await {
        Ok(Some(room)) => Ok(Json(room.into())),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!("Failed to get room detail: {}", e);
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

//! Request handlers.
//!
//! Each handler maps one route onto a single namespace of the store. Bodies
//! are taken as raw bytes and returned as `application/octet-stream`.

use super::error::ApiError;
use super::AppState;
use crate::storage::{Namespace, StoredValue};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

/// Key under which the health check records its last run.
pub const HEALTH_CHECK_KEY: &str = "last-health-check";

const SCENE_ID_DIGITS: u32 = 16;

#[derive(Debug, Serialize)]
pub struct StoredResponse {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct CreatedSceneResponse {
    pub id: String,
    /// Path the scene can be fetched from.
    pub data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TouchedResponse {
    pub id: String,
    pub updated_at: String,
}

/// A fresh random id of exactly 16 decimal digits.
fn generate_scene_id() -> String {
    let id = Uuid::new_v4().as_u128() % 10u128.pow(SCENE_ID_DIGITS);
    format!("{:0width$}", id, width = SCENE_ID_DIGITS as usize)
}

async fn read_blob(state: &AppState, id: &str, namespace: Namespace) -> Result<Response, ApiError> {
    let value = state
        .store
        .get(id, namespace)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("{} {}", namespace, id)))?;

    debug!(%namespace, id, "Read record");
    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        value.into_bytes(),
    )
        .into_response())
}

async fn write_blob(
    state: &AppState,
    id: &str,
    body: Bytes,
    namespace: Namespace,
) -> Result<(), ApiError> {
    if !state.store.set(id, StoredValue::Binary(body), namespace).await? {
        return Err(ApiError::Internal(format!("could not store {} {}", namespace, id)));
    }
    debug!(%namespace, id, "Stored record");
    Ok(())
}

/// GET /scenes/{id}
pub async fn get_scene(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    read_blob(&state, &id, Namespace::Scenes).await
}

/// POST /scenes - Store a scene under a newly generated id.
pub async fn create_scene(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<CreatedSceneResponse>, ApiError> {
    let mut id = generate_scene_id();
    while state.store.has(&id, Namespace::Scenes).await? {
        id = generate_scene_id();
    }

    write_blob(&state, &id, body, Namespace::Scenes).await?;

    let data = format!("/api/v2/scenes/{}", id);
    Ok(Json(CreatedSceneResponse { id, data }))
}

/// GET /rooms/{id}
pub async fn get_room(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    read_blob(&state, &id, Namespace::Rooms).await
}

/// PUT /rooms/{id}
pub async fn put_room(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<StoredResponse>, ApiError> {
    write_blob(&state, &id, body, Namespace::Rooms).await?;
    Ok(Json(StoredResponse { id }))
}

/// GET /files/{id}
pub async fn get_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    read_blob(&state, &id, Namespace::Files).await
}

/// PUT /files/{id}
pub async fn put_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<StoredResponse>, ApiError> {
    write_blob(&state, &id, body, Namespace::Files).await?;
    Ok(Json(StoredResponse { id }))
}

/// PATCH /files/{id}/timestamp - Refresh a file's expiry.
pub async fn touch_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TouchedResponse>, ApiError> {
    if !state.store.touch(&id, Namespace::Files).await {
        warn!(id = %id, "Touch target not found");
        return Err(ApiError::NotFound(format!("file {}", id)));
    }

    let updated_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    debug!(id = %id, %updated_at, "Refreshed file expiry");
    Ok(Json(TouchedResponse { id, updated_at }))
}

/// GET /health - Write a heartbeat through the store.
pub async fn health(State(state): State<AppState>) -> Result<&'static str, ApiError> {
    let timestamp = Utc::now().timestamp_millis().to_string();
    state
        .store
        .set(HEALTH_CHECK_KEY, timestamp.into(), Namespace::Settings)
        .await?;
    Ok("healthy")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_ids_are_sixteen_digits() {
        for _ in 0..100 {
            let id = generate_scene_id();
            assert_eq!(id.len(), 16);
            assert!(id.chars().all(|c| c.is_ascii_digit()));
        }
    }
}

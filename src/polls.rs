use crate::db::models::Poll;
use crate::error::PollError;
use crate::startup::AppState;
use axum::{
    extract::{Extension, Json, Path},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

// Request/Response DTOs
#[derive(Debug, Deserialize)]
pub struct CreatePollRequest {
    #[serde(default)]
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct PollMessageResponse {
    pub msg: String,
    pub vote: Poll,
}

/// Create a new poll
pub async fn create_poll(
    Extension(app_state): Extension<AppState>,
    Json(payload): Json<CreatePollRequest>,
) -> Result<impl IntoResponse, PollError> {
    let poll = app_state.ingress.create_poll(&payload.question).await?;

    let response = PollMessageResponse {
        msg: "Vote saved successfully".to_string(),
        vote: poll,
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// Get all polls
pub async fn list_polls(
    Extension(app_state): Extension<AppState>,
) -> Result<impl IntoResponse, PollError> {
    let polls = app_state.ingress.list_polls().await.inspect_err(|e| {
        error!("Error fetching votes: {}", e);
    })?;

    Ok((StatusCode::OK, Json(polls)))
}

/// Get a single poll with its current tally
pub async fn get_poll(
    Extension(app_state): Extension<AppState>,
    Path(poll_id): Path<Uuid>,
) -> Result<impl IntoResponse, PollError> {
    let poll = app_state.ingress.get_poll(poll_id).await?;

    Ok((StatusCode::OK, Json(poll)))
}

/// Delete a poll and tear down its live state
pub async fn delete_poll(
    Extension(app_state): Extension<AppState>,
    Path(poll_id): Path<Uuid>,
) -> Result<impl IntoResponse, PollError> {
    let poll = app_state.ingress.delete_poll(poll_id).await?;

    let response = PollMessageResponse {
        msg: "Vote deleted successfully".to_string(),
        vote: poll,
    };

    Ok((StatusCode::OK, Json(response)))
}

pub async fn health(Extension(app_state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "polls": app_state.registry.len(),
            "subscribers": app_state.hub.subscriber_count(),
        })),
    )
}

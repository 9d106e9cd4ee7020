//! Request handlers.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{error, warn};

use super::AppState;
use crate::models::StorageEvent;
use crate::services::ProcessOutcome;

/// Health check endpoint for container orchestration.
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

fn error_body(status: StatusCode, message: String) -> Response {
    (
        status,
        Json(serde_json::json!({ "status": "error", "error": message })),
    )
        .into_response()
}

/// Process the upload described by a storage event.
pub async fn storage_event(State(state): State<AppState>, body: Bytes) -> Response {
    let event = match StorageEvent::from_trigger_body(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!("Rejecting trigger request: {}", e);
            return error_body(StatusCode::BAD_REQUEST, e.to_string());
        }
    };

    match state.pipeline.process_event(&event).await {
        Ok(outcome) => {
            let status = match &outcome {
                ProcessOutcome::Skipped { .. } => StatusCode::ACCEPTED,
                ProcessOutcome::Processed(report) if report.is_partial() => {
                    StatusCode::MULTI_STATUS
                }
                ProcessOutcome::Processed(_) => StatusCode::OK,
            };
            (status, Json(outcome)).into_response()
        }
        Err(e) => {
            error!("Processing {} failed: {}", event.gcs_uri(), e);
            error_body(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

// SPDX-FileCopyrightText: 2026 Pollgate Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the gateway REST API.
//!
//! Handles POST /v1/, GET /v1/{id} and the public GET /health.

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use pollgate_core::{PollgateError, RecordId, RecordStatus, Task};

use crate::server::{GatewayState, HealthState};

/// Request body for POST /v1/.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateRequest {
    /// Poll question.
    pub message: String,
    /// Poll options, in display order.
    pub buttons: Vec<String>,
}

/// Response body for POST /v1/.
#[derive(Debug, Serialize)]
pub struct CreateResponse {
    pub request_id: String,
}

/// Response body for GET /v1/{id}.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: RecordStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub option: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Response body for GET /health.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Health status string.
    pub status: String,
    /// Binary version.
    pub version: String,
    /// Seconds since the gateway started.
    pub uptime_secs: u64,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Short error category.
    pub error: String,
    /// Human-readable explanation.
    pub details: String,
}

/// Errors a handler can return, each with its status code.
#[derive(Debug)]
pub enum ApiError {
    Unprocessable(String),
    NotFound(String),
    Internal(String),
}

impl From<PollgateError> for ApiError {
    fn from(err: PollgateError) -> Self {
        match err {
            PollgateError::Validation(details) => ApiError::Unprocessable(details),
            PollgateError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, details) = match self {
            ApiError::Unprocessable(details) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "invalid request", details)
            }
            ApiError::NotFound(details) => (StatusCode::NOT_FOUND, "not found", details),
            ApiError::Internal(details) => {
                tracing::error!(error = %details, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error", details)
            }
        };
        (
            status,
            Json(ErrorResponse {
                error: error.to_string(),
                details,
            }),
        )
            .into_response()
    }
}

/// POST /v1/
///
/// Validates the task, stores a pending record and queues it for delivery.
pub async fn post_request(
    State(state): State<GatewayState>,
    body: Result<Json<CreateRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateResponse>), ApiError> {
    let Json(body) = body.map_err(|rejection| ApiError::Unprocessable(rejection.body_text()))?;
    let record = state
        .service
        .create(Task::new(body.message, body.buttons))
        .await?;
    tracing::info!(request_id = %record.id, "poll request created");
    Ok((
        StatusCode::CREATED,
        Json(CreateResponse {
            request_id: record.id.0,
        }),
    ))
}

/// GET /v1/{id}
///
/// Reports the record's status and, once answered, the chosen option.
pub async fn get_request(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    let record = state.service.get(&RecordId(id)).await?;
    Ok(Json(StatusResponse {
        status: record.status,
        option: record.selected_option,
        text: record.resolved_text,
    }))
}

/// GET /health (unauthenticated)
pub async fn get_public_health(State(health): State<HealthState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: health.start_time.elapsed().as_secs(),
    })
}

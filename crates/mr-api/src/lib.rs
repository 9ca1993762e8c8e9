//! MailRelay HTTP API
//!
//! - `POST /api/emails` accepts a mail message and returns `201` whether the
//!   message was sent or queued
//! - `GET /health` reports liveness

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use mr_common::{EmailResponse, MailMessage};
use mr_dispatch::{DispatchError, MailSender};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::error;

pub const INTERNAL_EXCEPTION: &str = "Internal exception";

#[derive(Clone)]
pub struct AppState {
    pub sender: Arc<dyn MailSender>,
}

/// Error body returned for rejected and failed requests
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub error_type: String,
    pub error_messages: Vec<String>,
    pub code: u16,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(Vec<String>),
    Internal,
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Validation(errors) => ApiError::BadRequest(errors),
            other => {
                error!(error = %other, "Email dispatch failed");
                ApiError::Internal
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(vec![rejection.body_text()])
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, messages) = match self {
            ApiError::BadRequest(messages) => (StatusCode::BAD_REQUEST, messages),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                vec![INTERNAL_EXCEPTION.to_string()],
            ),
        };

        let body = ErrorResponse {
            error_type: status.canonical_reason().unwrap_or_default().to_string(),
            error_messages: messages,
            code: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

pub fn create_router(sender: Arc<dyn MailSender>) -> Router {
    Router::new()
        .route("/api/emails", post(send_email_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { sender })
}

async fn send_email_handler(
    State(state): State<AppState>,
    payload: Result<Json<MailMessage>, JsonRejection>,
) -> Result<(StatusCode, Json<EmailResponse>), ApiError> {
    let Json(message) = payload?;
    let outcome = state.sender.send(message).await?;
    Ok((StatusCode::CREATED, Json(EmailResponse::from(&outcome))))
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "UP",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

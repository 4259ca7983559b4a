use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Message returned to Pipefile for structurally invalid deliveries.
pub const INVALID_PAYLOAD: &str = "Invalid webhook payload";

/// Application-specific error types.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AppError {
    /// Malformed inbound webhook payload.
    #[error("{0}")]
    Validation(String),
    /// Body exceeded the webhook size limit.
    #[error("Payload too large")]
    PayloadTooLarge,
    /// The OAuth refresh exchange did not produce an access token.
    #[error("Zoho authentication failed: {0}")]
    Auth(String),
    /// Zoho rejected a call, either by HTTP status or by the per-record status code.
    #[error("{message}")]
    CrmApi {
        /// Human readable summary.
        message: String,
        /// HTTP status of the response, when one was received.
        status: Option<u16>,
        /// Raw response body, kept for diagnostics.
        body: String,
    },
    /// Failure while preparing an attachment (download, size bound).
    #[error("Attachment failed: {0}")]
    Attachment(String),
    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Convenience constructor for the 400 path.
    pub fn invalid_payload() -> Self {
        AppError::Validation(INVALID_PAYLOAD.to_string())
    }

    /// A CRM failure where no response was received (transport error, timeout).
    pub fn crm_transport(context: &str, err: reqwest::Error) -> Self {
        AppError::CrmApi {
            message: format!("{}: {}", context, err),
            status: None,
            body: String::new(),
        }
    }
}

impl IntoResponse for AppError {
    /// Converts the error into the webhook acknowledgement.
    ///
    /// Only validation failures and oversized bodies produce a non-2xx status. Every other variant is
    /// logged and acknowledged with HTTP 200 and `success: false`, so Pipefile
    /// never retries a delivery because of an internal failure.
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Validation(msg) => {
                tracing::warn!("Rejected webhook payload: {}", msg);
                StatusCode::BAD_REQUEST
            }
            AppError::PayloadTooLarge => {
                tracing::warn!("Rejected oversized webhook body");
                StatusCode::PAYLOAD_TOO_LARGE
            }
            AppError::CrmApi { message, status, body } => {
                tracing::error!(
                    status = ?status,
                    body = %body,
                    "Error processing webhook: {}",
                    message
                );
                StatusCode::OK
            }
            other => {
                tracing::error!("Error processing webhook: {}", other);
                StatusCode::OK
            }
        };

        let body = Json(json!({
            "success": false,
            "error": self.to_string(),
        }));

        (status, body).into_response()
    }
}

//! Webhook Endpoint Error Types
//!
//! Every failure the endpoint can report to the upstream platform. The HTTP
//! mapping is fixed: the platform only ever sees these bodies, never handler
//! internals.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

/// Errors surfaced by the webhook endpoint
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// Handshake carried the wrong mode or verify token
    #[error("Webhook verification failed")]
    VerificationFailed,

    /// Signature header present but does not match the body
    #[error("Signature mismatch: {0}")]
    SignatureMismatch(String),

    /// Signature header absent while `require_signature` is enabled
    #[error("Signature header missing")]
    SignatureMissing,

    /// Body is not JSON or does not have the top-level payload structure
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Verb other than GET/POST on the webhook route
    #[error("Method not allowed")]
    MethodNotAllowed,
}

impl WebhookError {
    /// HTTP status reported for this error
    pub fn status(&self) -> StatusCode {
        match self {
            Self::VerificationFailed | Self::SignatureMismatch(_) | Self::SignatureMissing => {
                StatusCode::FORBIDDEN
            }
            Self::MalformedPayload(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        }
    }

    /// Public message placed in the `error` field of the JSON body
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::VerificationFailed => "Verification failed",
            Self::SignatureMismatch(_) | Self::SignatureMissing => "Invalid signature",
            Self::MalformedPayload(_) => "Internal server error",
            Self::MethodNotAllowed => "Method not allowed",
        }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        (
            self.status(),
            Json(serde_json::json!({ "error": self.public_message() })),
        )
            .into_response()
    }
}

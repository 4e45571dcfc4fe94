//! Graph API error types

use thiserror::Error;

/// Errors returned by the Graph API client
#[derive(Debug, Error)]
pub enum GraphError {
    /// Transport failure, timeout or undecodable body
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Upstream answered with an error envelope
    #[error("{message}")]
    Api {
        status: u16,
        message: String,
        code: Option<i64>,
    },

    /// Success status with a body that does not match the expected shape
    #[error("Unexpected response from Graph API: {0}")]
    UnexpectedResponse(String),

    #[error("Could not find recipient in conversation {0}")]
    RecipientNotFound(String),
}

impl GraphError {
    /// Label used for the Graph request metric
    pub(crate) fn status_label(&self) -> String {
        match self {
            GraphError::Http(e) => e
                .status()
                .map(|s| s.as_u16().to_string())
                .unwrap_or_else(|| "transport".to_string()),
            GraphError::Api { status, .. } => status.to_string(),
            GraphError::UnexpectedResponse(_) => "unexpected".to_string(),
            GraphError::RecipientNotFound(_) => "not_found".to_string(),
        }
    }
}

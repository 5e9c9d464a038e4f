//! Error taxonomy shared by every fetch and mutation path.

use shared::error::{ApiError, ErrorCode};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("network failure: {0}")]
    Network(String),
    #[error("session expired or missing; log in again")]
    Unauthorized,
    #[error("not found: {path}")]
    NotFound { path: String },
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("{}", rejected_message(.status, .message))]
    ServerRejected { status: u16, message: Option<String> },
    #[error("failed to load {path}: {reason}")]
    FetchFailed {
        path: String,
        status: Option<u16>,
        reason: String,
    },
    #[error("session storage failure: {0:#}")]
    Storage(anyhow::Error),
    #[error("invalid configuration: {0}")]
    Configuration(String),
}

fn rejected_message(status: &u16, message: &Option<String>) -> String {
    match message {
        Some(message) => message.clone(),
        None => format!("request failed with status {status}"),
    }
}

impl ClientError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Network(_) | Self::Storage(_) | Self::Configuration(_) => {
                ErrorCode::NetworkFailure
            }
            Self::FetchFailed {
                status: Some(status),
                ..
            }
            | Self::ServerRejected { status, .. } => ErrorCode::from_status(*status),
            Self::FetchFailed { status: None, .. } => ErrorCode::NetworkFailure,
            Self::Unauthorized => ErrorCode::Unauthorized,
            Self::NotFound { .. } => ErrorCode::NotFound,
            Self::Validation(_) => ErrorCode::Validation,
        }
    }

    /// The caller should drop to the login route.
    pub fn requires_reauth(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }

    /// Re-labels a list/detail fetch failure. Auth and not-found pass through.
    pub(crate) fn into_fetch_failure(self, path: &str) -> Self {
        match self {
            Self::Network(reason) => Self::FetchFailed {
                path: path.to_string(),
                status: None,
                reason,
            },
            Self::ServerRejected { status, message } => Self::FetchFailed {
                path: path.to_string(),
                status: Some(status),
                reason: rejected_message(&status, &message),
            },
            other => other,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(value: reqwest::Error) -> Self {
        Self::Network(value.to_string())
    }
}

impl From<&ClientError> for ApiError {
    fn from(value: &ClientError) -> Self {
        ApiError::new(value.code(), value.to_string())
    }
}

//! View state shared by every list and detail controller.

use std::fmt;

use crate::error::ClientError;

/// Why a fetch was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchTrigger {
    Mount,
    IdChanged,
    PageChanged,
    PostMutation,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ViewState {
    #[default]
    Idle,
    Loading,
    Ready,
    Errored(ErrorBanner),
}

impl ViewState {
    pub fn banner(&self) -> Option<&ErrorBanner> {
        match self {
            Self::Errored(banner) => Some(banner),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Auth,
    NotFound,
    Transport,
    Validation,
    Server,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorContext {
    Load,
    Create,
    Update,
    Delete,
    Import,
    Login,
    Signup,
    Map,
}

const SESSION_EXPIRED: &str = "Session expired; please log in again.";
const NOT_FOUND: &str = "Not found.";
const CONNECTION_FAILED: &str = "Could not reach the catalog server; check your connection and retry.";

/// Dismissable, in-view error message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorBanner {
    pub category: ErrorCategory,
    pub context: ErrorContext,
    pub message: String,
}

impl ErrorBanner {
    pub fn from_error(context: ErrorContext, err: &ClientError) -> Self {
        let (category, message) = match err {
            ClientError::Unauthorized => (ErrorCategory::Auth, SESSION_EXPIRED.to_string()),
            ClientError::NotFound { .. } => (ErrorCategory::NotFound, NOT_FOUND.to_string()),
            ClientError::Network(_) | ClientError::FetchFailed { status: None, .. } => {
                (ErrorCategory::Transport, CONNECTION_FAILED.to_string())
            }
            ClientError::FetchFailed { reason, .. } => (ErrorCategory::Server, reason.clone()),
            ClientError::Validation(message) => (ErrorCategory::Validation, message.clone()),
            ClientError::ServerRejected { .. } => (ErrorCategory::Server, err.to_string()),
            ClientError::Storage(_) | ClientError::Configuration(_) => {
                (ErrorCategory::Server, err.to_string())
            }
        };
        Self {
            category,
            context,
            message,
        }
    }

    pub fn requires_reauth(&self) -> bool {
        self.category == ErrorCategory::Auth
    }

    pub fn label(&self) -> &'static str {
        match self.category {
            ErrorCategory::Auth => "Authentication",
            ErrorCategory::NotFound => "Not found",
            ErrorCategory::Transport => "Connection",
            ErrorCategory::Validation => "Validation",
            ErrorCategory::Server => "Server",
        }
    }
}

impl fmt::Display for ErrorBanner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.label(), self.message)
    }
}

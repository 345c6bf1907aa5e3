//! Error types surfaced by the HTTP wrapper and the domain API.

use reqwest::StatusCode;
use thiserror::Error;

use crate::session::SessionError;

/// Result alias for console API operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// Failures a console call can end with.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The backend rejected the session; it has been cleared locally.
    #[error("session expired; please log in again")]
    Unauthorized,
    /// Login was refused.
    #[error("Invalid username or password")]
    InvalidCredentials,
    /// No response was received after every retry.
    #[error(
        "Network error: Unable to connect to server. Please check your connection and try again."
    )]
    Network {
        /// Total attempts made, first one included.
        attempts: u32,
        /// Transport error reported by the last attempt.
        #[source]
        source: reqwest::Error,
    },
    /// The backend answered with a non-success status.
    #[error("{message}")]
    Server {
        /// HTTP status returned by the backend.
        status: StatusCode,
        /// Human-readable message, server-supplied when available.
        message: String,
    },
    /// The request could not be built or the client could not be created.
    #[error("failed to prepare request for {path}")]
    Request {
        /// API path being called.
        path: String,
        /// Underlying client error.
        #[source]
        source: reqwest::Error,
    },
    /// The response body did not match the expected shape.
    #[error("failed to decode response from {path}")]
    Decode {
        /// API path that produced the body.
        path: String,
        /// Underlying decode error.
        #[source]
        source: reqwest::Error,
    },
    /// An API path could not be joined onto the base URL.
    #[error("invalid request URL for {path}")]
    InvalidUrl {
        /// Offending API path.
        path: String,
        /// Underlying parse error.
        #[source]
        source: url::ParseError,
    },
    /// Persisting or clearing the session failed.
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl ApiError {
    /// Whether the caller may offer to retry the call.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Network { .. })
    }

    /// HTTP status attached to the failure, if the backend answered.
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Server { status, .. } => Some(*status),
            Self::Unauthorized => Some(StatusCode::UNAUTHORIZED),
            _ => None,
        }
    }
}

//! Shared error types for the services crate.

use reqwest::StatusCode;
use thiserror::Error;

use adducation_core::model::{AppSettingsError, ProgressError};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

use crate::gamification::GamificationError;

/// Request-level failures raised by an `HttpTransport`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connection(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Connection(err.to_string())
        }
    }
}

/// Errors emitted by the backend API client.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    #[error("backend server at {base_url} is not responding")]
    BackendUnavailable { base_url: String },
    #[error("could not connect to any endpoint")]
    NoEndpoint,
    #[error("not signed in")]
    MissingToken,
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },
    #[error("invalid response from server: {0}")]
    InvalidResponse(String),
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by the LLM gateway.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LlmError {
    #[error("API key not set")]
    MissingApiKey,
    #[error("API error: {status} {body}")]
    HttpStatus { status: StatusCode, body: String },
    #[error("invalid response from API: {0}")]
    InvalidResponse(String),
    #[error("no content generated")]
    EmptyResponse,
    #[error("{0}")]
    Unparseable(String),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Settings(#[from] AppSettingsServiceError),
}

/// Errors emitted by `AppSettingsService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppSettingsServiceError {
    #[error(transparent)]
    Settings(#[from] AppSettingsError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Gamification(#[from] GamificationError),
}

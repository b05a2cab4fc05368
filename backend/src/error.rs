//! Error handling for the Weather Aggregator
//!
//! Core aggregation failures are typed and translated into client-facing
//! statuses here; internal details never reach the response body.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use shared::DataKind;

/// Failure of a single provider call.
///
/// Recovered locally by the aggregation service: the provider is simply
/// excluded from that round.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Provider timed out")]
    Timeout,

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("Provider has no data for the requested time")]
    NoData,

    #[error("Provider does not support {0} data")]
    Unsupported(DataKind),
}

impl ProviderError {
    /// The provider answered but had nothing for the request
    pub fn is_data_gap(&self) -> bool {
        matches!(self, ProviderError::NoData | ProviderError::Unsupported(_))
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else if err.is_decode() {
            ProviderError::MalformedResponse(err.to_string())
        } else {
            ProviderError::Unavailable(err.to_string())
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Core aggregation errors
    #[error("Insufficient data to reconcile")]
    InsufficientData,

    #[error("All weather providers are unavailable")]
    AllProvidersUnavailable,

    #[error("No historical data for {0}")]
    NoHistoricalData(String),

    // Request errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Location not found: {0}")]
    LocationNotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    // Internal errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

// anyhow::Error is not Clone; its rendered chain is carried over instead
impl Clone for AppError {
    fn clone(&self) -> Self {
        match self {
            AppError::InsufficientData => AppError::InsufficientData,
            AppError::AllProvidersUnavailable => AppError::AllProvidersUnavailable,
            AppError::NoHistoricalData(what) => AppError::NoHistoricalData(what.clone()),
            AppError::Validation { field, message } => AppError::Validation {
                field: field.clone(),
                message: message.clone(),
            },
            AppError::NotFound(what) => AppError::NotFound(what.clone()),
            AppError::LocationNotFound(query) => AppError::LocationNotFound(query.clone()),
            AppError::Conflict(message) => AppError::Conflict(message.clone()),
            AppError::Unauthorized(message) => AppError::Unauthorized(message.clone()),
            AppError::Configuration(message) => AppError::Configuration(message.clone()),
            AppError::Internal(message) => AppError::Internal(message.clone()),
            AppError::InternalError(err) => {
                AppError::InternalError(anyhow::anyhow!("{:#}", err))
            }
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by_key(|(field, _)| *field);
        match fields.first() {
            Some((field, errs)) => {
                let message = errs
                    .first()
                    .and_then(|e| e.message.as_ref())
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid value for {}", field));
                AppError::validation(*field, message)
            }
            None => AppError::validation("request", errors.to_string()),
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorDetail {
    fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            field: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = match &self {
            AppError::InsufficientData => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail::new(
                    "INSUFFICIENT_DATA",
                    "Not enough provider data to produce a result",
                ),
            ),
            AppError::AllProvidersUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorDetail::new(
                    "ALL_PROVIDERS_UNAVAILABLE",
                    "Weather providers are temporarily unavailable",
                ),
            ),
            AppError::NoHistoricalData(what) => (
                StatusCode::NOT_FOUND,
                ErrorDetail::new(
                    "NO_HISTORICAL_DATA",
                    format!("No historical data available for {}", what),
                ),
            ),
            AppError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "VALIDATION_ERROR".to_string(),
                    message: message.clone(),
                    field: Some(field.clone()),
                },
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail::new("NOT_FOUND", format!("{} not found", resource)),
            ),
            AppError::LocationNotFound(query) => (
                StatusCode::NOT_FOUND,
                ErrorDetail::new(
                    "LOCATION_NOT_FOUND",
                    format!("Could not resolve location '{}'", query),
                ),
            ),
            AppError::Conflict(message) => (
                StatusCode::CONFLICT,
                ErrorDetail::new("CONFLICT", message.clone()),
            ),
            AppError::Unauthorized(message) => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("UNAUTHORIZED", message.clone()),
            ),
            AppError::Configuration(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("CONFIGURATION_ERROR", "Service is misconfigured"),
            ),
            AppError::Internal(_) | AppError::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("INTERNAL_ERROR", "An internal server error occurred"),
            ),
        };

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::warn!("Request rejected: {}", self);
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for services and handlers
pub type AppResult<T> = Result<T, AppError>;

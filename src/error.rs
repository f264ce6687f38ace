//! Error types for the control plane.
//!
//! [`ApiError`] is the structured error that crosses the HTTP boundary; its
//! translation into a wire response lives here too. [`Error`] covers startup
//! failures (configuration, binding, recorder installation).

use std::fmt;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;
use tracing::error;

/// Body sent when a response document itself cannot be encoded.
pub const ENCODE_FAILURE_BODY: &str =
    r#"{"code":"internal","message":"failed to encode response","details":null}"#;

/// Error kind carried by an [`ApiError`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, Default,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ErrCode {
    /// Malformed or missing request input.
    InvalidArgument,
    /// Unknown resource or disabled feature.
    NotFound,
    /// Unspecified failure.
    #[default]
    Unknown,
    /// Handler-reported or uncategorized fault.
    Internal,
}

impl ErrCode {
    /// HTTP status for this kind.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrCode::InvalidArgument => StatusCode::BAD_REQUEST,
            ErrCode::NotFound => StatusCode::NOT_FOUND,
            ErrCode::Unknown | ErrCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Structured failure value returned by handlers and routing logic.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
pub struct ApiError {
    /// Error kind.
    pub code: ErrCode,
    /// Human-readable message (may be empty).
    pub message: String,
    /// Optional structured detail.
    pub details: Option<serde_json::Value>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{}: {}", self.code, self.message)
        }
    }
}

impl ApiError {
    /// Create an error with the given kind and message.
    pub fn new(code: ErrCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Create an error with no message.
    pub fn bare(code: ErrCode) -> Self {
        Self::new(code, String::new())
    }

    /// `InvalidArgument` error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrCode::InvalidArgument, message)
    }

    /// `NotFound` error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrCode::NotFound, message)
    }

    /// `Internal` error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrCode::Internal, message)
    }

    /// Attach structured detail.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        json_response(self.status_code(), &self)
    }
}

/// Translate an outcome into the wire response.
///
/// `Ok` becomes a bare `200` with no body; an error becomes its JSON document
/// with the status mapped from its kind.
pub fn translate(outcome: std::result::Result<(), ApiError>) -> Response {
    match outcome {
        Ok(()) => StatusCode::OK.into_response(),
        Err(err) => err.into_response(),
    }
}

/// Encode `body` as a JSON response.
///
/// Encoding failures are answered with `500` and [`ENCODE_FAILURE_BODY`].
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response {
    match serde_json::to_vec(body) {
        Ok(bytes) => (status, [json_content_type()], bytes).into_response(),
        Err(err) => {
            error!(error = %err, "failed to encode response body");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [json_content_type()],
                ENCODE_FAILURE_BODY,
            )
                .into_response()
        }
    }
}

fn json_content_type() -> (header::HeaderName, HeaderValue) {
    (
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    )
}

/// Startup and configuration errors.
#[derive(Error, Debug)]
pub enum Error {
    /// Environment could not be deserialized.
    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    /// Configuration loaded but failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Metrics recorder could not be installed.
    #[error("failed to install metrics recorder: {0}")]
    RecorderInstall(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

//! Application error taxonomy shared by every layer of the service.
//!
//! [`ErrorCode`] is the closed, versioned set of machine-readable codes that
//! API consumers match on. [`AppError`] pairs a code with a human-readable
//! message and the HTTP status it maps to. Transport crates convert an
//! `AppError` into a wire response exactly once, at the outermost layer.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable, machine-readable error codes.
///
/// Each code has exactly one canonical HTTP status ([`ErrorCode::default_status`]).
/// The serialized names are a public contract and must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    #[serde(rename = "VALIDATION_ERROR")]
    Validation,
    #[serde(rename = "NOT_FOUND")]
    NotFound,
    #[serde(rename = "UNAUTHORIZED")]
    Unauthorized,
    #[serde(rename = "FORBIDDEN")]
    Forbidden,
    #[serde(rename = "INTERNAL_ERROR")]
    Internal,
    #[serde(rename = "BAD_REQUEST")]
    BadRequest,
    #[serde(rename = "CONFLICT")]
    Conflict,
    #[serde(rename = "TOO_MANY_REQUESTS")]
    TooManyRequests,
}

impl ErrorCode {
    /// Every code, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::Validation,
        Self::NotFound,
        Self::Unauthorized,
        Self::Forbidden,
        Self::Internal,
        Self::BadRequest,
        Self::Conflict,
        Self::TooManyRequests,
    ];

    /// Wire representation of the code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::Internal => "INTERNAL_ERROR",
            Self::BadRequest => "BAD_REQUEST",
            Self::Conflict => "CONFLICT",
            Self::TooManyRequests => "TOO_MANY_REQUESTS",
        }
    }

    /// Canonical HTTP status for the code.
    #[must_use]
    pub const fn default_status(self) -> u16 {
        match self {
            Self::Validation | Self::BadRequest => 400,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::TooManyRequests => 429,
            Self::Internal => 500,
        }
    }

    /// Message used when an error is built from the code alone.
    #[must_use]
    pub const fn default_message(self) -> &'static str {
        match self {
            Self::Validation => "Validation failed",
            Self::NotFound => "Resource not found",
            Self::Unauthorized => "Unauthorized",
            Self::Forbidden => "Forbidden",
            Self::Internal => "Internal server error",
            Self::BadRequest => "Bad request",
            Self::Conflict => "Resource conflict",
            Self::TooManyRequests => "Too many requests",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed operation: stable code, client-facing message, HTTP status.
///
/// Immutable once built. `detail` carries internal diagnostics (driver
/// messages, constraint names) that only development-mode responses expose;
/// it is never part of `Display`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct AppError {
    code: ErrorCode,
    message: String,
    status: u16,
    detail: Option<String>,
}

impl AppError {
    /// Builds an error with an explicit code, message, and status.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>, status: u16) -> Self {
        Self {
            code,
            message: message.into(),
            status,
            detail: None,
        }
    }

    /// Builds the predefined error for `code` with its default message and status.
    #[must_use]
    pub fn from_code(code: ErrorCode) -> Self {
        Self::with_code(code, code.default_message())
    }

    /// Builds an error for `code` with a custom message; the status is derived.
    #[must_use]
    pub fn with_code(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::new(code, message, code.default_status())
    }

    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::with_code(ErrorCode::Validation, message)
    }

    /// `"{resource} not found"`.
    #[must_use]
    pub fn not_found(resource: &str) -> Self {
        Self::with_code(ErrorCode::NotFound, format!("{resource} not found"))
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::with_code(ErrorCode::Internal, message)
    }

    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::with_code(ErrorCode::BadRequest, message)
    }

    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::with_code(ErrorCode::Conflict, message)
    }

    /// Returns a copy carrying internal diagnostic detail.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    #[must_use]
    pub fn code(&self) -> ErrorCode {
        self.code
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// Wire body for this error. `details` is included only when `expose_detail` is set.
    #[must_use]
    pub fn to_body(&self, expose_detail: bool) -> ErrorBody {
        ErrorBody {
            code: self.code,
            message: self.message.clone(),
            details: if expose_detail {
                self.detail.clone()
            } else {
                None
            },
        }
    }
}

/// JSON shape of every failure response: `{"code": ..., "message": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

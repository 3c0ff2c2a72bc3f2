//! Error taxonomy of the verification engine and its HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::doc_type::DocType;
use crate::document::Phase;

/// Errors surfaced by the verification engine.
///
/// Every mutating operation either applies fully or returns one of these
/// without leaving partial state behind.
#[derive(Debug, Error)]
pub enum VerificationError {
    /// The document number does not match its type's format. No OTP is issued.
    #[error("invalid {doc} number: {reason}")]
    InvalidFormat { doc: DocType, reason: &'static str },

    /// Another holder owns the active session.
    #[error("verification locked: only one person may verify at a time")]
    LockConflict,

    /// Wrong, expired, superseded or already used code. Deliberately not
    /// distinguished further.
    #[error("invalid or expired OTP for {doc}")]
    OtpMismatchOrExpired { doc: DocType },

    /// Unsupported media kind or oversized file.
    #[error("invalid file: {reason}")]
    InvalidFile { reason: String },

    /// The number sent with an upload differs from the one the OTP was issued for.
    #[error("{doc} number does not match the OTP-verified number")]
    NumberMismatch { doc: DocType },

    /// The operation is not allowed from the document's current phase.
    #[error("cannot {action} {doc} while it is {phase}")]
    InvalidTransition {
        doc: DocType,
        phase: Phase,
        action: &'static str,
    },

    /// The external document check failed or its result was discarded.
    #[error("document check failed for {doc}: {message}")]
    CheckFailed { doc: DocType, message: String },

    /// Unrecognized document type tag.
    #[error("unknown document type: {0}")]
    UnknownDocType(String),

    /// A request that could not be read (missing form field, broken multipart body).
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// State-store backend failure.
    #[error("state store error: {0}")]
    Store(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = VerificationError> = std::result::Result<T, E>;

impl VerificationError {
    /// Stable machine-readable kind, used as the `error` field of HTTP replies.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidFormat { .. } => "InvalidFormat",
            Self::LockConflict => "LockConflict",
            Self::OtpMismatchOrExpired { .. } => "OtpMismatchOrExpired",
            Self::InvalidFile { .. } => "InvalidFile",
            Self::NumberMismatch { .. } => "NumberMismatch",
            Self::InvalidTransition { .. } => "InvalidTransition",
            Self::CheckFailed { .. } => "CheckFailed",
            Self::UnknownDocType(_) => "UnknownDocType",
            Self::MalformedRequest(_) => "MalformedRequest",
            Self::Store(_) => "StoreError",
        }
    }

    /// HTTP status code for this error.
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidFormat { .. }
            | Self::OtpMismatchOrExpired { .. }
            | Self::InvalidFile { .. }
            | Self::NumberMismatch { .. }
            | Self::UnknownDocType(_)
            | Self::MalformedRequest(_) => StatusCode::BAD_REQUEST,
            Self::LockConflict => StatusCode::FORBIDDEN,
            Self::InvalidTransition { .. } => StatusCode::CONFLICT,
            Self::CheckFailed { .. } | Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for VerificationError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // Backend and capability failures stay generic on the wire.
        let message = match &self {
            Self::CheckFailed { .. } => "Server error while verifying document".to_string(),
            Self::Store(_) => "Internal server error".to_string(),
            other => other.to_string(),
        };
        let body = ErrorBody {
            error: self.kind(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_the_taxonomy() {
        assert_eq!(
            VerificationError::InvalidFormat {
                doc: DocType::TaxId,
                reason: "x"
            }
            .status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(VerificationError::LockConflict.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            VerificationError::OtpMismatchOrExpired {
                doc: DocType::NationalId
            }
            .status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            VerificationError::InvalidTransition {
                doc: DocType::NationalId,
                phase: Phase::Checking,
                action: "check",
            }
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            VerificationError::CheckFailed {
                doc: DocType::SecondaryId,
                message: "timeout".into()
            }
            .status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn server_errors_do_not_leak_details() {
        let response = VerificationError::Store("connection refused to 10.0.0.3".into())
            .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.contains("StoreError"));
        assert!(!body.contains("10.0.0.3"));
    }
}

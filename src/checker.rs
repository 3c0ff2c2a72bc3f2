//! Contract of the external document-check capability.

use std::fmt::Debug;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::doc_type::DocType;
use crate::document::{ExtractedDetails, FileRef};

/// Verdict returned by the document check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CheckStatus {
    Verified,
    Rejected,
}

/// Reply of the document check, copied verbatim into the document state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckReport {
    pub status: CheckStatus,
    #[serde(default)]
    pub feedback: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<ExtractedDetails>,
}

/// What the checker is asked to inspect.
#[derive(Debug, Clone)]
pub struct CheckRequest {
    pub doc: DocType,
    /// Normalized number the holder claimed and confirmed by OTP.
    pub number: String,
    pub file: FileRef,
}

/// Failures talking to the document check.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("document check answered with status {0}")]
    Status(u16),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// An external service that inspects an uploaded scan against a claimed
/// identifier.
#[async_trait]
pub trait DocumentChecker: Debug + Send + Sync + 'static {
    async fn check(&self, request: &CheckRequest) -> Result<CheckReport, CheckError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_decodes_with_and_without_details() {
        let report: CheckReport = serde_json::from_str(
            r#"{"status":"Verified","feedback":"Valid Aadhaar detected",
                "details":{"name":"A Kumar","dob":"01/02/1990"}}"#,
        )
        .unwrap();
        assert_eq!(report.status, CheckStatus::Verified);
        let details = report.details.unwrap();
        assert_eq!(details.name.as_deref(), Some("A Kumar"));
        assert_eq!(details.gender, None);

        let report: CheckReport =
            serde_json::from_str(r#"{"status":"Rejected","feedback":"mismatch"}"#).unwrap();
        assert_eq!(report.status, CheckStatus::Rejected);
        assert!(report.details.is_none());
    }

    #[test]
    fn unknown_status_is_not_a_verdict() {
        let unknown = r#"{"status":"Maybe","feedback":""}"#;
        assert!(serde_json::from_str::<CheckReport>(unknown).is_err());
    }
}

//! `reqwest` client for a document-check service speaking multipart.
//!
//! The service receives `POST {base}/verify` with the form fields `file`,
//! `doc_type` and `user_input` and answers `{status, feedback, details?}`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::multipart::{Form, Part};
use tracing::debug;

use crate::checker::{CheckError, CheckReport, CheckRequest, DocumentChecker};

const USER_AGENT_VALUE: &str = concat!("docverify-session/", env!("CARGO_PKG_VERSION"));

/// Document checker reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpDocumentChecker {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpDocumentChecker {
    /// Builds a checker for the service at `base_url` with a request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, CheckError> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(default_headers)
            .build()
            .map_err(|e| CheckError::Transport(format!("failed to create HTTP client: {e}")))?;

        Ok(Self::with_client(client, base_url))
    }

    /// Uses a preconfigured client.
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}/verify", base_url.trim_end_matches('/')),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl DocumentChecker for HttpDocumentChecker {
    async fn check(&self, request: &CheckRequest) -> Result<CheckReport, CheckError> {
        let file = &request.file;
        let part = Part::bytes(file.bytes.to_vec())
            .file_name(file.file_name.clone())
            .mime_str(file.media_kind.mime())
            .map_err(|e| CheckError::Transport(e.to_string()))?;
        let form = Form::new()
            .part("file", part)
            .text("doc_type", request.doc.checker_tag())
            .text("user_input", request.number.clone());

        debug!(
            endpoint = %self.endpoint,
            doc = %request.doc,
            size = file.size,
            "posting document check"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| CheckError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CheckError::Status(status.as_u16()));
        }

        response
            .json::<CheckReport>()
            .await
            .map_err(|e| CheckError::InvalidResponse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_without_double_slash() {
        let checker =
            HttpDocumentChecker::new("http://ocr.local:8000/", Duration::from_secs(5)).unwrap();
        assert_eq!(checker.endpoint(), "http://ocr.local:8000/verify");
    }
}

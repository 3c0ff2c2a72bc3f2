//! Integration tests for HttpDocumentChecker against a mocked check service.

#![cfg(feature = "http-checker")]

use std::time::Duration;

use docverify_session::{
    CheckError, CheckRequest, CheckStatus, DocType, DocumentChecker, FileRef, HttpDocumentChecker,
    UploadedFile,
};
use wiremock::matchers::{body_string_contains, header_regex, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn checker(server: &MockServer) -> HttpDocumentChecker {
    HttpDocumentChecker::new(&server.uri(), Duration::from_secs(5))
        .expect("failed to create checker")
}

fn request(doc: DocType, number: &str) -> CheckRequest {
    let upload = UploadedFile::new("scan.pdf", "application/pdf", b"%PDF-1.4 test".to_vec());
    CheckRequest {
        doc,
        number: number.to_string(),
        file: FileRef::accept(upload, 1024).unwrap(),
    }
}

#[tokio::test]
async fn test_check_posts_multipart_and_decodes_verdict() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/verify"))
        .and(header_regex("content-type", "^multipart/form-data"))
        .and(header_regex("user-agent", "^docverify-session/"))
        .and(body_string_contains("aadhaar"))
        .and(body_string_contains("123456789012"))
        .and(body_string_contains("filename=\"scan.pdf\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "Verified",
            "feedback": "Valid Aadhaar detected",
            "details": {"name": "A Kumar", "dob": "01/02/1990", "gender": "Male"},
        })))
        .expect(1)
        .mount(&server)
        .await;

    let report = checker(&server)
        .check(&request(DocType::NationalId, "123456789012"))
        .await
        .expect("check failed");

    assert_eq!(report.status, CheckStatus::Verified);
    assert_eq!(report.feedback, "Valid Aadhaar detected");
    let details = report.details.expect("details");
    assert_eq!(details.name.as_deref(), Some("A Kumar"));
    assert_eq!(details.gender.as_deref(), Some("Male"));
}

#[tokio::test]
async fn test_check_sends_type_tag_per_document() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/verify"))
        .and(body_string_contains("pan"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "Rejected",
            "feedback": "No valid PAN number detected or mismatch with input",
        })))
        .mount(&server)
        .await;

    let report = checker(&server)
        .check(&request(DocType::TaxId, "ABCDE1234F"))
        .await
        .expect("check failed");

    assert_eq!(report.status, CheckStatus::Rejected);
    assert!(report.details.is_none());
}

#[tokio::test]
async fn test_check_server_error_maps_to_status() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/verify"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = checker(&server)
        .check(&request(DocType::SecondaryId, "123456789012"))
        .await
        .unwrap_err();
    assert!(matches!(err, CheckError::Status(500)), "got {err:?}");
}

#[tokio::test]
async fn test_check_garbage_body_is_invalid_response() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/verify"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = checker(&server)
        .check(&request(DocType::NationalId, "123456789012"))
        .await
        .unwrap_err();
    assert!(matches!(err, CheckError::InvalidResponse(_)), "got {err:?}");
}

#[tokio::test]
async fn test_check_unreachable_service_is_transport_error() {
    // nothing listens on port 1
    let err = HttpDocumentChecker::new("http://127.0.0.1:1", Duration::from_secs(2))
        .unwrap()
        .check(&request(DocType::NationalId, "123456789012"))
        .await
        .unwrap_err();
    assert!(matches!(err, CheckError::Transport(_)), "got {err:?}");
}

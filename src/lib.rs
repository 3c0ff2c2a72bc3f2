//! # Document Verification Sessions for axum
//!
//! A verification session engine that lets one identity-document holder at a
//! time prove control over a national ID, a tax ID and a secondary ID number.
//! Each document is gated by a one-time passcode, then a scan is uploaded and
//! handed to an external document-check service, and finally the verdicts are
//! aggregated into a review.
//!
//! ## Features
//!
//! - Single-holder session lock keyed by a capability token
//! - One live OTP per document type, lazily expiring after 120 seconds,
//!   single use, superseded by re-issue
//! - One state machine definition shared by all three document types
//! - Uploads gated behind OTP success, limited to PNG/JPEG/PDF up to 2 MiB
//! - Document checks dispatched without holding locks, never raced
//! - A review that always lists all three documents
//! - Pluggable state store, clock and document checker
//! - axum router with `tower-sessions` cookie sessions
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use docverify_session::{
//!     router, HttpDocumentChecker, MemoryStateStore, SystemClock, VerificationConfig,
//!     VerificationEngine,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = VerificationConfig::from_env();
//! let checker = HttpDocumentChecker::new(&config.checker_url, config.checker_timeout)?;
//!
//! let engine = VerificationEngine::new(
//!     MemoryStateStore::new(),
//!     Arc::new(checker),
//!     Arc::new(SystemClock),
//!     &config,
//! );
//!
//! let app = router(Arc::new(engine), &config);
//! let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Using the engine directly
//!
//! ```no_run
//! use docverify_session::{DocType, HolderToken, UploadedFile, VerificationEngine};
//!
//! # use docverify_session::VerificationError;
//! # async fn example(engine: VerificationEngine) -> Result<(), VerificationError> {
//! let holder = HolderToken::generate();
//!
//! // Issue and redeem an OTP
//! let issued = engine.send_otp(&holder, DocType::NationalId, "1234 5678 9012").await?;
//! engine.verify_otp(&holder, DocType::NationalId, &issued.code).await?;
//!
//! // Upload a scan and run the document check
//! let scan = UploadedFile::new("aadhaar.pdf", "application/pdf", vec![0u8; 1024]);
//! let report = engine.submit_document(&holder, DocType::NationalId, scan, None).await?;
//! println!("{:?}: {}", report.status, report.feedback);
//!
//! // Review all three documents
//! let summary = engine.summarize(&holder).await?;
//! # Ok(())
//! # }
//! ```

pub mod checker;
pub mod clock;
pub mod config;
pub mod doc_type;
pub mod document;
pub mod engine;
pub mod error;
pub mod http;
#[cfg(feature = "http-checker")]
mod http_checker;
pub mod lock;
mod memory_store;
pub mod otp;
pub mod review;
pub mod store;

pub use checker::{CheckError, CheckReport, CheckRequest, CheckStatus, DocumentChecker};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::VerificationConfig;
pub use doc_type::DocType;
pub use document::{
    DocumentSlot, DocumentState, ExtractedDetails, FileRef, MediaKind, OtpIssued, Phase,
    UploadedFile, VerdictStatus,
};
pub use engine::VerificationEngine;
pub use error::VerificationError;
pub use http::router;
#[cfg(feature = "http-checker")]
pub use http_checker::HttpDocumentChecker;
pub use lock::{Admission, HolderToken};
pub use memory_store::MemoryStateStore;
pub use review::{ReviewEntry, ReviewSummary};
pub use store::StateStore;

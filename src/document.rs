//! Per-document state machine.
//!
//! All three document types share one transition definition, [`transition`].
//! A [`DocumentSlot`] is the mutable record of one type; its operations check
//! the transition first, validate their input second and only then mutate,
//! so a rejected operation leaves the slot exactly as it was.

use std::fmt;

use bytes::Bytes;
use rand::Rng;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::checker::{CheckError, CheckReport, CheckRequest, CheckStatus};
use crate::doc_type::DocType;
use crate::error::{Result, VerificationError};
use crate::otp::OtpSlot;

/// Largest accepted upload by default (2 MiB, inclusive).
pub const DEFAULT_MAX_FILE_BYTES: u64 = 2 * 1024 * 1024;

/// Progress of one document through the verification flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Untouched,
    OtpSent,
    OtpVerified,
    FileAccepted,
    /// A document check has been dispatched and has not returned yet.
    Checking,
    Verified,
    Rejected,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Untouched => "untouched",
            Phase::OtpSent => "awaiting OTP confirmation",
            Phase::OtpVerified => "OTP-verified",
            Phase::FileAccepted => "holding an unchecked file",
            Phase::Checking => "being checked",
            Phase::Verified => "verified",
            Phase::Rejected => "rejected",
        })
    }
}

/// Verdict as reported in snapshots and the review summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerdictStatus {
    NotUploaded,
    Pending,
    Verified,
    Rejected,
}

impl From<CheckStatus> for VerdictStatus {
    fn from(status: CheckStatus) -> Self {
        match status {
            CheckStatus::Verified => VerdictStatus::Verified,
            CheckStatus::Rejected => VerdictStatus::Rejected,
        }
    }
}

/// Holder details the document check may extract from the scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dob: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
}

/// Accepted media kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    Png,
    Jpeg,
    Pdf,
}

impl MediaKind {
    /// Maps a declared MIME type to a media kind. Parameters such as
    /// `; charset=...` are ignored.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        match essence.to_ascii_lowercase().as_str() {
            "image/png" => Some(MediaKind::Png),
            "image/jpeg" | "image/jpg" => Some(MediaKind::Jpeg),
            "application/pdf" => Some(MediaKind::Pdf),
            _ => None,
        }
    }

    pub const fn mime(self) -> &'static str {
        match self {
            MediaKind::Png => "image/png",
            MediaKind::Jpeg => "image/jpeg",
            MediaKind::Pdf => "application/pdf",
        }
    }
}

/// A file as submitted by the caller, before validation.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub media_type: String,
    pub bytes: Bytes,
}

impl UploadedFile {
    pub fn new(
        file_name: impl Into<String>,
        media_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            media_type: media_type.into(),
            bytes: bytes.into(),
        }
    }
}

/// A validated file held by a document slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRef {
    pub file_name: String,
    pub media_kind: MediaKind,
    pub size: u64,
    #[serde(skip)]
    pub bytes: Bytes,
}

impl FileRef {
    /// Validates media kind and size. `max_bytes` is inclusive.
    pub fn accept(upload: UploadedFile, max_bytes: u64) -> Result<Self> {
        let media_kind =
            MediaKind::from_mime(&upload.media_type).ok_or_else(|| VerificationError::InvalidFile {
                reason: format!("must be PNG, JPEG, or PDF (got {:?})", upload.media_type),
            })?;
        let size = upload.bytes.len() as u64;
        if size > max_bytes {
            return Err(VerificationError::InvalidFile {
                reason: format!("{size} bytes exceeds the {max_bytes} byte limit"),
            });
        }
        Ok(Self {
            file_name: upload.file_name,
            media_kind,
            size,
            bytes: upload.bytes,
        })
    }
}

/// The kinds of step the state machine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    IssueOtp,
    RedeemOtp,
    AcceptFile,
    DispatchCheck,
    CompleteCheck(CheckStatus),
    AbortCheck,
}

impl Step {
    const fn action(self) -> &'static str {
        match self {
            Step::IssueOtp => "send an OTP for",
            Step::RedeemOtp => "confirm the OTP for",
            Step::AcceptFile => "upload a file for",
            Step::DispatchCheck => "check",
            Step::CompleteCheck(_) => "record a verdict for",
            Step::AbortCheck => "abort the check of",
        }
    }
}

/// The single transition definition shared by every document type.
///
/// Failure is never terminal: `OtpSent` accepts re-issues indefinitely, and a
/// failed check returns to `FileAccepted`. `Verified`/`Rejected` are left only
/// by a session reset.
pub fn transition(doc: DocType, from: Phase, step: Step) -> Result<Phase> {
    use Phase::*;
    let next = match (from, step) {
        (Untouched | OtpSent, Step::IssueOtp) => OtpSent,
        (OtpSent, Step::RedeemOtp) => OtpVerified,
        (OtpVerified | FileAccepted, Step::AcceptFile) => FileAccepted,
        (FileAccepted, Step::DispatchCheck) => Checking,
        (Checking, Step::CompleteCheck(CheckStatus::Verified)) => Verified,
        (Checking, Step::CompleteCheck(CheckStatus::Rejected)) => Rejected,
        (Checking, Step::AbortCheck) => FileAccepted,
        (phase, step) => {
            return Err(VerificationError::InvalidTransition {
                doc,
                phase,
                action: step.action(),
            })
        }
    };
    Ok(next)
}

/// Result of a successful OTP issue.
#[derive(Debug, Clone)]
pub struct OtpIssued {
    pub doc: DocType,
    pub number: String,
    pub code: String,
    pub issued_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}

/// Mutable record of one document type, owned by a state store.
#[derive(Debug, Clone)]
pub struct DocumentSlot {
    doc: DocType,
    phase: Phase,
    number: Option<String>,
    otp: OtpSlot,
    file: Option<FileRef>,
    verdict: VerdictStatus,
    feedback: String,
    details: Option<ExtractedDetails>,
    check_ticket: Option<u64>,
}

impl DocumentSlot {
    pub fn new(doc: DocType) -> Self {
        Self {
            doc,
            phase: Phase::Untouched,
            number: None,
            otp: OtpSlot::default(),
            file: None,
            verdict: VerdictStatus::NotUploaded,
            feedback: String::new(),
            details: None,
            check_ticket: None,
        }
    }

    pub fn doc(&self) -> DocType {
        self.doc
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Validates `raw_number` and issues a fresh code for it.
    pub fn send_otp<R: Rng + ?Sized>(
        &mut self,
        raw_number: &str,
        now: OffsetDateTime,
        ttl: Duration,
        rng: &mut R,
    ) -> Result<OtpIssued> {
        let number = self.doc.normalize_number(raw_number)?;
        let next = transition(self.doc, self.phase, Step::IssueOtp)?;

        let record = self.otp.issue(self.doc, now, ttl, rng);
        let issued = OtpIssued {
            doc: self.doc,
            number: number.clone(),
            code: record.code.clone(),
            issued_at: record.issued_at,
            expires_at: record.expires_at,
        };
        self.number = Some(number);
        self.phase = next;
        Ok(issued)
    }

    /// Redeems `code`. Every failure, including "no code was ever issued",
    /// is reported as [`VerificationError::OtpMismatchOrExpired`].
    pub fn verify_otp(&mut self, code: &str, now: OffsetDateTime) -> Result<()> {
        let next = transition(self.doc, self.phase, Step::RedeemOtp)
            .map_err(|_| VerificationError::OtpMismatchOrExpired { doc: self.doc })?;
        self.otp.verify(self.doc, code, now)?;
        self.phase = next;
        Ok(())
    }

    /// Stores `upload` after the OTP has been confirmed.
    ///
    /// `claimed_number`, when given, must normalize to the number the OTP was
    /// issued for.
    pub fn accept_file(
        &mut self,
        upload: UploadedFile,
        claimed_number: Option<&str>,
        max_bytes: u64,
    ) -> Result<FileRef> {
        let next = transition(self.doc, self.phase, Step::AcceptFile)?;
        if let Some(claimed) = claimed_number {
            let claimed = self
                .doc
                .normalize_number(claimed)
                .map_err(|_| VerificationError::NumberMismatch { doc: self.doc })?;
            if self.number.as_deref() != Some(claimed.as_str()) {
                return Err(VerificationError::NumberMismatch { doc: self.doc });
            }
        }
        let file = FileRef::accept(upload, max_bytes)?;

        self.file = Some(file.clone());
        self.verdict = VerdictStatus::Pending;
        self.feedback.clear();
        self.details = None;
        self.phase = next;
        Ok(file)
    }

    /// Marks the slot as being checked under `ticket` and returns what the
    /// checker needs.
    pub fn begin_check(&mut self, ticket: u64) -> Result<CheckRequest> {
        let next = transition(self.doc, self.phase, Step::DispatchCheck)?;
        let (Some(file), Some(number)) = (self.file.clone(), self.number.clone()) else {
            return Err(VerificationError::InvalidTransition {
                doc: self.doc,
                phase: self.phase,
                action: Step::DispatchCheck.action(),
            });
        };

        self.check_ticket = Some(ticket);
        self.verdict = VerdictStatus::Pending;
        self.phase = next;
        Ok(CheckRequest {
            doc: self.doc,
            number,
            file,
        })
    }

    /// Lands the outcome of the check dispatched under `ticket`.
    ///
    /// A verdict is copied verbatim. A failure returns the slot to
    /// `FileAccepted` with the file kept, so the check can be retried without
    /// re-uploading. Outcomes for a ticket the slot no longer carries (the
    /// session was reset meanwhile) are discarded.
    pub fn finish_check(
        &mut self,
        ticket: u64,
        outcome: std::result::Result<CheckReport, CheckError>,
    ) -> Result<CheckReport> {
        if self.check_ticket != Some(ticket) {
            return Err(VerificationError::CheckFailed {
                doc: self.doc,
                message: "session was reset while the check was in flight".to_string(),
            });
        }
        match outcome {
            Ok(report) => {
                let next = transition(self.doc, self.phase, Step::CompleteCheck(report.status))?;
                self.check_ticket = None;
                self.verdict = report.status.into();
                self.feedback = report.feedback.clone();
                self.details = report.details.clone();
                self.phase = next;
                Ok(report)
            }
            Err(err) => {
                let next = transition(self.doc, self.phase, Step::AbortCheck)?;
                self.check_ticket = None;
                self.phase = next;
                Err(VerificationError::CheckFailed {
                    doc: self.doc,
                    message: err.to_string(),
                })
            }
        }
    }

    /// Read-only view at `now`.
    pub fn snapshot(&self, now: OffsetDateTime) -> DocumentState {
        DocumentState {
            doc_type: self.doc,
            phase: self.phase,
            number: self.number.clone(),
            otp_verified: self.otp_verified(),
            otp_seconds_remaining: match self.phase {
                Phase::OtpSent => self.otp.record().and_then(|r| r.seconds_remaining(now)),
                _ => None,
            },
            file: self.file.clone(),
            verdict_status: self.verdict,
            feedback: self.feedback.clone(),
            extracted_details: self.details.clone(),
        }
    }

    fn otp_verified(&self) -> bool {
        !matches!(self.phase, Phase::Untouched | Phase::OtpSent)
    }
}

/// Snapshot of one document, as returned by `currentState`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentState {
    pub doc_type: DocType,
    pub phase: Phase,
    pub number: Option<String>,
    pub otp_verified: bool,
    /// Advisory countdown derived from the stored expiry.
    pub otp_seconds_remaining: Option<u64>,
    pub file: Option<FileRef>,
    pub verdict_status: VerdictStatus,
    pub feedback: String,
    pub extracted_details: Option<ExtractedDetails>,
}

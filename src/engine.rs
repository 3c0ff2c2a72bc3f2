//! The verification session engine.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use time::Duration;
use tracing::{debug, info, warn};

use crate::checker::{CheckError, CheckReport, DocumentChecker};
use crate::clock::Clock;
use crate::config::VerificationConfig;
use crate::doc_type::DocType;
use crate::document::{DocumentState, FileRef, OtpIssued, UploadedFile};
use crate::error::{Result, VerificationError};
use crate::lock::{Admission, HolderToken};
use crate::memory_store::MemoryStateStore;
use crate::review::{self, ReviewSummary};
use crate::store::StateStore;

/// Drives the session lock, the OTP store and the three document state
/// machines over an injected [`StateStore`].
///
/// Every caller-facing operation takes the caller's [`HolderToken`] and is
/// admitted by the session lock first; [`reset`](Self::reset) is the only
/// operation that is not.
#[derive(Debug)]
pub struct VerificationEngine<S = MemoryStateStore> {
    store: Arc<S>,
    checker: Arc<dyn DocumentChecker>,
    clock: Arc<dyn Clock>,
    otp_ttl: Duration,
    max_file_bytes: u64,
    next_ticket: AtomicU64,
}

impl<S: StateStore> VerificationEngine<S> {
    pub fn new(
        store: S,
        checker: Arc<dyn DocumentChecker>,
        clock: Arc<dyn Clock>,
        config: &VerificationConfig,
    ) -> Self {
        Self {
            store: Arc::new(store),
            checker,
            clock,
            otp_ttl: config.otp_ttl,
            max_file_bytes: config.max_file_bytes,
            next_ticket: AtomicU64::new(1),
        }
    }

    /// Validates `number` and issues a fresh OTP for `doc`, superseding any
    /// earlier one.
    pub async fn send_otp(
        &self,
        holder: &HolderToken,
        doc: DocType,
        number: &str,
    ) -> Result<OtpIssued> {
        let now = self.clock.now();
        let ttl = self.otp_ttl;
        let (admission, issued) = self
            .store
            .with_admitted(holder, doc, |slot| {
                slot.send_otp(number, now, ttl, &mut rand::thread_rng())
            })
            .await
            .inspect_err(|err| log_failure(holder, doc, "send OTP", err))?;
        log_admission(holder, admission);

        info!(holder = %holder, doc = %doc, expires_at = %issued.expires_at, "OTP issued");
        debug!(doc = %doc, number = %issued.number, code = %issued.code, "simulated OTP delivery");
        Ok(issued)
    }

    /// Redeems `code` for `doc`. Single use; expiry is checked against the clock now.
    pub async fn verify_otp(&self, holder: &HolderToken, doc: DocType, code: &str) -> Result<()> {
        let now = self.clock.now();
        let (admission, ()) = self
            .store
            .with_admitted(holder, doc, |slot| slot.verify_otp(code, now))
            .await
            .inspect_err(|err| log_failure(holder, doc, "verify OTP", err))?;
        log_admission(holder, admission);

        info!(holder = %holder, doc = %doc, "OTP verified");
        Ok(())
    }

    /// Stores an upload for `doc` once its OTP has been confirmed.
    pub async fn accept_file(
        &self,
        holder: &HolderToken,
        doc: DocType,
        upload: UploadedFile,
        claimed_number: Option<&str>,
    ) -> Result<FileRef> {
        let max_bytes = self.max_file_bytes;
        let (admission, file) = self
            .store
            .with_admitted(holder, doc, |slot| slot.accept_file(upload, claimed_number, max_bytes))
            .await
            .inspect_err(|err| log_failure(holder, doc, "accept file", err))?;
        log_admission(holder, admission);

        info!(
            holder = %holder,
            doc = %doc,
            media = ?file.media_kind,
            size = file.size,
            "file accepted"
        );
        Ok(file)
    }

    /// Runs the external document check on the accepted file of `doc`.
    ///
    /// The check runs on its own task: if the caller goes away, the check
    /// still completes and lands its result. A concurrent second call for the
    /// same type is rejected while the first is outstanding. No lock is held
    /// while the check is in flight.
    pub async fn check_document(&self, holder: &HolderToken, doc: DocType) -> Result<CheckReport> {
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let (admission, request) = self
            .store
            .with_admitted(holder, doc, |slot| slot.begin_check(ticket))
            .await
            .inspect_err(|err| log_failure(holder, doc, "check", err))?;
        log_admission(holder, admission);
        info!(holder = %holder, doc = %doc, ticket, "dispatching document check");

        let store = Arc::clone(&self.store);
        let checker = Arc::clone(&self.checker);
        let task = tokio::spawn(async move {
            let outcome = checker.check(&request).await;
            if let Err(err) = &outcome {
                warn!(doc = %doc, ticket, error = %err, "document check failed");
            }
            store
                .with_document(doc, move |slot| slot.finish_check(ticket, outcome))
                .await
        });

        let result = match task.await {
            Ok(result) => result,
            Err(join_err) => {
                warn!(doc = %doc, ticket, error = %join_err, "document check task died");
                let message = join_err.to_string();
                self.store
                    .with_document(doc, move |slot| {
                        slot.finish_check(ticket, Err(CheckError::Transport(message)))
                    })
                    .await
            }
        };

        match &result {
            Ok(report) => {
                info!(doc = %doc, ticket, status = ?report.status, "document check completed")
            }
            Err(err) => warn!(doc = %doc, ticket, error = %err, "document check not recorded"),
        }
        result
    }

    /// Accepts `upload` and immediately checks it.
    pub async fn submit_document(
        &self,
        holder: &HolderToken,
        doc: DocType,
        upload: UploadedFile,
        claimed_number: Option<&str>,
    ) -> Result<CheckReport> {
        self.accept_file(holder, doc, upload, claimed_number).await?;
        self.check_document(holder, doc).await
    }

    /// Read-only snapshot of `doc`.
    pub async fn current_state(&self, holder: &HolderToken, doc: DocType) -> Result<DocumentState> {
        let now = self.clock.now();
        let (admission, state) = self
            .store
            .with_admitted(holder, doc, |slot| Ok(slot.snapshot(now)))
            .await
            .inspect_err(|err| log_conflict(holder, err))?;
        log_admission(holder, admission);
        Ok(state)
    }

    /// Review of all three documents, with fallbacks for untouched ones.
    pub async fn summarize(&self, holder: &HolderToken) -> Result<ReviewSummary> {
        let now = self.clock.now();
        let (admission, slots) = self
            .store
            .documents(holder)
            .await
            .inspect_err(|err| log_conflict(holder, err))?;
        log_admission(holder, admission);
        Ok(review::summarize(slots.iter().map(|slot| slot.snapshot(now))))
    }

    /// Clears the lock, every OTP and every document as one step. Idempotent.
    pub async fn reset(&self) -> Result<()> {
        self.store.reset().await?;
        info!("verification session reset");
        Ok(())
    }
}

fn log_admission(holder: &HolderToken, admission: Admission) {
    if admission == Admission::Established {
        info!(holder = %holder, "verification session established");
    }
}

fn log_conflict(holder: &HolderToken, err: &VerificationError) {
    if matches!(err, VerificationError::LockConflict) {
        warn!(holder = %holder, "rejected caller while another session is active");
    }
}

fn log_failure(holder: &HolderToken, doc: DocType, action: &str, err: &VerificationError) {
    match err {
        VerificationError::LockConflict => log_conflict(holder, err),
        VerificationError::Store(_) => {
            warn!(doc = %doc, action, error = %err, "state store failure")
        }
        _ => debug!(holder = %holder, doc = %doc, action, error = %err, "operation rejected"),
    }
}

//! axum surface over a [`VerificationEngine`].
//!
//! The caller's [`HolderToken`] lives in a `tower-sessions` cookie session:
//! it is minted on first contact, stored once the session lock has admitted
//! it, and presented by the cookie on every later request. Callers the lock
//! turns away get no session record and no cookie.

use std::sync::Arc;

use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, FromRequestParts, Multipart, Path, State};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_sessions::{Expiry, MemoryStore, Session, SessionManagerLayer};

use crate::checker::CheckReport;
use crate::config::VerificationConfig;
use crate::doc_type::DocType;
use crate::document::{DocumentState, UploadedFile};
use crate::engine::VerificationEngine;
use crate::error::{Result, VerificationError};
use crate::lock::HolderToken;
use crate::review::ReviewSummary;
use crate::store::StateStore;

/// Session key under which the holder token is kept.
pub const HOLDER_TOKEN_KEY: &str = "docverify.holder";

/// Slack on top of twice the file limit for multipart framing and text fields.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// The caller's holder token, read from the cookie session or freshly minted.
///
/// A minted token is only written to the session by [`Holder::settle`], so
/// nothing is stored for callers the lock rejects.
#[derive(Debug, Clone)]
pub struct Holder {
    token: HolderToken,
    session: Session,
    stored: bool,
}

impl Holder {
    pub fn token(&self) -> &HolderToken {
        &self.token
    }

    /// Passes `outcome` through, storing a minted token unless the lock
    /// turned the caller away. Any other outcome means the lock now knows
    /// this token, so the caller must keep it.
    async fn settle<T>(&self, outcome: Result<T>) -> Result<T> {
        if !self.stored && !matches!(outcome, Err(VerificationError::LockConflict)) {
            self.session
                .insert(HOLDER_TOKEN_KEY, &self.token)
                .await
                .map_err(|e| VerificationError::Store(e.to_string()))?;
        }
        outcome
    }
}

impl<S> FromRequestParts<S> for Holder
where
    S: Send + Sync,
{
    type Rejection = VerificationError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|(_, msg)| VerificationError::Store(msg.to_string()))?;

        let stored = session
            .get::<HolderToken>(HOLDER_TOKEN_KEY)
            .await
            .map_err(|e| VerificationError::Store(e.to_string()))?;

        Ok(match stored {
            Some(token) => Holder {
                token,
                session,
                stored: true,
            },
            None => Holder {
                token: HolderToken::generate(),
                session,
                stored: false,
            },
        })
    }
}

/// Shared handler state.
#[derive(Debug)]
pub struct AppState<S: StateStore> {
    engine: Arc<VerificationEngine<S>>,
    echo_otp: bool,
}

impl<S: StateStore> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            echo_otp: self.echo_otp,
        }
    }
}

/// Builds the verification router with its cookie session layer.
pub fn router<S: StateStore>(
    engine: Arc<VerificationEngine<S>>,
    config: &VerificationConfig,
) -> Router {
    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(config.secure_cookie)
        .with_http_only(true)
        .with_expiry(Expiry::OnInactivity(config.session_idle));

    let body_limit = usize::try_from(config.max_file_bytes)
        .unwrap_or(usize::MAX / 2)
        .saturating_mul(2)
        .saturating_add(FORM_OVERHEAD_BYTES);

    let state = AppState {
        engine,
        echo_otp: config.echo_otp,
    };

    Router::new()
        .route("/api/verify/otp", post(send_otp::<S>))
        .route("/api/verify/otp/confirm", post(confirm_otp::<S>))
        .route("/api/verify/document", post(submit_document::<S>))
        .route("/api/documents/{doc_type}", get(current_state::<S>))
        .route("/api/documents/{doc_type}/check", post(check_document::<S>))
        .route("/api/review", get(review::<S>))
        .route("/api/reset-verification", post(reset::<S>))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
        .layer(session_layer)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOtpRequest {
    pub doc_type: String,
    pub number: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOtpResponse {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub expires_in_secs: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmOtpRequest {
    pub doc_type: String,
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

async fn send_otp<S: StateStore>(
    State(state): State<AppState<S>>,
    holder: Holder,
    Json(body): Json<SendOtpRequest>,
) -> Result<Json<SendOtpResponse>> {
    let doc: DocType = body.doc_type.parse()?;
    let issued = holder
        .settle(state.engine.send_otp(holder.token(), doc, &body.number).await)
        .await?;
    let expires_in_secs = (issued.expires_at - issued.issued_at).whole_seconds();
    Ok(Json(SendOtpResponse {
        message: format!("OTP sent for {doc} verification"),
        code: state.echo_otp.then_some(issued.code),
        expires_in_secs,
    }))
}

async fn confirm_otp<S: StateStore>(
    State(state): State<AppState<S>>,
    holder: Holder,
    Json(body): Json<ConfirmOtpRequest>,
) -> Result<Json<MessageResponse>> {
    let doc: DocType = body.doc_type.parse()?;
    holder
        .settle(state.engine.verify_otp(holder.token(), doc, &body.code).await)
        .await?;
    Ok(Json(MessageResponse {
        message: format!("{doc} verified successfully"),
    }))
}

async fn submit_document<S: StateStore>(
    State(state): State<AppState<S>>,
    holder: Holder,
    mut multipart: Multipart,
) -> Result<Json<CheckReport>> {
    let mut doc_type = None;
    let mut number = None;
    let mut upload = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("docType" | "doc_type") => {
                doc_type = Some(field.text().await.map_err(multipart_error)?);
            }
            Some("number" | "user_input") => {
                number = Some(field.text().await.map_err(multipart_error)?);
            }
            Some("file") => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let media_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                upload = Some(UploadedFile::new(file_name, media_type, bytes));
            }
            _ => {}
        }
    }

    let doc: DocType = doc_type
        .ok_or_else(|| VerificationError::MalformedRequest("missing docType field".into()))?
        .parse()?;
    let upload = upload.ok_or_else(|| VerificationError::InvalidFile {
        reason: "missing file field".into(),
    })?;

    let outcome = state
        .engine
        .submit_document(holder.token(), doc, upload, number.as_deref())
        .await;
    Ok(Json(holder.settle(outcome).await?))
}

async fn check_document<S: StateStore>(
    State(state): State<AppState<S>>,
    holder: Holder,
    Path(doc_type): Path<String>,
) -> Result<Json<CheckReport>> {
    let doc: DocType = doc_type.parse()?;
    let outcome = state.engine.check_document(holder.token(), doc).await;
    Ok(Json(holder.settle(outcome).await?))
}

async fn current_state<S: StateStore>(
    State(state): State<AppState<S>>,
    holder: Holder,
    Path(doc_type): Path<String>,
) -> Result<Json<DocumentState>> {
    let doc: DocType = doc_type.parse()?;
    let outcome = state.engine.current_state(holder.token(), doc).await;
    Ok(Json(holder.settle(outcome).await?))
}

async fn review<S: StateStore>(
    State(state): State<AppState<S>>,
    holder: Holder,
) -> Result<Json<ReviewSummary>> {
    let outcome = state.engine.summarize(holder.token()).await;
    Ok(Json(holder.settle(outcome).await?))
}

/// Frees the lock for everyone and drops the calling client's own session.
async fn reset<S: StateStore>(
    State(state): State<AppState<S>>,
    session: Session,
) -> Result<Json<MessageResponse>> {
    state.engine.reset().await?;
    session
        .flush()
        .await
        .map_err(|e| VerificationError::Store(e.to_string()))?;
    Ok(Json(MessageResponse {
        message: "Verification system reset. Next person can verify now.".into(),
    }))
}

fn multipart_error(err: MultipartError) -> VerificationError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        VerificationError::InvalidFile {
            reason: "upload exceeds the request size limit".into(),
        }
    } else {
        VerificationError::MalformedRequest(err.body_text())
    }
}

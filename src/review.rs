//! Aggregated review of all three documents.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::doc_type::DocType;
use crate::document::{DocumentState, ExtractedDetails, Phase, VerdictStatus};

pub const NOT_UPLOADED_FEEDBACK: &str = "Document not uploaded";
pub const PENDING_FEEDBACK: &str = "Document check pending";

/// One line of the review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewEntry {
    pub status: VerdictStatus,
    pub feedback: String,
    pub details: Option<ExtractedDetails>,
}

impl ReviewEntry {
    fn not_uploaded() -> Self {
        Self {
            status: VerdictStatus::NotUploaded,
            feedback: NOT_UPLOADED_FEEDBACK.to_string(),
            details: None,
        }
    }

    fn from_state(state: DocumentState) -> Self {
        let feedback = match (state.feedback.is_empty(), state.verdict_status) {
            (false, _) => state.feedback,
            (true, VerdictStatus::NotUploaded) => NOT_UPLOADED_FEEDBACK.to_string(),
            (true, VerdictStatus::Pending) => PENDING_FEEDBACK.to_string(),
            (true, _) => String::new(),
        };
        Self {
            status: state.verdict_status,
            feedback,
            details: state.extracted_details,
        }
    }
}

/// Review of every fixed document type, serialized as
/// `{"nationalID": {...}, "taxID": {...}, "secondaryID": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ReviewSummary(BTreeMap<DocType, ReviewEntry>);

impl ReviewSummary {
    /// The entry for `doc`; every type is always present.
    pub fn entry(&self, doc: DocType) -> &ReviewEntry {
        &self.0[&doc]
    }

    /// Entries in review order.
    pub fn iter(&self) -> impl Iterator<Item = (DocType, &ReviewEntry)> {
        self.0.iter().map(|(doc, entry)| (*doc, entry))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Builds the review from whatever document states exist. Missing or
/// untouched types fall back to "not uploaded"; this never fails.
pub fn summarize<I>(states: I) -> ReviewSummary
where
    I: IntoIterator<Item = DocumentState>,
{
    let mut entries: BTreeMap<DocType, ReviewEntry> = DocType::ALL
        .into_iter()
        .map(|doc| (doc, ReviewEntry::not_uploaded()))
        .collect();

    for state in states {
        if state.phase == Phase::Untouched {
            continue;
        }
        entries.insert(state.doc_type, ReviewEntry::from_state(state));
    }
    ReviewSummary(entries)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn state(doc: DocType, phase: Phase, verdict: VerdictStatus, feedback: &str) -> DocumentState {
        DocumentState {
            doc_type: doc,
            phase,
            number: Some("123456789012".into()),
            otp_verified: true,
            otp_seconds_remaining: None,
            file: None,
            verdict_status: verdict,
            feedback: feedback.into(),
            extracted_details: None,
        }
    }

    #[test]
    fn empty_input_yields_three_not_uploaded_entries() {
        let summary = summarize(Vec::new());
        let not_uploaded =
            json!({"status": "NotUploaded", "feedback": "Document not uploaded", "details": null});
        assert_eq!(summary.len(), 3);
        assert_eq!(
            serde_json::to_value(&summary).unwrap(),
            json!({
                "nationalID": not_uploaded,
                "taxID": not_uploaded,
                "secondaryID": not_uploaded,
            })
        );
    }

    #[test]
    fn fallback_holds_next_to_verified_documents() {
        let mut verified = state(
            DocType::NationalId,
            Phase::Verified,
            VerdictStatus::Verified,
            "Match",
        );
        verified.extracted_details = Some(ExtractedDetails {
            name: Some("A Kumar".into()),
            ..Default::default()
        });
        let summary = summarize(vec![
            verified,
            state(DocType::TaxId, Phase::Verified, VerdictStatus::Verified, "Valid PAN detected"),
        ]);

        let national = summary.entry(DocType::NationalId);
        assert_eq!(national.status, VerdictStatus::Verified);
        assert_eq!(national.details.as_ref().unwrap().name.as_deref(), Some("A Kumar"));
        assert_eq!(summary.entry(DocType::SecondaryId).status, VerdictStatus::NotUploaded);
        assert_eq!(summary.entry(DocType::SecondaryId).feedback, NOT_UPLOADED_FEEDBACK);
    }

    #[test]
    fn touched_but_unchecked_documents_get_default_feedback() {
        let summary = summarize(vec![
            state(DocType::NationalId, Phase::OtpSent, VerdictStatus::NotUploaded, ""),
            state(DocType::TaxId, Phase::FileAccepted, VerdictStatus::Pending, ""),
            state(DocType::SecondaryId, Phase::Untouched, VerdictStatus::NotUploaded, "ignored"),
        ]);
        assert_eq!(summary.entry(DocType::NationalId).feedback, NOT_UPLOADED_FEEDBACK);
        assert_eq!(summary.entry(DocType::TaxId).feedback, PENDING_FEEDBACK);
        assert_eq!(summary.entry(DocType::SecondaryId).feedback, NOT_UPLOADED_FEEDBACK);
        assert_eq!(
            summary.iter().map(|(doc, _)| doc).collect::<Vec<_>>(),
            DocType::ALL.to_vec()
        );
    }
}

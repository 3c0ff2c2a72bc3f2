//! The three fixed document types and their number formats.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::VerificationError;

/// A government-issued identifier the session verifies.
///
/// The declaration order is the fixed order used by the review summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DocType {
    /// National identity number, 12 digits (interior whitespace allowed).
    #[serde(rename = "nationalID")]
    NationalId,
    /// Tax identifier, `AAAAA9999A`.
    #[serde(rename = "taxID")]
    TaxId,
    /// Secondary (academic) identifier, exactly 12 digits.
    #[serde(rename = "secondaryID")]
    SecondaryId,
}

impl DocType {
    /// All document types, in review order.
    pub const ALL: [DocType; 3] = [DocType::NationalId, DocType::TaxId, DocType::SecondaryId];

    /// Wire tag used on the HTTP surface.
    pub const fn as_str(self) -> &'static str {
        match self {
            DocType::NationalId => "nationalID",
            DocType::TaxId => "taxID",
            DocType::SecondaryId => "secondaryID",
        }
    }

    /// Tag the external document-check service expects in its `doc_type` field.
    pub const fn checker_tag(self) -> &'static str {
        match self {
            DocType::NationalId => "aadhaar",
            DocType::TaxId => "pan",
            DocType::SecondaryId => "apaar",
        }
    }

    pub(crate) const fn index(self) -> usize {
        match self {
            DocType::NationalId => 0,
            DocType::TaxId => 1,
            DocType::SecondaryId => 2,
        }
    }

    /// Validates `raw` against this type's number format and returns the
    /// normalized form that is stored and sent to the document check.
    ///
    /// - national ID: all whitespace removed, then exactly 12 ASCII digits
    /// - tax ID: 5 letters, 4 digits, 1 letter, case-insensitive; upper-cased
    /// - secondary ID: exactly 12 ASCII digits, nothing else
    pub fn normalize_number(self, raw: &str) -> Result<String, VerificationError> {
        match self {
            DocType::NationalId => {
                let digits: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
                if is_digits(&digits, 12) {
                    Ok(digits)
                } else {
                    Err(self.invalid_format("must be 12 digits"))
                }
            }
            DocType::TaxId => {
                let bytes = raw.as_bytes();
                let well_formed = bytes.len() == 10
                    && bytes[..5].iter().all(u8::is_ascii_alphabetic)
                    && bytes[5..9].iter().all(u8::is_ascii_digit)
                    && bytes[9].is_ascii_alphabetic();
                if well_formed {
                    Ok(raw.to_ascii_uppercase())
                } else {
                    Err(self.invalid_format("must be in the format ABCDE1234F"))
                }
            }
            DocType::SecondaryId => {
                if is_digits(raw, 12) {
                    Ok(raw.to_string())
                } else {
                    Err(self.invalid_format("must be exactly 12 digits"))
                }
            }
        }
    }

    fn invalid_format(self, reason: &'static str) -> VerificationError {
        VerificationError::InvalidFormat { doc: self, reason }
    }
}

fn is_digits(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| b.is_ascii_digit())
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocType {
    type Err = VerificationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DocType::ALL
            .into_iter()
            .find(|doc| doc.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| VerificationError::UnknownDocType(s.to_string()))
    }
}

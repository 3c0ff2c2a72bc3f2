//! One-time passcodes: generation, lazy expiry and single-use redemption.
//!
//! Each document type owns one [`OtpSlot`]; the slots of all three types
//! together form the OTP store. A slot holds at most one record, and issuing
//! a new code overwrites whatever was there, so only the most recent code is
//! ever valid.

use std::fmt;

use rand::Rng;
use subtle::ConstantTimeEq;
use time::{Duration, OffsetDateTime};

use crate::doc_type::DocType;
use crate::error::{Result, VerificationError};

/// Default validity window of an issued code.
pub const DEFAULT_OTP_TTL: Duration = Duration::seconds(120);

const CODE_MIN: u32 = 100_000;
const CODE_MAX: u32 = 999_999;

/// Draws a six-digit code uniformly from `100000..=999999`.
pub fn generate_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    rng.gen_range(CODE_MIN..=CODE_MAX).to_string()
}

/// An issued code and its validity window.
#[derive(Clone, PartialEq, Eq)]
pub struct OtpRecord {
    pub doc: DocType,
    pub code: String,
    pub issued_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
    pub redeemed: bool,
}

impl OtpRecord {
    /// Usable iff not yet redeemed and `now <= expires_at`.
    pub fn is_live(&self, now: OffsetDateTime) -> bool {
        !self.redeemed && now <= self.expires_at
    }

    /// Whole seconds left before expiry, for display only.
    pub fn seconds_remaining(&self, now: OffsetDateTime) -> Option<u64> {
        if !self.is_live(now) {
            return None;
        }
        u64::try_from((self.expires_at - now).whole_seconds()).ok()
    }
}

impl fmt::Debug for OtpRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OtpRecord")
            .field("doc", &self.doc)
            .field("code", &"******")
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .field("redeemed", &self.redeemed)
            .finish()
    }
}

/// The OTP store entry of a single document type.
#[derive(Debug, Clone, Default)]
pub struct OtpSlot {
    record: Option<OtpRecord>,
}

impl OtpSlot {
    /// Generates and stores a fresh code, superseding any previous one.
    pub fn issue<R: Rng + ?Sized>(
        &mut self,
        doc: DocType,
        now: OffsetDateTime,
        ttl: Duration,
        rng: &mut R,
    ) -> &OtpRecord {
        self.record.insert(OtpRecord {
            doc,
            code: generate_code(rng),
            issued_at: now,
            expires_at: now + ttl,
            redeemed: false,
        })
    }

    /// Whether `submitted` would redeem the stored code at `now`. Side-effect free.
    pub fn matches(&self, submitted: &str, now: OffsetDateTime) -> bool {
        let Some(record) = &self.record else {
            return false;
        };
        let submitted = submitted.trim();
        let equal: bool = record.code.as_bytes().ct_eq(submitted.as_bytes()).into();
        equal && record.is_live(now)
    }

    /// Redeems the stored code. Any failure is reported as
    /// [`VerificationError::OtpMismatchOrExpired`].
    pub fn verify(&mut self, doc: DocType, submitted: &str, now: OffsetDateTime) -> Result<()> {
        if !self.matches(submitted, now) {
            return Err(VerificationError::OtpMismatchOrExpired { doc });
        }
        self.redeem();
        Ok(())
    }

    fn redeem(&mut self) {
        if let Some(record) = self.record.as_mut() {
            record.redeemed = true;
        }
    }

    pub fn record(&self) -> Option<&OtpRecord> {
        self.record.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    fn t0() -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap()
    }

    fn issued(slot: &mut OtpSlot) -> String {
        let mut rng = StdRng::seed_from_u64(7);
        slot.issue(DocType::NationalId, t0(), DEFAULT_OTP_TTL, &mut rng)
            .code
            .clone()
    }

    #[test]
    fn codes_are_six_digits_and_spread_over_the_range() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut buckets = [0u32; 9];
        let trials = 90_000;
        for _ in 0..trials {
            let code = generate_code(&mut rng);
            assert_eq!(code.len(), 6);
            let n: u32 = code.parse().unwrap();
            assert!((CODE_MIN..=CODE_MAX).contains(&n));
            buckets[(n / 100_000 - 1) as usize] += 1;
        }
        // each leading digit should hold roughly a ninth of the draws
        for count in buckets {
            assert!((9_000..11_000).contains(&count), "bucket count {count}");
        }
    }

    #[test]
    fn code_is_single_use() {
        let mut slot = OtpSlot::default();
        let code = issued(&mut slot);
        assert!(slot.verify(DocType::NationalId, &code, t0()).is_ok());
        assert!(matches!(
            slot.verify(DocType::NationalId, &code, t0()),
            Err(VerificationError::OtpMismatchOrExpired { .. })
        ));
    }

    #[test]
    fn expiry_boundary_is_inclusive() {
        let mut slot = OtpSlot::default();
        let code = issued(&mut slot);
        assert!(slot.matches(&code, t0() + Duration::seconds(120)));
        assert!(!slot.matches(&code, t0() + Duration::seconds(120) + Duration::nanoseconds(1)));
        assert!(slot
            .verify(DocType::NationalId, &code, t0() + Duration::seconds(121))
            .is_err());
    }

    #[test]
    fn reissue_supersedes_previous_code() {
        let mut slot = OtpSlot::default();
        let first = issued(&mut slot);
        let mut rng = StdRng::seed_from_u64(99);
        let second = slot
            .issue(DocType::NationalId, t0(), DEFAULT_OTP_TTL, &mut rng)
            .code
            .clone();
        if first != second {
            assert!(!slot.matches(&first, t0()));
        }
        assert!(slot.matches(&second, t0()));
    }

    #[test]
    fn empty_slot_and_wrong_code_fail() {
        let mut slot = OtpSlot::default();
        assert!(slot.verify(DocType::TaxId, "123456", t0()).is_err());
        let code = issued(&mut slot);
        let wrong = if code == "123456" { "654321" } else { "123456" };
        assert!(!slot.matches(wrong, t0()));
        assert!(slot.matches(&format!(" {code} "), t0()));
    }

    #[test]
    fn countdown_is_derived_from_expiry() {
        let mut slot = OtpSlot::default();
        issued(&mut slot);
        let record = slot.record().unwrap();
        assert_eq!(record.seconds_remaining(t0()), Some(120));
        assert_eq!(record.seconds_remaining(t0() + Duration::seconds(100)), Some(20));
        assert_eq!(record.seconds_remaining(t0() + Duration::seconds(121)), None);
    }

    #[test]
    fn debug_output_redacts_the_code() {
        let mut slot = OtpSlot::default();
        let code = issued(&mut slot);
        let rendered = format!("{:?}", slot.record().unwrap());
        assert!(!rendered.contains(&code));
    }
}

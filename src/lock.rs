//! The single-holder session lock.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, VerificationError};

/// Capability token identifying one verifying holder.
///
/// Minted on first contact and presented on every later call; the lock
/// compares tokens, never network addresses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HolderToken(Uuid);

impl HolderToken {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for HolderToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for HolderToken {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Outcome of a successful admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// No session was active; the caller now holds it.
    Established,
    /// The caller already held the session.
    Continued,
}

/// Admits at most one holder until cleared.
#[derive(Debug, Clone, Default)]
pub struct SessionLock {
    holder: Option<HolderToken>,
}

impl SessionLock {
    /// Admits `caller` if the lock is free or already theirs. A conflicting
    /// caller changes nothing.
    pub fn admit(&mut self, caller: &HolderToken) -> Result<Admission> {
        match &self.holder {
            None => {
                self.holder = Some(caller.clone());
                Ok(Admission::Established)
            }
            Some(holder) if holder == caller => Ok(Admission::Continued),
            Some(_) => Err(VerificationError::LockConflict),
        }
    }

    pub fn holder(&self) -> Option<&HolderToken> {
        self.holder.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.holder.is_some()
    }

    pub fn clear(&mut self) {
        self.holder = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_caller_holds_until_cleared() {
        let a = HolderToken::generate();
        let b = HolderToken::generate();
        let mut lock = SessionLock::default();

        assert_eq!(lock.admit(&a).unwrap(), Admission::Established);
        assert_eq!(lock.admit(&a).unwrap(), Admission::Continued);
        assert!(matches!(lock.admit(&b), Err(VerificationError::LockConflict)));
        assert_eq!(lock.holder(), Some(&a));

        lock.clear();
        assert!(!lock.is_active());
        assert_eq!(lock.admit(&b).unwrap(), Admission::Established);
    }

    #[test]
    fn token_round_trips_through_text() {
        let token = HolderToken::generate();
        let parsed: HolderToken = token.to_string().parse().unwrap();
        assert_eq!(parsed, token);
    }
}

use std::fmt::Debug;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use crate::doc_type::DocType;
use crate::document::DocumentSlot;
use crate::error::Result;
use crate::lock::{Admission, HolderToken, SessionLock};
use crate::store::StateStore;

/// A process-lifetime state store for verification sessions.
///
/// `MemoryStateStore` keeps the session lock and the three document slots in
/// memory. Nothing survives a restart, which is the intended lifetime of a
/// verification session.
///
/// # Locking
///
/// | Lock           | Taken by                        | Purpose                                 |
/// |----------------|---------------------------------|-----------------------------------------|
/// | `gate` (read)  | every operation except reset    | keeps reset out while an operation runs |
/// | `gate` (write) | [`reset`](StateStore::reset)    | clears everything as one step           |
/// | `lock`         | admission                       | compares and records the holder         |
/// | `slots[i]`     | operations on one document type | serializes same-type operations         |
///
/// Slots are always locked in review order, so taking all three for a
/// snapshot cannot deadlock against single-slot operations.
///
/// # Usage
///
/// ```no_run
/// use std::sync::Arc;
/// use docverify_session::{MemoryStateStore, SystemClock, VerificationConfig, VerificationEngine};
/// # use docverify_session::{CheckError, CheckReport, CheckRequest, DocumentChecker};
/// # #[derive(Debug)]
/// # struct Checker;
/// # #[async_trait::async_trait]
/// # impl DocumentChecker for Checker {
/// #     async fn check(&self, _: &CheckRequest) -> Result<CheckReport, CheckError> {
/// #         unimplemented!()
/// #     }
/// # }
///
/// let engine = VerificationEngine::new(
///     MemoryStateStore::new(),
///     Arc::new(Checker),
///     Arc::new(SystemClock),
///     &VerificationConfig::default(),
/// );
/// ```
#[derive(Debug)]
pub struct MemoryStateStore {
    /// Store-wide gate; reset holds it exclusively.
    gate: RwLock<()>,
    /// The single-holder lock.
    lock: Mutex<SessionLock>,
    /// One slot per document type, indexed by [`DocType::index`].
    slots: [Mutex<DocumentSlot>; 3],
}

impl MemoryStateStore {
    /// Creates an empty store: no holder, every document untouched.
    pub fn new() -> Self {
        Self {
            gate: RwLock::new(()),
            lock: Mutex::new(SessionLock::default()),
            slots: DocType::ALL.map(|doc| Mutex::new(DocumentSlot::new(doc))),
        }
    }
}

impl Default for MemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    /// Admits `caller` and mutates one slot.
    ///
    /// The closure runs against a draft copy of the slot which replaces the
    /// stored slot only if the closure succeeds. File contents are reference
    /// counted, so the copy does not duplicate uploaded bytes.
    async fn with_admitted<F, R>(
        &self,
        caller: &HolderToken,
        doc: DocType,
        f: F,
    ) -> Result<(Admission, R)>
    where
        F: FnOnce(&mut DocumentSlot) -> Result<R> + Send,
        R: Send,
    {
        let _gate = self.gate.read().await;
        let admission = self.lock.lock().await.admit(caller)?;

        let mut slot = self.slots[doc.index()].lock().await;
        let mut draft = slot.clone();
        let value = f(&mut draft)?;
        *slot = draft;

        Ok((admission, value))
    }

    async fn with_document<F, R>(&self, doc: DocType, f: F) -> Result<R>
    where
        F: FnOnce(&mut DocumentSlot) -> Result<R> + Send,
        R: Send,
    {
        let _gate = self.gate.read().await;

        let mut slot = self.slots[doc.index()].lock().await;
        let mut draft = slot.clone();
        let value = f(&mut draft)?;
        *slot = draft;

        Ok(value)
    }

    async fn documents(&self, caller: &HolderToken) -> Result<(Admission, Vec<DocumentSlot>)> {
        let _gate = self.gate.read().await;
        let admission = self.lock.lock().await.admit(caller)?;

        let mut documents = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            documents.push(slot.lock().await.clone());
        }
        Ok((admission, documents))
    }

    /// Waits for in-flight operations to drain, then clears the holder and
    /// replaces every slot with an untouched one.
    async fn reset(&self) -> Result<()> {
        let _gate = self.gate.write().await;

        self.lock.lock().await.clear();
        for (slot, doc) in self.slots.iter().zip(DocType::ALL) {
            *slot.lock().await = DocumentSlot::new(doc);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use time::OffsetDateTime;

    use super::*;
    use crate::document::Phase;
    use crate::error::VerificationError;
    use crate::otp::DEFAULT_OTP_TTL;

    fn issue(slot: &mut DocumentSlot, number: &str) -> Result<String> {
        let mut rng = StdRng::seed_from_u64(3);
        slot.send_otp(number, OffsetDateTime::UNIX_EPOCH, DEFAULT_OTP_TTL, &mut rng)
            .map(|issued| issued.code)
    }

    #[tokio::test]
    async fn conflicting_caller_mutates_nothing() {
        let store = MemoryStateStore::new();
        let a = HolderToken::generate();
        let b = HolderToken::generate();

        let (admission, _) = store
            .with_admitted(&a, DocType::NationalId, |slot| issue(slot, "123456789012"))
            .await
            .unwrap();
        assert_eq!(admission, Admission::Established);

        let err = store
            .with_admitted(&b, DocType::TaxId, |slot| issue(slot, "ABCDE1234F"))
            .await
            .unwrap_err();
        assert!(matches!(err, VerificationError::LockConflict));

        let (_, docs) = store.documents(&a).await.unwrap();
        assert_eq!(docs[DocType::TaxId.index()].phase(), Phase::Untouched);
    }

    #[tokio::test]
    async fn failed_closure_leaves_slot_untouched() {
        let store = MemoryStateStore::new();
        let a = HolderToken::generate();

        let err = store
            .with_admitted(&a, DocType::NationalId, |slot| {
                issue(slot, "123456789012")?;
                Err::<(), _>(VerificationError::Store("boom".into()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, VerificationError::Store(_)));

        let (_, docs) = store.documents(&a).await.unwrap();
        assert_eq!(docs[0].phase(), Phase::Untouched);
    }

    #[tokio::test]
    async fn reset_clears_lock_and_all_slots() {
        let store = MemoryStateStore::new();
        let a = HolderToken::generate();
        let b = HolderToken::generate();
        for (doc, number) in [
            (DocType::NationalId, "123456789012"),
            (DocType::TaxId, "ABCDE1234F"),
            (DocType::SecondaryId, "123456789012"),
        ] {
            store
                .with_admitted(&a, doc, |slot| issue(slot, number))
                .await
                .unwrap();
        }

        store.reset().await.unwrap();
        store.reset().await.unwrap();

        let (admission, docs) = store.documents(&b).await.unwrap();
        assert_eq!(admission, Admission::Established);
        assert!(docs.iter().all(|slot| slot.phase() == Phase::Untouched));
        assert_eq!(
            docs.iter().map(DocumentSlot::doc).collect::<Vec<_>>(),
            DocType::ALL.to_vec()
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn same_type_operations_serialize() {
        let store = Arc::new(MemoryStateStore::new());
        let a = HolderToken::generate();

        let mut handles = Vec::new();
        for _ in 0..32 {
            let store = Arc::clone(&store);
            let a = a.clone();
            handles.push(tokio::spawn(async move {
                store
                    .with_admitted(&a, DocType::NationalId, |slot| issue(slot, "123456789012"))
                    .await
                    .map(|(_, code)| code)
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let (_, docs) = store.documents(&a).await.unwrap();
        assert_eq!(docs[0].phase(), Phase::OtpSent);
    }
}

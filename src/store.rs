//! The injected state store behind the session lock, the OTP store and the
//! document state machines.
//!
//! Callers never touch the records directly; every mutation goes through a
//! closure run by the store under the guarantees listed on each method, which
//! lets the in-memory implementation be replaced by a networked or persistent
//! one without changing the engine.

use std::fmt::Debug;

use async_trait::async_trait;

use crate::doc_type::DocType;
use crate::document::DocumentSlot;
use crate::error::Result;
use crate::lock::{Admission, HolderToken};

#[async_trait]
pub trait StateStore: Debug + Send + Sync + 'static {
    /// Admits `caller`, then runs `f` on the slot of `doc`.
    ///
    /// - admission and `f` form one step with respect to [`reset`](Self::reset)
    /// - operations on the same `doc` are serialized, different types may run
    ///   in parallel
    /// - if `f` fails, the slot is left exactly as it was
    async fn with_admitted<F, R>(
        &self,
        caller: &HolderToken,
        doc: DocType,
        f: F,
    ) -> Result<(Admission, R)>
    where
        F: FnOnce(&mut DocumentSlot) -> Result<R> + Send,
        R: Send;

    /// Runs `f` on the slot of `doc` without consulting the lock. Used to land
    /// results of work that was admitted earlier; the slot's own bookkeeping
    /// decides whether the result still applies.
    async fn with_document<F, R>(&self, doc: DocType, f: F) -> Result<R>
    where
        F: FnOnce(&mut DocumentSlot) -> Result<R> + Send,
        R: Send;

    /// Admits `caller` and returns a consistent copy of all slots, in review order.
    async fn documents(&self, caller: &HolderToken) -> Result<(Admission, Vec<DocumentSlot>)>;

    /// Clears the holder, every OTP and every document slot as one step.
    async fn reset(&self) -> Result<()>;
}

//! Operation application for cinder.
//!
//! This crate holds everything between a validated operation and the state
//! overlay it mutates: the resource meter and its budgets, the sealed
//! contract sandbox interface, the refundable-fee tracker, the diagnostic
//! event buffer, the compiled-module cache, and the operation appliers
//! themselves (contract invocation, footprint restore, TTL extension, and a
//! classic data op sharing the same overlay).
//!
//! Operation-level failures map to typed result codes and never abort the
//! ledger; structural violations surface as [`TxError`] and do.

pub mod events;
pub mod fee;
pub mod meter;
pub mod module_cache;
pub mod operations;
pub mod result;
pub mod sandbox;
pub mod test_utils;

use cinder_model::EntryKey;
use cinder_state::StateError;
use thiserror::Error;

/// Non-recoverable errors during operation application.
///
/// Anything here means the ledger cannot close: either the sandbox reported
/// an internal failure or the implementation broke a structural invariant.
/// Op-level outcomes (trapped, over budget, archived, malformed) are carried
/// by [`result::OpResult`] instead.
#[derive(Debug, Error)]
pub enum TxError {
    /// State store or overlay failure.
    #[error("state error: {0}")]
    State(#[from] StateError),

    /// The sandbox claims an internal (non-deterministic) failure.
    #[error("internal error during sandbox invocation: {0}")]
    SandboxInternal(String),

    /// The sandbox created a contract entry without its TTL sibling.
    #[error("created contract entry has no created TTL sibling: {0:?}")]
    CreatedEntryWithoutTtl(EntryKey),

    /// The sandbox returned an entry class it is not allowed to touch.
    #[error("unexpected entry in sandbox output: {0:?}")]
    UnexpectedSandboxEntry(EntryKey),

    /// A structural condition the implementation cannot honor.
    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, TxError>;

pub use events::DiagnosticEventBuffer;
pub use fee::RefundableFeeTracker;
pub use meter::{LimitBreach, ResourceMeter};
pub use module_cache::{CompilePool, ModuleCache};
pub use operations::{
    ApplyContext, DeclaredResources, Footprint, HostFunction, Operation, ResourceExt,
    ThresholdLevel,
};
pub use result::{
    ClassicResult, ExtendTtlResult, InvokeResult, OpApplied, OpResult, RestoreResult,
};
pub use sandbox::{AuthEntry, ContractSandbox, InvokeOutput, InvokeParams, LedgerInfo, RentChange};

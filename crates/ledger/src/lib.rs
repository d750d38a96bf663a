//! Ledger apply orchestration for cinder.
//!
//! Takes an ordered set of operations, runs them against an overlay rooted
//! at the last committed state, sweeps expired entries into the hot archive,
//! commits the new state, and hands the resulting deltas to the invariant
//! checker.

pub mod manager;

use cinder_invariant::InvariantError;
use cinder_state::StateError;
use cinder_tx::TxError;
use thiserror::Error;

/// Errors that abort a ledger close.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// State store failure.
    #[error("state error: {0}")]
    State(#[from] StateError),

    /// Non-recoverable operation failure (sandbox internal error or a
    /// structural bug).
    #[error("transaction error: {0}")]
    Tx(#[from] TxError),

    /// A strict invariant did not hold after commit.
    #[error("invariant failure: {0}")]
    Invariant(#[from] InvariantError),

    /// A structural condition the implementation cannot honor.
    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;

pub use manager::{CloseData, CloseOutcome, LedgerHeader, LedgerManager, LedgerOp};

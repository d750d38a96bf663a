//! Typed operation results.

use cinder_common::Hash256;
use cinder_model::{ContractEvent, Val};

/// Result of a contract invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvokeResult {
    /// The invocation succeeded; carries the hash of the success preimage
    /// (events plus return value).
    Success { result_hash: Hash256 },
    Malformed,
    Trapped,
    ResourceLimitExceeded,
    EntryArchived,
    InsufficientRefundableFee,
}

/// Result of a footprint restore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreResult {
    Success,
    Malformed,
    ResourceLimitExceeded,
    InsufficientRefundableFee,
}

/// Result of a footprint TTL extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendTtlResult {
    Success,
    Malformed,
    ResourceLimitExceeded,
    InsufficientRefundableFee,
}

/// Result of a classic operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassicResult {
    Success,
    Malformed,
    NotFound,
}

/// Result of any operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpResult {
    Invoke(InvokeResult),
    Restore(RestoreResult),
    ExtendTtl(ExtendTtlResult),
    Classic(ClassicResult),
}

impl OpResult {
    /// Whether the operation succeeded.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            OpResult::Invoke(InvokeResult::Success { .. })
                | OpResult::Restore(RestoreResult::Success)
                | OpResult::ExtendTtl(ExtendTtlResult::Success)
                | OpResult::Classic(ClassicResult::Success)
        )
    }
}

/// An applied operation: its result plus the meta the transaction set
/// carries forward (events and the invoke return value).
#[derive(Debug, Clone)]
pub struct OpApplied {
    pub result: OpResult,
    pub events: Vec<ContractEvent>,
    pub return_value: Option<Val>,
}

impl OpApplied {
    /// An outcome with no events or return value.
    pub fn bare(result: OpResult) -> Self {
        Self {
            result,
            events: Vec::new(),
            return_value: None,
        }
    }
}

//! Operations and the apply dispatch.
//!
//! Operations are a tagged enum over the contract ops (invoke, restore,
//! extend-TTL) and the classic ops that share the same overlay. Each op
//! struct implements [`OpBehavior`]; the enum dispatches. Shared behavior
//! is plain functions.

pub mod classic;
pub mod extend_ttl;
pub mod invoke;
pub mod restore;

use cinder_common::{ContractConfig, Hash256};
use cinder_model::{codec, AccountId, ContractId, EntryKey, Val};
use cinder_state::Overlay;

use crate::events::DiagnosticEventBuffer;
use crate::fee::RefundableFeeTracker;
use crate::module_cache::ModuleCache;
use crate::result::{OpApplied, OpResult};
use crate::sandbox::ContractSandbox;
use crate::Result;

pub use classic::ManageDataOp;
pub use extend_ttl::ExtendFootprintTtlOp;
pub use invoke::InvokeContractOp;
pub use restore::RestoreFootprintOp;

/// Declared read-only and read-write key sets of a contract operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Footprint {
    pub read_only: Vec<EntryKey>,
    pub read_write: Vec<EntryKey>,
}

/// Per-operation resource declaration from the transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeclaredResources {
    pub instructions: u64,
    pub disk_read_bytes: u32,
    pub write_bytes: u32,
}

/// Resource declaration extension.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ResourceExt {
    /// No extension.
    #[default]
    V0,
    /// Autorestore: indices into the read-write footprint naming entries the
    /// submitter knows to be archived.
    V1 { archived_indices: Vec<u32> },
}

impl ResourceExt {
    /// Bitmap over the read-write footprint marking autorestore entries.
    /// Empty when no entries are marked.
    pub fn autorestore_bitmap(&self, read_write_len: usize) -> Vec<bool> {
        match self {
            ResourceExt::V0 => Vec::new(),
            ResourceExt::V1 { archived_indices } => {
                if archived_indices.is_empty() {
                    return Vec::new();
                }
                let mut bitmap = vec![false; read_write_len];
                for &index in archived_indices {
                    if let Some(slot) = bitmap.get_mut(index as usize) {
                        *slot = true;
                    }
                }
                bitmap
            }
        }
    }

    /// Whether any autorestore index is out of range for the footprint.
    pub fn has_out_of_range_index(&self, read_write_len: usize) -> bool {
        match self {
            ResourceExt::V0 => false,
            ResourceExt::V1 { archived_indices } => archived_indices
                .iter()
                .any(|&i| i as usize >= read_write_len),
        }
    }
}

/// The host function payload of an invoke operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostFunction {
    /// Call a function on a deployed contract.
    InvokeContract {
        contract: ContractId,
        function: String,
        args: Vec<Val>,
    },
    /// Deploy a contract from uploaded code.
    CreateContract {
        code_hash: Hash256,
        salt: Hash256,
    },
    /// Upload contract code.
    UploadWasm(Vec<u8>),
}

/// Signature threshold class of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdLevel {
    Low,
    Medium,
    High,
}

/// Environment an operation applies in.
///
/// The overlay carries the ledger position and the archive snapshot; the
/// rest is per-ledger context owned by the ledger manager.
pub struct ApplyContext<'a> {
    pub overlay: &'a mut Overlay,
    pub config: &'a ContractConfig,
    pub sandbox: &'a dyn ContractSandbox,
    pub module_cache: &'a ModuleCache,
    pub refundable: &'a mut RefundableFeeTracker,
    pub diagnostics: &'a mut DiagnosticEventBuffer,
    pub base_prng_seed: [u8; 32],
    pub network_id: Hash256,
    pub close_time: u64,
    pub base_reserve: u32,
}

/// Behavior shared by every operation kind.
pub trait OpBehavior {
    /// Static validation against config and protocol version. `Err` carries
    /// the op result to record; valid ops return `Ok(())`.
    fn check_valid(
        &self,
        config: &ContractConfig,
        protocol_version: u32,
        diagnostics: &mut DiagnosticEventBuffer,
    ) -> std::result::Result<(), OpResult>;

    /// Apply against the overlay. Op-level failures come back as a non-success
    /// [`OpApplied`]; only structural violations return `Err`.
    fn apply(&self, ctx: &mut ApplyContext<'_>) -> Result<OpApplied>;

    /// Signature threshold class.
    fn threshold_level(&self) -> ThresholdLevel;

    /// Whether this is a contract (footprint-carrying) operation.
    fn is_contract_op(&self) -> bool;
}

/// A ledger operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Invoke(InvokeContractOp),
    RestoreFootprint(RestoreFootprintOp),
    ExtendFootprintTtl(ExtendFootprintTtlOp),
    Classic(ManageDataOp),
}

impl Operation {
    fn behavior(&self) -> &dyn OpBehavior {
        match self {
            Operation::Invoke(op) => op,
            Operation::RestoreFootprint(op) => op,
            Operation::ExtendFootprintTtl(op) => op,
            Operation::Classic(op) => op,
        }
    }

    pub fn check_valid(
        &self,
        config: &ContractConfig,
        protocol_version: u32,
        diagnostics: &mut DiagnosticEventBuffer,
    ) -> std::result::Result<(), OpResult> {
        self.behavior().check_valid(config, protocol_version, diagnostics)
    }

    pub fn apply(&self, ctx: &mut ApplyContext<'_>) -> Result<OpApplied> {
        self.behavior().apply(ctx)
    }

    pub fn threshold_level(&self) -> ThresholdLevel {
        self.behavior().threshold_level()
    }

    pub fn is_contract_op(&self) -> bool {
        self.behavior().is_contract_op()
    }

    /// The source account of the operation.
    pub fn source(&self) -> &AccountId {
        match self {
            Operation::Invoke(op) => &op.source,
            Operation::RestoreFootprint(op) => &op.source,
            Operation::ExtendFootprintTtl(op) => &op.source,
            Operation::Classic(op) => &op.source,
        }
    }
}

/// Validate a contract entry against the configured size limits.
///
/// Pushes a diagnostic and returns false for oversize code or data entries;
/// classic and TTL entries always pass.
pub(crate) fn validate_contract_ledger_entry(
    key: &EntryKey,
    entry_size: u32,
    config: &ContractConfig,
    diagnostics: &mut DiagnosticEventBuffer,
) -> bool {
    match key {
        EntryKey::ContractCode { .. } => {
            if entry_size > config.max_contract_size_bytes {
                diagnostics.push_error(
                    "contract code entry exceeds network config maximum size",
                    vec![
                        Val::U64(entry_size as u64),
                        Val::U64(config.max_contract_size_bytes as u64),
                    ],
                );
                return false;
            }
            true
        }
        EntryKey::ContractData { .. } => {
            if entry_size > config.max_contract_data_entry_size_bytes {
                diagnostics.push_error(
                    "contract data entry exceeds network config maximum size",
                    vec![
                        Val::U64(entry_size as u64),
                        Val::U64(config.max_contract_data_entry_size_bytes as u64),
                    ],
                );
                return false;
            }
            true
        }
        _ => true,
    }
}

/// Diagnostic detail values describing a key, used by archived-entry errors.
pub(crate) fn key_diagnostic_details(key: &EntryKey) -> Vec<Val> {
    match key {
        EntryKey::ContractCode { hash } => vec![Val::bytes(hash.as_bytes().to_vec())],
        EntryKey::ContractData { contract, key, .. } => {
            vec![Val::bytes(contract.0.as_bytes().to_vec()), key.clone()]
        }
        other => vec![Val::bytes(codec::encode_key(other))],
    }
}

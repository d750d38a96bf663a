//! The sealed contract sandbox interface.
//!
//! The guest-side execution engine is an external collaborator: this core
//! hands it the footprint entries and budgets, and gets back the modified
//! entries, events, and consumption. Implementations must be deterministic
//! for identical inputs; a non-deterministic failure is reported through
//! `is_internal_error` and escalates past the operation level.

use cinder_common::config::{CostParams, RentFeeConfig};
use cinder_common::Hash256;
use cinder_model::{AccountId, ContractEvent, DiagnosticEvent, Entry, TtlEntry, Val};

use crate::module_cache::ModuleCache;
use crate::operations::{DeclaredResources, HostFunction, ResourceExt};

/// Authorization entry carried by an invoke operation, passed through to the
/// sandbox opaquely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEntry {
    pub address: AccountId,
    pub nonce: u64,
    pub signature_payload: Vec<u8>,
}

/// Ledger context handed to the sandbox.
#[derive(Debug, Clone)]
pub struct LedgerInfo {
    pub protocol_version: u32,
    pub sequence_number: u32,
    pub timestamp: u64,
    pub base_reserve: u32,
    pub network_id: Hash256,
    pub memory_limit: u64,
    pub min_persistent_entry_ttl: u32,
    pub min_temp_entry_ttl: u32,
    pub max_entry_ttl: u32,
    pub cpu_cost_params: CostParams,
    pub mem_cost_params: CostParams,
}

/// Everything the sandbox needs for one host-function invocation.
pub struct InvokeParams<'a> {
    pub protocol_version: u32,
    pub enable_diagnostics: bool,
    pub instruction_budget: u64,
    pub host_function: &'a HostFunction,
    pub resources: &'a DeclaredResources,
    pub resource_ext: &'a ResourceExt,
    pub source: &'a AccountId,
    pub auth: &'a [AuthEntry],
    pub ledger_info: LedgerInfo,
    /// Footprint entries visible to the invocation, in footprint order.
    pub entries: &'a [Entry],
    /// TTL siblings parallel to `entries`; `None` for classic entries.
    pub ttls: &'a [Option<TtlEntry>],
    pub base_prng_seed: [u8; 32],
    pub rent_config: &'a RentFeeConfig,
    pub module_cache: &'a ModuleCache,
}

/// Output of one host-function invocation.
#[derive(Debug, Clone, Default)]
pub struct InvokeOutput {
    pub success: bool,
    /// Set when the failure is not a deterministic contract failure; the
    /// operation escalates instead of mapping to a result code.
    pub is_internal_error: bool,
    pub cpu_insns: u64,
    pub mem_bytes: u64,
    pub time_nsecs: u64,
    pub cpu_insns_excluding_vm_instantiation: u64,
    pub time_nsecs_excluding_vm_instantiation: u64,
    /// Entries created or modified by the invocation, including TTL
    /// siblings. Untouched read-write footprint entries are passed through.
    pub modified_entries: Vec<Entry>,
    /// Contract and system events, in emission order.
    pub contract_events: Vec<ContractEvent>,
    /// Diagnostic-only events.
    pub diagnostic_events: Vec<DiagnosticEvent>,
    pub result_value: Val,
    /// Rent fee accrued by TTL extensions and size growth inside the
    /// invocation, charged against the refundable fee.
    pub rent_fee: i64,
}

/// A per-entry record of size and TTL before/after a restoration or
/// extension, used to compute rent fees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RentChange {
    pub is_persistent: bool,
    pub old_size_bytes: u32,
    pub new_size_bytes: u32,
    pub old_live_until_ledger: u32,
    pub new_live_until_ledger: u32,
}

/// The sealed contract execution engine.
pub trait ContractSandbox {
    /// Run one host function against the supplied entry buffers.
    fn invoke_host_function(&self, params: InvokeParams<'_>) -> InvokeOutput;

    /// Rent fee for a set of entry changes.
    fn compute_rent_fee(
        &self,
        protocol_version: u32,
        ledger_version: u32,
        changes: &[RentChange],
        config: &RentFeeConfig,
        ledger_seq: u32,
    ) -> i64;

    /// In-memory size of a contract-code entry for rent purposes.
    fn contract_code_memory_size_for_rent(
        &self,
        protocol_version: u32,
        ledger_version: u32,
        code: &[u8],
        cpu_cost_params: &CostParams,
        mem_cost_params: &CostParams,
    ) -> u32;
}

//! Test utilities: a scriptable mock sandbox and an apply harness.
//!
//! The mock sandbox replays queued outputs (falling back to a pass-through
//! success), and the harness owns the stores, config, and fee tracker so
//! tests can apply operations the same way the ledger manager does.

use std::collections::VecDeque;

use parking_lot::Mutex;

use cinder_common::config::{CostParams, RentFeeConfig};
use cinder_common::{ContractConfig, Hash256};
use cinder_model::{
    AccountId, ContractCodeEntry, ContractDataEntry, ContractId, DiagnosticEvent, Durability,
    Entry, EntryKey, EntryPayload, Val,
};
use cinder_state::{HotArchive, LiveStore, Overlay};

use crate::events::DiagnosticEventBuffer;
use crate::fee::RefundableFeeTracker;
use crate::module_cache::ModuleCache;
use crate::operations::{ApplyContext, DeclaredResources, Operation};
use crate::result::OpApplied;
use crate::sandbox::{ContractSandbox, InvokeOutput, InvokeParams, RentChange};

/// Scriptable sandbox: replays queued outputs, or passes the footprint
/// entries through unchanged as a successful invocation.
#[derive(Debug, Default)]
pub struct MockSandbox {
    outputs: Mutex<VecDeque<InvokeOutput>>,
    /// Entry keys visible to each invocation, in call order. Tests probe
    /// this to confirm the sandbox only ever sees declared-footprint state.
    seen_entry_keys: Mutex<Vec<Vec<EntryKey>>>,
    /// Flat rent fee charged per rent change by `compute_rent_fee`.
    pub rent_fee_per_change: i64,
}

impl MockSandbox {
    pub fn new() -> Self {
        Self {
            outputs: Mutex::new(VecDeque::new()),
            seen_entry_keys: Mutex::new(Vec::new()),
            rent_fee_per_change: 100,
        }
    }

    /// Queue an output for the next invocation.
    pub fn enqueue(&self, output: InvokeOutput) {
        self.outputs.lock().push_back(output);
    }

    /// Entry keys the sandbox saw, one vector per invocation.
    pub fn seen_entry_keys(&self) -> Vec<Vec<EntryKey>> {
        self.seen_entry_keys.lock().clone()
    }

    /// A successful output shell.
    pub fn success_output(modified_entries: Vec<Entry>) -> InvokeOutput {
        InvokeOutput {
            success: true,
            modified_entries,
            result_value: Val::Void,
            ..InvokeOutput::default()
        }
    }
}

impl ContractSandbox for MockSandbox {
    fn invoke_host_function(&self, params: InvokeParams<'_>) -> InvokeOutput {
        self.seen_entry_keys
            .lock()
            .push(params.entries.iter().map(Entry::key).collect());
        if let Some(output) = self.outputs.lock().pop_front() {
            return output;
        }
        // Pass-through: echo the footprint entries unchanged.
        Self::success_output(params.entries.to_vec())
    }

    fn compute_rent_fee(
        &self,
        _protocol_version: u32,
        _ledger_version: u32,
        changes: &[RentChange],
        _config: &RentFeeConfig,
        _ledger_seq: u32,
    ) -> i64 {
        self.rent_fee_per_change * changes.len() as i64
    }

    fn contract_code_memory_size_for_rent(
        &self,
        _protocol_version: u32,
        _ledger_version: u32,
        code: &[u8],
        _cpu_cost_params: &CostParams,
        _mem_cost_params: &CostParams,
    ) -> u32 {
        code.len() as u32 * 3
    }
}

/// Apply harness owning the stores and per-ledger context.
pub struct ApplyEnv {
    pub live: LiveStore,
    pub archive: HotArchive,
    pub config: ContractConfig,
    pub sandbox: MockSandbox,
    pub module_cache: ModuleCache,
    pub ledger_seq: u32,
    pub protocol_version: u32,
    pub close_time: u64,
    pub refundable_fee: i64,
    /// Diagnostics from the most recent apply.
    pub last_diagnostics: Vec<DiagnosticEvent>,
}

impl ApplyEnv {
    pub fn new(protocol_version: u32) -> Self {
        Self {
            live: LiveStore::new(),
            archive: HotArchive::new(),
            config: ContractConfig::default(),
            sandbox: MockSandbox::new(),
            module_cache: ModuleCache::new(),
            ledger_seq: 100,
            protocol_version,
            close_time: 1_700_000_000,
            refundable_fee: 10_000_000,
            last_diagnostics: Vec::new(),
        }
    }

    /// Seed an entry, with a TTL sibling when `live_until` is given.
    pub fn seed(&mut self, entry: Entry, live_until: Option<u32>) {
        if let Some(live_until) = live_until {
            self.live
                .put(entry.make_ttl_entry(live_until, entry.last_modified_ledger_seq));
        }
        self.live.put(entry);
    }

    /// Seed an entry straight into the hot archive.
    pub fn seed_archived(&mut self, entry: Entry) {
        self.archive
            .insert_on_evict(entry)
            .expect("seeding a fresh archive entry");
    }

    /// Check, apply, and (on success) commit one operation.
    pub fn apply_op(&mut self, op: &Operation) -> crate::Result<OpApplied> {
        let mut overlay = Overlay::new(
            self.live.snapshot(self.ledger_seq, self.protocol_version),
            self.archive.snapshot(),
        );
        let mut refundable = RefundableFeeTracker::new(self.refundable_fee);
        let mut diagnostics = DiagnosticEventBuffer::new(true);

        if let Err(result) = op.check_valid(&self.config, self.protocol_version, &mut diagnostics)
        {
            self.last_diagnostics = diagnostics.take();
            return Ok(OpApplied::bare(result));
        }

        let mut ctx = ApplyContext {
            overlay: &mut overlay,
            config: &self.config,
            sandbox: &self.sandbox,
            module_cache: &self.module_cache,
            refundable: &mut refundable,
            diagnostics: &mut diagnostics,
            base_prng_seed: [7; 32],
            network_id: Hash256::hash(b"cinder test network"),
            close_time: self.close_time,
            base_reserve: 100,
        };
        let applied = op.apply(&mut ctx)?;
        self.last_diagnostics = diagnostics.take();

        // Failed operations leave no state changes behind.
        if applied.result.is_success() {
            let set = overlay.into_commit_set();
            for (key, change) in set.changes {
                match change {
                    Some(entry) => self.live.put(entry),
                    None => {
                        self.live.remove(&key);
                    }
                }
            }
            for key in &set.archive_removals {
                self.archive.remove(key);
            }
        }
        Ok(applied)
    }
}

/// A persistent contract data entry.
pub fn persistent_data_entry(seed: u8) -> Entry {
    data_entry(seed, Durability::Persistent)
}

/// A temporary contract data entry.
pub fn temp_data_entry(seed: u8) -> Entry {
    data_entry(seed, Durability::Temporary)
}

fn data_entry(seed: u8, durability: Durability) -> Entry {
    Entry::new(
        50,
        EntryPayload::ContractData(ContractDataEntry {
            contract: ContractId(Hash256::from_bytes([seed; 32])),
            key: Val::U32(seed as u32),
            durability,
            val: Val::Bytes(vec![seed; 32]),
        }),
    )
}

/// A contract code entry.
pub fn contract_code_entry(seed: u8) -> Entry {
    let code = vec![seed; 64];
    Entry::new(
        50,
        EntryPayload::ContractCode(ContractCodeEntry {
            hash: Hash256::hash(&code),
            code,
        }),
    )
}

/// Resources generous enough for most tests.
pub fn default_resources() -> DeclaredResources {
    DeclaredResources {
        instructions: 1_000_000,
        disk_read_bytes: 100_000,
        write_bytes: 100_000,
    }
}

/// A source account.
pub fn source_account(seed: u8) -> AccountId {
    AccountId([seed; 32])
}

//! The ledger manager: owns the committed stores and closes ledgers.

use std::sync::Arc;

use cinder_common::{ContractConfig, Hash256};
use cinder_invariant::{ArchivedStateConsistency, InvariantManager, LedgerCommitContext};
use cinder_model::{DiagnosticEvent, Entry, EntryKey};
use cinder_state::{
    apply_eviction, scan_for_eviction, EvictionIterator, HotArchive, HotArchiveSnapshot,
    LiveStore, LiveSnapshot, Overlay,
};
use cinder_tx::{
    ApplyContext, CompilePool, ContractSandbox, DiagnosticEventBuffer, ModuleCache, OpApplied,
    Operation, RefundableFeeTracker,
};

use crate::Result;

/// The mutable header of the chain tip.
#[derive(Debug, Clone, Copy)]
pub struct LedgerHeader {
    pub ledger_seq: u32,
    pub protocol_version: u32,
    pub close_time: u64,
    pub base_reserve: u32,
}

/// One operation scheduled into a closing ledger, with the refundable fee
/// its transaction reserved.
#[derive(Debug, Clone)]
pub struct LedgerOp {
    pub op: Operation,
    pub refundable_fee: i64,
}

/// Everything needed to close one ledger.
#[derive(Debug, Clone)]
pub struct CloseData {
    pub ops: Vec<LedgerOp>,
    pub close_time: u64,
    pub base_prng_seed: [u8; 32],
}

impl CloseData {
    /// A close with no operations.
    pub fn empty(close_time: u64) -> Self {
        Self {
            ops: Vec::new(),
            close_time,
            base_prng_seed: [0; 32],
        }
    }
}

/// The outcome of a closed ledger.
pub struct CloseOutcome {
    pub ledger_seq: u32,
    /// Per-operation results, in apply order.
    pub results: Vec<OpApplied>,
    /// Per-operation diagnostic events, parallel to `results`.
    pub diagnostics: Vec<Vec<DiagnosticEvent>>,
    /// Persistent entries evicted to the hot archive by this close.
    pub evicted_entries: Vec<Entry>,
    /// Temporary and TTL keys deleted by this close.
    pub deleted_keys: Vec<EntryKey>,
    /// Snapshot of the live state after commit.
    pub live_snapshot: LiveSnapshot,
    /// Snapshot of the hot archive after commit.
    pub archive_snapshot: HotArchiveSnapshot,
}

/// Owns the committed stores and applies closing ledgers against them.
///
/// Mutating access is single-owner: one apply thread calls `close_ledger`
/// at a time. Snapshots taken at commit are shareable with readers on other
/// threads.
pub struct LedgerManager {
    live: LiveStore,
    archive: HotArchive,
    header: LedgerHeader,
    config: ContractConfig,
    network_id: Hash256,
    sandbox: Arc<dyn ContractSandbox>,
    module_cache: Arc<ModuleCache>,
    invariants: InvariantManager,
    eviction_iter: EvictionIterator,
    enable_diagnostics: bool,
}

impl LedgerManager {
    /// Build a manager over empty stores, with the archived-state invariant
    /// registered and enabled.
    pub fn new(
        config: ContractConfig,
        network_id: Hash256,
        sandbox: Arc<dyn ContractSandbox>,
        header: LedgerHeader,
        enable_diagnostics: bool,
    ) -> Result<Self> {
        let mut invariants = InvariantManager::new();
        invariants.register(Arc::new(ArchivedStateConsistency::new()))?;
        invariants.enable("ArchivedStateConsistency")?;

        Ok(Self {
            live: LiveStore::new(),
            archive: HotArchive::new(),
            header,
            config,
            network_id,
            sandbox,
            module_cache: Arc::new(ModuleCache::new()),
            invariants,
            eviction_iter: EvictionIterator::default(),
            enable_diagnostics,
        })
    }

    /// Replace the committed stores, e.g. when assuming state at startup.
    pub fn with_state(mut self, live: LiveStore, archive: HotArchive) -> Self {
        self.live = live;
        self.archive = archive;
        self
    }

    pub fn header(&self) -> &LedgerHeader {
        &self.header
    }

    pub fn live(&self) -> &LiveStore {
        &self.live
    }

    pub fn archive(&self) -> &HotArchive {
        &self.archive
    }

    pub fn module_cache(&self) -> &Arc<ModuleCache> {
        &self.module_cache
    }

    pub fn invariants(&self) -> &InvariantManager {
        &self.invariants
    }

    /// Run the one-shot startup checks over the assumed state.
    pub fn verify_startup_state(&self) -> Result<()> {
        let live = self
            .live
            .snapshot(self.header.ledger_seq, self.header.protocol_version);
        let archive = self.archive.snapshot();
        self.invariants
            .check_after_assume_state(&live, &archive)?;
        Ok(())
    }

    /// Compile every live contract module into the cache on the worker
    /// pool. Called at startup, before the first close.
    pub fn prewarm_module_cache(&self) {
        let code: Vec<(Hash256, u32)> = self
            .live
            .iter()
            .filter_map(|(_, entry)| entry.as_contract_code())
            .map(|code| (code.hash, code.code.len() as u32))
            .collect();
        if code.is_empty() {
            return;
        }
        tracing::info!(modules = code.len(), "prewarming module cache");
        CompilePool::new(self.config.compilation_threads).run(&self.module_cache, code);
    }

    /// Close one ledger: apply operations in declared order, sweep expired
    /// entries, commit, and run the invariant checks on the produced deltas.
    pub fn close_ledger(&mut self, close: CloseData) -> Result<CloseOutcome> {
        let closing_seq = self.header.ledger_seq + 1;
        let protocol = self.header.protocol_version;
        tracing::info!(closing_seq, ops = close.ops.len(), "closing ledger");

        // Pre-commit snapshots feed the invariant checker.
        let pre_live = self
            .live
            .snapshot(self.header.ledger_seq, protocol);
        let pre_archive = self.archive.snapshot();

        let mut overlay = Overlay::new(
            self.live.snapshot(closing_seq, protocol),
            self.archive.snapshot(),
        );

        let mut results = Vec::with_capacity(close.ops.len());
        let mut diagnostics = Vec::with_capacity(close.ops.len());
        for (index, ledger_op) in close.ops.iter().enumerate() {
            let mut diag = DiagnosticEventBuffer::new(self.enable_diagnostics);
            if let Err(result) =
                ledger_op
                    .op
                    .check_valid(&self.config, protocol, &mut diag)
            {
                results.push(OpApplied::bare(result));
                diagnostics.push(diag.take());
                continue;
            }

            // Each operation applies in its own overlay frame: a failed op
            // rolls back and leaves no trace.
            overlay.begin();
            let mut refundable = RefundableFeeTracker::new(ledger_op.refundable_fee);
            let mut ctx = ApplyContext {
                overlay: &mut overlay,
                config: &self.config,
                sandbox: self.sandbox.as_ref(),
                module_cache: self.module_cache.as_ref(),
                refundable: &mut refundable,
                diagnostics: &mut diag,
                base_prng_seed: op_prng_seed(&close.base_prng_seed, index),
                network_id: self.network_id,
                close_time: close.close_time,
                base_reserve: self.header.base_reserve,
            };
            let applied = ledger_op.op.apply(&mut ctx)?;
            if applied.result.is_success() {
                overlay.commit()?;
            } else {
                overlay.rollback()?;
            }
            results.push(applied);
            diagnostics.push(diag.take());
        }

        // Fold the operations' effects into the stores.
        let commit_set = overlay.into_commit_set();
        for (key, change) in &commit_set.changes {
            match change {
                Some(entry) => self.live.put(entry.clone()),
                None => {
                    self.live.remove(key);
                }
            }
        }
        for key in &commit_set.archive_removals {
            self.archive.remove(key);
        }

        // Sweep expired entries into the archive as part of the same commit.
        let eviction = scan_for_eviction(
            &self.live,
            &self.eviction_iter,
            closing_seq,
            &self.config.archival,
        )?;
        apply_eviction(&mut self.live, &mut self.archive, &eviction)?;
        self.eviction_iter = eviction.end_iterator.clone();

        // Evicted contract code leaves the module cache; rebuild when the
        // cache has drifted far from the live code set.
        for entry in &eviction.evicted_entries {
            if let Some(code) = entry.as_contract_code() {
                self.module_cache.evict(&code.hash);
            }
        }
        let live_code_bytes: u64 = self
            .live
            .iter()
            .filter_map(|(_, entry)| entry.as_contract_code())
            .map(|code| code.code.len() as u64)
            .sum();
        if self.module_cache.needs_rebuild(live_code_bytes) {
            self.module_cache.rebuild(
                self.live
                    .iter()
                    .filter_map(|(_, entry)| entry.as_contract_code())
                    .map(|code| (code.hash, code.code.len() as u32)),
            );
        }

        self.header.ledger_seq = closing_seq;
        self.header.close_time = close.close_time;

        // The checker sees the pre-commit snapshots and the deltas that
        // produced the new state.
        let ctx = LedgerCommitContext {
            live: &pre_live,
            archive: &pre_archive,
            evicted_from_live: &eviction.evicted_entries,
            deleted_keys_from_live: &eviction.deleted_keys,
            restored_from_archive: &commit_set.restored_from_archive,
            restored_from_live: &commit_set.restored_from_live,
        };
        self.invariants.check_on_ledger_commit(&ctx)?;

        let live_snapshot = self.live.snapshot(closing_seq, protocol);
        let archive_snapshot = self.archive.snapshot();
        tracing::info!(
            closing_seq,
            archived = eviction.evicted_entries.len(),
            deleted = eviction.deleted_keys.len(),
            "ledger closed"
        );

        Ok(CloseOutcome {
            ledger_seq: closing_seq,
            results,
            diagnostics,
            evicted_entries: eviction.evicted_entries,
            deleted_keys: eviction.deleted_keys,
            live_snapshot,
            archive_snapshot,
        })
    }
}

/// Per-operation PRNG seed, derived from the ledger's base seed and the
/// operation's position.
fn op_prng_seed(base: &[u8; 32], index: usize) -> [u8; 32] {
    Hash256::hash_parts(&[base, &(index as u32).to_be_bytes()]).0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_op_prng_seeds_differ_per_index() {
        let base = [9u8; 32];
        assert_ne!(op_prng_seed(&base, 0), op_prng_seed(&base, 1));
        assert_eq!(op_prng_seed(&base, 0), op_prng_seed(&base, 0));
    }
}

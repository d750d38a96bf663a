//! Contract invocation applier.
//!
//! Assembles the declared footprint into sandbox buffers (restoring archived
//! entries where autorestore allows), invokes the sealed contract engine,
//! ingests the modified entries back into the overlay under the declared
//! budgets, and settles events and refundable fees.

use std::collections::HashSet;

use cinder_common::{
    protocol_version_is_before, protocol_version_starts_from, ContractConfig, Hash256,
    AUTO_RESTORE_PROTOCOL_VERSION, FIRST_PROTOCOL_SUPPORTING_PERSISTENT_EVICTION,
};
use cinder_model::{codec, is_live, AccountId, Entry, EntryKey, TtlEntry};

use crate::events::DiagnosticEventBuffer;
use crate::meter::ResourceMeter;
use crate::operations::{
    key_diagnostic_details, validate_contract_ledger_entry, ApplyContext, DeclaredResources,
    Footprint, HostFunction, OpBehavior, ResourceExt, ThresholdLevel,
};
use crate::result::{InvokeResult, OpApplied, OpResult};
use crate::sandbox::{AuthEntry, InvokeOutput, InvokeParams, LedgerInfo};
use crate::{Result, TxError};

/// Control flow for the apply pipeline: `Err` carries the op result of the
/// first detected failure.
type OpFlow = std::result::Result<(), InvokeResult>;

/// A contract invocation operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvokeContractOp {
    pub source: AccountId,
    pub host_function: HostFunction,
    pub auth: Vec<AuthEntry>,
    pub footprint: Footprint,
    pub resources: DeclaredResources,
    pub resource_ext: ResourceExt,
}

impl OpBehavior for InvokeContractOp {
    fn check_valid(
        &self,
        config: &ContractConfig,
        _protocol_version: u32,
        diagnostics: &mut DiagnosticEventBuffer,
    ) -> std::result::Result<(), OpResult> {
        if let HostFunction::UploadWasm(wasm) = &self.host_function {
            if wasm.len() as u32 > config.max_contract_size_bytes {
                diagnostics.push_error(
                    "uploaded contract code size exceeds network config maximum contract size",
                    vec![
                        cinder_model::Val::U64(wasm.len() as u64),
                        cinder_model::Val::U64(config.max_contract_size_bytes as u64),
                    ],
                );
                return Err(OpResult::Invoke(InvokeResult::Malformed));
            }
        }
        if self
            .resource_ext
            .has_out_of_range_index(self.footprint.read_write.len())
        {
            diagnostics.push_error(
                "autorestore index out of range of read-write footprint",
                vec![],
            );
            return Err(OpResult::Invoke(InvokeResult::Malformed));
        }
        Ok(())
    }

    fn apply(&self, ctx: &mut ApplyContext<'_>) -> Result<OpApplied> {
        InvokeApplier::new(self, ctx).apply()
    }

    fn threshold_level(&self) -> ThresholdLevel {
        ThresholdLevel::Medium
    }

    fn is_contract_op(&self) -> bool {
        true
    }
}

struct InvokeApplier<'op, 'a, 'ctx> {
    op: &'op InvokeContractOp,
    ctx: &'a mut ApplyContext<'ctx>,
    meter: ResourceMeter,
    /// Bitmap over the read-write footprint; empty when nothing is marked.
    autorestored: Vec<bool>,
    entry_bufs: Vec<Entry>,
    ttl_bufs: Vec<Option<TtlEntry>>,
}

impl<'op, 'a, 'ctx> InvokeApplier<'op, 'a, 'ctx> {
    fn new(op: &'op InvokeContractOp, ctx: &'a mut ApplyContext<'ctx>) -> Self {
        let footprint_len = op.footprint.read_only.len() + op.footprint.read_write.len();
        let autorestored = op
            .resource_ext
            .autorestore_bitmap(op.footprint.read_write.len());
        Self {
            op,
            ctx,
            meter: ResourceMeter::new(op.resources.instructions),
            autorestored,
            entry_bufs: Vec::with_capacity(footprint_len),
            ttl_bufs: Vec::with_capacity(footprint_len),
        }
    }

    fn restored_live_until(&self) -> u32 {
        self.ctx
            .overlay
            .ledger_seq()
            .saturating_add(self.ctx.config.archival.min_persistent_entry_ttl)
            .saturating_sub(1)
    }

    /// Meter a disk read and check it against the declared budget.
    fn meter_disk_read(&mut self, key: &EntryKey, key_size: u32, entry_size: u32) -> OpFlow {
        self.meter
            .note_disk_read_entry(key.is_contract_code(), key_size, entry_size);
        if let Err(breach) = self.meter.check_disk_read(&self.op.resources) {
            self.ctx.diagnostics.push_limit_breach(
                "operation byte-read resources exceeds amount specified",
                breach,
            );
            return Err(InvokeResult::ResourceLimitExceeded);
        }
        Ok(())
    }

    /// Handle a persistent key found archived, either in the live state with
    /// an expired TTL or in the hot archive.
    fn handle_archived_entry(
        &mut self,
        key: &EntryKey,
        entry: Entry,
        is_read_only: bool,
        is_hot_archive_entry: bool,
        index: usize,
    ) -> Result<OpFlow> {
        let protocol = self.ctx.overlay.protocol_version();
        let marked = self.autorestored.get(index).copied().unwrap_or(false);
        if !is_read_only
            && protocol_version_starts_from(protocol, FIRST_PROTOCOL_SUPPORTING_PERSISTENT_EVICTION)
            && marked
        {
            let key_size = codec::key_size(key);
            let entry_size = codec::entry_size(&entry);

            if !validate_contract_ledger_entry(key, entry_size, self.ctx.config, self.ctx.diagnostics)
            {
                return Ok(Err(InvokeResult::ResourceLimitExceeded));
            }

            // Charge for the restoration reads. TTL entry writes come out of
            // the refundable fee, so only the code/data entry is metered here.
            if let Err(code) = self.meter_disk_read(key, key_size, entry_size) {
                return Ok(Err(code));
            }

            let live_until = self.restored_live_until();
            let ttl_entry = if is_hot_archive_entry {
                self.ctx
                    .overlay
                    .restore_from_hot_archive(entry.clone(), live_until)?
            } else {
                self.ctx.overlay.restore_from_live(&entry, live_until)?
            };

            // Feed the restored entry and fresh TTL to the sandbox as if live.
            let ttl = *ttl_entry
                .as_ttl()
                .ok_or_else(|| TxError::Internal("restore produced a non-TTL entry".into()))?;
            self.entry_bufs.push(entry);
            self.ttl_bufs.push(Some(ttl));
            return Ok(Ok(()));
        }

        self.ctx.diagnostics.push_error(
            "trying to access an archived contract entry",
            key_diagnostic_details(key),
        );
        Ok(Err(InvokeResult::EntryArchived))
    }

    /// Load, validate, and meter the keys of one footprint half.
    fn add_reads(&mut self, keys: &[EntryKey], is_read_only: bool) -> Result<OpFlow> {
        let ledger_seq = self.ctx.overlay.ledger_seq();
        let protocol = self.ctx.overlay.protocol_version();

        for (index, key) in keys.iter().enumerate() {
            let key_size = codec::key_size(key);
            let mut entry_size = 0u32;
            let mut ttl_buf: Option<TtlEntry> = None;
            let mut contract_entry_live = false;

            if key.is_contract() {
                let ttl_key = key.ttl_key();
                let ttl_entry = self
                    .ctx
                    .overlay
                    .load_without_record(&ttl_key)
                    .map(|e| {
                        e.as_ttl().copied().ok_or_else(|| {
                            TxError::Internal("TTL key resolved to a non-TTL entry".into())
                        })
                    })
                    .transpose()?;

                if let Some(ttl) = ttl_entry {
                    if !is_live(&ttl, ledger_seq) {
                        // Temporary entries past expiry read as absent.
                        if !key.is_temporary() {
                            let entry =
                                self.ctx.overlay.load_without_record(key).ok_or_else(|| {
                                    TxError::Internal(
                                        "live TTL present without its partner entry".into(),
                                    )
                                })?;
                            match self.handle_archived_entry(
                                key, entry, is_read_only, false, index,
                            )? {
                                Ok(()) => continue,
                                Err(code) => return Ok(Err(code)),
                            }
                        }
                    } else {
                        contract_entry_live = true;
                        ttl_buf = Some(ttl);
                    }
                } else if key.is_persistent()
                    && protocol_version_starts_from(
                        protocol,
                        FIRST_PROTOCOL_SUPPORTING_PERSISTENT_EVICTION,
                    )
                {
                    // No TTL in the live state: from the persistent-eviction
                    // protocol on, the key may be sitting in the hot archive.
                    if let Some(archived) = self.ctx.overlay.archive().load(key).cloned() {
                        match self.handle_archived_entry(
                            key, archived, is_read_only, true, index,
                        )? {
                            Ok(()) => continue,
                            Err(code) => return Ok(Err(code)),
                        }
                    }
                }
            }

            if !key.is_contract() || contract_entry_live {
                if let Some(entry) = self.ctx.overlay.load_without_record(key) {
                    entry_size = codec::entry_size(&entry);
                    self.entry_bufs.push(entry);
                    self.ttl_bufs.push(ttl_buf);
                } else if key.is_contract() {
                    debug_assert!(ttl_buf.is_none());
                }
            }

            if !validate_contract_ledger_entry(key, entry_size, self.ctx.config, self.ctx.diagnostics)
            {
                return Ok(Err(InvokeResult::ResourceLimitExceeded));
            }

            // Archived entries were metered in handle_archived_entry. Contract
            // entries live in the in-memory tier from the autorestore protocol
            // on: counted as read entries but not as disk reads.
            if !key.is_contract()
                || protocol_version_is_before(protocol, AUTO_RESTORE_PROTOCOL_VERSION)
            {
                if let Err(code) = self.meter_disk_read(key, key_size, entry_size) {
                    return Ok(Err(code));
                }
            } else {
                self.meter.note_in_memory_read_entry();
            }
        }
        Ok(Ok(()))
    }

    /// Ingest the sandbox's modified entries into the overlay.
    fn apply_modifications(&mut self, out: &InvokeOutput) -> Result<OpFlow> {
        let mut created_and_modified: HashSet<EntryKey> = HashSet::new();
        let mut created: HashSet<EntryKey> = HashSet::new();

        for entry in &out.modified_entries {
            let key = entry.key();
            let entry_size = codec::entry_size(entry);
            if !validate_contract_ledger_entry(&key, entry_size, self.ctx.config, self.ctx.diagnostics)
            {
                return Ok(Err(InvokeResult::ResourceLimitExceeded));
            }

            // TTL entry write fees come out of the refundable fee, already
            // accounted for by the sandbox's rent_fee.
            if !key.is_ttl() {
                self.meter.note_write_entry(
                    key.is_contract_code(),
                    codec::key_size(&key),
                    entry_size,
                );
                if let Err(breach) = self.meter.check_write(&self.op.resources) {
                    self.ctx.diagnostics.push_limit_breach(
                        "operation byte-write resources exceeds amount specified",
                        breach,
                    );
                    return Ok(Err(InvokeResult::ResourceLimitExceeded));
                }
            }

            if self.ctx.overlay.load(&key).is_some() {
                self.ctx.overlay.update(entry.clone())?;
            } else {
                self.ctx.overlay.create(entry.clone())?;
                created.insert(key.clone());
            }
            created_and_modified.insert(key);
        }

        // Every created contract entry must come with a created TTL sibling.
        for key in &created {
            if key.is_contract() {
                if !created.contains(&key.ttl_key()) {
                    return Err(TxError::CreatedEntryWithoutTtl(key.clone()));
                }
            } else if !key.is_ttl() {
                return Err(TxError::UnexpectedSandboxEntry(key.clone()));
            }
        }

        // Erase every read-write key the sandbox did not return. Untouched
        // entries are passed through by the sandbox, so anything missing was
        // deleted explicitly.
        for key in &self.op.footprint.read_write {
            if created_and_modified.contains(key) {
                continue;
            }
            if self.ctx.overlay.load(key).is_some() {
                if !key.is_contract() {
                    return Err(TxError::Internal(format!(
                        "sandbox dropped a classic read-write entry: {key:?}"
                    )));
                }
                self.ctx.overlay.erase(key)?;
                let ttl_key = key.ttl_key();
                if self.ctx.overlay.load(&ttl_key).is_none() {
                    return Err(TxError::Internal(format!(
                        "deleted contract entry has no TTL to delete: {key:?}"
                    )));
                }
                self.ctx.overlay.erase(&ttl_key)?;
            }
        }
        Ok(Ok(()))
    }

    fn apply(mut self) -> Result<OpApplied> {
        let footprint = self.op.footprint.clone();

        if let Err(code) = self.add_reads(&footprint.read_only, true)? {
            return Ok(OpApplied::bare(OpResult::Invoke(code)));
        }
        if let Err(code) = self.add_reads(&footprint.read_write, false)? {
            return Ok(OpApplied::bare(OpResult::Invoke(code)));
        }

        let ledger_info = LedgerInfo {
            protocol_version: self.ctx.overlay.protocol_version(),
            sequence_number: self.ctx.overlay.ledger_seq(),
            timestamp: self.ctx.close_time,
            base_reserve: self.ctx.base_reserve,
            network_id: self.ctx.network_id,
            memory_limit: self.ctx.config.tx_memory_limit,
            min_persistent_entry_ttl: self.ctx.config.archival.min_persistent_entry_ttl,
            min_temp_entry_ttl: self.ctx.config.archival.min_temp_entry_ttl,
            max_entry_ttl: self.ctx.config.archival.max_entry_ttl,
            cpu_cost_params: self.ctx.config.cpu_cost_params.clone(),
            mem_cost_params: self.ctx.config.mem_cost_params.clone(),
        };

        let sandbox = self.ctx.sandbox;
        let out = sandbox.invoke_host_function(InvokeParams {
            protocol_version: self.ctx.overlay.protocol_version(),
            enable_diagnostics: self.ctx.diagnostics.is_enabled(),
            instruction_budget: self.op.resources.instructions,
            host_function: &self.op.host_function,
            resources: &self.op.resources,
            resource_ext: &self.op.resource_ext,
            source: &self.op.source,
            auth: &self.op.auth,
            ledger_info,
            entries: &self.entry_bufs,
            ttls: &self.ttl_bufs,
            base_prng_seed: self.ctx.base_prng_seed,
            rent_config: &self.ctx.config.rent_fee,
            module_cache: self.ctx.module_cache,
        });

        self.meter.cpu_insns = out.cpu_insns;
        self.meter.mem_bytes = out.mem_bytes;
        self.meter.time_nsecs = out.time_nsecs;

        if !out.success {
            if out.is_internal_error {
                return Err(TxError::SandboxInternal(
                    "sandbox reported an internal error".into(),
                ));
            }
            self.ctx.diagnostics.extend(out.diagnostic_events.clone());
            let code = if let Err(breach) = self.meter.check_cpu(&self.op.resources) {
                self.ctx.diagnostics.push_limit_breach(
                    "operation instructions exceeds amount specified",
                    breach,
                );
                InvokeResult::ResourceLimitExceeded
            } else if let Err(breach) = self.meter.check_mem(self.ctx.config) {
                self.ctx.diagnostics.push_limit_breach(
                    "operation memory usage exceeds network config limit",
                    breach,
                );
                InvokeResult::ResourceLimitExceeded
            } else {
                InvokeResult::Trapped
            };
            self.ctx.diagnostics.push_metrics(&self.meter, false);
            return Ok(OpApplied::bare(OpResult::Invoke(code)));
        }

        if let Err(code) = self.apply_modifications(&out)? {
            return Ok(OpApplied::bare(OpResult::Invoke(code)));
        }

        // Meter the emitted events, then the return value on top; both
        // checks apply against the same network limit.
        let mut events = Vec::with_capacity(out.contract_events.len());
        for event in &out.contract_events {
            self.meter.note_event(codec::event_size(event));
            if let Err(breach) = self.meter.check_event_bytes(self.ctx.config) {
                self.ctx.diagnostics.push_limit_breach(
                    "total events size exceeds network config maximum",
                    breach,
                );
                return Ok(OpApplied::bare(OpResult::Invoke(
                    InvokeResult::ResourceLimitExceeded,
                )));
            }
            events.push(event.clone());
        }

        self.meter
            .note_return_value(codec::encode_val(&out.result_value).len() as u32);
        if let Err(breach) = self.meter.check_event_bytes(self.ctx.config) {
            self.ctx.diagnostics.push_limit_breach(
                "return value pushes events size above network config maximum",
                breach,
            );
            return Ok(OpApplied::bare(OpResult::Invoke(
                InvokeResult::ResourceLimitExceeded,
            )));
        }

        if !self.ctx.refundable.consume_refundable_resources(
            self.meter.emit_event_bytes,
            out.rent_fee,
            &self.ctx.config.rent_fee,
            self.ctx.diagnostics,
        ) {
            return Ok(OpApplied::bare(OpResult::Invoke(
                InvokeResult::InsufficientRefundableFee,
            )));
        }
        self.meter.rent_fee_consumed = out.rent_fee;

        // Hash of the success preimage: events then return value.
        let mut preimage: Vec<Vec<u8>> = Vec::with_capacity(events.len() + 1);
        for event in &events {
            preimage.push(codec::encode_event(event));
        }
        preimage.push(codec::encode_val(&out.result_value));
        let parts: Vec<&[u8]> = preimage.iter().map(|p| p.as_slice()).collect();
        let result_hash = Hash256::hash_parts(&parts);

        self.ctx.diagnostics.extend(out.diagnostic_events.clone());
        self.ctx.diagnostics.push_metrics(&self.meter, true);

        tracing::debug!(
            cpu_insns = out.cpu_insns,
            mem_bytes = out.mem_bytes,
            events = events.len(),
            "contract invocation succeeded"
        );

        Ok(OpApplied {
            result: OpResult::Invoke(InvokeResult::Success { result_hash }),
            events,
            return_value: Some(out.result_value),
        })
    }
}

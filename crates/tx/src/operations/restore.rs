//! Footprint restore applier.
//!
//! Pulls the read-write footprint back into the live state, from the hot
//! archive or from expired-but-unevicted live entries, writing each restored
//! entry a fresh TTL at the minimum persistent lifetime and charging rent
//! against the refundable fee.

use cinder_common::{
    protocol_version_starts_from, ContractConfig, AUTO_RESTORE_PROTOCOL_VERSION,
    FIRST_PROTOCOL_SUPPORTING_PERSISTENT_EVICTION,
};
use cinder_model::{codec, is_live, AccountId};

use crate::events::DiagnosticEventBuffer;
use crate::meter::ResourceMeter;
use crate::operations::{
    validate_contract_ledger_entry, ApplyContext, DeclaredResources, Footprint, OpBehavior,
    ThresholdLevel,
};
use crate::result::{OpApplied, OpResult, RestoreResult};
use crate::sandbox::RentChange;
use crate::{Result, TxError};

/// A footprint restore operation.
///
/// The read-only footprint must be empty and every read-write key must be a
/// persistent contract key; anything else is malformed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreFootprintOp {
    pub source: AccountId,
    pub footprint: Footprint,
    pub resources: DeclaredResources,
}

impl OpBehavior for RestoreFootprintOp {
    fn check_valid(
        &self,
        _config: &ContractConfig,
        _protocol_version: u32,
        diagnostics: &mut DiagnosticEventBuffer,
    ) -> std::result::Result<(), OpResult> {
        if !self.footprint.read_only.is_empty() {
            diagnostics.push_error(
                "read-only footprint must be empty for a restore operation",
                vec![],
            );
            return Err(OpResult::Restore(RestoreResult::Malformed));
        }
        for key in &self.footprint.read_write {
            if !key.is_persistent() {
                diagnostics.push_error(
                    "only persistent contract entries can be restored",
                    vec![],
                );
                return Err(OpResult::Restore(RestoreResult::Malformed));
            }
        }
        Ok(())
    }

    fn apply(&self, ctx: &mut ApplyContext<'_>) -> Result<OpApplied> {
        let ledger_seq = ctx.overlay.ledger_seq();
        let protocol = ctx.overlay.protocol_version();
        // Extend the TTL on the restored entry to the minimum, counting the
        // current ledger.
        let restored_live_until = ledger_seq
            .saturating_add(ctx.config.archival.min_persistent_entry_ttl)
            .saturating_sub(1);

        let mut meter = ResourceMeter::new(0);
        let mut rent_changes: Vec<RentChange> =
            Vec::with_capacity(self.footprint.read_write.len());

        for key in &self.footprint.read_write {
            let ttl_key = key.ttl_key();
            let from_archive;
            let entry = match ctx.overlay.load_without_record(&ttl_key) {
                Some(ttl_entry) => {
                    let ttl = ttl_entry.as_ttl().copied().ok_or_else(|| {
                        TxError::Internal("TTL key resolved to a non-TTL entry".into())
                    })?;
                    if is_live(&ttl, ledger_seq) {
                        // Already live: restoring is a no-op.
                        continue;
                    }
                    // Expired but not yet swept: the payload is still in the
                    // live state.
                    from_archive = false;
                    ctx.overlay.load_without_record(key).ok_or_else(|| {
                        TxError::Internal("expired TTL present without its partner entry".into())
                    })?
                }
                None => {
                    if !protocol_version_starts_from(
                        protocol,
                        FIRST_PROTOCOL_SUPPORTING_PERSISTENT_EVICTION,
                    ) {
                        // No TTL and no archive tier at this protocol: no
                        // such entry.
                        continue;
                    }
                    match ctx.overlay.archive().load(key) {
                        Some(archived) => {
                            from_archive = true;
                            archived.clone()
                        }
                        None => continue,
                    }
                }
            };

            let entry_size = codec::entry_size(&entry);

            // Restore reads the entry back from cold storage.
            meter.disk_read_bytes += entry_size;
            if let Err(breach) = meter.check_disk_read(&self.resources) {
                ctx.diagnostics.push_limit_breach(
                    "operation byte-read resources exceeds amount specified",
                    breach,
                );
                return Ok(OpApplied::bare(OpResult::Restore(
                    RestoreResult::ResourceLimitExceeded,
                )));
            }

            if !validate_contract_ledger_entry(key, entry_size, ctx.config, ctx.diagnostics) {
                return Ok(OpApplied::bare(OpResult::Restore(
                    RestoreResult::ResourceLimitExceeded,
                )));
            }

            // Restore counts as a write; TTL entry writes come out of the
            // refundable fee, so only the entry itself is metered.
            meter.ledger_write_bytes += entry_size;
            if let Err(breach) = meter.check_write(&self.resources) {
                ctx.diagnostics.push_limit_breach(
                    "operation byte-write resources exceeds amount specified",
                    breach,
                );
                return Ok(OpApplied::bare(OpResult::Restore(
                    RestoreResult::ResourceLimitExceeded,
                )));
            }

            // Contract code rents at its in-memory footprint from the
            // autorestore protocol on; everything else at encoded size.
            let rent_size = match entry.as_contract_code() {
                Some(code)
                    if protocol_version_starts_from(protocol, AUTO_RESTORE_PROTOCOL_VERSION) =>
                {
                    ctx.sandbox.contract_code_memory_size_for_rent(
                        cinder_common::CURRENT_LEDGER_PROTOCOL_VERSION,
                        protocol,
                        &code.code,
                        &ctx.config.cpu_cost_params,
                        &ctx.config.mem_cost_params,
                    )
                }
                _ => entry_size,
            };
            rent_changes.push(RentChange {
                is_persistent: true,
                old_size_bytes: 0,
                new_size_bytes: rent_size,
                old_live_until_ledger: 0,
                new_live_until_ledger: restored_live_until,
            });

            tracing::debug!(?key, from_archive, restored_live_until, "restoring entry");
            if from_archive {
                ctx.overlay
                    .restore_from_hot_archive(entry, restored_live_until)?;
            } else {
                ctx.overlay.restore_from_live(&entry, restored_live_until)?;
            }
        }

        let rent_fee = ctx.sandbox.compute_rent_fee(
            cinder_common::CURRENT_LEDGER_PROTOCOL_VERSION,
            protocol,
            &rent_changes,
            &ctx.config.rent_fee,
            ledger_seq,
        );
        if !ctx
            .refundable
            .consume_refundable_resources(0, rent_fee, &ctx.config.rent_fee, ctx.diagnostics)
        {
            return Ok(OpApplied::bare(OpResult::Restore(
                RestoreResult::InsufficientRefundableFee,
            )));
        }

        tracing::debug!(
            restored = rent_changes.len(),
            rent_fee,
            "restore footprint applied"
        );
        Ok(OpApplied::bare(OpResult::Restore(RestoreResult::Success)))
    }

    fn threshold_level(&self) -> ThresholdLevel {
        ThresholdLevel::Low
    }

    fn is_contract_op(&self) -> bool {
        true
    }
}

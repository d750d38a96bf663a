//! Footprint TTL extension applier.
//!
//! Extends the lifetime of every live entry in the read-only footprint to
//! `current_seq + extend_to`, charging rent for the added lifetime against
//! the refundable fee. Expired or absent entries are skipped; TTLs are never
//! shortened.

use cinder_common::ContractConfig;
use cinder_model::{codec, is_live, AccountId, Val};

use crate::events::DiagnosticEventBuffer;
use crate::meter::ResourceMeter;
use crate::operations::{ApplyContext, DeclaredResources, Footprint, OpBehavior, ThresholdLevel};
use crate::result::{ExtendTtlResult, OpApplied, OpResult};
use crate::sandbox::RentChange;
use crate::{Result, TxError};

/// A footprint TTL extension operation.
///
/// The read-write footprint must be empty and every read-only key must be a
/// contract key; anything else is malformed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendFootprintTtlOp {
    pub source: AccountId,
    pub extend_to: u32,
    pub footprint: Footprint,
    pub resources: DeclaredResources,
}

impl OpBehavior for ExtendFootprintTtlOp {
    fn check_valid(
        &self,
        config: &ContractConfig,
        _protocol_version: u32,
        diagnostics: &mut DiagnosticEventBuffer,
    ) -> std::result::Result<(), OpResult> {
        if self.extend_to == 0
            || self.extend_to > config.archival.max_entry_ttl.saturating_sub(1)
        {
            diagnostics.push_error(
                "extend_to is out of range",
                vec![
                    Val::U32(self.extend_to),
                    Val::U32(config.archival.max_entry_ttl),
                ],
            );
            return Err(OpResult::ExtendTtl(ExtendTtlResult::Malformed));
        }
        if !self.footprint.read_write.is_empty() {
            diagnostics.push_error(
                "read-write footprint must be empty for a TTL extension",
                vec![],
            );
            return Err(OpResult::ExtendTtl(ExtendTtlResult::Malformed));
        }
        for key in &self.footprint.read_only {
            if !key.is_contract() {
                diagnostics.push_error(
                    "only contract entries can have their TTL extended",
                    vec![],
                );
                return Err(OpResult::ExtendTtl(ExtendTtlResult::Malformed));
            }
        }
        Ok(())
    }

    fn apply(&self, ctx: &mut ApplyContext<'_>) -> Result<OpApplied> {
        let ledger_seq = ctx.overlay.ledger_seq();
        let protocol = ctx.overlay.protocol_version();
        let new_live_until = ledger_seq.saturating_add(self.extend_to);

        let mut meter = ResourceMeter::new(0);
        let mut rent_changes: Vec<RentChange> =
            Vec::with_capacity(self.footprint.read_only.len());

        for key in &self.footprint.read_only {
            let ttl_key = key.ttl_key();
            let Some(ttl_entry) = ctx.overlay.load_without_record(&ttl_key) else {
                // Absent or archived: nothing to extend.
                continue;
            };
            let ttl = ttl_entry.as_ttl().copied().ok_or_else(|| {
                TxError::Internal("TTL key resolved to a non-TTL entry".into())
            })?;
            if !is_live(&ttl, ledger_seq) {
                // Expired entries must be restored, not extended.
                continue;
            }
            if ttl.live_until_ledger_seq >= new_live_until {
                continue;
            }

            let entry = ctx.overlay.load_without_record(key).ok_or_else(|| {
                TxError::Internal("live TTL present without its partner entry".into())
            })?;
            let entry_size = codec::entry_size(&entry);

            meter.disk_read_bytes += entry_size;
            if let Err(breach) = meter.check_disk_read(&self.resources) {
                ctx.diagnostics.push_limit_breach(
                    "operation byte-read resources exceeds amount specified",
                    breach,
                );
                return Ok(OpApplied::bare(OpResult::ExtendTtl(
                    ExtendTtlResult::ResourceLimitExceeded,
                )));
            }

            rent_changes.push(RentChange {
                is_persistent: key.is_persistent(),
                old_size_bytes: entry_size,
                new_size_bytes: entry_size,
                old_live_until_ledger: ttl.live_until_ledger_seq,
                new_live_until_ledger: new_live_until,
            });

            let bumped = entry.make_ttl_entry(new_live_until, ledger_seq);
            ctx.overlay.update(bumped)?;
            tracing::debug!(
                ?key,
                old_live_until = ttl.live_until_ledger_seq,
                new_live_until,
                "extended entry TTL"
            );
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
            return Ok(OpApplied::bare(OpResult::ExtendTtl(
                ExtendTtlResult::InsufficientRefundableFee,
            )));
        }

        Ok(OpApplied::bare(OpResult::ExtendTtl(ExtendTtlResult::Success)))
    }

    fn threshold_level(&self) -> ThresholdLevel {
        ThresholdLevel::Low
    }

    fn is_contract_op(&self) -> bool {
        true
    }
}

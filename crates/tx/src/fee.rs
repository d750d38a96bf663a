//! Refundable fee tracking.
//!
//! Each transaction reserves a refundable budget covering rent fees and
//! emitted event bytes. Operations draw from it as they apply; the unused
//! remainder refunds to the submitter. TTL entry writes are charged here
//! rather than against the declared write-bytes budget.

use cinder_common::config::RentFeeConfig;
use cinder_model::Val;

use crate::events::DiagnosticEventBuffer;

/// Tracks consumption of a transaction's refundable fee budget.
#[derive(Debug, Clone)]
pub struct RefundableFeeTracker {
    available: i64,
    consumed_rent_fee: i64,
    consumed_event_fee: i64,
}

impl RefundableFeeTracker {
    pub fn new(refundable_fee: i64) -> Self {
        Self {
            available: refundable_fee,
            consumed_rent_fee: 0,
            consumed_event_fee: 0,
        }
    }

    /// Fee charged for a number of emitted event bytes.
    fn event_fee(event_bytes: u32, config: &RentFeeConfig) -> i64 {
        // ceil(bytes * fee_per_1kb / 1024)
        let numerator = event_bytes as i64 * config.fee_per_contract_event_1kb;
        (numerator + 1023) / 1024
    }

    /// Charge event bytes and a rent fee against the remaining budget.
    ///
    /// Returns false (and pushes a diagnostic) without consuming anything if
    /// the budget cannot cover the charge.
    pub fn consume_refundable_resources(
        &mut self,
        event_bytes: u32,
        rent_fee: i64,
        config: &RentFeeConfig,
        diagnostics: &mut DiagnosticEventBuffer,
    ) -> bool {
        let event_fee = Self::event_fee(event_bytes, config);
        let charge = event_fee.saturating_add(rent_fee);
        if charge > self.remaining() {
            diagnostics.push_error(
                "refundable resource fee exceeds remaining refundable fee",
                vec![
                    Val::I64(charge),
                    Val::I64(self.remaining()),
                ],
            );
            return false;
        }
        self.consumed_event_fee += event_fee;
        self.consumed_rent_fee += rent_fee;
        true
    }

    /// Total consumed so far.
    pub fn consumed(&self) -> i64 {
        self.consumed_rent_fee + self.consumed_event_fee
    }

    /// Rent portion of the consumption.
    pub fn consumed_rent_fee(&self) -> i64 {
        self.consumed_rent_fee
    }

    /// Remaining refundable budget.
    pub fn remaining(&self) -> i64 {
        self.available - self.consumed()
    }
}

//! Classic manage-data operation.
//!
//! Classic operations share the same overlay as contract operations but
//! carry no TTL and never touch the archive tier. Manage-data is the
//! representative implemented here: it creates, updates, or deletes a named
//! data entry under the source account.

use cinder_common::ContractConfig;
use cinder_model::{AccountId, DataEntry, Entry, EntryKey, EntryPayload};

use crate::events::DiagnosticEventBuffer;
use crate::operations::{ApplyContext, OpBehavior, ThresholdLevel};
use crate::result::{ClassicResult, OpApplied, OpResult};
use crate::Result;

/// Maximum length of a data entry name or value.
const DATA_ENTRY_MAX_LEN: usize = 64;

/// Create, update, or delete a named data entry on the source account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManageDataOp {
    pub source: AccountId,
    pub name: String,
    /// `Some` to create or update; `None` to delete.
    pub value: Option<Vec<u8>>,
}

impl OpBehavior for ManageDataOp {
    fn check_valid(
        &self,
        _config: &ContractConfig,
        _protocol_version: u32,
        _diagnostics: &mut DiagnosticEventBuffer,
    ) -> std::result::Result<(), OpResult> {
        if self.name.is_empty() || self.name.len() > DATA_ENTRY_MAX_LEN {
            return Err(OpResult::Classic(ClassicResult::Malformed));
        }
        if let Some(value) = &self.value {
            if value.len() > DATA_ENTRY_MAX_LEN {
                return Err(OpResult::Classic(ClassicResult::Malformed));
            }
        }
        Ok(())
    }

    fn apply(&self, ctx: &mut ApplyContext<'_>) -> Result<OpApplied> {
        let key = EntryKey::Data {
            account_id: self.source,
            name: self.name.clone(),
        };
        let ledger_seq = ctx.overlay.ledger_seq();

        match &self.value {
            Some(value) => {
                let entry = Entry::new(
                    ledger_seq,
                    EntryPayload::Data(DataEntry {
                        account_id: self.source,
                        name: self.name.clone(),
                        value: value.clone(),
                    }),
                );
                if ctx.overlay.load(&key).is_some() {
                    ctx.overlay.update(entry)?;
                } else {
                    ctx.overlay.create(entry)?;
                }
            }
            None => {
                if ctx.overlay.load(&key).is_none() {
                    return Ok(OpApplied::bare(OpResult::Classic(ClassicResult::NotFound)));
                }
                ctx.overlay.erase(&key)?;
            }
        }
        Ok(OpApplied::bare(OpResult::Classic(ClassicResult::Success)))
    }

    fn threshold_level(&self) -> ThresholdLevel {
        ThresholdLevel::Medium
    }

    fn is_contract_op(&self) -> bool {
        false
    }
}

//! Ledger entries.

use serde::{Deserialize, Serialize};

use cinder_common::Hash256;

use crate::key::{AccountId, AssetCode, ContractId, Durability, EntryKey};
use crate::val::Val;

/// Classic account entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountEntry {
    pub account_id: AccountId,
    pub balance: i64,
    pub seq_num: i64,
    pub num_sub_entries: u32,
}

/// Classic trustline entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustlineEntry {
    pub account_id: AccountId,
    pub asset: AssetCode,
    pub balance: i64,
    pub limit: i64,
}

/// Classic offer entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferEntry {
    pub seller: AccountId,
    pub offer_id: i64,
    pub amount: i64,
    pub price_n: i32,
    pub price_d: i32,
}

/// Classic named data entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataEntry {
    pub account_id: AccountId,
    pub name: String,
    pub value: Vec<u8>,
}

/// Classic claimable balance entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimableBalanceEntry {
    pub balance_id: Hash256,
    pub amount: i64,
}

/// Contract data entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractDataEntry {
    pub contract: ContractId,
    pub key: Val,
    pub durability: Durability,
    pub val: Val,
}

/// Contract code entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractCodeEntry {
    pub hash: Hash256,
    pub code: Vec<u8>,
}

/// TTL sibling entry governing a contract entry's expiry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TtlEntry {
    /// Hash of the partner key's canonical encoding.
    pub key_hash: Hash256,
    /// Last ledger sequence at which the partner entry is live.
    pub live_until_ledger_seq: u32,
}

/// Entry payload, one variant per key tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryPayload {
    Account(AccountEntry),
    Trustline(TrustlineEntry),
    Offer(OfferEntry),
    Data(DataEntry),
    ClaimableBalance(ClaimableBalanceEntry),
    ContractData(ContractDataEntry),
    ContractCode(ContractCodeEntry),
    Ttl(TtlEntry),
}

/// Entry extension slot.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EntryExt {
    #[default]
    V0,
    /// Sponsorship extension carried by some classic entries.
    V1 { sponsor: Option<AccountId> },
}

/// A ledger entry: payload plus bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Ledger sequence at which this entry was last created or modified.
    pub last_modified_ledger_seq: u32,
    pub payload: EntryPayload,
    pub ext: EntryExt,
}

impl Entry {
    /// Construct an entry with a V0 extension.
    pub fn new(last_modified_ledger_seq: u32, payload: EntryPayload) -> Self {
        Self {
            last_modified_ledger_seq,
            payload,
            ext: EntryExt::V0,
        }
    }

    /// The key addressing this entry.
    pub fn key(&self) -> EntryKey {
        match &self.payload {
            EntryPayload::Account(e) => EntryKey::Account {
                account_id: e.account_id,
            },
            EntryPayload::Trustline(e) => EntryKey::Trustline {
                account_id: e.account_id,
                asset: e.asset,
            },
            EntryPayload::Offer(e) => EntryKey::Offer {
                seller: e.seller,
                offer_id: e.offer_id,
            },
            EntryPayload::Data(e) => EntryKey::Data {
                account_id: e.account_id,
                name: e.name.clone(),
            },
            EntryPayload::ClaimableBalance(e) => EntryKey::ClaimableBalance {
                balance_id: e.balance_id,
            },
            EntryPayload::ContractData(e) => EntryKey::ContractData {
                contract: e.contract,
                key: e.key.clone(),
                durability: e.durability,
            },
            EntryPayload::ContractCode(e) => EntryKey::ContractCode { hash: e.hash },
            EntryPayload::Ttl(e) => EntryKey::Ttl {
                key_hash: e.key_hash,
            },
        }
    }

    /// The TTL payload, if this is a TTL entry.
    pub fn as_ttl(&self) -> Option<&TtlEntry> {
        match &self.payload {
            EntryPayload::Ttl(ttl) => Some(ttl),
            _ => None,
        }
    }

    /// The contract code payload, if this is a code entry.
    pub fn as_contract_code(&self) -> Option<&ContractCodeEntry> {
        match &self.payload {
            EntryPayload::ContractCode(code) => Some(code),
            _ => None,
        }
    }

    /// Build the TTL sibling entry for a contract entry.
    ///
    /// # Panics
    ///
    /// Debug-asserts that `self` is a contract entry.
    pub fn make_ttl_entry(&self, live_until_ledger_seq: u32, current_seq: u32) -> Entry {
        let key = self.key();
        debug_assert!(key.is_contract());
        let EntryKey::Ttl { key_hash } = key.ttl_key() else {
            unreachable!("ttl_key always returns a Ttl key");
        };
        Entry::new(
            current_seq,
            EntryPayload::Ttl(TtlEntry {
                key_hash,
                live_until_ledger_seq,
            }),
        )
    }
}

/// Whether a TTL entry keeps its partner live at the given ledger sequence.
#[inline]
pub fn is_live(ttl: &TtlEntry, ledger_seq: u32) -> bool {
    ttl.live_until_ledger_seq >= ledger_seq
}

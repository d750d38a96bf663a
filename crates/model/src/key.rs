//! Ledger keys and their classification.
//!
//! Every entry in the live store or the hot archive is addressed by an
//! [`EntryKey`]. Keys carry enough information to classify the entry:
//!
//! - *classic* keys (accounts, trustlines, offers, data, claimable balances)
//!   have no TTL and are never archived;
//! - *contract* keys (data and code) have a TTL sibling and a persistence
//!   class: persistent entries are archivable, temporary ones are deleted on
//!   expiry;
//! - *TTL* keys address the sibling records themselves, derived by hashing
//!   the partner key's canonical encoding.

use crate::codec;
use cinder_common::Hash256;
use serde::{Deserialize, Serialize};

use crate::val::Val;

/// A 32-byte account identifier (public key).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct AccountId(pub [u8; 32]);

/// A 32-byte contract identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContractId(pub Hash256);

/// Asset code with issuer, for trustline keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AssetCode {
    /// Up to 12 bytes of asset code, zero padded.
    pub code: [u8; 12],
    /// The issuing account.
    pub issuer: AccountId,
}

/// Persistence class of a contract data entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Durability {
    /// Deleted on expiry, never archived.
    Temporary,
    /// Evicted to the hot archive on expiry, restorable.
    Persistent,
}

/// A ledger entry key.
///
/// The derived `Ord` is the canonical total order: variant tag first, then
/// field-wise comparison. Both stores iterate in this order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntryKey {
    /// Classic account.
    Account { account_id: AccountId },
    /// Classic trustline.
    Trustline { account_id: AccountId, asset: AssetCode },
    /// Classic offer.
    Offer { seller: AccountId, offer_id: i64 },
    /// Classic named data entry.
    Data { account_id: AccountId, name: String },
    /// Classic claimable balance.
    ClaimableBalance { balance_id: Hash256 },
    /// Contract data entry.
    ContractData {
        contract: ContractId,
        key: Val,
        durability: Durability,
    },
    /// Contract code entry.
    ContractCode { hash: Hash256 },
    /// TTL sibling record, keyed by the hash of the partner key.
    Ttl { key_hash: Hash256 },
}

impl EntryKey {
    /// Whether this is a contract data or code key (has a TTL sibling).
    pub fn is_contract(&self) -> bool {
        matches!(
            self,
            EntryKey::ContractData { .. } | EntryKey::ContractCode { .. }
        )
    }

    /// Whether this key is archivable: contract code, or contract data with
    /// persistent durability.
    pub fn is_persistent(&self) -> bool {
        match self {
            EntryKey::ContractCode { .. } => true,
            EntryKey::ContractData { durability, .. } => *durability == Durability::Persistent,
            _ => false,
        }
    }

    /// Whether this key is a temporary contract data key.
    pub fn is_temporary(&self) -> bool {
        matches!(
            self,
            EntryKey::ContractData {
                durability: Durability::Temporary,
                ..
            }
        )
    }

    /// Whether this is a classic (non-contract, non-TTL) key.
    pub fn is_classic(&self) -> bool {
        !self.is_contract() && !self.is_ttl()
    }

    /// Whether this is a TTL key.
    pub fn is_ttl(&self) -> bool {
        matches!(self, EntryKey::Ttl { .. })
    }

    /// Whether this is a contract code key.
    pub fn is_contract_code(&self) -> bool {
        matches!(self, EntryKey::ContractCode { .. })
    }

    /// Derive the TTL key for a contract entry key.
    ///
    /// The TTL key hash is the SHA-256 of the partner key's canonical
    /// encoding, so derivation is deterministic and injective per key.
    ///
    /// # Panics
    ///
    /// Debug-asserts that `self` is a contract key; TTL keys exist only for
    /// contract data and code.
    pub fn ttl_key(&self) -> EntryKey {
        debug_assert!(self.is_contract(), "TTL keys exist only for contract entries");
        EntryKey::Ttl {
            key_hash: Hash256::hash(&codec::encode_key(self)),
        }
    }
}

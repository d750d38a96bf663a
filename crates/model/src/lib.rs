//! Ledger data model for cinder.
//!
//! Defines the typed key and entry universe shared by the live store, the
//! hot archive, and the apply pipeline: classic account-side entries,
//! contract data/code entries with a persistence class, and the TTL sibling
//! entries that govern contract entry expiry.
//!
//! Keys are totally ordered by their typed encoding (variant tag, then
//! field-wise lexicographic). The canonical byte codec in [`codec`] backs
//! TTL key derivation, size metering, and success-preimage hashing.

pub mod codec;
pub mod entry;
pub mod event;
pub mod key;
pub mod val;

pub use entry::{
    is_live, AccountEntry, ClaimableBalanceEntry, ContractCodeEntry, ContractDataEntry, DataEntry,
    Entry, EntryExt, EntryPayload, OfferEntry, TrustlineEntry, TtlEntry,
};
pub use event::{ContractEvent, DiagnosticEvent, EventType};
pub use key::{AccountId, AssetCode, ContractId, Durability, EntryKey};
pub use val::Val;

//! Shared foundation for the cinder ledger core.
//!
//! Provides the 32-byte hash type, protocol version gating helpers, and the
//! network configuration structures consumed by the apply pipeline.

pub mod config;
pub mod protocol;
pub mod types;

pub use config::{ContractConfig, CostParams, RentFeeConfig, StateArchivalSettings};
pub use protocol::{
    protocol_version_is_before, protocol_version_starts_from, ProtocolVersion,
    AUTO_RESTORE_PROTOCOL_VERSION, CURRENT_LEDGER_PROTOCOL_VERSION,
    FIRST_PROTOCOL_SUPPORTING_CONTRACTS, FIRST_PROTOCOL_SUPPORTING_PERSISTENT_EVICTION,
};
pub use types::Hash256;

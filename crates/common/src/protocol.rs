//! Protocol version utilities.
//!
//! Feature gating is expressed against the ledger protocol version. The
//! archival subsystem cares about two cutoffs in particular: the version that
//! introduced persistent eviction (and with it the hot archive and
//! autorestore), and the version that tightened the eviction/restore payload
//! checks after the known staleness bug in the release before it.

/// Protocol version enumeration for version gating.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProtocolVersion {
    V20 = 20,
    V21 = 21,
    V22 = 22,
    V23 = 23,
    V24 = 24,
    V25 = 25,
}

impl ProtocolVersion {
    /// Convert to u32 value.
    pub const fn as_u32(self) -> u32 {
        self as u32
    }
}

/// The protocol version when contract execution was first introduced.
pub const FIRST_PROTOCOL_SUPPORTING_CONTRACTS: ProtocolVersion = ProtocolVersion::V20;

/// The protocol version when persistent entries started being evicted to the
/// hot archive instead of living in the live state forever.
pub const FIRST_PROTOCOL_SUPPORTING_PERSISTENT_EVICTION: ProtocolVersion = ProtocolVersion::V23;

/// The protocol version when archived read-write footprint entries may be
/// restored implicitly during an invoke.
pub const AUTO_RESTORE_PROTOCOL_VERSION: ProtocolVersion = ProtocolVersion::V23;

/// The current maximum supported ledger protocol version.
pub const CURRENT_LEDGER_PROTOCOL_VERSION: u32 = 25;

/// Check if protocol version is strictly before a target.
#[inline]
pub fn protocol_version_is_before(version: u32, before: ProtocolVersion) -> bool {
    version < before.as_u32()
}

/// Check if protocol version is at or after a target (most commonly used).
#[inline]
pub fn protocol_version_starts_from(version: u32, from: ProtocolVersion) -> bool {
    version >= from.as_u32()
}

/// Check if contract execution is supported for the given protocol version.
#[inline]
pub fn contracts_supported(protocol_version: u32) -> bool {
    protocol_version_starts_from(protocol_version, FIRST_PROTOCOL_SUPPORTING_CONTRACTS)
}

//! Two-tier ledger state for cinder.
//!
//! The committed state lives in two ordered stores: the [`LiveStore`] holds
//! the current "hot" ledger state, and the [`HotArchive`] holds persistent
//! contract entries evicted on TTL expiry. All mutation during apply goes
//! through the [`Overlay`], a nestable transaction rooted at immutable
//! snapshots of both stores. The [`eviction`] module selects expired entries
//! and produces the live-to-archive transition applied with each ledger
//! commit.

pub mod eviction;
pub mod hot_archive;
pub mod live;
pub mod overlay;
pub mod snapshot;

use cinder_model::EntryKey;
use thiserror::Error;

/// Errors from state-store and overlay operations.
#[derive(Debug, Error)]
pub enum StateError {
    /// Create of a key that is already present.
    #[error("entry already exists: {0:?}")]
    AlreadyExists(EntryKey),

    /// Update or erase of a key that is not present.
    #[error("entry not found: {0:?}")]
    NotFound(EntryKey),

    /// Commit or rollback without a nested transaction to fold or drop.
    #[error("no nested overlay transaction is active")]
    NoNestedTransaction,

    /// Insert into the hot archive of a key that is already archived.
    #[error("key already present in hot archive: {0:?}")]
    ArchiveCollision(EntryKey),

    /// Hot archive operation on a non-persistent key.
    #[error("hot archive only holds persistent contract entries: {0:?}")]
    NotPersistent(EntryKey),

    /// A contract entry without its TTL sibling. This is a structural bug.
    #[error("contract entry has no TTL sibling: {0:?}")]
    MissingTtl(EntryKey),

    /// A structural condition the implementation cannot honor.
    #[error("internal state error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, StateError>;

pub use eviction::{apply_eviction, scan_for_eviction, EvictionIterator, EvictionResult};
pub use hot_archive::HotArchive;
pub use live::LiveStore;
pub use overlay::{CommitSet, Overlay};
pub use snapshot::{HotArchiveSnapshot, LiveSnapshot};

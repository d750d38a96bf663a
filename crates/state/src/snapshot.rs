//! Immutable snapshots of the committed stores.
//!
//! Snapshots are cheap reference-counted views created at commit time. They
//! are consumable by readers on other threads; the invariant checker and the
//! host applier's archive lookups both read through them.

use std::collections::BTreeMap;
use std::sync::Arc;

use cinder_model::{Entry, EntryKey};

/// Immutable view of the live store at a committed ledger.
#[derive(Debug, Clone)]
pub struct LiveSnapshot {
    entries: Arc<BTreeMap<EntryKey, Entry>>,
    ledger_seq: u32,
    protocol_version: u32,
}

impl LiveSnapshot {
    pub(crate) fn new(
        entries: Arc<BTreeMap<EntryKey, Entry>>,
        ledger_seq: u32,
        protocol_version: u32,
    ) -> Self {
        Self {
            entries,
            ledger_seq,
            protocol_version,
        }
    }

    /// The ledger sequence this snapshot was taken at.
    pub fn ledger_seq(&self) -> u32 {
        self.ledger_seq
    }

    /// The protocol version of the captured ledger.
    pub fn protocol_version(&self) -> u32 {
        self.protocol_version
    }

    /// Look up an entry.
    pub fn get(&self, key: &EntryKey) -> Option<&Entry> {
        self.entries.get(key)
    }

    /// Whether a key is present.
    pub fn contains_key(&self, key: &EntryKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the snapshot is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in canonical key order.
    pub fn iter(&self) -> impl Iterator<Item = (&EntryKey, &Entry)> {
        self.entries.iter()
    }
}

/// Immutable view of the hot archive at a committed ledger.
#[derive(Debug, Clone)]
pub struct HotArchiveSnapshot {
    entries: Arc<BTreeMap<EntryKey, Entry>>,
}

impl HotArchiveSnapshot {
    pub(crate) fn new(entries: Arc<BTreeMap<EntryKey, Entry>>) -> Self {
        Self { entries }
    }

    /// Look up an archived entry.
    pub fn load(&self, key: &EntryKey) -> Option<&Entry> {
        self.entries.get(key)
    }

    /// Whether a key is archived.
    pub fn contains_key(&self, key: &EntryKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Number of archived entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the archive view is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate archived entries in canonical key order.
    pub fn iter(&self) -> impl Iterator<Item = (&EntryKey, &Entry)> {
        self.entries.iter()
    }
}

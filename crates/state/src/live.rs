//! The live store: ordered map of current ledger entries.

use std::collections::BTreeMap;
use std::sync::Arc;

use cinder_model::{Entry, EntryKey};

use crate::snapshot::LiveSnapshot;
use crate::{Result, StateError};

/// Ordered key-to-entry store holding the current ledger state.
///
/// The underlying map is shared with snapshots through an `Arc`; mutation
/// copies on write, so readers holding a snapshot never observe a torn
/// state. Mutating access is single-owner during apply.
#[derive(Debug, Clone, Default)]
pub struct LiveStore {
    entries: Arc<BTreeMap<EntryKey, Entry>>,
}

impl LiveStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store from entries, without TTL bookkeeping. Intended for
    /// genesis and tests; callers are responsible for TTL pairing.
    pub fn from_entries(entries: impl IntoIterator<Item = Entry>) -> Self {
        let map: BTreeMap<EntryKey, Entry> =
            entries.into_iter().map(|e| (e.key(), e)).collect();
        Self {
            entries: Arc::new(map),
        }
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

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in canonical key order.
    pub fn iter(&self) -> impl Iterator<Item = (&EntryKey, &Entry)> {
        self.entries.iter()
    }

    /// Insert or replace an entry.
    pub fn put(&mut self, entry: Entry) {
        Arc::make_mut(&mut self.entries).insert(entry.key(), entry);
    }

    /// Remove an entry, returning it.
    pub fn remove(&mut self, key: &EntryKey) -> Option<Entry> {
        Arc::make_mut(&mut self.entries).remove(key)
    }

    /// Remove an entry that must exist.
    pub fn remove_existing(&mut self, key: &EntryKey) -> Result<Entry> {
        self.remove(key).ok_or_else(|| StateError::NotFound(key.clone()))
    }

    /// Immutable snapshot of the committed state.
    pub fn snapshot(&self, ledger_seq: u32, protocol_version: u32) -> LiveSnapshot {
        LiveSnapshot::new(Arc::clone(&self.entries), ledger_seq, protocol_version)
    }
}

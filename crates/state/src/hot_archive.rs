//! The hot archive: ordered map of evicted persistent contract entries.

use std::collections::BTreeMap;
use std::sync::Arc;

use cinder_model::{Entry, EntryKey};

use crate::snapshot::HotArchiveSnapshot;
use crate::{Result, StateError};

/// Ordered store of recently evicted persistent contract entries.
///
/// Only persistent contract keys are admitted; TTL entries are never stored
/// here (a fresh TTL is reconstructed at restore time). A key present in the
/// archive is by construction absent from the live store; the invariant
/// checker verifies this after every commit.
#[derive(Debug, Clone, Default)]
pub struct HotArchive {
    entries: Arc<BTreeMap<EntryKey, Entry>>,
}

impl HotArchive {
    /// Empty archive.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an archived entry. Persistent keys only; anything else is
    /// absent by construction.
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

    /// Whether the archive is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate archived entries in canonical key order.
    pub fn iter(&self) -> impl Iterator<Item = (&EntryKey, &Entry)> {
        self.entries.iter()
    }

    /// Insert an entry evicted from the live store.
    ///
    /// Fails if the key is already archived (each key is evicted at most
    /// once between restores) or is not a persistent contract key.
    pub fn insert_on_evict(&mut self, entry: Entry) -> Result<()> {
        let key = entry.key();
        if !key.is_persistent() {
            return Err(StateError::NotPersistent(key));
        }
        if self.entries.contains_key(&key) {
            return Err(StateError::ArchiveCollision(key));
        }
        tracing::debug!(?key, "archiving evicted entry");
        Arc::make_mut(&mut self.entries).insert(key, entry);
        Ok(())
    }

    /// Remove an archived entry on restore. Silent if absent.
    pub fn remove(&mut self, key: &EntryKey) {
        if Arc::make_mut(&mut self.entries).remove(key).is_some() {
            tracing::debug!(?key, "removed entry from hot archive on restore");
        }
    }

    /// Immutable snapshot of the archived state.
    pub fn snapshot(&self) -> HotArchiveSnapshot {
        HotArchiveSnapshot::new(Arc::clone(&self.entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_common::Hash256;
    use cinder_model::{
        ContractCodeEntry, ContractDataEntry, ContractId, Durability, EntryPayload, Val,
    };

    fn code_entry(seed: u8) -> Entry {
        Entry::new(
            1,
            EntryPayload::ContractCode(ContractCodeEntry {
                hash: Hash256::from_bytes([seed; 32]),
                code: vec![seed; 16],
            }),
        )
    }

    fn temp_data_entry(seed: u8) -> Entry {
        Entry::new(
            1,
            EntryPayload::ContractData(ContractDataEntry {
                contract: ContractId(Hash256::from_bytes([seed; 32])),
                key: Val::U32(seed as u32),
                durability: Durability::Temporary,
                val: Val::Void,
            }),
        )
    }

    #[test]
    fn test_insert_and_load() {
        let mut archive = HotArchive::new();
        let entry = code_entry(1);
        let key = entry.key();

        archive.insert_on_evict(entry.clone()).unwrap();
        assert_eq!(archive.load(&key), Some(&entry));
        assert_eq!(archive.len(), 1);
    }

    #[test]
    fn test_double_insert_is_a_collision() {
        let mut archive = HotArchive::new();
        archive.insert_on_evict(code_entry(1)).unwrap();
        let err = archive.insert_on_evict(code_entry(1)).unwrap_err();
        assert!(matches!(err, StateError::ArchiveCollision(_)));
    }

    #[test]
    fn test_rejects_non_persistent_entries() {
        let mut archive = HotArchive::new();
        let err = archive.insert_on_evict(temp_data_entry(1)).unwrap_err();
        assert!(matches!(err, StateError::NotPersistent(_)));
    }

    #[test]
    fn test_remove_is_silent_when_absent() {
        let mut archive = HotArchive::new();
        archive.remove(&code_entry(1).key());
        assert!(archive.is_empty());

        archive.insert_on_evict(code_entry(1)).unwrap();
        archive.remove(&code_entry(1).key());
        assert!(archive.is_empty());
    }

    #[test]
    fn test_snapshot_isolation() {
        let mut archive = HotArchive::new();
        archive.insert_on_evict(code_entry(1)).unwrap();

        let snap = archive.snapshot();
        archive.remove(&code_entry(1).key());

        assert!(snap.load(&code_entry(1).key()).is_some());
        assert!(archive.is_empty());
    }
}

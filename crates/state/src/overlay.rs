//! The overlay: a nestable transaction over the committed stores.
//!
//! An overlay buffers creates, updates, deletes, and restores against an
//! immutable [`LiveSnapshot`] base, with read-only access to a
//! [`HotArchiveSnapshot`]. Nested frames support per-operation atomicity: a
//! failed operation rolls its frame back and leaves no trace, a successful
//! one commits its frame into the parent. The outermost fold produces a
//! [`CommitSet`] that the ledger applies to the stores in one step.
//!
//! The overlay is a stack of hash-mapped diffs, not a pointer graph; a key
//! maps to `Some(entry)` (created or updated) or `None` (deleted), and reads
//! walk the stack top-down before falling through to the base snapshot.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use cinder_model::{Entry, EntryKey};

use crate::snapshot::{HotArchiveSnapshot, LiveSnapshot};
use crate::{Result, StateError};

#[derive(Debug, Default)]
struct Frame {
    changes: HashMap<EntryKey, Option<Entry>>,
    restored_from_archive: BTreeMap<EntryKey, Entry>,
    restored_from_live: BTreeMap<EntryKey, Entry>,
    archive_removals: BTreeSet<EntryKey>,
    recorded: HashSet<EntryKey>,
}

/// The folded result of an overlay, ready to apply to the stores.
#[derive(Debug, Default)]
pub struct CommitSet {
    /// Net entry changes: `Some` to insert or replace, `None` to delete.
    pub changes: HashMap<EntryKey, Option<Entry>>,
    /// Entries restored from the hot archive this ledger, including the
    /// reconstructed TTL entries. Feeds the invariant checker.
    pub restored_from_archive: BTreeMap<EntryKey, Entry>,
    /// Entries restored from the live store (expired but not yet evicted),
    /// recorded with their pre-restore payloads. Feeds the invariant checker.
    pub restored_from_live: BTreeMap<EntryKey, Entry>,
    /// Keys to remove from the hot archive.
    pub archive_removals: BTreeSet<EntryKey>,
}

/// A stacked transactional view over the live store and the hot archive.
pub struct Overlay {
    base: LiveSnapshot,
    archive: HotArchiveSnapshot,
    frames: Vec<Frame>,
}

impl Overlay {
    /// Open an overlay rooted at the given committed snapshots.
    pub fn new(base: LiveSnapshot, archive: HotArchiveSnapshot) -> Self {
        Self {
            base,
            archive,
            frames: vec![Frame::default()],
        }
    }

    /// The ledger sequence being applied.
    pub fn ledger_seq(&self) -> u32 {
        self.base.ledger_seq()
    }

    /// The protocol version of the ledger being applied.
    pub fn protocol_version(&self) -> u32 {
        self.base.protocol_version()
    }

    /// Read-only view of the hot archive.
    pub fn archive(&self) -> &HotArchiveSnapshot {
        &self.archive
    }

    /// Push a nested frame. Changes made until the matching `commit` or
    /// `rollback` are isolated from the parent.
    pub fn begin(&mut self) {
        self.frames.push(Frame::default());
    }

    /// Fold the top frame into its parent.
    pub fn commit(&mut self) -> Result<()> {
        if self.frames.len() < 2 {
            return Err(StateError::NoNestedTransaction);
        }
        let top = self.frames.pop().expect("frame stack is non-empty");
        let parent = self.frames.last_mut().expect("parent frame exists");
        parent.changes.extend(top.changes);
        parent.restored_from_archive.extend(top.restored_from_archive);
        parent.restored_from_live.extend(top.restored_from_live);
        parent.archive_removals.extend(top.archive_removals);
        parent.recorded.extend(top.recorded);
        Ok(())
    }

    /// Drop the top frame, discarding its buffered changes.
    pub fn rollback(&mut self) -> Result<()> {
        if self.frames.len() < 2 {
            return Err(StateError::NoNestedTransaction);
        }
        self.frames.pop();
        Ok(())
    }

    /// Current nesting depth (1 = root only).
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    fn visible(&self, key: &EntryKey) -> Option<&Entry> {
        for frame in self.frames.iter().rev() {
            if let Some(change) = frame.changes.get(key) {
                return change.as_ref();
            }
        }
        self.base.get(key)
    }

    /// Load an entry, marking the key for mutation in the current frame.
    pub fn load(&mut self, key: &EntryKey) -> Option<Entry> {
        let entry = self.visible(key).cloned();
        if entry.is_some() {
            self.frames
                .last_mut()
                .expect("frame stack is non-empty")
                .recorded
                .insert(key.clone());
        }
        entry
    }

    /// Load an entry without marking it for mutation.
    pub fn load_without_record(&self, key: &EntryKey) -> Option<Entry> {
        self.visible(key).cloned()
    }

    /// Whether a key is visible through the overlay.
    pub fn contains_key(&self, key: &EntryKey) -> bool {
        self.visible(key).is_some()
    }

    /// Create an entry. Fails if the key is already visible.
    pub fn create(&mut self, entry: Entry) -> Result<()> {
        let key = entry.key();
        if self.visible(&key).is_some() {
            return Err(StateError::AlreadyExists(key));
        }
        self.top_mut().changes.insert(key, Some(entry));
        Ok(())
    }

    /// Replace an entry by key. Fails if the key is not visible.
    pub fn update(&mut self, entry: Entry) -> Result<()> {
        let key = entry.key();
        if self.visible(&key).is_none() {
            return Err(StateError::NotFound(key));
        }
        self.top_mut().changes.insert(key, Some(entry));
        Ok(())
    }

    /// Remove an entry by key. Fails if the key is not visible. For contract
    /// keys, the caller must also erase the TTL sibling.
    pub fn erase(&mut self, key: &EntryKey) -> Result<()> {
        if self.visible(key).is_none() {
            return Err(StateError::NotFound(key.clone()));
        }
        self.top_mut().changes.insert(key.clone(), None);
        Ok(())
    }

    /// Restore an archived entry into the live state.
    ///
    /// Re-inserts the entry with `last_modified_ledger_seq` set to the
    /// current ledger, writes a fresh TTL at `live_until`, and schedules the
    /// archive record for removal at commit. Returns the new TTL entry.
    pub fn restore_from_hot_archive(&mut self, mut entry: Entry, live_until: u32) -> Result<Entry> {
        let key = entry.key();
        if !key.is_persistent() {
            return Err(StateError::NotPersistent(key));
        }
        let ledger_seq = self.ledger_seq();
        entry.last_modified_ledger_seq = ledger_seq;
        let ttl = entry.make_ttl_entry(live_until, ledger_seq);

        tracing::debug!(?key, live_until, "restoring entry from hot archive");

        let top = self.top_mut();
        top.changes.insert(key.clone(), Some(entry.clone()));
        top.changes.insert(ttl.key(), Some(ttl.clone()));
        top.archive_removals.insert(key.clone());
        top.restored_from_archive.insert(key, entry);
        top.restored_from_archive.insert(ttl.key(), ttl.clone());
        Ok(ttl)
    }

    /// Restore an expired-but-unevicted entry already in the live state.
    ///
    /// Only the TTL sibling changes; the entry payload stays untouched so a
    /// post-commit audit can match it against the pre-restore live state.
    /// The pre-restore (expired) TTL is what lands in the restored report.
    /// Returns the new TTL entry.
    pub fn restore_from_live(&mut self, entry: &Entry, live_until: u32) -> Result<Entry> {
        let key = entry.key();
        if !key.is_persistent() {
            return Err(StateError::NotPersistent(key));
        }
        let ttl_key = key.ttl_key();
        let old_ttl = self
            .visible(&ttl_key)
            .cloned()
            .ok_or_else(|| StateError::MissingTtl(key.clone()))?;

        let ledger_seq = self.ledger_seq();
        let new_ttl = entry.make_ttl_entry(live_until, ledger_seq);

        tracing::debug!(?key, live_until, "restoring expired entry from live state");

        let top = self.top_mut();
        top.changes.insert(ttl_key.clone(), Some(new_ttl.clone()));
        top.restored_from_live.insert(key, entry.clone());
        top.restored_from_live.insert(ttl_key, old_ttl);
        Ok(new_ttl)
    }

    /// Fold all frames into a [`CommitSet`].
    pub fn into_commit_set(self) -> CommitSet {
        let mut set = CommitSet::default();
        for frame in self.frames {
            set.changes.extend(frame.changes);
            set.restored_from_archive.extend(frame.restored_from_archive);
            set.restored_from_live.extend(frame.restored_from_live);
            set.archive_removals.extend(frame.archive_removals);
        }
        set
    }

    fn top_mut(&mut self) -> &mut Frame {
        self.frames.last_mut().expect("frame stack is non-empty")
    }
}

//! Eviction scan for expired contract entries.
//!
//! On each ledger close, after operations apply and before commit, the scan
//! walks contract entries in canonical key order looking for expired TTLs:
//!
//! - persistent entries move to the hot archive; the entry and its TTL leave
//!   the live store in the same commit step;
//! - temporary entries are deleted outright, along with their TTLs.
//!
//! The scan is bounded by `eviction_scan_size` bytes of entry data per
//! ledger; a resume cursor carries the position to the next ledger so large
//! states amortize the sweep. Candidate order is the canonical key order,
//! which keeps the evicted and deleted reports deterministic.

use cinder_common::config::StateArchivalSettings;
use cinder_model::{codec, is_live, Entry, EntryKey};

use crate::hot_archive::HotArchive;
use crate::live::LiveStore;
use crate::{Result, StateError};

/// Resume cursor for the incremental eviction scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvictionIterator {
    /// The last contract key examined; the next scan starts strictly after
    /// it. `None` means start from the beginning of the key space.
    pub resume_after: Option<EntryKey>,
}

/// Result of an eviction scan for a single ledger.
///
/// `evicted_entries` holds persistent entries to archive. `deleted_keys`
/// holds every key to remove from the live store that is not implied by an
/// archival: temporary entry keys plus all TTL keys (for both classes). The
/// count identity `#temporary + #archived = #ttl` over these two vectors is
/// audited after every commit.
#[derive(Debug, Default)]
pub struct EvictionResult {
    /// Expired persistent entries, in scan order.
    pub evicted_entries: Vec<Entry>,
    /// Temporary entry keys and TTL keys to delete, in scan order.
    pub deleted_keys: Vec<EntryKey>,
    /// Bytes of entry data examined.
    pub bytes_scanned: u64,
    /// Cursor for the next ledger's scan.
    pub end_iterator: EvictionIterator,
}

impl EvictionResult {
    /// Whether the scan found anything to evict.
    pub fn is_empty(&self) -> bool {
        self.evicted_entries.is_empty() && self.deleted_keys.is_empty()
    }
}

/// Scan the live store for expired contract entries.
///
/// `next_ledger_seq` is the sequence of the ledger being closed; an entry is
/// expired when its `live_until_ledger_seq` is below it.
pub fn scan_for_eviction(
    live: &LiveStore,
    iter: &EvictionIterator,
    next_ledger_seq: u32,
    settings: &StateArchivalSettings,
) -> Result<EvictionResult> {
    let mut result = EvictionResult::default();

    // Scan (resume_after, end] first; when resuming mid-cycle, wrap around
    // and cover [start, resume_after] so a full cycle touches every entry.
    let mut ranges: Vec<(Option<EntryKey>, Option<EntryKey>)> =
        vec![(iter.resume_after.clone(), None)];
    if iter.resume_after.is_some() {
        ranges.push((None, iter.resume_after.clone()));
    }

    for (after, until) in ranges {
        for (key, entry) in live.iter() {
            if let Some(a) = &after {
                if key <= a {
                    continue;
                }
            }
            if let Some(u) = &until {
                if key > u {
                    break;
                }
            }
            if !key.is_contract() {
                continue;
            }

            result.bytes_scanned += codec::entry_size(entry) as u64;

            let ttl_key = key.ttl_key();
            let ttl_entry = live
                .get(&ttl_key)
                .and_then(|e| e.as_ttl().copied())
                .ok_or_else(|| StateError::MissingTtl(key.clone()))?;

            if !is_live(&ttl_entry, next_ledger_seq) {
                if key.is_persistent() {
                    tracing::debug!(?key, live_until = ttl_entry.live_until_ledger_seq,
                        "evicting expired persistent entry");
                    result.evicted_entries.push(entry.clone());
                } else {
                    tracing::debug!(?key, live_until = ttl_entry.live_until_ledger_seq,
                        "deleting expired temporary entry");
                    result.deleted_keys.push(key.clone());
                }
                result.deleted_keys.push(ttl_key);
            }

            if result.bytes_scanned >= settings.eviction_scan_size {
                result.end_iterator = EvictionIterator {
                    resume_after: Some(key.clone()),
                };
                return Ok(result);
            }
        }
    }

    result.end_iterator = EvictionIterator { resume_after: None };
    Ok(result)
}

/// Apply an eviction result to the committed stores.
///
/// Moves each evicted persistent entry to the hot archive and deletes it,
/// then deletes every reported temporary and TTL key. All removals must hit
/// existing entries; anything else is a structural bug.
pub fn apply_eviction(
    live: &mut LiveStore,
    archive: &mut HotArchive,
    result: &EvictionResult,
) -> Result<()> {
    for entry in &result.evicted_entries {
        let key = entry.key();
        live.remove_existing(&key)?;
        archive.insert_on_evict(entry.clone())?;
    }
    for key in &result.deleted_keys {
        live.remove_existing(key)?;
    }
    if !result.is_empty() {
        tracing::info!(
            archived = result.evicted_entries.len(),
            deleted = result.deleted_keys.len(),
            "applied eviction"
        );
    }
    Ok(())
}

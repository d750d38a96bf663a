//! Archived-state consistency invariant.
//!
//! After every ledger commit, validates that eviction and restoration
//! transitions between the live store and the hot archive preserved
//! well-formedness: evicted entries were persistent, present, expired, and
//! current; deleted temporaries were expired; TTL deletions pair one-to-one
//! with entry removals; restored entries came from exactly one tier with
//! matching payloads and TTLs targeting genuinely expired state.
//!
//! At startup, a one-shot scan over complete snapshots of both stores
//! verifies key disjointness.

use cinder_common::{protocol_version_is_before, protocol_version_starts_from, ProtocolVersion};
use cinder_model::is_live;
use cinder_state::{HotArchiveSnapshot, LiveSnapshot};

use crate::{Invariant, LedgerCommitContext};

/// Consistency of live-to-archive and archive-to-live transitions.
pub struct ArchivedStateConsistency {
    strict: bool,
}

impl ArchivedStateConsistency {
    /// Strict by default: a violation here means state corruption.
    pub fn new() -> Self {
        Self { strict: true }
    }

    /// Lax variant for tooling that wants to log and continue.
    pub fn lax() -> Self {
        Self { strict: false }
    }

    fn check_eviction(&self, ctx: &LedgerCommitContext<'_>) -> Result<(), String> {
        let ledger_seq = ctx.ledger_seq();
        let protocol = ctx.protocol_version();

        for evicted in ctx.evicted_from_live {
            let key = evicted.key();
            if !key.is_persistent() {
                return Err(format!("evicted entry is not persistent: {key:?}"));
            }

            if let Some(preexisting) = ctx.archive.load(&key) {
                return Err(format!(
                    "archived entry already present in archive: {preexisting:?}"
                ));
            }

            let Some(live_entry) = ctx.live.get(&key) else {
                return Err(format!(
                    "evicted entry does not exist in live state: {key:?}"
                ));
            };

            let ttl_key = key.ttl_key();
            let Some(ttl_entry) = ctx.live.get(&ttl_key) else {
                return Err(format!(
                    "TTL for evicted entry does not exist in live state; entry key: {key:?}, TTL key: {ttl_key:?}"
                ));
            };
            let ttl = ttl_entry
                .as_ttl()
                .ok_or_else(|| format!("TTL key holds a non-TTL entry: {ttl_key:?}"))?;
            if is_live(ttl, ledger_seq) {
                return Err(format!(
                    "evicted TTL is still live; entry key: {key:?}, TTL entry: {ttl_entry:?}"
                ));
            }

            // The evicted payload must be the current one. Only checked from
            // protocol 24 on: the release before it could evict stale
            // versions.
            if protocol_version_starts_from(protocol, ProtocolVersion::V24)
                && evicted != live_entry
            {
                return Err(format!(
                    "outdated entry evicted; key: {key:?}, evicted: {evicted:?}, correct value: {live_entry:?}"
                ));
            }
        }

        // Count TTL and temporary deletions to catch orphaned TTLs. TTL-key
        // validity is checked through the paired data entry.
        let mut ttls = 0usize;
        let mut temps = 0usize;
        for key in ctx.deleted_keys_from_live {
            if key.is_temporary() {
                temps += 1;

                if ctx.live.get(key).is_none() {
                    return Err(format!(
                        "deleted temporary key does not exist in live state: {key:?}"
                    ));
                }
                let ttl_key = key.ttl_key();
                let Some(ttl_entry) = ctx.live.get(&ttl_key) else {
                    return Err(format!(
                        "TTL for deleted temporary entry does not exist in live state; entry key: {key:?}, TTL key: {ttl_key:?}"
                    ));
                };
                let ttl = ttl_entry
                    .as_ttl()
                    .ok_or_else(|| format!("TTL key holds a non-TTL entry: {ttl_key:?}"))?;
                if is_live(ttl, ledger_seq) {
                    return Err(format!(
                        "TTL for deleted temporary entry is still live; entry key: {key:?}, TTL entry: {ttl_entry:?}"
                    ));
                }
            } else {
                ttls += 1;
            }
        }

        if temps + ctx.evicted_from_live.len() != ttls {
            return Err(format!(
                "number of TTLs deleted does not match number of entries evicted: \
                 {ttls} TTLs, {temps} temporary entries, {} archived entries",
                ctx.evicted_from_live.len()
            ));
        }

        Ok(())
    }

    fn check_restoration(&self, ctx: &LedgerCommitContext<'_>) -> Result<(), String> {
        let ledger_seq = ctx.ledger_seq();
        let protocol = ctx.protocol_version();

        // TTL keys appear in the restore maps alongside their partners (they
        // are reconstructed or bumped during restore, never archived).
        for (key, _) in ctx.restored_from_live {
            if key.is_ttl() {
                continue;
            }
            if !key.is_persistent() {
                return Err(format!(
                    "restored entry from live state is not persistent: {key:?}"
                ));
            }
            if !ctx.restored_from_live.contains_key(&key.ttl_key()) {
                return Err(format!(
                    "TTL for entry restored from live state is missing: {:?}",
                    key.ttl_key()
                ));
            }
        }

        for (key, _) in ctx.restored_from_archive {
            if key.is_ttl() {
                continue;
            }
            if !key.is_persistent() {
                return Err(format!(
                    "restored entry from archive is not persistent: {key:?}"
                ));
            }
            if !ctx.restored_from_archive.contains_key(&key.ttl_key()) {
                return Err(format!(
                    "TTL for entry restored from archive is missing: {:?}",
                    key.ttl_key()
                ));
            }
        }

        // Archive restores: absent from the live state, present in the
        // archive with the recorded payload.
        for (key, entry) in ctx.restored_from_archive {
            if ctx.live.get(key).is_some() {
                return Err(format!(
                    "entry restored from archive is still in live state: {key:?}"
                ));
            }
            if key.is_ttl() {
                continue;
            }
            let Some(archived) = ctx.archive.load(key) else {
                return Err(format!(
                    "entry restored from archive does not exist in hot archive: {key:?}"
                ));
            };
            // Payload comparison only from protocol 24 on; the comparison
            // excludes last_modified_ledger_seq, which the restore rewrites.
            if protocol_version_starts_from(protocol, ProtocolVersion::V24)
                && (archived.payload != entry.payload || archived.ext != entry.ext)
            {
                return Err(format!(
                    "entry restored from archive has incorrect value; entry to restore: {entry:?}, hot archive entry: {archived:?}"
                ));
            }
        }

        // Live restores: absent from the archive, present in the live state
        // with the exact recorded entry, and targeting expired TTLs.
        for (key, entry) in ctx.restored_from_live {
            if let Some(archived) = ctx.archive.load(key) {
                return Err(format!(
                    "entry restored from live state exists in hot archive; live entry: {entry:?}, hot archive entry: {archived:?}"
                ));
            }
            let Some(live_entry) = ctx.live.get(key) else {
                return Err(format!(
                    "entry restored from live state does not exist in live state: {key:?}"
                ));
            };
            // Full-entry comparison, last_modified_ledger_seq included: a
            // live restore leaves the entry itself untouched.
            if live_entry != entry {
                return Err(format!(
                    "entry restored from live state has incorrect value; live entry: {live_entry:?}, entry to restore: {entry:?}"
                ));
            }
            if key.is_ttl() {
                let ttl = entry
                    .as_ttl()
                    .ok_or_else(|| format!("TTL key holds a non-TTL entry: {key:?}"))?;
                if is_live(ttl, ledger_seq) {
                    return Err(format!(
                        "entry restored from live state is not expired; TTL entry: {entry:?}"
                    ));
                }
            }
        }

        Ok(())
    }
}

impl Default for ArchivedStateConsistency {
    fn default() -> Self {
        Self::new()
    }
}

impl Invariant for ArchivedStateConsistency {
    fn name(&self) -> &str {
        "ArchivedStateConsistency"
    }

    fn is_strict(&self) -> bool {
        self.strict
    }

    fn check_after_assume_state(
        &self,
        live: &LiveSnapshot,
        archive: &HotArchiveSnapshot,
    ) -> Result<(), String> {
        if protocol_version_is_before(
            live.protocol_version(),
            cinder_common::FIRST_PROTOCOL_SUPPORTING_PERSISTENT_EVICTION,
        ) {
            tracing::info!(
                protocol_version = live.protocol_version(),
                "skipping archived-state startup scan for protocol version"
            );
            return Ok(());
        }

        // Merge-walk the two ordered stores; any shared key fails.
        let mut live_iter = live.iter().peekable();
        let mut archive_iter = archive.iter().peekable();
        while let (Some((live_key, _)), Some((archive_key, _))) =
            (live_iter.peek(), archive_iter.peek())
        {
            match archive_key.cmp(live_key) {
                std::cmp::Ordering::Less => {
                    archive_iter.next();
                }
                std::cmp::Ordering::Greater => {
                    live_iter.next();
                }
                std::cmp::Ordering::Equal => {
                    return Err(format!(
                        "entry with the same key is present in both live and archived state; key: {archive_key:?}"
                    ));
                }
            }
        }
        tracing::info!("archived-state startup scan passed");
        Ok(())
    }

    fn check_on_ledger_commit(&self, ctx: &LedgerCommitContext<'_>) -> Result<(), String> {
        if protocol_version_is_before(
            ctx.protocol_version(),
            cinder_common::FIRST_PROTOCOL_SUPPORTING_PERSISTENT_EVICTION,
        ) {
            return Ok(());
        }
        self.check_eviction(ctx)?;
        self.check_restoration(ctx)
    }
}

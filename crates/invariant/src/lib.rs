//! Invariant framework for cinder.
//!
//! Invariants are registered once at startup, enabled by (case-insensitive)
//! regex pattern, and executed by the [`InvariantManager`] at defined
//! lifecycle points: after a batch of entries is applied from storage, after
//! state is assumed at startup, after each operation, and after every ledger
//! commit. A strict invariant failure aborts the node; a lax one is logged
//! and counted.

pub mod archival;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;

use cinder_model::{Entry, EntryKey};
use cinder_state::{HotArchiveSnapshot, LiveSnapshot};

pub use archival::ArchivedStateConsistency;

/// Errors from the invariant manager.
#[derive(Debug, Error)]
pub enum InvariantError {
    /// A strict invariant failed; the node must abort.
    #[error("invariant {name} does not hold: {details}")]
    Violated { name: String, details: String },

    /// Registering a name twice.
    #[error("invariant {0} already registered")]
    AlreadyRegistered(String),

    /// Enabling an invariant that is already enabled.
    #[error("invariant {0} already enabled")]
    AlreadyEnabled(String),

    /// An enable pattern that matched nothing.
    #[error("invariant pattern '{pattern}' did not match any invariants. {registered}")]
    NoMatch { pattern: String, registered: String },

    /// A malformed enable pattern.
    #[error("invalid invariant pattern '{pattern}': {details}")]
    InvalidPattern { pattern: String, details: String },
}

/// A change to one ledger entry, as seen by per-operation checks.
#[derive(Debug, Clone)]
pub enum EntryChange {
    Created { current: Entry },
    Updated { previous: Entry, current: Entry },
    Deleted { previous: Entry },
}

impl EntryChange {
    pub fn current_entry(&self) -> Option<&Entry> {
        match self {
            EntryChange::Created { current } => Some(current),
            EntryChange::Updated { current, .. } => Some(current),
            EntryChange::Deleted { .. } => None,
        }
    }

    pub fn previous_entry(&self) -> Option<&Entry> {
        match self {
            EntryChange::Created { .. } => None,
            EntryChange::Updated { previous, .. } => Some(previous),
            EntryChange::Deleted { previous } => Some(previous),
        }
    }
}

/// Everything a ledger-commit check can see: the pre-commit snapshots of
/// both stores and the eviction/restoration deltas the commit produced.
pub struct LedgerCommitContext<'a> {
    /// Live state as of the previous committed ledger.
    pub live: &'a LiveSnapshot,
    /// Hot archive as of the previous committed ledger.
    pub archive: &'a HotArchiveSnapshot,
    /// Persistent entries evicted to the archive by this commit.
    pub evicted_from_live: &'a [Entry],
    /// Temporary entry keys and TTL keys deleted by this commit.
    pub deleted_keys_from_live: &'a [EntryKey],
    /// Entries (and reconstructed TTLs) restored from the archive.
    pub restored_from_archive: &'a BTreeMap<EntryKey, Entry>,
    /// Entries (and their pre-restore TTLs) restored from expired live state.
    pub restored_from_live: &'a BTreeMap<EntryKey, Entry>,
}

impl LedgerCommitContext<'_> {
    /// Sequence of the ledger whose commit is being checked.
    pub fn ledger_seq(&self) -> u32 {
        self.live.ledger_seq() + 1
    }

    /// Protocol version in force.
    pub fn protocol_version(&self) -> u32 {
        self.live.protocol_version()
    }
}

/// One registered invariant. Checks return `Err(details)` on violation.
pub trait Invariant: Send + Sync {
    fn name(&self) -> &str;

    /// Strict invariants abort the node on failure; lax ones log and count.
    fn is_strict(&self) -> bool {
        true
    }

    fn check_on_bucket_apply(
        &self,
        _entries: &[Entry],
        _ledger_seq: u32,
    ) -> Result<(), String> {
        Ok(())
    }

    fn check_after_assume_state(
        &self,
        _live: &LiveSnapshot,
        _archive: &HotArchiveSnapshot,
    ) -> Result<(), String> {
        Ok(())
    }

    fn check_on_operation_apply(
        &self,
        _op_name: &str,
        _changes: &[EntryChange],
        _ledger_seq: u32,
    ) -> Result<(), String> {
        Ok(())
    }

    fn check_on_ledger_commit(&self, _ctx: &LedgerCommitContext<'_>) -> Result<(), String> {
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
struct FailureInfo {
    last_failed_on_ledger: u32,
    last_failed_with_message: String,
}

/// Registers, enables, and executes invariants.
#[derive(Default)]
pub struct InvariantManager {
    invariants: BTreeMap<String, Arc<dyn Invariant>>,
    enabled: Vec<Arc<dyn Invariant>>,
    failure_count: AtomicU64,
    failure_info: Mutex<BTreeMap<String, FailureInfo>>,
}

impl InvariantManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an invariant under its name. Double registration is an
    /// error.
    pub fn register(&mut self, invariant: Arc<dyn Invariant>) -> Result<(), InvariantError> {
        let name = invariant.name().to_string();
        if self.invariants.contains_key(&name) {
            return Err(InvariantError::AlreadyRegistered(name));
        }
        self.invariants.insert(name, invariant);
        Ok(())
    }

    /// Enable every registered invariant whose name matches the pattern
    /// (case-insensitive, whole-name match). Re-enabling an invariant or
    /// matching nothing is an error.
    pub fn enable(&mut self, pattern: &str) -> Result<(), InvariantError> {
        if pattern.is_empty() {
            return Err(InvariantError::InvalidPattern {
                pattern: pattern.to_string(),
                details: "pattern must be non-empty".to_string(),
            });
        }
        let regex = regex::RegexBuilder::new(&format!("^(?:{pattern})$"))
            .case_insensitive(true)
            .build()
            .map_err(|e| InvariantError::InvalidPattern {
                pattern: pattern.to_string(),
                details: e.to_string(),
            })?;

        let mut enabled_some = false;
        for (name, invariant) in &self.invariants {
            if !regex.is_match(name) {
                continue;
            }
            if self.enabled.iter().any(|inv| inv.name() == name) {
                return Err(InvariantError::AlreadyEnabled(name.clone()));
            }
            tracing::info!(invariant = %name, "enabled invariant");
            self.enabled.push(Arc::clone(invariant));
            enabled_some = true;
        }
        if !enabled_some {
            let registered = if self.invariants.is_empty() {
                "There are no registered invariants".to_string()
            } else {
                format!(
                    "Registered invariants are: {}",
                    self.invariants
                        .keys()
                        .cloned()
                        .collect::<Vec<_>>()
                        .join(", ")
                )
            };
            return Err(InvariantError::NoMatch {
                pattern: pattern.to_string(),
                registered,
            });
        }
        Ok(())
    }

    /// Names of the enabled invariants, in enablement order.
    pub fn get_enabled(&self) -> Vec<String> {
        self.enabled.iter().map(|inv| inv.name().to_string()).collect()
    }

    /// Failure information as JSON: per-invariant last failure plus the
    /// total count.
    pub fn get_json_info(&self) -> serde_json::Value {
        let mut failures = serde_json::Map::new();
        for (name, info) in self.failure_info.lock().iter() {
            failures.insert(
                name.clone(),
                serde_json::json!({
                    "last_failed_on_ledger": info.last_failed_on_ledger,
                    "last_failed_with_message": info.last_failed_with_message,
                }),
            );
        }
        if !failures.is_empty() {
            failures.insert(
                "count".to_string(),
                serde_json::json!(self.failure_count.load(Ordering::Relaxed)),
            );
        }
        serde_json::Value::Object(failures)
    }

    /// Total number of invariant failures observed.
    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    pub fn check_on_bucket_apply(
        &self,
        entries: &[Entry],
        ledger_seq: u32,
    ) -> Result<(), InvariantError> {
        self.run_all(ledger_seq, |inv| inv.check_on_bucket_apply(entries, ledger_seq))
    }

    pub fn check_after_assume_state(
        &self,
        live: &LiveSnapshot,
        archive: &HotArchiveSnapshot,
    ) -> Result<(), InvariantError> {
        self.run_all(live.ledger_seq(), |inv| {
            inv.check_after_assume_state(live, archive)
        })
    }

    pub fn check_on_operation_apply(
        &self,
        op_name: &str,
        changes: &[EntryChange],
        ledger_seq: u32,
    ) -> Result<(), InvariantError> {
        self.run_all(ledger_seq, |inv| {
            inv.check_on_operation_apply(op_name, changes, ledger_seq)
        })
    }

    pub fn check_on_ledger_commit(
        &self,
        ctx: &LedgerCommitContext<'_>,
    ) -> Result<(), InvariantError> {
        self.run_all(ctx.ledger_seq(), |inv| inv.check_on_ledger_commit(ctx))
    }

    fn run_all<F>(&self, ledger_seq: u32, check: F) -> Result<(), InvariantError>
    where
        F: Fn(&dyn Invariant) -> Result<(), String>,
    {
        for invariant in &self.enabled {
            if let Err(details) = check(invariant.as_ref()) {
                self.on_failure(invariant.as_ref(), &details, ledger_seq)?;
            }
        }
        Ok(())
    }

    fn on_failure(
        &self,
        invariant: &dyn Invariant,
        details: &str,
        ledger_seq: u32,
    ) -> Result<(), InvariantError> {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
        self.failure_info.lock().insert(
            invariant.name().to_string(),
            FailureInfo {
                last_failed_on_ledger: ledger_seq,
                last_failed_with_message: details.to_string(),
            },
        );
        if invariant.is_strict() {
            tracing::error!(
                invariant = invariant.name(),
                ledger_seq,
                details,
                "strict invariant failed, aborting"
            );
            Err(InvariantError::Violated {
                name: invariant.name().to_string(),
                details: details.to_string(),
            })
        } else {
            tracing::error!(
                invariant = invariant.name(),
                ledger_seq,
                details,
                "invariant failed"
            );
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AlwaysFails {
        strict: bool,
    }

    impl Invariant for AlwaysFails {
        fn name(&self) -> &str {
            "AlwaysFails"
        }
        fn is_strict(&self) -> bool {
            self.strict
        }
        fn check_on_bucket_apply(&self, _: &[Entry], _: u32) -> Result<(), String> {
            Err("nope".to_string())
        }
    }

    struct AlwaysPasses;

    impl Invariant for AlwaysPasses {
        fn name(&self) -> &str {
            "AlwaysPasses"
        }
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut manager = InvariantManager::new();
        manager.register(Arc::new(AlwaysPasses)).unwrap();
        let err = manager.register(Arc::new(AlwaysPasses)).unwrap_err();
        assert!(matches!(err, InvariantError::AlreadyRegistered(_)));
    }

    #[test]
    fn test_enable_is_case_insensitive_full_match() {
        let mut manager = InvariantManager::new();
        manager.register(Arc::new(AlwaysPasses)).unwrap();

        // Partial matches do not count as a whole-name match
        let err = manager.enable("Always").unwrap_err();
        assert!(matches!(err, InvariantError::NoMatch { .. }));

        manager.enable("alwayspasses").unwrap();
        assert_eq!(manager.get_enabled(), vec!["AlwaysPasses".to_string()]);
    }

    #[test]
    fn test_enable_pattern_matches_many() {
        let mut manager = InvariantManager::new();
        manager.register(Arc::new(AlwaysPasses)).unwrap();
        manager
            .register(Arc::new(AlwaysFails { strict: false }))
            .unwrap();

        manager.enable("Always.*").unwrap();
        assert_eq!(manager.get_enabled().len(), 2);
    }

    #[test]
    fn test_reenable_is_an_error() {
        let mut manager = InvariantManager::new();
        manager.register(Arc::new(AlwaysPasses)).unwrap();
        manager.enable("AlwaysPasses").unwrap();
        let err = manager.enable("AlwaysPasses").unwrap_err();
        assert!(matches!(err, InvariantError::AlreadyEnabled(_)));
    }

    #[test]
    fn test_empty_and_invalid_patterns_rejected() {
        let mut manager = InvariantManager::new();
        assert!(matches!(
            manager.enable(""),
            Err(InvariantError::InvalidPattern { .. })
        ));
        assert!(matches!(
            manager.enable("("),
            Err(InvariantError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_strict_failure_aborts() {
        let mut manager = InvariantManager::new();
        manager
            .register(Arc::new(AlwaysFails { strict: true }))
            .unwrap();
        manager.enable("AlwaysFails").unwrap();

        let err = manager.check_on_bucket_apply(&[], 7).unwrap_err();
        assert!(matches!(err, InvariantError::Violated { .. }));
        assert_eq!(manager.failure_count(), 1);
    }

    #[test]
    fn test_lax_failure_records_and_continues() {
        let mut manager = InvariantManager::new();
        manager
            .register(Arc::new(AlwaysFails { strict: false }))
            .unwrap();
        manager.enable("AlwaysFails").unwrap();

        manager.check_on_bucket_apply(&[], 7).unwrap();
        manager.check_on_bucket_apply(&[], 8).unwrap();
        assert_eq!(manager.failure_count(), 2);

        let info = manager.get_json_info();
        assert_eq!(info["AlwaysFails"]["last_failed_on_ledger"], 8);
        assert_eq!(info["count"], 2);
    }

    #[test]
    fn test_json_info_empty_without_failures() {
        let manager = InvariantManager::new();
        assert_eq!(manager.get_json_info(), serde_json::json!({}));
    }
}

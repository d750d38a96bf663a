//! End-to-end tests for the operation appliers: archived-entry handling,
//! autorestore, budget enforcement, restore and TTL-extension semantics.

use cinder_model::{ContractEvent, Entry, EntryPayload, EventType, Val};
use cinder_tx::test_utils::{
    contract_code_entry, default_resources, persistent_data_entry, source_account,
    temp_data_entry, ApplyEnv, MockSandbox,
};
use cinder_tx::{
    ClassicResult, DeclaredResources, ExtendTtlResult, Footprint, HostFunction, InvokeOutput,
    InvokeResult, Operation, OpResult, ResourceExt, RestoreResult, TxError,
};
use cinder_tx::operations::{
    ExtendFootprintTtlOp, InvokeContractOp, ManageDataOp, RestoreFootprintOp,
};

fn invoke_op(footprint: Footprint, resources: DeclaredResources) -> Operation {
    Operation::Invoke(InvokeContractOp {
        source: source_account(1),
        host_function: HostFunction::InvokeContract {
            contract: match persistent_data_entry(1).payload {
                EntryPayload::ContractData(ref cd) => cd.contract,
                _ => unreachable!(),
            },
            function: "run".into(),
            args: vec![],
        },
        auth: vec![],
        footprint,
        resources,
        resource_ext: ResourceExt::V0,
    })
}

fn restore_op(read_write: Vec<cinder_model::EntryKey>) -> Operation {
    Operation::RestoreFootprint(RestoreFootprintOp {
        source: source_account(1),
        footprint: Footprint {
            read_only: vec![],
            read_write,
        },
        resources: default_resources(),
    })
}

mod invoke {
    use super::*;

    /// Reading an archived key in the read-only footprint fails with
    /// EntryArchived and leaves both stores unchanged.
    #[test]
    fn archive_blocked_read() {
        let mut env = ApplyEnv::new(25);
        let entry = persistent_data_entry(3);
        env.seed_archived(entry.clone());

        let op = invoke_op(
            Footprint {
                read_only: vec![entry.key()],
                read_write: vec![],
            },
            default_resources(),
        );
        let applied = env.apply_op(&op).unwrap();

        assert_eq!(
            applied.result,
            OpResult::Invoke(InvokeResult::EntryArchived)
        );
        assert!(env.live.get(&entry.key()).is_none());
        assert!(env.archive.contains_key(&entry.key()));
        assert!(!env.last_diagnostics.is_empty());
    }

    /// An archived read-write key without an autorestore mark also fails.
    #[test]
    fn archive_blocked_write_without_mark() {
        let mut env = ApplyEnv::new(25);
        let entry = persistent_data_entry(3);
        env.seed_archived(entry.clone());

        let op = invoke_op(
            Footprint {
                read_only: vec![],
                read_write: vec![entry.key()],
            },
            default_resources(),
        );
        let applied = env.apply_op(&op).unwrap();
        assert_eq!(
            applied.result,
            OpResult::Invoke(InvokeResult::EntryArchived)
        );
    }

    /// With the read-write entry marked for autorestore, the invoke restores
    /// it: pre-archive payload back in the live store, fresh minimum TTL,
    /// archive record gone.
    #[test]
    fn autorestore_marked_entry() {
        let mut env = ApplyEnv::new(25);
        let entry = persistent_data_entry(3);
        env.seed_archived(entry.clone());

        let op = Operation::Invoke(InvokeContractOp {
            source: source_account(1),
            host_function: HostFunction::InvokeContract {
                contract: match entry.payload {
                    EntryPayload::ContractData(ref cd) => cd.contract,
                    _ => unreachable!(),
                },
                function: "run".into(),
                args: vec![],
            },
            auth: vec![],
            footprint: Footprint {
                read_only: vec![],
                read_write: vec![entry.key()],
            },
            resources: default_resources(),
            resource_ext: ResourceExt::V1 {
                archived_indices: vec![0],
            },
        });
        let applied = env.apply_op(&op).unwrap();
        assert!(applied.result.is_success());

        let restored = env.live.get(&entry.key()).unwrap();
        assert_eq!(restored.payload, entry.payload);
        assert_eq!(restored.last_modified_ledger_seq, env.ledger_seq);

        let live_until = env
            .live
            .get(&entry.key().ttl_key())
            .unwrap()
            .as_ttl()
            .unwrap()
            .live_until_ledger_seq;
        assert_eq!(
            live_until,
            env.ledger_seq + env.config.archival.min_persistent_entry_ttl - 1
        );
        assert!(!env.archive.contains_key(&entry.key()));
    }

    /// Before the persistent-eviction protocol, the hot archive is never
    /// consulted: a key with no TTL simply reads as absent.
    #[test]
    fn archive_not_consulted_before_eviction_protocol() {
        let mut env = ApplyEnv::new(22);
        let entry = persistent_data_entry(3);
        env.seed_archived(entry.clone());

        let op = invoke_op(
            Footprint {
                read_only: vec![entry.key()],
                read_write: vec![],
            },
            default_resources(),
        );
        let applied = env.apply_op(&op).unwrap();
        assert!(applied.result.is_success());
    }

    /// An expired temporary entry reads as absent, and an untouched
    /// read-write slot for it deletes the leftovers.
    #[test]
    fn expired_temporary_reads_absent_and_is_cleaned_up() {
        let mut env = ApplyEnv::new(25);
        let entry = temp_data_entry(4);
        // live_until 99 < ledger_seq 100: expired
        env.seed(entry.clone(), Some(99));

        let op = invoke_op(
            Footprint {
                read_only: vec![],
                read_write: vec![entry.key()],
            },
            default_resources(),
        );
        let applied = env.apply_op(&op).unwrap();
        assert!(applied.result.is_success());

        // The sandbox never saw the entry, so the untouched-writes sweep
        // removed it and its TTL.
        assert!(env.live.get(&entry.key()).is_none());
        assert!(env.live.get(&entry.key().ttl_key()).is_none());
    }

    /// Sandbox overrunning declared instructions maps to
    /// ResourceLimitExceeded with no state changes.
    #[test]
    fn instruction_overrun() {
        let mut env = ApplyEnv::new(25);
        let entry = persistent_data_entry(5);
        env.seed(entry.clone(), Some(500));

        env.sandbox.enqueue(InvokeOutput {
            success: false,
            cpu_insns: 200,
            ..InvokeOutput::default()
        });

        let op = invoke_op(
            Footprint {
                read_only: vec![],
                read_write: vec![entry.key()],
            },
            DeclaredResources {
                instructions: 100,
                disk_read_bytes: 100_000,
                write_bytes: 100_000,
            },
        );
        let before = env.live.get(&entry.key()).cloned();
        let applied = env.apply_op(&op).unwrap();

        assert_eq!(
            applied.result,
            OpResult::Invoke(InvokeResult::ResourceLimitExceeded)
        );
        assert_eq!(env.live.get(&entry.key()).cloned(), before);
    }

    /// Sandbox overrunning the network memory limit also maps to
    /// ResourceLimitExceeded.
    #[test]
    fn memory_overrun() {
        let mut env = ApplyEnv::new(25);
        env.sandbox.enqueue(InvokeOutput {
            success: false,
            cpu_insns: 10,
            mem_bytes: env.config.tx_memory_limit + 1,
            ..InvokeOutput::default()
        });
        let op = invoke_op(Footprint::default(), default_resources());
        let applied = env.apply_op(&op).unwrap();
        assert_eq!(
            applied.result,
            OpResult::Invoke(InvokeResult::ResourceLimitExceeded)
        );
    }

    /// A deterministic contract failure that fits its budgets is Trapped.
    #[test]
    fn trapped() {
        let mut env = ApplyEnv::new(25);
        env.sandbox.enqueue(InvokeOutput {
            success: false,
            cpu_insns: 10,
            ..InvokeOutput::default()
        });
        let op = invoke_op(Footprint::default(), default_resources());
        let applied = env.apply_op(&op).unwrap();
        assert_eq!(applied.result, OpResult::Invoke(InvokeResult::Trapped));
    }

    /// A sandbox internal error escalates past the operation level.
    #[test]
    fn internal_error_escalates() {
        let mut env = ApplyEnv::new(25);
        env.sandbox.enqueue(InvokeOutput {
            success: false,
            is_internal_error: true,
            ..InvokeOutput::default()
        });
        let op = invoke_op(Footprint::default(), default_resources());
        let err = env.apply_op(&op).unwrap_err();
        assert!(matches!(err, TxError::SandboxInternal(_)));
    }

    /// Functional success with a rent fee the refundable budget cannot cover
    /// fails with InsufficientRefundableFee and commits nothing.
    #[test]
    fn refundable_fee_shortfall() {
        let mut env = ApplyEnv::new(25);
        env.refundable_fee = 50;
        env.sandbox.enqueue(InvokeOutput {
            success: true,
            rent_fee: 51,
            result_value: Val::Void,
            ..InvokeOutput::default()
        });
        let op = invoke_op(Footprint::default(), default_resources());
        let applied = env.apply_op(&op).unwrap();
        assert_eq!(
            applied.result,
            OpResult::Invoke(InvokeResult::InsufficientRefundableFee)
        );
    }

    /// Event bytes over the network limit fail, both before and after the
    /// return value is counted.
    #[test]
    fn event_bytes_over_limit() {
        let mut env = ApplyEnv::new(25);
        env.config.tx_max_contract_events_size_bytes = 40;

        let big_event = ContractEvent {
            event_type: EventType::Contract,
            contract_id: None,
            topics: vec![Val::symbol("transfer")],
            data: Val::Bytes(vec![0; 64]),
        };
        env.sandbox.enqueue(InvokeOutput {
            success: true,
            contract_events: vec![big_event],
            ..InvokeOutput::default()
        });
        let op = invoke_op(Footprint::default(), default_resources());
        let applied = env.apply_op(&op).unwrap();
        assert_eq!(
            applied.result,
            OpResult::Invoke(InvokeResult::ResourceLimitExceeded)
        );

        // Return value alone can push it over
        env.sandbox.enqueue(InvokeOutput {
            success: true,
            result_value: Val::Bytes(vec![0; 64]),
            ..InvokeOutput::default()
        });
        let applied = env.apply_op(&op).unwrap();
        assert_eq!(
            applied.result,
            OpResult::Invoke(InvokeResult::ResourceLimitExceeded)
        );
    }

    /// Write bytes are checked against the declared budget; TTL entries are
    /// exempt (their cost is refundable-fee rent).
    #[test]
    fn write_budget() {
        let mut env = ApplyEnv::new(25);
        let entry = persistent_data_entry(6);
        env.seed(entry.clone(), Some(500));

        let op = invoke_op(
            Footprint {
                read_only: vec![],
                read_write: vec![entry.key()],
            },
            DeclaredResources {
                instructions: 1_000_000,
                disk_read_bytes: 100_000,
                write_bytes: 10,
            },
        );
        let applied = env.apply_op(&op).unwrap();
        assert_eq!(
            applied.result,
            OpResult::Invoke(InvokeResult::ResourceLimitExceeded)
        );
    }

    /// A successful invoke commits modified entries and returns the hash of
    /// the success preimage plus the events and return value.
    #[test]
    fn success_commits_and_reports() {
        let mut env = ApplyEnv::new(25);
        let entry = persistent_data_entry(7);
        env.seed(entry.clone(), Some(500));

        let mut modified = entry.clone();
        if let EntryPayload::ContractData(ref mut cd) = modified.payload {
            cd.val = Val::U64(99);
        }
        let event = ContractEvent {
            event_type: EventType::Contract,
            contract_id: None,
            topics: vec![Val::symbol("set")],
            data: Val::U64(99),
        };
        env.sandbox.enqueue(InvokeOutput {
            success: true,
            modified_entries: vec![modified.clone()],
            contract_events: vec![event.clone()],
            result_value: Val::Bool(true),
            cpu_insns: 1_000,
            mem_bytes: 1_000,
            ..InvokeOutput::default()
        });

        let op = invoke_op(
            Footprint {
                read_only: vec![],
                read_write: vec![entry.key()],
            },
            default_resources(),
        );
        let applied = env.apply_op(&op).unwrap();

        assert!(applied.result.is_success());
        assert_eq!(applied.events, vec![event]);
        assert_eq!(applied.return_value, Some(Val::Bool(true)));
        assert_eq!(env.live.get(&entry.key()).unwrap().payload, modified.payload);
    }

    /// A created contract entry without a created TTL sibling is a fatal
    /// implementation bug, not an op failure.
    #[test]
    fn created_entry_without_ttl_is_fatal() {
        let mut env = ApplyEnv::new(25);
        let entry = persistent_data_entry(8);

        env.sandbox.enqueue(InvokeOutput {
            success: true,
            modified_entries: vec![entry.clone()],
            ..InvokeOutput::default()
        });
        let op = invoke_op(
            Footprint {
                read_only: vec![],
                read_write: vec![entry.key()],
            },
            default_resources(),
        );
        let err = env.apply_op(&op).unwrap_err();
        assert!(matches!(err, TxError::CreatedEntryWithoutTtl(_)));
    }

    /// Entries the sandbox creates commit together with their TTLs.
    #[test]
    fn created_entry_with_ttl_commits() {
        let mut env = ApplyEnv::new(25);
        let entry = persistent_data_entry(8);
        let ttl = entry.make_ttl_entry(600, 100);

        env.sandbox.enqueue(InvokeOutput {
            success: true,
            modified_entries: vec![entry.clone(), ttl.clone()],
            ..InvokeOutput::default()
        });
        let op = invoke_op(
            Footprint {
                read_only: vec![],
                read_write: vec![entry.key()],
            },
            default_resources(),
        );
        let applied = env.apply_op(&op).unwrap();
        assert!(applied.result.is_success());
        assert_eq!(env.live.get(&entry.key()), Some(&entry));
        assert_eq!(env.live.get(&ttl.key()), Some(&ttl));
    }

    /// Footprint safety probe: the sandbox is handed exactly the entries
    /// named by the declared footprint, nothing else in the live state.
    #[test]
    fn sandbox_sees_only_footprint_entries() {
        let mut env = ApplyEnv::new(25);
        let in_footprint = persistent_data_entry(20);
        let outside = persistent_data_entry(21);
        env.seed(in_footprint.clone(), Some(500));
        env.seed(outside.clone(), Some(500));

        let op = invoke_op(
            Footprint {
                read_only: vec![in_footprint.key()],
                read_write: vec![],
            },
            default_resources(),
        );
        let applied = env.apply_op(&op).unwrap();
        assert!(applied.result.is_success());

        let seen = env.sandbox.seen_entry_keys();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], vec![in_footprint.key()]);
    }

    /// Oversize uploads are rejected at check-valid time.
    #[test]
    fn oversize_wasm_upload_malformed() {
        let mut env = ApplyEnv::new(25);
        env.config.max_contract_size_bytes = 16;
        let op = Operation::Invoke(InvokeContractOp {
            source: source_account(1),
            host_function: HostFunction::UploadWasm(vec![0; 17]),
            auth: vec![],
            footprint: Footprint::default(),
            resources: default_resources(),
            resource_ext: ResourceExt::V0,
        });
        let applied = env.apply_op(&op).unwrap();
        assert_eq!(applied.result, OpResult::Invoke(InvokeResult::Malformed));
    }
}

mod restore {
    use super::*;

    #[test]
    fn rejects_read_only_footprint() {
        let mut env = ApplyEnv::new(25);
        let entry = persistent_data_entry(1);
        let op = Operation::RestoreFootprint(RestoreFootprintOp {
            source: source_account(1),
            footprint: Footprint {
                read_only: vec![entry.key()],
                read_write: vec![],
            },
            resources: default_resources(),
        });
        let applied = env.apply_op(&op).unwrap();
        assert_eq!(applied.result, OpResult::Restore(RestoreResult::Malformed));
    }

    #[test]
    fn rejects_temporary_keys() {
        let mut env = ApplyEnv::new(25);
        let entry = temp_data_entry(1);
        let applied = env.apply_op(&restore_op(vec![entry.key()])).unwrap();
        assert_eq!(applied.result, OpResult::Restore(RestoreResult::Malformed));
    }

    /// Restoring an already-live key is a no-op: success, no rent charged.
    #[test]
    fn already_live_is_noop() {
        let mut env = ApplyEnv::new(25);
        env.sandbox.rent_fee_per_change = 1_000;
        env.refundable_fee = 0; // any rent charge would fail
        let entry = persistent_data_entry(1);
        env.seed(entry.clone(), Some(500));

        let before_ttl = env.live.get(&entry.key().ttl_key()).cloned();
        let applied = env.apply_op(&restore_op(vec![entry.key()])).unwrap();

        assert_eq!(applied.result, OpResult::Restore(RestoreResult::Success));
        assert_eq!(env.live.get(&entry.key().ttl_key()).cloned(), before_ttl);
    }

    /// Restoring a key that exists nowhere is skipped.
    #[test]
    fn missing_key_is_skipped() {
        let mut env = ApplyEnv::new(25);
        let entry = persistent_data_entry(1);
        let applied = env.apply_op(&restore_op(vec![entry.key()])).unwrap();
        assert_eq!(applied.result, OpResult::Restore(RestoreResult::Success));
    }

    /// An expired entry still in the live store gets its TTL bumped to the
    /// minimum persistent lifetime; the payload stays as-is.
    #[test]
    fn restores_expired_live_entry() {
        let mut env = ApplyEnv::new(25);
        let entry = persistent_data_entry(1);
        env.seed(entry.clone(), Some(99)); // expired at seq 100

        let applied = env.apply_op(&restore_op(vec![entry.key()])).unwrap();
        assert_eq!(applied.result, OpResult::Restore(RestoreResult::Success));

        let live_until = env
            .live
            .get(&entry.key().ttl_key())
            .unwrap()
            .as_ttl()
            .unwrap()
            .live_until_ledger_seq;
        assert_eq!(
            live_until,
            env.ledger_seq + env.config.archival.min_persistent_entry_ttl - 1
        );
        assert_eq!(env.live.get(&entry.key()).unwrap().payload, entry.payload);
    }

    /// An archived entry comes back from the hot archive with a fresh TTL.
    #[test]
    fn restores_archived_entry() {
        let mut env = ApplyEnv::new(25);
        let entry = persistent_data_entry(2);
        env.seed_archived(entry.clone());

        let applied = env.apply_op(&restore_op(vec![entry.key()])).unwrap();
        assert_eq!(applied.result, OpResult::Restore(RestoreResult::Success));

        assert!(!env.archive.contains_key(&entry.key()));
        assert_eq!(env.live.get(&entry.key()).unwrap().payload, entry.payload);
        assert!(env.live.get(&entry.key().ttl_key()).is_some());
    }

    /// Restore reads are metered against the declared disk-read budget.
    #[test]
    fn read_budget_enforced() {
        let mut env = ApplyEnv::new(25);
        let entry = persistent_data_entry(2);
        env.seed_archived(entry.clone());

        let op = Operation::RestoreFootprint(RestoreFootprintOp {
            source: source_account(1),
            footprint: Footprint {
                read_only: vec![],
                read_write: vec![entry.key()],
            },
            resources: DeclaredResources {
                instructions: 0,
                disk_read_bytes: 1,
                write_bytes: 100_000,
            },
        });
        let applied = env.apply_op(&op).unwrap();
        assert_eq!(
            applied.result,
            OpResult::Restore(RestoreResult::ResourceLimitExceeded)
        );
        // Nothing committed
        assert!(env.archive.contains_key(&entry.key()));
    }

    #[test]
    fn refundable_fee_shortfall() {
        let mut env = ApplyEnv::new(25);
        env.sandbox.rent_fee_per_change = 1_000;
        env.refundable_fee = 999;
        let entry = persistent_data_entry(2);
        env.seed_archived(entry.clone());

        let applied = env.apply_op(&restore_op(vec![entry.key()])).unwrap();
        assert_eq!(
            applied.result,
            OpResult::Restore(RestoreResult::InsufficientRefundableFee)
        );
        assert!(env.archive.contains_key(&entry.key()));
    }
}

mod extend_ttl {
    use super::*;

    fn extend_op(read_only: Vec<cinder_model::EntryKey>, extend_to: u32) -> Operation {
        Operation::ExtendFootprintTtl(ExtendFootprintTtlOp {
            source: source_account(1),
            extend_to,
            footprint: Footprint {
                read_only,
                read_write: vec![],
            },
            resources: default_resources(),
        })
    }

    #[test]
    fn rejects_zero_and_oversize_extend_to() {
        let mut env = ApplyEnv::new(25);
        let applied = env.apply_op(&extend_op(vec![], 0)).unwrap();
        assert_eq!(
            applied.result,
            OpResult::ExtendTtl(ExtendTtlResult::Malformed)
        );

        let applied = env
            .apply_op(&extend_op(vec![], env.config.archival.max_entry_ttl))
            .unwrap();
        assert_eq!(
            applied.result,
            OpResult::ExtendTtl(ExtendTtlResult::Malformed)
        );
    }

    #[test]
    fn rejects_non_contract_keys() {
        let mut env = ApplyEnv::new(25);
        let key = cinder_model::EntryKey::Account {
            account_id: source_account(2),
        };
        let applied = env.apply_op(&extend_op(vec![key], 100)).unwrap();
        assert_eq!(
            applied.result,
            OpResult::ExtendTtl(ExtendTtlResult::Malformed)
        );
    }

    #[test]
    fn extends_live_entry() {
        let mut env = ApplyEnv::new(25);
        let entry = contract_code_entry(1);
        env.seed(entry.clone(), Some(150));

        let applied = env.apply_op(&extend_op(vec![entry.key()], 500)).unwrap();
        assert_eq!(applied.result, OpResult::ExtendTtl(ExtendTtlResult::Success));

        let live_until = env
            .live
            .get(&entry.key().ttl_key())
            .unwrap()
            .as_ttl()
            .unwrap()
            .live_until_ledger_seq;
        assert_eq!(live_until, env.ledger_seq + 500);
    }

    /// TTLs never shorten: extending below the current value is a no-op.
    #[test]
    fn never_shortens() {
        let mut env = ApplyEnv::new(25);
        let entry = contract_code_entry(1);
        env.seed(entry.clone(), Some(100_000));

        let applied = env.apply_op(&extend_op(vec![entry.key()], 10)).unwrap();
        assert_eq!(applied.result, OpResult::ExtendTtl(ExtendTtlResult::Success));

        let live_until = env
            .live
            .get(&entry.key().ttl_key())
            .unwrap()
            .as_ttl()
            .unwrap()
            .live_until_ledger_seq;
        assert_eq!(live_until, 100_000);
    }

    /// Expired entries are skipped; they must be restored instead.
    #[test]
    fn skips_expired_entries() {
        let mut env = ApplyEnv::new(25);
        let entry = contract_code_entry(1);
        env.seed(entry.clone(), Some(99));

        let applied = env.apply_op(&extend_op(vec![entry.key()], 500)).unwrap();
        assert_eq!(applied.result, OpResult::ExtendTtl(ExtendTtlResult::Success));

        let live_until = env
            .live
            .get(&entry.key().ttl_key())
            .unwrap()
            .as_ttl()
            .unwrap()
            .live_until_ledger_seq;
        assert_eq!(live_until, 99);
    }

    #[test]
    fn charges_rent_against_refundable_fee() {
        let mut env = ApplyEnv::new(25);
        env.sandbox.rent_fee_per_change = 1_000;
        env.refundable_fee = 999;
        let entry = contract_code_entry(1);
        env.seed(entry.clone(), Some(150));

        let applied = env.apply_op(&extend_op(vec![entry.key()], 500)).unwrap();
        assert_eq!(
            applied.result,
            OpResult::ExtendTtl(ExtendTtlResult::InsufficientRefundableFee)
        );
    }
}

mod classic {
    use super::*;

    fn manage_data(name: &str, value: Option<Vec<u8>>) -> Operation {
        Operation::Classic(ManageDataOp {
            source: source_account(1),
            name: name.into(),
            value,
        })
    }

    #[test]
    fn create_update_delete_round_trip() {
        let mut env = ApplyEnv::new(25);

        let applied = env
            .apply_op(&manage_data("config", Some(vec![1, 2, 3])))
            .unwrap();
        assert_eq!(applied.result, OpResult::Classic(ClassicResult::Success));

        let key = cinder_model::EntryKey::Data {
            account_id: source_account(1),
            name: "config".into(),
        };
        assert!(env.live.get(&key).is_some());
        // Classic entries carry no TTL
        assert_eq!(env.live.len(), 1);

        let applied = env
            .apply_op(&manage_data("config", Some(vec![9])))
            .unwrap();
        assert!(applied.result.is_success());
        match &env.live.get(&key).unwrap().payload {
            EntryPayload::Data(d) => assert_eq!(d.value, vec![9]),
            other => panic!("unexpected payload: {other:?}"),
        }

        let applied = env.apply_op(&manage_data("config", None)).unwrap();
        assert!(applied.result.is_success());
        assert!(env.live.get(&key).is_none());
    }

    #[test]
    fn delete_missing_is_not_found() {
        let mut env = ApplyEnv::new(25);
        let applied = env.apply_op(&manage_data("missing", None)).unwrap();
        assert_eq!(applied.result, OpResult::Classic(ClassicResult::NotFound));
    }

    #[test]
    fn empty_name_is_malformed() {
        let mut env = ApplyEnv::new(25);
        let applied = env.apply_op(&manage_data("", Some(vec![1]))).unwrap();
        assert_eq!(applied.result, OpResult::Classic(ClassicResult::Malformed));
    }
}

mod properties {
    use super::*;
    use cinder_model::codec;
    use proptest::prelude::*;

    /// Budget monotonicity: if an operation fails at read budget B, it fails
    /// at every budget below B, and the pass/fail boundary sits exactly at
    /// the total bytes read.
    #[test]
    fn budget_monotonicity_boundary() {
        // Classic entries are always disk-metered
        let entries: Vec<Entry> = (1u8..=4)
            .map(|seed| {
                Entry::new(
                    50,
                    EntryPayload::Data(cinder_model::DataEntry {
                        account_id: source_account(seed),
                        name: "x".into(),
                        value: vec![seed; 16],
                    }),
                )
            })
            .collect();
        let needed: u32 = entries.iter().map(codec::entry_size).sum();
        let keys: Vec<_> = entries.iter().map(Entry::key).collect();

        let run = |budget: u32| {
            let mut env = ApplyEnv::new(25);
            for entry in &entries {
                env.seed(entry.clone(), None);
            }
            let op = invoke_op(
                Footprint {
                    read_only: keys.clone(),
                    read_write: vec![],
                },
                DeclaredResources {
                    instructions: 1_000_000,
                    disk_read_bytes: budget,
                    write_bytes: 100_000,
                },
            );
            env.apply_op(&op).unwrap().result
        };

        assert!(run(needed).is_success());
        assert_eq!(
            run(needed - 1),
            OpResult::Invoke(InvokeResult::ResourceLimitExceeded)
        );
        assert_eq!(run(0), OpResult::Invoke(InvokeResult::ResourceLimitExceeded));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        /// For arbitrary budgets, failure below the boundary and success at
        /// or above it.
        #[test]
        fn prop_budget_monotonicity(budget in 0u32..600) {
            let entry = Entry::new(
                50,
                EntryPayload::Data(cinder_model::DataEntry {
                    account_id: source_account(1),
                    name: "x".into(),
                    value: vec![7; 100],
                }),
            );
            let needed = codec::entry_size(&entry);

            let mut env = ApplyEnv::new(25);
            env.seed(entry.clone(), None);
            let op = invoke_op(
                Footprint {
                    read_only: vec![entry.key()],
                    read_write: vec![],
                },
                DeclaredResources {
                    instructions: 1_000_000,
                    disk_read_bytes: budget,
                    write_bytes: 100_000,
                },
            );
            let result = env.apply_op(&op).unwrap().result;
            prop_assert_eq!(result.is_success(), budget >= needed);
        }
    }
}

//! Resource metering for contract operations.
//!
//! The meter accumulates per-operation counters and checks them against the
//! budgets declared by the transaction and the network configuration. A
//! check fails the first time a counter would exceed its budget; the caller
//! pushes the matching diagnostic and maps the breach to the op result.

use cinder_common::ContractConfig;

use crate::operations::DeclaredResources;

/// A counter that exceeded its budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitBreach {
    /// Name of the breached counter, as surfaced in diagnostics.
    pub counter: &'static str,
    /// Observed value.
    pub value: u64,
    /// The budget it exceeded.
    pub limit: u64,
}

/// Per-operation resource counters.
#[derive(Debug, Default, Clone)]
pub struct ResourceMeter {
    pub read_entries: u32,
    pub write_entries: u32,

    pub read_key_bytes: u32,
    pub write_key_bytes: u32,

    pub disk_read_bytes: u32,
    pub ledger_write_bytes: u32,

    pub read_data_bytes: u32,
    pub write_data_bytes: u32,
    pub read_code_bytes: u32,
    pub write_code_bytes: u32,

    pub emit_events: u32,
    pub emit_event_bytes: u32,

    pub cpu_insns: u64,
    pub mem_bytes: u64,
    pub time_nsecs: u64,
    pub declared_cpu_insns: u64,

    pub rent_fee_consumed: i64,

    // max single entity observations
    pub max_rw_key_bytes: u32,
    pub max_rw_data_bytes: u32,
    pub max_rw_code_bytes: u32,
    pub max_emit_event_bytes: u32,
}

impl ResourceMeter {
    pub fn new(declared_cpu_insns: u64) -> Self {
        Self {
            declared_cpu_insns,
            ..Self::default()
        }
    }

    /// Record a disk read of one entry.
    pub fn note_disk_read_entry(&mut self, is_code_entry: bool, key_size: u32, entry_size: u32) {
        self.read_entries += 1;
        self.read_key_bytes += key_size;
        self.max_rw_key_bytes = self.max_rw_key_bytes.max(key_size);
        self.disk_read_bytes += entry_size;
        if is_code_entry {
            self.read_code_bytes += entry_size;
            self.max_rw_code_bytes = self.max_rw_code_bytes.max(entry_size);
        } else {
            self.read_data_bytes += entry_size;
            self.max_rw_data_bytes = self.max_rw_data_bytes.max(entry_size);
        }
    }

    /// Record a read served from the in-memory contract-state tier: counted
    /// as a read entry but not as disk bytes.
    pub fn note_in_memory_read_entry(&mut self) {
        self.read_entries += 1;
    }

    /// Record a write of one entry.
    pub fn note_write_entry(&mut self, is_code_entry: bool, key_size: u32, entry_size: u32) {
        self.write_entries += 1;
        self.write_key_bytes += key_size;
        self.max_rw_key_bytes = self.max_rw_key_bytes.max(key_size);
        self.ledger_write_bytes += entry_size;
        if is_code_entry {
            self.write_code_bytes += entry_size;
            self.max_rw_code_bytes = self.max_rw_code_bytes.max(entry_size);
        } else {
            self.write_data_bytes += entry_size;
            self.max_rw_data_bytes = self.max_rw_data_bytes.max(entry_size);
        }
    }

    /// Record one emitted contract event.
    pub fn note_event(&mut self, event_size: u32) {
        self.emit_events += 1;
        self.emit_event_bytes += event_size;
        self.max_emit_event_bytes = self.max_emit_event_bytes.max(event_size);
    }

    /// Count the return value against the event-bytes budget.
    pub fn note_return_value(&mut self, size: u32) {
        self.emit_event_bytes += size;
    }

    /// Check accumulated disk reads against the declared budget.
    pub fn check_disk_read(&self, resources: &DeclaredResources) -> Result<(), LimitBreach> {
        check(
            "disk_read_bytes",
            self.disk_read_bytes as u64,
            resources.disk_read_bytes as u64,
        )
    }

    /// Check accumulated writes against the declared budget.
    pub fn check_write(&self, resources: &DeclaredResources) -> Result<(), LimitBreach> {
        check(
            "write_bytes",
            self.ledger_write_bytes as u64,
            resources.write_bytes as u64,
        )
    }

    /// Check accumulated event bytes against the network limit.
    pub fn check_event_bytes(&self, config: &ContractConfig) -> Result<(), LimitBreach> {
        check(
            "emit_event_bytes",
            self.emit_event_bytes as u64,
            config.tx_max_contract_events_size_bytes as u64,
        )
    }

    /// Check sandbox-reported instructions against the declared budget.
    pub fn check_cpu(&self, resources: &DeclaredResources) -> Result<(), LimitBreach> {
        check("cpu_insns", self.cpu_insns, resources.instructions)
    }

    /// Check sandbox-reported memory against the network limit.
    pub fn check_mem(&self, config: &ContractConfig) -> Result<(), LimitBreach> {
        check("mem_bytes", self.mem_bytes, config.tx_memory_limit)
    }
}

fn check(counter: &'static str, value: u64, limit: u64) -> Result<(), LimitBreach> {
    if value > limit {
        Err(LimitBreach {
            counter,
            value,
            limit,
        })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resources(disk_read: u32, write: u32) -> DeclaredResources {
        DeclaredResources {
            instructions: 1_000,
            disk_read_bytes: disk_read,
            write_bytes: write,
        }
    }

    #[test]
    fn test_disk_read_accumulates_and_breaches() {
        let mut meter = ResourceMeter::new(1_000);
        meter.note_disk_read_entry(false, 10, 60);
        assert!(meter.check_disk_read(&resources(100, 100)).is_ok());

        meter.note_disk_read_entry(true, 10, 60);
        let breach = meter.check_disk_read(&resources(100, 100)).unwrap_err();
        assert_eq!(breach.counter, "disk_read_bytes");
        assert_eq!(breach.value, 120);
        assert_eq!(breach.limit, 100);

        // Code and data bytes tracked separately
        assert_eq!(meter.read_data_bytes, 60);
        assert_eq!(meter.read_code_bytes, 60);
        assert_eq!(meter.read_entries, 2);
    }

    #[test]
    fn test_in_memory_reads_do_not_meter_disk() {
        let mut meter = ResourceMeter::new(1_000);
        meter.note_in_memory_read_entry();
        meter.note_in_memory_read_entry();
        assert_eq!(meter.read_entries, 2);
        assert_eq!(meter.disk_read_bytes, 0);
        assert!(meter.check_disk_read(&resources(0, 0)).is_ok());
    }

    #[test]
    fn test_write_breach_is_exact_at_boundary() {
        let mut meter = ResourceMeter::new(1_000);
        meter.note_write_entry(false, 4, 100);
        // Exactly at the limit is allowed
        assert!(meter.check_write(&resources(0, 100)).is_ok());
        meter.note_write_entry(false, 4, 1);
        assert!(meter.check_write(&resources(0, 100)).is_err());
    }

    #[test]
    fn test_event_bytes_include_return_value() {
        let config = ContractConfig {
            tx_max_contract_events_size_bytes: 50,
            ..ContractConfig::default()
        };
        let mut meter = ResourceMeter::new(1_000);
        meter.note_event(30);
        assert!(meter.check_event_bytes(&config).is_ok());
        meter.note_return_value(25);
        let breach = meter.check_event_bytes(&config).unwrap_err();
        assert_eq!(breach.counter, "emit_event_bytes");
        assert_eq!(breach.value, 55);
    }

    #[test]
    fn test_max_observations() {
        let mut meter = ResourceMeter::new(1_000);
        meter.note_write_entry(false, 8, 100);
        meter.note_write_entry(false, 16, 40);
        meter.note_event(7);
        meter.note_event(3);
        assert_eq!(meter.max_rw_key_bytes, 16);
        assert_eq!(meter.max_rw_data_bytes, 100);
        assert_eq!(meter.max_emit_event_bytes, 7);
    }

    #[test]
    fn test_cpu_and_mem_checks() {
        let config = ContractConfig {
            tx_memory_limit: 500,
            ..ContractConfig::default()
        };
        let mut meter = ResourceMeter::new(100);
        meter.cpu_insns = 200;
        assert!(meter
            .check_cpu(&DeclaredResources {
                instructions: 100,
                disk_read_bytes: 0,
                write_bytes: 0
            })
            .is_err());
        meter.mem_bytes = 501;
        assert!(meter.check_mem(&config).is_err());
    }
}

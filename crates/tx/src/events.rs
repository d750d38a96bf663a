//! Diagnostic event buffering.

use cinder_model::{DiagnosticEvent, Val};

use crate::meter::{LimitBreach, ResourceMeter};

/// Buffer of diagnostic events produced while applying one operation.
///
/// When diagnostics are disabled the buffer drops everything pushed into it;
/// the apply paths stay branch-free.
#[derive(Debug, Default)]
pub struct DiagnosticEventBuffer {
    enabled: bool,
    events: Vec<DiagnosticEvent>,
}

impl DiagnosticEventBuffer {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            events: Vec::new(),
        }
    }

    /// Whether diagnostics are being collected.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Push a single diagnostic event.
    pub fn push(&mut self, event: DiagnosticEvent) {
        if self.enabled {
            self.events.push(event);
        }
    }

    /// Push an error-shaped diagnostic with detail values.
    pub fn push_error(&mut self, message: &str, details: Vec<Val>) {
        if self.enabled {
            tracing::debug!(message, "diagnostic error event");
            self.events.push(DiagnosticEvent::error(message, details));
        }
    }

    /// Push a budget-breach diagnostic naming the counter, its value, and
    /// the limit it exceeded.
    pub fn push_limit_breach(&mut self, message: &str, breach: LimitBreach) {
        self.push_error(
            message,
            vec![
                Val::symbol(breach.counter),
                Val::U64(breach.value),
                Val::U64(breach.limit),
            ],
        );
    }

    /// Push diagnostic events reported by the sandbox.
    pub fn extend(&mut self, events: impl IntoIterator<Item = DiagnosticEvent>) {
        if self.enabled {
            self.events.extend(events);
        }
    }

    /// Push one `core_metrics` event per metered counter.
    pub fn push_metrics(&mut self, meter: &ResourceMeter, success: bool) {
        if !self.enabled {
            return;
        }
        let counters: [(&str, u64); 19] = [
            ("read_entry", meter.read_entries as u64),
            ("write_entry", meter.write_entries as u64),
            ("ledger_read_byte", meter.disk_read_bytes as u64),
            ("ledger_write_byte", meter.ledger_write_bytes as u64),
            ("read_key_byte", meter.read_key_bytes as u64),
            ("write_key_byte", meter.write_key_bytes as u64),
            ("read_data_byte", meter.read_data_bytes as u64),
            ("write_data_byte", meter.write_data_bytes as u64),
            ("read_code_byte", meter.read_code_bytes as u64),
            ("write_code_byte", meter.write_code_bytes as u64),
            ("emit_event", meter.emit_events as u64),
            ("emit_event_byte", meter.emit_event_bytes as u64),
            ("cpu_insn", meter.cpu_insns),
            ("mem_byte", meter.mem_bytes),
            ("invoke_time_nsecs", meter.time_nsecs),
            ("max_rw_key_byte", meter.max_rw_key_bytes as u64),
            ("max_rw_data_byte", meter.max_rw_data_bytes as u64),
            ("max_rw_code_byte", meter.max_rw_code_bytes as u64),
            ("max_emit_event_byte", meter.max_emit_event_bytes as u64),
        ];
        for (name, value) in counters {
            self.events.push(DiagnosticEvent::metrics(success, name, value));
        }
    }

    /// Drain the buffered events.
    pub fn take(&mut self) -> Vec<DiagnosticEvent> {
        std::mem::take(&mut self.events)
    }

    /// Number of buffered events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

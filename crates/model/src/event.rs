//! Structured contract events.

use serde::{Deserialize, Serialize};

use crate::key::ContractId;
use crate::val::Val;

/// Event classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    /// Emitted by contract code.
    Contract,
    /// Emitted by the host on behalf of the system.
    System,
    /// Diagnostic-only; never part of the success preimage.
    Diagnostic,
}

/// A structured event: a list of typed topics plus a typed body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractEvent {
    pub event_type: EventType,
    /// The emitting contract, when one is attributable.
    pub contract_id: Option<ContractId>,
    pub topics: Vec<Val>,
    pub data: Val,
}

/// A diagnostic event, tagged with whether the surrounding contract call
/// succeeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticEvent {
    pub in_successful_contract_call: bool,
    pub event: ContractEvent,
}

impl DiagnosticEvent {
    /// A `core_metrics` event naming one metered counter and its value.
    pub fn metrics(success: bool, counter: &str, value: u64) -> Self {
        Self {
            in_successful_contract_call: success,
            event: ContractEvent {
                event_type: EventType::Diagnostic,
                contract_id: None,
                topics: vec![Val::symbol("core_metrics"), Val::symbol(counter)],
                data: Val::U64(value),
            },
        }
    }

    /// An error-shaped diagnostic with a message topic and detail values.
    pub fn error(message: &str, details: Vec<Val>) -> Self {
        Self {
            in_successful_contract_call: false,
            event: ContractEvent {
                event_type: EventType::Diagnostic,
                contract_id: None,
                topics: vec![Val::symbol("error"), Val::symbol(message)],
                data: Val::Vec(details),
            },
        }
    }
}

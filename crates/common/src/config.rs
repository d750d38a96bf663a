//! Network configuration for contract execution and state archival.
//!
//! These values are agreed network-wide and loaded from configuration
//! entries. They must match the network to produce correct transaction
//! results and state transitions.

use serde::{Deserialize, Serialize};

/// Cost model parameters for a single resource dimension (CPU or memory).
///
/// Each entry is a `(const_term, linear_term)` pair for one host cost type.
/// The sandbox interprets these; this core only carries them through.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostParams(pub Vec<(u64, u64)>);

impl CostParams {
    /// Whether any cost entries are present.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Fee configuration for rent charged on restored or extended entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentFeeConfig {
    /// Fee per 1KB written to the ledger.
    pub fee_per_write_1kb: i64,
    /// Fee per entry written.
    pub fee_per_write_entry: i64,
    /// Fee per 1KB of rented ledger space per rent period.
    pub fee_per_rent_1kb: i64,
    /// Rent rate denominator for persistent entries.
    pub persistent_rent_rate_denominator: i64,
    /// Rent rate denominator for temporary entries.
    pub temporary_rent_rate_denominator: i64,
    /// Fee per 1KB of emitted contract events.
    pub fee_per_contract_event_1kb: i64,
}

impl Default for RentFeeConfig {
    fn default() -> Self {
        Self {
            fee_per_write_1kb: 3_500,
            fee_per_write_entry: 10_000,
            fee_per_rent_1kb: 343,
            persistent_rent_rate_denominator: 2_103,
            temporary_rent_rate_denominator: 4_206,
            fee_per_contract_event_1kb: 8_007,
        }
    }
}

/// Settings that control eviction of expired entries from the live state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateArchivalSettings {
    /// Minimum TTL for temporary entries, in ledgers.
    pub min_temp_entry_ttl: u32,
    /// Minimum TTL for persistent entries, in ledgers.
    pub min_persistent_entry_ttl: u32,
    /// Maximum TTL for any entry, in ledgers.
    pub max_entry_ttl: u32,
    /// Maximum bytes of entry data examined by the eviction scan per ledger.
    ///
    /// Large states amortize the sweep across ledgers; the scan resumes at
    /// the next canonical key on the following ledger.
    pub eviction_scan_size: u64,
}

impl Default for StateArchivalSettings {
    fn default() -> Self {
        Self {
            min_temp_entry_ttl: 16,
            min_persistent_entry_ttl: 120_960, // ~7 days at 5s ledger close
            max_entry_ttl: 6_312_000,          // ~1 year
            eviction_scan_size: 100_000,
        }
    }
}

/// Network configuration for contract execution.
///
/// Holds the limits and cost parameters consumed by the host-function and
/// restore appliers, the resource meter, and the eviction engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractConfig {
    /// CPU cost model parameters.
    pub cpu_cost_params: CostParams,
    /// Memory cost model parameters.
    pub mem_cost_params: CostParams,
    /// Maximum CPU instructions per transaction.
    pub tx_max_instructions: u64,
    /// Maximum memory bytes per transaction.
    pub tx_memory_limit: u64,
    /// Maximum size of contract events + return value per tx.
    pub tx_max_contract_events_size_bytes: u32,
    /// Maximum contract code entry size in bytes.
    pub max_contract_size_bytes: u32,
    /// Maximum contract data entry size in bytes.
    pub max_contract_data_entry_size_bytes: u32,
    /// State archival settings.
    pub archival: StateArchivalSettings,
    /// Rent fee configuration.
    pub rent_fee: RentFeeConfig,
    /// Number of worker threads for background module compilation.
    pub compilation_threads: usize,
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            cpu_cost_params: CostParams::default(),
            mem_cost_params: CostParams::default(),
            tx_max_instructions: 100_000_000,
            tx_memory_limit: 40 * 1024 * 1024,
            tx_max_contract_events_size_bytes: 8 * 1024,
            max_contract_size_bytes: 64 * 1024,
            max_contract_data_entry_size_bytes: 64 * 1024,
            archival: StateArchivalSettings::default(),
            rent_fee: RentFeeConfig::default(),
            compilation_threads: 2,
        }
    }
}

impl ContractConfig {
    /// Check if this config has cost parameters loaded.
    ///
    /// Returns false if the cost params are empty (default/placeholder values).
    pub fn has_valid_cost_params(&self) -> bool {
        !self.cpu_cost_params.is_empty() && !self.mem_cost_params.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_config_default() {
        let config = ContractConfig::default();

        assert_eq!(config.tx_max_instructions, 100_000_000);
        assert_eq!(config.tx_memory_limit, 40 * 1024 * 1024);
        assert_eq!(config.archival.min_temp_entry_ttl, 16);
        assert_eq!(config.archival.min_persistent_entry_ttl, 120_960);
        assert_eq!(config.archival.max_entry_ttl, 6_312_000);
        // Default has empty cost params
        assert!(!config.has_valid_cost_params());
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let config = ContractConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: ContractConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}

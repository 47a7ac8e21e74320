//! The hub's process-wide tunables.

use crate::error::{ConfigError, ConfigResult};
use photon_types::Address;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Rate scaling denominator: 10000 = 100%.
pub const RATE_DENOMINATOR: u32 = 10_000;

/// Minimum allowed bet timeout: 30 days in seconds.
pub const MIN_BET_TIMEOUT_SECS: u64 = 30 * 24 * 60 * 60;

/// Process-wide tunables for the hub.
///
/// Loaded from a single `photon.toml` file, or constructed directly by a
/// host. All setters go through the hub's admin entry point, which
/// re-validates the whole value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Address system fees accrue to and are withdrawn by.
    pub fee_collector: Address,
    /// One-time fee charged on protocol registration.
    pub protocol_register_fee: u128,
    /// Fee charged per newly added manual transmitter.
    pub manual_transmitter_fee: u128,
    /// Fee charged on protocol parameter changes.
    pub change_protocol_params_fee: u128,
    /// Balance floor below which a protocol is paused at round turn.
    pub min_protocol_balance: u128,
    /// Global ceiling on per-protocol transmitter counts.
    pub max_transmitters_count: u32,
    /// System skim on every distributed reward, scaled by 10000.
    pub agent_reward_fee: u32,
    /// Personal stake required per operated transmitter; zero disables
    /// the cap.
    pub agent_stake_per_transmitter: u128,
    /// Consecutive missed executions before a transmitter is slashed.
    pub slashing_border: u32,
    /// Per-operation fee deducted from protocol balance on execution.
    pub protocol_operation_fee: u128,
    /// Fee charged when a protocol inits a new chain.
    pub init_new_chain_fee: u128,
    /// Seconds after which an unresolved bet may be pruned. At least 30
    /// days.
    pub bet_timeout: u64,
    /// Minimum seconds between round turns.
    pub min_round_time: u64,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            fee_collector: Address::ZERO,
            protocol_register_fee: 0,
            manual_transmitter_fee: 0,
            change_protocol_params_fee: 0,
            min_protocol_balance: 0,
            max_transmitters_count: 32,
            agent_reward_fee: 1000,
            agent_stake_per_transmitter: 0,
            slashing_border: 3,
            protocol_operation_fee: 0,
            init_new_chain_fee: 0,
            bet_timeout: MIN_BET_TIMEOUT_SECS,
            min_round_time: 60 * 60,
        }
    }
}

impl GlobalConfig {
    /// Load configuration from a TOML file and validate it.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        info!("loading hub configuration from {:?}", path);

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config = Self::from_toml(&content)?;
        debug!(
            slashing_border = config.slashing_border,
            min_round_time = config.min_round_time,
            "hub configuration loaded"
        );
        Ok(config)
    }

    /// Parse configuration from a TOML string and validate it.
    pub fn from_toml(content: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate that all values are within acceptable ranges.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.agent_reward_fee > RATE_DENOMINATOR {
            return Err(ConfigError::InvalidRate {
                field: "agent_reward_fee",
                value: self.agent_reward_fee,
                range: "0..=10000",
            });
        }
        if self.bet_timeout < MIN_BET_TIMEOUT_SECS {
            return Err(ConfigError::DurationTooShort {
                field: "bet_timeout",
                value: self.bet_timeout,
                min: MIN_BET_TIMEOUT_SECS,
            });
        }
        if self.max_transmitters_count == 0 {
            return Err(ConfigError::ZeroValue("max_transmitters_count"));
        }
        if self.slashing_border == 0 {
            return Err(ConfigError::ZeroValue("slashing_border"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        GlobalConfig::default().validate().unwrap();
    }

    #[test]
    fn test_agent_reward_fee_bound() {
        let config = GlobalConfig {
            agent_reward_fee: 10_001,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRate { field: "agent_reward_fee", .. })
        ));
    }

    #[test]
    fn test_bet_timeout_floor() {
        let config = GlobalConfig {
            bet_timeout: MIN_BET_TIMEOUT_SECS - 1,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DurationTooShort { field: "bet_timeout", .. })
        ));
    }

    #[test]
    fn test_from_toml_partial_overrides() {
        let config = GlobalConfig::from_toml(
            r#"
            slashing_border = 5
            min_round_time = 120
            "#,
        )
        .unwrap();
        assert_eq!(config.slashing_border, 5);
        assert_eq!(config.min_round_time, 120);
        assert_eq!(config.agent_reward_fee, GlobalConfig::default().agent_reward_fee);
    }

    #[test]
    fn test_from_toml_rejects_bad_rate() {
        let result = GlobalConfig::from_toml("agent_reward_fee = 20000");
        assert!(result.is_err());
    }
}

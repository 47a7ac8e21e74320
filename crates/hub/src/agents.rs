//! Agent↔transmitter mapping per protocol.
//!
//! An agent operates at most one transmitter per protocol, declared
//! explicitly and capped by personal stake: with a non-zero
//! `agent_stake_per_transmitter`, an agent may run one transmitter per
//! that much personal stake. A transmitter address belongs to exactly one
//! agent across all protocols.

use crate::protocols::ProtocolRegistry;
use crate::staking::StakingLedger;
use crate::{HubError, HubResult};
use photon_config::GlobalConfig;
use photon_types::{Address, ProtocolId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Support declarations binding agents to transmitters per protocol.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AgentDirectory {
    transmitters: HashMap<Address, HashMap<ProtocolId, Address>>,
    agent_by_transmitter: HashMap<Address, Address>,
    transmitter_count: HashMap<Address, u32>,
}

impl AgentDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// The transmitter an agent declared for a protocol, if any.
    pub fn transmitter_of(&self, agent: Address, protocol_id: ProtocolId) -> Option<Address> {
        self.transmitters
            .get(&agent)
            .and_then(|m| m.get(&protocol_id))
            .copied()
    }

    /// The agent operating a transmitter, if any.
    pub fn agent_by_transmitter(&self, transmitter: Address) -> Option<Address> {
        self.agent_by_transmitter.get(&transmitter).copied()
    }

    /// Number of transmitters an agent currently operates.
    pub fn transmitter_count(&self, agent: Address) -> u32 {
        self.transmitter_count.get(&agent).copied().unwrap_or(0)
    }

    /// All `(protocol, transmitter)` declarations of an agent.
    pub fn declarations_of(&self, agent: Address) -> Vec<(ProtocolId, Address)> {
        self.transmitters
            .get(&agent)
            .map(|m| m.iter().map(|(p, t)| (*p, *t)).collect())
            .unwrap_or_default()
    }

    /// Declares that `agent` will operate `transmitter` for the protocol.
    pub fn declare_protocol_support(
        &mut self,
        agent: Address,
        protocol_id: ProtocolId,
        transmitter: Address,
        staking: &StakingLedger,
        registry: &ProtocolRegistry,
        config: &GlobalConfig,
    ) -> HubResult<()> {
        if transmitter.is_zero() {
            return Err(HubError::ZeroAddress);
        }
        if protocol_id.is_zero() || protocol_id.is_gov() || registry.protocol(protocol_id).is_none()
        {
            return Err(HubError::InvalidProtocolId(protocol_id));
        }
        let info = staking
            .agent(agent)
            .ok_or(HubError::AgentNotFound(agent))?;
        if !info.approved {
            return Err(HubError::NotApprovedAgent(agent));
        }
        if let Some(owner) = self.agent_by_transmitter.get(&transmitter) {
            if *owner != agent {
                return Err(HubError::DuplicateTransmitter(transmitter));
            }
        }
        if self
            .transmitters
            .get(&agent)
            .is_some_and(|m| m.contains_key(&protocol_id))
        {
            return Err(HubError::SupportAlreadyDeclared);
        }
        if config.agent_stake_per_transmitter > 0 {
            let allowed = info.personal_stake / config.agent_stake_per_transmitter;
            if u128::from(self.transmitter_count(agent)) >= allowed {
                return Err(HubError::InsufficientPersonalStake);
            }
        }
        self.transmitters
            .entry(agent)
            .or_default()
            .insert(protocol_id, transmitter);
        self.agent_by_transmitter.insert(transmitter, agent);
        *self.transmitter_count.entry(agent).or_default() += 1;
        debug!(%agent, %transmitter, ?protocol_id, "protocol support declared");
        Ok(())
    }

    /// Revokes an agent's declaration for a protocol.
    pub fn revoke_protocol_support(
        &mut self,
        agent: Address,
        protocol_id: ProtocolId,
    ) -> HubResult<Address> {
        // Capture the transmitter before clearing the forward mapping so
        // the reverse index clears the real key.
        let transmitter = self
            .transmitter_of(agent, protocol_id)
            .ok_or(HubError::SupportNotDeclared)?;
        if let Some(m) = self.transmitters.get_mut(&agent) {
            m.remove(&protocol_id);
        }
        self.agent_by_transmitter.remove(&transmitter);
        if let Some(count) = self.transmitter_count.get_mut(&agent) {
            *count = count.saturating_sub(1);
        }
        Ok(transmitter)
    }

    /// Clears the declaration that binds `transmitter` to its agent for
    /// the protocol. No-op if the transmitter is unknown. Used when a
    /// transmitter is removed for inactivity or its agent is banned.
    pub(crate) fn clear_by_transmitter(&mut self, protocol_id: ProtocolId, transmitter: Address) {
        let Some(agent) = self.agent_by_transmitter.get(&transmitter).copied() else {
            return;
        };
        let declared = self
            .transmitters
            .get(&agent)
            .and_then(|m| m.get(&protocol_id))
            .copied();
        if declared == Some(transmitter) {
            if let Some(m) = self.transmitters.get_mut(&agent) {
                m.remove(&protocol_id);
            }
            self.agent_by_transmitter.remove(&transmitter);
            if let Some(count) = self.transmitter_count.get_mut(&agent) {
                *count = count.saturating_sub(1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::tests::registry_with_protocol;

    fn addr(b: u8) -> Address {
        Address::new([b; 20])
    }

    fn setup() -> (AgentDirectory, StakingLedger, ProtocolRegistry, ProtocolId, GlobalConfig) {
        let mut staking = StakingLedger::new();
        staking.register_agent(addr(1)).unwrap();
        let (registry, protocol_id) = registry_with_protocol();
        (
            AgentDirectory::new(),
            staking,
            registry,
            protocol_id,
            GlobalConfig::default(),
        )
    }

    #[test]
    fn test_declare_and_lookup() {
        let (mut dir, staking, registry, protocol_id, config) = setup();
        dir.declare_protocol_support(addr(1), protocol_id, addr(2), &staking, &registry, &config)
            .unwrap();
        assert_eq!(dir.transmitter_of(addr(1), protocol_id), Some(addr(2)));
        assert_eq!(dir.agent_by_transmitter(addr(2)), Some(addr(1)));
        assert_eq!(dir.transmitter_count(addr(1)), 1);
    }

    #[test]
    fn test_declare_rejects_gov_zero_and_unknown() {
        let (mut dir, staking, registry, _protocol_id, config) = setup();
        use photon_types::GOV_PROTOCOL_ID;
        assert!(matches!(
            dir.declare_protocol_support(
                addr(1),
                GOV_PROTOCOL_ID,
                addr(2),
                &staking,
                &registry,
                &config
            ),
            Err(HubError::InvalidProtocolId(_))
        ));
        assert!(matches!(
            dir.declare_protocol_support(
                addr(1),
                ProtocolId::ZERO,
                addr(2),
                &staking,
                &registry,
                &config
            ),
            Err(HubError::InvalidProtocolId(_))
        ));
        assert!(matches!(
            dir.declare_protocol_support(
                addr(1),
                ProtocolId::from_ascii(b"nope").unwrap(),
                addr(2),
                &staking,
                &registry,
                &config
            ),
            Err(HubError::InvalidProtocolId(_))
        ));
    }

    #[test]
    fn test_transmitter_unique_across_agents() {
        let (mut dir, mut staking, registry, protocol_id, config) = setup();
        staking.register_agent(addr(3)).unwrap();
        dir.declare_protocol_support(addr(1), protocol_id, addr(2), &staking, &registry, &config)
            .unwrap();
        assert!(matches!(
            dir.declare_protocol_support(
                addr(3),
                protocol_id,
                addr(2),
                &staking,
                &registry,
                &config
            ),
            Err(HubError::DuplicateTransmitter(_))
        ));
    }

    #[test]
    fn test_stake_cap() {
        let (mut dir, mut staking, registry, protocol_id, config) = setup();
        let config = GlobalConfig {
            agent_stake_per_transmitter: 100,
            ..config
        };
        // No personal stake: cap is zero transmitters.
        assert!(matches!(
            dir.declare_protocol_support(
                addr(1),
                protocol_id,
                addr(2),
                &staking,
                &registry,
                &config
            ),
            Err(HubError::InsufficientPersonalStake)
        ));
        let mut ledger = crate::ledger::InMemoryLedger::new();
        ledger.mint(addr(1), 100);
        let mut events = Vec::new();
        staking
            .deposit_personal_stake(addr(1), 100, &mut ledger, &mut events)
            .unwrap();
        dir.declare_protocol_support(addr(1), protocol_id, addr(2), &staking, &registry, &config)
            .unwrap();
    }

    #[test]
    fn test_revoke_captures_transmitter() {
        let (mut dir, staking, registry, protocol_id, config) = setup();
        dir.declare_protocol_support(addr(1), protocol_id, addr(2), &staking, &registry, &config)
            .unwrap();
        let removed = dir.revoke_protocol_support(addr(1), protocol_id).unwrap();
        assert_eq!(removed, addr(2));
        assert_eq!(dir.agent_by_transmitter(addr(2)), None);
        assert_eq!(dir.transmitter_of(addr(1), protocol_id), None);
        assert!(matches!(
            dir.revoke_protocol_support(addr(1), protocol_id),
            Err(HubError::SupportNotDeclared)
        ));
    }
}

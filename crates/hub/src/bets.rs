//! Per-operation stake bets.
//!
//! When a transmitter participates in an operation its agent locks a
//! per-protocol bet amount. Bets release with a reward when the operation
//! executes, refund without one when a round rotation evicts the
//! transmitter, and forfeit to the system fee after the bet timeout.
//!
//! The first transmitter to bet on an operation is remembered: it earns
//! the first-bet reward. The transmitter set current at bet-start is
//! snapshotted; members still in the snapshot when the operation settles
//! missed it, and enough consecutive misses slash the agent and evict the
//! transmitter.

use crate::agents::AgentDirectory;
use crate::endpoint::Outbox;
use crate::events::Event;
use crate::operations::OperationRegistry;
use crate::protocols::ProtocolRegistry;
use crate::staking::StakingLedger;
use crate::{HubError, HubResult};
use photon_config::GlobalConfig;
use photon_types::{Address, ProtocolId, H256};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, trace, warn};

/// What kind of consensus a bet backs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BetType {
    /// Message-operation proof.
    Msg,
    /// Stream-data vote.
    Data,
}

/// One agent's open bet on one operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bet {
    /// Locked amount.
    pub amount: u128,
    /// Time of the first credit; prune eligibility is measured from here.
    pub timestamp: u64,
}

/// Per-operation bet bookkeeping shared by all bettors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpBetInfo {
    /// Bet kind, fixed by the first bet.
    pub bet_type: BetType,
    /// The first transmitter to bet.
    pub first_bet: Address,
    /// Transmitter set current when betting opened; winners are removed
    /// as they settle, the rest accrue inactivity.
    pub cur_transmitters: Vec<Address>,
    /// When the operation settled, if it has.
    pub processed_at: Option<u64>,
}

/// Lifetime statistics for one agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentBetStats {
    /// Bets placed.
    pub bets_placed: u64,
    /// Rewards registered.
    pub rewards_earned: u128,
}

/// The bet and reward engine.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct BetBook {
    bets: HashMap<Address, HashMap<H256, Bet>>,
    op_info: HashMap<H256, OpBetInfo>,
    inactivity: HashMap<ProtocolId, HashMap<Address, u32>>,
    pending_rewards: Vec<(Address, u128)>,
    stats: HashMap<Address, AgentBetStats>,
}

impl BetBook {
    /// Creates an empty bet book.
    pub fn new() -> Self {
        Self::default()
    }

    /// The open bet of an agent on an operation.
    pub fn bet(&self, agent: Address, op_hash: H256) -> Option<Bet> {
        self.bets.get(&agent).and_then(|m| m.get(&op_hash)).copied()
    }

    /// Shared bet info for an operation.
    pub fn op_info(&self, op_hash: H256) -> Option<&OpBetInfo> {
        self.op_info.get(&op_hash)
    }

    /// Consecutive misses of a transmitter within a protocol.
    pub fn inactivity_of(&self, protocol_id: ProtocolId, transmitter: Address) -> u32 {
        self.inactivity
            .get(&protocol_id)
            .and_then(|m| m.get(&transmitter))
            .copied()
            .unwrap_or(0)
    }

    /// Lifetime statistics of an agent.
    pub fn stats_of(&self, agent: Address) -> AgentBetStats {
        self.stats.get(&agent).copied().unwrap_or_default()
    }

    /// Locks a bet for the transmitter's agent on the operation.
    ///
    /// The first bet fixes the bet type, the first-bet winner, and the
    /// transmitter snapshot. Manual transmitters participate without any
    /// stake movement.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn place_bet(
        &mut self,
        protocol_id: ProtocolId,
        transmitter: Address,
        bet_type: BetType,
        op_hash: H256,
        now: u64,
        current_transmitters: &[Address],
        registry: &ProtocolRegistry,
        staking: &mut StakingLedger,
        agents: &AgentDirectory,
    ) -> HubResult<()> {
        if registry.is_paused(protocol_id) {
            return Err(HubError::ProtocolIsPaused(protocol_id));
        }
        match self.op_info.get(&op_hash) {
            None => {
                self.op_info.insert(
                    op_hash,
                    OpBetInfo {
                        bet_type,
                        first_bet: transmitter,
                        cur_transmitters: current_transmitters.to_vec(),
                        processed_at: None,
                    },
                );
            }
            Some(info) if info.bet_type != bet_type => {
                return Err(HubError::BetTypeMismatch(op_hash));
            }
            Some(_) => {}
        }
        if registry.is_manual_transmitter(protocol_id, transmitter) {
            return Ok(());
        }
        let agent = agents
            .agent_by_transmitter(transmitter)
            .ok_or(HubError::AgentNotFound(transmitter))?;
        let amount = registry.bet_amount(protocol_id, bet_type);
        staking.lock_agent_stake(agent, amount)?;
        let bet = self
            .bets
            .entry(agent)
            .or_default()
            .entry(op_hash)
            .or_default();
        if bet.amount == 0 {
            bet.timestamp = now;
        }
        bet.amount += amount;
        self.stats.entry(agent).or_default().bets_placed += 1;
        trace!(%transmitter, %agent, %op_hash, amount, "bet placed");
        Ok(())
    }

    /// Settles an operation: rewards and unlocks the winners, advances
    /// inactivity for the snapshot members that missed it, and charges
    /// the protocol operation fee.
    ///
    /// A failed reward deduction pauses the protocol and skips that
    /// reward, but the surrounding release continues so bets still
    /// unlock.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn release_bets_and_reward(
        &mut self,
        protocol_id: ProtocolId,
        winners: &[Address],
        op_hash: H256,
        now: u64,
        staking: &mut StakingLedger,
        registry: &mut ProtocolRegistry,
        agents: &mut AgentDirectory,
        operations: &mut OperationRegistry,
        outbox: &mut Outbox,
        config: &GlobalConfig,
        events: &mut Vec<Event>,
    ) -> HubResult<()> {
        let Some(info) = self.op_info.get(&op_hash) else {
            return Ok(());
        };
        let bet_type = info.bet_type;
        let first_bet = info.first_bet;

        for winner in winners {
            if registry.is_manual_transmitter(protocol_id, *winner) {
                self.remove_from_snapshot(op_hash, *winner);
                continue;
            }
            let Some(agent) = agents.agent_by_transmitter(*winner) else {
                continue;
            };
            let amount = self
                .bets
                .get(&agent)
                .and_then(|m| m.get(&op_hash))
                .map(|b| b.amount)
                .unwrap_or(0);
            if amount == 0 {
                continue;
            }
            let reward = registry.reward_amount(protocol_id, bet_type, *winner == first_bet);
            if reward > 0 && registry.deduce_fee(protocol_id, reward, events) {
                self.pending_rewards.push((agent, reward));
                self.stats.entry(agent).or_default().rewards_earned += reward;
            }
            staking.unlock_agent_stake(agent, amount)?;
            if let Some(m) = self.bets.get_mut(&agent) {
                m.remove(&op_hash);
            }
            self.inactivity
                .entry(protocol_id)
                .or_default()
                .remove(winner);
            self.remove_from_snapshot(op_hash, *winner);
        }
        if let Some(info) = self.op_info.get_mut(&op_hash) {
            info.processed_at = Some(now);
        }

        // Whoever is still in the snapshot missed this operation.
        let missed: Vec<Address> = self
            .op_info
            .get(&op_hash)
            .map(|i| i.cur_transmitters.clone())
            .unwrap_or_default();
        for transmitter in missed {
            if transmitter.is_zero() || registry.is_manual_transmitter(protocol_id, transmitter) {
                continue;
            }
            let counter = self
                .inactivity
                .entry(protocol_id)
                .or_default()
                .entry(transmitter)
                .or_default();
            *counter += 1;
            if *counter >= config.slashing_border {
                *counter = 0;
                warn!(%transmitter, ?protocol_id, "transmitter hit the slashing border");
                if let Some(agent) = agents.agent_by_transmitter(transmitter) {
                    staking.slash(agent, registry.min_personal_amount(protocol_id), events);
                }
                operations.remove_transmitter(
                    protocol_id,
                    transmitter,
                    registry,
                    agents,
                    outbox,
                    events,
                );
            }
        }

        if !protocol_id.is_gov()
            && config.protocol_operation_fee > 0
            && registry.deduce_fee(protocol_id, config.protocol_operation_fee, events)
        {
            staking.credit_fee(config.protocol_operation_fee);
        }
        debug!(%op_hash, ?protocol_id, "bets released");
        Ok(())
    }

    fn remove_from_snapshot(&mut self, op_hash: H256, transmitter: Address) {
        if let Some(info) = self.op_info.get_mut(&op_hash) {
            info.cur_transmitters.retain(|t| *t != transmitter);
        }
    }

    /// Unlocks a bet without reward. Used when a round rotation evicts a
    /// transmitter from an unapproved operation.
    pub(crate) fn refund_bet(
        &mut self,
        protocol_id: ProtocolId,
        op_hash: H256,
        transmitter: Address,
        staking: &mut StakingLedger,
        registry: &ProtocolRegistry,
        agents: &AgentDirectory,
    ) -> HubResult<()> {
        if registry.is_manual_transmitter(protocol_id, transmitter) {
            return Ok(());
        }
        let Some(agent) = agents.agent_by_transmitter(transmitter) else {
            return Ok(());
        };
        let amount = self
            .bets
            .get(&agent)
            .and_then(|m| m.get(&op_hash))
            .map(|b| b.amount)
            .unwrap_or(0);
        if amount == 0 {
            return Ok(());
        }
        staking.unlock_agent_stake(agent, amount)?;
        if let Some(m) = self.bets.get_mut(&agent) {
            m.remove(&op_hash);
        }
        trace!(%transmitter, %op_hash, amount, "bet refunded");
        Ok(())
    }

    /// Forfeits a bet that sat unresolved past the bet timeout. The
    /// locked amount moves to the system fee.
    pub fn prune_bet(
        &mut self,
        agent: Address,
        op_hash: H256,
        now: u64,
        staking: &mut StakingLedger,
        config: &GlobalConfig,
    ) -> HubResult<()> {
        let bet = self
            .bets
            .get(&agent)
            .and_then(|m| m.get(&op_hash))
            .copied()
            .filter(|b| b.amount > 0)
            .ok_or(HubError::BetNotFound)?;
        if now.saturating_sub(bet.timestamp) < config.bet_timeout {
            return Err(HubError::TimeoutNotElapsed);
        }
        staking.confiscate_locked(agent, bet.amount)?;
        if let Some(m) = self.bets.get_mut(&agent) {
            m.remove(&op_hash);
        }
        debug!(%agent, %op_hash, amount = bet.amount, "bet pruned");
        Ok(())
    }

    /// Takes the rewards registered since the last round turn.
    pub(crate) fn take_pending_rewards(&mut self) -> Vec<(Address, u128)> {
        std::mem::take(&mut self.pending_rewards)
    }
}

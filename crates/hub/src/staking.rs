//! Delegator ledger, per-round reward snapshots, and the personal-stake
//! lifecycle.
//!
//! Agents carry two stakes: delegated stake (the DPoS ledger, summed per
//! delegator) and personal stake (locked against bets, slashed on
//! misbehavior). Reward accounting is round-scoped: at every round turn
//! the ledger snapshots each agent's total delegation, and a delegator's
//! share of a round is proportional to their round-start stake. Stake
//! changes therefore only affect future rounds, which is why every
//! stake-changing entry point claims pending rewards first.
//!
//! The sorted agent directory (descending by total delegation) also lives
//! here and drives transmitter election.

use crate::agents::AgentDirectory;
use crate::events::Event;
use crate::ledger::TokenLedger;
use crate::ordered_list::{Order, OrderedList};
use crate::protocols::ProtocolRegistry;
use crate::{HubError, HubResult};
use photon_config::{GlobalConfig, RATE_DENOMINATOR};
use photon_types::{Address, ProtocolId, RoundId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, trace, warn};

/// Reward bookkeeping for one agent in one round.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundReward {
    /// Reward accrued to the agent itself.
    pub agent_reward: u128,
    /// Reward accrued to the agent's delegators.
    pub delegate_reward: u128,
    /// Total delegation snapshotted at the round start.
    pub total_delegate: u128,
    /// Set when the agent was slashed during the round; the round pays
    /// nothing and later rewards for it go to the system fee.
    pub slashed: bool,
}

/// Per-delegator position with one agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegatorInfo {
    /// Current delegated stake.
    pub stake: u128,
    /// Round of the most recent stake change.
    pub last_stake_unstake_round: RoundId,
    /// First round not yet claimed.
    pub last_claim_round: RoundId,
}

/// Everything the ledger tracks for one agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentInfo {
    /// Agent is in the global approved set.
    pub approved: bool,
    /// Agent opted out of election.
    pub paused: bool,
    /// Total delegated stake, live.
    pub realtime_stake: u128,
    /// Delegated stake snapshotted for the current round.
    pub active_round_stake: u128,
    /// Agent fee rate, live, scaled by 10000.
    pub realtime_fee: u32,
    /// Agent fee rate in force for the current round.
    pub active_fee: u32,
    /// Unlocked personal stake.
    pub personal_stake: u128,
    /// Personal stake locked against open bets.
    pub locked_personal_stake: u128,
    /// Personal stake requested for withdrawal, pending the round turn.
    pub withdraw_requested: u128,
    /// Personal stake released and withdrawable now.
    pub withdraw_ready: u128,
    /// First round whose agent reward is unclaimed.
    pub last_claim_round: RoundId,
    /// Most recent round the agent was slashed in.
    pub last_slash_round: RoundId,
    pub(crate) rewards: BTreeMap<RoundId, RoundReward>,
    pub(crate) delegators: HashMap<Address, DelegatorInfo>,
}

impl AgentInfo {
    /// Reward record for a round, if any reward or snapshot was written.
    pub fn round_reward(&self, round: RoundId) -> Option<&RoundReward> {
        self.rewards.get(&round)
    }

    /// Position of a delegator with this agent, if any.
    pub fn delegator(&self, delegator: Address) -> Option<&DelegatorInfo> {
        self.delegators.get(&delegator)
    }
}

/// The delegator↔agent DPoS ledger and personal-stake book.
#[derive(Debug, Serialize, Deserialize)]
pub struct StakingLedger {
    round: RoundId,
    agents: HashMap<Address, AgentInfo>,
    directory: OrderedList,
    accumulated_fee: u128,
    reward_collectors: HashMap<Address, HashMap<Address, Address>>,
}

impl Default for StakingLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl StakingLedger {
    /// Creates an empty ledger at round 1.
    pub fn new() -> Self {
        Self {
            round: 1,
            agents: HashMap::new(),
            directory: OrderedList::new(Order::Descending),
            accumulated_fee: 0,
            reward_collectors: HashMap::new(),
        }
    }

    /// The current round.
    pub fn round(&self) -> RoundId {
        self.round
    }

    /// System fee accrued and not yet withdrawn.
    pub fn accumulated_fee(&self) -> u128 {
        self.accumulated_fee
    }

    /// Looks up an agent.
    pub fn agent(&self, agent: Address) -> Option<&AgentInfo> {
        self.agents.get(&agent)
    }

    /// The sorted agent directory, descending by total delegation.
    pub fn directory(&self) -> &OrderedList {
        &self.directory
    }

    /// Admits an agent to the global set. Re-admitting an existing agent
    /// restores its approved flag and keeps its book.
    pub(crate) fn register_agent(&mut self, agent: Address) -> HubResult<()> {
        if agent.is_zero() {
            return Err(HubError::ZeroAddress);
        }
        let info = self.agents.entry(agent).or_default();
        info.approved = true;
        self.directory.set(agent.as_bytes(), info.realtime_stake);
        debug!(%agent, "agent registered");
        Ok(())
    }

    fn agent_mut(&mut self, agent: Address) -> HubResult<&mut AgentInfo> {
        self.agents
            .get_mut(&agent)
            .ok_or(HubError::AgentNotFound(agent))
    }

    // --- Delegation ---

    /// Delegates `amount` to `agent` on behalf of `delegator`.
    ///
    /// Pending rewards for the pair are claimed first so the old share is
    /// settled before the stake changes.
    pub fn delegate(
        &mut self,
        delegator: Address,
        agent: Address,
        amount: u128,
        ledger: &mut dyn TokenLedger,
        events: &mut Vec<Event>,
    ) -> HubResult<()> {
        if amount == 0 {
            return Err(HubError::ZeroAmount);
        }
        let info = self.agents.get(&agent).ok_or(HubError::AgentNotFound(agent))?;
        if !info.approved {
            return Err(HubError::AgentNotActive(agent));
        }
        if !ledger.transfer_in(delegator, amount) {
            return Err(HubError::InsufficientFunds);
        }
        self.claim_internal(delegator, agent, ledger, events);
        self.apply_delegation(delegator, agent, amount);
        events.push(Event::Delegate {
            delegator,
            agent,
            amount,
        });
        Ok(())
    }

    /// Withdraws `amount` of delegated stake back to `delegator`.
    pub fn withdraw(
        &mut self,
        delegator: Address,
        agent: Address,
        amount: u128,
        ledger: &mut dyn TokenLedger,
        events: &mut Vec<Event>,
    ) -> HubResult<()> {
        if amount == 0 {
            return Err(HubError::ZeroAmount);
        }
        let info = self.agents.get(&agent).ok_or(HubError::AgentNotFound(agent))?;
        let staked = info
            .delegators
            .get(&delegator)
            .map(|d| d.stake)
            .unwrap_or(0);
        if staked < amount {
            return Err(HubError::InsufficientStake);
        }
        self.claim_internal(delegator, agent, ledger, events);
        self.apply_withdrawal(delegator, agent, amount);
        ledger.transfer_out(delegator, amount);
        events.push(Event::Withdraw {
            delegator,
            agent,
            amount,
        });
        Ok(())
    }

    /// Moves `amount` of delegated stake from one agent to another without
    /// touching the token ledger balance.
    pub fn redelegate(
        &mut self,
        delegator: Address,
        from: Address,
        to: Address,
        amount: u128,
        ledger: &mut dyn TokenLedger,
        events: &mut Vec<Event>,
    ) -> HubResult<()> {
        if amount == 0 {
            return Err(HubError::ZeroAmount);
        }
        let source = self.agents.get(&from).ok_or(HubError::AgentNotFound(from))?;
        let staked = source
            .delegators
            .get(&delegator)
            .map(|d| d.stake)
            .unwrap_or(0);
        if staked < amount {
            return Err(HubError::InsufficientStake);
        }
        let target = self.agents.get(&to).ok_or(HubError::AgentNotFound(to))?;
        if !target.approved {
            return Err(HubError::AgentNotActive(to));
        }
        self.claim_internal(delegator, from, ledger, events);
        self.claim_internal(delegator, to, ledger, events);
        self.apply_withdrawal(delegator, from, amount);
        self.apply_delegation(delegator, to, amount);
        events.push(Event::Redelegate {
            delegator,
            from,
            to,
            amount,
        });
        Ok(())
    }

    fn apply_delegation(&mut self, delegator: Address, agent: Address, amount: u128) {
        let round = self.round;
        let info = self.agents.get_mut(&agent).expect("agent checked");
        let d = info.delegators.entry(delegator).or_insert(DelegatorInfo {
            stake: 0,
            last_stake_unstake_round: round,
            last_claim_round: round,
        });
        d.stake += amount;
        d.last_stake_unstake_round = round;
        info.realtime_stake += amount;
        self.directory.set(agent.as_bytes(), info.realtime_stake);
    }

    fn apply_withdrawal(&mut self, delegator: Address, agent: Address, amount: u128) {
        let round = self.round;
        let info = self.agents.get_mut(&agent).expect("agent checked");
        let d = info.delegators.get_mut(&delegator).expect("stake checked");
        d.stake -= amount;
        d.last_stake_unstake_round = round;
        info.realtime_stake -= amount;
        self.directory.set(agent.as_bytes(), info.realtime_stake);
    }

    // --- Rewards ---

    /// Sets the address delegator rewards for `(delegator, agent)` are
    /// paid to instead of the delegator.
    pub fn set_reward_collector(&mut self, delegator: Address, agent: Address, collector: Address) {
        self.reward_collectors
            .entry(delegator)
            .or_default()
            .insert(agent, collector);
    }

    /// Claims all pending delegator rewards for `(delegator, agent)`.
    pub fn claim_rewards(
        &mut self,
        delegator: Address,
        agent: Address,
        ledger: &mut dyn TokenLedger,
        events: &mut Vec<Event>,
    ) -> HubResult<()> {
        if !self.agents.contains_key(&agent) {
            return Err(HubError::AgentNotFound(agent));
        }
        self.claim_internal(delegator, agent, ledger, events);
        Ok(())
    }

    /// Accrues pending rounds and pays out. Rounds marked slashed or with
    /// a zero denominator contribute nothing, and only rounds strictly
    /// after the delegator's last stake change count: the denominator was
    /// snapshotted at the round start, so the stake of a mid-round joiner
    /// is not in it.
    fn claim_internal(
        &mut self,
        delegator: Address,
        agent: Address,
        ledger: &mut dyn TokenLedger,
        events: &mut Vec<Event>,
    ) {
        let round = self.round;
        let Some(info) = self.agents.get_mut(&agent) else {
            return;
        };
        let Some(d) = info.delegators.get_mut(&delegator) else {
            return;
        };
        let mut total: u128 = 0;
        for r in d.last_claim_round..round {
            if r <= d.last_stake_unstake_round {
                continue;
            }
            if let Some(rr) = info.rewards.get(&r) {
                if !rr.slashed && rr.total_delegate > 0 && rr.delegate_reward > 0 {
                    total += rr.delegate_reward * d.stake / rr.total_delegate;
                }
            }
        }
        d.last_claim_round = round;
        if total > 0 {
            let recipient = self
                .reward_collectors
                .get(&delegator)
                .and_then(|m| m.get(&agent))
                .copied()
                .unwrap_or(delegator);
            ledger.transfer_out(recipient, total);
            events.push(Event::RewardClaimed {
                delegator,
                agent,
                amount: total,
            });
            trace!(%delegator, %agent, amount = total, "delegator rewards claimed");
        }
    }

    /// Claims the agent's own accumulated per-round reward.
    pub fn claim_agent_reward(
        &mut self,
        agent: Address,
        ledger: &mut dyn TokenLedger,
        events: &mut Vec<Event>,
    ) -> HubResult<()> {
        let round = self.round;
        let info = self.agent_mut(agent)?;
        let mut total: u128 = 0;
        for r in info.last_claim_round..round {
            if let Some(rr) = info.rewards.get(&r) {
                if !rr.slashed {
                    total += rr.agent_reward;
                }
            }
        }
        info.last_claim_round = round;
        if total > 0 {
            ledger.transfer_out(agent, total);
            events.push(Event::AgentRewardClaimed {
                agent,
                amount: total,
            });
        }
        Ok(())
    }

    /// Credits the round's reward book from the bet engine's payout list.
    ///
    /// Runs before the round turn so round-N rewards land on round-N
    /// snapshots. Slashed agents forfeit to the system fee; otherwise the
    /// system skims `agent_reward_fee` and the remainder splits by the
    /// agent's active fee rate.
    pub(crate) fn distribute_rewards(
        &mut self,
        rewards: Vec<(Address, u128)>,
        config: &GlobalConfig,
    ) {
        let round = self.round;
        for (agent, amount) in rewards {
            let Some(info) = self.agents.get_mut(&agent) else {
                self.accumulated_fee += amount;
                continue;
            };
            let rr = info.rewards.entry(round).or_default();
            if rr.slashed {
                self.accumulated_fee += amount;
                continue;
            }
            let system_cut = amount * u128::from(config.agent_reward_fee)
                / u128::from(RATE_DENOMINATOR);
            let remainder = amount - system_cut;
            let agent_cut = remainder * u128::from(info.active_fee) / u128::from(RATE_DENOMINATOR);
            rr.agent_reward += agent_cut;
            rr.delegate_reward += remainder - agent_cut;
            self.accumulated_fee += system_cut;
            trace!(%agent, amount, agent_cut, "reward distributed");
        }
    }

    // --- Personal stake ---

    /// Deposits personal stake for an agent.
    pub fn deposit_personal_stake(
        &mut self,
        agent: Address,
        amount: u128,
        ledger: &mut dyn TokenLedger,
        events: &mut Vec<Event>,
    ) -> HubResult<()> {
        if amount == 0 {
            return Err(HubError::ZeroAmount);
        }
        let info = self.agents.get(&agent).ok_or(HubError::AgentNotFound(agent))?;
        if !info.approved {
            return Err(HubError::NotApprovedAgent(agent));
        }
        if !ledger.transfer_in(agent, amount) {
            return Err(HubError::InsufficientFunds);
        }
        self.agents.get_mut(&agent).expect("checked").personal_stake += amount;
        events.push(Event::DepositPersonalStake { agent, amount });
        Ok(())
    }

    /// Requests withdrawal of personal stake; processed at the next round
    /// turn up to the then-unlocked amount.
    pub fn request_withdraw_personal_stake(
        &mut self,
        agent: Address,
        amount: u128,
        events: &mut Vec<Event>,
    ) -> HubResult<()> {
        if amount == 0 {
            return Err(HubError::ZeroAmount);
        }
        let info = self.agent_mut(agent)?;
        if info.withdraw_requested + amount > info.personal_stake + info.locked_personal_stake {
            return Err(HubError::TryingToWithdrawTooMuch);
        }
        info.withdraw_requested += amount;
        events.push(Event::RequestWithdrawPersonalStake { agent, amount });
        Ok(())
    }

    /// Cancels a pending personal-stake withdrawal request.
    pub fn cancel_withdraw_personal_stake(
        &mut self,
        agent: Address,
        events: &mut Vec<Event>,
    ) -> HubResult<()> {
        let info = self.agent_mut(agent)?;
        if info.withdraw_requested == 0 {
            return Err(HubError::NoWithdrawRequested);
        }
        let amount = info.withdraw_requested;
        info.withdraw_requested = 0;
        events.push(Event::CancelWithdrawPersonalStake { agent, amount });
        Ok(())
    }

    /// Withdraws personal stake released by a previous round turn.
    pub fn withdraw_personal_stake(
        &mut self,
        agent: Address,
        ledger: &mut dyn TokenLedger,
        events: &mut Vec<Event>,
    ) -> HubResult<()> {
        let info = self.agent_mut(agent)?;
        if info.withdraw_ready == 0 {
            return Err(HubError::NoWithdrawRequested);
        }
        let amount = info.withdraw_ready;
        info.withdraw_ready = 0;
        ledger.transfer_out(agent, amount);
        events.push(Event::WithdrawPersonalStake { agent, amount });
        Ok(())
    }

    /// Sets the agent's fee rate, effective from the next round.
    pub fn set_agent_fee(
        &mut self,
        agent: Address,
        fee: u32,
        events: &mut Vec<Event>,
    ) -> HubResult<()> {
        if fee > RATE_DENOMINATOR {
            return Err(HubError::InvalidFeeRate(fee));
        }
        let info = self.agent_mut(agent)?;
        info.realtime_fee = fee;
        events.push(Event::UpdateFee { agent, fee });
        Ok(())
    }

    /// Pauses or unpauses the agent for election purposes.
    pub fn set_agent_paused(&mut self, agent: Address, paused: bool) -> HubResult<()> {
        self.agent_mut(agent)?.paused = paused;
        Ok(())
    }

    /// Locks personal stake against a bet. Bet-engine capability.
    pub(crate) fn lock_agent_stake(&mut self, agent: Address, amount: u128) -> HubResult<()> {
        let info = self.agent_mut(agent)?;
        if info.personal_stake < amount {
            return Err(HubError::InsufficientPersonalStake);
        }
        info.personal_stake -= amount;
        info.locked_personal_stake += amount;
        Ok(())
    }

    /// Releases locked personal stake. Bet-engine capability.
    pub(crate) fn unlock_agent_stake(&mut self, agent: Address, amount: u128) -> HubResult<()> {
        let info = self.agent_mut(agent)?;
        if info.locked_personal_stake < amount {
            return Err(HubError::UnlockTooMuch);
        }
        info.locked_personal_stake -= amount;
        info.personal_stake += amount;
        Ok(())
    }

    /// Moves locked stake straight to the system fee. Used when a bet is
    /// pruned after its timeout.
    pub(crate) fn confiscate_locked(&mut self, agent: Address, amount: u128) -> HubResult<()> {
        let info = self.agent_mut(agent)?;
        if info.locked_personal_stake < amount {
            return Err(HubError::UnlockTooMuch);
        }
        info.locked_personal_stake -= amount;
        self.accumulated_fee += amount;
        Ok(())
    }

    /// Moves up to `amount` of unlocked personal stake to the system fee
    /// and marks the current round slashed for the agent.
    pub(crate) fn slash(&mut self, agent: Address, amount: u128, events: &mut Vec<Event>) {
        let round = self.round;
        let Some(info) = self.agents.get_mut(&agent) else {
            return;
        };
        let take = amount.min(info.personal_stake);
        info.personal_stake -= take;
        info.rewards.entry(round).or_default().slashed = true;
        info.last_slash_round = round;
        self.accumulated_fee += take;
        warn!(%agent, amount = take, round, "agent slashed");
        events.push(Event::Slashed {
            agent,
            amount: take,
            round,
        });
    }

    /// Removes an agent from the approved set, slashes its full personal
    /// stake, and sinks it in the directory.
    pub(crate) fn ban(&mut self, agent: Address, events: &mut Vec<Event>) -> HubResult<()> {
        let info = self.agent_mut(agent)?;
        info.approved = false;
        let stake = info.personal_stake;
        self.slash(agent, stake, events);
        self.directory.set(agent.as_bytes(), 0);
        Ok(())
    }

    /// Withdraws the accumulated system fee to the fee collector.
    pub fn withdraw_accumulated_fee(
        &mut self,
        caller: Address,
        config: &GlobalConfig,
        ledger: &mut dyn TokenLedger,
    ) -> HubResult<u128> {
        if caller != config.fee_collector {
            return Err(HubError::IsNotFeeCollector(caller));
        }
        let amount = self.accumulated_fee;
        self.accumulated_fee = 0;
        ledger.transfer_out(caller, amount);
        Ok(amount)
    }

    /// Adds to the accumulated system fee.
    pub(crate) fn credit_fee(&mut self, amount: u128) {
        self.accumulated_fee += amount;
    }

    // --- Round turn ---

    /// Promotes realtime values to active, releases processed withdraw
    /// requests, advances the round, and snapshots the new round's
    /// delegation denominators.
    pub(crate) fn turn_round(&mut self) {
        for info in self.agents.values_mut() {
            info.active_round_stake = info.realtime_stake;
            info.active_fee = info.realtime_fee;
            if info.withdraw_requested > 0 {
                let take = info.withdraw_requested.min(info.personal_stake);
                info.personal_stake -= take;
                info.withdraw_ready += take;
                info.withdraw_requested = 0;
            }
        }
        self.round += 1;
        let round = self.round;
        for info in self.agents.values_mut() {
            info.rewards.entry(round).or_default().total_delegate = info.realtime_stake;
        }
        debug!(round, "staking round turned");
    }

    // --- Transmitter election ---

    /// Elects the transmitter set for a protocol.
    ///
    /// Manual transmitters come first, verbatim and in order; the gov
    /// protocol gets manuals only. Remaining seats fill with eligible
    /// agents' transmitters in current directory order (descending total
    /// delegation, earliest-inserted first within ties), which makes the
    /// election idempotent for an unchanged directory.
    pub fn select_transmitters_for_protocol(
        &self,
        protocol_id: ProtocolId,
        registry: &ProtocolRegistry,
        agents: &AgentDirectory,
    ) -> Vec<Address> {
        let Some(info) = registry.protocol(protocol_id) else {
            return Vec::new();
        };
        let mut elected = info.manual_transmitters.clone();
        if protocol_id.is_gov() {
            return elected;
        }
        let params = &info.active_params;
        let max = params.max_transmitters as usize;
        for (key, _) in self.directory.iter() {
            if elected.len() >= max {
                break;
            }
            let Ok(agent_addr) = Address::from_slice(key) else {
                continue;
            };
            let Some(agent) = self.agents.get(&agent_addr) else {
                continue;
            };
            let Some(transmitter) = agents.transmitter_of(agent_addr, protocol_id) else {
                continue;
            };
            let eligible = agent.approved
                && !agent.paused
                && agent.active_round_stake >= params.min_delegate_amount
                && agent.personal_stake >= params.min_personal_amount;
            if eligible && !elected.contains(&transmitter) {
                elected.push(transmitter);
            }
        }
        elected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::InMemoryLedger;

    fn addr(b: u8) -> Address {
        Address::new([b; 20])
    }

    fn setup() -> (StakingLedger, InMemoryLedger, Vec<Event>) {
        let mut staking = StakingLedger::new();
        staking.register_agent(addr(1)).unwrap();
        let mut ledger = InMemoryLedger::new();
        ledger.mint(addr(10), 1_000_000);
        ledger.mint(addr(1), 1_000_000);
        (staking, ledger, Vec::new())
    }

    #[test]
    fn test_delegate_updates_stake_and_directory() {
        let (mut staking, mut ledger, mut events) = setup();
        staking
            .delegate(addr(10), addr(1), 500, &mut ledger, &mut events)
            .unwrap();
        let agent = staking.agent(addr(1)).unwrap();
        assert_eq!(agent.realtime_stake, 500);
        assert_eq!(agent.delegator(addr(10)).unwrap().stake, 500);
        assert_eq!(staking.directory().value_of(addr(1).as_bytes()), Some(500));
    }

    #[test]
    fn test_delegate_rejects_zero_and_unknown() {
        let (mut staking, mut ledger, mut events) = setup();
        assert!(matches!(
            staking.delegate(addr(10), addr(1), 0, &mut ledger, &mut events),
            Err(HubError::ZeroAmount)
        ));
        assert!(matches!(
            staking.delegate(addr(10), addr(9), 5, &mut ledger, &mut events),
            Err(HubError::AgentNotFound(_))
        ));
    }

    #[test]
    fn test_withdraw_insufficient_stake() {
        let (mut staking, mut ledger, mut events) = setup();
        staking
            .delegate(addr(10), addr(1), 100, &mut ledger, &mut events)
            .unwrap();
        assert!(matches!(
            staking.withdraw(addr(10), addr(1), 101, &mut ledger, &mut events),
            Err(HubError::InsufficientStake)
        ));
    }

    #[test]
    fn test_reward_accrual_over_rounds() {
        let (mut staking, mut ledger, mut events) = setup();
        let config = GlobalConfig {
            agent_reward_fee: 1000, // 10% system cut
            ..Default::default()
        };
        staking
            .delegate(addr(10), addr(1), 1000, &mut ledger, &mut events)
            .unwrap();
        // Enter round 2 so the snapshot covers the delegation.
        staking.turn_round();
        // Reward lands in round 2, agent fee 0 => everything to delegators
        // minus the system cut.
        staking.distribute_rewards(vec![(addr(1), 100)], &config);
        staking.turn_round();

        let before = ledger.balance_of(addr(10));
        staking
            .claim_rewards(addr(10), addr(1), &mut ledger, &mut events)
            .unwrap();
        assert_eq!(ledger.balance_of(addr(10)) - before, 90);
        assert_eq!(staking.accumulated_fee(), 10);

        // A second claim pays nothing.
        let before = ledger.balance_of(addr(10));
        staking
            .claim_rewards(addr(10), addr(1), &mut ledger, &mut events)
            .unwrap();
        assert_eq!(ledger.balance_of(addr(10)), before);
    }

    #[test]
    fn test_agent_fee_split() {
        let (mut staking, mut ledger, mut events) = setup();
        let config = GlobalConfig {
            agent_reward_fee: 0,
            ..Default::default()
        };
        staking.set_agent_fee(addr(1), 2000, &mut events).unwrap(); // 20%
        staking
            .delegate(addr(10), addr(1), 1000, &mut ledger, &mut events)
            .unwrap();
        staking.turn_round(); // active_fee becomes 2000
        staking.distribute_rewards(vec![(addr(1), 100)], &config);
        let rr = staking.agent(addr(1)).unwrap().round_reward(2).unwrap();
        assert_eq!(rr.agent_reward, 20);
        assert_eq!(rr.delegate_reward, 80);
    }

    #[test]
    fn test_slashed_round_pays_system() {
        let (mut staking, mut ledger, mut events) = setup();
        let config = GlobalConfig::default();
        staking
            .delegate(addr(10), addr(1), 1000, &mut ledger, &mut events)
            .unwrap();
        staking.turn_round();
        staking.slash(addr(1), 0, &mut events);
        staking.distribute_rewards(vec![(addr(1), 100)], &config);
        let rr = staking.agent(addr(1)).unwrap().round_reward(2).unwrap();
        assert!(rr.slashed);
        assert_eq!(rr.delegate_reward, 0);
        assert_eq!(staking.accumulated_fee(), 100);
    }

    #[test]
    fn test_personal_stake_lifecycle() {
        let (mut staking, mut ledger, mut events) = setup();
        staking
            .deposit_personal_stake(addr(1), 300, &mut ledger, &mut events)
            .unwrap();
        staking.lock_agent_stake(addr(1), 100).unwrap();
        assert!(matches!(
            staking.lock_agent_stake(addr(1), 300),
            Err(HubError::InsufficientPersonalStake)
        ));

        staking
            .request_withdraw_personal_stake(addr(1), 250, &mut events)
            .unwrap();
        assert!(matches!(
            staking.request_withdraw_personal_stake(addr(1), 100, &mut events),
            Err(HubError::TryingToWithdrawTooMuch)
        ));

        // Only the unlocked 200 can be released at the turn.
        staking.turn_round();
        let agent = staking.agent(addr(1)).unwrap();
        assert_eq!(agent.withdraw_ready, 200);
        assert_eq!(agent.personal_stake, 0);
        assert_eq!(agent.withdraw_requested, 0);

        staking.unlock_agent_stake(addr(1), 100).unwrap();
        let before = ledger.balance_of(addr(1));
        staking
            .withdraw_personal_stake(addr(1), &mut ledger, &mut events)
            .unwrap();
        assert_eq!(ledger.balance_of(addr(1)) - before, 200);
        assert!(matches!(
            events.last(),
            Some(Event::WithdrawPersonalStake { amount: 200, .. })
        ));
    }

    #[test]
    fn test_cancel_withdraw_emits_dedicated_event() {
        let (mut staking, mut ledger, mut events) = setup();
        staking
            .deposit_personal_stake(addr(1), 100, &mut ledger, &mut events)
            .unwrap();
        staking
            .request_withdraw_personal_stake(addr(1), 50, &mut events)
            .unwrap();
        staking.cancel_withdraw_personal_stake(addr(1), &mut events).unwrap();
        assert!(matches!(
            events.last(),
            Some(Event::CancelWithdrawPersonalStake { amount: 50, .. })
        ));
        assert!(matches!(
            staking.cancel_withdraw_personal_stake(addr(1), &mut events),
            Err(HubError::NoWithdrawRequested)
        ));
    }

    #[test]
    fn test_turn_round_promotes_snapshots() {
        let (mut staking, mut ledger, mut events) = setup();
        staking
            .delegate(addr(10), addr(1), 700, &mut ledger, &mut events)
            .unwrap();
        staking.set_agent_fee(addr(1), 500, &mut events).unwrap();
        assert_eq!(staking.agent(addr(1)).unwrap().active_round_stake, 0);
        staking.turn_round();
        let agent = staking.agent(addr(1)).unwrap();
        assert_eq!(agent.active_round_stake, 700);
        assert_eq!(agent.active_fee, 500);
        assert_eq!(agent.round_reward(2).unwrap().total_delegate, 700);
    }

    #[test]
    fn test_ban_slashes_and_sinks() {
        let (mut staking, mut ledger, mut events) = setup();
        staking
            .deposit_personal_stake(addr(1), 400, &mut ledger, &mut events)
            .unwrap();
        staking.ban(addr(1), &mut events).unwrap();
        let agent = staking.agent(addr(1)).unwrap();
        assert!(!agent.approved);
        assert_eq!(agent.personal_stake, 0);
        assert_eq!(staking.accumulated_fee(), 400);
        assert_eq!(staking.directory().value_of(addr(1).as_bytes()), Some(0));
    }

    #[test]
    fn test_fee_withdrawal_requires_collector() {
        let (mut staking, mut ledger, _events) = setup();
        staking.credit_fee(55);
        let config = GlobalConfig {
            fee_collector: addr(7),
            ..Default::default()
        };
        assert!(matches!(
            staking.withdraw_accumulated_fee(addr(8), &config, &mut ledger),
            Err(HubError::IsNotFeeCollector(_))
        ));
        let taken = staking
            .withdraw_accumulated_fee(addr(7), &config, &mut ledger)
            .unwrap();
        assert_eq!(taken, 55);
        assert_eq!(staking.accumulated_fee(), 0);
    }
}

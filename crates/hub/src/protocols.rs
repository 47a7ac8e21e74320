//! Per-protocol admission, parameters, balance, and chain init state.
//!
//! Every protocol carries two parameter sets: `realtime_params` the owner
//! may change at any time, and `active_params` the engine reads during
//! the current round. The two are reconciled at the round turn, which is
//! also where consensus-rate changes propagate to every chain the
//! protocol lives on.
//!
//! Per (protocol, chain) there is a three-state init machine:
//!
//! ```text
//! NotInited --first address add--> OnInition --endpoint ack--> Inited
//! ```
//!
//! While `OnInition`, address additions and transmitter updates queue;
//! the ack flushes the queues in order (protocol addresses, proposers,
//! transmitters filtered to the currently-allowed set).

use crate::endpoint::Outbox;
use crate::events::Event;
use crate::ledger::TokenLedger;
use crate::staking::StakingLedger;
use crate::{BetType, HubError, HubResult};
use photon_config::{GlobalConfig, RATE_DENOMINATOR};
use photon_types::{Address, ChainId, GovMessage, OpaqueAddr, ProtocolId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// Lowest exclusive bound for consensus target rates.
pub const MIN_CONSENSUS_RATE: u32 = 5_500;

/// Init progress of a protocol on one chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InitState {
    /// No presence on the chain yet.
    #[default]
    NotInited,
    /// Admission proposed; waiting for the endpoint acknowledgement.
    OnInition,
    /// Admitted; changes propagate directly.
    Inited,
}

/// Owner-settable protocol parameters.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProtocolParams {
    /// Stake locked per message bet.
    pub msg_bet_amount: u128,
    /// Stake locked per data bet.
    pub data_bet_amount: u128,
    /// Reward for a follow message bet.
    pub msg_bet_reward: u128,
    /// Reward for the first message bet.
    pub msg_bet_first_reward: u128,
    /// Reward for a follow data bet.
    pub data_bet_reward: u128,
    /// Reward for the first data bet.
    pub data_bet_first_reward: u128,
    /// Share of transmitters whose proofs approve an operation, scaled by
    /// 10000. Valid range (5500, 10000].
    pub consensus_target_rate: u32,
    /// Minimum delegated stake for an agent to be electable.
    pub min_delegate_amount: u128,
    /// Minimum personal stake for an agent to be electable; also the
    /// inactivity slashing quantum.
    pub min_personal_amount: u128,
    /// Transmitter seat count.
    pub max_transmitters: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct ChainState {
    pub(crate) init: InitState,
    pub(crate) allowed_protocol_addrs: Vec<OpaqueAddr>,
    pub(crate) allowed_proposers: Vec<OpaqueAddr>,
    pub(crate) executors: Vec<OpaqueAddr>,
    pending_protocol_addrs: Vec<OpaqueAddr>,
    pending_proposers: Vec<OpaqueAddr>,
    pending_transmitters: Vec<Address>,
}

/// Everything the registry tracks for one protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolInfo {
    /// Protocol owner; holds the per-protocol capability.
    pub owner: Address,
    /// Parameters the owner last set.
    pub realtime_params: ProtocolParams,
    /// Parameters in force for the current round.
    pub active_params: ProtocolParams,
    /// Balance fees and rewards are paid from.
    pub balance: u128,
    /// Lifetime total deducted from the balance.
    pub fee: u128,
    /// Statically enrolled transmitters, first in every election.
    pub manual_transmitters: Vec<Address>,
    /// Cleared by the owner to wind the protocol down.
    pub active: bool,
    /// Set when the protocol can no longer pay its way.
    pub paused: bool,
    pub(crate) chains: HashMap<ChainId, ChainState>,
    pub(crate) chain_ids: Vec<ChainId>,
}

impl ProtocolInfo {
    /// Chains the protocol is inited or initing on, in admission order.
    pub fn chain_ids(&self) -> &[ChainId] {
        &self.chain_ids
    }

    /// Init state on a chain.
    pub fn init_state(&self, chain_id: ChainId) -> InitState {
        self.chains
            .get(&chain_id)
            .map(|c| c.init)
            .unwrap_or_default()
    }
}

/// The protocol admission registry.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ProtocolRegistry {
    protocols: HashMap<ProtocolId, ProtocolInfo>,
    protocol_ids: Vec<ProtocolId>,
    manual_claimed: HashMap<Address, ProtocolId>,
    unlocked_balance: HashMap<Address, u128>,
    gov_addresses: HashMap<ChainId, OpaqueAddr>,
    approved_developers: HashSet<Address>,
}

impl ProtocolRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a protocol.
    pub fn protocol(&self, protocol_id: ProtocolId) -> Option<&ProtocolInfo> {
        self.protocols.get(&protocol_id)
    }

    /// All registered protocol ids in registration order.
    pub fn protocol_ids(&self) -> &[ProtocolId] {
        &self.protocol_ids
    }

    /// Ids of protocols still marked active.
    pub fn active_protocol_ids(&self) -> Vec<ProtocolId> {
        self.protocol_ids
            .iter()
            .filter(|id| self.protocols[id].active)
            .copied()
            .collect()
    }

    /// Unclaimed balance returned to an owner by protocol wind-down.
    pub fn unlocked_balance_of(&self, owner: Address) -> u128 {
        self.unlocked_balance.get(&owner).copied().unwrap_or(0)
    }

    /// Grants the external-developer capability.
    pub(crate) fn approve_developer(&mut self, developer: Address) {
        self.approved_developers.insert(developer);
    }

    /// The gov contract address known for a chain.
    pub fn gov_address(&self, chain_id: ChainId) -> Option<&OpaqueAddr> {
        self.gov_addresses.get(&chain_id)
    }

    /// Records the gov contract address for a chain.
    pub(crate) fn set_gov_address(&mut self, chain_id: ChainId, addr: OpaqueAddr) {
        self.gov_addresses.insert(chain_id, addr);
    }

    fn protocol_mut(&mut self, protocol_id: ProtocolId) -> HubResult<&mut ProtocolInfo> {
        self.protocols
            .get_mut(&protocol_id)
            .ok_or(HubError::ProtocolIsNotInited(protocol_id))
    }

    /// Checks the protocol-owner capability.
    pub fn ensure_owner(&self, protocol_id: ProtocolId, caller: Address) -> HubResult<()> {
        let info = self
            .protocol(protocol_id)
            .ok_or(HubError::ProtocolIsNotInited(protocol_id))?;
        if info.owner != caller {
            return Err(HubError::IsNotOwner(caller));
        }
        Ok(())
    }

    // --- Registration and parameters ---

    /// Registers a new protocol owned by the caller.
    pub fn register_protocol(
        &mut self,
        caller: Address,
        protocol_id: ProtocolId,
        params: ProtocolParams,
        manual_transmitters: Vec<Address>,
        staking: &mut StakingLedger,
        ledger: &mut dyn TokenLedger,
        config: &GlobalConfig,
        events: &mut Vec<Event>,
    ) -> HubResult<()> {
        if !self.approved_developers.contains(&caller) {
            return Err(HubError::IsNotApprovedDeveloper(caller));
        }
        if protocol_id.is_zero() || self.protocols.contains_key(&protocol_id) {
            return Err(HubError::InvalidProtocolId(protocol_id));
        }
        self.validate_manual_list(protocol_id, &manual_transmitters)?;
        validate_params(protocol_id, &params, manual_transmitters.len(), config)?;
        if config.protocol_register_fee > 0 {
            if !ledger.transfer_in(caller, config.protocol_register_fee) {
                return Err(HubError::InsufficientFunds);
            }
            staking.credit_fee(config.protocol_register_fee);
        }
        for t in &manual_transmitters {
            self.manual_claimed.insert(*t, protocol_id);
        }
        self.protocols.insert(
            protocol_id,
            ProtocolInfo {
                owner: caller,
                realtime_params: params.clone(),
                active_params: params,
                balance: 0,
                fee: 0,
                manual_transmitters,
                active: true,
                paused: false,
                chains: HashMap::new(),
                chain_ids: Vec::new(),
            },
        );
        self.protocol_ids.push(protocol_id);
        info!(?protocol_id, owner = %caller, "protocol registered");
        events.push(Event::AddAllowedProtocol {
            protocol_id,
            owner: caller,
        });
        Ok(())
    }

    /// Tops up a protocol balance from the caller's token balance.
    pub fn deposit_protocol_balance(
        &mut self,
        caller: Address,
        protocol_id: ProtocolId,
        amount: u128,
        ledger: &mut dyn TokenLedger,
    ) -> HubResult<()> {
        if amount == 0 {
            return Err(HubError::ZeroAmount);
        }
        if !self.protocols.contains_key(&protocol_id) {
            return Err(HubError::ProtocolIsNotInited(protocol_id));
        }
        if !ledger.transfer_in(caller, amount) {
            return Err(HubError::InsufficientFunds);
        }
        self.protocols.get_mut(&protocol_id).expect("checked").balance += amount;
        Ok(())
    }

    /// Replaces the realtime parameters, charging the change fee from the
    /// protocol balance. The new values take effect at the round turn.
    pub fn set_protocol_params(
        &mut self,
        caller: Address,
        protocol_id: ProtocolId,
        params: ProtocolParams,
        staking: &mut StakingLedger,
        config: &GlobalConfig,
    ) -> HubResult<()> {
        self.ensure_owner(protocol_id, caller)?;
        let manual_count = self.protocols[&protocol_id].manual_transmitters.len();
        validate_params(protocol_id, &params, manual_count, config)?;
        let fee = config.change_protocol_params_fee;
        let info = self.protocol_mut(protocol_id)?;
        if !protocol_id.is_gov() && fee > 0 {
            if info.balance < fee {
                return Err(HubError::InsufficientFunds);
            }
            info.balance -= fee;
            info.fee += fee;
            staking.credit_fee(fee);
        }
        info.realtime_params = params;
        Ok(())
    }

    /// Replaces the manual transmitter list atomically, charging the
    /// manual-transmitter fee for each newly added address.
    pub fn set_manual_transmitters(
        &mut self,
        caller: Address,
        protocol_id: ProtocolId,
        transmitters: Vec<Address>,
        staking: &mut StakingLedger,
        config: &GlobalConfig,
    ) -> HubResult<()> {
        self.ensure_owner(protocol_id, caller)?;
        self.validate_manual_list(protocol_id, &transmitters)?;
        let info = &self.protocols[&protocol_id];
        validate_params(protocol_id, &info.realtime_params, transmitters.len(), config)?;
        validate_params(protocol_id, &info.active_params, transmitters.len(), config)?;

        let added: Vec<Address> = transmitters
            .iter()
            .filter(|t| !info.manual_transmitters.contains(t))
            .copied()
            .collect();
        let total_fee = if protocol_id.is_gov() {
            0
        } else {
            config.manual_transmitter_fee * added.len() as u128
        };
        if info.balance < total_fee {
            return Err(HubError::InsufficientFunds);
        }

        let old = self.protocols[&protocol_id].manual_transmitters.clone();
        for t in &old {
            self.manual_claimed.remove(t);
        }
        for t in &transmitters {
            self.manual_claimed.insert(*t, protocol_id);
        }
        let info = self.protocols.get_mut(&protocol_id).expect("checked");
        info.balance -= total_fee;
        info.fee += total_fee;
        info.manual_transmitters = transmitters;
        if total_fee > 0 {
            staking.credit_fee(total_fee);
        }
        Ok(())
    }

    fn validate_manual_list(
        &self,
        protocol_id: ProtocolId,
        transmitters: &[Address],
    ) -> HubResult<()> {
        let mut seen = HashSet::new();
        for t in transmitters {
            if t.is_zero() {
                return Err(HubError::ZeroAddress);
            }
            if !seen.insert(*t) {
                return Err(HubError::DuplicateTransmitter(*t));
            }
            if let Some(claimer) = self.manual_claimed.get(t) {
                if *claimer != protocol_id {
                    return Err(HubError::DuplicateTransmitter(*t));
                }
            }
        }
        Ok(())
    }

    /// Transfers protocol ownership.
    pub fn transfer_ownership(
        &mut self,
        caller: Address,
        protocol_id: ProtocolId,
        new_owner: Address,
    ) -> HubResult<()> {
        self.ensure_owner(protocol_id, caller)?;
        if new_owner.is_zero() {
            return Err(HubError::ZeroAddress);
        }
        self.protocol_mut(protocol_id)?.owner = new_owner;
        Ok(())
    }

    /// Marks the protocol for wind-down; the round turn returns its
    /// balance and clears its transmitters.
    pub fn deactivate_protocol(
        &mut self,
        caller: Address,
        protocol_id: ProtocolId,
    ) -> HubResult<()> {
        self.ensure_owner(protocol_id, caller)?;
        self.protocol_mut(protocol_id)?.active = false;
        Ok(())
    }

    /// Pays out balance unlocked by protocol wind-down.
    pub fn claim_unlocked_balance(
        &mut self,
        caller: Address,
        ledger: &mut dyn TokenLedger,
    ) -> HubResult<u128> {
        let amount = self.unlocked_balance.remove(&caller).unwrap_or(0);
        if amount == 0 {
            return Err(HubError::InsufficientFunds);
        }
        ledger.transfer_out(caller, amount);
        Ok(amount)
    }

    // --- Fee plumbing the bet engine drives ---

    /// Deducts `amount` from the protocol balance. On an insufficient
    /// balance the protocol is paused and `false` is returned; the caller
    /// skips the dependent write but continues.
    pub(crate) fn deduce_fee(
        &mut self,
        protocol_id: ProtocolId,
        amount: u128,
        events: &mut Vec<Event>,
    ) -> bool {
        let Some(info) = self.protocols.get_mut(&protocol_id) else {
            return false;
        };
        if info.balance > amount {
            info.balance -= amount;
            info.fee += amount;
            true
        } else {
            if !info.paused {
                info.paused = true;
                warn!(?protocol_id, "protocol paused: balance exhausted");
                events.push(Event::SetProtocolPause {
                    protocol_id,
                    paused: true,
                });
            }
            false
        }
    }

    /// Bet amount for the protocol and bet type, from active params.
    pub fn bet_amount(&self, protocol_id: ProtocolId, bet_type: BetType) -> u128 {
        let Some(info) = self.protocol(protocol_id) else {
            return 0;
        };
        match bet_type {
            BetType::Msg => info.active_params.msg_bet_amount,
            BetType::Data => info.active_params.data_bet_amount,
        }
    }

    /// Reward amount for the protocol, bet type, and first-bet flag.
    pub fn reward_amount(&self, protocol_id: ProtocolId, bet_type: BetType, first: bool) -> u128 {
        let Some(info) = self.protocol(protocol_id) else {
            return 0;
        };
        match (bet_type, first) {
            (BetType::Msg, true) => info.active_params.msg_bet_first_reward,
            (BetType::Msg, false) => info.active_params.msg_bet_reward,
            (BetType::Data, true) => info.active_params.data_bet_first_reward,
            (BetType::Data, false) => info.active_params.data_bet_reward,
        }
    }

    /// Inactivity slashing quantum for the protocol.
    pub fn min_personal_amount(&self, protocol_id: ProtocolId) -> u128 {
        self.protocol(protocol_id)
            .map(|p| p.active_params.min_personal_amount)
            .unwrap_or(0)
    }

    /// Active consensus target rate for the protocol.
    pub fn consensus_target_rate(&self, protocol_id: ProtocolId) -> u32 {
        self.protocol(protocol_id)
            .map(|p| p.active_params.consensus_target_rate)
            .unwrap_or(RATE_DENOMINATOR)
    }

    /// True if the address is a manual transmitter of the protocol.
    pub fn is_manual_transmitter(&self, protocol_id: ProtocolId, addr: Address) -> bool {
        self.protocol(protocol_id)
            .is_some_and(|p| p.manual_transmitters.contains(&addr))
    }

    /// True if the protocol exists and is paused.
    pub fn is_paused(&self, protocol_id: ProtocolId) -> bool {
        self.protocol(protocol_id).is_some_and(|p| p.paused)
    }

    // --- Chain whitelists and the init state machine ---

    /// True if the address is whitelisted as the protocol's contract on
    /// the chain.
    pub fn is_allowed_protocol_address(
        &self,
        protocol_id: ProtocolId,
        chain_id: ChainId,
        addr: &OpaqueAddr,
    ) -> bool {
        self.protocol(protocol_id)
            .and_then(|p| p.chains.get(&chain_id))
            .is_some_and(|c| c.allowed_protocol_addrs.contains(addr))
    }

    /// Whitelists a protocol contract address on a chain, driving the
    /// init state machine on first contact.
    #[allow(clippy::too_many_arguments)]
    pub fn add_allowed_protocol_address(
        &mut self,
        caller: Address,
        protocol_id: ProtocolId,
        chain_id: ChainId,
        addr: OpaqueAddr,
        current_transmitters: &[Address],
        staking: &mut StakingLedger,
        outbox: &mut Outbox,
        config: &GlobalConfig,
        events: &mut Vec<Event>,
    ) -> HubResult<()> {
        self.ensure_owner(protocol_id, caller)?;
        self.add_actor_address(
            protocol_id,
            chain_id,
            addr,
            ActorKind::ProtocolAddress,
            current_transmitters,
            staking,
            outbox,
            config,
        )?;
        events.push(Event::AddAllowedProtocolAddress {
            protocol_id,
            chain_id,
        });
        Ok(())
    }

    /// Whitelists a proposer address on a chain; also a valid first
    /// contact for the init machine.
    #[allow(clippy::too_many_arguments)]
    pub fn add_allowed_proposer_address(
        &mut self,
        caller: Address,
        protocol_id: ProtocolId,
        chain_id: ChainId,
        addr: OpaqueAddr,
        current_transmitters: &[Address],
        staking: &mut StakingLedger,
        outbox: &mut Outbox,
        config: &GlobalConfig,
        events: &mut Vec<Event>,
    ) -> HubResult<()> {
        self.ensure_owner(protocol_id, caller)?;
        self.add_actor_address(
            protocol_id,
            chain_id,
            addr,
            ActorKind::Proposer,
            current_transmitters,
            staking,
            outbox,
            config,
        )?;
        events.push(Event::AddAllowedProposerAddress {
            protocol_id,
            chain_id,
        });
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn add_actor_address(
        &mut self,
        protocol_id: ProtocolId,
        chain_id: ChainId,
        addr: OpaqueAddr,
        kind: ActorKind,
        current_transmitters: &[Address],
        staking: &mut StakingLedger,
        outbox: &mut Outbox,
        config: &GlobalConfig,
    ) -> HubResult<()> {
        let gov_addr = self
            .gov_addresses
            .get(&chain_id)
            .cloned()
            .ok_or(HubError::InvalidChainId(chain_id))?;
        let consensus_rate = self.consensus_target_rate(protocol_id);
        let info = self.protocol_mut(protocol_id)?;
        let first_contact = !info.chains.contains_key(&chain_id);
        if first_contact {
            if config.init_new_chain_fee > 0 && !protocol_id.is_gov() {
                if info.balance < config.init_new_chain_fee {
                    return Err(HubError::InsufficientFunds);
                }
                info.balance -= config.init_new_chain_fee;
                info.fee += config.init_new_chain_fee;
                staking.credit_fee(config.init_new_chain_fee);
            }
            info.chain_ids.push(chain_id);
        }
        let chain = info.chains.entry(chain_id).or_default();

        let (allowed, pending) = match kind {
            ActorKind::ProtocolAddress => (
                &mut chain.allowed_protocol_addrs,
                &mut chain.pending_protocol_addrs,
            ),
            ActorKind::Proposer => (&mut chain.allowed_proposers, &mut chain.pending_proposers),
        };
        if !allowed.contains(&addr) {
            allowed.push(addr.clone());
        }

        match chain.init {
            InitState::NotInited => {
                pending.push(addr);
                chain.init = InitState::OnInition;
                debug!(?protocol_id, %chain_id, "chain init proposed");
                outbox.emit(
                    chain_id,
                    gov_addr,
                    GovMessage::AddAllowedProtocol {
                        protocol_id,
                        consensus_target_rate: consensus_rate,
                        transmitters: current_transmitters.to_vec(),
                    },
                );
            }
            InitState::OnInition => {
                pending.push(addr);
            }
            InitState::Inited => {
                let message = match kind {
                    ActorKind::ProtocolAddress => GovMessage::AddAllowedProtocolAddress {
                        protocol_id,
                        actor: addr,
                    },
                    ActorKind::Proposer => GovMessage::AddAllowedProposerAddress {
                        protocol_id,
                        actor: addr,
                    },
                };
                outbox.emit(chain_id, gov_addr, message);
            }
        }
        Ok(())
    }

    /// Removes a whitelisted protocol contract address.
    pub fn remove_allowed_protocol_address(
        &mut self,
        caller: Address,
        protocol_id: ProtocolId,
        chain_id: ChainId,
        addr: OpaqueAddr,
        outbox: &mut Outbox,
        events: &mut Vec<Event>,
    ) -> HubResult<()> {
        self.ensure_owner(protocol_id, caller)?;
        self.remove_actor_address(protocol_id, chain_id, addr, ActorKind::ProtocolAddress, outbox)?;
        events.push(Event::RemoveAllowedProtocolAddress {
            protocol_id,
            chain_id,
        });
        Ok(())
    }

    /// Removes a whitelisted proposer address.
    pub fn remove_allowed_proposer_address(
        &mut self,
        caller: Address,
        protocol_id: ProtocolId,
        chain_id: ChainId,
        addr: OpaqueAddr,
        outbox: &mut Outbox,
        events: &mut Vec<Event>,
    ) -> HubResult<()> {
        self.ensure_owner(protocol_id, caller)?;
        self.remove_actor_address(protocol_id, chain_id, addr, ActorKind::Proposer, outbox)?;
        events.push(Event::RemoveAllowedProposerAddress {
            protocol_id,
            chain_id,
        });
        Ok(())
    }

    fn remove_actor_address(
        &mut self,
        protocol_id: ProtocolId,
        chain_id: ChainId,
        addr: OpaqueAddr,
        kind: ActorKind,
        outbox: &mut Outbox,
    ) -> HubResult<()> {
        let gov_addr = self
            .gov_addresses
            .get(&chain_id)
            .cloned()
            .ok_or(HubError::InvalidChainId(chain_id))?;
        let info = self.protocol_mut(protocol_id)?;
        let chain = info
            .chains
            .get_mut(&chain_id)
            .filter(|c| c.init == InitState::Inited)
            .ok_or(HubError::ProtocolIsNotInitedOnChain {
                protocol_id,
                chain_id,
            })?;
        let (list, message) = match kind {
            ActorKind::ProtocolAddress => (
                &mut chain.allowed_protocol_addrs,
                GovMessage::RemoveAllowedProtocolAddress {
                    protocol_id,
                    actor: addr.clone(),
                },
            ),
            ActorKind::Proposer => (
                &mut chain.allowed_proposers,
                GovMessage::RemoveAllowedProposerAddress {
                    protocol_id,
                    actor: addr.clone(),
                },
            ),
        };
        list.retain(|a| *a != addr);
        outbox.emit(chain_id, gov_addr, message);
        Ok(())
    }

    /// Whitelists an executor on an inited or initing chain.
    pub fn add_executor(
        &mut self,
        caller: Address,
        protocol_id: ProtocolId,
        chain_id: ChainId,
        executor: OpaqueAddr,
        outbox: &mut Outbox,
        events: &mut Vec<Event>,
    ) -> HubResult<()> {
        self.ensure_owner(protocol_id, caller)?;
        let gov_addr = self
            .gov_addresses
            .get(&chain_id)
            .cloned()
            .ok_or(HubError::InvalidChainId(chain_id))?;
        let info = self.protocol_mut(protocol_id)?;
        let chain = info
            .chains
            .get_mut(&chain_id)
            .filter(|c| c.init != InitState::NotInited)
            .ok_or(HubError::ProtocolIsNotInitedOnChain {
                protocol_id,
                chain_id,
            })?;
        if !chain.executors.contains(&executor) {
            chain.executors.push(executor.clone());
        }
        outbox.emit(
            chain_id,
            gov_addr,
            GovMessage::AddExecutor {
                protocol_id,
                executor,
            },
        );
        events.push(Event::AddExecutor {
            protocol_id,
            chain_id,
        });
        Ok(())
    }

    /// Removes an executor. Removing the last gov executor on a chain is
    /// forbidden.
    pub fn remove_executor(
        &mut self,
        caller: Address,
        protocol_id: ProtocolId,
        chain_id: ChainId,
        executor: OpaqueAddr,
        outbox: &mut Outbox,
        events: &mut Vec<Event>,
    ) -> HubResult<()> {
        self.ensure_owner(protocol_id, caller)?;
        let gov_addr = self
            .gov_addresses
            .get(&chain_id)
            .cloned()
            .ok_or(HubError::InvalidChainId(chain_id))?;
        let info = self.protocol_mut(protocol_id)?;
        let chain = info
            .chains
            .get_mut(&chain_id)
            .ok_or(HubError::ProtocolIsNotInitedOnChain {
                protocol_id,
                chain_id,
            })?;
        if protocol_id.is_gov() && chain.executors.len() <= 1 {
            return Err(HubError::LastGovExecutor(chain_id));
        }
        chain.executors.retain(|e| *e != executor);
        outbox.emit(
            chain_id,
            gov_addr,
            GovMessage::RemoveExecutor {
                protocol_id,
                executor,
            },
        );
        events.push(Event::RemoveExecutor {
            protocol_id,
            chain_id,
        });
        Ok(())
    }

    /// Queues the full current transmitter set for a chain still initing.
    pub(crate) fn queue_pending_transmitters(
        &mut self,
        protocol_id: ProtocolId,
        chain_id: ChainId,
        transmitters: Vec<Address>,
    ) {
        if let Some(chain) = self
            .protocols
            .get_mut(&protocol_id)
            .and_then(|p| p.chains.get_mut(&chain_id))
        {
            chain.pending_transmitters = transmitters;
        }
    }

    /// Endpoint acknowledgement: the chain accepted the protocol. Flushes
    /// the queued protocol addresses, proposers, and transmitters (the
    /// latter filtered to the currently-allowed set), in that order.
    pub fn handle_add_allowed_protocol(
        &mut self,
        protocol_id: ProtocolId,
        chain_id: ChainId,
        allowed_now: &[Address],
        outbox: &mut Outbox,
    ) -> HubResult<()> {
        let gov_addr = self
            .gov_addresses
            .get(&chain_id)
            .cloned()
            .ok_or(HubError::InvalidChainId(chain_id))?;
        let info = self.protocol_mut(protocol_id)?;
        let chain = info
            .chains
            .get_mut(&chain_id)
            .filter(|c| c.init == InitState::OnInition)
            .ok_or(HubError::ProtocolIsNotInitedOnChain {
                protocol_id,
                chain_id,
            })?;
        chain.init = InitState::Inited;
        let protocol_addrs = std::mem::take(&mut chain.pending_protocol_addrs);
        let proposers = std::mem::take(&mut chain.pending_proposers);
        let mut transmitters = std::mem::take(&mut chain.pending_transmitters);
        transmitters.retain(|t| allowed_now.contains(t));

        for actor in protocol_addrs {
            outbox.emit(
                chain_id,
                gov_addr.clone(),
                GovMessage::AddAllowedProtocolAddress { protocol_id, actor },
            );
        }
        for actor in proposers {
            outbox.emit(
                chain_id,
                gov_addr.clone(),
                GovMessage::AddAllowedProposerAddress { protocol_id, actor },
            );
        }
        if !transmitters.is_empty() {
            outbox.emit(
                chain_id,
                gov_addr,
                GovMessage::AddTransmitters {
                    protocol_id,
                    transmitters,
                },
            );
        }
        info!(?protocol_id, %chain_id, "chain init acknowledged");
        Ok(())
    }

    // --- Round turn ---

    /// Reconciles realtime and active parameters, propagates rate
    /// changes, pauses unhealthy protocols, and winds down deactivated
    /// ones. Returns the protocols whose transmitter sets must be
    /// cleared by the caller.
    pub(crate) fn turn_round(
        &mut self,
        config: &GlobalConfig,
        outbox: &mut Outbox,
        events: &mut Vec<Event>,
    ) -> Vec<ProtocolId> {
        let mut to_clear = Vec::new();
        let ids = self.protocol_ids.clone();
        for protocol_id in ids {
            let gov_targets: Vec<(ChainId, OpaqueAddr)> = {
                let info = &self.protocols[&protocol_id];
                info.chain_ids
                    .iter()
                    .filter_map(|c| self.gov_addresses.get(c).map(|a| (*c, a.clone())))
                    .collect()
            };
            let info = self.protocols.get_mut(&protocol_id).expect("listed");

            if info.active_params.consensus_target_rate != info.realtime_params.consensus_target_rate
            {
                let rate = info.realtime_params.consensus_target_rate;
                for (chain_id, gov_addr) in &gov_targets {
                    outbox.emit(
                        *chain_id,
                        gov_addr.clone(),
                        GovMessage::SetConsensusTargetRate {
                            protocol_id,
                            consensus_target_rate: rate,
                        },
                    );
                }
                events.push(Event::SetConsensusTargetRate { protocol_id, rate });
            }
            info.active_params = info.realtime_params.clone();

            let unhealthy = info.balance < config.min_protocol_balance || !info.active;
            if !protocol_id.is_gov() && unhealthy && !info.paused {
                info.paused = true;
                warn!(?protocol_id, "protocol paused at round turn");
                events.push(Event::SetProtocolPause {
                    protocol_id,
                    paused: true,
                });
            }
            if !info.active {
                if info.balance > 0 {
                    let owner = info.owner;
                    let balance = info.balance;
                    info.balance = 0;
                    *self.unlocked_balance.entry(owner).or_default() += balance;
                }
                to_clear.push(protocol_id);
            }
        }
        to_clear
    }
}

enum ActorKind {
    ProtocolAddress,
    Proposer,
}

/// Checks every protocol-parameter invariant.
///
/// The manual-transmitter cap guarantees manuals alone can never reach
/// consensus: `manuals <= floor(max * (10000 - rate) / 10000) + 1`.
pub fn validate_params(
    protocol_id: ProtocolId,
    params: &ProtocolParams,
    manual_count: usize,
    config: &GlobalConfig,
) -> HubResult<()> {
    let rate = params.consensus_target_rate;
    if rate <= MIN_CONSENSUS_RATE || rate > RATE_DENOMINATOR {
        return Err(HubError::InvalidConsensusRate(rate));
    }
    if params.max_transmitters > config.max_transmitters_count {
        return Err(HubError::MaxTransmittersExceeded(params.max_transmitters));
    }
    if manual_count == 0 {
        return Err(HubError::ZeroAddress);
    }
    if !protocol_id.is_gov() {
        let limit = (params.max_transmitters as usize) * ((RATE_DENOMINATOR - rate) as usize)
            / (RATE_DENOMINATOR as usize)
            + 1;
        if manual_count > limit {
            return Err(HubError::ManualTransmittersLimitExceeded {
                count: manual_count,
                limit,
            });
        }
    }
    Ok(())
}

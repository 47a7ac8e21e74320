//! The hub facade.
//!
//! [`Hub`] owns every component and exposes the external entry points.
//! Each entry point is one strictly-ordered transaction: it validates
//! against the caller and the current [`BlockEnv`], applies its state
//! changes atomically, and appends to the event queue. The host sets the
//! environment before each batch, drains events after each call, and
//! ships the governance outbox to the transport.

use crate::agents::AgentDirectory;
use crate::bets::{BetBook, BetType};
use crate::endpoint::Outbox;
use crate::events::Event;
use crate::ledger::TokenLedger;
use crate::merkle::MasterStreamSpotter;
use crate::operations::OperationRegistry;
use crate::protocols::{ProtocolParams, ProtocolRegistry};
use crate::roles::Roles;
use crate::round::RoundCoordinator;
use crate::staking::StakingLedger;
use crate::stream::{DataProcessor, MajorityProcessor, StreamConsensus, StreamParams};
use crate::{HubError, HubResult};
use photon_config::GlobalConfig;
use photon_crypto::Signature;
use photon_types::{Address, ChainId, OpaqueAddr, OperationData, ProtocolId, RoundId, SourceId, H256};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Block height and wall-clock time of the current transaction batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockEnv {
    /// Current block number.
    pub number: u64,
    /// Current timestamp in seconds.
    pub timestamp: u64,
}

/// The hub-side coordination engine.
pub struct Hub {
    config: GlobalConfig,
    roles: Roles,
    env: BlockEnv,
    staking: StakingLedger,
    bets: BetBook,
    registry: ProtocolRegistry,
    agents: AgentDirectory,
    operations: OperationRegistry,
    stream: StreamConsensus,
    master: MasterStreamSpotter,
    outbox: Outbox,
    coordinator: RoundCoordinator,
    processor: Box<dyn DataProcessor>,
    ledger: Box<dyn TokenLedger>,
    events: Vec<Event>,
}

impl Hub {
    /// Creates a hub with the given config, role table, and token
    /// ledger. Stream finalization defaults to majority voting.
    pub fn new(config: GlobalConfig, roles: Roles, ledger: Box<dyn TokenLedger>) -> Self {
        Self {
            config,
            roles,
            env: BlockEnv::default(),
            staking: StakingLedger::new(),
            bets: BetBook::new(),
            registry: ProtocolRegistry::new(),
            agents: AgentDirectory::new(),
            operations: OperationRegistry::new(),
            stream: StreamConsensus::new(),
            master: MasterStreamSpotter::new(),
            outbox: Outbox::new(),
            coordinator: RoundCoordinator::new(),
            processor: Box::new(MajorityProcessor),
            ledger,
            events: Vec::new(),
        }
    }

    /// Replaces the stream processing callback. Host-side, before use.
    #[must_use]
    pub fn with_processor(mut self, processor: Box<dyn DataProcessor>) -> Self {
        self.processor = processor;
        self
    }

    /// Sets the block environment for the next transactions.
    pub fn set_env(&mut self, env: BlockEnv) {
        self.env = env;
    }

    /// The current block environment.
    pub fn env(&self) -> BlockEnv {
        self.env
    }

    /// Takes the events emitted since the last drain.
    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    /// Takes the queued outbound governance proposals.
    pub fn drain_outbox(&mut self) -> Vec<photon_types::GovProposal> {
        self.outbox.drain()
    }

    // --- Component views ---

    /// The active global configuration.
    pub fn config(&self) -> &GlobalConfig {
        &self.config
    }

    /// The staking ledger.
    pub fn staking(&self) -> &StakingLedger {
        &self.staking
    }

    /// The bet book.
    pub fn bets(&self) -> &BetBook {
        &self.bets
    }

    /// The protocol registry.
    pub fn registry(&self) -> &ProtocolRegistry {
        &self.registry
    }

    /// The agent directory.
    pub fn agents(&self) -> &AgentDirectory {
        &self.agents
    }

    /// The operation registry.
    pub fn operations(&self) -> &OperationRegistry {
        &self.operations
    }

    /// The stream consensus engine.
    pub fn stream(&self) -> &StreamConsensus {
        &self.stream
    }

    /// The master stream spotter.
    pub fn master(&self) -> &MasterStreamSpotter {
        &self.master
    }

    // --- Admin ---

    /// Replaces the global configuration after validation.
    pub fn update_config(&mut self, caller: Address, config: GlobalConfig) -> HubResult<()> {
        self.roles.ensure_admin(caller)?;
        config.validate().map_err(|_| HubError::InvalidConfig)?;
        info!("global config updated");
        self.config = config;
        Ok(())
    }

    /// Admits an agent to the global set.
    pub fn register_agent(&mut self, caller: Address, agent: Address) -> HubResult<()> {
        self.roles.ensure_admin(caller)?;
        self.staking.register_agent(agent)
    }

    /// Bans an agent: slashes its full personal stake and evicts its
    /// transmitters from every protocol.
    pub fn ban_agent(&mut self, caller: Address, agent: Address) -> HubResult<()> {
        self.roles.ensure_admin(caller)?;
        self.staking.ban(agent, &mut self.events)?;
        for (protocol_id, transmitter) in self.agents.declarations_of(agent) {
            self.operations.remove_transmitter(
                protocol_id,
                transmitter,
                &mut self.registry,
                &mut self.agents,
                &mut self.outbox,
                &mut self.events,
            );
        }
        Ok(())
    }

    /// Grants the external-developer capability.
    pub fn approve_developer(&mut self, caller: Address, developer: Address) -> HubResult<()> {
        self.roles.ensure_admin(caller)?;
        self.registry.approve_developer(developer);
        Ok(())
    }

    /// Records the gov contract address for a destination chain.
    pub fn set_gov_address(
        &mut self,
        caller: Address,
        chain_id: ChainId,
        addr: OpaqueAddr,
    ) -> HubResult<()> {
        self.roles.ensure_admin(caller)?;
        self.registry.set_gov_address(chain_id, addr);
        Ok(())
    }

    /// Sets the watcher consensus rate, valid range (5500, 10000].
    pub fn set_watchers_consensus_rate(&mut self, caller: Address, rate: u32) -> HubResult<()> {
        self.roles.ensure_admin(caller)?;
        self.operations.set_watchers_consensus_rate(rate)
    }

    /// Stages stream consensus parameters for a protocol; they apply at
    /// the next round turn.
    pub fn set_stream_params(
        &mut self,
        caller: Address,
        protocol_id: ProtocolId,
        params: StreamParams,
    ) -> HubResult<()> {
        self.roles.ensure_admin(caller)?;
        self.stream.set_params(protocol_id, params)
    }

    // --- Delegation and rewards ---

    /// Delegates stake to an agent.
    pub fn delegate(&mut self, caller: Address, agent: Address, amount: u128) -> HubResult<()> {
        self.staking
            .delegate(caller, agent, amount, self.ledger.as_mut(), &mut self.events)
    }

    /// Withdraws delegated stake.
    pub fn withdraw(&mut self, caller: Address, agent: Address, amount: u128) -> HubResult<()> {
        self.staking
            .withdraw(caller, agent, amount, self.ledger.as_mut(), &mut self.events)
    }

    /// Moves delegated stake between agents.
    pub fn redelegate(
        &mut self,
        caller: Address,
        from: Address,
        to: Address,
        amount: u128,
    ) -> HubResult<()> {
        self.staking
            .redelegate(caller, from, to, amount, self.ledger.as_mut(), &mut self.events)
    }

    /// Claims pending delegator rewards.
    pub fn claim_rewards(&mut self, caller: Address, agent: Address) -> HubResult<()> {
        self.staking
            .claim_rewards(caller, agent, self.ledger.as_mut(), &mut self.events)
    }

    /// Redirects future reward payouts for `(caller, agent)`.
    pub fn set_reward_collector(
        &mut self,
        caller: Address,
        agent: Address,
        collector: Address,
    ) -> HubResult<()> {
        if collector.is_zero() {
            return Err(HubError::ZeroAddress);
        }
        self.staking.set_reward_collector(caller, agent, collector);
        Ok(())
    }

    /// Claims the caller's accumulated agent reward.
    pub fn claim_agent_reward(&mut self, caller: Address) -> HubResult<()> {
        self.staking
            .claim_agent_reward(caller, self.ledger.as_mut(), &mut self.events)
    }

    /// Withdraws the system fee to the fee collector.
    pub fn withdraw_accumulated_fee(&mut self, caller: Address) -> HubResult<u128> {
        self.staking
            .withdraw_accumulated_fee(caller, &self.config, self.ledger.as_mut())
    }

    // --- Personal stake ---

    /// Deposits personal stake for the calling agent.
    pub fn deposit_personal_stake(&mut self, caller: Address, amount: u128) -> HubResult<()> {
        self.staking
            .deposit_personal_stake(caller, amount, self.ledger.as_mut(), &mut self.events)
    }

    /// Requests a personal-stake withdrawal.
    pub fn request_withdraw_personal_stake(
        &mut self,
        caller: Address,
        amount: u128,
    ) -> HubResult<()> {
        self.staking
            .request_withdraw_personal_stake(caller, amount, &mut self.events)
    }

    /// Cancels a pending personal-stake withdrawal request.
    pub fn cancel_withdraw_personal_stake(&mut self, caller: Address) -> HubResult<()> {
        self.staking
            .cancel_withdraw_personal_stake(caller, &mut self.events)
    }

    /// Withdraws personal stake released at a round turn.
    pub fn withdraw_personal_stake(&mut self, caller: Address) -> HubResult<()> {
        self.staking
            .withdraw_personal_stake(caller, self.ledger.as_mut(), &mut self.events)
    }

    /// Sets the calling agent's fee rate.
    pub fn set_agent_fee(&mut self, caller: Address, fee: u32) -> HubResult<()> {
        self.staking.set_agent_fee(caller, fee, &mut self.events)
    }

    /// Pauses or unpauses the calling agent.
    pub fn set_agent_paused(&mut self, caller: Address, paused: bool) -> HubResult<()> {
        self.staking.set_agent_paused(caller, paused)
    }

    // --- Protocol support declarations ---

    /// Declares the calling agent will operate `transmitter` for the
    /// protocol.
    pub fn declare_protocol_support(
        &mut self,
        caller: Address,
        protocol_id: ProtocolId,
        transmitter: Address,
    ) -> HubResult<()> {
        self.agents.declare_protocol_support(
            caller,
            protocol_id,
            transmitter,
            &self.staking,
            &self.registry,
            &self.config,
        )
    }

    /// Revokes the calling agent's declaration for the protocol.
    pub fn revoke_protocol_support(
        &mut self,
        caller: Address,
        protocol_id: ProtocolId,
    ) -> HubResult<()> {
        self.agents.revoke_protocol_support(caller, protocol_id)?;
        Ok(())
    }

    // --- Protocol management ---

    /// Registers a protocol owned by the caller and admits it to the
    /// operation pipeline with its manual transmitters as the initial
    /// allowed set.
    pub fn register_protocol(
        &mut self,
        caller: Address,
        protocol_id: ProtocolId,
        params: ProtocolParams,
        manual_transmitters: Vec<Address>,
    ) -> HubResult<()> {
        self.registry.register_protocol(
            caller,
            protocol_id,
            params,
            manual_transmitters.clone(),
            &mut self.staking,
            self.ledger.as_mut(),
            &self.config,
            &mut self.events,
        )?;
        self.operations.admit_protocol(protocol_id);
        self.operations.update_transmitters(
            protocol_id,
            manual_transmitters,
            &mut self.registry,
            &mut self.outbox,
            &mut self.events,
        );
        Ok(())
    }

    /// Tops up a protocol balance.
    pub fn deposit_protocol_balance(
        &mut self,
        caller: Address,
        protocol_id: ProtocolId,
        amount: u128,
    ) -> HubResult<()> {
        self.registry
            .deposit_protocol_balance(caller, protocol_id, amount, self.ledger.as_mut())
    }

    /// Replaces a protocol's realtime parameters.
    pub fn set_protocol_params(
        &mut self,
        caller: Address,
        protocol_id: ProtocolId,
        params: ProtocolParams,
    ) -> HubResult<()> {
        self.registry
            .set_protocol_params(caller, protocol_id, params, &mut self.staking, &self.config)
    }

    /// Replaces a protocol's manual transmitter list.
    pub fn set_manual_transmitters(
        &mut self,
        caller: Address,
        protocol_id: ProtocolId,
        transmitters: Vec<Address>,
    ) -> HubResult<()> {
        self.registry.set_manual_transmitters(
            caller,
            protocol_id,
            transmitters,
            &mut self.staking,
            &self.config,
        )
    }

    /// Transfers protocol ownership.
    pub fn transfer_protocol_ownership(
        &mut self,
        caller: Address,
        protocol_id: ProtocolId,
        new_owner: Address,
    ) -> HubResult<()> {
        self.registry.transfer_ownership(caller, protocol_id, new_owner)
    }

    /// Marks a protocol for wind-down at the next round turn.
    pub fn deactivate_protocol(&mut self, caller: Address, protocol_id: ProtocolId) -> HubResult<()> {
        self.registry.deactivate_protocol(caller, protocol_id)
    }

    /// Claims balance unlocked by a protocol wind-down.
    pub fn claim_unlocked_balance(&mut self, caller: Address) -> HubResult<u128> {
        self.registry.claim_unlocked_balance(caller, self.ledger.as_mut())
    }

    // --- Chain whitelists ---

    /// Whitelists the protocol's contract address on a chain.
    pub fn add_allowed_protocol_address(
        &mut self,
        caller: Address,
        protocol_id: ProtocolId,
        chain_id: ChainId,
        addr: OpaqueAddr,
    ) -> HubResult<()> {
        let current = self.operations.transmitters(protocol_id).to_vec();
        self.registry.add_allowed_protocol_address(
            caller,
            protocol_id,
            chain_id,
            addr,
            &current,
            &mut self.staking,
            &mut self.outbox,
            &self.config,
            &mut self.events,
        )
    }

    /// Removes a whitelisted protocol contract address.
    pub fn remove_allowed_protocol_address(
        &mut self,
        caller: Address,
        protocol_id: ProtocolId,
        chain_id: ChainId,
        addr: OpaqueAddr,
    ) -> HubResult<()> {
        self.registry.remove_allowed_protocol_address(
            caller,
            protocol_id,
            chain_id,
            addr,
            &mut self.outbox,
            &mut self.events,
        )
    }

    /// Whitelists a proposer address on a chain.
    pub fn add_allowed_proposer_address(
        &mut self,
        caller: Address,
        protocol_id: ProtocolId,
        chain_id: ChainId,
        addr: OpaqueAddr,
    ) -> HubResult<()> {
        let current = self.operations.transmitters(protocol_id).to_vec();
        self.registry.add_allowed_proposer_address(
            caller,
            protocol_id,
            chain_id,
            addr,
            &current,
            &mut self.staking,
            &mut self.outbox,
            &self.config,
            &mut self.events,
        )
    }

    /// Removes a whitelisted proposer address.
    pub fn remove_allowed_proposer_address(
        &mut self,
        caller: Address,
        protocol_id: ProtocolId,
        chain_id: ChainId,
        addr: OpaqueAddr,
    ) -> HubResult<()> {
        self.registry.remove_allowed_proposer_address(
            caller,
            protocol_id,
            chain_id,
            addr,
            &mut self.outbox,
            &mut self.events,
        )
    }

    /// Whitelists an executor on a chain.
    pub fn add_executor(
        &mut self,
        caller: Address,
        protocol_id: ProtocolId,
        chain_id: ChainId,
        executor: OpaqueAddr,
    ) -> HubResult<()> {
        self.registry.add_executor(
            caller,
            protocol_id,
            chain_id,
            executor,
            &mut self.outbox,
            &mut self.events,
        )
    }

    /// Removes an executor from a chain.
    pub fn remove_executor(
        &mut self,
        caller: Address,
        protocol_id: ProtocolId,
        chain_id: ChainId,
        executor: OpaqueAddr,
    ) -> HubResult<()> {
        self.registry.remove_executor(
            caller,
            protocol_id,
            chain_id,
            executor,
            &mut self.outbox,
            &mut self.events,
        )
    }

    /// Endpoint callback: a chain acknowledged the protocol's admission.
    pub fn handle_add_allowed_protocol(
        &mut self,
        caller: Address,
        protocol_id: ProtocolId,
        chain_id: ChainId,
    ) -> HubResult<()> {
        self.roles.ensure_endpoint(caller)?;
        let allowed = self.operations.transmitters(protocol_id).to_vec();
        self.registry
            .handle_add_allowed_protocol(protocol_id, chain_id, &allowed, &mut self.outbox)
    }

    // --- Operations ---

    /// Ingests a signed operation proposal from a transmitter.
    ///
    /// Validates admission, allowance, payload bounds, and the signature;
    /// places the message bet; then records the proof, rotating stale
    /// proofs across a round boundary and approving the operation when
    /// the proof count clears the consensus target rate.
    pub fn propose_operation(
        &mut self,
        caller: Address,
        op_data: OperationData,
        signature: Signature,
    ) -> HubResult<H256> {
        let op_hash = self.operations.validate_proposal(
            caller,
            &op_data,
            &signature,
            self.env.number,
            &self.registry,
        )?;
        let protocol_id = op_data.protocol_id;
        let current = self.operations.transmitters(protocol_id).to_vec();
        self.bets.place_bet(
            protocol_id,
            caller,
            BetType::Msg,
            op_hash,
            self.env.timestamp,
            &current,
            &self.registry,
            &mut self.staking,
            &self.agents,
        )?;
        let round = self.staking.round();
        self.operations.record_proof(
            caller,
            op_data,
            signature,
            op_hash,
            self.env.number,
            round,
            &self.registry,
            &mut self.bets,
            &mut self.staking,
            &self.agents,
            &mut self.events,
        )?;
        Ok(op_hash)
    }

    /// Records a watcher's execution confirmation; on watcher consensus
    /// the operation executes and its bets settle.
    pub fn approve_operation_executing(
        &mut self,
        caller: Address,
        op_hash: H256,
    ) -> HubResult<()> {
        let settlement =
            self.operations
                .record_watcher_confirmation(caller, op_hash, &mut self.events)?;
        if let Some(settlement) = settlement {
            self.bets.release_bets_and_reward(
                settlement.protocol_id,
                &settlement.winners,
                op_hash,
                self.env.timestamp,
                &mut self.staking,
                &mut self.registry,
                &mut self.agents,
                &mut self.operations,
                &mut self.outbox,
                &self.config,
                &mut self.events,
            )?;
        }
        Ok(())
    }

    // --- Data streaming ---

    /// Declares a stream spotter's allowed keys.
    pub fn set_allowed_stream_keys(
        &mut self,
        caller: Address,
        protocol_id: ProtocolId,
        source_id: SourceId,
        allowed_keys: Vec<H256>,
        only_allowed_keys: bool,
    ) -> HubResult<()> {
        self.registry.ensure_owner(protocol_id, caller)?;
        self.master.set_allowed_keys(
            protocol_id,
            source_id,
            allowed_keys,
            only_allowed_keys,
            &mut self.events,
        );
        Ok(())
    }

    /// Records a transmitter's vote for a stream data key.
    pub fn propose_data(
        &mut self,
        caller: Address,
        protocol_id: ProtocolId,
        source_id: SourceId,
        data_key: H256,
        value: Vec<u8>,
    ) -> HubResult<()> {
        let allowed = self.operations.transmitters(protocol_id).to_vec();
        self.stream.propose_data(
            caller,
            protocol_id,
            source_id,
            data_key,
            value,
            self.env.timestamp,
            &allowed,
            &self.registry,
            &mut self.staking,
            &self.agents,
            &mut self.bets,
            &mut self.events,
        )
    }

    /// Finalizes a stream window and settles its bets.
    pub fn finalize_data(
        &mut self,
        caller: Address,
        protocol_id: ProtocolId,
        source_id: SourceId,
        data_key: H256,
    ) -> HubResult<()> {
        self.roles.ensure_executor(caller)?;
        let allowed = self.operations.transmitters(protocol_id).to_vec();
        let (op_hash, winners) = self.stream.finalize_data(
            protocol_id,
            source_id,
            data_key,
            self.env.timestamp,
            &*self.processor,
            &allowed,
            &mut self.master,
            &mut self.events,
        )?;
        self.bets.release_bets_and_reward(
            protocol_id,
            &winners,
            op_hash,
            self.env.timestamp,
            &mut self.staking,
            &mut self.registry,
            &mut self.agents,
            &mut self.operations,
            &mut self.outbox,
            &self.config,
            &mut self.events,
        )
    }

    /// Recomputes a spotter's Merkle root over its finalized data.
    pub fn recalculate_merkle_root(
        &mut self,
        caller: Address,
        protocol_id: ProtocolId,
        source_id: SourceId,
    ) -> HubResult<H256> {
        self.roles.ensure_executor(caller)?;
        self.master
            .recalculate_merkle_root(protocol_id, source_id, &mut self.events)
    }

    // --- Maintenance ---

    /// Forfeits a bet left unresolved past the bet timeout.
    pub fn prune_bet(&mut self, caller: Address, agent: Address, op_hash: H256) -> HubResult<()> {
        self.roles.ensure_pruner(caller)?;
        self.bets.prune_bet(
            agent,
            op_hash,
            self.env.timestamp,
            &mut self.staking,
            &self.config,
        )
    }

    /// Advances the round.
    ///
    /// The sequence is fixed: distribute the closing round's rewards on
    /// its snapshots, reconcile protocol parameters and wind-downs, take
    /// the staking snapshots for the new round, re-elect transmitters
    /// for every active protocol, then apply staged stream parameters.
    pub fn turn_round(&mut self, caller: Address) -> HubResult<RoundId> {
        self.roles.ensure_round_trigger(caller)?;
        let now = self.env.timestamp;
        self.coordinator.ensure_due(now, self.config.min_round_time)?;

        let rewards = self.bets.take_pending_rewards();
        self.staking.distribute_rewards(rewards, &self.config);

        let to_clear = self
            .registry
            .turn_round(&self.config, &mut self.outbox, &mut self.events);
        for protocol_id in to_clear {
            if !self.operations.transmitters(protocol_id).is_empty() {
                self.operations.update_transmitters(
                    protocol_id,
                    Vec::new(),
                    &mut self.registry,
                    &mut self.outbox,
                    &mut self.events,
                );
            }
        }

        self.staking.turn_round();

        for protocol_id in self.registry.active_protocol_ids() {
            let elected = self.staking.select_transmitters_for_protocol(
                protocol_id,
                &self.registry,
                &self.agents,
            );
            self.operations.update_transmitters(
                protocol_id,
                elected,
                &mut self.registry,
                &mut self.outbox,
                &mut self.events,
            );
        }

        self.stream.turn_round();
        self.coordinator.stamp(now);
        let round = self.staking.round();
        info!(round, "round turned");
        self.events.push(Event::RoundTurned { round });
        Ok(round)
    }
}

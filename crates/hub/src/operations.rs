//! Operation ingestion, proof aggregation, and watcher execution
//! confirmation.
//!
//! An operation is created on its first proof and approved once the
//! proof count clears the protocol's consensus target rate against the
//! current transmitter set. Approval opens a one-block grace window:
//! proofs landing in the block immediately after approval belong to the
//! same external-ordering window and are still appended; anything later
//! is rejected as already approved.
//!
//! Operations straddling a round turn are rebuilt on their next proof:
//! proofs from transmitters no longer allowed are dropped and their bets
//! refunded, the rest survive into the new round.
//!
//! Watchers (the union of transmitter sets across protocols, reference
//! counted) confirm destination-side execution under their own consensus
//! rate; execution releases the operation's bets.

use crate::agents::AgentDirectory;
use crate::bets::BetBook;
use crate::endpoint::Outbox;
use crate::events::Event;
use crate::protocols::{InitState, ProtocolRegistry, MIN_CONSENSUS_RATE};
use crate::staking::StakingLedger;
use crate::{HubError, HubResult};
use alloy_primitives::U256;
use photon_config::RATE_DENOMINATOR;
use photon_crypto::{eth_signed_digest, Signature};
use photon_types::{Address, ChainId, GovMessage, OperationData, ProtocolId, RoundId, H256};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, trace, warn};

/// Default watcher consensus rate: 60%.
pub const DEFAULT_WATCHERS_CONSENSUS_RATE: u32 = 6_000;

/// One transmitter's signed endorsement of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    /// The endorsing transmitter.
    pub transmitter: Address,
    /// Its signature over the operation hash.
    pub signature: Signature,
}

/// A cross-chain operation and its consensus state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Operation {
    /// The operation payload.
    pub data: OperationData,
    /// Proof consensus reached.
    pub approved: bool,
    /// Execution confirmed by watcher consensus.
    pub executed: bool,
    /// Round the live proofs belong to.
    pub round: RoundId,
    /// Block the operation was approved in.
    pub approve_block: u64,
    /// Collected proofs, unique by transmitter, in submission order.
    pub proofs: Vec<Proof>,
    /// Watchers that confirmed execution, unique, in submission order.
    pub watchers: Vec<Address>,
}

impl Operation {
    /// Number of live proofs.
    pub fn proofs_count(&self) -> usize {
        self.proofs.len()
    }

    /// Number of watcher confirmations.
    pub fn watcher_count(&self) -> usize {
        self.watchers.len()
    }

    /// Transmitters that contributed live proofs.
    pub fn proofed_transmitters(&self) -> Vec<Address> {
        self.proofs.iter().map(|p| p.transmitter).collect()
    }
}

/// The settlement handed back when watcher consensus executes an
/// operation; the caller releases bets with it.
#[derive(Debug, Clone)]
pub struct ExecutionSettlement {
    /// Protocol of the executed operation.
    pub protocol_id: ProtocolId,
    /// Transmitters whose proofs backed the operation.
    pub winners: Vec<Address>,
}

/// The operation registry.
#[derive(Debug, Serialize, Deserialize)]
pub struct OperationRegistry {
    ops: HashMap<H256, Operation>,
    admitted: HashSet<ProtocolId>,
    allowed_transmitters: HashMap<ProtocolId, Vec<Address>>,
    allowed_watchers: HashMap<Address, u32>,
    watchers_consensus_rate: u32,
    last_executed_nonce_in_order: HashMap<ProtocolId, HashMap<ChainId, U256>>,
}

impl Default for OperationRegistry {
    fn default() -> Self {
        Self {
            ops: HashMap::new(),
            admitted: HashSet::new(),
            allowed_transmitters: HashMap::new(),
            allowed_watchers: HashMap::new(),
            watchers_consensus_rate: DEFAULT_WATCHERS_CONSENSUS_RATE,
            last_executed_nonce_in_order: HashMap::new(),
        }
    }
}

impl OperationRegistry {
    /// Creates an empty registry with the default watcher rate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up an operation.
    pub fn operation(&self, op_hash: H256) -> Option<&Operation> {
        self.ops.get(&op_hash)
    }

    /// Admits a protocol. Registration capability.
    pub(crate) fn admit_protocol(&mut self, protocol_id: ProtocolId) {
        self.admitted.insert(protocol_id);
        self.allowed_transmitters.entry(protocol_id).or_default();
    }

    /// True if the protocol has been admitted.
    pub fn is_admitted(&self, protocol_id: ProtocolId) -> bool {
        self.admitted.contains(&protocol_id)
    }

    /// The allowed transmitter set of a protocol, in election order.
    pub fn transmitters(&self, protocol_id: ProtocolId) -> &[Address] {
        self.allowed_transmitters
            .get(&protocol_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// True if the transmitter is allowed for the protocol.
    pub fn is_allowed_transmitter(&self, protocol_id: ProtocolId, transmitter: Address) -> bool {
        self.transmitters(protocol_id).contains(&transmitter)
    }

    /// True if the address is an allowed watcher.
    pub fn is_allowed_watcher(&self, watcher: Address) -> bool {
        self.allowed_watchers
            .get(&watcher)
            .is_some_and(|count| *count > 0)
    }

    /// Number of allowed watchers.
    pub fn watcher_count(&self) -> usize {
        self.allowed_watchers.len()
    }

    /// The watcher consensus rate.
    pub fn watchers_consensus_rate(&self) -> u32 {
        self.watchers_consensus_rate
    }

    /// Sets the watcher consensus rate. Admin capability; valid range
    /// (5500, 10000].
    pub(crate) fn set_watchers_consensus_rate(&mut self, rate: u32) -> HubResult<()> {
        if rate <= MIN_CONSENSUS_RATE || rate > RATE_DENOMINATOR {
            return Err(HubError::InvalidConsensusRate(rate));
        }
        self.watchers_consensus_rate = rate;
        Ok(())
    }

    /// Nonce of the last executed in-order operation for a protocol and
    /// source chain. Destination-side executors consult this; the hub
    /// does not enforce gapless ordering itself.
    pub fn last_executed_nonce_in_order(
        &self,
        protocol_id: ProtocolId,
        src_chain_id: ChainId,
    ) -> Option<U256> {
        self.last_executed_nonce_in_order
            .get(&protocol_id)
            .and_then(|m| m.get(&src_chain_id))
            .copied()
    }

    // --- Proposal ingestion ---

    /// Validates a proposal end to end and returns its operation hash.
    ///
    /// Checks admission, transmitter allowance, payload bounds, the gov
    /// address for the destination, signature recovery against the
    /// caller, the approval grace window, and proof uniqueness. No state
    /// changes; the caller places the bet and then records the proof.
    pub(crate) fn validate_proposal(
        &self,
        caller: Address,
        op_data: &OperationData,
        signature: &Signature,
        current_block: u64,
        registry: &ProtocolRegistry,
    ) -> HubResult<H256> {
        let protocol_id = op_data.protocol_id;
        if !self.is_admitted(protocol_id) {
            return Err(HubError::ProtocolIsNotAllowed(protocol_id));
        }
        if !self.is_allowed_transmitter(protocol_id, caller) {
            return Err(HubError::TransmitterIsNotAllowed(caller));
        }
        op_data.validate().map_err(|e| match e {
            photon_types::Error::ParamsTooBig(n) => HubError::ParamsTooBig(n),
            _ => HubError::AddrTooBig(op_data.protocol_addr.len()),
        })?;
        if !registry.is_allowed_protocol_address(
            protocol_id,
            op_data.dest_chain_id,
            &op_data.protocol_addr,
        ) {
            return Err(HubError::ProtocolIsNotAllowed(protocol_id));
        }
        if registry.gov_address(op_data.dest_chain_id).is_none() {
            return Err(HubError::InvalidChainId(op_data.dest_chain_id));
        }

        let op_hash = eth_signed_digest(op_data.msg_hash());
        let recovered = signature
            .recover_prehash(op_hash)
            .map_err(|_| HubError::SignatureCheckFailed)?;
        if recovered != caller {
            return Err(HubError::SignatureCheckFailed);
        }

        if let Some(op) = self.ops.get(&op_hash) {
            if op.approved && current_block > op.approve_block + 1 {
                return Err(HubError::OperationIsAlreadyApproved(op_hash));
            }
            if op.proofs.iter().any(|p| p.transmitter == caller) {
                return Err(HubError::TransmitterIsAlreadyApproved(op_hash));
            }
        }
        Ok(op_hash)
    }

    /// Records a validated proof, rotating stale proofs across a round
    /// boundary, and flips the operation to approved when the proof
    /// count clears the consensus target rate.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn record_proof(
        &mut self,
        caller: Address,
        op_data: OperationData,
        signature: Signature,
        op_hash: H256,
        current_block: u64,
        current_round: RoundId,
        registry: &ProtocolRegistry,
        bets: &mut BetBook,
        staking: &mut StakingLedger,
        agents: &AgentDirectory,
        events: &mut Vec<Event>,
    ) -> HubResult<()> {
        let protocol_id = op_data.protocol_id;
        if !self.ops.contains_key(&op_hash) {
            self.ops.insert(
                op_hash,
                Operation {
                    data: op_data,
                    approved: false,
                    executed: false,
                    round: current_round,
                    approve_block: 0,
                    proofs: Vec::new(),
                    watchers: Vec::new(),
                },
            );
            info!(%op_hash, ?protocol_id, "new operation");
            events.push(Event::NewOperation {
                protocol_id,
                op_hash,
            });
        } else {
            let needs_rotation = {
                let op = &self.ops[&op_hash];
                !op.approved && op.round != current_round
            };
            if needs_rotation {
                let old_proofs = self.ops.get_mut(&op_hash).expect("present").proofs.clone();
                let allowed = self.transmitters(protocol_id).to_vec();
                let mut kept = Vec::with_capacity(old_proofs.len());
                for proof in old_proofs {
                    if allowed.contains(&proof.transmitter) {
                        kept.push(proof);
                    } else {
                        bets.refund_bet(
                            protocol_id,
                            op_hash,
                            proof.transmitter,
                            staking,
                            registry,
                            agents,
                        )?;
                        trace!(%op_hash, transmitter = %proof.transmitter, "stale proof dropped");
                    }
                }
                let op = self.ops.get_mut(&op_hash).expect("present");
                op.proofs = kept;
                op.round = current_round;
            }
        }

        let transmitter_count = self.transmitters(protocol_id).len();
        let rate = registry.consensus_target_rate(protocol_id);
        let op = self.ops.get_mut(&op_hash).expect("present");
        op.proofs.push(Proof {
            transmitter: caller,
            signature,
        });
        events.push(Event::NewProof {
            op_hash,
            transmitter: caller,
        });

        if !op.approved
            && transmitter_count > 0
            && op.proofs.len() as u64 * u64::from(RATE_DENOMINATOR)
                >= u64::from(rate) * transmitter_count as u64
        {
            op.approved = true;
            op.approve_block = current_block;
            info!(%op_hash, proofs = op.proofs.len(), "proposal approved");
            events.push(Event::ProposalApproved {
                op_hash,
                proofs_count: op.proofs.len(),
            });
        }
        Ok(())
    }

    // --- Watcher confirmation ---

    /// Records one watcher's execution confirmation.
    ///
    /// Confirming an already-executed operation is a silent no-op so
    /// racing watchers are not penalized. When the confirmation count
    /// clears the watcher rate the operation executes: the in-order
    /// nonce advances and the settlement is returned for bet release.
    pub(crate) fn record_watcher_confirmation(
        &mut self,
        watcher: Address,
        op_hash: H256,
        events: &mut Vec<Event>,
    ) -> HubResult<Option<ExecutionSettlement>> {
        if !self.is_allowed_watcher(watcher) {
            return Err(HubError::WatcherIsNotAllowed(watcher));
        }
        let total_watchers = self.watcher_count();
        let rate = self.watchers_consensus_rate;
        let op = self
            .ops
            .get_mut(&op_hash)
            .ok_or(HubError::OperationNotFound(op_hash))?;
        if op.executed {
            return Ok(None);
        }
        if !op.approved {
            return Err(HubError::OpIsNotApproved(op_hash));
        }
        if op.watchers.contains(&watcher) {
            return Err(HubError::WatcherIsAlreadyApproved(op_hash));
        }
        op.watchers.push(watcher);
        trace!(%op_hash, %watcher, confirmations = op.watchers.len(), "watcher confirmation");

        if total_watchers > 0
            && op.watchers.len() as u64 * u64::from(RATE_DENOMINATOR)
                >= u64::from(rate) * total_watchers as u64
        {
            op.executed = true;
            let protocol_id = op.data.protocol_id;
            let winners = op.proofed_transmitters();
            if op.data.meta.in_order() {
                let nonce = op.data.nonce;
                let src_chain = op.data.src_chain_id;
                self.last_executed_nonce_in_order
                    .entry(protocol_id)
                    .or_default()
                    .insert(src_chain, nonce);
            }
            info!(%op_hash, "proposal executed");
            events.push(Event::ProposalExecuted { op_hash });
            return Ok(Some(ExecutionSettlement {
                protocol_id,
                winners,
            }));
        }
        Ok(None)
    }

    // --- Transmitter set maintenance ---

    /// Replaces a protocol's transmitter set, reconciling the watcher
    /// refcounts and propagating the narrowest governance message to
    /// every chain the protocol lives on.
    pub(crate) fn update_transmitters(
        &mut self,
        protocol_id: ProtocolId,
        new_set: Vec<Address>,
        registry: &mut ProtocolRegistry,
        outbox: &mut Outbox,
        events: &mut Vec<Event>,
    ) {
        let old_set = self
            .allowed_transmitters
            .get(&protocol_id)
            .cloned()
            .unwrap_or_default();
        let added: Vec<Address> = new_set
            .iter()
            .filter(|t| !old_set.contains(t))
            .copied()
            .collect();
        let removed: Vec<Address> = old_set
            .iter()
            .filter(|t| !new_set.contains(t))
            .copied()
            .collect();
        if added.is_empty() && removed.is_empty() {
            return;
        }
        for t in &added {
            *self.allowed_watchers.entry(*t).or_default() += 1;
        }
        for t in &removed {
            self.release_watcher(*t);
        }
        self.allowed_transmitters
            .insert(protocol_id, new_set.clone());
        debug!(?protocol_id, added = added.len(), removed = removed.len(), "transmitters updated");

        let chains: Vec<(ChainId, InitState)> = registry
            .protocol(protocol_id)
            .map(|p| {
                p.chain_ids()
                    .iter()
                    .map(|c| (*c, p.init_state(*c)))
                    .collect()
            })
            .unwrap_or_default();
        for (chain_id, state) in chains {
            match state {
                InitState::Inited => {
                    let Some(gov_addr) = registry.gov_address(chain_id).cloned() else {
                        continue;
                    };
                    let message = match (added.is_empty(), removed.is_empty()) {
                        (false, true) => GovMessage::AddTransmitters {
                            protocol_id,
                            transmitters: added.clone(),
                        },
                        (true, false) => GovMessage::RemoveTransmitters {
                            protocol_id,
                            transmitters: removed.clone(),
                        },
                        _ => GovMessage::UpdateTransmitters {
                            protocol_id,
                            to_add: added.clone(),
                            to_remove: removed.clone(),
                        },
                    };
                    outbox.emit(chain_id, gov_addr, message);
                }
                InitState::OnInition => {
                    registry.queue_pending_transmitters(protocol_id, chain_id, new_set.clone());
                }
                InitState::NotInited => {}
            }
        }
        events.push(Event::UpdateTransmitters {
            protocol_id,
            count: new_set.len(),
        });
    }

    /// Evicts one transmitter from a protocol, clearing its agent's
    /// declaration so participation requires re-declaration.
    pub(crate) fn remove_transmitter(
        &mut self,
        protocol_id: ProtocolId,
        transmitter: Address,
        registry: &mut ProtocolRegistry,
        agents: &mut AgentDirectory,
        outbox: &mut Outbox,
        events: &mut Vec<Event>,
    ) {
        let Some(set) = self.allowed_transmitters.get_mut(&protocol_id) else {
            return;
        };
        let before = set.len();
        set.retain(|t| *t != transmitter);
        if set.len() == before {
            return;
        }
        self.release_watcher(transmitter);
        agents.clear_by_transmitter(protocol_id, transmitter);
        warn!(?protocol_id, %transmitter, "transmitter removed");

        let chains: Vec<ChainId> = registry
            .protocol(protocol_id)
            .map(|p| {
                p.chain_ids()
                    .iter()
                    .filter(|c| p.init_state(**c) == InitState::Inited)
                    .copied()
                    .collect()
            })
            .unwrap_or_default();
        for chain_id in chains {
            if let Some(gov_addr) = registry.gov_address(chain_id).cloned() {
                outbox.emit(
                    chain_id,
                    gov_addr,
                    GovMessage::RemoveTransmitters {
                        protocol_id,
                        transmitters: vec![transmitter],
                    },
                );
            }
        }
        events.push(Event::RemoveTransmitter {
            protocol_id,
            transmitter,
        });
    }

    fn release_watcher(&mut self, transmitter: Address) {
        if let Some(count) = self.allowed_watchers.get_mut(&transmitter) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.allowed_watchers.remove(&transmitter);
            }
        }
    }
}

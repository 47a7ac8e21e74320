//! Data streaming consensus.
//!
//! Transmitters vote values for (protocol, source, key) triples. Each
//! voting window is anchored by a synthetic operation hash so votes carry
//! ordinary data bets; when enough distinct transmitters have voted and
//! the minimum interval elapsed, an executor finalizes the window through
//! a pluggable processing callback, the winners' bets release with
//! rewards, and the finalized datum lands in the master spotter.

use crate::agents::AgentDirectory;
use crate::bets::{BetBook, BetType};
use crate::events::Event;
use crate::merkle::{FinalizedData, MasterStreamSpotter};
use crate::protocols::ProtocolRegistry;
use crate::staking::StakingLedger;
use crate::{HubError, HubResult};
use photon_config::RATE_DENOMINATOR;
use photon_crypto::keccak256;
use photon_types::wire::Writer;
use photon_types::{Address, ProtocolId, SourceId, H256};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace};

/// Decides what a finalized window's value is and who won it.
///
/// `votes[i]` is the value voted by `voters[i]`, both in current
/// transmitter order. Returning `None` rejects the finalization and the
/// window stays open.
pub trait DataProcessor {
    /// Reduces a window's votes to a finalized value and the winners.
    fn finalize(
        &self,
        data_key: H256,
        votes: &[Vec<u8>],
        voters: &[Address],
    ) -> Option<(Vec<u8>, Vec<Address>)>;
}

/// Finalizes to the most-voted value; ties go to the value seen first in
/// transmitter order. Winners are the voters of the finalized value.
#[derive(Debug, Default, Clone, Copy)]
pub struct MajorityProcessor;

impl DataProcessor for MajorityProcessor {
    fn finalize(
        &self,
        _data_key: H256,
        votes: &[Vec<u8>],
        voters: &[Address],
    ) -> Option<(Vec<u8>, Vec<Address>)> {
        if votes.is_empty() {
            return None;
        }
        let mut best: Option<(&Vec<u8>, usize)> = None;
        for value in votes {
            let count = votes.iter().filter(|v| *v == value).count();
            match best {
                Some((_, best_count)) if best_count >= count => {}
                _ => best = Some((value, count)),
            }
        }
        let (winner_value, _) = best?;
        let winners: Vec<Address> = voters
            .iter()
            .zip(votes)
            .filter(|(_, v)| *v == winner_value)
            .map(|(a, _)| *a)
            .collect();
        Some((winner_value.clone(), winners))
    }
}

/// Stream consensus parameters for one protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamParams {
    /// Share of allowed transmitters required to finalize, scaled by
    /// 10000.
    pub consensus_rate: u32,
    /// Minimum seconds between window open and finalization.
    pub min_finalization_interval: u64,
}

impl Default for StreamParams {
    fn default() -> Self {
        Self {
            consensus_rate: 6_000,
            min_finalization_interval: 0,
        }
    }
}

/// One voting window for a data key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamAsset {
    /// Value accepted by the last finalization.
    pub accepted_value: Vec<u8>,
    /// Synthetic operation hash anchoring this window's bets.
    pub current_round_op_hash: H256,
    /// When the window opened.
    pub update_timestamp: u64,
    /// Distinct transmitters that voted this window.
    pub n_votes: u32,
}

/// One transmitter's vote within a window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentVote {
    /// The voted value.
    pub value: Vec<u8>,
    /// When the vote was cast or replaced.
    pub timestamp: u64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SpotterVotes {
    assets: HashMap<H256, StreamAsset>,
    votes: HashMap<H256, HashMap<Address, AgentVote>>,
    participants: HashMap<H256, HashSet<Address>>,
}

/// Vote tallying across all stream spotters.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StreamConsensus {
    spotters: HashMap<ProtocolId, HashMap<SourceId, SpotterVotes>>,
    params: HashMap<ProtocolId, StreamParams>,
    pending_params: HashMap<ProtocolId, StreamParams>,
}

impl StreamConsensus {
    /// Creates an empty stream consensus engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parameters in force for a protocol.
    pub fn params(&self, protocol_id: ProtocolId) -> StreamParams {
        self.params.get(&protocol_id).copied().unwrap_or_default()
    }

    /// Stages new parameters; they apply at the next round turn.
    pub(crate) fn set_params(&mut self, protocol_id: ProtocolId, params: StreamParams) -> HubResult<()> {
        if params.consensus_rate == 0 || params.consensus_rate > RATE_DENOMINATOR {
            return Err(HubError::InvalidConsensusRate(params.consensus_rate));
        }
        self.pending_params.insert(protocol_id, params);
        Ok(())
    }

    /// The open window for a key, if any.
    pub fn asset(
        &self,
        protocol_id: ProtocolId,
        source_id: SourceId,
        data_key: H256,
    ) -> Option<&StreamAsset> {
        self.spotters
            .get(&protocol_id)
            .and_then(|m| m.get(&source_id))
            .and_then(|s| s.assets.get(&data_key))
    }

    /// A transmitter's live vote for a key, if any.
    pub fn vote_of(
        &self,
        protocol_id: ProtocolId,
        source_id: SourceId,
        data_key: H256,
        transmitter: Address,
    ) -> Option<&AgentVote> {
        self.spotters
            .get(&protocol_id)
            .and_then(|m| m.get(&source_id))
            .and_then(|s| s.votes.get(&data_key))
            .and_then(|v| v.get(&transmitter))
    }

    /// Records one transmitter's vote for a key, placing a data bet on
    /// the window's anchor hash for first-time participants. Re-votes
    /// within a window replace the stored value.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn propose_data(
        &mut self,
        caller: Address,
        protocol_id: ProtocolId,
        source_id: SourceId,
        data_key: H256,
        value: Vec<u8>,
        now: u64,
        allowed_transmitters: &[Address],
        registry: &ProtocolRegistry,
        staking: &mut StakingLedger,
        agents: &AgentDirectory,
        bets: &mut BetBook,
        events: &mut Vec<Event>,
    ) -> HubResult<()> {
        if !allowed_transmitters.contains(&caller) {
            return Err(HubError::TransmitterIsNotAllowed(caller));
        }
        let params = self.params(protocol_id);
        let spotter = self
            .spotters
            .entry(protocol_id)
            .or_default()
            .entry(source_id)
            .or_default();
        let asset = spotter.assets.entry(data_key).or_insert_with(|| {
            let op_hash = window_op_hash(protocol_id, source_id, data_key, now);
            trace!(?protocol_id, %data_key, "stream window opened");
            StreamAsset {
                accepted_value: Vec::new(),
                current_round_op_hash: op_hash,
                update_timestamp: now,
                n_votes: 0,
            }
        });
        let op_hash = asset.current_round_op_hash;
        let window_start = asset.update_timestamp;
        let fresh_voter = spotter
            .participants
            .entry(data_key)
            .or_default()
            .insert(caller);
        if fresh_voter {
            bets.place_bet(
                protocol_id,
                caller,
                BetType::Data,
                op_hash,
                now,
                allowed_transmitters,
                registry,
                staking,
                agents,
            )?;
            let asset = spotter.assets.get_mut(&data_key).expect("present");
            asset.n_votes += 1;
        }
        spotter
            .votes
            .entry(data_key)
            .or_default()
            .insert(caller, AgentVote { value, timestamp: now });

        let n_votes = spotter.assets[&data_key].n_votes;
        let reached = consensus_reached(n_votes, allowed_transmitters.len(), params.consensus_rate);
        if reached && now >= window_start + params.min_finalization_interval {
            events.push(Event::ConsensusReadyToFinalize {
                protocol_id,
                source_id,
                data_key,
            });
        }
        Ok(())
    }

    /// Finalizes a window through the processing callback, releasing the
    /// winners' bets and pushing the datum to the master spotter.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn finalize_data(
        &mut self,
        protocol_id: ProtocolId,
        source_id: SourceId,
        data_key: H256,
        now: u64,
        processor: &dyn DataProcessor,
        allowed_transmitters: &[Address],
        master: &mut MasterStreamSpotter,
        events: &mut Vec<Event>,
    ) -> HubResult<(H256, Vec<Address>)> {
        let params = self.params(protocol_id);
        let spotter = self
            .spotters
            .get_mut(&protocol_id)
            .and_then(|m| m.get_mut(&source_id))
            .ok_or(HubError::NotEnoughTransmittersHaveVoted)?;
        let asset = spotter
            .assets
            .get(&data_key)
            .ok_or(HubError::NotEnoughTransmittersHaveVoted)?;
        if now < asset.update_timestamp + params.min_finalization_interval {
            return Err(HubError::NotEnoughTimeHasPassed);
        }
        if !consensus_reached(asset.n_votes, allowed_transmitters.len(), params.consensus_rate) {
            return Err(HubError::NotEnoughTransmittersHaveVoted);
        }

        let window_votes = spotter.votes.get(&data_key).cloned().unwrap_or_default();
        let mut voters = Vec::with_capacity(window_votes.len());
        let mut values = Vec::with_capacity(window_votes.len());
        for t in allowed_transmitters {
            if let Some(vote) = window_votes.get(t) {
                voters.push(*t);
                values.push(vote.value.clone());
            }
        }
        let (finalized, winners) = processor
            .finalize(data_key, &values, &voters)
            .ok_or(HubError::FinalizationRejected)?;

        // Record with the master first: a rejected key must leave the
        // window untouched.
        master.push_finalized(
            protocol_id,
            source_id,
            FinalizedData {
                timestamp: now,
                finalized_data: finalized.clone(),
                data_key,
            },
        )?;

        let asset = spotter.assets.get_mut(&data_key).expect("present");
        let settled_op_hash = asset.current_round_op_hash;
        asset.accepted_value = finalized;
        asset.update_timestamp = now;
        asset.n_votes = 0;
        asset.current_round_op_hash = window_op_hash(protocol_id, source_id, data_key, now);
        spotter.votes.remove(&data_key);
        spotter.participants.remove(&data_key);
        debug!(?protocol_id, %data_key, winners = winners.len(), "data finalized");
        events.push(Event::DataFinalized {
            protocol_id,
            source_id,
            data_key,
        });
        Ok((settled_op_hash, winners))
    }

    /// Applies parameters staged during the round.
    pub(crate) fn turn_round(&mut self) {
        for (protocol_id, params) in std::mem::take(&mut self.pending_params) {
            self.params.insert(protocol_id, params);
        }
    }
}

fn consensus_reached(n_votes: u32, transmitter_count: usize, rate: u32) -> bool {
    transmitter_count > 0
        && u64::from(n_votes) * u64::from(RATE_DENOMINATOR)
            >= u64::from(rate) * transmitter_count as u64
}

/// Anchor hash of a voting window:
/// `keccak(protocolId || sourceId || dataKey || updateTimestamp)`.
fn window_op_hash(
    protocol_id: ProtocolId,
    source_id: SourceId,
    data_key: H256,
    timestamp: u64,
) -> H256 {
    let mut w = Writer::with_capacity(128);
    w.put_protocol_id(protocol_id)
        .put_bytes(source_id.as_bytes())
        .put_bytes(data_key.as_bytes())
        .put_u64_as_u256(timestamp);
    keccak256(&w.finish())
}

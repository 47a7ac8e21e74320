//! Finalized-data snapshots and Merkle roots.
//!
//! The master spotter holds, per (protocol, source), the latest finalized
//! datum for each key and periodically commits them into one Merkle root.
//! Leaves are `keccak(keccak(encode(datum)))`, sorted ascending as
//! 256-bit big-endian integers; the tree is complete and binary with the
//! leaves at the tail of the node array and every internal node hashed as
//! `keccak(min || max)`. Identical inputs therefore yield a byte-identical
//! root in any implementation.

use crate::events::Event;
use crate::{HubError, HubResult};
use photon_crypto::{keccak256, keccak256_concat};
use photon_types::wire::Writer;
use photon_types::{ProtocolId, SourceId, H256};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// One finalized stream datum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizedData {
    /// Finalization time.
    pub timestamp: u64,
    /// The finalized bytes.
    pub finalized_data: Vec<u8>,
    /// Key the datum belongs to.
    pub data_key: H256,
}

impl FinalizedData {
    /// Canonical encoding hashed into a Merkle leaf.
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::with_capacity(40 + self.finalized_data.len());
        w.put_u64(self.timestamp)
            .put_bytes(self.data_key.as_bytes())
            .put_bytes(&self.finalized_data);
        w.finish()
    }

    /// The Merkle leaf for this datum: a double keccak of the encoding.
    pub fn leaf(&self) -> H256 {
        keccak256(keccak256(&self.encode()).as_bytes())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SpotterState {
    allowed_keys: Vec<H256>,
    only_allowed_keys: bool,
    merkle_root: H256,
    finalized: HashMap<H256, FinalizedData>,
    latest_snapshot: HashMap<H256, FinalizedData>,
    finalizations_since_root: u32,
}

/// Per-(protocol, source) registry of finalized data and Merkle roots.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct MasterStreamSpotter {
    spotters: HashMap<ProtocolId, HashMap<SourceId, SpotterState>>,
}

impl MasterStreamSpotter {
    /// Creates an empty master spotter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a spotter for (protocol, source) with its allowed keys.
    ///
    /// With `only_allowed_keys`, pushes for keys outside the list are
    /// rejected; otherwise the list only orders the Merkle leaves and
    /// unknown keys are accepted.
    pub(crate) fn set_allowed_keys(
        &mut self,
        protocol_id: ProtocolId,
        source_id: SourceId,
        allowed_keys: Vec<H256>,
        only_allowed_keys: bool,
        events: &mut Vec<Event>,
    ) {
        let per_protocol = self.spotters.entry(protocol_id).or_default();
        let fresh = !per_protocol.contains_key(&source_id);
        let state = per_protocol.entry(source_id).or_default();
        state.allowed_keys = allowed_keys;
        state.only_allowed_keys = only_allowed_keys;
        if fresh {
            info!(?protocol_id, ?source_id, "stream data spotter created");
            events.push(Event::NewStreamDataSpotter {
                protocol_id,
                source_id,
            });
        }
    }

    /// The latest Merkle root of a spotter.
    pub fn merkle_root(&self, protocol_id: ProtocolId, source_id: SourceId) -> Option<H256> {
        self.state(protocol_id, source_id).map(|s| s.merkle_root)
    }

    /// The latest finalized datum for a key.
    pub fn finalized_data(
        &self,
        protocol_id: ProtocolId,
        source_id: SourceId,
        data_key: H256,
    ) -> Option<&FinalizedData> {
        self.state(protocol_id, source_id)
            .and_then(|s| s.finalized.get(&data_key))
    }

    /// The snapshot the latest root was computed over.
    pub fn latest_snapshot(
        &self,
        protocol_id: ProtocolId,
        source_id: SourceId,
        data_key: H256,
    ) -> Option<&FinalizedData> {
        self.state(protocol_id, source_id)
            .and_then(|s| s.latest_snapshot.get(&data_key))
    }

    fn state(&self, protocol_id: ProtocolId, source_id: SourceId) -> Option<&SpotterState> {
        self.spotters
            .get(&protocol_id)
            .and_then(|m| m.get(&source_id))
    }

    /// Records a finalized datum. Stream-consensus capability.
    pub(crate) fn push_finalized(
        &mut self,
        protocol_id: ProtocolId,
        source_id: SourceId,
        datum: FinalizedData,
    ) -> HubResult<()> {
        let state = self
            .spotters
            .entry(protocol_id)
            .or_default()
            .entry(source_id)
            .or_default();
        if state.only_allowed_keys && !state.allowed_keys.contains(&datum.data_key) {
            return Err(HubError::DataKeyNotAllowed);
        }
        state.finalized.insert(datum.data_key, datum);
        state.finalizations_since_root += 1;
        Ok(())
    }

    /// Recomputes the Merkle root over the latest finalized data and
    /// snapshots the inputs. Rejected when nothing was finalized since
    /// the previous root.
    pub fn recalculate_merkle_root(
        &mut self,
        protocol_id: ProtocolId,
        source_id: SourceId,
        events: &mut Vec<Event>,
    ) -> HubResult<H256> {
        let state = self
            .spotters
            .get_mut(&protocol_id)
            .and_then(|m| m.get_mut(&source_id))
            .ok_or(HubError::NothingToSnapshot)?;
        if state.finalizations_since_root == 0 {
            return Err(HubError::NothingToSnapshot);
        }
        let keys: Vec<H256> = if state.allowed_keys.is_empty() {
            let mut all: Vec<H256> = state.finalized.keys().copied().collect();
            all.sort();
            all
        } else {
            state.allowed_keys.clone()
        };
        let mut leaves: Vec<H256> = keys
            .iter()
            .filter_map(|k| state.finalized.get(k))
            .map(FinalizedData::leaf)
            .collect();
        let root = calc_merkle_root(&mut leaves);
        state.merkle_root = root;
        state.latest_snapshot = state.finalized.clone();
        state.finalizations_since_root = 0;
        debug!(?protocol_id, ?source_id, %root, "merkle root recalculated");
        events.push(Event::NewMerkleRoot {
            protocol_id,
            source_id,
            root,
        });
        Ok(root)
    }
}

/// Computes the deterministic Merkle root of a leaf set.
///
/// Leaves are sorted ascending (byte order equals 256-bit big-endian
/// numeric order), placed at the tail of a complete binary tree, and
/// parents hash as `keccak(min || max)`. An empty set yields the zero
/// hash.
pub fn calc_merkle_root(leaves: &mut [H256]) -> H256 {
    if leaves.is_empty() {
        return H256::ZERO;
    }
    leaves.sort();
    let n = leaves.len();
    if n == 1 {
        return leaves[0];
    }
    let mut tree = vec![H256::ZERO; 2 * n - 1];
    tree[n - 1..].copy_from_slice(leaves);
    for i in (0..n - 1).rev() {
        let left = tree[2 * i + 1];
        let right = tree[2 * i + 2];
        let (lo, hi) = if left <= right {
            (left, right)
        } else {
            (right, left)
        };
        tree[i] = keccak256_concat(&[lo.as_bytes(), hi.as_bytes()]);
    }
    tree[0]
}

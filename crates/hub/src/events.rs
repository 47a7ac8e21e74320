//! Events emitted by the hub.
//!
//! Every observable state transition emits one of these records. The hub
//! accumulates them per transaction; the host drains the queue with
//! [`crate::Hub::drain_events`] after each call. Payloads carry
//! identifiers only.

use photon_types::{Address, ChainId, ProtocolId, RoundId, SourceId, H256};
use serde::{Deserialize, Serialize};

/// An observable hub state transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum Event {
    // Operation lifecycle
    NewOperation { protocol_id: ProtocolId, op_hash: H256 },
    NewProof { op_hash: H256, transmitter: Address },
    ProposalApproved { op_hash: H256, proofs_count: usize },
    ProposalExecuted { op_hash: H256 },

    // Protocol governance
    AddAllowedProtocol { protocol_id: ProtocolId, owner: Address },
    SetProtocolPause { protocol_id: ProtocolId, paused: bool },
    AddAllowedProtocolAddress { protocol_id: ProtocolId, chain_id: ChainId },
    RemoveAllowedProtocolAddress { protocol_id: ProtocolId, chain_id: ChainId },
    AddAllowedProposerAddress { protocol_id: ProtocolId, chain_id: ChainId },
    RemoveAllowedProposerAddress { protocol_id: ProtocolId, chain_id: ChainId },
    UpdateTransmitters { protocol_id: ProtocolId, count: usize },
    RemoveTransmitter { protocol_id: ProtocolId, transmitter: Address },
    AddExecutor { protocol_id: ProtocolId, chain_id: ChainId },
    RemoveExecutor { protocol_id: ProtocolId, chain_id: ChainId },
    SetConsensusTargetRate { protocol_id: ProtocolId, rate: u32 },

    // Staking
    Delegate { delegator: Address, agent: Address, amount: u128 },
    Withdraw { delegator: Address, agent: Address, amount: u128 },
    Redelegate { delegator: Address, from: Address, to: Address, amount: u128 },
    RewardClaimed { delegator: Address, agent: Address, amount: u128 },
    AgentRewardClaimed { agent: Address, amount: u128 },
    UpdateFee { agent: Address, fee: u32 },
    DepositPersonalStake { agent: Address, amount: u128 },
    RequestWithdrawPersonalStake { agent: Address, amount: u128 },
    CancelWithdrawPersonalStake { agent: Address, amount: u128 },
    WithdrawPersonalStake { agent: Address, amount: u128 },
    Slashed { agent: Address, amount: u128, round: RoundId },

    // Data streaming
    NewStreamDataSpotter { protocol_id: ProtocolId, source_id: SourceId },
    DataFinalized { protocol_id: ProtocolId, source_id: SourceId, data_key: H256 },
    NewMerkleRoot { protocol_id: ProtocolId, source_id: SourceId, root: H256 },
    ConsensusReadyToFinalize { protocol_id: ProtocolId, source_id: SourceId, data_key: H256 },

    // Rounds
    RoundTurned { round: RoundId },
}

//! # Photon Hub
//!
//! The hub-side operational consensus engine and the economics that drive
//! it. A fleet of off-chain transmitters observes operations emitted on
//! source chains and relays them here; the hub
//!
//! - aggregates transmitter signatures into per-operation consensus
//!   proofs ([`operations`]),
//! - records execution confirmations from watchers,
//! - manages per-protocol staking, bets, rewards, and slashing for
//!   transmitters ([`staking`], [`bets`]),
//! - and propagates governance changes out to per-chain endpoints through
//!   the protocol's own messaging layer ([`endpoint`]).
//!
//! ## Transaction model
//!
//! The engine is single-threaded with strictly-ordered transactions: each
//! entry point on [`Hub`] executes atomically from start to finish, and
//! cross-transaction ordering is whatever order the host feeds calls in.
//! Time and block height are an explicit [`BlockEnv`] the host sets
//! before each batch; nothing reads ambient clocks.
//!
//! ## Component graph
//!
//! ```text
//!                      ┌──────────────┐
//!   transmitters ─────▶│ Operation    │────▶ BetBook ───▶ StakingLedger
//!                      │ Registry     │         │              │
//!   watchers ─────────▶│ (proofs,     │         ▼              ▼
//!                      │  execution)  │   ProtocolRegistry  OrderedList
//!                      └──────┬───────┘         │         (agent ranks)
//!                             │                 ▼
//!   data feeds ──▶ Stream ────┘            EndpointEmitter ──▶ outbox
//!                  Consensus
//! ```
//!
//! Cross-component flows take disjoint `&mut` borrows of sibling
//! components; capabilities such as "only the bet book may lock stake"
//! are `pub(crate)` method positions rather than runtime role sets.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod agents;
pub mod bets;
pub mod endpoint;
pub mod error;
pub mod events;
pub mod hub;
pub mod ledger;
pub mod merkle;
pub mod operations;
pub mod ordered_list;
pub mod protocols;
pub mod roles;
pub mod round;
pub mod staking;
pub mod stream;

pub use agents::AgentDirectory;
pub use bets::{AgentBetStats, Bet, BetBook, BetType, OpBetInfo};
pub use endpoint::Outbox;
pub use error::{HubError, HubResult};
pub use events::Event;
pub use hub::{BlockEnv, Hub};
pub use ledger::{InMemoryLedger, TokenLedger};
pub use merkle::{calc_merkle_root, FinalizedData, MasterStreamSpotter};
pub use operations::{
    ExecutionSettlement, Operation, OperationRegistry, Proof, DEFAULT_WATCHERS_CONSENSUS_RATE,
};
pub use ordered_list::{Order, OrderedList};
pub use protocols::{
    validate_params, InitState, ProtocolInfo, ProtocolParams, ProtocolRegistry, MIN_CONSENSUS_RATE,
};
pub use roles::Roles;
pub use round::RoundCoordinator;
pub use staking::{AgentInfo, DelegatorInfo, RoundReward, StakingLedger};
pub use stream::{
    AgentVote, DataProcessor, MajorityProcessor, StreamAsset, StreamConsensus, StreamParams,
};

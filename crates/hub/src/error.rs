//! Error catalog for the hub engine.
//!
//! Errors are tagged kinds, never strings. Every entry point validates
//! first and mutates after, so a returned error implies no state change
//! for that transaction.

use photon_types::{Address, ChainId, ProtocolId, H256};

/// Result type alias for hub operations.
pub type HubResult<T> = std::result::Result<T, HubError>;

/// Every failure the hub can surface to a caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HubError {
    // --- Input validation ---
    /// Destination-chain address exceeds the 128-byte cap.
    #[error("destination address of {0} bytes exceeds the 128-byte cap")]
    AddrTooBig(usize),

    /// Operation params exceed the 4096-byte cap.
    #[error("operation params of {0} bytes exceed the 4096-byte cap")]
    ParamsTooBig(usize),

    /// No gov contract address is known for the chain.
    #[error("no gov address known for chain {0}")]
    InvalidChainId(ChainId),

    /// Zero, unknown, or already-taken protocol id.
    #[error("invalid protocol id {0}")]
    InvalidProtocolId(ProtocolId),

    /// A zero amount where a positive one is required.
    #[error("amount must be non-zero")]
    ZeroAmount,

    /// A zero address where a real identity is required.
    #[error("address must be non-zero")]
    ZeroAddress,

    /// Duplicate transmitter in a list or already claimed elsewhere.
    #[error("duplicate transmitter {0}")]
    DuplicateTransmitter(Address),

    /// Consensus target rate outside (5500, 10000].
    #[error("consensus target rate {0} outside (5500, 10000]")]
    InvalidConsensusRate(u32),

    /// Manual transmitter list larger than the consensus-safety cap.
    #[error("manual transmitter count {count} exceeds limit {limit}")]
    ManualTransmittersLimitExceeded {
        /// Offending count
        count: usize,
        /// Allowed maximum
        limit: usize,
    },

    /// Transmitter cap above the global or admin ceiling.
    #[error("max transmitters {0} exceeds the global cap")]
    MaxTransmittersExceeded(u32),

    /// Bet type differs from the one recorded for the operation.
    #[error("bet type mismatch for operation {0}")]
    BetTypeMismatch(H256),

    /// Stream data key is not in the allowed set.
    #[error("data key is not allowed for this spotter")]
    DataKeyNotAllowed,

    // --- Authorization ---
    /// Protocol unknown, inactive, or paused for this action.
    #[error("protocol {0} is not allowed")]
    ProtocolIsNotAllowed(ProtocolId),

    /// Protocol is paused.
    #[error("protocol {0} is paused")]
    ProtocolIsPaused(ProtocolId),

    /// Caller is not an allowed transmitter for the protocol.
    #[error("transmitter {0} is not allowed")]
    TransmitterIsNotAllowed(Address),

    /// Caller is not an allowed watcher.
    #[error("watcher {0} is not allowed")]
    WatcherIsNotAllowed(Address),

    /// Caller is not the protocol owner.
    #[error("caller {0} is not the protocol owner")]
    IsNotOwner(Address),

    /// Caller is not the registered stream spotter executor.
    #[error("caller {0} is not the spotter")]
    CallerIsNotSpotter(Address),

    /// Caller lacks the admin role.
    #[error("caller {0} is not the admin")]
    IsNotAdmin(Address),

    /// Caller lacks the round-trigger role.
    #[error("caller {0} is not the round trigger")]
    IsNotRoundTrigger(Address),

    /// Caller lacks the pruner role.
    #[error("caller {0} is not the pruner")]
    IsNotPruner(Address),

    /// Caller lacks the endpoint role.
    #[error("caller {0} is not the endpoint")]
    IsNotEndpoint(Address),

    /// Caller is not the system fee collector.
    #[error("caller {0} is not the fee collector")]
    IsNotFeeCollector(Address),

    /// Caller is not an approved external developer.
    #[error("caller {0} is not an approved developer")]
    IsNotApprovedDeveloper(Address),

    // --- State / invariant ---
    /// Protocol has not been admitted to the hub.
    #[error("protocol {0} is not inited")]
    ProtocolIsNotInited(ProtocolId),

    /// Protocol has no init state on the chain.
    #[error("protocol {protocol_id} is not inited on chain {chain_id}")]
    ProtocolIsNotInitedOnChain {
        /// Protocol concerned
        protocol_id: ProtocolId,
        /// Chain concerned
        chain_id: ChainId,
    },

    /// Proof arrived after the approval grace window.
    #[error("operation {0} is already approved")]
    OperationIsAlreadyApproved(H256),

    /// Transmitter already contributed a proof to the operation.
    #[error("transmitter already proved operation {0}")]
    TransmitterIsAlreadyApproved(H256),

    /// Watcher already confirmed the operation.
    #[error("watcher already approved operation {0}")]
    WatcherIsAlreadyApproved(H256),

    /// Operation exists but has not reached consensus.
    #[error("operation {0} is not approved")]
    OpIsNotApproved(H256),

    /// Operation is unknown to the registry.
    #[error("operation {0} not found")]
    OperationNotFound(H256),

    /// No agent is registered under the address.
    #[error("agent {0} not found")]
    AgentNotFound(Address),

    /// Agent already declared support for the protocol.
    #[error("support already declared for this protocol")]
    SupportAlreadyDeclared,

    /// Agent has no support declaration for the protocol.
    #[error("support not declared for this protocol")]
    SupportNotDeclared,

    /// Agent is not in the approved set.
    #[error("agent {0} is not approved")]
    NotApprovedAgent(Address),

    /// Agent exists but is not active for this action.
    #[error("agent {0} is not active")]
    AgentNotActive(Address),

    /// Removing the last gov executor on a chain is forbidden.
    #[error("cannot remove the last gov executor on chain {0}")]
    LastGovExecutor(ChainId),

    /// No finalizations since the last Merkle root.
    #[error("no finalized data since the last merkle root")]
    NothingToSnapshot,

    // --- Signature ---
    /// Recovered identity did not match the declared sender.
    #[error("signature check failed")]
    SignatureCheckFailed,

    // --- Economic ---
    /// Protocol or caller balance is insufficient.
    #[error("insufficient funds")]
    InsufficientFunds,

    /// Delegated stake is insufficient for the withdrawal.
    #[error("insufficient stake")]
    InsufficientStake,

    /// Personal stake is insufficient for the lock or cap.
    #[error("insufficient personal stake")]
    InsufficientPersonalStake,

    /// Unlock amount exceeds the locked balance.
    #[error("unlock exceeds locked stake")]
    UnlockTooMuch,

    /// Withdraw request exceeds personal plus locked stake.
    #[error("withdraw request exceeds available stake")]
    TryingToWithdrawTooMuch,

    /// No withdraw request is pending.
    #[error("no withdraw requested")]
    NoWithdrawRequested,

    /// Fee rate outside 0..=10000.
    #[error("invalid fee rate {0}")]
    InvalidFeeRate(u32),

    /// Replacement global configuration failed validation.
    #[error("invalid configuration")]
    InvalidConfig,

    // --- Timing ---
    /// Round turn attempted before the minimum interval elapsed.
    #[error("minimum round time not reached")]
    MinRoundTimeNotReached,

    /// Stream finalization attempted before the minimum interval elapsed.
    #[error("not enough time has passed")]
    NotEnoughTimeHasPassed,

    /// Bet prune attempted before the bet timeout elapsed.
    #[error("bet timeout not elapsed")]
    TimeoutNotElapsed,

    /// Stream finalization attempted below the vote threshold.
    #[error("not enough transmitters have voted")]
    NotEnoughTransmittersHaveVoted,

    /// The processing callback rejected the window.
    #[error("data finalization rejected by the processing callback")]
    FinalizationRejected,

    /// No bet exists for the (agent, operation) pair.
    #[error("bet not found")]
    BetNotFound,
}

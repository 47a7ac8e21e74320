//! Shared test harness: a hub wired with a funded ledger, a registered
//! protocol, staked agents, and elected transmitters.

#![allow(dead_code)]

use parking_lot::Mutex;
use photon_config::GlobalConfig;
use photon_crypto::{eth_signed_digest, PrivateKey, Signature};
use photon_hub::{
    BlockEnv, Hub, InMemoryLedger, ProtocolParams, Roles, TokenLedger,
};
use photon_types::{
    Address, ChainId, FunctionSelector, OpMeta, OpaqueAddr, OperationData, ProtocolId, H256,
};
use alloy_primitives::U256;
use std::sync::Arc;

pub const ADMIN: Address = Address::new([0xA1; 20]);
pub const TRIGGER: Address = Address::new([0xA2; 20]);
pub const PRUNER: Address = Address::new([0xA3; 20]);
pub const EXECUTOR: Address = Address::new([0xA4; 20]);
pub const ENDPOINT: Address = Address::new([0xA5; 20]);
pub const OWNER: Address = Address::new([0xB1; 20]);
pub const FEE_COLLECTOR: Address = Address::new([0xB2; 20]);

/// Destination chain every test operation targets.
pub fn dest_chain() -> ChainId {
    U256::from(137u64)
}

/// Source chain test operations claim to come from.
pub fn src_chain() -> ChainId {
    U256::from(1u64)
}

/// The protocol contract address whitelisted on the destination chain.
pub fn protocol_addr() -> OpaqueAddr {
    OpaqueAddr::new(vec![0xCC; 20]).unwrap()
}

/// A ledger handle that stays inspectable after the hub takes ownership.
#[derive(Clone)]
pub struct SharedLedger(pub Arc<Mutex<InMemoryLedger>>);

impl SharedLedger {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(InMemoryLedger::new())))
    }

    pub fn mint(&self, to: Address, amount: u128) {
        self.0.lock().mint(to, amount);
    }

    pub fn balance_of(&self, addr: Address) -> u128 {
        self.0.lock().balance_of(addr)
    }
}

impl TokenLedger for SharedLedger {
    fn transfer_in(&mut self, from: Address, amount: u128) -> bool {
        self.0.lock().transfer_in(from, amount)
    }

    fn transfer_out(&mut self, to: Address, amount: u128) {
        self.0.lock().transfer_out(to, amount)
    }
}

pub struct TestHub {
    pub hub: Hub,
    pub ledger: SharedLedger,
    pub protocol_id: ProtocolId,
    /// keys[0] is the manual transmitter; keys[1..] belong to agents.
    pub keys: Vec<PrivateKey>,
    /// agents[i] operates keys[i + 1].
    pub agents: Vec<Address>,
}

impl TestHub {
    pub fn transmitter(&self, i: usize) -> Address {
        self.keys[i].address()
    }

    pub fn transmitters(&self) -> Vec<Address> {
        self.keys.iter().map(|k| k.address()).collect()
    }

    pub fn advance_block(&mut self, blocks: u64) {
        let env = self.hub.env();
        self.hub.set_env(BlockEnv {
            number: env.number + blocks,
            timestamp: env.timestamp + blocks * 6,
        });
    }

    pub fn advance_time(&mut self, secs: u64) {
        let env = self.hub.env();
        self.hub.set_env(BlockEnv {
            number: env.number + 1,
            timestamp: env.timestamp + secs,
        });
    }

    /// Builds an operation with the given nonce.
    pub fn sample_op(&self, nonce: u64, in_order: bool) -> OperationData {
        OperationData {
            protocol_id: self.protocol_id,
            meta: OpMeta::default().with_version(1).with_in_order(in_order),
            src_chain_id: src_chain(),
            src_block_number: U256::from(500u64),
            src_op_tx_id: [0x42; 64],
            nonce: U256::from(nonce),
            dest_chain_id: dest_chain(),
            protocol_addr: protocol_addr(),
            function_selector: FunctionSelector::from_evm_tag([0xde, 0xad, 0xbe, 0xef]),
            params: vec![1, 2, 3, 4],
            reserved: Vec::new(),
        }
    }

    /// Signs an operation the way a transmitter would.
    pub fn sign_op(&self, key_index: usize, op: &OperationData) -> Signature {
        let digest = eth_signed_digest(op.msg_hash());
        self.keys[key_index].sign_prehash(digest).unwrap()
    }

    /// Proposes an operation signed by the indexed transmitter.
    pub fn propose(&mut self, key_index: usize, op: &OperationData) -> photon_hub::HubResult<H256> {
        let sig = self.sign_op(key_index, op);
        self.hub
            .propose_operation(self.transmitter(key_index), op.clone(), sig)
    }
}

pub fn default_params() -> ProtocolParams {
    ProtocolParams {
        msg_bet_amount: 10,
        data_bet_amount: 5,
        msg_bet_reward: 20,
        msg_bet_first_reward: 30,
        data_bet_reward: 8,
        data_bet_first_reward: 12,
        consensus_target_rate: 6_000,
        min_delegate_amount: 100,
        min_personal_amount: 50,
        max_transmitters: 10,
    }
}

pub fn test_config() -> GlobalConfig {
    GlobalConfig {
        fee_collector: FEE_COLLECTOR,
        slashing_border: 3,
        agent_reward_fee: 0,
        min_round_time: 0,
        ..Default::default()
    }
}

/// A hub with one protocol, one manual transmitter, and `n_agents` staked
/// agents whose transmitters have been elected by a first round turn.
pub fn setup(n_agents: usize) -> TestHub {
    setup_with(n_agents, test_config(), default_params())
}

pub fn setup_with(n_agents: usize, config: GlobalConfig, params: ProtocolParams) -> TestHub {
    let ledger = SharedLedger::new();
    let roles = Roles {
        admin: ADMIN,
        round_trigger: TRIGGER,
        pruner: PRUNER,
        executor: EXECUTOR,
        endpoint: ENDPOINT,
    };
    let mut hub = Hub::new(config, roles, Box::new(ledger.clone()));
    hub.set_env(BlockEnv {
        number: 1,
        timestamp: 1_000_000,
    });

    let protocol_id = ProtocolId::from_ascii(b"test-bridge").unwrap();
    let keys: Vec<PrivateKey> = (0..=n_agents).map(|_| PrivateKey::random()).collect();
    let manual = keys[0].address();

    ledger.mint(OWNER, 10_000_000);
    hub.approve_developer(ADMIN, OWNER).unwrap();
    hub.set_gov_address(ADMIN, dest_chain(), OpaqueAddr::new(vec![0xEE; 20]).unwrap())
        .unwrap();
    hub.register_protocol(OWNER, protocol_id, params, vec![manual])
        .unwrap();
    hub.deposit_protocol_balance(OWNER, protocol_id, 1_000_000)
        .unwrap();
    hub.add_allowed_protocol_address(OWNER, protocol_id, dest_chain(), protocol_addr())
        .unwrap();

    let mut agents = Vec::new();
    for i in 0..n_agents {
        let agent = Address::new([0x10 + i as u8; 20]);
        ledger.mint(agent, 1_000_000);
        hub.register_agent(ADMIN, agent).unwrap();
        hub.deposit_personal_stake(agent, 10_000).unwrap();
        hub.delegate(agent, agent, 1_000).unwrap();
        hub.declare_protocol_support(agent, protocol_id, keys[i + 1].address())
            .unwrap();
        agents.push(agent);
    }

    // First turn: snapshots the delegations and elects the transmitters.
    hub.turn_round(TRIGGER).unwrap();
    hub.drain_events();
    hub.drain_outbox();

    TestHub {
        hub,
        ledger,
        protocol_id,
        keys,
        agents,
    }
}

//! Outbound governance messages.
//!
//! Every admin change the hub propagates to a per-chain endpoint is one of
//! these messages, wrapped as a self-addressed propose-to-destination
//! payload. Selector tags are stable wire constants; payload bodies are
//! tight-packed big-endian records the core treats as opaque past this
//! point.

use crate::wire::Writer;
use crate::{Address, ChainId, FunctionSelector, OpaqueAddr, ProtocolId};
use serde::{Deserialize, Serialize};

/// Stable 4-byte EVM selector tags for governance calls.
pub mod selectors {
    /// `addAllowedProtocol`
    pub const ADD_ALLOWED_PROTOCOL: [u8; 4] = [0x45, 0xa0, 0x04, 0xb9];
    /// `addAllowedProtocolAddress`
    pub const ADD_ALLOWED_PROTOCOL_ADDRESS: [u8; 4] = [0xd2, 0x96, 0xa0, 0xff];
    /// `removeAllowedProtocolAddress`
    pub const REMOVE_ALLOWED_PROTOCOL_ADDRESS: [u8; 4] = [0xb0, 0xa4, 0xca, 0x98];
    /// `addAllowedProposerAddress`
    pub const ADD_ALLOWED_PROPOSER_ADDRESS: [u8; 4] = [0xce, 0x09, 0x40, 0xa5];
    /// `removeAllowedProposerAddress`
    pub const REMOVE_ALLOWED_PROPOSER_ADDRESS: [u8; 4] = [0xb8, 0xe5, 0xf3, 0xf4];
    /// `addExecutor`
    pub const ADD_EXECUTOR: [u8; 4] = [0xe0, 0xaa, 0xfb, 0x68];
    /// `removeExecutor`
    pub const REMOVE_EXECUTOR: [u8; 4] = [0x04, 0xfa, 0x38, 0x4a];
    /// `addTransmitters`
    pub const ADD_TRANSMITTERS: [u8; 4] = [0x6c, 0x5f, 0x56, 0x66];
    /// `removeTransmitters`
    pub const REMOVE_TRANSMITTERS: [u8; 4] = [0x52, 0x06, 0xda, 0x70];
    /// `updateTransmitters`
    pub const UPDATE_TRANSMITTERS: [u8; 4] = [0x65, 0x4b, 0x46, 0xe1];
    /// `setConsensusTargetRate`
    pub const SET_CONSENSUS_TARGET_RATE: [u8; 4] = [0x97, 0x0b, 0x61, 0x09];
}

/// A governance message bound for a destination-chain endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GovMessage {
    /// Admit a protocol on the destination chain.
    AddAllowedProtocol {
        /// Protocol being admitted.
        protocol_id: ProtocolId,
        /// Consensus target rate, scaled by 10000.
        consensus_target_rate: u32,
        /// Transmitters allowed at admission time.
        transmitters: Vec<Address>,
    },
    /// Whitelist a protocol contract address.
    AddAllowedProtocolAddress {
        /// Protocol the address belongs to.
        protocol_id: ProtocolId,
        /// The protocol contract address on the destination chain.
        actor: OpaqueAddr,
    },
    /// Remove a protocol contract address from the whitelist.
    RemoveAllowedProtocolAddress {
        /// Protocol the address belongs to.
        protocol_id: ProtocolId,
        /// The address being removed.
        actor: OpaqueAddr,
    },
    /// Whitelist a proposer address.
    AddAllowedProposerAddress {
        /// Protocol the proposer serves.
        protocol_id: ProtocolId,
        /// The proposer address.
        actor: OpaqueAddr,
    },
    /// Remove a proposer address from the whitelist.
    RemoveAllowedProposerAddress {
        /// Protocol the proposer served.
        protocol_id: ProtocolId,
        /// The address being removed.
        actor: OpaqueAddr,
    },
    /// Whitelist an executor.
    AddExecutor {
        /// Protocol the executor serves.
        protocol_id: ProtocolId,
        /// The executor address.
        executor: OpaqueAddr,
    },
    /// Remove an executor from the whitelist.
    RemoveExecutor {
        /// Protocol the executor served.
        protocol_id: ProtocolId,
        /// The address being removed.
        executor: OpaqueAddr,
    },
    /// Append transmitters to the destination's allowed set.
    AddTransmitters {
        /// Protocol the transmitters serve.
        protocol_id: ProtocolId,
        /// Transmitters being added.
        transmitters: Vec<Address>,
    },
    /// Remove transmitters from the destination's allowed set.
    RemoveTransmitters {
        /// Protocol the transmitters served.
        protocol_id: ProtocolId,
        /// Transmitters being removed.
        transmitters: Vec<Address>,
    },
    /// Combined add/remove of transmitters in one message.
    UpdateTransmitters {
        /// Protocol the transmitters serve.
        protocol_id: ProtocolId,
        /// Transmitters being added.
        to_add: Vec<Address>,
        /// Transmitters being removed.
        to_remove: Vec<Address>,
    },
    /// Change the destination's consensus target rate.
    SetConsensusTargetRate {
        /// Protocol affected.
        protocol_id: ProtocolId,
        /// New rate, scaled by 10000.
        consensus_target_rate: u32,
    },
    /// Hand protocol ownership to a new DAO owner.
    ///
    /// Carried for wire completeness; the destination defines its own
    /// dispatch tag, so this record has no entry in [`selectors`] and is
    /// not routed through the standard emission path.
    SetDaoProtocolOwner {
        /// Protocol affected.
        protocol_id: ProtocolId,
        /// New owner identity.
        protocol_owner: Address,
    },
}

impl GovMessage {
    /// Returns the stable EVM selector tag for this message, if it has one.
    pub fn selector_tag(&self) -> Option<[u8; 4]> {
        use selectors::*;
        Some(match self {
            Self::AddAllowedProtocol { .. } => ADD_ALLOWED_PROTOCOL,
            Self::AddAllowedProtocolAddress { .. } => ADD_ALLOWED_PROTOCOL_ADDRESS,
            Self::RemoveAllowedProtocolAddress { .. } => REMOVE_ALLOWED_PROTOCOL_ADDRESS,
            Self::AddAllowedProposerAddress { .. } => ADD_ALLOWED_PROPOSER_ADDRESS,
            Self::RemoveAllowedProposerAddress { .. } => REMOVE_ALLOWED_PROPOSER_ADDRESS,
            Self::AddExecutor { .. } => ADD_EXECUTOR,
            Self::RemoveExecutor { .. } => REMOVE_EXECUTOR,
            Self::AddTransmitters { .. } => ADD_TRANSMITTERS,
            Self::RemoveTransmitters { .. } => REMOVE_TRANSMITTERS,
            Self::UpdateTransmitters { .. } => UPDATE_TRANSMITTERS,
            Self::SetConsensusTargetRate { .. } => SET_CONSENSUS_TARGET_RATE,
            Self::SetDaoProtocolOwner { .. } => return None,
        })
    }

    /// Returns the protocol the message concerns.
    pub fn protocol_id(&self) -> ProtocolId {
        match self {
            Self::AddAllowedProtocol { protocol_id, .. }
            | Self::AddAllowedProtocolAddress { protocol_id, .. }
            | Self::RemoveAllowedProtocolAddress { protocol_id, .. }
            | Self::AddAllowedProposerAddress { protocol_id, .. }
            | Self::RemoveAllowedProposerAddress { protocol_id, .. }
            | Self::AddExecutor { protocol_id, .. }
            | Self::RemoveExecutor { protocol_id, .. }
            | Self::AddTransmitters { protocol_id, .. }
            | Self::RemoveTransmitters { protocol_id, .. }
            | Self::UpdateTransmitters { protocol_id, .. }
            | Self::SetConsensusTargetRate { protocol_id, .. }
            | Self::SetDaoProtocolOwner { protocol_id, .. } => *protocol_id,
        }
    }

    /// Encodes the payload body: the record carried as `params` of the
    /// outbound proposal.
    pub fn encode_params(&self) -> Vec<u8> {
        let mut w = Writer::new();
        match self {
            Self::AddAllowedProtocol {
                protocol_id,
                consensus_target_rate,
                transmitters,
            } => {
                w.put_protocol_id(*protocol_id)
                    .put_u32(*consensus_target_rate);
                put_address_list(&mut w, transmitters);
            }
            Self::AddAllowedProtocolAddress { protocol_id, actor }
            | Self::RemoveAllowedProtocolAddress { protocol_id, actor }
            | Self::AddAllowedProposerAddress { protocol_id, actor }
            | Self::RemoveAllowedProposerAddress { protocol_id, actor } => {
                w.put_protocol_id(*protocol_id);
                put_opaque(&mut w, actor);
            }
            Self::AddExecutor {
                protocol_id,
                executor,
            }
            | Self::RemoveExecutor {
                protocol_id,
                executor,
            } => {
                w.put_protocol_id(*protocol_id);
                put_opaque(&mut w, executor);
            }
            Self::AddTransmitters {
                protocol_id,
                transmitters,
            }
            | Self::RemoveTransmitters {
                protocol_id,
                transmitters,
            } => {
                w.put_protocol_id(*protocol_id);
                put_address_list(&mut w, transmitters);
            }
            Self::UpdateTransmitters {
                protocol_id,
                to_add,
                to_remove,
            } => {
                w.put_protocol_id(*protocol_id);
                put_address_list(&mut w, to_add);
                put_address_list(&mut w, to_remove);
            }
            Self::SetConsensusTargetRate {
                protocol_id,
                consensus_target_rate,
            } => {
                w.put_protocol_id(*protocol_id)
                    .put_u32(*consensus_target_rate);
            }
            Self::SetDaoProtocolOwner {
                protocol_id,
                protocol_owner,
            } => {
                w.put_protocol_id(*protocol_id).put_address(*protocol_owner);
            }
        }
        w.finish()
    }
}

fn put_address_list(w: &mut Writer, addrs: &[Address]) {
    w.put_u16(addrs.len() as u16);
    for addr in addrs {
        w.put_address(*addr);
    }
}

fn put_opaque(w: &mut Writer, addr: &OpaqueAddr) {
    w.put_u16(addr.len() as u16).put_bytes(addr.as_bytes());
}

/// An encoded outbound governance proposal, ready for the transport.
///
/// The hub addresses these to itself: `protocol_id` is always the gov
/// protocol, and the destination is the per-chain endpoint governor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GovProposal {
    /// Destination chain.
    pub dest_chain_id: ChainId,
    /// Gov contract address on the destination chain.
    pub dest_gov_addr: OpaqueAddr,
    /// Typed selector for the governance call.
    pub selector: FunctionSelector,
    /// Encoded message record.
    pub params: Vec<u8>,
    /// The message this proposal was built from, kept for observability.
    pub message: GovMessage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_tags_are_stable() {
        let msg = GovMessage::AddTransmitters {
            protocol_id: ProtocolId::from_ascii(b"p").unwrap(),
            transmitters: vec![],
        };
        assert_eq!(msg.selector_tag(), Some([0x6c, 0x5f, 0x56, 0x66]));

        let msg = GovMessage::SetConsensusTargetRate {
            protocol_id: ProtocolId::from_ascii(b"p").unwrap(),
            consensus_target_rate: 7000,
        };
        assert_eq!(msg.selector_tag(), Some([0x97, 0x0b, 0x61, 0x09]));
    }

    #[test]
    fn test_dao_owner_has_no_standard_tag() {
        let msg = GovMessage::SetDaoProtocolOwner {
            protocol_id: ProtocolId::from_ascii(b"p").unwrap(),
            protocol_owner: Address::new([1; 20]),
        };
        assert_eq!(msg.selector_tag(), None);
    }

    #[test]
    fn test_add_allowed_protocol_encoding() {
        let protocol_id = ProtocolId::from_ascii(b"bridge").unwrap();
        let msg = GovMessage::AddAllowedProtocol {
            protocol_id,
            consensus_target_rate: 6000,
            transmitters: vec![Address::new([1; 20]), Address::new([2; 20])],
        };
        let params = msg.encode_params();
        assert_eq!(&params[..32], protocol_id.as_bytes());
        assert_eq!(&params[32..36], &6000u32.to_be_bytes());
        assert_eq!(&params[36..38], &2u16.to_be_bytes());
        assert_eq!(&params[38..58], &[1u8; 20]);
        assert_eq!(&params[58..78], &[2u8; 20]);
    }

    #[test]
    fn test_update_transmitters_encoding() {
        let protocol_id = ProtocolId::from_ascii(b"p").unwrap();
        let msg = GovMessage::UpdateTransmitters {
            protocol_id,
            to_add: vec![Address::new([7; 20])],
            to_remove: vec![],
        };
        let params = msg.encode_params();
        assert_eq!(&params[32..34], &1u16.to_be_bytes());
        assert_eq!(&params[54..56], &0u16.to_be_bytes());
        assert_eq!(params.len(), 56);
    }
}

//! Outbound governance emission.
//!
//! Every admin change that must reach a destination chain becomes exactly
//! one encoded proposal addressed to that chain's endpoint governor. The
//! hub is its own gov-protocol target: proposals queue in the [`Outbox`]
//! and the host feeds them back through the ordinary operation pipeline,
//! so governance traffic gets the same consensus treatment as user
//! traffic.

use photon_types::{ChainId, FunctionSelector, GovMessage, GovProposal, OpaqueAddr};
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

/// Queue of encoded governance proposals awaiting transport.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Outbox {
    queue: Vec<GovProposal>,
}

impl Outbox {
    /// Creates an empty outbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of queued proposals.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// True if no proposals are queued.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Encodes a governance message as a proposal to the chain's
    /// endpoint governor and queues it.
    pub(crate) fn emit(&mut self, chain_id: ChainId, dest_gov_addr: OpaqueAddr, message: GovMessage) {
        let Some(tag) = message.selector_tag() else {
            warn!(?message, "governance message without a standard selector dropped");
            return;
        };
        let params = message.encode_params();
        trace!(%chain_id, ?message, "governance proposal queued");
        self.queue.push(GovProposal {
            dest_chain_id: chain_id,
            dest_gov_addr,
            selector: FunctionSelector::from_evm_tag(tag),
            params,
            message,
        });
    }

    /// Takes every queued proposal, oldest first.
    pub fn drain(&mut self) -> Vec<GovProposal> {
        std::mem::take(&mut self.queue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use photon_types::{Address, ProtocolId};

    #[test]
    fn test_emit_encodes_selector_and_params() {
        let mut outbox = Outbox::new();
        let protocol_id = ProtocolId::from_ascii(b"p").unwrap();
        let chain = ChainId::from(3u64);
        outbox.emit(
            chain,
            OpaqueAddr::from_address(Address::new([9; 20])),
            GovMessage::SetConsensusTargetRate {
                protocol_id,
                consensus_target_rate: 7000,
            },
        );
        let proposals = outbox.drain();
        assert_eq!(proposals.len(), 1);
        let p = &proposals[0];
        assert_eq!(p.dest_chain_id, chain);
        assert_eq!(&p.selector.body()[..4], &[0x97, 0x0b, 0x61, 0x09]);
        assert_eq!(&p.params[..32], protocol_id.as_bytes());
        assert!(outbox.is_empty());
    }

    #[test]
    fn test_untagged_message_is_dropped() {
        let mut outbox = Outbox::new();
        outbox.emit(
            ChainId::from(1u64),
            OpaqueAddr::from_address(Address::new([9; 20])),
            GovMessage::SetDaoProtocolOwner {
                protocol_id: ProtocolId::from_ascii(b"p").unwrap(),
                protocol_owner: Address::new([1; 20]),
            },
        );
        assert!(outbox.is_empty());
    }
}

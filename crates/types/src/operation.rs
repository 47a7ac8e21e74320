//! Cross-chain operation payloads and their canonical wire packing.
//!
//! An operation carries a protocol-targeted call from a source chain to a
//! destination chain. The canonical encoding is the deterministic
//! big-endian tight packing of every field in declared order; the same
//! bytes serve as the proposal payload to the destination governor and as
//! the hashing preimage transmitters sign.

use crate::wire::Writer;
use crate::{
    ChainId, Error, OpMeta, OpaqueAddr, ProtocolId, Result, H256, PARAMS_MAX_LEN, SELECTOR_MAX_LEN,
};
use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

/// Discriminates how a destination runtime interprets the selector body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum SelectorType {
    /// 4-byte EVM ABI tag, carried as its 32-byte ABI-encoded form.
    EvmAbi = 0,
    /// Solana Anchor method name.
    SolanaAnchor = 1,
    /// Solana native entrypoint: empty selector body.
    SolanaNative = 2,
}

impl SelectorType {
    /// Decodes a selector type from its wire tag.
    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(Self::EvmAbi),
            1 => Ok(Self::SolanaAnchor),
            2 => Ok(Self::SolanaNative),
            other => Err(Error::UnknownSelectorType(other)),
        }
    }
}

/// A typed function selector: one byte of type, one byte of length, then
/// at most 32 bytes of body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSelector {
    selector_type: SelectorType,
    body: Vec<u8>,
}

impl FunctionSelector {
    /// Creates a selector, validating the body length.
    pub fn new(selector_type: SelectorType, body: Vec<u8>) -> Result<Self> {
        if body.len() > SELECTOR_MAX_LEN {
            return Err(Error::SelectorTooBig(body.len()));
        }
        Ok(Self {
            selector_type,
            body,
        })
    }

    /// Creates an EVM selector from a 4-byte ABI tag.
    ///
    /// The body is the 32-byte ABI-encoded form of the tag (the 4 bytes
    /// left-aligned, zero-padded to the right), so `len` on the wire is 32.
    pub fn from_evm_tag(tag: [u8; 4]) -> Self {
        let mut body = vec![0u8; 32];
        body[..4].copy_from_slice(&tag);
        Self {
            selector_type: SelectorType::EvmAbi,
            body,
        }
    }

    /// Creates an empty Solana-native selector.
    pub fn solana_native() -> Self {
        Self {
            selector_type: SelectorType::SolanaNative,
            body: Vec::new(),
        }
    }

    /// Returns the selector type.
    pub fn selector_type(&self) -> SelectorType {
        self.selector_type
    }

    /// Returns the selector body.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Encodes the selector to its wire form: type, length, body.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + self.body.len());
        out.push(self.selector_type as u8);
        out.push(self.body.len() as u8);
        out.extend_from_slice(&self.body);
        out
    }

    /// Decodes a selector from the front of `input`, returning it together
    /// with the number of bytes consumed.
    pub fn decode(input: &[u8]) -> Result<(Self, usize)> {
        if input.len() < 2 {
            return Err(Error::Truncated("function selector header"));
        }
        let selector_type = SelectorType::from_tag(input[0])?;
        let len = input[1] as usize;
        if len > SELECTOR_MAX_LEN {
            return Err(Error::SelectorTooBig(len));
        }
        if input.len() < 2 + len {
            return Err(Error::Truncated("function selector body"));
        }
        Ok((
            Self {
                selector_type,
                body: input[2..2 + len].to_vec(),
            },
            2 + len,
        ))
    }
}

/// The payload of a cross-chain operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationData {
    /// Protocol the operation belongs to.
    pub protocol_id: ProtocolId,
    /// Packed metadata: version, in-order flag, reserved bytes.
    pub meta: OpMeta,
    /// Chain the operation was emitted on.
    pub src_chain_id: ChainId,
    /// Block number of the emitting transaction on the source chain.
    pub src_block_number: U256,
    /// Source transaction id, two 32-byte words.
    #[serde(with = "tx_id_serde")]
    pub src_op_tx_id: [u8; 64],
    /// Per-protocol operation nonce assigned on the source chain.
    pub nonce: U256,
    /// Chain the operation executes on.
    pub dest_chain_id: ChainId,
    /// Protocol contract address on the destination chain.
    pub protocol_addr: OpaqueAddr,
    /// Typed function selector for the destination call.
    pub function_selector: FunctionSelector,
    /// Opaque call parameters, at most 4096 bytes.
    pub params: Vec<u8>,
    /// Reserved bytes, propagated verbatim.
    pub reserved: Vec<u8>,
}

impl OperationData {
    /// Validates the variable-length field bounds.
    pub fn validate(&self) -> Result<()> {
        if self.params.len() > PARAMS_MAX_LEN {
            return Err(Error::ParamsTooBig(self.params.len()));
        }
        // OpaqueAddr enforces its bound at construction; re-check here so a
        // deserialized value cannot slip past the cap.
        if self.protocol_addr.len() > crate::ADDRESS_MAX_LEN || self.protocol_addr.is_empty() {
            return Err(Error::AddrTooBig(self.protocol_addr.len()));
        }
        Ok(())
    }

    /// The canonical tight packing of every field in declared order:
    ///
    /// `protocolId (32) || meta (32) || srcChainId (32) || srcBlockNumber
    /// (32) || srcOpTxId (64) || nonce (32) || destChainId (32) ||
    /// protocolAddr (var) || functionSelector (var) || params (var) ||
    /// reserved (var)`
    pub fn packed(&self) -> Vec<u8> {
        let mut w = Writer::with_capacity(
            256 + self.protocol_addr.len() + self.params.len() + self.reserved.len(),
        );
        w.put_protocol_id(self.protocol_id)
            .put_bytes(self.meta.as_bytes())
            .put_u256(self.src_chain_id)
            .put_u256(self.src_block_number)
            .put_bytes(&self.src_op_tx_id)
            .put_u256(self.nonce)
            .put_u256(self.dest_chain_id)
            .put_bytes(self.protocol_addr.as_bytes())
            .put_bytes(&self.function_selector.encode())
            .put_bytes(&self.params)
            .put_bytes(&self.reserved);
        w.finish()
    }

    /// The keccak digest of the canonical packing, before the personal-sign
    /// prefix is applied.
    pub fn msg_hash(&self) -> H256 {
        H256::keccak256(&self.packed())
    }
}

/// Hex-string serde for the 64-byte source transaction id.
mod tx_id_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &[u8; 64], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("0x{}", hex::encode(value)))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 64], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let s = s.strip_prefix("0x").unwrap_or(&s);
        let bytes = hex::decode(s).map_err(serde::de::Error::custom)?;
        if bytes.len() != 64 {
            return Err(serde::de::Error::custom("source tx id must be 64 bytes"));
        }
        let mut out = [0u8; 64];
        out.copy_from_slice(&bytes);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Address;

    fn sample_op() -> OperationData {
        OperationData {
            protocol_id: ProtocolId::from_ascii(b"bridge").unwrap(),
            meta: OpMeta::default().with_version(1).with_in_order(true),
            src_chain_id: U256::from(1u64),
            src_block_number: U256::from(123_456u64),
            src_op_tx_id: [0x11; 64],
            nonce: U256::from(42u64),
            dest_chain_id: U256::from(137u64),
            protocol_addr: OpaqueAddr::from_address(Address::new([0x22; 20])),
            function_selector: FunctionSelector::from_evm_tag([0xde, 0xad, 0xbe, 0xef]),
            params: vec![1, 2, 3],
            reserved: vec![],
        }
    }

    #[test]
    fn test_packed_layout() {
        let op = sample_op();
        let packed = op.packed();

        assert_eq!(&packed[..32], op.protocol_id.as_bytes());
        assert_eq!(&packed[32..64], op.meta.as_bytes());
        // srcChainId = 1 at offset 64
        assert_eq!(packed[95], 1);
        // srcOpTxId occupies [128, 192)
        assert_eq!(&packed[128..192], &[0x11; 64]);
        // nonce = 42 ends at offset 224
        assert_eq!(packed[223], 42);
        // protocolAddr follows destChainId at 256
        assert_eq!(&packed[256..276], &[0x22; 20]);
        // selector wire form: type 0, len 32, tag then padding
        assert_eq!(&packed[276..282], &[0, 32, 0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn test_packed_is_deterministic() {
        let op = sample_op();
        assert_eq!(op.packed(), op.packed());
        assert_eq!(op.msg_hash(), op.msg_hash());
    }

    #[test]
    fn test_selector_roundtrip() {
        let sel = FunctionSelector::new(SelectorType::SolanaAnchor, b"initialize".to_vec()).unwrap();
        let encoded = sel.encode();
        let (decoded, consumed) = FunctionSelector::decode(&encoded).unwrap();
        assert_eq!(decoded, sel);
        assert_eq!(consumed, encoded.len());
    }

    #[test]
    fn test_selector_bounds() {
        assert!(FunctionSelector::new(SelectorType::EvmAbi, vec![0u8; 33]).is_err());
        assert!(FunctionSelector::decode(&[0]).is_err());
        assert!(FunctionSelector::decode(&[9, 0]).is_err());
    }

    #[test]
    fn test_evm_tag_abi_form() {
        let sel = FunctionSelector::from_evm_tag([0xaa, 0xbb, 0xcc, 0xdd]);
        assert_eq!(sel.body().len(), 32);
        assert_eq!(&sel.body()[..4], &[0xaa, 0xbb, 0xcc, 0xdd]);
        assert!(sel.body()[4..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_validate_params_cap() {
        let mut op = sample_op();
        op.params = vec![0u8; PARAMS_MAX_LEN];
        assert!(op.validate().is_ok());
        op.params = vec![0u8; PARAMS_MAX_LEN + 1];
        assert!(matches!(op.validate(), Err(Error::ParamsTooBig(_))));
    }
}

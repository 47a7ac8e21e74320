//! Wire-format tests: canonical operation packing, the selector codec,
//! governance payload encodings, and the meta word laws.

use alloy_primitives::U256;
use photon_types::{
    gov::selectors, Address, FunctionSelector, GovMessage, OpMeta, OpaqueAddr, OperationData,
    ProtocolId, SelectorType, PARAMS_MAX_LEN,
};

fn sample_op() -> OperationData {
    OperationData {
        protocol_id: ProtocolId::from_ascii(b"ngl-bridge").unwrap(),
        meta: OpMeta::default().with_version(1),
        src_chain_id: U256::from(1u64),
        src_block_number: U256::from(17_000_000u64),
        src_op_tx_id: [0xAB; 64],
        nonce: U256::from(7u64),
        dest_chain_id: U256::from(137u64),
        protocol_addr: OpaqueAddr::new(vec![0x11; 20]).unwrap(),
        function_selector: FunctionSelector::from_evm_tag([1, 2, 3, 4]),
        params: b"payload".to_vec(),
        reserved: vec![0xFF, 0xFE],
    }
}

#[test]
fn test_packed_field_order_and_width() {
    let op = sample_op();
    let packed = op.packed();

    // Fixed-width prefix: 7 words + the 64-byte tx id.
    let fixed = 32 * 7 + 32;
    let var = 20 + 34 + 7 + 2; // addr, selector wire form, params, reserved
    assert_eq!(packed.len(), fixed + var);

    assert_eq!(&packed[..32], op.protocol_id.as_bytes());
    assert_eq!(packed[32], 1); // meta version byte
    assert_eq!(&packed[124..128], &[0x01, 0x03, 0x66, 0x40]); // 17_000_000 BE
    assert_eq!(&packed[128..192], &[0xAB; 64]);
    assert_eq!(packed[255], 137); // destChainId low byte
    assert_eq!(&packed[packed.len() - 2..], &[0xFF, 0xFE]);
}

#[test]
fn test_msg_hash_changes_with_any_field() {
    let op = sample_op();
    let base = op.msg_hash();

    let mut changed = op.clone();
    changed.nonce = U256::from(8u64);
    assert_ne!(changed.msg_hash(), base);

    let mut changed = op.clone();
    changed.meta = changed.meta.with_in_order(true);
    assert_ne!(changed.msg_hash(), base);

    let mut changed = op;
    changed.reserved = vec![0xFF, 0xFD];
    assert_ne!(changed.msg_hash(), base);
}

#[test]
fn test_params_cap() {
    let mut op = sample_op();
    op.params = vec![0; PARAMS_MAX_LEN + 1];
    assert!(op.validate().is_err());
}

#[test]
fn test_selector_codec_roundtrip_all_types() {
    for sel in [
        FunctionSelector::from_evm_tag([0xde, 0xad, 0xbe, 0xef]),
        FunctionSelector::new(SelectorType::SolanaAnchor, b"update_price".to_vec()).unwrap(),
        FunctionSelector::solana_native(),
    ] {
        let encoded = sel.encode();
        let (decoded, consumed) = FunctionSelector::decode(&encoded).unwrap();
        assert_eq!(decoded, sel);
        assert_eq!(consumed, encoded.len());
    }
}

#[test]
fn test_selector_decode_rejects_bad_input() {
    assert!(FunctionSelector::decode(&[]).is_err());
    assert!(FunctionSelector::decode(&[3, 0]).is_err()); // unknown type
    assert!(FunctionSelector::decode(&[0, 33]).is_err()); // oversized len
    assert!(FunctionSelector::decode(&[0, 4, 1, 2]).is_err()); // truncated body
}

#[test]
fn test_meta_word_laws() {
    let mut raw = [0u8; 32];
    raw[5] = 0x5A;
    raw[31] = 0xA5;
    let meta = OpMeta::new(raw);

    assert_eq!(meta.with_version(9).version(), 9);
    assert!(meta.with_in_order(true).in_order());
    // Each setter preserves every bit outside its field.
    let touched = meta.with_version(9).with_in_order(true);
    assert_eq!(touched.as_bytes()[5], 0x5A);
    assert_eq!(touched.as_bytes()[31], 0xA5);
}

#[test]
fn test_gov_selector_tags() {
    assert_eq!(selectors::ADD_ALLOWED_PROTOCOL, [0x45, 0xa0, 0x04, 0xb9]);
    assert_eq!(selectors::UPDATE_TRANSMITTERS, [0x65, 0x4b, 0x46, 0xe1]);
    assert_eq!(selectors::REMOVE_EXECUTOR, [0x04, 0xfa, 0x38, 0x4a]);
}

#[test]
fn test_gov_payloads_are_deterministic() {
    let protocol_id = ProtocolId::from_ascii(b"p").unwrap();
    let msg = GovMessage::UpdateTransmitters {
        protocol_id,
        to_add: vec![Address::new([1; 20])],
        to_remove: vec![Address::new([2; 20]), Address::new([3; 20])],
    };
    assert_eq!(msg.encode_params(), msg.encode_params());

    let params = msg.encode_params();
    // protocol id, 1-entry add list, 2-entry remove list.
    assert_eq!(params.len(), 32 + 2 + 20 + 2 + 40);
    assert_eq!(&params[32..34], &1u16.to_be_bytes());
    assert_eq!(&params[54..56], &2u16.to_be_bytes());
}

#[test]
fn test_operation_serde_roundtrip() {
    let op = sample_op();
    let json = serde_json::to_string(&op).unwrap();
    let decoded: OperationData = serde_json::from_str(&json).unwrap();
    assert_eq!(decoded, op);
    assert_eq!(decoded.msg_hash(), op.msg_hash());
}

#[test]
fn test_gov_message_protocol_id_accessor() {
    let protocol_id = ProtocolId::from_ascii(b"some-protocol").unwrap();
    let msg = GovMessage::AddExecutor {
        protocol_id,
        executor: OpaqueAddr::new(vec![9; 32]).unwrap(),
    };
    assert_eq!(msg.protocol_id(), protocol_id);
}

//! Signature recovery tests against the hub's signing path.

use photon_crypto::{eth_signed_digest, keccak256, PrivateKey, Signature};

#[test]
fn test_sign_recover_law() {
    // recover(ethSignedDigest(m), sign(k, ethSignedDigest(m))) == addr(k)
    let key = PrivateKey::random();
    let digest = eth_signed_digest(keccak256(b"cross-chain operation"));
    let sig = key.sign_prehash(digest).unwrap();
    assert_eq!(sig.recover_prehash(digest).unwrap(), key.address());
}

#[test]
fn test_recovery_distinguishes_signers() {
    let a = PrivateKey::random();
    let b = PrivateKey::random();
    let digest = eth_signed_digest(keccak256(b"op"));
    let sig = a.sign_prehash(digest).unwrap();
    let recovered = sig.recover_prehash(digest).unwrap();
    assert_eq!(recovered, a.address());
    assert_ne!(recovered, b.address());
}

#[test]
fn test_prefix_is_part_of_the_digest() {
    let msg_hash = keccak256(b"op");
    assert_ne!(eth_signed_digest(msg_hash), msg_hash);
    // The digest is over exactly the prefixed 32-byte hash.
    let manual = keccak256(
        &[b"\x19Ethereum Signed Message:\n32".as_slice(), msg_hash.as_bytes()].concat(),
    );
    assert_eq!(eth_signed_digest(msg_hash), manual);
}

#[test]
fn test_tampered_signature_fails_or_mismatches() {
    let key = PrivateKey::random();
    let digest = eth_signed_digest(keccak256(b"op"));
    let sig = key.sign_prehash(digest).unwrap();

    let mut bytes = sig.to_bytes();
    bytes[0] ^= 0xFF;
    let tampered = Signature::from_bytes(&bytes);
    match tampered.recover_prehash(digest) {
        Ok(addr) => assert_ne!(addr, key.address()),
        Err(_) => {}
    }
}

#[test]
fn test_deterministic_signing() {
    // RFC 6979 signing: the same key and digest produce the same bytes.
    let key = PrivateKey::from_bytes(&[7u8; 32]).unwrap();
    let digest = eth_signed_digest(keccak256(b"op"));
    let sig1 = key.sign_prehash(digest).unwrap();
    let sig2 = key.sign_prehash(digest).unwrap();
    assert_eq!(sig1, sig2);
}

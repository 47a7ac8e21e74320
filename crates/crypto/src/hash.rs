//! Keccak256 digests and the Ethereum personal-sign prefix.

use photon_types::H256;
use sha3::{Digest, Keccak256};

/// Compute the Keccak256 hash of the input data.
#[inline]
pub fn keccak256(data: &[u8]) -> H256 {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    H256::new(out)
}

/// Compute the Keccak256 hash of multiple concatenated inputs without an
/// intermediate buffer.
#[inline]
pub fn keccak256_concat(parts: &[&[u8]]) -> H256 {
    let mut hasher = Keccak256::new();
    for part in parts {
        hasher.update(part);
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    H256::new(out)
}

/// The digest transmitters actually sign: the personal-sign wrapping of a
/// 32-byte message hash.
///
/// Computes `keccak256("\x19Ethereum Signed Message:\n32" || msg_hash)`.
/// The fixed `32` length ties the hub to standard wallet personal-sign
/// flows over a prehashed message.
pub fn eth_signed_digest(msg_hash: H256) -> H256 {
    keccak256_concat(&[b"\x19Ethereum Signed Message:\n32", msg_hash.as_bytes()])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak256_known_vectors() {
        assert_eq!(
            keccak256(b"").to_hex(),
            "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
        assert_eq!(
            keccak256(b"hello").to_hex(),
            "0x1c8aff950685c2ed4bc3174f3472287b56d9517b9c948127319a09a7a36deac8"
        );
    }

    #[test]
    fn test_concat_equivalence() {
        assert_eq!(
            keccak256(b"hello world"),
            keccak256_concat(&[b"hello", b" ", b"world"])
        );
    }

    #[test]
    fn test_eth_signed_digest_matches_manual_prefix() {
        let msg_hash = keccak256(b"operation");
        let mut prefixed = b"\x19Ethereum Signed Message:\n32".to_vec();
        prefixed.extend_from_slice(msg_hash.as_bytes());
        assert_eq!(eth_signed_digest(msg_hash), keccak256(&prefixed));
    }
}

//! ECDSA signatures over secp256k1 with public key recovery.
//!
//! Identities in the hub are the last 20 bytes of the Keccak256 hash of
//! the uncompressed public key, so a signature alone identifies its
//! signer. Verification throughout the hub is `recover == declared
//! sender`; non-recoverable signatures are rejected.

use crate::{keccak256, CryptoError, Result};
use k256::{
    ecdsa::{RecoveryId, Signature as K256Signature, SigningKey, VerifyingKey},
    elliptic_curve::sec1::ToEncodedPoint,
    SecretKey,
};
use photon_types::{Address, H256};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

/// ECDSA private key. Used by hosts to sign outbound governance
/// operations and by tests to build fixtures.
#[derive(Clone)]
pub struct PrivateKey {
    inner: SigningKey,
}

impl PrivateKey {
    /// Generate a random private key using the OS RNG.
    pub fn random() -> Self {
        Self {
            inner: SigningKey::from(SecretKey::random(&mut OsRng)),
        }
    }

    /// Create a private key from raw bytes.
    pub fn from_bytes(bytes: &[u8; 32]) -> Result<Self> {
        let secret = SecretKey::from_bytes(bytes.into())
            .map_err(|e| CryptoError::InvalidPrivateKey(e.to_string()))?;
        Ok(Self {
            inner: SigningKey::from(secret),
        })
    }

    /// The 20-byte address of this key: `keccak256(pubkey)[12..32]`.
    pub fn address(&self) -> Address {
        let point = self.inner.verifying_key().to_encoded_point(false);
        // Skip the 0x04 SEC1 prefix.
        let digest = keccak256(&point.as_bytes()[1..]);
        let mut addr = [0u8; 20];
        addr.copy_from_slice(&digest.as_bytes()[12..32]);
        Address::new(addr)
    }

    /// Sign a 32-byte prehashed digest, returning a recoverable signature.
    pub fn sign_prehash(&self, digest: H256) -> Result<Signature> {
        let (sig, recovery_id) = self
            .inner
            .sign_prehash_recoverable(digest.as_bytes())
            .map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;
        Ok(Signature {
            r: sig.r().to_bytes().into(),
            s: sig.s().to_bytes().into(),
            v: recovery_id.to_byte(),
        })
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivateKey")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

/// ECDSA signature with recovery id: `r` (32 bytes), `s` (32 bytes), `v`
/// (0/1, or 27/28 in the Ethereum legacy form).
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// The r component.
    pub r: [u8; 32],
    /// The s component.
    pub s: [u8; 32],
    /// Recovery id.
    pub v: u8,
}

impl Signature {
    /// Create a signature from components.
    pub fn new(r: [u8; 32], s: [u8; 32], v: u8) -> Self {
        Self { r, s, v }
    }

    /// Create a signature from 65 raw bytes: `r || s || v`.
    pub fn from_bytes(bytes: &[u8; 65]) -> Self {
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[0..32]);
        s.copy_from_slice(&bytes[32..64]);
        Self { r, s, v: bytes[64] }
    }

    /// The signature as 65 raw bytes: `r || s || v`.
    pub fn to_bytes(&self) -> [u8; 65] {
        let mut out = [0u8; 65];
        out[0..32].copy_from_slice(&self.r);
        out[32..64].copy_from_slice(&self.s);
        out[64] = self.v;
        out
    }

    /// The recovery id normalized to 0 or 1.
    pub fn v_normalized(&self) -> u8 {
        if self.v >= 27 {
            self.v - 27
        } else {
            self.v
        }
    }

    /// Recover the signer address from a 32-byte prehashed digest.
    ///
    /// Returns an error if the signature or recovery id is malformed or
    /// recovery does not yield a valid curve point.
    pub fn recover_prehash(&self, digest: H256) -> Result<Address> {
        let mut raw = [0u8; 64];
        raw[0..32].copy_from_slice(&self.r);
        raw[32..64].copy_from_slice(&self.s);
        let sig = K256Signature::from_bytes((&raw).into())
            .map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;
        let recovery_id = RecoveryId::from_byte(self.v_normalized())
            .ok_or_else(|| CryptoError::RecoveryFailed("invalid recovery id".to_string()))?;

        let key = VerifyingKey::recover_from_prehash(digest.as_bytes(), &sig, recovery_id)
            .map_err(|e| CryptoError::RecoveryFailed(e.to_string()))?;

        let point = key.to_encoded_point(false);
        let hash = keccak256(&point.as_bytes()[1..]);
        let mut addr = [0u8; 20];
        addr.copy_from_slice(&hash.as_bytes()[12..32]);
        Ok(Address::new(addr))
    }
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signature")
            .field("r", &hex::encode(self.r))
            .field("s", &hex::encode(self.s))
            .field("v", &self.v)
            .finish()
    }
}

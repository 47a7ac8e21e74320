//! # Photon Crypto
//!
//! Keccak256 hashing and secp256k1 ECDSA for the Photon hub.
//!
//! The hub verifies every inbound proof by recovering the signer identity
//! from an `(r, s, v)` signature over the Ethereum personal-sign digest of
//! the operation hash. This crate provides:
//!
//! - [`keccak256`] / [`keccak256_concat`] - digest helpers
//! - [`eth_signed_digest`] - the `"\x19Ethereum Signed Message:\n32"` prefix path
//! - [`Signature`] - `(r, s, v)` with recovery to a 20-byte [`Address`]
//! - [`PrivateKey`] - signing, used by hosts and test fixtures

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod ecdsa;
pub mod hash;

pub use ecdsa::{PrivateKey, Signature};
pub use hash::{eth_signed_digest, keccak256, keccak256_concat};
pub use photon_types::Address;

/// Result type alias for crypto operations.
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Errors that can occur in signing and recovery.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// The private key bytes do not form a valid scalar.
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    /// The signature bytes do not form a valid signature.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// Public key recovery failed.
    #[error("recovery failed: {0}")]
    RecoveryFailed(String),

    /// Invalid hex input.
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// Invalid length for a fixed-size input.
    #[error("invalid length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },
}

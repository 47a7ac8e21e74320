//! # Photon Types
//!
//! Core type definitions for the Photon hub.
//!
//! This crate provides the fundamental types used throughout the hub:
//! - [`Address`] - 20-byte transmitter/agent/delegator/watcher identities
//! - [`H256`] - 32-byte Keccak256 digests, used as operation hashes
//! - [`ProtocolId`] - 32-byte protocol tags
//! - [`OpMeta`] - packed operation metadata (version, in-order flag)
//! - [`OperationData`] - a cross-chain operation with its canonical wire packing
//! - [`GovMessage`] - outbound governance payloads and their stable selectors
//!
//! ## Example
//!
//! ```rust
//! use photon_types::{Address, H256, ProtocolId};
//!
//! let addr: Address = "0x742d35Cc6634C0532925a3b844Bc9e7595f0bEb1".parse().unwrap();
//! let protocol = ProtocolId::from_ascii(b"my-protocol").unwrap();
//! let hash = H256::keccak256(b"hello world");
//! assert_ne!(hash, H256::ZERO);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod address;
pub mod gov;
pub mod hash;
pub mod ids;
pub mod meta;
pub mod operation;
pub mod wire;

pub use address::Address;
pub use gov::{GovMessage, GovProposal};
pub use hash::H256;
pub use ids::{ChainId, OpaqueAddr, ProtocolId, RoundId, SourceId, GOV_PROTOCOL_ID};
pub use meta::OpMeta;
pub use operation::{FunctionSelector, OperationData, SelectorType};

/// Maximum length of an opaque destination-chain address in bytes.
pub const ADDRESS_MAX_LEN: usize = 128;

/// Maximum length of operation call parameters in bytes.
pub const PARAMS_MAX_LEN: usize = 4096;

/// Maximum length of a function selector body in bytes.
pub const SELECTOR_MAX_LEN: usize = 32;

/// Result type alias for Photon type operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when constructing or decoding Photon types.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid hex string
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// Invalid length for a fixed-size type
    #[error("invalid length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// Destination-chain address exceeds [`ADDRESS_MAX_LEN`] or is empty
    #[error("opaque address length {0} out of range 1..=128")]
    AddrTooBig(usize),

    /// Operation parameters exceed [`PARAMS_MAX_LEN`]
    #[error("params length {0} exceeds 4096")]
    ParamsTooBig(usize),

    /// Function selector body exceeds [`SELECTOR_MAX_LEN`]
    #[error("selector length {0} exceeds 32")]
    SelectorTooBig(usize),

    /// Unknown selector type tag while decoding
    #[error("unknown selector type tag {0}")]
    UnknownSelectorType(u8),

    /// Truncated input while decoding a wire structure
    #[error("truncated input while decoding {0}")]
    Truncated(&'static str),

    /// Protocol id tag longer than 32 bytes
    #[error("protocol tag length {0} exceeds 32")]
    ProtocolTagTooBig(usize),

    /// Invalid address format
    #[error("invalid address format: {0}")]
    InvalidAddress(String),

    /// Invalid hash format
    #[error("invalid hash format: {0}")]
    InvalidHash(String),
}

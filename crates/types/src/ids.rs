//! Protocol, chain, and stream identifiers.

use crate::{Error, Result, ADDRESS_MAX_LEN};
use serde::{Deserialize, Serialize};
use std::fmt;

pub use alloy_primitives::U256;

/// A chain identifier: an unsigned 256-bit integer.
pub type ChainId = U256;

/// A round number. Rounds start at 1 and increase monotonically.
pub type RoundId = u64;

/// The reserved protocol whose operations are the hub's own governance
/// updates dispatched to per-chain endpoints.
pub const GOV_PROTOCOL_ID: ProtocolId = ProtocolId::from_ascii_padded(b"photon-gov");

/// A 32-byte protocol tag, application-chosen (typically an ASCII name
/// padded with zeros).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ProtocolId([u8; 32]);

impl ProtocolId {
    /// The zero protocol id, never valid for registration.
    pub const ZERO: Self = Self([0u8; 32]);

    /// Creates a protocol id from a 32-byte array.
    #[inline]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Creates a protocol id from an ASCII tag of at most 32 bytes,
    /// zero-padded on the right.
    pub fn from_ascii(tag: &[u8]) -> Result<Self> {
        if tag.len() > 32 {
            return Err(Error::ProtocolTagTooBig(tag.len()));
        }
        Ok(Self::from_ascii_padded(tag))
    }

    /// Const variant of [`ProtocolId::from_ascii`]. Tags longer than 32
    /// bytes are truncated, so only use with literal tags.
    pub const fn from_ascii_padded(tag: &[u8]) -> Self {
        let mut bytes = [0u8; 32];
        let mut i = 0;
        while i < tag.len() && i < 32 {
            bytes[i] = tag[i];
            i += 1;
        }
        Self(bytes)
    }

    /// Returns the tag as a byte slice.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the tag as a fixed-size byte array.
    #[inline]
    pub const fn as_fixed_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Checks if this is the zero protocol id.
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Checks if this is the reserved governance protocol.
    #[inline]
    pub fn is_gov(&self) -> bool {
        *self == GOV_PROTOCOL_ID
    }
}

impl fmt::Debug for ProtocolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Render printable ASCII tags as text, anything else as hex.
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(32);
        let head = &self.0[..end];
        if !head.is_empty() && head.iter().all(|b| b.is_ascii_graphic()) {
            write!(f, "ProtocolId({})", String::from_utf8_lossy(head))
        } else {
            write!(f, "ProtocolId(0x{})", hex::encode(self.0))
        }
    }
}

impl fmt::Display for ProtocolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl From<[u8; 32]> for ProtocolId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl Serialize for ProtocolId {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&format!("0x{}", hex::encode(self.0)))
    }
}

impl<'de> Deserialize<'de> for ProtocolId {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let s = s.strip_prefix("0x").unwrap_or(&s);
        let bytes = hex::decode(s).map_err(serde::de::Error::custom)?;
        if bytes.len() != 32 {
            return Err(serde::de::Error::custom("protocol id must be 32 bytes"));
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

/// A 32-byte stream data source identifier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct SourceId(pub [u8; 32]);

impl SourceId {
    /// Returns the identifier as a byte slice.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SourceId(0x{})", hex::encode(self.0))
    }
}

impl From<[u8; 32]> for SourceId {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// A variable-length destination-chain address (1..=128 bytes).
///
/// 128 bytes accommodates non-EVM public keys; EVM addresses arrive as
/// their 20 raw bytes.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OpaqueAddr(Vec<u8>);

impl OpaqueAddr {
    /// Creates an opaque address, validating the length bounds.
    pub fn new(bytes: Vec<u8>) -> Result<Self> {
        if bytes.is_empty() || bytes.len() > ADDRESS_MAX_LEN {
            return Err(Error::AddrTooBig(bytes.len()));
        }
        Ok(Self(bytes))
    }

    /// Creates an opaque address from a 20-byte identity.
    pub fn from_address(addr: crate::Address) -> Self {
        Self(addr.as_bytes().to_vec())
    }

    /// Returns the address as a byte slice.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns the address length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false: construction rejects empty addresses.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for OpaqueAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OpaqueAddr(0x{})", hex::encode(&self.0))
    }
}

impl AsRef<[u8]> for OpaqueAddr {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

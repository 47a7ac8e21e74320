//! Packed operation metadata.
//!
//! Meta is a 32-byte word. Byte 0 carries the protocol version, byte 1 the
//! in-order flag (0 or 1), bytes 2..31 are reserved and must survive both
//! setters verbatim.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Packed operation metadata word.
///
/// # Example
///
/// ```rust
/// use photon_types::OpMeta;
///
/// let meta = OpMeta::default().with_version(2).with_in_order(true);
/// assert_eq!(meta.version(), 2);
/// assert!(meta.in_order());
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OpMeta([u8; 32]);

impl OpMeta {
    /// Creates a meta word from its raw 32 bytes.
    #[inline]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the raw 32 bytes.
    #[inline]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Returns the version byte.
    #[inline]
    pub fn version(&self) -> u8 {
        self.0[0]
    }

    /// Returns whether the in-order flag is set.
    #[inline]
    pub fn in_order(&self) -> bool {
        self.0[1] != 0
    }

    /// Returns a copy with the version byte replaced. All other bytes are
    /// preserved.
    #[must_use]
    pub fn with_version(mut self, version: u8) -> Self {
        self.0[0] = version;
        self
    }

    /// Returns a copy with the in-order flag replaced. All other bytes are
    /// preserved.
    #[must_use]
    pub fn with_in_order(mut self, in_order: bool) -> Self {
        self.0[1] = u8::from(in_order);
        self
    }
}

impl fmt::Debug for OpMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpMeta")
            .field("version", &self.version())
            .field("in_order", &self.in_order())
            .finish()
    }
}

impl From<[u8; 32]> for OpMeta {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

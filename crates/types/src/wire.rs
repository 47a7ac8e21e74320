//! Big-endian byte-buffer writer for canonical wire encodings.
//!
//! Everything the hub hashes or hands to the transport is tight-packed
//! big-endian with no implicit padding. This writer is the single place
//! that discipline lives; encoders never do their own bit fiddling.

use crate::{Address, ChainId, ProtocolId};

/// An append-only big-endian byte buffer.
#[derive(Debug, Default, Clone)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    /// Creates an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a writer with the given capacity hint.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Appends raw bytes verbatim.
    pub fn put_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    /// Appends a single byte.
    pub fn put_u8(&mut self, value: u8) -> &mut Self {
        self.buf.push(value);
        self
    }

    /// Appends a u16 as 2 big-endian bytes.
    pub fn put_u16(&mut self, value: u16) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// Appends a u32 as 4 big-endian bytes.
    pub fn put_u32(&mut self, value: u32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// Appends a u64 as 8 big-endian bytes.
    pub fn put_u64(&mut self, value: u64) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// Appends a 256-bit integer as 32 big-endian bytes.
    pub fn put_u256(&mut self, value: ChainId) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes::<32>());
        self
    }

    /// Appends a u64 widened to 32 big-endian bytes.
    pub fn put_u64_as_u256(&mut self, value: u64) -> &mut Self {
        self.buf.extend_from_slice(&[0u8; 24]);
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    /// Appends a 20-byte address.
    pub fn put_address(&mut self, addr: Address) -> &mut Self {
        self.buf.extend_from_slice(addr.as_bytes());
        self
    }

    /// Appends a 32-byte protocol id.
    pub fn put_protocol_id(&mut self, id: ProtocolId) -> &mut Self {
        self.buf.extend_from_slice(id.as_bytes());
        self
    }

    /// Consumes the writer and returns the buffer.
    pub fn finish(self) -> Vec<u8> {
        self.buf
    }

    /// Returns the current length of the buffer.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns true if nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::U256;

    #[test]
    fn test_big_endian_integers() {
        let mut w = Writer::new();
        w.put_u16(0x0102).put_u32(0x03040506);
        assert_eq!(w.finish(), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_u256_packing() {
        let mut w = Writer::new();
        w.put_u256(U256::from(0xABCDu64));
        let out = w.finish();
        assert_eq!(out.len(), 32);
        assert_eq!(&out[30..], &[0xAB, 0xCD]);
        assert!(out[..30].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_u64_widening() {
        let mut w = Writer::new();
        w.put_u64_as_u256(7);
        let mut x = Writer::new();
        x.put_u256(U256::from(7u64));
        assert_eq!(w.finish(), x.finish());
    }
}

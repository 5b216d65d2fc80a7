//! BER decoding.
//!
//! Zero-copy: every slice handed out is a `Bytes` view into the datagram.

use std::net::SocketAddr;

use bytes::Bytes;

use super::length::decode_length;
use super::{malformed, tag};
use crate::error::{DecodeErrorKind, Result};
use crate::oid::Oid;

/// BER decoder over a byte buffer.
pub struct Decoder {
    data: Bytes,
    offset: usize,
    peer: Option<SocketAddr>,
}

impl Decoder {
    pub fn new(data: Bytes) -> Self {
        Self {
            data,
            offset: 0,
            peer: None,
        }
    }

    /// Decoder whose errors name the datagram's source.
    pub fn with_peer(data: Bytes, peer: SocketAddr) -> Self {
        Self {
            data,
            offset: 0,
            peer: Some(peer),
        }
    }

    pub fn from_slice(data: &[u8]) -> Self {
        Self::new(Bytes::copy_from_slice(data))
    }

    pub(crate) fn fail(&self, kind: DecodeErrorKind) -> Box<crate::Error> {
        malformed(self.peer, self.offset, kind)
    }

    fn child(&self, data: Bytes) -> Decoder {
        Decoder {
            data,
            offset: 0,
            peer: self.peer,
        }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    pub fn is_empty(&self) -> bool {
        self.offset >= self.data.len()
    }

    pub fn peek_tag(&self) -> Option<u8> {
        self.data.get(self.offset).copied()
    }

    pub fn read_tag(&mut self) -> Result<u8> {
        let Some(&byte) = self.data.get(self.offset) else {
            return Err(self.fail(DecodeErrorKind::TruncatedData));
        };
        self.offset += 1;
        Ok(byte)
    }

    pub fn read_length(&mut self) -> Result<usize> {
        let (len, consumed) = decode_length(&self.data[self.offset..], self.offset, self.peer)?;
        self.offset += consumed;
        Ok(len)
    }

    /// Read raw bytes without copying.
    pub fn read_bytes(&mut self, len: usize) -> Result<Bytes> {
        if self.offset.saturating_add(len) > self.data.len() {
            return Err(self.fail(DecodeErrorKind::InsufficientData {
                needed: len,
                available: self.remaining(),
            }));
        }
        let bytes = self.data.slice(self.offset..self.offset + len);
        self.offset += len;
        Ok(bytes)
    }

    /// Read and check a tag, returning the content length.
    pub fn expect_tag(&mut self, expected: u8) -> Result<usize> {
        let actual = self.read_tag()?;
        if actual != expected {
            return Err(self.fail(DecodeErrorKind::UnexpectedTag { expected, actual }));
        }
        self.read_length()
    }

    pub fn read_integer(&mut self) -> Result<i32> {
        let len = self.expect_tag(tag::universal::INTEGER)?;
        self.read_integer_value(len)
    }

    /// Signed integer content. Over-long encodings are truncated to four
    /// bytes the way net-snmp does.
    pub fn read_integer_value(&mut self, len: usize) -> Result<i32> {
        if len == 0 {
            return Err(self.fail(DecodeErrorKind::ZeroLengthInteger));
        }
        if len > 4 {
            tracing::warn!(target: "snmp_responder::ber", { snmp.offset = self.offset, length = len }, "integer too long, truncating to 4 bytes");
        }
        let bytes = self.read_bytes(len)?;
        let mut value: i32 = if bytes[0] & 0x80 != 0 { -1 } else { 0 };
        for &byte in bytes.iter().take(4) {
            value = (value << 8) | byte as i32;
        }
        Ok(value)
    }

    pub fn read_unsigned32_value(&mut self, len: usize) -> Result<u32> {
        if len == 0 {
            return Err(self.fail(DecodeErrorKind::ZeroLengthInteger));
        }
        if len > 5 {
            return Err(self.fail(DecodeErrorKind::IntegerOverflow));
        }
        let bytes = self.read_bytes(len)?;
        let value = bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64);
        u32::try_from(value).map_err(|_| self.fail(DecodeErrorKind::IntegerOverflow))
    }

    pub fn read_integer64_value(&mut self, len: usize) -> Result<u64> {
        if len == 0 {
            return Err(self.fail(DecodeErrorKind::ZeroLengthInteger));
        }
        if len > 9 {
            return Err(self.fail(DecodeErrorKind::Integer64TooLong { length: len }));
        }
        let bytes = self.read_bytes(len)?;
        if len == 9 && bytes[0] != 0 {
            return Err(self.fail(DecodeErrorKind::IntegerOverflow));
        }
        Ok(bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64))
    }

    pub fn read_octet_string(&mut self) -> Result<Bytes> {
        let len = self.expect_tag(tag::universal::OCTET_STRING)?;
        self.read_bytes(len)
    }

    pub fn read_null(&mut self) -> Result<()> {
        let len = self.expect_tag(tag::universal::NULL)?;
        if len != 0 {
            return Err(self.fail(DecodeErrorKind::InvalidNull));
        }
        Ok(())
    }

    pub fn read_oid(&mut self) -> Result<Oid> {
        let len = self.expect_tag(tag::universal::OBJECT_IDENTIFIER)?;
        self.read_oid_value(len)
    }

    pub fn read_oid_value(&mut self, len: usize) -> Result<Oid> {
        let offset = self.offset;
        let bytes = self.read_bytes(len)?;
        Oid::from_ber(&bytes).map_err(|kind| malformed(self.peer, offset, kind))
    }

    pub fn read_ip_address_value(&mut self, len: usize) -> Result<[u8; 4]> {
        if len != 4 {
            return Err(self.fail(DecodeErrorKind::InvalidIpAddressLength { length: len }));
        }
        let bytes = self.read_bytes(4)?;
        Ok([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    /// Read a SEQUENCE and return a decoder over its contents.
    pub fn read_sequence(&mut self) -> Result<Decoder> {
        self.read_constructed(tag::universal::SEQUENCE)
    }

    pub fn read_constructed(&mut self, expected_tag: u8) -> Result<Decoder> {
        let len = self.expect_tag(expected_tag)?;
        let content = self.read_bytes(len)?;
        Ok(self.child(content))
    }

    /// Skip one TLV without parsing it.
    pub fn skip_tlv(&mut self) -> Result<()> {
        self.read_tag()?;
        let len = self.read_length()?;
        let end = self.offset.saturating_add(len);
        if end > self.data.len() {
            return Err(self.fail(DecodeErrorKind::TlvOverflow));
        }
        self.offset = end;
        Ok(())
    }

    /// Remaining bytes as a slice.
    pub fn remaining_slice(&self) -> &[u8] {
        &self.data[self.offset..]
    }
}

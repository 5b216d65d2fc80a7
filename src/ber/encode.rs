//! BER encoding.
//!
//! [`EncodeBuf`] grows backwards: content is pushed first and the tag and
//! length are prepended afterwards, so nested SEQUENCEs never need a second
//! pass to patch lengths. Callers therefore push fields in reverse order.

use bytes::Bytes;

use super::length::encode_length;
use super::tag;
use crate::oid::Oid;

/// Reverse-growing encode buffer.
#[derive(Debug, Default)]
pub struct EncodeBuf {
    // Stored reversed; `finish` flips it.
    rev: Vec<u8>,
}

impl EncodeBuf {
    pub fn new() -> Self {
        Self::with_capacity(512)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            rev: Vec::with_capacity(capacity),
        }
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.rev.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rev.is_empty()
    }

    pub fn push_byte(&mut self, byte: u8) {
        self.rev.push(byte);
    }

    /// Prepend `data` (kept in its natural order in the output).
    pub fn push_bytes(&mut self, data: &[u8]) {
        self.rev.extend(data.iter().rev());
    }

    pub fn push_tag(&mut self, tag: u8) {
        self.rev.push(tag);
    }

    pub fn push_length(&mut self, len: usize) {
        let (bytes, n) = encode_length(len);
        self.rev.extend_from_slice(&bytes[..n]);
    }

    /// Wrap whatever `f` pushes in a constructed TLV with `tag`.
    pub fn push_constructed(&mut self, tag: u8, f: impl FnOnce(&mut Self)) {
        let before = self.len();
        f(self);
        let content_len = self.len() - before;
        self.push_length(content_len);
        self.push_tag(tag);
    }

    pub fn push_sequence(&mut self, f: impl FnOnce(&mut Self)) {
        self.push_constructed(tag::universal::SEQUENCE, f);
    }

    pub fn push_integer(&mut self, value: i32) {
        self.push_signed(tag::universal::INTEGER, value as i64);
    }

    fn push_signed(&mut self, tag: u8, value: i64) {
        let bytes = value.to_be_bytes();
        let n = super::integer_content_len(value);
        self.push_bytes(&bytes[8 - n..]);
        self.push_length(n);
        self.push_tag(tag);
    }

    /// Unsigned value with an application tag (Counter32, Gauge32, TimeTicks).
    pub fn push_unsigned32(&mut self, tag: u8, value: u32) {
        self.push_unsigned(tag, value as u64);
    }

    /// Counter64.
    pub fn push_integer64(&mut self, value: u64) {
        self.push_unsigned(tag::application::COUNTER64, value);
    }

    fn push_unsigned(&mut self, tag: u8, value: u64) {
        let n = super::unsigned_content_len(value);
        let bytes = value.to_be_bytes();
        if n > 8 {
            self.push_bytes(&bytes);
            self.push_byte(0x00);
        } else {
            self.push_bytes(&bytes[8 - n..]);
        }
        self.push_length(n);
        self.push_tag(tag);
    }

    pub fn push_octet_string(&mut self, data: &[u8]) {
        self.push_bytes(data);
        self.push_length(data.len());
        self.push_tag(tag::universal::OCTET_STRING);
    }

    pub fn push_null(&mut self) {
        self.push_length(0);
        self.push_tag(tag::universal::NULL);
    }

    pub fn push_oid(&mut self, oid: &Oid) {
        let ber = oid.to_ber_smallvec();
        self.push_bytes(&ber);
        self.push_length(ber.len());
        self.push_tag(tag::universal::OBJECT_IDENTIFIER);
    }

    pub fn push_ip_address(&mut self, addr: [u8; 4]) {
        self.push_bytes(&addr);
        self.push_length(4);
        self.push_tag(tag::application::IP_ADDRESS);
    }

    /// Finish encoding and return the bytes in wire order.
    pub fn finish(mut self) -> Bytes {
        self.rev.reverse();
        Bytes::from(self.rev)
    }

    /// Finish encoding into a `Vec`, for callers that patch bytes in place.
    pub fn finish_vec(mut self) -> Vec<u8> {
        self.rev.reverse();
        self.rev
    }
}

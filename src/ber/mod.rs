//! Basic Encoding Rules (X.690) subset used by SNMP.
//!
//! Encoding writes backwards into an [`EncodeBuf`] so that lengths are known
//! before their headers are emitted. Decoding is zero-copy over `Bytes`.

mod decode;
mod encode;
mod length;
pub mod tag;

use std::net::SocketAddr;

pub use decode::Decoder;
pub use encode::EncodeBuf;
pub use length::{MAX_LENGTH, decode_length, encode_length, length_encoded_len};

use crate::error::{DecodeErrorKind, Error, UNKNOWN_PEER};

/// Log a decode failure with its detailed kind and return the public error.
pub(crate) fn malformed(peer: Option<SocketAddr>, offset: usize, kind: DecodeErrorKind) -> Box<Error> {
    tracing::debug!(target: "snmp_responder::ber", { snmp.offset = offset, kind = %kind }, "decode error");
    Error::Decode {
        peer: peer.unwrap_or(UNKNOWN_PEER),
    }
    .boxed()
}

/// Content length of a minimally encoded signed INTEGER.
pub(crate) fn integer_content_len(value: i64) -> usize {
    let bytes = value.to_be_bytes();
    let mut start = 0;
    while start < 7 {
        let (b, next) = (bytes[start], bytes[start + 1]);
        if (b == 0x00 && next & 0x80 == 0) || (b == 0xFF && next & 0x80 != 0) {
            start += 1;
        } else {
            break;
        }
    }
    8 - start
}

/// Content length of a minimally encoded unsigned value (with a leading zero
/// octet when the high bit would otherwise be set).
pub(crate) fn unsigned_content_len(value: u64) -> usize {
    if value == 0 {
        return 1;
    }
    let significant = 8 - (value.leading_zeros() as usize / 8);
    if value >> (significant * 8 - 1) & 1 == 1 {
        significant + 1
    } else {
        significant
    }
}

/// Total TLV size for a primitive with `content_len` bytes of content.
pub(crate) fn tlv_len(content_len: usize) -> usize {
    1 + length_encoded_len(content_len) + content_len
}

//! BER length encoding and decoding.
//!
//! X.690 Section 8.1.3: short form for 0-127, long form otherwise. The
//! indefinite form (0x80) is rejected.

use std::net::SocketAddr;

use super::malformed;
use crate::error::{DecodeErrorKind, Result};

/// Largest content length accepted from the wire.
///
/// A UDP datagram can never carry more than 64 KiB, so anything above this
/// is garbage.
pub const MAX_LENGTH: usize = 0x10000;

/// Encode a length, returning the bytes in reverse order for prepending.
pub fn encode_length(len: usize) -> ([u8; 5], usize) {
    let mut buf = [0u8; 5];
    if len <= 127 {
        buf[0] = len as u8;
        return (buf, 1);
    }
    let mut n = 0;
    let mut rest = len;
    while rest > 0 {
        buf[n] = rest as u8;
        rest >>= 8;
        n += 1;
    }
    buf[n] = 0x80 | n as u8;
    (buf, n + 1)
}

/// Number of bytes [`encode_length`] produces for `len`.
pub fn length_encoded_len(len: usize) -> usize {
    match len {
        0..=0x7F => 1,
        0x80..=0xFF => 2,
        0x100..=0xFFFF => 3,
        0x1_0000..=0xFF_FFFF => 4,
        _ => 5,
    }
}

/// Decode a length from `data`, returning `(length, bytes_consumed)`.
///
/// `base_offset` and `peer` only feed the debug log on failure.
pub fn decode_length(
    data: &[u8],
    base_offset: usize,
    peer: Option<SocketAddr>,
) -> Result<(usize, usize)> {
    let Some(&first) = data.first() else {
        return Err(malformed(peer, base_offset, DecodeErrorKind::TruncatedData));
    };

    if first == 0x80 {
        return Err(malformed(peer, base_offset, DecodeErrorKind::IndefiniteLength));
    }
    if first & 0x80 == 0 {
        return Ok((first as usize, 1));
    }

    let octets = (first & 0x7F) as usize;
    if octets > 4 {
        return Err(malformed(
            peer,
            base_offset,
            DecodeErrorKind::LengthTooLong { octets },
        ));
    }
    if data.len() < 1 + octets {
        return Err(malformed(peer, base_offset, DecodeErrorKind::TruncatedData));
    }

    let len = data[1..=octets]
        .iter()
        .fold(0usize, |acc, &b| (acc << 8) | b as usize);
    if len > MAX_LENGTH {
        return Err(malformed(
            peer,
            base_offset,
            DecodeErrorKind::LengthExceedsMax {
                length: len,
                max: MAX_LENGTH,
            },
        ));
    }
    Ok((len, 1 + octets))
}

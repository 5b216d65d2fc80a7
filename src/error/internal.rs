//! Detailed error kinds.
//!
//! These never reach a peer or the public [`Error`](super::Error) type. They are
//! logged at debug level next to the simplified public error so that operators
//! can see exactly why a datagram was dropped.

use std::fmt;

/// Why a BER or message decode failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DecodeErrorKind {
    UnexpectedTag { expected: u8, actual: u8 },
    TruncatedData,
    IndefiniteLength,
    LengthTooLong { octets: usize },
    LengthExceedsMax { length: usize, max: usize },
    InsufficientData { needed: usize, available: usize },
    TlvOverflow,
    ZeroLengthInteger,
    IntegerOverflow,
    Integer64TooLong { length: usize },
    InvalidNull,
    InvalidIpAddressLength { length: usize },
    ConstructedOctetString,
    OidTooLong { count: usize, max: usize },
    UnknownVersion(i32),
    UnknownPduType(u8),
    InvalidMsgFlags,
    InvalidMsgId(i32),
    UnknownSecurityModel(i32),
    MsgMaxSizeTooSmall { value: i32, minimum: i32 },
}

impl fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedTag { expected, actual } => {
                write!(f, "expected tag 0x{:02X}, got 0x{:02X}", expected, actual)
            }
            Self::TruncatedData => write!(f, "unexpected end of data"),
            Self::IndefiniteLength => write!(f, "indefinite length encoding not supported"),
            Self::LengthTooLong { octets } => {
                write!(f, "length encoding too long ({} octets)", octets)
            }
            Self::LengthExceedsMax { length, max } => {
                write!(f, "length {} exceeds maximum {}", length, max)
            }
            Self::InsufficientData { needed, available } => {
                write!(f, "need {} bytes but only {} remaining", needed, available)
            }
            Self::TlvOverflow => write!(f, "TLV extends past end of data"),
            Self::ZeroLengthInteger => write!(f, "zero-length integer"),
            Self::IntegerOverflow => write!(f, "integer overflow"),
            Self::Integer64TooLong { length } => write!(f, "integer64 too long: {} bytes", length),
            Self::InvalidNull => write!(f, "NULL with non-zero length"),
            Self::InvalidIpAddressLength { length } => {
                write!(f, "IP address must be 4 bytes, got {}", length)
            }
            Self::ConstructedOctetString => write!(f, "constructed OCTET STRING not supported"),
            Self::OidTooLong { count, max } => {
                write!(f, "OID has {} arcs, exceeds maximum {}", count, max)
            }
            Self::UnknownVersion(v) => write!(f, "unknown SNMP version: {}", v),
            Self::UnknownPduType(t) => write!(f, "unknown PDU type: 0x{:02X}", t),
            Self::InvalidMsgFlags => write!(f, "invalid msgFlags: privacy without authentication"),
            Self::InvalidMsgId(v) => write!(f, "msgID out of range: {}", v),
            Self::UnknownSecurityModel(m) => write!(f, "unknown security model: {}", m),
            Self::MsgMaxSizeTooSmall { value, minimum } => {
                write!(f, "msgMaxSize {} below minimum {}", value, minimum)
            }
        }
    }
}

/// Why USM authentication failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AuthErrorKind {
    NoAuthKey,
    HmacMismatch,
    WrongMacLength { expected: usize, actual: usize },
    AuthParamsNotFound,
}

impl fmt::Display for AuthErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoAuthKey => write!(f, "no authentication key available"),
            Self::HmacMismatch => write!(f, "HMAC verification failed"),
            Self::WrongMacLength { expected, actual } => {
                write!(f, "wrong MAC length: expected {}, got {}", expected, actual)
            }
            Self::AuthParamsNotFound => write!(f, "could not locate auth params in message"),
        }
    }
}

/// Why a privacy operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CryptoErrorKind {
    InvalidKeyLength,
    InvalidPrivParamsLength { expected: usize, actual: usize },
    InvalidCiphertextLength { length: usize, block_size: usize },
    CipherError,
}

impl fmt::Display for CryptoErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidKeyLength => write!(f, "invalid key length"),
            Self::InvalidPrivParamsLength { expected, actual } => write!(
                f,
                "invalid privParameters length: expected {}, got {}",
                expected, actual
            ),
            Self::InvalidCiphertextLength { length, block_size } => write!(
                f,
                "ciphertext length {} not a multiple of block size {}",
                length, block_size
            ),
            Self::CipherError => write!(f, "cipher operation failed"),
        }
    }
}

/// Why OID text could not be turned into an [`Oid`](crate::Oid).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OidErrorKind {
    InvalidArc,
    InvalidFirstArc(u32),
    InvalidSecondArc { first: u32, second: u32 },
    TooManyArcs { count: usize, max: usize },
}

impl fmt::Display for OidErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArc => write!(f, "invalid arc value"),
            Self::InvalidFirstArc(v) => write!(f, "first arc must be 0, 1, or 2, got {}", v),
            Self::InvalidSecondArc { first, second } => write!(
                f,
                "second arc must be <= 39 when first arc is {}, got {}",
                first, second
            ),
            Self::TooManyArcs { count, max } => {
                write!(f, "OID has {} arcs, exceeds maximum {}", count, max)
            }
        }
    }
}

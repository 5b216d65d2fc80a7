//! Error types for snmp-responder.
//!
//! - [`Error`] - the crate-wide error type
//! - [`ErrorStatus`] - SNMP protocol error codes placed in response PDUs (RFC 3416)
//! - [`TransportFailure`] - why a notification could not be delivered
//!
//! Errors are boxed: `Result<T> = Result<T, Box<Error>>`.
//!
//! ```rust
//! use snmp_responder::{Error, Result};
//!
//! fn report(result: Result<()>) {
//!     match result {
//!         Ok(()) => {}
//!         Err(e) => match &*e {
//!             Error::MalformedRecord { path, line, reason } => {
//!                 eprintln!("{}:{}: {}", path, line, reason);
//!             }
//!             Error::Transport { target, reason } => {
//!                 eprintln!("notification to {} failed: {}", target, reason);
//!             }
//!             other => eprintln!("error: {}", other),
//!         },
//!     }
//! }
//! ```

pub(crate) mod internal;

use std::net::SocketAddr;
use std::time::Duration;

use crate::oid::Oid;

pub(crate) use internal::{AuthErrorKind, CryptoErrorKind, DecodeErrorKind, OidErrorKind};

/// Placeholder peer used when a decode error happens outside any datagram
/// context (for example, decoding a buffer in a test).
pub(crate) const UNKNOWN_PEER: SocketAddr =
    SocketAddr::new(std::net::IpAddr::V4(std::net::Ipv4Addr::new(0, 0, 0, 0)), 0);

// Detailed internal kinds are logged, the public error stays small:
//
// tracing::debug!(
//     target: "snmp_responder::ber",
//     { snmp.offset = 42, kind = %DecodeErrorKind::ZeroLengthInteger },
//     "zero-length integer"
// );
// return Err(Error::Decode { peer }.boxed());

/// Result type alias using the crate's boxed Error type.
pub type Result<T> = std::result::Result<T, Box<Error>>;

/// Why a notification did not reach its target.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TransportFailure {
    /// Socket-level send or receive failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// An inform was sent but no matching Response arrived in time.
    #[error("no acknowledgement within {0:?}")]
    NoAcknowledgement(Duration),

    /// The receiver's SNMPv3 engine could not be discovered.
    #[error("engine discovery failed")]
    Discovery,
}

/// The main error type.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A recorded data file contained an unparseable line.
    #[error("malformed record at {path}:{line}: {reason}")]
    MalformedRecord {
        path: Box<str>,
        line: usize,
        reason: Box<str>,
    },

    /// An inbound datagram could not be decoded.
    #[error("malformed message from {peer}")]
    Decode { peer: SocketAddr },

    /// No context is registered under the request's identity key.
    #[error("no context registered for {identity:?}")]
    Unauthorized { identity: Box<str> },

    /// USM authentication or decryption failed.
    #[error("authentication failed for {peer}")]
    Auth { peer: SocketAddr },

    /// A write targeted a read-only entry.
    #[error("{oid} is not writable")]
    NotWritable { oid: Oid },

    /// A write carried a value of a different kind than the recorded entry.
    #[error("wrong value type for {oid}")]
    WrongType { oid: Oid },

    /// Notification delivery failed.
    #[error("notification to {target} failed: {reason}")]
    Transport {
        target: SocketAddr,
        #[source]
        reason: TransportFailure,
    },

    /// Socket bind or I/O failure on an endpoint.
    #[error("network error on {addr}: {source}")]
    Network {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Reading the data directory failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: Box<str>,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(Box<str>),

    /// Invalid OID text.
    #[error("invalid OID: {0}")]
    InvalidOid(Box<str>),
}

impl Error {
    /// Box this error (convenience for constructing boxed errors).
    pub fn boxed(self) -> Box<Self> {
        Box::new(self)
    }

    pub(crate) fn invalid_oid(kind: OidErrorKind, input: &str) -> Box<Self> {
        tracing::debug!(target: "snmp_responder::oid", { kind = %kind, input }, "invalid OID");
        Error::InvalidOid(format!("{input}: {kind}").into()).boxed()
    }

    pub(crate) fn config(msg: impl Into<String>) -> Box<Self> {
        Error::Config(msg.into().into_boxed_str()).boxed()
    }

    /// The protocol error status a failed write maps to in a v2c/v3 response.
    pub fn write_status(&self) -> ErrorStatus {
        match self {
            Self::NotWritable { .. } => ErrorStatus::NotWritable,
            Self::WrongType { .. } => ErrorStatus::WrongType,
            _ => ErrorStatus::GenErr,
        }
    }
}

/// SNMP protocol error status codes (RFC 3416).
///
/// SNMPv1 only knows codes 0 through 5; [`ErrorStatus::to_v1`] folds the
/// v2 codes into their v1 equivalents (RFC 3584 section 4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorStatus {
    NoError,
    TooBig,
    NoSuchName,
    BadValue,
    ReadOnly,
    GenErr,
    NoAccess,
    WrongType,
    WrongLength,
    WrongEncoding,
    WrongValue,
    NoCreation,
    InconsistentValue,
    ResourceUnavailable,
    CommitFailed,
    UndoFailed,
    AuthorizationError,
    NotWritable,
    InconsistentName,
    /// Unknown or future error status code.
    Unknown(i32),
}

impl ErrorStatus {
    /// Create from raw status code.
    pub fn from_i32(value: i32) -> Self {
        match value {
            0 => Self::NoError,
            1 => Self::TooBig,
            2 => Self::NoSuchName,
            3 => Self::BadValue,
            4 => Self::ReadOnly,
            5 => Self::GenErr,
            6 => Self::NoAccess,
            7 => Self::WrongType,
            8 => Self::WrongLength,
            9 => Self::WrongEncoding,
            10 => Self::WrongValue,
            11 => Self::NoCreation,
            12 => Self::InconsistentValue,
            13 => Self::ResourceUnavailable,
            14 => Self::CommitFailed,
            15 => Self::UndoFailed,
            16 => Self::AuthorizationError,
            17 => Self::NotWritable,
            18 => Self::InconsistentName,
            other => Self::Unknown(other),
        }
    }

    /// Convert to raw status code.
    pub fn as_i32(&self) -> i32 {
        match self {
            Self::NoError => 0,
            Self::TooBig => 1,
            Self::NoSuchName => 2,
            Self::BadValue => 3,
            Self::ReadOnly => 4,
            Self::GenErr => 5,
            Self::NoAccess => 6,
            Self::WrongType => 7,
            Self::WrongLength => 8,
            Self::WrongEncoding => 9,
            Self::WrongValue => 10,
            Self::NoCreation => 11,
            Self::InconsistentValue => 12,
            Self::ResourceUnavailable => 13,
            Self::CommitFailed => 14,
            Self::UndoFailed => 15,
            Self::AuthorizationError => 16,
            Self::NotWritable => 17,
            Self::InconsistentName => 18,
            Self::Unknown(code) => *code,
        }
    }

    /// Map a v2 status to the closest SNMPv1 status.
    pub fn to_v1(self) -> Self {
        match self {
            Self::NoError | Self::TooBig | Self::NoSuchName | Self::BadValue | Self::ReadOnly => {
                self
            }
            Self::WrongValue
            | Self::WrongEncoding
            | Self::WrongType
            | Self::WrongLength
            | Self::InconsistentValue => Self::BadValue,
            Self::NoAccess
            | Self::NotWritable
            | Self::NoCreation
            | Self::InconsistentName
            | Self::AuthorizationError => Self::NoSuchName,
            _ => Self::GenErr,
        }
    }
}

impl std::fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoError => write!(f, "noError"),
            Self::TooBig => write!(f, "tooBig"),
            Self::NoSuchName => write!(f, "noSuchName"),
            Self::BadValue => write!(f, "badValue"),
            Self::ReadOnly => write!(f, "readOnly"),
            Self::GenErr => write!(f, "genErr"),
            Self::NoAccess => write!(f, "noAccess"),
            Self::WrongType => write!(f, "wrongType"),
            Self::WrongLength => write!(f, "wrongLength"),
            Self::WrongEncoding => write!(f, "wrongEncoding"),
            Self::WrongValue => write!(f, "wrongValue"),
            Self::NoCreation => write!(f, "noCreation"),
            Self::InconsistentValue => write!(f, "inconsistentValue"),
            Self::ResourceUnavailable => write!(f, "resourceUnavailable"),
            Self::CommitFailed => write!(f, "commitFailed"),
            Self::UndoFailed => write!(f, "undoFailed"),
            Self::AuthorizationError => write!(f, "authorizationError"),
            Self::NotWritable => write!(f, "notWritable"),
            Self::InconsistentName => write!(f, "inconsistentName"),
            Self::Unknown(code) => write!(f, "unknown({})", code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_size_budget() {
        assert_eq!(
            std::mem::size_of::<Result<()>>(),
            std::mem::size_of::<*const ()>(),
            "Result<()> should be pointer-sized"
        );
    }

    #[test]
    fn v1_status_folding() {
        assert_eq!(ErrorStatus::NotWritable.to_v1(), ErrorStatus::NoSuchName);
        assert_eq!(ErrorStatus::NoCreation.to_v1(), ErrorStatus::NoSuchName);
        assert_eq!(ErrorStatus::WrongType.to_v1(), ErrorStatus::BadValue);
        assert_eq!(ErrorStatus::TooBig.to_v1(), ErrorStatus::TooBig);
        assert_eq!(ErrorStatus::CommitFailed.to_v1(), ErrorStatus::GenErr);
    }

    #[test]
    fn status_roundtrip_and_display() {
        for code in 0..=18 {
            assert_eq!(ErrorStatus::from_i32(code).as_i32(), code);
        }
        assert_eq!(ErrorStatus::from_i32(17).to_string(), "notWritable");
        assert_eq!(ErrorStatus::from_i32(99), ErrorStatus::Unknown(99));
    }

    #[test]
    fn write_status_mapping() {
        let oid = crate::oid!(1, 3, 6, 1);
        assert_eq!(
            Error::NotWritable { oid: oid.clone() }.write_status(),
            ErrorStatus::NotWritable
        );
        assert_eq!(Error::WrongType { oid }.write_status(), ErrorStatus::WrongType);
    }
}

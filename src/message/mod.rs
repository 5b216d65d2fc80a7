//! SNMP message wrappers.
//!
//! - [`CommunityMessage`] - v1/v2c, authenticated by community string
//! - [`V3Message`] - v3 with USM security parameters

mod community;
mod v3;

pub use community::{CommunityMessage, TrapV1Message};
pub use v3::{MsgFlags, MsgGlobalData, ScopedPdu, SecurityLevel, V3Message, V3MessageData};

use std::net::SocketAddr;

use bytes::Bytes;

use crate::ber::Decoder;
use crate::error::{DecodeErrorKind, Result};
use crate::version::Version;

/// A decoded inbound message of any version.
#[derive(Debug)]
pub enum Message {
    Community(CommunityMessage),
    V3(V3Message),
}

impl Message {
    /// Decode a datagram received from `peer`.
    pub fn decode(data: Bytes, peer: SocketAddr) -> Result<Self> {
        let mut decoder = Decoder::with_peer(data, peer);
        let mut seq = decoder.read_sequence()?;

        let raw = seq.read_integer()?;
        let version = Version::from_i32(raw)
            .ok_or_else(|| seq.fail(DecodeErrorKind::UnknownVersion(raw)))?;

        match version {
            Version::V1 | Version::V2c => Ok(Message::Community(
                CommunityMessage::decode_from_sequence(&mut seq, version)?,
            )),
            Version::V3 => Ok(Message::V3(V3Message::decode_from_sequence(&mut seq)?)),
        }
    }

    pub fn version(&self) -> Version {
        match self {
            Message::Community(m) => m.version,
            Message::V3(_) => Version::V3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;
    use crate::pdu::Pdu;

    #[test]
    fn dispatches_on_version() {
        let peer: SocketAddr = "127.0.0.1:5000".parse().unwrap();
        let msg = CommunityMessage::v2c("public", Pdu::get_request(1, &[oid!(1, 3, 6, 1)]));
        let decoded = Message::decode(msg.encode(), peer).unwrap();
        assert_eq!(decoded.version(), Version::V2c);

        // SEQUENCE { INTEGER 2 } is not a known version
        assert!(Message::decode(Bytes::from_static(&[0x30, 0x03, 0x02, 0x01, 0x02]), peer).is_err());
    }
}

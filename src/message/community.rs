//! Community-based message format (v1/v2c).
//!
//! `SEQUENCE { version INTEGER, community OCTET STRING, pdu PDU }`

use bytes::Bytes;

use crate::ber::{Decoder, EncodeBuf};
use crate::error::{DecodeErrorKind, Result};
use crate::pdu::{Pdu, TrapV1Pdu};
use crate::version::Version;

#[derive(Debug, Clone)]
pub struct CommunityMessage {
    pub version: Version,
    pub community: Bytes,
    pub pdu: Pdu,
}

impl CommunityMessage {
    pub fn new(version: Version, community: impl AsRef<[u8]>, pdu: Pdu) -> Self {
        debug_assert!(version != Version::V3, "community message cannot be v3");
        Self {
            version,
            community: Bytes::copy_from_slice(community.as_ref()),
            pdu,
        }
    }

    pub fn v1(community: impl AsRef<[u8]>, pdu: Pdu) -> Self {
        Self::new(Version::V1, community, pdu)
    }

    pub fn v2c(community: impl AsRef<[u8]>, pdu: Pdu) -> Self {
        Self::new(Version::V2c, community, pdu)
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = EncodeBuf::new();
        buf.push_sequence(|buf| {
            self.pdu.encode(buf);
            buf.push_octet_string(&self.community);
            buf.push_integer(self.version.as_i32());
        });
        buf.finish()
    }

    pub fn decode(data: Bytes) -> Result<Self> {
        let mut decoder = Decoder::new(data);
        let mut seq = decoder.read_sequence()?;
        let raw = seq.read_integer()?;
        let version = Version::from_i32(raw)
            .filter(|v| *v != Version::V3)
            .ok_or_else(|| seq.fail(DecodeErrorKind::UnknownVersion(raw)))?;
        Self::decode_from_sequence(&mut seq, version)
    }

    pub(crate) fn decode_from_sequence(seq: &mut Decoder, version: Version) -> Result<Self> {
        let community = seq.read_octet_string()?;
        let pdu = Pdu::decode(seq)?;
        Ok(Self {
            version,
            community,
            pdu,
        })
    }
}

/// SNMPv1 message carrying a Trap-PDU.
#[derive(Debug, Clone)]
pub struct TrapV1Message {
    pub community: Bytes,
    pub pdu: TrapV1Pdu,
}

impl TrapV1Message {
    pub fn encode(&self) -> Bytes {
        let mut buf = EncodeBuf::new();
        buf.push_sequence(|buf| {
            self.pdu.encode(buf);
            buf.push_octet_string(&self.community);
            buf.push_integer(Version::V1.as_i32());
        });
        buf.finish()
    }

    pub fn decode(data: Bytes) -> Result<Self> {
        let mut decoder = Decoder::new(data);
        let mut seq = decoder.read_sequence()?;
        let raw = seq.read_integer()?;
        if raw != Version::V1.as_i32() {
            return Err(seq.fail(DecodeErrorKind::UnknownVersion(raw)));
        }
        let community = seq.read_octet_string()?;
        let pdu = TrapV1Pdu::decode(&mut seq)?;
        Ok(Self { community, pdu })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;

    #[test]
    fn v1_and_v2c_roundtrip() {
        for version in [Version::V1, Version::V2c] {
            let msg = CommunityMessage::new(version, "public", Pdu::get_request(42, &[oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)]));
            let decoded = CommunityMessage::decode(msg.encode()).unwrap();
            assert_eq!(decoded.version, version);
            assert_eq!(decoded.community.as_ref(), b"public");
            assert_eq!(decoded.pdu, msg.pdu);
        }
    }

    #[test]
    fn trap_v1_roundtrip() {
        let pdu = TrapV1Pdu::from_trap_oid(
            &oid!(1, 3, 6, 1, 6, 3, 1, 1, 5, 1),
            std::net::Ipv4Addr::new(10, 0, 0, 1),
            1234,
            vec![],
        );
        let msg = TrapV1Message {
            community: Bytes::from_static(b"public"),
            pdu,
        };
        let decoded = TrapV1Message::decode(msg.encode()).unwrap();
        assert_eq!(decoded.pdu, msg.pdu);
        assert_eq!(decoded.community, msg.community);
    }
}

//! SNMPv3 message format (RFC 3412).
//!
//! ```text
//! SEQUENCE {
//!     INTEGER version (3)
//!     SEQUENCE msgGlobalData { msgID, msgMaxSize, msgFlags, msgSecurityModel }
//!     OCTET STRING msgSecurityParameters (USM)
//!     msgData: ScopedPDU, or an OCTET STRING holding the encrypted ScopedPDU
//! }
//! ```

use bytes::Bytes;

use crate::ber::{Decoder, EncodeBuf};
use crate::error::{DecodeErrorKind, Result};
use crate::pdu::Pdu;

/// User-based Security Model number.
pub(crate) const SECURITY_MODEL_USM: i32 = 3;

/// RFC 3412 msgMaxSize lower bound.
const MSG_MAX_SIZE_MINIMUM: i32 = 484;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SecurityLevel {
    NoAuthNoPriv,
    AuthNoPriv,
    AuthPriv,
}

impl SecurityLevel {
    /// `None` for the invalid priv-without-auth combination.
    pub fn from_flags(flags: u8) -> Option<Self> {
        match (flags & 0x01 != 0, flags & 0x02 != 0) {
            (false, false) => Some(Self::NoAuthNoPriv),
            (true, false) => Some(Self::AuthNoPriv),
            (true, true) => Some(Self::AuthPriv),
            (false, true) => None,
        }
    }

    pub fn to_flags(self) -> u8 {
        match self {
            Self::NoAuthNoPriv => 0x00,
            Self::AuthNoPriv => 0x01,
            Self::AuthPriv => 0x03,
        }
    }

    pub fn requires_auth(self) -> bool {
        matches!(self, Self::AuthNoPriv | Self::AuthPriv)
    }

    pub fn requires_priv(self) -> bool {
        matches!(self, Self::AuthPriv)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MsgFlags {
    pub security_level: SecurityLevel,
    pub reportable: bool,
}

impl MsgFlags {
    pub fn new(security_level: SecurityLevel, reportable: bool) -> Self {
        Self {
            security_level,
            reportable,
        }
    }

    pub fn to_byte(self) -> u8 {
        let mut flags = self.security_level.to_flags();
        if self.reportable {
            flags |= 0x04;
        }
        flags
    }
}

#[derive(Debug, Clone)]
pub struct MsgGlobalData {
    pub msg_id: i32,
    pub msg_max_size: i32,
    pub msg_flags: MsgFlags,
}

impl MsgGlobalData {
    pub fn new(msg_id: i32, msg_max_size: i32, msg_flags: MsgFlags) -> Self {
        Self {
            msg_id,
            msg_max_size,
            msg_flags,
        }
    }

    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_sequence(|buf| {
            buf.push_integer(SECURITY_MODEL_USM);
            buf.push_octet_string(&[self.msg_flags.to_byte()]);
            buf.push_integer(self.msg_max_size);
            buf.push_integer(self.msg_id);
        });
    }

    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let mut seq = decoder.read_sequence()?;

        let msg_id = seq.read_integer()?;
        if msg_id < 0 {
            return Err(seq.fail(DecodeErrorKind::InvalidMsgId(msg_id)));
        }
        let msg_max_size = seq.read_integer()?;
        if msg_max_size < MSG_MAX_SIZE_MINIMUM {
            return Err(seq.fail(DecodeErrorKind::MsgMaxSizeTooSmall {
                value: msg_max_size,
                minimum: MSG_MAX_SIZE_MINIMUM,
            }));
        }

        let flags = seq.read_octet_string()?;
        let byte = match flags.as_ref() {
            [byte] => *byte,
            _ => return Err(seq.fail(DecodeErrorKind::InvalidMsgFlags)),
        };
        let security_level =
            SecurityLevel::from_flags(byte).ok_or_else(|| seq.fail(DecodeErrorKind::InvalidMsgFlags))?;

        let model = seq.read_integer()?;
        if model != SECURITY_MODEL_USM {
            return Err(seq.fail(DecodeErrorKind::UnknownSecurityModel(model)));
        }

        Ok(Self {
            msg_id,
            msg_max_size,
            msg_flags: MsgFlags::new(security_level, byte & 0x04 != 0),
        })
    }
}

#[derive(Debug, Clone)]
pub struct ScopedPdu {
    pub context_engine_id: Bytes,
    pub context_name: Bytes,
    pub pdu: Pdu,
}

impl ScopedPdu {
    pub fn new(context_engine_id: Bytes, context_name: Bytes, pdu: Pdu) -> Self {
        Self {
            context_engine_id,
            context_name,
            pdu,
        }
    }

    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_sequence(|buf| {
            self.pdu.encode(buf);
            buf.push_octet_string(&self.context_name);
            buf.push_octet_string(&self.context_engine_id);
        });
    }

    pub fn encode_to_bytes(&self) -> Bytes {
        let mut buf = EncodeBuf::new();
        self.encode(&mut buf);
        buf.finish()
    }

    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let mut seq = decoder.read_sequence()?;
        let context_engine_id = seq.read_octet_string()?;
        let context_name = seq.read_octet_string()?;
        let pdu = Pdu::decode(&mut seq)?;
        Ok(Self {
            context_engine_id,
            context_name,
            pdu,
        })
    }
}

#[derive(Debug, Clone)]
pub enum V3MessageData {
    Plaintext(ScopedPdu),
    Encrypted(Bytes),
}

#[derive(Debug, Clone)]
pub struct V3Message {
    pub global_data: MsgGlobalData,
    /// Raw BER of the USM parameters; see [`UsmSecurityParams`](crate::v3::UsmSecurityParams).
    pub security_params: Bytes,
    pub data: V3MessageData,
}

impl V3Message {
    pub fn msg_id(&self) -> i32 {
        self.global_data.msg_id
    }

    pub fn security_level(&self) -> SecurityLevel {
        self.global_data.msg_flags.security_level
    }

    pub fn scoped_pdu(&self) -> Option<&ScopedPdu> {
        match &self.data {
            V3MessageData::Plaintext(scoped) => Some(scoped),
            V3MessageData::Encrypted(_) => None,
        }
    }

    pub fn encode(&self) -> Bytes {
        self.encode_buf().finish()
    }

    /// Encode for in-place HMAC patching.
    pub(crate) fn encode_vec(&self) -> Vec<u8> {
        self.encode_buf().finish_vec()
    }

    fn encode_buf(&self) -> EncodeBuf {
        let mut buf = EncodeBuf::new();
        buf.push_sequence(|buf| {
            match &self.data {
                V3MessageData::Plaintext(scoped) => scoped.encode(buf),
                V3MessageData::Encrypted(ciphertext) => buf.push_octet_string(ciphertext),
            }
            buf.push_octet_string(&self.security_params);
            self.global_data.encode(buf);
            buf.push_integer(3);
        });
        buf
    }

    pub fn decode(data: Bytes) -> Result<Self> {
        let mut decoder = Decoder::new(data);
        let mut seq = decoder.read_sequence()?;
        let version = seq.read_integer()?;
        if version != 3 {
            return Err(seq.fail(DecodeErrorKind::UnknownVersion(version)));
        }
        Self::decode_from_sequence(&mut seq)
    }

    pub(crate) fn decode_from_sequence(seq: &mut Decoder) -> Result<Self> {
        let global_data = MsgGlobalData::decode(seq)?;
        let security_params = seq.read_octet_string()?;

        let data = if global_data.msg_flags.security_level.requires_priv() {
            V3MessageData::Encrypted(seq.read_octet_string()?)
        } else {
            V3MessageData::Plaintext(ScopedPdu::decode(seq)?)
        };

        Ok(Self {
            global_data,
            security_params,
            data,
        })
    }
}

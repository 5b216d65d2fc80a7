//! USM security parameters and message protection (RFC 3414 Section 2.4, 3).
//!
//! ```text
//! UsmSecurityParameters ::= SEQUENCE {
//!     msgAuthoritativeEngineID     OCTET STRING,
//!     msgAuthoritativeEngineBoots  INTEGER (0..2147483647),
//!     msgAuthoritativeEngineTime   INTEGER (0..2147483647),
//!     msgUserName                  OCTET STRING (SIZE(0..32)),
//!     msgAuthenticationParameters  OCTET STRING,
//!     msgPrivacyParameters         OCTET STRING
//! }
//! ```

use bytes::Bytes;

use super::auth::{authenticate_message, verify_message};
use super::{SaltCounter, UserKeys, UsmFailure};
use crate::ber::{Decoder, EncodeBuf, decode_length, tag};
use crate::error::{AuthErrorKind, DecodeErrorKind, Error, Result, UNKNOWN_PEER};
use crate::message::{MsgFlags, MsgGlobalData, ScopedPdu, SecurityLevel, V3Message, V3MessageData};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsmSecurityParams {
    pub engine_id: Bytes,
    pub engine_boots: u32,
    pub engine_time: u32,
    pub username: Bytes,
    pub auth_params: Bytes,
    pub priv_params: Bytes,
}

impl UsmSecurityParams {
    pub fn new(engine_id: Bytes, engine_boots: u32, engine_time: u32, username: Bytes) -> Self {
        Self {
            engine_id,
            engine_boots,
            engine_time,
            username,
            auth_params: Bytes::new(),
            priv_params: Bytes::new(),
        }
    }

    /// Parameters of a discovery request: no engine id, boots or time.
    pub fn discovery(username: &[u8]) -> Self {
        Self::new(Bytes::new(), 0, 0, Bytes::copy_from_slice(username))
    }

    pub fn with_auth_placeholder(mut self, mac_len: usize) -> Self {
        self.auth_params = Bytes::from(vec![0u8; mac_len]);
        self
    }

    pub fn with_priv_params(mut self, priv_params: Bytes) -> Self {
        self.priv_params = priv_params;
        self
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = EncodeBuf::new();
        buf.push_sequence(|buf| {
            buf.push_octet_string(&self.priv_params);
            buf.push_octet_string(&self.auth_params);
            buf.push_octet_string(&self.username);
            buf.push_unsigned32(tag::universal::INTEGER, self.engine_time);
            buf.push_unsigned32(tag::universal::INTEGER, self.engine_boots);
            buf.push_octet_string(&self.engine_id);
        });
        buf.finish()
    }

    pub fn decode(data: Bytes) -> Result<Self> {
        let mut decoder = Decoder::new(data);
        let mut seq = decoder.read_sequence()?;

        let engine_id = seq.read_octet_string()?;
        let engine_boots = read_non_negative(&mut seq)?;
        let engine_time = read_non_negative(&mut seq)?;
        let username = seq.read_octet_string()?;
        let auth_params = seq.read_octet_string()?;
        let priv_params = seq.read_octet_string()?;

        Ok(Self {
            engine_id,
            engine_boots,
            engine_time,
            username,
            auth_params,
            priv_params,
        })
    }

    /// Locate msgAuthenticationParameters inside an encoded v3 message,
    /// returning `(offset, length)` of its content octets.
    pub fn find_auth_params_offset(message: &[u8]) -> Option<(usize, usize)> {
        let mut walker = Walker { data: message, pos: 0 };
        walker.enter(tag::universal::SEQUENCE)?;
        walker.skip(tag::universal::INTEGER)?; // msgVersion
        walker.skip(tag::universal::SEQUENCE)?; // msgGlobalData
        walker.enter(tag::universal::OCTET_STRING)?;
        walker.enter(tag::universal::SEQUENCE)?;
        walker.skip(tag::universal::OCTET_STRING)?; // engine id
        walker.skip(tag::universal::INTEGER)?; // boots
        walker.skip(tag::universal::INTEGER)?; // time
        walker.skip(tag::universal::OCTET_STRING)?; // user name
        let len = walker.enter(tag::universal::OCTET_STRING)?;
        (walker.pos + len <= message.len()).then_some((walker.pos, len))
    }
}

fn read_non_negative(seq: &mut Decoder) -> Result<u32> {
    let value = seq.read_integer()?;
    u32::try_from(value).map_err(|_| seq.fail(DecodeErrorKind::IntegerOverflow))
}

struct Walker<'a> {
    data: &'a [u8],
    pos: usize,
}

impl Walker<'_> {
    /// Consume a tag and length, leaving `pos` at the content.
    fn enter(&mut self, expected: u8) -> Option<usize> {
        if *self.data.get(self.pos)? != expected {
            return None;
        }
        let (len, consumed) = decode_length(self.data.get(self.pos + 1..)?, self.pos + 1, None).ok()?;
        self.pos += 1 + consumed;
        Some(len)
    }

    fn skip(&mut self, expected: u8) -> Option<()> {
        let len = self.enter(expected)?;
        self.pos = self.pos.checked_add(len).filter(|&end| end <= self.data.len())?;
        Some(())
    }
}

/// Header fields of an outgoing v3 message.
///
/// `engine_id`, `boots` and `time` belong to the authoritative engine: the
/// responder itself for responses, reports and traps, the receiver for
/// informs.
#[derive(Debug)]
pub struct Outgoing<'a> {
    pub msg_id: i32,
    pub max_size: i32,
    pub level: SecurityLevel,
    pub reportable: bool,
    pub engine_id: &'a Bytes,
    pub boots: u32,
    pub time: u32,
    pub user: &'a Bytes,
    pub keys: &'a UserKeys,
}

/// Encode, encrypt and authenticate a scoped PDU at `out.level`.
pub fn seal(out: &Outgoing<'_>, scoped: &ScopedPdu, salt: &SaltCounter) -> Result<Bytes> {
    let global = MsgGlobalData::new(
        out.msg_id,
        out.max_size,
        MsgFlags::new(out.level, out.reportable),
    );
    let mut params = UsmSecurityParams::new(out.engine_id.clone(), out.boots, out.time, out.user.clone());

    let auth_key = match (out.level.requires_auth(), &out.keys.auth) {
        (false, _) => None,
        (true, Some(key)) => Some(key),
        (true, None) => {
            tracing::debug!(target: "snmp_responder::v3", { kind = %AuthErrorKind::NoAuthKey }, "cannot authenticate outgoing message");
            return Err(Error::Auth { peer: UNKNOWN_PEER }.boxed());
        }
    };

    let data = if out.level.requires_priv() {
        let Some(priv_key) = &out.keys.privacy else {
            tracing::debug!(target: "snmp_responder::v3", "cannot encrypt outgoing message without a privacy key");
            return Err(Error::Auth { peer: UNKNOWN_PEER }.boxed());
        };
        let (ciphertext, priv_params) =
            priv_key.encrypt(&scoped.encode_to_bytes(), out.boots, out.time, salt)?;
        params = params.with_priv_params(priv_params);
        V3MessageData::Encrypted(ciphertext)
    } else {
        V3MessageData::Plaintext(scoped.clone())
    };

    if let Some(key) = auth_key {
        params = params.with_auth_placeholder(key.mac_len());
    }

    let message = V3Message {
        global_data: global,
        security_params: params.encode(),
        data,
    };

    let Some(key) = auth_key else {
        return Ok(message.encode());
    };

    let mut bytes = message.encode_vec();
    let Some((offset, len)) = UsmSecurityParams::find_auth_params_offset(&bytes) else {
        tracing::debug!(target: "snmp_responder::v3", { kind = %AuthErrorKind::AuthParamsNotFound }, "encoded message has no auth parameters");
        return Err(Error::Auth { peer: UNKNOWN_PEER }.boxed());
    };
    authenticate_message(key, &mut bytes, offset, len);
    Ok(Bytes::from(bytes))
}

/// Verify and decrypt a received message with the sender's keys.
///
/// Timeliness is the caller's concern: only the authoritative side can
/// judge it, and it does so between [`verify`] and [`decrypt`].
pub fn open(
    raw: &[u8],
    message: &V3Message,
    params: &UsmSecurityParams,
    keys: &UserKeys,
) -> std::result::Result<ScopedPdu, UsmFailure> {
    verify(raw, message, params, keys)?;
    decrypt(message, params, keys)
}

/// Check the digest of an authenticated message. Messages below
/// authNoPriv pass untouched.
pub fn verify(
    raw: &[u8],
    message: &V3Message,
    params: &UsmSecurityParams,
    keys: &UserKeys,
) -> std::result::Result<(), UsmFailure> {
    if !message.security_level().requires_auth() {
        return Ok(());
    }
    let Some(key) = &keys.auth else {
        return Err(UsmFailure::UnsupportedSecLevel);
    };
    if params.auth_params.len() != key.mac_len() {
        tracing::debug!(target: "snmp_responder::v3", { kind = %AuthErrorKind::WrongMacLength { expected: key.mac_len(), actual: params.auth_params.len() } }, "bad auth parameters");
        return Err(UsmFailure::WrongDigest);
    }
    let Some((offset, len)) = UsmSecurityParams::find_auth_params_offset(raw) else {
        tracing::debug!(target: "snmp_responder::v3", { kind = %AuthErrorKind::AuthParamsNotFound }, "bad auth parameters");
        return Err(UsmFailure::WrongDigest);
    };
    if !verify_message(key, raw, offset, len) {
        tracing::debug!(target: "snmp_responder::v3", { kind = %AuthErrorKind::HmacMismatch }, "digest mismatch");
        return Err(UsmFailure::WrongDigest);
    }
    Ok(())
}

/// The scoped PDU, decrypted when the message claims privacy.
pub fn decrypt(
    message: &V3Message,
    params: &UsmSecurityParams,
    keys: &UserKeys,
) -> std::result::Result<ScopedPdu, UsmFailure> {
    match (&message.data, message.security_level().requires_priv()) {
        (V3MessageData::Plaintext(scoped), false) => Ok(scoped.clone()),
        (V3MessageData::Encrypted(ciphertext), true) => {
            let Some(priv_key) = &keys.privacy else {
                return Err(UsmFailure::UnsupportedSecLevel);
            };
            let plaintext = priv_key
                .decrypt(ciphertext, params.engine_boots, params.engine_time, &params.priv_params)
                .map_err(|_| UsmFailure::DecryptionError)?;
            ScopedPdu::decode(&mut Decoder::new(plaintext)).map_err(|_| UsmFailure::DecryptionError)
        }
        _ => Err(UsmFailure::DecryptionError),
    }
}

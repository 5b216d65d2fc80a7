//! SNMP value types.

use bytes::Bytes;

use crate::ber::{Decoder, EncodeBuf, tag, tlv_len};
use crate::error::{DecodeErrorKind, Result};
use crate::oid::Oid;
use crate::util::hex;

/// SNMP value, including the three v2 varbind exceptions.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Value {
    Integer(i32),
    OctetString(Bytes),
    Null,
    ObjectIdentifier(Oid),
    IpAddress([u8; 4]),
    /// Counter32 (wrapping).
    Counter32(u32),
    /// Gauge32 / Unsigned32.
    Gauge32(u32),
    /// Hundredths of a second.
    TimeTicks(u32),
    Opaque(Bytes),
    /// Counter64. Not representable in SNMPv1.
    Counter64(u64),
    NoSuchObject,
    NoSuchInstance,
    EndOfMibView,
    /// Unrecognised tag, kept so that a SET carrying it can be answered
    /// with `wrongType` instead of being dropped.
    Unknown { tag: u8, data: Bytes },
}

impl Value {
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::Counter32(v) | Value::Gauge32(v) | Value::TimeTicks(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Value::Counter64(v) => Some(*v),
            Value::Counter32(v) | Value::Gauge32(v) | Value::TimeTicks(v) => Some(*v as u64),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::OctetString(v) | Value::Opaque(v) => Some(v),
            _ => None,
        }
    }

    /// OCTET STRING content as UTF-8, if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    pub fn is_exception(&self) -> bool {
        matches!(
            self,
            Value::NoSuchObject | Value::NoSuchInstance | Value::EndOfMibView
        )
    }

    /// The BER tag this value is encoded with.
    pub fn tag(&self) -> u8 {
        match self {
            Value::Integer(_) => tag::universal::INTEGER,
            Value::OctetString(_) => tag::universal::OCTET_STRING,
            Value::Null => tag::universal::NULL,
            Value::ObjectIdentifier(_) => tag::universal::OBJECT_IDENTIFIER,
            Value::IpAddress(_) => tag::application::IP_ADDRESS,
            Value::Counter32(_) => tag::application::COUNTER32,
            Value::Gauge32(_) => tag::application::GAUGE32,
            Value::TimeTicks(_) => tag::application::TIMETICKS,
            Value::Opaque(_) => tag::application::OPAQUE,
            Value::Counter64(_) => tag::application::COUNTER64,
            Value::NoSuchObject => tag::context::NO_SUCH_OBJECT,
            Value::NoSuchInstance => tag::context::NO_SUCH_INSTANCE,
            Value::EndOfMibView => tag::context::END_OF_MIB_VIEW,
            Value::Unknown { tag, .. } => *tag,
        }
    }

    /// True when both values carry the same SMI type.
    pub fn same_kind(&self, other: &Value) -> bool {
        self.tag() == other.tag()
    }

    /// Encoded TLV size without encoding.
    pub(crate) fn ber_encoded_len(&self) -> usize {
        use crate::ber::{integer_content_len, unsigned_content_len};

        match self {
            Value::Integer(v) => tlv_len(integer_content_len(*v as i64)),
            Value::OctetString(data) | Value::Opaque(data) | Value::Unknown { data, .. } => {
                tlv_len(data.len())
            }
            Value::ObjectIdentifier(oid) => oid.ber_encoded_len(),
            Value::IpAddress(_) => 6,
            Value::Counter32(v) | Value::Gauge32(v) | Value::TimeTicks(v) => {
                tlv_len(unsigned_content_len(*v as u64))
            }
            Value::Counter64(v) => tlv_len(unsigned_content_len(*v)),
            Value::Null | Value::NoSuchObject | Value::NoSuchInstance | Value::EndOfMibView => 2,
        }
    }

    pub fn encode(&self, buf: &mut EncodeBuf) {
        match self {
            Value::Integer(v) => buf.push_integer(*v),
            Value::OctetString(data) => buf.push_octet_string(data),
            Value::Null => buf.push_null(),
            Value::ObjectIdentifier(oid) => buf.push_oid(oid),
            Value::IpAddress(addr) => buf.push_ip_address(*addr),
            Value::Counter32(v) | Value::Gauge32(v) | Value::TimeTicks(v) => {
                buf.push_unsigned32(self.tag(), *v)
            }
            Value::Counter64(v) => buf.push_integer64(*v),
            Value::Opaque(data) | Value::Unknown { data, .. } => {
                buf.push_bytes(data);
                buf.push_length(data.len());
                buf.push_tag(self.tag());
            }
            Value::NoSuchObject | Value::NoSuchInstance | Value::EndOfMibView => {
                buf.push_length(0);
                buf.push_tag(self.tag());
            }
        }
    }

    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let tag = decoder.read_tag()?;
        let len = decoder.read_length()?;

        let value = match tag {
            tag::universal::INTEGER => Value::Integer(decoder.read_integer_value(len)?),
            tag::universal::OCTET_STRING => Value::OctetString(decoder.read_bytes(len)?),
            tag::universal::NULL => {
                if len != 0 {
                    return Err(decoder.fail(DecodeErrorKind::InvalidNull));
                }
                Value::Null
            }
            tag::universal::OBJECT_IDENTIFIER => {
                Value::ObjectIdentifier(decoder.read_oid_value(len)?)
            }
            tag::application::IP_ADDRESS => Value::IpAddress(decoder.read_ip_address_value(len)?),
            tag::application::COUNTER32 => Value::Counter32(decoder.read_unsigned32_value(len)?),
            tag::application::GAUGE32 => Value::Gauge32(decoder.read_unsigned32_value(len)?),
            tag::application::TIMETICKS => Value::TimeTicks(decoder.read_unsigned32_value(len)?),
            tag::application::OPAQUE => Value::Opaque(decoder.read_bytes(len)?),
            tag::application::COUNTER64 => Value::Counter64(decoder.read_integer64_value(len)?),
            tag::context::NO_SUCH_OBJECT
            | tag::context::NO_SUCH_INSTANCE
            | tag::context::END_OF_MIB_VIEW => {
                decoder.read_bytes(len)?;
                match tag {
                    tag::context::NO_SUCH_OBJECT => Value::NoSuchObject,
                    tag::context::NO_SUCH_INSTANCE => Value::NoSuchInstance,
                    _ => Value::EndOfMibView,
                }
            }
            tag::universal::OCTET_STRING_CONSTRUCTED => {
                return Err(decoder.fail(DecodeErrorKind::ConstructedOctetString));
            }
            _ => Value::Unknown {
                tag,
                data: decoder.read_bytes(len)?,
            },
        };
        Ok(value)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{}", v),
            Value::OctetString(data) => match std::str::from_utf8(data) {
                Ok(s) => write!(f, "{}", s),
                Err(_) => write!(f, "0x{}", hex::encode(data)),
            },
            Value::Null => write!(f, "NULL"),
            Value::ObjectIdentifier(oid) => write!(f, "{}", oid),
            Value::IpAddress([a, b, c, d]) => write!(f, "{}.{}.{}.{}", a, b, c, d),
            Value::Counter32(v) | Value::Gauge32(v) | Value::TimeTicks(v) => write!(f, "{}", v),
            Value::Opaque(data) => write!(f, "Opaque(0x{})", hex::encode(data)),
            Value::Counter64(v) => write!(f, "{}", v),
            Value::NoSuchObject => write!(f, "noSuchObject"),
            Value::NoSuchInstance => write!(f, "noSuchInstance"),
            Value::EndOfMibView => write!(f, "endOfMibView"),
            Value::Unknown { tag, data } => {
                write!(f, "Unknown(tag=0x{:02X}, data=0x{})", tag, hex::encode(data))
            }
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::OctetString(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::OctetString(Bytes::from(s))
    }
}

impl From<Oid> for Value {
    fn from(oid: Oid) -> Self {
        Value::ObjectIdentifier(oid)
    }
}

impl From<std::net::Ipv4Addr> for Value {
    fn from(addr: std::net::Ipv4Addr) -> Self {
        Value::IpAddress(addr.octets())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;

    fn encode(value: &Value) -> Bytes {
        let mut buf = EncodeBuf::new();
        value.encode(&mut buf);
        buf.finish()
    }

    #[test]
    fn encoded_len_matches_encoding() {
        let values = [
            Value::Integer(-129),
            Value::Integer(i32::MAX),
            Value::from("SNMPv1 trap sender"),
            Value::Null,
            Value::ObjectIdentifier(oid!(1, 3, 6, 1, 4, 1, 8072, 3, 2, 10)),
            Value::IpAddress([10, 0, 0, 1]),
            Value::Counter32(u32::MAX),
            Value::Gauge32(0),
            Value::TimeTicks(123_456),
            Value::Opaque(Bytes::from_static(&[0x9f, 0x78, 0x04])),
            Value::Counter64(u64::MAX),
            Value::EndOfMibView,
        ];
        for value in &values {
            assert_eq!(encode(value).len(), value.ber_encoded_len(), "{value:?}");
        }
    }

    #[test]
    fn decode_each_kind() {
        for value in [
            Value::Counter32(4_000_000_000),
            Value::Counter64(1 << 40),
            Value::IpAddress([192, 0, 2, 7]),
            Value::NoSuchInstance,
        ] {
            let mut dec = Decoder::new(encode(&value));
            assert_eq!(Value::decode(&mut dec).unwrap(), value);
        }
    }

    #[test]
    fn unknown_tag_is_preserved() {
        let mut dec = Decoder::from_slice(&[0x47, 0x01, 0x05]);
        assert_eq!(
            Value::decode(&mut dec).unwrap(),
            Value::Unknown {
                tag: 0x47,
                data: Bytes::from_static(&[0x05])
            }
        );
    }

    #[test]
    fn same_kind_compares_tags() {
        assert!(Value::from("a").same_kind(&Value::from("b")));
        assert!(!Value::Counter32(1).same_kind(&Value::Gauge32(1)));
    }
}

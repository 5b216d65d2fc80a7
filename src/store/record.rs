//! Record line syntax: `OID|TAG|VALUE[|VARIATION]`.
//!
//! ```text
//! # system group
//! 1.3.6.1.2.1.1.1.0|4|Linux zeus 4.8.6
//! 1.3.6.1.2.1.1.3.0|67|0|uptime
//! 1.3.6.1.2.1.1.6.0|4|SNMPv1 trap sender|writecache
//! 1.3.6.1.2.1.2.2.1.6.1|4x|00127962f940
//! ```
//!
//! A trailing `x` on the tag marks a hex-encoded value. Lines written back
//! by [`Record::to_line`] use hex whenever the text form would not survive
//! a round trip.

use std::fmt;
use std::net::Ipv4Addr;

use bytes::Bytes;

use crate::ber::tag;
use crate::oid::Oid;
use crate::util::hex;
use crate::value::Value;

/// A variation reference as written in a record: `name[:key=value,...]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariationSpec {
    pub name: String,
    pub params: Vec<(String, String)>,
}

impl VariationSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn parse(text: &str) -> Result<Self, String> {
        let (name, params) = match text.split_once(':') {
            Some((name, params)) => (name.trim(), params),
            None => (text.trim(), ""),
        };
        if name.is_empty() {
            return Err("empty variation name".into());
        }

        let mut spec = Self::new(name);
        for pair in params.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, value) = pair
                .split_once('=')
                .ok_or_else(|| format!("variation parameter '{pair}' is not key=value"))?;
            spec.params.push((key.trim().to_string(), value.trim().to_string()));
        }
        Ok(spec)
    }
}

impl fmt::Display for VariationSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for (i, (key, value)) in self.params.iter().enumerate() {
            let sep = if i == 0 { ':' } else { ',' };
            write!(f, "{sep}{key}={value}")?;
        }
        Ok(())
    }
}

/// One parsed line.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub oid: Oid,
    pub value: Value,
    pub variation: Option<VariationSpec>,
}

impl Record {
    /// Parse one line. Blank lines and comments yield `Ok(None)`; the error
    /// string becomes the `reason` of a `MalformedRecord`.
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() || line.trim_start().starts_with('#') {
            return Ok(None);
        }

        let mut fields = line.splitn(4, '|');
        let (Some(oid), Some(tag), Some(value)) = (fields.next(), fields.next(), fields.next())
        else {
            return Err("expected OID|TAG|VALUE".into());
        };

        let oid = Oid::parse(oid.trim()).map_err(|e| e.to_string())?;
        if oid.is_empty() {
            return Err("empty OID".into());
        }

        let tag = tag.trim();
        let (tag, hex) = match tag.strip_suffix(['x', 'X']) {
            Some(t) => (t, true),
            None => (tag, false),
        };
        let value = parse_value(parse_tag(tag)?, value, hex)?;

        let variation = match fields.next().map(str::trim) {
            None | Some("") => None,
            Some(text) => Some(VariationSpec::parse(text)?),
        };

        Ok(Some(Self {
            oid,
            value,
            variation,
        }))
    }

    /// Render as a line that [`Record::parse`] reads back unchanged.
    pub fn to_line(&self) -> String {
        let (tag, hex, text) = render_value(&self.value);
        let mut line = format!("{}|{}{}|{}", self.oid, tag, if hex { "x" } else { "" }, text);
        if let Some(variation) = &self.variation {
            line.push('|');
            line.push_str(&variation.to_string());
        }
        line
    }
}

fn parse_tag(text: &str) -> Result<u8, String> {
    let tag = match text.to_ascii_lowercase().as_str() {
        "integer" => tag::universal::INTEGER,
        "octets" => tag::universal::OCTET_STRING,
        "null" => tag::universal::NULL,
        "oid" => tag::universal::OBJECT_IDENTIFIER,
        "ipaddress" => tag::application::IP_ADDRESS,
        "counter32" => tag::application::COUNTER32,
        "gauge32" => tag::application::GAUGE32,
        "timeticks" => tag::application::TIMETICKS,
        "opaque" => tag::application::OPAQUE,
        "counter64" => tag::application::COUNTER64,
        "nosuchobject" => tag::context::NO_SUCH_OBJECT,
        "nosuchinstance" => tag::context::NO_SUCH_INSTANCE,
        "endofmibview" => tag::context::END_OF_MIB_VIEW,
        numeric => match numeric.parse::<u8>() {
            Ok(2) => tag::universal::INTEGER,
            Ok(4) => tag::universal::OCTET_STRING,
            Ok(5) => tag::universal::NULL,
            Ok(6) => tag::universal::OBJECT_IDENTIFIER,
            Ok(64) => tag::application::IP_ADDRESS,
            Ok(65) => tag::application::COUNTER32,
            Ok(66) => tag::application::GAUGE32,
            Ok(67) => tag::application::TIMETICKS,
            Ok(68) => tag::application::OPAQUE,
            Ok(70) => tag::application::COUNTER64,
            Ok(128) => tag::context::NO_SUCH_OBJECT,
            Ok(129) => tag::context::NO_SUCH_INSTANCE,
            Ok(130) => tag::context::END_OF_MIB_VIEW,
            _ => return Err(format!("unknown type tag '{text}'")),
        },
    };
    Ok(tag)
}

fn parse_value(tag: u8, text: &str, is_hex: bool) -> Result<Value, String> {
    let bytes = || -> Result<Bytes, String> {
        if is_hex {
            hex::decode(text)
                .map(Bytes::from)
                .map_err(|e| format!("bad hex value: {e}"))
        } else {
            Ok(Bytes::copy_from_slice(text.as_bytes()))
        }
    };
    let number = |what: &str| format!("'{text}' is not a valid {what}");

    if is_hex
        && !matches!(
            tag,
            tag::universal::OCTET_STRING | tag::application::OPAQUE | tag::application::IP_ADDRESS
        )
    {
        return Err("hex values are only allowed for octets, opaque and ipaddress".into());
    }

    let value = match tag {
        tag::universal::INTEGER => {
            Value::Integer(text.trim().parse().map_err(|_| number("integer"))?)
        }
        tag::universal::OCTET_STRING => Value::OctetString(bytes()?),
        tag::universal::NULL => Value::Null,
        tag::universal::OBJECT_IDENTIFIER => {
            Value::ObjectIdentifier(Oid::parse(text.trim()).map_err(|e| e.to_string())?)
        }
        tag::application::IP_ADDRESS if is_hex => {
            let raw = bytes()?;
            let octets: [u8; 4] = raw
                .as_ref()
                .try_into()
                .map_err(|_| format!("ipaddress needs 4 octets, got {}", raw.len()))?;
            Value::IpAddress(octets)
        }
        tag::application::IP_ADDRESS => {
            let addr: Ipv4Addr = text.trim().parse().map_err(|_| number("IPv4 address"))?;
            Value::IpAddress(addr.octets())
        }
        tag::application::COUNTER32 => {
            Value::Counter32(text.trim().parse().map_err(|_| number("counter32"))?)
        }
        tag::application::GAUGE32 => {
            Value::Gauge32(text.trim().parse().map_err(|_| number("gauge32"))?)
        }
        tag::application::TIMETICKS => {
            Value::TimeTicks(text.trim().parse().map_err(|_| number("timeticks"))?)
        }
        tag::application::OPAQUE => Value::Opaque(bytes()?),
        tag::application::COUNTER64 => {
            Value::Counter64(text.trim().parse().map_err(|_| number("counter64"))?)
        }
        tag::context::NO_SUCH_OBJECT => Value::NoSuchObject,
        tag::context::NO_SUCH_INSTANCE => Value::NoSuchInstance,
        _ => Value::EndOfMibView,
    };
    Ok(value)
}

/// `(numeric tag, hex, text)` for a value.
fn render_value(value: &Value) -> (u8, bool, String) {
    let tag = value.tag();
    match value {
        Value::OctetString(data) | Value::Opaque(data) => match std::str::from_utf8(data) {
            Ok(text) if !needs_hex(text) => (tag, false, text.to_string()),
            _ => (tag, true, hex::encode(data)),
        },
        Value::Unknown { data, .. } => (tag::universal::OCTET_STRING, true, hex::encode(data)),
        Value::Null | Value::NoSuchObject | Value::NoSuchInstance | Value::EndOfMibView => {
            (tag, false, String::new())
        }
        other => (tag, false, other.to_string()),
    }
}

fn needs_hex(text: &str) -> bool {
    text.starts_with('#') || text.contains(['|', '\n', '\r'])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;

    fn parse(line: &str) -> Record {
        Record::parse(line).unwrap().unwrap()
    }

    #[test]
    fn plain_and_symbolic_tags() {
        let record = parse("1.3.6.1.2.1.1.5.0|4|zeus");
        assert_eq!(record.oid, oid!(1, 3, 6, 1, 2, 1, 1, 5, 0));
        assert_eq!(record.value, Value::from("zeus"));
        assert!(record.variation.is_none());

        assert_eq!(parse(".1.3.6.1.2.1.2.2.1.10.1|counter32|42").value, Value::Counter32(42));
        assert_eq!(parse("1.3.6.1.2.1.1.7.0|2|72").value, Value::Integer(72));
        assert_eq!(
            parse("1.3.6.1.2.1.4.20.1.1.10.0.0.1|64|10.0.0.1").value,
            Value::IpAddress([10, 0, 0, 1])
        );
        assert_eq!(parse("1.3.6.1.2.1.1.2.0|6|1.3.6.1.4.1.8072.3.2.10").value.tag(), 0x06);
        assert_eq!(parse("1.3.6.1.2.1.31.1.1.1.6.1|70|18446744073709551615").value, Value::Counter64(u64::MAX));
        assert_eq!(parse("1.3.6.1.2.1.99.0|129|").value, Value::NoSuchInstance);
    }

    #[test]
    fn hex_values() {
        let record = parse("1.3.6.1.2.1.2.2.1.6.1|4x|00127962f940");
        assert_eq!(
            record.value,
            Value::OctetString(Bytes::from_static(&[0x00, 0x12, 0x79, 0x62, 0xf9, 0x40]))
        );
        assert_eq!(parse("1.3.6.1.2.1.4.20.1.1.1|64x|7f000001").value, Value::IpAddress([127, 0, 0, 1]));
        assert!(Record::parse("1.3.6.1.2.1.1.7.0|2x|48").is_err());
        assert!(Record::parse("1.3.6.1.2.1.2.2.1.6.1|4x|0g").is_err());
    }

    #[test]
    fn variation_field() {
        let record = parse("1.3.6.1.2.1.1.6.0|4|SNMPv1 trap sender|notify:target=127.0.0.1:1162,kind=trap");
        let spec = record.variation.unwrap();
        assert_eq!(spec.name, "notify");
        assert_eq!(spec.param("target"), Some("127.0.0.1:1162"));
        assert_eq!(spec.param("kind"), Some("trap"));
        assert!(Record::parse("1.3.6.1.2.1.1.6.0|4|x|counter:start").is_err());
    }

    #[test]
    fn skipped_and_malformed_lines() {
        assert_eq!(Record::parse("").unwrap(), None);
        assert_eq!(Record::parse("   # comment").unwrap(), None);
        assert!(Record::parse("1.3.6.1|4").is_err());
        assert!(Record::parse("1.3.x|4|a").is_err());
        assert!(Record::parse("1.3.6.1|99|a").is_err());
        assert!(Record::parse("1.3.6.1|2|twelve").is_err());
        assert!(Record::parse("1.3.6.1|65|-1").is_err());
    }

    #[test]
    fn value_may_contain_spaces_and_colons() {
        let record = parse("1.3.6.1.2.1.1.1.0|4|  Cisco IOS: 15.2  ");
        assert_eq!(record.value.as_str(), Some("  Cisco IOS: 15.2  "));
    }

    #[test]
    fn to_line_uses_hex_when_needed() {
        let record = Record {
            oid: oid!(1, 3, 6, 1, 2, 1, 1, 1, 0),
            value: Value::from("a|b"),
            variation: Some(VariationSpec::new("writecache")),
        };
        let line = record.to_line();
        assert_eq!(line, "1.3.6.1.2.1.1.1.0|4x|617c62|writecache");
        assert_eq!(Record::parse(&line).unwrap().unwrap(), record);

        let binary = Record {
            oid: oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 6, 2),
            value: Value::OctetString(Bytes::from_static(&[0xff, 0x00])),
            variation: None,
        };
        assert_eq!(binary.to_line(), "1.3.6.1.2.1.2.2.1.6.2|4x|ff00");
    }

    #[test]
    fn to_line_round_trips_params() {
        let line = "1.3.6.1.2.1.2.2.1.10.1|65|100|counter:start=100,step=7";
        let record = parse(line);
        assert_eq!(record.to_line(), line);
    }
}

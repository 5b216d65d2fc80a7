//! Internal utilities.

use std::io;
use std::net::SocketAddr;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;

/// Create and bind a UDP socket.
///
/// IPv6 sockets get `IPV6_V6ONLY` so that a `[::]` endpoint and a `0.0.0.0`
/// endpoint on the same port can coexist.
pub(crate) fn bind_udp_socket(addr: SocketAddr) -> io::Result<UdpSocket> {
    let domain = if addr.is_ipv6() {
        Domain::IPV6
    } else {
        Domain::IPV4
    };

    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
    if addr.is_ipv6() {
        socket.set_only_v6(true)?;
    }
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;

    UdpSocket::from_std(socket.into())
}

/// Bind an ephemeral socket in the same address family as `target`.
pub(crate) fn bind_ephemeral_udp_socket(target: SocketAddr) -> io::Result<UdpSocket> {
    let bind_addr = if target.is_ipv6() {
        SocketAddr::from((std::net::Ipv6Addr::UNSPECIFIED, 0))
    } else {
        SocketAddr::from((std::net::Ipv4Addr::UNSPECIFIED, 0))
    };
    bind_udp_socket(bind_addr)
}

/// Hexadecimal helpers for record values, engine IDs and log fields.
pub mod hex {
    use std::fmt;

    /// Encode bytes as lowercase hex.
    ///
    /// ```
    /// use snmp_responder::util::hex::encode;
    ///
    /// assert_eq!(encode(&[0xde, 0xad, 0xbe, 0xef]), "deadbeef");
    /// ```
    pub fn encode(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }

    /// Decode hex text. Whitespace and an optional `0x` prefix are ignored.
    ///
    /// ```
    /// use snmp_responder::util::hex::decode;
    ///
    /// assert_eq!(decode("0x80 00 1f 88").unwrap(), vec![0x80, 0x00, 0x1f, 0x88]);
    /// assert!(decode("abc").is_err());
    /// ```
    pub fn decode(s: &str) -> Result<Vec<u8>, DecodeError> {
        let s = s.trim();
        let s = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);
        let digits: Vec<u8> = s.bytes().filter(|b| !b.is_ascii_whitespace()).collect();
        if !digits.len().is_multiple_of(2) {
            return Err(DecodeError::OddLength);
        }
        digits
            .chunks(2)
            .map(|pair| {
                let hi = (pair[0] as char).to_digit(16).ok_or(DecodeError::InvalidChar)?;
                let lo = (pair[1] as char).to_digit(16).ok_or(DecodeError::InvalidChar)?;
                Ok((hi << 4 | lo) as u8)
            })
            .collect()
    }

    #[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
    pub enum DecodeError {
        #[error("odd number of hex digits")]
        OddLength,
        #[error("invalid hex digit")]
        InvalidChar,
    }

    /// Lazy hex formatter for tracing fields.
    pub struct Bytes<'a>(pub &'a [u8]);

    impl fmt::Display for Bytes<'_> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            for b in self.0 {
                write!(f, "{:02x}", b)?;
            }
            Ok(())
        }
    }

    impl fmt::Debug for Bytes<'_> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            fmt::Display::fmt(self, f)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bind_ipv4() {
        let socket = bind_udp_socket("127.0.0.1:0".parse().unwrap()).unwrap();
        let local = socket.local_addr().unwrap();
        assert!(local.is_ipv4());
        assert_ne!(local.port(), 0);
    }

    #[tokio::test]
    async fn ephemeral_follows_target_family() {
        let socket = bind_ephemeral_udp_socket("192.0.2.1:162".parse().unwrap()).unwrap();
        assert!(socket.local_addr().unwrap().is_ipv4());
    }

    #[test]
    fn hex_roundtrip() {
        let data = [0u8, 0x7c, 0xff, 0x0a];
        assert_eq!(hex::decode(&hex::encode(&data)).unwrap(), data);
        assert_eq!(hex::decode("zz"), Err(hex::DecodeError::InvalidChar));
        assert_eq!(format!("{}", hex::Bytes(&[0xab, 0x01])), "ab01");
    }
}

//! SNMPv3 User-based Security Model (RFC 3414, RFC 3826, RFC 7860).
//!
//! The responder is the authoritative engine for every request it answers
//! and for the traps it sends. Informs are the exception: the receiver is
//! authoritative, so the notification sender discovers its engine first.
//!
//! - [`auth`]: password-to-key, key localization and HMAC digests
//! - [`PrivKey`]: DES-CBC and AES-CFB privacy
//! - [`UsmSecurityParams`]: the msgSecurityParameters sequence
//! - [`LocalEngine`]: this process's engine id, boots and time

pub mod auth;
mod engine;
mod privacy;
mod usm;

use std::fmt;

use bytes::Bytes;

pub use auth::LocalizedKey;
pub use engine::{LocalEngine, RemoteEngine, TIME_WINDOW, UsmFailure, report_oids};
pub use privacy::{PrivKey, SaltCounter};
pub use usm::{Outgoing, UsmSecurityParams, decrypt, open, seal, verify};

/// Error returned when a protocol name does not parse.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} protocol '{input}'")]
pub struct ParseProtocolError {
    input: String,
    kind: &'static str,
}

/// Authentication protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthProtocol {
    Md5,
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl fmt::Display for AuthProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Md5 => "MD5",
            Self::Sha1 => "SHA",
            Self::Sha224 => "SHA-224",
            Self::Sha256 => "SHA-256",
            Self::Sha384 => "SHA-384",
            Self::Sha512 => "SHA-512",
        })
    }
}

impl std::str::FromStr for AuthProtocol {
    type Err = ParseProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "MD5" => Ok(Self::Md5),
            "SHA" | "SHA1" | "SHA-1" => Ok(Self::Sha1),
            "SHA224" | "SHA-224" => Ok(Self::Sha224),
            "SHA256" | "SHA-256" => Ok(Self::Sha256),
            "SHA384" | "SHA-384" => Ok(Self::Sha384),
            "SHA512" | "SHA-512" => Ok(Self::Sha512),
            _ => Err(ParseProtocolError {
                input: s.to_string(),
                kind: "authentication",
            }),
        }
    }
}

impl AuthProtocol {
    pub fn digest_len(self) -> usize {
        match self {
            Self::Md5 => 16,
            Self::Sha1 => 20,
            Self::Sha224 => 28,
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    /// Truncated MAC length carried in msgAuthenticationParameters.
    pub fn mac_len(self) -> usize {
        match self {
            Self::Md5 | Self::Sha1 => 12,
            Self::Sha224 => 16,
            Self::Sha256 => 24,
            Self::Sha384 => 32,
            Self::Sha512 => 48,
        }
    }
}

/// Privacy protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivProtocol {
    Des,
    Aes128,
    Aes192,
    Aes256,
}

impl fmt::Display for PrivProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Des => "DES",
            Self::Aes128 => "AES",
            Self::Aes192 => "AES-192",
            Self::Aes256 => "AES-256",
        })
    }
}

impl std::str::FromStr for PrivProtocol {
    type Err = ParseProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DES" => Ok(Self::Des),
            "AES" | "AES128" | "AES-128" => Ok(Self::Aes128),
            "AES192" | "AES-192" => Ok(Self::Aes192),
            "AES256" | "AES-256" => Ok(Self::Aes256),
            _ => Err(ParseProtocolError {
                input: s.to_string(),
                kind: "privacy",
            }),
        }
    }
}

impl PrivProtocol {
    /// Localized key material the cipher consumes. DES takes 8 key bytes
    /// plus an 8-byte pre-IV.
    pub fn key_len(self) -> usize {
        match self {
            Self::Des | Self::Aes128 => 16,
            Self::Aes192 => 24,
            Self::Aes256 => 32,
        }
    }
}

/// A configured USM user.
#[derive(Clone)]
pub struct UsmUser {
    pub name: Bytes,
    pub auth: Option<(AuthProtocol, Bytes)>,
    pub privacy: Option<(PrivProtocol, Bytes)>,
}

impl UsmUser {
    pub fn new(name: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            auth: None,
            privacy: None,
        }
    }

    pub fn with_auth(mut self, protocol: AuthProtocol, password: impl Into<Bytes>) -> Self {
        self.auth = Some((protocol, password.into()));
        self
    }

    pub fn with_privacy(mut self, protocol: PrivProtocol, password: impl Into<Bytes>) -> Self {
        self.privacy = Some((protocol, password.into()));
        self
    }

    /// Derive keys localized to `engine_id`. Privacy without authentication
    /// is not a valid USM configuration and yields no privacy key.
    pub fn localize(&self, engine_id: &[u8]) -> UserKeys {
        let auth = self
            .auth
            .as_ref()
            .map(|(protocol, password)| LocalizedKey::from_password(*protocol, password, engine_id));
        let privacy = match (&self.auth, &self.privacy) {
            (Some((auth_protocol, _)), Some((priv_protocol, password))) => Some(
                PrivKey::from_password(*auth_protocol, *priv_protocol, password, engine_id),
            ),
            _ => None,
        };
        UserKeys { auth, privacy }
    }
}

impl fmt::Debug for UsmUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UsmUser")
            .field("name", &String::from_utf8_lossy(&self.name))
            .field("auth", &self.auth.as_ref().map(|(p, _)| p))
            .field("privacy", &self.privacy.as_ref().map(|(p, _)| p))
            .finish()
    }
}

/// A user's keys localized to one engine.
#[derive(Clone, Debug, Default)]
pub struct UserKeys {
    pub auth: Option<LocalizedKey>,
    pub privacy: Option<PrivKey>,
}

impl UserKeys {
    /// Highest level these keys can serve.
    pub fn max_level(&self) -> crate::message::SecurityLevel {
        use crate::message::SecurityLevel;
        match (&self.auth, &self.privacy) {
            (Some(_), Some(_)) => SecurityLevel::AuthPriv,
            (Some(_), None) => SecurityLevel::AuthNoPriv,
            _ => SecurityLevel::NoAuthNoPriv,
        }
    }
}

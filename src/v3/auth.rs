//! USM authentication (RFC 3414 Section 6-7, RFC 7860).
//!
//! Keys are derived in two steps: the password is stretched to a master key
//! (`Ku`), which is then bound to one engine id (`Kul`). Messages carry a
//! truncated HMAC computed over the whole datagram with the
//! authentication parameters zeroed.

use digest::Digest;
use digest::core_api::BlockSizeUser;
use hmac::{Mac, SimpleHmac};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::AuthProtocol;

/// An authentication key localized to one engine.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct LocalizedKey {
    key: Vec<u8>,
    #[zeroize(skip)]
    protocol: AuthProtocol,
}

impl LocalizedKey {
    pub fn from_password(protocol: AuthProtocol, password: &[u8], engine_id: &[u8]) -> Self {
        let master = password_to_key(protocol, password);
        Self {
            key: localize_key(protocol, &master, engine_id),
            protocol,
        }
    }

    pub fn from_bytes(protocol: AuthProtocol, key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            protocol,
        }
    }

    pub fn protocol(&self) -> AuthProtocol {
        self.protocol
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.key
    }

    pub fn mac_len(&self) -> usize {
        self.protocol.mac_len()
    }

    /// Truncated HMAC of `data`.
    pub fn compute_hmac(&self, data: &[u8]) -> Vec<u8> {
        let mut mac = match self.protocol {
            AuthProtocol::Md5 => hmac::<md5::Md5>(&self.key, data),
            AuthProtocol::Sha1 => hmac::<sha1::Sha1>(&self.key, data),
            AuthProtocol::Sha224 => hmac::<sha2::Sha224>(&self.key, data),
            AuthProtocol::Sha256 => hmac::<sha2::Sha256>(&self.key, data),
            AuthProtocol::Sha384 => hmac::<sha2::Sha384>(&self.key, data),
            AuthProtocol::Sha512 => hmac::<sha2::Sha512>(&self.key, data),
        };
        mac.truncate(self.mac_len());
        mac
    }

    /// Constant-time comparison against a received MAC.
    pub fn verify_hmac(&self, data: &[u8], expected: &[u8]) -> bool {
        if expected.len() != self.mac_len() {
            return false;
        }
        self.compute_hmac(data).ct_eq(expected).into()
    }
}

impl std::fmt::Debug for LocalizedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalizedKey")
            .field("protocol", &self.protocol)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

fn hmac<D>(key: &[u8], data: &[u8]) -> Vec<u8>
where
    D: Digest + BlockSizeUser,
{
    // SimpleHmac accepts keys of any length
    let Ok(mut mac) = <SimpleHmac<D> as Mac>::new_from_slice(key) else {
        return Vec::new();
    };
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Password to master key (RFC 3414 A.2.1): hash one megabyte of the
/// repeated password.
pub(crate) fn password_to_key(protocol: AuthProtocol, password: &[u8]) -> Vec<u8> {
    match protocol {
        AuthProtocol::Md5 => expand_password::<md5::Md5>(password),
        AuthProtocol::Sha1 => expand_password::<sha1::Sha1>(password),
        AuthProtocol::Sha224 => expand_password::<sha2::Sha224>(password),
        AuthProtocol::Sha256 => expand_password::<sha2::Sha256>(password),
        AuthProtocol::Sha384 => expand_password::<sha2::Sha384>(password),
        AuthProtocol::Sha512 => expand_password::<sha2::Sha512>(password),
    }
}

fn expand_password<D: Digest>(password: &[u8]) -> Vec<u8> {
    const EXPANSION_SIZE: usize = 1_048_576;

    if password.is_empty() {
        return vec![0u8; <D as Digest>::output_size()];
    }

    let mut hasher = D::new();
    let mut buf = [0u8; 64];
    let mut index = 0;
    for _ in 0..EXPANSION_SIZE / buf.len() {
        for byte in &mut buf {
            *byte = password[index];
            index = (index + 1) % password.len();
        }
        hasher.update(buf);
    }
    hasher.finalize().to_vec()
}

/// `Kul = H(Ku || engineID || Ku)` (RFC 3414 A.2.2).
pub(crate) fn localize_key(protocol: AuthProtocol, master: &[u8], engine_id: &[u8]) -> Vec<u8> {
    match protocol {
        AuthProtocol::Md5 => localize::<md5::Md5>(master, engine_id),
        AuthProtocol::Sha1 => localize::<sha1::Sha1>(master, engine_id),
        AuthProtocol::Sha224 => localize::<sha2::Sha224>(master, engine_id),
        AuthProtocol::Sha256 => localize::<sha2::Sha256>(master, engine_id),
        AuthProtocol::Sha384 => localize::<sha2::Sha384>(master, engine_id),
        AuthProtocol::Sha512 => localize::<sha2::Sha512>(master, engine_id),
    }
}

fn localize<D: Digest>(master: &[u8], engine_id: &[u8]) -> Vec<u8> {
    let mut hasher = D::new();
    hasher.update(master);
    hasher.update(engine_id);
    hasher.update(master);
    hasher.finalize().to_vec()
}

/// Blumenthal key extension (draft-blumenthal-aes-usm-04 3.1.2.1).
///
/// Appends `H(previous block)` until `target_len` bytes are available, so a
/// short digest such as SHA-1 can key AES-192 or AES-256.
pub(crate) fn extend_key(protocol: AuthProtocol, key: &[u8], target_len: usize) -> Vec<u8> {
    let mut extended = key.to_vec();
    let mut block = key.to_vec();
    while extended.len() < target_len {
        block = match protocol {
            AuthProtocol::Md5 => md5::Md5::digest(&block).to_vec(),
            AuthProtocol::Sha1 => sha1::Sha1::digest(&block).to_vec(),
            AuthProtocol::Sha224 => sha2::Sha224::digest(&block).to_vec(),
            AuthProtocol::Sha256 => sha2::Sha256::digest(&block).to_vec(),
            AuthProtocol::Sha384 => sha2::Sha384::digest(&block).to_vec(),
            AuthProtocol::Sha512 => sha2::Sha512::digest(&block).to_vec(),
        };
        extended.extend_from_slice(&block);
    }
    extended.truncate(target_len);
    extended
}

/// Write the MAC into an encoded message whose auth parameters at
/// `offset..offset + len` are still zero.
pub fn authenticate_message(key: &LocalizedKey, message: &mut [u8], offset: usize, len: usize) {
    let mac = key.compute_hmac(message);
    let n = len.min(mac.len());
    message[offset..offset + n].copy_from_slice(&mac[..n]);
}

/// Verify the MAC of a received message.
pub fn verify_message(key: &LocalizedKey, message: &[u8], offset: usize, len: usize) -> bool {
    let Some(received) = message.get(offset..offset + len) else {
        return false;
    };
    let mut zeroed = message.to_vec();
    zeroed[offset..offset + len].fill(0);
    key.verify_hmac(&zeroed, received)
}

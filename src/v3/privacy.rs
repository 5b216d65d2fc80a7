//! USM privacy: DES-CBC (RFC 3414 Section 8) and AES-CFB (RFC 3826).
//!
//! DES: privParameters is `engineBoots || counter` and the IV is the
//! pre-IV (last 8 key bytes) XOR that salt.
//!
//! AES: privParameters is a 64-bit counter and the IV is the concatenation
//! `engineBoots || engineTime || salt`.

use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::auth::{extend_key, localize_key, password_to_key};
use super::{AuthProtocol, PrivProtocol};
use crate::error::{CryptoErrorKind, Error, Result, UNKNOWN_PEER};

fn crypto_failure(kind: CryptoErrorKind) -> Box<Error> {
    tracing::debug!(target: "snmp_responder::v3", { kind = %kind }, "privacy operation failed");
    Error::Auth { peer: UNKNOWN_PEER }.boxed()
}

/// Salt source shared by every message an engine encrypts.
#[derive(Debug)]
pub struct SaltCounter(AtomicU64);

impl SaltCounter {
    pub fn new() -> Self {
        let mut buf = [0u8; 8];
        let seed = match getrandom::fill(&mut buf) {
            Ok(()) => u64::from_ne_bytes(buf),
            Err(_) => std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(1),
        };
        Self(AtomicU64::new(seed.max(1)))
    }

    pub fn from_value(value: u64) -> Self {
        Self(AtomicU64::new(value))
    }

    /// Next salt; zero is skipped on wraparound like net-snmp does.
    pub fn next(&self) -> u64 {
        let val = self.0.fetch_add(1, Ordering::Relaxed);
        if val == 0 {
            self.0.fetch_add(1, Ordering::Relaxed)
        } else {
            val
        }
    }
}

impl Default for SaltCounter {
    fn default() -> Self {
        Self::new()
    }
}

/// A privacy key localized to one engine.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PrivKey {
    key: Vec<u8>,
    #[zeroize(skip)]
    protocol: PrivProtocol,
}

impl PrivKey {
    /// Derive from a password with the user's authentication hash. When the
    /// digest is shorter than the cipher needs, the key is extended.
    pub fn from_password(
        auth_protocol: AuthProtocol,
        priv_protocol: PrivProtocol,
        password: &[u8],
        engine_id: &[u8],
    ) -> Self {
        let master = password_to_key(auth_protocol, password);
        let mut key = localize_key(auth_protocol, &master, engine_id);
        if key.len() < priv_protocol.key_len() {
            key = extend_key(auth_protocol, &key, priv_protocol.key_len());
        }
        Self {
            key,
            protocol: priv_protocol,
        }
    }

    pub fn from_bytes(protocol: PrivProtocol, key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            protocol,
        }
    }

    pub fn protocol(&self) -> PrivProtocol {
        self.protocol
    }

    fn material(&self) -> Result<&[u8]> {
        self.key
            .get(..self.protocol.key_len())
            .ok_or_else(|| crypto_failure(CryptoErrorKind::InvalidKeyLength))
    }

    /// Encrypt a scoped PDU, returning `(ciphertext, privParameters)`.
    pub fn encrypt(
        &self,
        plaintext: &[u8],
        engine_boots: u32,
        engine_time: u32,
        salt: &SaltCounter,
    ) -> Result<(Bytes, Bytes)> {
        let key = self.material()?;
        let salt = salt.next();

        match self.protocol {
            PrivProtocol::Des => {
                use cbc::cipher::block_padding::NoPadding;
                use cbc::cipher::{BlockEncryptMut, KeyIvInit};

                let mut priv_params = [0u8; 8];
                priv_params[..4].copy_from_slice(&engine_boots.to_be_bytes());
                priv_params[4..].copy_from_slice(&(salt as u32).to_be_bytes());
                let iv = des_iv(&key[8..16], &priv_params);

                let mut buffer = plaintext.to_vec();
                buffer.resize(plaintext.len().div_ceil(8) * 8, 0);
                let len = buffer.len();
                cbc::Encryptor::<des::Des>::new_from_slices(&key[..8], &iv)
                    .map_err(|_| crypto_failure(CryptoErrorKind::InvalidKeyLength))?
                    .encrypt_padded_mut::<NoPadding>(&mut buffer, len)
                    .map_err(|_| crypto_failure(CryptoErrorKind::CipherError))?;

                Ok((Bytes::from(buffer), Bytes::copy_from_slice(&priv_params)))
            }
            PrivProtocol::Aes128 | PrivProtocol::Aes192 | PrivProtocol::Aes256 => {
                let priv_params = salt.to_be_bytes();
                let iv = aes_iv(engine_boots, engine_time, &priv_params);
                let mut buffer = plaintext.to_vec();
                aes_cfb(self.protocol, key, &iv, &mut buffer, true)?;
                Ok((Bytes::from(buffer), Bytes::copy_from_slice(&priv_params)))
            }
        }
    }

    pub fn decrypt(
        &self,
        ciphertext: &[u8],
        engine_boots: u32,
        engine_time: u32,
        priv_params: &[u8],
    ) -> Result<Bytes> {
        if priv_params.len() != 8 {
            return Err(crypto_failure(CryptoErrorKind::InvalidPrivParamsLength {
                expected: 8,
                actual: priv_params.len(),
            }));
        }
        let key = self.material()?;

        match self.protocol {
            PrivProtocol::Des => {
                use cbc::cipher::block_padding::NoPadding;
                use cbc::cipher::{BlockDecryptMut, KeyIvInit};

                if !ciphertext.len().is_multiple_of(8) {
                    return Err(crypto_failure(CryptoErrorKind::InvalidCiphertextLength {
                        length: ciphertext.len(),
                        block_size: 8,
                    }));
                }
                let iv = des_iv(&key[8..16], priv_params);
                let mut buffer = ciphertext.to_vec();
                cbc::Decryptor::<des::Des>::new_from_slices(&key[..8], &iv)
                    .map_err(|_| crypto_failure(CryptoErrorKind::InvalidKeyLength))?
                    .decrypt_padded_mut::<NoPadding>(&mut buffer)
                    .map_err(|_| crypto_failure(CryptoErrorKind::CipherError))?;
                Ok(Bytes::from(buffer))
            }
            PrivProtocol::Aes128 | PrivProtocol::Aes192 | PrivProtocol::Aes256 => {
                let iv = aes_iv(engine_boots, engine_time, priv_params);
                let mut buffer = ciphertext.to_vec();
                aes_cfb(self.protocol, key, &iv, &mut buffer, false)?;
                Ok(Bytes::from(buffer))
            }
        }
    }
}

impl std::fmt::Debug for PrivKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivKey")
            .field("protocol", &self.protocol)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

fn des_iv(pre_iv: &[u8], salt: &[u8]) -> [u8; 8] {
    let mut iv = [0u8; 8];
    for (out, (a, b)) in iv.iter_mut().zip(pre_iv.iter().zip(salt)) {
        *out = a ^ b;
    }
    iv
}

fn aes_iv(engine_boots: u32, engine_time: u32, salt: &[u8]) -> [u8; 16] {
    let mut iv = [0u8; 16];
    iv[..4].copy_from_slice(&engine_boots.to_be_bytes());
    iv[4..8].copy_from_slice(&engine_time.to_be_bytes());
    iv[8..].copy_from_slice(&salt[..8]);
    iv
}

fn aes_cfb(
    protocol: PrivProtocol,
    key: &[u8],
    iv: &[u8; 16],
    buffer: &mut [u8],
    encrypt: bool,
) -> Result<()> {
    use cfb_mode::cipher::{AsyncStreamCipher, KeyIvInit};

    macro_rules! run {
        ($cipher:ty) => {
            if encrypt {
                cfb_mode::Encryptor::<$cipher>::new_from_slices(key, iv)
                    .map_err(|_| crypto_failure(CryptoErrorKind::InvalidKeyLength))?
                    .encrypt(buffer)
            } else {
                cfb_mode::Decryptor::<$cipher>::new_from_slices(key, iv)
                    .map_err(|_| crypto_failure(CryptoErrorKind::InvalidKeyLength))?
                    .decrypt(buffer)
            }
        };
    }

    match protocol {
        PrivProtocol::Aes128 => run!(aes::Aes128),
        PrivProtocol::Aes192 => run!(aes::Aes192),
        PrivProtocol::Aes256 => run!(aes::Aes256),
        PrivProtocol::Des => return Err(crypto_failure(CryptoErrorKind::CipherError)),
    }
    Ok(())
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Key-vault encryption.
//!
//! ## Format
//!
//! A [`KeyStore`] resembles an Ethereum v3 keystore, except that the secret
//! is the mnemonic (or raw private key) rather than a key:
//!
//! ```text
//! dk         = scrypt(password, salt, n, r, p, dklen)
//! ciphertext = AES-CTR(dk, counter = iv)(utf8(secret))
//! mac        = SHA-256(dk[dklen/2..] || ciphertext)
//! ```
//!
//! All binary fields are lowercase hex. The cipher tag is stored as
//! `aes-128-ctr` but the block cipher width follows `dklen` (32 bytes selects
//! AES-256), which is what every existing store was written with.
//!
//! ## Decrypt
//!
//! Parameters are validated before any cryptography runs. The recomputed mac
//! is the only check that rejects a wrong password or a tampered store, and
//! the ciphertext is only decrypted after it matches.

use std::collections::BTreeMap;

use aes::{Aes128, Aes192, Aes256};
use ctr::cipher::{KeyIvInit, StreamCipher};
use ctr::Ctr128BE;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use super::rng::RandomSource;
use crate::error::ErrorKind;

pub const KEY_STORE_VERSION: &str = "1.2";
pub const CIPHER_AES_CTR: &str = "aes-128-ctr";
pub const KDF_SCRYPT: &str = "scrypt";

const SALT_LEN: usize = 32;
const IV_LEN: usize = 16;

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// Missing or unsupported key store parameters.
    #[error("Invalid key store: {0}")]
    Validation(String),

    /// Wrong password or tampered store.
    #[error("Unmatched mac")]
    Integrity,

    #[error("Key derivation failed: {0}")]
    Kdf(String),

    #[error("Random source failed: {0}")]
    Random(String),
}

impl CryptoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CryptoError::Validation(_) => ErrorKind::Validation,
            CryptoError::Integrity => ErrorKind::Integrity,
            CryptoError::Kdf(_) | CryptoError::Random(_) => ErrorKind::Internal,
        }
    }
}

// =============================================================================
// Key Store Types
// =============================================================================

/// What the encrypted secret is.
///
/// Stores written before types existed have no `type` field and hold a
/// mnemonic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    #[default]
    #[serde(rename = "mnemonic")]
    Mnemonic,
    #[serde(rename = "privateKey")]
    PrivateKey,
    /// External signing device. The secret is the device's public key info.
    #[serde(rename = "ledger")]
    HardwareSigner,
}

/// BIP-44 `m/44'/coin'/account'/change/addressIndex` components.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bip44HdPath {
    pub account: u32,
    pub change: u32,
    pub address_index: u32,
}

/// scrypt parameters as persisted. `salt` is hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScryptParams {
    pub dklen: u32,
    pub salt: String,
    pub n: u64,
    pub r: u32,
    pub p: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CipherParams {
    pub iv: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CryptoSection {
    pub cipher: String,
    pub cipherparams: CipherParams,
    pub ciphertext: String,
    pub kdf: String,
    pub kdfparams: ScryptParams,
    pub mac: String,
}

/// Encrypted-at-rest secret plus everything needed to decrypt it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyStore {
    pub version: String,
    #[serde(rename = "type", default)]
    pub key_type: KeyType,
    #[serde(rename = "coinTypeForChain", default)]
    pub coin_type_for_chain: BTreeMap<String, u32>,
    #[serde(rename = "bip44HDPath", default, skip_serializing_if = "Option::is_none")]
    pub bip44_hd_path: Option<Bip44HdPath>,
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
    pub crypto: CryptoSection,
}

impl KeyStore {
    /// Parse a persisted store. Any shape error is a validation error.
    pub fn from_json(json: &str) -> Result<Self, CryptoError> {
        serde_json::from_str(json).map_err(|e| CryptoError::Validation(e.to_string()))
    }
}

/// Brute-force cost knobs used for new stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScryptCost {
    pub n: u64,
    pub r: u32,
    pub p: u32,
    pub dklen: u32,
}

impl Default for ScryptCost {
    fn default() -> Self {
        Self {
            n: 131072,
            r: 8,
            p: 1,
            dklen: 32,
        }
    }
}

// =============================================================================
// Encrypt / Decrypt
// =============================================================================

/// Encrypt `text` under `password` with the default scrypt cost.
pub async fn encrypt(
    rng: &dyn RandomSource,
    key_type: KeyType,
    text: &str,
    password: &str,
    meta: BTreeMap<String, String>,
    bip44_hd_path: Option<Bip44HdPath>,
) -> Result<KeyStore, CryptoError> {
    encrypt_with_cost(
        ScryptCost::default(),
        rng,
        key_type,
        text,
        password,
        meta,
        bip44_hd_path,
    )
    .await
}

/// Encrypt with explicit scrypt cost. Salt and IV are fresh on every call.
pub async fn encrypt_with_cost(
    cost: ScryptCost,
    rng: &dyn RandomSource,
    key_type: KeyType,
    text: &str,
    password: &str,
    meta: BTreeMap<String, String>,
    bip44_hd_path: Option<Bip44HdPath>,
) -> Result<KeyStore, CryptoError> {
    let kdf = KdfInput::from_cost(&cost)?;

    let mut salt = [0u8; SALT_LEN];
    rng.fill(&mut salt).await?;
    let derived_key = derive_key(password, &salt, kdf).await?;

    let mut iv = [0u8; IV_LEN];
    rng.fill(&mut iv).await?;

    let mut ciphertext = text.as_bytes().to_vec();
    apply_keystream(&derived_key, &iv, &mut ciphertext)?;
    let mac = compute_mac(&derived_key, &ciphertext);

    Ok(KeyStore {
        version: KEY_STORE_VERSION.to_string(),
        key_type,
        coin_type_for_chain: BTreeMap::new(),
        bip44_hd_path,
        meta,
        crypto: CryptoSection {
            cipher: CIPHER_AES_CTR.to_string(),
            cipherparams: CipherParams {
                iv: hex::encode(iv),
            },
            ciphertext: hex::encode(&ciphertext),
            kdf: KDF_SCRYPT.to_string(),
            kdfparams: ScryptParams {
                dklen: cost.dklen,
                salt: hex::encode(salt),
                n: cost.n,
                r: cost.r,
                p: cost.p,
            },
            mac: hex::encode(mac),
        },
    })
}

/// Decrypt a store with exactly one password attempt.
pub async fn decrypt(key_store: &KeyStore, password: &str) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let parsed = ParsedCrypto::parse(&key_store.crypto)?;

    let derived_key = derive_key(password, &parsed.salt, parsed.kdf).await?;

    let mac = compute_mac(&derived_key, &parsed.ciphertext);
    if !bool::from(mac.as_slice().ct_eq(&parsed.mac)) {
        return Err(CryptoError::Integrity);
    }

    let mut plaintext = Zeroizing::new(parsed.ciphertext);
    apply_keystream(&derived_key, &parsed.iv, &mut plaintext)?;
    Ok(plaintext)
}

// =============================================================================
// Internals
// =============================================================================

#[derive(Debug, Clone, Copy)]
struct KdfInput {
    log_n: u8,
    r: u32,
    p: u32,
    dklen: usize,
}

impl KdfInput {
    fn new(n: u64, r: u32, p: u32, dklen: u32) -> Result<Self, CryptoError> {
        if n < 2 || !n.is_power_of_two() {
            return Err(CryptoError::Validation(format!(
                "scrypt n must be a power of two greater than 1, got {n}"
            )));
        }
        if !matches!(dklen, 16 | 24 | 32) {
            return Err(CryptoError::Validation(format!(
                "unsupported dklen {dklen}"
            )));
        }
        let log_n = n.trailing_zeros() as u8;
        // Reject what scrypt would reject, before deriving anything.
        scrypt::Params::new(log_n, r, p, dklen as usize)
            .map_err(|e| CryptoError::Validation(format!("invalid scrypt params: {e}")))?;
        Ok(Self {
            log_n,
            r,
            p,
            dklen: dklen as usize,
        })
    }

    fn from_cost(cost: &ScryptCost) -> Result<Self, CryptoError> {
        Self::new(cost.n, cost.r, cost.p, cost.dklen)
    }
}

/// Decoded and validated crypto section.
struct ParsedCrypto {
    kdf: KdfInput,
    salt: Vec<u8>,
    iv: [u8; IV_LEN],
    ciphertext: Vec<u8>,
    mac: Vec<u8>,
}

impl ParsedCrypto {
    fn parse(section: &CryptoSection) -> Result<Self, CryptoError> {
        if section.kdf != KDF_SCRYPT {
            return Err(CryptoError::Validation(format!(
                "unsupported kdf {}",
                section.kdf
            )));
        }
        if section.cipher != CIPHER_AES_CTR {
            return Err(CryptoError::Validation(format!(
                "unsupported cipher {}",
                section.cipher
            )));
        }

        let params = &section.kdfparams;
        let kdf = KdfInput::new(params.n, params.r, params.p, params.dklen)?;

        let salt = decode_hex("salt", &params.salt)?;
        let iv: [u8; IV_LEN] = decode_hex("iv", &section.cipherparams.iv)?
            .try_into()
            .map_err(|_| CryptoError::Validation("iv must be 16 bytes".to_string()))?;
        let ciphertext = decode_hex("ciphertext", &section.ciphertext)?;
        let mac = decode_hex("mac", &section.mac)?;
        if mac.len() != 32 {
            return Err(CryptoError::Validation("mac must be 32 bytes".to_string()));
        }

        Ok(Self {
            kdf,
            salt,
            iv,
            ciphertext,
            mac,
        })
    }
}

fn decode_hex(field: &str, value: &str) -> Result<Vec<u8>, CryptoError> {
    hex::decode(value).map_err(|e| CryptoError::Validation(format!("{field} is not hex: {e}")))
}

/// Run scrypt off the async executor; it takes long enough to stall dispatch.
async fn derive_key(
    password: &str,
    salt: &[u8],
    kdf: KdfInput,
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let password = Zeroizing::new(password.as_bytes().to_vec());
    let salt = salt.to_vec();

    tokio::task::spawn_blocking(move || {
        let params = scrypt::Params::new(kdf.log_n, kdf.r, kdf.p, kdf.dklen)
            .map_err(|e| CryptoError::Validation(format!("invalid scrypt params: {e}")))?;
        let mut output = Zeroizing::new(vec![0u8; kdf.dklen]);
        scrypt::scrypt(&password, &salt, &params, &mut output)
            .map_err(|e| CryptoError::Kdf(e.to_string()))?;
        Ok(output)
    })
    .await
    .map_err(|e| CryptoError::Kdf(e.to_string()))?
}

fn apply_keystream(key: &[u8], iv: &[u8; IV_LEN], data: &mut [u8]) -> Result<(), CryptoError> {
    let invalid = |e: ctr::cipher::InvalidLength| CryptoError::Validation(e.to_string());
    match key.len() {
        16 => Ctr128BE::<Aes128>::new_from_slices(key, iv)
            .map_err(invalid)?
            .apply_keystream(data),
        24 => Ctr128BE::<Aes192>::new_from_slices(key, iv)
            .map_err(invalid)?
            .apply_keystream(data),
        32 => Ctr128BE::<Aes256>::new_from_slices(key, iv)
            .map_err(invalid)?
            .apply_keystream(data),
        len => {
            return Err(CryptoError::Validation(format!(
                "unsupported key length {len}"
            )))
        }
    }
    Ok(())
}

/// SHA-256 over the second half of the derived key and the ciphertext.
///
/// Not an HMAC. Existing stores depend on this exact construction.
fn compute_mac(derived_key: &[u8], ciphertext: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(&derived_key[derived_key.len() / 2..]);
    hasher.update(ciphertext);
    hasher.finalize().into()
}

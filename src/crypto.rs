// ABOUTME: AES-256-GCM map encryption with a canonical length-prefixed serialization
// ABOUTME: KeyProvider abstraction (in-memory/PBKDF2/config-fetched) plus constant-time compare
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Map crypto (C13, §4.12).

use crate::errors::CryptoError;
use crate::types::{EncryptedPIIMap, RawPIIMap};
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

/// Fixed 8-byte authenticated-data header binding the map-crypto version and
/// framing to the ciphertext (§6 "Encrypted PII map").
pub const AAD_HEADER: &[u8; 8] = b"RHPIIv1\0";

const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;
const PBKDF2_MIN_ITERATIONS: u32 = 100_000;

/// Yields a 32-byte symmetric key for map encryption (§4.12).
pub trait KeyProvider: Send + Sync {
    fn key(&self) -> Result<[u8; KEY_LEN], CryptoError>;
}

/// A fixed, caller-supplied 32-byte key kept only in memory.
pub struct InMemoryKeyProvider {
    key: [u8; KEY_LEN],
}

impl InMemoryKeyProvider {
    /// # Errors
    /// Returns [`CryptoError::InvalidKeyLength`] unless `key_bytes` is exactly 32 bytes.
    pub fn new(key_bytes: &[u8]) -> Result<Self, CryptoError> {
        validate_key(key_bytes)?;
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(key_bytes);
        Ok(Self { key })
    }

    #[must_use]
    pub fn generate_random() -> Self {
        let mut key = [0u8; KEY_LEN];
        rand::thread_rng().fill_bytes(&mut key);
        Self { key }
    }
}

impl KeyProvider for InMemoryKeyProvider {
    fn key(&self) -> Result<[u8; KEY_LEN], CryptoError> {
        Ok(self.key)
    }
}

/// Derives a key from a passphrase and salt via PBKDF2-SHA-256 with at least
/// 100k iterations (§4.12).
pub struct PassphraseKeyProvider {
    key: [u8; KEY_LEN],
}

impl PassphraseKeyProvider {
    #[must_use]
    pub fn new(passphrase: &str, salt: &[u8], iterations: u32) -> Self {
        let iterations = iterations.max(PBKDF2_MIN_ITERATIONS);
        let mut key = [0u8; KEY_LEN];
        pbkdf2_hmac_sha256(passphrase.as_bytes(), salt, iterations, &mut key);
        Self { key }
    }
}

impl KeyProvider for PassphraseKeyProvider {
    fn key(&self) -> Result<[u8; KEY_LEN], CryptoError> {
        Ok(self.key)
    }
}

/// Minimal single-block-aware PBKDF2-HMAC-SHA256, sized for a 32-byte output
/// (one block, since SHA-256's output is exactly 32 bytes).
fn pbkdf2_hmac_sha256(password: &[u8], salt: &[u8], iterations: u32, out: &mut [u8; KEY_LEN]) {
    use hmac::{Hmac, Mac};
    type HmacSha256 = Hmac<Sha256>;

    let mut salt_block = salt.to_vec();
    salt_block.extend_from_slice(&1u32.to_be_bytes());

    // HMAC-SHA256 accepts any key length, so construction cannot fail here.
    #[allow(clippy::expect_used)]
    let mut mac = <HmacSha256 as Mac>::new_from_slice(password).expect("HMAC accepts any key length");
    mac.update(&salt_block);
    let mut u = mac.finalize().into_bytes();
    let mut result = u;

    for _ in 1..iterations {
        #[allow(clippy::expect_used)]
        let mut mac = <HmacSha256 as Mac>::new_from_slice(password).expect("HMAC accepts any key length");
        mac.update(&u);
        u = mac.finalize().into_bytes();
        for (r, x) in result.iter_mut().zip(u.iter()) {
            *r ^= x;
        }
    }

    out.copy_from_slice(&result);
}

/// Validates a key is exactly 32 bytes (§4.12).
///
/// # Errors
/// Returns [`CryptoError::InvalidKeyLength`] otherwise.
pub fn validate_key(key_bytes: &[u8]) -> Result<(), CryptoError> {
    if key_bytes.len() == KEY_LEN {
        Ok(())
    } else {
        Err(CryptoError::InvalidKeyLength(key_bytes.len()))
    }
}

/// Constant-time byte comparison, independent of early-exit timing (§4.12).
#[must_use]
pub fn secure_compare(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && bool::from(a.ct_eq(b))
}

/// Canonical length-prefixed serialization of a [`RawPIIMap`]: a 4-byte
/// big-endian key count, then for each entry a 4-byte key length, the key
/// bytes, a 4-byte value length, and the value bytes. Keys are always
/// `[A-Z_0-9]+` and values are arbitrary UTF-8, so length-prefixing avoids
/// needing an escaping scheme (§4.12).
#[must_use]
pub fn serialize_map(map: &RawPIIMap) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&(map.len() as u32).to_be_bytes());
    for (key, value) in map.iter() {
        buf.extend_from_slice(&(key.len() as u32).to_be_bytes());
        buf.extend_from_slice(key.as_bytes());
        buf.extend_from_slice(&(value.len() as u32).to_be_bytes());
        buf.extend_from_slice(value.as_bytes());
    }
    buf
}

/// Parses the canonical serialization back into a [`RawPIIMap`].
///
/// # Errors
/// Returns [`CryptoError::InvalidEncoding`] if the framing is malformed.
pub fn deserialize_map(bytes: &[u8]) -> Result<RawPIIMap, CryptoError> {
    let mut map = RawPIIMap::new();
    let mut cursor = 0usize;

    let count = read_u32(bytes, &mut cursor)?;
    for _ in 0..count {
        let key_len = read_u32(bytes, &mut cursor)? as usize;
        let key = read_utf8(bytes, &mut cursor, key_len)?;
        let value_len = read_u32(bytes, &mut cursor)? as usize;
        let value = read_utf8(bytes, &mut cursor, value_len)?;
        map.insert_first_wins(key, value);
    }
    Ok(map)
}

fn read_u32(bytes: &[u8], cursor: &mut usize) -> Result<u32, CryptoError> {
    let end = *cursor + 4;
    let slice = bytes.get(*cursor..end).ok_or(CryptoError::InvalidEncoding)?;
    *cursor = end;
    Ok(u32::from_be_bytes(slice.try_into().map_err(|_| CryptoError::InvalidEncoding)?))
}

fn read_utf8(bytes: &[u8], cursor: &mut usize, len: usize) -> Result<String, CryptoError> {
    let end = *cursor + len;
    let slice = bytes.get(*cursor..end).ok_or(CryptoError::InvalidEncoding)?;
    *cursor = end;
    String::from_utf8(slice.to_vec()).map_err(|_| CryptoError::InvalidEncoding)
}

/// Encrypts `map` with AES-256-GCM under a random 96-bit nonce, binding
/// [`AAD_HEADER`] as authenticated data, and returns the base64-encoded
/// envelope (§4.12, §6).
///
/// # Errors
/// Returns a [`CryptoError`] if the provided key is invalid.
pub fn encrypt_map(map: &RawPIIMap, key_provider: &dyn KeyProvider) -> Result<EncryptedPIIMap, CryptoError> {
    let key_bytes = key_provider.key()?;
    let cipher = Aes256Gcm::new(GenericArray::from_slice(&key_bytes));

    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = GenericArray::from_slice(&nonce_bytes);

    let plaintext = serialize_map(map);
    let payload = aes_gcm::aead::Payload {
        msg: &plaintext,
        aad: AAD_HEADER,
    };
    let ciphertext = cipher
        .encrypt(nonce, payload)
        .map_err(|_| CryptoError::AuthenticationFailed)?;

    // aes-gcm appends the 16-byte tag to the ciphertext; split it back out
    // so the wire format matches the documented `{ciphertext, iv, authTag}` triple.
    let tag_start = ciphertext.len() - 16;
    let (ct, tag) = ciphertext.split_at(tag_start);

    Ok(EncryptedPIIMap {
        ciphertext: BASE64.encode(ct),
        iv: BASE64.encode(nonce_bytes),
        auth_tag: BASE64.encode(tag),
    })
}

/// Decrypts an [`EncryptedPIIMap`] back into a [`RawPIIMap`] (§4.12).
///
/// # Errors
/// Returns [`CryptoError::InvalidEncoding`] on malformed base64,
/// [`CryptoError::PayloadTooShort`] if the nonce/tag can't fit, or
/// [`CryptoError::AuthenticationFailed`] if the auth tag doesn't verify.
pub fn decrypt_map(envelope: &EncryptedPIIMap, key_provider: &dyn KeyProvider) -> Result<RawPIIMap, CryptoError> {
    let key_bytes = key_provider.key()?;
    let cipher = Aes256Gcm::new(GenericArray::from_slice(&key_bytes));

    let nonce_bytes = BASE64
        .decode(&envelope.iv)
        .map_err(|_| CryptoError::InvalidEncoding)?;
    if nonce_bytes.len() != NONCE_LEN {
        return Err(CryptoError::PayloadTooShort);
    }
    let ciphertext = BASE64
        .decode(&envelope.ciphertext)
        .map_err(|_| CryptoError::InvalidEncoding)?;
    let tag = BASE64
        .decode(&envelope.auth_tag)
        .map_err(|_| CryptoError::InvalidEncoding)?;
    if tag.len() != 16 {
        return Err(CryptoError::PayloadTooShort);
    }

    let mut combined = ciphertext;
    combined.extend_from_slice(&tag);

    let nonce = GenericArray::from_slice(&nonce_bytes);
    let payload = aes_gcm::aead::Payload {
        msg: &combined,
        aad: AAD_HEADER,
    };
    let plaintext = cipher
        .decrypt(nonce, payload)
        .map_err(|_| CryptoError::AuthenticationFailed)?;

    deserialize_map(&plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_round_trips_through_deserialize() {
        let mut map = RawPIIMap::new();
        map.insert_first_wins("EMAIL_1", "jane@example.com");
        map.insert_first_wins("PERSON_1", "Jane Doe");
        let bytes = serialize_map(&map);
        let parsed = deserialize_map(&bytes).unwrap();
        assert_eq!(parsed.get("EMAIL_1"), Some("jane@example.com"));
        assert_eq!(parsed.get("PERSON_1"), Some("Jane Doe"));
    }

    #[test]
    fn encrypt_then_decrypt_recovers_original_map() {
        let provider = InMemoryKeyProvider::generate_random();
        let mut map = RawPIIMap::new();
        map.insert_first_wins("EMAIL_1", "jane@example.com");
        let envelope = encrypt_map(&map, &provider).unwrap();
        let decrypted = decrypt_map(&envelope, &provider).unwrap();
        assert_eq!(decrypted, map);
    }

    #[test]
    fn decrypt_with_wrong_key_fails_authentication() {
        let provider_a = InMemoryKeyProvider::generate_random();
        let provider_b = InMemoryKeyProvider::generate_random();
        let mut map = RawPIIMap::new();
        map.insert_first_wins("EMAIL_1", "jane@example.com");
        let envelope = encrypt_map(&map, &provider_a).unwrap();
        let result = decrypt_map(&envelope, &provider_b);
        assert!(matches!(result, Err(CryptoError::AuthenticationFailed)));
    }

    #[test]
    fn invalid_key_length_is_rejected() {
        let result = InMemoryKeyProvider::new(&[0u8; 16]);
        assert!(matches!(result, Err(CryptoError::InvalidKeyLength(16))));
    }

    #[test]
    fn secure_compare_matches_equal_bytes() {
        assert!(secure_compare(b"abc", b"abc"));
        assert!(!secure_compare(b"abc", b"abd"));
        assert!(!secure_compare(b"abc", b"ab"));
    }

    #[test]
    fn passphrase_key_provider_is_deterministic_for_same_inputs() {
        let a = PassphraseKeyProvider::new("hunter2", b"salt", 100_000);
        let b = PassphraseKeyProvider::new("hunter2", b"salt", 100_000);
        assert_eq!(a.key().unwrap(), b.key().unwrap());
    }
}

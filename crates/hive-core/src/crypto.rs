//! Field-level credential encryption.
//!
//! Secrets at rest (OAuth tokens, swarm API keys, lightning public keys)
//! are encrypted one field at a time with AES-256-GCM. The field name is
//! bound into the authentication tag as associated data, so an envelope
//! produced for one field cannot be substituted for another even when the
//! ciphertext bytes are swapped wholesale. Key material is versioned:
//! exactly one version encrypts new data, every version remains available
//! for decrypting data written before a rotation.
//!
//! # Security model
//!
//! - Every encryption draws a fresh 96-bit IV from the OS CSPRNG.
//! - Tag verification is constant-time inside the AEAD implementation.
//! - Key bytes are zeroized on drop and never appear in `Debug` output.

use std::collections::BTreeMap;

use aes_gcm::aead::rand_core::RngCore;
use aes_gcm::aead::{Aead, KeyInit, OsRng, Payload};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use chrono::Utc;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::envelope::{EncryptedEnvelope, IV_LEN, TAG_LEN};
use crate::error::CryptoError;

/// A 256-bit field encryption key, zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct FieldKey([u8; 32]);

impl FieldKey {
    /// Create a key from raw bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Create a key from a 64-character hex string.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKeyMaterial`] if the input is not
    /// valid hex or does not decode to exactly 32 bytes.
    pub fn from_hex(encoded: &str) -> Result<Self, CryptoError> {
        let raw = hex::decode(encoded).map_err(|e| CryptoError::InvalidKeyMaterial {
            reason: e.to_string(),
        })?;
        let bytes: [u8; 32] = raw
            .try_into()
            .map_err(|_| CryptoError::InvalidKeyMaterial {
                reason: "key must decode to 32 bytes".to_owned(),
            })?;
        Ok(Self(bytes))
    }

    /// Generate a new random key using the OS CSPRNG.
    #[must_use]
    pub fn generate() -> Self {
        let key = Aes256Gcm::generate_key(OsRng);
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&key);
        Self(bytes)
    }

    /// Borrow the raw key bytes.
    ///
    /// Use with care — the caller must not log or persist these bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for FieldKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Versioned key material for field encryption.
///
/// An ordered set of keys indexed by integer version. The highest version
/// is current and encrypts all new data; older versions remain available
/// for decryption only. Built once at process start, immutable thereafter.
pub struct KeyRing {
    keys: BTreeMap<u32, FieldKey>,
    current: u32,
}

impl KeyRing {
    /// Build a ring from versioned keys. The highest version becomes
    /// current.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::EmptyKeyRing`] if no keys are supplied.
    pub fn new(keys: BTreeMap<u32, FieldKey>) -> Result<Self, CryptoError> {
        let current = keys
            .last_key_value()
            .map(|(version, _)| *version)
            .ok_or(CryptoError::EmptyKeyRing)?;
        Ok(Self { keys, current })
    }

    /// Build a single-version ring. Useful for development and tests.
    #[must_use]
    pub fn single(key: FieldKey) -> Self {
        let mut keys = BTreeMap::new();
        keys.insert(1, key);
        Self { keys, current: 1 }
    }

    /// The version used for new encryptions.
    #[must_use]
    pub fn current_version(&self) -> u32 {
        self.current
    }

    fn key(&self, version: u32) -> Option<&FieldKey> {
        self.keys.get(&version)
    }
}

impl std::fmt::Debug for KeyRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyRing")
            .field("versions", &self.keys.keys().collect::<Vec<_>>())
            .field("current", &self.current)
            .finish()
    }
}

/// The field encryption service.
///
/// Stateless per call beyond the immutable [`KeyRing`]; safe to share
/// across tasks. Constructed explicitly at startup and dependency-injected
/// into call sites — never a process-wide singleton.
#[derive(Debug)]
pub struct FieldCipher {
    ring: KeyRing,
}

impl FieldCipher {
    /// Create a cipher over the given key ring.
    #[must_use]
    pub fn new(ring: KeyRing) -> Self {
        Self { ring }
    }

    /// Encrypt a named field under the current key version.
    ///
    /// A fresh random IV is drawn per call; the field name is bound as
    /// associated data.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Encryption`] if the AEAD operation fails.
    pub fn encrypt_field(
        &self,
        field_name: &str,
        plaintext: &str,
    ) -> Result<EncryptedEnvelope, CryptoError> {
        let version = self.ring.current_version();
        let key = self
            .ring
            .key(version)
            .ok_or(CryptoError::UnknownKeyVersion { version })?;

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));

        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);

        let mut combined = cipher
            .encrypt(
                Nonce::from_slice(&iv),
                Payload {
                    msg: plaintext.as_bytes(),
                    aad: field_name.as_bytes(),
                },
            )
            .map_err(|e| CryptoError::Encryption {
                reason: e.to_string(),
            })?;

        // aes-gcm appends the 16-byte tag; the envelope stores it apart.
        let tag_start = combined.len().saturating_sub(TAG_LEN);
        let tag_bytes = combined.split_off(tag_start);
        let tag: [u8; TAG_LEN] = tag_bytes
            .try_into()
            .map_err(|_| CryptoError::Encryption {
                reason: "ciphertext shorter than tag".to_owned(),
            })?;

        Ok(EncryptedEnvelope {
            ciphertext: combined,
            iv,
            tag,
            key_version: version,
            encrypted_at: Utc::now(),
        })
    }

    /// Decrypt a named field from its envelope.
    ///
    /// # Errors
    ///
    /// - [`CryptoError::UnknownKeyVersion`] if the envelope's key version
    ///   is not in the ring — a fatal configuration condition.
    /// - [`CryptoError::DecryptionFailed`] on tag mismatch: tampering,
    ///   corruption, or a field name the envelope was not bound to.
    pub fn decrypt_field(
        &self,
        field_name: &str,
        envelope: &EncryptedEnvelope,
    ) -> Result<String, CryptoError> {
        let key = self
            .ring
            .key(envelope.key_version)
            .ok_or(CryptoError::UnknownKeyVersion {
                version: envelope.key_version,
            })?;

        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_bytes()));

        let mut combined = Vec::with_capacity(envelope.ciphertext.len().saturating_add(TAG_LEN));
        combined.extend_from_slice(&envelope.ciphertext);
        combined.extend_from_slice(&envelope.tag);

        let plaintext = cipher
            .decrypt(
                Nonce::from_slice(&envelope.iv),
                Payload {
                    msg: &combined,
                    aad: field_name.as_bytes(),
                },
            )
            .map_err(|_| CryptoError::DecryptionFailed {
                field: field_name.to_owned(),
            })?;

        String::from_utf8(plaintext).map_err(|_| CryptoError::DecryptionFailed {
            field: field_name.to_owned(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn cipher() -> FieldCipher {
        FieldCipher::new(KeyRing::single(FieldKey::generate()))
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let cipher = cipher();
        let envelope = cipher.encrypt_field("swarmApiKey", "sk_live_abc123").unwrap();
        let plaintext = cipher.decrypt_field("swarmApiKey", &envelope).unwrap();
        assert_eq!(plaintext, "sk_live_abc123");
    }

    #[test]
    fn roundtrip_empty_plaintext() {
        let cipher = cipher();
        let envelope = cipher.encrypt_field("accessToken", "").unwrap();
        assert_eq!(cipher.decrypt_field("accessToken", &envelope).unwrap(), "");
    }

    #[test]
    fn roundtrip_unicode_plaintext() {
        let cipher = cipher();
        let envelope = cipher.encrypt_field("note", "日本語 ключ 🔑").unwrap();
        assert_eq!(
            cipher.decrypt_field("note", &envelope).unwrap(),
            "日本語 ключ 🔑"
        );
    }

    #[test]
    fn wrong_field_name_fails() {
        let cipher = cipher();
        let envelope = cipher.encrypt_field("swarmApiKey", "secret").unwrap();
        let result = cipher.decrypt_field("lightningPubkey", &envelope);
        assert!(matches!(
            result,
            Err(CryptoError::DecryptionFailed { .. })
        ));
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let cipher = cipher();
        let mut envelope = cipher.encrypt_field("swarmApiKey", "secret").unwrap();
        envelope.ciphertext[0] ^= 0x01;
        let result = cipher.decrypt_field("swarmApiKey", &envelope);
        assert!(matches!(
            result,
            Err(CryptoError::DecryptionFailed { .. })
        ));
    }

    #[test]
    fn tampered_tag_fails() {
        let cipher = cipher();
        let mut envelope = cipher.encrypt_field("swarmApiKey", "secret").unwrap();
        envelope.tag[15] ^= 0x80;
        let result = cipher.decrypt_field("swarmApiKey", &envelope);
        assert!(matches!(
            result,
            Err(CryptoError::DecryptionFailed { .. })
        ));
    }

    #[test]
    fn tampered_iv_fails() {
        let cipher = cipher();
        let mut envelope = cipher.encrypt_field("swarmApiKey", "secret").unwrap();
        envelope.iv[0] ^= 0xFF;
        assert!(cipher.decrypt_field("swarmApiKey", &envelope).is_err());
    }

    #[test]
    fn fresh_iv_per_encryption() {
        let cipher = cipher();
        let a = cipher.encrypt_field("swarmApiKey", "same").unwrap();
        let b = cipher.encrypt_field("swarmApiKey", "same").unwrap();
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn old_key_version_still_decrypts_after_rotation() {
        let v1 = FieldKey::generate();

        let old_cipher = FieldCipher::new(KeyRing::single(v1.clone()));
        let envelope = old_cipher.encrypt_field("swarmApiKey", "rotate-me").unwrap();
        assert_eq!(envelope.key_version, 1);

        let mut keys = BTreeMap::new();
        keys.insert(1, v1);
        keys.insert(2, FieldKey::generate());
        let rotated = FieldCipher::new(KeyRing::new(keys).unwrap());

        assert_eq!(rotated.ring.current_version(), 2);
        assert_eq!(
            rotated.decrypt_field("swarmApiKey", &envelope).unwrap(),
            "rotate-me"
        );

        let fresh = rotated.encrypt_field("swarmApiKey", "new").unwrap();
        assert_eq!(fresh.key_version, 2);
    }

    #[test]
    fn unknown_key_version_fails() {
        let cipher = cipher();
        let mut envelope = cipher.encrypt_field("swarmApiKey", "secret").unwrap();
        envelope.key_version = 42;
        let result = cipher.decrypt_field("swarmApiKey", &envelope);
        assert!(matches!(
            result,
            Err(CryptoError::UnknownKeyVersion { version: 42 })
        ));
    }

    #[test]
    fn empty_key_ring_rejected() {
        let result = KeyRing::new(BTreeMap::new());
        assert!(matches!(result, Err(CryptoError::EmptyKeyRing)));
    }

    #[test]
    fn key_from_hex_roundtrip() {
        let key = FieldKey::generate();
        let encoded = hex::encode(key.as_bytes());
        let decoded = FieldKey::from_hex(&encoded).unwrap();
        assert_eq!(decoded.as_bytes(), key.as_bytes());
    }

    #[test]
    fn key_from_bad_hex_fails() {
        assert!(FieldKey::from_hex("not hex").is_err());
        assert!(FieldKey::from_hex("abcd").is_err());
    }

    #[test]
    fn field_key_debug_redacts_bytes() {
        let key = FieldKey::generate();
        let debug = format!("{key:?}");
        assert!(debug.contains("[REDACTED]"));
    }
}

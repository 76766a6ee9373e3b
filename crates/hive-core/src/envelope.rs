//! Persisted envelope codec.
//!
//! The only module aware of the textual shape an encrypted field takes at
//! rest. The surrounding persistence layer stores the result as an opaque
//! string column; everything else handles [`EncryptedEnvelope`] values.
//!
//! The wire shape is a compatibility surface — envelopes written under
//! older key versions must keep parsing:
//!
//! ```json
//! {"data":"<b64>","iv":"<b64>","tag":"<b64>","version":1,"encryptedAt":"2025-11-02T09:14:00Z"}
//! ```

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EnvelopeParseError;

/// AES-256-GCM IV length (96 bits).
pub const IV_LEN: usize = 12;

/// AES-256-GCM authentication tag length (128 bits).
pub const TAG_LEN: usize = 16;

/// An encrypted field at rest.
///
/// Immutable once produced; credential rotation replaces the envelope
/// wholesale, never patches it in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedEnvelope {
    pub ciphertext: Vec<u8>,
    pub iv: [u8; IV_LEN],
    /// Authenticates the ciphertext and the field name it was bound to.
    pub tag: [u8; TAG_LEN],
    pub key_version: u32,
    pub encrypted_at: DateTime<Utc>,
}

/// On-disk JSON shape.
#[derive(Serialize, Deserialize)]
struct WireEnvelope {
    data: String,
    iv: String,
    tag: String,
    version: u32,
    #[serde(rename = "encryptedAt")]
    encrypted_at: DateTime<Utc>,
}

/// Serialize an envelope to its persisted text form.
#[must_use]
pub fn serialize(envelope: &EncryptedEnvelope) -> String {
    serde_json::json!({
        "data": BASE64.encode(&envelope.ciphertext),
        "iv": BASE64.encode(envelope.iv),
        "tag": BASE64.encode(envelope.tag),
        "version": envelope.key_version,
        "encryptedAt": envelope.encrypted_at,
    })
    .to_string()
}

/// Parse an envelope from its persisted text form.
///
/// Never panics on garbage input: malformed stored credentials must
/// degrade to "not found" at the caller, not crash the request.
///
/// # Errors
///
/// Returns [`EnvelopeParseError`] if the text is not an envelope JSON
/// object, a payload is not valid base64, or the iv/tag have the wrong
/// length.
pub fn deserialize(text: &str) -> Result<EncryptedEnvelope, EnvelopeParseError> {
    let wire: WireEnvelope =
        serde_json::from_str(text).map_err(|e| EnvelopeParseError::Malformed {
            reason: e.to_string(),
        })?;

    let ciphertext = decode_field("data", &wire.data)?;
    let iv = decode_fixed::<IV_LEN>("iv", &wire.iv)?;
    let tag = decode_fixed::<TAG_LEN>("tag", &wire.tag)?;

    Ok(EncryptedEnvelope {
        ciphertext,
        iv,
        tag,
        key_version: wire.version,
        encrypted_at: wire.encrypted_at,
    })
}

fn decode_field(field: &'static str, value: &str) -> Result<Vec<u8>, EnvelopeParseError> {
    BASE64
        .decode(value)
        .map_err(|_| EnvelopeParseError::Encoding { field })
}

fn decode_fixed<const N: usize>(
    field: &'static str,
    value: &str,
) -> Result<[u8; N], EnvelopeParseError> {
    let raw = decode_field(field, value)?;
    let actual = raw.len();
    raw.try_into().map_err(|_| EnvelopeParseError::Length {
        field,
        expected: N,
        actual,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::crypto::{FieldCipher, FieldKey, KeyRing};

    fn sample_envelope() -> EncryptedEnvelope {
        let cipher = FieldCipher::new(KeyRing::single(FieldKey::generate()));
        cipher.encrypt_field("swarmApiKey", "sk_live_xyz").unwrap()
    }

    #[test]
    fn serialize_deserialize_roundtrip() {
        let envelope = sample_envelope();
        let text = serialize(&envelope);
        let parsed = deserialize(&text).unwrap();
        assert_eq!(parsed, envelope);
    }

    #[test]
    fn serialized_shape_is_stable() {
        let envelope = sample_envelope();
        let value: serde_json::Value = serde_json::from_str(&serialize(&envelope)).unwrap();
        let object = value.as_object().unwrap();
        for key in ["data", "iv", "tag", "version", "encryptedAt"] {
            assert!(object.contains_key(key), "missing key {key}");
        }
        assert_eq!(object["version"], envelope.key_version);
    }

    #[test]
    fn decrypts_after_text_roundtrip() {
        let cipher = FieldCipher::new(KeyRing::single(FieldKey::generate()));
        let stored = serialize(&cipher.encrypt_field("swarmApiKey", "sk_live_xyz").unwrap());
        let envelope = deserialize(&stored).unwrap();
        assert_eq!(
            cipher.decrypt_field("swarmApiKey", &envelope).unwrap(),
            "sk_live_xyz"
        );
    }

    #[test]
    fn garbage_text_is_a_parse_error() {
        for garbage in ["", "not json", "42", "[1,2,3]", "{\"data\":true}"] {
            assert!(matches!(
                deserialize(garbage),
                Err(EnvelopeParseError::Malformed { .. })
            ));
        }
    }

    #[test]
    fn bad_base64_is_a_parse_error() {
        let text = r#"{"data":"!!!","iv":"AAAAAAAAAAAAAAAA","tag":"AAAAAAAAAAAAAAAAAAAAAA==","version":1,"encryptedAt":"2025-01-01T00:00:00Z"}"#;
        assert!(matches!(
            deserialize(text),
            Err(EnvelopeParseError::Encoding { field: "data" })
        ));
    }

    #[test]
    fn wrong_iv_length_is_a_parse_error() {
        // "iv" decodes to 4 bytes instead of 12.
        let text = r#"{"data":"AAAA","iv":"AAAAAQ==","tag":"AAAAAAAAAAAAAAAAAAAAAA==","version":1,"encryptedAt":"2025-01-01T00:00:00Z"}"#;
        assert!(matches!(
            deserialize(text),
            Err(EnvelopeParseError::Length { field: "iv", .. })
        ));
    }

    #[test]
    fn historical_envelope_version_is_preserved() {
        let mut envelope = sample_envelope();
        envelope.key_version = 3;
        let parsed = deserialize(&serialize(&envelope)).unwrap();
        assert_eq!(parsed.key_version, 3);
    }
}

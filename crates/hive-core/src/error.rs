//! Error types for `hive-core`.
//!
//! Each variant carries enough context to diagnose the problem without a
//! debugger. Crypto errors never include key material or plaintext — only
//! key versions, field names, and operation descriptions.

/// Errors from field-level encryption and decryption.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// AES-256-GCM encryption failed.
    #[error("field encryption failed: {reason}")]
    Encryption { reason: String },

    /// Authentication tag verification failed — tampered ciphertext, a
    /// corrupted envelope, or an envelope bound to a different field name.
    #[error("field decryption failed for '{field}'")]
    DecryptionFailed { field: String },

    /// The envelope references a key version this process does not hold.
    /// A configuration-level condition, not a per-request error: the
    /// process cannot decrypt until the missing key is provisioned.
    #[error("unknown key version {version}")]
    UnknownKeyVersion { version: u32 },

    /// A key ring must hold at least one key version.
    #[error("key ring holds no keys")]
    EmptyKeyRing,

    /// Supplied key bytes could not be used (wrong encoding or length).
    #[error("invalid key material: {reason}")]
    InvalidKeyMaterial { reason: String },
}

/// Errors from parsing a persisted envelope.
///
/// Distinguishable variants for logging, but callers resolving a stored
/// credential collapse all of them into the same "not found" outcome as a
/// genuinely absent credential.
#[derive(Debug, thiserror::Error)]
pub enum EnvelopeParseError {
    /// The stored text is not a valid envelope JSON object.
    #[error("envelope is not valid JSON: {reason}")]
    Malformed { reason: String },

    /// A base64 payload field failed to decode.
    #[error("envelope field '{field}' is not valid base64")]
    Encoding { field: &'static str },

    /// The iv or tag decoded to the wrong length.
    #[error("envelope field '{field}' has length {actual}, expected {expected}")]
    Length {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Errors from the injected lookup capability backing the resolver.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// The underlying lookup failed (e.g. the database was unreachable).
    #[error("directory lookup failed: {reason}")]
    Lookup { reason: String },
}

/// Errors from authorization resolution.
///
/// Transient lookup failures propagate here and are terminal for the
/// current request — retrying a deny would observably delay it, so retry
/// policy belongs to the caller.
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    /// The lookup capability failed.
    #[error("authorization lookup error: {0}")]
    Directory(#[from] DirectoryError),
}

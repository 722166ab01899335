// ABOUTME: Centralized error handling for the anonymization pipeline
// ABOUTME: Module-scoped error enums composed behind a crate-level PiiError
//
// Licensed under either of Apache License, Version 2.0 or MIT License at your option.

//! Error kinds for the anonymization pipeline (§7).
//!
//! Each subsystem that can fail owns a small `thiserror` enum scoped to its own
//! failure modes. [`PiiError`] composes them behind a single `From`-convertible
//! type so callers at the crate boundary only need to match one enum.

use thiserror::Error;

/// Configuration problems: missing model/vocab paths, missing remote URL, etc.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("custom NER mode requires a model path")]
    MissingModelPath,
    #[error("custom NER mode requires a vocabulary path")]
    MissingVocabPath,
    #[error("remote NER backend requires a base URL")]
    MissingRemoteUrl,
    #[error("invalid confidence threshold for {0:?}: {1}")]
    InvalidThreshold(crate::types::PIIType, f32),
    #[error("invalid configuration value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

/// Model/vocabulary/remote-health loading failures (fatal at `initialize`).
#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("failed to download model asset {name}: {message}")]
    DownloadFailed { name: String, message: String },
    #[error("failed to parse vocabulary: {0}")]
    VocabParseFailed(String),
    #[error("remote NER backend health check failed: {0}")]
    RemoteHealthFailed(String),
    #[error("semantic auxiliary data failed to load: {0}")]
    SemanticDataFailed(String),
}

/// Inference transport/decoding failures (abort the current `anonymize` call).
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("NER transport failure: {0}")]
    Transport(String),
    #[error("malformed logits: {0}")]
    MalformedLogits(String),
    #[error("NER request timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Semantic masking requested without auxiliary data available.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DataUnavailable {
    #[error("semantic masking requested but auxiliary data is not loaded and auto-download is disabled")]
    SemanticDataMissing,
}

/// Map-crypto failures: bad key length, auth-tag mismatch, tamper detection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid key length: expected 32 bytes, got {0}")]
    InvalidKeyLength(usize),
    #[error("decryption failed: authentication tag mismatch or corrupted data")]
    AuthenticationFailed,
    #[error("invalid base64 encoding in encrypted map")]
    InvalidEncoding,
    #[error("encrypted payload too short to contain nonce and tag")]
    PayloadTooShort,
    #[error("key derivation failed: {0}")]
    KeyDerivationFailed(String),
}

/// Session read-modify-write path: decryption failure against stored state,
/// distinct from a one-shot [`CryptoError`] because it carries a recovery hint.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("session map decryption failed for session {session_id}: {source}; recovery hint: delete and retry")]
pub struct SessionDecryptError {
    pub session_id: String,
    pub source: CryptoError,
}

/// Storage backend failures (session store, model cache).
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage key not found: {0}")]
    NotFound(String),
    #[error("storage backend I/O failure: {0}")]
    Io(String),
    #[error("storage serialization failure: {0}")]
    Serialization(String),
}

/// Crate-level error type. Conversions are wired with `#[from]` so `?` composes
/// across subsystem boundaries without manual mapping at every call site.
#[derive(Debug, Error)]
pub enum PiiError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("model load error: {0}")]
    ModelLoad(#[from] ModelLoadError),
    #[error("inference error: {0}")]
    Inference(#[from] InferenceError),
    #[error("data unavailable: {0}")]
    DataUnavailable(#[from] DataUnavailable),
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
    #[error("session decrypt error: {0}")]
    SessionDecrypt(#[from] SessionDecryptError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result alias used throughout the crate's public API.
pub type AnonymizerResult<T> = Result<T, PiiError>;

/// A non-fatal validation finding (§4.10, §7 `ValidationWarning`).
///
/// Never constructed from or carrying the original PII text -- only a machine
/// code and a safe, human-readable message are retained so logging the full
/// issue list can never leak a detected span.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ValidationIssue {
    pub code: ValidationErrorCode,
    pub message: String,
}

/// Machine-readable codes for validation findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ValidationErrorCode {
    /// A tag appears in the anonymized text with no corresponding map key.
    OrphanTag,
    /// A map key has no corresponding tag occurrence in the anonymized text.
    UnusedMapKey,
    /// A map key appears more than once as a tag in the anonymized text.
    DuplicateTagOccurrence,
    /// A leak-scan regex matched text outside of any tag.
    LeakDetected,
}

impl ValidationIssue {
    #[must_use]
    pub fn new(code: ValidationErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

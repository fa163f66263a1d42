//! Error types for threshold signing operations

use crate::shares::ShareKind;
use crate::types::PartyRole;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for threshold signing operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while combining keys or driving a signing session
#[derive(Debug, Error)]
pub enum Error {
    /// Role, index, ownership or ordering violation. Caller bug; never retried.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    /// Derived common keychain does not match the independently agreed value
    #[error("common keychain mismatch: expected {expected}, derived {derived}")]
    KeyMismatch { expected: String, derived: String },

    /// A mandatory counterparty key share was not supplied
    #[error("missing required key share from {0}")]
    MissingCounterpartyShare(PartyRole),

    /// The remote party has not produced the awaited share yet
    #[error("{0} not yet available on transaction request")]
    MissingSignatureShare(ShareKind),

    /// Transaction request id is not known to the coordinator
    #[error("unknown transaction request: {0}")]
    UnknownTxRequest(String),

    /// Ciphertext failed to decrypt or its signature failed to verify
    #[error("share decryption failed: {0}")]
    ShareDecryption(String),

    /// Deadline exceeded while polling for a remote share
    #[error("timed out after {waited:?} waiting for {share}")]
    SignatureShareTimeout { share: ShareKind, waited: Duration },

    /// Gateway transport error
    #[error("gateway error: {0}")]
    Gateway(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Cryptographic operation failed
    #[error("cryptographic error: {0}")]
    Crypto(String),
}

impl Error {
    /// Whether the caller may poll again after seeing this error.
    ///
    /// Only the absence of an awaited remote share is transient; every other
    /// failure aborts the session and a retry must start a fresh one.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::MissingSignatureShare(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

//! Error types for hostprep
//!
//! Validation failures are *not* errors: they are [`crate::Rejection`]s and
//! keep the wizard in the same stage. Everything here aborts the current
//! operation and is propagated to the caller.

use thiserror::Error;

/// Result type alias for hostprep operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for hostprep
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Environment precondition failed (unsupported OS, not root, ...)
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Package installation failed
    #[error("Package installation failed: {0}")]
    PackageInstall(String),

    /// File system errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Transport-level failure talking to an external service
    #[error("Network error ({service}): {message}")]
    Network {
        /// Service that failed (e.g. "ip-echo", "resolver")
        service: String,
        /// Error message
        message: String,
    },

    /// An external call did not finish in time
    #[error("Timed out after {seconds}s waiting for {service}")]
    Timeout {
        /// Service that timed out
        service: String,
        /// Timeout that elapsed
        seconds: u64,
    },

    /// Name has no A record / NXDOMAIN
    #[error("Not found: {0}")]
    NotFound(String),

    /// Plaintext append attempted on a sealed document
    #[error("Document is sealed, refusing plaintext append: {0}")]
    SealedDocument(String),

    /// Seal attempted on a document that is already sealed
    #[error("Document is already sealed: {0}")]
    AlreadySealed(String),

    /// Sealing or key derivation failed
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Wrong passphrase, corrupted or tampered envelope
    #[error("Decryption failed: {0}")]
    Decryption(String),

    /// Prompter could not read operator input
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Deployment engine could not be launched
    #[error("Hand-off error: {0}")]
    Handoff(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a precondition error
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    /// Create a network error for the named service
    pub fn network(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Network {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Create a timeout error for the named service
    pub fn timeout(service: impl Into<String>, seconds: u64) -> Self {
        Self::Timeout {
            service: service.into(),
            seconds,
        }
    }

    /// Create a "not found" error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an encryption error
    pub fn encryption(msg: impl Into<String>) -> Self {
        Self::Encryption(msg.into())
    }

    /// Create a decryption error
    pub fn decryption(msg: impl Into<String>) -> Self {
        Self::Decryption(msg.into())
    }

    /// Create a prompt error
    pub fn prompt(msg: impl Into<String>) -> Self {
        Self::Prompt(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Whether a retry could plausibly succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Timeout { .. })
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

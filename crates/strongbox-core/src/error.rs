//! Error types for Strongbox core operations.
//!
//! Errors are descriptive at the core level; the CLI layer maps them to
//! user-facing text through [`VaultError::user_message`], which never reveals
//! whether a failure came from the key check, a record envelope, or tampering.

use thiserror::Error;

/// Result type alias for vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;

/// Coarse classification of a [`VaultError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidCredentials,
    VaultLocked,
    AuthenticationFailed,
    NotFound,
    InvalidParams,
    RekeyAborted,
    ImportAuthenticationFailed,
    AlreadyInitialized,
    Busy,
    Serialization,
    StorageFailure,
}

/// Core error type for vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Password did not unlock the vault (key-check failed)
    #[error("Incorrect password")]
    InvalidCredentials,

    /// Operation needs the key but the vault is not unlocked
    #[error("Vault is locked")]
    VaultLocked,

    /// Envelope failed integrity verification (wrong key or tampered data)
    #[error("Authentication failed")]
    AuthenticationFailed,

    /// Record or metadata absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// KDF or cipher parameters outside safe bounds
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    /// Rekey failed part way; the previous key and records are still in place
    #[error("Rekey aborted: {reason}")]
    RekeyAborted { reason: String },

    /// Bundle password did not verify; the local vault was not touched
    #[error("Import authentication failed")]
    ImportAuthenticationFailed,

    /// A vault already exists in this store
    #[error("Vault is already initialized")]
    AlreadyInitialized,

    /// Another unlock is in progress
    #[error("Vault is busy")]
    Busy,

    /// Plaintext payload could not be (de)serialized
    #[error("Serialization error: {source}")]
    Serialization {
        #[from]
        source: serde_json::Error,
    },

    /// Storage backend error (generic)
    #[error("Storage error: {0}")]
    Storage(String),

    /// SQLite-specific storage error
    #[error("SQLite error: {source}")]
    Sqlite {
        #[from]
        source: rusqlite::Error,
    },

    /// I/O error
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl VaultError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            VaultError::InvalidCredentials => ErrorKind::InvalidCredentials,
            VaultError::VaultLocked => ErrorKind::VaultLocked,
            VaultError::AuthenticationFailed => ErrorKind::AuthenticationFailed,
            VaultError::NotFound(_) => ErrorKind::NotFound,
            VaultError::InvalidParams(_) => ErrorKind::InvalidParams,
            VaultError::RekeyAborted { .. } => ErrorKind::RekeyAborted,
            VaultError::ImportAuthenticationFailed => ErrorKind::ImportAuthenticationFailed,
            VaultError::AlreadyInitialized => ErrorKind::AlreadyInitialized,
            VaultError::Busy => ErrorKind::Busy,
            VaultError::Serialization { .. } => ErrorKind::Serialization,
            VaultError::Storage(_) | VaultError::Sqlite { .. } | VaultError::Io { .. } => {
                ErrorKind::StorageFailure
            }
        }
    }

    /// Storage failures and contention are transient; everything else is not.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::StorageFailure | ErrorKind::Busy)
    }

    /// Message suitable for showing to a user.
    ///
    /// All credential and integrity failures share one message.
    pub fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::InvalidCredentials
            | ErrorKind::AuthenticationFailed
            | ErrorKind::ImportAuthenticationFailed => {
                "Incorrect password or corrupted vault data".to_string()
            }
            ErrorKind::VaultLocked => "Vault is locked; unlock it to continue".to_string(),
            ErrorKind::StorageFailure => format!("Storage error (transient, retry): {}", self),
            ErrorKind::RekeyAborted => {
                "Password change failed; the previous password is still active".to_string()
            }
            _ => self.to_string(),
        }
    }

    pub(crate) fn not_found(what: impl Into<String>) -> Self {
        VaultError::NotFound(what.into())
    }
}

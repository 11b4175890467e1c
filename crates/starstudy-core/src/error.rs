//! Core error types for starstudy-core.
//!
//! Every failure a caller can observe is one of these `thiserror` enums.
//! The sync layer turns most remote failures into a `LocalOnly` outcome
//! instead of returning them.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for starstudy-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Local persistence errors
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Remote document store errors
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Authentication errors
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Study session errors
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Local key-value and encrypted cache errors.
///
/// A ciphertext that fails to decrypt is *not* an error; see
/// [`crate::storage::EncryptedStore::get`].
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open the database file
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// Encryption of a value failed
    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// Value could not be serialized before encryption
    #[error("Failed to serialize value for '{key}': {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown dot-path key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Missing required configuration key
    #[error("Missing required configuration key: {0}")]
    MissingKey(String),

    /// No usable data directory
    #[error("Could not determine data directory: {0}")]
    DataDir(String),
}

/// Remote document store failures.
///
/// Both variants are the `RemoteUnavailable` condition from the caller's
/// point of view: the mutation continues in local-only mode.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Not reachable, timed out, or not initialized
    #[error("remote store unavailable: {0}")]
    Unavailable(String),

    /// The remote answered but refused the request
    #[error("remote store rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
}

/// Authentication errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Sign-in attempted before the email address was verified
    #[error("Please verify your email address before signing in")]
    NotVerified,

    /// Unknown email or wrong password
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Sign-up with an email that already has an account
    #[error("An account already exists for {0}")]
    EmailInUse(String),

    /// Password shorter than the provider's minimum
    #[error("Password must be at least {min} characters")]
    WeakPassword { min: usize },

    /// Auth service could not be reached
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Required text field is empty after sanitizing
    #[error("'{0}' must not be empty")]
    Empty(String),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },

    /// Password and confirmation differ
    #[error("Passwords do not match")]
    PasswordMismatch,
}

/// Study session errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// A session is already running
    #[error("A study session is already active")]
    AlreadyActive,

    /// Command is not valid in the current state
    #[error("Cannot {action} while session is {state}")]
    InvalidTransition { action: String, state: String },

    /// Unknown child or subject
    #[error("Unknown {kind}: {id}")]
    NotFound { kind: String, id: String },
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) => {
                if e.code == rusqlite::ErrorCode::DatabaseLocked
                    || e.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    StoreError::Locked
                } else {
                    StoreError::QueryFailed(err.to_string())
                }
            }
            _ => StoreError::QueryFailed(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_verified_converts_into_core_error() {
        let err: CoreError = AuthError::NotVerified.into();
        assert!(matches!(err, CoreError::Auth(AuthError::NotVerified)));
        assert!(err.to_string().contains("verify your email"));
    }

    #[test]
    fn remote_error_is_transparent_inside_auth() {
        let err = AuthError::from(RemoteError::Unavailable("offline".into()));
        assert_eq!(err.to_string(), "remote store unavailable: offline");
    }

    #[test]
    fn sqlite_no_rows_maps_to_query_failed() {
        let err = StoreError::from(rusqlite::Error::QueryReturnedNoRows);
        assert!(matches!(err, StoreError::QueryFailed(_)));
    }
}

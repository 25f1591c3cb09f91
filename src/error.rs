//! Error types for StudySync
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for StudySync operations
///
/// Every failure the scheduling core can produce maps to exactly one
/// variant, so a caller can tell "not found" from "invalid" from
/// "unavailable" and present an accurate message.
#[derive(Error, Debug)]
pub enum StudySyncError {
    /// The session document store could not be opened, read or written
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The referenced session identifier does not resolve
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// A slot submission or slot choice was rejected before any mutation
    #[error("Invalid proposal: {0}")]
    InvalidProposal(String),

    /// Session creation input was rejected
    #[error("Invalid session: {0}")]
    InvalidSession(String),

    /// The acting user is not allowed to perform the operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// A proposal arrived after the session's proposal deadline
    #[error("Proposal deadline passed: deadline={deadline}, {message}")]
    DeadlinePassed {
        /// The session's deadline (YYYY-MM-DD)
        deadline: String,
        /// Additional context about the rejection
        message: String,
    },

    /// Re-finalization was attempted while the reject policy is active
    #[error("Session already finalized: {0}")]
    AlreadyFinalized(String),

    /// A single notification could not be delivered
    #[error("Delivery failure for {recipient}: {reason}")]
    DeliveryFailure {
        /// Recipient address
        recipient: String,
        /// Why the delivery failed
        reason: String,
    },

    /// Registration attempted with an email that already has an account
    #[error("Account already exists: {0}")]
    AlreadyExists(String),

    /// Email/password pair did not match a registered account
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Feedback input was rejected
    #[error("Invalid feedback: {0}")]
    InvalidFeedback(String),

    /// A shared file or link was rejected
    #[error("Invalid resource: {0}")]
    InvalidResource(String),

    /// Object storage upload failed
    #[error("Upload error: {0}")]
    Upload(String),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl From<sled::Error> for StudySyncError {
    fn from(err: sled::Error) -> Self {
        Self::StorageUnavailable(err.to_string())
    }
}

/// Result type alias for StudySync operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation. Callers that
/// need to branch on the failure kind use [`error_kind`] or
/// `downcast_ref::<StudySyncError>()`.
pub type Result<T> = anyhow::Result<T>;

/// Returns the [`StudySyncError`] carried by an `anyhow::Error`, if any
pub fn error_kind(err: &anyhow::Error) -> Option<&StudySyncError> {
    err.downcast_ref::<StudySyncError>()
}

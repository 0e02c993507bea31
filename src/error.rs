//! Error taxonomy for the storefront client.
//!
//! Credential errors resolve to a logged-out session, remote errors to a local
//! rollback plus a notification. None of them is meant to reach a top-level
//! crash boundary.

use std::fmt;
use thiserror::Error;

/// A single checkout form field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    // ---
    pub field: &'static str,
    pub message: &'static str,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, Error)]
pub enum StorefrontError {
    /// Credential is not three dot-separated segments or its payload is not
    /// base64url-encoded JSON.
    #[error("Malformed credential: {0}")]
    MalformedCredential(String),

    /// Credential decoded but is past (or lacks) its expiry.
    #[error("Credential expired")]
    ExpiredCredential,

    /// Network or API failure on a remote call.
    #[error("Remote unavailable: {0}")]
    RemoteUnavailable(String),

    /// Checkout form failed validation; nothing was submitted.
    #[error("Validation failed: {}", join_fields(.0))]
    ValidationFailure(Vec<FieldError>),

    /// No resolvable subject identifier for an operation that needs one.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Checkout invoked with no selected cart lines.
    #[error("No cart lines selected")]
    EmptySelection,

    /// Client-side storage could not be read or written.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl StorefrontError {
    // ---
    /// Wraps a failed remote call.
    pub(crate) fn remote(err: anyhow::Error) -> Self {
        // ---
        StorefrontError::RemoteUnavailable(format!("{err:#}"))
    }

    pub(crate) fn storage(err: anyhow::Error) -> Self {
        // ---
        StorefrontError::Storage(format!("{err:#}"))
    }

    /// Field errors, when this is a validation failure.
    pub fn field_errors(&self) -> &[FieldError] {
        // ---
        match self {
            StorefrontError::ValidationFailure(errors) => errors,
            _ => &[],
        }
    }
}

fn join_fields(errors: &[FieldError]) -> String {
    // ---
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

pub type StorefrontResult<T> = std::result::Result<T, StorefrontError>;

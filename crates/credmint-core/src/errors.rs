//! Error taxonomy for credmint.
//!
//! Every error names the business operation it was raised from
//! (`mint_credential`, `burn_credential`, ...) plus the identifiers needed to
//! act on it. Errors never carry key material or raw signing payloads.
//!
//! Kinds:
//! - `NotFound`: a referenced institution, credential or asset does not exist
//! - `PreconditionFailed`: the entity exists but is in the wrong state
//! - `ValidationFailed`: caller input or decoded external data is malformed
//! - `LedgerSubmissionFailed`: the ledger rejected a submitted transaction
//! - `DependencyUnavailable`: an RPC, indexer or store call failed or timed out
//!
//! The first three are detected before any network call. Only
//! `DependencyUnavailable` is retryable.

use thiserror::Error;

pub type CredmintResult<T> = Result<T, CredmintError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredmintError {
    #[error("{operation}: {what} not found")]
    NotFound { operation: String, what: String },

    #[error("{operation}: precondition failed: {reason}")]
    PreconditionFailed { operation: String, reason: String },

    #[error("{operation}: validation failed: {reason}")]
    ValidationFailed { operation: String, reason: String },

    #[error("{operation}: ledger rejected transaction {signature}: {error}")]
    LedgerSubmissionFailed {
        operation: String,
        signature: String,
        error: String,
    },

    #[error("{operation}: dependency unavailable: {reason}")]
    DependencyUnavailable { operation: String, reason: String },
}

/// Coarse error kind, stable for serialization into caller-facing payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    PreconditionFailed,
    ValidationFailed,
    LedgerSubmissionFailed,
    DependencyUnavailable,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::PreconditionFailed => "precondition_failed",
            Self::ValidationFailed => "validation_failed",
            Self::LedgerSubmissionFailed => "ledger_submission_failed",
            Self::DependencyUnavailable => "dependency_unavailable",
        }
    }
}

impl CredmintError {
    pub fn not_found(operation: impl Into<String>, what: impl Into<String>) -> Self {
        Self::NotFound {
            operation: operation.into(),
            what: what.into(),
        }
    }

    pub fn precondition(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PreconditionFailed {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    pub fn validation(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ValidationFailed {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    pub fn submission(
        operation: impl Into<String>,
        signature: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self::LedgerSubmissionFailed {
            operation: operation.into(),
            signature: signature.into(),
            error: error.into(),
        }
    }

    pub fn unavailable(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DependencyUnavailable {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::PreconditionFailed { .. } => ErrorKind::PreconditionFailed,
            Self::ValidationFailed { .. } => ErrorKind::ValidationFailed,
            Self::LedgerSubmissionFailed { .. } => ErrorKind::LedgerSubmissionFailed,
            Self::DependencyUnavailable { .. } => ErrorKind::DependencyUnavailable,
        }
    }

    pub fn operation(&self) -> &str {
        match self {
            Self::NotFound { operation, .. }
            | Self::PreconditionFailed { operation, .. }
            | Self::ValidationFailed { operation, .. }
            | Self::LedgerSubmissionFailed { operation, .. }
            | Self::DependencyUnavailable { operation, .. } => operation,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::DependencyUnavailable { .. })
    }
}

//! credmint-core
//!
//! Core primitives for credmint:
//! - Institution, credential and operation models
//! - Reconciliation metadata (closed enum, one variant per operation type)
//! - Program field limits and the placeholder content sentinel
//! - Credential metadata documents
//! - Engine configuration and the error taxonomy
//!
//! This crate performs no network or filesystem I/O.

pub mod config;
pub mod document;
pub mod errors;
pub mod limits;
pub mod model;

pub use crate::errors::{CredmintError, CredmintResult, ErrorKind};

/// Convenience re-exports.
pub mod prelude {
    pub use crate::config::EngineConfig;
    pub use crate::document::CredentialDocument;
    pub use crate::model::{
        AccountCreated, Address, AddressField, AddressSlot, CredentialRecord, CredentialStatus,
        InstitutionProfile, InstitutionStatus, MintAuditEntry, OperationMetadata, OperationType,
        ProofBundle, RevocationEntry, UnsignedOperation, WorkflowStage,
    };
    pub use crate::{CredmintError, CredmintResult};
}

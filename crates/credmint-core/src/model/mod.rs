//! credmint data models.
//!
//! Models are mostly plain data. Policy (limits, prerequisite resolution,
//! reconciliation) lives in the engine; persistence lives in the store.
//!
//! - `address`: 32-byte ledger address with base58 text form
//! - `institution`: institution profile with write-once address slots
//! - `credential`: credential records and audit entries
//! - `operation`: unsigned operations and reconciliation metadata
//! - `proof`: Merkle proof bundle used to burn a compressed credential

pub mod address;
pub mod credential;
pub mod institution;
pub mod operation;
pub mod proof;

pub use address::{Address, AddressParseError};
pub use credential::{CredentialRecord, CredentialStatus, MintAuditEntry, RevocationEntry};
pub use institution::{AddressField, AddressSlot, InstitutionProfile, InstitutionStatus};
pub use operation::{
    AccountCreated, OperationMetadata, OperationType, UnsignedOperation, WorkflowStage,
};
pub use proof::ProofBundle;

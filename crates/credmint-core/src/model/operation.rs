//! Unsigned operations handed to an external signer, and the metadata that
//! comes back with them at reconciliation time.
//!
//! `OperationMetadata` is a closed enum with one variant per operation type.
//! Reconciliation matches it exhaustively, so a new operation type cannot be
//! added without deciding what local mutation it implies. Metadata carries
//! identifiers only, never key material.

use serde::{Deserialize, Serialize};

use super::address::Address;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    RegisterInstitution,
    ApproveInstitution,
    CreateTree,
    CreateCollection,
    MintCredential,
    BurnCredential,
    CreateLookupTable,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RegisterInstitution => "register_institution",
            Self::ApproveInstitution => "approve_institution",
            Self::CreateTree => "create_tree",
            Self::CreateCollection => "create_collection",
            Self::MintCredential => "mint_credential",
            Self::BurnCredential => "burn_credential",
            Self::CreateLookupTable => "create_lookup_table",
        }
    }
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OperationMetadata {
    RegisterInstitution {
        institution_id: String,
        authority: Address,
        registration: Address,
    },
    ApproveInstitution {
        institution_id: String,
        registration: Address,
    },
    CreateTree {
        institution_id: String,
        tree: Address,
        /// Slot value observed at preparation time; the write is a compare-and-set on it.
        previous: Option<Address>,
        max_depth: u32,
        max_buffer_size: u32,
        canopy_depth: u32,
    },
    CreateCollection {
        institution_id: String,
        collection: Address,
        previous: Option<Address>,
        name: String,
        uri: String,
    },
    MintCredential {
        institution_id: String,
        credential_id: String,
        credential_number: String,
        recipient: Address,
        tree: Address,
        collection: Address,
        content_uri: String,
    },
    BurnCredential {
        institution_id: String,
        credential_id: String,
        credential_number: String,
        asset_id: Address,
        reason: String,
    },
    CreateLookupTable {
        institution_id: String,
        lookup_table: Address,
        previous: Option<Address>,
    },
}

impl OperationMetadata {
    pub fn operation_type(&self) -> OperationType {
        match self {
            Self::RegisterInstitution { .. } => OperationType::RegisterInstitution,
            Self::ApproveInstitution { .. } => OperationType::ApproveInstitution,
            Self::CreateTree { .. } => OperationType::CreateTree,
            Self::CreateCollection { .. } => OperationType::CreateCollection,
            Self::MintCredential { .. } => OperationType::MintCredential,
            Self::BurnCredential { .. } => OperationType::BurnCredential,
            Self::CreateLookupTable { .. } => OperationType::CreateLookupTable,
        }
    }

    pub fn institution_id(&self) -> &str {
        match self {
            Self::RegisterInstitution { institution_id, .. }
            | Self::ApproveInstitution { institution_id, .. }
            | Self::CreateTree { institution_id, .. }
            | Self::CreateCollection { institution_id, .. }
            | Self::MintCredential { institution_id, .. }
            | Self::BurnCredential { institution_id, .. }
            | Self::CreateLookupTable { institution_id, .. } => institution_id,
        }
    }
}

/// An account created by an operation, for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountCreated {
    pub name: String,
    pub address: Address,
}

impl AccountCreated {
    pub fn new(name: impl Into<String>, address: Address) -> Self {
        Self {
            name: name.into(),
            address,
        }
    }
}

/// A serialized, partially signed transaction waiting for the fee payer's signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedOperation {
    pub operation_type: OperationType,
    /// Wire-format transaction, base58 on the wire.
    #[serde(with = "base58_bytes")]
    pub transaction: Vec<u8>,
    /// Blockhash the transaction was built against.
    pub block_reference: String,
    /// Last block height at which `block_reference` is accepted.
    pub expiry_height: u64,
    /// Display text only.
    pub message: String,
    pub metadata: OperationMetadata,
    #[serde(default)]
    pub accounts_created: Vec<AccountCreated>,
}

/// Caller-visible position of a workflow between calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStage {
    Requested,
    PrerequisitesPending,
    TerminalOperationReady,
    Submitted,
    Confirmed,
    Failed,
}

impl WorkflowStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::PrerequisitesPending => "prerequisites_pending",
            Self::TerminalOperationReady => "terminal_operation_ready",
            Self::Submitted => "submitted",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
        }
    }
}

mod base58_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&bs58::encode(bytes).into_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        bs58::decode(s).into_vec().map_err(serde::de::Error::custom)
    }
}

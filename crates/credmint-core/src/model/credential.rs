//! Credential records and the append-only audit entries written on reconciliation.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::address::Address;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialStatus {
    #[default]
    Pending,
    Minted,
    Failed,
    Revoked,
}

impl CredentialStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Minted => "minted",
            Self::Failed => "failed",
            Self::Revoked => "revoked",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "minted" => Some(Self::Minted),
            "failed" => Some(Self::Failed),
            "revoked" => Some(Self::Revoked),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub id: String,
    pub institution_id: String,
    /// Institution-scoped certificate number, unique per institution.
    pub credential_number: String,
    pub title: String,
    pub student_name: String,
    /// Wallet that receives the compressed token.
    pub recipient: Address,
    #[serde(default)]
    pub degree_type: Option<String>,
    #[serde(default)]
    pub program: Option<String>,
    /// ISO-8601 date.
    #[serde(default)]
    pub issued_on: Option<String>,
    #[serde(default)]
    pub image_uri: Option<String>,
    /// Published metadata document. `None` or the placeholder sentinel means
    /// metadata still has to be generated.
    #[serde(default)]
    pub content_uri: Option<String>,
    #[serde(default)]
    pub status: CredentialStatus,
    #[serde(default)]
    pub asset_id: Option<Address>,
    #[serde(default)]
    pub leaf_index: Option<u32>,
    #[serde(default)]
    pub mint_signature: Option<String>,
}

impl CredentialRecord {
    /// Minted on-chain but the indexer has not yet reported the asset id.
    pub fn is_identifier_pending(&self) -> bool {
        self.status == CredentialStatus::Minted && self.asset_id.is_none()
    }
}

/// One row per minted credential, unique on `(credential_number, institution_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintAuditEntry {
    pub credential_number: String,
    pub institution_id: String,
    pub credential_id: String,
    pub signature: String,
    pub recipient: Address,
    pub tree: Address,
    #[serde(with = "time::serde::rfc3339")]
    pub recorded_at: OffsetDateTime,
}

/// One row per revoked credential, unique on `(credential_number, institution_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationEntry {
    pub credential_number: String,
    pub institution_id: String,
    pub credential_id: String,
    pub asset_id: Address,
    pub reason: String,
    pub signature: String,
    #[serde(with = "time::serde::rfc3339")]
    pub revoked_at: OffsetDateTime,
}

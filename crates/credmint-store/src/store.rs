//! The persistence port.

use thiserror::Error;

use credmint_core::model::{
    Address, AddressField, CredentialRecord, InstitutionProfile, InstitutionStatus,
    MintAuditEntry, RevocationEntry,
};
use credmint_core::CredmintError;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("corrupt row: {0}")]
    Corrupt(String),
    #[cfg(feature = "sqlite")]
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl StoreError {
    pub fn into_credmint(self, operation: &str) -> CredmintError {
        match self {
            Self::NotFound(what) => CredmintError::not_found(operation, what),
            other => CredmintError::unavailable(operation, format!("local store: {other}")),
        }
    }
}

/// Result of a compare-and-set write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
    /// The stored value matched the expected value and was replaced.
    Applied,
    /// The stored value already equals the new value.
    AlreadyApplied,
    /// The stored value is something else; nothing was written.
    Conflict,
}

impl CasOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::AlreadyApplied => "already_applied",
            Self::Conflict => "conflict",
        }
    }
}

pub trait LocalStore: Send + Sync {
    fn get_institution(&self, id: &str) -> StoreResult<Option<InstitutionProfile>>;

    /// Insert or replace the descriptive fields of an institution.
    ///
    /// Address slots and status of an existing row are left untouched; they
    /// only change through the compare-and-set methods.
    fn put_institution(&self, profile: &InstitutionProfile) -> StoreResult<()>;

    fn list_institutions(&self) -> StoreResult<Vec<InstitutionProfile>>;

    /// Set an address slot to `new` if it currently holds `expected`.
    fn compare_and_set_address(
        &self,
        institution_id: &str,
        field: AddressField,
        expected: Option<Address>,
        new: Address,
    ) -> StoreResult<CasOutcome>;

    fn compare_and_set_status(
        &self,
        institution_id: &str,
        expected: InstitutionStatus,
        new: InstitutionStatus,
    ) -> StoreResult<CasOutcome>;

    fn get_credential(&self, id: &str) -> StoreResult<Option<CredentialRecord>>;

    fn put_credential(&self, record: &CredentialRecord) -> StoreResult<()>;

    fn list_credentials(&self, institution_id: &str) -> StoreResult<Vec<CredentialRecord>>;

    /// Store `uri` as the credential's content reference unless a real
    /// (non-placeholder) reference is already present. Returns the reference
    /// the credential holds afterwards.
    fn set_content_if_placeholder(&self, credential_id: &str, uri: &str) -> StoreResult<String>;

    /// Pending or failed to minted. Returns false if the credential was already
    /// past that point.
    fn mark_minted(&self, credential_id: &str, signature: &str) -> StoreResult<bool>;

    /// Pending to failed.
    fn mark_failed(&self, credential_id: &str) -> StoreResult<bool>;

    /// Minted to revoked.
    fn mark_revoked(&self, credential_id: &str) -> StoreResult<bool>;

    fn set_credential_asset(
        &self,
        credential_id: &str,
        asset_id: Address,
        leaf_index: u32,
    ) -> StoreResult<()>;

    /// Append to the mint audit log. Returns false if an entry for the same
    /// `(credential_number, institution_id)` already exists.
    fn append_mint_audit(&self, entry: &MintAuditEntry) -> StoreResult<bool>;

    /// Append to the revocation index, same uniqueness as the mint audit log.
    fn append_revocation(&self, entry: &RevocationEntry) -> StoreResult<bool>;

    fn mint_audit(&self, institution_id: &str) -> StoreResult<Vec<MintAuditEntry>>;

    fn revocations(&self, institution_id: &str) -> StoreResult<Vec<RevocationEntry>>;
}

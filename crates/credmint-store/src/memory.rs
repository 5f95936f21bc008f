use std::collections::BTreeMap;

use parking_lot::RwLock;

use credmint_core::limits::is_placeholder;
use credmint_core::model::{
    Address, AddressField, AddressSlot, CredentialRecord, CredentialStatus, InstitutionProfile,
    InstitutionStatus, MintAuditEntry, RevocationEntry,
};

use crate::store::{CasOutcome, LocalStore, StoreError, StoreResult};

#[derive(Debug, Default)]
struct Inner {
    institutions: BTreeMap<String, InstitutionProfile>,
    credentials: BTreeMap<String, CredentialRecord>,
    mint_audit: Vec<MintAuditEntry>,
    revocations: Vec<RevocationEntry>,
}

/// In-process store. All state is lost when dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn missing_institution(id: &str) -> StoreError {
    StoreError::NotFound(format!("institution {id}"))
}

fn missing_credential(id: &str) -> StoreError {
    StoreError::NotFound(format!("credential {id}"))
}

impl LocalStore for MemoryStore {
    fn get_institution(&self, id: &str) -> StoreResult<Option<InstitutionProfile>> {
        Ok(self.inner.read().institutions.get(id).cloned())
    }

    fn put_institution(&self, profile: &InstitutionProfile) -> StoreResult<()> {
        let mut inner = self.inner.write();
        match inner.institutions.get_mut(&profile.id) {
            Some(existing) => {
                existing.name = profile.name.clone();
                existing.website = profile.website.clone();
                existing.logo_uri = profile.logo_uri.clone();
                existing.authority = profile.authority;
                existing.super_authority = profile.super_authority;
            }
            None => {
                inner
                    .institutions
                    .insert(profile.id.clone(), profile.clone());
            }
        }
        Ok(())
    }

    fn list_institutions(&self) -> StoreResult<Vec<InstitutionProfile>> {
        Ok(self.inner.read().institutions.values().cloned().collect())
    }

    fn compare_and_set_address(
        &self,
        institution_id: &str,
        field: AddressField,
        expected: Option<Address>,
        new: Address,
    ) -> StoreResult<CasOutcome> {
        let mut inner = self.inner.write();
        let profile = inner
            .institutions
            .get_mut(institution_id)
            .ok_or_else(|| missing_institution(institution_id))?;
        let slot = profile.slot_mut(field);
        let current = slot.address();
        if current == Some(new) {
            return Ok(CasOutcome::AlreadyApplied);
        }
        if current != expected {
            return Ok(CasOutcome::Conflict);
        }
        *slot = AddressSlot::Confirmed(new);
        Ok(CasOutcome::Applied)
    }

    fn compare_and_set_status(
        &self,
        institution_id: &str,
        expected: InstitutionStatus,
        new: InstitutionStatus,
    ) -> StoreResult<CasOutcome> {
        let mut inner = self.inner.write();
        let profile = inner
            .institutions
            .get_mut(institution_id)
            .ok_or_else(|| missing_institution(institution_id))?;
        if profile.status == new {
            return Ok(CasOutcome::AlreadyApplied);
        }
        if profile.status != expected {
            return Ok(CasOutcome::Conflict);
        }
        profile.status = new;
        Ok(CasOutcome::Applied)
    }

    fn get_credential(&self, id: &str) -> StoreResult<Option<CredentialRecord>> {
        Ok(self.inner.read().credentials.get(id).cloned())
    }

    fn put_credential(&self, record: &CredentialRecord) -> StoreResult<()> {
        self.inner
            .write()
            .credentials
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn list_credentials(&self, institution_id: &str) -> StoreResult<Vec<CredentialRecord>> {
        Ok(self
            .inner
            .read()
            .credentials
            .values()
            .filter(|c| c.institution_id == institution_id)
            .cloned()
            .collect())
    }

    fn set_content_if_placeholder(&self, credential_id: &str, uri: &str) -> StoreResult<String> {
        let mut inner = self.inner.write();
        let record = inner
            .credentials
            .get_mut(credential_id)
            .ok_or_else(|| missing_credential(credential_id))?;
        if is_placeholder(record.content_uri.as_deref()) {
            record.content_uri = Some(uri.to_string());
        }
        Ok(record.content_uri.clone().unwrap_or_default())
    }

    fn mark_minted(&self, credential_id: &str, signature: &str) -> StoreResult<bool> {
        let mut inner = self.inner.write();
        let record = inner
            .credentials
            .get_mut(credential_id)
            .ok_or_else(|| missing_credential(credential_id))?;
        match record.status {
            CredentialStatus::Pending | CredentialStatus::Failed => {
                record.status = CredentialStatus::Minted;
                record.mint_signature = Some(signature.to_string());
                Ok(true)
            }
            CredentialStatus::Minted | CredentialStatus::Revoked => Ok(false),
        }
    }

    fn mark_failed(&self, credential_id: &str) -> StoreResult<bool> {
        let mut inner = self.inner.write();
        let record = inner
            .credentials
            .get_mut(credential_id)
            .ok_or_else(|| missing_credential(credential_id))?;
        if record.status != CredentialStatus::Pending {
            return Ok(false);
        }
        record.status = CredentialStatus::Failed;
        Ok(true)
    }

    fn mark_revoked(&self, credential_id: &str) -> StoreResult<bool> {
        let mut inner = self.inner.write();
        let record = inner
            .credentials
            .get_mut(credential_id)
            .ok_or_else(|| missing_credential(credential_id))?;
        if record.status != CredentialStatus::Minted {
            return Ok(false);
        }
        record.status = CredentialStatus::Revoked;
        Ok(true)
    }

    fn set_credential_asset(
        &self,
        credential_id: &str,
        asset_id: Address,
        leaf_index: u32,
    ) -> StoreResult<()> {
        let mut inner = self.inner.write();
        let record = inner
            .credentials
            .get_mut(credential_id)
            .ok_or_else(|| missing_credential(credential_id))?;
        record.asset_id = Some(asset_id);
        record.leaf_index = Some(leaf_index);
        Ok(())
    }

    fn append_mint_audit(&self, entry: &MintAuditEntry) -> StoreResult<bool> {
        let mut inner = self.inner.write();
        let exists = inner.mint_audit.iter().any(|e| {
            e.credential_number == entry.credential_number
                && e.institution_id == entry.institution_id
        });
        if exists {
            return Ok(false);
        }
        inner.mint_audit.push(entry.clone());
        Ok(true)
    }

    fn append_revocation(&self, entry: &RevocationEntry) -> StoreResult<bool> {
        let mut inner = self.inner.write();
        let exists = inner.revocations.iter().any(|e| {
            e.credential_number == entry.credential_number
                && e.institution_id == entry.institution_id
        });
        if exists {
            return Ok(false);
        }
        inner.revocations.push(entry.clone());
        Ok(true)
    }

    fn mint_audit(&self, institution_id: &str) -> StoreResult<Vec<MintAuditEntry>> {
        Ok(self
            .inner
            .read()
            .mint_audit
            .iter()
            .filter(|e| e.institution_id == institution_id)
            .cloned()
            .collect())
    }

    fn revocations(&self, institution_id: &str) -> StoreResult<Vec<RevocationEntry>> {
        Ok(self
            .inner
            .read()
            .revocations
            .iter()
            .filter(|e| e.institution_id == institution_id)
            .cloned()
            .collect())
    }
}

use std::fmt::{Debug, Formatter};
use std::str::FromStr;
use std::sync::Arc;

use solana_program::pubkey::Pubkey;

use credmint_core::config::{validate_config, EngineConfig};
use credmint_core::model::{Address, CredentialRecord, InstitutionProfile, InstitutionStatus};
use credmint_core::{CredmintError, CredmintResult};
use credmint_solana_client::{to_pubkey, LedgerClient, ProgramClient, ProofSource};
use credmint_store::LocalStore;

use crate::content::ContentPublisher;
use crate::resolver::PrerequisiteResolver;

/// Request-scoped workflow engine over the ledger, indexer, store and publisher ports.
///
/// Holds no per-request state; every call reads what it needs from the store
/// and the ledger.
pub struct Engine {
    pub(crate) config: EngineConfig,
    pub(crate) program_id: Pubkey,
    pub(crate) super_authority: Option<Address>,
    pub(crate) ledger: Arc<dyn LedgerClient>,
    pub(crate) proofs: Arc<dyn ProofSource>,
    pub(crate) store: Arc<dyn LocalStore>,
    pub(crate) publisher: Arc<dyn ContentPublisher>,
}

impl Debug for Engine {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("program_id", &self.program_id)
            .field("super_authority", &self.super_authority)
            .finish_non_exhaustive()
    }
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        ledger: Arc<dyn LedgerClient>,
        proofs: Arc<dyn ProofSource>,
        store: Arc<dyn LocalStore>,
        publisher: Arc<dyn ContentPublisher>,
    ) -> CredmintResult<Self> {
        validate_config(&config)?;
        let program_id = Pubkey::from_str(&config.program.program_id)
            .map_err(|e| CredmintError::validation("config", format!("program_id: {e}")))?;
        let super_authority = config
            .program
            .super_authority
            .as_deref()
            .map(Address::from_str)
            .transpose()
            .map_err(|e| CredmintError::validation("config", format!("super_authority: {e}")))?;

        Ok(Self {
            config,
            program_id,
            super_authority,
            ledger,
            proofs,
            store,
            publisher,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn LocalStore {
        self.store.as_ref()
    }

    pub(crate) fn resolver(&self) -> PrerequisiteResolver<'_> {
        PrerequisiteResolver::new(
            self.ledger.as_ref(),
            self.config.tree,
            &self.config.collection,
        )
    }

    /// Instruction builder for an institution. The profile's own
    /// super-authority wins over the configured one.
    pub(crate) fn program_for(
        &self,
        profile: &InstitutionProfile,
        operation: &str,
    ) -> CredmintResult<ProgramClient> {
        let super_authority = profile
            .super_authority
            .or(self.super_authority)
            .ok_or_else(|| {
                CredmintError::precondition(
                    operation,
                    format!("no super-authority known for institution {}", profile.id),
                )
            })?;
        Ok(ProgramClient::new(self.program_id, to_pubkey(&super_authority)))
    }

    pub fn institution(&self, id: &str, operation: &str) -> CredmintResult<InstitutionProfile> {
        self.store
            .get_institution(id)
            .map_err(|e| e.into_credmint(operation))?
            .ok_or_else(|| CredmintError::not_found(operation, format!("institution {id}")))
    }

    pub fn credential(&self, id: &str, operation: &str) -> CredmintResult<CredentialRecord> {
        self.store
            .get_credential(id)
            .map_err(|e| e.into_credmint(operation))?
            .ok_or_else(|| CredmintError::not_found(operation, format!("credential {id}")))
    }

    pub(crate) fn require_approved(
        profile: &InstitutionProfile,
        operation: &str,
    ) -> CredmintResult<()> {
        if !profile.registration.is_set() {
            return Err(CredmintError::precondition(
                operation,
                format!("institution {} is not registered on-chain", profile.id),
            ));
        }
        if profile.status != InstitutionStatus::Approved {
            return Err(CredmintError::precondition(
                operation,
                format!(
                    "institution {} is {}, not approved",
                    profile.id,
                    profile.status.as_str()
                ),
            ));
        }
        Ok(())
    }
}

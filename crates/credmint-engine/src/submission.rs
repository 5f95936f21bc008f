//! Submission of externally signed transactions and reconciliation of local
//! state with confirmed ledger outcomes.
//!
//! Local state only changes after the ledger reports the signature confirmed
//! without error. Every mutation is keyed by the operation metadata produced at
//! preparation time and is safe to apply more than once.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use credmint_core::model::{
    Address, AddressField, InstitutionStatus, MintAuditEntry, OperationMetadata, OperationType,
    RevocationEntry, WorkflowStage,
};
use credmint_core::{CredmintError, CredmintResult};
use credmint_solana_client::transaction::inspect_signed;
use credmint_solana_client::{ConfirmPolicy, SignatureState};
use credmint_store::CasOutcome;

use crate::assembler::encode_error;
use crate::engine::Engine;

const SUBMIT: &str = "submit";
const RECONCILE: &str = "reconcile";
const STATUS: &str = "transaction_status";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    pub signature: String,
    pub stage: WorkflowStage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionState {
    Unknown,
    Pending,
    Confirmed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionStatus {
    pub signature: String,
    pub state: TransactionState,
    /// On-chain error payload when `state` is `failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TransactionStatus {
    fn from_state(signature: &str, state: SignatureState) -> Self {
        let (state, error) = match state {
            SignatureState::Unknown => (TransactionState::Unknown, None),
            SignatureState::Pending => (TransactionState::Pending, None),
            SignatureState::Confirmed => (TransactionState::Confirmed, None),
            SignatureState::Failed(e) => (TransactionState::Failed, Some(e)),
        };
        Self {
            signature: signature.to_string(),
            state,
            error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileOutcome {
    Applied,
    /// The mutation was already in place; nothing changed.
    AlreadyApplied,
    /// A different confirmed value already occupies the slot; nothing changed.
    Conflict,
}

impl From<CasOutcome> for ReconcileOutcome {
    fn from(o: CasOutcome) -> Self {
        match o {
            CasOutcome::Applied => Self::Applied,
            CasOutcome::AlreadyApplied => Self::AlreadyApplied,
            CasOutcome::Conflict => Self::Conflict,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub signature: String,
    pub operation_type: OperationType,
    pub institution_id: String,
    pub stage: WorkflowStage,
    pub outcome: ReconcileOutcome,
    /// True when this call changed local state.
    pub applied: bool,
}

impl Engine {
    /// Forward a signed transaction and wait for confirmation.
    ///
    /// A ledger rejection is `LedgerSubmissionFailed` and is not retried. When
    /// confirmation does not arrive in time the error is retryable and the
    /// caller can reconcile by signature later.
    pub async fn submit(&self, signed_transaction: &[u8]) -> CredmintResult<SubmitReceipt> {
        let summary = inspect_signed(signed_transaction).map_err(|e| encode_error(SUBMIT, e))?;
        if summary.invalid_signatures > 0 {
            return Err(CredmintError::validation(
                SUBMIT,
                format!(
                    "transaction {} has {} missing or invalid signature(s)",
                    summary.signature, summary.invalid_signatures
                ),
            ));
        }

        let signature = self
            .ledger
            .send_raw_transaction(signed_transaction)
            .await
            .map_err(|e| e.into_credmint(SUBMIT))?;
        info!(%signature, fee_payer = %summary.fee_payer, "submitted transaction");

        let policy = ConfirmPolicy::from_config(&self.config.ledger);
        let state = self
            .ledger
            .confirm_transaction(&signature, policy)
            .await
            .map_err(|e| e.into_credmint(SUBMIT))?;
        match state {
            SignatureState::Confirmed => {
                info!(%signature, "transaction confirmed");
                Ok(SubmitReceipt {
                    signature,
                    stage: WorkflowStage::Submitted,
                })
            }
            SignatureState::Failed(error) => {
                warn!(%signature, %error, "transaction failed on-chain");
                Err(CredmintError::submission(SUBMIT, signature, error))
            }
            SignatureState::Unknown | SignatureState::Pending => Err(CredmintError::unavailable(
                SUBMIT,
                format!(
                    "transaction {signature} not confirmed within {}ms; reconcile it by signature once it lands",
                    self.config.ledger.confirm_timeout_ms
                ),
            )),
        }
    }

    pub async fn transaction_status(&self, signature: &str) -> CredmintResult<TransactionStatus> {
        let state = self
            .ledger
            .signature_status_with_history(signature)
            .await
            .map_err(|e| e.into_credmint(STATUS))?;
        Ok(TransactionStatus::from_state(signature, state))
    }

    /// Apply the local mutation for a confirmed operation.
    ///
    /// Uses only the metadata returned at preparation time, so replaying the
    /// same triple is harmless.
    pub async fn reconcile(
        &self,
        signature: &str,
        operation_type: OperationType,
        metadata: &OperationMetadata,
    ) -> CredmintResult<Ack> {
        check_metadata(operation_type, metadata)?;

        match self
            .ledger
            .signature_status_with_history(signature)
            .await
            .map_err(|e| e.into_credmint(RECONCILE))?
        {
            SignatureState::Confirmed => {}
            SignatureState::Failed(error) => {
                self.record_rejection(metadata);
                return Err(CredmintError::submission(RECONCILE, signature, error));
            }
            state @ (SignatureState::Unknown | SignatureState::Pending) => {
                return Err(CredmintError::unavailable(
                    RECONCILE,
                    format!("transaction {signature} is not confirmed yet ({state:?})"),
                ));
            }
        }

        let outcome = match metadata {
            OperationMetadata::RegisterInstitution {
                institution_id,
                registration,
                ..
            } => self.set_address(institution_id, AddressField::Registration, None, *registration)?,
            OperationMetadata::ApproveInstitution { institution_id, .. } => self
                .store
                .compare_and_set_status(
                    institution_id,
                    InstitutionStatus::Pending,
                    InstitutionStatus::Approved,
                )
                .map_err(|e| e.into_credmint(RECONCILE))?
                .into(),
            OperationMetadata::CreateTree {
                institution_id,
                tree,
                previous,
                ..
            } => self.set_address(institution_id, AddressField::Tree, *previous, *tree)?,
            OperationMetadata::CreateCollection {
                institution_id,
                collection,
                previous,
                ..
            } => self.set_address(institution_id, AddressField::Collection, *previous, *collection)?,
            OperationMetadata::CreateLookupTable {
                institution_id,
                lookup_table,
                previous,
            } => self.set_address(
                institution_id,
                AddressField::LookupTable,
                *previous,
                *lookup_table,
            )?,
            OperationMetadata::MintCredential {
                institution_id,
                credential_id,
                credential_number,
                recipient,
                tree,
                content_uri,
                ..
            } => {
                let minted = self
                    .store
                    .mark_minted(credential_id, signature)
                    .map_err(|e| e.into_credmint(RECONCILE))?;
                let recorded = self
                    .store
                    .append_mint_audit(&MintAuditEntry {
                        credential_number: credential_number.clone(),
                        institution_id: institution_id.clone(),
                        credential_id: credential_id.clone(),
                        signature: signature.to_string(),
                        recipient: *recipient,
                        tree: *tree,
                        recorded_at: OffsetDateTime::now_utc(),
                    })
                    .map_err(|e| e.into_credmint(RECONCILE))?;
                self.enrich_mint(credential_id, recipient, tree, content_uri)
                    .await;
                if minted || recorded {
                    ReconcileOutcome::Applied
                } else {
                    ReconcileOutcome::AlreadyApplied
                }
            }
            OperationMetadata::BurnCredential {
                institution_id,
                credential_id,
                credential_number,
                asset_id,
                reason,
            } => {
                let revoked = self
                    .store
                    .mark_revoked(credential_id)
                    .map_err(|e| e.into_credmint(RECONCILE))?;
                let recorded = self
                    .store
                    .append_revocation(&RevocationEntry {
                        credential_number: credential_number.clone(),
                        institution_id: institution_id.clone(),
                        credential_id: credential_id.clone(),
                        asset_id: *asset_id,
                        reason: reason.clone(),
                        signature: signature.to_string(),
                        revoked_at: OffsetDateTime::now_utc(),
                    })
                    .map_err(|e| e.into_credmint(RECONCILE))?;
                if revoked || recorded {
                    ReconcileOutcome::Applied
                } else {
                    ReconcileOutcome::AlreadyApplied
                }
            }
        };

        if outcome == ReconcileOutcome::Conflict {
            warn!(
                signature,
                operation_type = %operation_type,
                institution_id = metadata.institution_id(),
                "confirmed operation conflicts with stored state, left unchanged"
            );
        } else {
            info!(
                signature,
                operation_type = %operation_type,
                institution_id = metadata.institution_id(),
                ?outcome,
                "reconciled"
            );
        }

        Ok(Ack {
            signature: signature.to_string(),
            operation_type,
            institution_id: metadata.institution_id().to_string(),
            stage: WorkflowStage::Confirmed,
            outcome,
            applied: outcome == ReconcileOutcome::Applied,
        })
    }

    /// Submit, then reconcile on confirmation. A rejected mint marks the
    /// credential failed.
    pub async fn submit_and_reconcile(
        &self,
        signed_transaction: &[u8],
        operation_type: OperationType,
        metadata: &OperationMetadata,
    ) -> CredmintResult<Ack> {
        check_metadata(operation_type, metadata)?;
        match self.submit(signed_transaction).await {
            Ok(receipt) => {
                self.reconcile(&receipt.signature, operation_type, metadata)
                    .await
            }
            Err(e @ CredmintError::LedgerSubmissionFailed { .. }) => {
                self.record_rejection(metadata);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    fn set_address(
        &self,
        institution_id: &str,
        field: AddressField,
        expected: Option<Address>,
        new: Address,
    ) -> CredmintResult<ReconcileOutcome> {
        let outcome = self
            .store
            .compare_and_set_address(institution_id, field, expected, new)
            .map_err(|e| e.into_credmint(RECONCILE))?;
        debug!(
            institution_id,
            field = field.as_str(),
            %new,
            outcome = outcome.as_str(),
            "address compare-and-set"
        );
        Ok(outcome.into())
    }

    fn record_rejection(&self, metadata: &OperationMetadata) {
        if let OperationMetadata::MintCredential { credential_id, .. } = metadata {
            match self.store.mark_failed(credential_id) {
                Ok(true) => info!(credential_id, "mint rejected, credential marked failed"),
                Ok(false) => {}
                Err(e) => warn!(credential_id, error = %e, "could not mark credential failed"),
            }
        }
    }

    /// Look up the minted asset id and leaf index. A miss leaves the credential
    /// minted with its identifier pending.
    async fn enrich_mint(
        &self,
        credential_id: &str,
        recipient: &Address,
        tree: &Address,
        content_uri: &str,
    ) {
        match self.store.get_credential(credential_id) {
            Ok(Some(record)) if record.asset_id.is_some() => return,
            Ok(_) => {}
            Err(e) => {
                warn!(credential_id, error = %e, "could not read credential for enrichment");
                return;
            }
        }

        match self
            .proofs
            .find_minted_asset(recipient, tree, Some(content_uri))
            .await
        {
            Ok(Some(asset)) => {
                match self
                    .store
                    .set_credential_asset(credential_id, asset.asset_id, asset.leaf_index)
                {
                    Ok(()) => info!(
                        credential_id,
                        asset_id = %asset.asset_id,
                        leaf_index = asset.leaf_index,
                        "recorded minted asset"
                    ),
                    Err(e) => warn!(credential_id, error = %e, "could not record minted asset"),
                }
            }
            Ok(None) => warn!(
                credential_id,
                %tree,
                "minted asset not indexed yet, identifier pending"
            ),
            Err(e) => warn!(
                credential_id,
                error = %e,
                "asset lookup failed, identifier pending"
            ),
        }
    }
}

fn check_metadata(operation_type: OperationType, metadata: &OperationMetadata) -> CredmintResult<()> {
    if metadata.operation_type() != operation_type {
        return Err(CredmintError::validation(
            RECONCILE,
            format!(
                "metadata is for {}, not {}",
                metadata.operation_type(),
                operation_type
            ),
        ));
    }
    Ok(())
}

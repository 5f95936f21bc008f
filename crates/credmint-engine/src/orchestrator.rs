//! One `prepare_*` operation per business intent.
//!
//! Preparation validates its input before touching the network, reads the
//! store and the ledger, and returns unsigned operations. It writes nothing
//! except the placeholder-guarded content reference of a credential.

use serde::{Deserialize, Serialize};
use solana_sdk::signature::{Keypair, Signer};
use tracing::{debug, info, warn};

use credmint_core::document::CredentialDocument;
use credmint_core::limits::{
    check_len, check_non_empty, is_placeholder, truncate_bytes, validate_burn_reason,
    CREDENTIAL_NAME_MAX, CREDENTIAL_URI_MAX, INSTITUTION_NAME_MAX, INSTITUTION_URI_MAX,
};
use credmint_core::model::{
    AccountCreated, Address, CredentialRecord, CredentialStatus, InstitutionProfile,
    InstitutionStatus, OperationMetadata, UnsignedOperation, WorkflowStage,
};
use credmint_core::{CredmintError, CredmintResult, ErrorKind};
use credmint_solana_client::tree::tree_account_size;
use credmint_solana_client::{to_address, to_pubkey, ProgramClient};

use crate::assembler::{assemble, lookup_table_account};
use crate::engine::Engine;
use crate::resolver::{CollectionParams, Prerequisite, TreeParams};

const REGISTER: &str = "register_institution";
const APPROVE: &str = "approve_institution";
const CREATE_TREE: &str = "create_tree";
const CREATE_COLLECTION: &str = "create_collection";
const CREATE_LOOKUP_TABLE: &str = "create_lookup_table";
const MINT: &str = "mint_credential";
const BURN: &str = "burn_credential";

/// Result of `prepare_mint_workflow`. `mint` is set only when there are no prerequisites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintWorkflow {
    pub credential_id: String,
    pub stage: WorkflowStage,
    pub prerequisites: Vec<UnsignedOperation>,
    pub mint: Option<UnsignedOperation>,
}

/// Result of `prepare_burn_workflow`. `burn` is set only when there are no prerequisites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurnWorkflow {
    pub credential_id: String,
    pub stage: WorkflowStage,
    pub prerequisites: Vec<UnsignedOperation>,
    pub burn: Option<UnsignedOperation>,
}

fn builder_error(operation: &str, e: anyhow::Error) -> CredmintError {
    CredmintError::validation(operation, format!("{e:#}"))
}

impl Engine {
    pub async fn prepare_register_institution(
        &self,
        institution_id: &str,
    ) -> CredmintResult<UnsignedOperation> {
        let profile = self.institution(institution_id, REGISTER)?;
        check_non_empty(REGISTER, "name", &profile.name)?;
        check_len(REGISTER, "name", &profile.name, INSTITUTION_NAME_MAX)?;
        let metadata_uri = profile
            .website
            .as_deref()
            .map(str::trim)
            .filter(|w| !w.is_empty());
        if let Some(uri) = metadata_uri {
            check_len(REGISTER, "website", uri, INSTITUTION_URI_MAX)?;
        }
        if profile.registration.is_set() {
            return Err(CredmintError::precondition(
                REGISTER,
                format!("institution {institution_id} is already registered"),
            ));
        }

        let program = self.program_for(&profile, REGISTER)?;
        let authority = to_pubkey(&profile.authority);
        let built = program
            .ix_register_institution(authority, &profile.name, metadata_uri)
            .map_err(|e| builder_error(REGISTER, e))?;
        let registration = to_address(&built.institution.university);

        let assembled = assemble(
            self.ledger.as_ref(),
            REGISTER,
            &[built.instruction],
            &authority,
            &[],
            &[],
        )
        .await?;

        info!(institution_id, %registration, "prepared institution registration");
        Ok(assembled.into_operation(
            OperationMetadata::RegisterInstitution {
                institution_id: institution_id.to_string(),
                authority: profile.authority,
                registration,
            },
            format!("Register {} on-chain", profile.name),
            vec![AccountCreated::new("university", registration)],
        ))
    }

    /// Signed and paid for by the super-authority.
    pub async fn prepare_approve_institution(
        &self,
        institution_id: &str,
    ) -> CredmintResult<UnsignedOperation> {
        let profile = self.institution(institution_id, APPROVE)?;
        let registration = profile.registration.address().ok_or_else(|| {
            CredmintError::precondition(
                APPROVE,
                format!("institution {institution_id} is not registered on-chain"),
            )
        })?;
        if profile.status != InstitutionStatus::Pending {
            return Err(CredmintError::precondition(
                APPROVE,
                format!(
                    "institution {institution_id} is {}, not pending",
                    profile.status.as_str()
                ),
            ));
        }

        let program = self.program_for(&profile, APPROVE)?;
        let built = program
            .ix_approve_institution(to_pubkey(&profile.authority))
            .map_err(|e| builder_error(APPROVE, e))?;
        let assembled = assemble(
            self.ledger.as_ref(),
            APPROVE,
            &[built.instruction],
            &program.super_admin,
            &[],
            &[],
        )
        .await?;

        info!(institution_id, "prepared institution approval");
        Ok(assembled.into_operation(
            OperationMetadata::ApproveInstitution {
                institution_id: institution_id.to_string(),
                registration,
            },
            format!("Approve {}", profile.name),
            Vec::new(),
        ))
    }

    /// Create a compression tree with explicit parameters, or the configured defaults.
    pub async fn prepare_create_tree(
        &self,
        institution_id: &str,
        params: Option<TreeParams>,
    ) -> CredmintResult<UnsignedOperation> {
        let params = params.unwrap_or_else(|| self.config.tree.into());
        params.validate(CREATE_TREE)?;
        let profile = self.institution(institution_id, CREATE_TREE)?;
        Self::require_approved(&profile, CREATE_TREE)?;
        let program = self.program_for(&profile, CREATE_TREE)?;
        self.build_create_tree(&profile, &program, params).await
    }

    /// Create the institution's collection with explicit parameters, or defaults
    /// derived from the profile.
    pub async fn prepare_create_collection(
        &self,
        institution_id: &str,
        params: Option<CollectionParams>,
    ) -> CredmintResult<UnsignedOperation> {
        let profile = self.institution(institution_id, CREATE_COLLECTION)?;
        let params = params
            .unwrap_or_else(|| CollectionParams::defaults_for(&profile, &self.config.collection));
        params.validate(CREATE_COLLECTION)?;
        Self::require_approved(&profile, CREATE_COLLECTION)?;
        let program = self.program_for(&profile, CREATE_COLLECTION)?;
        self.build_create_collection(&profile, &program, params)
            .await
    }

    /// Prerequisites first; the mint itself only once the tree and collection
    /// are live on the ledger.
    pub async fn prepare_mint_workflow(&self, credential_id: &str) -> CredmintResult<MintWorkflow> {
        let record = self.credential(credential_id, MINT)?;
        match record.status {
            CredentialStatus::Pending | CredentialStatus::Failed => {}
            CredentialStatus::Minted | CredentialStatus::Revoked => {
                return Err(CredmintError::precondition(
                    MINT,
                    format!(
                        "credential {credential_id} is already {}",
                        record.status.as_str()
                    ),
                ));
            }
        }
        check_non_empty(MINT, "title", &record.title)?;
        check_non_empty(MINT, "credential number", &record.credential_number)?;

        let profile = self.institution(&record.institution_id, MINT)?;
        Self::require_approved(&profile, MINT)?;
        let program = self.program_for(&profile, MINT)?;

        let missing = self.resolver().resolve(&profile).await;
        if !missing.is_empty() {
            let mut prerequisites = Vec::with_capacity(missing.len());
            for step in missing {
                let op = match step {
                    Prerequisite::CreateTree(params) => {
                        self.build_create_tree(&profile, &program, params).await?
                    }
                    Prerequisite::CreateCollection(params) => {
                        params.validate(CREATE_COLLECTION)?;
                        self.build_create_collection(&profile, &program, params)
                            .await?
                    }
                };
                prerequisites.push(op);
            }
            info!(
                credential_id,
                institution_id = %profile.id,
                prerequisites = prerequisites.len(),
                "mint waiting on prerequisites"
            );
            return Ok(MintWorkflow {
                credential_id: credential_id.to_string(),
                stage: WorkflowStage::PrerequisitesPending,
                prerequisites,
                mint: None,
            });
        }

        let tree = slot_address(profile.tree.address(), &profile, "tree", MINT)?;
        let collection = slot_address(profile.collection.address(), &profile, "collection", MINT)?;
        let content_uri = self.resolve_content(&record, &profile).await?;

        let authority = to_pubkey(&profile.authority);
        let built = program
            .ix_mint_credential(
                authority,
                to_pubkey(&tree),
                to_pubkey(&collection),
                to_pubkey(&record.recipient),
                truncate_bytes(&record.title, CREDENTIAL_NAME_MAX),
                &content_uri,
            )
            .map_err(|e| builder_error(MINT, e))?;
        let assembled = assemble(
            self.ledger.as_ref(),
            MINT,
            &[built.instruction],
            &authority,
            &[],
            &[],
        )
        .await?;

        info!(credential_id, institution_id = %profile.id, "prepared mint");
        let mint = assembled.into_operation(
            OperationMetadata::MintCredential {
                institution_id: profile.id.clone(),
                credential_id: record.id.clone(),
                credential_number: record.credential_number.clone(),
                recipient: record.recipient,
                tree,
                collection,
                content_uri,
            },
            format!(
                "Mint {} for {}",
                record.credential_number, record.student_name
            ),
            Vec::new(),
        );
        Ok(MintWorkflow {
            credential_id: credential_id.to_string(),
            stage: WorkflowStage::TerminalOperationReady,
            prerequisites: Vec::new(),
            mint: Some(mint),
        })
    }

    /// A lookup table precedes every burn; the burn proof is fetched fresh.
    pub async fn prepare_burn_workflow(
        &self,
        credential_id: &str,
        reason: &str,
    ) -> CredmintResult<BurnWorkflow> {
        validate_burn_reason(reason)?;
        let record = self.credential(credential_id, BURN)?;
        if record.status != CredentialStatus::Minted {
            return Err(CredmintError::precondition(
                BURN,
                format!(
                    "credential {credential_id} is {}, not minted",
                    record.status.as_str()
                ),
            ));
        }
        let asset_id = record.asset_id.ok_or_else(|| {
            CredmintError::precondition(
                BURN,
                format!("credential {credential_id} has no asset id yet; reconcile its mint"),
            )
        })?;
        let profile = self.institution(&record.institution_id, BURN)?;
        let tree = slot_address(profile.tree.address(), &profile, "tree", BURN)?;
        let collection = slot_address(profile.collection.address(), &profile, "collection", BURN)?;
        let program = self.program_for(&profile, BURN)?;

        let resolver = self.resolver();
        let table = match resolver.lookup_table(&profile, BURN).await {
            Ok(Some(table)) => Some(table),
            Ok(None) => {
                let prerequisite = self
                    .build_lookup_table(&profile, &program, tree, collection)
                    .await?;
                info!(credential_id, institution_id = %profile.id, "burn waiting on lookup table");
                return Ok(BurnWorkflow {
                    credential_id: credential_id.to_string(),
                    stage: WorkflowStage::PrerequisitesPending,
                    prerequisites: vec![prerequisite],
                    burn: None,
                });
            }
            Err(e) => {
                warn!(
                    credential_id,
                    institution_id = %profile.id,
                    error = %e,
                    "lookup table unavailable, assembling burn without it"
                );
                None
            }
        };

        let geometry = resolver.tree_geometry(&tree, BURN).await?;
        let proof = self
            .proofs
            .fetch_proof(&asset_id, Some(geometry.canopy_depth))
            .await
            .map_err(|e| e.into_credmint(BURN))?
            .ok_or_else(|| CredmintError::not_found(BURN, format!("proof for asset {asset_id}")))?;
        if proof.tree != tree {
            return Err(CredmintError::precondition(
                BURN,
                format!(
                    "asset {asset_id} lives in tree {}, institution tree is {tree}",
                    proof.tree
                ),
            ));
        }
        debug!(
            credential_id,
            %asset_id,
            leaf_index = proof.leaf_index,
            nodes = proof.proof.len(),
            canopy_depth = geometry.canopy_depth,
            "fetched burn proof"
        );

        let authority = to_pubkey(&profile.authority);
        let built = program
            .ix_burn_credential(authority, to_pubkey(&collection), &proof, reason)
            .map_err(|e| builder_error(BURN, e))?;
        let tables: Vec<_> = table.iter().map(lookup_table_account).collect();
        let assembled = match assemble(
            self.ledger.as_ref(),
            BURN,
            &[built.instruction],
            &authority,
            &[],
            &tables,
        )
        .await
        {
            Ok(assembled) => assembled,
            Err(e) if table.is_none() && e.kind() == ErrorKind::ValidationFailed => {
                return Err(CredmintError::unavailable(
                    BURN,
                    format!("lookup table could not be resolved and the burn does not fit without it: {e}"),
                ));
            }
            Err(e) => return Err(e),
        };

        info!(credential_id, %asset_id, with_lookup_table = table.is_some(), "prepared burn");
        let burn = assembled.into_operation(
            OperationMetadata::BurnCredential {
                institution_id: profile.id.clone(),
                credential_id: record.id.clone(),
                credential_number: record.credential_number.clone(),
                asset_id,
                reason: reason.to_string(),
            },
            format!("Revoke {}", record.credential_number),
            Vec::new(),
        );
        Ok(BurnWorkflow {
            credential_id: credential_id.to_string(),
            stage: WorkflowStage::TerminalOperationReady,
            prerequisites: Vec::new(),
            burn: Some(burn),
        })
    }

    async fn build_create_tree(
        &self,
        profile: &InstitutionProfile,
        program: &ProgramClient,
        params: TreeParams,
    ) -> CredmintResult<UnsignedOperation> {
        let tree_keypair = Keypair::new();
        let merkle_tree = tree_keypair.pubkey();
        let authority = to_pubkey(&profile.authority);

        let space = tree_account_size(params.max_depth, params.max_buffer_size, params.canopy_depth);
        let lamports = self
            .ledger
            .minimum_balance(space)
            .await
            .map_err(|e| e.into_credmint(CREATE_TREE))?;

        let allocate = program.ix_allocate_tree(authority, merkle_tree, lamports, space as u64);
        let built = program
            .ix_create_tree(
                authority,
                merkle_tree,
                params.max_depth,
                params.max_buffer_size,
                params.is_public,
            )
            .map_err(|e| builder_error(CREATE_TREE, e))?;
        let tree_pdas = program.tree_pdas(&merkle_tree);

        let assembled = assemble(
            self.ledger.as_ref(),
            CREATE_TREE,
            &[allocate, built.instruction],
            &authority,
            &[&tree_keypair],
            &[],
        )
        .await?;

        let tree = to_address(&merkle_tree);
        info!(institution_id = %profile.id, %tree, space, lamports, "prepared tree creation");
        Ok(assembled.into_operation(
            OperationMetadata::CreateTree {
                institution_id: profile.id.clone(),
                tree,
                previous: profile.tree.address(),
                max_depth: params.max_depth,
                max_buffer_size: params.max_buffer_size,
                canopy_depth: params.canopy_depth,
            },
            format!(
                "Create credential tree for {} ({} leaves)",
                profile.name,
                1u64 << params.max_depth
            ),
            vec![
                AccountCreated::new("merkle_tree", tree),
                AccountCreated::new("tree_config", to_address(&tree_pdas.tree_config)),
                AccountCreated::new("university_tree", to_address(&tree_pdas.university_tree)),
            ],
        ))
    }

    async fn build_create_collection(
        &self,
        profile: &InstitutionProfile,
        program: &ProgramClient,
        params: CollectionParams,
    ) -> CredmintResult<UnsignedOperation> {
        let collection_keypair = Keypair::new();
        let core_collection = collection_keypair.pubkey();
        let authority = to_pubkey(&profile.authority);

        let built = program
            .ix_create_collection(authority, core_collection, &params.name, &params.uri)
            .map_err(|e| builder_error(CREATE_COLLECTION, e))?;
        let assembled = assemble(
            self.ledger.as_ref(),
            CREATE_COLLECTION,
            &[built.instruction],
            &authority,
            &[&collection_keypair],
            &[],
        )
        .await?;

        let collection = to_address(&core_collection);
        info!(institution_id = %profile.id, %collection, "prepared collection creation");
        Ok(assembled.into_operation(
            OperationMetadata::CreateCollection {
                institution_id: profile.id.clone(),
                collection,
                previous: profile.collection.address(),
                name: params.name.clone(),
                uri: params.uri,
            },
            format!("Create collection {}", params.name),
            vec![
                AccountCreated::new("collection", collection),
                AccountCreated::new(
                    "university_collection",
                    to_address(&built.institution.university_collection),
                ),
            ],
        ))
    }

    async fn build_lookup_table(
        &self,
        profile: &InstitutionProfile,
        program: &ProgramClient,
        tree: Address,
        collection: Address,
    ) -> CredmintResult<UnsignedOperation> {
        let authority = to_pubkey(&profile.authority);
        let recent_slot = self
            .ledger
            .get_slot()
            .await
            .map_err(|e| e.into_credmint(CREATE_LOOKUP_TABLE))?;
        let addresses =
            program.burn_lookup_addresses(&authority, &to_pubkey(&tree), &to_pubkey(&collection));
        let entries = addresses.len();
        let (instructions, table) =
            program.ix_create_lookup_table(authority, recent_slot, addresses);

        let assembled = assemble(
            self.ledger.as_ref(),
            CREATE_LOOKUP_TABLE,
            &instructions,
            &authority,
            &[],
            &[],
        )
        .await?;

        let lookup_table = to_address(&table);
        info!(institution_id = %profile.id, %lookup_table, entries, "prepared lookup table creation");
        Ok(assembled.into_operation(
            OperationMetadata::CreateLookupTable {
                institution_id: profile.id.clone(),
                lookup_table,
                previous: profile.lookup_table.address(),
            },
            format!("Create address lookup table for {}", profile.name),
            vec![AccountCreated::new("lookup_table", lookup_table)],
        ))
    }

    /// Stored content reference, or a freshly published document stored
    /// through the placeholder guard.
    ///
    /// A published reference too long for the mint instruction is rejected
    /// before it reaches the store, so the record keeps its placeholder.
    async fn resolve_content(
        &self,
        record: &CredentialRecord,
        profile: &InstitutionProfile,
    ) -> CredmintResult<String> {
        if !is_placeholder(record.content_uri.as_deref()) {
            let existing = record.content_uri.clone().unwrap_or_default();
            check_len(MINT, "content uri", &existing, CREDENTIAL_URI_MAX)?;
            return Ok(existing);
        }

        let document =
            CredentialDocument::build(record, &profile.name, &self.config.content.default_image);
        let published = self.publisher.publish(&document).await?;
        check_len(MINT, "content uri", &published, CREDENTIAL_URI_MAX)?;
        let stored = self
            .store
            .set_content_if_placeholder(&record.id, &published)
            .map_err(|e| e.into_credmint(MINT))?;
        if stored != published {
            debug!(credential_id = %record.id, %stored, "content reference already set, keeping it");
        }
        Ok(stored)
    }
}

fn slot_address(
    slot: Option<Address>,
    profile: &InstitutionProfile,
    what: &str,
    operation: &str,
) -> CredmintResult<Address> {
    slot.ok_or_else(|| {
        CredmintError::precondition(
            operation,
            format!("institution {} has no confirmed {what}", profile.id),
        )
    })
}

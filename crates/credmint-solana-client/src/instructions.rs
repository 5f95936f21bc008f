//! Instruction builders for the credential program.
//!
//! Every builder is pure: it derives the PDAs it needs, encodes the arguments
//! and returns the instruction together with the addresses a caller may want to
//! record. Instruction data is an 8-byte Anchor discriminator
//! (`sha256("global:<name>")[..8]`) followed by the borsh-encoded arguments.
//!
//! Field limits are the caller's responsibility (see `credmint_core::limits`);
//! the builders encode what they are given.

use anyhow::{anyhow, Result};
use borsh::BorshSerialize;
use sha2::{Digest, Sha256};
use solana_program::instruction::{AccountMeta, Instruction};
use solana_program::pubkey::Pubkey;
use solana_program::address_lookup_table::instruction as alt_instruction;

use credmint_core::model::ProofBundle;

use crate::constants::{
    bubblegum_program_id, compression_program_id, mpl_core_cpi_signer, mpl_core_program_id,
    noop_program_id,
};
use crate::convert::to_pubkey;
use crate::pda::{self, InstitutionPdas, TreePdas};

/// An instruction plus the derived addresses it touches.
#[derive(Debug, Clone)]
pub struct BuiltInstruction {
    pub instruction: Instruction,
    pub institution: InstitutionPdas,
    pub tree: Option<TreePdas>,
}

#[derive(Debug, Clone, BorshSerialize)]
struct RegisterUniversityArgs {
    name: String,
    metadata_uri: Option<String>,
}

#[derive(Debug, Clone, BorshSerialize)]
struct CreateTreeV2Args {
    max_depth: u32,
    max_buffer_size: u32,
    is_public: bool,
}

#[derive(Debug, Clone, BorshSerialize)]
struct CreateCoreCollectionV2Args {
    name: String,
    uri: String,
}

#[derive(Debug, Clone, BorshSerialize)]
struct MintCertificateArgs {
    name: String,
    uri: String,
    recipient: [u8; 32],
    attach_collection: bool,
}

#[derive(Debug, Clone, BorshSerialize)]
struct BurnCertificateArgs {
    root: [u8; 32],
    data_hash: [u8; 32],
    creator_hash: [u8; 32],
    nonce: u64,
    index: u32,
    asset_data_hash: Option<[u8; 32]>,
    flags: Option<u8>,
    reason: String,
}

/// Anchor instruction discriminator.
pub fn discriminator(name: &str) -> [u8; 8] {
    let digest = Sha256::digest(format!("global:{name}").as_bytes());
    let mut out = [0u8; 8];
    out.copy_from_slice(&digest[..8]);
    out
}

fn encode<T: BorshSerialize>(name: &str, args: Option<&T>) -> Result<Vec<u8>> {
    let mut data = discriminator(name).to_vec();
    if let Some(args) = args {
        let payload = borsh::to_vec(args).map_err(|e| anyhow!("serialize {name}: {e}"))?;
        data.extend_from_slice(&payload);
    }
    Ok(data)
}

/// Builder bound to one deployment of the credential program.
#[derive(Debug, Clone, Copy)]
pub struct ProgramClient {
    pub program_id: Pubkey,
    /// Platform wallet that owns the global config.
    pub super_admin: Pubkey,
}

impl ProgramClient {
    pub fn new(program_id: Pubkey, super_admin: Pubkey) -> Self {
        Self {
            program_id,
            super_admin,
        }
    }

    pub fn institution_pdas(&self, authority: &Pubkey) -> InstitutionPdas {
        pda::pdas_for_institution(&self.program_id, &self.super_admin, authority)
    }

    pub fn tree_pdas(&self, merkle_tree: &Pubkey) -> TreePdas {
        pda::pdas_for_tree(&self.program_id, merkle_tree)
    }

    /// Register an institution. Signed by the institution authority.
    pub fn ix_register_institution(
        &self,
        authority: Pubkey,
        name: &str,
        metadata_uri: Option<&str>,
    ) -> Result<BuiltInstruction> {
        let pdas = self.institution_pdas(&authority);
        let data = encode(
            "register_university",
            Some(&RegisterUniversityArgs {
                name: name.to_string(),
                metadata_uri: metadata_uri.map(str::to_string),
            }),
        )?;

        Ok(BuiltInstruction {
            instruction: Instruction {
                program_id: self.program_id,
                accounts: vec![
                    AccountMeta::new(authority, true),
                    AccountMeta::new_readonly(pdas.global_config, false),
                    AccountMeta::new(pdas.university, false),
                    AccountMeta::new_readonly(solana_program::system_program::id(), false),
                ],
                data,
            },
            institution: pdas,
            tree: None,
        })
    }

    /// Approve a registered institution. Signed by the super admin.
    pub fn ix_approve_institution(&self, authority: Pubkey) -> Result<BuiltInstruction> {
        let pdas = self.institution_pdas(&authority);
        let data = encode::<()>("approve_university", None)?;

        Ok(BuiltInstruction {
            instruction: Instruction {
                program_id: self.program_id,
                accounts: vec![
                    AccountMeta::new_readonly(self.super_admin, true),
                    AccountMeta::new(pdas.global_config, false),
                    AccountMeta::new_readonly(authority, false),
                    AccountMeta::new(pdas.university, false),
                ],
                data,
            },
            institution: pdas,
            tree: None,
        })
    }

    /// System instruction allocating the concurrent Merkle tree account.
    ///
    /// The tree account must be owned by the compression program before
    /// `create_tree_v2` runs.
    pub fn ix_allocate_tree(
        &self,
        payer: Pubkey,
        merkle_tree: Pubkey,
        lamports: u64,
        space: u64,
    ) -> Instruction {
        solana_program::system_instruction::create_account(
            &payer,
            &merkle_tree,
            lamports,
            space,
            &compression_program_id(),
        )
    }

    /// Initialize a Bubblegum tree owned by the institution.
    pub fn ix_create_tree(
        &self,
        authority: Pubkey,
        merkle_tree: Pubkey,
        max_depth: u32,
        max_buffer_size: u32,
        is_public: bool,
    ) -> Result<BuiltInstruction> {
        let pdas = self.institution_pdas(&authority);
        let tree = self.tree_pdas(&merkle_tree);
        let data = encode(
            "create_tree_v2",
            Some(&CreateTreeV2Args {
                max_depth,
                max_buffer_size,
                is_public,
            }),
        )?;

        Ok(BuiltInstruction {
            instruction: Instruction {
                program_id: self.program_id,
                accounts: vec![
                    AccountMeta::new(authority, true),
                    AccountMeta::new_readonly(pdas.global_config, false),
                    AccountMeta::new_readonly(pdas.university, false),
                    AccountMeta::new(tree.university_tree, false),
                    AccountMeta::new(merkle_tree, true),
                    AccountMeta::new(tree.tree_config, false),
                    AccountMeta::new_readonly(bubblegum_program_id(), false),
                    AccountMeta::new_readonly(compression_program_id(), false),
                    AccountMeta::new_readonly(noop_program_id(), false),
                    AccountMeta::new_readonly(solana_program::system_program::id(), false),
                ],
                data,
            },
            institution: pdas,
            tree: Some(tree),
        })
    }

    /// Create the institution's MPL Core collection.
    pub fn ix_create_collection(
        &self,
        authority: Pubkey,
        core_collection: Pubkey,
        name: &str,
        uri: &str,
    ) -> Result<BuiltInstruction> {
        let pdas = self.institution_pdas(&authority);
        let data = encode(
            "create_core_collection_v2_cpi",
            Some(&CreateCoreCollectionV2Args {
                name: name.to_string(),
                uri: uri.to_string(),
            }),
        )?;

        Ok(BuiltInstruction {
            instruction: Instruction {
                program_id: self.program_id,
                accounts: vec![
                    AccountMeta::new(authority, true),
                    AccountMeta::new_readonly(pdas.global_config, false),
                    AccountMeta::new(pdas.university, false),
                    AccountMeta::new(pdas.university_collection, false),
                    AccountMeta::new(core_collection, true),
                    AccountMeta::new_readonly(mpl_core_program_id(), false),
                    AccountMeta::new_readonly(solana_program::system_program::id(), false),
                ],
                data,
            },
            institution: pdas,
            tree: None,
        })
    }

    /// Mint one compressed credential into the institution's tree and collection.
    pub fn ix_mint_credential(
        &self,
        authority: Pubkey,
        merkle_tree: Pubkey,
        core_collection: Pubkey,
        recipient: Pubkey,
        name: &str,
        uri: &str,
    ) -> Result<BuiltInstruction> {
        let pdas = self.institution_pdas(&authority);
        let tree = self.tree_pdas(&merkle_tree);
        let data = encode(
            "mint_certificate_v2",
            Some(&MintCertificateArgs {
                name: name.to_string(),
                uri: uri.to_string(),
                recipient: recipient.to_bytes(),
                attach_collection: true,
            }),
        )?;

        let mut accounts = self.leaf_accounts(&authority, &pdas, &tree, merkle_tree, core_collection);
        accounts.insert(10, AccountMeta::new_readonly(recipient, false));

        Ok(BuiltInstruction {
            instruction: Instruction {
                program_id: self.program_id,
                accounts,
                data,
            },
            institution: pdas,
            tree: Some(tree),
        })
    }

    /// Burn a compressed credential. The proof nodes are passed as remaining accounts.
    pub fn ix_burn_credential(
        &self,
        authority: Pubkey,
        core_collection: Pubkey,
        proof: &ProofBundle,
        reason: &str,
    ) -> Result<BuiltInstruction> {
        let merkle_tree = to_pubkey(&proof.tree);
        let pdas = self.institution_pdas(&authority);
        let tree = self.tree_pdas(&merkle_tree);
        let data = encode(
            "burn_certificate_v2",
            Some(&BurnCertificateArgs {
                root: proof.root,
                data_hash: proof.data_hash,
                creator_hash: proof.creator_hash,
                nonce: proof.nonce,
                index: proof.leaf_index,
                asset_data_hash: proof.asset_data_hash,
                flags: proof.flags,
                reason: reason.to_string(),
            }),
        )?;

        let mut accounts = self.leaf_accounts(&authority, &pdas, &tree, merkle_tree, core_collection);
        accounts.insert(10, AccountMeta::new_readonly(to_pubkey(&proof.leaf_owner), false));
        accounts.extend(
            proof
                .proof
                .iter()
                .map(|node| AccountMeta::new_readonly(Pubkey::new_from_array(*node), false)),
        );

        Ok(BuiltInstruction {
            instruction: Instruction {
                program_id: self.program_id,
                accounts,
                data,
            },
            institution: pdas,
            tree: Some(tree),
        })
    }

    /// Shared account list of mint and burn, without the leaf owner slot (index 10).
    fn leaf_accounts(
        &self,
        authority: &Pubkey,
        pdas: &InstitutionPdas,
        tree: &TreePdas,
        merkle_tree: Pubkey,
        core_collection: Pubkey,
    ) -> Vec<AccountMeta> {
        vec![
            AccountMeta::new(*authority, true),
            AccountMeta::new_readonly(pdas.global_config, false),
            AccountMeta::new(pdas.university, false),
            AccountMeta::new_readonly(pdas.university_collection, false),
            AccountMeta::new_readonly(tree.university_tree, false),
            AccountMeta::new(merkle_tree, false),
            AccountMeta::new(tree.tree_config, false),
            AccountMeta::new(core_collection, false),
            AccountMeta::new_readonly(mpl_core_program_id(), false),
            AccountMeta::new_readonly(mpl_core_cpi_signer(), false),
            AccountMeta::new_readonly(bubblegum_program_id(), false),
            AccountMeta::new_readonly(compression_program_id(), false),
            AccountMeta::new_readonly(noop_program_id(), false),
            AccountMeta::new_readonly(solana_program::system_program::id(), false),
        ]
    }

    /// Addresses every burn for this institution references, in lookup-table order.
    pub fn burn_lookup_addresses(
        &self,
        authority: &Pubkey,
        merkle_tree: &Pubkey,
        core_collection: &Pubkey,
    ) -> Vec<Pubkey> {
        let pdas = self.institution_pdas(authority);
        let tree = self.tree_pdas(merkle_tree);
        vec![
            *authority,
            pdas.global_config,
            pdas.university,
            pdas.university_collection,
            tree.university_tree,
            *merkle_tree,
            tree.tree_config,
            *core_collection,
            mpl_core_program_id(),
            mpl_core_cpi_signer(),
            bubblegum_program_id(),
            compression_program_id(),
            noop_program_id(),
            solana_program::system_program::id(),
        ]
    }

    /// Create an address lookup table and fill it in the same transaction.
    ///
    /// Returns the instructions and the derived table address.
    pub fn ix_create_lookup_table(
        &self,
        authority: Pubkey,
        recent_slot: u64,
        addresses: Vec<Pubkey>,
    ) -> (Vec<Instruction>, Pubkey) {
        let (create, table) =
            alt_instruction::create_lookup_table(authority, authority, recent_slot);
        let extend =
            alt_instruction::extend_lookup_table(table, authority, Some(authority), addresses);
        (vec![create, extend], table)
    }
}

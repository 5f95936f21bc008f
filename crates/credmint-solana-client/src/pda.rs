//! PDA derivation helpers for the credential program.
//!
//! These helpers match the on-chain program's seeds. The tree config account
//! belongs to Bubblegum, not to the credential program.

use solana_program::pubkey::Pubkey;

use crate::constants::{
    bubblegum_program_id, SEED_COLLECTION, SEED_GLOBAL_CONFIG, SEED_TREE, SEED_UNIVERSITY,
};

/// Accounts every institution-scoped instruction references.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstitutionPdas {
    pub global_config: Pubkey,
    pub university: Pubkey,
    pub university_collection: Pubkey,
}

/// Accounts tied to one compression tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreePdas {
    pub university_tree: Pubkey,
    pub tree_config: Pubkey,
}

pub fn derive_global_config(program_id: &Pubkey, super_admin: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[SEED_GLOBAL_CONFIG, super_admin.as_ref()], program_id)
}

pub fn derive_university(program_id: &Pubkey, authority: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[SEED_UNIVERSITY, authority.as_ref()], program_id)
}

pub fn derive_university_collection(program_id: &Pubkey, university: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[SEED_COLLECTION, university.as_ref()], program_id)
}

pub fn derive_university_tree(program_id: &Pubkey, merkle_tree: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[SEED_TREE, merkle_tree.as_ref()], program_id)
}

/// Bubblegum tree config, seeded by the tree address alone.
pub fn derive_tree_config(merkle_tree: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[merkle_tree.as_ref()], &bubblegum_program_id())
}

pub fn pdas_for_institution(
    program_id: &Pubkey,
    super_admin: &Pubkey,
    authority: &Pubkey,
) -> InstitutionPdas {
    let (global_config, _) = derive_global_config(program_id, super_admin);
    let (university, _) = derive_university(program_id, authority);
    let (university_collection, _) = derive_university_collection(program_id, &university);
    InstitutionPdas {
        global_config,
        university,
        university_collection,
    }
}

pub fn pdas_for_tree(program_id: &Pubkey, merkle_tree: &Pubkey) -> TreePdas {
    TreePdas {
        university_tree: derive_university_tree(program_id, merkle_tree).0,
        tree_config: derive_tree_config(merkle_tree).0,
    }
}

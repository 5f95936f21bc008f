//! Constants shared between the credential program and clients.
//!
//! Keep these stable because they affect PDA derivation.

use solana_program::pubkey::Pubkey;

/// PDA seed for the global config account (`[SEED_GLOBAL_CONFIG, super_admin]`).
pub const SEED_GLOBAL_CONFIG: &[u8] = b"global-config";

/// PDA seed for institution accounts (`[SEED_UNIVERSITY, authority]`).
pub const SEED_UNIVERSITY: &[u8] = b"university";

/// PDA seed for the institution collection record (`[SEED_COLLECTION, university]`).
pub const SEED_COLLECTION: &[u8] = b"university_collection";

/// PDA seed for the institution tree record (`[SEED_TREE, merkle_tree]`).
pub const SEED_TREE: &[u8] = b"university_tree";

/// Default credential program id.
pub const DEFAULT_PROGRAM_ID: &str = credmint_core::config::DEFAULT_PROGRAM_ID;

pub const MPL_CORE_PROGRAM_ID: &str = "CoREENxT6tW1HoK8ypY1SxRMZTcVPm7R94rH4PZNhX7d";
pub const BUBBLEGUM_PROGRAM_ID: &str = "BGUMAp9Gq7iTEuizy4pqaxsTyUCBK68MDfK752saRPUY";
pub const COMPRESSION_PROGRAM_ID: &str = "mcmt6YrQEMKw8Mw43FmpRLmf7BqRnFMKmAcbxE3xkAW";
pub const NOOP_PROGRAM_ID: &str = "mnoopTCrg4p8ry25e4bcWA9XZjbNjMTfgYVGGEdRsf3";

/// Signer Bubblegum uses when it CPIs into MPL Core.
pub const MPL_CORE_CPI_SIGNER: &str = "CbNY3JiXdXNE9tPNEk1aRZVEkWdj2v7kfJLNQwZZgpXk";

pub fn default_program_id() -> Pubkey {
    DEFAULT_PROGRAM_ID.parse().unwrap_or_else(|_| Pubkey::default())
}

pub fn mpl_core_program_id() -> Pubkey {
    MPL_CORE_PROGRAM_ID.parse().unwrap_or_else(|_| Pubkey::default())
}

pub fn bubblegum_program_id() -> Pubkey {
    BUBBLEGUM_PROGRAM_ID.parse().unwrap_or_else(|_| Pubkey::default())
}

pub fn compression_program_id() -> Pubkey {
    COMPRESSION_PROGRAM_ID.parse().unwrap_or_else(|_| Pubkey::default())
}

pub fn noop_program_id() -> Pubkey {
    NOOP_PROGRAM_ID.parse().unwrap_or_else(|_| Pubkey::default())
}

pub fn mpl_core_cpi_signer() -> Pubkey {
    MPL_CORE_CPI_SIGNER.parse().unwrap_or_else(|_| Pubkey::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn program_ids_parse() {
        for id in [
            default_program_id(),
            mpl_core_program_id(),
            bubblegum_program_id(),
            compression_program_id(),
            noop_program_id(),
            mpl_core_cpi_signer(),
        ] {
            assert_ne!(id, Pubkey::default());
        }
    }
}

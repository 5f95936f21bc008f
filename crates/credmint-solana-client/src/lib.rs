//! credmint-solana-client
//!
//! This crate provides the Solana side of credmint: everything that knows
//! about program ids, account layouts or wire formats.
//!
//! It includes:
//! - PDA derivation helpers and program constants
//! - instruction builders for the credential program and lookup tables
//! - concurrent Merkle tree account geometry
//! - transaction encoding with partial signing
//! - the `LedgerClient` port with a Solana RPC adapter
//! - the `ProofSource` port with a DAS indexer adapter
//!
//! Note: the program id and super admin are supplied by the consumer.

pub mod constants;
pub mod convert;
pub mod indexer;
pub mod instructions;
pub mod ledger;
pub mod pda;
pub mod transaction;
pub mod tree;

pub use constants::*;
pub use convert::{to_address, to_pubkey};
pub use indexer::{DasIndexer, IndexerError, MintedAsset, ProofSource};
pub use instructions::{BuiltInstruction, ProgramClient};
pub use ledger::{
    AccountInfo, AddressTable, BlockReference, ConfirmPolicy, LedgerClient, LedgerError,
    SignatureState, SolanaLedgerClient,
};
pub use pda::*;
pub use transaction::{EncodeError, EncodedTransaction, SignedSummary, TxVersion};
pub use tree::{TreeAccountError, TreeGeometry};

//! credmint-engine
//!
//! Turns credential intents into unsigned ledger transactions and, once an
//! external signer returns them, submits and reconciles them.
//!
//! Flow of a request:
//! - `resolver`: which setup steps (tree, collection, lookup table) are missing
//! - `credmint_solana_client::ProgramClient`: instructions for each step
//! - `assembler`: unsigned legacy or v0 transaction with a fresh block reference
//! - `orchestrator`: the `prepare_*` operations tying the above together
//! - `submission`: submit, confirm and reconcile local state
//!
//! The ledger is the source of truth. Local institution addresses change only
//! through compare-and-set after confirmation.

pub mod assembler;
pub mod content;
pub mod engine;
pub mod orchestrator;
pub mod resolver;
pub mod submission;

pub use content::{ContentAddressedPublisher, ContentPublisher};
pub use engine::Engine;
pub use orchestrator::{BurnWorkflow, MintWorkflow};
pub use resolver::{CollectionParams, Prerequisite, TreeParams};
pub use submission::{
    Ack, ReconcileOutcome, SubmitReceipt, TransactionState, TransactionStatus,
};

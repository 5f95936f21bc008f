//! credmint-store
//!
//! Local mirror of ledger-confirmed state.
//!
//! - `LocalStore`: the persistence port used by the engine
//! - `MemoryStore`: in-process implementation, for tests and dry runs
//! - `SqliteStore`: durable implementation (feature `sqlite`, on by default)
//!
//! Address slots change only through compare-and-set. The mint audit log and
//! the revocation index are append-only and unique on
//! `(credential_number, institution_id)`, which makes reconciliation
//! idempotent.

pub mod config;
pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod store;

pub use config::{open_store, StoreBackend, StoreConfig};
pub use memory::MemoryStore;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
pub use store::{CasOutcome, LocalStore, StoreError, StoreResult};

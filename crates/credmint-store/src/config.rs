use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::memory::MemoryStore;
use crate::store::{LocalStore, StoreResult};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreBackend {
    Memory,
    #[cfg(feature = "sqlite")]
    Sqlite { path: PathBuf },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreConfig {
    pub backend: StoreBackend,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
        }
    }
}

#[cfg(feature = "sqlite")]
fn default_backend() -> StoreBackend {
    StoreBackend::Sqlite {
        path: PathBuf::from("credmint.db"),
    }
}

#[cfg(not(feature = "sqlite"))]
fn default_backend() -> StoreBackend {
    StoreBackend::Memory
}

pub fn open_store(config: &StoreConfig) -> StoreResult<Box<dyn LocalStore>> {
    match &config.backend {
        StoreBackend::Memory => Ok(Box::new(MemoryStore::new())),
        #[cfg(feature = "sqlite")]
        StoreBackend::Sqlite { path } => {
            tracing::debug!(path = %path.display(), "opening sqlite store");
            Ok(Box::new(crate::sqlite::SqliteStore::open(path)?))
        }
    }
}

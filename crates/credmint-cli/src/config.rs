use anyhow::Result;
use serde::{Deserialize, Serialize};

use credmint_core::config::{validate_config, EngineConfig};
use credmint_store::{StoreBackend, StoreConfig};

use crate::args::Settings;
use crate::io::input::read_json_file;

/// Config file layout: engine settings at the top level plus a `store` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(flatten)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

impl CliConfig {
    /// Config file first, then flags and environment.
    pub fn load(settings: &Settings) -> Result<Self> {
        let mut cfg: CliConfig = match &settings.config {
            Some(path) => read_json_file(path)?,
            None => CliConfig::default(),
        };

        if let Some(db) = &settings.db {
            cfg.store.backend = StoreBackend::Sqlite { path: db.clone() };
        }
        if let Some(url) = &settings.rpc_url {
            cfg.engine.ledger.rpc_url = url.clone();
        }
        if let Some(url) = &settings.das_url {
            cfg.engine.indexer.url = url.clone();
        }
        if let Some(key) = &settings.das_api_key {
            cfg.engine.indexer.api_key = Some(key.clone());
        }
        if let Some(id) = &settings.program_id {
            cfg.engine.program.program_id = id.clone();
        }
        if let Some(sa) = &settings.super_authority {
            cfg.engine.program.super_authority = Some(sa.clone());
        }

        validate_config(&cfg.engine)?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn flags_override_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credmint.json");
        std::fs::write(
            &path,
            r#"{
                "ledger": { "rpc_url": "http://file:8899" },
                "indexer": { "url": "http://das.file" },
                "store": { "backend": { "kind": "memory" } }
            }"#,
        )
        .unwrap();

        let settings = Settings {
            config: Some(path),
            rpc_url: Some("http://flag:8899".into()),
            ..Settings::default()
        };
        let cfg = CliConfig::load(&settings).unwrap();
        assert_eq!(cfg.engine.ledger.rpc_url, "http://flag:8899");
        assert_eq!(cfg.engine.indexer.url, "http://das.file");
        assert_eq!(cfg.store.backend, StoreBackend::Memory);
        assert_eq!(cfg.engine.tree.max_depth, 14);
    }

    #[test]
    fn db_flag_selects_sqlite() {
        let settings = Settings {
            db: Some(PathBuf::from("x.db")),
            ..Settings::default()
        };
        let cfg = CliConfig::load(&settings).unwrap();
        assert_eq!(
            cfg.store.backend,
            StoreBackend::Sqlite {
                path: PathBuf::from("x.db")
            }
        );
    }

    #[test]
    fn invalid_override_is_rejected() {
        let settings = Settings {
            super_authority: Some("not-an-address".into()),
            ..Settings::default()
        };
        assert!(CliConfig::load(&settings).is_err());
    }
}

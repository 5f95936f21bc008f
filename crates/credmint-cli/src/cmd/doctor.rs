use anyhow::Result;
use serde::Serialize;

use credmint_solana_client::{LedgerClient, SolanaLedgerClient};
use credmint_store::open_store;

use crate::args::Settings;
use crate::config::CliConfig;
use crate::output;

#[derive(Debug, Serialize)]
pub struct Check {
    pub name: String,
    pub ok: bool,
    pub detail: String,
}

impl Check {
    fn new(name: &str, result: std::result::Result<String, String>) -> Self {
        let (ok, detail) = match result {
            Ok(d) => (true, d),
            Err(d) => (false, d),
        };
        Self {
            name: name.to_string(),
            ok,
            detail,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DoctorOut {
    pub ok: bool,
    pub checks: Vec<Check>,
}

pub async fn run(settings: &Settings) -> Result<()> {
    let mut checks = Vec::new();

    let cfg = match CliConfig::load(settings) {
        Ok(cfg) => {
            checks.push(Check::new("config", Ok("valid".to_string())));
            Some(cfg)
        }
        Err(e) => {
            checks.push(Check::new("config", Err(format!("{e:#}"))));
            None
        }
    };

    if let Some(cfg) = &cfg {
        checks.push(Check::new(
            "super_authority",
            match &cfg.engine.program.super_authority {
                Some(sa) => Ok(sa.clone()),
                None => Err("not configured; profiles must carry their own".to_string()),
            },
        ));

        checks.push(Check::new(
            "store",
            open_store(&cfg.store)
                .map(|_| format!("{:?}", cfg.store.backend))
                .map_err(|e| e.to_string()),
        ));

        let ledger = SolanaLedgerClient::new(&cfg.engine.ledger);
        let slot = ledger.get_slot().await.map_err(|e| e.to_string());
        checks.push(Check::new(
            "ledger",
            slot.map(|s| format!("{} at slot {s}", cfg.engine.ledger.rpc_url)),
        ));
    }

    // a missing super authority alone does not fail the run
    let ok = checks.iter().all(|c| c.ok || c.name == "super_authority");
    if output::is_json() {
        output::print(&DoctorOut { ok, checks })?;
    } else {
        for c in &checks {
            output::status_line(c.ok, &c.name, &c.detail)?;
        }
    }
    if !ok {
        return Err(anyhow::anyhow!("doctor found problems"));
    }
    Ok(())
}

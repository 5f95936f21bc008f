use std::path::Path;

use anyhow::{anyhow, Result};

use credmint_core::model::CredentialRecord;
use credmint_engine::Engine;

use crate::io::input::read_json_file;
use crate::output;

pub async fn mint(engine: &Engine, credential_id: &str, from: Option<&Path>) -> Result<()> {
    if let Some(path) = from {
        import_credential(engine, credential_id, path)?;
    }
    let workflow = engine.prepare_mint_workflow(credential_id).await?;
    output::print(&workflow)
}

pub async fn burn(engine: &Engine, credential_id: &str, reason: &str) -> Result<()> {
    let workflow = engine.prepare_burn_workflow(credential_id, reason).await?;
    output::print(&workflow)
}

/// Store a credential record from JSON unless one with that id already exists.
fn import_credential(engine: &Engine, credential_id: &str, path: &Path) -> Result<()> {
    let record: CredentialRecord = read_json_file(path)?;
    if record.id != credential_id {
        return Err(anyhow!(
            "{} describes credential {}, not {credential_id}",
            path.display(),
            record.id
        ));
    }
    if engine.store().get_credential(credential_id)?.is_some() {
        tracing::warn!(credential_id, "credential already stored, ignoring --from");
        return Ok(());
    }
    engine.store().put_credential(&record)?;
    tracing::info!(
        credential_id,
        institution_id = %record.institution_id,
        "stored credential"
    );
    Ok(())
}

use std::sync::Arc;

use anyhow::Result;

use credmint_engine::{ContentAddressedPublisher, Engine};
use credmint_solana_client::{DasIndexer, SolanaLedgerClient};
use credmint_store::{open_store, LocalStore};

use crate::args::{Cli, Command, Settings};
use crate::config::CliConfig;

mod credential;
mod doctor;
mod institution;
mod submit;

pub async fn dispatch(cli: Cli) -> Result<()> {
    let settings = cli.settings;
    match cli.command {
        Command::Register { profile } => {
            institution::register(&engine(&settings)?, &profile).await
        }
        Command::Approve { institution_id } => {
            institution::approve(&engine(&settings)?, &institution_id).await
        }
        Command::CreateTree {
            institution_id,
            tree,
        } => institution::create_tree(&engine(&settings)?, &institution_id, &tree).await,
        Command::CreateCollection {
            institution_id,
            name,
            uri,
        } => institution::create_collection(&engine(&settings)?, &institution_id, name, uri).await,
        Command::Mint {
            credential_id,
            from,
        } => credential::mint(&engine(&settings)?, &credential_id, from.as_deref()).await,
        Command::Burn {
            credential_id,
            reason,
        } => credential::burn(&engine(&settings)?, &credential_id, &reason).await,
        Command::Submit {
            transaction,
            operation,
        } => submit::submit(&engine(&settings)?, &transaction, operation.as_deref()).await,
        Command::Reconcile {
            signature,
            operation,
        } => submit::reconcile(&engine(&settings)?, &signature, &operation).await,
        Command::Status { signature } => submit::status(&engine(&settings)?, &signature).await,
        Command::Doctor => doctor::run(&settings).await,
    }
}

/// Wire the engine to the Solana RPC, the DAS indexer and the configured store.
fn engine(settings: &Settings) -> Result<Engine> {
    let cfg = CliConfig::load(settings)?;
    let store: Arc<dyn LocalStore> = Arc::from(open_store(&cfg.store)?);
    let ledger = Arc::new(SolanaLedgerClient::new(&cfg.engine.ledger));
    let indexer = Arc::new(DasIndexer::new(&cfg.engine.indexer));
    let mut publisher = ContentAddressedPublisher::from_config(&cfg.engine.content);
    if let Some(dir) = &settings.content_dir {
        publisher = publisher.with_out_dir(dir.clone());
    }
    let engine = Engine::new(cfg.engine, ledger, indexer, store, Arc::new(publisher))?;
    Ok(engine)
}

use std::path::Path;

use anyhow::Result;

use credmint_core::model::UnsignedOperation;
use credmint_engine::Engine;

use crate::io::input::{read_json_file, read_transaction};
use crate::output;

/// Submit only, or submit and reconcile when the prepared operation is given.
pub async fn submit(engine: &Engine, transaction: &str, operation: Option<&Path>) -> Result<()> {
    let bytes = read_transaction(transaction)?;
    match operation {
        None => {
            let receipt = engine.submit(&bytes).await?;
            output::print(&receipt)
        }
        Some(path) => {
            let op: UnsignedOperation = read_json_file(path)?;
            let ack = engine
                .submit_and_reconcile(&bytes, op.operation_type, &op.metadata)
                .await?;
            output::print(&ack)
        }
    }
}

pub async fn reconcile(engine: &Engine, signature: &str, operation: &Path) -> Result<()> {
    let op: UnsignedOperation = read_json_file(operation)?;
    let ack = engine
        .reconcile(signature, op.operation_type, &op.metadata)
        .await?;
    output::print(&ack)
}

pub async fn status(engine: &Engine, signature: &str) -> Result<()> {
    let status = engine.transaction_status(signature).await?;
    output::print(&status)
}

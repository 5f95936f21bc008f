use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;

pub fn read_json_file<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).map_err(|e| anyhow!("invalid json in {}: {e}", path.display()))
}

/// Decode a base58 transaction given inline or as `@path`.
pub fn read_transaction(arg: &str) -> Result<Vec<u8>> {
    let text = match arg.strip_prefix('@') {
        Some(path) => fs::read_to_string(path).with_context(|| format!("reading {path}"))?,
        None => arg.to_string(),
    };
    let text = text.trim();
    if text.is_empty() {
        return Err(anyhow!("transaction is empty"));
    }
    bs58::decode(text)
        .into_vec()
        .map_err(|e| anyhow!("transaction is not valid base58: {e}"))
}

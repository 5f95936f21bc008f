//! Proof source port and its DAS (Digital Asset Standard) indexer adapter.
//!
//! Every hash and address in an indexer response is decoded from base58 into a
//! fixed-length array. A malformed or short field is a hard error: a wrong
//! proof would only fail later, on-chain, after the user signed.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tokio::time::timeout;
use tracing::debug;

use credmint_core::config::IndexerConfig;
use credmint_core::model::{Address, ProofBundle};
use credmint_core::CredmintError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IndexerError {
    #[error("{method} timed out after {after_ms}ms")]
    Timeout { method: &'static str, after_ms: u64 },
    #[error("{method} transport error: {message}")]
    Transport { method: &'static str, message: String },
    #[error("{method} returned error {code}: {message}")]
    Rpc {
        method: &'static str,
        code: i64,
        message: String,
    },
    #[error("malformed field {field}: {message}")]
    Decode { field: String, message: String },
}

impl IndexerError {
    pub fn into_credmint(self, operation: &str) -> CredmintError {
        match self {
            Self::Decode { .. } => CredmintError::validation(operation, self.to_string()),
            _ => CredmintError::unavailable(operation, self.to_string()),
        }
    }
}

/// A credential asset located by owner and tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MintedAsset {
    pub asset_id: Address,
    pub leaf_index: u32,
}

#[async_trait]
pub trait ProofSource: Send + Sync {
    /// Current proof for a compressed asset. `None` when the indexer does not
    /// know the asset or reports it burnt.
    ///
    /// With `truncate_canopy = Some(c)` the `c` root-side nodes held in the
    /// on-chain canopy are dropped from the path.
    async fn fetch_proof(
        &self,
        asset_id: &Address,
        truncate_canopy: Option<u32>,
    ) -> Result<Option<ProofBundle>, IndexerError>;

    /// Locate a live compressed asset owned by `owner` in `tree`, optionally
    /// matching its metadata URI. The highest leaf index wins.
    async fn find_minted_asset(
        &self,
        owner: &Address,
        tree: &Address,
        content_uri: Option<&str>,
    ) -> Result<Option<MintedAsset>, IndexerError>;
}

/// Keep the leaf-side `len - canopy_depth` nodes of a proof path.
pub fn truncate_for_canopy(mut proof: Vec<[u8; 32]>, canopy_depth: u32) -> Vec<[u8; 32]> {
    let keep = proof.len().saturating_sub(canopy_depth as usize);
    proof.truncate(keep);
    proof
}

pub fn decode_base58_to_fixed_array<const N: usize>(
    field: &str,
    input: &str,
) -> Result<[u8; N], IndexerError> {
    let mut buffer = [0u8; N];
    let decoded_len = bs58::decode(input)
        .onto(&mut buffer)
        .map_err(|e| IndexerError::Decode {
            field: field.to_string(),
            message: e.to_string(),
        })?;
    if decoded_len != N {
        return Err(IndexerError::Decode {
            field: field.to_string(),
            message: format!("expected {N} bytes, got {decoded_len}"),
        });
    }
    Ok(buffer)
}

fn decode_address(field: &str, input: &str) -> Result<Address, IndexerError> {
    decode_base58_to_fixed_array::<32>(field, input).map(Address::new_from_array)
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    #[serde(default)]
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct DasAsset {
    id: String,
    #[serde(default)]
    burnt: bool,
    compression: Option<DasCompression>,
    ownership: DasOwnership,
    #[serde(default)]
    content: Option<DasContent>,
}

#[derive(Debug, Deserialize)]
struct DasCompression {
    #[serde(default)]
    compressed: bool,
    #[serde(default)]
    data_hash: String,
    #[serde(default)]
    creator_hash: String,
    #[serde(default)]
    asset_data_hash: Option<String>,
    #[serde(default)]
    flags: Option<u8>,
    #[serde(default)]
    tree: String,
    #[serde(default)]
    leaf_id: u64,
}

#[derive(Debug, Deserialize)]
struct DasOwnership {
    owner: String,
    #[serde(default)]
    delegate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DasContent {
    #[serde(default)]
    json_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DasProof {
    root: String,
    proof: Vec<String>,
    tree_id: String,
}

#[derive(Debug, Deserialize)]
struct DasAssetList {
    #[serde(default)]
    items: Vec<DasAsset>,
}

/// `ProofSource` over a DAS-compatible JSON-RPC endpoint.
#[derive(Debug, Clone)]
pub struct DasIndexer {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
    request_timeout: Duration,
}

impl DasIndexer {
    pub fn new(cfg: &IndexerConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: cfg.url.clone(),
            api_key: cfg.api_key.clone(),
            request_timeout: Duration::from_millis(cfg.request_timeout_ms),
        }
    }

    /// Send one JSON-RPC request. "Not found" errors come back as `Ok(None)`.
    async fn call<T: DeserializeOwned + Send>(
        &self,
        method: &'static str,
        params: serde_json::Value,
    ) -> Result<Option<T>, IndexerError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": "credmint",
            "method": method,
            "params": params,
        });
        let mut request = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.query(&[("api-key", key)]);
        }

        let transport = |e: reqwest::Error| IndexerError::Transport {
            method,
            message: e.to_string(),
        };
        let fut = async move {
            let response = request.send().await.map_err(transport)?;
            response
                .json::<RpcResponse<T>>()
                .await
                .map_err(transport)
        };
        let response = timeout(self.request_timeout, fut)
            .await
            .map_err(|_| IndexerError::Timeout {
                method,
                after_ms: self.request_timeout.as_millis() as u64,
            })??;

        if let Some(err) = response.error {
            if err.message.to_ascii_lowercase().contains("not found") {
                debug!(method, "indexer reports not found");
                return Ok(None);
            }
            return Err(IndexerError::Rpc {
                method,
                code: err.code,
                message: err.message,
            });
        }
        Ok(response.result)
    }
}

fn bundle_from(
    asset_id: &Address,
    asset: DasAsset,
    proof: DasProof,
    truncate_canopy: Option<u32>,
) -> Result<Option<ProofBundle>, IndexerError> {
    if asset.burnt {
        return Ok(None);
    }
    let Some(compression) = asset.compression.filter(|c| c.compressed) else {
        return Err(IndexerError::Decode {
            field: "compression".to_string(),
            message: "asset is not compressed".to_string(),
        });
    };

    let tree = decode_address("compression.tree", &compression.tree)?;
    let proof_tree = decode_address("tree_id", &proof.tree_id)?;
    if tree != proof_tree {
        return Err(IndexerError::Decode {
            field: "tree_id".to_string(),
            message: format!("proof tree {proof_tree} does not match asset tree {tree}"),
        });
    }

    let nodes = proof
        .proof
        .iter()
        .enumerate()
        .map(|(i, node)| decode_base58_to_fixed_array::<32>(&format!("proof[{i}]"), node))
        .collect::<Result<Vec<_>, _>>()?;
    let nodes = match truncate_canopy {
        Some(c) => truncate_for_canopy(nodes, c),
        None => nodes,
    };

    let leaf_index = u32::try_from(compression.leaf_id).map_err(|_| IndexerError::Decode {
        field: "compression.leaf_id".to_string(),
        message: format!("{} does not fit a leaf index", compression.leaf_id),
    })?;

    Ok(Some(ProofBundle {
        asset_id: *asset_id,
        tree,
        root: decode_base58_to_fixed_array("root", &proof.root)?,
        proof: nodes,
        data_hash: decode_base58_to_fixed_array("compression.data_hash", &compression.data_hash)?,
        creator_hash: decode_base58_to_fixed_array(
            "compression.creator_hash",
            &compression.creator_hash,
        )?,
        asset_data_hash: compression
            .asset_data_hash
            .as_deref()
            .map(|h| decode_base58_to_fixed_array("compression.asset_data_hash", h))
            .transpose()?,
        flags: compression.flags,
        nonce: compression.leaf_id,
        leaf_index,
        leaf_owner: decode_address("ownership.owner", &asset.ownership.owner)?,
        leaf_delegate: asset
            .ownership
            .delegate
            .as_deref()
            .map(|d| decode_address("ownership.delegate", d))
            .transpose()?,
    }))
}

fn pick_minted(
    items: Vec<DasAsset>,
    tree: &Address,
    content_uri: Option<&str>,
) -> Result<Option<MintedAsset>, IndexerError> {
    let tree = tree.to_string();
    let mut best: Option<MintedAsset> = None;
    for item in items {
        if item.burnt {
            continue;
        }
        let Some(c) = &item.compression else { continue };
        if !c.compressed || c.tree != tree {
            continue;
        }
        if let Some(uri) = content_uri {
            let json_uri = item.content.as_ref().and_then(|c| c.json_uri.as_deref());
            if json_uri != Some(uri) {
                continue;
            }
        }
        let Ok(leaf_index) = u32::try_from(c.leaf_id) else { continue };
        let candidate = MintedAsset {
            asset_id: decode_address("id", &item.id)?,
            leaf_index,
        };
        if best.map_or(true, |b| candidate.leaf_index > b.leaf_index) {
            best = Some(candidate);
        }
    }
    Ok(best)
}

const OWNER_PAGE_LIMIT: usize = 1000;
// A recipient wallet holding more than this many assets is not a case we chase.
const OWNER_MAX_PAGES: u32 = 50;

/// Walk owner pages from 1 until a page comes back short, keeping the
/// highest-leaf match across all of them.
async fn scan_owner_pages<F, Fut>(
    page_limit: usize,
    mut fetch: F,
    tree: &Address,
    content_uri: Option<&str>,
) -> Result<Option<MintedAsset>, IndexerError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Option<Vec<DasAsset>>, IndexerError>>,
{
    let mut best: Option<MintedAsset> = None;
    for page in 1..=OWNER_MAX_PAGES {
        let Some(items) = fetch(page).await? else { break };
        let full = items.len() >= page_limit;
        if let Some(found) = pick_minted(items, tree, content_uri)? {
            if best.map_or(true, |b| found.leaf_index > b.leaf_index) {
                best = Some(found);
            }
        }
        if !full {
            break;
        }
        debug!(page, "owner page full, fetching next");
    }
    Ok(best)
}

#[async_trait]
impl ProofSource for DasIndexer {
    async fn fetch_proof(
        &self,
        asset_id: &Address,
        truncate_canopy: Option<u32>,
    ) -> Result<Option<ProofBundle>, IndexerError> {
        let id = asset_id.to_string();
        let Some(asset) = self.call::<DasAsset>("getAsset", json!({ "id": id })).await? else {
            return Ok(None);
        };
        let Some(proof) = self
            .call::<DasProof>("getAssetProof", json!({ "id": id }))
            .await?
        else {
            return Ok(None);
        };
        bundle_from(asset_id, asset, proof, truncate_canopy)
    }

    async fn find_minted_asset(
        &self,
        owner: &Address,
        tree: &Address,
        content_uri: Option<&str>,
    ) -> Result<Option<MintedAsset>, IndexerError> {
        let owner = owner.to_string();
        scan_owner_pages(
            OWNER_PAGE_LIMIT,
            |page| self.owner_page(&owner, page),
            tree,
            content_uri,
        )
        .await
    }
}

impl DasIndexer {
    async fn owner_page(&self, owner: &str, page: u32) -> Result<Option<Vec<DasAsset>>, IndexerError> {
        let params = json!({
            "ownerAddress": owner,
            "page": page,
            "limit": OWNER_PAGE_LIMIT,
        });
        let list = self.call::<DasAssetList>("getAssetsByOwner", params).await?;
        Ok(list.map(|l| l.items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b58(bytes: &[u8]) -> String {
        bs58::encode(bytes).into_string()
    }

    fn asset_json(tree: &Address, leaf_id: u64, uri: &str) -> serde_json::Value {
        json!({
            "id": b58(&[leaf_id as u8 + 1; 32]),
            "burnt": false,
            "compression": {
                "compressed": true,
                "data_hash": b58(&[4u8; 32]),
                "creator_hash": b58(&[5u8; 32]),
                "tree": tree.to_string(),
                "leaf_id": leaf_id,
            },
            "ownership": { "owner": b58(&[6u8; 32]), "delegate": null },
            "content": { "json_uri": uri },
        })
    }

    fn proof_json(tree: &Address, depth: usize) -> serde_json::Value {
        let nodes: Vec<String> = (0..depth).map(|i| b58(&[i as u8 + 10; 32])).collect();
        json!({ "root": b58(&[1u8; 32]), "proof": nodes, "tree_id": tree.to_string() })
    }

    #[test]
    fn truncation_keeps_leaf_side_nodes() {
        let path: Vec<[u8; 32]> = (0..14u8).map(|i| [i; 32]).collect();
        let kept = truncate_for_canopy(path.clone(), 8);
        assert_eq!(kept.len(), 6);
        assert_eq!(kept[0], [0u8; 32]);
        assert_eq!(kept[5], [5u8; 32]);
        assert_eq!(truncate_for_canopy(path.clone(), 0), path);
        assert!(truncate_for_canopy(path, 20).is_empty());
    }

    #[test]
    fn short_hash_is_a_hard_error() {
        let err = decode_base58_to_fixed_array::<32>("root", &b58(&[1u8; 31])).unwrap_err();
        assert!(matches!(err, IndexerError::Decode { ref field, .. } if field == "root"));
        assert!(decode_base58_to_fixed_array::<32>("root", "not-base58!").is_err());
        assert!(matches!(
            err.into_credmint("burn_credential"),
            CredmintError::ValidationFailed { .. }
        ));
    }

    #[test]
    fn bundle_decodes_and_truncates() {
        let tree = Address::new_from_array([9u8; 32]);
        let asset: DasAsset = serde_json::from_value(asset_json(&tree, 7, "u")).unwrap();
        let proof: DasProof = serde_json::from_value(proof_json(&tree, 14)).unwrap();
        let id = Address::new_from_array([8u8; 32]);
        let bundle = bundle_from(&id, asset, proof, Some(8)).unwrap().unwrap();
        assert_eq!(bundle.proof.len(), 6);
        assert_eq!(bundle.proof[0], [10u8; 32]);
        assert_eq!(bundle.leaf_index, 7);
        assert_eq!(bundle.nonce, 7);
        assert_eq!(bundle.tree, tree);
        assert_eq!(bundle.asset_data_hash, None);
    }

    #[test]
    fn malformed_proof_node_fails_whole_bundle() {
        let tree = Address::new_from_array([9u8; 32]);
        let asset: DasAsset = serde_json::from_value(asset_json(&tree, 7, "u")).unwrap();
        let mut pj = proof_json(&tree, 3);
        pj["proof"][1] = json!(b58(&[1u8; 12]));
        let proof: DasProof = serde_json::from_value(pj).unwrap();
        let err = bundle_from(&Address::default(), asset, proof, None).unwrap_err();
        assert!(matches!(err, IndexerError::Decode { ref field, .. } if field == "proof[1]"));
    }

    #[test]
    fn burnt_asset_has_no_proof() {
        let tree = Address::new_from_array([9u8; 32]);
        let mut aj = asset_json(&tree, 1, "u");
        aj["burnt"] = json!(true);
        let asset: DasAsset = serde_json::from_value(aj).unwrap();
        let proof: DasProof = serde_json::from_value(proof_json(&tree, 3)).unwrap();
        assert_eq!(bundle_from(&Address::default(), asset, proof, None).unwrap(), None);
    }

    #[test]
    fn minted_lookup_filters_tree_and_uri() {
        let tree = Address::new_from_array([9u8; 32]);
        let other = Address::new_from_array([2u8; 32]);
        let items: Vec<DasAsset> = vec![
            serde_json::from_value(asset_json(&tree, 3, "https://m/a.json")).unwrap(),
            serde_json::from_value(asset_json(&tree, 5, "https://m/b.json")).unwrap(),
            serde_json::from_value(asset_json(&other, 9, "https://m/a.json")).unwrap(),
            serde_json::from_value(asset_json(&tree, 4, "https://m/a.json")).unwrap(),
        ];
        let found = pick_minted(items, &tree, Some("https://m/a.json")).unwrap().unwrap();
        assert_eq!(found.leaf_index, 4);
        assert_eq!(found.asset_id, Address::new_from_array([5u8; 32]));
    }

    #[tokio::test]
    async fn owner_scan_reads_until_a_short_page() {
        let tree = Address::new_from_array([9u8; 32]);
        let other = Address::new_from_array([2u8; 32]);
        let pages: Vec<Vec<serde_json::Value>> = vec![
            vec![
                asset_json(&tree, 3, "https://m/a.json"),
                asset_json(&other, 8, "https://m/a.json"),
            ],
            vec![
                asset_json(&tree, 7, "https://m/a.json"),
                asset_json(&tree, 9, "https://m/b.json"),
            ],
            vec![asset_json(&tree, 5, "https://m/a.json")],
            vec![asset_json(&tree, 20, "https://m/a.json")],
        ];
        let mut requested = Vec::new();

        let found = scan_owner_pages(
            2,
            |page| {
                requested.push(page);
                let items: Vec<DasAsset> = pages[page as usize - 1]
                    .iter()
                    .map(|v| serde_json::from_value(v.clone()).unwrap())
                    .collect();
                async move { Ok(Some(items)) }
            },
            &tree,
            Some("https://m/a.json"),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(requested, vec![1, 2, 3]);
        assert_eq!(found.leaf_index, 7);
    }

    #[tokio::test]
    async fn owner_scan_stops_on_missing_page() {
        let tree = Address::new_from_array([9u8; 32]);
        let mut calls = 0;
        let found = scan_owner_pages(
            2,
            |_| {
                calls += 1;
                async { Ok(None) }
            },
            &tree,
            None,
        )
        .await
        .unwrap();
        assert_eq!(found, None);
        assert_eq!(calls, 1);
    }
}

//! Configuration structures for credmint.
//!
//! This module defines explicit, serializable configuration objects used by
//! higher-level components (engine, CLI) to reach the ledger and the indexer
//! and to choose default setup parameters.
//!
//! The core crate itself does not read environment variables. All configuration
//! must be provided explicitly by the caller.

use serde::{Deserialize, Serialize};

use crate::errors::{CredmintError, CredmintResult};

/// Default program id of the credential program.
pub const DEFAULT_PROGRAM_ID: &str = "CbGKtgvvAeJbMBpSJEMCuwJTwXCjzuHnSGoiSSMQ6WuS";

/// Global configuration container.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub ledger: LedgerConfig,
    pub indexer: IndexerConfig,
    pub program: ProgramConfig,
    pub tree: TreeDefaults,
    pub collection: CollectionDefaults,
    pub content: ContentConfig,
}

/// Ledger RPC settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub rpc_url: String,
    pub commitment: Commitment,
    /// Upper bound for a single RPC call.
    pub request_timeout_ms: u64,
    /// Upper bound for confirmation polling after submission.
    pub confirm_timeout_ms: u64,
    pub confirm_poll_interval_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://api.devnet.solana.com".to_string(),
            commitment: Commitment::Confirmed,
            request_timeout_ms: 15_000,
            confirm_timeout_ms: 30_000,
            confirm_poll_interval_ms: 500,
        }
    }
}

/// DAS indexer settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    pub url: String,
    /// Appended as `api-key` query parameter when set.
    pub api_key: Option<String>,
    pub request_timeout_ms: u64,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            url: "https://devnet.helius-rpc.com".to_string(),
            api_key: None,
            request_timeout_ms: 15_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgramConfig {
    pub program_id: String,
    /// Super-authority that owns the program's global config. Used when an
    /// institution profile does not carry its own.
    pub super_authority: Option<String>,
}

impl Default for ProgramConfig {
    fn default() -> Self {
        Self {
            program_id: DEFAULT_PROGRAM_ID.to_string(),
            super_authority: None,
        }
    }
}

/// Compression tree parameters used when the caller does not supply any.
///
/// Depth 14 with buffer 64 holds 16,384 leaves, which fits a mid-size
/// institution. A canopy of 8 keeps burn proofs at 6 nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeDefaults {
    pub max_depth: u32,
    pub max_buffer_size: u32,
    pub canopy_depth: u32,
    pub is_public: bool,
}

impl Default for TreeDefaults {
    fn default() -> Self {
        Self {
            max_depth: 14,
            max_buffer_size: 64,
            canopy_depth: 8,
            is_public: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionDefaults {
    /// Base used to build a collection URI when the institution has no usable website.
    pub fallback_uri_base: String,
}

impl Default for CollectionDefaults {
    fn default() -> Self {
        Self {
            fallback_uri_base: "https://cdn.credmint.io/c".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    /// Prefix of content-addressed credential metadata URIs.
    pub base_uri: String,
    /// Image used in generated metadata when the credential has none.
    pub default_image: String,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            base_uri: "https://cdn.credmint.io/m".to_string(),
            default_image: "https://cdn.credmint.io/certificate.png".to_string(),
        }
    }
}

/// Ledger commitment level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    Confirmed,
    Finalized,
}

impl Commitment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::Confirmed => "confirmed",
            Self::Finalized => "finalized",
        }
    }
}

/// Valid (max_depth, max_buffer_size) pairs accepted by the compression program.
pub const ALLOWED_TREE_SHAPES: &[(u32, u32)] = &[
    (3, 8),
    (5, 8),
    (14, 64),
    (14, 256),
    (14, 1024),
    (14, 2048),
    (15, 64),
    (16, 64),
    (17, 64),
    (18, 64),
    (19, 64),
    (20, 64),
    (20, 256),
    (20, 1024),
    (20, 2048),
    (24, 64),
    (24, 256),
    (24, 512),
    (24, 1024),
    (24, 2048),
    (26, 512),
    (26, 1024),
    (26, 2048),
    (30, 512),
    (30, 1024),
    (30, 2048),
];

/// Check a tree shape against the compression program's allowed geometries.
pub fn validate_tree_shape(max_depth: u32, max_buffer_size: u32, canopy_depth: u32) -> Result<(), String> {
    if !ALLOWED_TREE_SHAPES.contains(&(max_depth, max_buffer_size)) {
        return Err(format!(
            "unsupported tree shape depth={max_depth} buffer={max_buffer_size}"
        ));
    }
    if canopy_depth >= max_depth {
        return Err(format!(
            "canopy depth {canopy_depth} must be below max depth {max_depth}"
        ));
    }
    Ok(())
}

/// Validate a full configuration object.
pub fn validate_config(cfg: &EngineConfig) -> CredmintResult<()> {
    if cfg.ledger.rpc_url.trim().is_empty() {
        return Err(CredmintError::validation("config", "ledger rpc_url must not be empty"));
    }

    if cfg.ledger.request_timeout_ms == 0 || cfg.indexer.request_timeout_ms == 0 {
        return Err(CredmintError::validation(
            "config",
            "request timeouts must be greater than zero",
        ));
    }

    if cfg.ledger.confirm_poll_interval_ms == 0
        || cfg.ledger.confirm_poll_interval_ms > cfg.ledger.confirm_timeout_ms
    {
        return Err(CredmintError::validation(
            "config",
            "confirm_poll_interval_ms must be in 1..=confirm_timeout_ms",
        ));
    }

    if bs58::decode(&cfg.program.program_id)
        .into_vec()
        .map(|b| b.len() != 32)
        .unwrap_or(true)
    {
        return Err(CredmintError::validation("config", "program_id is not a valid address"));
    }

    if let Some(sa) = &cfg.program.super_authority {
        if sa.parse::<crate::model::Address>().is_err() {
            return Err(CredmintError::validation(
                "config",
                "super_authority is not a valid address",
            ));
        }
    }

    validate_tree_shape(
        cfg.tree.max_depth,
        cfg.tree.max_buffer_size,
        cfg.tree.canopy_depth,
    )
    .map_err(|reason| CredmintError::validation("config", reason))?;

    Ok(())
}

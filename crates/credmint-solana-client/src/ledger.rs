//! Ledger RPC port and its Solana adapter.
//!
//! `LedgerClient` is the only way the engine talks to the ledger. The Solana
//! adapter wraps every call in `tokio::time::timeout` and does not retry;
//! retry policy belongs to the caller.

use std::fmt::{Debug, Formatter};
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use solana_client::client_error::ClientError;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::RpcSendTransactionConfig;
use solana_program::address_lookup_table::state::AddressLookupTable;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;
use thiserror::Error;
use tokio::time::{sleep, timeout, Instant};
use tracing::debug;

use credmint_core::config::{Commitment, LedgerConfig};
use credmint_core::model::Address;
use credmint_core::CredmintError;

use crate::convert::{to_address, to_pubkey};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("{call} timed out after {after_ms}ms")]
    Timeout { call: &'static str, after_ms: u64 },
    #[error("{call} failed: {message}")]
    Rpc { call: &'static str, message: String },
    #[error("transaction {signature} rejected: {error}")]
    Rejected { signature: String, error: String },
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),
    #[error("invalid signature: {0}")]
    InvalidSignature(String),
    #[error("malformed {what} account: {message}")]
    Decode { what: &'static str, message: String },
}

impl LedgerError {
    /// Map into the engine taxonomy, tagged with the business operation.
    pub fn into_credmint(self, operation: &str) -> CredmintError {
        match self {
            Self::Timeout { .. } | Self::Rpc { .. } => {
                CredmintError::unavailable(operation, self.to_string())
            }
            Self::Rejected { signature, error } => {
                CredmintError::submission(operation, signature, error)
            }
            Self::InvalidTransaction(_) | Self::InvalidSignature(_) | Self::Decode { .. } => {
                CredmintError::validation(operation, self.to_string())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockReference {
    pub blockhash: [u8; 32],
    pub last_valid_block_height: u64,
}

impl BlockReference {
    pub fn blockhash_string(&self) -> String {
        bs58::encode(self.blockhash).into_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountInfo {
    pub owner: Address,
    pub lamports: u64,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressTable {
    pub address: Address,
    pub addresses: Vec<Address>,
}

/// What the ledger currently reports for a signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureState {
    /// The ledger has no record of the signature (yet).
    Unknown,
    /// Landed, but below the configured commitment.
    Pending,
    Confirmed,
    /// Landed with an on-chain error.
    Failed(String),
}

impl SignatureState {
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed(_))
    }
}

/// Bounds for confirmation polling.
#[derive(Debug, Clone, Copy)]
pub struct ConfirmPolicy {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl ConfirmPolicy {
    pub fn from_config(cfg: &LedgerConfig) -> Self {
        Self {
            timeout: Duration::from_millis(cfg.confirm_timeout_ms),
            poll_interval: Duration::from_millis(cfg.confirm_poll_interval_ms),
        }
    }
}

#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn latest_block_reference(&self) -> Result<BlockReference, LedgerError>;

    async fn minimum_balance(&self, space: usize) -> Result<u64, LedgerError>;

    async fn get_account(&self, address: &Address) -> Result<Option<AccountInfo>, LedgerError>;

    async fn get_slot(&self) -> Result<u64, LedgerError>;

    /// Resolve an address lookup table. `None` when the account does not exist.
    async fn get_address_table(
        &self,
        address: &Address,
    ) -> Result<Option<AddressTable>, LedgerError>;

    /// Submit a fully signed wire-format transaction; returns its signature.
    async fn send_raw_transaction(&self, bytes: &[u8]) -> Result<String, LedgerError>;

    /// Status from the ledger's recent status cache. Used while polling for confirmation.
    async fn signature_status(&self, signature: &str) -> Result<SignatureState, LedgerError>;

    /// Status searched through the full transaction history, for signatures
    /// that may have aged out of the recent status cache.
    async fn signature_status_with_history(
        &self,
        signature: &str,
    ) -> Result<SignatureState, LedgerError> {
        self.signature_status(signature).await
    }

    /// Poll `signature_status` until the signature is final or the policy times out.
    ///
    /// On timeout the last observed non-final state is returned.
    async fn confirm_transaction(
        &self,
        signature: &str,
        policy: ConfirmPolicy,
    ) -> Result<SignatureState, LedgerError> {
        let deadline = Instant::now() + policy.timeout;
        loop {
            let state = self.signature_status(signature).await?;
            if state.is_final() || Instant::now() + policy.poll_interval > deadline {
                return Ok(state);
            }
            debug!(signature, ?state, "waiting for confirmation");
            sleep(policy.poll_interval).await;
        }
    }
}

/// `LedgerClient` over the Solana JSON-RPC API.
pub struct SolanaLedgerClient {
    rpc: RpcClient,
    commitment: CommitmentConfig,
    request_timeout: Duration,
}

impl Debug for SolanaLedgerClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "SolanaLedgerClient {{ url: {:?} }}", self.rpc.url())
    }
}

fn commitment_config(c: Commitment) -> CommitmentConfig {
    match c {
        Commitment::Processed => CommitmentConfig::processed(),
        Commitment::Confirmed => CommitmentConfig::confirmed(),
        Commitment::Finalized => CommitmentConfig::finalized(),
    }
}

impl SolanaLedgerClient {
    pub fn new(cfg: &LedgerConfig) -> Self {
        let commitment = commitment_config(cfg.commitment);
        Self {
            rpc: RpcClient::new_with_commitment(cfg.rpc_url.clone(), commitment),
            commitment,
            request_timeout: Duration::from_millis(cfg.request_timeout_ms),
        }
    }

    async fn call<T, F>(&self, call: &'static str, fut: F) -> Result<T, LedgerError>
    where
        F: Future<Output = Result<T, ClientError>> + Send,
    {
        match timeout(self.request_timeout, fut).await {
            Err(_) => Err(LedgerError::Timeout {
                call,
                after_ms: self.request_timeout.as_millis() as u64,
            }),
            Ok(Err(e)) => Err(LedgerError::Rpc {
                call,
                message: e.to_string(),
            }),
            Ok(Ok(v)) => Ok(v),
        }
    }
}

#[async_trait]
impl LedgerClient for SolanaLedgerClient {
    async fn latest_block_reference(&self) -> Result<BlockReference, LedgerError> {
        let (hash, last_valid_block_height) = self
            .call(
                "getLatestBlockhash",
                self.rpc.get_latest_blockhash_with_commitment(self.commitment),
            )
            .await?;
        Ok(BlockReference {
            blockhash: hash.to_bytes(),
            last_valid_block_height,
        })
    }

    async fn minimum_balance(&self, space: usize) -> Result<u64, LedgerError> {
        self.call(
            "getMinimumBalanceForRentExemption",
            self.rpc.get_minimum_balance_for_rent_exemption(space),
        )
        .await
    }

    async fn get_account(&self, address: &Address) -> Result<Option<AccountInfo>, LedgerError> {
        let pubkey = to_pubkey(address);
        let response = self
            .call(
                "getAccountInfo",
                self.rpc.get_account_with_commitment(&pubkey, self.commitment),
            )
            .await?;
        Ok(response.value.map(|account| AccountInfo {
            owner: to_address(&account.owner),
            lamports: account.lamports,
            data: account.data,
        }))
    }

    async fn get_slot(&self) -> Result<u64, LedgerError> {
        self.call("getSlot", self.rpc.get_slot_with_commitment(self.commitment))
            .await
    }

    async fn get_address_table(
        &self,
        address: &Address,
    ) -> Result<Option<AddressTable>, LedgerError> {
        let Some(account) = self.get_account(address).await? else {
            return Ok(None);
        };
        let table = AddressLookupTable::deserialize(&account.data).map_err(|e| {
            LedgerError::Decode {
                what: "address lookup table",
                message: e.to_string(),
            }
        })?;
        Ok(Some(AddressTable {
            address: *address,
            addresses: table.addresses.iter().map(to_address).collect(),
        }))
    }

    async fn send_raw_transaction(&self, bytes: &[u8]) -> Result<String, LedgerError> {
        let tx: VersionedTransaction = bincode::deserialize(bytes)
            .map_err(|e| LedgerError::InvalidTransaction(e.to_string()))?;
        let signature = tx
            .signatures
            .first()
            .map(|s| s.to_string())
            .ok_or_else(|| LedgerError::InvalidTransaction("no signatures".to_string()))?;

        let config = RpcSendTransactionConfig {
            skip_preflight: false,
            preflight_commitment: Some(self.commitment.commitment),
            ..RpcSendTransactionConfig::default()
        };
        match timeout(
            self.request_timeout,
            self.rpc.send_transaction_with_config(&tx, config),
        )
        .await
        {
            Err(_) => Err(LedgerError::Timeout {
                call: "sendTransaction",
                after_ms: self.request_timeout.as_millis() as u64,
            }),
            Ok(Err(e)) => match e.get_transaction_error() {
                Some(tx_err) => Err(LedgerError::Rejected {
                    signature,
                    error: tx_err.to_string(),
                }),
                None => Err(LedgerError::Rpc {
                    call: "sendTransaction",
                    message: e.to_string(),
                }),
            },
            Ok(Ok(sig)) => Ok(sig.to_string()),
        }
    }

    async fn signature_status(&self, signature: &str) -> Result<SignatureState, LedgerError> {
        let sig = parse_signature(signature)?;
        let response = self
            .call("getSignatureStatuses", self.rpc.get_signature_statuses(&[sig]))
            .await?;
        Ok(match response.value.into_iter().next().flatten() {
            None => SignatureState::Unknown,
            Some(status) => signature_state(
                status.err.as_ref().map(|e| e.to_string()),
                status.satisfies_commitment(self.commitment),
            ),
        })
    }

    async fn signature_status_with_history(
        &self,
        signature: &str,
    ) -> Result<SignatureState, LedgerError> {
        let sig = parse_signature(signature)?;
        let response = self
            .call(
                "getSignatureStatuses",
                self.rpc.get_signature_statuses_with_history(&[sig]),
            )
            .await?;
        Ok(match response.value.into_iter().next().flatten() {
            None => SignatureState::Unknown,
            Some(status) => signature_state(
                status.err.as_ref().map(|e| e.to_string()),
                status.satisfies_commitment(self.commitment),
            ),
        })
    }
}

fn parse_signature(signature: &str) -> Result<Signature, LedgerError> {
    Signature::from_str(signature).map_err(|e| LedgerError::InvalidSignature(e.to_string()))
}

fn signature_state(error: Option<String>, meets_commitment: bool) -> SignatureState {
    match error {
        Some(e) => SignatureState::Failed(e),
        None if meets_commitment => SignatureState::Confirmed,
        None => SignatureState::Pending,
    }
}

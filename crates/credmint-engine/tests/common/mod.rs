#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use solana_sdk::signature::{Keypair, Signer};
use solana_sdk::transaction::VersionedTransaction;

use credmint_core::config::EngineConfig;
use credmint_core::model::{
    Address, AddressField, CredentialRecord, CredentialStatus, InstitutionProfile,
    InstitutionStatus, ProofBundle, UnsignedOperation,
};
use credmint_engine::{ContentAddressedPublisher, Engine};
use credmint_solana_client::indexer::truncate_for_canopy;
use credmint_solana_client::transaction::inspect_signed;
use credmint_solana_client::tree::tree_account_size;
use credmint_solana_client::{
    compression_program_id, mpl_core_program_id, to_address, AccountInfo, AddressTable,
    BlockReference, IndexerError, LedgerClient, LedgerError, MintedAsset, ProofSource,
    SignatureState,
};
use credmint_store::{LocalStore, MemoryStore};

pub const INSTITUTION: &str = "uni-1";
pub const CREDENTIAL: &str = "cred-1";

#[derive(Default)]
pub struct LedgerState {
    pub accounts: HashMap<Address, AccountInfo>,
    pub tables: HashMap<Address, AddressTable>,
    pub statuses: HashMap<String, SignatureState>,
    /// Statuses that have aged out of the recent cache and only show up in history lookups.
    pub history: HashMap<String, SignatureState>,
    /// Status recorded for the next submitted transaction. Confirmed when unset.
    pub next_outcome: Option<SignatureState>,
    pub fail_tables: bool,
    pub sent: usize,
}

#[derive(Default)]
pub struct MockLedger {
    pub state: Mutex<LedgerState>,
    calls: AtomicUsize,
}

impl MockLedger {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    pub fn put_account(&self, address: Address, owner: Address, data: Vec<u8>) {
        self.state.lock().accounts.insert(
            address,
            AccountInfo {
                owner,
                lamports: 1_000_000,
                data,
            },
        );
    }

    /// Confirmed long enough ago that only a history lookup finds it.
    pub fn confirm_in_history(&self, signature: &str) {
        self.state
            .lock()
            .history
            .insert(signature.to_string(), SignatureState::Confirmed);
    }

    pub fn confirm(&self, signature: &str) {
        self.state
            .lock()
            .statuses
            .insert(signature.to_string(), SignatureState::Confirmed);
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn latest_block_reference(&self) -> Result<BlockReference, LedgerError> {
        self.hit();
        Ok(BlockReference {
            blockhash: [7u8; 32],
            last_valid_block_height: 1_000,
        })
    }

    async fn minimum_balance(&self, space: usize) -> Result<u64, LedgerError> {
        self.hit();
        Ok(space as u64 * 7)
    }

    async fn get_account(&self, address: &Address) -> Result<Option<AccountInfo>, LedgerError> {
        self.hit();
        Ok(self.state.lock().accounts.get(address).cloned())
    }

    async fn get_slot(&self) -> Result<u64, LedgerError> {
        self.hit();
        Ok(4_242)
    }

    async fn get_address_table(
        &self,
        address: &Address,
    ) -> Result<Option<AddressTable>, LedgerError> {
        self.hit();
        let state = self.state.lock();
        if state.fail_tables {
            return Err(LedgerError::Timeout {
                call: "getAccountInfo",
                after_ms: 10,
            });
        }
        Ok(state.tables.get(address).cloned())
    }

    async fn send_raw_transaction(&self, bytes: &[u8]) -> Result<String, LedgerError> {
        self.hit();
        let summary =
            inspect_signed(bytes).map_err(|e| LedgerError::InvalidTransaction(e.to_string()))?;
        let mut state = self.state.lock();
        state.sent += 1;
        let outcome = state.next_outcome.take().unwrap_or(SignatureState::Confirmed);
        state.statuses.insert(summary.signature.clone(), outcome);
        Ok(summary.signature)
    }

    async fn signature_status(&self, signature: &str) -> Result<SignatureState, LedgerError> {
        self.hit();
        Ok(self
            .state
            .lock()
            .statuses
            .get(signature)
            .cloned()
            .unwrap_or(SignatureState::Unknown))
    }

    async fn signature_status_with_history(
        &self,
        signature: &str,
    ) -> Result<SignatureState, LedgerError> {
        self.hit();
        let state = self.state.lock();
        Ok(state
            .statuses
            .get(signature)
            .or_else(|| state.history.get(signature))
            .cloned()
            .unwrap_or(SignatureState::Unknown))
    }
}

#[derive(Default)]
pub struct MockIndexer {
    pub proofs: Mutex<HashMap<Address, ProofBundle>>,
    pub minted: Mutex<Option<MintedAsset>>,
    pub last_canopy: Mutex<Option<u32>>,
    calls: AtomicUsize,
}

impl MockIndexer {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProofSource for MockIndexer {
    async fn fetch_proof(
        &self,
        asset_id: &Address,
        truncate_canopy: Option<u32>,
    ) -> Result<Option<ProofBundle>, IndexerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_canopy.lock() = truncate_canopy;
        Ok(self.proofs.lock().get(asset_id).cloned().map(|mut p| {
            if let Some(c) = truncate_canopy {
                p.proof = truncate_for_canopy(p.proof, c);
            }
            p
        }))
    }

    async fn find_minted_asset(
        &self,
        _owner: &Address,
        _tree: &Address,
        _content_uri: Option<&str>,
    ) -> Result<Option<MintedAsset>, IndexerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(*self.minted.lock())
    }
}

/// Zeroed tree account with a valid header for the given shape.
pub fn tree_account(max_depth: u32, max_buffer_size: u32, canopy_depth: u32) -> Vec<u8> {
    let mut data = vec![0u8; tree_account_size(max_depth, max_buffer_size, canopy_depth)];
    data[2..6].copy_from_slice(&max_buffer_size.to_le_bytes());
    data[6..10].copy_from_slice(&max_depth.to_le_bytes());
    data
}

pub fn addr(b: u8) -> Address {
    Address::from([b; 32])
}

pub struct Fixture {
    pub engine: Engine,
    pub ledger: Arc<MockLedger>,
    pub indexer: Arc<MockIndexer>,
    pub store: Arc<dyn LocalStore>,
    pub authority: Keypair,
    pub super_admin: Keypair,
}

impl Fixture {
    /// Approved institution without tree, collection or lookup table, and one
    /// pending credential.
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    pub fn with_store(store: Arc<dyn LocalStore>) -> Self {
        Self::build(store, "https://cdn.example/m")
    }

    /// Documents are published under `base_uri` instead of the default host.
    pub fn with_content_base(base_uri: &str) -> Self {
        Self::build(Arc::new(MemoryStore::new()), base_uri)
    }

    fn build(store: Arc<dyn LocalStore>, base_uri: &str) -> Self {
        let authority = Keypair::new();
        let super_admin = Keypair::new();

        let mut config = EngineConfig::default();
        config.program.super_authority = Some(super_admin.pubkey().to_string());
        config.ledger.confirm_timeout_ms = 50;
        config.ledger.confirm_poll_interval_ms = 10;

        let ledger = Arc::new(MockLedger::default());
        let indexer = Arc::new(MockIndexer::default());
        let publisher = Arc::new(ContentAddressedPublisher::new(base_uri));
        let engine = Engine::new(
            config,
            ledger.clone(),
            indexer.clone(),
            store.clone(),
            publisher,
        )
        .unwrap();

        let mut profile = InstitutionProfile::new(
            INSTITUTION,
            "Example University",
            to_address(&authority.pubkey()),
        );
        profile.website = Some("https://example.edu".into());
        store.put_institution(&profile).unwrap();
        store
            .compare_and_set_address(INSTITUTION, AddressField::Registration, None, addr(200))
            .unwrap();
        store
            .compare_and_set_status(INSTITUTION, InstitutionStatus::Pending, InstitutionStatus::Approved)
            .unwrap();
        store.put_credential(&credential(CREDENTIAL, "CERT-0001")).unwrap();

        Self {
            engine,
            ledger,
            indexer,
            store,
            authority,
            super_admin,
        }
    }

    pub fn with_live_tree(&self) -> Address {
        let tree = addr(30);
        self.store
            .compare_and_set_address(INSTITUTION, AddressField::Tree, None, tree)
            .unwrap();
        self.ledger
            .put_account(tree, to_address(&compression_program_id()), tree_account(14, 64, 8));
        tree
    }

    pub fn with_live_collection(&self) -> Address {
        let collection = addr(40);
        self.store
            .compare_and_set_address(INSTITUTION, AddressField::Collection, None, collection)
            .unwrap();
        self.ledger
            .put_account(collection, to_address(&mpl_core_program_id()), vec![1]);
        collection
    }

    /// Minted credential with a known asset id and a live 14-node proof.
    pub fn with_minted_credential(&self, tree: Address) -> Address {
        let asset_id = addr(50);
        let mut record = self.store.get_credential(CREDENTIAL).unwrap().unwrap();
        record.status = CredentialStatus::Minted;
        record.asset_id = Some(asset_id);
        record.leaf_index = Some(3);
        self.store.put_credential(&record).unwrap();

        self.indexer.proofs.lock().insert(
            asset_id,
            ProofBundle {
                asset_id,
                tree,
                root: [1u8; 32],
                proof: (0..14u8).map(|i| [i + 100; 32]).collect(),
                data_hash: [2u8; 32],
                creator_hash: [3u8; 32],
                asset_data_hash: None,
                flags: None,
                nonce: 3,
                leaf_index: 3,
                leaf_owner: record.recipient,
                leaf_delegate: None,
            },
        );
        asset_id
    }

    pub fn profile(&self) -> InstitutionProfile {
        self.store.get_institution(INSTITUTION).unwrap().unwrap()
    }

    pub fn record(&self) -> CredentialRecord {
        self.store.get_credential(CREDENTIAL).unwrap().unwrap()
    }

    /// Add the fee payer's signature to a prepared operation.
    pub fn sign(&self, op: &UnsignedOperation, signer: &Keypair) -> Vec<u8> {
        sign_with(&op.transaction, signer)
    }
}

pub fn credential(id: &str, number: &str) -> CredentialRecord {
    CredentialRecord {
        id: id.into(),
        institution_id: INSTITUTION.into(),
        credential_number: number.into(),
        title: "Bachelor of Science in Computer Engineering".into(),
        student_name: "Ada Lovelace".into(),
        recipient: addr(9),
        degree_type: Some("Bachelor".into()),
        program: Some("Computer Engineering".into()),
        issued_on: Some("2024-06-30".into()),
        image_uri: None,
        content_uri: Some("ipfs://placeholder".into()),
        status: CredentialStatus::Pending,
        asset_id: None,
        leaf_index: None,
        mint_signature: None,
    }
}

pub fn decode(bytes: &[u8]) -> VersionedTransaction {
    bincode::deserialize(bytes).unwrap()
}

pub fn sign_with(bytes: &[u8], signer: &Keypair) -> Vec<u8> {
    let mut tx = decode(bytes);
    let data = tx.message.serialize();
    let position = tx
        .message
        .static_account_keys()
        .iter()
        .position(|k| *k == signer.pubkey())
        .unwrap();
    tx.signatures[position] = signer.sign_message(&data);
    bincode::serialize(&tx).unwrap()
}

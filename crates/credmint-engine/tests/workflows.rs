mod common;

use assert_matches::assert_matches;
use solana_program::message::VersionedMessage;
use solana_sdk::signature::Signer;

use credmint_core::model::{
    Address, AddressField, CredentialStatus, InstitutionProfile, InstitutionStatus,
    OperationMetadata, OperationType, UnsignedOperation, WorkflowStage,
};
use credmint_core::{CredmintError, ErrorKind};
use credmint_engine::{CollectionParams, TreeParams};
use credmint_solana_client::{
    compression_program_id, default_program_id, mpl_core_program_id, to_address, to_pubkey,
    AddressTable, ProgramClient,
};

use common::*;

fn types(ops: &[UnsignedOperation]) -> Vec<OperationType> {
    ops.iter().map(|o| o.operation_type).collect()
}

#[tokio::test]
async fn mint_without_setup_returns_tree_then_collection() {
    let fx = Fixture::new();

    let wf = fx.engine.prepare_mint_workflow(CREDENTIAL).await.unwrap();

    assert_eq!(
        types(&wf.prerequisites),
        vec![OperationType::CreateTree, OperationType::CreateCollection]
    );
    assert!(wf.mint.is_none());
    assert_eq!(wf.stage, WorkflowStage::PrerequisitesPending);

    // preparation is read-only
    let profile = fx.profile();
    assert!(!profile.tree.is_set());
    assert!(!profile.collection.is_set());
    assert_eq!(fx.record().content_uri.as_deref(), Some("ipfs://placeholder"));
}

#[tokio::test]
async fn prerequisites_use_default_shapes_and_fresh_accounts() {
    let fx = Fixture::new();
    let wf = fx.engine.prepare_mint_workflow(CREDENTIAL).await.unwrap();

    let tree_op = &wf.prerequisites[0];
    assert_matches!(
        &tree_op.metadata,
        OperationMetadata::CreateTree { max_depth: 14, max_buffer_size: 64, canopy_depth: 8, previous: None, .. }
    );
    // tree keypair already signed, fee payer slot still empty
    let tx = decode(&tree_op.transaction);
    assert_eq!(tx.signatures.len(), 2);
    assert_eq!(tx.signatures[0], Default::default());
    assert_ne!(tx.signatures[1], Default::default());
    assert_eq!(tx.message.static_account_keys()[0], fx.authority.pubkey());
    assert_eq!(tx.message.instructions().len(), 2);

    let collection_op = &wf.prerequisites[1];
    assert_matches!(
        &collection_op.metadata,
        OperationMetadata::CreateCollection { name, uri, .. }
            if name == "Example University" && uri == "https://example.edu"
    );

    let again = fx.engine.prepare_mint_workflow(CREDENTIAL).await.unwrap();
    assert_ne!(
        again.prerequisites[0].accounts_created[0].address,
        tree_op.accounts_created[0].address
    );
}

#[tokio::test]
async fn stored_tree_with_wrong_owner_counts_as_missing() {
    let fx = Fixture::new();
    fx.with_live_collection();
    fx.store
        .compare_and_set_address(INSTITUTION, AddressField::Tree, None, addr(31))
        .unwrap();
    fx.ledger.put_account(addr(31), addr(99), vec![0; 64]);

    let wf = fx.engine.prepare_mint_workflow(CREDENTIAL).await.unwrap();
    assert_eq!(types(&wf.prerequisites), vec![OperationType::CreateTree]);
    assert_matches!(
        &wf.prerequisites[0].metadata,
        OperationMetadata::CreateTree { previous: Some(p), .. } if *p == addr(31)
    );
}

#[tokio::test]
async fn mint_ready_when_tree_and_collection_are_live() {
    let fx = Fixture::new();
    let tree = fx.with_live_tree();
    let collection = fx.with_live_collection();

    let wf = fx.engine.prepare_mint_workflow(CREDENTIAL).await.unwrap();

    assert!(wf.prerequisites.is_empty());
    assert_eq!(wf.stage, WorkflowStage::TerminalOperationReady);
    let mint = wf.mint.expect("mint operation");
    assert_eq!(mint.operation_type, OperationType::MintCredential);
    assert_eq!(mint.metadata.institution_id(), INSTITUTION);
    assert_eq!(mint.expiry_height, 1_000);

    let stored_uri = fx.record().content_uri.unwrap();
    assert!(stored_uri.starts_with("https://cdn.example/m/"));
    assert_matches!(
        &mint.metadata,
        OperationMetadata::MintCredential { tree: t, collection: c, content_uri, .. }
            if *t == tree && *c == collection && *content_uri == stored_uri
    );
}

#[tokio::test]
async fn existing_content_reference_is_reused() {
    let fx = Fixture::new();
    fx.with_live_tree();
    fx.with_live_collection();
    let mut record = fx.record();
    record.content_uri = Some("https://meta.example/cert-0001.json".into());
    fx.store.put_credential(&record).unwrap();

    let wf = fx.engine.prepare_mint_workflow(CREDENTIAL).await.unwrap();
    assert_matches!(
        wf.mint.unwrap().metadata,
        OperationMetadata::MintCredential { content_uri, .. }
            if content_uri == "https://meta.example/cert-0001.json"
    );
}

#[tokio::test]
async fn overlong_published_reference_is_never_stored() {
    let base = format!("https://cdn.example/{}", "x".repeat(200));
    let fx = Fixture::with_content_base(&base);
    fx.with_live_tree();
    fx.with_live_collection();

    let err = fx.engine.prepare_mint_workflow(CREDENTIAL).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    assert_eq!(err.operation(), "mint_credential");
    let record = fx.record();
    assert_eq!(record.content_uri.as_deref(), Some("ipfs://placeholder"));
    assert_eq!(record.status, CredentialStatus::Pending);
}

#[tokio::test]
async fn setup_scenario_converges_to_mint() {
    let fx = Fixture::new();

    let first = fx.engine.prepare_mint_workflow(CREDENTIAL).await.unwrap();
    assert_eq!(first.prerequisites.len(), 2);

    for op in &first.prerequisites {
        let signed = fx.sign(op, &fx.authority);
        let ack = fx
            .engine
            .submit_and_reconcile(&signed, op.operation_type, &op.metadata)
            .await
            .unwrap();
        assert!(ack.applied);
        assert_eq!(ack.stage, WorkflowStage::Confirmed);

        // the ledger now holds the created account
        match &op.metadata {
            OperationMetadata::CreateTree { tree, .. } => fx.ledger.put_account(
                *tree,
                to_address(&compression_program_id()),
                tree_account(14, 64, 8),
            ),
            OperationMetadata::CreateCollection { collection, .. } => {
                fx.ledger
                    .put_account(*collection, to_address(&mpl_core_program_id()), vec![1])
            }
            other => panic!("unexpected prerequisite {other:?}"),
        }
    }

    let second = fx.engine.prepare_mint_workflow(CREDENTIAL).await.unwrap();
    assert!(second.prerequisites.is_empty());
    assert_eq!(
        second.mint.map(|m| m.operation_type),
        Some(OperationType::MintCredential)
    );
}

#[tokio::test]
async fn minted_credential_cannot_be_minted_again() {
    let fx = Fixture::new();
    let tree = fx.with_live_tree();
    fx.with_minted_credential(tree);

    let err = fx.engine.prepare_mint_workflow(CREDENTIAL).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
    assert_eq!(err.operation(), "mint_credential");
}

#[tokio::test]
async fn unknown_credential_is_not_found() {
    let fx = Fixture::new();
    let err = fx.engine.prepare_mint_workflow("nope").await.unwrap_err();
    assert_matches!(err, CredmintError::NotFound { .. });
}

#[tokio::test]
async fn burn_reason_too_long_fails_before_any_network_call() {
    let fx = Fixture::new();
    let tree = fx.with_live_tree();
    fx.with_live_collection();
    fx.with_minted_credential(tree);
    let (ledger_before, indexer_before) = (fx.ledger.calls(), fx.indexer.calls());

    let reason = "x".repeat(121);
    let err = fx
        .engine
        .prepare_burn_workflow(CREDENTIAL, &reason)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    assert_eq!(fx.ledger.calls(), ledger_before);
    assert_eq!(fx.indexer.calls(), indexer_before);
    assert_eq!(fx.ledger.calls(), 0);

    let err = fx.engine.prepare_burn_workflow(CREDENTIAL, "   ").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    assert_eq!(fx.ledger.calls(), 0);
}

#[tokio::test]
async fn burn_without_lookup_table_returns_only_the_table() {
    let fx = Fixture::new();
    let tree = fx.with_live_tree();
    fx.with_live_collection();
    fx.with_minted_credential(tree);

    let wf = fx
        .engine
        .prepare_burn_workflow(CREDENTIAL, "issued in error")
        .await
        .unwrap();

    assert_eq!(types(&wf.prerequisites), vec![OperationType::CreateLookupTable]);
    assert!(wf.burn.is_none());
    assert_eq!(fx.indexer.calls(), 0);
    assert_matches!(
        &wf.prerequisites[0].metadata,
        OperationMetadata::CreateLookupTable { previous: None, .. }
    );
}

fn install_lookup_table(fx: &Fixture, tree: Address) {
    let table = addr(60);
    fx.store
        .compare_and_set_address(
            INSTITUTION,
            AddressField::LookupTable,
            None,
            table,
        )
        .unwrap();
    let program = ProgramClient::new(default_program_id(), fx.super_admin.pubkey());
    let addresses = program
        .burn_lookup_addresses(&fx.authority.pubkey(), &to_pubkey(&tree), &to_pubkey(&addr(40)))
        .iter()
        .map(to_address)
        .collect();
    fx.ledger.state.lock().tables.insert(
        table,
        AddressTable {
            address: table,
            addresses,
        },
    );
}

#[tokio::test]
async fn burn_with_lookup_table_is_v0_with_truncated_proof() {
    let fx = Fixture::new();
    let tree = fx.with_live_tree();
    fx.with_live_collection();
    let asset_id = fx.with_minted_credential(tree);
    install_lookup_table(&fx, tree);

    let wf = fx
        .engine
        .prepare_burn_workflow(CREDENTIAL, "issued in error")
        .await
        .unwrap();

    assert!(wf.prerequisites.is_empty());
    let burn = wf.burn.expect("burn operation");
    assert_matches!(
        &burn.metadata,
        OperationMetadata::BurnCredential { asset_id: a, reason, .. }
            if *a == asset_id && reason == "issued in error"
    );
    assert_eq!(*fx.indexer.last_canopy.lock(), Some(8));

    let tx = decode(&burn.transaction);
    assert_matches!(&tx.message, VersionedMessage::V0(m) if m.address_table_lookups.len() == 1);
    // 14 nodes minus the 8 held in the canopy
    let ix = &tx.message.instructions()[0];
    assert_eq!(ix.accounts.len(), 15 + 6);
}

#[tokio::test]
async fn burn_falls_back_to_legacy_when_table_lookup_fails() {
    let fx = Fixture::new();
    let tree = fx.with_live_tree();
    fx.with_live_collection();
    fx.with_minted_credential(tree);
    install_lookup_table(&fx, tree);
    fx.ledger.state.lock().fail_tables = true;

    let wf = fx
        .engine
        .prepare_burn_workflow(CREDENTIAL, "issued in error")
        .await
        .unwrap();

    assert!(wf.prerequisites.is_empty());
    let tx = decode(&wf.burn.unwrap().transaction);
    assert_matches!(tx.message, VersionedMessage::Legacy(_));
}

#[tokio::test]
async fn oversized_burn_without_lookup_table_is_unavailable() {
    let fx = Fixture::new();
    let tree = fx.with_live_tree();
    fx.with_live_collection();
    let asset_id = fx.with_minted_credential(tree);
    install_lookup_table(&fx, tree);
    // depth 30 with no canopy: every proof node travels in the transaction
    fx.ledger.put_account(
        tree,
        to_address(&compression_program_id()),
        tree_account(30, 512, 0),
    );
    if let Some(bundle) = fx.indexer.proofs.lock().get_mut(&asset_id) {
        bundle.proof = (0..30u8).map(|i| [i + 100; 32]).collect();
    }
    fx.ledger.state.lock().fail_tables = true;

    let err = fx
        .engine
        .prepare_burn_workflow(CREDENTIAL, "issued in error")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DependencyUnavailable);
    assert_eq!(err.operation(), "burn_credential");
    assert!(err.is_retryable());
    assert_eq!(*fx.indexer.last_canopy.lock(), Some(0));
}

#[tokio::test]
async fn burn_of_unindexed_asset_is_not_found() {
    let fx = Fixture::new();
    let tree = fx.with_live_tree();
    fx.with_live_collection();
    fx.with_minted_credential(tree);
    install_lookup_table(&fx, tree);
    fx.indexer.proofs.lock().clear();

    let err = fx
        .engine
        .prepare_burn_workflow(CREDENTIAL, "issued in error")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.operation(), "burn_credential");
}

#[tokio::test]
async fn burn_requires_minted_credential_with_asset_id() {
    let fx = Fixture::new();
    fx.with_live_tree();
    fx.with_live_collection();

    let err = fx
        .engine
        .prepare_burn_workflow(CREDENTIAL, "issued in error")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
}

#[tokio::test]
async fn register_then_approve() {
    let fx = Fixture::new();
    let mut fresh = InstitutionProfile::new("uni-2", "Second University", addr(77));
    fresh.super_authority = Some(to_address(&fx.super_admin.pubkey()));
    fx.store.put_institution(&fresh).unwrap();

    let err = fx.engine.prepare_approve_institution("uni-2").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionFailed);

    let register = fx.engine.prepare_register_institution("uni-2").await.unwrap();
    assert_eq!(register.operation_type, OperationType::RegisterInstitution);
    assert_eq!(register.accounts_created[0].name, "university");
    fx.ledger.confirm("sig-register");
    fx.engine
        .reconcile("sig-register", register.operation_type, &register.metadata)
        .await
        .unwrap();
    let profile = fx.store.get_institution("uni-2").unwrap().unwrap();
    assert_eq!(
        profile.registration.address(),
        Some(register.accounts_created[0].address)
    );

    let approve = fx.engine.prepare_approve_institution("uni-2").await.unwrap();
    let tx = decode(&approve.transaction);
    assert_eq!(tx.message.static_account_keys()[0], fx.super_admin.pubkey());
    fx.ledger.confirm("sig-approve");
    let ack = fx
        .engine
        .reconcile("sig-approve", approve.operation_type, &approve.metadata)
        .await
        .unwrap();
    assert!(ack.applied);
    let profile = fx.store.get_institution("uni-2").unwrap().unwrap();
    assert_eq!(profile.status, InstitutionStatus::Approved);

    let err = fx.engine.prepare_register_institution("uni-2").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
}

#[tokio::test]
async fn direct_setup_operations_validate_parameters_first() {
    let fx = Fixture::new();

    let err = fx
        .engine
        .prepare_create_tree(
            INSTITUTION,
            Some(TreeParams {
                max_depth: 14,
                max_buffer_size: 65,
                canopy_depth: 0,
                is_public: false,
            }),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);

    let err = fx
        .engine
        .prepare_create_collection(
            INSTITUTION,
            Some(CollectionParams {
                name: "Example".into(),
                uri: format!("https://{}.example", "u".repeat(60)),
            }),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ValidationFailed);
    assert_eq!(fx.ledger.calls(), 0);

    let op = fx
        .engine
        .prepare_create_tree(
            INSTITUTION,
            Some(TreeParams {
                max_depth: 3,
                max_buffer_size: 8,
                canopy_depth: 0,
                is_public: true,
            }),
        )
        .await
        .unwrap();
    assert_matches!(op.metadata, OperationMetadata::CreateTree { max_depth: 3, .. });
}

#[tokio::test]
async fn pending_institution_cannot_set_up_or_mint() {
    let fx = Fixture::new();
    fx.store.put_institution(&InstitutionProfile::new("uni-3", "Third", addr(78))).unwrap();
    let mut record = credential("cred-3", "CERT-0003");
    record.institution_id = "uni-3".into();
    fx.store.put_credential(&record).unwrap();

    let err = fx.engine.prepare_mint_workflow("cred-3").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
    let err = fx.engine.prepare_create_tree("uni-3", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
    assert_eq!(fx.record().status, CredentialStatus::Pending);
}

//! Decides which setup steps an institution still needs before it can mint.
//!
//! Read-only: inspects the stored profile and the live ledger, never writes.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use credmint_core::config::{validate_tree_shape, CollectionDefaults, TreeDefaults};
use credmint_core::limits::{
    check_len, check_non_empty, truncate_bytes, COLLECTION_NAME_MAX, COLLECTION_URI_MAX,
};
use credmint_core::model::{Address, InstitutionProfile};
use credmint_core::{CredmintError, CredmintResult};
use credmint_solana_client::tree::read_geometry;
use credmint_solana_client::{
    compression_program_id, mpl_core_program_id, to_address, AddressTable, LedgerClient,
    TreeGeometry,
};

/// Shape of a new compression tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_depth: u32,
    pub max_buffer_size: u32,
    pub canopy_depth: u32,
    pub is_public: bool,
}

impl From<TreeDefaults> for TreeParams {
    fn from(d: TreeDefaults) -> Self {
        Self {
            max_depth: d.max_depth,
            max_buffer_size: d.max_buffer_size,
            canopy_depth: d.canopy_depth,
            is_public: d.is_public,
        }
    }
}

impl TreeParams {
    pub fn validate(&self, operation: &str) -> CredmintResult<()> {
        validate_tree_shape(self.max_depth, self.max_buffer_size, self.canopy_depth)
            .map_err(|reason| CredmintError::validation(operation, reason))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionParams {
    pub name: String,
    pub uri: String,
}

impl CollectionParams {
    /// Institution name cut to the program limit; website when it fits, else
    /// `{fallback_uri_base}/{institution_id}.json`.
    pub fn defaults_for(profile: &InstitutionProfile, defaults: &CollectionDefaults) -> Self {
        let name = truncate_bytes(&profile.name, COLLECTION_NAME_MAX).to_string();
        let uri = match profile.website.as_deref().map(str::trim) {
            Some(site) if !site.is_empty() && site.len() <= COLLECTION_URI_MAX => site.to_string(),
            _ => format!(
                "{}/{}.json",
                defaults.fallback_uri_base.trim_end_matches('/'),
                profile.id
            ),
        };
        Self { name, uri }
    }

    pub fn validate(&self, operation: &str) -> CredmintResult<()> {
        check_non_empty(operation, "collection name", &self.name)?;
        check_len(operation, "collection name", &self.name, COLLECTION_NAME_MAX)?;
        check_non_empty(operation, "collection uri", &self.uri)?;
        check_len(operation, "collection uri", &self.uri, COLLECTION_URI_MAX)
    }
}

/// A setup step the institution is missing, with the parameters to build it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prerequisite {
    CreateTree(TreeParams),
    CreateCollection(CollectionParams),
}

pub struct PrerequisiteResolver<'a> {
    ledger: &'a dyn LedgerClient,
    tree_defaults: TreeDefaults,
    collection_defaults: &'a CollectionDefaults,
}

impl<'a> PrerequisiteResolver<'a> {
    pub fn new(
        ledger: &'a dyn LedgerClient,
        tree_defaults: TreeDefaults,
        collection_defaults: &'a CollectionDefaults,
    ) -> Self {
        Self {
            ledger,
            tree_defaults,
            collection_defaults,
        }
    }

    /// Missing setup steps, tree first.
    pub async fn resolve(&self, profile: &InstitutionProfile) -> Vec<Prerequisite> {
        let mut missing = Vec::new();
        let compression = to_address(&compression_program_id());
        if !self.is_live(profile.tree.address(), compression, "tree").await {
            missing.push(Prerequisite::CreateTree(self.tree_defaults.into()));
        }
        let core = to_address(&mpl_core_program_id());
        if !self.is_live(profile.collection.address(), core, "collection").await {
            missing.push(Prerequisite::CreateCollection(CollectionParams::defaults_for(
                profile,
                self.collection_defaults,
            )));
        }
        debug!(institution_id = %profile.id, missing = missing.len(), "resolved prerequisites");
        missing
    }

    /// The stored address exists on the ledger and is owned by `owner`.
    ///
    /// A failed lookup counts as absent.
    async fn is_live(&self, stored: Option<Address>, owner: Address, what: &str) -> bool {
        let Some(address) = stored else {
            return false;
        };
        match self.ledger.get_account(&address).await {
            Ok(Some(account)) if account.owner == owner => true,
            Ok(Some(account)) => {
                warn!(%address, owner = %account.owner, what, "stored account has unexpected owner");
                false
            }
            Ok(None) => {
                warn!(%address, what, "stored account not found on ledger");
                false
            }
            Err(e) => {
                warn!(%address, what, error = %e, "account lookup failed, treating as missing");
                false
            }
        }
    }

    /// Resolve the institution's lookup table.
    ///
    /// `Ok(None)` when no table is stored or the stored one does not exist;
    /// `Err` when the ledger could not be asked.
    pub async fn lookup_table(
        &self,
        profile: &InstitutionProfile,
        operation: &str,
    ) -> CredmintResult<Option<AddressTable>> {
        let Some(address) = profile.lookup_table.address() else {
            return Ok(None);
        };
        let table = self
            .ledger
            .get_address_table(&address)
            .await
            .map_err(|e| e.into_credmint(operation))?;
        if table.is_none() {
            warn!(%address, institution_id = %profile.id, "stored lookup table not found on ledger");
        }
        Ok(table)
    }

    /// Geometry of a live tree account, for proof truncation.
    pub async fn tree_geometry(
        &self,
        tree: &Address,
        operation: &str,
    ) -> CredmintResult<TreeGeometry> {
        let account = self
            .ledger
            .get_account(tree)
            .await
            .map_err(|e| e.into_credmint(operation))?
            .ok_or_else(|| {
                CredmintError::precondition(operation, format!("tree {tree} not found on ledger"))
            })?;
        if account.owner != to_address(&compression_program_id()) {
            return Err(CredmintError::precondition(
                operation,
                format!("tree {tree} is not owned by the compression program"),
            ));
        }
        read_geometry(&account.data)
            .map_err(|e| CredmintError::validation(operation, e.to_string()))
    }
}

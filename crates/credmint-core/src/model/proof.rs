use super::address::Address;

/// Merkle proof material for one compressed credential.
///
/// Always fetched fresh from the indexer right before a burn is assembled.
/// Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofBundle {
    pub asset_id: Address,
    pub tree: Address,
    pub root: [u8; 32],
    /// Sibling hashes ordered from the leaf upwards.
    pub proof: Vec<[u8; 32]>,
    pub data_hash: [u8; 32],
    pub creator_hash: [u8; 32],
    pub asset_data_hash: Option<[u8; 32]>,
    pub flags: Option<u8>,
    pub nonce: u64,
    pub leaf_index: u32,
    pub leaf_owner: Address,
    pub leaf_delegate: Option<Address>,
}

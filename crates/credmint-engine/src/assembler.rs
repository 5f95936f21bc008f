//! Turns instructions into an unsigned wire transaction against a fresh block reference.

use solana_program::address_lookup_table::AddressLookupTableAccount;
use solana_program::hash::Hash;
use solana_program::instruction::Instruction;
use solana_program::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use tracing::debug;

use credmint_core::model::{AccountCreated, OperationMetadata, UnsignedOperation};
use credmint_core::{CredmintError, CredmintResult};
use credmint_solana_client::transaction::{encode_unsigned, EncodeError};
use credmint_solana_client::{
    to_address, to_pubkey, AddressTable, BlockReference, EncodedTransaction, LedgerClient,
};

/// Encoded transaction plus the block reference it was built against.
#[derive(Debug, Clone)]
pub struct AssembledTransaction {
    pub encoded: EncodedTransaction,
    pub block: BlockReference,
}

impl AssembledTransaction {
    pub fn into_operation(
        self,
        metadata: OperationMetadata,
        message: impl Into<String>,
        accounts_created: Vec<AccountCreated>,
    ) -> UnsignedOperation {
        UnsignedOperation {
            operation_type: metadata.operation_type(),
            transaction: self.encoded.bytes,
            block_reference: self.block.blockhash_string(),
            expiry_height: self.block.last_valid_block_height,
            message: message.into(),
            metadata,
            accounts_created,
        }
    }
}

/// Convert a resolved lookup table into the form the message compiler expects.
pub fn lookup_table_account(table: &AddressTable) -> AddressLookupTableAccount {
    AddressLookupTableAccount {
        key: to_pubkey(&table.address),
        addresses: table.addresses.iter().map(to_pubkey).collect(),
    }
}

/// Fetch the latest block reference and encode.
///
/// `signers` partially sign (fresh account keypairs); the fee payer's slot is
/// left empty. With `tables` the result is a v0 transaction.
pub async fn assemble(
    ledger: &dyn LedgerClient,
    operation: &str,
    instructions: &[Instruction],
    fee_payer: &Pubkey,
    signers: &[&Keypair],
    tables: &[AddressLookupTableAccount],
) -> CredmintResult<AssembledTransaction> {
    let block = ledger
        .latest_block_reference()
        .await
        .map_err(|e| e.into_credmint(operation))?;

    let encoded = encode_unsigned(
        instructions,
        fee_payer,
        signers,
        tables,
        Hash::new_from_array(block.blockhash),
    )
    .map_err(|e| encode_error(operation, e))?;

    debug!(
        operation,
        fee_payer = %to_address(fee_payer),
        size = encoded.bytes.len(),
        version = ?encoded.version,
        "assembled transaction"
    );
    Ok(AssembledTransaction { encoded, block })
}

pub(crate) fn encode_error(operation: &str, e: EncodeError) -> CredmintError {
    CredmintError::validation(operation, e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use credmint_core::model::Address;
    use credmint_solana_client::TxVersion;

    #[test]
    fn lookup_table_account_keeps_order() {
        let table = AddressTable {
            address: Address::from([1u8; 32]),
            addresses: vec![Address::from([2u8; 32]), Address::from([3u8; 32])],
        };
        let account = lookup_table_account(&table);
        assert_eq!(account.key, Pubkey::new_from_array([1u8; 32]));
        assert_eq!(account.addresses[1], Pubkey::new_from_array([3u8; 32]));
    }

    #[test]
    fn into_operation_carries_block_reference() {
        let assembled = AssembledTransaction {
            encoded: EncodedTransaction {
                bytes: vec![1, 2, 3],
                version: TxVersion::Legacy,
                required_signatures: 1,
            },
            block: BlockReference {
                blockhash: [9u8; 32],
                last_valid_block_height: 77,
            },
        };
        let op = assembled.into_operation(
            OperationMetadata::ApproveInstitution {
                institution_id: "uni-1".into(),
                registration: Address::from([5u8; 32]),
            },
            "approve",
            vec![],
        );
        assert_eq!(op.expiry_height, 77);
        assert_eq!(op.block_reference, bs58_of([9u8; 32]));
        assert_eq!(op.transaction, vec![1, 2, 3]);
    }

    fn bs58_of(bytes: [u8; 32]) -> String {
        Hash::new_from_array(bytes).to_string()
    }
}

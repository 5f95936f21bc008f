//! Wire encoding for unsigned and signed transactions.
//!
//! Unsigned transactions leave the fee payer's signature slot zeroed and carry
//! signatures from any additional signers (fresh keypairs for new accounts).
//! Legacy messages are used unless lookup tables are supplied, in which case a
//! v0 message addresses the tables' entries by index.

use solana_program::address_lookup_table::AddressLookupTableAccount;
use solana_program::hash::Hash;
use solana_program::instruction::Instruction;
use solana_program::message::{v0, Message, VersionedMessage};
use solana_program::pubkey::Pubkey;
use solana_sdk::packet::PACKET_DATA_SIZE;
use solana_sdk::signature::{Keypair, Signature, Signer};
use solana_sdk::transaction::VersionedTransaction;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("failed to compile message: {0}")]
    Compile(String),
    #[error("{0} is not a required signer of the message")]
    UnexpectedSigner(String),
    #[error("serialize: {0}")]
    Serialize(String),
    #[error("transaction is {size} bytes, limit is {limit}")]
    TooLarge { size: usize, limit: usize },
    #[error("malformed transaction: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxVersion {
    Legacy,
    V0,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedTransaction {
    pub bytes: Vec<u8>,
    pub version: TxVersion,
    pub required_signatures: usize,
}

/// Compile, partially sign and serialize a transaction.
pub fn encode_unsigned(
    instructions: &[Instruction],
    fee_payer: &Pubkey,
    signers: &[&Keypair],
    tables: &[AddressLookupTableAccount],
    blockhash: Hash,
) -> Result<EncodedTransaction, EncodeError> {
    let (message, version) = if tables.is_empty() {
        (
            VersionedMessage::Legacy(Message::new_with_blockhash(
                instructions,
                Some(fee_payer),
                &blockhash,
            )),
            TxVersion::Legacy,
        )
    } else {
        let compiled = v0::Message::try_compile(fee_payer, instructions, tables, blockhash)
            .map_err(|e| EncodeError::Compile(e.to_string()))?;
        (VersionedMessage::V0(compiled), TxVersion::V0)
    };

    let required = message.header().num_required_signatures as usize;
    let mut signatures = vec![Signature::default(); required];
    let data = message.serialize();
    for signer in signers {
        let pubkey = signer.pubkey();
        let position = message.static_account_keys()[..required]
            .iter()
            .position(|k| *k == pubkey)
            .ok_or_else(|| EncodeError::UnexpectedSigner(pubkey.to_string()))?;
        signatures[position] = signer.sign_message(&data);
    }

    let tx = VersionedTransaction {
        signatures,
        message,
    };
    let bytes = bincode::serialize(&tx).map_err(|e| EncodeError::Serialize(e.to_string()))?;
    if bytes.len() > PACKET_DATA_SIZE {
        return Err(EncodeError::TooLarge {
            size: bytes.len(),
            limit: PACKET_DATA_SIZE,
        });
    }

    Ok(EncodedTransaction {
        bytes,
        version,
        required_signatures: required,
    })
}

/// Facts about a transaction returned by the external signer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedSummary {
    /// First signature, which identifies the transaction on the ledger.
    pub signature: String,
    pub fee_payer: Pubkey,
    /// Signature slots that are empty or do not verify.
    pub invalid_signatures: usize,
}

pub fn inspect_signed(bytes: &[u8]) -> Result<SignedSummary, EncodeError> {
    let tx: VersionedTransaction =
        bincode::deserialize(bytes).map_err(|e| EncodeError::Malformed(e.to_string()))?;
    let signature = tx
        .signatures
        .first()
        .ok_or_else(|| EncodeError::Malformed("no signatures".to_string()))?
        .to_string();
    let fee_payer = *tx
        .message
        .static_account_keys()
        .first()
        .ok_or_else(|| EncodeError::Malformed("no account keys".to_string()))?;
    let invalid_signatures = tx.verify_with_results().iter().filter(|ok| !**ok).count();
    Ok(SignedSummary {
        signature,
        fee_payer,
        invalid_signatures,
    })
}

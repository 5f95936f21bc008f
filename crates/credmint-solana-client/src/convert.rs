//! Conversions between core addresses and SDK keys.

use credmint_core::model::Address;
use solana_program::pubkey::Pubkey;

pub fn to_pubkey(address: &Address) -> Pubkey {
    Pubkey::new_from_array(address.to_bytes())
}

pub fn to_address(pubkey: &Pubkey) -> Address {
    Address::new_from_array(pubkey.to_bytes())
}

//! Institution on-chain profile.

use serde::{Deserialize, Serialize};

use super::address::Address;

/// A write-once address slot.
///
/// A slot starts `Unset` and moves to `Confirmed` only after reconciliation has
/// seen the creating transaction confirmed on the ledger. Nothing in this
/// workspace moves a slot back to `Unset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "state", content = "address", rename_all = "snake_case")]
pub enum AddressSlot {
    #[default]
    Unset,
    Confirmed(Address),
}

impl AddressSlot {
    pub fn address(&self) -> Option<Address> {
        match self {
            Self::Unset => None,
            Self::Confirmed(a) => Some(*a),
        }
    }

    pub fn is_set(&self) -> bool {
        matches!(self, Self::Confirmed(_))
    }
}

impl From<Option<Address>> for AddressSlot {
    fn from(v: Option<Address>) -> Self {
        v.map(Self::Confirmed).unwrap_or(Self::Unset)
    }
}

/// Which address slot of an institution a write targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressField {
    Registration,
    Tree,
    Collection,
    LookupTable,
}

impl AddressField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registration => "registration",
            Self::Tree => "tree",
            Self::Collection => "collection",
            Self::LookupTable => "lookup_table",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstitutionStatus {
    /// Not yet registered on-chain, or registered and awaiting approval.
    #[default]
    Pending,
    Approved,
    Suspended,
}

impl InstitutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Suspended => "suspended",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "suspended" => Some(Self::Suspended),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstitutionProfile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub logo_uri: Option<String>,
    /// Wallet that signs institution-scoped transactions.
    pub authority: Address,
    /// Platform wallet allowed to approve this institution.
    #[serde(default)]
    pub super_authority: Option<Address>,
    #[serde(default)]
    pub status: InstitutionStatus,
    #[serde(default)]
    pub registration: AddressSlot,
    #[serde(default)]
    pub tree: AddressSlot,
    #[serde(default)]
    pub collection: AddressSlot,
    #[serde(default)]
    pub lookup_table: AddressSlot,
}

impl InstitutionProfile {
    pub fn new(id: impl Into<String>, name: impl Into<String>, authority: Address) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            website: None,
            logo_uri: None,
            authority,
            super_authority: None,
            status: InstitutionStatus::Pending,
            registration: AddressSlot::Unset,
            tree: AddressSlot::Unset,
            collection: AddressSlot::Unset,
            lookup_table: AddressSlot::Unset,
        }
    }

    pub fn slot(&self, field: AddressField) -> AddressSlot {
        match field {
            AddressField::Registration => self.registration,
            AddressField::Tree => self.tree,
            AddressField::Collection => self.collection,
            AddressField::LookupTable => self.lookup_table,
        }
    }

    pub fn slot_mut(&mut self, field: AddressField) -> &mut AddressSlot {
        match field {
            AddressField::Registration => &mut self.registration,
            AddressField::Tree => &mut self.tree,
            AddressField::Collection => &mut self.collection,
            AddressField::LookupTable => &mut self.lookup_table,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_serializes_with_state_tag() {
        let a = Address::new_from_array([1u8; 32]);
        let json = serde_json::to_value(AddressSlot::Confirmed(a)).unwrap();
        assert_eq!(json["state"], "confirmed");
        assert_eq!(json["address"], a.to_string());

        let unset = serde_json::to_value(AddressSlot::Unset).unwrap();
        assert_eq!(unset["state"], "unset");
    }

    #[test]
    fn new_profile_has_no_addresses() {
        let p = InstitutionProfile::new("inst-1", "Example University", Address::default());
        for f in [
            AddressField::Registration,
            AddressField::Tree,
            AddressField::Collection,
            AddressField::LookupTable,
        ] {
            assert!(!p.slot(f).is_set(), "{} should start unset", f.as_str());
        }
    }
}

//! Credential metadata document.
//!
//! This is the JSON body a credential token's URI points at. It is built
//! deterministically from the credential record so that publishing the same
//! record twice yields the same bytes (and the same content-addressed URI).

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::model::CredentialRecord;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub trait_type: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentProperties {
    pub category: String,
    pub university: String,
    pub student_name: String,
    pub student_wallet: String,
    pub certificate_number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degree_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialDocument {
    pub name: String,
    pub symbol: String,
    pub description: String,
    pub image: String,
    pub attributes: Vec<Attribute>,
    pub properties: DocumentProperties,
}

impl CredentialDocument {
    pub fn build(record: &CredentialRecord, institution_name: &str, default_image: &str) -> Self {
        let mut attributes = vec![
            attr("University", institution_name),
            attr("Student", &record.student_name),
            attr("Certificate Number", &record.credential_number),
        ];
        if let Some(d) = &record.issued_on {
            attributes.push(attr("Issue Date", d));
        }
        if let Some(d) = &record.degree_type {
            attributes.push(attr("Degree Type", d));
        }
        if let Some(p) = &record.program {
            attributes.push(attr("Program", p));
        }

        Self {
            name: record.title.clone(),
            symbol: crate::limits::CREDENTIAL_SYMBOL.to_string(),
            description: format!(
                "{} awarded to {} by {}",
                record.title, record.student_name, institution_name
            ),
            image: record
                .image_uri
                .clone()
                .unwrap_or_else(|| default_image.to_string()),
            attributes,
            properties: DocumentProperties {
                category: "certificate".to_string(),
                university: institution_name.to_string(),
                student_name: record.student_name.clone(),
                student_wallet: record.recipient.to_string(),
                certificate_number: record.credential_number.clone(),
                issue_date: record.issued_on.clone(),
                degree_type: record.degree_type.clone(),
                program: record.program.clone(),
            },
        }
    }

    /// Serialized document bytes. Field order is fixed by the struct layout.
    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Hex sha256 of the serialized document.
    pub fn content_hash(&self) -> serde_json::Result<String> {
        let bytes = self.to_bytes()?;
        Ok(hex::encode(Sha256::digest(&bytes)))
    }
}

fn attr(trait_type: &str, value: &str) -> Attribute {
    Attribute {
        trait_type: trait_type.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Address, CredentialStatus};

    fn record() -> CredentialRecord {
        CredentialRecord {
            id: "cred-1".to_string(),
            institution_id: "inst-1".to_string(),
            credential_number: "EX-0001".to_string(),
            title: "BSc Computer Science".to_string(),
            student_name: "Ada Lovelace".to_string(),
            recipient: Address::new_from_array([9u8; 32]),
            degree_type: Some("Bachelor".to_string()),
            program: None,
            issued_on: Some("2024-06-30".to_string()),
            image_uri: None,
            content_uri: None,
            status: CredentialStatus::Pending,
            asset_id: None,
            leaf_index: None,
            mint_signature: None,
        }
    }

    #[test]
    fn optional_attributes_are_skipped() {
        let doc = CredentialDocument::build(&record(), "Example University", "https://img/x.png");
        let names: Vec<_> = doc.attributes.iter().map(|a| a.trait_type.as_str()).collect();
        assert_eq!(
            names,
            vec!["University", "Student", "Certificate Number", "Issue Date", "Degree Type"]
        );
        assert_eq!(doc.image, "https://img/x.png");
        let json = serde_json::to_value(&doc).unwrap();
        assert!(json["properties"].get("program").is_none());
        assert_eq!(json["properties"]["certificateNumber"], "EX-0001");
    }

    #[test]
    fn hash_is_stable() {
        let a = CredentialDocument::build(&record(), "Example University", "img");
        let b = CredentialDocument::build(&record(), "Example University", "img");
        assert_eq!(a.content_hash().unwrap(), b.content_hash().unwrap());
        let c = CredentialDocument::build(&record(), "Other University", "img");
        assert_ne!(a.content_hash().unwrap(), c.content_hash().unwrap());
    }
}

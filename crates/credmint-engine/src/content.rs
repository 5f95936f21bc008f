//! Publishing of generated credential metadata documents.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use credmint_core::config::ContentConfig;
use credmint_core::document::CredentialDocument;
use credmint_core::{CredmintError, CredmintResult};

const OPERATION: &str = "publish_content";

/// Makes a metadata document reachable and returns the URI that points at it.
#[async_trait]
pub trait ContentPublisher: Send + Sync {
    async fn publish(&self, document: &CredentialDocument) -> CredmintResult<String>;
}

/// Names each document by the sha256 of its bytes: `{base_uri}/{hash}.json`.
///
/// With an output directory the document is also written there under the same
/// file name, ready to be synced to whatever serves `base_uri`.
#[derive(Debug, Clone)]
pub struct ContentAddressedPublisher {
    base_uri: String,
    out_dir: Option<PathBuf>,
}

impl ContentAddressedPublisher {
    pub fn new(base_uri: impl Into<String>) -> Self {
        Self {
            base_uri: base_uri.into().trim_end_matches('/').to_string(),
            out_dir: None,
        }
    }

    pub fn from_config(cfg: &ContentConfig) -> Self {
        Self::new(cfg.base_uri.clone())
    }

    pub fn with_out_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.out_dir = Some(dir.into());
        self
    }

    pub fn uri_for(&self, hash: &str) -> String {
        format!("{}/{hash}.json", self.base_uri)
    }
}

#[async_trait]
impl ContentPublisher for ContentAddressedPublisher {
    async fn publish(&self, document: &CredentialDocument) -> CredmintResult<String> {
        let bytes = document
            .to_bytes()
            .map_err(|e| CredmintError::validation(OPERATION, e.to_string()))?;
        let hash = document
            .content_hash()
            .map_err(|e| CredmintError::validation(OPERATION, e.to_string()))?;

        if let Some(dir) = &self.out_dir {
            let path = dir.join(format!("{hash}.json"));
            let written = async {
                tokio::fs::create_dir_all(dir).await?;
                tokio::fs::write(&path, &bytes).await
            };
            written.await.map_err(|e: std::io::Error| {
                CredmintError::unavailable(OPERATION, format!("{}: {e}", path.display()))
            })?;
            debug!(path = %path.display(), "wrote credential document");
        }

        Ok(self.uri_for(&hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use credmint_core::model::{Address, CredentialRecord, CredentialStatus};

    fn record() -> CredentialRecord {
        CredentialRecord {
            id: "cred-1".into(),
            institution_id: "uni-1".into(),
            credential_number: "N-001".into(),
            title: "MSc Physics".into(),
            student_name: "Grace".into(),
            recipient: Address::from([4u8; 32]),
            degree_type: None,
            program: None,
            issued_on: None,
            image_uri: None,
            content_uri: None,
            status: CredentialStatus::Pending,
            asset_id: None,
            leaf_index: None,
            mint_signature: None,
        }
    }

    #[tokio::test]
    async fn uri_is_derived_from_document_hash() {
        let publisher = ContentAddressedPublisher::new("https://cdn.example/m/");
        let doc = CredentialDocument::build(&record(), "Uni One", "https://cdn.example/img.png");
        let uri = publisher.publish(&doc).await.unwrap();
        assert_eq!(uri, format!("https://cdn.example/m/{}.json", doc.content_hash().unwrap()));
        assert_eq!(publisher.publish(&doc).await.unwrap(), uri);
    }

    #[tokio::test]
    async fn writes_document_into_out_dir() {
        let dir = tempfile::tempdir().unwrap();
        let publisher =
            ContentAddressedPublisher::new("https://cdn.example/m").with_out_dir(dir.path());
        let doc = CredentialDocument::build(&record(), "Uni One", "https://cdn.example/img.png");
        publisher.publish(&doc).await.unwrap();

        let written = std::fs::read(
            dir.path()
                .join(format!("{}.json", doc.content_hash().unwrap())),
        )
        .unwrap();
        assert_eq!(written, doc.to_bytes().unwrap());
    }
}

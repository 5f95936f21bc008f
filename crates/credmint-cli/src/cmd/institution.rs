use std::path::Path;

use anyhow::{anyhow, Result};
use serde::Deserialize;

use credmint_core::model::{Address, InstitutionProfile};
use credmint_engine::{CollectionParams, Engine, TreeParams};

use crate::args::TreeArgs;
use crate::io::input::read_json_file;
use crate::output;

/// Institution profile as supplied on the command line.
#[derive(Debug, Deserialize)]
pub struct ProfileInput {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub logo_uri: Option<String>,
    pub authority: Address,
    #[serde(default)]
    pub super_authority: Option<Address>,
}

impl ProfileInput {
    fn into_profile(self) -> InstitutionProfile {
        let id = self
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let mut profile = InstitutionProfile::new(id, self.name, self.authority);
        profile.website = self.website;
        profile.logo_uri = self.logo_uri;
        profile.super_authority = self.super_authority;
        profile
    }
}

pub async fn register(engine: &Engine, profile_path: &Path) -> Result<()> {
    let input: ProfileInput = read_json_file(profile_path)?;
    let profile = input.into_profile();
    engine.store().put_institution(&profile)?;
    tracing::info!(institution_id = %profile.id, "stored institution profile");

    let operation = engine.prepare_register_institution(&profile.id).await?;
    output::print(&operation)
}

pub async fn approve(engine: &Engine, institution_id: &str) -> Result<()> {
    let operation = engine.prepare_approve_institution(institution_id).await?;
    output::print(&operation)
}

pub async fn create_tree(engine: &Engine, institution_id: &str, args: &TreeArgs) -> Result<()> {
    let params = tree_params(engine, args);
    let operation = engine.prepare_create_tree(institution_id, params).await?;
    output::print(&operation)
}

pub async fn create_collection(
    engine: &Engine,
    institution_id: &str,
    name: Option<String>,
    uri: Option<String>,
) -> Result<()> {
    let params = match (name, uri) {
        (None, None) => None,
        (Some(name), Some(uri)) => Some(CollectionParams { name, uri }),
        _ => return Err(anyhow!("--name and --uri must be given together")),
    };
    let operation = engine
        .prepare_create_collection(institution_id, params)
        .await?;
    output::print(&operation)
}

/// Explicit flags fill in over the configured defaults; no flags means defaults.
fn tree_params(engine: &Engine, args: &TreeArgs) -> Option<TreeParams> {
    if args.is_empty() {
        return None;
    }
    let mut params = TreeParams::from(engine.config().tree);
    if let Some(d) = args.max_depth {
        params.max_depth = d;
    }
    if let Some(b) = args.max_buffer_size {
        params.max_buffer_size = b;
    }
    if let Some(c) = args.canopy_depth {
        params.canopy_depth = c;
    }
    params.is_public |= args.public;
    Some(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_without_id_gets_one() {
        let input: ProfileInput = serde_json::from_str(
            r#"{ "name": "Example University", "authority": "11111111111111111111111111111111" }"#,
        )
        .unwrap();
        let profile = input.into_profile();
        assert!(!profile.id.is_empty());
        assert_eq!(profile.name, "Example University");
        assert!(profile.registration.address().is_none());
    }

    #[test]
    fn profile_keeps_given_id() {
        let input: ProfileInput = serde_json::from_str(
            r#"{
                "id": "uni-1",
                "name": "Example University",
                "website": "https://example.edu",
                "authority": "11111111111111111111111111111111"
            }"#,
        )
        .unwrap();
        let profile = input.into_profile();
        assert_eq!(profile.id, "uni-1");
        assert_eq!(profile.website.as_deref(), Some("https://example.edu"));
    }
}

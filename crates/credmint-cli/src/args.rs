use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(name = "credmint", version, about = "credmint CLI")]
pub struct Cli {
    /// Emit JSON output on stdout and JSON logs on stderr.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(flatten)]
    pub settings: Settings,

    #[command(subcommand)]
    pub command: Command,
}

/// Overrides applied on top of the config file.
#[derive(Args, Debug, Clone, Default)]
pub struct Settings {
    /// JSON config file (engine settings plus `store`).
    #[arg(long, global = true, env = "CREDMINT_CONFIG")]
    pub config: Option<PathBuf>,

    /// SQLite database path.
    #[arg(long, global = true, env = "CREDMINT_DB")]
    pub db: Option<PathBuf>,

    #[arg(long, global = true, env = "CREDMINT_RPC_URL")]
    pub rpc_url: Option<String>,

    #[arg(long, global = true, env = "CREDMINT_DAS_URL")]
    pub das_url: Option<String>,

    #[arg(long, global = true, env = "CREDMINT_DAS_API_KEY", hide_env_values = true)]
    pub das_api_key: Option<String>,

    #[arg(long, global = true, env = "CREDMINT_PROGRAM_ID")]
    pub program_id: Option<String>,

    #[arg(long, global = true, env = "CREDMINT_SUPER_AUTHORITY")]
    pub super_authority: Option<String>,

    /// Directory where generated credential metadata documents are written.
    #[arg(long, global = true, env = "CREDMINT_CONTENT_DIR")]
    pub content_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Store an institution profile and prepare its registration.
    Register {
        /// Profile JSON file (name, authority, optional id/website/logo_uri).
        #[arg(long)]
        profile: PathBuf,
    },

    /// Prepare the super-admin approval of a registered institution.
    Approve { institution_id: String },

    /// Prepare a compression tree for an institution.
    CreateTree {
        institution_id: String,
        #[command(flatten)]
        tree: TreeArgs,
    },

    /// Prepare the institution's collection.
    CreateCollection {
        institution_id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        uri: Option<String>,
    },

    /// Prepare a credential mint, or the setup operations it still needs.
    Mint {
        credential_id: String,
        /// Credential JSON file stored before preparing, if the id is unknown locally.
        #[arg(long)]
        from: Option<PathBuf>,
    },

    /// Prepare a credential burn, or the lookup table it still needs.
    Burn {
        credential_id: String,
        #[arg(long)]
        reason: String,
    },

    /// Submit a signed transaction and wait for confirmation.
    Submit {
        /// Base58 transaction, or `@path` to a file holding it.
        transaction: String,
        /// Prepared operation JSON; reconcile right after confirmation.
        #[arg(long)]
        operation: Option<PathBuf>,
    },

    /// Apply the local effect of a confirmed operation.
    Reconcile {
        signature: String,
        /// Prepared operation JSON as returned by a prepare command.
        #[arg(long)]
        operation: PathBuf,
    },

    /// Show the ledger status of a transaction signature.
    Status { signature: String },

    /// Check configuration, store and ledger connectivity.
    Doctor,
}

#[derive(Args, Debug, Clone, Default)]
pub struct TreeArgs {
    #[arg(long)]
    pub max_depth: Option<u32>,
    #[arg(long)]
    pub max_buffer_size: Option<u32>,
    #[arg(long)]
    pub canopy_depth: Option<u32>,
    #[arg(long)]
    pub public: bool,
}

impl TreeArgs {
    pub fn is_empty(&self) -> bool {
        self.max_depth.is_none()
            && self.max_buffer_size.is_none()
            && self.canopy_depth.is_none()
            && !self.public
    }
}

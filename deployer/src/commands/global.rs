//! Flags accepted by every command.
use std::path::PathBuf;

use crate::{
    account::AccountProvisioner,
    artifact::HardhatArtifacts,
    config::{
        Config, ConfigError, ARTIFACTS_DIR, CREDENTIALS_FILE,
        FINALITY_TIMEOUT_SECS, RPC_ENDPOINT,
    },
    credentials::EnvFileStore,
    network::RpcNetwork,
    session::Session,
};

/// Flags shared by every command, each backed by its environment variable.
#[derive(Debug, clap::Args, Clone, Default)]
#[group(skip)]
pub struct Args {
    /// JSON-RPC endpoint of the network
    #[arg(long, env = RPC_ENDPOINT, global = true)]
    pub rpc_url: Option<String>,

    /// Root of the compiled Hardhat artifacts [default: artifacts]
    #[arg(long, env = ARTIFACTS_DIR, global = true)]
    pub artifacts_dir: Option<PathBuf>,

    /// Dotenv file new account credentials are written to [default: .env]
    #[arg(long, env = CREDENTIALS_FILE, global = true)]
    pub credentials_file: Option<PathBuf>,

    /// Seconds to wait for a transaction to finalize [default: 120]
    #[arg(long, env = FINALITY_TIMEOUT_SECS, global = true)]
    pub timeout_secs: Option<u64>,
}

impl Args {
    /// Flags layered over the process environment.
    ///
    /// # Errors
    ///
    /// May fail if the endpoint is missing or a value is malformed.
    pub fn config(&self) -> Result<Config, ConfigError> {
        Config::from_lookup(|name| match name {
            RPC_ENDPOINT => self.rpc_url.clone(),
            ARTIFACTS_DIR => {
                self.artifacts_dir.as_ref().map(|p| p.display().to_string())
            }
            CREDENTIALS_FILE => self
                .credentials_file
                .as_ref()
                .map(|p| p.display().to_string()),
            FINALITY_TIMEOUT_SECS => self.timeout_secs.map(|s| s.to_string()),
            _ => std::env::var(name).ok(),
        })
    }
}

/// Provisions the configured account and binds it to the network.
///
/// # Errors
///
/// May fail if the faucet isn't configured or provisioning fails.
pub async fn session(
    config: &Config,
) -> eyre::Result<Session<RpcNetwork, HardhatArtifacts>> {
    let faucet = config.faucet()?;
    let network = RpcNetwork::new(config.rpc_url.clone())
        .with_request_timeout(config.finality.timeout);
    let store = EnvFileStore::new(&config.credentials_file);

    let account = AccountProvisioner::new(&network, &store, faucet)
        .with_credentials(config.credentials.clone())
        .with_finality(config.finality)
        .provision()
        .await?;

    let artifacts = HardhatArtifacts::new(&config.artifacts_dir);
    Ok(Session::new(network, account, artifacts).with_finality(config.finality))
}

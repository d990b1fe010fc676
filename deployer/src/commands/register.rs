//! `register-contract`, and where sources are read from.
use std::path::PathBuf;

use alloy::primitives::Address;
use clap::Parser;

use super::global;
use crate::{
    artifact::IMPLEMENTATION_V1,
    network::RpcNetwork,
    verify::{SourceTree, VerificationRegistrar},
};

/// Where Solidity sources are read from.
#[derive(Debug, clap::Args, Clone)]
#[group(skip)]
pub struct SourceArgs {
    /// Directory holding the project's contracts
    #[arg(long, default_value = "contracts")]
    pub contracts_dir: PathBuf,

    /// Directory `@scope/…` imports are resolved in
    #[arg(long, default_value = "node_modules")]
    pub node_modules: PathBuf,
}

impl From<&SourceArgs> for SourceTree {
    fn from(args: &SourceArgs) -> Self {
        SourceTree::new(&args.contracts_dir, &args.node_modules)
    }
}

/// Register a deployed contract's sources with the compilation service.
#[derive(Parser, Debug, Clone)]
pub struct Cmd {
    /// Address of the deployed contract
    #[arg(long)]
    pub address: Address,

    /// Name of the contract, its source being `<contracts-dir>/<name>.sol`
    #[arg(long, default_value = IMPLEMENTATION_V1)]
    pub contract: String,

    /// Where the contract's sources are read from
    #[command(flatten)]
    pub sources: SourceArgs,
}

impl Cmd {
    /// Runs the command with `global` flags.
    ///
    /// # Errors
    ///
    /// May fail if configuration is incomplete or the workflow fails.
    pub async fn run(&self, global: &global::Args) -> eyre::Result<()> {
        let config = global.config()?;
        let network = RpcNetwork::new(config.rpc_url)
            .with_request_timeout(config.finality.timeout);

        VerificationRegistrar::new(&network, SourceTree::from(&self.sources))
            .register(&self.contract, self.address)
            .await?;
        println!("Registered {} at {}", self.contract, self.address);
        Ok(())
    }
}

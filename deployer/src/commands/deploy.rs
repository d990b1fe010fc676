//! `deploy-uups-proxy`.
use std::{fs, path::PathBuf};

use clap::Parser;
use tracing::info;

use super::{global, PROXY_ADDRESS_FILE};
use crate::{
    abi::parse_args,
    artifact::IMPLEMENTATION_V1,
    proxy::{deploy_uups_proxy, INITIALIZE},
    verify::{SourceTree, VerificationRegistrar},
};

/// Deploy the first implementation behind a new UUPS proxy.
#[derive(Parser, Debug, Clone)]
pub struct Cmd {
    /// Arguments of `initialize`, typed after the implementation's ABI
    #[arg(long, num_args = 0.., default_values = ["42"])]
    pub initialize_args: Vec<String>,

    /// Name of the implementation contract
    #[arg(long, default_value = IMPLEMENTATION_V1)]
    pub contract: String,

    /// File the proxy address is written to
    #[arg(long, default_value = PROXY_ADDRESS_FILE)]
    pub output: PathBuf,

    /// Also register the implementation's sources once deployed
    #[arg(long)]
    pub register: bool,

    /// Where `--register` reads sources from
    #[command(flatten)]
    pub sources: super::register::SourceArgs,
}

impl Cmd {
    /// Runs the command with `global` flags.
    ///
    /// # Errors
    ///
    /// May fail if configuration is incomplete or the workflow fails.
    pub async fn run(&self, global: &global::Args) -> eyre::Result<()> {
        let config = global.config()?;
        let session = global::session(&config).await?;

        let implementation = session.artifact(&self.contract)?;
        let init_args =
            parse_args(&implementation, INITIALIZE, &self.initialize_args)?;
        let deployment =
            deploy_uups_proxy(&session, &implementation, &init_args).await?;

        fs::write(&self.output, deployment.proxy.to_string())?;
        info!(
            proxy = %deployment.proxy,
            implementation = %deployment.implementation,
            output = %self.output.display(),
            "deployment complete"
        );

        if self.register {
            let sources = SourceTree::from(&self.sources);
            VerificationRegistrar::new(session.network(), sources)
                .register_or_log(&self.contract, deployment.implementation)
                .await;
        }

        println!("Proxy: {}", deployment.proxy);
        println!("Implementation: {}", deployment.implementation);
        Ok(())
    }
}

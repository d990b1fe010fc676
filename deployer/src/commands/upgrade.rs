//! `upgrade-uups-proxy`.
use std::{fs, io::ErrorKind, path::PathBuf};

use alloy::primitives::Address;
use clap::Parser;
use eyre::{bail, WrapErr};
use tracing::{error, info};

use super::{global, PROXY_ADDRESS_FILE};
use crate::{
    abi::parse_args,
    artifact::IMPLEMENTATION_V2,
    proxy::{upgrade_uups_proxy, REINITIALIZE},
};

/// Upgrade a UUPS proxy to the second implementation.
#[derive(Parser, Debug, Clone)]
pub struct Cmd {
    /// Address of the deployed proxy, read from `--proxy-file` if omitted
    #[arg(long)]
    pub proxy: Option<String>,

    /// File written by `deploy-uups-proxy`
    #[arg(long, default_value = PROXY_ADDRESS_FILE)]
    pub proxy_file: PathBuf,

    /// Name of the new implementation contract
    #[arg(long, default_value = IMPLEMENTATION_V2)]
    pub contract: String,

    /// Arguments of `reinitializeV2`; it isn't called when none are given
    #[arg(long, num_args = 0..)]
    pub reinitialize_args: Vec<String>,
}

impl Cmd {
    /// The proxy to upgrade, from the flag or the deployment's output file.
    ///
    /// # Errors
    ///
    /// May fail if neither names a proxy or the address is malformed.
    pub fn proxy(&self) -> eyre::Result<Address> {
        let proxy = match &self.proxy {
            Some(proxy) => proxy.trim().to_owned(),
            None => match fs::read_to_string(&self.proxy_file) {
                Ok(contents) => contents.trim().to_owned(),
                Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
                Err(e) => return Err(e.into()),
            },
        };
        if proxy.is_empty() {
            error!("no deployed proxy address found, run `deploy-uups-proxy` first");
            bail!("no proxy address");
        }
        proxy
            .parse()
            .wrap_err_with(|| format!("invalid proxy address `{proxy}`"))
    }

    /// Runs the command with `global` flags.
    ///
    /// # Errors
    ///
    /// May fail if configuration is incomplete or the workflow fails.
    pub async fn run(&self, global: &global::Args) -> eyre::Result<()> {
        let proxy = self.proxy()?;
        let config = global.config()?;
        let session = global::session(&config).await?;

        let implementation = session.artifact(&self.contract)?;
        let reinit_args = if self.reinitialize_args.is_empty() {
            vec![]
        } else {
            parse_args(&implementation, REINITIALIZE, &self.reinitialize_args)?
        };
        let upgraded =
            upgrade_uups_proxy(&session, proxy, &implementation, &reinit_args)
                .await?;

        info!(%proxy, implementation = %upgraded, "upgrade complete");
        println!("Implementation: {upgraded}");
        Ok(())
    }
}

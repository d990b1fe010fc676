//! Command-line interface over the deployment workflows.
use std::str::FromStr;

use clap::{CommandFactory, FromArgMatches, Parser};

pub mod deploy;
pub mod global;
pub mod register;
pub mod scenario;
pub mod smart_account;
pub mod upgrade;

/// File the proxy address is written to after deployment, and read back by
/// `upgrade-uups-proxy` when `--proxy` is omitted.
pub const PROXY_ADDRESS_FILE: &str = "proxyAddress.txt";

/// Deploy and upgrade UUPS proxies from a funded account.
#[derive(Parser, Debug)]
#[command(name = "uups-deployer", disable_help_subcommand = true)]
pub struct Root {
    /// Flags shared by every command
    #[command(flatten)]
    pub global: global::Args,
    /// The command to run
    #[command(subcommand)]
    pub cmd: Cmd,
}

impl Root {
    /// Parses `itr` as command-line arguments, program name first.
    ///
    /// # Errors
    ///
    /// May fail if the arguments don't match any command.
    pub fn from_arg_matches<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::from_arg_matches_mut(&mut Self::command().try_get_matches_from(itr)?)
    }

    /// Runs the selected command.
    ///
    /// # Errors
    ///
    /// Whatever the command fails with.
    pub async fn run(&self) -> eyre::Result<()> {
        match &self.cmd {
            Cmd::DeployUupsProxy(cmd) => cmd.run(&self.global).await,
            Cmd::UpgradeUupsProxy(cmd) => cmd.run(&self.global).await,
            Cmd::SmartAccount(cmd) => cmd.run(&self.global).await,
            Cmd::TestUupsPattern(cmd) => cmd.run(&self.global).await,
            Cmd::RegisterContract(cmd) => cmd.run(&self.global).await,
        }
    }
}

impl FromStr for Root {
    type Err = clap::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_arg_matches(s.split_whitespace())
    }
}

/// Deploy and upgrade UUPS proxies from a funded account.
#[derive(Parser, Debug)]
pub enum Cmd {
    /// Deploy the first implementation behind a new UUPS proxy
    DeployUupsProxy(deploy::Cmd),
    /// Upgrade a UUPS proxy to the second implementation
    UpgradeUupsProxy(upgrade::Cmd),
    /// Print the address of the account deployments are made from
    SmartAccount(smart_account::Cmd),
    /// Deploy, upgrade and use the example contracts end to end
    TestUupsPattern(scenario::Cmd),
    /// Register a deployed contract's sources with the compilation service
    RegisterContract(register::Cmd),
}

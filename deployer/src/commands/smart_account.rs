//! `smart-account`.
use clap::Parser;

use super::global;

/// Print the address of the account deployments are made from.
#[derive(Parser, Debug, Clone)]
pub struct Cmd {}

impl Cmd {
    /// Runs the command with `global` flags.
    ///
    /// # Errors
    ///
    /// May fail if configuration is incomplete or the workflow fails.
    pub async fn run(&self, global: &global::Args) -> eyre::Result<()> {
        let config = global.config()?;
        let session = global::session(&config).await?;
        println!("Smart account: {}", session.account().address());
        Ok(())
    }
}

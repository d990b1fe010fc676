//! `test-uups-pattern`.
use clap::Parser;

use super::global;
use crate::scenario::run_scenario;

/// Deploy, upgrade and use the example contracts end to end.
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
        let faucet = config.faucet()?;
        let session = global::session(&config).await?;

        let report = run_scenario(&session, faucet).await?;

        println!("Proxy: {}", report.proxy);
        println!("Implementation V1: {}", report.implementation_v1);
        println!("Implementation V2: {}", report.implementation_v2);
        println!("Value after initialization: {}", report.value_after_initialization);
        println!("Value after upgrade: {}", report.value_after_upgrade);
        println!("Balance after deposit: {}", report.balance);
        Ok(())
    }
}

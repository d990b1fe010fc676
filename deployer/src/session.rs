//! An account bound to a network for the duration of a workflow.
use alloy::{
    dyn_abi::DynSolValue,
    primitives::{Address, TxHash, U256},
};
use tracing::{debug, info};

use crate::{
    abi::{decode_output, encode_call},
    account::Account,
    artifact::{ArtifactProvider, ContractArtifact},
    deploy::Deployer,
    finality::{wait_finalized, FinalityPolicy},
    network::{Call, Network},
    Result,
};

/// A provisioned account bound to a network and an artifact source.
///
/// Every workflow takes the session explicitly; nothing about the active
/// account is global.
pub struct Session<N, A> {
    network: N,
    account: Account,
    artifacts: A,
    finality: FinalityPolicy,
}

impl<N: Network, A: ArtifactProvider> Session<N, A> {
    /// Session acting as `account` on `network`.
    pub fn new(network: N, account: Account, artifacts: A) -> Self {
        Self {
            network,
            account,
            artifacts,
            finality: FinalityPolicy::default(),
        }
    }

    /// Poll finalization with `policy`.
    #[must_use]
    pub fn with_finality(mut self, policy: FinalityPolicy) -> Self {
        self.finality = policy;
        self
    }

    /// The network transactions are sent to.
    #[must_use]
    pub fn network(&self) -> &N {
        &self.network
    }

    /// The account signing every transaction.
    #[must_use]
    pub fn account(&self) -> &Account {
        &self.account
    }

    /// Compiled artifact of contract `name`.
    ///
    /// # Errors
    ///
    /// May fail if the artifact is missing or malformed.
    pub fn artifact(&self, name: &str) -> Result<ContractArtifact> {
        self.artifacts.artifact(name)
    }

    /// Deployer of `artifact` from this session's account.
    pub fn deployer<'s>(
        &'s self,
        artifact: &'s ContractArtifact,
    ) -> Deployer<'s, N> {
        Deployer::new(&self.network, &self.account, artifact)
            .with_finality(self.finality)
    }

    /// Block until `hash` is finalized.
    ///
    /// # Errors
    ///
    /// May fail if the transaction reverts or doesn't finalize in time.
    pub async fn wait(&self, hash: TxHash) -> Result<()> {
        wait_finalized(&self.network, hash, &self.finality).await
    }

    /// Call `function` on `to` in a transaction and wait for it.
    ///
    /// # Errors
    ///
    /// May fail if the call can't be encoded, reverts or doesn't finalize.
    pub async fn transact(
        &self,
        to: Address,
        artifact: &ContractArtifact,
        function: &str,
        args: &[DynSolValue],
        value: U256,
    ) -> Result<TxHash> {
        let data = encode_call(artifact, function, args)?;
        let call = Call::new(to, data).with_value(value);
        let hash = self.network.send(&self.account, call).await?;
        debug!(%to, function, %hash, "transaction sent");
        self.wait(hash).await?;
        info!(%to, function, %hash, "transaction finalized");
        Ok(hash)
    }

    /// Call view `function` on `to` and decode what it returns.
    ///
    /// # Errors
    ///
    /// May fail if the call can't be encoded, reverts or returns malformed
    /// data.
    pub async fn read(
        &self,
        to: Address,
        artifact: &ContractArtifact,
        function: &str,
        args: &[DynSolValue],
    ) -> Result<Vec<DynSolValue>> {
        let data = encode_call(artifact, function, args)?;
        let output = self.network.call(to, data).await?;
        decode_output(artifact, function, args.len(), &output)
    }

    /// Fund the account with `amount` from `faucet` and wait for it.
    ///
    /// # Errors
    ///
    /// May fail if the faucet refuses or the transfer doesn't finalize.
    pub async fn top_up(&self, faucet: Address, amount: U256) -> Result<()> {
        let hash = self
            .network
            .top_up(faucet, self.account.address(), amount)
            .await?;
        self.wait(hash).await?;
        info!(%amount, address = %self.account.address(), "account topped up");
        Ok(())
    }
}

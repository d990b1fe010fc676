//! Contract deployment through the CREATE2 factory.
use alloy::{
    dyn_abi::DynSolValue,
    primitives::{address, Address, Bytes, TxHash, B256, U256},
};
use rand::Rng;
use tracing::info;

use crate::{
    abi::encode_constructor,
    account::Account,
    artifact::ContractArtifact,
    finality::{wait_finalized, FinalityPolicy},
    network::Network,
    Result,
};

/// The keyless CREATE2 factory present on most EVM networks.
pub const CREATE2_FACTORY: Address =
    address!("4e59b44847b379578588920ca78fbf26c0b4956c");

/// Salts are drawn from `[0, SALT_RANGE)`.
pub const SALT_RANGE: u64 = 10_000;

/// Everything needed to put a contract on-chain.
#[derive(Clone, Debug)]
pub struct DeployRequest {
    /// Name of the contract, for logs and errors.
    pub contract: String,
    /// Creation bytecode.
    pub bytecode: Bytes,
    /// ABI-encoded constructor arguments.
    pub constructor_args: Bytes,
    /// CREATE2 salt.
    pub salt: U256,
    /// Largest fee the deployment may cost.
    pub fee_credit: Option<U256>,
}

impl DeployRequest {
    /// Bytecode followed by the constructor arguments.
    #[must_use]
    pub fn init_code(&self) -> Bytes {
        [self.bytecode.as_ref(), self.constructor_args.as_ref()]
            .concat()
            .into()
    }

    /// The salt as a 32-byte word.
    #[must_use]
    pub fn salt_word(&self) -> B256 {
        B256::from(self.salt.to_be_bytes::<32>())
    }

    /// Address the contract will live at.
    #[must_use]
    pub fn address(&self) -> Address {
        create2_address(self.salt_word(), &self.init_code())
    }
}

/// Where [`CREATE2_FACTORY`] places `init_code` deployed with `salt`.
#[must_use]
pub fn create2_address(salt: B256, init_code: &[u8]) -> Address {
    CREATE2_FACTORY.create2_from_code(salt.0, init_code)
}

/// A fresh salt in `[0, SALT_RANGE)`.
///
/// Not cryptographically random: two deployments of the same code may
/// collide, which the network reports as an occupied address.
#[must_use]
pub fn random_salt() -> U256 {
    U256::from(rand::rng().random_range(0..SALT_RANGE))
}

/// A finalized deployment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeploymentResult {
    /// Address of the new contract.
    pub address: Address,
    /// Hash of the deployment transaction.
    pub tx_hash: TxHash,
}

/// Deploys a contract artifact from an account.
pub struct Deployer<'a, N> {
    network: &'a N,
    account: &'a Account,
    artifact: &'a ContractArtifact,
    finality: FinalityPolicy,
    ctr_args: Vec<DynSolValue>,
    fee_credit: Option<U256>,
    salt: Option<U256>,
}

impl<'a, N: Network> Deployer<'a, N> {
    /// Deployer of `artifact`, signed and paid by `account`.
    pub fn new(
        network: &'a N,
        account: &'a Account,
        artifact: &'a ContractArtifact,
    ) -> Self {
        Self {
            network,
            account,
            artifact,
            finality: FinalityPolicy::default(),
            ctr_args: vec![],
            fee_credit: None,
            salt: None,
        }
    }

    /// Add solidity constructor arguments to the deployer.
    #[must_use]
    pub fn with_constructor(mut self, ctr_args: Vec<DynSolValue>) -> Self {
        self.ctr_args = ctr_args;
        self
    }

    /// Refuse to deploy if the estimated fee exceeds `credit`.
    #[must_use]
    pub fn with_fee_credit(mut self, credit: U256) -> Self {
        self.fee_credit = Some(credit);
        self
    }

    /// Use `salt` instead of a random one.
    #[must_use]
    pub fn with_salt(mut self, salt: U256) -> Self {
        self.salt = Some(salt);
        self
    }

    /// Poll finalization with `policy`.
    #[must_use]
    pub fn with_finality(mut self, policy: FinalityPolicy) -> Self {
        self.finality = policy;
        self
    }

    /// The request [`Self::deploy`] submits.
    ///
    /// # Errors
    ///
    /// May fail if the constructor arguments don't match the ABI.
    pub fn request(&self) -> Result<DeployRequest> {
        Ok(DeployRequest {
            contract: self.artifact.contract_name.clone(),
            bytecode: self.artifact.bytecode.clone(),
            constructor_args: encode_constructor(
                self.artifact,
                &self.ctr_args,
            )?,
            salt: self.salt.unwrap_or_else(random_salt),
            fee_credit: self.fee_credit,
        })
    }

    /// Submit the deployment and wait for it to finalize.
    /// Consumes currently configured deployer.
    ///
    /// # Errors
    ///
    /// May error if:
    ///
    /// - The constructor arguments don't match the ABI.
    /// - The network refuses the deployment.
    /// - The transaction reverts or doesn't finalize in time.
    pub async fn deploy(self) -> Result<DeploymentResult> {
        let request = self.request()?;
        info!(
            contract = %request.contract,
            salt = %request.salt,
            "deploying contract"
        );

        let result = self.network.deploy(self.account, &request).await?;
        wait_finalized(self.network, result.tx_hash, &self.finality).await?;

        info!(
            contract = %request.contract,
            address = %result.address,
            tx_hash = %result.tx_hash,
            "contract deployed"
        );
        Ok(result)
    }
}

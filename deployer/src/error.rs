//! Errors of the deployment workflows.
use std::{path::PathBuf, time::Duration};

use alloy::{
    primitives::{Address, TxHash, U256},
    transports::TransportError,
};

use crate::config::ConfigError;

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Every way a deployment workflow can fail.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Required configuration is missing or malformed.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// No compiled artifact exists for the contract.
    #[error("artifact for `{name}` not found at {}", path.display())]
    ArtifactNotFound {
        /// Contract name that was looked up.
        name: String,
        /// Where the artifact was expected.
        path: PathBuf,
    },
    /// A Solidity source file could not be found.
    #[error("source file {} not found", .0.display())]
    SourceNotFound(PathBuf),
    /// The artifact carries no creation bytecode (e.g. an interface).
    #[error("artifact for `{0}` has no bytecode")]
    EmptyBytecode(String),
    /// The contract's ABI lacks a function the workflow relies on.
    #[error("`{contract}` has no function `{function}` in its ABI")]
    MissingFunction {
        /// Contract whose ABI was searched.
        contract: String,
        /// Function that wasn't found.
        function: String,
    },
    /// Wrong number of arguments for an ABI function.
    #[error("`{function}` expects {expected} argument(s), got {actual}")]
    ArgumentCount {
        /// Function being encoded.
        function: String,
        /// Number of inputs declared in the ABI.
        expected: usize,
        /// Number of arguments supplied.
        actual: usize,
    },
    /// A call returned data that doesn't match the expected shape.
    #[error("unexpected return data from `{0}`")]
    UnexpectedReturn(String),
    /// ABI encoding or decoding failed.
    #[error(transparent)]
    Abi(#[from] alloy::dyn_abi::Error),
    /// The node rejected a request or could not be reached.
    #[error(transparent)]
    Rpc(#[from] TransportError),
    /// A transaction was finalized with a failed status.
    #[error("transaction {0} reverted")]
    TransactionFailed(TxHash),
    /// A transaction did not finalize within the configured timeout.
    #[error("transaction {hash} not finalized after {elapsed:?}")]
    FinalizationTimeout {
        /// Hash of the pending transaction.
        hash: TxHash,
        /// Time spent polling.
        elapsed: Duration,
    },
    /// The node did not answer a request in time.
    #[error("{method} got no answer within {after:?}")]
    RequestTimeout {
        /// JSON-RPC method that was called.
        method: &'static str,
        /// How long the request was given.
        after: Duration,
    },
    /// Code already lives at the address the salt derives to.
    #[error("a contract is already deployed at {0}, use another salt")]
    AddressOccupied(Address),
    /// The network has no CREATE2 factory to deploy through.
    #[error("no CREATE2 factory deployed at {0}")]
    MissingCreate2Factory(Address),
    /// The estimated fee is larger than the allowed fee credit.
    #[error("estimated fee {estimated} exceeds fee credit {credit}")]
    FeeBudgetExceeded {
        /// Estimated gas multiplied by the gas price.
        estimated: U256,
        /// Budget supplied with the deployment.
        credit: U256,
    },
    /// The persisted private key does not control the persisted address.
    #[error("private key controls {derived}, but credentials name {stored}")]
    CredentialMismatch {
        /// Address found in the credential store.
        stored: Address,
        /// Address derived from the private key.
        derived: Address,
    },
    /// The persisted private key could not be parsed.
    #[error("invalid private key: {0}")]
    InvalidKey(#[from] alloy::signers::local::LocalSignerError),
    /// The proxy still reports another implementation after an upgrade.
    #[error("proxy {proxy} points to {reported}, expected {expected}")]
    UpgradeNotApplied {
        /// Proxy that was upgraded.
        proxy: Address,
        /// Freshly deployed implementation.
        expected: Address,
        /// Implementation reported by the proxy.
        reported: Address,
    },
    /// The credential store could not be parsed.
    #[error(transparent)]
    Dotenv(#[from] dotenvy::Error),
    /// An internal pattern failed to compile.
    #[error(transparent)]
    Regex(#[from] regex::Error),
    /// A file could not be read or written.
    #[error(transparent)]
    Io(#[from] std::io::Error),
    /// JSON could not be encoded or decoded.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

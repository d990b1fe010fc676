//! Environment-driven configuration.
//!
//! Every value is looked up by its environment variable name, so the same
//! validation runs whether the values come from the process environment, a
//! `.env` file loaded with `dotenvy`, or command-line flags.
use std::{path::PathBuf, str::FromStr, time::Duration};

use alloy::{primitives::Address, transports::http::reqwest::Url};

use crate::{credentials::Credentials, finality::FinalityPolicy};

/// JSON-RPC endpoint of the network.
pub const RPC_ENDPOINT: &str = "NIL_RPC_ENDPOINT";
/// Address of the faucet contract used to fund the account.
pub const FAUCET_ADDRESS: &str = "NIL";
/// Private key of an existing account.
pub const PRIVATE_KEY: &str = "PRIVATE_KEY";
/// Address of an existing account.
pub const SMART_ACCOUNT_ADDRESS: &str = "SMART_ACCOUNT_ADDRESS";
/// Root of the compiled Hardhat artifacts.
pub const ARTIFACTS_DIR: &str = "ARTIFACTS_DIR";
/// File new credentials are persisted to.
pub const CREDENTIALS_FILE: &str = "CREDENTIALS_FILE";
/// Seconds to wait for a transaction to finalize.
pub const FINALITY_TIMEOUT_SECS: &str = "FINALITY_TIMEOUT_SECS";

const DEFAULT_ARTIFACTS_DIR: &str = "artifacts";
const DEFAULT_CREDENTIALS_FILE: &str = ".env";

/// Missing or malformed configuration.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A required variable is unset or empty.
    #[error("missing required environment variable `{0}`")]
    Missing(&'static str),
    /// A variable is set but cannot be parsed.
    #[error("`{name}` is not a valid {kind}: {value}")]
    Invalid {
        /// Variable name.
        name: &'static str,
        /// What the value should have been.
        kind: &'static str,
        /// The offending value.
        value: String,
    },
}

/// Validated settings for a session.
#[derive(Clone, Debug)]
pub struct Config {
    /// JSON-RPC endpoint.
    pub rpc_url: Url,
    /// Faucet contract, required only when funding.
    pub faucet: Option<Address>,
    /// Credentials of an existing account, when both halves are set.
    pub credentials: Option<Credentials>,
    /// Root of the compiled artifacts.
    pub artifacts_dir: PathBuf,
    /// Where newly generated credentials are written.
    pub credentials_file: PathBuf,
    /// How long to poll for finalization.
    pub finality: FinalityPolicy,
}

impl Config {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// May fail if [`RPC_ENDPOINT`] is unset or any value is malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`, which maps a variable name
    /// to its value. Blank values count as unset.
    ///
    /// # Errors
    ///
    /// May fail if [`RPC_ENDPOINT`] is unset or any value is malformed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        let rpc_url = get(RPC_ENDPOINT).ok_or(ConfigError::Missing(RPC_ENDPOINT))?;
        let rpc_url = parse(RPC_ENDPOINT, "URL", rpc_url)?;

        let faucet = get(FAUCET_ADDRESS)
            .map(|value| parse(FAUCET_ADDRESS, "address", value))
            .transpose()?;

        // A key without its address (or the reverse) can't be reused.
        let credentials = match (get(PRIVATE_KEY), get(SMART_ACCOUNT_ADDRESS)) {
            (Some(private_key), Some(address)) => Some(Credentials {
                private_key,
                address: parse(SMART_ACCOUNT_ADDRESS, "address", address)?,
            }),
            _ => None,
        };

        let mut finality = FinalityPolicy::default();
        if let Some(secs) = get(FINALITY_TIMEOUT_SECS) {
            let secs: u64 = parse(FINALITY_TIMEOUT_SECS, "number of seconds", secs)?;
            finality = finality.with_timeout(Duration::from_secs(secs));
        }

        Ok(Config {
            rpc_url,
            faucet,
            credentials,
            artifacts_dir: get(ARTIFACTS_DIR)
                .unwrap_or_else(|| DEFAULT_ARTIFACTS_DIR.to_owned())
                .into(),
            credentials_file: get(CREDENTIALS_FILE)
                .unwrap_or_else(|| DEFAULT_CREDENTIALS_FILE.to_owned())
                .into(),
            finality,
        })
    }

    /// The faucet address.
    ///
    /// # Errors
    ///
    /// May fail if [`FAUCET_ADDRESS`] was not configured.
    pub fn faucet(&self) -> Result<Address, ConfigError> {
        self.faucet.ok_or(ConfigError::Missing(FAUCET_ADDRESS))
    }
}

fn parse<T: FromStr>(
    name: &'static str,
    kind: &'static str,
    value: String,
) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::Invalid { name, kind, value })
}

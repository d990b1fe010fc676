//! Deploy and upgrade UUPS proxies on a nil network.
//!
//! Deployments go through the canonical CREATE2 factory from an account that
//! is provisioned once and funded through the faucet. A [`session::Session`]
//! binds that account to a [`network::Network`] and the compiled artifacts;
//! the workflows in [`proxy`] and [`scenario`] are written against it, and
//! [`commands`] exposes them from the command line.
mod error;

pub mod abi;
pub mod account;
pub mod artifact;
pub mod commands;
pub mod config;
pub mod credentials;
pub mod deploy;
pub mod finality;
pub mod network;
pub mod proxy;
pub mod scenario;
pub mod session;
pub mod verify;

#[cfg(test)]
mod testing;

pub use account::{Account, AccountProvisioner};
pub use commands::Root;
pub use config::Config;
pub use deploy::{Deployer, DeploymentResult};
pub use error::{Error, Result};
pub use network::{Network, RpcNetwork};
pub use proxy::{deploy_uups_proxy, upgrade_uups_proxy, ProxyDeployment};
pub use session::Session;

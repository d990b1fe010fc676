//! Deployment and upgrade of UUPS proxies.
//!
//! A proxy moves through `Uninitialized → Initialized(V1) → Upgraded(V2)`,
//! optionally followed by `Reinitialized(V2)`. Each transition is confirmed
//! by reading the proxy back once the transaction is finalized.
use alloy::{
    dyn_abi::DynSolValue,
    primitives::{uint, Address, U256},
};
use tracing::{error, info, warn};

use crate::{
    abi::{encode_call, single_address, single_uint},
    artifact::{ArtifactProvider, ContractArtifact, PROXY},
    network::Network,
    session::Session,
    Error, Result,
};

/// Initializer of the first implementation.
pub const INITIALIZE: &str = "initialize";
/// Initializer of the second implementation.
pub const REINITIALIZE: &str = "reinitializeV2";
/// UUPS upgrade entry point.
pub const UPGRADE: &str = "upgradeToAndCall";
/// Proxy getter for the current implementation.
pub const GET_IMPLEMENTATION: &str = "getImplementation";
/// State read through the proxy to check it is wired up.
pub const PROBE: &str = "getValue";

/// Fee credit of implementation deployments, 0.001 ether.
pub const IMPLEMENTATION_FEE_CREDIT: U256 = uint!(1_000_000_000_000_000_U256);

/// Addresses produced by [`deploy_uups_proxy`] and what the proxy reported.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProxyDeployment {
    /// The proxy.
    pub proxy: Address,
    /// Implementation the proxy was deployed with.
    pub implementation: Address,
    /// Implementation the proxy reports, if the read succeeded.
    pub reported_implementation: Option<Address>,
    /// Value of [`PROBE`] after initialization, if the read succeeded.
    pub value: Option<U256>,
}

/// Deploys `implementation`, then a proxy pointing to it that is initialized
/// with `initialize(init_args…)`.
///
/// Verification reads are logged; a proxy reporting another implementation
/// is a warning, not an error.
///
/// # Errors
///
/// May fail if:
/// - the proxy artifact is missing or lacks `getImplementation`, checked
///   before anything is deployed;
/// - `init_args` don't match `initialize`;
/// - either deployment fails or doesn't finalize.
pub async fn deploy_uups_proxy<N: Network, A: ArtifactProvider>(
    session: &Session<N, A>,
    implementation: &ContractArtifact,
    init_args: &[DynSolValue],
) -> Result<ProxyDeployment> {
    let proxy_artifact = proxy_artifact(session)?;
    let init_data = encode_call(implementation, INITIALIZE, init_args)?;
    info!(deployer = %session.account().address(), "deploying UUPS proxy");

    let implementation_address = session
        .deployer(implementation)
        .with_fee_credit(IMPLEMENTATION_FEE_CREDIT)
        .deploy()
        .await?
        .address;

    let proxy = session
        .deployer(&proxy_artifact)
        .with_constructor(vec![
            DynSolValue::Address(implementation_address),
            DynSolValue::Bytes(init_data.to_vec()),
        ])
        .deploy()
        .await?
        .address;

    let reported_implementation =
        match reported_implementation(session, &proxy_artifact, proxy).await {
            Ok(reported) => {
                if reported == implementation_address {
                    info!(%proxy, implementation = %reported, "proxy is pointing to implementation");
                } else {
                    warn!(
                        %proxy,
                        expected = %implementation_address,
                        %reported,
                        "proxy reports another implementation"
                    );
                }
                Some(reported)
            }
            Err(e) => {
                warn!(%proxy, error = %e, "could not read implementation");
                None
            }
        };
    let value = probe(session, implementation, proxy).await;

    Ok(ProxyDeployment {
        proxy,
        implementation: implementation_address,
        reported_implementation,
        value,
    })
}

/// Deploys `implementation` and points `proxy` to it with
/// `upgradeToAndCall(implementation, 0x)`. Calls
/// `reinitializeV2(reinit_args…)` afterwards unless `reinit_args` is empty.
///
/// Returns the new implementation's address once the proxy reports it.
///
/// # Errors
///
/// May fail if:
/// - a deployment or transaction fails or doesn't finalize;
/// - the proxy still reports another implementation
///   ([`Error::UpgradeNotApplied`]).
pub async fn upgrade_uups_proxy<N: Network, A: ArtifactProvider>(
    session: &Session<N, A>,
    proxy: Address,
    implementation: &ContractArtifact,
    reinit_args: &[DynSolValue],
) -> Result<Address> {
    let proxy_artifact = proxy_artifact(session)?;
    info!(%proxy, deployer = %session.account().address(), "upgrading UUPS proxy");

    let expected = session
        .deployer(implementation)
        .with_fee_credit(IMPLEMENTATION_FEE_CREDIT)
        .deploy()
        .await?
        .address;

    session
        .transact(
            proxy,
            implementation,
            UPGRADE,
            &[DynSolValue::Address(expected), DynSolValue::Bytes(vec![])],
            U256::ZERO,
        )
        .await?;
    info!(%proxy, implementation = %expected, "proxy upgraded");

    if reinit_args.is_empty() {
        info!("no reinitialization arguments, skipping {REINITIALIZE}");
    } else {
        session
            .transact(proxy, implementation, REINITIALIZE, reinit_args, U256::ZERO)
            .await?;
        info!(%proxy, "reinitialization completed");
    }

    // Addresses compare as bytes, so hex casing never matters.
    let reported =
        match reported_implementation(session, &proxy_artifact, proxy).await {
            Ok(reported) => reported,
            Err(e) => {
                error!(%proxy, error = %e, "could not verify the upgrade");
                return Err(e);
            }
        };
    if reported != expected {
        error!(%proxy, %expected, %reported, "upgrade failed, proxy did not update");
        return Err(Error::UpgradeNotApplied { proxy, expected, reported });
    }
    info!(%proxy, implementation = %reported, "upgrade verified");

    probe(session, implementation, proxy).await;
    Ok(expected)
}

fn proxy_artifact<N: Network, A: ArtifactProvider>(
    session: &Session<N, A>,
) -> Result<ContractArtifact> {
    let artifact = session.artifact(PROXY)?;
    if !artifact.has_function(GET_IMPLEMENTATION) {
        return Err(Error::MissingFunction {
            contract: artifact.contract_name,
            function: GET_IMPLEMENTATION.to_owned(),
        });
    }
    Ok(artifact)
}

async fn reported_implementation<N: Network, A: ArtifactProvider>(
    session: &Session<N, A>,
    proxy_artifact: &ContractArtifact,
    proxy: Address,
) -> Result<Address> {
    let values =
        session.read(proxy, proxy_artifact, GET_IMPLEMENTATION, &[]).await?;
    single_address(GET_IMPLEMENTATION, &values)
}

/// Reads [`PROBE`] through the proxy, logging the outcome.
async fn probe<N: Network, A: ArtifactProvider>(
    session: &Session<N, A>,
    implementation: &ContractArtifact,
    proxy: Address,
) -> Option<U256> {
    let value = session
        .read(proxy, implementation, PROBE, &[])
        .await
        .and_then(|values| single_uint(PROBE, &values));
    match value {
        Ok(value) => {
            info!(%proxy, %value, "{PROBE}() returned");
            Some(value)
        }
        Err(e) => {
            warn!(%proxy, error = %e, "could not read {PROBE}()");
            None
        }
    }
}

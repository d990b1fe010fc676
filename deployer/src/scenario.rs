//! End-to-end exercise of the UUPS example: deploy, upgrade, use V2.
use alloy::{
    dyn_abi::DynSolValue,
    primitives::{uint, Address, U256},
};
use tracing::{info, warn};

use crate::{
    abi::single_uint,
    account::DEFAULT_FUNDING,
    artifact::{ArtifactProvider, IMPLEMENTATION_V1, IMPLEMENTATION_V2},
    network::Network,
    proxy::{deploy_uups_proxy, upgrade_uups_proxy, PROBE, REINITIALIZE},
    session::Session,
    Result,
};

/// Value the proxy is initialized with.
pub const INITIAL_VALUE: u64 = 42;
/// Value attached to `deposit()`, 0.0001 ether.
pub const DEPOSIT_AMOUNT: U256 = uint!(100_000_000_000_000_U256);

const DEPOSIT: &str = "deposit";
const BALANCES: &str = "balances";

/// What [`run_scenario`] observed along the way.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScenarioReport {
    /// The proxy deployed for the run.
    pub proxy: Address,
    /// First implementation behind the proxy.
    pub implementation_v1: Address,
    /// Implementation the proxy was upgraded to.
    pub implementation_v2: Address,
    /// `getValue()` right after deployment.
    pub value_after_initialization: U256,
    /// `getValue()` after the upgrade.
    pub value_after_upgrade: U256,
    /// `balances(account)` after the deposit.
    pub balance: U256,
}

/// Deploys V1 behind a proxy, upgrades it to V2, then deposits through the
/// proxy and reads the balance back.
///
/// # Errors
///
/// May fail if any deployment, transaction or read fails, or if the upgrade
/// isn't applied.
pub async fn run_scenario<N: Network, A: ArtifactProvider>(
    session: &Session<N, A>,
    faucet: Address,
) -> Result<ScenarioReport> {
    let v1 = session.artifact(IMPLEMENTATION_V1)?;
    let v2 = session.artifact(IMPLEMENTATION_V2)?;
    let account = session.account().address();
    info!(%account, "running UUPS scenario");

    let initial = U256::from(INITIAL_VALUE);
    let deployment =
        deploy_uups_proxy(session, &v1, &[DynSolValue::Uint(initial, 256)])
            .await?;
    let proxy = deployment.proxy;

    let value_after_initialization =
        single_uint(PROBE, &session.read(proxy, &v1, PROBE, &[]).await?)?;
    info!(value = %value_after_initialization, "value after initialization");
    if value_after_initialization != initial {
        warn!(expected = %initial, "unexpected value after initialization");
    }

    info!("topping up before upgrade");
    session.top_up(faucet, DEFAULT_FUNDING).await?;

    let implementation_v2 = upgrade_uups_proxy(session, proxy, &v2, &[]).await?;

    // The workflow skips an argument-less reinitializer, the scenario does not.
    if v2
        .function(REINITIALIZE, Some(0))
        .is_ok_and(|f| f.inputs.is_empty())
    {
        session
            .transact(proxy, &v2, REINITIALIZE, &[], U256::ZERO)
            .await?;
        info!("new version reinitialized");
    }

    let value_after_upgrade =
        single_uint(PROBE, &session.read(proxy, &v2, PROBE, &[]).await?)?;
    info!(value = %value_after_upgrade, "value after upgrade");
    if value_after_upgrade != value_after_initialization {
        warn!(
            before = %value_after_initialization,
            "value changed across the upgrade"
        );
    }

    session
        .transact(proxy, &v2, DEPOSIT, &[], DEPOSIT_AMOUNT)
        .await?;
    info!(amount = %DEPOSIT_AMOUNT, "deposited");

    let balance = single_uint(
        BALANCES,
        &session
            .read(proxy, &v2, BALANCES, &[DynSolValue::Address(account)])
            .await?,
    )?;
    info!(%balance, "balance after deposit");
    if balance.is_zero() {
        warn!("deposit is not reflected in the balance");
    }

    Ok(ScenarioReport {
        proxy,
        implementation_v1: deployment.implementation,
        implementation_v2,
        value_after_initialization,
        value_after_upgrade,
        balance,
    })
}

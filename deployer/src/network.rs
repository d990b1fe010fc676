//! Everything the workflows need from a chain, and its JSON-RPC
//! implementation.
use std::{future::IntoFuture, time::Duration};

use alloy::{
    network::{EthereumWallet, TransactionBuilder},
    primitives::{Address, Bytes, TxHash, U256},
    providers::{DynProvider, Provider, ProviderBuilder},
    rpc::types::TransactionRequest,
    transports::http::reqwest::Url,
};
use serde_json::Value;
use tokio::time::timeout;
use tracing::debug;

use crate::{
    account::Account,
    deploy::{DeployRequest, DeploymentResult, CREATE2_FACTORY},
    finality::FinalityPolicy,
    verify::CompilerInput,
    Error, Result,
};

/// A state-changing call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Call {
    /// Called contract.
    pub to: Address,
    /// Calldata.
    pub data: Bytes,
    /// Native value attached to the call.
    pub value: U256,
}

impl Call {
    /// A call transferring no value.
    #[must_use]
    pub fn new(to: Address, data: Bytes) -> Self {
        Self { to, data, value: U256::ZERO }
    }

    /// Attach `value` wei to the call.
    #[must_use]
    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }
}

/// Chain operations used by the workflows.
///
/// Methods returning a [`TxHash`] only submit the transaction; finalization
/// is awaited with [`crate::finality::wait_finalized`].
#[allow(async_fn_in_trait)]
pub trait Network {
    /// Submit a contract deployment signed by `from`.
    ///
    /// # Errors
    ///
    /// May fail if the target address is occupied, the fee credit is too
    /// small or the node rejects the transaction.
    async fn deploy(
        &self,
        from: &Account,
        request: &DeployRequest,
    ) -> Result<DeploymentResult>;

    /// Submit `call` signed by `from`.
    ///
    /// # Errors
    ///
    /// May fail if the node rejects the transaction.
    async fn send(&self, from: &Account, call: Call) -> Result<TxHash>;

    /// Execute a read-only call against the latest state.
    ///
    /// # Errors
    ///
    /// May fail if the call reverts or the node can't be reached.
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes>;

    /// `Some(success)` once `hash` has a receipt, `None` while pending.
    ///
    /// # Errors
    ///
    /// May fail if the node can't be reached.
    async fn receipt_status(&self, hash: TxHash) -> Result<Option<bool>>;

    /// Ask `faucet` to send `amount` to `to`.
    ///
    /// # Errors
    ///
    /// May fail if the node has no faucet or refuses the request.
    async fn top_up(
        &self,
        faucet: Address,
        to: Address,
        amount: U256,
    ) -> Result<TxHash>;

    /// Whether `address` already has on-chain state.
    ///
    /// # Errors
    ///
    /// May fail if the node can't be reached.
    async fn is_deployed(&self, address: Address) -> Result<bool>;

    /// Give `account` on-chain state.
    ///
    /// # Errors
    ///
    /// May fail if the node rejects the transaction.
    async fn deploy_account(&self, account: &Account) -> Result<TxHash>;
}

/// Compilation and source registration service.
#[allow(async_fn_in_trait)]
pub trait CodeRegistry {
    /// Compile `input`, returning the service's compilation output.
    ///
    /// # Errors
    ///
    /// May fail if compilation fails or the service can't be reached.
    async fn compile_contract(&self, input: &CompilerInput) -> Result<Value>;

    /// Attach a compilation output to the contract at `address`.
    ///
    /// # Errors
    ///
    /// May fail if the service refuses the data.
    async fn register_contract_data(
        &self,
        data: &Value,
        address: Address,
    ) -> Result<()>;
}

/// [`Network`] over JSON-RPC.
///
/// Every request is abandoned with [`Error::RequestTimeout`] if the node
/// hasn't answered within the request timeout.
#[derive(Clone)]
pub struct RpcNetwork {
    rpc_url: Url,
    provider: DynProvider,
    request_timeout: Duration,
}

impl RpcNetwork {
    /// Connect to the node at `rpc_url`.
    #[must_use]
    pub fn new(rpc_url: Url) -> Self {
        let provider = ProviderBuilder::new().connect_http(rpc_url.clone());
        Self {
            rpc_url,
            provider: provider.erased(),
            request_timeout: FinalityPolicy::default().timeout,
        }
    }

    /// Give up on requests unanswered after `request_timeout`.
    #[must_use]
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    async fn bounded<T, E, R>(&self, method: &'static str, request: R) -> Result<T>
    where
        R: IntoFuture<Output = std::result::Result<T, E>>,
        Error: From<E>,
    {
        match timeout(self.request_timeout, request).await {
            Ok(outcome) => Ok(outcome?),
            Err(_) => {
                debug!(method, after = ?self.request_timeout, "request timed out");
                Err(Error::RequestTimeout { method, after: self.request_timeout })
            }
        }
    }

    /// Provider that signs with `account`'s key.
    fn wallet(&self, account: &Account) -> impl Provider {
        ProviderBuilder::new()
            .wallet(EthereumWallet::from(account.signer().clone()))
            .connect_http(self.rpc_url.clone())
    }

    async fn has_code(&self, address: Address) -> Result<bool> {
        let code = self
            .bounded("eth_getCode", self.provider.get_code_at(address))
            .await?;
        Ok(!code.is_empty())
    }

    async fn check_fee(
        &self,
        tx: &TransactionRequest,
        credit: U256,
    ) -> Result<()> {
        let gas = self
            .bounded("eth_estimateGas", self.provider.estimate_gas(tx.clone()))
            .await?;
        let price = self
            .bounded("eth_gasPrice", self.provider.get_gas_price())
            .await?;
        let estimated = U256::from(gas) * U256::from(price);
        debug!(%gas, %price, %estimated, %credit, "estimated deployment fee");
        if estimated > credit {
            return Err(Error::FeeBudgetExceeded { estimated, credit });
        }
        Ok(())
    }

    async fn submit(
        &self,
        from: &Account,
        tx: TransactionRequest,
    ) -> Result<TxHash> {
        let wallet = self.wallet(from);
        let pending = self
            .bounded("eth_sendTransaction", wallet.send_transaction(tx))
            .await?;
        Ok(*pending.tx_hash())
    }
}

impl Network for RpcNetwork {
    async fn deploy(
        &self,
        from: &Account,
        request: &DeployRequest,
    ) -> Result<DeploymentResult> {
        if !self.has_code(CREATE2_FACTORY).await? {
            return Err(Error::MissingCreate2Factory(CREATE2_FACTORY));
        }
        let address = request.address();
        if self.has_code(address).await? {
            return Err(Error::AddressOccupied(address));
        }

        // The factory expects the salt followed by the init code.
        let input: Bytes =
            [request.salt_word().as_slice(), request.init_code().as_ref()]
                .concat()
                .into();
        let tx = TransactionRequest::default()
            .with_from(from.address())
            .with_to(CREATE2_FACTORY)
            .with_input(input);
        if let Some(credit) = request.fee_credit {
            self.check_fee(&tx, credit).await?;
        }

        let tx_hash = self.submit(from, tx).await?;
        Ok(DeploymentResult { address, tx_hash })
    }

    async fn send(&self, from: &Account, call: Call) -> Result<TxHash> {
        let tx = TransactionRequest::default()
            .with_from(from.address())
            .with_to(call.to)
            .with_input(call.data)
            .with_value(call.value);
        self.submit(from, tx).await
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes> {
        let tx = TransactionRequest::default().with_to(to).with_input(data);
        self.bounded("eth_call", self.provider.call(tx)).await
    }

    async fn receipt_status(&self, hash: TxHash) -> Result<Option<bool>> {
        let receipt = self
            .bounded(
                "eth_getTransactionReceipt",
                self.provider.get_transaction_receipt(hash),
            )
            .await?;
        Ok(receipt.map(|receipt| receipt.status()))
    }

    async fn top_up(
        &self,
        faucet: Address,
        to: Address,
        amount: U256,
    ) -> Result<TxHash> {
        let method = "faucet_topUpViaFaucet";
        self.bounded(
            method,
            self.provider.raw_request(method.into(), (faucet, to, amount)),
        )
        .await
    }

    async fn is_deployed(&self, address: Address) -> Result<bool> {
        if self.has_code(address).await? {
            return Ok(true);
        }
        let nonce = self
            .bounded(
                "eth_getTransactionCount",
                self.provider.get_transaction_count(address),
            )
            .await?;
        Ok(nonce > 0)
    }

    async fn deploy_account(&self, account: &Account) -> Result<TxHash> {
        let tx = TransactionRequest::default()
            .with_from(account.address())
            .with_to(account.address())
            .with_value(U256::ZERO);
        self.submit(account, tx).await
    }
}

impl CodeRegistry for RpcNetwork {
    async fn compile_contract(&self, input: &CompilerInput) -> Result<Value> {
        let input = serde_json::to_string(input)?;
        let method = "cometa_compileContract";
        self.bounded(method, self.provider.raw_request(method.into(), (input,)))
            .await
    }

    async fn register_contract_data(
        &self,
        data: &Value,
        address: Address,
    ) -> Result<()> {
        let method = "cometa_registerContractData";
        let _: Value = self
            .bounded(
                method,
                self.provider.raw_request(method.into(), (data.clone(), address)),
            )
            .await?;
        Ok(())
    }
}

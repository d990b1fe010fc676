//! In-memory chain for unit tests.
//!
//! Contracts are recognised by their bytecode: [`V1_CODE`] and [`V2_CODE`]
//! are the two implementation versions, [`PROXY_CODE`] is the proxy. Proxies
//! keep their own storage and dispatch on selector, with the functions
//! available depending on the version they point to.
use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
};

use alloy::{
    dyn_abi::{DynSolType, DynSolValue},
    json_abi::JsonAbi,
    primitives::{keccak256, Address, Bytes, TxHash, B256, U256},
    sol_types::SolValue,
    transports::TransportErrorKind,
};

use crate::{
    account::Account,
    artifact::{
        ArtifactProvider, ContractArtifact, IMPLEMENTATION_V1,
        IMPLEMENTATION_V2, PROXY,
    },
    deploy::{DeployRequest, DeploymentResult},
    network::{Call, Network},
    Error, Result,
};

pub(crate) const V1_CODE: &[u8] = &[0x60, 0x01];
pub(crate) const V2_CODE: &[u8] = &[0x60, 0x02];
pub(crate) const PROXY_CODE: &[u8] = &[0x60, 0x03];

const V1_ABI: &[&str] = &[
    "function initialize(uint256 value)",
    "function getValue() view returns (uint256)",
    "function upgradeToAndCall(address newImplementation, bytes data) payable",
];

const V2_ABI: &[&str] = &[
    "function initialize(uint256 value)",
    "function reinitializeV2()",
    "function reinitializeV2(uint256 value)",
    "function getValue() view returns (uint256)",
    "function upgradeToAndCall(address newImplementation, bytes data) payable",
    "function deposit() payable",
    "function balances(address account) view returns (uint256)",
];

const PROXY_ABI: &[&str] = &[
    "constructor(address implementation, bytes data)",
    "function getImplementation() view returns (address)",
];

/// First four bytes of `keccak256(signature)`.
pub(crate) fn selector(signature: &str) -> [u8; 4] {
    let mut selector = [0; 4];
    selector.copy_from_slice(&keccak256(signature)[..4]);
    selector
}

pub(crate) fn artifact(
    name: &str,
    signatures: &[&str],
    bytecode: &'static [u8],
) -> ContractArtifact {
    ContractArtifact {
        contract_name: name.to_owned(),
        abi: JsonAbi::parse(signatures.iter().copied()).unwrap(),
        bytecode: Bytes::from_static(bytecode),
    }
}

/// The three contracts of the UUPS example.
pub(crate) struct MockArtifacts {
    artifacts: HashMap<String, ContractArtifact>,
}

impl Default for MockArtifacts {
    fn default() -> Self {
        let mut artifacts = Self { artifacts: HashMap::new() };
        artifacts.insert(artifact(IMPLEMENTATION_V1, V1_ABI, V1_CODE));
        artifacts.insert(artifact(IMPLEMENTATION_V2, V2_ABI, V2_CODE));
        artifacts.insert(artifact(PROXY, PROXY_ABI, PROXY_CODE));
        artifacts
    }
}

impl MockArtifacts {
    pub(crate) fn insert(&mut self, artifact: ContractArtifact) {
        self.artifacts.insert(artifact.contract_name.clone(), artifact);
    }
}

impl ArtifactProvider for MockArtifacts {
    fn artifact(&self, name: &str) -> Result<ContractArtifact> {
        self.artifacts.get(name).cloned().ok_or_else(|| Error::ArtifactNotFound {
            name: name.to_owned(),
            path: name.into(),
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Code {
    Implementation(u8),
    Proxy,
    Other,
}

#[derive(Debug, Default)]
struct ProxyStorage {
    implementation: Address,
    initialized: bool,
    reinitialized: bool,
    value: U256,
    balances: HashMap<Address, U256>,
}

#[derive(Debug)]
struct Transaction {
    pending: usize,
    success: bool,
}

struct Revert;

#[derive(Default)]
struct State {
    contracts: HashMap<Address, Code>,
    proxies: HashMap<Address, ProxyStorage>,
    transactions: HashMap<TxHash, Transaction>,
    receipt_queries: HashMap<TxHash, usize>,
    stalled: HashSet<TxHash>,
    next_hash: u64,
    top_ups: Vec<(Address, Address, U256)>,
    deployed_accounts: Vec<Address>,
    live_accounts: HashSet<Address>,
    sent: Vec<Call>,
    deploy_fee: U256,
    revert_top_ups: bool,
    ignore_upgrades: bool,
    fail_reads: bool,
}

impl State {
    fn record(&mut self, success: bool, pending: usize) -> TxHash {
        self.next_hash += 1;
        let hash = B256::left_padding_from(&self.next_hash.to_be_bytes());
        self.transactions.insert(hash, Transaction { pending, success });
        hash
    }

    fn version(&self, implementation: Address) -> Option<u8> {
        match self.contracts.get(&implementation) {
            Some(Code::Implementation(version)) => Some(*version),
            _ => None,
        }
    }

    /// Runs `data` against the proxy at `proxy` as if delegated to its
    /// current implementation.
    fn execute(
        &mut self,
        proxy: Address,
        from: Address,
        data: &[u8],
        value: U256,
    ) -> std::result::Result<Bytes, Revert> {
        if data.len() < 4 {
            return Err(Revert);
        }
        let (head, args) = data.split_at(4);
        let implementation =
            self.proxies.get(&proxy).ok_or(Revert)?.implementation;
        let version = self.version(implementation).ok_or(Revert)?;
        let ignore_upgrades = self.ignore_upgrades;

        if head == selector("upgradeToAndCall(address,bytes)") {
            let decoded = decode(
                &DynSolType::Tuple(vec![DynSolType::Address, DynSolType::Bytes]),
                args,
            )?;
            let (Some(next), Some(call)) = (
                decoded.first().and_then(DynSolValue::as_address),
                decoded.get(1).and_then(DynSolValue::as_bytes),
            ) else {
                return Err(Revert);
            };
            if self.version(next).is_none() {
                return Err(Revert);
            }
            let call = call.to_vec();
            if !ignore_upgrades {
                self.storage(proxy)?.implementation = next;
            }
            if !call.is_empty() {
                self.execute(proxy, from, &call, value)?;
            }
            return Ok(Bytes::new());
        }

        let storage = self.storage(proxy)?;
        let output = if head == selector("getImplementation()") {
            storage.implementation.abi_encode()
        } else if head == selector("getValue()") {
            storage.value.abi_encode()
        } else if head == selector("initialize(uint256)") {
            if storage.initialized {
                return Err(Revert);
            }
            storage.initialized = true;
            storage.value = uint(args)?;
            vec![]
        } else if version >= 2 && head == selector("reinitializeV2()") {
            if storage.reinitialized {
                return Err(Revert);
            }
            storage.reinitialized = true;
            vec![]
        } else if version >= 2 && head == selector("reinitializeV2(uint256)") {
            if storage.reinitialized {
                return Err(Revert);
            }
            storage.reinitialized = true;
            storage.value = uint(args)?;
            vec![]
        } else if version >= 2 && head == selector("deposit()") {
            *storage.balances.entry(from).or_default() += value;
            vec![]
        } else if version >= 2 && head == selector("balances(address)") {
            let account = decode(&DynSolType::Address, args)?
                .first()
                .and_then(DynSolValue::as_address)
                .ok_or(Revert)?;
            storage.balances.get(&account).copied().unwrap_or_default().abi_encode()
        } else {
            return Err(Revert);
        };
        Ok(output.into())
    }

    fn storage(
        &mut self,
        proxy: Address,
    ) -> std::result::Result<&mut ProxyStorage, Revert> {
        self.proxies.get_mut(&proxy).ok_or(Revert)
    }
}

fn decode(
    ty: &DynSolType,
    data: &[u8],
) -> std::result::Result<Vec<DynSolValue>, Revert> {
    match ty.abi_decode_params(data).map_err(|_| Revert)? {
        DynSolValue::Tuple(values) => Ok(values),
        value => Ok(vec![value]),
    }
}

fn uint(args: &[u8]) -> std::result::Result<U256, Revert> {
    decode(&DynSolType::Uint(256), args)?
        .first()
        .and_then(DynSolValue::as_uint)
        .map(|(value, _)| value)
        .ok_or(Revert)
}

fn reverted() -> Error {
    Error::Rpc(TransportErrorKind::custom_str("execution reverted"))
}

/// A chain that finalizes everything on the first receipt query unless told
/// otherwise.
#[derive(Default)]
pub(crate) struct MockNetwork {
    state: Mutex<State>,
}

impl MockNetwork {
    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// A successful transaction whose receipt shows up after `polls` queries.
    pub(crate) fn pending_transaction(&self, polls: usize) -> TxHash {
        self.state().record(true, polls)
    }

    pub(crate) fn reverted_transaction(&self) -> TxHash {
        self.state().record(false, 0)
    }

    /// A transaction whose receipt query never answers.
    pub(crate) fn stalled_transaction(&self) -> TxHash {
        let mut state = self.state();
        let hash = state.record(true, 0);
        state.stalled.insert(hash);
        hash
    }

    pub(crate) fn receipt_queries(&self, hash: TxHash) -> usize {
        self.state().receipt_queries.get(&hash).copied().unwrap_or_default()
    }

    /// `(faucet, to, amount)` of every top-up request.
    pub(crate) fn top_ups(&self) -> Vec<(Address, Address, U256)> {
        self.state().top_ups.clone()
    }

    /// Accounts deployed through [`Network::deploy_account`].
    pub(crate) fn deployed_accounts(&self) -> Vec<Address> {
        self.state().deployed_accounts.clone()
    }

    pub(crate) fn mark_deployed(&self, account: Address) {
        self.state().live_accounts.insert(account);
    }

    pub(crate) fn revert_top_ups(&self) {
        self.state().revert_top_ups = true;
    }

    pub(crate) fn set_deploy_fee(&self, fee: U256) {
        self.state().deploy_fee = fee;
    }

    /// Accept `upgradeToAndCall` without changing the implementation.
    pub(crate) fn ignore_upgrades(&self) {
        self.state().ignore_upgrades = true;
    }

    /// Make every read-only call fail.
    pub(crate) fn fail_reads(&self) {
        self.state().fail_reads = true;
    }

    /// Every call sent in a transaction, in order.
    pub(crate) fn sent(&self) -> Vec<Call> {
        self.state().sent.clone()
    }

    /// Sent calls whose selector is that of `signature`.
    pub(crate) fn sent_to(&self, signature: &str) -> Vec<Call> {
        let selector = selector(signature);
        self.sent()
            .into_iter()
            .filter(|call| call.data.starts_with(&selector))
            .collect()
    }

    pub(crate) fn contract_count(&self) -> usize {
        self.state().contracts.len()
    }

    pub(crate) fn implementation_of(&self, proxy: Address) -> Option<Address> {
        self.state().proxies.get(&proxy).map(|p| p.implementation)
    }
}

impl Network for MockNetwork {
    async fn deploy(
        &self,
        from: &Account,
        request: &DeployRequest,
    ) -> Result<DeploymentResult> {
        let mut state = self.state();
        let address = request.address();
        if state.contracts.contains_key(&address) {
            return Err(Error::AddressOccupied(address));
        }
        if let Some(credit) = request.fee_credit {
            if state.deploy_fee > credit {
                return Err(Error::FeeBudgetExceeded {
                    estimated: state.deploy_fee,
                    credit,
                });
            }
        }

        let bytecode = request.bytecode.as_ref();
        let code = if bytecode == V1_CODE {
            Code::Implementation(1)
        } else if bytecode == V2_CODE {
            Code::Implementation(2)
        } else if bytecode == PROXY_CODE {
            Code::Proxy
        } else {
            Code::Other
        };

        let mut success = true;
        state.contracts.insert(address, code);
        if code == Code::Proxy {
            let ty = DynSolType::Tuple(vec![DynSolType::Address, DynSolType::Bytes]);
            let args = decode(&ty, &request.constructor_args).unwrap_or_default();
            match (
                args.first().and_then(DynSolValue::as_address),
                args.get(1).and_then(DynSolValue::as_bytes),
            ) {
                (Some(implementation), Some(init)) => {
                    let init = init.to_vec();
                    state.proxies.insert(
                        address,
                        ProxyStorage { implementation, ..Default::default() },
                    );
                    if !init.is_empty() {
                        success = state
                            .execute(address, from.address(), &init, U256::ZERO)
                            .is_ok();
                    }
                }
                _ => success = false,
            }
        }
        if !success {
            state.contracts.remove(&address);
            state.proxies.remove(&address);
        }

        let tx_hash = state.record(success, 0);
        Ok(DeploymentResult { address, tx_hash })
    }

    async fn send(&self, from: &Account, call: Call) -> Result<TxHash> {
        let mut state = self.state();
        state.sent.push(call.clone());
        let success = match state.contracts.get(&call.to) {
            Some(Code::Proxy) => state
                .execute(call.to, from.address(), &call.data, call.value)
                .is_ok(),
            Some(_) => false,
            None => true,
        };
        Ok(state.record(success, 0))
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes> {
        let mut state = self.state();
        let view = ["getImplementation()", "getValue()", "balances(address)"]
            .iter()
            .any(|signature| data.starts_with(&selector(signature)));
        if state.fail_reads || !view || state.contracts.get(&to) != Some(&Code::Proxy) {
            return Err(reverted());
        }
        state.execute(to, Address::ZERO, &data, U256::ZERO).map_err(|_| reverted())
    }

    async fn receipt_status(&self, hash: TxHash) -> Result<Option<bool>> {
        let mut state = self.state();
        *state.receipt_queries.entry(hash).or_default() += 1;
        if state.stalled.contains(&hash) {
            drop(state);
            return std::future::pending().await;
        }
        let Some(tx) = state.transactions.get_mut(&hash) else {
            return Ok(None);
        };
        if tx.pending > 0 {
            tx.pending -= 1;
            return Ok(None);
        }
        Ok(Some(tx.success))
    }

    async fn top_up(
        &self,
        faucet: Address,
        to: Address,
        amount: U256,
    ) -> Result<TxHash> {
        let mut state = self.state();
        state.top_ups.push((faucet, to, amount));
        let success = !state.revert_top_ups;
        Ok(state.record(success, 0))
    }

    async fn is_deployed(&self, address: Address) -> Result<bool> {
        let state = self.state();
        Ok(state.contracts.contains_key(&address)
            || state.live_accounts.contains(&address))
    }

    async fn deploy_account(&self, account: &Account) -> Result<TxHash> {
        let mut state = self.state();
        state.deployed_accounts.push(account.address());
        state.live_accounts.insert(account.address());
        Ok(state.record(true, 0))
    }
}

//! The deploying account and how it is provisioned.
use alloy::{
    primitives::{uint, Address, Bytes, U256},
    signers::local::PrivateKeySigner,
};
use k256::{elliptic_curve::sec1::ToEncodedPoint, PublicKey};
use tracing::info;

use crate::{
    credentials::{CredentialStore, Credentials},
    finality::{wait_finalized, FinalityPolicy},
    network::Network,
    Error, Result,
};

/// Amount the faucet sends on every provisioning, 0.01 ether.
pub const DEFAULT_FUNDING: U256 = uint!(10_000_000_000_000_000_U256);

/// The account deployments are signed and paid by.
#[derive(Clone, Debug)]
pub struct Account {
    /// The account's local private key wrapper.
    signer: PrivateKeySigner,
    /// On-chain address of the account.
    address: Address,
}

impl Account {
    /// Generate a fresh key pair and derive the account from it.
    #[must_use]
    pub fn random() -> Self {
        let signer = PrivateKeySigner::random();
        let address = signer.address();
        Self { signer, address }
    }

    /// Rebuild an account from persisted credentials.
    ///
    /// # Errors
    ///
    /// May fail if the key can't be parsed, or if it doesn't control the
    /// persisted address.
    pub fn from_credentials(credentials: &Credentials) -> Result<Self> {
        let signer: PrivateKeySigner = credentials.private_key.trim().parse()?;
        let derived = signer.address();
        if derived != credentials.address {
            return Err(Error::CredentialMismatch {
                stored: credentials.address,
                derived,
            });
        }
        Ok(Self { signer, address: derived })
    }

    /// Retrieve this account's address.
    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }

    /// The signer used for this account's transactions.
    #[must_use]
    pub fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }

    /// Get a `0x`-prefixed hex String representing this account's private key.
    #[must_use]
    pub fn pk(&self) -> String {
        format!("0x{}", alloy::hex::encode(self.signer.to_bytes()))
    }

    /// The compressed SEC1 public key.
    #[must_use]
    pub fn public_key(&self) -> Bytes {
        let key = PublicKey::from(self.signer.credential().verifying_key());
        Bytes::copy_from_slice(key.to_encoded_point(true).as_bytes())
    }

    /// What has to be persisted to reuse this account later.
    #[must_use]
    pub fn credentials(&self) -> Credentials {
        Credentials { private_key: self.pk(), address: self.address }
    }
}

/// Loads or creates the session's account and makes it ready to transact.
pub struct AccountProvisioner<'a, N, S> {
    network: &'a N,
    store: &'a S,
    faucet: Address,
    funding: U256,
    credentials: Option<Credentials>,
    finality: FinalityPolicy,
}

impl<'a, N: Network, S: CredentialStore> AccountProvisioner<'a, N, S> {
    /// Provisioner funding accounts from `faucet` and persisting new ones to
    /// `store`.
    pub fn new(network: &'a N, store: &'a S, faucet: Address) -> Self {
        Self {
            network,
            store,
            faucet,
            funding: DEFAULT_FUNDING,
            credentials: None,
            finality: FinalityPolicy::default(),
        }
    }

    /// Prefer these credentials over whatever the store holds.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Request `amount` from the faucet instead of [`DEFAULT_FUNDING`].
    #[must_use]
    pub fn with_funding(mut self, amount: U256) -> Self {
        self.funding = amount;
        self
    }

    /// Poll finalization with `policy`.
    #[must_use]
    pub fn with_finality(mut self, policy: FinalityPolicy) -> Self {
        self.finality = policy;
        self
    }

    /// Load (or generate and persist) the account, fund it from the faucet
    /// and deploy it if it has no on-chain state yet.
    ///
    /// # Errors
    ///
    /// May fail if:
    /// - the credentials can't be read, parsed or saved;
    /// - the funding or deployment transaction fails or never finalizes.
    pub async fn provision(self) -> Result<Account> {
        let existing = match self.credentials.clone() {
            Some(credentials) => Some(credentials),
            None => self.store.load()?,
        };

        let account = if let Some(credentials) = existing {
            let account = Account::from_credentials(&credentials)?;
            info!(address = %account.address(), "using existing account");
            account
        } else {
            let account = Account::random();
            info!(address = %account.address(), "generated new account");
            self.store.save(&account.credentials())?;
            info!("account credentials saved");
            account
        };

        let hash = self
            .network
            .top_up(self.faucet, account.address(), self.funding)
            .await?;
        wait_finalized(self.network, hash, &self.finality).await?;
        info!(amount = %self.funding, "account funded");

        if !self.network.is_deployed(account.address()).await? {
            info!("deploying account");
            let hash = self.network.deploy_account(&account).await?;
            wait_finalized(self.network, hash, &self.finality).await?;
            info!(address = %account.address(), "account deployed");
        }

        Ok(account)
    }
}

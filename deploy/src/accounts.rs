//! Signing identities for the bridge roles.
//!
//! An [`IdentitySet`] is built either from fixed secret keys (so tests get
//! the same addresses on every run) or from the account list of a running
//! node. Both paths partition accounts by position: operator, owner, pauser,
//! the single validator, then spares.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use fuels::accounts::wallet::WalletUnlocked;
use fuels::crypto::SecretKey;
use fuels::prelude::Provider;
use fuels::types::Address;

use crate::error::{DeployError, Result};

/// Operator, owner, pauser and one validator.
pub const MIN_ACCOUNTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Operator,
    Owner,
    Pauser,
    Validator,
    Spare,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Operator => "operator",
            Role::Owner => "owner",
            Role::Pauser => "pauser",
            Role::Validator => "validator",
            Role::Spare => "spare",
        };
        f.write_str(name)
    }
}

/// An address together with the wallet that signs for it.
#[derive(Clone)]
pub struct Identity {
    wallet: WalletUnlocked,
}

impl Identity {
    pub fn from_wallet(wallet: WalletUnlocked) -> Self {
        Self { wallet }
    }

    pub fn from_secret_key(secret_key: SecretKey, provider: Option<Provider>) -> Self {
        Self::from_wallet(WalletUnlocked::new_from_private_key(secret_key, provider))
    }

    pub fn address(&self) -> Address {
        Address::from(self.wallet.address())
    }

    pub fn wallet(&self) -> &WalletUnlocked {
        &self.wallet
    }

    /// The same signer attached to `provider`.
    pub fn wallet_on(&self, provider: &Provider) -> WalletUnlocked {
        let mut wallet = self.wallet.clone();
        wallet.set_provider(provider.clone());
        wallet
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("address", &format_args!("{:#x}", self.address()))
            .finish()
    }
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.address() == other.address()
    }
}

impl Eq for Identity {}

/// The accounts needed to deploy and operate the bridge.
#[derive(Debug, Clone)]
pub struct IdentitySet {
    pub operator: Identity,
    pub owner: Identity,
    pub pauser: Identity,
    pub validators: Vec<Identity>,
    pub spares: Vec<Identity>,
}

impl IdentitySet {
    /// Index 0 is the operator, 1 the owner, 2 the pauser, 3 the validator and
    /// everything after that a spare account.
    pub fn from_positional(accounts: Vec<Identity>) -> Result<Self> {
        if accounts.len() < MIN_ACCOUNTS {
            return Err(DeployError::InsufficientAccounts {
                required: MIN_ACCOUNTS,
                available: accounts.len(),
            });
        }
        let mut seen = HashSet::new();
        for identity in &accounts {
            if !seen.insert(identity.address()) {
                return Err(DeployError::DuplicateAccount {
                    address: format!("{:#x}", identity.address()),
                });
            }
        }

        let mut accounts = accounts.into_iter();
        let mut next = || {
            accounts.next().ok_or(DeployError::InsufficientAccounts {
                required: MIN_ACCOUNTS,
                available: 0,
            })
        };
        let operator = next()?;
        let owner = next()?;
        let pauser = next()?;
        let validator = next()?;
        Ok(Self {
            operator,
            owner,
            pauser,
            validators: vec![validator],
            spares: accounts.collect(),
        })
    }

    pub fn from_secret_keys(keys: &[String], provider: Option<&Provider>) -> Result<Self> {
        let accounts = keys
            .iter()
            .enumerate()
            .map(|(index, key)| {
                let secret_key = SecretKey::from_str(key.trim()).map_err(|e| DeployError::InvalidKey {
                    index,
                    message: format!("{e:?}"),
                })?;
                Ok(Identity::from_secret_key(secret_key, provider.cloned()))
            })
            .collect::<Result<Vec<_>>>()?;
        Self::from_positional(accounts)
    }

    pub fn validator_addresses(&self) -> Vec<Address> {
        self.validators.iter().map(Identity::address).collect()
    }

    /// Every identity with its role, in positional order.
    pub fn roles(&self) -> Vec<(Role, &Identity)> {
        let mut roles = vec![
            (Role::Operator, &self.operator),
            (Role::Owner, &self.owner),
            (Role::Pauser, &self.pauser),
        ];
        roles.extend(self.validators.iter().map(|v| (Role::Validator, v)));
        roles.extend(self.spares.iter().map(|s| (Role::Spare, s)));
        roles
    }

    pub fn account_count(&self) -> usize {
        3 + self.validators.len() + self.spares.len()
    }
}

/// A live runtime that owns funded accounts.
#[async_trait]
pub trait AccountSource: Send + Sync {
    async fn list_accounts(&self) -> Result<Vec<Identity>>;
}

/// Accounts known up front.
#[derive(Debug, Clone, Default)]
pub struct StaticAccounts(pub Vec<Identity>);

#[async_trait]
impl AccountSource for StaticAccounts {
    async fn list_accounts(&self) -> Result<Vec<Identity>> {
        Ok(self.0.clone())
    }
}

/// Where the identity set comes from.
#[derive(Clone)]
pub enum IdentitySource {
    Seed {
        keys: Vec<String>,
        provider: Option<Provider>,
    },
    Runtime(Arc<dyn AccountSource>),
}

pub async fn derive_identities(source: &IdentitySource) -> Result<IdentitySet> {
    match source {
        IdentitySource::Seed { keys, provider } => {
            IdentitySet::from_secret_keys(keys, provider.as_ref())
        }
        IdentitySource::Runtime(runtime) => {
            let accounts = runtime.list_accounts().await?;
            IdentitySet::from_positional(accounts)
        }
    }
}

//! The boundary to the network that executes transactions.
//!
//! The deployment logic only sequences calls through [`ChainClient`]; it
//! never encodes transactions itself.

use std::fmt;
use std::future::Future;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt};
use fuels::types::{Address, ContractId};
use rand::Rng;

use crate::accounts::Identity;
use crate::error::ChainError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallArg {
    Address(Address),
    Contract(ContractId),
    U64(u64),
    Str(String),
    Addresses(Vec<Address>),
    U64s(Vec<u64>),
}

/// A contract binary to deploy.
#[derive(Debug, Clone)]
pub struct DeployUnit {
    pub artifact: String,
    pub salt: [u8; 32],
    pub constructor_args: Vec<CallArg>,
}

impl DeployUnit {
    pub fn new(artifact: impl Into<String>) -> Self {
        let mut rng = rand::thread_rng();
        Self {
            artifact: artifact.into(),
            salt: rng.gen::<[u8; 32]>(),
            constructor_args: Vec::new(),
        }
    }

    pub fn with_salt(mut self, salt: [u8; 32]) -> Self {
        self.salt = salt;
        self
    }

    pub fn with_constructor_args(mut self, args: Vec<CallArg>) -> Self {
        self.constructor_args = args;
        self
    }
}

#[derive(Debug, Clone)]
pub struct MethodCall {
    pub contract: ContractId,
    pub method: String,
    pub args: Vec<CallArg>,
}

impl MethodCall {
    pub fn new(contract: ContractId, method: impl Into<String>, args: Vec<CallArg>) -> Self {
        Self {
            contract,
            method: method.into(),
            args,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub tx_id: Option<String>,
    pub contract_id: Option<ContractId>,
    pub confirmed_at: DateTime<Utc>,
}

/// A submitted deployment. The contract id is known immediately; the
/// contract is usable only once [`PendingDeployment::wait`] returns.
pub struct PendingDeployment {
    contract_id: ContractId,
    confirmation: BoxFuture<'static, Result<Receipt, ChainError>>,
}

impl PendingDeployment {
    pub fn new<F>(contract_id: ContractId, confirmation: F) -> Self
    where
        F: Future<Output = Result<Receipt, ChainError>> + Send + 'static,
    {
        Self {
            contract_id,
            confirmation: confirmation.boxed(),
        }
    }

    pub fn contract_id(&self) -> ContractId {
        self.contract_id
    }

    pub async fn wait(self) -> Result<Receipt, ChainError> {
        self.confirmation.await
    }
}

impl fmt::Debug for PendingDeployment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingDeployment")
            .field("contract_id", &format_args!("{:#x}", self.contract_id))
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn deploy(&self, unit: DeployUnit, signer: &Identity) -> Result<PendingDeployment, ChainError>;

    async fn call(&self, call: MethodCall, signer: &Identity) -> Result<Receipt, ChainError>;
}

//! An in-memory chain for dry runs and tests.
//!
//! Contracts get deterministic ids, confirmation is a separate suspension
//! point, and every deployment, confirmation and call is appended to an event
//! log that can be inspected afterwards.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use fuels::types::{Address, ContractId};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::accounts::Identity;
use crate::chain::{ChainClient, DeployUnit, MethodCall, PendingDeployment, Receipt};
use crate::error::ChainError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainEvent {
    Deployed {
        artifact: String,
        contract_id: ContractId,
        deployer: Address,
    },
    Confirmed {
        artifact: String,
        contract_id: ContractId,
    },
    Called {
        contract_id: ContractId,
        method: String,
        caller: Address,
    },
}

#[derive(Default)]
struct LocalState {
    nonce: u64,
    contracts: HashMap<ContractId, String>,
    confirmed: HashSet<ContractId>,
    events: Vec<ChainEvent>,
    failing_artifacts: HashSet<String>,
    failing_methods: HashSet<String>,
}

#[derive(Clone, Default)]
pub struct LocalChain {
    state: Arc<Mutex<LocalState>>,
    confirmation_delay: Option<Duration>,
}

impl LocalChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_confirmation_delay(mut self, delay: Duration) -> Self {
        self.confirmation_delay = Some(delay);
        self
    }

    /// Deployments of `artifact` are rejected from now on.
    pub fn fail_deployments_of(&self, artifact: &str) {
        self.state().failing_artifacts.insert(artifact.to_string());
    }

    /// Calls to `method` revert from now on.
    pub fn fail_calls_to(&self, method: &str) {
        self.state().failing_methods.insert(method.to_string());
    }

    pub fn events(&self) -> Vec<ChainEvent> {
        self.state().events.clone()
    }

    pub fn deployments_of(&self, artifact: &str) -> usize {
        self.state()
            .events
            .iter()
            .filter(|event| matches!(event, ChainEvent::Deployed { artifact: a, .. } if a == artifact))
            .count()
    }

    pub fn calls_to(&self, method: &str) -> Vec<ContractId> {
        self.state()
            .events
            .iter()
            .filter_map(|event| match event {
                ChainEvent::Called {
                    contract_id,
                    method: m,
                    ..
                } if m == method => Some(*contract_id),
                _ => None,
            })
            .collect()
    }

    pub fn artifact_of(&self, contract_id: &ContractId) -> Option<String> {
        self.state().contracts.get(contract_id).cloned()
    }

    fn state(&self) -> MutexGuard<'_, LocalState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn contract_id(deployer: &Address, salt: &[u8; 32], nonce: u64) -> ContractId {
    let mut hasher = Sha256::new();
    hasher.update(&deployer[..]);
    hasher.update(salt);
    hasher.update(nonce.to_be_bytes());
    ContractId::new(hasher.finalize().into())
}

fn tx_id(seed: &[u8]) -> String {
    let digest = Sha256::digest(seed);
    let hex: String = digest.iter().map(|byte| format!("{byte:02x}")).collect();
    format!("0x{hex}")
}

#[async_trait]
impl ChainClient for LocalChain {
    async fn deploy(&self, unit: DeployUnit, signer: &Identity) -> Result<PendingDeployment, ChainError> {
        let deployer = signer.address();
        let id = {
            let mut state = self.state();
            if state.failing_artifacts.contains(&unit.artifact) {
                return Err(ChainError::Rejected(format!(
                    "deployment of {} rejected",
                    unit.artifact
                )));
            }
            state.nonce += 1;
            let id = contract_id(&deployer, &unit.salt, state.nonce);
            state.contracts.insert(id, unit.artifact.clone());
            state.events.push(ChainEvent::Deployed {
                artifact: unit.artifact.clone(),
                contract_id: id,
                deployer,
            });
            id
        };
        debug!(artifact = %unit.artifact, contract_id = %format_args!("{id:#x}"), "submitted deployment");

        let chain = self.clone();
        let artifact = unit.artifact;
        let confirmation = async move {
            match chain.confirmation_delay {
                Some(delay) => tokio::time::sleep(delay).await,
                None => tokio::task::yield_now().await,
            }
            let mut state = chain.state();
            state.confirmed.insert(id);
            state.events.push(ChainEvent::Confirmed {
                artifact,
                contract_id: id,
            });
            Ok(Receipt {
                tx_id: Some(tx_id(&id[..])),
                contract_id: Some(id),
                confirmed_at: Utc::now(),
            })
        };
        Ok(PendingDeployment::new(id, confirmation))
    }

    async fn call(&self, call: MethodCall, signer: &Identity) -> Result<Receipt, ChainError> {
        let caller = signer.address();
        let nonce = {
            let mut state = self.state();
            if !state.confirmed.contains(&call.contract) {
                return Err(ChainError::UnknownContract(format!("{:#x}", call.contract)));
            }
            if state.failing_methods.contains(&call.method) {
                return Err(ChainError::Reverted {
                    method: call.method,
                    message: "reverted by local chain".to_string(),
                });
            }
            state.nonce += 1;
            state.events.push(ChainEvent::Called {
                contract_id: call.contract,
                method: call.method.clone(),
                caller,
            });
            state.nonce
        };
        tokio::task::yield_now().await;
        Ok(Receipt {
            tx_id: Some(tx_id(&nonce.to_be_bytes())),
            contract_id: None,
            confirmed_at: Utc::now(),
        })
    }
}

use std::collections::HashMap;
use std::sync::Arc;

use fuels::prelude::Provider;
use maplit::hashmap;

use crate::accounts::{IdentitySet, IdentitySource};
use crate::deployer::{ContractType, DeployResult, DeploymentResult};
use crate::error::Result;
use crate::tasks::{accounts, contract, TaskCache, TaskKey};

/// Fixed keys for operator, owner, pauser, validator and one spare account.
/// Deterministic on purpose: tests rely on getting the same addresses in the
/// same roles on every run.
pub const FIXTURE_KEYS: [&str; 5] = [
    "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
    "59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d",
    "5de4111afa1a4b94908f83103eb1f1706367c2e68ca870fc3fb9a804cdab365a",
    "7c852118294e51e653712a81e05800f419141751be58f605c371e15141b007a6",
    "47e179ec197488593b187f80a00eb0da91f1b9d0b13f8733639f19c30a34926a",
];

pub fn fixture_keys() -> Vec<String> {
    FIXTURE_KEYS.iter().map(|key| key.to_string()).collect()
}

pub fn fixture_source(provider: Option<Provider>) -> IdentitySource {
    IdentitySource::Seed {
        keys: fixture_keys(),
        provider,
    }
}

pub fn fixture_identities() -> Result<IdentitySet> {
    IdentitySet::from_secret_keys(&fixture_keys(), None)
}

/// Everything a finished deployment produced.
pub struct Fixture {
    pub identities: Arc<IdentitySet>,
    pub contracts: HashMap<ContractType, DeployResult>,
    pub result: DeploymentResult,
}

impl Fixture {
    /// Reads the deployed contracts back out of a session whose run completed.
    /// Every key is already resolved, so nothing is deployed again.
    pub async fn collect(cache: &TaskCache, result: DeploymentResult) -> Result<Fixture> {
        let resolver = cache.resolver();
        let identities = accounts(&resolver).await?;
        let contracts = hashmap! {
            ContractType::BridgeToken => contract(&resolver, TaskKey::RowanContract).await?,
            ContractType::BridgeRegistry => contract(&resolver, TaskKey::BRIDGE_REGISTRY_PROXY).await?,
            ContractType::CosmosBridge => contract(&resolver, TaskKey::COSMOS_BRIDGE_PROXY).await?,
            ContractType::BridgeBank => contract(&resolver, TaskKey::BRIDGE_BANK_PROXY).await?,
        };
        Ok(Fixture {
            identities,
            contracts,
            result,
        })
    }

    pub fn contract(&self, contract_type: ContractType) -> Option<&DeployResult> {
        self.contracts.get(&contract_type)
    }

    pub fn bridge_token(&self) -> Option<&DeployResult> {
        self.contract(ContractType::BridgeToken)
    }

    pub fn bridge_registry(&self) -> Option<&DeployResult> {
        self.contract(ContractType::BridgeRegistry)
    }

    pub fn cosmos_bridge(&self) -> Option<&DeployResult> {
        self.contract(ContractType::CosmosBridge)
    }

    pub fn bridge_bank(&self) -> Option<&DeployResult> {
        self.contract(ContractType::BridgeBank)
    }
}

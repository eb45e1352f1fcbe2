use std::fmt;
use std::sync::Arc;

use fuels::prelude::ContractId;
use futures::join;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::accounts::IdentitySource;
use crate::chain::ChainClient;
use crate::error::Result;
use crate::fixture::Fixture;
use crate::shared::{config, connect, BridgeSettings};
use crate::tasks::{accounts, contract, register_tasks, TaskCache, TaskEnv, TaskKey};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContractType {
    BridgeToken,
    BridgeRegistry,
    CosmosBridge,
    BridgeBank,
}

impl ContractType {
    /// Artifact name of the compiled contract.
    pub fn name(&self) -> &'static str {
        match self {
            ContractType::BridgeToken => "bridge_token",
            ContractType::BridgeRegistry => "bridge_registry",
            ContractType::CosmosBridge => "cosmos_bridge",
            ContractType::BridgeBank => "bridge_bank",
        }
    }
}

impl fmt::Display for ContractType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ContractType::BridgeToken => "BridgeToken",
            ContractType::BridgeRegistry => "BridgeRegistry",
            ContractType::CosmosBridge => "CosmosBridge",
            ContractType::BridgeBank => "BridgeBank",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployResult {
    pub contract: ContractType,
    pub target_id: ContractId,
    pub proxy_id: Option<ContractId>,
}

impl DeployResult {
    /// The id other contracts and users talk to: the proxy when there is one.
    pub fn address(&self) -> ContractId {
        self.proxy_id.unwrap_or(self.target_id)
    }

    pub fn address_hex(&self) -> String {
        format!("{:#x}", self.address())
    }
}

/// The report printed once a deployment succeeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentResult {
    pub cosmos_bridge: String,
    pub bridge_bank: String,
    pub bridge_registry: String,
    pub rowan_contract: String,
}

pub struct LocalDeployParams {
    pub client: Arc<dyn ChainClient>,
    pub accounts: IdentitySource,
    pub bridge: BridgeSettings,
}

pub enum DeployTarget {
    Local(LocalDeployParams),
    OnChain,
}

pub async fn deploy(target: DeployTarget) -> Result<Fixture> {
    let env = match target {
        DeployTarget::Local(p) => TaskEnv {
            client: p.client,
            accounts: p.accounts,
            bridge: p.bridge,
        },
        DeployTarget::OnChain => {
            let config = config()?;
            info!(network = ?config.network, bridge = ?config.bridge, "deploy config");
            let (client, accounts) = connect(&config).await?;
            TaskEnv {
                client,
                accounts,
                bridge: config.bridge,
            }
        }
    };
    let cache = TaskCache::new();
    register_tasks(&cache, env)?;
    let result = run(&cache).await?;
    Fixture::collect(&cache, result).await
}

/// Resolves every contract of the bridge, wires them together and returns
/// their addresses. A failure aborts the run once every task already started
/// has settled; contracts deployed before it stay on chain.
pub async fn run(cache: &TaskCache) -> Result<DeploymentResult> {
    let resolver = cache.resolver();
    // Fail on a short account list before anything is deployed.
    let identities = accounts(&resolver).await?;
    info!(
        operator = %format_args!("{:#x}", identities.operator.address()),
        accounts = identities.account_count(),
        "identities ready"
    );

    let (token_setup, bridge_bank, bridge_registry, rowan_contract, cosmos_bridge) = join!(
        resolver.resolve(TaskKey::BridgeTokenSetup),
        contract(&resolver, TaskKey::BRIDGE_BANK_PROXY),
        contract(&resolver, TaskKey::BRIDGE_REGISTRY_PROXY),
        contract(&resolver, TaskKey::RowanContract),
        contract(&resolver, TaskKey::COSMOS_BRIDGE_PROXY),
    );
    token_setup?;
    let (bridge_bank, bridge_registry, rowan_contract, cosmos_bridge) =
        (bridge_bank?, bridge_registry?, rowan_contract?, cosmos_bridge?);
    let result = DeploymentResult {
        cosmos_bridge: cosmos_bridge.address_hex(),
        bridge_bank: bridge_bank.address_hex(),
        bridge_registry: bridge_registry.address_hex(),
        rowan_contract: rowan_contract.address_hex(),
    };

    resolver.resolve(TaskKey::BridgeBankSetup).await?;
    info!(?result, "bridge deployed");
    Ok(result)
}

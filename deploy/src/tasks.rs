//! The bridge deployment expressed as tasks in a [`ResolutionCache`].
//!
//! Each task resolves its own dependencies through the [`TaskResolver`] it is
//! handed, so resolving any key pulls in exactly the part of the graph it
//! needs, and every contract is deployed once per session no matter how many
//! tasks depend on it.

use std::fmt;
use std::sync::Arc;

use fuels::types::ContractId;
use futures::try_join;
use tracing::info;

use crate::accounts::{derive_identities, Identity, IdentitySet, IdentitySource};
use crate::chain::{CallArg, ChainClient, DeployUnit, MethodCall};
use crate::container::{ResolutionCache, Resolver};
use crate::deployer::{ContractType, DeployResult};
use crate::error::{DeployError, Result};
use crate::shared::BridgeSettings;

const PROXY_ARTIFACT: &str = "proxy";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKey {
    Accounts,
    BridgeTokenSetup,
    RowanContract,
    Proxy(ContractType),
    BridgeBankSetup,
}

impl TaskKey {
    pub const BRIDGE_REGISTRY_PROXY: TaskKey = TaskKey::Proxy(ContractType::BridgeRegistry);
    pub const COSMOS_BRIDGE_PROXY: TaskKey = TaskKey::Proxy(ContractType::CosmosBridge);
    pub const BRIDGE_BANK_PROXY: TaskKey = TaskKey::Proxy(ContractType::BridgeBank);
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKey::Accounts => f.write_str("Accounts"),
            TaskKey::BridgeTokenSetup => f.write_str("BridgeTokenSetup"),
            TaskKey::RowanContract => f.write_str("RowanContract"),
            TaskKey::Proxy(contract) => write!(f, "{contract}Proxy"),
            TaskKey::BridgeBankSetup => f.write_str("BridgeBankSetup"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum TaskOutput {
    Accounts(Arc<IdentitySet>),
    Contract(DeployResult),
    /// The task only has effects.
    Complete,
}

impl TaskOutput {
    fn kind(&self) -> &'static str {
        match self {
            TaskOutput::Accounts(_) => "accounts",
            TaskOutput::Contract(_) => "contract",
            TaskOutput::Complete => "completion marker",
        }
    }

    pub fn into_accounts(self, task: TaskKey) -> Result<Arc<IdentitySet>> {
        match self {
            TaskOutput::Accounts(identities) => Ok(identities),
            other => Err(unexpected(task, "accounts", &other)),
        }
    }

    pub fn into_contract(self, task: TaskKey) -> Result<DeployResult> {
        match self {
            TaskOutput::Contract(result) => Ok(result),
            other => Err(unexpected(task, "contract", &other)),
        }
    }
}

fn unexpected(task: TaskKey, expected: &'static str, found: &TaskOutput) -> DeployError {
    DeployError::UnexpectedOutput {
        task: task.to_string(),
        expected,
        found: found.kind(),
    }
}

pub type TaskCache = ResolutionCache<TaskKey, TaskOutput>;
pub type TaskResolver = Resolver<TaskKey, TaskOutput>;

pub async fn accounts(resolver: &TaskResolver) -> Result<Arc<IdentitySet>> {
    resolver
        .resolve(TaskKey::Accounts)
        .await?
        .into_accounts(TaskKey::Accounts)
}

pub async fn contract(resolver: &TaskResolver, key: TaskKey) -> Result<DeployResult> {
    resolver.resolve(key).await?.into_contract(key)
}

/// What the tasks of one session share.
#[derive(Clone)]
pub struct TaskEnv {
    pub client: Arc<dyn ChainClient>,
    pub accounts: IdentitySource,
    pub bridge: BridgeSettings,
}

/// Registers every task of the bridge deployment in `cache`.
pub fn register_tasks(cache: &TaskCache, env: TaskEnv) -> Result<()> {
    let env = Arc::new(env);

    let e = Arc::clone(&env);
    cache.register(TaskKey::Accounts, move |_| {
        let env = Arc::clone(&e);
        async move {
            let identities = derive_identities(&env.accounts).await?;
            Ok(TaskOutput::Accounts(Arc::new(identities)))
        }
    })?;

    let e = Arc::clone(&env);
    cache.register(TaskKey::BridgeTokenSetup, move |resolver| {
        bridge_token_setup(Arc::clone(&e), resolver)
    })?;

    cache.register(TaskKey::RowanContract, |resolver| async move {
        let token = contract(&resolver, TaskKey::BridgeTokenSetup).await?;
        Ok(TaskOutput::Contract(token))
    })?;

    let e = Arc::clone(&env);
    cache.register(TaskKey::BRIDGE_REGISTRY_PROXY, move |resolver| {
        bridge_registry(Arc::clone(&e), resolver)
    })?;

    let e = Arc::clone(&env);
    cache.register(TaskKey::COSMOS_BRIDGE_PROXY, move |resolver| {
        cosmos_bridge(Arc::clone(&e), resolver)
    })?;

    let e = Arc::clone(&env);
    cache.register(TaskKey::BRIDGE_BANK_PROXY, move |resolver| {
        bridge_bank(Arc::clone(&e), resolver)
    })?;

    let e = Arc::clone(&env);
    cache.register(TaskKey::BridgeBankSetup, move |resolver| {
        bridge_bank_setup(Arc::clone(&e), resolver)
    })?;

    Ok(())
}

async fn bridge_token_setup(env: Arc<TaskEnv>, resolver: TaskResolver) -> Result<TaskOutput> {
    let identities = accounts(&resolver).await?;
    let settings = &env.bridge;
    let unit = DeployUnit::new(ContractType::BridgeToken.name()).with_constructor_args(vec![
        CallArg::Str(settings.token_name.clone()),
        CallArg::Str(settings.token_symbol.clone()),
        CallArg::U64(settings.token_decimals),
    ]);
    let target_id = deploy_and_confirm(env.client.as_ref(), unit, &identities.operator).await?;

    if settings.initial_supply > 0 {
        let mint = MethodCall::new(
            target_id,
            "mint",
            vec![
                CallArg::Address(identities.operator.address()),
                CallArg::U64(settings.initial_supply),
            ],
        );
        env.client.call(mint, &identities.operator).await?;
        info!(amount = settings.initial_supply, "minted initial supply to operator");
    }

    Ok(TaskOutput::Contract(DeployResult {
        contract: ContractType::BridgeToken,
        target_id,
        proxy_id: None,
    }))
}

async fn bridge_registry(env: Arc<TaskEnv>, resolver: TaskResolver) -> Result<TaskOutput> {
    let identities = accounts(&resolver).await?;
    let args = vec![CallArg::Address(identities.owner.address())];
    let result = deploy_with_proxy(&env, &identities.operator, ContractType::BridgeRegistry, args).await?;
    Ok(TaskOutput::Contract(result))
}

async fn cosmos_bridge(env: Arc<TaskEnv>, resolver: TaskResolver) -> Result<TaskOutput> {
    let (registry, identities) = try_join!(
        contract(&resolver, TaskKey::BRIDGE_REGISTRY_PROXY),
        accounts(&resolver),
    )?;
    let settings = &env.bridge;
    let validators = identities.validator_addresses();
    let powers = vec![settings.validator_power; validators.len()];
    let args = vec![
        CallArg::Address(identities.operator.address()),
        CallArg::U64(settings.consensus_threshold),
        CallArg::Addresses(validators),
        CallArg::U64s(powers),
        CallArg::U64(settings.network_descriptor),
        CallArg::Contract(registry.address()),
    ];
    let result = deploy_with_proxy(&env, &identities.operator, ContractType::CosmosBridge, args).await?;
    Ok(TaskOutput::Contract(result))
}

async fn bridge_bank(env: Arc<TaskEnv>, resolver: TaskResolver) -> Result<TaskOutput> {
    let (bridge, token, identities) = try_join!(
        contract(&resolver, TaskKey::COSMOS_BRIDGE_PROXY),
        contract(&resolver, TaskKey::BridgeTokenSetup),
        accounts(&resolver),
    )?;
    let args = vec![
        CallArg::Address(identities.operator.address()),
        CallArg::Contract(bridge.address()),
        CallArg::Address(identities.owner.address()),
        CallArg::Address(identities.pauser.address()),
        CallArg::U64(env.bridge.network_descriptor),
        CallArg::Contract(token.address()),
    ];
    let result = deploy_with_proxy(&env, &identities.operator, ContractType::BridgeBank, args).await?;
    Ok(TaskOutput::Contract(result))
}

async fn bridge_bank_setup(env: Arc<TaskEnv>, resolver: TaskResolver) -> Result<TaskOutput> {
    let (bank, registry, bridge, identities) = try_join!(
        contract(&resolver, TaskKey::BRIDGE_BANK_PROXY),
        contract(&resolver, TaskKey::BRIDGE_REGISTRY_PROXY),
        contract(&resolver, TaskKey::COSMOS_BRIDGE_PROXY),
        accounts(&resolver),
    )?;
    let bank_arg = || vec![CallArg::Contract(bank.address())];

    env.client
        .call(MethodCall::new(registry.address(), "set_bridge_bank", bank_arg()), &identities.owner)
        .await?;
    env.client
        .call(MethodCall::new(bridge.address(), "set_bridge_bank", bank_arg()), &identities.operator)
        .await?;
    info!(bridge_bank = %bank.address_hex(), "bridge bank registered");
    Ok(TaskOutput::Complete)
}

async fn deploy_and_confirm(
    client: &dyn ChainClient,
    unit: DeployUnit,
    signer: &Identity,
) -> Result<ContractId> {
    let artifact = unit.artifact.clone();
    let pending = client.deploy(unit, signer).await?;
    let id = pending.contract_id();
    info!(%artifact, contract_id = %format_args!("{id:#x}"), "waiting for confirmation");
    pending.wait().await?;
    Ok(id)
}

/// Deploys `contract` behind a fresh proxy and initializes it through the
/// proxy with `init_args`.
async fn deploy_with_proxy(
    env: &TaskEnv,
    signer: &Identity,
    contract: ContractType,
    init_args: Vec<CallArg>,
) -> Result<DeployResult> {
    let client = env.client.as_ref();
    let target_id = deploy_and_confirm(client, DeployUnit::new(contract.name()), signer).await?;
    let proxy_id = deploy_and_confirm(client, DeployUnit::new(PROXY_ARTIFACT), signer).await?;

    client
        .call(MethodCall::new(proxy_id, "initialize_proxy_ownership", vec![]), signer)
        .await?;
    client
        .call(
            MethodCall::new(proxy_id, "set_proxy_target", vec![CallArg::Contract(target_id)]),
            signer,
        )
        .await?;
    client
        .call(MethodCall::new(proxy_id, "initialize", init_args), signer)
        .await?;

    info!(
        %contract,
        target_id = %format_args!("{target_id:#x}"),
        proxy_id = %format_args!("{proxy_id:#x}"),
        "deployed behind proxy"
    );
    Ok(DeployResult {
        contract,
        target_id,
        proxy_id: Some(proxy_id),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::ResolutionState;
    use crate::fixture::{fixture_identities, fixture_source};
    use crate::local_chain::{ChainEvent, LocalChain};
    use std::time::Duration;

    fn session(chain: &LocalChain, bridge: BridgeSettings) -> TaskCache {
        let cache = TaskCache::new();
        register_tasks(
            &cache,
            TaskEnv {
                client: Arc::new(chain.clone()),
                accounts: fixture_source(None),
                bridge,
            },
        )
        .unwrap();
        cache
    }

    fn deployed_artifacts(chain: &LocalChain) -> Vec<String> {
        chain
            .events()
            .into_iter()
            .filter_map(|event| match event {
                ChainEvent::Deployed { artifact, .. } => Some(artifact),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_task_names() {
        assert_eq!(TaskKey::BRIDGE_REGISTRY_PROXY.to_string(), "BridgeRegistryProxy");
        assert_eq!(TaskKey::COSMOS_BRIDGE_PROXY.to_string(), "CosmosBridgeProxy");
        assert_eq!(TaskKey::BRIDGE_BANK_PROXY.to_string(), "BridgeBankProxy");
        assert_eq!(TaskKey::BridgeBankSetup.to_string(), "BridgeBankSetup");
    }

    #[tokio::test]
    async fn test_setup_pulls_in_prerequisites_once() {
        let chain = LocalChain::new();
        let cache = session(&chain, BridgeSettings::default());

        let output = cache.resolve(TaskKey::BridgeBankSetup).await.unwrap();

        assert!(matches!(output, TaskOutput::Complete));
        let artifacts = deployed_artifacts(&chain);
        let position = |name: &str| artifacts.iter().position(|a| a == name).unwrap();
        assert!(position("bridge_registry") < position("cosmos_bridge"));
        assert!(position("cosmos_bridge") < position("bridge_bank"));
        assert!(position("bridge_token") < position("bridge_bank"));
        for name in ["bridge_token", "bridge_registry", "cosmos_bridge", "bridge_bank"] {
            assert_eq!(chain.deployments_of(name), 1, "{name}");
        }
        assert_eq!(chain.deployments_of(PROXY_ARTIFACT), 3);
        for key in [TaskKey::Accounts, TaskKey::BRIDGE_BANK_PROXY, TaskKey::BridgeTokenSetup] {
            assert_eq!(cache.state(&key), Some(ResolutionState::Resolved));
        }
        // Nothing asked for the token handle.
        assert_eq!(cache.state(&TaskKey::RowanContract), None);
    }

    #[tokio::test]
    async fn test_proxy_is_initialized_in_order() {
        let chain = LocalChain::new();
        let cache = session(&chain, BridgeSettings::default());

        let resolver = cache.resolver();
        let registry = contract(&resolver, TaskKey::BRIDGE_REGISTRY_PROXY).await.unwrap();
        let proxy_id = registry.proxy_id.unwrap();

        let calls: Vec<_> = chain
            .events()
            .into_iter()
            .filter_map(|event| match event {
                ChainEvent::Called {
                    contract_id, method, ..
                } if contract_id == proxy_id => Some(method),
                _ => None,
            })
            .collect();
        assert_eq!(
            calls,
            vec!["initialize_proxy_ownership", "set_proxy_target", "initialize"]
        );
        assert_eq!(registry.address(), proxy_id);
        assert_eq!(chain.artifact_of(&registry.target_id).as_deref(), Some("bridge_registry"));
    }

    #[tokio::test]
    async fn test_rowan_contract_is_the_bridge_token() {
        let chain = LocalChain::new();
        let cache = session(&chain, BridgeSettings::default());
        let resolver = cache.resolver();

        let token = contract(&resolver, TaskKey::RowanContract).await.unwrap();
        let setup = contract(&resolver, TaskKey::BridgeTokenSetup).await.unwrap();

        assert_eq!(token, setup);
        assert_eq!(token.proxy_id, None);
        assert!(chain.calls_to("mint").is_empty());
    }

    #[tokio::test]
    async fn test_initial_supply_is_minted() {
        let chain = LocalChain::new();
        let settings = BridgeSettings {
            initial_supply: 1_000,
            ..BridgeSettings::default()
        };
        let cache = session(&chain, settings);

        let token = contract(&cache.resolver(), TaskKey::RowanContract).await.unwrap();

        assert_eq!(chain.calls_to("mint"), vec![token.target_id]);
    }

    #[tokio::test]
    async fn test_shared_dependency_deployed_once_under_concurrency() {
        let chain = LocalChain::new().with_confirmation_delay(Duration::from_millis(5));
        let cache = session(&chain, BridgeSettings::default());
        let resolver = cache.resolver();

        let (bridge, bank) = try_join!(
            contract(&resolver, TaskKey::COSMOS_BRIDGE_PROXY),
            contract(&resolver, TaskKey::BRIDGE_BANK_PROXY),
        )
        .unwrap();

        assert_ne!(bridge.address(), bank.address());
        assert_eq!(chain.deployments_of("bridge_registry"), 1);
        assert_eq!(chain.deployments_of("cosmos_bridge"), 1);
    }

    #[tokio::test]
    async fn test_too_few_accounts() {
        let chain = LocalChain::new();
        let cache = TaskCache::new();
        register_tasks(
            &cache,
            TaskEnv {
                client: Arc::new(chain.clone()),
                accounts: IdentitySource::Seed {
                    keys: crate::fixture::fixture_keys().into_iter().take(3).collect(),
                    provider: None,
                },
                bridge: BridgeSettings::default(),
            },
        )
        .unwrap();

        let err = cache.resolve(TaskKey::BridgeBankSetup).await.unwrap_err();

        assert!(matches!(
            err.root_cause(),
            DeployError::InsufficientAccounts { required: 4, available: 3 }
        ));
        assert!(chain.events().is_empty());
    }

    #[tokio::test]
    async fn test_bridge_failure_blocks_bank() {
        let chain = LocalChain::new();
        chain.fail_deployments_of("cosmos_bridge");
        let cache = session(&chain, BridgeSettings::default());

        let err = cache.resolve(TaskKey::BRIDGE_BANK_PROXY).await.unwrap_err();

        assert_eq!(err.failed_tasks(), vec!["BridgeBankProxy", "CosmosBridgeProxy"]);
        assert_eq!(chain.deployments_of("bridge_bank"), 0);
        // The registry is not rolled back.
        assert_eq!(chain.deployments_of("bridge_registry"), 1);
        let again = cache.resolve(TaskKey::COSMOS_BRIDGE_PROXY).await.unwrap_err();
        assert_eq!(again.failed_tasks(), vec!["CosmosBridgeProxy"]);
    }

    #[tokio::test]
    async fn test_wrong_output_kind() {
        let cache = TaskCache::new();
        cache
            .register_value(TaskKey::Accounts, TaskOutput::Complete)
            .unwrap();

        let err = accounts(&cache.resolver()).await.unwrap_err();

        assert!(matches!(
            err,
            DeployError::UnexpectedOutput { expected: "accounts", found: "completion marker", .. }
        ));
    }

    #[tokio::test]
    async fn test_roles_sign_their_calls() {
        let chain = LocalChain::new();
        let cache = session(&chain, BridgeSettings::default());
        cache.resolve(TaskKey::BridgeBankSetup).await.unwrap();
        let identities = fixture_identities().unwrap();
        let registry = contract(&cache.resolver(), TaskKey::BRIDGE_REGISTRY_PROXY)
            .await
            .unwrap();

        let setters: Vec<_> = chain
            .events()
            .into_iter()
            .filter_map(|event| match event {
                ChainEvent::Called {
                    contract_id,
                    method,
                    caller,
                } if method == "set_bridge_bank" => Some((contract_id, caller)),
                _ => None,
            })
            .collect();
        assert_eq!(setters.len(), 2);
        assert!(setters.contains(&(registry.address(), identities.owner.address())));
        for event in chain.events() {
            if let ChainEvent::Deployed { deployer, .. } = event {
                assert_eq!(deployer, identities.operator.address());
            }
        }
    }
}

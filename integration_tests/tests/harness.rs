mod utils;

use bridge_deploy::accounts::derive_identities;
use bridge_deploy::deployer::DeploymentResult;
use bridge_deploy::error::DeployError;
use bridge_deploy::fixture::Fixture;
use bridge_deploy::local_chain::{ChainEvent, LocalChain};
use bridge_deploy::shared::BridgeSettings;
use utils::*;

const INITIAL_SUPPLY: u64 = 100_000_000_000;

async fn setup() -> (LocalChain, Fixture) {
    let chain = LocalChain::new();
    let fixture = deploy_on(&chain, BridgeSettings::default()).await.unwrap();
    (chain, fixture)
}

mod tests {
    use super::*;
    use std::collections::HashSet;

    #[tokio::test]
    async fn test_deploy_bridge() {
        let (chain, fixture) = setup().await;

        let bank = fixture.bridge_bank().unwrap();
        let registry = fixture.bridge_registry().unwrap();
        let bridge = fixture.cosmos_bridge().unwrap();

        assert_eq!(fixture.result.bridge_bank, bank.address_hex());
        assert_eq!(fixture.result.bridge_registry, registry.address_hex());
        assert_eq!(fixture.result.cosmos_bridge, bridge.address_hex());
        assert_eq!(
            chain.calls_to("set_bridge_bank"),
            vec![registry.address(), bridge.address()]
        );
    }

    #[tokio::test]
    async fn test_report_json() {
        let (_, fixture) = setup().await;

        let json = serde_json::to_string(&fixture.result).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let object = value.as_object().unwrap();

        let keys: HashSet<&str> = object.keys().map(String::as_str).collect();
        assert_eq!(keys, REPORT_KEYS.into_iter().collect());
        for address in object.values() {
            let address = address.as_str().unwrap();
            assert!(address.starts_with("0x"));
            assert_eq!(address.len(), 66);
        }
        let parsed: DeploymentResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, fixture.result);
    }

    #[tokio::test]
    async fn test_addresses_are_distinct() {
        let (_, fixture) = setup().await;
        let result = &fixture.result;

        let addresses: HashSet<_> = [
            &result.bridge_bank,
            &result.bridge_registry,
            &result.cosmos_bridge,
            &result.rowan_contract,
        ]
        .into_iter()
        .collect();
        assert_eq!(addresses.len(), 4);
    }

    #[tokio::test]
    async fn test_every_contract_deployed_once() {
        let (chain, _) = setup().await;

        for artifact in ["bridge_token", "bridge_registry", "cosmos_bridge", "bridge_bank"] {
            assert_eq!(chain.deployments_of(artifact), 1);
        }
        assert_eq!(chain.deployments_of("proxy"), 3);
    }

    #[tokio::test]
    async fn test_deploys_are_confirmed() {
        let (chain, _) = setup().await;
        let events = chain.events();

        let deployed = events
            .iter()
            .filter(|e| matches!(e, ChainEvent::Deployed { .. }))
            .count();
        let confirmed = events
            .iter()
            .filter(|e| matches!(e, ChainEvent::Confirmed { .. }))
            .count();
        assert_eq!(deployed, 7);
        assert_eq!(confirmed, deployed);
    }

    #[tokio::test]
    async fn test_initial_supply_minted_to_operator() {
        let chain = LocalChain::new();
        let settings = BridgeSettings {
            initial_supply: INITIAL_SUPPLY,
            ..BridgeSettings::default()
        };

        let fixture = deploy_on(&chain, settings).await.unwrap();

        let token = fixture.bridge_token().unwrap();
        assert_eq!(chain.calls_to("mint"), vec![token.target_id]);
    }

    #[tokio::test]
    async fn test_fixture_identities_are_deterministic() {
        let (_, first) = setup().await;
        let (_, second) = setup().await;

        let first: Vec<_> = first.identities.roles().into_iter().map(|(_, i)| i.address()).collect();
        let second: Vec<_> = second.identities.roles().into_iter().map(|(_, i)| i.address()).collect();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_separate_runs_do_not_share_state() {
        let (first_chain, first) = setup().await;
        let (second_chain, second) = setup().await;

        assert_ne!(first.result, second.result);
        assert_eq!(first_chain.deployments_of("bridge_bank"), 1);
        assert_eq!(second_chain.deployments_of("bridge_bank"), 1);
    }

    #[tokio::test]
    async fn test_failed_deployment_reports_task_chain() {
        let chain = LocalChain::new();
        chain.fail_deployments_of("bridge_registry");

        let err = deploy_on(&chain, BridgeSettings::default()).await.err().unwrap();

        assert_eq!(err.failed_tasks().last().copied(), Some("BridgeRegistryProxy"));
        assert!(matches!(err.root_cause(), DeployError::Chain(_)));
        assert_eq!(chain.deployments_of("cosmos_bridge"), 0);
        assert_eq!(chain.deployments_of("bridge_bank"), 0);
    }

    #[tokio::test]
    async fn test_node_accounts_partition() {
        let source = node_accounts(6).await;

        let identities = derive_identities(&source).await.unwrap();

        assert_eq!(identities.validators.len(), 1);
        assert_eq!(identities.spares.len(), 2);
        assert_eq!(identities.account_count(), 6);
    }

    #[tokio::test]
    async fn test_node_with_too_few_accounts() {
        let chain = LocalChain::new();
        let source = node_accounts(3).await;

        let err = deploy_with(&chain, source, BridgeSettings::default())
            .await
            .err()
            .unwrap();

        assert!(matches!(
            err.root_cause(),
            DeployError::InsufficientAccounts {
                required: 4,
                available: 3
            }
        ));
        assert!(chain.events().is_empty());
    }
}

use std::sync::Arc;

use bridge_deploy::accounts::IdentitySource;
use bridge_deploy::deployer::{self, DeployTarget, LocalDeployParams};
use bridge_deploy::error::Result;
use bridge_deploy::fixture::{fixture_source, Fixture};
use bridge_deploy::fuel_chain::LocalNode;
use bridge_deploy::local_chain::LocalChain;
use bridge_deploy::shared::BridgeSettings;

pub const REPORT_KEYS: [&str; 4] = ["bridgeBank", "bridgeRegistry", "cosmosBridge", "rowanContract"];

/// Deploys the bridge on `chain` with the fixture accounts.
pub async fn deploy_on(chain: &LocalChain, bridge: BridgeSettings) -> Result<Fixture> {
    deploy_with(chain, fixture_source(None), bridge).await
}

pub async fn deploy_with(
    chain: &LocalChain,
    accounts: IdentitySource,
    bridge: BridgeSettings,
) -> Result<Fixture> {
    let params = LocalDeployParams {
        client: Arc::new(chain.clone()),
        accounts,
        bridge,
    };
    deployer::deploy(DeployTarget::Local(params)).await
}

/// An in-process node whose funded wallets are the account list.
pub async fn node_accounts(accounts: u64) -> IdentitySource {
    let node = LocalNode::launch(accounts).await.unwrap();
    IdentitySource::Runtime(Arc::new(node))
}

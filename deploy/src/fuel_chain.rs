use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::Utc;
use fuels::accounts::ViewOnlyAccount;
use fuels::core::codec::{encode_fn_selector, EncoderConfig, LogDecoder};
use fuels::core::traits::Tokenizable;
use fuels::prelude::{
    launch_custom_provider_and_get_wallets,
    Contract,
    ContractId,
    LoadConfiguration,
    Provider,
    TxPolicies,
    WalletUnlocked,
    WalletsConfig,
};
use fuels::programs::calls::{CallHandler, ContractCall};
use fuels::types::bech32::Bech32ContractId;
use fuels::types::Token;
use tracing::{debug, info};

use crate::accounts::{AccountSource, Identity};
use crate::chain::{CallArg, ChainClient, DeployUnit, MethodCall, PendingDeployment, Receipt};
use crate::error::{ChainError, Result};

const CONSTRUCTOR: &str = "constructor";

/// Deploys and calls contracts on a Fuel node.
#[derive(Clone)]
pub struct FuelChain {
    provider: Provider,
    artifacts_dir: PathBuf,
}

impl FuelChain {
    pub fn new(provider: Provider, artifacts_dir: impl Into<PathBuf>) -> Self {
        Self {
            provider,
            artifacts_dir: artifacts_dir.into(),
        }
    }

    pub async fn connect(url: &str, artifacts_dir: impl Into<PathBuf>) -> Result<Self, ChainError> {
        let provider = Provider::connect(url)
            .await
            .map_err(|e| ChainError::Provider(e.to_string()))?;
        info!(url, "connected to fuel node");
        Ok(Self::new(provider, artifacts_dir))
    }

    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    /// `<artifacts>/<name>/out/release/<name>.bin`
    pub fn artifact_path(&self, artifact: &str) -> PathBuf {
        self.artifacts_dir
            .join(artifact)
            .join("out")
            .join("release")
            .join(format!("{artifact}.bin"))
    }

    async fn send(&self, call: MethodCall, wallet: WalletUnlocked) -> Result<Receipt, ChainError> {
        let tokens: Vec<Token> = call.args.iter().map(to_token).collect();
        let handler: CallHandler<WalletUnlocked, ContractCall, ()> = CallHandler::new_contract_call(
            Bech32ContractId::from(call.contract),
            wallet,
            encode_fn_selector(&call.method),
            &tokens,
            LogDecoder::new(HashMap::new()),
            false,
            EncoderConfig::default(),
        );
        let response = handler.call().await.map_err(|e| ChainError::Reverted {
            method: call.method.clone(),
            message: e.to_string(),
        })?;
        debug!(method = %call.method, "call confirmed");
        Ok(Receipt {
            tx_id: response.tx_id.map(|id| format!("{id:#x}")),
            contract_id: None,
            confirmed_at: Utc::now(),
        })
    }
}

fn to_token(arg: &CallArg) -> Token {
    match arg {
        CallArg::Address(address) => address.into_token(),
        CallArg::Contract(contract_id) => contract_id.into_token(),
        CallArg::U64(value) => value.into_token(),
        CallArg::Str(value) => value.clone().into_token(),
        CallArg::Addresses(addresses) => addresses.clone().into_token(),
        CallArg::U64s(values) => values.clone().into_token(),
    }
}

#[async_trait]
impl ChainClient for FuelChain {
    async fn deploy(&self, unit: DeployUnit, signer: &Identity) -> Result<PendingDeployment, ChainError> {
        let wallet = signer.wallet_on(&self.provider);
        let path = self.artifact_path(&unit.artifact);
        let contract = Contract::load_from(&path, LoadConfiguration::default()).map_err(|e| {
            ChainError::Artifact {
                path: path.display().to_string(),
                message: e.to_string(),
            }
        })?;
        let id: ContractId = contract
            .with_salt(unit.salt)
            .deploy(&wallet, TxPolicies::default())
            .await
            .map_err(|e| ChainError::Rejected(e.to_string()))?
            .into();
        info!(artifact = %unit.artifact, contract_id = %format_args!("{id:#x}"), "contract deployed");

        // The node has already committed the deployment; only the constructor
        // call, if any, remains before the contract is usable.
        let chain = self.clone();
        let args = unit.constructor_args;
        let confirmation = async move {
            if !args.is_empty() {
                chain.send(MethodCall::new(id, CONSTRUCTOR, args), wallet).await?;
            }
            Ok(Receipt {
                tx_id: None,
                contract_id: Some(id),
                confirmed_at: Utc::now(),
            })
        };
        Ok(PendingDeployment::new(id, confirmation))
    }

    async fn call(&self, call: MethodCall, signer: &Identity) -> Result<Receipt, ChainError> {
        let wallet = signer.wallet_on(&self.provider);
        self.send(call, wallet).await
    }
}

/// An in-process node with funded wallets. Its wallets are the account list
/// of a live runtime.
pub struct LocalNode {
    wallets: Vec<WalletUnlocked>,
    provider: Provider,
}

impl LocalNode {
    pub async fn launch(accounts: u64) -> Result<Self, ChainError> {
        let wallets = launch_custom_provider_and_get_wallets(
            WalletsConfig::new(Some(accounts), Some(2), Some(1_000_000_000)),
            None,
            None,
        )
        .await
        .map_err(|e| ChainError::Provider(e.to_string()))?;
        let provider = match wallets.first() {
            Some(wallet) => wallet
                .try_provider()
                .map_err(|e| ChainError::Provider(e.to_string()))?
                .clone(),
            None => {
                return Err(ChainError::Provider(
                    "local node launched without wallets".to_string(),
                ))
            }
        };
        info!(accounts = wallets.len(), "launched local node");
        Ok(Self { wallets, provider })
    }

    pub fn provider(&self) -> &Provider {
        &self.provider
    }
}

#[async_trait]
impl AccountSource for LocalNode {
    async fn list_accounts(&self) -> Result<Vec<Identity>> {
        Ok(self.wallets.iter().cloned().map(Identity::from_wallet).collect())
    }
}

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use dotenvy::dotenv;
use fuels::prelude::Provider;

use crate::accounts::IdentitySource;
use crate::chain::ChainClient;
use crate::error::{ConfigError, Result};
use crate::fixture::fixture_source;
use crate::fuel_chain::{FuelChain, LocalNode};
use crate::local_chain::LocalChain;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Network {
    /// In-memory chain, nothing leaves the process.
    DryRun,
    /// In-process Fuel node; its funded wallets are the accounts.
    LocalNode { accounts: u64 },
    Remote { url: String },
}

/// Parameters the bridge contracts are initialized with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeSettings {
    pub consensus_threshold: u64,
    pub validator_power: u64,
    pub network_descriptor: u64,
    pub token_name: String,
    pub token_symbol: String,
    pub token_decimals: u64,
    pub initial_supply: u64,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            consensus_threshold: 75,
            validator_power: 100,
            network_descriptor: 1,
            token_name: "erowan".to_string(),
            token_symbol: "erowan".to_string(),
            token_decimals: 18,
            initial_supply: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub network: Network,
    pub artifacts_dir: PathBuf,
    /// Seed keys for the identity set; the fixture keys when unset.
    pub signer_keys: Option<Vec<String>>,
    pub bridge: BridgeSettings,
}

/// Loads `.env` if present and reads the configuration from the environment.
pub fn config() -> Result<Config, ConfigError> {
    env_file_loaded(dotenv())?;
    Config::from_lookup(|name| std::env::var(name).ok())
}

/// A missing `.env` is fine, an unreadable or malformed one is not.
fn env_file_loaded(result: Result<PathBuf, dotenvy::Error>) -> Result<(), ConfigError> {
    match result {
        Ok(_) => Ok(()),
        Err(e) if e.not_found() => Ok(()),
        Err(e) => Err(ConfigError::EnvFile(e.to_string())),
    }
}

impl Config {
    pub fn from_lookup<F>(lookup: F) -> Result<Config, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let network_name = var("DEPLOY_NETWORK").ok_or(ConfigError::Missing("DEPLOY_NETWORK"))?;
        let network = match network_name.as_str() {
            "dry-run" => Network::DryRun,
            "local-node" => Network::LocalNode {
                accounts: parse_or(&var, "LOCAL_NODE_ACCOUNTS", 6)?,
            },
            "remote" => Network::Remote {
                url: var("FUEL_URL").ok_or(ConfigError::Missing("FUEL_URL"))?,
            },
            other => {
                return Err(ConfigError::Invalid {
                    var: "DEPLOY_NETWORK",
                    message: format!("{other}, must be dry-run, local-node or remote"),
                })
            }
        };
        let defaults = BridgeSettings::default();
        let bridge = BridgeSettings {
            consensus_threshold: parse_or(&var, "CONSENSUS_THRESHOLD", defaults.consensus_threshold)?,
            validator_power: parse_or(&var, "VALIDATOR_POWER", defaults.validator_power)?,
            network_descriptor: parse_or(&var, "NETWORK_DESCRIPTOR", defaults.network_descriptor)?,
            initial_supply: parse_or(&var, "ROWAN_INITIAL_SUPPLY", defaults.initial_supply)?,
            ..defaults
        };
        if bridge.consensus_threshold == 0 || bridge.consensus_threshold > 100 {
            return Err(ConfigError::Invalid {
                var: "CONSENSUS_THRESHOLD",
                message: format!("{} is not a percentage in 1..=100", bridge.consensus_threshold),
            });
        }
        Ok(Config {
            network,
            artifacts_dir: var("ARTIFACTS_DIR").unwrap_or_else(|| "..".to_string()).into(),
            signer_keys: var("SIGNER_KEYS").map(|keys| {
                keys.split(',')
                    .map(|key| key.trim().to_string())
                    .filter(|key| !key.is_empty())
                    .collect()
            }),
            bridge,
        })
    }

    fn identity_source(&self, provider: Option<Provider>) -> IdentitySource {
        match &self.signer_keys {
            Some(keys) => IdentitySource::Seed {
                keys: keys.clone(),
                provider,
            },
            None => fixture_source(provider),
        }
    }
}

fn parse_or<F, T>(var: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(name) {
        Some(value) => value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var: name,
            message: format!("{value}: {e}"),
        }),
        None => Ok(default),
    }
}

/// The chain client and identity source for the configured network.
pub async fn connect(config: &Config) -> Result<(Arc<dyn ChainClient>, IdentitySource)> {
    match &config.network {
        Network::DryRun => {
            let chain: Arc<dyn ChainClient> = Arc::new(LocalChain::new());
            Ok((chain, config.identity_source(None)))
        }
        Network::LocalNode { accounts } => {
            let node = Arc::new(LocalNode::launch(*accounts).await?);
            let chain: Arc<dyn ChainClient> = Arc::new(FuelChain::new(
                node.provider().clone(),
                config.artifacts_dir.clone(),
            ));
            Ok((chain, IdentitySource::Runtime(node)))
        }
        Network::Remote { url } => {
            let fuel = FuelChain::connect(url, config.artifacts_dir.clone()).await?;
            let source = config.identity_source(Some(fuel.provider().clone()));
            let chain: Arc<dyn ChainClient> = Arc::new(fuel);
            Ok((chain, source))
        }
    }
}

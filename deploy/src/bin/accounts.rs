//! Prints the address assigned to each bridge role for the configured network.

use anyhow::Context;
use bridge_deploy::accounts::derive_identities;
use bridge_deploy::shared::{config, connect};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = config().context("loading config")?;
    let (_, source) = connect(&config).await?;
    let identities = derive_identities(&source)
        .await
        .context("deriving identities")?;

    for (role, identity) in identities.roles() {
        println!("{role:<10} {:#x}", identity.address());
    }
    Ok(())
}

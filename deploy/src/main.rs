use std::process::ExitCode;

use anyhow::Context;
use bridge_deploy::deployer::{deploy, DeployTarget};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match run().await {
        Ok(report) => {
            println!("{report}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("deployment failed: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<String> {
    let fixture = deploy(DeployTarget::OnChain).await.context("bridge deployment")?;
    let report = serde_json::to_string(&fixture.result)?;
    Ok(report)
}

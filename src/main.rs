// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::Result;
use kube::Client;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use argocd_operator::config::Config;
use argocd_operator::kubernetes::{discover_capabilities, wait_for_argocd_crd};
use argocd_operator::reconcilers::{ArgoCDController, Context};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting ArgoCD operator");

    let config = Config::from_env()?;
    info!(
        "Configuration loaded: watch_namespace={:?}, disable_dex={}, redis_config_path={}",
        config.watch_namespace, config.disable_dex, config.redis_config_path
    );

    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    info!("Waiting for ArgoCD CRD to become available...");
    wait_for_argocd_crd(&client).await?;

    let capabilities = discover_capabilities(&client).await?;

    let controller = ArgoCDController::new(Context::new(client, config, capabilities));
    info!("Starting ArgoCD controller...");
    controller.run().await?;

    // The controller runs until the watch streams end
    warn!("ArgoCD controller stopped unexpectedly");
    Ok(())
}

// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! CRD availability checking utilities

use crate::constants::crd::{POLL_INTERVAL_SECS, POLL_MAX_INTERVAL_SECS};
use crate::constants::discovery::ARGOCD_GROUP;
use crate::error::Result;
use crate::types::ArgoCD;
use kube::{discovery::Discovery, Client, Resource};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Wait for the ArgoCD CRD to become available in the cluster.
/// This uses exponential backoff starting at POLL_INTERVAL_SECS seconds.
pub async fn wait_for_argocd_crd(client: &Client) -> Result<()> {
    let mut interval = POLL_INTERVAL_SECS;

    loop {
        match check_argocd_crd_exists(client).await {
            Ok(true) => {
                info!("ArgoCD CRD ({}) is available", ArgoCD::api_version(&()));
                return Ok(());
            }
            Ok(false) => {
                info!(
                    "ArgoCD CRD ({}) not yet available, waiting {} seconds...",
                    ArgoCD::api_version(&()),
                    interval
                );
            }
            Err(e) => {
                warn!(
                    "Error checking for ArgoCD CRD: {}, retrying in {} seconds...",
                    e, interval
                );
            }
        }

        sleep(Duration::from_secs(interval)).await;

        interval = (interval * 2).min(POLL_MAX_INTERVAL_SECS);
    }
}

async fn check_argocd_crd_exists(client: &Client) -> Result<bool> {
    let discovery = Discovery::new(client.clone())
        .filter(&[ARGOCD_GROUP])
        .run()
        .await?;

    let found = discovery
        .groups()
        .filter(|group| group.name() == ARGOCD_GROUP)
        .flat_map(|group| group.recommended_resources())
        .any(|(ar, _)| ar.kind == ArgoCD::kind(&()) && ar.version == ArgoCD::version(&()));
    Ok(found)
}

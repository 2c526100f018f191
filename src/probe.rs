//! Connectivity probe
//!
//! Determines whether the external classification service is currently
//! reachable. Fails closed: any transport error, timeout, or non-success
//! status reports offline, so a stalled external call can never hang a
//! submission. The probe is re-evaluated on every submission and before
//! every sync pass; there is no cached "assume online" state.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use crate::config::ClassifierConfig;

#[async_trait]
pub trait Connectivity: Send + Sync {
    async fn is_online(&self) -> bool;
}

/// Probes the classifier's health endpoint over HTTP.
pub struct HttpProbe {
    client: reqwest::Client,
    health_url: String,
}

impl HttpProbe {
    pub fn new(config: &ClassifierConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.probe_timeout_ms))
            .build()
            .context("building probe HTTP client")?;
        Ok(Self {
            client,
            health_url: config.health_url(),
        })
    }
}

#[async_trait]
impl Connectivity for HttpProbe {
    async fn is_online(&self) -> bool {
        match self.client.get(&self.health_url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(error = %e, "Connectivity probe failed, treating as offline");
                false
            }
        }
    }
}

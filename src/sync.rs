//! Sync reconciler
//!
//! Drains the offline queue once connectivity returns. Each queued
//! submission is replayed through the engine's online path at most once;
//! the queue entry is consumed whether the replay succeeds or fails, so a
//! rejected or unreplayable entry is dropped rather than retried. A single
//! in-flight lock prevents overlapping passes from double-draining.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::engine::VerificationEngine;
use crate::offline::OfflineStore;
use crate::probe::Connectivity;

#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct SyncReport {
    pub synced_disposals: u64,
    pub failed_disposals: u64,
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("a sync pass is already running")]
    AlreadyRunning,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub struct SyncReconciler {
    engine: Arc<VerificationEngine>,
    offline: Arc<OfflineStore>,
    connectivity: Arc<dyn Connectivity>,
    in_flight: tokio::sync::Mutex<()>,
}

impl SyncReconciler {
    pub fn new(
        engine: Arc<VerificationEngine>,
        offline: Arc<OfflineStore>,
        connectivity: Arc<dyn Connectivity>,
    ) -> Self {
        Self {
            engine,
            offline,
            connectivity,
            in_flight: tokio::sync::Mutex::new(()),
        }
    }

    /// Replay pending queued disposals in enqueue order. Returns without
    /// touching the queue if the classifier is still unreachable.
    pub async fn sync_offline_data(&self) -> Result<SyncReport, SyncError> {
        let _guard = self
            .in_flight
            .try_lock()
            .map_err(|_| SyncError::AlreadyRunning)?;

        if !self.connectivity.is_online().await {
            info!("Sync requested while offline, leaving queue untouched");
            return Ok(SyncReport::default());
        }

        let pending = self.offline.pending_disposals().await?;
        let mut report = SyncReport::default();

        for queued in pending {
            match self.engine.replay_queued(&queued).await {
                Ok(()) => report.synced_disposals += 1,
                Err(e) => {
                    warn!(
                        queue_id = queued.id,
                        user_id = %queued.user_id,
                        error = %e,
                        "Queued disposal failed replay, dropping"
                    );
                    report.failed_disposals += 1;
                }
            }
            // At most one attempt per entry: consumed on success or failure
            self.offline.remove(queued.id).await?;
        }

        info!(
            synced = report.synced_disposals,
            failed = report.failed_disposals,
            "Offline queue drained"
        );
        Ok(report)
    }
}

//! Disposal verification engine
//!
//! Per-submission state machine: input validation, anti-cheat, payload
//! decoding, routing by connectivity, AI classification, reward handoff.
//! The same engine serves interactive submissions and the sync reconciler's
//! replays; replays enter at the decode step and always take the online
//! branch.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::classify::{Classification, Classifier};
use crate::error::VerifyError;
use crate::offline::{OfflineStore, QueuedDisposal};
use crate::probe::Connectivity;
use crate::store::models::Disposal;
use crate::store::Store;

pub mod challenge;
pub mod ledger;
pub mod rank;

/// Anti-cheat cooldown window.
pub const ANTI_CHEAT_WINDOW_SECS: i64 = 60;
/// Anti-cheat location tolerance in degrees (~20 meters).
pub const ANTI_CHEAT_TOLERANCE_DEG: f64 = 0.0002;

/// Placeholder classification for offline-queued disposals. Stands as the
/// permanent record for the provisional reward; never retroactively
/// corrected once the queued entry is replayed.
pub const OFFLINE_CATEGORY: &str = "General Waste";
pub const OFFLINE_SUB_TYPE: &str = "Other General Waste";

/// An incoming disposal submission. All fields are required; validation is
/// the engine's first step so the API layer stays dumb.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DisposalRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    /// Base64-encoded video, optionally data-URI prefixed
    #[serde(default)]
    pub video: Option<String>,
}

/// Post-reward user totals, absent on the offline path.
#[derive(Debug, Clone)]
pub struct UserTotals {
    pub points: i64,
    pub xp: i64,
    pub streak: i64,
    pub eco_rank: &'static str,
}

/// Successful result of a submission, online or offline.
#[derive(Debug, Clone)]
pub struct DisposalOutcome {
    pub points_earned: i64,
    pub xp_earned: i64,
    pub waste_category: String,
    pub waste_sub_type: String,
    pub bonuses_awarded: Vec<String>,
    pub challenges_completed: Vec<String>,
    pub totals: Option<UserTotals>,
    /// True when the submission was queued for later validation
    pub offline: bool,
    /// Whether the ledger transaction landed. The classification outcome is
    /// authoritative; callers decide what a false here means.
    pub ledger_committed: bool,
}

/// Is the new submission within the cooldown window and tolerance box of
/// the user's most recent disposal?
pub fn too_close(previous: &Disposal, latitude: f64, longitude: f64, now: DateTime<Utc>) -> bool {
    now.signed_duration_since(previous.timestamp) < Duration::seconds(ANTI_CHEAT_WINDOW_SECS)
        && (latitude - previous.latitude).abs() < ANTI_CHEAT_TOLERANCE_DEG
        && (longitude - previous.longitude).abs() < ANTI_CHEAT_TOLERANCE_DEG
}

/// Strip an optional data-URI prefix (`<metadata>,<data>`) and decode.
pub fn decode_video(payload: &str) -> Result<Vec<u8>, VerifyError> {
    let data = payload
        .split_once(',')
        .map(|(_, data)| data)
        .unwrap_or(payload);
    BASE64
        .decode(data.trim())
        .map_err(|_| VerifyError::InvalidVideo)
}

fn validate(req: &DisposalRequest) -> Result<(&str, f64, f64, &str), VerifyError> {
    let user_id = req
        .user_id
        .as_deref()
        .filter(|id| !id.trim().is_empty())
        .ok_or(VerifyError::InvalidInput)?;
    let latitude = req.latitude.filter(|v| v.is_finite()).ok_or(VerifyError::InvalidInput)?;
    let longitude = req.longitude.filter(|v| v.is_finite()).ok_or(VerifyError::InvalidInput)?;
    let video = req
        .video
        .as_deref()
        .filter(|v| !v.is_empty())
        .ok_or(VerifyError::InvalidInput)?;
    Ok((user_id, latitude, longitude, video))
}

/// Accepts a submission, applies anti-cheat, routes to classification or
/// the offline queue, and hands accepted disposals to the ledger.
pub struct VerificationEngine {
    store: Arc<Mutex<Store>>,
    offline: Arc<OfflineStore>,
    connectivity: Arc<dyn Connectivity>,
    classifier: Arc<dyn Classifier>,
}

impl VerificationEngine {
    pub fn new(
        store: Arc<Mutex<Store>>,
        offline: Arc<OfflineStore>,
        connectivity: Arc<dyn Connectivity>,
        classifier: Arc<dyn Classifier>,
    ) -> Self {
        Self {
            store,
            offline,
            connectivity,
            classifier,
        }
    }

    /// Run one submission to completion.
    pub async fn process(&self, req: &DisposalRequest) -> Result<DisposalOutcome, VerifyError> {
        let (user_id, latitude, longitude, video) = validate(req)?;
        let now = Utc::now();

        let previous = {
            let store = self.store.lock().await;
            if store.get_user(user_id)?.is_none() {
                return Err(VerifyError::UserNotFound);
            }
            store.latest_disposal(user_id)?
        };

        // Anti-cheat: only the single most recent disposal is checked
        if let Some(previous) = previous {
            if too_close(&previous, latitude, longitude, now) {
                info!(user_id, "Rejected disposal: too close to previous");
                return Err(VerifyError::TooClose);
            }
        }

        let video_bytes = decode_video(video)?;

        if !self.connectivity.is_online().await {
            return self.queue_offline(user_id, latitude, longitude, video).await;
        }

        let classification = match self.classifier.classify(&video_bytes).await {
            Ok(classification) => classification,
            Err(e) => {
                warn!(user_id, error = %e, "Classifier unreachable, queueing offline");
                return self.queue_offline(user_id, latitude, longitude, video).await;
            }
        };

        let (category, sub_type) = match classification {
            Classification::Accepted { category, sub_type } => (category, sub_type),
            Classification::Rejected(reason) => {
                info!(user_id, reason = %reason, "Classification rejected disposal");
                return Err(VerifyError::Rejected(reason));
            }
        };

        self.award(user_id, &category, &sub_type, latitude, longitude, now)
            .await
    }

    /// Replay one queued submission through the online path. Enters at the
    /// decode step: anti-cheat is not re-applied, since queued entries are
    /// by construction close in time to one another.
    pub async fn replay_queued(&self, queued: &QueuedDisposal) -> Result<(), VerifyError> {
        let video_bytes = decode_video(&queued.payload)?;
        {
            let store = self.store.lock().await;
            if store.get_user(&queued.user_id)?.is_none() {
                return Err(VerifyError::UserNotFound);
            }
        }
        let now = Utc::now();

        match self.classifier.classify(&video_bytes).await {
            Ok(Classification::Accepted { category, sub_type }) => {
                let outcome = self
                    .award(
                        &queued.user_id,
                        &category,
                        &sub_type,
                        queued.latitude,
                        queued.longitude,
                        now,
                    )
                    .await?;
                if !outcome.ledger_committed {
                    return Err(VerifyError::Internal(anyhow::anyhow!(
                        "ledger commit failed during replay"
                    )));
                }
                Ok(())
            }
            Ok(Classification::Rejected(reason)) => Err(VerifyError::Rejected(reason)),
            Err(e) => Err(VerifyError::Internal(e)),
        }
    }

    async fn award(
        &self,
        user_id: &str,
        category: &str,
        sub_type: &str,
        latitude: f64,
        longitude: f64,
        now: DateTime<Utc>,
    ) -> Result<DisposalOutcome, VerifyError> {
        let mut store = self.store.lock().await;
        // Re-read under the lock: a snapshot taken before classification may
        // predate a concurrent commit for the same user, which would pay the
        // one-time bonuses twice
        let user = store.get_user(user_id)?.ok_or(VerifyError::UserNotFound)?;
        let mut rng = rand::thread_rng();
        let plan = ledger::plan(
            &store, &user, category, sub_type, latitude, longitude, now, &mut rng,
        )?;
        let ledger_committed = match ledger::commit(&mut store, &plan, latitude, longitude, now) {
            Ok(()) => true,
            Err(e) => {
                error!(
                    user_id,
                    error = %e,
                    "Ledger commit failed after accepted classification"
                );
                false
            }
        };
        drop(store);

        let total_xp = user.xp + plan.xp;
        Ok(DisposalOutcome {
            points_earned: plan.points,
            xp_earned: plan.xp,
            waste_category: plan.category.clone(),
            waste_sub_type: plan.sub_type.clone(),
            bonuses_awarded: plan.bonuses.clone(),
            challenges_completed: plan.challenges_completed.clone(),
            totals: Some(UserTotals {
                points: user.points + plan.points,
                xp: total_xp,
                streak: plan.new_streak,
                eco_rank: rank::eco_rank(total_xp),
            }),
            offline: false,
            ledger_committed,
        })
    }

    async fn queue_offline(
        &self,
        user_id: &str,
        latitude: f64,
        longitude: f64,
        payload: &str,
    ) -> Result<DisposalOutcome, VerifyError> {
        self.offline
            .enqueue_disposal(user_id, latitude, longitude, payload)
            .await
            .map_err(VerifyError::OfflineStore)?;
        info!(user_id, "Disposal queued for validation after reconnect");

        // Provisional reward; stands permanently even after replay
        Ok(DisposalOutcome {
            points_earned: ledger::BASE_POINTS,
            xp_earned: ledger::BASE_XP,
            waste_category: OFFLINE_CATEGORY.to_string(),
            waste_sub_type: OFFLINE_SUB_TYPE.to_string(),
            bonuses_awarded: Vec::new(),
            challenges_completed: Vec::new(),
            totals: None,
            offline: true,
            ledger_committed: false,
        })
    }
}

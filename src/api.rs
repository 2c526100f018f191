//! HTTP API
//!
//! Thin axum layer over the verification engine, ledger-backed reads and the
//! sync reconciler. Profile and hotspot reads fall back to the offline
//! store's cached snapshots when the primary store fails. All unexpected
//! errors are converted here into a generic `SERVER_ERROR` response.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::error;

use crate::engine::{challenge, rank, DisposalOutcome, DisposalRequest, VerificationEngine};
use crate::error::VerifyError;
use crate::offline::OfflineStore;
use crate::probe::Connectivity;
use crate::store::models::WASTE_CATEGORIES;
use crate::store::Store;
use crate::sync::{SyncError, SyncReconciler};

/// Shared state for all handlers. Constructed once at startup; no hidden
/// module-level globals.
pub struct AppState {
    pub store: Arc<Mutex<Store>>,
    pub offline: Arc<OfflineStore>,
    pub engine: Arc<VerificationEngine>,
    pub reconciler: Arc<SyncReconciler>,
    pub connectivity: Arc<dyn Connectivity>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/user/:user_id", get(get_user))
        .route("/api/user/:user_id/discovered_categories", get(discovered_categories))
        .route("/api/hotspots", get(get_hotspots))
        .route("/api/verify_disposal", post(verify_disposal))
        .route("/api/sync_offline", post(sync_offline))
        .route("/api/offline_status", get(offline_status))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    "OK"
}

/// Wire shape of a successful submission response.
#[derive(Serialize)]
struct DisposalResponse {
    success: bool,
    points_earned: i64,
    xp_earned: i64,
    waste_category: String,
    waste_sub_type: String,
    bonuses_awarded: Vec<String>,
    challenges_completed: Vec<String>,
    reason_code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    new_total_points: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    new_total_xp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    new_streak: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    eco_rank: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    offline_mode: Option<bool>,
}

impl DisposalResponse {
    fn from_outcome(outcome: &DisposalOutcome) -> Self {
        Self {
            success: true,
            points_earned: outcome.points_earned,
            xp_earned: outcome.xp_earned,
            waste_category: outcome.waste_category.clone(),
            waste_sub_type: outcome.waste_sub_type.clone(),
            bonuses_awarded: outcome.bonuses_awarded.clone(),
            challenges_completed: outcome.challenges_completed.clone(),
            reason_code: if outcome.offline { "OFFLINE_CACHED" } else { "SUCCESS" },
            message: outcome.offline.then_some(
                "Disposal cached offline and will be validated when connection is restored.",
            ),
            new_total_points: outcome.totals.as_ref().map(|t| t.points),
            new_total_xp: outcome.totals.as_ref().map(|t| t.xp),
            new_streak: outcome.totals.as_ref().map(|t| t.streak),
            eco_rank: outcome.totals.as_ref().map(|t| t.eco_rank),
            offline_mode: outcome.offline.then_some(true),
        }
    }
}

fn error_status(err: &VerifyError) -> StatusCode {
    match err {
        VerifyError::InvalidInput | VerifyError::InvalidVideo | VerifyError::TooClose => {
            StatusCode::BAD_REQUEST
        }
        VerifyError::UserNotFound => StatusCode::NOT_FOUND,
        // Classification rejections are a normal, successful exchange
        VerifyError::Rejected(_) => StatusCode::OK,
        VerifyError::OfflineStore(_) | VerifyError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

async fn verify_disposal(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DisposalRequest>,
) -> impl IntoResponse {
    match state.engine.process(&req).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(serde_json::to_value(DisposalResponse::from_outcome(&outcome)).unwrap_or_else(
                |e| {
                    error!(error = %e, "Failed to serialize disposal response");
                    server_error_body()
                },
            )),
        ),
        Err(err) => {
            if matches!(err, VerifyError::Internal(_) | VerifyError::OfflineStore(_)) {
                error!(error = %err, "Disposal verification failed");
            }
            (
                error_status(&err),
                Json(json!({
                    "success": false,
                    "reason_code": err.reason_code(),
                    "message": err.user_message(),
                })),
            )
        }
    }
}

async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    match build_user_profile(&state, &user_id).await {
        Ok(profile) => {
            state.offline.cache_user_profile(&user_id, &profile).await;
            (StatusCode::OK, Json(profile))
        }
        Err(e) => {
            error!(user_id = %user_id, error = %e, "User profile read failed, trying cache");
            match state.offline.cached_user_profile(&user_id).await {
                Some(cached) => (StatusCode::OK, Json(cached)),
                None => (StatusCode::INTERNAL_SERVER_ERROR, Json(server_error_body())),
            }
        }
    }
}

async fn build_user_profile(state: &AppState, user_id: &str) -> anyhow::Result<Value> {
    let store = state.store.lock().await;
    let user = store.get_or_create_user(user_id)?;
    let mut rng = rand::thread_rng();
    let (assigned, progress) =
        challenge::assignment_for_today(&store, user_id, Utc::now().date_naive(), &mut rng)?;

    Ok(json!({
        "user_id": user.user_id,
        "xp": user.xp,
        "points": user.points,
        "streak": user.streak,
        "eco_rank": rank::eco_rank(user.xp),
        "has_completed_first_disposal": user.has_completed_first_disposal,
        "daily_challenge": {
            "description": assigned.description,
            "progress": progress.current_progress,
            "goal": assigned.goal,
            "reward": assigned.reward,
        },
    }))
}

async fn discovered_categories(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    let store = state.store.lock().await;
    let mut discovered = serde_json::Map::new();
    for category in WASTE_CATEGORIES {
        match store.has_disposed_category(&user_id, category) {
            Ok(seen) => {
                discovered.insert(category.to_string(), Value::Bool(seen));
            }
            Err(e) => {
                error!(user_id = %user_id, error = %e, "Discovered-categories read failed");
                return (StatusCode::INTERNAL_SERVER_ERROR, Json(server_error_body()));
            }
        }
    }
    (StatusCode::OK, Json(Value::Object(discovered)))
}

async fn get_hotspots(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let result: anyhow::Result<Value> = {
        let store = state.store.lock().await;
        store
            .active_hotspots(Utc::now())
            .and_then(|hotspots| Ok(serde_json::to_value(hotspots)?))
    };
    match result {
        Ok(hotspots) => {
            state.offline.cache_hotspots(&hotspots).await;
            (StatusCode::OK, Json(hotspots))
        }
        Err(e) => {
            error!(error = %e, "Hotspot read failed, trying cache");
            match state.offline.cached_hotspots().await {
                Some(cached) => (StatusCode::OK, Json(cached)),
                None => (StatusCode::INTERNAL_SERVER_ERROR, Json(server_error_body())),
            }
        }
    }
}

async fn sync_offline(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.reconciler.sync_offline_data().await {
        Ok(report) => (
            StatusCode::OK,
            Json(json!({
                "message": "Offline data synced successfully",
                "synced_disposals": report.synced_disposals,
                "failed_disposals": report.failed_disposals,
            })),
        ),
        Err(SyncError::AlreadyRunning) => (
            StatusCode::CONFLICT,
            Json(json!({
                "success": false,
                "reason_code": "SYNC_IN_PROGRESS",
                "message": "A sync pass is already running.",
            })),
        ),
        Err(SyncError::Internal(e)) => {
            error!(error = %e, "Offline sync failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(server_error_body()))
        }
    }
}

async fn offline_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let is_online = state.connectivity.is_online().await;
    let (pending, cache_available) = match state.offline.pending_count().await {
        Ok(count) => (count, true),
        Err(e) => {
            error!(error = %e, "Offline queue count failed");
            (0, false)
        }
    };
    Json(json!({
        "is_online": is_online,
        "pending_disposals": pending,
        "cache_available": cache_available,
    }))
}

fn server_error_body() -> Value {
    json!({
        "success": false,
        "reason_code": "SERVER_ERROR",
        "message": "Something went wrong. Please try again.",
    })
}

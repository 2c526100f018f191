//! Shared test doubles for the verification and sync integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tempfile::TempDir;
use tokio::sync::Mutex;

use trackeco_node::classify::{Classification, Classifier};
use trackeco_node::engine::{DisposalRequest, VerificationEngine};
use trackeco_node::offline::OfflineStore;
use trackeco_node::probe::Connectivity;
use trackeco_node::store::Store;

/// "fake" encoded with a data-URI prefix, as phones submit it.
pub const VIDEO_B64: &str = "data:video/mp4;base64,ZmFrZQ==";

pub struct Online(pub bool);

#[async_trait]
impl Connectivity for Online {
    async fn is_online(&self) -> bool {
        self.0
    }
}

/// Classifier that always returns the same classification.
pub struct Fixed(pub Classification);

#[async_trait]
impl Classifier for Fixed {
    async fn classify(&self, _video: &[u8]) -> anyhow::Result<Classification> {
        Ok(self.0.clone())
    }
}

/// Classifier whose transport always fails.
pub struct Unreachable;

#[async_trait]
impl Classifier for Unreachable {
    async fn classify(&self, _video: &[u8]) -> anyhow::Result<Classification> {
        anyhow::bail!("connection refused")
    }
}

/// Classifier that parks every call until the test releases it, so tests
/// can hold submissions mid-classification and force an interleaving.
pub struct Gated {
    entered: tokio::sync::Semaphore,
    release: tokio::sync::Semaphore,
    reply: Classification,
}

impl Gated {
    pub fn new(reply: Classification) -> Self {
        Self {
            entered: tokio::sync::Semaphore::new(0),
            release: tokio::sync::Semaphore::new(0),
            reply,
        }
    }

    /// Block until one call has entered `classify`.
    pub async fn wait_entered(&self) {
        self.entered.acquire().await.unwrap().forget();
    }

    /// Let one parked call proceed.
    pub fn release_one(&self) {
        self.release.add_permits(1);
    }
}

#[async_trait]
impl Classifier for Gated {
    async fn classify(&self, _video: &[u8]) -> anyhow::Result<Classification> {
        self.entered.add_permits(1);
        self.release.acquire().await.unwrap().forget();
        Ok(self.reply.clone())
    }
}

/// Classifier that replays a scripted sequence of results, one per call.
pub struct Scripted(std::sync::Mutex<VecDeque<anyhow::Result<Classification>>>);

impl Scripted {
    pub fn new(replies: Vec<anyhow::Result<Classification>>) -> Self {
        Self(std::sync::Mutex::new(replies.into()))
    }
}

#[async_trait]
impl Classifier for Scripted {
    async fn classify(&self, _video: &[u8]) -> anyhow::Result<Classification> {
        match self.0.lock().unwrap().pop_front() {
            Some(reply) => reply,
            None => anyhow::bail!("no scripted reply left"),
        }
    }
}

pub fn accepted(category: &str, sub_type: &str) -> Classification {
    Classification::Accepted {
        category: category.to_string(),
        sub_type: sub_type.to_string(),
    }
}

pub fn request(user_id: &str, latitude: f64, longitude: f64) -> DisposalRequest {
    DisposalRequest {
        user_id: Some(user_id.to_string()),
        latitude: Some(latitude),
        longitude: Some(longitude),
        video: Some(VIDEO_B64.to_string()),
    }
}

/// An engine over fresh temp-dir stores.
pub struct Harness {
    pub store: Arc<Mutex<Store>>,
    pub offline: Arc<OfflineStore>,
    pub engine: Arc<VerificationEngine>,
    dir: TempDir,
}

pub fn harness(online: bool, classifier: Arc<dyn Classifier>) -> Harness {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(Mutex::new(Store::open(dir.path()).unwrap()));
    let offline = Arc::new(OfflineStore::open(dir.path()).unwrap());
    let engine = Arc::new(VerificationEngine::new(
        store.clone(),
        offline.clone(),
        Arc::new(Online(online)),
        classifier,
    ));
    Harness {
        store,
        offline,
        engine,
        dir,
    }
}

impl Harness {
    pub fn data_dir(&self) -> &std::path::Path {
        self.dir.path()
    }

    /// Create the user and pin today's challenge assignment so the random
    /// pick cannot affect reward totals.
    pub async fn seed_user(&self, user_id: &str, challenge_id: &str) {
        let store = self.store.lock().await;
        store.get_or_create_user(user_id).unwrap();
        store
            .insert_progress(user_id, challenge_id, Utc::now().date_naive())
            .unwrap();
    }
}

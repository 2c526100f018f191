//! trackeco-node: offline-first backend runtime for the TrackEco litter tracker
//!
//! Users record waste-disposal actions verified by an external AI
//! video-classification service, earn points/XP, progress through daily
//! challenges, and discover cleanup hotspots. The core of this crate is the
//! offline-first verification path: submissions behave consistently whether
//! the classifier is reachable or not, unverifiable actions are queued in a
//! local durable store, and a sync pass reconciles them later without
//! double-awarding rewards.
//!
//! ## Components
//!
//! - **Probe**: bounded-timeout reachability check for the classifier
//! - **Offline store**: durable submission queue + read-through caches
//! - **Verification engine**: anti-cheat, payload decoding, routing, classification
//! - **Ledger**: atomic reward/streak/challenge commit per accepted disposal
//! - **Sync reconciler**: drains the offline queue, at most once per entry

pub mod api;
pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod offline;
pub mod probe;
pub mod store;
pub mod sync;

pub use classify::{Classification, Classifier};
pub use config::Config;
pub use engine::{DisposalOutcome, DisposalRequest, VerificationEngine};
pub use error::{RejectReason, VerifyError};
pub use offline::OfflineStore;
pub use probe::Connectivity;
pub use store::Store;
pub use sync::{SyncReconciler, SyncReport};

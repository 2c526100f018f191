//! Local offline store
//!
//! Durable queue of disposal submissions awaiting classification, plus
//! best-effort read-through caches of user-profile and hotspot responses.
//! The queue is the source of truth for the sync reconciler; cache
//! operations never surface errors to callers — any internal failure
//! degrades to "no cached value".

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// A submission persisted while the classifier was unreachable.
///
/// Consumed (deleted) by the sync reconciler after exactly one replay
/// attempt, whether that attempt succeeds or fails.
#[derive(Debug, Clone)]
pub struct QueuedDisposal {
    pub id: i64,
    pub user_id: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Raw video payload as submitted (base64, possibly data-URI prefixed)
    pub payload: String,
    pub queued_at: DateTime<Utc>,
}

/// SQLite-backed offline queue and response caches.
pub struct OfflineStore {
    conn: Mutex<Connection>,
}

impl OfflineStore {
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir).context("creating data directory")?;
        let db_path = data_dir.join("offline.db");
        let conn = Connection::open(&db_path)
            .with_context(|| format!("opening offline store at {}", db_path.display()))?;

        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS queued_disposals (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL,
                payload TEXT NOT NULL,
                queued_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS user_cache (
                user_id TEXT PRIMARY KEY,
                snapshot TEXT NOT NULL,
                cached_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS hotspot_cache (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                snapshot TEXT NOT NULL,
                cached_at TEXT NOT NULL
            );",
        )?;

        info!(path = %db_path.display(), "Offline store initialized");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Durably persist a submission for later replay.
    ///
    /// A failure here must be surfaced to the submitter (`OFFLINE_ERROR`)
    /// rather than silently dropping the disposal.
    pub async fn enqueue_disposal(
        &self,
        user_id: &str,
        latitude: f64,
        longitude: f64,
        payload: &str,
    ) -> Result<i64> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO queued_disposals (user_id, latitude, longitude, payload, queued_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![user_id, latitude, longitude, payload, Utc::now()],
        )
        .context("queueing disposal offline")?;
        Ok(conn.last_insert_rowid())
    }

    /// Snapshot of pending submissions, oldest first, preserving the
    /// original submission order for replay.
    pub async fn pending_disposals(&self) -> Result<Vec<QueuedDisposal>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare_cached(
            "SELECT id, user_id, latitude, longitude, payload, queued_at
             FROM queued_disposals ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(QueuedDisposal {
                id: row.get(0)?,
                user_id: row.get(1)?,
                latitude: row.get(2)?,
                longitude: row.get(3)?,
                payload: row.get(4)?,
                queued_at: row.get(5)?,
            })
        })?;
        let mut pending = Vec::new();
        for row in rows {
            pending.push(row?);
        }
        Ok(pending)
    }

    pub async fn pending_count(&self) -> Result<u64> {
        let conn = self.conn.lock().await;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM queued_disposals", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Consume a queue entry. Called by the reconciler after its single
    /// replay attempt, regardless of the attempt's outcome.
    pub async fn remove(&self, id: i64) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute("DELETE FROM queued_disposals WHERE id = ?1", [id])?;
        Ok(())
    }

    /// Cache a user-profile response for offline reads. Best effort.
    pub async fn cache_user_profile(&self, user_id: &str, snapshot: &serde_json::Value) {
        let conn = self.conn.lock().await;
        let result = conn.execute(
            "INSERT INTO user_cache (user_id, snapshot, cached_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(user_id) DO UPDATE SET snapshot = ?2, cached_at = ?3",
            params![user_id, snapshot.to_string(), Utc::now()],
        );
        if let Err(e) = result {
            warn!(user_id, error = %e, "Failed to cache user profile");
        }
    }

    /// Cached user-profile response, if one exists. Never errors.
    pub async fn cached_user_profile(&self, user_id: &str) -> Option<serde_json::Value> {
        let conn = self.conn.lock().await;
        let snapshot: Option<String> = conn
            .query_row(
                "SELECT snapshot FROM user_cache WHERE user_id = ?1",
                [user_id],
                |row| row.get(0),
            )
            .optional()
            .unwrap_or_else(|e| {
                warn!(user_id, error = %e, "Failed to read cached user profile");
                None
            });
        snapshot.and_then(|s| serde_json::from_str(&s).ok())
    }

    /// Cache the hotspot list for offline reads. Best effort.
    pub async fn cache_hotspots(&self, snapshot: &serde_json::Value) {
        let conn = self.conn.lock().await;
        let result = conn.execute(
            "INSERT INTO hotspot_cache (id, snapshot, cached_at) VALUES (1, ?1, ?2)
             ON CONFLICT(id) DO UPDATE SET snapshot = ?1, cached_at = ?2",
            params![snapshot.to_string(), Utc::now()],
        );
        if let Err(e) = result {
            warn!(error = %e, "Failed to cache hotspots");
        }
    }

    /// Cached hotspot list, if one exists. Never errors.
    pub async fn cached_hotspots(&self) -> Option<serde_json::Value> {
        let conn = self.conn.lock().await;
        let snapshot: Option<String> = conn
            .query_row("SELECT snapshot FROM hotspot_cache WHERE id = 1", [], |row| {
                row.get(0)
            })
            .optional()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to read cached hotspots");
                None
            });
        snapshot.and_then(|s| serde_json::from_str(&s).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn queue_preserves_submission_order() {
        let dir = TempDir::new().unwrap();
        let store = OfflineStore::open(dir.path()).unwrap();

        store.enqueue_disposal("u1", 1.0, 1.0, "aaa").await.unwrap();
        store.enqueue_disposal("u2", 2.0, 2.0, "bbb").await.unwrap();
        store.enqueue_disposal("u1", 3.0, 3.0, "ccc").await.unwrap();

        let pending = store.pending_disposals().await.unwrap();
        assert_eq!(pending.len(), 3);
        assert_eq!(pending[0].payload, "aaa");
        assert_eq!(pending[2].payload, "ccc");
        assert_eq!(store.pending_count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn remove_consumes_single_entry() {
        let dir = TempDir::new().unwrap();
        let store = OfflineStore::open(dir.path()).unwrap();

        let id = store.enqueue_disposal("u1", 1.0, 1.0, "aaa").await.unwrap();
        store.enqueue_disposal("u1", 2.0, 2.0, "bbb").await.unwrap();

        store.remove(id).await.unwrap();
        let pending = store.pending_disposals().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].payload, "bbb");
    }

    #[tokio::test]
    async fn user_cache_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = OfflineStore::open(dir.path()).unwrap();

        assert!(store.cached_user_profile("alice").await.is_none());

        let snapshot = json!({"user_id": "alice", "points": 42});
        store.cache_user_profile("alice", &snapshot).await;
        assert_eq!(store.cached_user_profile("alice").await, Some(snapshot));

        // Overwrite wins
        let updated = json!({"user_id": "alice", "points": 52});
        store.cache_user_profile("alice", &updated).await;
        assert_eq!(store.cached_user_profile("alice").await, Some(updated));
    }

    #[tokio::test]
    async fn hotspot_cache_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = OfflineStore::open(dir.path()).unwrap();

        assert!(store.cached_hotspots().await.is_none());
        let snapshot = json!([{"id": 1, "latitude": 1.5}]);
        store.cache_hotspots(&snapshot).await;
        assert_eq!(store.cached_hotspots().await, Some(snapshot));
    }
}

//! Primary relational store
//!
//! SQLite-backed access layer for users, disposals, daily logs, challenges
//! and hotspots. WAL mode for concurrent reads, cached statements, explicit
//! transactions for the reward commit (see `engine::ledger`). The static
//! challenge pool is seeded on first open.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;

pub mod models;

use models::{Challenge, ChallengeProgress, ChallengeType, Disposal, Hotspot, User};

/// Challenge templates seeded when the challenges table is empty.
fn seed_pool() -> Vec<Challenge> {
    let entries: [(ChallengeType, Option<&str>, i64, i64, &str); 7] = [
        (ChallengeType::Count, Some("Plastic"), 5, 50, "Dispose of 5 Plastic items today"),
        (ChallengeType::Count, Some("Metal"), 3, 50, "Dispose of 3 Metal items today"),
        (ChallengeType::Count, Some("Glass"), 2, 50, "Dispose of 2 Glass items today"),
        (ChallengeType::Variety, Some("Metal"), 3, 50, "Dispose of 3 different Metal sub-types today"),
        (ChallengeType::Variety, Some("Plastic"), 4, 50, "Dispose of 4 different Plastic sub-types today"),
        (ChallengeType::Hotspot, None, 1, 50, "Complete 1 disposal inside a Litter Hotspot"),
        (ChallengeType::Count, Some("Paper/Cardboard"), 3, 50, "Dispose of 3 Paper/Cardboard items today"),
    ];

    entries
        .iter()
        .enumerate()
        .map(|(i, (ty, category, goal, reward, description))| Challenge {
            challenge_id: format!("challenge_{}", i + 1),
            challenge_type: *ty,
            category: category.map(str::to_string),
            goal: *goal,
            reward: *reward,
            description: description.to_string(),
        })
        .collect()
}

/// SQLite-backed primary store.
pub struct Store {
    pub(crate) conn: Connection,
}

impl Store {
    /// Open or create the store under `data_dir`, applying the schema and
    /// seeding the challenge pool if it is empty.
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir).context("creating data directory")?;
        let db_path = data_dir.join("trackeco.db");
        let conn = Connection::open(&db_path)
            .with_context(|| format!("opening database at {}", db_path.display()))?;

        // Enable WAL mode for concurrent read access
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                user_id TEXT PRIMARY KEY,
                xp INTEGER NOT NULL DEFAULT 0,
                points INTEGER NOT NULL DEFAULT 0,
                streak INTEGER NOT NULL DEFAULT 0,
                last_disposal_date TEXT,
                has_completed_first_disposal INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS disposals (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL,
                waste_category TEXT NOT NULL,
                waste_sub_type TEXT NOT NULL,
                points_awarded INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_disposals_user ON disposals(user_id, id);
            CREATE TABLE IF NOT EXISTS daily_disposal_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                date TEXT NOT NULL,
                waste_sub_type TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_daily_log
                ON daily_disposal_log(user_id, date, waste_sub_type);
            CREATE TABLE IF NOT EXISTS challenges (
                challenge_id TEXT PRIMARY KEY,
                challenge_type TEXT NOT NULL,
                category TEXT,
                goal INTEGER NOT NULL,
                reward INTEGER NOT NULL,
                description TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS user_challenge_progress (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                challenge_id TEXT NOT NULL,
                current_progress INTEGER NOT NULL DEFAULT 0,
                is_completed INTEGER NOT NULL DEFAULT 0,
                assigned_date TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_progress_user_date
                ON user_challenge_progress(user_id, assigned_date);
            CREATE TABLE IF NOT EXISTS hotspots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL,
                intensity REAL NOT NULL,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL
            );",
        )?;

        let store = Self { conn };
        store.seed_challenges()?;

        info!(path = %db_path.display(), "Primary store initialized");
        Ok(store)
    }

    fn seed_challenges(&self) -> Result<()> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM challenges", [], |row| row.get(0))?;
        if count > 0 {
            return Ok(());
        }

        for ch in seed_pool() {
            self.conn.execute(
                "INSERT INTO challenges
                     (challenge_id, challenge_type, category, goal, reward, description)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    ch.challenge_id,
                    ch.challenge_type.as_str(),
                    ch.category,
                    ch.goal,
                    ch.reward,
                    ch.description
                ],
            )?;
        }
        info!("Initialized challenge pool");
        Ok(())
    }

    pub fn get_user(&self, user_id: &str) -> Result<Option<User>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT user_id, xp, points, streak, last_disposal_date,
                    has_completed_first_disposal, created_at
             FROM users WHERE user_id = ?1",
        )?;
        let user = stmt
            .query_row([user_id], |row| {
                Ok(User {
                    user_id: row.get(0)?,
                    xp: row.get(1)?,
                    points: row.get(2)?,
                    streak: row.get(3)?,
                    last_disposal_date: row.get(4)?,
                    has_completed_first_disposal: row.get(5)?,
                    created_at: row.get(6)?,
                })
            })
            .optional()?;
        Ok(user)
    }

    /// Fetch a user, creating a fresh row on first access.
    pub fn get_or_create_user(&self, user_id: &str) -> Result<User> {
        self.conn.execute(
            "INSERT OR IGNORE INTO users (user_id, created_at) VALUES (?1, ?2)",
            params![user_id, Utc::now()],
        )?;
        self.get_user(user_id)?
            .with_context(|| format!("user {user_id} missing after insert"))
    }

    /// The single most recent disposal for a user, if any.
    ///
    /// The anti-cheat check examines only this row, not the full history.
    pub fn latest_disposal(&self, user_id: &str) -> Result<Option<Disposal>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, user_id, timestamp, latitude, longitude,
                    waste_category, waste_sub_type, points_awarded
             FROM disposals WHERE user_id = ?1
             ORDER BY id DESC LIMIT 1",
        )?;
        let disposal = stmt
            .query_row([user_id], |row| {
                Ok(Disposal {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    timestamp: row.get(2)?,
                    latitude: row.get(3)?,
                    longitude: row.get(4)?,
                    waste_category: row.get(5)?,
                    waste_sub_type: row.get(6)?,
                    points_awarded: row.get(7)?,
                })
            })
            .optional()?;
        Ok(disposal)
    }

    /// Has the user ever logged a disposal of this category?
    pub fn has_disposed_category(&self, user_id: &str, category: &str) -> Result<bool> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT EXISTS(SELECT 1 FROM disposals
                           WHERE user_id = ?1 AND waste_category = ?2)",
        )?;
        let exists: bool = stmt.query_row(params![user_id, category], |row| row.get(0))?;
        Ok(exists)
    }

    /// Has this sub-type already been logged for the user on this date?
    pub fn daily_log_exists(
        &self,
        user_id: &str,
        date: NaiveDate,
        sub_type: &str,
    ) -> Result<bool> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT EXISTS(SELECT 1 FROM daily_disposal_log
                           WHERE user_id = ?1 AND date = ?2 AND waste_sub_type = ?3)",
        )?;
        let exists: bool = stmt.query_row(params![user_id, date, sub_type], |row| row.get(0))?;
        Ok(exists)
    }

    pub fn challenge_pool(&self) -> Result<Vec<Challenge>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT challenge_id, challenge_type, category, goal, reward, description
             FROM challenges ORDER BY challenge_id",
        )?;
        let rows = stmt.query_map([], map_challenge_row)?;
        let mut pool = Vec::new();
        for row in rows {
            pool.push(row?);
        }
        Ok(pool)
    }

    pub fn challenge(&self, challenge_id: &str) -> Result<Option<Challenge>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT challenge_id, challenge_type, category, goal, reward, description
             FROM challenges WHERE challenge_id = ?1",
        )?;
        let challenge = stmt.query_row([challenge_id], map_challenge_row).optional()?;
        Ok(challenge)
    }

    /// The user's challenge assignment for the given day, if one exists.
    pub fn progress_for(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<ChallengeProgress>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, user_id, challenge_id, current_progress, is_completed, assigned_date
             FROM user_challenge_progress
             WHERE user_id = ?1 AND assigned_date = ?2",
        )?;
        let progress = stmt
            .query_row(params![user_id, date], |row| {
                Ok(ChallengeProgress {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    challenge_id: row.get(2)?,
                    current_progress: row.get(3)?,
                    is_completed: row.get(4)?,
                    assigned_date: row.get(5)?,
                })
            })
            .optional()?;
        Ok(progress)
    }

    /// Persist a fresh assignment with zero progress.
    pub fn insert_progress(
        &self,
        user_id: &str,
        challenge_id: &str,
        date: NaiveDate,
    ) -> Result<ChallengeProgress> {
        self.conn.execute(
            "INSERT INTO user_challenge_progress (user_id, challenge_id, assigned_date)
             VALUES (?1, ?2, ?3)",
            params![user_id, challenge_id, date],
        )?;
        let id = self.conn.last_insert_rowid();
        Ok(ChallengeProgress {
            id,
            user_id: user_id.to_string(),
            challenge_id: challenge_id.to_string(),
            current_progress: 0,
            is_completed: false,
            assigned_date: date,
        })
    }

    /// Hotspots whose expiry is still in the future.
    pub fn active_hotspots(&self, now: DateTime<Utc>) -> Result<Vec<Hotspot>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT id, latitude, longitude, intensity, created_at, expires_at FROM hotspots",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Hotspot {
                id: row.get(0)?,
                latitude: row.get(1)?,
                longitude: row.get(2)?,
                intensity: row.get(3)?,
                created_at: row.get(4)?,
                expires_at: row.get(5)?,
            })
        })?;
        let mut active = Vec::new();
        for row in rows {
            let hotspot = row?;
            if hotspot.is_active(now) {
                active.push(hotspot);
            }
        }
        Ok(active)
    }

    /// Insert a hotspot row. Used by the out-of-scope generator and by tests;
    /// the verification core never calls this.
    pub fn insert_hotspot(
        &self,
        latitude: f64,
        longitude: f64,
        intensity: f64,
        expires_at: DateTime<Utc>,
    ) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO hotspots (latitude, longitude, intensity, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![latitude, longitude, intensity, Utc::now(), expires_at],
        )?;
        Ok(self.conn.last_insert_rowid())
    }
}

fn map_challenge_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Challenge> {
    let type_str: String = row.get(1)?;
    let challenge_type = ChallengeType::parse(&type_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            rusqlite::types::Type::Text,
            format!("unknown challenge type {type_str}").into(),
        )
    })?;
    Ok(Challenge {
        challenge_id: row.get(0)?,
        challenge_type,
        category: row.get(2)?,
        goal: row.get(3)?,
        reward: row.get(4)?,
        description: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    #[test]
    fn open_seeds_challenge_pool_once() {
        let dir = TempDir::new().unwrap();
        {
            let store = Store::open(dir.path()).unwrap();
            assert_eq!(store.challenge_pool().unwrap().len(), 7);
        }
        // Reopening must not duplicate the pool
        let store = Store::open(dir.path()).unwrap();
        let pool = store.challenge_pool().unwrap();
        assert_eq!(pool.len(), 7);
        assert!(pool.iter().any(|c| c.challenge_type == ChallengeType::Hotspot));
    }

    #[test]
    fn get_or_create_user_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path()).unwrap();

        let user = store.get_or_create_user("alice").unwrap();
        assert_eq!(user.points, 0);
        assert_eq!(user.streak, 0);
        assert!(!user.has_completed_first_disposal);
        assert!(user.last_disposal_date.is_none());

        let again = store.get_or_create_user("alice").unwrap();
        assert_eq!(again.created_at, user.created_at);
    }

    #[test]
    fn latest_disposal_returns_most_recent_only() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path()).unwrap();
        store.get_or_create_user("bob").unwrap();

        for sub in ["Bottle", "Can"] {
            store
                .conn
                .execute(
                    "INSERT INTO disposals
                         (user_id, timestamp, latitude, longitude,
                          waste_category, waste_sub_type, points_awarded)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params!["bob", Utc::now(), 1.0, 2.0, "Metal", sub, 10],
                )
                .unwrap();
        }

        let latest = store.latest_disposal("bob").unwrap().unwrap();
        assert_eq!(latest.waste_sub_type, "Can");
        assert!(store.latest_disposal("nobody").unwrap().is_none());
    }

    #[test]
    fn active_hotspots_filters_expired() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let now = Utc::now();

        store
            .insert_hotspot(1.0, 2.0, 0.8, now + Duration::hours(2))
            .unwrap();
        store
            .insert_hotspot(3.0, 4.0, 0.5, now - Duration::hours(1))
            .unwrap();

        let active = store.active_hotspots(now).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].latitude, 1.0);
    }

    #[test]
    fn daily_log_existence_is_per_date_and_sub_type() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let today = Utc::now().date_naive();

        store
            .conn
            .execute(
                "INSERT INTO daily_disposal_log (user_id, date, waste_sub_type)
                 VALUES (?1, ?2, ?3)",
                params!["carol", today, "Aluminum Can"],
            )
            .unwrap();

        assert!(store.daily_log_exists("carol", today, "Aluminum Can").unwrap());
        assert!(!store.daily_log_exists("carol", today, "Tin Can").unwrap());
        assert!(!store
            .daily_log_exists("carol", today - Duration::days(1), "Aluminum Can")
            .unwrap());
    }
}

//! Reward & progress ledger
//!
//! Sole writer of user reward state and challenge progress. A disposal's
//! reward is computed in a read-only planning phase, then applied in a
//! single SQLite transaction (user totals, challenge progress, disposal row,
//! daily log row). The two phases are distinct results on purpose: the
//! classification outcome, not the bookkeeping, is the authoritative "did
//! this count" signal, and the caller decides what a commit failure means.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use rand::Rng;
use rusqlite::params;

use super::challenge;
use crate::store::models::{ChallengeType, User};
use crate::store::Store;

/// Base reward per accepted disposal.
pub const BASE_POINTS: i64 = 10;
pub const BASE_XP: i64 = 15;

/// One-time override for a user's first-ever accepted disposal.
pub const FIRST_DISPOSAL_POINTS: i64 = 200;
pub const FIRST_DISPOSAL_XP: i64 = 50;

/// XP bonus for the first-ever disposal of a waste category.
pub const DISCOVERY_XP: i64 = 10;

/// Streak for a disposal on `today`, given the previous disposal date.
///
/// Yesterday increments, today leaves unchanged, anything else (including
/// no history) resets to 1.
pub fn next_streak(last: Option<NaiveDate>, today: NaiveDate, current: i64) -> i64 {
    match last {
        Some(date) if date == today => current,
        Some(date) if today.signed_duration_since(date).num_days() == 1 => current + 1,
        _ => 1,
    }
}

/// Pending write to the day's challenge assignment.
#[derive(Debug, Clone)]
pub struct ChallengeUpdate {
    pub progress_id: i64,
    pub new_progress: i64,
    pub completed: bool,
}

/// Everything an accepted disposal changes, computed before any write.
#[derive(Debug, Clone)]
pub struct RewardPlan {
    pub user_id: String,
    pub category: String,
    pub sub_type: String,
    pub points: i64,
    pub xp: i64,
    pub bonuses: Vec<String>,
    pub challenges_completed: Vec<String>,
    pub first_disposal: bool,
    pub new_streak: i64,
    pub challenge: Option<ChallengeUpdate>,
}

/// Compute the reward for an accepted disposal. Read-only except for the
/// lazy creation of today's challenge assignment.
#[allow(clippy::too_many_arguments)]
pub fn plan(
    store: &Store,
    user: &User,
    category: &str,
    sub_type: &str,
    latitude: f64,
    longitude: f64,
    now: DateTime<Utc>,
    rng: &mut impl Rng,
) -> Result<RewardPlan> {
    let today = now.date_naive();
    let mut bonuses = Vec::new();
    let mut challenges_completed = Vec::new();

    let first_disposal = !user.has_completed_first_disposal;
    let (mut points, mut xp) = if first_disposal {
        bonuses.push("First Disposal Bonus: +190 points!".to_string());
        (FIRST_DISPOSAL_POINTS, FIRST_DISPOSAL_XP)
    } else {
        (BASE_POINTS, BASE_XP)
    };

    if !store.has_disposed_category(&user.user_id, category)? {
        xp += DISCOVERY_XP;
        bonuses.push(format!("Discovery Bonus: +10 XP for first {category}!"));
    }

    let (assigned, progress) =
        challenge::assignment_for_today(store, &user.user_id, today, rng)?;
    let mut challenge_update = None;
    if !progress.is_completed {
        let sub_type_new_today = !store.daily_log_exists(&user.user_id, today, sub_type)?;
        let in_hotspot = assigned.challenge_type == ChallengeType::Hotspot
            && challenge::in_any_hotspot(&store.active_hotspots(now)?, latitude, longitude);
        let delta = challenge::evaluate(
            &assigned,
            progress.current_progress,
            category,
            sub_type_new_today,
            in_hotspot,
        );
        if delta.increment {
            if delta.completed_now {
                points += assigned.reward;
                challenges_completed
                    .push(format!("Daily Challenge Complete! +{} points", assigned.reward));
            }
            challenge_update = Some(ChallengeUpdate {
                progress_id: progress.id,
                new_progress: progress.current_progress + 1,
                completed: delta.completed_now,
            });
        }
    }

    Ok(RewardPlan {
        user_id: user.user_id.clone(),
        category: category.to_string(),
        sub_type: sub_type.to_string(),
        points,
        xp,
        bonuses,
        challenges_completed,
        first_disposal,
        new_streak: next_streak(user.last_disposal_date, today, user.streak),
        challenge: challenge_update,
    })
}

/// Apply a reward plan as one transaction: user totals and streak, challenge
/// progress, the immutable disposal row, and the daily sub-type log.
pub fn commit(
    store: &mut Store,
    plan: &RewardPlan,
    latitude: f64,
    longitude: f64,
    now: DateTime<Utc>,
) -> Result<()> {
    let today = now.date_naive();
    let tx = store.conn.transaction()?;

    tx.execute(
        "UPDATE users SET
             points = points + ?1,
             xp = xp + ?2,
             streak = ?3,
             last_disposal_date = ?4,
             has_completed_first_disposal = has_completed_first_disposal OR ?5
         WHERE user_id = ?6",
        params![
            plan.points,
            plan.xp,
            plan.new_streak,
            today,
            plan.first_disposal,
            plan.user_id
        ],
    )?;

    if let Some(update) = &plan.challenge {
        tx.execute(
            "UPDATE user_challenge_progress
             SET current_progress = ?1, is_completed = ?2
             WHERE id = ?3",
            params![update.new_progress, update.completed, update.progress_id],
        )?;
    }

    tx.execute(
        "INSERT INTO disposals
             (user_id, timestamp, latitude, longitude,
              waste_category, waste_sub_type, points_awarded)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            plan.user_id,
            now,
            latitude,
            longitude,
            plan.category,
            plan.sub_type,
            plan.points
        ],
    )?;

    tx.execute(
        "INSERT INTO daily_disposal_log (user_id, date, waste_sub_type)
         VALUES (?1, ?2, ?3)",
        params![plan.user_id, today, plan.sub_type],
    )?;

    tx.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::TempDir;

    fn setup(user_id: &str) -> (TempDir, Store) {
        let dir = TempDir::new().unwrap();
        let store = Store::open(dir.path()).unwrap();
        store.get_or_create_user(user_id).unwrap();
        (dir, store)
    }

    /// Pin the day's assignment so the random pick can't interfere.
    fn assign(store: &Store, user_id: &str, challenge_id: &str, now: DateTime<Utc>) {
        store
            .insert_progress(user_id, challenge_id, now.date_naive())
            .unwrap();
    }

    fn accept(
        store: &mut Store,
        user_id: &str,
        category: &str,
        sub_type: &str,
        lat: f64,
        lon: f64,
        now: DateTime<Utc>,
    ) -> RewardPlan {
        let user = store.get_user(user_id).unwrap().unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let plan = plan(store, &user, category, sub_type, lat, lon, now, &mut rng).unwrap();
        commit(store, &plan, lat, lon, now).unwrap();
        plan
    }

    #[test]
    fn streak_rules() {
        let today = NaiveDate::from_ymd_opt(2025, 6, 10).unwrap();
        let yesterday = today - Duration::days(1);
        assert_eq!(next_streak(None, today, 0), 1);
        assert_eq!(next_streak(Some(yesterday), today, 4), 5);
        assert_eq!(next_streak(Some(today), today, 4), 4);
        assert_eq!(next_streak(Some(today - Duration::days(2)), today, 4), 1);
    }

    #[test]
    fn first_disposal_pays_once() {
        let (_dir, mut store) = setup("u");
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        // COUNT Plastic goal 5 won't complete in this test
        assign(&store, "u", "challenge_1", now);

        let first = accept(&mut store, "u", "Metal", "Can", 1.0, 1.0, now);
        assert_eq!(first.points, 200);
        // 50 first-disposal XP + 10 discovery XP for Metal
        assert_eq!(first.xp, 60);
        assert_eq!(first.bonuses.len(), 2);

        let user = store.get_user("u").unwrap().unwrap();
        assert_eq!(user.points, 200);
        assert_eq!(user.xp, 60);
        assert!(user.has_completed_first_disposal);

        // Same category again: base reward only, flag never pays twice
        let second = accept(&mut store, "u", "Metal", "Can", 2.0, 2.0, now);
        assert_eq!(second.points, 10);
        assert_eq!(second.xp, 15);
        assert!(second.bonuses.is_empty());
    }

    #[test]
    fn discovery_bonus_once_per_category() {
        let (_dir, mut store) = setup("u");
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        assign(&store, "u", "challenge_1", now);

        accept(&mut store, "u", "Metal", "Can", 1.0, 1.0, now);
        let glass = accept(&mut store, "u", "Glass", "Bottle", 2.0, 2.0, now);
        assert_eq!(glass.xp, BASE_XP + DISCOVERY_XP);
        assert!(glass.bonuses.iter().any(|b| b.contains("Glass")));

        let glass_again = accept(&mut store, "u", "Glass", "Jar", 3.0, 3.0, now);
        assert_eq!(glass_again.xp, BASE_XP);
    }

    #[test]
    fn count_challenge_pays_reward_exactly_once() {
        let (_dir, mut store) = setup("u");
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        // COUNT Plastic, goal 5, reward 50
        assign(&store, "u", "challenge_1", now);

        for i in 1..=4 {
            let plan = accept(
                &mut store,
                "u",
                "Plastic",
                &format!("Sub{i}"),
                i as f64,
                i as f64,
                now,
            );
            assert!(plan.challenges_completed.is_empty());
        }
        let progress = store.progress_for("u", now.date_naive()).unwrap().unwrap();
        assert_eq!(progress.current_progress, 4);
        assert!(!progress.is_completed);

        let fifth = accept(&mut store, "u", "Plastic", "Sub5", 5.0, 5.0, now);
        assert_eq!(fifth.points, BASE_POINTS + 50);
        assert_eq!(fifth.challenges_completed.len(), 1);
        let progress = store.progress_for("u", now.date_naive()).unwrap().unwrap();
        assert!(progress.is_completed);
        assert_eq!(progress.current_progress, 5);

        // Terminal: a sixth match pays nothing and moves nothing
        let sixth = accept(&mut store, "u", "Plastic", "Sub6", 6.0, 6.0, now);
        assert_eq!(sixth.points, BASE_POINTS);
        assert!(sixth.challenges_completed.is_empty());
        let progress = store.progress_for("u", now.date_naive()).unwrap().unwrap();
        assert_eq!(progress.current_progress, 5);
    }

    #[test]
    fn variety_counts_distinct_sub_types_only() {
        let (_dir, mut store) = setup("u");
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        // VARIETY Metal, goal 3
        assign(&store, "u", "challenge_4", now);

        accept(&mut store, "u", "Metal", "Aluminum Can", 1.0, 1.0, now);
        // Same sub-type again the same day: no progress
        accept(&mut store, "u", "Metal", "Aluminum Can", 2.0, 2.0, now);
        let progress = store.progress_for("u", now.date_naive()).unwrap().unwrap();
        assert_eq!(progress.current_progress, 1);

        accept(&mut store, "u", "Metal", "Tin Can", 3.0, 3.0, now);
        let progress = store.progress_for("u", now.date_naive()).unwrap().unwrap();
        assert_eq!(progress.current_progress, 2);
    }

    #[test]
    fn hotspot_challenge_completes_inside_tolerance_box() {
        let (_dir, mut store) = setup("u");
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        // HOTSPOT goal 1
        assign(&store, "u", "challenge_6", now);
        store
            .insert_hotspot(10.0, 20.0, 0.9, now + Duration::hours(6))
            .unwrap();

        // Outside the box: no progress
        accept(&mut store, "u", "Plastic", "Bottle", 11.0, 20.0, now);
        let progress = store.progress_for("u", now.date_naive()).unwrap().unwrap();
        assert_eq!(progress.current_progress, 0);

        let inside = accept(&mut store, "u", "Plastic", "Bag", 10.0004, 20.0004, now);
        assert_eq!(inside.points, BASE_POINTS + 50);
        let progress = store.progress_for("u", now.date_naive()).unwrap().unwrap();
        assert!(progress.is_completed);
    }

    #[test]
    fn expired_hotspot_does_not_count() {
        let (_dir, mut store) = setup("u");
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        assign(&store, "u", "challenge_6", now);
        store
            .insert_hotspot(10.0, 20.0, 0.9, now - Duration::hours(1))
            .unwrap();

        accept(&mut store, "u", "Plastic", "Bag", 10.0, 20.0, now);
        let progress = store.progress_for("u", now.date_naive()).unwrap().unwrap();
        assert_eq!(progress.current_progress, 0);
    }

    #[test]
    fn streak_increments_daily_and_resets_after_gap() {
        let (_dir, mut store) = setup("u");
        let day1 = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();

        for offset in 0..3 {
            let now = day1 + Duration::days(offset);
            assign(&store, "u", "challenge_1", now);
            accept(&mut store, "u", "Metal", "Can", offset as f64, 0.0, now);
        }
        let user = store.get_user("u").unwrap().unwrap();
        assert_eq!(user.streak, 3);

        // Second disposal the same day leaves the streak unchanged
        let day3 = day1 + Duration::days(2);
        accept(&mut store, "u", "Metal", "Can", 9.0, 9.0, day3);
        assert_eq!(store.get_user("u").unwrap().unwrap().streak, 3);

        // A skipped day resets to 1
        let day5 = day1 + Duration::days(4);
        assign(&store, "u", "challenge_1", day5);
        accept(&mut store, "u", "Metal", "Can", 10.0, 10.0, day5);
        assert_eq!(store.get_user("u").unwrap().unwrap().streak, 1);
    }
}

//! Daily challenge assignment and evaluation
//!
//! Each user gets one challenge per day, picked uniformly at random from the
//! static pool on first access. Evaluation is a pure function of the
//! assignment state and the qualifying facts about the disposal; the ledger
//! persists the resulting delta inside its commit transaction.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::store::models::{Challenge, ChallengeProgress, ChallengeType, Hotspot};
use crate::store::Store;

/// Tolerance box around a hotspot center, in degrees (~100m).
pub const HOTSPOT_TOLERANCE_DEG: f64 = 0.001;

/// Uniform-random pick over the static pool. Pure function of (pool, rng).
pub fn pick_challenge<'a>(pool: &'a [Challenge], rng: &mut impl Rng) -> Option<&'a Challenge> {
    pool.choose(rng)
}

/// The user's assignment for `today`, lazily created on first access.
pub fn assignment_for_today(
    store: &Store,
    user_id: &str,
    today: NaiveDate,
    rng: &mut impl Rng,
) -> Result<(Challenge, ChallengeProgress)> {
    if let Some(progress) = store.progress_for(user_id, today)? {
        let challenge = store
            .challenge(&progress.challenge_id)?
            .with_context(|| format!("assigned challenge {} missing", progress.challenge_id))?;
        return Ok((challenge, progress));
    }

    let pool = store.challenge_pool()?;
    let picked = pick_challenge(&pool, rng)
        .context("challenge pool is empty")?
        .clone();
    let progress = store.insert_progress(user_id, &picked.challenge_id, today)?;
    Ok((picked, progress))
}

/// What a qualifying disposal does to the active assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delta {
    pub increment: bool,
    /// True when this disposal pushes progress to the goal; the challenge
    /// reward is paid exactly once, on this transition.
    pub completed_now: bool,
}

/// Evaluate one disposal against a not-yet-completed assignment.
///
/// COUNT counts category matches; VARIETY counts distinct sub-types per day
/// (the caller supplies the dedupe fact); HOTSPOT counts disposals inside an
/// active hotspot's tolerance box.
pub fn evaluate(
    challenge: &Challenge,
    current_progress: i64,
    category: &str,
    sub_type_new_today: bool,
    in_hotspot: bool,
) -> Delta {
    let qualifies = match challenge.challenge_type {
        ChallengeType::Count => challenge.category.as_deref() == Some(category),
        ChallengeType::Variety => {
            challenge.category.as_deref() == Some(category) && sub_type_new_today
        }
        ChallengeType::Hotspot => in_hotspot,
    };
    Delta {
        increment: qualifies,
        completed_now: qualifies && current_progress + 1 >= challenge.goal,
    }
}

/// Whether a location falls inside any active hotspot's tolerance box.
/// Stops at the first match.
pub fn in_any_hotspot(hotspots: &[Hotspot], latitude: f64, longitude: f64) -> bool {
    hotspots.iter().any(|h| {
        (latitude - h.latitude).abs() < HOTSPOT_TOLERANCE_DEG
            && (longitude - h.longitude).abs() < HOTSPOT_TOLERANCE_DEG
    })
}

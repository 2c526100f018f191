//! Row types for the primary store

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// The fixed set of waste categories the classifier can produce.
pub const WASTE_CATEGORIES: [&str; 7] = [
    "Plastic",
    "Paper/Cardboard",
    "Glass",
    "Metal",
    "Organic",
    "E-Waste",
    "General Waste",
];

/// A tracked user. Reward mutations go through the ledger only.
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: String,
    pub xp: i64,
    pub points: i64,
    /// Consecutive days with at least one accepted disposal
    pub streak: i64,
    pub last_disposal_date: Option<NaiveDate>,
    pub has_completed_first_disposal: bool,
    pub created_at: DateTime<Utc>,
}

/// An accepted disposal. Append-only, never updated after creation.
#[derive(Debug, Clone)]
pub struct Disposal {
    pub id: i64,
    pub user_id: String,
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub waste_category: String,
    pub waste_sub_type: String,
    pub points_awarded: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeType {
    Count,
    Variety,
    Hotspot,
}

impl ChallengeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Count => "COUNT",
            Self::Variety => "VARIETY",
            Self::Hotspot => "HOTSPOT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "COUNT" => Some(Self::Count),
            "VARIETY" => Some(Self::Variety),
            "HOTSPOT" => Some(Self::Hotspot),
            _ => None,
        }
    }
}

/// Static challenge template, seeded once at store open.
#[derive(Debug, Clone)]
pub struct Challenge {
    pub challenge_id: String,
    pub challenge_type: ChallengeType,
    /// Target category for COUNT/VARIETY; None for HOTSPOT
    pub category: Option<String>,
    pub goal: i64,
    /// Point bonus paid on completion
    pub reward: i64,
    pub description: String,
}

/// Per-user, per-day assignment of one challenge.
///
/// Terminal once `is_completed` — no further progress or reward that day.
#[derive(Debug, Clone)]
pub struct ChallengeProgress {
    pub id: i64,
    pub user_id: String,
    pub challenge_id: String,
    pub current_progress: i64,
    pub is_completed: bool,
    pub assigned_date: NaiveDate,
}

/// A litter hotspot. Written by the out-of-scope generator; read-only here.
#[derive(Debug, Clone, Serialize)]
pub struct Hotspot {
    pub id: i64,
    pub latitude: f64,
    pub longitude: f64,
    /// 0.0 to 1.0
    pub intensity: f64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Hotspot {
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

//! Eco rank tiers derived from cumulative XP

/// Named tier for a cumulative XP total. Thresholds are inclusive lower
/// boundaries: 100 XP is already "Eco Cadet", 1500 XP "Eco Legend".
pub fn eco_rank(xp: i64) -> &'static str {
    if xp < 100 {
        "Eco Novice"
    } else if xp < 300 {
        "Eco Cadet"
    } else if xp < 600 {
        "Eco Guardian"
    } else if xp < 1000 {
        "Eco Champion"
    } else if xp < 1500 {
        "Eco Master"
    } else {
        "Eco Legend"
    }
}

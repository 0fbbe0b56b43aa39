//! crates/ghost_gym_core/src/ranking.rs
//!
//! Multi-factor ordering of exercise search results.
//!
//! score = match quality + tier boost + favorite boost + popularity boost
//!
//! Match quality is 100 for an exact (case-insensitive) name match, 90 for a
//! prefix, 80 for a substring and 70 for anything the token index matched.
//! Tier adds 50 / 25 / 0, a favorite adds 25 and popularity adds
//! `min(25, popularityScore / 4)`.

use crate::domain::{Exercise, ExerciseTier};
use std::collections::HashSet;

pub const EXACT_MATCH: f64 = 100.0;
pub const PREFIX_MATCH: f64 = 90.0;
pub const SUBSTRING_MATCH: f64 = 80.0;
pub const TOKEN_MATCH: f64 = 70.0;
pub const FAVORITE_BOOST: f64 = 25.0;
pub const MAX_POPULARITY_BOOST: f64 = 25.0;

pub fn match_score(name: &str, query: &str) -> f64 {
    let name = name.to_lowercase();
    let query = query.trim().to_lowercase();
    if name == query {
        EXACT_MATCH
    } else if name.starts_with(&query) {
        PREFIX_MATCH
    } else if name.contains(&query) {
        SUBSTRING_MATCH
    } else {
        TOKEN_MATCH
    }
}

pub fn tier_boost(tier: ExerciseTier) -> f64 {
    match tier {
        ExerciseTier::Foundation => 50.0,
        ExerciseTier::Standard => 25.0,
        ExerciseTier::Specialized => 0.0,
    }
}

pub fn popularity_boost(popularity: Option<f64>) -> f64 {
    (popularity.unwrap_or(0.0).max(0.0) / 4.0).min(MAX_POPULARITY_BOOST)
}

pub fn score(exercise: &Exercise, query: &str, favorites: &HashSet<String>) -> f64 {
    let favorite = if favorites.contains(&exercise.id) {
        FAVORITE_BOOST
    } else {
        0.0
    };
    match_score(&exercise.name, query)
        + tier_boost(exercise.exercise_tier)
        + favorite
        + popularity_boost(exercise.popularity_score)
}

/// Sorts candidates by descending score. Equal scores keep their input order.
pub fn rank(candidates: Vec<Exercise>, query: &str, favorites: &HashSet<String>) -> Vec<Exercise> {
    let mut scored: Vec<(f64, Exercise)> = candidates
        .into_iter()
        .map(|e| (score(&e, query, favorites), e))
        .collect();
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.into_iter().map(|(_, e)| e).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exercise(id: &str, name: &str, tier: ExerciseTier, popularity: f64) -> Exercise {
        Exercise::global(id, name, tier).with_popularity(popularity)
    }

    fn ids(ranked: &[Exercise]) -> Vec<&str> {
        ranked.iter().map(|e| e.id.as_str()).collect()
    }

    #[test]
    fn exact_match_beats_token_match_within_a_tier() {
        let candidates = vec![
            exercise("token", "Barbell Bench Press", ExerciseTier::Standard, 50.0),
            exercise("exact", "Bench Press", ExerciseTier::Standard, 50.0),
        ];
        let ranked = rank(candidates, "bench press", &HashSet::new());
        assert_eq!(ids(&ranked), vec!["exact", "token"]);
    }

    #[test]
    fn popularity_orders_otherwise_equal_exercises() {
        let candidates = vec![
            exercise("low", "Cable Fly", ExerciseTier::Standard, 10.0),
            exercise("high", "Pec Deck", ExerciseTier::Standard, 90.0),
        ];
        let ranked = rank(candidates, "chest", &HashSet::new());
        assert_eq!(ids(&ranked), vec!["high", "low"]);
    }

    #[test]
    fn ranking_is_deterministic_and_stable() {
        let candidates = vec![
            exercise("a", "Lunge", ExerciseTier::Standard, 40.0),
            exercise("b", "Step Up", ExerciseTier::Standard, 40.0),
            exercise("c", "Split Squat", ExerciseTier::Foundation, 0.0),
        ];
        let first = rank(candidates.clone(), "legs", &HashSet::new());
        let second = rank(candidates, "legs", &HashSet::new());
        assert_eq!(first, second);
        assert_eq!(ids(&first), vec!["c", "a", "b"]);
    }

    #[test]
    fn exact_specialized_match_can_outrank_foundation_token_match() {
        // 100 + 0 + 25 against 70 + 50 + 0.
        let candidates = vec![
            exercise("foundation", "Back Squat", ExerciseTier::Foundation, 0.0),
            exercise("specialized", "Zercher Squat", ExerciseTier::Specialized, 100.0),
        ];
        let ranked = rank(candidates, "zercher squat", &HashSet::new());
        assert_eq!(ids(&ranked), vec!["specialized", "foundation"]);
    }

    #[test]
    fn foundation_token_match_wins_with_enough_popularity() {
        // 70 + 50 + 10 against 100 + 0 + 0.
        let candidates = vec![
            exercise("specialized", "Zercher Squat", ExerciseTier::Specialized, 0.0),
            exercise("foundation", "Back Squat", ExerciseTier::Foundation, 40.0),
        ];
        let ranked = rank(candidates, "zercher squat", &HashSet::new());
        assert_eq!(ids(&ranked), vec!["foundation", "specialized"]);
    }

    #[test]
    fn favorites_are_boosted() {
        let candidates = vec![
            exercise("plain", "Hammer Curl", ExerciseTier::Standard, 60.0),
            exercise("fav", "Preacher Curl", ExerciseTier::Standard, 0.0),
        ];
        let favorites: HashSet<String> = ["fav".to_string()].into_iter().collect();
        let ranked = rank(candidates, "biceps", &favorites);
        assert_eq!(ids(&ranked), vec!["fav", "plain"]);
    }

    #[test]
    fn popularity_boost_is_capped() {
        assert_eq!(popularity_boost(Some(400.0)), MAX_POPULARITY_BOOST);
        assert_eq!(popularity_boost(None), 0.0);
        assert_eq!(popularity_boost(Some(40.0)), 10.0);
    }
}

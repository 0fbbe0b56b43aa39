//! The exercise catalog and per-user favorites.

use super::new_id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

const STOP_WORDS: &[&str] = &["the", "a", "an", "and", "or", "with", "to", "for"];

/// Lowercased name tokens used by the catalog's array-contains lookup.
/// Splits on whitespace, `-` and `/`, and drops stop words and single characters.
pub fn search_tokens(name: &str) -> Vec<String> {
    name.to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '-' || c == '/')
        .filter(|t| t.chars().count() > 1 && !STOP_WORDS.contains(t))
        .map(str::to_string)
        .collect()
}

/// Editorial classification. Serialized as 1, 2 or 3.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum ExerciseTier {
    Foundation,
    #[default]
    Standard,
    Specialized,
}

impl TryFrom<u8> for ExerciseTier {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Foundation),
            2 => Ok(Self::Standard),
            3 => Ok(Self::Specialized),
            other => Err(format!("exercise tier must be 1, 2 or 3, got {}", other)),
        }
    }
}

impl From<ExerciseTier> for u8 {
    fn from(tier: ExerciseTier) -> Self {
        match tier {
            ExerciseTier::Foundation => 1,
            ExerciseTier::Standard => 2,
            ExerciseTier::Specialized => 3,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub name_search_tokens: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_muscle_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_equipment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mechanics: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_region: Option<String>,
    #[serde(
        default,
        rename = "movementPattern1",
        skip_serializing_if = "Option::is_none"
    )]
    pub movement_pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty_level: Option<String>,
    /// 0-100.
    #[serde(default)]
    pub popularity_score: Option<f64>,
    #[serde(default)]
    pub favorite_count: i64,
    #[serde(default)]
    pub exercise_tier: ExerciseTier,
    #[serde(default)]
    pub is_foundational: bool,
    #[serde(default)]
    pub classification_tags: Vec<String>,
    #[serde(default = "default_true")]
    pub is_global: bool,
}

impl Exercise {
    /// A global catalog entry with derived tokens and tier flag.
    pub fn global(id: impl Into<String>, name: impl Into<String>, tier: ExerciseTier) -> Self {
        let name = name.into();
        Self {
            id: id.into(),
            name_search_tokens: search_tokens(&name),
            name,
            target_muscle_group: None,
            primary_equipment: None,
            mechanics: None,
            body_region: None,
            movement_pattern: None,
            difficulty_level: None,
            popularity_score: None,
            favorite_count: 0,
            exercise_tier: tier,
            is_foundational: tier == ExerciseTier::Foundation,
            classification_tags: Vec::new(),
            is_global: true,
        }
    }

    pub fn with_popularity(mut self, score: f64) -> Self {
        self.popularity_score = Some(score);
        self
    }

    /// Builds a user-owned exercise from a creation request.
    pub fn custom(new: NewExercise) -> Self {
        let mut exercise = Self::global(new_id("exercise"), new.name.trim(), ExerciseTier::Standard);
        exercise.target_muscle_group = new.target_muscle_group;
        exercise.primary_equipment = new.primary_equipment;
        exercise.mechanics = new.mechanics;
        exercise.body_region = new.body_region;
        exercise.movement_pattern = new.movement_pattern;
        exercise.difficulty_level = new.difficulty_level;
        exercise.is_global = false;
        exercise
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewExercise {
    pub name: String,
    #[serde(default)]
    pub target_muscle_group: Option<String>,
    #[serde(default)]
    pub primary_equipment: Option<String>,
    #[serde(default)]
    pub mechanics: Option<String>,
    #[serde(default)]
    pub body_region: Option<String>,
    #[serde(default, rename = "movementPattern1")]
    pub movement_pattern: Option<String>,
    #[serde(default)]
    pub difficulty_level: Option<String>,
}

/// Display snapshot of a favorited exercise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FavoriteExercise {
    pub exercise_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_muscle_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_equipment: Option<String>,
    #[serde(default = "default_true")]
    pub is_global: bool,
    pub favorited_at: DateTime<Utc>,
}

impl FavoriteExercise {
    pub fn snapshot(exercise: &Exercise, favorited_at: DateTime<Utc>) -> Self {
        Self {
            exercise_id: exercise.id.clone(),
            name: exercise.name.clone(),
            target_muscle_group: exercise.target_muscle_group.clone(),
            primary_equipment: exercise.primary_equipment.clone(),
            is_global: exercise.is_global,
            favorited_at,
        }
    }
}

/// One user's favorites. `exercise_ids` and the keys of `exercises` always
/// hold the same set, and `count` is their size; the fields are private so
/// only `insert` and `remove` can change them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserFavorites {
    exercise_ids: BTreeSet<String>,
    exercises: BTreeMap<String, FavoriteExercise>,
    count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_updated: Option<DateTime<Utc>>,
}

impl UserFavorites {
    /// Rebuilds a consistent value from snapshot entries keyed by exercise id.
    pub fn from_entries(
        entries: impl IntoIterator<Item = (String, FavoriteExercise)>,
        last_updated: Option<DateTime<Utc>>,
    ) -> Self {
        let exercises: BTreeMap<_, _> = entries.into_iter().collect();
        Self {
            exercise_ids: exercises.keys().cloned().collect(),
            count: exercises.len(),
            exercises,
            last_updated,
        }
    }

    /// Returns false when the exercise was already a favorite.
    pub fn insert(&mut self, favorite: FavoriteExercise) -> bool {
        if self.exercise_ids.contains(&favorite.exercise_id) {
            return false;
        }
        self.last_updated = Some(favorite.favorited_at);
        self.exercise_ids.insert(favorite.exercise_id.clone());
        self.exercises.insert(favorite.exercise_id.clone(), favorite);
        self.count = self.exercises.len();
        true
    }

    pub fn remove(&mut self, exercise_id: &str, now: DateTime<Utc>) -> bool {
        if !self.exercise_ids.remove(exercise_id) {
            return false;
        }
        self.exercises.remove(exercise_id);
        self.count = self.exercises.len();
        self.last_updated = Some(now);
        true
    }

    pub fn contains(&self, exercise_id: &str) -> bool {
        self.exercise_ids.contains(exercise_id)
    }

    pub fn exercise_ids(&self) -> &BTreeSet<String> {
        &self.exercise_ids
    }

    pub fn exercises(&self) -> &BTreeMap<String, FavoriteExercise> {
        &self.exercises
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    pub fn is_consistent(&self) -> bool {
        self.count == self.exercises.len()
            && self.exercise_ids.len() == self.exercises.len()
            && self.exercise_ids.iter().all(|id| self.exercises.contains_key(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tokens_skip_stop_words_and_split_separators() {
        assert_eq!(
            search_tokens("Push-Up with a Band/Chain"),
            vec!["push", "up", "band", "chain"]
        );
    }

    #[test]
    fn tier_round_trips_as_integer() {
        let exercise = Exercise::global("ex-1", "Back Squat", ExerciseTier::Foundation);
        let value = serde_json::to_value(&exercise).unwrap();
        assert_eq!(value["exerciseTier"], json!(1));
        assert_eq!(value["isFoundational"], json!(true));
        let parsed: Exercise = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.exercise_tier, ExerciseTier::Foundation);
    }

    #[test]
    fn missing_tier_defaults_to_standard() {
        let parsed: Exercise =
            serde_json::from_value(json!({ "id": "ex-2", "name": "Cable Fly" })).unwrap();
        assert_eq!(parsed.exercise_tier, ExerciseTier::Standard);
        assert!(parsed.is_global);
    }

    #[test]
    fn invalid_tier_is_rejected() {
        let parsed =
            serde_json::from_value::<Exercise>(json!({ "id": "x", "name": "x", "exerciseTier": 7 }));
        assert!(parsed.is_err());
    }

    #[test]
    fn favorites_stay_in_lockstep() {
        let now = Utc::now();
        let mut favorites = UserFavorites::default();
        let squat = Exercise::global("ex-squat", "Back Squat", ExerciseTier::Foundation);
        let row = Exercise::global("ex-row", "Barbell Row", ExerciseTier::Standard);

        assert!(favorites.insert(FavoriteExercise::snapshot(&squat, now)));
        assert!(!favorites.insert(FavoriteExercise::snapshot(&squat, now)));
        assert!(favorites.insert(FavoriteExercise::snapshot(&row, now)));
        assert!(favorites.remove("ex-squat", now));
        assert!(!favorites.remove("ex-squat", now));

        assert!(favorites.is_consistent());
        assert_eq!(favorites.count(), 1);
        assert!(favorites.contains("ex-row"));
    }
}

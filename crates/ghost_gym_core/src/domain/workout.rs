//! Workout templates: the reusable plan of exercise groups a user performs.

use super::{new_id, normalize_tags, SyncStatus, ValidationError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const MAX_EXERCISE_GROUPS: usize = 6;
pub const MAX_BONUS_EXERCISES: usize = 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightUnit {
    #[default]
    Lbs,
    Kg,
}

fn new_group_id() -> String {
    new_id("group")
}

fn default_sets() -> String {
    "3".to_string()
}

fn default_reps() -> String {
    "8-12".to_string()
}

fn default_rest() -> String {
    "60s".to_string()
}

/// One block of a workout. `exercises` maps a slot letter (`a`, `b`, ...) to
/// an exercise name; `sets`, `reps` and `rest` are free-form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseGroup {
    #[serde(default = "new_group_id")]
    pub group_id: String,
    #[serde(default)]
    pub exercises: BTreeMap<String, String>,
    #[serde(default = "default_sets")]
    pub sets: String,
    #[serde(default = "default_reps")]
    pub reps: String,
    #[serde(default = "default_rest")]
    pub rest: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_weight_unit: Option<WeightUnit>,
}

impl ExerciseGroup {
    pub fn new<K, V>(exercises: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            group_id: new_group_id(),
            exercises: exercises
                .into_iter()
                .map(|(slot, name)| (slot.into(), name.into()))
                .collect(),
            sets: default_sets(),
            reps: default_reps(),
            rest: default_rest(),
            default_weight: None,
            default_weight_unit: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BonusExercise {
    pub name: String,
    #[serde(default = "default_sets")]
    pub sets: String,
    #[serde(default = "default_reps")]
    pub reps: String,
    #[serde(default = "default_rest")]
    pub rest: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutTemplate {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub exercise_groups: Vec<ExerciseGroup>,
    #[serde(default)]
    pub bonus_exercises: Vec<BonusExercise>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_date: DateTime<Utc>,
    pub modified_date: DateTime<Utc>,
    /// Only maintained by the remote store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    #[serde(default)]
    pub sync_status: SyncStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migrated_at: Option<DateTime<Utc>>,
}

impl WorkoutTemplate {
    /// Mints a new template with a fresh id. `created_date` and
    /// `modified_date` are identical on creation.
    pub fn create(new: NewWorkout, now: DateTime<Utc>) -> Self {
        Self {
            id: new_id("workout"),
            name: new.name.trim().to_string(),
            description: new.description,
            exercise_groups: new.exercise_groups,
            bonus_exercises: new.bonus_exercises,
            tags: normalize_tags(new.tags),
            created_date: now,
            modified_date: now,
            version: None,
            sync_status: SyncStatus::Local,
            migrated_at: None,
        }
    }

    /// The create payload that reproduces this template under `name`, with
    /// the `duplicate` tag appended.
    pub fn duplicate_request(&self, name: &str) -> NewWorkout {
        let mut tags = self.tags.clone();
        tags.push("duplicate".to_string());
        NewWorkout {
            name: name.to_string(),
            description: self.description.clone(),
            exercise_groups: self.exercise_groups.clone(),
            bonus_exercises: self.bonus_exercises.clone(),
            tags,
        }
    }

    /// Every exercise name in group order, then bonus exercises.
    pub fn exercise_names(&self) -> Vec<&str> {
        self.exercise_groups
            .iter()
            .flat_map(|g| g.exercises.values().map(String::as_str))
            .chain(self.bonus_exercises.iter().map(|b| b.name.as_str()))
            .collect()
    }
}

/// Payload for creating a workout template. Also the parse target for
/// migrated and imported items, so unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewWorkout {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub exercise_groups: Vec<ExerciseGroup>,
    #[serde(default)]
    pub bonus_exercises: Vec<BonusExercise>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl NewWorkout {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_group(mut self, group: ExerciseGroup) -> Self {
        self.exercise_groups.push(group);
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        check_limits(Some(&self.exercise_groups), Some(&self.bonus_exercises))
    }
}

fn check_limits(
    groups: Option<&Vec<ExerciseGroup>>,
    bonus: Option<&Vec<BonusExercise>>,
) -> Result<(), ValidationError> {
    if let Some(groups) = groups {
        if groups.len() > MAX_EXERCISE_GROUPS {
            return Err(ValidationError::TooMany {
                field: "exercise groups",
                max: MAX_EXERCISE_GROUPS,
                actual: groups.len(),
            });
        }
    }
    if let Some(bonus) = bonus {
        if bonus.len() > MAX_BONUS_EXERCISES {
            return Err(ValidationError::TooMany {
                field: "bonus exercises",
                max: MAX_BONUS_EXERCISES,
                actual: bonus.len(),
            });
        }
    }
    Ok(())
}

/// A partial update. Only fields that are `Some` are applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkoutPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exercise_groups: Option<Vec<ExerciseGroup>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bonus_exercises: Option<Vec<BonusExercise>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl WorkoutPatch {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if matches!(&self.name, Some(name) if name.trim().is_empty()) {
            return Err(ValidationError::EmptyName);
        }
        check_limits(self.exercise_groups.as_ref(), self.bonus_exercises.as_ref())
    }

    /// Trims the name and normalizes tags so both stores persist the same shape.
    pub fn normalized(mut self) -> Self {
        self.name = self.name.map(|n| n.trim().to_string());
        self.tags = self.tags.map(normalize_tags);
        self
    }

    /// Applies the present fields. Timestamps are the caller's concern.
    pub fn apply(self, workout: &mut WorkoutTemplate) {
        let patch = self.normalized();
        if let Some(name) = patch.name {
            workout.name = name;
        }
        if let Some(description) = patch.description {
            workout.description = description;
        }
        if let Some(groups) = patch.exercise_groups {
            workout.exercise_groups = groups;
        }
        if let Some(bonus) = patch.bonus_exercises {
            workout.bonus_exercises = bonus;
        }
        if let Some(tags) = patch.tags {
            workout.tags = tags;
        }
    }
}

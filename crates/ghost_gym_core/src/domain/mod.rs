//! crates/ghost_gym_core/src/domain/mod.rs
//!
//! Defines the core data structures for the application. Every entity
//! round-trips losslessly through JSON so both the local blob store and the
//! remote document database can persist it as-is.

pub mod exercise;
pub mod program;
pub mod session;
pub mod workout;

pub use exercise::{
    search_tokens, Exercise, ExerciseTier, FavoriteExercise, NewExercise, UserFavorites,
};
pub use program::{
    renumber, DifficultyLevel, NewProgram, Program, ProgramDetails, ProgramPatch, ProgramWorkout,
};
pub use session::{
    CompleteSession, ExerciseHistory, ExercisePerformance, NewSession, RecentSession,
    SessionPatch, SessionStatus, WorkoutSession, RECENT_SESSION_LIMIT,
};
pub use workout::{
    BonusExercise, ExerciseGroup, NewWorkout, WeightUnit, WorkoutPatch, WorkoutTemplate,
    MAX_BONUS_EXERCISES, MAX_EXERCISE_GROUPS,
};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The verified identity of a caller. `uid` is opaque to the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub uid: String,
    pub email: Option<String>,
}

impl Identity {
    pub fn new(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: None,
        }
    }
}

/// Where an entity currently lives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    #[default]
    Local,
    Synced,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Local => "local",
            SyncStatus::Synced => "synced",
        }
    }
}

/// A rejected entity payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,
    #[error("at most {max} {field} are allowed, got {actual}")]
    TooMany {
        field: &'static str,
        max: usize,
        actual: usize,
    },
}

/// Aggregate counts for one store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_workouts: u64,
    pub total_programs: u64,
}

/// Filtering and pagination for list operations. Pages are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub tags: Vec<String>,
    pub search: Option<String>,
    pub page: usize,
    pub page_size: usize,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            tags: Vec::new(),
            search: None,
            page: 1,
            page_size: 50,
        }
    }
}

impl ListQuery {
    /// Everything on a single page.
    pub fn all() -> Self {
        Self {
            page_size: usize::MAX,
            ..Self::default()
        }
    }

    pub fn page(page: usize, page_size: usize) -> Self {
        Self {
            page,
            page_size,
            ..Self::default()
        }
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}

/// Generates a fresh opaque id such as `workout-3f2a...`.
pub fn new_id(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4().simple())
}

/// Trims, drops empties and removes duplicates while keeping first-seen order.
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    tags.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty() && seen.insert(t.clone()))
        .collect()
}

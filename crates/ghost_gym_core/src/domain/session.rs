//! Logged workout sessions and the per-exercise history they feed.

use super::{new_id, WeightUnit};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Entries kept in `ExerciseHistory::recent_sessions`.
pub const RECENT_SESSION_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    InProgress,
    Completed,
    Abandoned,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Completed => "completed",
            SessionStatus::Abandoned => "abandoned",
        }
    }
}

/// What was actually done for one exercise during a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExercisePerformance {
    pub exercise_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
    #[serde(default)]
    pub sets_completed: u32,
    #[serde(default)]
    pub target_sets: String,
    #[serde(default)]
    pub target_reps: String,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub weight_unit: WeightUnit,
    #[serde(default)]
    pub order_index: usize,
    #[serde(default)]
    pub is_bonus: bool,
}

impl ExercisePerformance {
    pub fn new(exercise_name: impl Into<String>, weight: Option<f64>) -> Self {
        Self {
            exercise_name: exercise_name.into(),
            group_id: None,
            sets_completed: 0,
            target_sets: String::new(),
            target_reps: String::new(),
            weight,
            weight_unit: WeightUnit::default(),
            order_index: 0,
            is_bonus: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkoutSession {
    pub id: String,
    pub workout_id: String,
    pub workout_name: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_minutes: Option<i64>,
    #[serde(default)]
    pub exercises_performed: Vec<ExercisePerformance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
}

impl WorkoutSession {
    pub fn start(new: NewSession, now: DateTime<Utc>) -> Self {
        Self {
            id: new_id("session"),
            workout_id: new.workout_id,
            workout_name: new.workout_name,
            started_at: new.started_at.unwrap_or(now),
            completed_at: None,
            duration_minutes: None,
            exercises_performed: Vec::new(),
            notes: None,
            status: SessionStatus::InProgress,
            created_at: now,
        }
    }

    /// Moves an in-progress session to `Completed`, deriving the duration
    /// from the start time. Returns false if the session was not in progress.
    pub fn complete(&mut self, completion: CompleteSession, now: DateTime<Utc>) -> bool {
        if self.status != SessionStatus::InProgress {
            return false;
        }
        let completed_at = completion.completed_at.unwrap_or(now);
        self.duration_minutes = Some((completed_at - self.started_at).num_minutes().max(0));
        self.completed_at = Some(completed_at);
        self.exercises_performed = completion.exercises_performed;
        if completion.notes.is_some() {
            self.notes = completion.notes;
        }
        self.status = SessionStatus::Completed;
        true
    }

    pub fn bonus_exercises(&self) -> Vec<&ExercisePerformance> {
        self.exercises_performed.iter().filter(|e| e.is_bonus).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewSession {
    pub workout_id: String,
    pub workout_name: String,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
}

impl NewSession {
    pub fn new(workout_id: impl Into<String>, workout_name: impl Into<String>) -> Self {
        Self {
            workout_id: workout_id.into(),
            workout_name: workout_name.into(),
            started_at: None,
        }
    }
}

/// Auto-save payload applied while the session is in progress.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exercises_performed: Option<Vec<ExercisePerformance>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl SessionPatch {
    pub fn apply(self, session: &mut WorkoutSession) {
        if let Some(performed) = self.exercises_performed {
            session.exercises_performed = performed;
        }
        if let Some(notes) = self.notes {
            session.notes = Some(notes);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompleteSession {
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub exercises_performed: Vec<ExercisePerformance>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentSession {
    pub session_id: String,
    pub date: DateTime<Utc>,
    pub weight: f64,
    pub weight_unit: WeightUnit,
    pub sets: u32,
}

/// Rolling record for one exercise within one workout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseHistory {
    pub workout_id: String,
    pub exercise_name: String,
    pub last_weight: Option<f64>,
    #[serde(default)]
    pub last_weight_unit: WeightUnit,
    pub last_session_id: Option<String>,
    pub last_session_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_sessions: u64,
    #[serde(default)]
    pub best_weight: Option<f64>,
    #[serde(default)]
    pub best_weight_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub recent_sessions: Vec<RecentSession>,
}

impl ExerciseHistory {
    /// Document id: `{workout_id}_{exercise_name}`.
    pub fn key(workout_id: &str, exercise_name: &str) -> String {
        format!("{}_{}", workout_id, exercise_name)
    }

    pub fn empty(workout_id: impl Into<String>, exercise_name: impl Into<String>) -> Self {
        Self {
            workout_id: workout_id.into(),
            exercise_name: exercise_name.into(),
            last_weight: None,
            last_weight_unit: WeightUnit::default(),
            last_session_id: None,
            last_session_date: None,
            total_sessions: 0,
            best_weight: None,
            best_weight_date: None,
            recent_sessions: Vec::new(),
        }
    }

    /// Folds one completed performance into the record. The personal best
    /// only moves on a strictly greater weight.
    pub fn record(
        &mut self,
        session_id: &str,
        date: DateTime<Utc>,
        weight: f64,
        unit: WeightUnit,
        sets: u32,
    ) {
        self.last_weight = Some(weight);
        self.last_weight_unit = unit;
        self.last_session_id = Some(session_id.to_string());
        self.last_session_date = Some(date);
        self.total_sessions += 1;
        if self.best_weight.map_or(true, |best| weight > best) {
            self.best_weight = Some(weight);
            self.best_weight_date = Some(date);
        }
        self.recent_sessions.insert(
            0,
            RecentSession {
                session_id: session_id.to_string(),
                date,
                weight,
                weight_unit: unit,
                sets,
            },
        );
        self.recent_sessions.truncate(RECENT_SESSION_LIMIT);
    }
}

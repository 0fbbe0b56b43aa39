//! Programs: ordered, multi-week sequences of workout references.
//!
//! A program never owns its workouts. Entries point at workout ids and may
//! dangle after a workout is deleted; readers filter those out.

use super::{new_id, normalize_tags, SyncStatus, ValidationError, WorkoutTemplate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramWorkout {
    pub workout_id: String,
    #[serde(default)]
    pub order_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_date: Option<String>,
}

impl ProgramWorkout {
    pub fn new(workout_id: impl Into<String>) -> Self {
        Self {
            workout_id: workout_id.into(),
            order_index: 0,
            custom_name: None,
            custom_date: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifficultyLevel {
    Beginner,
    #[default]
    Intermediate,
    Advanced,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub workouts: Vec<ProgramWorkout>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_weeks: Option<u32>,
    #[serde(default)]
    pub difficulty_level: DifficultyLevel,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_date: DateTime<Utc>,
    pub modified_date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    #[serde(default)]
    pub sync_status: SyncStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migrated_at: Option<DateTime<Utc>>,
}

/// Reassigns `order_index` as 0..n-1 following the current list order.
pub fn renumber(workouts: &mut [ProgramWorkout]) {
    for (index, entry) in workouts.iter_mut().enumerate() {
        entry.order_index = index;
    }
}

impl Program {
    pub fn create(new: NewProgram, now: DateTime<Utc>) -> Self {
        let mut workouts = new.workouts;
        workouts.sort_by_key(|w| w.order_index);
        renumber(&mut workouts);
        Self {
            id: new_id("program"),
            name: new.name.trim().to_string(),
            description: new.description,
            workouts,
            duration_weeks: new.duration_weeks,
            difficulty_level: new.difficulty_level,
            tags: normalize_tags(new.tags),
            created_date: now,
            modified_date: now,
            version: None,
            sync_status: SyncStatus::Local,
            migrated_at: None,
        }
    }

    pub fn duplicate_request(&self, name: &str) -> NewProgram {
        let mut tags = self.tags.clone();
        tags.push("duplicate".to_string());
        NewProgram {
            name: name.to_string(),
            description: self.description.clone(),
            workouts: self.workouts.clone(),
            duration_weeks: self.duration_weeks,
            difficulty_level: self.difficulty_level,
            tags,
        }
    }

    /// Inserts at `order_index` (clamped to the end; `None` appends) and
    /// renumbers every entry.
    pub fn insert_workout(&mut self, mut entry: ProgramWorkout, order_index: Option<usize>) {
        let position = order_index
            .unwrap_or(self.workouts.len())
            .min(self.workouts.len());
        entry.order_index = position;
        self.workouts.insert(position, entry);
        renumber(&mut self.workouts);
    }

    /// Removes every entry referencing `workout_id`. Returns false when the
    /// program did not reference it.
    pub fn remove_workout(&mut self, workout_id: &str) -> bool {
        let before = self.workouts.len();
        self.workouts.retain(|w| w.workout_id != workout_id);
        if self.workouts.len() == before {
            return false;
        }
        renumber(&mut self.workouts);
        true
    }

    /// Rebuilds the list in the order given. Entries whose workout id is not
    /// in `order` are dropped; ids listed twice are placed once.
    pub fn reorder_workouts(&mut self, order: &[String]) {
        let mut placed = HashSet::new();
        let mut reordered = Vec::with_capacity(order.len());
        for workout_id in order {
            if !placed.insert(workout_id.as_str()) {
                continue;
            }
            if let Some(entry) = self.workouts.iter().rev().find(|w| &w.workout_id == workout_id) {
                reordered.push(entry.clone());
            }
        }
        renumber(&mut reordered);
        self.workouts = reordered;
    }

    /// Replaces workout references using `mapping`; unknown ids are kept.
    pub fn remap_workout_ids(&mut self, mapping: &std::collections::HashMap<String, String>) {
        for entry in &mut self.workouts {
            if let Some(new_id) = mapping.get(&entry.workout_id) {
                entry.workout_id = new_id.clone();
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewProgram {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub workouts: Vec<ProgramWorkout>,
    #[serde(default)]
    pub duration_weeks: Option<u32>,
    #[serde(default)]
    pub difficulty_level: DifficultyLevel,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl NewProgram {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgramPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workouts: Option<Vec<ProgramWorkout>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_weeks: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty_level: Option<DifficultyLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl ProgramPatch {
    pub fn workouts(workouts: Vec<ProgramWorkout>) -> Self {
        Self {
            workouts: Some(workouts),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if matches!(&self.name, Some(name) if name.trim().is_empty()) {
            return Err(ValidationError::EmptyName);
        }
        Ok(())
    }

    /// Trims the name, normalizes tags and renumbers a replacement
    /// workout list in its given order.
    pub fn normalized(mut self) -> Self {
        self.name = self.name.map(|n| n.trim().to_string());
        self.tags = self.tags.map(normalize_tags);
        if let Some(workouts) = self.workouts.as_mut() {
            renumber(workouts);
        }
        self
    }

    pub fn apply(self, program: &mut Program) {
        let patch = self.normalized();
        if let Some(name) = patch.name {
            program.name = name;
        }
        if let Some(description) = patch.description {
            program.description = description;
        }
        if let Some(workouts) = patch.workouts {
            program.workouts = workouts;
        }
        if let Some(weeks) = patch.duration_weeks {
            program.duration_weeks = Some(weeks);
        }
        if let Some(level) = patch.difficulty_level {
            program.difficulty_level = level;
        }
        if let Some(tags) = patch.tags {
            program.tags = tags;
        }
    }
}

/// A program together with the workouts it references, in program order.
/// Dangling references are absent from `workout_details`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramDetails {
    pub program: Program,
    pub workout_details: Vec<WorkoutTemplate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program_with(ids: &[&str]) -> Program {
        let mut program = Program::create(NewProgram::new("Block"), Utc::now());
        for id in ids {
            program.insert_workout(ProgramWorkout::new(*id), None);
        }
        program
    }

    fn order(program: &Program) -> Vec<(String, usize)> {
        program
            .workouts
            .iter()
            .map(|w| (w.workout_id.clone(), w.order_index))
            .collect()
    }

    #[test]
    fn insert_at_position_renumbers() {
        let mut program = program_with(&["a", "b"]);
        program.insert_workout(ProgramWorkout::new("c"), Some(0));
        assert_eq!(
            order(&program),
            vec![("c".into(), 0), ("a".into(), 1), ("b".into(), 2)]
        );
    }

    #[test]
    fn insert_past_end_is_clamped() {
        let mut program = program_with(&["a"]);
        program.insert_workout(ProgramWorkout::new("b"), Some(40));
        assert_eq!(order(&program), vec![("a".into(), 0), ("b".into(), 1)]);
    }

    #[test]
    fn remove_missing_workout_reports_false() {
        let mut program = program_with(&["a"]);
        assert!(!program.remove_workout("zzz"));
        assert_eq!(program.workouts.len(), 1);
    }

    #[test]
    fn reorder_drops_unlisted_and_ignores_repeats() {
        let mut program = program_with(&["a", "b", "c"]);
        program.reorder_workouts(&["c".into(), "a".into(), "c".into(), "ghost".into()]);
        assert_eq!(order(&program), vec![("c".into(), 0), ("a".into(), 1)]);
    }

    #[test]
    fn create_renumbers_initial_entries() {
        let mut first = ProgramWorkout::new("x");
        first.order_index = 4;
        let mut second = ProgramWorkout::new("y");
        second.order_index = 9;
        let program = Program::create(
            NewProgram {
                workouts: vec![second, first],
                ..NewProgram::new("Imported")
            },
            Utc::now(),
        );
        assert_eq!(order(&program), vec![("x".into(), 0), ("y".into(), 1)]);
    }
}

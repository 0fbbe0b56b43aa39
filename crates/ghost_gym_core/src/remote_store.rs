//! crates/ghost_gym_core/src/remote_store.rs
//!
//! The authenticated-user store. Entities live under `users/{uid}/workouts`
//! and `users/{uid}/programs`; the user document carries denormalized
//! `stats.totalWorkouts` / `stats.totalPrograms` counters maintained with
//! atomic increments.

use crate::documents::{
    from_document, paths, to_document, DocPath, Document, FieldOp, FieldPath, Filter, Query,
};
use crate::domain::{
    ListQuery, NewProgram, NewWorkout, Program, ProgramDetails, ProgramPatch, ProgramWorkout,
    StoreStats, SyncStatus, WorkoutPatch, WorkoutTemplate,
};
use crate::listing;
use crate::ports::{DocumentDatabase, PortResult, WorkoutStore};
use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

const WORKOUT_COUNTER: &str = "totalWorkouts";
const PROGRAM_COUNTER: &str = "totalPrograms";

/// Shared handle to the document database. Hands out per-user stores.
#[derive(Clone)]
pub struct RemoteBackend {
    db: Arc<dyn DocumentDatabase>,
}

impl RemoteBackend {
    pub fn new(db: Arc<dyn DocumentDatabase>) -> Self {
        Self { db }
    }

    pub fn is_available(&self) -> bool {
        self.db.is_available()
    }

    pub fn database(&self) -> Arc<dyn DocumentDatabase> {
        self.db.clone()
    }

    pub fn for_user(&self, uid: &str) -> RemoteStore {
        RemoteStore {
            db: self.db.clone(),
            uid: uid.to_string(),
        }
    }
}

/// One user's view of the document database.
pub struct RemoteStore {
    db: Arc<dyn DocumentDatabase>,
    uid: String,
}

#[derive(Debug, Clone, Copy)]
enum Kind {
    Workout,
    Program,
}

impl RemoteStore {
    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn workout_path(&self, id: &str) -> DocPath {
        DocPath::new(paths::workouts(&self.uid), id)
    }

    pub fn program_path(&self, id: &str) -> DocPath {
        DocPath::new(paths::programs(&self.uid), id)
    }

    fn path(&self, kind: Kind, id: &str) -> DocPath {
        match kind {
            Kind::Workout => self.workout_path(id),
            Kind::Program => self.program_path(id),
        }
    }

    fn collection(&self, kind: Kind) -> String {
        match kind {
            Kind::Workout => paths::workouts(&self.uid),
            Kind::Program => paths::programs(&self.uid),
        }
    }

    /// True when the user has at least one workout or program stored.
    pub async fn has_any_data(&self) -> PortResult<bool> {
        let first = Query::new().limit(1);
        if !self.db.query(&self.collection(Kind::Workout), &first).await?.is_empty() {
            return Ok(true);
        }
        Ok(!self.db.query(&self.collection(Kind::Program), &first).await?.is_empty())
    }

    //=====================================================================================
    // Generic entity helpers
    //=====================================================================================

    async fn fetch<T: DeserializeOwned>(&self, kind: Kind, id: &str) -> PortResult<Option<T>> {
        match self.db.get(&self.path(kind, id)).await? {
            Some(doc) => Ok(Some(from_document(doc)?)),
            None => Ok(None),
        }
    }

    async fn list<T: DeserializeOwned>(&self, kind: Kind, query: &ListQuery) -> PortResult<Vec<T>> {
        let mut remote = Query::new().order_by("modified_date", true);
        if !query.tags.is_empty() {
            remote = remote.filter(Filter::ArrayContainsAny(
                "tags".into(),
                query.tags.iter().cloned().map(Value::from).collect(),
            ));
        }
        let snapshots = self.db.query(&self.collection(kind), &remote).await?;
        Ok(snapshots
            .into_iter()
            .filter_map(|snap| match from_document(snap.data) {
                Ok(entity) => Some(entity),
                Err(e) => {
                    warn!(uid = %self.uid, id = %snap.id, error = %e, "Skipping malformed remote document");
                    None
                }
            })
            .collect())
    }

    async fn insert<T: Serialize>(&self, kind: Kind, id: &str, entity: &T) -> PortResult<()> {
        self.db.set(&self.path(kind, id), to_document(entity)?).await?;
        self.bump_counter(kind, 1).await;
        Ok(())
    }

    /// Sets every field present in `patch`, bumps `modified_date` and
    /// `version`, then reads the document back.
    async fn patch<T: DeserializeOwned>(
        &self,
        kind: Kind,
        id: &str,
        patch: Document,
    ) -> PortResult<Option<T>> {
        let mut ops: Vec<FieldOp> = patch
            .into_iter()
            .map(|(field, value)| FieldOp::Set(FieldPath::new([field]), value))
            .collect();
        ops.push(FieldOp::set("modified_date", timestamp_now()));
        ops.push(FieldOp::increment("version", 1));
        ops.push(FieldOp::set("sync_status", SyncStatus::Synced.as_str()));
        if !self.db.update(&self.path(kind, id), ops, false).await? {
            debug!(uid = %self.uid, id, "Remote update target not found");
            return Ok(None);
        }
        self.fetch(kind, id).await
    }

    async fn remove(&self, kind: Kind, id: &str) -> PortResult<bool> {
        let deleted = self.db.delete(&self.path(kind, id)).await?;
        if deleted {
            self.bump_counter(kind, -1).await;
        }
        Ok(deleted)
    }

    /// Best-effort counter maintenance on the user document.
    async fn bump_counter(&self, kind: Kind, delta: i64) {
        let counter = match kind {
            Kind::Workout => WORKOUT_COUNTER,
            Kind::Program => PROGRAM_COUNTER,
        };
        let ops = vec![
            FieldOp::Increment(FieldPath::new(["stats", counter]), delta),
            FieldOp::Set(FieldPath::new(["stats", "lastActivity"]), timestamp_now()),
        ];
        if let Err(e) = self.db.update(&paths::user(&self.uid), ops, true).await {
            warn!(uid = %self.uid, counter, delta, error = %e, "Failed to update user counter");
        }
    }
}

fn timestamp_now() -> Value {
    Value::from(Utc::now().to_rfc3339_opts(chrono::SecondsFormat::AutoSi, true))
}

#[async_trait]
impl WorkoutStore for RemoteStore {
    async fn create_workout(&self, new: NewWorkout) -> PortResult<WorkoutTemplate> {
        new.validate()?;
        let mut workout = WorkoutTemplate::create(new, Utc::now());
        workout.version = Some(1);
        workout.sync_status = SyncStatus::Synced;
        self.insert(Kind::Workout, &workout.id, &workout).await?;
        info!(uid = %self.uid, id = %workout.id, "Created remote workout");
        Ok(workout)
    }

    async fn get_workout(&self, id: &str) -> PortResult<Option<WorkoutTemplate>> {
        self.fetch(Kind::Workout, id).await
    }

    async fn list_workouts(&self, query: &ListQuery) -> PortResult<Vec<WorkoutTemplate>> {
        let workouts = self.list(Kind::Workout, query).await?;
        Ok(listing::apply(workouts, query))
    }

    async fn update_workout(
        &self,
        id: &str,
        patch: WorkoutPatch,
    ) -> PortResult<Option<WorkoutTemplate>> {
        patch.validate()?;
        let fields = to_document(&patch.normalized())?;
        self.patch(Kind::Workout, id, fields).await
    }

    async fn delete_workout(&self, id: &str) -> PortResult<bool> {
        self.remove(Kind::Workout, id).await
    }

    async fn duplicate_workout(
        &self,
        id: &str,
        new_name: &str,
    ) -> PortResult<Option<WorkoutTemplate>> {
        match self.get_workout(id).await? {
            Some(original) => Ok(Some(
                self.create_workout(original.duplicate_request(new_name)).await?,
            )),
            None => Ok(None),
        }
    }

    async fn create_program(&self, new: NewProgram) -> PortResult<Program> {
        new.validate()?;
        let mut program = Program::create(new, Utc::now());
        program.version = Some(1);
        program.sync_status = SyncStatus::Synced;
        self.insert(Kind::Program, &program.id, &program).await?;
        info!(uid = %self.uid, id = %program.id, "Created remote program");
        Ok(program)
    }

    async fn get_program(&self, id: &str) -> PortResult<Option<Program>> {
        self.fetch(Kind::Program, id).await
    }

    async fn list_programs(&self, query: &ListQuery) -> PortResult<Vec<Program>> {
        let programs = self.list(Kind::Program, query).await?;
        Ok(listing::apply(programs, query))
    }

    async fn update_program(&self, id: &str, patch: ProgramPatch) -> PortResult<Option<Program>> {
        patch.validate()?;
        let fields = to_document(&patch.normalized())?;
        self.patch(Kind::Program, id, fields).await
    }

    async fn delete_program(&self, id: &str) -> PortResult<bool> {
        self.remove(Kind::Program, id).await
    }

    async fn duplicate_program(&self, id: &str, new_name: &str) -> PortResult<Option<Program>> {
        match self.get_program(id).await? {
            Some(original) => Ok(Some(
                self.create_program(original.duplicate_request(new_name)).await?,
            )),
            None => Ok(None),
        }
    }

    async fn add_workout_to_program(
        &self,
        program_id: &str,
        entry: ProgramWorkout,
        order_index: Option<usize>,
    ) -> PortResult<Option<Program>> {
        let Some(mut program) = self.get_program(program_id).await? else {
            return Ok(None);
        };
        if self.get_workout(&entry.workout_id).await?.is_none() {
            return Ok(None);
        }
        program.insert_workout(entry, order_index);
        self.update_program(program_id, ProgramPatch::workouts(program.workouts))
            .await
    }

    async fn remove_workout_from_program(
        &self,
        program_id: &str,
        workout_id: &str,
    ) -> PortResult<Option<Program>> {
        let Some(mut program) = self.get_program(program_id).await? else {
            return Ok(None);
        };
        if !program.remove_workout(workout_id) {
            return Ok(None);
        }
        self.update_program(program_id, ProgramPatch::workouts(program.workouts))
            .await
    }

    async fn reorder_program_workouts(
        &self,
        program_id: &str,
        order: &[String],
    ) -> PortResult<Option<Program>> {
        let Some(mut program) = self.get_program(program_id).await? else {
            return Ok(None);
        };
        program.reorder_workouts(order);
        self.update_program(program_id, ProgramPatch::workouts(program.workouts))
            .await
    }

    async fn get_program_with_workout_details(
        &self,
        program_id: &str,
    ) -> PortResult<Option<ProgramDetails>> {
        let Some(program) = self.get_program(program_id).await? else {
            return Ok(None);
        };
        let mut workout_details = Vec::with_capacity(program.workouts.len());
        for entry in &program.workouts {
            if let Some(workout) = self.get_workout(&entry.workout_id).await? {
                workout_details.push(workout);
            }
        }
        Ok(Some(ProgramDetails {
            program,
            workout_details,
        }))
    }

    /// Reads the denormalized counters; no collection scan.
    async fn stats(&self) -> PortResult<StoreStats> {
        let profile = self.db.get(&paths::user(&self.uid)).await?.unwrap_or_default();
        let counter = |name: &str| {
            profile
                .get("stats")
                .and_then(|s| s.get(name))
                .and_then(Value::as_i64)
                .unwrap_or(0)
                .max(0) as u64
        };
        Ok(StoreStats {
            total_workouts: counter(WORKOUT_COUNTER),
            total_programs: counter(PROGRAM_COUNTER),
        })
    }
}

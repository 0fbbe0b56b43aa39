//! crates/ghost_gym_core/src/router.rs
//!
//! Per-call store selection. An authenticated caller is served by their
//! remote store while the document database reports itself available;
//! everyone else, and every remote failure, is served by the local store.

use crate::domain::{
    Identity, ListQuery, NewProgram, NewWorkout, Program, ProgramDetails, ProgramPatch,
    ProgramWorkout, StoreStats, WorkoutPatch, WorkoutTemplate,
};
use crate::local_store::LocalStore;
use crate::migration::{parse_program, parse_workout};
use crate::ports::{PortError, PortResult, WorkoutStore};
use crate::remote_store::{RemoteBackend, RemoteStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Runs `$call` against the selected store, retrying it once against the
/// local store when the remote store fails.
macro_rules! routed {
    ($router:expr, $identity:expr, $op:literal, |$store:ident| $call:expr) => {{
        match $router.remote_for($identity) {
            Some(remote) => {
                let result = {
                    let $store: &dyn WorkoutStore = &remote;
                    $call.await
                };
                match result {
                    Err(e) if UnifiedRouter::falls_back(&e) => {
                        warn!(
                            op = $op,
                            uid = %remote.uid(),
                            error = %e,
                            "Remote store failed; falling back to local store"
                        );
                        let $store: &dyn WorkoutStore = $router.local.as_ref();
                        $call.await
                    }
                    other => other,
                }
            }
            None => {
                let $store: &dyn WorkoutStore = $router.local.as_ref();
                $call.await
            }
        }
    }};
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    Local,
    Remote,
}

/// Which store a caller would be routed to right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageStatus {
    pub authenticated: bool,
    pub remote_available: bool,
    pub backend: Backend,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportBundle {
    pub exported_at: DateTime<Utc>,
    pub workouts: Vec<WorkoutTemplate>,
    pub programs: Vec<Program>,
}

/// Import input. Items stay raw so one malformed entry cannot reject the file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportBundle {
    #[serde(default)]
    pub workouts: Vec<Value>,
    #[serde(default)]
    pub programs: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub imported_workouts: usize,
    pub imported_programs: usize,
    pub errors: Vec<String>,
}

pub struct UnifiedRouter {
    local: Arc<LocalStore>,
    remote: RemoteBackend,
}

impl UnifiedRouter {
    pub fn new(local: Arc<LocalStore>, remote: RemoteBackend) -> Self {
        Self { local, remote }
    }

    pub fn local(&self) -> &Arc<LocalStore> {
        &self.local
    }

    fn remote_for(&self, identity: Option<&Identity>) -> Option<RemoteStore> {
        let identity = identity?;
        self.remote
            .is_available()
            .then(|| self.remote.for_user(&identity.uid))
    }

    /// Validation failures would fail identically on the local store.
    fn falls_back(error: &PortError) -> bool {
        !matches!(error, PortError::Validation(_))
    }

    pub fn status(&self, identity: Option<&Identity>) -> StorageStatus {
        let remote_available = self.remote.is_available();
        let authenticated = identity.is_some();
        StorageStatus {
            authenticated,
            remote_available,
            backend: if authenticated && remote_available {
                Backend::Remote
            } else {
                Backend::Local
            },
        }
    }

    //=====================================================================================
    // Workouts
    //=====================================================================================

    pub async fn create_workout(
        &self,
        identity: Option<&Identity>,
        new: NewWorkout,
    ) -> PortResult<WorkoutTemplate> {
        routed!(self, identity, "create_workout", |store| store
            .create_workout(new.clone()))
    }

    pub async fn get_workout(
        &self,
        identity: Option<&Identity>,
        id: &str,
    ) -> PortResult<Option<WorkoutTemplate>> {
        routed!(self, identity, "get_workout", |store| store.get_workout(id))
    }

    pub async fn list_workouts(
        &self,
        identity: Option<&Identity>,
        query: &ListQuery,
    ) -> PortResult<Vec<WorkoutTemplate>> {
        routed!(self, identity, "list_workouts", |store| store.list_workouts(query))
    }

    pub async fn update_workout(
        &self,
        identity: Option<&Identity>,
        id: &str,
        patch: WorkoutPatch,
    ) -> PortResult<Option<WorkoutTemplate>> {
        routed!(self, identity, "update_workout", |store| store
            .update_workout(id, patch.clone()))
    }

    pub async fn delete_workout(&self, identity: Option<&Identity>, id: &str) -> PortResult<bool> {
        routed!(self, identity, "delete_workout", |store| store.delete_workout(id))
    }

    pub async fn duplicate_workout(
        &self,
        identity: Option<&Identity>,
        id: &str,
        new_name: &str,
    ) -> PortResult<Option<WorkoutTemplate>> {
        routed!(self, identity, "duplicate_workout", |store| store
            .duplicate_workout(id, new_name))
    }

    //=====================================================================================
    // Programs
    //=====================================================================================

    pub async fn create_program(
        &self,
        identity: Option<&Identity>,
        new: NewProgram,
    ) -> PortResult<Program> {
        routed!(self, identity, "create_program", |store| store
            .create_program(new.clone()))
    }

    pub async fn get_program(
        &self,
        identity: Option<&Identity>,
        id: &str,
    ) -> PortResult<Option<Program>> {
        routed!(self, identity, "get_program", |store| store.get_program(id))
    }

    pub async fn list_programs(
        &self,
        identity: Option<&Identity>,
        query: &ListQuery,
    ) -> PortResult<Vec<Program>> {
        routed!(self, identity, "list_programs", |store| store.list_programs(query))
    }

    pub async fn update_program(
        &self,
        identity: Option<&Identity>,
        id: &str,
        patch: ProgramPatch,
    ) -> PortResult<Option<Program>> {
        routed!(self, identity, "update_program", |store| store
            .update_program(id, patch.clone()))
    }

    pub async fn delete_program(&self, identity: Option<&Identity>, id: &str) -> PortResult<bool> {
        routed!(self, identity, "delete_program", |store| store.delete_program(id))
    }

    pub async fn duplicate_program(
        &self,
        identity: Option<&Identity>,
        id: &str,
        new_name: &str,
    ) -> PortResult<Option<Program>> {
        routed!(self, identity, "duplicate_program", |store| store
            .duplicate_program(id, new_name))
    }

    pub async fn add_workout_to_program(
        &self,
        identity: Option<&Identity>,
        program_id: &str,
        entry: ProgramWorkout,
        order_index: Option<usize>,
    ) -> PortResult<Option<Program>> {
        routed!(self, identity, "add_workout_to_program", |store| store
            .add_workout_to_program(program_id, entry.clone(), order_index))
    }

    pub async fn remove_workout_from_program(
        &self,
        identity: Option<&Identity>,
        program_id: &str,
        workout_id: &str,
    ) -> PortResult<Option<Program>> {
        routed!(self, identity, "remove_workout_from_program", |store| store
            .remove_workout_from_program(program_id, workout_id))
    }

    pub async fn reorder_program_workouts(
        &self,
        identity: Option<&Identity>,
        program_id: &str,
        order: &[String],
    ) -> PortResult<Option<Program>> {
        routed!(self, identity, "reorder_program_workouts", |store| store
            .reorder_program_workouts(program_id, order))
    }

    pub async fn get_program_with_workout_details(
        &self,
        identity: Option<&Identity>,
        program_id: &str,
    ) -> PortResult<Option<ProgramDetails>> {
        routed!(self, identity, "get_program_with_workout_details", |store| store
            .get_program_with_workout_details(program_id))
    }

    pub async fn stats(&self, identity: Option<&Identity>) -> PortResult<StoreStats> {
        routed!(self, identity, "stats", |store| store.stats())
    }

    //=====================================================================================
    // Export / import
    //=====================================================================================

    pub async fn export(&self, identity: Option<&Identity>) -> PortResult<ExportBundle> {
        let workouts = self.list_workouts(identity, &ListQuery::all()).await?;
        let programs = self.list_programs(identity, &ListQuery::all()).await?;
        Ok(ExportBundle {
            exported_at: Utc::now(),
            workouts,
            programs,
        })
    }

    /// Creates every well-formed item through the routed store. Program
    /// entries pointing at imported workouts are rewritten to the new ids.
    pub async fn import(
        &self,
        identity: Option<&Identity>,
        bundle: ImportBundle,
    ) -> PortResult<ImportReport> {
        let mut report = ImportReport::default();
        let mut id_map: HashMap<String, String> = HashMap::new();

        for item in &bundle.workouts {
            let new = match parse_workout(item) {
                Ok(new) => new,
                Err(e) => {
                    report.errors.push(format!("Workout import error: {}", e));
                    continue;
                }
            };
            let created = self.create_workout(identity, new).await?;
            if let Some(old_id) = item.get("id").and_then(Value::as_str) {
                id_map.insert(old_id.to_string(), created.id.clone());
            }
            report.imported_workouts += 1;
        }

        for item in &bundle.programs {
            let mut new = match parse_program(item) {
                Ok(new) => new,
                Err(e) => {
                    report.errors.push(format!("Program import error: {}", e));
                    continue;
                }
            };
            for entry in &mut new.workouts {
                if let Some(new_id) = id_map.get(&entry.workout_id) {
                    entry.workout_id = new_id.clone();
                }
            }
            self.create_program(identity, new).await?;
            report.imported_programs += 1;
        }

        info!(
            workouts = report.imported_workouts,
            programs = report.imported_programs,
            errors = report.errors.len(),
            "Import finished"
        );
        Ok(report)
    }
}

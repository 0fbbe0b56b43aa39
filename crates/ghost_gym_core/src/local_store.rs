//! crates/ghost_gym_core/src/local_store.rs
//!
//! The anonymous-user store: two JSON files (`workouts.json`, `programs.json`)
//! on a blob store, rewritten whole on every mutation. A store-wide mutex
//! serializes read-modify-write cycles so concurrent writers cannot clobber
//! each other.
//!
//! Items are kept as raw JSON between reads and writes. An entry that no
//! longer decodes is skipped by readers but survives rewrites, so migration
//! and export can still report it.

use crate::domain::{
    ListQuery, NewProgram, NewWorkout, Program, ProgramDetails, ProgramPatch, ProgramWorkout,
    StoreStats, WorkoutPatch, WorkoutTemplate,
};
use crate::listing;
use crate::ports::{BlobStore, PortError, PortResult, WorkoutStore};
use async_trait::async_trait;
use chrono::Utc;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

pub const WORKOUTS_KEY: &str = "workouts.json";
pub const PROGRAMS_KEY: &str = "programs.json";
pub const BACKUP_PREFIX: &str = "backups/gym_data_backup_";

#[derive(Debug, Clone, Copy)]
enum LocalFile {
    Workouts,
    Programs,
}

impl LocalFile {
    fn key(self) -> &'static str {
        match self {
            LocalFile::Workouts => WORKOUTS_KEY,
            LocalFile::Programs => PROGRAMS_KEY,
        }
    }

    fn field(self) -> &'static str {
        match self {
            LocalFile::Workouts => "workouts",
            LocalFile::Programs => "programs",
        }
    }
}

/// Every stored item, undecoded. Used for migration, export and backups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalSnapshot {
    #[serde(default)]
    pub workouts: Vec<Value>,
    #[serde(default)]
    pub programs: Vec<Value>,
}

impl LocalSnapshot {
    pub fn is_empty(&self) -> bool {
        self.workouts.is_empty() && self.programs.is_empty()
    }
}

pub struct LocalStore {
    blobs: Arc<dyn BlobStore>,
    write_lock: Mutex<()>,
}

impl LocalStore {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            blobs,
            write_lock: Mutex::new(()),
        }
    }

    //=====================================================================================
    // File access
    //=====================================================================================

    /// Reads the raw item list. A missing or unparsable file reads as empty.
    async fn load(&self, file: LocalFile) -> PortResult<Vec<Value>> {
        let Some(bytes) = self.blobs.read(file.key()).await? else {
            return Ok(Vec::new());
        };
        match serde_json::from_slice::<Value>(&bytes) {
            Ok(mut root) => match root.get_mut(file.field()).map(Value::take) {
                Some(Value::Array(items)) => Ok(items),
                _ => Ok(Vec::new()),
            },
            Err(e) => {
                warn!(file = file.key(), error = %e, "Local data file is not valid JSON; treating as empty");
                Ok(Vec::new())
            }
        }
    }

    async fn save(&self, file: LocalFile, items: Vec<Value>) -> PortResult<()> {
        let mut root = serde_json::Map::new();
        root.insert(file.field().to_string(), Value::Array(items));
        let bytes = serde_json::to_vec_pretty(&Value::Object(root))
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        self.blobs.write(file.key(), &bytes).await
    }

    fn decode_all<T: DeserializeOwned>(file: LocalFile, items: Vec<Value>) -> Vec<T> {
        items
            .into_iter()
            .filter_map(|item| match serde_json::from_value(item) {
                Ok(decoded) => Some(decoded),
                Err(e) => {
                    warn!(file = file.key(), error = %e, "Skipping malformed local entry");
                    None
                }
            })
            .collect()
    }

    fn position(items: &[Value], id: &str) -> Option<usize> {
        items
            .iter()
            .position(|item| item.get("id").and_then(Value::as_str) == Some(id))
    }

    fn encode<T: Serialize>(value: &T) -> PortResult<Value> {
        serde_json::to_value(value).map_err(|e| PortError::Unexpected(e.to_string()))
    }

    async fn find<T: DeserializeOwned>(&self, file: LocalFile, id: &str) -> PortResult<Option<T>> {
        let items = self.load(file).await?;
        Ok(Self::position(&items, id)
            .and_then(|i| serde_json::from_value(items[i].clone()).ok()))
    }

    /// Decodes the entry with `id`, lets `mutate` change it and writes the
    /// file back. `None` when the entry is missing or `mutate` declines.
    async fn modify<T, F>(&self, file: LocalFile, id: &str, mutate: F) -> PortResult<Option<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut T) -> bool,
    {
        let _guard = self.write_lock.lock().await;
        let mut items = self.load(file).await?;
        let Some(index) = Self::position(&items, id) else {
            return Ok(None);
        };
        let mut entity: T = match serde_json::from_value(items[index].clone()) {
            Ok(entity) => entity,
            Err(e) => {
                warn!(file = file.key(), id, error = %e, "Cannot update malformed local entry");
                return Ok(None);
            }
        };
        if !mutate(&mut entity) {
            return Ok(None);
        }
        items[index] = Self::encode(&entity)?;
        self.save(file, items).await?;
        Ok(Some(entity))
    }

    async fn append<T: Serialize>(&self, file: LocalFile, entity: &T) -> PortResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut items = self.load(file).await?;
        items.push(Self::encode(entity)?);
        self.save(file, items).await
    }

    async fn remove(&self, file: LocalFile, id: &str) -> PortResult<bool> {
        let _guard = self.write_lock.lock().await;
        let mut items = self.load(file).await?;
        let before = items.len();
        items.retain(|item| item.get("id").and_then(Value::as_str) != Some(id));
        if items.len() == before {
            return Ok(false);
        }
        self.save(file, items).await?;
        Ok(true)
    }

    //=====================================================================================
    // Snapshot, backup and restore
    //=====================================================================================

    pub async fn snapshot(&self) -> PortResult<LocalSnapshot> {
        Ok(LocalSnapshot {
            workouts: self.load(LocalFile::Workouts).await?,
            programs: self.load(LocalFile::Programs).await?,
        })
    }

    /// Writes every stored item to a new timestamped backup and returns its key.
    pub async fn backup(&self) -> PortResult<String> {
        let snapshot = self.snapshot().await?;
        let stamp = Utc::now().format("%Y%m%d_%H%M%S_%3f").to_string();
        let key = format!("{}{}.json", BACKUP_PREFIX, stamp);
        let body = json!({
            "backup_timestamp": stamp,
            "workouts": snapshot.workouts,
            "programs": snapshot.programs,
        });
        let bytes =
            serde_json::to_vec_pretty(&body).map_err(|e| PortError::Unexpected(e.to_string()))?;
        self.blobs.write(&key, &bytes).await?;
        info!(
            backup = %key,
            workouts = snapshot.workouts.len(),
            programs = snapshot.programs.len(),
            "Local data backed up"
        );
        Ok(key)
    }

    /// Replaces both files with the backup's contents. Returns false when
    /// the backup does not exist.
    pub async fn restore(&self, backup_key: &str) -> PortResult<bool> {
        let _guard = self.write_lock.lock().await;
        let Some(bytes) = self.blobs.read(backup_key).await? else {
            warn!(backup = backup_key, "Backup not found");
            return Ok(false);
        };
        let snapshot: LocalSnapshot = serde_json::from_slice(&bytes)
            .map_err(|e| PortError::Validation(format!("backup {} is unreadable: {}", backup_key, e)))?;
        self.save(LocalFile::Workouts, snapshot.workouts).await?;
        self.save(LocalFile::Programs, snapshot.programs).await?;
        info!(backup = backup_key, "Local data restored");
        Ok(true)
    }

    pub async fn list_backups(&self) -> PortResult<Vec<String>> {
        self.blobs.list(BACKUP_PREFIX).await
    }

    /// Backs everything up, then empties both files. Returns the backup key.
    /// Writers are held off across both steps so nothing lands in between.
    pub async fn clear(&self) -> PortResult<String> {
        let _guard = self.write_lock.lock().await;
        let backup = self.backup().await?;
        self.save(LocalFile::Workouts, Vec::new()).await?;
        self.save(LocalFile::Programs, Vec::new()).await?;
        info!(backup = %backup, "Local data cleared");
        Ok(backup)
    }
}

#[async_trait]
impl WorkoutStore for LocalStore {
    async fn create_workout(&self, new: NewWorkout) -> PortResult<WorkoutTemplate> {
        new.validate()?;
        let workout = WorkoutTemplate::create(new, Utc::now());
        self.append(LocalFile::Workouts, &workout).await?;
        info!(id = %workout.id, "Created local workout");
        Ok(workout)
    }

    async fn get_workout(&self, id: &str) -> PortResult<Option<WorkoutTemplate>> {
        self.find(LocalFile::Workouts, id).await
    }

    async fn list_workouts(&self, query: &ListQuery) -> PortResult<Vec<WorkoutTemplate>> {
        let items = self.load(LocalFile::Workouts).await?;
        Ok(listing::apply(Self::decode_all(LocalFile::Workouts, items), query))
    }

    async fn update_workout(
        &self,
        id: &str,
        patch: WorkoutPatch,
    ) -> PortResult<Option<WorkoutTemplate>> {
        patch.validate()?;
        self.modify(LocalFile::Workouts, id, |workout: &mut WorkoutTemplate| {
            patch.apply(workout);
            workout.modified_date = Utc::now();
            true
        })
        .await
    }

    async fn delete_workout(&self, id: &str) -> PortResult<bool> {
        self.remove(LocalFile::Workouts, id).await
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
        let program = Program::create(new, Utc::now());
        self.append(LocalFile::Programs, &program).await?;
        info!(id = %program.id, "Created local program");
        Ok(program)
    }

    async fn get_program(&self, id: &str) -> PortResult<Option<Program>> {
        self.find(LocalFile::Programs, id).await
    }

    async fn list_programs(&self, query: &ListQuery) -> PortResult<Vec<Program>> {
        let items = self.load(LocalFile::Programs).await?;
        Ok(listing::apply(Self::decode_all(LocalFile::Programs, items), query))
    }

    async fn update_program(&self, id: &str, patch: ProgramPatch) -> PortResult<Option<Program>> {
        patch.validate()?;
        self.modify(LocalFile::Programs, id, |program: &mut Program| {
            patch.apply(program);
            program.modified_date = Utc::now();
            true
        })
        .await
    }

    async fn delete_program(&self, id: &str) -> PortResult<bool> {
        self.remove(LocalFile::Programs, id).await
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
        if self.get_workout(&entry.workout_id).await?.is_none() {
            return Ok(None);
        }
        self.modify(LocalFile::Programs, program_id, |program: &mut Program| {
            program.insert_workout(entry, order_index);
            program.modified_date = Utc::now();
            true
        })
        .await
    }

    async fn remove_workout_from_program(
        &self,
        program_id: &str,
        workout_id: &str,
    ) -> PortResult<Option<Program>> {
        self.modify(LocalFile::Programs, program_id, |program: &mut Program| {
            if !program.remove_workout(workout_id) {
                return false;
            }
            program.modified_date = Utc::now();
            true
        })
        .await
    }

    async fn reorder_program_workouts(
        &self,
        program_id: &str,
        order: &[String],
    ) -> PortResult<Option<Program>> {
        self.modify(LocalFile::Programs, program_id, |program: &mut Program| {
            program.reorder_workouts(order);
            program.modified_date = Utc::now();
            true
        })
        .await
    }

    async fn get_program_with_workout_details(
        &self,
        program_id: &str,
    ) -> PortResult<Option<ProgramDetails>> {
        let Some(program) = self.get_program(program_id).await? else {
            return Ok(None);
        };
        let workouts: Vec<WorkoutTemplate> =
            Self::decode_all(LocalFile::Workouts, self.load(LocalFile::Workouts).await?);
        let workout_details = program
            .workouts
            .iter()
            .filter_map(|entry| workouts.iter().find(|w| w.id == entry.workout_id).cloned())
            .collect();
        Ok(Some(ProgramDetails {
            program,
            workout_details,
        }))
    }

    async fn stats(&self) -> PortResult<StoreStats> {
        Ok(StoreStats {
            total_workouts: self.load(LocalFile::Workouts).await?.len() as u64,
            total_programs: self.load(LocalFile::Programs).await?.len() as u64,
        })
    }
}

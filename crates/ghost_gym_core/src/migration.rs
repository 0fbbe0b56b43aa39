//! crates/ghost_gym_core/src/migration.rs
//!
//! One-time transfer of anonymous local data into an authenticated user's
//! remote account.
//!
//! `check_eligibility` gates everything: the remote store must be reachable,
//! the user must have no remote data yet and there must be something local
//! to move. `prepare` snapshots the local store and writes a backup before
//! anything remote is touched. `execute` mints fresh entities and commits
//! them in a single batch; items that fail to parse are reported, not fatal.
//! `rollback` only restores the local backup and never deletes remote data.

use crate::documents::{paths, to_document, FieldOp, FieldPath, WriteBatch};
use crate::domain::{
    Identity, ListQuery, NewProgram, NewWorkout, Program, SyncStatus, WorkoutTemplate,
};
use crate::local_store::LocalStore;
use crate::ports::{PortError, PortResult, WorkoutStore};
use crate::remote_store::RemoteBackend;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

const MIGRATION_DOC: &str = "migration";
const STRIPPED_FIELDS: [&str; 3] = ["id", "created_date", "modified_date"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityCounts {
    pub programs: usize,
    pub workouts: usize,
}

impl EntityCounts {
    pub fn total(&self) -> usize {
        self.programs + self.workouts
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationEligibility {
    pub eligible: bool,
    pub reason: String,
    pub local_data: EntityCounts,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud_data: Option<EntityCounts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_time: Option<String>,
}

impl MigrationEligibility {
    fn refused(reason: impl Into<String>, local_data: EntityCounts) -> Self {
        Self {
            eligible: false,
            reason: reason.into(),
            local_data,
            cloud_data: None,
            estimated_time: None,
        }
    }
}

/// Rough wall-clock bucket shown to the user before migrating.
pub fn estimate_migration_time(counts: EntityCounts) -> &'static str {
    match counts.total() {
        0..=10 => "< 10 seconds",
        11..=50 => "10-30 seconds",
        51..=100 => "30-60 seconds",
        _ => "1-2 minutes",
    }
}

/// The prepared state: raw local items plus the backup written for rollback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationPlan {
    pub workouts: Vec<Value>,
    pub programs: Vec<Value>,
    pub backup_key: String,
    pub prepared_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationOptions {
    #[serde(default)]
    pub clear_local_after_success: bool,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationReport {
    pub migrated_programs: usize,
    pub migrated_workouts: usize,
    pub errors: Vec<String>,
    pub migration_duration: f64,
    pub migration_timestamp: DateTime<Utc>,
    pub local_storage_cleared: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationState {
    Completed,
    PartialOrDuplicate,
    Pending,
    NoData,
}

impl MigrationState {
    fn classify(has_cloud: bool, has_local: bool) -> Self {
        match (has_cloud, has_local) {
            (true, false) => MigrationState::Completed,
            (true, true) => MigrationState::PartialOrDuplicate,
            (false, true) => MigrationState::Pending,
            (false, false) => MigrationState::NoData,
        }
    }

    pub fn recommendations(&self) -> Vec<String> {
        let lines: [&str; 2] = match self {
            MigrationState::Pending => [
                "You have local data that can be migrated to the cloud",
                "Migration will enable multi-device access and automatic backup",
            ],
            MigrationState::Completed => [
                "Migration completed successfully",
                "Your data is now synced across all devices",
            ],
            MigrationState::PartialOrDuplicate => [
                "You have data in both local and cloud storage",
                "Consider backing up local data before clearing it",
            ],
            MigrationState::NoData => [
                "No data found to migrate",
                "Start creating programs and workouts",
            ],
        };
        lines.iter().map(|s| s.to_string()).collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudCounts {
    pub programs: usize,
    pub workouts: usize,
    pub migrated_programs: usize,
    pub migrated_workouts: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationStatus {
    pub status: MigrationState,
    pub cloud_data: CloudCounts,
    pub local_data: EntityCounts,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackReport {
    pub restored_backup: Option<String>,
    pub message: String,
    pub warning: String,
    pub recommendation: String,
}

pub struct MigrationCoordinator {
    local: Arc<LocalStore>,
    remote: RemoteBackend,
}

/// Removes the source identity and timestamps so the item parses as a
/// creation request.
fn strip_identity(item: &Value) -> Value {
    let mut item = item.clone();
    if let Some(map) = item.as_object_mut() {
        for field in STRIPPED_FIELDS {
            map.remove(field);
        }
    }
    item
}

pub(crate) fn parse_workout(item: &Value) -> Result<NewWorkout, String> {
    let new: NewWorkout = serde_json::from_value(strip_identity(item)).map_err(|e| e.to_string())?;
    new.validate().map_err(|e| e.to_string())?;
    Ok(new)
}

pub(crate) fn parse_program(item: &Value) -> Result<NewProgram, String> {
    let new: NewProgram = serde_json::from_value(strip_identity(item)).map_err(|e| e.to_string())?;
    new.validate().map_err(|e| e.to_string())?;
    Ok(new)
}

impl MigrationCoordinator {
    pub fn new(local: Arc<LocalStore>, remote: RemoteBackend) -> Self {
        Self { local, remote }
    }

    async fn local_counts(&self) -> PortResult<EntityCounts> {
        let snapshot = self.local.snapshot().await?;
        Ok(EntityCounts {
            programs: snapshot.programs.len(),
            workouts: snapshot.workouts.len(),
        })
    }

    /// Never fails: store errors become an ineligible result with the reason.
    pub async fn check_eligibility(&self, identity: &Identity) -> MigrationEligibility {
        match self.try_check_eligibility(identity).await {
            Ok(eligibility) => eligibility,
            Err(e) => {
                error!(uid = %identity.uid, error = %e, "Failed to check migration eligibility");
                MigrationEligibility::refused(
                    format!("Error checking eligibility: {}", e),
                    EntityCounts::default(),
                )
            }
        }
    }

    async fn try_check_eligibility(&self, identity: &Identity) -> PortResult<MigrationEligibility> {
        if !self.remote.is_available() {
            return Ok(MigrationEligibility::refused(
                "Remote store not available",
                EntityCounts::default(),
            ));
        }
        let remote = self.remote.for_user(&identity.uid);
        if remote.has_any_data().await? {
            let stats = remote.stats().await?;
            let mut refused = MigrationEligibility::refused(
                "User already has data in cloud storage",
                EntityCounts::default(),
            );
            refused.cloud_data = Some(EntityCounts {
                programs: stats.total_programs as usize,
                workouts: stats.total_workouts as usize,
            });
            return Ok(refused);
        }
        let local_data = self.local_counts().await?;
        if local_data.total() == 0 {
            return Ok(MigrationEligibility::refused("No local data to migrate", local_data));
        }
        Ok(MigrationEligibility {
            eligible: true,
            reason: "Ready for migration".to_string(),
            local_data,
            cloud_data: None,
            estimated_time: Some(estimate_migration_time(local_data).to_string()),
        })
    }

    /// Snapshots local data and writes the rollback backup.
    pub async fn prepare(&self) -> PortResult<MigrationPlan> {
        let snapshot = self.local.snapshot().await?;
        let backup_key = self.local.backup().await?;
        info!(
            workouts = snapshot.workouts.len(),
            programs = snapshot.programs.len(),
            backup = %backup_key,
            "Prepared migration"
        );
        Ok(MigrationPlan {
            workouts: snapshot.workouts,
            programs: snapshot.programs,
            backup_key,
            prepared_at: Utc::now(),
        })
    }

    /// Writes every well-formed item of `plan` to the user's remote account
    /// in one batch. Malformed items are listed in `errors`.
    pub async fn execute(
        &self,
        identity: &Identity,
        plan: &MigrationPlan,
        options: &MigrationOptions,
    ) -> PortResult<MigrationReport> {
        let started = Utc::now();
        let eligibility = self.check_eligibility(identity).await;
        if !eligibility.eligible {
            return Err(PortError::Validation(format!(
                "Migration not eligible: {}",
                eligibility.reason
            )));
        }
        info!(
            uid = %identity.uid,
            workouts = plan.workouts.len(),
            programs = plan.programs.len(),
            "Starting migration"
        );

        let remote = self.remote.for_user(&identity.uid);
        let now = Utc::now();
        let mut batch = WriteBatch::new();
        let mut errors = Vec::new();
        let mut id_map: HashMap<String, String> = HashMap::new();
        let mut migrated_workouts = 0;
        let mut migrated_programs = 0;

        for item in &plan.workouts {
            let new = match parse_workout(item) {
                Ok(new) => new,
                Err(e) => {
                    warn!(uid = %identity.uid, error = %e, "Skipping workout during migration");
                    errors.push(format!("Workout migration error: {}", e));
                    continue;
                }
            };
            let mut workout = WorkoutTemplate::create(new, now);
            workout.migrated_at = Some(now);
            workout.version = Some(1);
            workout.sync_status = SyncStatus::Synced;
            if let Some(old_id) = item.get("id").and_then(Value::as_str) {
                id_map.insert(old_id.to_string(), workout.id.clone());
            }
            batch.set(remote.workout_path(&workout.id), to_document(&workout)?);
            migrated_workouts += 1;
        }

        for item in &plan.programs {
            let new = match parse_program(item) {
                Ok(new) => new,
                Err(e) => {
                    warn!(uid = %identity.uid, error = %e, "Skipping program during migration");
                    errors.push(format!("Program migration error: {}", e));
                    continue;
                }
            };
            let mut program = Program::create(new, now);
            program.remap_workout_ids(&id_map);
            program.migrated_at = Some(now);
            program.version = Some(1);
            program.sync_status = SyncStatus::Synced;
            batch.set(remote.program_path(&program.id), to_document(&program)?);
            migrated_programs += 1;
        }

        let mut profile = vec![
            FieldOp::set("uid", identity.uid.as_str()),
            FieldOp::Set(
                FieldPath::new(["stats", "totalWorkouts"]),
                Value::from(migrated_workouts),
            ),
            FieldOp::Set(
                FieldPath::new(["stats", "totalPrograms"]),
                Value::from(migrated_programs),
            ),
            FieldOp::Set(FieldPath::new(["stats", "lastMigration"]), Value::from(now.to_rfc3339())),
        ];
        if let Some(email) = &identity.email {
            profile.push(FieldOp::set("email", email.as_str()));
        }
        if let Some(name) = &options.display_name {
            profile.push(FieldOp::set("displayName", name.as_str()));
        }
        batch.update(paths::user(&identity.uid), profile);

        if let Err(e) = self.remote.database().commit(batch).await {
            error!(uid = %identity.uid, error = %e, "Migration batch failed");
            return Err(e);
        }

        let mut report = MigrationReport {
            migrated_programs,
            migrated_workouts,
            errors,
            migration_duration: 0.0,
            migration_timestamp: now,
            local_storage_cleared: false,
            backup_key: Some(plan.backup_key.clone()),
        };

        if options.clear_local_after_success {
            match self.local.clear().await {
                Ok(_) => report.local_storage_cleared = true,
                Err(e) => warn!(error = %e, "Failed to clear local storage after migration"),
            }
        }

        report.migration_duration =
            (Utc::now() - started).num_milliseconds().max(0) as f64 / 1000.0;
        self.record_outcome(identity, &report).await;
        info!(
            uid = %identity.uid,
            migrated_workouts,
            migrated_programs,
            errors = report.errors.len(),
            "Migration completed"
        );
        Ok(report)
    }

    /// Best-effort audit record at `users/{uid}/data/migration`.
    async fn record_outcome(&self, identity: &Identity, report: &MigrationReport) {
        let path = paths::user_data(&identity.uid, MIGRATION_DOC);
        let result = match to_document(report) {
            Ok(doc) => self.remote.database().set(&path, doc).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            warn!(uid = %identity.uid, error = %e, "Failed to record migration outcome");
        }
    }

    pub async fn status(&self, identity: &Identity) -> PortResult<MigrationStatus> {
        let remote = self.remote.for_user(&identity.uid);
        let workouts = remote.list_workouts(&ListQuery::all()).await?;
        let programs = remote.list_programs(&ListQuery::all()).await?;
        let local_data = EntityCounts {
            programs: self.local.list_programs(&ListQuery::all()).await?.len(),
            workouts: self.local.list_workouts(&ListQuery::all()).await?.len(),
        };
        let cloud_data = CloudCounts {
            programs: programs.len(),
            workouts: workouts.len(),
            migrated_programs: programs.iter().filter(|p| p.migrated_at.is_some()).count(),
            migrated_workouts: workouts.iter().filter(|w| w.migrated_at.is_some()).count(),
        };
        let status = MigrationState::classify(
            cloud_data.programs + cloud_data.workouts > 0,
            local_data.total() > 0,
        );
        Ok(MigrationStatus {
            status,
            cloud_data,
            local_data,
            recommendations: status.recommendations(),
        })
    }

    /// Restores the local store from `backup_key` when given. Remote data
    /// written by a previous migration is left in place.
    pub async fn rollback(
        &self,
        identity: &Identity,
        backup_key: Option<&str>,
    ) -> PortResult<RollbackReport> {
        warn!(uid = %identity.uid, backup = ?backup_key, "Migration rollback requested");
        if let Some(key) = backup_key {
            if !self.local.restore(key).await? {
                return Err(PortError::Validation(format!(
                    "Failed to restore from backup file {}",
                    key
                )));
            }
        }
        Ok(RollbackReport {
            restored_backup: backup_key.map(str::to_string),
            message: match backup_key {
                Some(_) => "Local data restored from backup".to_string(),
                None => "No backup given; local data left unchanged".to_string(),
            },
            warning: "Cloud data was not automatically deleted for safety".to_string(),
            recommendation: "Contact administrator if cloud data cleanup is needed".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn estimate_buckets_follow_item_totals() {
        let counts = |workouts| EntityCounts {
            programs: 0,
            workouts,
        };
        assert_eq!(estimate_migration_time(counts(10)), "< 10 seconds");
        assert_eq!(estimate_migration_time(counts(11)), "10-30 seconds");
        assert_eq!(estimate_migration_time(counts(100)), "30-60 seconds");
        assert_eq!(estimate_migration_time(counts(101)), "1-2 minutes");
    }

    #[test]
    fn parse_ignores_source_identity_and_requires_name() {
        let parsed = parse_workout(&json!({
            "id": "workout-old",
            "name": "Push Day",
            "created_date": "not a date",
            "version": 7
        }))
        .unwrap();
        assert_eq!(parsed.name, "Push Day");

        assert!(parse_workout(&json!({ "id": "workout-bad", "description": "x" })).is_err());
        assert!(parse_program(&json!({ "name": "  " })).is_err());
    }

    #[test]
    fn state_classification() {
        assert_eq!(MigrationState::classify(true, false), MigrationState::Completed);
        assert_eq!(MigrationState::classify(true, true), MigrationState::PartialOrDuplicate);
        assert_eq!(MigrationState::classify(false, true), MigrationState::Pending);
        assert_eq!(MigrationState::classify(false, false), MigrationState::NoData);
    }
}

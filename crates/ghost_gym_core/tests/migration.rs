mod common;

use async_trait::async_trait;
use common::{harness, push_day, user};
use ghost_gym_core::documents::{paths, DocPath, Document, DocumentSnapshot, FieldOp, Query, WriteBatch};
use ghost_gym_core::migration::{MigrationState, MigrationOptions};
use ghost_gym_core::{
    BlobStore, DocumentDatabase, ListQuery, MemoryDocumentDb, MigrationCoordinator, NewProgram,
    PortError, PortResult, ProgramWorkout, RemoteBackend, WorkoutStore,
};
use serde_json::json;
use std::sync::Arc;

fn coordinator(h: &common::Harness) -> MigrationCoordinator {
    MigrationCoordinator::new(h.local.clone(), h.remote.clone())
}

/// Serves reads and single writes from memory but rejects every batch.
struct RejectingBatches(Arc<MemoryDocumentDb>);

#[async_trait]
impl DocumentDatabase for RejectingBatches {
    fn is_available(&self) -> bool {
        true
    }

    async fn get(&self, path: &DocPath) -> PortResult<Option<Document>> {
        self.0.get(path).await
    }

    async fn set(&self, path: &DocPath, doc: Document) -> PortResult<()> {
        self.0.set(path, doc).await
    }

    async fn update(&self, path: &DocPath, ops: Vec<FieldOp>, upsert: bool) -> PortResult<bool> {
        self.0.update(path, ops, upsert).await
    }

    async fn delete(&self, path: &DocPath) -> PortResult<bool> {
        self.0.delete(path).await
    }

    async fn query(&self, collection: &str, query: &Query) -> PortResult<Vec<DocumentSnapshot>> {
        self.0.query(collection, query).await
    }

    async fn commit(&self, _batch: WriteBatch) -> PortResult<()> {
        Err(PortError::Unavailable("batch rejected".into()))
    }
}

#[tokio::test]
async fn malformed_items_are_reported_not_fatal() {
    let h = harness();
    let file = json!({
        "workouts": [
            {
                "id": "workout-local-1",
                "name": "Push Day",
                "exercise_groups": [{ "exercises": { "a": "Bench Press" }, "sets": "3", "reps": "8-12", "rest": "60s" }],
                "created_date": "2024-03-01T10:00:00Z",
                "modified_date": "2024-03-01T10:00:00Z"
            },
            { "id": "workout-local-2", "description": "missing a name" }
        ]
    });
    h.blobs
        .write("workouts.json", &serde_json::to_vec(&file).unwrap())
        .await
        .unwrap();

    let migration = coordinator(&h);
    let alice = user("alice");
    let eligibility = migration.check_eligibility(&alice).await;
    assert!(eligibility.eligible);
    assert_eq!(eligibility.local_data.workouts, 2);

    let plan = migration.prepare().await.unwrap();
    let report = migration
        .execute(&alice, &plan, &MigrationOptions::default())
        .await
        .unwrap();
    assert_eq!(report.migrated_workouts, 1);
    assert_eq!(report.migrated_programs, 0);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].starts_with("Workout migration error"));

    let remote = h.remote.for_user("alice");
    let workouts = remote.list_workouts(&ListQuery::all()).await.unwrap();
    assert_eq!(workouts.len(), 1);
    assert_ne!(workouts[0].id, "workout-local-1");
    assert!(workouts[0].migrated_at.is_some());
    assert_eq!(workouts[0].version, Some(1));
}

#[tokio::test]
async fn successful_migration_closes_eligibility() {
    let h = harness();
    let workout = h.local.create_workout(push_day()).await.unwrap();
    let program = h.local.create_program(NewProgram::new("Block")).await.unwrap();
    h.local
        .add_workout_to_program(&program.id, ProgramWorkout::new(&workout.id), None)
        .await
        .unwrap();

    let migration = coordinator(&h);
    let alice = user("alice");
    let plan = migration.prepare().await.unwrap();
    migration
        .execute(&alice, &plan, &MigrationOptions::default())
        .await
        .unwrap();

    let again = migration.check_eligibility(&alice).await;
    assert!(!again.eligible);
    assert_eq!(again.reason, "User already has data in cloud storage");
    assert_eq!(again.cloud_data.unwrap().workouts, 1);

    let second = migration.execute(&alice, &plan, &MigrationOptions::default()).await;
    assert!(matches!(second, Err(PortError::Validation(_))));

    // Program entries follow the freshly minted workout ids.
    let remote = h.remote.for_user("alice");
    let workouts = remote.list_workouts(&ListQuery::all()).await.unwrap();
    let programs = remote.list_programs(&ListQuery::all()).await.unwrap();
    assert_eq!(programs[0].workouts[0].workout_id, workouts[0].id);

    let record = h
        .db
        .get(&paths::user_data("alice", "migration"))
        .await
        .unwrap();
    assert!(record.is_some());

    let status = migration.status(&alice).await.unwrap();
    assert_eq!(status.status, MigrationState::PartialOrDuplicate);
    assert_eq!(status.cloud_data.migrated_workouts, 1);
    assert_eq!(status.cloud_data.migrated_programs, 1);
}

#[tokio::test]
async fn ineligible_without_local_data_or_remote() {
    let h = harness();
    let migration = coordinator(&h);
    let alice = user("alice");

    let empty = migration.check_eligibility(&alice).await;
    assert!(!empty.eligible);
    assert_eq!(empty.reason, "No local data to migrate");

    h.local.create_workout(push_day()).await.unwrap();
    h.db.set_available(false);
    let offline = migration.check_eligibility(&alice).await;
    assert!(!offline.eligible);
    assert_eq!(offline.reason, "Remote store not available");
}

#[tokio::test]
async fn clearing_local_data_after_success() {
    let h = harness();
    h.local.create_workout(push_day()).await.unwrap();
    let migration = coordinator(&h);
    let alice = user("alice");

    let plan = migration.prepare().await.unwrap();
    let options = MigrationOptions {
        clear_local_after_success: true,
        display_name: Some("Alice".into()),
    };
    let report = migration.execute(&alice, &plan, &options).await.unwrap();
    assert!(report.local_storage_cleared);
    assert!(h.local.snapshot().await.unwrap().is_empty());

    let status = migration.status(&alice).await.unwrap();
    assert_eq!(status.status, MigrationState::Completed);

    let profile = h.db.get(&paths::user("alice")).await.unwrap().unwrap();
    assert_eq!(profile["stats"]["totalWorkouts"], json!(1));
    assert_eq!(profile["displayName"], json!("Alice"));
}

#[tokio::test]
async fn rollback_restores_local_and_keeps_remote() {
    let h = harness();
    let workout = h.local.create_workout(push_day()).await.unwrap();
    let migration = coordinator(&h);
    let alice = user("alice");

    let plan = migration.prepare().await.unwrap();
    let options = MigrationOptions {
        clear_local_after_success: true,
        display_name: None,
    };
    migration.execute(&alice, &plan, &options).await.unwrap();
    assert!(h.local.get_workout(&workout.id).await.unwrap().is_none());

    let rollback = migration
        .rollback(&alice, Some(&plan.backup_key))
        .await
        .unwrap();
    assert_eq!(rollback.restored_backup.as_deref(), Some(plan.backup_key.as_str()));
    assert_eq!(rollback.warning, "Cloud data was not automatically deleted for safety");
    assert!(h.local.get_workout(&workout.id).await.unwrap().is_some());

    let remote = h.remote.for_user("alice");
    assert_eq!(remote.list_workouts(&ListQuery::all()).await.unwrap().len(), 1);

    let missing = migration.rollback(&alice, Some("backups/nope.json")).await;
    assert!(missing.is_err());
}

#[tokio::test]
async fn failed_batch_writes_nothing_and_stays_retryable() {
    let h = harness();
    h.local.create_workout(push_day()).await.unwrap();
    h.local
        .create_program(NewProgram::new("Strength Block"))
        .await
        .unwrap();

    let inner = Arc::new(MemoryDocumentDb::new());
    let remote = RemoteBackend::new(Arc::new(RejectingBatches(inner.clone())));
    let migration = MigrationCoordinator::new(h.local.clone(), remote);
    let alice = user("alice");

    let plan = migration.prepare().await.unwrap();
    let result = migration
        .execute(&alice, &plan, &MigrationOptions::default())
        .await;
    assert!(matches!(result, Err(PortError::Unavailable(_))));
    assert!(inner.is_empty().await);

    // Nothing landed remotely and local data is untouched, so the user can retry.
    assert!(migration.check_eligibility(&alice).await.eligible);
    assert!(h.local.list_backups().await.unwrap().contains(&plan.backup_key));
    assert_eq!(h.local.list_workouts(&ListQuery::all()).await.unwrap().len(), 1);
}

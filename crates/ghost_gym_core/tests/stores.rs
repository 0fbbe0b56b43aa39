//! The shared store contract, exercised against both the local and the
//! remote store.

mod common;

use chrono::Utc;
use common::{harness, push_day};
use ghost_gym_core::domain::{NewProgram, ProgramWorkout, SyncStatus};
use ghost_gym_core::{ListQuery, NewWorkout, PortError, WorkoutPatch, WorkoutStore};

fn order_indices(program: &ghost_gym_core::Program) -> Vec<usize> {
    program.workouts.iter().map(|w| w.order_index).collect()
}

fn workout_ids(program: &ghost_gym_core::Program) -> Vec<String> {
    program.workouts.iter().map(|w| w.workout_id.clone()).collect()
}

async fn create_assigns_id_and_matching_timestamps(store: &dyn WorkoutStore) {
    let before = Utc::now();
    let workout = store.create_workout(push_day()).await.unwrap();
    assert!(!workout.id.is_empty());
    assert!(workout.created_date >= before);
    assert!(workout.created_date <= Utc::now());
    assert_eq!(workout.modified_date, workout.created_date);
    assert_eq!(workout.exercise_groups[0].exercises["a"], "Bench Press");

    let fetched = store.get_workout(&workout.id).await.unwrap().unwrap();
    assert_eq!(fetched.id, workout.id);
    assert_eq!(fetched.name, "Push Day");
}

async fn appending_twice_numbers_from_zero(store: &dyn WorkoutStore) {
    let program = store.create_program(NewProgram::new("PPL")).await.unwrap();
    let first = store.create_workout(NewWorkout::new("Push")).await.unwrap();
    let second = store.create_workout(NewWorkout::new("Pull")).await.unwrap();

    store
        .add_workout_to_program(&program.id, ProgramWorkout::new(&first.id), None)
        .await
        .unwrap()
        .unwrap();
    let program = store
        .add_workout_to_program(&program.id, ProgramWorkout::new(&second.id), None)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(order_indices(&program), vec![0, 1]);
    assert_eq!(workout_ids(&program), vec![first.id, second.id]);
}

async fn removing_the_head_renumbers_the_rest(store: &dyn WorkoutStore) {
    let program = store.create_program(NewProgram::new("Full Body")).await.unwrap();
    let mut ids = Vec::new();
    for name in ["A", "B", "C"] {
        let workout = store.create_workout(NewWorkout::new(name)).await.unwrap();
        store
            .add_workout_to_program(&program.id, ProgramWorkout::new(&workout.id), None)
            .await
            .unwrap();
        ids.push(workout.id);
    }

    let program = store
        .remove_workout_from_program(&program.id, &ids[0])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order_indices(&program), vec![0, 1]);
    assert_eq!(workout_ids(&program), vec![ids[1].clone(), ids[2].clone()]);

    let missing = store
        .remove_workout_from_program(&program.id, "workout-unknown")
        .await
        .unwrap();
    assert!(missing.is_none());
}

async fn order_stays_contiguous_through_mixed_edits(store: &dyn WorkoutStore) {
    let program = store.create_program(NewProgram::new("Mixed")).await.unwrap();
    let mut ids = Vec::new();
    for name in ["W1", "W2", "W3", "W4"] {
        ids.push(store.create_workout(NewWorkout::new(name)).await.unwrap().id);
    }

    let check = |program: &ghost_gym_core::Program| {
        let expected: Vec<usize> = (0..program.workouts.len()).collect();
        assert_eq!(order_indices(program), expected);
    };

    let p = store
        .add_workout_to_program(&program.id, ProgramWorkout::new(&ids[0]), None)
        .await
        .unwrap()
        .unwrap();
    check(&p);
    let p = store
        .add_workout_to_program(&program.id, ProgramWorkout::new(&ids[1]), Some(0))
        .await
        .unwrap()
        .unwrap();
    check(&p);
    assert_eq!(workout_ids(&p), vec![ids[1].clone(), ids[0].clone()]);
    let p = store
        .add_workout_to_program(&program.id, ProgramWorkout::new(&ids[2]), Some(99))
        .await
        .unwrap()
        .unwrap();
    check(&p);
    let p = store
        .add_workout_to_program(&program.id, ProgramWorkout::new(&ids[3]), Some(1))
        .await
        .unwrap()
        .unwrap();
    check(&p);

    // Entries left out of the new order are dropped.
    let order = vec![ids[2].clone(), ids[0].clone(), ids[1].clone()];
    let p = store
        .reorder_program_workouts(&program.id, &order)
        .await
        .unwrap()
        .unwrap();
    check(&p);
    assert_eq!(workout_ids(&p), order);

    let p = store
        .remove_workout_from_program(&program.id, &ids[0])
        .await
        .unwrap()
        .unwrap();
    check(&p);
    assert_eq!(workout_ids(&p), vec![ids[2].clone(), ids[1].clone()]);
}

async fn duplicates_are_independent(store: &dyn WorkoutStore) {
    let original = store.create_workout(push_day()).await.unwrap();
    let copy = store
        .duplicate_workout(&original.id, "Push Day (Copy)")
        .await
        .unwrap()
        .unwrap();

    assert_ne!(copy.id, original.id);
    assert_eq!(copy.exercise_groups, original.exercise_groups);
    assert_eq!(copy.bonus_exercises, original.bonus_exercises);
    assert!(copy.tags.contains(&"duplicate".to_string()));

    let patch = WorkoutPatch {
        name: Some("Changed".into()),
        exercise_groups: Some(Vec::new()),
        ..WorkoutPatch::default()
    };
    store.update_workout(&copy.id, patch).await.unwrap().unwrap();

    let original_again = store.get_workout(&original.id).await.unwrap().unwrap();
    assert_eq!(original_again.name, "Push Day");
    assert_eq!(original_again.exercise_groups, original.exercise_groups);

    assert!(store.duplicate_workout("workout-missing", "x").await.unwrap().is_none());
}

async fn update_touches_only_present_fields(store: &dyn WorkoutStore) {
    let mut new = push_day();
    new.description = "Chest and triceps".into();
    let workout = store.create_workout(new).await.unwrap();

    let patch = WorkoutPatch {
        name: Some("Heavy Push".into()),
        ..WorkoutPatch::default()
    };
    let updated = store.update_workout(&workout.id, patch).await.unwrap().unwrap();
    assert_eq!(updated.name, "Heavy Push");
    assert_eq!(updated.description, "Chest and triceps");
    assert_eq!(updated.exercise_groups, workout.exercise_groups);
    assert!(updated.modified_date >= workout.modified_date);
    assert_eq!(updated.created_date, workout.created_date);

    let missing = store
        .update_workout("workout-missing", WorkoutPatch::default())
        .await
        .unwrap();
    assert!(missing.is_none());

    let invalid = WorkoutPatch {
        name: Some("   ".into()),
        ..WorkoutPatch::default()
    };
    assert!(matches!(
        store.update_workout(&workout.id, invalid).await,
        Err(PortError::Validation(_))
    ));
}

async fn delete_leaves_dangling_references_filtered(store: &dyn WorkoutStore) {
    let kept = store.create_workout(NewWorkout::new("Kept")).await.unwrap();
    let gone = store.create_workout(NewWorkout::new("Gone")).await.unwrap();
    let program = store.create_program(NewProgram::new("Refs")).await.unwrap();
    for id in [&kept.id, &gone.id] {
        store
            .add_workout_to_program(&program.id, ProgramWorkout::new(id), None)
            .await
            .unwrap();
    }

    assert!(store.delete_workout(&gone.id).await.unwrap());
    assert!(!store.delete_workout(&gone.id).await.unwrap());

    let details = store
        .get_program_with_workout_details(&program.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(details.program.workouts.len(), 2);
    assert_eq!(details.workout_details.len(), 1);
    assert_eq!(details.workout_details[0].id, kept.id);
}

async fn listing_searches_and_paginates(store: &dyn WorkoutStore) {
    for name in ["Leg Day", "Arm Day", "Leg Blaster", "Core"] {
        store.create_workout(NewWorkout::new(name)).await.unwrap();
    }
    let legs = store
        .list_workouts(&ListQuery::all().with_search("leg"))
        .await
        .unwrap();
    assert_eq!(legs.len(), 2);

    let first = store.list_workouts(&ListQuery::page(1, 3)).await.unwrap();
    let second = store.list_workouts(&ListQuery::page(2, 3)).await.unwrap();
    assert_eq!(first.len(), 3);
    assert_eq!(second.len(), 1);
    assert!(first[0].modified_date >= first[1].modified_date);
}

async fn add_requires_existing_workout(store: &dyn WorkoutStore) {
    let program = store.create_program(NewProgram::new("Strict")).await.unwrap();
    let result = store
        .add_workout_to_program(&program.id, ProgramWorkout::new("workout-nope"), None)
        .await
        .unwrap();
    assert!(result.is_none());
}

macro_rules! contract_tests {
    ($($name:ident),* $(,)?) => {
        mod local {
            use super::*;
            $(
                #[tokio::test]
                async fn $name() {
                    let h = harness();
                    super::$name(h.local.as_ref()).await;
                }
            )*
        }

        mod remote {
            use super::*;
            $(
                #[tokio::test]
                async fn $name() {
                    let h = harness();
                    let store = h.remote.for_user("user-1");
                    super::$name(&store).await;
                }
            )*
        }
    };
}

contract_tests!(
    create_assigns_id_and_matching_timestamps,
    appending_twice_numbers_from_zero,
    removing_the_head_renumbers_the_rest,
    order_stays_contiguous_through_mixed_edits,
    duplicates_are_independent,
    update_touches_only_present_fields,
    delete_leaves_dangling_references_filtered,
    listing_searches_and_paginates,
    add_requires_existing_workout,
);

#[tokio::test]
async fn remote_store_versions_and_counts() {
    let h = harness();
    let store = h.remote.for_user("user-1");

    let workout = store.create_workout(push_day()).await.unwrap();
    assert_eq!(workout.version, Some(1));
    assert_eq!(workout.sync_status, SyncStatus::Synced);

    let patch = WorkoutPatch {
        description: Some("v2".into()),
        ..WorkoutPatch::default()
    };
    let updated = store.update_workout(&workout.id, patch).await.unwrap().unwrap();
    assert_eq!(updated.version, Some(2));

    store.create_program(NewProgram::new("P")).await.unwrap();
    let stats = store.stats().await.unwrap();
    assert_eq!(stats.total_workouts, 1);
    assert_eq!(stats.total_programs, 1);

    store.delete_workout(&workout.id).await.unwrap();
    store.delete_workout(&workout.id).await.unwrap();
    let stats = store.stats().await.unwrap();
    assert_eq!(stats.total_workouts, 0);
}

#[tokio::test]
async fn remote_users_are_isolated() {
    let h = harness();
    let alice = h.remote.for_user("alice");
    let bob = h.remote.for_user("bob");

    let workout = alice.create_workout(push_day()).await.unwrap();
    assert!(bob.get_workout(&workout.id).await.unwrap().is_none());
    assert!(bob.list_workouts(&ListQuery::all()).await.unwrap().is_empty());
    assert!(!bob.has_any_data().await.unwrap());
    assert!(alice.has_any_data().await.unwrap());
}

#[tokio::test]
async fn local_backup_restore_and_clear() {
    let h = harness();
    let workout = h.local.create_workout(push_day()).await.unwrap();
    let key = h.local.backup().await.unwrap();
    assert!(key.starts_with("backups/gym_data_backup_"));

    h.local.delete_workout(&workout.id).await.unwrap();
    assert!(h.local.get_workout(&workout.id).await.unwrap().is_none());

    assert!(h.local.restore(&key).await.unwrap());
    assert!(h.local.get_workout(&workout.id).await.unwrap().is_some());
    assert!(!h.local.restore("backups/missing.json").await.unwrap());

    let clear_backup = h.local.clear().await.unwrap();
    assert!(h.local.snapshot().await.unwrap().is_empty());
    let backups = h.local.list_backups().await.unwrap();
    assert!(backups.contains(&key));
    assert!(backups.contains(&clear_backup));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn clear_never_drops_a_concurrent_write() {
    use ghost_gym_core::BlobStore;

    for _ in 0..20 {
        let h = harness();
        let local = h.local.clone();
        let writer = tokio::spawn(async move { local.create_workout(push_day()).await });
        let backup = h.local.clear().await.unwrap();
        let workout = writer.await.unwrap().unwrap();

        let live = h.local.get_workout(&workout.id).await.unwrap().is_some();
        let bytes = h.blobs.read(&backup).await.unwrap().unwrap();
        let saved: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        let backed_up = saved["workouts"]
            .as_array()
            .unwrap()
            .iter()
            .any(|w| w["id"] == workout.id.as_str());
        assert!(live || backed_up, "workout {} was lost by clear", workout.id);
    }
}

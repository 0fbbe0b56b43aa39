use backend_lib::adapters::{NoIdentityProvider, OfflineDocumentDb};
use backend_lib::config::Config;
use backend_lib::error::ApiError;
use backend_lib::state::AppState;
use ghost_gym_core::catalog::DEFAULT_CANDIDATE_CAP;
use ghost_gym_core::domain::{ExerciseGroup, Identity, ListQuery, NewWorkout};
use ghost_gym_core::local_store::WORKOUTS_KEY;
use ghost_gym_core::router::Backend;
use ghost_gym_core::{MemoryDocumentDb, PortError, WorkoutStore};
use std::path::Path;
use std::sync::Arc;
use tracing::Level;

fn config(data_dir: &Path) -> Config {
    Config {
        data_dir: data_dir.to_path_buf(),
        database_url: None,
        database_max_connections: 1,
        log_level: Level::INFO,
        search_candidate_cap: DEFAULT_CANDIDATE_CAP,
    }
}

fn leg_day() -> NewWorkout {
    NewWorkout::new("Leg Day").with_group(ExerciseGroup::new([("a", "Back Squat")]))
}

#[tokio::test]
async fn offline_state_keeps_everyone_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let state = AppState::assemble(
        config(dir.path()),
        Arc::new(OfflineDocumentDb),
        Arc::new(NoIdentityProvider),
    );

    assert!(state.authenticate(None).await.unwrap().is_none());
    assert!(matches!(
        state.authenticate(Some("stale-token")).await,
        Err(ApiError::Port(PortError::Unauthorized))
    ));

    // Even a known user is served locally while the remote store is offline.
    let lifter = Identity::new("lifter");
    assert_eq!(state.router.status(Some(&lifter)).backend, Backend::Local);
    let workout = state.router.create_workout(Some(&lifter), leg_day()).await.unwrap();

    assert!(dir.path().join(WORKOUTS_KEY).exists());
    let listed = state.local.list_workouts(&ListQuery::all()).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, workout.id);

    let eligibility = state.migration.check_eligibility(&lifter).await;
    assert!(!eligibility.eligible);
}

#[tokio::test]
async fn online_state_migrates_local_workouts() {
    let dir = tempfile::tempdir().unwrap();
    let state = AppState::assemble(
        config(dir.path()),
        Arc::new(MemoryDocumentDb::new()),
        Arc::new(NoIdentityProvider),
    );

    state.router.create_workout(None, leg_day()).await.unwrap();
    let lifter = Identity::new("lifter");
    assert!(state.migration.check_eligibility(&lifter).await.eligible);

    let plan = state.migration.prepare().await.unwrap();
    let report = state
        .migration
        .execute(&lifter, &plan, &Default::default())
        .await
        .unwrap();
    assert_eq!(report.migrated_workouts, 1);
    assert!(report.errors.is_empty());
    assert_eq!(state.local.list_backups().await.unwrap().len(), 1);

    let stats = state.router.stats(Some(&lifter)).await.unwrap();
    assert_eq!(stats.total_workouts, 1);
}

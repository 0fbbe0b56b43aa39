#![allow(dead_code)]

use ghost_gym_core::domain::{ExerciseGroup, NewWorkout};
use ghost_gym_core::{
    Identity, LocalStore, MemoryBlobStore, MemoryDocumentDb, RemoteBackend, UnifiedRouter,
};
use std::sync::Arc;

pub struct Harness {
    pub blobs: Arc<MemoryBlobStore>,
    pub db: Arc<MemoryDocumentDb>,
    pub local: Arc<LocalStore>,
    pub remote: RemoteBackend,
    pub router: UnifiedRouter,
}

pub fn harness() -> Harness {
    let blobs = Arc::new(MemoryBlobStore::new());
    let db = Arc::new(MemoryDocumentDb::new());
    let local = Arc::new(LocalStore::new(blobs.clone()));
    let remote = RemoteBackend::new(db.clone());
    let router = UnifiedRouter::new(local.clone(), remote.clone());
    Harness {
        blobs,
        db,
        local,
        remote,
        router,
    }
}

pub fn user(uid: &str) -> Identity {
    Identity {
        uid: uid.to_string(),
        email: Some(format!("{}@example.com", uid)),
    }
}

pub fn push_day() -> NewWorkout {
    let mut group = ExerciseGroup::new([("a", "Bench Press")]);
    group.sets = "3".into();
    group.reps = "8-12".into();
    group.rest = "60s".into();
    NewWorkout::new("Push Day").with_group(group)
}

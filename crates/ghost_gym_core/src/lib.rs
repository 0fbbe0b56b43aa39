pub mod catalog;
pub mod documents;
pub mod domain;
pub mod favorites;
pub mod listing;
pub mod local_store;
pub mod memory;
pub mod migration;
pub mod ports;
pub mod ranking;
pub mod remote_store;
pub mod router;
pub mod sessions;

pub use catalog::{ExerciseCatalog, ExerciseFilters, ExercisePage, ExerciseSearch};
pub use domain::{
    Exercise, ExerciseHistory, Identity, ListQuery, NewProgram, NewWorkout, Program,
    ProgramPatch, ProgramWorkout, StoreStats, WorkoutPatch, WorkoutSession, WorkoutTemplate,
};
pub use favorites::FavoritesIndex;
pub use local_store::LocalStore;
pub use memory::{MemoryBlobStore, MemoryDocumentDb};
pub use migration::{MigrationCoordinator, MigrationOptions, MigrationPlan, MigrationReport};
pub use ports::{BlobStore, DocumentDatabase, IdentityProvider, PortError, PortResult, WorkoutStore};
pub use remote_store::{RemoteBackend, RemoteStore};
pub use router::UnifiedRouter;
pub use sessions::SessionLog;

//! crates/ghost_gym_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the concrete blob store, document database and identity provider.

use crate::documents::{DocPath, Document, DocumentSnapshot, FieldOp, Query, WriteBatch};
use crate::domain::{
    Identity, ListQuery, NewProgram, NewWorkout, Program, ProgramDetails, ProgramPatch,
    ProgramWorkout, StoreStats, ValidationError, WorkoutPatch, WorkoutTemplate,
};
use async_trait::async_trait;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// A missing entity is never an error: lookups return `Option` and deletes `bool`.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

impl From<ValidationError> for PortError {
    fn from(err: ValidationError) -> Self {
        PortError::Validation(err.to_string())
    }
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Storage Ports (Traits)
//=========================================================================================

/// Byte storage keyed by relative path, backing the local store.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// `None` when the key has never been written.
    async fn read(&self, key: &str) -> PortResult<Option<Vec<u8>>>;

    async fn write(&self, key: &str, bytes: &[u8]) -> PortResult<()>;

    /// Keys starting with `prefix`, sorted.
    async fn list(&self, prefix: &str) -> PortResult<Vec<String>>;
}

/// A collection/document database with single-document atomic updates and
/// atomic multi-document batches.
#[async_trait]
pub trait DocumentDatabase: Send + Sync {
    /// Whether the backend is configured and reachable. Callers still handle
    /// `PortError::Unavailable` from individual operations.
    fn is_available(&self) -> bool;

    async fn get(&self, path: &DocPath) -> PortResult<Option<Document>>;

    async fn set(&self, path: &DocPath, doc: Document) -> PortResult<()>;

    /// Applies `ops` atomically. Returns false when the document is missing
    /// and `upsert` is off; with `upsert` a missing document starts empty.
    async fn update(&self, path: &DocPath, ops: Vec<FieldOp>, upsert: bool) -> PortResult<bool>;

    async fn delete(&self, path: &DocPath) -> PortResult<bool>;

    async fn query(&self, collection: &str, query: &Query) -> PortResult<Vec<DocumentSnapshot>>;

    /// All writes land or none do.
    async fn commit(&self, batch: WriteBatch) -> PortResult<()>;
}

/// The uniform workout/program contract shared by the local and remote stores.
#[async_trait]
pub trait WorkoutStore: Send + Sync {
    // --- Workouts ---
    async fn create_workout(&self, new: NewWorkout) -> PortResult<WorkoutTemplate>;

    async fn get_workout(&self, id: &str) -> PortResult<Option<WorkoutTemplate>>;

    async fn list_workouts(&self, query: &ListQuery) -> PortResult<Vec<WorkoutTemplate>>;

    /// Applies only the present fields and bumps `modified_date`.
    async fn update_workout(
        &self,
        id: &str,
        patch: WorkoutPatch,
    ) -> PortResult<Option<WorkoutTemplate>>;

    async fn delete_workout(&self, id: &str) -> PortResult<bool>;

    async fn duplicate_workout(
        &self,
        id: &str,
        new_name: &str,
    ) -> PortResult<Option<WorkoutTemplate>>;

    // --- Programs ---
    async fn create_program(&self, new: NewProgram) -> PortResult<Program>;

    async fn get_program(&self, id: &str) -> PortResult<Option<Program>>;

    async fn list_programs(&self, query: &ListQuery) -> PortResult<Vec<Program>>;

    async fn update_program(&self, id: &str, patch: ProgramPatch) -> PortResult<Option<Program>>;

    async fn delete_program(&self, id: &str) -> PortResult<bool>;

    async fn duplicate_program(&self, id: &str, new_name: &str) -> PortResult<Option<Program>>;

    // --- Program / workout associations ---

    /// Inserts `entry` at `order_index` (end when `None`). `None` if either
    /// the program or the referenced workout does not exist.
    async fn add_workout_to_program(
        &self,
        program_id: &str,
        entry: ProgramWorkout,
        order_index: Option<usize>,
    ) -> PortResult<Option<Program>>;

    async fn remove_workout_from_program(
        &self,
        program_id: &str,
        workout_id: &str,
    ) -> PortResult<Option<Program>>;

    async fn reorder_program_workouts(
        &self,
        program_id: &str,
        order: &[String],
    ) -> PortResult<Option<Program>>;

    async fn get_program_with_workout_details(
        &self,
        program_id: &str,
    ) -> PortResult<Option<ProgramDetails>>;

    async fn stats(&self) -> PortResult<StoreStats>;
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolves an opaque bearer token. `None` for unknown or expired tokens.
    async fn verify(&self, token: &str) -> PortResult<Option<Identity>>;
}

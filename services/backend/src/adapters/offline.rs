//! services/backend/src/adapters/offline.rs
//!
//! Stand-in document store for deployments without `DATABASE_URL`. It
//! reports itself unavailable, so the router keeps every caller on the local
//! store and migration eligibility is always refused.

use async_trait::async_trait;
use ghost_gym_core::documents::{DocPath, Document, DocumentSnapshot, FieldOp, Query, WriteBatch};
use ghost_gym_core::ports::{DocumentDatabase, PortError, PortResult};

pub struct OfflineDocumentDb;

fn offline<T>() -> PortResult<T> {
    Err(PortError::Unavailable("no remote document store is configured".into()))
}

#[async_trait]
impl DocumentDatabase for OfflineDocumentDb {
    fn is_available(&self) -> bool {
        false
    }

    async fn get(&self, _path: &DocPath) -> PortResult<Option<Document>> {
        offline()
    }

    async fn set(&self, _path: &DocPath, _doc: Document) -> PortResult<()> {
        offline()
    }

    async fn update(&self, _path: &DocPath, _ops: Vec<FieldOp>, _upsert: bool) -> PortResult<bool> {
        offline()
    }

    async fn delete(&self, _path: &DocPath) -> PortResult<bool> {
        offline()
    }

    async fn query(&self, _collection: &str, _query: &Query) -> PortResult<Vec<DocumentSnapshot>> {
        offline()
    }

    async fn commit(&self, _batch: WriteBatch) -> PortResult<()> {
        offline()
    }
}

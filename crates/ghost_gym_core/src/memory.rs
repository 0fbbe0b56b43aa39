//! crates/ghost_gym_core/src/memory.rs
//!
//! In-process implementations of the storage ports. Used by the test suites
//! and by the admin tool when no database is configured.

use crate::documents::{
    apply_ops, DocPath, Document, DocumentSnapshot, FieldOp, Query, Write, WriteBatch,
};
use crate::ports::{BlobStore, DocumentDatabase, PortError, PortResult};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn read(&self, key: &str) -> PortResult<Option<Vec<u8>>> {
        Ok(self.blobs.read().await.get(key).cloned())
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> PortResult<()> {
        self.blobs.write().await.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn list(&self, prefix: &str) -> PortResult<Vec<String>> {
        Ok(self
            .blobs
            .read()
            .await
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

/// A document database held in a single map. Every operation takes the
/// write lock, which makes updates and batches atomic.
#[derive(Debug)]
pub struct MemoryDocumentDb {
    docs: RwLock<BTreeMap<DocPath, Document>>,
    available: AtomicBool,
}

impl Default for MemoryDocumentDb {
    fn default() -> Self {
        Self {
            docs: RwLock::new(BTreeMap::new()),
            available: AtomicBool::new(true),
        }
    }
}

impl MemoryDocumentDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates an outage: `is_available` reports false and every
    /// operation fails with `PortError::Unavailable`.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.docs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.docs.read().await.is_empty()
    }

    fn ensure_available(&self) -> PortResult<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(PortError::Unavailable("in-memory document store is offline".into()))
        }
    }
}

#[async_trait]
impl DocumentDatabase for MemoryDocumentDb {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn get(&self, path: &DocPath) -> PortResult<Option<Document>> {
        self.ensure_available()?;
        Ok(self.docs.read().await.get(path).cloned())
    }

    async fn set(&self, path: &DocPath, doc: Document) -> PortResult<()> {
        self.ensure_available()?;
        self.docs.write().await.insert(path.clone(), doc);
        Ok(())
    }

    async fn update(&self, path: &DocPath, ops: Vec<FieldOp>, upsert: bool) -> PortResult<bool> {
        self.ensure_available()?;
        let mut docs = self.docs.write().await;
        match docs.get_mut(path) {
            Some(doc) => apply_ops(doc, &ops),
            None if upsert => {
                let mut doc = Document::new();
                apply_ops(&mut doc, &ops);
                docs.insert(path.clone(), doc);
            }
            None => return Ok(false),
        }
        Ok(true)
    }

    async fn delete(&self, path: &DocPath) -> PortResult<bool> {
        self.ensure_available()?;
        Ok(self.docs.write().await.remove(path).is_some())
    }

    async fn query(&self, collection: &str, query: &Query) -> PortResult<Vec<DocumentSnapshot>> {
        self.ensure_available()?;
        let candidates = self
            .docs
            .read()
            .await
            .iter()
            .filter(|(path, _)| path.collection == collection)
            .map(|(path, data)| DocumentSnapshot {
                id: path.id.clone(),
                data: data.clone(),
            })
            .collect();
        Ok(query.evaluate(candidates))
    }

    async fn commit(&self, batch: WriteBatch) -> PortResult<()> {
        self.ensure_available()?;
        let mut docs = self.docs.write().await;
        for write in batch.writes {
            match write {
                Write::Set(path, doc) => {
                    docs.insert(path, doc);
                }
                Write::Update(path, ops) => {
                    apply_ops(docs.entry(path).or_default(), &ops);
                }
                Write::Delete(path) => {
                    docs.remove(&path);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::Filter;
    use serde_json::json;

    #[tokio::test]
    async fn update_without_upsert_reports_missing() {
        let db = MemoryDocumentDb::new();
        let path = DocPath::new("users", "u1");
        let applied = db
            .update(&path, vec![FieldOp::increment("stats.totalWorkouts", 1)], false)
            .await
            .unwrap();
        assert!(!applied);
        assert!(db.get(&path).await.unwrap().is_none());

        assert!(db
            .update(&path, vec![FieldOp::increment("stats.totalWorkouts", 1)], true)
            .await
            .unwrap());
        let doc = db.get(&path).await.unwrap().unwrap();
        assert_eq!(doc["stats"]["totalWorkouts"], json!(1));
    }

    #[tokio::test]
    async fn query_is_scoped_to_collection() {
        let db = MemoryDocumentDb::new();
        let mut doc = Document::new();
        doc.insert("tags".into(), json!(["push"]));
        db.set(&DocPath::new("users/u1/workouts", "a"), doc.clone()).await.unwrap();
        db.set(&DocPath::new("users/u2/workouts", "b"), doc).await.unwrap();

        let query = Query::new().filter(Filter::ArrayContains("tags".into(), json!("push")));
        let hits = db.query("users/u1/workouts", &query).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "a");
    }

    #[tokio::test]
    async fn offline_store_rejects_operations() {
        let db = MemoryDocumentDb::new();
        db.set_available(false);
        assert!(!db.is_available());
        let err = db.get(&DocPath::new("users", "u1")).await.unwrap_err();
        assert!(matches!(err, PortError::Unavailable(_)));
    }

    #[tokio::test]
    async fn blob_list_filters_by_prefix() {
        let blobs = MemoryBlobStore::new();
        blobs.write("backups/one.json", b"{}").await.unwrap();
        blobs.write("workouts.json", b"{}").await.unwrap();
        assert_eq!(blobs.list("backups/").await.unwrap(), vec!["backups/one.json"]);
    }
}

//! services/backend/src/adapters/pg_documents.rs
//!
//! The remote document store on PostgreSQL. Every document is one JSONB row
//! in `documents`, keyed by `(collection, doc_id)`. Field operations run
//! inside a transaction holding the row lock, so single-document updates and
//! batches are atomic the same way they are in a hosted document database.

use async_trait::async_trait;
use ghost_gym_core::documents::{
    apply_ops, DocPath, Document, DocumentSnapshot, FieldOp, Filter, Query, Write, WriteBatch,
};
use ghost_gym_core::ports::{DocumentDatabase, PortError, PortResult};
use serde_json::{Map, Value};
use sqlx::types::Json;
use sqlx::{FromRow, PgConnection, PgPool};
use tracing::{debug, error};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

#[derive(Clone)]
pub struct PgDocumentDb {
    pool: PgPool,
}

impl PgDocumentDb {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs the embedded schema migrations.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct DocumentRecord {
    doc_id: String,
    data: Json<Value>,
}

impl DocumentRecord {
    fn to_domain(self) -> DocumentSnapshot {
        DocumentSnapshot {
            id: self.doc_id,
            data: into_document(self.data.0),
        }
    }
}

fn into_document(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Connection-level failures mean the store is unreachable; everything else
/// is a genuine fault.
fn db_error(e: sqlx::Error) -> PortError {
    match e {
        sqlx::Error::Io(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Tls(_) => PortError::Unavailable(e.to_string()),
        other => {
            error!(error = %other, "Document store query failed");
            PortError::Unexpected(other.to_string())
        }
    }
}

/// Places `leaf` at `segments`, keeping whatever an earlier filter put there.
fn insert_leaf(target: &mut Map<String, Value>, segments: &[String], leaf: Value) {
    let Some((first, rest)) = segments.split_first() else {
        return;
    };
    if rest.is_empty() {
        target.entry(first.clone()).or_insert(leaf);
        return;
    }
    let entry = target
        .entry(first.clone())
        .or_insert_with(|| Value::Object(Map::new()));
    if let Value::Object(next) = entry {
        insert_leaf(next, rest, leaf);
    }
}

/// A JSON object that every document matching the equality and
/// array-contains filters of `query` contains (`@>`). Used only to narrow
/// the rows fetched; the full query is evaluated afterwards.
pub(crate) fn containment(query: &Query) -> Option<Value> {
    let mut root = Map::new();
    for filter in &query.filters {
        let (path, leaf) = match filter {
            Filter::Eq(path, value) => (path, value.clone()),
            Filter::ArrayContains(path, value) => (path, Value::Array(vec![value.clone()])),
            Filter::ArrayContainsAny(..) => continue,
        };
        insert_leaf(&mut root, path.segments(), leaf);
    }
    (!root.is_empty()).then_some(Value::Object(root))
}

async fn upsert(conn: &mut PgConnection, path: &DocPath, doc: Document) -> PortResult<()> {
    sqlx::query(
        "INSERT INTO documents (collection, doc_id, data, updated_at) VALUES ($1, $2, $3, now()) \
         ON CONFLICT (collection, doc_id) DO UPDATE SET data = EXCLUDED.data, updated_at = now()",
    )
    .bind(&path.collection)
    .bind(&path.id)
    .bind(Json(Value::Object(doc)))
    .execute(conn)
    .await
    .map_err(db_error)?;
    Ok(())
}

async fn lock_for_update(conn: &mut PgConnection, path: &DocPath) -> PortResult<Option<Document>> {
    let row: Option<(Json<Value>,)> = sqlx::query_as(
        "SELECT data FROM documents WHERE collection = $1 AND doc_id = $2 FOR UPDATE",
    )
    .bind(&path.collection)
    .bind(&path.id)
    .fetch_optional(conn)
    .await
    .map_err(db_error)?;
    Ok(row.map(|(data,)| into_document(data.0)))
}

/// Read-modify-write of one document on an open transaction.
async fn apply_update(
    conn: &mut PgConnection,
    path: &DocPath,
    ops: &[FieldOp],
    upsert_missing: bool,
) -> PortResult<bool> {
    if upsert_missing {
        // A missing row cannot be locked; create it empty so concurrent
        // upserts serialize on the same row lock.
        sqlx::query(
            "INSERT INTO documents (collection, doc_id, data, updated_at) \
             VALUES ($1, $2, '{}'::jsonb, now()) ON CONFLICT (collection, doc_id) DO NOTHING",
        )
        .bind(&path.collection)
        .bind(&path.id)
        .execute(&mut *conn)
        .await
        .map_err(db_error)?;
    }
    let Some(mut doc) = lock_for_update(&mut *conn, path).await? else {
        return Ok(false);
    };
    apply_ops(&mut doc, ops);
    upsert(conn, path, doc).await?;
    Ok(true)
}

//=========================================================================================
// `DocumentDatabase` Trait Implementation
//=========================================================================================

#[async_trait]
impl DocumentDatabase for PgDocumentDb {
    fn is_available(&self) -> bool {
        !self.pool.is_closed()
    }

    async fn get(&self, path: &DocPath) -> PortResult<Option<Document>> {
        let record = sqlx::query_as::<_, DocumentRecord>(
            "SELECT doc_id, data FROM documents WHERE collection = $1 AND doc_id = $2",
        )
        .bind(&path.collection)
        .bind(&path.id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(record.map(|r| r.to_domain().data))
    }

    async fn set(&self, path: &DocPath, doc: Document) -> PortResult<()> {
        let mut conn = self.pool.acquire().await.map_err(db_error)?;
        upsert(&mut conn, path, doc).await
    }

    async fn update(&self, path: &DocPath, ops: Vec<FieldOp>, upsert: bool) -> PortResult<bool> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let updated = apply_update(&mut tx, path, &ops, upsert).await?;
        tx.commit().await.map_err(db_error)?;
        Ok(updated)
    }

    async fn delete(&self, path: &DocPath) -> PortResult<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND doc_id = $2")
            .bind(&path.collection)
            .bind(&path.id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn query(&self, collection: &str, query: &Query) -> PortResult<Vec<DocumentSnapshot>> {
        let records = match containment(query) {
            Some(filter) => {
                sqlx::query_as::<_, DocumentRecord>(
                    "SELECT doc_id, data FROM documents WHERE collection = $1 AND data @> $2 \
                     ORDER BY doc_id",
                )
                .bind(collection)
                .bind(Json(filter))
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, DocumentRecord>(
                    "SELECT doc_id, data FROM documents WHERE collection = $1 ORDER BY doc_id",
                )
                .bind(collection)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(db_error)?;
        debug!(collection, rows = records.len(), "Fetched candidate documents");
        Ok(query.evaluate(records.into_iter().map(DocumentRecord::to_domain).collect()))
    }

    async fn commit(&self, batch: WriteBatch) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        for write in batch.writes {
            match write {
                Write::Set(path, doc) => upsert(&mut tx, &path, doc).await?,
                Write::Update(path, ops) => {
                    apply_update(&mut tx, &path, &ops, true).await?;
                }
                Write::Delete(path) => {
                    sqlx::query("DELETE FROM documents WHERE collection = $1 AND doc_id = $2")
                        .bind(&path.collection)
                        .bind(&path.id)
                        .execute(&mut *tx)
                        .await
                        .map_err(db_error)?;
                }
            }
        }
        tx.commit().await.map_err(db_error)
    }
}

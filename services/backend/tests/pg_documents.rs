//! Runs only when `TEST_DATABASE_URL` points at a scratch Postgres database.

use backend_lib::adapters::PgDocumentDb;
use ghost_gym_core::documents::{DocPath, FieldOp};
use ghost_gym_core::DocumentDatabase;
use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use uuid::Uuid;

async fn connect() -> Option<PgDocumentDb> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect(&url)
        .await
        .unwrap();
    let db = PgDocumentDb::new(pool);
    db.run_migrations().await.unwrap();
    Some(db)
}

#[tokio::test]
async fn concurrent_upserts_on_a_new_document_all_apply() {
    let Some(db) = connect().await else {
        eprintln!("TEST_DATABASE_URL is not set; skipping");
        return;
    };
    let db = Arc::new(db);
    let path = DocPath::new(format!("users/{}/data", Uuid::new_v4()), "favorites");

    let writers: Vec<_> = (0..8)
        .map(|i| {
            let db = db.clone();
            let path = path.clone();
            tokio::spawn(async move {
                db.update(
                    &path,
                    vec![
                        FieldOp::increment("count", 1),
                        FieldOp::ArrayUnion("exerciseIds".into(), vec![json!(format!("ex-{}", i))]),
                    ],
                    true,
                )
                .await
            })
        })
        .collect();
    for writer in writers {
        assert!(writer.await.unwrap().unwrap());
    }

    let doc = db.get(&path).await.unwrap().unwrap();
    assert_eq!(doc["count"], json!(8));
    assert_eq!(doc["exerciseIds"].as_array().unwrap().len(), 8);
    assert!(db.delete(&path).await.unwrap());
}

#[tokio::test]
async fn update_without_upsert_leaves_missing_documents_alone() {
    let Some(db) = connect().await else {
        eprintln!("TEST_DATABASE_URL is not set; skipping");
        return;
    };
    let path = DocPath::new(format!("users/{}/workouts", Uuid::new_v4()), "missing");
    let updated = db
        .update(&path, vec![FieldOp::set("name", "Leg Day")], false)
        .await
        .unwrap();
    assert!(!updated);
    assert!(db.get(&path).await.unwrap().is_none());
}

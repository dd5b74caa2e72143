//! SQLite-backed document store
//!
//! Reference Database module for local and development deployments.
//! Documents live in a single `documents` table keyed by
//! `(collection, id)` with a secondary index on the upstream
//! cross-reference. Upsert is read-merge-write inside a transaction, so
//! concurrent writers to the same id serialize on the database while
//! writers to different ids proceed independently.

use std::path::Path;

use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use crate::models::{merge, Collection};
use crate::types::{Database, DatabaseError};
use crate::utils::{retry_with_backoff, RetryPolicy};

/// Transient-lock retry budget for busy local databases
const LOCK_RETRY: RetryPolicy = RetryPolicy {
    max_attempts: 5,
    initial_backoff_ms: 10,
    max_backoff_ms: 1_000,
};

pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    /// Open or create the database file and initialize tables
    pub async fn connect(db_path: &Path) -> gavel_common::Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
        tracing::debug!("Connecting to document store: {}", db_url);

        let pool = SqlitePool::connect(&db_url).await?;
        init_tables(&pool).await?;

        Ok(Self { pool })
    }

    /// In-memory store for tests; a single connection keeps every
    /// reader and writer on the same database
    pub async fn connect_in_memory() -> gavel_common::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        init_tables(&pool).await?;
        Ok(Self { pool })
    }

    fn doc_id(doc: &Value) -> Result<String, DatabaseError> {
        doc.get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                DatabaseError::InvalidDocument("document is missing a string `id`".to_string())
            })
    }
}

async fn init_tables(pool: &SqlitePool) -> gavel_common::Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            collection TEXT NOT NULL,
            id TEXT NOT NULL,
            external_source_id TEXT,
            body TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            PRIMARY KEY (collection, id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_documents_external
        ON documents (collection, external_source_id)
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Document store tables initialized");
    Ok(())
}

fn backend_err(err: sqlx::Error) -> DatabaseError {
    DatabaseError::Backend(err.to_string())
}

fn parse_body(body: String) -> Result<Value, DatabaseError> {
    serde_json::from_str(&body)
        .map_err(|e| DatabaseError::InvalidDocument(format!("stored body unreadable: {}", e)))
}

fn is_lock_error(err: &DatabaseError) -> bool {
    matches!(err, DatabaseError::Backend(msg) if msg.contains("database is locked"))
}

#[async_trait::async_trait]
impl Database for SqliteDatabase {
    async fn find_by_id(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<Value>, DatabaseError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT body FROM documents WHERE collection = ? AND id = ?")
                .bind(collection.name())
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(backend_err)?;

        row.map(|(body,)| parse_body(body)).transpose()
    }

    async fn find_by_external_id(
        &self,
        collection: Collection,
        external_id: &str,
    ) -> Result<Option<Value>, DatabaseError> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT body FROM documents WHERE collection = ? AND external_source_id = ? LIMIT 1",
        )
        .bind(collection.name())
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend_err)?;

        row.map(|(body,)| parse_body(body)).transpose()
    }

    async fn upsert(&self, collection: Collection, doc: Value) -> Result<Value, DatabaseError> {
        let id = Self::doc_id(&doc)?;

        retry_with_backoff("document upsert", LOCK_RETRY, is_lock_error, || {
            let doc = doc.clone();
            let id = id.clone();
            async move {
                let mut tx = self.pool.begin().await.map_err(backend_err)?;

                let existing: Option<(String,)> = sqlx::query_as(
                    "SELECT body FROM documents WHERE collection = ? AND id = ?",
                )
                .bind(collection.name())
                .bind(&id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(backend_err)?;

                let merged = match existing {
                    Some((body,)) => {
                        let stored = parse_body(body)?;
                        merge::merge_documents(&stored, &doc)
                    }
                    None => doc,
                };

                let external_source_id = merged
                    .get("external_source_id")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                let body = merged.to_string();

                sqlx::query(
                    r#"
                    INSERT INTO documents (collection, id, external_source_id, body)
                    VALUES (?, ?, ?, ?)
                    ON CONFLICT (collection, id) DO UPDATE SET
                        external_source_id = excluded.external_source_id,
                        body = excluded.body,
                        updated_at = CURRENT_TIMESTAMP
                    "#,
                )
                .bind(collection.name())
                .bind(&id)
                .bind(&external_source_id)
                .bind(&body)
                .execute(&mut *tx)
                .await
                .map_err(backend_err)?;

                tx.commit().await.map_err(backend_err)?;

                Ok(merged)
            }
        })
        .await
    }

    async fn select_rows_as_list(
        &self,
        collection: Collection,
    ) -> Result<Vec<Value>, DatabaseError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT body FROM documents WHERE collection = ? ORDER BY id")
                .bind(collection.name())
                .fetch_all(&self.pool)
                .await
                .map_err(backend_err)?;

        rows.into_iter().map(|(body,)| parse_body(body)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_upsert_then_find_by_id() {
        let db = SqliteDatabase::connect_in_memory().await.unwrap();

        let doc = json!({"id": "e1", "external_source_id": "4053", "video_uri": "https://a/v.mp4"});
        db.upsert(Collection::Event, doc).await.unwrap();

        let found = db.find_by_id(Collection::Event, "e1").await.unwrap().unwrap();
        assert_eq!(found["external_source_id"], "4053");

        let by_external = db
            .find_by_external_id(Collection::Event, "4053")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_external["id"], "e1");
    }

    #[tokio::test]
    async fn test_upsert_merges_instead_of_replacing() {
        let db = SqliteDatabase::connect_in_memory().await.unwrap();

        db.upsert(
            Collection::Event,
            json!({"id": "e1", "matter_ids": ["m1"], "agenda_uri": "https://a/a.pdf"}),
        )
        .await
        .unwrap();

        let merged = db
            .upsert(Collection::Event, json!({"id": "e1", "matter_ids": ["m2"]}))
            .await
            .unwrap();

        assert_eq!(merged["matter_ids"], json!(["m1", "m2"]));
        assert_eq!(merged["agenda_uri"], "https://a/a.pdf");
    }

    #[tokio::test]
    async fn test_missing_id_is_invalid() {
        let db = SqliteDatabase::connect_in_memory().await.unwrap();
        let err = db
            .upsert(Collection::Event, json!({"external_source_id": "4053"}))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidDocument(_)));
    }

    #[tokio::test]
    async fn test_collections_are_disjoint() {
        let db = SqliteDatabase::connect_in_memory().await.unwrap();

        db.upsert(Collection::Event, json!({"id": "x"})).await.unwrap();
        db.upsert(Collection::Person, json!({"id": "x", "name": "A"}))
            .await
            .unwrap();

        let events = db.select_rows_as_list(Collection::Event).await.unwrap();
        let persons = db.select_rows_as_list(Collection::Person).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(persons.len(), 1);
        assert!(events[0].get("name").is_none());
    }

    #[tokio::test]
    async fn test_concurrent_upserts_to_same_id_all_survive() {
        let db = std::sync::Arc::new(SqliteDatabase::connect_in_memory().await.unwrap());

        let mut handles = Vec::new();
        for i in 0..8 {
            let db = std::sync::Arc::clone(&db);
            handles.push(tokio::spawn(async move {
                db.upsert(
                    Collection::Event,
                    json!({"id": "e1", "matter_ids": [format!("m{}", i)]}),
                )
                .await
                .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let merged = db.find_by_id(Collection::Event, "e1").await.unwrap().unwrap();
        let matters = merged["matter_ids"].as_array().unwrap();
        assert_eq!(matters.len(), 8, "every concurrent writer's entry survives");
    }
}

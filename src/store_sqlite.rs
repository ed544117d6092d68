//! SQLite-backed passage store.
//!
//! Implements the core [`VectorStore`] trait over sqlx. Embeddings are
//! stored as little-endian f32 BLOBs; similarity search fetches the
//! tenant's rows and computes cosine distance in Rust, then sorts and
//! truncates. Every query carries the `tenant_id` filter.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use answer_harness_core::embedding::{blob_to_vec, cosine_distance, vec_to_blob};
use answer_harness_core::error::HarnessError;
use answer_harness_core::models::{Passage, PassageHit};
use answer_harness_core::store::VectorStore;

/// A row in the `documents` ledger.
#[derive(Debug, Clone)]
pub struct DocumentRecord {
    pub id: String,
    pub tenant_id: String,
    pub title: Option<String>,
    pub created_at: i64,
    pub word_count: i64,
}

pub struct SqlitePassageStore {
    pool: SqlitePool,
}

impl SqlitePassageStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record a document row; its passages reference it by `document_id`.
    pub async fn record_document(&self, doc: &DocumentRecord) -> Result<(), HarnessError> {
        sqlx::query(
            r#"
            INSERT INTO documents (id, tenant_id, title, created_at, word_count)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&doc.id)
        .bind(&doc.tenant_id)
        .bind(&doc.title)
        .bind(doc.created_at)
        .bind(doc.word_count)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(())
    }

    /// List a tenant's documents, newest first.
    pub async fn list_documents(&self, tenant_id: &str) -> Result<Vec<DocumentRecord>, HarnessError> {
        let rows = sqlx::query(
            r#"
            SELECT id, tenant_id, title, created_at, word_count
            FROM documents
            WHERE tenant_id = ?
            ORDER BY created_at DESC
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(rows
            .iter()
            .map(|row| DocumentRecord {
                id: row.get("id"),
                tenant_id: row.get("tenant_id"),
                title: row.get("title"),
                created_at: row.get("created_at"),
                word_count: row.get("word_count"),
            })
            .collect())
    }
}

fn store_err(err: sqlx::Error) -> HarnessError {
    HarnessError::Store(err.to_string())
}

#[async_trait]
impl VectorStore for SqlitePassageStore {
    async fn insert_passages(&self, passages: &[Passage]) -> Result<(), HarnessError> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        for passage in passages {
            let metadata = serde_json::to_string(&passage.metadata)
                .map_err(|e| HarnessError::Store(e.to_string()))?;
            sqlx::query(
                r#"
                INSERT INTO passages (id, tenant_id, document_id, chunk_index, content, embedding, metadata_json)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&passage.id)
            .bind(&passage.tenant_id)
            .bind(&passage.document_id)
            .bind(passage.chunk_index)
            .bind(&passage.content)
            .bind(vec_to_blob(&passage.embedding))
            .bind(metadata)
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;
        }

        tx.commit().await.map_err(store_err)?;
        Ok(())
    }

    async fn search(
        &self,
        tenant_id: &str,
        query_vec: &[f32],
        top_k: usize,
        max_distance: Option<f32>,
    ) -> Result<Vec<PassageHit>, HarnessError> {
        // Fetch the tenant's vectors and score in Rust.
        let rows = sqlx::query(
            r#"
            SELECT content, embedding
            FROM passages
            WHERE tenant_id = ?
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        let mut hits: Vec<PassageHit> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let vec = blob_to_vec(&blob);
                PassageHit {
                    content: row.get("content"),
                    distance: cosine_distance(query_vec, &vec),
                }
            })
            .filter(|hit| max_distance.map(|t| hit.distance < t).unwrap_or(true))
            .collect();

        // Stable sort: equal distances keep row order.
        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(top_k);

        Ok(hits)
    }

    async fn delete_document(
        &self,
        tenant_id: &str,
        document_id: &str,
    ) -> Result<usize, HarnessError> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;

        let result = sqlx::query("DELETE FROM passages WHERE tenant_id = ? AND document_id = ?")
            .bind(tenant_id)
            .bind(document_id)
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;

        sqlx::query("DELETE FROM documents WHERE tenant_id = ? AND id = ?")
            .bind(tenant_id)
            .bind(document_id)
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;

        tx.commit().await.map_err(store_err)?;
        Ok(result.rows_affected() as usize)
    }

    async fn count(&self, tenant_id: &str) -> Result<usize, HarnessError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM passages WHERE tenant_id = ?")
            .bind(tenant_id)
            .fetch_one(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(count as usize)
    }
}

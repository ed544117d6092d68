//! In-memory [`VectorStore`] implementation for tests.
//!
//! Uses a `Vec` behind `std::sync::RwLock`. Search is brute-force cosine
//! distance over the tenant's rows, matching the SQLite backend's semantics
//! exactly so pipeline tests exercise the same ordering and threshold
//! behavior.

use std::sync::RwLock;

use async_trait::async_trait;

use crate::embedding::cosine_distance;
use crate::error::HarnessError;
use crate::models::{Passage, PassageHit};

use super::VectorStore;

/// In-memory store for tests and examples.
#[derive(Default)]
pub struct InMemoryStore {
    passages: RwLock<Vec<Passage>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total rows across all tenants, for test assertions.
    pub fn len(&self) -> usize {
        self.passages.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl VectorStore for InMemoryStore {
    async fn insert_passages(&self, passages: &[Passage]) -> Result<(), HarnessError> {
        let mut stored = self.passages.write().unwrap();
        stored.extend_from_slice(passages);
        Ok(())
    }

    async fn search(
        &self,
        tenant_id: &str,
        query_vec: &[f32],
        top_k: usize,
        max_distance: Option<f32>,
    ) -> Result<Vec<PassageHit>, HarnessError> {
        let stored = self.passages.read().unwrap();

        let mut hits: Vec<PassageHit> = stored
            .iter()
            .filter(|p| p.tenant_id == tenant_id)
            .map(|p| PassageHit {
                content: p.content.clone(),
                distance: cosine_distance(query_vec, &p.embedding),
            })
            .filter(|hit| max_distance.map(|t| hit.distance < t).unwrap_or(true))
            .collect();

        // Stable sort: equal distances keep insertion order.
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
        let mut stored = self.passages.write().unwrap();
        let before = stored.len();
        stored.retain(|p| !(p.tenant_id == tenant_id && p.document_id == document_id));
        Ok(before - stored.len())
    }

    async fn count(&self, tenant_id: &str) -> Result<usize, HarnessError> {
        let stored = self.passages.read().unwrap();
        Ok(stored.iter().filter(|p| p.tenant_id == tenant_id).count())
    }
}
